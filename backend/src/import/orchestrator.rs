use tracing::{error, info, warn};

use super::normalizer::{normalize, NormalizedMonitor};
use super::table::Table;
use super::tag_resolver::TagResolver;
use crate::batch::ImportResult;
use crate::kuma::{KumaError, MonitorApi};

/// Imports every row of `table` as a monitor.
///
/// Phase one resolves all tag values; phase two creates the monitors in row
/// order and attaches their tags. Item failures are tallied and the batch
/// goes on; nothing already created is rolled back. If the session is lost,
/// the rows not yet attempted are counted as failed, so
/// `success + failed` always equals the number of rows.
pub async fn run_import(api: &mut dyn MonitorApi, table: &Table) -> ImportResult {
    let total = table.total_rows();
    let mut result = ImportResult::new();
    let mut resolver = TagResolver::new();

    info!(rows = total, "Preparing tags for import");
    if let Err(e) = resolver.prepare(api, &table.records, &mut result.errors).await {
        abort(&mut result, 1, total, &e);
        return result;
    }

    info!(rows = total, tags = resolver.len(), "Creating monitors");
    for (position, record) in table.records.iter().enumerate() {
        let index = position + 1;
        let NormalizedMonitor {
            request,
            tag_values,
        } = normalize(index, record);

        let monitor_id = match api.add_monitor(&request).await {
            Ok(id) => id,
            Err(e) if e.is_session_fatal() => {
                abort(&mut result, index, total, &e);
                return result;
            }
            Err(e) => {
                warn!(row = index, name = %request.name, error = %e, "Monitor import failed");
                result.record_failure(format!(
                    "Import failed {index}/{total}: {} - {e}",
                    request.name
                ));
                continue;
            }
        };

        for value in &tag_values {
            let Some(tag_id) = resolver.get(value) else {
                continue;
            };
            if let Err(e) = api.add_monitor_tag(monitor_id, tag_id, "").await {
                warn!(monitor_id, tag = %value, error = %e, "Failed to attach tag");
                result.record_error(format!(
                    "Monitor '{}' failed to attach tag: {value} - {e}",
                    request.name
                ));
            }
        }
        result.record_success();
    }

    info!(
        success = result.success,
        failed = result.failed,
        errors = result.errors.len(),
        "Import finished"
    );
    result
}

fn abort(result: &mut ImportResult, index: usize, total: usize, e: &KumaError) {
    error!(row = index, total, error = %e, "Import aborted, session lost");
    let remaining = total.saturating_sub(index - 1);
    result.record_aborted(remaining, format!("Import aborted at row {index}/{total}: {e}"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::table::parse_table;
    use crate::test_support::FakeKuma;

    const CSV: &str = "name,type,url,hostname,port,sysname,appname,hostinfo\n\
                       api,http,https://api.example.com,,,billing,gateway,\n\
                       db,port,10.0.0.5,,5432,billing,,rack-1\n\
                       ,ping,,10.0.0.9,,,,\n";

    #[tokio::test]
    async fn test_import_creates_monitors_and_attaches_tags() {
        let table = parse_table(CSV.as_bytes()).unwrap();
        let mut fake = FakeKuma::new();

        let result = run_import(&mut fake, &table).await;

        assert_eq!(result.success, 3);
        assert_eq!(result.failed, 0);
        assert!(result.errors.is_empty(), "{:?}", result.errors);

        let state = fake.state();
        assert_eq!(state.created_tags, vec!["billing", "gateway", "rack-1"]);
        let names: Vec<_> = state.created_monitors.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["api", "db", "Unnamed-3"]);
        // api: billing + gateway, db: billing + rack-1
        assert_eq!(state.attached.len(), 4);
    }

    #[tokio::test]
    async fn test_failed_row_does_not_stop_later_rows() {
        let table = parse_table(CSV.as_bytes()).unwrap();
        let mut fake = FakeKuma::new().failing_monitor("api");

        let result = run_import(&mut fake, &table).await;

        assert_eq!(result.success, 2);
        assert_eq!(result.failed, 1);
        assert_eq!(result.attempted(), table.total_rows());
        assert_eq!(result.errors, vec!["Import failed 1/3: api - Invalid hostname"]);
        assert_eq!(fake.state().created_monitors.len(), 2);
    }

    #[tokio::test]
    async fn test_attach_failure_is_reported_but_row_succeeds() {
        let table = parse_table(CSV.as_bytes()).unwrap();
        let mut fake = FakeKuma::new().failing_attach("rack-1");

        let result = run_import(&mut fake, &table).await;

        assert_eq!(result.success, 3);
        assert_eq!(result.failed, 0);
        assert_eq!(
            result.errors,
            vec!["Monitor 'db' failed to attach tag: rack-1 - Tag not found"]
        );
    }

    #[tokio::test]
    async fn test_tag_failure_skips_attachment_only() {
        let table = parse_table(CSV.as_bytes()).unwrap();
        let mut fake = FakeKuma::new().failing_tag("gateway");

        let result = run_import(&mut fake, &table).await;

        assert_eq!(result.success, 3);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("Failed to create/fetch tag: gateway"));
        assert_eq!(fake.state().attached.len(), 3);
    }

    #[tokio::test]
    async fn test_lost_session_counts_remaining_rows_as_failed() {
        let table = parse_table(CSV.as_bytes()).unwrap();
        // 3 tags x (getTags + addTag) = 6 calls, then one monitor plus two
        // attachments succeed before the connection drops.
        let mut fake = FakeKuma::new().disconnect_after_calls(9);

        let result = run_import(&mut fake, &table).await;

        assert_eq!(result.success, 1);
        assert_eq!(result.failed, 2);
        assert_eq!(result.attempted(), table.total_rows());
        assert_eq!(
            result.errors.last().unwrap(),
            "Import aborted at row 2/3: connection to the monitoring server was lost"
        );
        assert_eq!(fake.state().created_monitors.len(), 1);
    }

    #[tokio::test]
    async fn test_lost_session_during_tag_phase() {
        let table = parse_table(CSV.as_bytes()).unwrap();
        let mut fake = FakeKuma::new().disconnect_after_calls(1);

        let result = run_import(&mut fake, &table).await;

        assert_eq!(result.success, 0);
        assert_eq!(result.failed, 3);
        assert!(fake.state().created_monitors.is_empty());
    }

    #[tokio::test]
    async fn test_empty_table() {
        let table = parse_table(b"name,type\n").unwrap();
        let mut fake = FakeKuma::new();
        let result = run_import(&mut fake, &table).await;
        assert_eq!(result, ImportResult::new());
    }
}
