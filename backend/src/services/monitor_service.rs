use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use tracing::{error, info, warn};

use super::filter::FilterSpec;
use crate::batch::DeleteResult;
use crate::kuma::{KumaError, Monitor, MonitorApi};

/// A monitor id as the browser sends it: a number or a numeric string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum MonitorIdInput {
    Number(serde_json::Number),
    Text(String),
    Other(Value),
}

impl MonitorIdInput {
    pub fn to_id(&self) -> Option<i64> {
        match self {
            MonitorIdInput::Number(n) => n.as_i64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            }),
            MonitorIdInput::Text(s) => s.trim().parse().ok(),
            MonitorIdInput::Other(_) => None,
        }
    }
}

impl fmt::Display for MonitorIdInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorIdInput::Number(n) => write!(f, "{n}"),
            MonitorIdInput::Text(s) => write!(f, "{s}"),
            MonitorIdInput::Other(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for MonitorIdInput {
    fn from(id: i64) -> Self {
        MonitorIdInput::Number(id.into())
    }
}

pub async fn list_monitors(api: &mut dyn MonitorApi) -> Result<Vec<Monitor>, KumaError> {
    let monitors = api.get_monitors().await?;
    info!(count = monitors.len(), "Fetched monitor list");
    Ok(monitors)
}

/// Deletes every id in `ids`, one at a time. An id that is not an integer or
/// that the server refuses is recorded and the batch goes on.
pub async fn delete_monitors(api: &mut dyn MonitorApi, ids: &[MonitorIdInput]) -> DeleteResult {
    let total = ids.len();
    let mut result = DeleteResult::new();

    for (position, raw) in ids.iter().enumerate() {
        let Some(id) = raw.to_id() else {
            warn!(id = %raw, "Monitor id is not an integer");
            result.record_failure(format!("Failed to delete monitor {raw}: invalid monitor id"));
            continue;
        };
        match api.delete_monitor(id).await {
            Ok(()) => {
                info!(monitor_id = id, "Deleted monitor");
                result.record_success();
            }
            Err(e) if e.is_session_fatal() => {
                abort(&mut result, position + 1, total, &e);
                break;
            }
            Err(e) => {
                warn!(monitor_id = id, error = %e, "Failed to delete monitor");
                result.record_failure(format!("Failed to delete monitor {raw}: {e}"));
            }
        }
    }

    info!(success = result.success, failed = result.failed, "Delete by id finished");
    result
}

/// Fetches the monitor list, keeps the monitors `filter` matches and deletes
/// them. Only a failure to fetch the list is returned as an error.
pub async fn delete_by_filter(
    api: &mut dyn MonitorApi,
    filter: &FilterSpec,
) -> Result<DeleteResult, KumaError> {
    let monitors = api.get_monitors().await?;
    let matched = filter.select(&monitors);
    let total = matched.len();
    let mut result = DeleteResult::with_matched(total);
    info!(fetched = monitors.len(), matched = total, "Applied delete filter");

    for (position, monitor) in matched.iter().enumerate() {
        match api.delete_monitor(monitor.id).await {
            Ok(()) => {
                info!(monitor_id = monitor.id, name = %monitor.name, "Deleted monitor");
                result.record_success();
            }
            Err(e) if e.is_session_fatal() => {
                abort(&mut result, position + 1, total, &e);
                break;
            }
            Err(e) => {
                warn!(monitor_id = monitor.id, error = %e, "Failed to delete monitor");
                result.record_failure(format!(
                    "Failed to delete monitor {} ({}): {e}",
                    monitor.name, monitor.id
                ));
            }
        }
    }

    info!(success = result.success, failed = result.failed, "Delete by filter finished");
    Ok(result)
}

fn abort(result: &mut DeleteResult, index: usize, total: usize, e: &KumaError) {
    error!(index, total, error = %e, "Delete aborted, session lost");
    let remaining = total.saturating_sub(index - 1);
    result.record_aborted(remaining, format!("Delete aborted at monitor {index}/{total}: {e}"));
}
