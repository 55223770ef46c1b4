use std::collections::HashMap;
use tracing::{debug, warn};

use super::table::MonitorRecord;
use super::TAG_COLUMNS;
use crate::kuma::{KumaError, MonitorApi};

/// Color given to tags the import creates.
pub const DEFAULT_TAG_COLOR: &str = "gray";

/// Run-scoped mapping from tag value to remote tag id.
///
/// Each distinct value is looked up (and created if needed) at most once per
/// run; later changes on the server are not observed.
#[derive(Debug, Default)]
pub struct TagResolver {
    cache: HashMap<String, i64>,
}

impl TagResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, value: &str) -> Option<i64> {
        self.cache.get(value).copied()
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Resolves every tag value in `records`, all `sysname` values first, then
    /// `appname`, then `hostinfo`. Per-value failures are appended to `errors`;
    /// a session-level failure stops resolution and is returned.
    pub async fn prepare(
        &mut self,
        api: &mut dyn MonitorApi,
        records: &[MonitorRecord],
        errors: &mut Vec<String>,
    ) -> Result<(), KumaError> {
        for column in TAG_COLUMNS {
            for record in records {
                let Some(value) = record.text(column) else {
                    continue;
                };
                if self.cache.contains_key(&value) {
                    continue;
                }
                match resolve_one(api, &value).await {
                    Ok(tag_id) => {
                        debug!(tag = %value, tag_id, column, "Resolved tag");
                        self.cache.insert(value, tag_id);
                    }
                    Err(e) if e.is_session_fatal() => return Err(e),
                    Err(e) => {
                        warn!(tag = %value, error = %e, "Failed to resolve tag");
                        errors.push(format!("Failed to create/fetch tag: {value} - {e}"));
                    }
                }
            }
        }
        Ok(())
    }
}

async fn resolve_one(api: &mut dyn MonitorApi, value: &str) -> Result<i64, KumaError> {
    let existing = api.get_tags().await?;
    if let Some(tag) = existing.iter().find(|tag| tag.name == value) {
        return Ok(tag.id);
    }
    let created = api.add_tag(value, DEFAULT_TAG_COLOR).await?;
    Ok(created.id)
}
