use serde::{Deserialize, Serialize};

use crate::batch::BatchResult;
use crate::import::MonitorRecord;
use crate::kuma::{Credentials, Monitor};
use crate::services::{FilterSpec, MonitorIdInput};

#[derive(Debug, Deserialize)]
pub struct MonitorListRequest {
    #[serde(flatten)]
    pub credentials: Credentials,
}

#[derive(Debug, Deserialize)]
pub struct DeleteMonitorsRequest {
    #[serde(flatten)]
    pub credentials: Credentials,
    #[serde(default)]
    pub monitor_ids: Option<Vec<MonitorIdInput>>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteByFilterRequest {
    #[serde(flatten)]
    pub credentials: Credentials,
    #[serde(default)]
    pub filters: Option<FilterSpec>,
}

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    #[serde(flatten)]
    pub credentials: Credentials,
    #[serde(default)]
    pub filename: Option<String>,
}

/// A monitor as the console shows it: the server's fields plus display helpers.
#[derive(Debug, Serialize)]
pub struct MonitorView {
    #[serde(flatten)]
    pub monitor: Monitor,
    pub id_str: String,
    pub tag_names: String,
}

impl From<Monitor> for MonitorView {
    fn from(monitor: Monitor) -> Self {
        Self {
            id_str: monitor.id.to_string(),
            tag_names: monitor.tag_names(),
            monitor,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MonitorListResponse {
    pub success: bool,
    pub monitors: Vec<MonitorView>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub success: bool,
    pub results: BatchResult,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub filename: String,
    pub preview: Vec<MonitorRecord>,
    pub columns: Vec<String>,
    pub total_rows: usize,
}
