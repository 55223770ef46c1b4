pub mod filter;
pub mod monitor_service;
pub mod upload_store;

pub use filter::{FilterSpec, NameFilter};
pub use monitor_service::MonitorIdInput;
pub use upload_store::{UploadError, UploadGuard, UploadStore};
