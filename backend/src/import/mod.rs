//! CSV import pipeline: parse, normalize, resolve tags, create monitors.

pub mod normalizer;
pub mod orchestrator;
pub mod table;
pub mod tag_resolver;

pub use orchestrator::run_import;
pub use table::{read_table, CellValue, MonitorRecord, ParseError, Table};

/// Columns whose values become tags on the imported monitor, in the order
/// they are resolved and attached.
pub const TAG_COLUMNS: [&str; 3] = ["sysname", "appname", "hostinfo"];
