use serde::Serialize;

/// Per-item tally of one batch (import, delete by id, delete by filter).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchResult {
    pub success: usize,
    pub failed: usize,
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_count: Option<usize>,
}

pub type ImportResult = BatchResult;
pub type DeleteResult = BatchResult;

impl BatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_matched(matched_count: usize) -> Self {
        Self {
            matched_count: Some(matched_count),
            ..Self::default()
        }
    }

    pub fn record_success(&mut self) {
        self.success += 1;
    }

    pub fn record_failure(&mut self, error: String) {
        self.failed += 1;
        self.errors.push(error);
    }

    /// Error that does not count against any item, e.g. a tag that could not
    /// be attached to an otherwise created monitor.
    pub fn record_error(&mut self, error: String) {
        self.errors.push(error);
    }

    /// Counts `remaining` items as failed under a single error, used when the
    /// session dies part way through a batch.
    pub fn record_aborted(&mut self, remaining: usize, error: String) {
        self.failed += remaining;
        self.errors.push(error);
    }

    pub fn attempted(&self) -> usize {
        self.success + self.failed
    }
}
