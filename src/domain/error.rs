use std::time::Duration;

/// Error taxonomy for the snapshot & change engine. These are
/// kinds, not wrapped source errors: callers that need the underlying
/// cause should fold it into the message before constructing a variant.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("connect error: {0}")]
    Connect(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("extraction error: {0}")]
    Extraction(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("invariant violation: {0}")]
    Invariant(String),

    #[error("notification error: {0}")]
    Notification(String),

    #[error("cancelled")]
    Cancelled,
}

impl ScanError {
    /// Single-line message suitable for an entry's `errorMessage` or the
    /// scan-level error summary.
    pub fn summary_line(&self) -> String {
        self.to_string().replace('\n', " ")
    }
}
