use async_trait::async_trait;
use tracing::info;

use crate::domain::change::DetectedChange;
use crate::domain::error::ScanError;
use crate::domain::ports::ScanNotifier;
use crate::domain::scan_log::{ScanLog, ScanLogEntry};

/// `Notify` has no wire format specified; shipping a concrete
/// webhook/email client would be inventing scope that was left open. This
/// adapter logs the terminal summary at `info`, giving the orchestrator a
/// real collaborator to call while leaving outbound delivery to whatever
/// `tracing` subscriber the operator wires up.
#[derive(Debug, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl ScanNotifier for LoggingNotifier {
    async fn notify(&self, log: &ScanLog, entries: &[ScanLogEntry], pending: &[DetectedChange]) -> Result<(), ScanError> {
        info!(
            scan_log_id = log.id,
            status = ?log.status,
            entries = entries.len(),
            pending_changes = pending.len(),
            "scan finished"
        );
        Ok(())
    }
}
