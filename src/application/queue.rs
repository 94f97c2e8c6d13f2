use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::domain::error::ScanError;
use crate::domain::scan_log::ScanTrigger;
use crate::domain::target::Environment;

use super::orchestrator::Orchestrator;

/// Default bounded capacity of the Scan Queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub tenant_id: Option<i64>,
    pub environment: Option<Environment>,
    pub triggered_by: Option<String>,
    pub scan_all: bool,
}

/// A clone-able handle onto the bounded Scan Queue. Enqueue
/// fails fast: a full or closed queue is the caller's problem, never a
/// blocking wait.
#[derive(Clone)]
pub struct ScanQueue {
    sender: mpsc::Sender<ScanRequest>,
}

pub struct ScanQueueReceiver {
    receiver: mpsc::Receiver<ScanRequest>,
}

impl ScanQueue {
    pub fn bounded(capacity: usize) -> (Self, ScanQueueReceiver) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, ScanQueueReceiver { receiver })
    }

    pub fn try_enqueue(&self, request: ScanRequest) -> Result<(), ScanError> {
        self.sender.try_send(request).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ScanError::Invariant("scan queue is full".into()),
            mpsc::error::TrySendError::Closed(_) => ScanError::Invariant("scan queue is closed".into()),
        })
    }
}

/// Drains the queue, running one scan at a time through a fresh call into
/// the orchestrator per request. Stops when the channel closes or `cancel` fires.
pub async fn run_worker(mut queue: ScanQueueReceiver, orchestrator: Arc<Orchestrator>, cancel: CancellationToken) {
    loop {
        let request = tokio::select! {
            _ = cancel.cancelled() => break,
            r = queue.receiver.recv() => match r {
                Some(r) => r,
                None => break,
            },
        };

        let result = match request.tenant_id {
            Some(tenant_id) => {
                orchestrator
                    .run_single_scan(
                        tenant_id,
                        request.environment,
                        ScanTrigger::OnDemand,
                        request.triggered_by,
                        request.scan_all,
                        cancel.child_token(),
                    )
                    .await
            }
            None => {
                orchestrator
                    .run_full_scan(
                        ScanTrigger::OnDemand,
                        request.triggered_by,
                        None,
                        request.scan_all,
                        cancel.child_token(),
                    )
                    .await
            }
        };

        match result {
            Ok(log) => info!(scan_log_id = log.id, status = ?log.status, "queued scan finished"),
            Err(e) => warn!(error = %e, "queued scan failed"),
        }
    }
}
