use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::queue::{ScanQueue, ScanRequest};

/// Periodic full-scan trigger.
/// Enqueues a full scan on every tick; a full queue just drops that tick's
/// request rather than blocking the scheduler.
pub async fn run_scheduler(interval: Duration, run_on_startup: bool, queue: ScanQueue, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    if !run_on_startup {
        ticker.tick().await;
    }

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("scheduler stopping");
                break;
            }
            _ = ticker.tick() => {
                let request = ScanRequest {
                    tenant_id: None,
                    environment: None,
                    triggered_by: Some("scheduler".into()),
                    scan_all: false,
                };
                if let Err(e) = queue.try_enqueue(request) {
                    warn!(error = %e, "scheduler could not enqueue scan");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stops_promptly_when_cancelled() {
        let (queue, _receiver) = ScanQueue::bounded(1);
        let cancel = CancellationToken::new();
        let child = cancel.clone();
        let handle = tokio::spawn(run_scheduler(Duration::from_secs(3600), false, queue, child));
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("scheduler task should stop promptly")
            .unwrap();
    }
}
