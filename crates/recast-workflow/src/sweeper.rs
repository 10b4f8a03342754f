//! Background eviction of stale workflow records.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::registry::WorkflowRegistry;

/// Evict records older than `retention` every `interval` until `cancel` fires.
pub fn spawn_eviction_sweeper(
    registry: Arc<WorkflowRegistry>,
    retention: Duration,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let period = interval.max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Eviction sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let removed = registry.evict_older_than(retention);
                    if removed > 0 {
                        info!(
                            removed,
                            remaining = registry.len(),
                            retention_secs = retention.as_secs(),
                            "Evicted stale workflows"
                        );
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Summary;

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_evicts_on_interval_and_stops_on_cancel() {
        let registry = Arc::new(WorkflowRegistry::new());
        registry.create(Summary::new());

        let cancel = CancellationToken::new();
        let task = spawn_eviction_sweeper(
            registry.clone(),
            Duration::ZERO,
            Duration::from_secs(60),
            cancel.clone(),
        );

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(registry.len(), 1);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(registry.len(), 0);

        cancel.cancel();
        task.await.unwrap();
    }
}
