use std::sync::Arc;
use std::time::Duration;

use floorwatch_presence::PresenceTracker;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Spawns a task that evicts expired presence entries every `interval`
/// and logs each departure.
pub fn spawn_sweeper(
    tracker: Arc<PresenceTracker>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            for gone in tracker.sweep() {
                info!(
                    identity_id = gone.identity_id,
                    location_id = gone.location_id,
                    first_seen = %gone.first_seen,
                    last_seen = %gone.last_seen,
                    "identity left location"
                );
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sweeps_expired_entries() {
        let tracker = Arc::new(PresenceTracker::new(Duration::from_millis(20)));
        tracker.update(1, 10, "cam", 0.9);
        tracker.update(2, 10, "cam", 0.9);
        assert_eq!(tracker.len(), 2);

        let cancel = CancellationToken::new();
        let task = spawn_sweeper(tracker.clone(), Duration::from_millis(10), cancel.clone());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(tracker.is_empty());

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn stops_on_cancel() {
        let tracker = Arc::new(PresenceTracker::default());
        let cancel = CancellationToken::new();
        let task = spawn_sweeper(tracker, Duration::from_secs(3600), cancel.clone());
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }
}
