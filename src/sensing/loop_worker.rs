use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::broadcast::{EngineEvent, EventSink};
use crate::db::Database;
use crate::estimation::StateClassifier;
use crate::models::IntegratedState;

use super::snapshot_store::SnapshotStore;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info};

/// Everything one integration tick touches.
#[derive(Clone)]
pub struct IntegrationWorker {
    pub snapshots: SnapshotStore,
    pub classifier: StateClassifier,
    pub db: Database,
    pub sink: Arc<dyn EventSink>,
    pub paused: Arc<AtomicBool>,
    pub current: Arc<watch::Sender<Option<IntegratedState>>>,
}

impl IntegrationWorker {
    /// Classify the latest snapshots and fan the result out.
    ///
    /// Returns `None` only when paused. Persistence and broadcast failures are
    /// logged and do not affect the returned state.
    pub async fn run_tick(&self, timestamp: DateTime<Utc>) -> Option<IntegratedState> {
        if self.paused.load(Ordering::SeqCst) {
            return None;
        }

        let tick_start = Instant::now();
        let (camera, pc) = self.snapshots.latest();
        let result = self.classifier.classify(camera.as_ref(), pc.as_ref()).await;
        let integrated = IntegratedState::from_classification(result, timestamp);

        if let Err(err) = self.sink.publish(EngineEvent::State(integrated.clone())) {
            log_error!("failed to broadcast integrated state: {err:?}");
        }

        if let Err(err) = self.db.append_state_log(&integrated.to_log_entry()).await {
            log_error!("failed to persist state log entry: {err:?}");
        }

        self.current.send_replace(Some(integrated.clone()));

        log_debug!(
            "integration tick: {} ({:.2}, {}) in {}ms",
            integrated.state,
            integrated.confidence,
            integrated.source.as_str(),
            tick_start.elapsed().as_millis()
        );

        Some(integrated)
    }
}

/// Fixed-period integrator. Keeps ticking while paused so resume needs no
/// re-initialisation.
pub async fn integration_loop(
    worker: IntegrationWorker,
    period: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                worker.run_tick(Utc::now()).await;
            }
            _ = cancel_token.cancelled() => {
                log_info!("integration loop shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::BroadcastHub;
    use crate::models::{BehaviorState, CameraSnapshot, ClassificationSource, PcSnapshot};

    struct FailingSink;

    impl EventSink for FailingSink {
        fn publish(&self, _event: EngineEvent) -> anyhow::Result<()> {
            anyhow::bail!("transport closed")
        }
    }

    fn worker(sink: Arc<dyn EventSink>) -> IntegrationWorker {
        let (current, _) = watch::channel(None);
        IntegrationWorker {
            snapshots: SnapshotStore::new(),
            classifier: StateClassifier::rules_only(),
            db: Database::open_in_memory().unwrap(),
            sink,
            paused: Arc::new(AtomicBool::new(false)),
            current: Arc::new(current),
        }
    }

    async fn logged_states(worker: &IntegrationWorker) -> Vec<BehaviorState> {
        let now = Utc::now();
        worker
            .db
            .get_state_log(now - chrono::Duration::hours(1), now + chrono::Duration::hours(1))
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.integrated_state)
            .collect()
    }

    #[tokio::test]
    async fn tick_broadcasts_persists_and_records_current() {
        let hub = BroadcastHub::new();
        let mut events = hub.subscribe();
        let worker = worker(Arc::new(hub));
        worker.snapshots.publish_camera(Some(CameraSnapshot {
            face_detected: false,
            ..CameraSnapshot::default()
        }));

        let state = worker.run_tick(Utc::now()).await.unwrap();

        assert_eq!(state.state, BehaviorState::Away);
        assert_eq!(state.source, ClassificationSource::Rule);
        assert!(state.camera_state.is_none() && state.pc_state.is_none());
        assert_eq!(events.recv().await.unwrap(), EngineEvent::State(state.clone()));
        assert_eq!(logged_states(&worker).await, vec![BehaviorState::Away]);
        assert_eq!(*worker.current.borrow(), Some(state));
    }

    #[tokio::test]
    async fn no_snapshots_still_yields_a_state() {
        let worker = worker(Arc::new(BroadcastHub::new()));
        let state = worker.run_tick(Utc::now()).await.unwrap();
        assert_eq!(state.state, BehaviorState::Unknown);
        assert_eq!(logged_states(&worker).await.len(), 1);
    }

    #[tokio::test]
    async fn paused_tick_is_a_no_op() {
        let worker = worker(Arc::new(BroadcastHub::new()));
        worker.paused.store(true, Ordering::SeqCst);

        assert!(worker.run_tick(Utc::now()).await.is_none());
        assert!(logged_states(&worker).await.is_empty());
        assert!(worker.current.borrow().is_none());

        worker.paused.store(false, Ordering::SeqCst);
        assert!(worker.run_tick(Utc::now()).await.is_some());
    }

    #[tokio::test]
    async fn broadcast_failure_does_not_block_persistence() {
        let worker = worker(Arc::new(FailingSink));
        worker.snapshots.publish_pc(Some(PcSnapshot {
            idle_seconds: 120.0,
            ..PcSnapshot::default()
        }));

        let state = worker.run_tick(Utc::now()).await.unwrap();

        assert_eq!(state.source, ClassificationSource::Fallback);
        assert_eq!(logged_states(&worker).await, vec![BehaviorState::Focused]);
    }

    #[tokio::test]
    async fn loop_ticks_until_cancelled() {
        let worker = worker(Arc::new(BroadcastHub::new()));
        let token = CancellationToken::new();
        let handle = tokio::spawn(integration_loop(
            worker.clone(),
            Duration::from_millis(20),
            token.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(110)).await;
        token.cancel();
        handle.await.unwrap();

        let ticks = logged_states(&worker).await.len();
        assert!(ticks >= 3, "only {ticks} ticks");
    }

    #[tokio::test]
    async fn paused_loop_resumes_in_place() {
        let worker = worker(Arc::new(BroadcastHub::new()));
        let token = CancellationToken::new();
        let handle = tokio::spawn(integration_loop(
            worker.clone(),
            Duration::from_millis(20),
            token.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(70)).await;
        worker.paused.store(true, Ordering::SeqCst);
        // let any tick already past the pause check finish
        tokio::time::sleep(Duration::from_millis(30)).await;
        let before = logged_states(&worker).await.len();
        assert!(before >= 1);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(logged_states(&worker).await.len(), before);
        assert!(!handle.is_finished());

        worker.paused.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(80)).await;
        let after = logged_states(&worker).await.len();
        assert!(after > before, "no ticks after resume ({after})");

        token.cancel();
        handle.await.unwrap();
    }
}
