use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use log::info;
use tokio::sync::{broadcast, watch, Mutex};

use crate::{
    broadcast::{BroadcastHub, EngineEvent},
    db::Database,
    estimation::{GenerativeClassifier, InferenceGate, StateClassifier},
    models::{BucketedSegment, DailySummary, IntegratedState, UserAction},
    notification::{NotificationEngine, NotificationWorker},
    segmentation::{build_bucketed_segments, compute_daily_stats, BucketConfig},
    sensing::{IntegrationWorker, SensingController, SnapshotStore},
    settings::{EngineConfig, SettingsStore},
};

/// Owns every component and the two background loops.
#[derive(Clone)]
pub struct Engine {
    config: Arc<watch::Sender<EngineConfig>>,
    backend: Option<Arc<dyn GenerativeClassifier>>,
    db: Database,
    snapshots: SnapshotStore,
    hub: BroadcastHub,
    classifier: StateClassifier,
    notifications: Arc<Mutex<NotificationEngine>>,
    paused: Arc<AtomicBool>,
    current: Arc<watch::Sender<Option<IntegratedState>>>,
    loops: Arc<Mutex<SensingController>>,
}

impl Engine {
    /// `backend` is the generative classifier; `None` or a config with
    /// `llm_enabled = false` leaves ambiguous cases to the fallback rules.
    pub fn new(
        config: EngineConfig,
        db: Database,
        backend: Option<Arc<dyn GenerativeClassifier>>,
    ) -> Self {
        let gate = InferenceGate::disabled()
            .reconfigured(active_backend(&config, &backend), config.llm_timeout());
        if !gate.is_enabled() {
            info!("generative classifier disabled; ambiguous cases use fallback rules");
        }
        let (current, _) = watch::channel(None);

        Self {
            notifications: Arc::new(Mutex::new(NotificationEngine::new(
                config.notification_config(),
            ))),
            config: Arc::new(watch::channel(config).0),
            backend,
            db,
            snapshots: SnapshotStore::new(),
            hub: BroadcastHub::new(),
            classifier: StateClassifier::new(gate),
            paused: Arc::new(AtomicBool::new(false)),
            current: Arc::new(current),
            loops: Arc::new(Mutex::new(SensingController::new())),
        }
    }

    pub fn config(&self) -> EngineConfig {
        self.config.borrow().clone()
    }

    /// Swap settings on a live engine.
    ///
    /// Notification thresholds and cooldowns apply on the next check, bucket
    /// width and window on the next notification tick, and the generative
    /// gate is rebuilt around the same exclusive lock. Running loops are
    /// restarted only when an interval changed.
    pub async fn apply_config(&self, config: EngineConfig) -> Result<()> {
        let previous = self.config.send_replace(config.clone());

        self.notifications
            .lock()
            .await
            .set_config(config.notification_config());

        let gate = self
            .classifier
            .gate()
            .reconfigured(active_backend(&config, &self.backend), config.llm_timeout());
        info!(
            "settings applied (generative classifier {}, timeout {:?})",
            if gate.is_enabled() { "on" } else { "off" },
            gate.timeout()
        );
        self.classifier.set_gate(gate);

        let intervals_changed = previous.integration_interval() != config.integration_interval()
            || previous.notification_interval() != config.notification_interval();
        let mut loops = self.loops.lock().await;
        if intervals_changed && loops.is_running() {
            loops.stop().await?;
            loops.start(
                self.integration_worker(),
                config.integration_interval(),
                self.notification_worker(),
                config.notification_interval(),
            )?;
        }
        Ok(())
    }

    /// Persist `config` through `store`, then apply it.
    pub async fn update_settings(&self, store: &SettingsStore, config: EngineConfig) -> Result<()> {
        store.update(config.clone())?;
        self.apply_config(config).await
    }

    /// Re-read the settings file and apply what it holds.
    pub async fn reload_settings(&self, store: &SettingsStore) -> Result<()> {
        store.reload()?;
        self.apply_config(store.config()).await
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Producers push camera and PC readings here.
    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.hub.subscribe()
    }

    pub fn integration_worker(&self) -> IntegrationWorker {
        IntegrationWorker {
            snapshots: self.snapshots.clone(),
            classifier: self.classifier.clone(),
            db: self.db.clone(),
            sink: Arc::new(self.hub.clone()),
            paused: Arc::clone(&self.paused),
            current: Arc::clone(&self.current),
        }
    }

    pub fn notification_worker(&self) -> NotificationWorker {
        NotificationWorker {
            db: self.db.clone(),
            engine: Arc::clone(&self.notifications),
            sink: Arc::new(self.hub.clone()),
            paused: Arc::clone(&self.paused),
            config: self.config.subscribe(),
        }
    }

    pub async fn start(&self) -> Result<()> {
        let config = self.config();
        let mut loops = self.loops.lock().await;
        loops.start(
            self.integration_worker(),
            config.integration_interval(),
            self.notification_worker(),
            config.notification_interval(),
        )
    }

    pub async fn stop(&self) -> Result<()> {
        self.loops.lock().await.stop().await?;
        info!("engine stopped");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.loops.lock().await.is_running()
    }

    /// Both loops keep their timers but skip their work.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
        info!("engine paused");
    }

    /// Drops pre-pause snapshots and every notification cooldown.
    pub async fn resume(&self) {
        self.snapshots.clear();
        self.notifications.lock().await.reset();
        self.paused.store(false, Ordering::SeqCst);
        info!("engine resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn current_state(&self) -> Option<IntegratedState> {
        self.current.borrow().clone()
    }

    /// Majority-voted segments for `[start, end)`. Defaults to the
    /// configured bucket width.
    pub async fn get_bucketed_segments(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        bucket_minutes: Option<u32>,
    ) -> Result<Vec<BucketedSegment>> {
        if end <= start {
            bail!("invalid range: end {end} is not after start {start}");
        }
        let configured = self.config().bucket_config();
        let config = match bucket_minutes {
            Some(0) => bail!("bucket_minutes must be greater than zero"),
            Some(minutes) => BucketConfig {
                bucket_minutes: minutes,
                ..configured
            },
            None => configured,
        };

        let entries = self
            .db
            .get_state_log(start, end)
            .await
            .context("failed to load state log")?;
        Ok(build_bucketed_segments(&entries, start, end, &config))
    }

    /// Recompute the summary for a local calendar day and store it.
    pub async fn daily_stats(&self, date: NaiveDate) -> Result<DailySummary> {
        let config = self.config();
        let summary = compute_daily_stats(
            &self.db,
            date,
            &config.bucket_config(),
            config.focus_block_min_minutes,
        )
        .await
        .with_context(|| format!("failed to compute daily stats for {date}"))?;

        self.db.save_daily_summary(&summary).await?;
        Ok(summary)
    }

    pub async fn record_notification_action(&self, id: &str, action: UserAction) -> Result<()> {
        self.db.update_notification_action(id, action).await
    }
}

fn active_backend(
    config: &EngineConfig,
    backend: &Option<Arc<dyn GenerativeClassifier>>,
) -> Option<Arc<dyn GenerativeClassifier>> {
    backend.clone().filter(|_| config.llm_enabled)
}
