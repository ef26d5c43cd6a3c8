use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex};
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::broadcast::{EngineEvent, EventSink};
use crate::db::Database;
use crate::models::Notification;
use crate::segmentation::{build_bucketed_segments, floor_to_bucket};
use crate::settings::EngineConfig;

use super::engine::NotificationEngine;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info};

#[derive(Clone)]
pub struct NotificationWorker {
    pub db: Database,
    pub engine: Arc<Mutex<NotificationEngine>>,
    pub sink: Arc<dyn EventSink>,
    pub paused: Arc<AtomicBool>,
    /// Live settings; bucket width and window are read on every tick.
    pub config: watch::Receiver<EngineConfig>,
}

impl NotificationWorker {
    /// Re-derive buckets for the trailing window and let the engine decide.
    ///
    /// Only completed buckets are considered: the window ends at `now`
    /// floored to a bucket boundary.
    pub async fn run_tick(&self, now: DateTime<Utc>) -> Option<Notification> {
        if self.paused.load(Ordering::SeqCst) {
            return None;
        }

        let (bucket_config, window) = {
            let config = self.config.borrow();
            (config.bucket_config(), config.notification_window())
        };
        let window_end = floor_to_bucket(now, &bucket_config);
        let window_start = window_end - window;

        let entries = match self.db.get_state_log(window_start, window_end).await {
            Ok(entries) => entries,
            Err(err) => {
                log_error!("failed to load state log for notifications: {err:?}");
                return None;
            }
        };

        let segments =
            build_bucketed_segments(&entries, window_start, window_end, &bucket_config);
        log_debug!(
            "notification check over {} entries, {} segments",
            entries.len(),
            segments.len()
        );

        let notification = self
            .engine
            .lock()
            .await
            .check_buckets(&segments, window_end, now)?;

        if let Err(err) = self.db.log_notification(&notification).await {
            log_error!("failed to persist notification {}: {err:?}", notification.id);
        }

        if let Err(err) = self
            .sink
            .publish(EngineEvent::Notification(notification.clone()))
        {
            log_error!("failed to broadcast notification: {err:?}");
        }

        Some(notification)
    }
}

pub async fn notification_loop(
    worker: NotificationWorker,
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
                log_info!("notification loop shutting down");
                break;
            }
        }
    }
}
