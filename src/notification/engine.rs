//! Rate-limited notification decisions over bucketed history.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Local, NaiveDate, Utc};

use crate::models::{BehaviorState, BucketedSegment, Notification, NotificationType};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationConfig {
    pub bucket_minutes: u32,
    pub drowsy_trigger_buckets: usize,
    pub distracted_trigger_buckets: usize,
    pub over_focus_window_buckets: usize,
    pub over_focus_min_focused_buckets: usize,
    pub drowsy_cooldown_minutes: u32,
    pub distracted_cooldown_minutes: u32,
    pub over_focus_cooldown_minutes: u32,
    pub max_notifications_per_day: u32,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            bucket_minutes: 5,
            drowsy_trigger_buckets: 2,
            distracted_trigger_buckets: 2,
            over_focus_window_buckets: 18,
            over_focus_min_focused_buckets: 16,
            drowsy_cooldown_minutes: 15,
            distracted_cooldown_minutes: 20,
            over_focus_cooldown_minutes: 30,
            max_notifications_per_day: 6,
        }
    }
}

impl NotificationConfig {
    pub fn cooldown(&self, notification_type: NotificationType) -> Duration {
        let minutes = match notification_type {
            NotificationType::Drowsy => self.drowsy_cooldown_minutes,
            NotificationType::Distracted => self.distracted_cooldown_minutes,
            NotificationType::OverFocus => self.over_focus_cooldown_minutes,
        };
        Duration::minutes(i64::from(minutes))
    }

    fn bucket_width(&self) -> Duration {
        Duration::minutes(i64::from(self.bucket_minutes.max(1)))
    }

    /// Longest stretch of history any trigger looks at.
    fn lookback_buckets(&self) -> usize {
        self.over_focus_window_buckets
            .max(self.drowsy_trigger_buckets)
            .max(self.distracted_trigger_buckets)
    }
}

/// Per-bucket winning state, oldest first; `None` marks a bucket with no data.
pub type BucketTimeline = Vec<Option<BehaviorState>>;

/// Expand merged segments back into one slot per bucket up to `window_end`.
///
/// Gaps between segments, and between the last segment and `window_end`,
/// become `None` slots. Only the trailing `max_len` slots are kept.
pub fn expand_timeline(
    segments: &[BucketedSegment],
    window_end: DateTime<Utc>,
    bucket_width: Duration,
    max_len: usize,
) -> BucketTimeline {
    let width_ms = bucket_width.num_milliseconds().max(1) as f64;
    let slots_between = |from: DateTime<Utc>, to: DateTime<Utc>| -> usize {
        let ms = (to - from).num_milliseconds().max(0) as f64;
        ((ms / width_ms).round() as usize).min(max_len)
    };

    let mut timeline: BucketTimeline = Vec::new();
    let mut cursor: Option<DateTime<Utc>> = None;

    for segment in segments {
        if let Some(previous_end) = cursor {
            timeline.extend(std::iter::repeat(None).take(slots_between(previous_end, segment.start_time)));
        }
        let buckets = slots_between(segment.start_time, segment.end_time).max(1);
        timeline.extend(std::iter::repeat(Some(segment.state)).take(buckets));
        cursor = Some(segment.end_time);
    }

    if let Some(last_end) = cursor {
        timeline.extend(std::iter::repeat(None).take(slots_between(last_end, window_end)));
    }

    if timeline.len() > max_len {
        timeline.drain(..timeline.len() - max_len);
    }
    timeline
}

fn trailing_all(timeline: &BucketTimeline, count: usize, state: BehaviorState) -> bool {
    count > 0
        && timeline.len() >= count
        && timeline[timeline.len() - count..]
            .iter()
            .all(|slot| *slot == Some(state))
}

fn trailing_count(timeline: &BucketTimeline, window: usize, state: BehaviorState) -> usize {
    let start = timeline.len().saturating_sub(window);
    timeline[start..]
        .iter()
        .filter(|slot| **slot == Some(state))
        .count()
}

/// Which notification types the timeline qualifies for, in priority order.
pub fn qualifying_types(timeline: &BucketTimeline, config: &NotificationConfig) -> Vec<NotificationType> {
    NotificationType::PRIORITY
        .into_iter()
        .filter(|kind| match kind {
            NotificationType::Drowsy => {
                trailing_all(timeline, config.drowsy_trigger_buckets, BehaviorState::Drowsy)
            }
            NotificationType::Distracted => trailing_all(
                timeline,
                config.distracted_trigger_buckets,
                BehaviorState::Distracted,
            ),
            NotificationType::OverFocus => {
                config.over_focus_min_focused_buckets > 0
                    && trailing_count(
                        timeline,
                        config.over_focus_window_buckets,
                        BehaviorState::Focused,
                    ) >= config.over_focus_min_focused_buckets
            }
        })
        .collect()
}

/// Cooldown and daily-cap bookkeeping around `qualifying_types`.
pub struct NotificationEngine {
    config: NotificationConfig,
    last_fired: HashMap<NotificationType, DateTime<Utc>>,
    fired_today: Option<(NaiveDate, u32)>,
}

impl NotificationEngine {
    pub fn new(config: NotificationConfig) -> Self {
        Self {
            config,
            last_fired: HashMap::new(),
            fired_today: None,
        }
    }

    pub fn config(&self) -> &NotificationConfig {
        &self.config
    }

    /// Decide whether to notify, given segments covering the trailing window
    /// that ends at `window_end`. At most one notification per call.
    pub fn check_buckets(
        &mut self,
        segments: &[BucketedSegment],
        window_end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Option<Notification> {
        let timeline = expand_timeline(
            segments,
            window_end,
            self.config.bucket_width(),
            self.config.lookback_buckets(),
        );
        let candidates = qualifying_types(&timeline, &self.config);
        if candidates.is_empty() {
            return None;
        }

        let today = now.with_timezone(&Local).date_naive();
        if self.count_for(today) >= self.config.max_notifications_per_day {
            log_debug!("daily notification cap reached, skipping {:?}", candidates);
            return None;
        }

        let chosen = candidates
            .into_iter()
            .find(|kind| !self.on_cooldown(*kind, now))?;

        self.last_fired.insert(chosen, now);
        let count = self.count_for(today) + 1;
        self.fired_today = Some((today, count));

        log_info!(
            "notification triggered: {} (total today: {})",
            chosen.as_str(),
            count
        );
        Some(Notification::new(chosen, now))
    }

    /// Swap thresholds in place. Cooldown clocks and the daily count carry
    /// over, measured against the new durations.
    pub fn set_config(&mut self, config: NotificationConfig) {
        self.config = config;
    }

    /// Forget every cooldown clock. The daily count is kept.
    pub fn reset(&mut self) {
        self.last_fired.clear();
    }

    pub fn on_cooldown(&self, notification_type: NotificationType, now: DateTime<Utc>) -> bool {
        self.last_fired
            .get(&notification_type)
            .map(|fired| now - *fired < self.config.cooldown(notification_type))
            .unwrap_or(false)
    }

    fn count_for(&self, day: NaiveDate) -> u32 {
        match self.fired_today {
            Some((date, count)) if date == day => count,
            _ => 0,
        }
    }
}
