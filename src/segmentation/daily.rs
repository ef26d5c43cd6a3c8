//! Daily aggregation on top of the bucket aggregator.

use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};

use crate::db::Database;
use crate::models::{
    BehaviorState, BucketedSegment, DailySummary, FocusBlock, Notification, UserAction,
};
use crate::segmentation::{build_bucketed_segments, BucketConfig};

/// UTC bounds `[start, end)` of a local calendar day.
pub fn local_day_bounds(date: NaiveDate) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let next = date
        .succ_opt()
        .ok_or_else(|| anyhow!("no calendar day after {date}"))?;
    Ok((local_midnight(date)?, local_midnight(next)?))
}

fn local_midnight(date: NaiveDate) -> Result<DateTime<Utc>> {
    let naive = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow!("invalid midnight for {date}"))?;
    // `earliest` covers DST transitions that skip or repeat midnight.
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| anyhow!("local midnight does not exist on {date}"))
}

/// Focused segments at least `min_minutes` long. Segments are already
/// merged, so each qualifying one is a complete block.
pub fn extract_focus_blocks(segments: &[BucketedSegment], min_minutes: f64) -> Vec<FocusBlock> {
    segments
        .iter()
        .filter(|segment| {
            segment.state == BehaviorState::Focused && segment.duration_minutes >= min_minutes
        })
        .map(|segment| FocusBlock {
            start_time: segment.start_time,
            end_time: segment.end_time,
            duration_minutes: segment.duration_minutes,
        })
        .collect()
}

pub fn summarize_day(
    date: NaiveDate,
    segments: &[BucketedSegment],
    notifications: &[Notification],
    min_focus_block_minutes: f64,
) -> DailySummary {
    let mut state_minutes: BTreeMap<BehaviorState, f64> =
        BehaviorState::ALL.iter().map(|state| (*state, 0.0)).collect();
    for segment in segments {
        *state_minutes.entry(segment.state).or_insert(0.0) += segment.duration_minutes;
    }

    let notification_accepted = notifications
        .iter()
        .filter(|n| n.user_action == Some(UserAction::Accepted))
        .count() as u32;

    DailySummary {
        date,
        state_minutes,
        notification_count: notifications.len() as u32,
        notification_accepted,
        focus_blocks: extract_focus_blocks(segments, min_focus_block_minutes),
    }
}

/// Rebuild the summary for `date` from the persisted logs.
pub async fn compute_daily_stats(
    db: &Database,
    date: NaiveDate,
    config: &BucketConfig,
    min_focus_block_minutes: f64,
) -> Result<DailySummary> {
    let (start, end) = local_day_bounds(date)?;
    let entries = db.get_state_log(start, end).await?;
    let notifications = db.get_notifications(start, end).await?;

    let segments = build_bucketed_segments(&entries, start, end, config);
    Ok(summarize_day(
        date,
        &segments,
        &notifications,
        min_focus_block_minutes,
    ))
}

/// Total minutes of the day covered by any segment.
pub fn covered_minutes(summary: &DailySummary) -> f64 {
    summary.state_minutes.values().sum()
}
