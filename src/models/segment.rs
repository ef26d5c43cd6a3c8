use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::BehaviorState;

/// One or more adjacent buckets that share a winning state.
///
/// Derived on demand from the state log; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketedSegment {
    pub state: BehaviorState,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: f64,
    /// Credited seconds per state across all contributing buckets.
    pub breakdown: BTreeMap<BehaviorState, f64>,
}

impl BucketedSegment {
    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }

    pub fn breakdown_total_secs(&self) -> f64 {
        self.breakdown.values().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusBlock {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    /// Minutes per winning state, zero-filled for every state.
    pub state_minutes: BTreeMap<BehaviorState, f64>,
    pub notification_count: u32,
    pub notification_accepted: u32,
    pub focus_blocks: Vec<FocusBlock>,
}

impl DailySummary {
    pub fn minutes(&self, state: BehaviorState) -> f64 {
        self.state_minutes.get(&state).copied().unwrap_or(0.0)
    }
}
