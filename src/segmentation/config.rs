use chrono::Duration;

/// Tunables for the bucket aggregator.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketConfig {
    /// Fixed bucket width used for the majority vote.
    pub bucket_minutes: u32,

    /// Upper bound on the seconds any single log entry can credit, so one
    /// stale reading cannot dominate a bucket.
    pub max_entry_duration_secs: f64,

    /// Credit given to the final entry, which has no successor. Matches one
    /// integration tick.
    pub last_entry_secs: f64,
}

impl BucketConfig {
    pub fn with_bucket_minutes(bucket_minutes: u32) -> Self {
        Self {
            bucket_minutes,
            ..Self::default()
        }
    }

    pub fn bucket_width(&self) -> Duration {
        Duration::minutes(i64::from(self.bucket_minutes.max(1)))
    }

    pub fn bucket_width_ms(&self) -> i64 {
        self.bucket_width().num_milliseconds()
    }
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            bucket_minutes: 5,
            max_entry_duration_secs: 30.0,
            last_entry_secs: 5.0,
        }
    }
}
