pub mod algorithm;
pub mod config;
pub mod daily;

pub use algorithm::{build_bucketed_segments, floor_to_bucket};
pub use config::BucketConfig;
pub use daily::{compute_daily_stats, extract_focus_blocks, summarize_day};
