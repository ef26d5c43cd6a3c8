pub mod notification;
pub mod segment;
pub mod snapshot;
pub mod state;

pub use notification::{Notification, NotificationType, UserAction};
pub use segment::{BucketedSegment, DailySummary, FocusBlock};
pub use snapshot::{CameraSnapshot, HeadPose, PcSnapshot};
pub use state::{
    BehaviorState, ClassificationResult, ClassificationSource, IntegratedState, StateLogEntry,
};
