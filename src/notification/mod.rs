pub mod engine;
pub mod loop_worker;

pub use engine::{NotificationConfig, NotificationEngine};
pub use loop_worker::{notification_loop, NotificationWorker};
