pub mod controller;
pub mod loop_worker;
pub mod snapshot_store;

pub use controller::SensingController;
pub use loop_worker::{integration_loop, IntegrationWorker};
pub use snapshot_store::SnapshotStore;
