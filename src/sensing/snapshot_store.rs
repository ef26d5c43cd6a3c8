//! Latest camera and PC readings, shared between producers and the loops.

use std::sync::Arc;

use tokio::sync::watch;

use crate::models::{CameraSnapshot, PcSnapshot};

/// Single-writer, multi-reader cells for the two signal streams.
///
/// Each publish swaps the whole value, so readers see either the old or the
/// new snapshot and never a mix. The two streams are not aligned in time.
#[derive(Clone)]
pub struct SnapshotStore {
    camera: Arc<watch::Sender<Option<CameraSnapshot>>>,
    pc: Arc<watch::Sender<Option<PcSnapshot>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        let (camera, _) = watch::channel(None);
        let (pc, _) = watch::channel(None);
        Self {
            camera: Arc::new(camera),
            pc: Arc::new(pc),
        }
    }

    pub fn publish_camera(&self, snapshot: Option<CameraSnapshot>) {
        self.camera.send_replace(snapshot);
    }

    pub fn publish_pc(&self, snapshot: Option<PcSnapshot>) {
        self.pc.send_replace(snapshot);
    }

    pub fn latest_camera(&self) -> Option<CameraSnapshot> {
        self.camera.borrow().clone()
    }

    pub fn latest_pc(&self) -> Option<PcSnapshot> {
        self.pc.borrow().clone()
    }

    /// Both snapshots, read back to back.
    pub fn latest(&self) -> (Option<CameraSnapshot>, Option<PcSnapshot>) {
        (self.latest_camera(), self.latest_pc())
    }

    /// Forget both readings, e.g. after the machine wakes from sleep.
    pub fn clear(&self) {
        self.publish_camera(None);
        self.publish_pc(None);
    }

    pub fn watch_camera(&self) -> watch::Receiver<Option<CameraSnapshot>> {
        self.camera.subscribe()
    }

    pub fn watch_pc(&self) -> watch::Receiver<Option<PcSnapshot>> {
        self.pc.subscribe()
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}
