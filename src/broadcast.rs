//! In-process fan-out of engine events to whatever transport is attached.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::models::{IntegratedState, Notification};

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineEvent {
    State(IntegratedState),
    Notification(Notification),
}

/// Fire-and-forget event sink used by both loops.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: EngineEvent) -> Result<()>;
}

#[derive(Clone)]
pub struct BroadcastHub {
    sender: broadcast::Sender<EngineEvent>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Slow subscribers lose the oldest events rather than blocking the loops.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for BroadcastHub {
    fn publish(&self, event: EngineEvent) -> Result<()> {
        // No subscriber is not an error; the event is simply dropped.
        let _ = self.sender.send(event);
        Ok(())
    }
}
