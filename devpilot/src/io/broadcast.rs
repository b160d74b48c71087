//! Best-effort live updates for observers of a running task.
//!
//! Stores emit after every durable change. Emitting never fails the caller:
//! a broadcaster reports delivery with a bool and logs anything worse.

use std::sync::Mutex;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Full snapshot list for a project, sent after every state change.
pub const AGENT_STATE: &str = "agent-state";
/// A newly appended conversation message.
pub const SERVER_MESSAGE: &str = "server-message";
/// A browser capture: `{data, project_name}`.
pub const SCREENSHOT: &str = "screenshot";

pub trait Broadcaster: Send + Sync {
    /// Publish `payload` on `channel`. Returns whether anyone received it.
    fn emit(&self, channel: &str, payload: &Value) -> bool;
}

/// One published update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveEvent {
    pub channel: String,
    pub payload: Value,
}

/// Fan-out over a `tokio::sync::broadcast` channel.
///
/// Sending is synchronous, so this works from the blocking orchestrator.
/// Slow subscribers lag and lose the oldest events rather than blocking.
pub struct ChannelBroadcaster {
    tx: broadcast::Sender<LiveEvent>,
}

impl ChannelBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.tx.subscribe()
    }
}

impl Broadcaster for ChannelBroadcaster {
    fn emit(&self, channel: &str, payload: &Value) -> bool {
        let event = LiveEvent {
            channel: channel.to_string(),
            payload: payload.clone(),
        };
        match self.tx.send(event) {
            Ok(receivers) => {
                debug!(channel, receivers, "emitted live update");
                true
            }
            Err(_) => {
                debug!(channel, "no live update subscribers");
                false
            }
        }
    }
}

/// Discards every update.
pub struct NullBroadcaster;

impl Broadcaster for NullBroadcaster {
    fn emit(&self, _channel: &str, _payload: &Value) -> bool {
        false
    }
}

/// Keeps every update in memory.
#[derive(Default)]
pub struct RecordingBroadcaster {
    events: Mutex<Vec<LiveEvent>>,
}

impl RecordingBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LiveEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn channel_events(&self, channel: &str) -> Vec<Value> {
        self.events()
            .into_iter()
            .filter(|event| event.channel == channel)
            .map(|event| event.payload)
            .collect()
    }
}

impl Broadcaster for RecordingBroadcaster {
    fn emit(&self, channel: &str, payload: &Value) -> bool {
        match self.events.lock() {
            Ok(mut events) => {
                events.push(LiveEvent {
                    channel: channel.to_string(),
                    payload: payload.clone(),
                });
                true
            }
            Err(_) => {
                warn!(channel, "recording broadcaster lock poisoned");
                false
            }
        }
    }
}
