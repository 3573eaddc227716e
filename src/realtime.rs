//! The "radio station": one broadcast channel shared by every WebSocket
//! session. Messages are wrapped in an envelope naming their target channel;
//! each session forwards only the traffic addressed to it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Live operations channel for ambulance/coordinator dispatch.
pub const COORDINATOR_CHANNEL: &str = "coordinators";

pub fn caregiver_channel(caregiver_id: Uuid) -> String {
    format!("caregiver:{caregiver_id}")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub channel: String,
    pub payload: Value,
}

#[derive(Clone)]
pub struct RealtimeHub {
    tx: broadcast::Sender<String>,
}

impl RealtimeHub {
    /// Capacity bounds the backlog; the oldest messages drop first if the
    /// system gets overwhelmed.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    /// Fire-and-forget: returns whether any live session picked it up.
    /// No delivery guarantee is part of the contract.
    pub fn push(&self, channel: &str, payload: Value) -> bool {
        let envelope = Envelope {
            channel: channel.to_string(),
            payload,
        };
        let text = match serde_json::to_string(&envelope) {
            Ok(text) => text,
            Err(err) => {
                tracing::error!(%err, channel, "failed to encode realtime envelope");
                return false;
            }
        };
        match self.tx.send(text) {
            Ok(receivers) => {
                tracing::debug!(channel, receivers, "realtime push");
                true
            }
            Err(_) => {
                tracing::debug!(channel, "realtime push had no live sessions");
                false
            }
        }
    }

    /// Best-effort only: a dead coordinator channel is logged, never an
    /// error — the persisted emergency alert remains the source of truth.
    pub fn broadcast_to_coordinators(&self, payload: Value) {
        if !self.push(COORDINATOR_CHANNEL, payload) {
            tracing::warn!("coordinator broadcast reached no live sessions");
        }
    }
}
