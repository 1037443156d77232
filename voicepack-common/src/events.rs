//! Event types and the broadcast event bus
//!
//! Every status change, download progress update and synthesis failure is
//! published as a [`VoicePackEvent`] on an [`EventBus`]. Subscribers (the SSE
//! endpoint, the CLI progress printer, tests) each get their own receiver.

use crate::types::{Mode, PackageStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Transport state of the playback clock
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Stopped,
    Playing,
    Seeking,
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Stopped => write!(f, "stopped"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Seeking => write!(f, "seeking"),
        }
    }
}

/// Events published by the voicepack services
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VoicePackEvent {
    /// Reconciliation or a download run produced a new package status
    PackageStatusChanged {
        language: String,
        voice: String,
        mode: Mode,
        status: PackageStatus,
        timestamp: DateTime<Utc>,
    },

    /// Aggregate byte progress of a download run
    DownloadProgress {
        run_id: Uuid,
        language: String,
        voice: String,
        mode: Mode,
        received_bytes: u64,
        expected_bytes: u64,
        ratio: f64,
        timestamp: DateTime<Utc>,
    },

    /// One component was reassembled and committed to its store
    ComponentSaved {
        run_id: Uuid,
        language: String,
        voice: String,
        component: String,
        version: String,
        timestamp: DateTime<Utc>,
    },

    /// A download run joined all of its requests
    DownloadFinished {
        run_id: Uuid,
        language: String,
        voice: String,
        mode: Mode,
        status: PackageStatus,
        saved: Vec<String>,
        failed: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// A sentence could not be synthesized
    SynthesisFailed {
        language: String,
        voice: String,
        mode: Mode,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// The playback clock changed transport state
    PlaybackStateChanged {
        old_state: PlaybackState,
        new_state: PlaybackState,
        timestamp: DateTime<Utc>,
    },
}

impl VoicePackEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            VoicePackEvent::PackageStatusChanged { .. } => "PackageStatusChanged",
            VoicePackEvent::DownloadProgress { .. } => "DownloadProgress",
            VoicePackEvent::ComponentSaved { .. } => "ComponentSaved",
            VoicePackEvent::DownloadFinished { .. } => "DownloadFinished",
            VoicePackEvent::SynthesisFailed { .. } => "SynthesisFailed",
            VoicePackEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
        }
    }
}

/// Broadcast bus for [`VoicePackEvent`]s
///
/// Cloning the bus clones the sender; all clones publish to the same
/// subscribers.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<VoicePackEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Slow subscribers lag and lose the oldest events once `capacity` is
    /// exceeded.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<VoicePackEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: VoicePackEvent,
    ) -> Result<usize, broadcast::error::SendError<VoicePackEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: VoicePackEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_event(status: PackageStatus) -> VoicePackEvent {
        VoicePackEvent::PackageStatusChanged {
            language: "yue".to_string(),
            voice: "female".to_string(),
            mode: Mode::LocalSplice,
            status,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_emit_without_subscribers_fails() {
        let bus = EventBus::new(10);
        assert!(bus.emit(status_event(PackageStatus::Latest)).is_err());
        // Lossy emit must not panic either
        bus.emit_lossy(status_event(PackageStatus::Latest));
    }

    #[tokio::test]
    async fn test_subscriber_receives_events_in_order() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();

        bus.emit(status_event(PackageStatus::GatheringInfo)).unwrap();
        bus.emit(status_event(PackageStatus::Incomplete)).unwrap();

        for expected in [PackageStatus::GatheringInfo, PackageStatus::Incomplete] {
            match rx.recv().await.unwrap() {
                VoicePackEvent::PackageStatusChanged { status, .. } => assert_eq!(status, expected),
                other => panic!("unexpected event: {:?}", other),
            }
        }
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_event_json_is_tagged() {
        let json = serde_json::to_value(status_event(PackageStatus::Latest)).unwrap();
        assert_eq!(json["type"], "PackageStatusChanged");
        assert_eq!(json["status"], "latest");
        assert_eq!(json["mode"], "lightweight");
    }
}
