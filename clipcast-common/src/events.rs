//! Event types for the clipcast event system
//!
//! Provides the playback event definitions and the EventBus that carries them.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Playback lifecycle events
///
/// Every playback attempt emits `PlaybackStarted` once it holds the playback
/// lock, followed by exactly one of `PlaybackCompleted`, `PlaybackPreempted`
/// or `PlaybackFailed`. Attempts that fail before acquiring the lock emit
/// only `PlaybackFailed`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum PlaybackEvent {
    /// A message matched one or more trigger tokens
    TriggerMatched {
        /// Channel the message arrived on
        channel_id: String,
        /// Clips launched, in launch order
        clip_ids: Vec<String>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Attempt acquired the playback lock and started streaming
    PlaybackStarted {
        attempt_id: Uuid,
        clip_id: String,
        /// Frames in the clip, including zero-length entries
        frame_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Attempt streamed its whole clip
    PlaybackCompleted {
        attempt_id: Uuid,
        clip_id: String,
        frames_sent: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Attempt stopped early in favour of a newer request
    PlaybackPreempted {
        attempt_id: Uuid,
        clip_id: String,
        frames_sent: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Attempt failed (join, load or send error)
    PlaybackFailed {
        attempt_id: Uuid,
        clip_id: String,
        error: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl PlaybackEvent {
    /// Event type name as used in the serialized `type` tag
    pub fn event_type(&self) -> &'static str {
        match self {
            PlaybackEvent::TriggerMatched { .. } => "TriggerMatched",
            PlaybackEvent::PlaybackStarted { .. } => "PlaybackStarted",
            PlaybackEvent::PlaybackCompleted { .. } => "PlaybackCompleted",
            PlaybackEvent::PlaybackPreempted { .. } => "PlaybackPreempted",
            PlaybackEvent::PlaybackFailed { .. } => "PlaybackFailed",
        }
    }

    /// Attempt this event belongs to, if any
    pub fn attempt_id(&self) -> Option<Uuid> {
        match self {
            PlaybackEvent::TriggerMatched { .. } => None,
            PlaybackEvent::PlaybackStarted { attempt_id, .. }
            | PlaybackEvent::PlaybackCompleted { attempt_id, .. }
            | PlaybackEvent::PlaybackPreempted { attempt_id, .. }
            | PlaybackEvent::PlaybackFailed { attempt_id, .. } => Some(*attempt_id),
        }
    }
}

/// Central event distribution bus
///
/// Uses tokio::broadcast internally: publishing never blocks, slow
/// subscribers observe `Lagged` instead of stalling playback.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PlaybackEvent>,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring the no-subscriber case
    pub fn emit_lossy(&self, event: PlaybackEvent) {
        let _ = self.tx.send(event);
    }
}
