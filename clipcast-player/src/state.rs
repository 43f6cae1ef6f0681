//! Shared playback state
//!
//! Event bus and lifetime counters shared by the engine, the dispatcher and
//! whatever observes them.

use clipcast_common::events::{EventBus, PlaybackEvent};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

/// Snapshot of the playback counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackStats {
    pub started: u64,
    pub completed: u64,
    pub preempted: u64,
    pub failed: u64,
}

/// Shared state accessible by all components
pub struct SharedState {
    events: EventBus,
    started: AtomicU64,
    completed: AtomicU64,
    preempted: AtomicU64,
    failed: AtomicU64,
}

impl SharedState {
    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    /// Create state whose event bus buffers `capacity` events per subscriber
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: EventBus::new(capacity),
            started: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            preempted: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Count and broadcast an event
    ///
    /// Having no subscribers is fine.
    pub fn broadcast_event(&self, event: PlaybackEvent) {
        let counter = match &event {
            PlaybackEvent::TriggerMatched { .. } => None,
            PlaybackEvent::PlaybackStarted { .. } => Some(&self.started),
            PlaybackEvent::PlaybackCompleted { .. } => Some(&self.completed),
            PlaybackEvent::PlaybackPreempted { .. } => Some(&self.preempted),
            PlaybackEvent::PlaybackFailed { .. } => Some(&self.failed),
        };
        if let Some(counter) = counter {
            counter.fetch_add(1, Ordering::Relaxed);
        }
        self.events.emit_lossy(event);
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    pub fn stats(&self) -> PlaybackStats {
        PlaybackStats {
            started: self.started.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            preempted: self.preempted.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}
