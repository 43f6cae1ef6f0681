//! Playback engine
//!
//! Streams one clip per call into a voice connection:
//!
//! ```text
//! join transport → load frames → acquire slot → speaking on
//!     → stream frames → speaking off + release slot
//! ```
//!
//! An attempt becomes interruptible once it has emitted `grace_play_period`
//! non-empty frames. From then on it checks the coordinator before every
//! frame and stops as soon as a newer request is waiting, so at most one
//! more frame goes out after the request becomes visible.

use crate::audio::FrameSequence;
use crate::error::Result;
use crate::playback::coordinator::{PlaybackCoordinator, PlaybackPermit};
use crate::playback::frame_store::FrameStore;
use crate::state::SharedState;
use crate::transport::{VoiceConnection, VoiceDestination, VoiceGateway};
use clipcast_common::events::PlaybackEvent;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How a successful attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// Every frame was sent
    Completed { frames_sent: usize },
    /// Stopped early because a newer request was waiting
    Preempted { frames_sent: usize },
}

impl PlaybackOutcome {
    pub fn frames_sent(&self) -> usize {
        match self {
            PlaybackOutcome::Completed { frames_sent }
            | PlaybackOutcome::Preempted { frames_sent } => *frames_sent,
        }
    }
}

/// Joins clips to the voice transport, one at a time
pub struct PlaybackEngine {
    gateway: Arc<dyn VoiceGateway>,
    frame_store: Arc<FrameStore>,
    coordinator: Arc<PlaybackCoordinator>,
    state: Arc<SharedState>,
    /// Non-empty frames emitted before preemption is honoured
    grace_play_period: usize,
}

impl PlaybackEngine {
    pub fn new(
        gateway: Arc<dyn VoiceGateway>,
        frame_store: Arc<FrameStore>,
        coordinator: Arc<PlaybackCoordinator>,
        state: Arc<SharedState>,
        grace_play_period: usize,
    ) -> Self {
        Self {
            gateway,
            frame_store,
            coordinator,
            state,
            grace_play_period,
        }
    }

    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    /// Play `clip_id` into `destination`
    ///
    /// Waits while another clip holds the playback slot and signals it to
    /// stop. Being preempted is a normal outcome, not an error. Join, load
    /// and send failures are returned.
    pub async fn play(&self, destination: &VoiceDestination, clip_id: &str) -> Result<PlaybackOutcome> {
        let attempt_id = Uuid::new_v4();
        let result = self.run_attempt(attempt_id, destination, clip_id).await;

        if let Err(e) = &result {
            self.state.broadcast_event(PlaybackEvent::PlaybackFailed {
                attempt_id,
                clip_id: clip_id.to_string(),
                error: e.to_string(),
                timestamp: chrono::Utc::now(),
            });
        }

        result
    }

    async fn run_attempt(
        &self,
        attempt_id: Uuid,
        destination: &VoiceDestination,
        clip_id: &str,
    ) -> Result<PlaybackOutcome> {
        let connection = self.gateway.join(destination).await?;

        let frames = match self.frame_store.fetch(clip_id).await {
            Ok(frames) => frames,
            Err(e) => {
                warn!("Attempt {}: could not load clip {}: {}", attempt_id, clip_id, e);
                return Err(e);
            }
        };

        debug!("Attempt {} waiting for playback slot", attempt_id);
        let permit = self.coordinator.acquire().await;
        debug!("Attempt {} playing {} into {}", attempt_id, clip_id, destination);

        self.state.broadcast_event(PlaybackEvent::PlaybackStarted {
            attempt_id,
            clip_id: clip_id.to_string(),
            frame_count: frames.len(),
            timestamp: chrono::Utc::now(),
        });

        let session = SpeakingSession::start(Arc::clone(&connection), permit).await;

        let streamed = self
            .stream_frames(attempt_id, connection.as_ref(), &frames)
            .await;

        session.finish().await;

        match &streamed {
            Ok(PlaybackOutcome::Completed { frames_sent }) => {
                self.state.broadcast_event(PlaybackEvent::PlaybackCompleted {
                    attempt_id,
                    clip_id: clip_id.to_string(),
                    frames_sent: *frames_sent,
                    timestamp: chrono::Utc::now(),
                });
            }
            Ok(PlaybackOutcome::Preempted { frames_sent }) => {
                self.state.broadcast_event(PlaybackEvent::PlaybackPreempted {
                    attempt_id,
                    clip_id: clip_id.to_string(),
                    frames_sent: *frames_sent,
                    timestamp: chrono::Utc::now(),
                });
            }
            Err(e) => warn!("Attempt {}: streaming {} failed: {}", attempt_id, clip_id, e),
        }

        streamed
    }

    async fn stream_frames(
        &self,
        attempt_id: Uuid,
        connection: &dyn VoiceConnection,
        frames: &FrameSequence,
    ) -> Result<PlaybackOutcome> {
        let mut play_period = 0;

        for frame in frames {
            if frame.is_empty() {
                continue;
            }

            if play_period >= self.grace_play_period && self.coordinator.is_preemption_requested() {
                info!(
                    "Attempt {} interrupted by incoming request after {} frames",
                    attempt_id, play_period
                );
                return Ok(PlaybackOutcome::Preempted {
                    frames_sent: play_period,
                });
            }

            connection.send(Arc::clone(frame)).await?;
            play_period += 1;
        }

        info!("Attempt {} sent whole clip: {} frames", attempt_id, play_period);
        Ok(PlaybackOutcome::Completed {
            frames_sent: play_period,
        })
    }
}

/// A connection marked speaking plus the slot it was marked under
///
/// `finish` clears the speaking flag and then releases the slot. When an
/// attempt is dropped mid-stream the same pair runs on a spawned task, so the
/// slot never frees up while the connection is still marked speaking.
struct SpeakingSession {
    held: Option<(Arc<dyn VoiceConnection>, PlaybackPermit)>,
}

impl SpeakingSession {
    async fn start(connection: Arc<dyn VoiceConnection>, permit: PlaybackPermit) -> Self {
        if let Err(e) = connection.set_speaking(true).await {
            warn!("Could not mark connection as speaking: {}", e);
        }
        Self {
            held: Some((connection, permit)),
        }
    }

    async fn finish(mut self) {
        if let Some((connection, permit)) = self.held.take() {
            stop_speaking(connection.as_ref()).await;
            drop(permit);
        }
    }
}

impl Drop for SpeakingSession {
    fn drop(&mut self) {
        let Some((connection, permit)) = self.held.take() else {
            return;
        };

        debug!("Playback attempt dropped while speaking");
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    stop_speaking(connection.as_ref()).await;
                    drop(permit);
                });
            }
            Err(_) => warn!("No runtime to clear speaking state; releasing slot anyway"),
        }
    }
}

async fn stop_speaking(connection: &dyn VoiceConnection) {
    if let Err(e) = connection.set_speaking(false).await {
        warn!("Could not clear speaking state: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::Frame;
    use crate::transport::{ChannelGateway, VoiceDestination};

    fn engine_with_grace(
        grace_play_period: usize,
    ) -> (PlaybackEngine, tokio::sync::mpsc::Receiver<crate::transport::TransmittedFrame>) {
        let (gateway, output) = ChannelGateway::new(64);
        let engine = PlaybackEngine::new(
            Arc::new(gateway),
            Arc::new(FrameStore::new("clips", "dca")),
            Arc::new(PlaybackCoordinator::new()),
            Arc::new(SharedState::new()),
            grace_play_period,
        );
        (engine, output)
    }

    fn sequence(frames: &[&[u8]]) -> FrameSequence {
        FrameSequence::new(frames.iter().map(|f| Frame::from(*f)).collect())
    }

    #[tokio::test]
    async fn test_empty_frames_are_not_sent() {
        let (engine, mut output) = engine_with_grace(10);
        let connection = engine
            .gateway
            .join(&VoiceDestination::new("g", "v"))
            .await
            .unwrap();

        let frames = sequence(&[b"", b"a", b"", b"", b"b", b""]);
        let outcome = engine
            .stream_frames(Uuid::new_v4(), connection.as_ref(), &frames)
            .await
            .unwrap();

        assert_eq!(outcome, PlaybackOutcome::Completed { frames_sent: 2 });
        assert_eq!(&*output.recv().await.unwrap().frame, b"a");
        assert_eq!(&*output.recv().await.unwrap().frame, b"b");
        assert!(output.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_empty_frames_do_not_count_toward_grace() {
        let (engine, mut output) = engine_with_grace(2);
        let connection = engine
            .gateway
            .join(&VoiceDestination::new("g", "v"))
            .await
            .unwrap();

        let coordinator = Arc::clone(&engine.coordinator);
        let holder = coordinator.acquire().await;
        let waiter = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move {
                let _permit = coordinator.acquire().await;
            })
        };
        while coordinator.waiting() == 0 {
            tokio::task::yield_now().await;
        }

        // A request is already waiting, so only the grace period plays
        let frames = sequence(&[b"", b"", b"a", b"", b"b", b"c", b"d"]);
        let outcome = engine
            .stream_frames(Uuid::new_v4(), connection.as_ref(), &frames)
            .await
            .unwrap();
        assert_eq!(outcome, PlaybackOutcome::Preempted { frames_sent: 2 });

        drop(holder);
        waiter.await.unwrap();

        assert_eq!(&*output.recv().await.unwrap().frame, b"a");
        assert_eq!(&*output.recv().await.unwrap().frame, b"b");
        assert!(output.try_recv().is_err());
    }
}
