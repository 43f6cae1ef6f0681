//! Test helpers for clipcast-player integration tests
//!
//! Provides:
//! - ClipDir: temporary data folder with clip container fixtures
//! - TestRig: engine wired to a ChannelGateway with the output exposed
//! - FailingGateway: gateway whose joins always fail

#![allow(dead_code)]

use async_trait::async_trait;
use clipcast_player::audio::write_frames;
use clipcast_player::error::{Error, Result};
use clipcast_player::playback::{FrameStore, PlaybackCoordinator, PlaybackEngine};
use clipcast_player::state::SharedState;
use clipcast_player::transport::{
    ChannelGateway, TransmittedFrame, VoiceConnection, VoiceDestination, VoiceGateway,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

/// Temporary data folder holding `<name>.dca` fixtures
pub struct ClipDir {
    dir: TempDir,
}

impl ClipDir {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a clip from raw frame payloads
    pub fn write_clip(&self, name: &str, frames: &[Vec<u8>]) -> PathBuf {
        let mut bytes = Vec::new();
        write_frames(&mut bytes, frames.iter().map(Vec::as_slice))
            .expect("Failed to encode clip");
        self.write_raw(name, &bytes)
    }

    /// Write a clip whose frames are all `marker` repeated, one byte per frame index
    ///
    /// Frame `i` is `[marker, i as u8]` so tests can tell clips and positions apart.
    pub fn write_marked_clip(&self, name: &str, marker: u8, frame_count: usize) -> PathBuf {
        let frames: Vec<Vec<u8>> = (0..frame_count).map(|i| vec![marker, i as u8]).collect();
        self.write_clip(name, &frames)
    }

    /// Write arbitrary bytes as a clip file
    pub fn write_raw(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.dir.path().join(format!("{}.dca", name));
        std::fs::write(&path, bytes).expect("Failed to write clip");
        path
    }
}

pub fn destination() -> VoiceDestination {
    VoiceDestination::new("guild", "voice")
}

/// Engine plus everything a test wants to observe
pub struct TestRig {
    pub engine: Arc<PlaybackEngine>,
    pub frame_store: Arc<FrameStore>,
    pub gateway: Arc<ChannelGateway>,
    pub coordinator: Arc<PlaybackCoordinator>,
    pub state: Arc<SharedState>,
    pub output: mpsc::Receiver<TransmittedFrame>,
}

impl TestRig {
    /// Engine over `clips` with the given grace period and output buffer size
    pub fn new(clips: &ClipDir, grace_play_period: usize, output_buffer: usize) -> Self {
        let (gateway, output) = ChannelGateway::new(output_buffer);
        let gateway = Arc::new(gateway);
        let coordinator = Arc::new(PlaybackCoordinator::new());
        let state = Arc::new(SharedState::new());
        let frame_store = Arc::new(FrameStore::new(clips.path(), "dca"));
        let engine = Arc::new(PlaybackEngine::new(
            Arc::clone(&gateway) as Arc<dyn VoiceGateway>,
            Arc::clone(&frame_store),
            Arc::clone(&coordinator),
            Arc::clone(&state),
            grace_play_period,
        ));

        Self {
            engine,
            frame_store,
            gateway,
            coordinator,
            state,
            output,
        }
    }

    /// Receive the next transmitted frame, failing the test after a timeout
    pub async fn next_frame(&mut self) -> Vec<u8> {
        tokio::time::timeout(Duration::from_secs(5), self.output.recv())
            .await
            .expect("Timed out waiting for a frame")
            .expect("Frame output closed")
            .frame
            .to_vec()
    }

    /// Receive frames until none arrives for `idle`
    pub async fn drain(&mut self, idle: Duration) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        while let Ok(Some(transmitted)) = tokio::time::timeout(idle, self.output.recv()).await {
            frames.push(transmitted.frame.to_vec());
        }
        frames
    }

    /// Wait until `count` attempts are queued on the coordinator
    pub async fn wait_for_waiters(&self, count: usize) {
        for _ in 0..500 {
            if self.coordinator.waiting() == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!(
            "Expected {} waiting attempts, saw {}",
            count,
            self.coordinator.waiting()
        );
    }
}

/// Gateway that refuses every join
pub struct FailingGateway;

#[async_trait]
impl VoiceGateway for FailingGateway {
    async fn join(&self, destination: &VoiceDestination) -> Result<Arc<dyn VoiceConnection>> {
        Err(Error::TransportJoin {
            destination: destination.to_string(),
            reason: "voice gateway unavailable".to_string(),
        })
    }
}

/// Count how many frames in `frames` start with `marker`
pub fn count_marked(frames: &[Vec<u8>], marker: u8) -> usize {
    frames.iter().filter(|f| f.first() == Some(&marker)).count()
}

/// Number of times consecutive frames switch from one clip marker to another
pub fn marker_switches(frames: &[Vec<u8>]) -> usize {
    frames
        .windows(2)
        .filter(|pair| pair[0].first() != pair[1].first())
        .count()
}
