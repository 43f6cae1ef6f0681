//! Voice transport seam
//!
//! The playback engine only needs to join a destination, toggle the speaking
//! state and push frames. Real voice gateways live outside this crate and
//! implement these traits; [`ChannelGateway`] is the in-process
//! implementation used by the binary and the tests.

pub mod channel;

use crate::audio::Frame;
use crate::error::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

pub use channel::{ChannelConnection, ChannelGateway, TransmittedFrame};

/// A voice channel to stream clips into
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VoiceDestination {
    pub guild_id: String,
    pub channel_id: String,
}

impl VoiceDestination {
    pub fn new(guild_id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            guild_id: guild_id.into(),
            channel_id: channel_id.into(),
        }
    }
}

impl fmt::Display for VoiceDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.guild_id, self.channel_id)
    }
}

/// An established voice connection
///
/// Playback attempts serialize through the playback coordinator, so an
/// implementation never sees two attempts speaking at once.
#[async_trait]
pub trait VoiceConnection: Send + Sync {
    /// Mark the connection as (not) emitting audio
    async fn set_speaking(&self, speaking: bool) -> Result<()>;

    /// Push one frame; may wait for buffer space, fails if the connection is gone
    async fn send(&self, frame: Frame) -> Result<()>;
}

/// Opens voice connections
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    /// Join `destination`, reusing the existing connection if already joined
    async fn join(&self, destination: &VoiceDestination) -> Result<Arc<dyn VoiceConnection>>;
}
