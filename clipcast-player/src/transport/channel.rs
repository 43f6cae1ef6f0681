//! In-process voice transport over a bounded tokio channel
//!
//! Every frame sent on any connection is delivered, tagged with its
//! destination, to the single receiver returned by [`ChannelGateway::new`].
//! The channel bound provides send backpressure; dropping the receiver
//! breaks every connection.

use super::{VoiceConnection, VoiceDestination, VoiceGateway};
use crate::audio::Frame;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

/// A frame leaving the process
#[derive(Debug, Clone)]
pub struct TransmittedFrame {
    pub destination: VoiceDestination,
    pub frame: Frame,
}

/// Gateway handing out channel-backed connections, one per destination
pub struct ChannelGateway {
    output: mpsc::Sender<TransmittedFrame>,
    connections: Mutex<HashMap<VoiceDestination, Arc<ChannelConnection>>>,
}

impl ChannelGateway {
    /// Create a gateway whose output buffers up to `capacity` frames
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<TransmittedFrame>) {
        let (output, rx) = mpsc::channel(capacity);
        let gateway = Self {
            output,
            connections: Mutex::new(HashMap::new()),
        };
        (gateway, rx)
    }

    /// Connection for a destination, if it has been joined
    pub async fn connection(&self, destination: &VoiceDestination) -> Option<Arc<ChannelConnection>> {
        self.connections.lock().await.get(destination).cloned()
    }

    pub async fn joined_count(&self) -> usize {
        self.connections.lock().await.len()
    }
}

#[async_trait]
impl VoiceGateway for ChannelGateway {
    async fn join(&self, destination: &VoiceDestination) -> Result<Arc<dyn VoiceConnection>> {
        let mut connections = self.connections.lock().await;

        if let Some(existing) = connections.get(destination) {
            if !existing.is_closed() {
                return Ok(Arc::clone(existing) as Arc<dyn VoiceConnection>);
            }
        }

        if self.output.is_closed() {
            return Err(Error::TransportJoin {
                destination: destination.to_string(),
                reason: "frame output is closed".to_string(),
            });
        }

        info!("Joined voice destination {}", destination);
        let connection = Arc::new(ChannelConnection {
            destination: destination.clone(),
            output: self.output.clone(),
            speaking: AtomicBool::new(false),
            frames_sent: AtomicU64::new(0),
        });
        connections.insert(destination.clone(), Arc::clone(&connection));
        Ok(connection as Arc<dyn VoiceConnection>)
    }
}

/// One joined destination
pub struct ChannelConnection {
    destination: VoiceDestination,
    output: mpsc::Sender<TransmittedFrame>,
    speaking: AtomicBool,
    frames_sent: AtomicU64,
}

impl ChannelConnection {
    pub fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    fn is_closed(&self) -> bool {
        self.output.is_closed()
    }
}

#[async_trait]
impl VoiceConnection for ChannelConnection {
    async fn set_speaking(&self, speaking: bool) -> Result<()> {
        let was = self.speaking.swap(speaking, Ordering::SeqCst);
        if was != speaking {
            debug!("{} speaking: {}", self.destination, speaking);
        }
        Ok(())
    }

    async fn send(&self, frame: Frame) -> Result<()> {
        self.output
            .send(TransmittedFrame {
                destination: self.destination.clone(),
                frame,
            })
            .await
            .map_err(|_| {
                Error::TransportSend(format!("connection to {} is closed", self.destination))
            })?;
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
