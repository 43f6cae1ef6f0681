//! Trigger dispatch
//!
//! Turns inbound chat messages into playback attempts. Trigger tokens are the
//! text between pairs of delimiters (`"hello :laugh: world"` → `laugh`), and
//! each mapped token launches its own fire-and-forget playback task.

use crate::error::Result;
use crate::playback::{PlaybackEngine, PlaybackOutcome};
use crate::state::SharedState;
use crate::transport::VoiceDestination;
use clipcast_common::events::PlaybackEvent;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// A message-like event from the event source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Author of the message
    pub origin_id: String,
    /// Channel the message was posted in
    pub channel_id: String,
    /// Message text
    pub content: String,
}

impl InboundMessage {
    pub fn new(
        origin_id: impl Into<String>,
        channel_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            origin_id: origin_id.into(),
            channel_id: channel_id.into(),
            content: content.into(),
        }
    }

    /// Parse a `<origin_id> <channel_id> <text...>` line
    ///
    /// Returns `None` when either id is missing. The text may be empty.
    pub fn parse_line(line: &str) -> Option<Self> {
        let mut parts = line.trim_start().splitn(3, char::is_whitespace);
        let origin_id = parts.next().filter(|s| !s.is_empty())?;
        let channel_id = parts.next().filter(|s| !s.is_empty())?;
        let content = parts.next().unwrap_or("");
        Some(Self::new(origin_id, channel_id, content))
    }
}

/// Static trigger token → clip identifier map
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerMapping {
    clips: HashMap<String, String>,
}

impl TriggerMapping {
    pub fn new(clips: HashMap<String, String>) -> Self {
        Self { clips }
    }

    pub fn resolve(&self, token: &str) -> Option<&str> {
        self.clips.get(token).map(String::as_str)
    }

    /// Distinct clip identifiers referenced by the map, sorted
    pub fn clip_ids(&self) -> BTreeSet<&str> {
        self.clips.values().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TriggerMapping {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self::new(
            iter.into_iter()
                .map(|(token, clip)| (token.into(), clip.into()))
                .collect(),
        )
    }
}

/// Trigger tokens in `content`: the odd-indexed segments after splitting on
/// `delimiter`. Fewer than two delimiters means no tokens.
pub fn extract_tokens<'a>(content: &'a str, delimiter: &str) -> Vec<&'a str> {
    if delimiter.is_empty() || content.matches(delimiter).count() < 2 {
        return Vec::new();
    }

    content.split(delimiter).skip(1).step_by(2).collect()
}

/// Dispatcher settings
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Our own identity; messages from it are ignored
    pub self_id: Option<String>,
    /// Channels allowed to trigger clips
    pub allowed_channels: HashSet<String>,
    /// Where clips are played
    pub destination: VoiceDestination,
    /// Token delimiter
    pub delimiter: String,
}

/// Launches playback attempts for incoming messages
pub struct TriggerDispatcher {
    engine: Arc<PlaybackEngine>,
    mapping: TriggerMapping,
    settings: DispatchSettings,
    state: Arc<SharedState>,
}

impl TriggerDispatcher {
    pub fn new(
        engine: Arc<PlaybackEngine>,
        mapping: TriggerMapping,
        settings: DispatchSettings,
    ) -> Self {
        let state = Arc::clone(engine.state());
        Self {
            engine,
            mapping,
            settings,
            state,
        }
    }

    /// Whether a message may trigger clips at all
    pub fn accepts(&self, message: &InboundMessage) -> bool {
        if self.settings.self_id.as_deref() == Some(message.origin_id.as_str()) {
            return false;
        }
        self.settings.allowed_channels.contains(&message.channel_id)
    }

    /// Clips triggered by `content`, in token order
    pub fn clips_for_content(&self, content: &str) -> Vec<String> {
        extract_tokens(content, &self.settings.delimiter)
            .into_iter()
            .filter_map(|token| self.mapping.resolve(token))
            .map(str::to_string)
            .collect()
    }

    /// Launch one playback task per triggered clip
    ///
    /// Tasks run independently; failures are logged and never affect sibling
    /// attempts. The returned handles may be dropped.
    pub fn on_event(&self, message: &InboundMessage) -> Vec<JoinHandle<Result<PlaybackOutcome>>> {
        if !self.accepts(message) {
            return Vec::new();
        }

        debug!("Got message in {}: {}", message.channel_id, message.content);

        let clip_ids = self.clips_for_content(&message.content);
        if clip_ids.is_empty() {
            return Vec::new();
        }

        self.state.broadcast_event(PlaybackEvent::TriggerMatched {
            channel_id: message.channel_id.clone(),
            clip_ids: clip_ids.clone(),
            timestamp: chrono::Utc::now(),
        });

        clip_ids
            .into_iter()
            .map(|clip_id| {
                let engine = Arc::clone(&self.engine);
                let destination = self.settings.destination.clone();
                tokio::spawn(async move {
                    let result = engine.play(&destination, &clip_id).await;
                    if let Err(e) = &result {
                        warn!("Could not play clip {}: {}", clip_id, e);
                    }
                    result
                })
            })
            .collect()
    }
}
