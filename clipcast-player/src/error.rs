//! Error types for clipcast-player
//!
//! Frame store and playback engine errors are returned to their caller.
//! The trigger dispatcher only logs them.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for clipcast-player
#[derive(Error, Debug)]
pub enum Error {
    /// Clip container file does not exist
    #[error("Clip not found: {clip_id} ({path})")]
    NotFound { clip_id: String, path: PathBuf },

    /// Record length prefix was negative
    #[error("Invalid frame length {length} in clip {clip_id} at frame {frame_index}")]
    InvalidFrameLength {
        clip_id: String,
        length: i16,
        /// Number of frames decoded before the bad record
        frame_index: usize,
    },

    /// Malformed container (truncated length prefix or payload)
    #[error("Failed to decode clip {clip_id} at frame {frame_index}: {source}")]
    Decode {
        clip_id: String,
        frame_index: usize,
        #[source]
        source: std::io::Error,
    },

    /// Other file I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Joining the voice destination failed
    #[error("Failed to join voice destination {destination}: {reason}")]
    TransportJoin { destination: String, reason: String },

    /// Sending a frame over the voice connection failed
    #[error("Failed to send frame: {0}")]
    TransportSend(String),

    /// Missing or invalid settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// Background task failed to run to completion
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<clipcast_common::Error> for Error {
    fn from(err: clipcast_common::Error) -> Self {
        match err {
            clipcast_common::Error::Io(e) => Error::Io(e),
            other => Error::Config(other.to_string()),
        }
    }
}

/// Convenience Result type using clipcast-player Error
pub type Result<T> = std::result::Result<T, Error>;
