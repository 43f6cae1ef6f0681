//! # clipcast Common Library
//!
//! Shared code for the clipcast workspace:
//! - Error types
//! - Bootstrap configuration (TOML) and path resolution
//! - Playback event types and the event bus

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
pub use events::{EventBus, PlaybackEvent};
