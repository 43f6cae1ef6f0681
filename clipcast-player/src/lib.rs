//! # clipcast Player Library (clipcast-player)
//!
//! Soundboard playback core: streams pre-encoded clips into a voice
//! connection when chat messages contain trigger tokens.
//!
//! **Architecture:**
//! - [`audio`]: length-prefixed clip container codec
//! - [`playback`]: frame cache, single-slot coordinator, streaming engine
//! - [`dispatch`]: trigger token extraction and fire-and-forget launch
//! - [`transport`]: voice gateway seam plus an in-process channel transport

pub mod audio;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod playback;
pub mod state;
pub mod transport;

pub use error::{Error, Result};
pub use state::SharedState;
