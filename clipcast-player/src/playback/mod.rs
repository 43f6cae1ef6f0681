//! Clip caching, single-slot coordination and frame streaming

pub mod coordinator;
pub mod engine;
pub mod frame_store;

pub use coordinator::{PlaybackCoordinator, PlaybackPermit};
pub use engine::{PlaybackEngine, PlaybackOutcome};
pub use frame_store::{ClipSource, DiskClipSource, FrameStore};
