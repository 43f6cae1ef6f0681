//! Clip container decoding and encoding

pub mod container;

pub use container::{read_frames, write_frame, write_frames, Frame, FrameSequence};
