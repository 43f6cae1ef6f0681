//! Length-prefixed clip container codec
//!
//! A container is a flat sequence of records:
//!
//! ```text
//! +----------------+----------------------+
//! | i16 LE length  | `length` payload     |
//! +----------------+----------------------+
//! ```
//!
//! Payloads are already-encoded audio frames and are never inspected.
//! The stream ends cleanly when end-of-input is hit before the first byte of
//! a length prefix. A record length must be positive; end-of-input is checked
//! first, so a clean end never counts as a zero-length record.

use crate::error::{Error, Result};
use std::io::{self, ErrorKind, Read, Write};
use std::sync::Arc;

/// One opaque, already-encoded audio frame
pub type Frame = Arc<[u8]>;

/// Ordered, immutable sequence of frames decoded from one clip
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameSequence {
    frames: Vec<Frame>,
}

impl FrameSequence {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self { frames }
    }

    /// Total record count, zero-length records included
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Frame> {
        self.frames.iter()
    }

    /// Frames that will actually reach the transport
    pub fn audible_count(&self) -> usize {
        self.frames.iter().filter(|f| !f.is_empty()).count()
    }

    /// Payload bytes across all frames
    pub fn payload_bytes(&self) -> usize {
        self.frames.iter().map(|f| f.len()).sum()
    }
}

impl<'a> IntoIterator for &'a FrameSequence {
    type Item = &'a Frame;
    type IntoIter = std::slice::Iter<'a, Frame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}

/// Decode a whole container from `reader`
///
/// `clip_id` is only used to label errors. Errors:
/// - zero or negative length prefix → [`Error::InvalidFrameLength`]
/// - truncated length prefix or payload, or any read failure → [`Error::Decode`]
pub fn read_frames<R: Read>(mut reader: R, clip_id: &str) -> Result<FrameSequence> {
    let mut frames = Vec::new();

    loop {
        let length = match read_length(&mut reader) {
            Ok(Some(length)) => length,
            Ok(None) => break,
            Err(source) => {
                return Err(Error::Decode {
                    clip_id: clip_id.to_string(),
                    frame_index: frames.len(),
                    source,
                })
            }
        };

        if length <= 0 {
            return Err(Error::InvalidFrameLength {
                clip_id: clip_id.to_string(),
                length,
                frame_index: frames.len(),
            });
        }

        let mut payload = vec![0u8; length as usize];
        reader.read_exact(&mut payload).map_err(|source| Error::Decode {
            clip_id: clip_id.to_string(),
            frame_index: frames.len(),
            source,
        })?;

        frames.push(Frame::from(payload));
    }

    Ok(FrameSequence::new(frames))
}

/// Read one length prefix; `Ok(None)` on clean end-of-input
fn read_length<R: Read>(reader: &mut R) -> io::Result<Option<i16>> {
    let mut buf = [0u8; 2];
    let mut filled = 0;

    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => {
                return Err(io::Error::new(
                    ErrorKind::UnexpectedEof,
                    "truncated frame length prefix",
                ))
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(Some(i16::from_le_bytes(buf)))
}

/// Append one record to `writer`
///
/// Empty frames and frames longer than `i16::MAX` bytes cannot be
/// represented and are rejected.
pub fn write_frame<W: Write>(writer: &mut W, frame: &[u8]) -> io::Result<()> {
    if frame.is_empty() {
        return Err(io::Error::new(
            ErrorKind::InvalidInput,
            "empty frame cannot be stored in a container",
        ));
    }

    let length = i16::try_from(frame.len()).map_err(|_| {
        io::Error::new(
            ErrorKind::InvalidInput,
            format!("frame of {} bytes exceeds container limit", frame.len()),
        )
    })?;

    writer.write_all(&length.to_le_bytes())?;
    writer.write_all(frame)
}

/// Write every frame of a sequence as a container
pub fn write_frames<'a, W, I>(writer: &mut W, frames: I) -> io::Result<()>
where
    W: Write,
    I: IntoIterator<Item = &'a [u8]>,
{
    for frame in frames {
        write_frame(writer, frame)?;
    }
    Ok(())
}
