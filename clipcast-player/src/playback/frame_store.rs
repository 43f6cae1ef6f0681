//! Frame Store
//!
//! Decodes clip containers into frame sequences and memoizes the result per
//! clip identifier for the lifetime of the store.
//!
//! Cache rules:
//! - An entry is published only after a clean decode; failed decodes leave
//!   no entry, so the next fetch reads the file again.
//! - Entries are never evicted or replaced. When two fetches race on the same
//!   uncached clip both may read the file, but the first published sequence
//!   wins and both callers receive that same `Arc`.

use crate::audio::container::{read_frames, FrameSequence};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Where clip bytes come from
///
/// Production uses [`DiskClipSource`]; tests substitute an in-memory source
/// to count reads.
pub trait ClipSource: Send + Sync + 'static {
    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + Send>>;
}

/// Reads clips from the local filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct DiskClipSource;

impl ClipSource for DiskClipSource {
    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(BufReader::new(File::open(path)?)))
    }
}

/// Process-wide clip cache
pub struct FrameStore {
    /// Folder holding `<clip>.<extension>` files
    data_folder: PathBuf,

    /// Container extension without the dot
    extension: String,

    source: Arc<dyn ClipSource>,

    /// clip_id -> decoded frames
    cache: RwLock<HashMap<String, Arc<FrameSequence>>>,
}

impl FrameStore {
    /// Create a store reading from disk
    pub fn new(data_folder: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self::with_source(data_folder, extension, Arc::new(DiskClipSource))
    }

    /// Create a store reading through a custom source
    pub fn with_source(
        data_folder: impl Into<PathBuf>,
        extension: impl Into<String>,
        source: Arc<dyn ClipSource>,
    ) -> Self {
        Self {
            data_folder: data_folder.into(),
            extension: extension.into(),
            source,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// File backing a clip: `<data_folder>/<clip_id>.<extension>`
    pub fn clip_path(&self, clip_id: &str) -> PathBuf {
        self.data_folder
            .join(format!("{}.{}", clip_id, self.extension))
    }

    /// Get the frames for a clip, decoding it on first use
    ///
    /// Cached clips are returned without touching the source, even when the
    /// cached sequence is empty.
    pub async fn fetch(&self, clip_id: &str) -> Result<Arc<FrameSequence>> {
        if let Some(frames) = self.cache.read().await.get(clip_id) {
            debug!("Clip {} served from cache", clip_id);
            return Ok(Arc::clone(frames));
        }

        let path = self.clip_path(clip_id);
        let source = Arc::clone(&self.source);
        let id = clip_id.to_string();

        // Container reads are blocking file I/O
        let frames = tokio::task::spawn_blocking(move || load_clip(source.as_ref(), &path, &id))
            .await
            .map_err(|e| Error::Internal(format!("decode task for {} failed: {}", clip_id, e)))??;

        let mut cache = self.cache.write().await;
        let published = cache
            .entry(clip_id.to_string())
            .or_insert_with(|| {
                info!(
                    "Cached clip {}: {} frames ({} audible, {} bytes)",
                    clip_id,
                    frames.len(),
                    frames.audible_count(),
                    frames.payload_bytes()
                );
                Arc::new(frames)
            });

        Ok(Arc::clone(published))
    }

    /// Decode clips ahead of their first trigger
    ///
    /// Failures are logged and skipped. Returns the number of clips cached.
    pub async fn preload<I, S>(&self, clip_ids: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut loaded = 0;
        for clip_id in clip_ids {
            let clip_id = clip_id.as_ref();
            match self.fetch(clip_id).await {
                Ok(_) => loaded += 1,
                Err(e) => warn!("Could not preload clip {}: {}", clip_id, e),
            }
        }
        loaded
    }

    pub async fn is_cached(&self, clip_id: &str) -> bool {
        self.cache.read().await.contains_key(clip_id)
    }

    pub async fn cached_count(&self) -> usize {
        self.cache.read().await.len()
    }
}

fn load_clip(source: &dyn ClipSource, path: &Path, clip_id: &str) -> Result<FrameSequence> {
    let reader = source.open(path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            Error::NotFound {
                clip_id: clip_id.to_string(),
                path: path.to_path_buf(),
            }
        } else {
            Error::Io(e)
        }
    })?;

    debug!("Decoding clip {} from {}", clip_id, path.display());
    read_frames(reader, clip_id)
}
