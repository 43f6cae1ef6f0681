//! Frame store tests against clip files on disk

mod helpers;

use clipcast_player::error::Error;
use clipcast_player::playback::FrameStore;
use helpers::ClipDir;
use std::sync::Arc;

#[tokio::test]
async fn test_fetch_decodes_clip_file() {
    let clips = ClipDir::new();
    clips.write_clip("airhorn", &[vec![1, 2, 3], vec![4]]);
    let store = FrameStore::new(clips.path(), "dca");

    let frames = store.fetch("airhorn").await.unwrap();

    assert_eq!(frames.len(), 2);
    assert_eq!(frames.audible_count(), 2);
    assert_eq!(&*frames.frames()[0], &[1, 2, 3]);
    assert_eq!(&*frames.frames()[1], &[4]);
    assert!(store.is_cached("airhorn").await);
}

#[tokio::test]
async fn test_zero_length_record_is_rejected_and_not_cached() {
    let clips = ClipDir::new();
    clips.write_raw("gap", &[0x03, 0x00, b'A', b'B', b'C', 0x00, 0x00]);
    let store = FrameStore::new(clips.path(), "dca");

    let err = store.fetch("gap").await.unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidFrameLength { length: 0, frame_index: 1, .. }
    ));
    assert!(!store.is_cached("gap").await);
}

#[tokio::test]
async fn test_cached_clip_survives_file_removal() {
    let clips = ClipDir::new();
    let path = clips.write_marked_clip("airhorn", b'a', 4);
    let store = FrameStore::new(clips.path(), "dca");

    let first = store.fetch("airhorn").await.unwrap();
    std::fs::remove_file(&path).unwrap();
    let second = store.fetch("airhorn").await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn test_missing_file_is_retried_after_it_appears() {
    let clips = ClipDir::new();
    let store = FrameStore::new(clips.path(), "dca");

    match store.fetch("late").await {
        Err(Error::NotFound { clip_id, path }) => {
            assert_eq!(clip_id, "late");
            assert_eq!(path, clips.path().join("late.dca"));
        }
        other => panic!("Expected NotFound, got {:?}", other),
    }
    assert!(!store.is_cached("late").await);

    clips.write_marked_clip("late", b'l', 2);
    let frames = store.fetch("late").await.unwrap();
    assert_eq!(frames.len(), 2);
}

#[tokio::test]
async fn test_truncated_file_is_decode_error() {
    let clips = ClipDir::new();
    // Length says 4 bytes, only 2 follow
    clips.write_raw("cut", &[0x04, 0x00, 0xAA, 0xBB]);
    let store = FrameStore::new(clips.path(), "dca");

    let err = store.fetch("cut").await.unwrap_err();
    assert!(matches!(err, Error::Decode { frame_index: 0, .. }));
    assert_eq!(store.cached_count().await, 0);
}

#[tokio::test]
async fn test_extension_is_configurable() {
    let clips = ClipDir::new();
    clips.write_marked_clip("airhorn", b'a', 1);
    std::fs::rename(
        clips.path().join("airhorn.dca"),
        clips.path().join("airhorn.opus"),
    )
    .unwrap();

    let store = FrameStore::new(clips.path(), "opus");
    assert_eq!(store.clip_path("airhorn"), clips.path().join("airhorn.opus"));
    assert_eq!(store.fetch("airhorn").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_preload_counts_only_good_clips() {
    let clips = ClipDir::new();
    clips.write_marked_clip("one", b'1', 2);
    clips.write_marked_clip("two", b'2', 3);
    clips.write_raw("bad", &[0x00, 0x80]);
    let store = FrameStore::new(clips.path(), "dca");

    let loaded = store.preload(["one", "two", "bad", "missing"]).await;

    assert_eq!(loaded, 2);
    assert_eq!(store.cached_count().await, 2);
    assert!(store.is_cached("one").await);
    assert!(!store.is_cached("bad").await);
}
