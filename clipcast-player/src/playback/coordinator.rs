//! Playback Coordinator
//!
//! Single-slot lock with a cooperative preemption signal. At most one
//! playback attempt holds the slot; while anyone is waiting for it the
//! signal is raised so the holder can stop early.
//!
//! The signal is raised before a waiter starts waiting and lowered only after
//! its acquisition succeeds. Waiters are counted rather than flagged, so with
//! several queued requests the signal stays up until the last one gets in.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Process-wide playback slot
#[derive(Debug, Default)]
pub struct PlaybackCoordinator {
    slot: Arc<Mutex<()>>,
    waiters: AtomicUsize,
}

/// Proof of holding the playback slot; the slot is released on drop
///
/// The permit owns its hold on the slot, so it can be moved into a task.
#[must_use = "the playback slot is released as soon as the permit is dropped"]
#[derive(Debug)]
pub struct PlaybackPermit {
    _slot: OwnedMutexGuard<()>,
}

/// Keeps the waiter count honest even if `acquire` is cancelled mid-wait
struct WaiterRegistration<'a> {
    waiters: &'a AtomicUsize,
}

impl<'a> WaiterRegistration<'a> {
    fn register(waiters: &'a AtomicUsize) -> Self {
        waiters.fetch_add(1, Ordering::SeqCst);
        Self { waiters }
    }
}

impl Drop for WaiterRegistration<'_> {
    fn drop(&mut self) {
        self.waiters.fetch_sub(1, Ordering::SeqCst);
    }
}

impl PlaybackCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the playback slot
    ///
    /// Raises the preemption signal for the whole wait. Waiters are served
    /// in arrival order.
    pub async fn acquire(&self) -> PlaybackPermit {
        let registration = WaiterRegistration::register(&self.waiters);
        let slot = Arc::clone(&self.slot).lock_owned().await;
        drop(registration);
        PlaybackPermit { _slot: slot }
    }

    /// Whether a newer request is waiting for the slot
    ///
    /// Never blocks. Meant to be polled by the current holder.
    pub fn is_preemption_requested(&self) -> bool {
        self.waiters.load(Ordering::SeqCst) > 0
    }

    /// Number of acquire calls currently waiting
    pub fn waiting(&self) -> usize {
        self.waiters.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn wait_for_waiters(coordinator: &PlaybackCoordinator, count: usize) {
        for _ in 0..200 {
            if coordinator.waiting() == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {} waiters, saw {}", count, coordinator.waiting());
    }

    #[tokio::test]
    async fn test_uncontended_acquire_leaves_signal_down() {
        let coordinator = PlaybackCoordinator::new();
        let permit = coordinator.acquire().await;
        assert!(!coordinator.is_preemption_requested());
        drop(permit);
        assert!(!coordinator.is_preemption_requested());
    }

    #[tokio::test]
    async fn test_waiter_raises_signal_until_it_acquires() {
        let coordinator = Arc::new(PlaybackCoordinator::new());
        let permit = coordinator.acquire().await;

        let waiter = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move {
                let _permit = coordinator.acquire().await;
                coordinator.is_preemption_requested()
            })
        };

        wait_for_waiters(&coordinator, 1).await;
        assert!(coordinator.is_preemption_requested());

        drop(permit);
        let signal_seen_by_new_holder = waiter.await.unwrap();
        assert!(!signal_seen_by_new_holder);
        assert!(!coordinator.is_preemption_requested());
    }

    #[tokio::test]
    async fn test_signal_stays_up_while_second_waiter_queued() {
        let coordinator = Arc::new(PlaybackCoordinator::new());
        let permit = coordinator.acquire().await;
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        for id in 0..2 {
            let waiter = Arc::clone(&coordinator);
            let tx = tx.clone();
            tokio::spawn(async move {
                let _permit = waiter.acquire().await;
                tx.send((id, waiter.is_preemption_requested())).unwrap();
                tokio::time::sleep(Duration::from_millis(20)).await;
            });
            wait_for_waiters(&coordinator, id + 1).await;
        }

        drop(permit);

        // First waiter gets in while the second is still queued
        let (first, signal) = rx.recv().await.unwrap();
        assert_eq!(first, 0);
        assert!(signal);

        let (second, signal) = rx.recv().await.unwrap();
        assert_eq!(second, 1);
        assert!(!signal);
    }

    #[tokio::test]
    async fn test_cancelled_acquire_lowers_signal() {
        let coordinator = PlaybackCoordinator::new();
        let _permit = coordinator.acquire().await;

        let timed_out =
            tokio::time::timeout(Duration::from_millis(20), coordinator.acquire()).await;
        assert!(timed_out.is_err());
        assert_eq!(coordinator.waiting(), 0);
        assert!(!coordinator.is_preemption_requested());
    }

    #[tokio::test]
    async fn test_single_holder() {
        let coordinator = Arc::new(PlaybackCoordinator::new());
        let holders = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let coordinator = Arc::clone(&coordinator);
                let holders = Arc::clone(&holders);
                let max_seen = Arc::clone(&max_seen);
                tokio::spawn(async move {
                    let _permit = coordinator.acquire().await;
                    let now = holders.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    holders.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }
}
