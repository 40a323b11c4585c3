//! Test fixtures and locker helpers.
//!
//! Provides ready-made lockers and a background holder thread for setting
//! up contention in tests.

use entilock_core::{EntityLocker, LockProperties};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Default timeout of [`test_locker`].
pub const TEST_TIMEOUT: Duration = Duration::from_millis(50);

/// Creates a locker over `u64` keys with natural order and [`TEST_TIMEOUT`].
pub fn test_locker() -> EntityLocker<u64> {
    test_locker_with_timeout(TEST_TIMEOUT)
}

/// Creates a locker over `u64` keys with natural order and `timeout`.
pub fn test_locker_with_timeout(timeout: Duration) -> EntityLocker<u64> {
    let props = LockProperties::natural(timeout).expect("Invalid test lock properties");
    EntityLocker::new(props)
}

/// Creates a locker over string keys that compares them case-insensitively.
pub fn case_insensitive_locker() -> EntityLocker<String> {
    let props = LockProperties::builder()
        .default_timeout(TEST_TIMEOUT)
        .key_order(|a: &String, b: &String| a.to_lowercase().cmp(&b.to_lowercase()))
        .build()
        .expect("Invalid test lock properties");
    EntityLocker::new(props)
}

/// Runs a test with a shared [`test_locker`].
///
/// # Example
///
/// ```rust,ignore
/// use entilock_testkit::with_locker;
///
/// #[test]
/// fn my_test() {
///     with_locker(|locker| {
///         assert!(locker.try_lock(1).unwrap());
///     });
/// }
/// ```
pub fn with_locker<F, R>(f: F) -> R
where
    F: FnOnce(&Arc<EntityLocker<u64>>) -> R,
{
    let locker = Arc::new(test_locker());
    f(&locker)
}

/// Keys held by a background thread until released or dropped.
pub struct HeldKeys {
    release: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl HeldKeys {
    /// Locks `keys` on a new thread and returns once they are held.
    pub fn spawn(locker: &Arc<EntityLocker<u64>>, keys: Vec<u64>) -> Self {
        let (ready_tx, ready_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let locker = Arc::clone(locker);

        let handle = thread::spawn(move || {
            locker.lock_all(keys.clone()).expect("Holder failed to lock");
            let _ = ready_tx.send(());
            let _ = release_rx.recv();
            locker.unlock_all(keys).expect("Holder failed to unlock");
        });
        ready_rx.recv().expect("Holder thread exited early");

        Self {
            release: Some(release_tx),
            handle: Some(handle),
        }
    }

    /// Releases the keys after `delay`, without blocking the caller.
    pub fn release_after(mut self, delay: Duration) -> thread::JoinHandle<()> {
        let release = self.release.take();
        let handle = self.handle.take();
        thread::spawn(move || {
            thread::sleep(delay);
            drop(release);
            if let Some(handle) = handle {
                handle.join().expect("Holder thread panicked");
            }
        })
    }

    /// Releases the keys and waits for the holder to finish.
    pub fn release(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        // Dropping the sender wakes the holder.
        self.release.take();
        if let Some(handle) = self.handle.take() {
            handle.join().expect("Holder thread panicked");
        }
    }
}

impl Drop for HeldKeys {
    fn drop(&mut self) {
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn held_keys_block_others() {
        with_locker(|locker| {
            let held = HeldKeys::spawn(locker, vec![1, 2]);
            assert!(locker.is_locked(&1));
            assert!(!locker.try_lock_for(2, 10).unwrap());
            held.release();
            assert!(!locker.is_locked(&1));
            assert!(!locker.is_locked(&2));
        });
    }

    #[test]
    fn release_after_delay() {
        with_locker(|locker| {
            let releaser = HeldKeys::spawn(locker, vec![3]).release_after(Duration::from_millis(20));
            assert!(locker.try_lock_for(3, 5_000).unwrap());
            locker.unlock(3).unwrap();
            releaser.join().unwrap();
        });
    }

    #[test]
    fn case_insensitive_keys_collide() {
        let locker = case_insensitive_locker();
        locker.lock("Alpha".to_string()).unwrap();
        assert_eq!(locker.hold_count(&"ALPHA".to_string()), 1);
        locker.unlock("alpha".to_string()).unwrap();
        assert_eq!(locker.locked_count(), 0);
    }
}
