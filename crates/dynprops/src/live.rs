//! Lock-free swappable entity container.
//!
//! This module provides [`LiveHandle`], the indirection that lets a caller
//! keep one reference while the entity behind it is replaced on reload.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;

use crate::schema::{ConfigEntity, FieldValue};

/// Holds the current instance of an entity and swaps it atomically.
///
/// Readers never take a lock: [`current`](Self::current) is a single atomic
/// load returning an `Arc<T>` to a fully populated instance. A
/// [`swap`](Self::swap) replaces that reference in one store, so a reader
/// sees either the old instance or the new one, never a mixture.
///
/// # Example
///
/// ```ignore
/// let handle = LiveHandle::new(MyConfig::default());
///
/// // Keep an Arc across reloads if you need a stable snapshot
/// let snapshot = handle.current();
///
/// // Or read through a closure
/// let port = handle.read(|cfg| cfg.port);
///
/// let epoch = handle.epoch();
/// // ... later ...
/// if handle.has_changed_since(epoch) {
///     println!("config was swapped");
/// }
/// ```
pub struct LiveHandle<T> {
    inner: ArcSwap<T>,

    /// Incremented after every swap.
    epoch: AtomicU64,
}

impl<T> LiveHandle<T> {
    /// Wrap an initial instance.
    pub fn new(initial: T) -> Self {
        Self::from_arc(Arc::new(initial))
    }

    /// Wrap an instance that is already shared.
    pub fn from_arc(initial: Arc<T>) -> Self {
        Self {
            inner: ArcSwap::new(initial),
            epoch: AtomicU64::new(0),
        }
    }

    /// The instance that is current right now.
    ///
    /// Never blocks. The returned `Arc` stays valid after later swaps.
    pub fn current(&self) -> Arc<T> {
        self.inner.load_full()
    }

    /// Read the current instance via a closure without cloning the `Arc`.
    pub fn read<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        let guard = self.inner.load();
        f(&guard)
    }

    /// Atomically replace the current instance, returning the previous one.
    pub fn swap(&self, new_instance: T) -> Arc<T> {
        self.swap_arc(Arc::new(new_instance))
    }

    /// Atomically replace the current instance with a shared one.
    pub fn swap_arc(&self, new_instance: Arc<T>) -> Arc<T> {
        let old = self.inner.swap(new_instance);
        self.epoch.fetch_add(1, Ordering::Release);
        old
    }

    /// Number of swaps performed so far.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Returns `true` if a swap happened after `epoch` was observed.
    pub fn has_changed_since(&self, epoch: u64) -> bool {
        self.epoch() != epoch
    }
}

impl<T: ConfigEntity> LiveHandle<T> {
    /// Read a field from whichever instance is current at call time.
    pub fn read_field(&self, field: &str) -> Option<FieldValue> {
        self.inner.load().read_field(field)
    }
}

impl<T: Clone> LiveHandle<T> {
    /// Get an owned copy of the current instance.
    pub fn clone_inner(&self) -> T {
        T::clone(&self.inner.load())
    }
}

impl<T: Default> Default for LiveHandle<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

// Manual Debug impl to avoid requiring T: Debug
impl<T> std::fmt::Debug for LiveHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveHandle")
            .field("epoch", &self.epoch())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default, PartialEq, Debug)]
    struct Pair {
        left: u64,
        right: u64,
    }

    #[test]
    fn test_basic_operations() {
        let handle = LiveHandle::new(Pair { left: 1, right: 1 });

        assert_eq!(handle.current().left, 1);
        assert_eq!(handle.read(|p| p.right), 1);
        assert_eq!(handle.epoch(), 0);
        assert_eq!(handle.clone_inner(), Pair { left: 1, right: 1 });
    }

    #[test]
    fn test_swap() {
        let handle = LiveHandle::new(Pair { left: 1, right: 1 });
        let snapshot = handle.current();
        let epoch = handle.epoch();

        let old = handle.swap(Pair { left: 2, right: 2 });

        assert_eq!(old.left, 1);
        assert_eq!(handle.current().left, 2);
        assert_eq!(snapshot.left, 1);
        assert!(handle.has_changed_since(epoch));
        assert_eq!(handle.epoch(), epoch + 1);
    }

    #[test]
    fn test_readers_never_see_mixed_instances() {
        use std::sync::atomic::AtomicBool;
        use std::thread;

        let handle = Arc::new(LiveHandle::new(Pair { left: 0, right: 0 }));
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let handle = Arc::clone(&handle);
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    let mut reads = 0u64;
                    while !done.load(Ordering::Acquire) || reads < 1000 {
                        let current = handle.current();
                        assert_eq!(current.left, current.right);
                        reads += 1;
                    }
                })
            })
            .collect();

        for i in 1..=10_000 {
            handle.swap(Pair { left: i, right: i });
        }
        done.store(true, Ordering::Release);

        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(handle.epoch(), 10_000);
    }
}
