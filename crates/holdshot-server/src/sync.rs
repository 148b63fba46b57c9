//! Catalog change tracking.
//!
//! The server keeps a single monotonically increasing counter that is
//! bumped every time the stored catalog changes (an upload commits or a
//! user's images are deleted). Clients remember the version they last
//! saw and ask whether anything has happened since. That comparison is
//! a single integer read, so polling stays cheap no matter how many
//! images are stored.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counter describing the current catalog version.
///
/// Starts at zero on server start. The counter is not persisted: a
/// restart resets it, and clients that cached a version from a previous
/// run will simply observe `current < cached` and should treat the
/// catalog as changed by refetching.
#[derive(Debug, Default)]
pub struct ChangeCounter {
    version: AtomicU64,
}

impl ChangeCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current catalog version.
    pub fn current(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Record one catalog mutation. Returns the new version.
    pub fn bump(&self) -> u64 {
        self.version.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Whether the catalog has changed since `observed`.
    ///
    /// A version from a previous server run can exceed the current
    /// counter; that case also reports `false` here, but clients should
    /// refetch whenever the returned current version differs from the
    /// one they cached.
    pub fn has_changed_since(&self, observed: u64) -> bool {
        self.current() > observed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_bump_advances_version() {
        let counter = ChangeCounter::new();
        assert_eq!(counter.current(), 0);
        assert_eq!(counter.bump(), 1);
        assert_eq!(counter.bump(), 2);
        assert_eq!(counter.current(), 2);
    }

    #[test]
    fn test_has_changed_since() {
        let counter = ChangeCounter::new();
        assert!(!counter.has_changed_since(0));

        counter.bump();
        assert!(counter.has_changed_since(0));
        assert!(!counter.has_changed_since(1));
        assert!(!counter.has_changed_since(5));
    }

    #[test]
    fn test_concurrent_bumps_are_not_lost() {
        let counter = Arc::new(ChangeCounter::new());
        let mut handles = Vec::new();

        for _ in 0..8 {
            let counter = counter.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    counter.bump();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(counter.current(), 800);
    }
}
