use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::IdentityError;
use crate::snapshot::Snapshot;

/// Holds the active [`Snapshot`] behind a lock and swaps it atomically.
///
/// Readers get an `Arc` to the snapshot that was active when they asked;
/// the lock is held only long enough to clone that pointer, so a refresh
/// never waits on a reader's similarity scan and never mutates a
/// snapshot someone still holds.
pub struct IdentityCache {
    dim: usize,
    current: RwLock<Arc<Snapshot>>,
}

impl IdentityCache {
    /// Creates a cache serving an empty placeholder. Panics if `dim` is 0.
    pub fn new(dim: usize) -> Self {
        assert!(dim > 0, "identity: cache dimension must be positive");
        Self {
            dim,
            current: RwLock::new(Arc::new(Snapshot::empty(dim))),
        }
    }

    /// Expected embedding dimension.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Returns the active snapshot.
    pub fn get(&self) -> Arc<Snapshot> {
        self.current.read().clone()
    }

    /// Installs `snapshot` and returns the one it replaced.
    ///
    /// Fails without side effects if the snapshot's dimension differs from
    /// the cache's.
    pub fn replace(&self, snapshot: Snapshot) -> Result<Arc<Snapshot>, IdentityError> {
        if snapshot.dim() != self.dim {
            return Err(IdentityError::DimensionMismatch {
                expected: self.dim,
                got: snapshot.dim(),
            });
        }
        let next = Arc::new(snapshot);
        let mut current = self.current.write();
        Ok(std::mem::replace(&mut *current, next))
    }

    /// Age of the active snapshot; [`Duration::MAX`] if nothing was installed.
    pub fn age(&self) -> Duration {
        self.age_at(Utc::now())
    }

    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        self.current.read().age_at(now)
    }

    /// Reports whether the active snapshot is older than `threshold`.
    pub fn is_stale(&self, threshold: Duration) -> bool {
        self.is_stale_at(threshold, Utc::now())
    }

    pub fn is_stale_at(&self, threshold: Duration, now: DateTime<Utc>) -> bool {
        self.age_at(now) > threshold
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use chrono::TimeDelta;

    use super::*;
    use crate::IdentityRecord;

    fn snapshot(n: usize, at: DateTime<Utc>) -> Snapshot {
        let records = (0..n)
            .map(|i| IdentityRecord::new(i as i64, format!("p{i}"), vec![1.0, i as f32, 0.0]))
            .collect();
        Snapshot::build(3, records, at).unwrap()
    }

    #[test]
    fn starts_empty_and_infinitely_stale() {
        let cache = IdentityCache::new(3);
        let snap = cache.get();
        assert!(snap.is_empty());
        assert!(snap.captured_at().is_none());
        assert_eq!(cache.age(), Duration::MAX);
        assert!(cache.is_stale(Duration::from_secs(3600)));
    }

    #[test]
    fn replace_swaps_and_returns_previous() {
        let cache = IdentityCache::new(3);
        let t0 = Utc::now();

        let prev = cache.replace(snapshot(2, t0)).unwrap();
        assert!(prev.captured_at().is_none());

        let held = cache.get();
        assert_eq!(held.len(), 2);

        let prev = cache.replace(snapshot(5, t0 + TimeDelta::seconds(1))).unwrap();
        assert_eq!(prev.len(), 2);

        // A reader's snapshot is untouched by the swap.
        assert_eq!(held.len(), 2);
        assert_eq!(cache.get().len(), 5);
    }

    #[test]
    fn replace_rejects_wrong_dimension() {
        let cache = IdentityCache::new(3);
        let t0 = Utc::now();
        cache.replace(snapshot(1, t0)).unwrap();

        let bad = Snapshot::build(4, Vec::new(), t0).unwrap();
        assert!(cache.replace(bad).is_err());
        assert_eq!(cache.get().captured_at(), Some(t0));
        assert_eq!(cache.get().len(), 1);
    }

    #[test]
    fn staleness() {
        let cache = IdentityCache::new(3);
        let t0 = Utc::now();
        cache.replace(snapshot(1, t0)).unwrap();

        let threshold = Duration::from_secs(60);
        assert!(!cache.is_stale_at(threshold, t0 + TimeDelta::seconds(60)));
        assert!(cache.is_stale_at(threshold, t0 + TimeDelta::seconds(61)));
        assert_eq!(cache.age_at(t0 + TimeDelta::seconds(10)), Duration::from_secs(10));
    }

    #[test]
    fn concurrent_readers_see_whole_snapshots() {
        let cache = Arc::new(IdentityCache::new(3));
        let t0 = Utc::now();
        cache.replace(snapshot(1, t0)).unwrap();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        let s = cache.get();
                        assert_eq!(s.len(), s.matrix().rows());
                        assert_eq!(s.len(), s.norms().len());
                    }
                })
            })
            .collect();

        for n in 2..50 {
            cache.replace(snapshot(n, t0)).unwrap();
        }
        for r in readers {
            r.join().unwrap();
        }
        assert_eq!(cache.get().len(), 49);
    }
}
