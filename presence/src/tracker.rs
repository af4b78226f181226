use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use tracing::debug;

use crate::types::{PresenceEntry, PresenceKey, Sighting};

/// Window after which an identity that was not seen again is considered gone.
pub const DEFAULT_PRESENCE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Default)]
struct Inner {
    entries: BTreeMap<PresenceKey, PresenceEntry>,
    /// Expired entries removed outside `sweep`, held until the next sweep
    /// reports them.
    departed: Vec<PresenceEntry>,
}

/// Presence map keyed by `(location, identity)`.
///
/// Thread-safe: the map sits behind one mutex held only for map operations.
/// An entry expires when `now - last_seen > timeout`; an entry exactly
/// `timeout` old is still present.
///
/// Every expired entry is reported by exactly one [`sweep`](Self::sweep),
/// including entries that a query or a new sighting removed first.
pub struct PresenceTracker {
    timeout: TimeDelta,
    inner: Mutex<Inner>,
}

impl PresenceTracker {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout: TimeDelta::from_std(timeout).unwrap_or(TimeDelta::MAX),
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout.to_std().unwrap_or(Duration::MAX)
    }

    fn expired(&self, entry: &PresenceEntry, now: DateTime<Utc>) -> bool {
        now - entry.last_seen > self.timeout
    }

    fn location_range(location_id: i64) -> std::ops::RangeInclusive<PresenceKey> {
        PresenceKey::new(location_id, i64::MIN)..=PresenceKey::new(location_id, i64::MAX)
    }

    /// Records a sighting of `identity_id` at `location_id` now.
    pub fn update(&self, identity_id: i64, location_id: i64, source: &str, score: f32) -> Sighting {
        self.update_at(identity_id, location_id, source, score, Utc::now())
    }

    /// Records a sighting at `now`, resetting `last_seen`.
    ///
    /// Returns [`Sighting::Arrived`] if the pair had no live entry, which
    /// includes an entry that expired but was not yet swept.
    pub fn update_at(
        &self,
        identity_id: i64,
        location_id: i64,
        source: &str,
        score: f32,
        now: DateTime<Utc>,
    ) -> Sighting {
        let key = PresenceKey::new(location_id, identity_id);
        let mut inner = self.inner.lock();

        if let Some(entry) = inner.entries.get_mut(&key)
            && !self.expired(entry, now)
        {
            entry.last_seen = now;
            entry.score = score;
            if entry.source != source {
                entry.source = source.to_string();
            }
            return Sighting::Refreshed;
        }

        let previous = inner.entries.insert(
            key,
            PresenceEntry {
                identity_id,
                location_id,
                first_seen: now,
                last_seen: now,
                source: source.to_string(),
                score,
            },
        );
        if let Some(gone) = previous {
            inner.departed.push(gone);
        }
        Sighting::Arrived
    }

    /// Identities currently present at `location_id`, ordered by identity id.
    pub fn list_present(&self, location_id: i64) -> Vec<PresenceEntry> {
        self.list_present_at(location_id, Utc::now())
    }

    /// Like [`list_present`](Self::list_present) as of `now`. Expired
    /// entries met during the scan are removed.
    pub fn list_present_at(&self, location_id: i64, now: DateTime<Utc>) -> Vec<PresenceEntry> {
        let mut inner = self.inner.lock();

        let mut present = Vec::new();
        let mut stale = Vec::new();
        for (key, entry) in inner.entries.range(Self::location_range(location_id)) {
            if self.expired(entry, now) {
                stale.push(*key);
            } else {
                present.push(entry.clone());
            }
        }
        if !stale.is_empty() {
            debug!(location_id, expired = stale.len(), "lazily expired presence entries");
        }
        for key in &stale {
            if let Some(gone) = inner.entries.remove(key) {
                inner.departed.push(gone);
            }
        }
        present
    }

    /// Number of identities present at `location_id`.
    pub fn count(&self, location_id: i64) -> usize {
        self.list_present(location_id).len()
    }

    /// Removes every expired entry and returns the departures since the
    /// previous sweep.
    pub fn sweep(&self) -> Vec<PresenceEntry> {
        self.sweep_at(Utc::now())
    }

    pub fn sweep_at(&self, now: DateTime<Utc>) -> Vec<PresenceEntry> {
        let mut inner = self.inner.lock();
        let Inner { entries, departed } = &mut *inner;
        let mut removed = std::mem::take(departed);
        entries.retain(|_, entry| {
            if self.expired(entry, now) {
                removed.push(entry.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Every location with at least one present identity. Read-only:
    /// expired entries are skipped and left for the sweep.
    pub fn occupancy(&self) -> BTreeMap<i64, Vec<PresenceEntry>> {
        self.occupancy_at(Utc::now())
    }

    pub fn occupancy_at(&self, now: DateTime<Utc>) -> BTreeMap<i64, Vec<PresenceEntry>> {
        let inner = self.inner.lock();
        let mut out: BTreeMap<i64, Vec<PresenceEntry>> = BTreeMap::new();
        for entry in inner.entries.values().filter(|e| !self.expired(e, now)) {
            out.entry(entry.location_id).or_default().push(entry.clone());
        }
        out
    }

    /// Number of present identities across all locations.
    pub fn total(&self) -> usize {
        self.total_at(Utc::now())
    }

    pub fn total_at(&self, now: DateTime<Utc>) -> usize {
        let inner = self.inner.lock();
        inner.entries.values().filter(|e| !self.expired(e, now)).count()
    }

    /// Removes every entry for `location_id`. Returns how many were removed.
    ///
    /// Cleared entries are not reported as departures.
    pub fn clear_location(&self, location_id: i64) -> usize {
        let mut inner = self.inner.lock();
        let keys: Vec<PresenceKey> = inner
            .entries
            .range(Self::location_range(location_id))
            .map(|(k, _)| *k)
            .collect();
        for key in &keys {
            inner.entries.remove(key);
        }
        keys.len()
    }

    /// Stored entries, including expired ones not yet removed.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self::new(DEFAULT_PRESENCE_TIMEOUT)
    }
}
