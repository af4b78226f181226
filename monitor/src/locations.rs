use std::collections::HashMap;

use parking_lot::RwLock;
use serde::Serialize;

/// A source whose location changed in a bulk reassignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationChange {
    pub source: String,
    pub from: i64,
    pub to: i64,
}

/// Result of [`LocationMap::reassign`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reassignment {
    pub updated: Vec<LocationChange>,
    /// Sources named in the request that have no assignment yet.
    pub unknown: Vec<String>,
}

/// Maps sensor sources (cameras) to the location they watch.
#[derive(Debug, Default)]
pub struct LocationMap {
    inner: RwLock<HashMap<String, i64>>,
}

impl LocationMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_assignments(assignments: impl IntoIterator<Item = (String, i64)>) -> Self {
        Self {
            inner: RwLock::new(assignments.into_iter().collect()),
        }
    }

    /// Assigns `source` to `location_id`, returning the previous location.
    pub fn assign(&self, source: impl Into<String>, location_id: i64) -> Option<i64> {
        self.inner.write().insert(source.into(), location_id)
    }

    pub fn remove(&self, source: &str) -> Option<i64> {
        self.inner.write().remove(source)
    }

    pub fn location_of(&self, source: &str) -> Option<i64> {
        self.inner.read().get(source).copied()
    }

    /// Moves known sources to new locations in one step.
    ///
    /// Only sources that already have an assignment are moved; the others
    /// are reported in [`Reassignment::unknown`] and left unassigned.
    /// Entries that already point at the requested location are not
    /// reported as updated.
    pub fn reassign(&self, assignments: impl IntoIterator<Item = (String, i64)>) -> Reassignment {
        let mut out = Reassignment::default();
        let mut inner = self.inner.write();
        for (source, to) in assignments {
            match inner.get_mut(&source) {
                Some(current) if *current == to => {}
                Some(current) => {
                    let from = std::mem::replace(current, to);
                    out.updated.push(LocationChange { source, from, to });
                }
                None => out.unknown.push(source),
            }
        }
        out
    }

    /// All assignments ordered by source name.
    pub fn assignments(&self) -> Vec<(String, i64)> {
        let mut all: Vec<_> = self
            .inner
            .read()
            .iter()
            .map(|(s, &l)| (s.clone(), l))
            .collect();
        all.sort();
        all
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
