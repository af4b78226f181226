use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Composite key of a presence entry. Orders by location first so one
/// location's entries are contiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PresenceKey {
    pub location_id: i64,
    pub identity_id: i64,
}

impl PresenceKey {
    pub fn new(location_id: i64, identity_id: i64) -> Self {
        Self {
            location_id,
            identity_id,
        }
    }
}

/// An identity currently present at a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceEntry {
    pub identity_id: i64,
    pub location_id: i64,
    /// Start of the current presence interval.
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Sensor that reported the latest sighting.
    pub source: String,
    /// Match confidence at the latest sighting.
    pub score: f32,
}

impl PresenceEntry {
    pub fn key(&self) -> PresenceKey {
        PresenceKey::new(self.location_id, self.identity_id)
    }
}

/// What an update did to the presence map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sighting {
    /// The pair was absent (or had expired) and is now present.
    Arrived,
    /// The pair was already present; `last_seen` was reset.
    Refreshed,
}

impl Sighting {
    pub fn is_arrival(self) -> bool {
        self == Sighting::Arrived
    }
}
