//! Tracks which identities are currently present at which locations.
//!
//! Each `(location, identity)` pair is either absent (no entry) or present
//! (an entry with a `last_seen` time). A sighting creates or refreshes the
//! entry; an entry whose `last_seen` is older than the timeout window is
//! removed, either lazily when its location is queried or by a periodic
//! [`PresenceTracker::sweep`].
//!
//! The tracker does not enforce one location per identity: the same
//! identity seen at two locations has two entries.

mod tracker;
mod types;

pub use tracker::{DEFAULT_PRESENCE_TIMEOUT, PresenceTracker};
pub use types::{PresenceEntry, PresenceKey, Sighting};
