//! Identity roster snapshots and nearest-neighbor matching.
//!
//! The roster lives in an immutable [`Snapshot`]: identity records plus an
//! index-aligned embedding matrix with precomputed row norms. An
//! [`IdentityCache`] owns the active snapshot and swaps it atomically, so
//! readers always see a fully built roster.
//!
//! # Usage
//!
//! ```
//! use chrono::Utc;
//! use floorwatch_identity::{IdentityCache, IdentityRecord, Snapshot, find_best_match};
//!
//! let cache = IdentityCache::new(3);
//! let roster = vec![IdentityRecord::new(1, "Ana", vec![1.0, 0.0, 0.0])];
//! cache.replace(Snapshot::build(3, roster, Utc::now()).unwrap()).unwrap();
//!
//! let snap = cache.get();
//! let m = find_best_match(&[1.0, 0.0, 0.0], &snap, 0.4).unwrap();
//! assert_eq!(m.record.map(|r| r.id), Some(1));
//! ```
//!
//! The roster is expected to fit in memory; matching is an exact linear
//! scan, not an approximate index.

mod cache;
mod error;
mod matcher;
mod matrix;
mod record;
mod snapshot;

pub use cache::IdentityCache;
pub use error::IdentityError;
pub use matcher::{
    BestMatch, DEFAULT_DUPLICATE_THRESHOLD, DEFAULT_IDENTIFY_THRESHOLD, MatchPolicy,
    SimilarityMatcher, Thresholds, find_best_match, similarities,
};
pub use matrix::{EmbeddingMatrix, dot, l2_norm};
pub use record::{IdentityRecord, Metadata};
pub use snapshot::Snapshot;
