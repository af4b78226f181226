//! Roster directory access.
//!
//! A [`DirectorySource`] returns the full roster as undecoded JSON entries.
//! Each entry is decoded on its own with [`RawRecord::from_value`] (id,
//! name, serialized embedding and free-form metadata) and validated into an
//! [`IdentityRecord`](floorwatch_identity::IdentityRecord) with
//! [`RawRecord::into_identity`], so one bad entry never rejects the rest. Network calls are wrapped in [`retry`] with
//! a [`RetryPolicy`] (bounded attempts, fixed or growing delay, per-attempt
//! timeout).
//!
//! - [`HttpDirectory`]: `GET {base_url}/api/v1/employees/registered-faces`
//! - [`MemoryDirectory`]: in-memory roster with failure injection

mod error;
mod http;
mod memory;
mod record;
mod retry;
mod source;

pub use error::DirectoryError;
pub use http::{DEFAULT_ROSTER_PATH, HttpDirectory, HttpDirectoryConfig};
pub use memory::MemoryDirectory;
pub use record::{EmbeddingPayload, RawRecord, UNKNOWN_NAME};
pub use retry::{RetryPolicy, retry};
pub use source::DirectorySource;
