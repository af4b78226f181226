use std::sync::Arc;

use serde_json::Value;

use crate::error::DirectoryError;

/// Supplies the full roster of known identities.
///
/// One call is one attempt; retries and per-attempt timeouts are applied by
/// the caller through [`retry`](crate::retry). Implementations must be safe
/// for concurrent use (Send + Sync).
#[async_trait::async_trait]
pub trait DirectorySource: Send + Sync {
    /// Fetches every roster entry as raw JSON.
    ///
    /// Entries are not decoded here, so one malformed entry cannot fail the
    /// whole fetch; decode each with
    /// [`RawRecord::from_value`](crate::RawRecord::from_value).
    async fn fetch_roster(&self) -> Result<Vec<Value>, DirectoryError>;
}

#[async_trait::async_trait]
impl<T: DirectorySource + ?Sized> DirectorySource for Arc<T> {
    async fn fetch_roster(&self) -> Result<Vec<Value>, DirectoryError> {
        (**self).fetch_roster().await
    }
}
