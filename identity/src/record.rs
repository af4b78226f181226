use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque per-identity attributes carried through from the directory
/// (department, external reference number, ...).
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// A known identity and its reference embedding.
///
/// Immutable once placed in a [`Snapshot`](crate::Snapshot).
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub id: i64,
    pub display_name: String,
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl IdentityRecord {
    pub fn new(id: i64, display_name: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            embedding,
            metadata: Metadata::new(),
        }
    }

    /// Attaches a metadata attribute.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Returns a metadata attribute rendered as a string, if present.
    pub fn meta_str(&self, key: &str) -> Option<String> {
        match self.metadata.get(key)? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Debug for IdentityRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityRecord")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("embedding_len", &self.embedding.len())
            .field("metadata", &self.metadata)
            .finish()
    }
}
