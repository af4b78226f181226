use std::collections::BTreeMap;

use floorwatch_identity::IdentityRecord;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DirectoryError;

/// Display name used when the directory omits one.
pub const UNKNOWN_NAME: &str = "Unknown";

/// An embedding as the directory ships it: either a JSON-encoded string
/// of numbers or a plain array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EmbeddingPayload {
    Encoded(String),
    Values(Vec<f64>),
}

/// One roster entry as returned by the directory, before validation.
///
/// Any field other than `id`, `name` and the embedding is kept in
/// `metadata` verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub id: i64,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default, alias = "face_embedding")]
    pub embedding: Option<EmbeddingPayload>,

    #[serde(flatten)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl RawRecord {
    pub fn new(id: i64, name: impl Into<String>, embedding: EmbeddingPayload) -> Self {
        Self {
            id,
            name: Some(name.into()),
            embedding: Some(embedding),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Decodes one roster entry as fetched from a directory.
    ///
    /// A shape error is reported as [`DirectoryError::MalformedRecord`],
    /// carrying the entry's id when one can be read.
    pub fn from_value(value: Value) -> Result<Self, DirectoryError> {
        let id = value.get("id").and_then(Value::as_i64);
        serde_json::from_value(value).map_err(|e| DirectoryError::MalformedRecord {
            id,
            reason: e.to_string(),
        })
    }

    /// The entry in the directory's wire shape.
    pub fn to_value(&self) -> Value {
        let mut map: Map<String, Value> = self
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        map.insert("id".into(), self.id.into());
        if let Some(name) = &self.name {
            map.insert("name".into(), name.clone().into());
        }
        match &self.embedding {
            Some(EmbeddingPayload::Encoded(s)) => {
                map.insert("embedding".into(), s.clone().into());
            }
            Some(EmbeddingPayload::Values(v)) => {
                map.insert("embedding".into(), v.iter().copied().map(Value::from).collect());
            }
            None => {}
        }
        Value::Object(map)
    }

    /// Parses the embedding payload into f32 values.
    pub fn decode_embedding(&self) -> Result<Vec<f32>, DirectoryError> {
        let values = match &self.embedding {
            None => return Err(DirectoryError::MissingEmbedding { id: self.id }),
            Some(EmbeddingPayload::Encoded(s)) if s.trim().is_empty() => {
                return Err(DirectoryError::MissingEmbedding { id: self.id });
            }
            Some(EmbeddingPayload::Encoded(s)) => serde_json::from_str::<Vec<f64>>(s).map_err(|e| {
                DirectoryError::InvalidEmbedding {
                    id: self.id,
                    reason: e.to_string(),
                }
            })?,
            Some(EmbeddingPayload::Values(v)) => v.clone(),
        };

        // Values outside f32 range become infinite and are rejected.
        let out: Vec<f32> = values.iter().map(|&v| v as f32).collect();
        if out.iter().any(|v| !v.is_finite()) {
            return Err(DirectoryError::InvalidEmbedding {
                id: self.id,
                reason: "non-finite value".into(),
            });
        }
        Ok(out)
    }

    /// Validates the record against the expected dimension and converts it.
    pub fn into_identity(self, dim: usize) -> Result<IdentityRecord, DirectoryError> {
        let embedding = self.decode_embedding()?;
        if embedding.len() != dim {
            return Err(DirectoryError::DimensionMismatch {
                id: self.id,
                expected: dim,
                got: embedding.len(),
            });
        }
        Ok(IdentityRecord {
            id: self.id,
            display_name: self.name.unwrap_or_else(|| UNKNOWN_NAME.to_string()),
            embedding,
            metadata: self.metadata,
        })
    }
}
