//! Document store the rest of the service persists through.
//!
//! Documents are JSON objects addressed by `collection/id`, where a
//! collection may itself be nested under a document
//! (`attendance/{uid}/daily`). Every document carries a version that
//! writers can use as an optimistic precondition.

use async_trait::async_trait;
use derive_more::Display;
use futures::Stream;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use std::pin::Pin;

pub mod feed;
pub mod memory;
pub mod mysql;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionPath(String);

impl CollectionPath {
    pub fn users() -> Self {
        Self("users".to_string())
    }

    pub fn projects() -> Self {
        Self("projects".to_string())
    }

    pub fn credentials() -> Self {
        Self("credentials".to_string())
    }

    pub fn refresh_tokens() -> Self {
        Self("refresh_tokens".to_string())
    }

    pub fn password_resets() -> Self {
        Self("password_resets".to_string())
    }

    /// `attendance/{uid}/daily`, one document per daily key.
    pub fn daily_attendance(uid: &str) -> Self {
        Self(format!("attendance/{}/daily", uid))
    }

    pub fn doc(&self, id: impl Into<String>) -> DocPath {
        DocPath {
            collection: self.clone(),
            id: id.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocPath {
    collection: CollectionPath,
    id: String,
}

impl DocPath {
    pub fn collection(&self) -> &CollectionPath {
        &self.collection
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub data: Value,
    pub version: u64,
}

/// Condition a `put` or `delete` must satisfy before it is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    Any,
    /// The document must not exist yet.
    Absent,
    /// The document must exist at exactly this version.
    Version(u64),
}

/// Inclusive bounds on document ids within a collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyRange {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl KeyRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: Some(start.into()),
            end: Some(end.into()),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.start.as_deref().is_none_or(|s| id >= s) && self.end.as_deref().is_none_or(|e| id <= e)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Change {
    Upserted { data: Value },
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEvent {
    pub id: String,
    #[serde(flatten)]
    pub change: Change,
}

/// Live changes to one collection. Dropping the stream unsubscribes.
pub type ChangeStream = Pin<Box<dyn Stream<Item = ChangeEvent> + Send>>;

#[derive(Debug, Display)]
pub enum StoreError {
    #[display(fmt = "precondition failed for {}", _0)]
    PreconditionFailed(String),
    #[display(fmt = "document {} is not a JSON object", _0)]
    NotAnObject(String),
    #[display(fmt = "document {} could not be decoded: {}", _0, _1)]
    Decode(String, String),
    #[display(fmt = "storage backend error: {}", _0)]
    Backend(String),
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError>;

    /// Writes the whole document and returns its new version.
    async fn put(
        &self,
        path: &DocPath,
        data: Value,
        precondition: Precondition,
    ) -> Result<u64, StoreError>;

    /// Shallow merge into the document, creating it when missing.
    async fn merge(&self, path: &DocPath, patch: Map<String, Value>) -> Result<u64, StoreError>;

    /// Returns whether a document was removed. `Version` fails when the
    /// document is missing or has moved on; `Absent` fails when it exists.
    async fn delete(&self, path: &DocPath, precondition: Precondition) -> Result<bool, StoreError>;

    /// Documents of a collection ordered by id.
    async fn list(
        &self,
        collection: &CollectionPath,
        range: &KeyRange,
    ) -> Result<Vec<(String, Document)>, StoreError>;

    fn subscribe(&self, collection: &CollectionPath) -> ChangeStream;
}

impl Precondition {
    /// Whether a document currently at `current` may be written or removed.
    pub fn allows(self, current: Option<u64>) -> bool {
        match self {
            Precondition::Any => true,
            Precondition::Absent => current.is_none(),
            Precondition::Version(v) => current == Some(v),
        }
    }
}

/// Shallow merge of `patch` into `target`, the way an upsert-merge treats
/// top-level fields.
pub fn apply_merge(target: &mut Map<String, Value>, patch: Map<String, Value>) {
    for (key, value) in patch {
        target.insert(key, value);
    }
}

/// Reads and decodes a document together with its version.
pub async fn read<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    path: &DocPath,
) -> Result<Option<(T, u64)>, StoreError> {
    match store.get(path).await? {
        Some(doc) => {
            let value = serde_json::from_value(doc.data)
                .map_err(|e| StoreError::Decode(path.to_string(), e.to_string()))?;
            Ok(Some((value, doc.version)))
        }
        None => Ok(None),
    }
}

pub async fn write<T: Serialize>(
    store: &dyn DocumentStore,
    path: &DocPath,
    value: &T,
    precondition: Precondition,
) -> Result<u64, StoreError> {
    let data = serde_json::to_value(value)
        .map_err(|e| StoreError::Decode(path.to_string(), e.to_string()))?;
    store.put(path, data, precondition).await
}

/// Lists and decodes a collection. Documents that fail to decode are
/// skipped and logged rather than failing the whole listing.
pub async fn list_as<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: &CollectionPath,
    range: &KeyRange,
) -> Result<Vec<(String, T)>, StoreError> {
    let docs = store.list(collection, range).await?;
    let mut out = Vec::with_capacity(docs.len());
    for (id, doc) in docs {
        match serde_json::from_value(doc.data) {
            Ok(value) => out.push((id, value)),
            Err(e) => {
                tracing::warn!(collection = %collection, id = %id, error = %e, "Skipping undecodable document")
            }
        }
    }
    Ok(out)
}
