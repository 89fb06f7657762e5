//! In-memory document store, used for single-node deployments and tests.

use super::feed::ChangeFeed;
use super::{
    Change, ChangeEvent, ChangeStream, CollectionPath, DocPath, Document, DocumentStore, KeyRange,
    Precondition, StoreError, apply_merge,
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

type Collection = BTreeMap<String, Document>;

fn poisoned<E>(_: E) -> StoreError {
    StoreError::Backend("memory store lock poisoned".to_string())
}

pub struct MemoryStore {
    docs: RwLock<HashMap<CollectionPath, Collection>>,
    feed: ChangeFeed,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
            feed: ChangeFeed::new(),
        }
    }

    fn upserted(&self, path: &DocPath, data: Value) {
        self.feed.publish(
            path.collection(),
            ChangeEvent {
                id: path.id().to_string(),
                change: Change::Upserted { data },
            },
        );
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError> {
        let docs = self.docs.read().map_err(poisoned)?;
        Ok(docs
            .get(path.collection())
            .and_then(|c| c.get(path.id()))
            .cloned())
    }

    async fn put(
        &self,
        path: &DocPath,
        data: Value,
        precondition: Precondition,
    ) -> Result<u64, StoreError> {
        if !data.is_object() {
            return Err(StoreError::NotAnObject(path.to_string()));
        }
        let version = {
            let mut docs = self.docs.write().map_err(poisoned)?;
            let collection = docs.entry(path.collection().clone()).or_default();
            let current = collection.get(path.id()).map(|d| d.version);
            if !precondition.allows(current) {
                return Err(StoreError::PreconditionFailed(path.to_string()));
            }
            let version = current.unwrap_or(0) + 1;
            collection.insert(
                path.id().to_string(),
                Document {
                    data: data.clone(),
                    version,
                },
            );
            version
        };
        self.upserted(path, data);
        Ok(version)
    }

    async fn merge(&self, path: &DocPath, patch: Map<String, Value>) -> Result<u64, StoreError> {
        let (data, version) = {
            let mut docs = self.docs.write().map_err(poisoned)?;
            let collection = docs.entry(path.collection().clone()).or_default();
            let (mut target, version) = match collection.get(path.id()) {
                Some(doc) => match &doc.data {
                    Value::Object(map) => (map.clone(), doc.version + 1),
                    _ => return Err(StoreError::NotAnObject(path.to_string())),
                },
                None => (Map::new(), 1),
            };
            apply_merge(&mut target, patch);
            let data = Value::Object(target);
            collection.insert(
                path.id().to_string(),
                Document {
                    data: data.clone(),
                    version,
                },
            );
            (data, version)
        };
        self.upserted(path, data);
        Ok(version)
    }

    async fn delete(&self, path: &DocPath, precondition: Precondition) -> Result<bool, StoreError> {
        let removed = {
            let mut docs = self.docs.write().map_err(poisoned)?;
            let Some(collection) = docs.get_mut(path.collection()) else {
                return if precondition.allows(None) {
                    Ok(false)
                } else {
                    Err(StoreError::PreconditionFailed(path.to_string()))
                };
            };
            let current = collection.get(path.id()).map(|d| d.version);
            if !precondition.allows(current) {
                return Err(StoreError::PreconditionFailed(path.to_string()));
            }
            collection.remove(path.id()).is_some()
        };
        if removed {
            self.feed.publish(
                path.collection(),
                ChangeEvent {
                    id: path.id().to_string(),
                    change: Change::Deleted,
                },
            );
        }
        Ok(removed)
    }

    async fn list(
        &self,
        collection: &CollectionPath,
        range: &KeyRange,
    ) -> Result<Vec<(String, Document)>, StoreError> {
        let docs = self.docs.read().map_err(poisoned)?;
        Ok(docs
            .get(collection)
            .map(|c| {
                c.iter()
                    .filter(|(id, _)| range.contains(id))
                    .map(|(id, doc)| (id.clone(), doc.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn subscribe(&self, collection: &CollectionPath) -> ChangeStream {
        self.feed.subscribe(collection)
    }
}
