use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    string_field, with_id, without_id, Collection, DeleteResult, Document, DocumentStore, Filter,
    InsertOneResult, StoreResult, UpdateResult,
};

type Rows = Vec<(Uuid, Document)>;

/// Process-local store. Every operation holds the collection map lock for its
/// whole duration, which makes `insert_if_absent` atomic.
#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    inner: Arc<RwLock<HashMap<Collection, Rows>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn find(&self, collection: Collection, filter: &Filter) -> StoreResult<Vec<Document>> {
        let guard = self.inner.read().await;
        let docs = guard
            .get(&collection)
            .map(|rows| {
                rows.iter()
                    .filter(|(id, doc)| filter.matches(*id, doc))
                    .map(|(id, doc)| with_id(*id, doc))
                    .collect()
            })
            .unwrap_or_default();
        Ok(docs)
    }

    async fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> StoreResult<Option<Document>> {
        let guard = self.inner.read().await;
        Ok(guard.get(&collection).and_then(|rows| {
            rows.iter()
                .find(|(id, doc)| filter.matches(*id, doc))
                .map(|(id, doc)| with_id(*id, doc))
        }))
    }

    async fn insert_one(
        &self,
        collection: Collection,
        doc: Document,
    ) -> StoreResult<InsertOneResult> {
        let id = Uuid::new_v4();
        let mut guard = self.inner.write().await;
        guard
            .entry(collection)
            .or_default()
            .push((id, without_id(doc)));
        Ok(InsertOneResult::new(id))
    }

    async fn insert_if_absent(
        &self,
        collection: Collection,
        key_field: &'static str,
        doc: Document,
    ) -> StoreResult<Option<InsertOneResult>> {
        let key = string_field(&doc, key_field).map(str::to_owned);
        let mut guard = self.inner.write().await;
        let rows = guard.entry(collection).or_default();
        let exists = rows
            .iter()
            .any(|(_, existing)| string_field(existing, key_field) == key.as_deref());
        if exists {
            return Ok(None);
        }

        let id = Uuid::new_v4();
        rows.push((id, without_id(doc)));
        Ok(Some(InsertOneResult::new(id)))
    }

    async fn delete_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> StoreResult<DeleteResult> {
        let mut guard = self.inner.write().await;
        let Some(rows) = guard.get_mut(&collection) else {
            return Ok(DeleteResult::new(0));
        };
        match rows.iter().position(|(id, doc)| filter.matches(*id, doc)) {
            Some(index) => {
                rows.remove(index);
                Ok(DeleteResult::new(1))
            }
            None => Ok(DeleteResult::new(0)),
        }
    }

    async fn set_field(
        &self,
        collection: Collection,
        filter: &Filter,
        field: &'static str,
        value: Value,
    ) -> StoreResult<UpdateResult> {
        let mut guard = self.inner.write().await;
        let target = guard
            .get_mut(&collection)
            .and_then(|rows| rows.iter_mut().find(|(id, doc)| filter.matches(*id, doc)));

        match target {
            None => Ok(UpdateResult::new(0, 0)),
            Some((_, doc)) if doc.get(field) == Some(&value) => Ok(UpdateResult::new(1, 0)),
            Some((_, doc)) => {
                doc.insert(field.to_string(), value);
                Ok(UpdateResult::new(1, 1))
            }
        }
    }
}
