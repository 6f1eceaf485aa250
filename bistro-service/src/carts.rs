use std::sync::Arc;

use uuid::Uuid;

use crate::store::{
    Collection, DeleteResult, Document, DocumentStore, Filter, InsertOneResult, StoreResult,
};

pub const OWNER_FIELD: &str = "email";

/// Cart line items, each owned by the email in its `email` field.
#[derive(Clone)]
pub struct CartStore {
    store: Arc<dyn DocumentStore>,
}

impl CartStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn add(&self, item: Document) -> StoreResult<InsertOneResult> {
        self.store.insert_one(Collection::Carts, item).await
    }

    pub async fn list_for(&self, owner: &str) -> StoreResult<Vec<Document>> {
        self.store
            .find(Collection::Carts, &Filter::Eq(OWNER_FIELD, owner.to_string()))
            .await
    }

    pub async fn get(&self, id: Uuid) -> StoreResult<Option<Document>> {
        self.store.find_one(Collection::Carts, &Filter::Id(id)).await
    }

    pub async fn remove(&self, id: Uuid) -> StoreResult<DeleteResult> {
        self.store.delete_one(Collection::Carts, &Filter::Id(id)).await
    }
}
