//! Document store seam.
//!
//! The service treats persistence as an external collaborator holding JSON
//! documents in named collections. Two backends implement [`DocumentStore`]:
//! Postgres (one JSONB table per collection) and an in-process map used by
//! tests and local runs.

use async_trait::async_trait;
use common_http_errors::ApiError;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::MemoryDocumentStore;
pub use postgres::PgDocumentStore;

pub type Document = Map<String, Value>;

/// Field carrying the store-generated identifier in every returned document.
pub const ID_FIELD: &str = "_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Menu,
    Reviews,
    Carts,
    Users,
}

impl Collection {
    pub fn table(&self) -> &'static str {
        match self {
            Collection::Menu => "menu",
            Collection::Reviews => "reviews",
            Collection::Carts => "carts",
            Collection::Users => "users",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    All,
    Id(Uuid),
    /// String equality on a top-level field.
    Eq(&'static str, String),
}

impl Filter {
    pub fn matches(&self, id: Uuid, doc: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Id(expected) => *expected == id,
            Filter::Eq(field, value) => string_field(doc, field) == Some(value.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertOneResult {
    pub acknowledged: bool,
    pub inserted_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    pub acknowledged: bool,
    pub deleted_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
    pub acknowledged: bool,
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_id: Option<Uuid>,
    pub upserted_count: u64,
}

impl InsertOneResult {
    pub fn new(inserted_id: Uuid) -> Self {
        Self {
            acknowledged: true,
            inserted_id,
        }
    }
}

impl DeleteResult {
    pub fn new(deleted_count: u64) -> Self {
        Self {
            acknowledged: true,
            deleted_count,
        }
    }
}

impl UpdateResult {
    pub fn new(matched_count: u64, modified_count: u64) -> Self {
        Self {
            acknowledged: true,
            matched_count,
            modified_count,
            upserted_id: None,
            upserted_count: 0,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("corrupt document {id} in '{collection}': {reason}")]
    Corrupt {
        collection: &'static str,
        id: Uuid,
        reason: String,
    },
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        error!(error = %value, "document store failure");
        ApiError::internal(value)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// All matching documents in insertion order.
    async fn find(&self, collection: Collection, filter: &Filter) -> StoreResult<Vec<Document>>;

    async fn find_one(&self, collection: Collection, filter: &Filter)
        -> StoreResult<Option<Document>>;

    async fn insert_one(&self, collection: Collection, doc: Document)
        -> StoreResult<InsertOneResult>;

    /// Atomically inserts `doc` unless a document with the same string value
    /// in `key_field` already exists. Returns `None` when nothing was inserted.
    async fn insert_if_absent(
        &self,
        collection: Collection,
        key_field: &'static str,
        doc: Document,
    ) -> StoreResult<Option<InsertOneResult>>;

    /// Deletes the first matching document.
    async fn delete_one(&self, collection: Collection, filter: &Filter)
        -> StoreResult<DeleteResult>;

    /// Sets `field` to `value` on the first matching document.
    async fn set_field(
        &self,
        collection: Collection,
        filter: &Filter,
        field: &'static str,
        value: Value,
    ) -> StoreResult<UpdateResult>;
}

pub fn string_field<'a>(doc: &'a Document, field: &str) -> Option<&'a str> {
    doc.get(field).and_then(Value::as_str)
}

/// Parses a path identifier; anything that is not a UUID is a client error.
pub fn parse_document_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| ApiError::bad_request("invalid_id", format!("'{raw}' is not a valid id")))
}

/// Identifiers are always generated by the store, so a caller-supplied `_id`
/// is dropped before insert.
pub(crate) fn without_id(mut doc: Document) -> Document {
    doc.remove(ID_FIELD);
    doc
}

pub(crate) fn with_id(id: Uuid, doc: &Document) -> Document {
    let mut out = Document::with_capacity(doc.len() + 1);
    out.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    for (key, value) in doc {
        out.insert(key.clone(), value.clone());
    }
    out
}
