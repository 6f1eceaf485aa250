use std::sync::Arc;

use common_auth::ROLE_ADMIN;
use serde_json::Value;
use uuid::Uuid;

use crate::store::{
    string_field, Collection, Document, DocumentStore, Filter, InsertOneResult, StoreResult,
    UpdateResult,
};

pub const EMAIL_FIELD: &str = "email";
pub const ROLE_FIELD: &str = "role";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    Created(InsertOneResult),
    AlreadyExists,
}

/// User records keyed by email.
#[derive(Clone)]
pub struct UserDirectory {
    store: Arc<dyn DocumentStore>,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Idempotent by email. A `role` in the payload is ignored; roles only
    /// change through [`UserDirectory::promote`].
    pub async fn register(&self, mut user: Document) -> StoreResult<Registration> {
        user.remove(ROLE_FIELD);
        let outcome = self
            .store
            .insert_if_absent(Collection::Users, EMAIL_FIELD, user)
            .await?;
        Ok(match outcome {
            Some(ack) => Registration::Created(ack),
            None => Registration::AlreadyExists,
        })
    }

    pub async fn list_all(&self) -> StoreResult<Vec<Document>> {
        self.store.find(Collection::Users, &Filter::All).await
    }

    pub async fn find_by_email(&self, email: &str) -> StoreResult<Option<Document>> {
        self.store
            .find_one(Collection::Users, &Filter::Eq(EMAIL_FIELD, email.to_string()))
            .await
    }

    pub async fn role_of(&self, email: &str) -> StoreResult<Option<String>> {
        Ok(self
            .find_by_email(email)
            .await?
            .and_then(|user| string_field(&user, ROLE_FIELD).map(str::to_string)))
    }

    pub async fn is_admin(&self, email: &str) -> StoreResult<bool> {
        Ok(self.role_of(email).await?.as_deref() == Some(ROLE_ADMIN))
    }

    pub async fn promote(&self, id: Uuid) -> StoreResult<UpdateResult> {
        self.store
            .set_field(Collection::Users, &Filter::Id(id), ROLE_FIELD, Value::from(ROLE_ADMIN))
            .await
    }

    /// Makes sure `email` exists and holds the admin role.
    pub async fn ensure_admin(&self, email: &str) -> StoreResult<UpdateResult> {
        let mut user = Document::new();
        user.insert(EMAIL_FIELD.to_string(), Value::from(email));
        self.store
            .insert_if_absent(Collection::Users, EMAIL_FIELD, user)
            .await?;
        self.store
            .set_field(
                Collection::Users,
                &Filter::Eq(EMAIL_FIELD, email.to_string()),
                ROLE_FIELD,
                Value::from(ROLE_ADMIN),
            )
            .await
    }
}
