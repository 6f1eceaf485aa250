#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header::AUTHORIZATION, header::CONTENT_TYPE, Method, Request, StatusCode};
use axum::Router;
use bistro_service::store::{
    Collection, DeleteResult, Document, DocumentStore, Filter, InsertOneResult,
    MemoryDocumentStore, StoreError, StoreResult, UpdateResult,
};
use bistro_service::{build_router, AppState};
use common_auth::JwtConfig;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;
use uuid::Uuid;

pub const TEST_SECRET: &str = "bistro-test-secret";

pub struct TestApp {
    pub state: AppState,
    router: Router,
}

impl TestApp {
    pub fn new() -> Result<Self> {
        Self::with_store(Arc::new(MemoryDocumentStore::new()))
    }

    pub fn with_store(store: Arc<dyn DocumentStore>) -> Result<Self> {
        let state = AppState::new(store, JwtConfig::new(TEST_SECRET))?;
        let router = build_router(state.clone());
        Ok(Self { state, router })
    }

    pub fn token_for(&self, email: &str) -> Result<String> {
        let issued = self.state.token_signer.issue(json!({ "email": email }))?;
        Ok(issued.token)
    }

    pub async fn seed(&self, collection: Collection, value: Value) -> Result<Uuid> {
        let ack = self.state.store.insert_one(collection, document(value)?).await?;
        Ok(ack.inserted_id)
    }

    /// Registers `email` directly in the directory and grants it the admin role.
    pub async fn seed_admin(&self, email: &str) -> Result<()> {
        self.state.users().ensure_admin(email).await?;
        Ok(())
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => builder.body(Body::empty())?,
        };
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> Result<(StatusCode, Value)> {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .context("router call failed")?;
        let status = response.status();
        let bytes = response.into_body().collect().await?.to_bytes();
        if bytes.is_empty() {
            return Ok((status, Value::Null));
        }
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        Ok((status, body))
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Result<(StatusCode, Value)> {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> Result<(StatusCode, Value)> {
        self.request(Method::POST, uri, token, Some(body)).await
    }
}

/// Store whose every call fails the way an unreachable database does.
pub struct UnavailableStore;

fn unavailable<T>() -> StoreResult<T> {
    Err(StoreError::Database(sqlx::Error::PoolTimedOut))
}

#[async_trait]
impl DocumentStore for UnavailableStore {
    async fn find(&self, _: Collection, _: &Filter) -> StoreResult<Vec<Document>> {
        unavailable()
    }

    async fn find_one(&self, _: Collection, _: &Filter) -> StoreResult<Option<Document>> {
        unavailable()
    }

    async fn insert_one(&self, _: Collection, _: Document) -> StoreResult<InsertOneResult> {
        unavailable()
    }

    async fn insert_if_absent(
        &self,
        _: Collection,
        _: &'static str,
        _: Document,
    ) -> StoreResult<Option<InsertOneResult>> {
        unavailable()
    }

    async fn delete_one(&self, _: Collection, _: &Filter) -> StoreResult<DeleteResult> {
        unavailable()
    }

    async fn set_field(
        &self,
        _: Collection,
        _: &Filter,
        _: &'static str,
        _: Value,
    ) -> StoreResult<UpdateResult> {
        unavailable()
    }
}

pub fn document(value: Value) -> Result<Document> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(anyhow!("expected a JSON object, got {other}")),
    }
}

pub fn assert_unauthorized(status: StatusCode, body: &Value) {
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, &json!({"error": true, "message": "unauthorized access"}));
}

pub fn assert_forbidden(status: StatusCode, body: &Value) {
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, &json!({"error": true, "message": "forbidden access"}));
}
