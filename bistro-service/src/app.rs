use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{FromRef, State};
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method, StatusCode,
};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::Router;
use common_auth::{JwtConfig, JwtVerifier};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::cart_handlers::{add_cart_item, delete_cart_item, list_cart_items};
use crate::catalog_handlers::{list_menu, list_reviews};
use crate::carts::CartStore;
use crate::directory::UserDirectory;
use crate::jwt_handlers::issue_token;
use crate::metrics::{track_http_errors, ServiceMetrics};
use crate::store::DocumentStore;
use crate::tokens::TokenSigner;
use crate::user_handlers::{check_admin, list_users, promote_user, register_user};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub jwt_verifier: Arc<JwtVerifier>,
    pub token_signer: Arc<TokenSigner>,
    pub metrics: Arc<ServiceMetrics>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, jwt: JwtConfig) -> Result<Self> {
        Ok(Self {
            store,
            jwt_verifier: Arc::new(JwtVerifier::new(jwt.clone())),
            token_signer: Arc::new(TokenSigner::new(jwt)),
            metrics: Arc::new(ServiceMetrics::new().context("Failed to register metrics")?),
        })
    }

    pub fn users(&self) -> UserDirectory {
        UserDirectory::new(self.store.clone())
    }

    pub fn carts(&self) -> CartStore {
        CartStore::new(self.store.clone())
    }
}

impl FromRef<AppState> for Arc<JwtVerifier> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt_verifier.clone()
    }
}

impl FromRef<AppState> for Arc<TokenSigner> {
    fn from_ref(state: &AppState) -> Self {
        state.token_signer.clone()
    }
}

async fn root() -> &'static str {
    "bistro boss server is running"
}

async fn health() -> &'static str {
    "ok"
}

async fn metrics_endpoint(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(response) => response,
        Err(err) => {
            error!(error = %err, "Unable to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Route table. The guard each route needs is declared by its handler's
/// extractors: `AuthContext` (token), `AdminContext` (token + admin role),
/// and an explicit owner check inside cart handlers.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/healthz", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/jwt", post(issue_token))
        .route("/menu", get(list_menu))
        .route("/reviews", get(list_reviews))
        .route("/carts", post(add_cart_item).get(list_cart_items))
        .route("/carts/:id", delete(delete_cart_item))
        .route("/users", post(register_user).get(list_users))
        // PATCH takes a user id, GET takes an email; axum needs one parameter name.
        .route("/users/admin/:key", get(check_admin).patch(promote_user))
        .layer(middleware::from_fn_with_state(state.clone(), track_http_errors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub fn cors_layer(allowed_origins: &[String]) -> Result<CorsLayer> {
    let allow_origin = if allowed_origins.is_empty() {
        AllowOrigin::any()
    } else {
        let origins = allowed_origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin)
                    .with_context(|| format!("Invalid CORS origin '{origin}'"))
            })
            .collect::<Result<Vec<_>>>()?;
        AllowOrigin::list(origins)
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([ACCEPT, CONTENT_TYPE, AUTHORIZATION]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_layer_rejects_invalid_origin() {
        assert!(cors_layer(&["http://ok.example".to_string()]).is_ok());
        assert!(cors_layer(&["bad\norigin".to_string()]).is_err());
        assert!(cors_layer(&[]).is_ok());
    }
}
