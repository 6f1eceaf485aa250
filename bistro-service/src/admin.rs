//! Role Authority: admits a request only when the verified caller's user
//! record currently holds the admin role.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common_auth::{ensure_role, AuthContext, GuardError, ROLE_ADMIN};
use common_http_errors::ApiError;
use tracing::warn;

use crate::AppState;

/// Extractor proving the caller is an admin. Building it first runs the
/// Access Gate, then awaits the directory lookup; any failure short-circuits
/// the handler.
#[derive(Debug, Clone)]
pub struct AdminContext(pub AuthContext);

#[async_trait]
impl FromRequestParts<AppState> for AdminContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth = AuthContext::from_request_parts(parts, state).await?;

        let role = match auth.email() {
            Some(email) => state.users().role_of(email).await?,
            None => {
                return Err(deny(state, &auth, GuardError::MissingEmailClaim));
            }
        };

        if let Err(err) = ensure_role(role.as_deref(), ROLE_ADMIN) {
            return Err(deny(state, &auth, err));
        }

        Ok(Self(auth))
    }
}

fn deny(state: &AppState, auth: &AuthContext, err: GuardError) -> ApiError {
    warn!(
        email = auth.email().unwrap_or_default(),
        reason = err.reason(),
        "admin check failed"
    );
    state.metrics.access_denied(err.reason());
    err.into()
}
