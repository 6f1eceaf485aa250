use axum::{extract::State, Json};
use common_http_errors::ApiError;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::extract::ApiJson;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

pub async fn issue_token(
    State(state): State<AppState>,
    ApiJson(claim): ApiJson<Value>,
) -> Result<Json<TokenResponse>, ApiError> {
    let issued = state.token_signer.issue(claim)?;
    state.metrics.token_issued();
    debug!(expires_at = %issued.expires_at, "issued access token");
    Ok(Json(TokenResponse {
        token: issued.token,
    }))
}
