use axum::{
    extract::{Path, State},
    Json,
};
use common_auth::{ensure_owner, AuthContext};
use common_http_errors::ApiError;
use serde::Deserialize;
use tracing::warn;

use crate::carts::OWNER_FIELD;
use crate::extract::{ApiJson, ApiQuery};
use crate::store::{parse_document_id, string_field, DeleteResult, Document, InsertOneResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CartQuery {
    pub email: Option<String>,
}

/// Items are stored verbatim; the owner email is the only required field.
pub async fn add_cart_item(
    State(state): State<AppState>,
    ApiJson(item): ApiJson<Document>,
) -> Result<Json<InsertOneResult>, ApiError> {
    let has_owner = string_field(&item, OWNER_FIELD).is_some_and(|email| !email.trim().is_empty());
    if !has_owner {
        return Err(ApiError::bad_request(
            "missing_email",
            "cart item must carry the owner's email",
        ));
    }

    let ack = state.carts().add(item).await?;
    Ok(Json(ack))
}

pub async fn list_cart_items(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiQuery(query): ApiQuery<CartQuery>,
) -> Result<Json<Vec<Document>>, ApiError> {
    let Some(email) = query.email.filter(|email| !email.is_empty()) else {
        return Ok(Json(Vec::new()));
    };

    if let Err(err) = ensure_owner(&auth, &email) {
        warn!(requested = %email, reason = err.reason(), "cart listing denied");
        state.metrics.access_denied(err.reason());
        return Err(err.into());
    }

    let items = state.carts().list_for(&email).await?;
    Ok(Json(items))
}

/// Only the owner may delete a line item. Unknown ids report
/// `deletedCount: 0` rather than an error.
pub async fn delete_cart_item(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> Result<Json<DeleteResult>, ApiError> {
    let id = parse_document_id(&id)?;
    let carts = state.carts();

    let Some(item) = carts.get(id).await? else {
        return Ok(Json(DeleteResult::new(0)));
    };

    let owner = string_field(&item, OWNER_FIELD).unwrap_or_default();
    if let Err(err) = ensure_owner(&auth, owner) {
        warn!(item_id = %id, reason = err.reason(), "cart deletion denied");
        state.metrics.access_denied(err.reason());
        return Err(err.into());
    }

    let result = carts.remove(id).await?;
    Ok(Json(result))
}
