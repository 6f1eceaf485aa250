use axum::{
    extract::{Path, State},
    Json,
};
use common_auth::AuthContext;
use common_http_errors::ApiError;
use serde::Serialize;
use tracing::{debug, info};

use crate::admin::AdminContext;
use crate::directory::{Registration, EMAIL_FIELD};
use crate::extract::ApiJson;
use crate::store::{parse_document_id, string_field, Document, InsertOneResult, UpdateResult};
use crate::AppState;

pub const USER_EXISTS_MESSAGE: &str = "user already exists";

/// Both outcomes are 200s; callers tell them apart by shape.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum RegistrationResponse {
    Created(InsertOneResult),
    Exists { message: &'static str },
}

#[derive(Debug, Serialize)]
pub struct AdminStatus {
    pub admin: bool,
}

pub async fn register_user(
    State(state): State<AppState>,
    ApiJson(user): ApiJson<Document>,
) -> Result<Json<RegistrationResponse>, ApiError> {
    let has_email = string_field(&user, EMAIL_FIELD).is_some_and(|email| !email.trim().is_empty());
    if !has_email {
        return Err(ApiError::bad_request("missing_email", "user must have an email"));
    }

    let response = match state.users().register(user).await? {
        Registration::Created(ack) => {
            state.metrics.registration("created");
            info!(user_id = %ack.inserted_id, "registered user");
            RegistrationResponse::Created(ack)
        }
        Registration::AlreadyExists => {
            state.metrics.registration("existing");
            RegistrationResponse::Exists {
                message: USER_EXISTS_MESSAGE,
            }
        }
    };
    Ok(Json(response))
}

pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminContext,
) -> Result<Json<Vec<Document>>, ApiError> {
    let users = state.users().list_all().await?;
    Ok(Json(users))
}

pub async fn promote_user(
    State(state): State<AppState>,
    AdminContext(admin): AdminContext,
    Path(id): Path<String>,
) -> Result<Json<UpdateResult>, ApiError> {
    let id = parse_document_id(&id)?;
    let result = state.users().promote(id).await?;
    info!(
        user_id = %id,
        promoted_by = admin.email().unwrap_or_default(),
        matched = result.matched_count,
        "admin role granted"
    );
    Ok(Json(result))
}

/// Callers may only ask about their own email; anything else answers
/// `{admin: false}` without consulting the directory.
pub async fn check_admin(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(email): Path<String>,
) -> Result<Json<AdminStatus>, ApiError> {
    if auth.email() != Some(email.as_str()) {
        debug!(requested = %email, "admin status requested for another user");
        return Ok(Json(AdminStatus { admin: false }));
    }

    let admin = state.users().is_admin(&email).await?;
    Ok(Json(AdminStatus { admin }))
}
