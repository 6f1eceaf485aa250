use axum::response::{IntoResponse, Response};
use common_http_errors::ApiError;

use crate::AuthContext;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardError {
    MissingEmailClaim,
    OwnerMismatch { owner: String, caller: String },
    MissingRole { required: &'static str },
}

impl GuardError {
    pub fn reason(&self) -> &'static str {
        match self {
            GuardError::MissingEmailClaim => "missing_email_claim",
            GuardError::OwnerMismatch { .. } => "owner_mismatch",
            GuardError::MissingRole { .. } => "missing_role",
        }
    }
}

impl From<GuardError> for ApiError {
    fn from(_: GuardError) -> Self {
        ApiError::Forbidden
    }
}

impl IntoResponse for GuardError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

/// The caller's token email must equal the resource owner's email.
pub fn ensure_owner(auth: &AuthContext, owner: &str) -> Result<(), GuardError> {
    let caller = auth.email().ok_or(GuardError::MissingEmailClaim)?;
    if caller == owner {
        Ok(())
    } else {
        Err(GuardError::OwnerMismatch {
            owner: owner.to_string(),
            caller: caller.to_string(),
        })
    }
}

/// The stored role must be exactly `required`; absent roles never match.
pub fn ensure_role(stored: Option<&str>, required: &'static str) -> Result<(), GuardError> {
    match stored {
        Some(role) if role == required => Ok(()),
        _ => Err(GuardError::MissingRole { required }),
    }
}
