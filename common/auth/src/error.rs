use axum::response::{IntoResponse, Response};
use common_http_errors::ApiError;
use jsonwebtoken::errors::ErrorKind;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authorization header missing")]
    MissingAuthorization,
    #[error("authorization header malformed")]
    InvalidAuthorization,
    #[error("malformed token: {0}")]
    MalformedToken(String),
    #[error("token expired")]
    Expired,
    #[error("token verification failed: {0}")]
    Verification(String),
    #[error("invalid claim '{0}' with value '{1}'")]
    InvalidClaim(&'static str, String),
    #[error("identity claim must be a non-empty JSON object")]
    EmptyClaim,
    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl AuthError {
    /// Short label for logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::MissingAuthorization => "missing_authorization",
            AuthError::InvalidAuthorization => "invalid_authorization",
            AuthError::MalformedToken(_) => "malformed_token",
            AuthError::Expired => "expired_token",
            AuthError::Verification(_) => "invalid_signature",
            AuthError::InvalidClaim(_, _) => "invalid_claim",
            AuthError::EmptyClaim => "empty_claim",
            AuthError::Signing(_) => "signing_failed",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        match value.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => Self::MalformedToken(value.to_string()),
            _ => Self::Verification(value.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::EmptyClaim => ApiError::bad_request("invalid_claim", value.to_string()),
            AuthError::Signing(_) => ApiError::internal(value),
            _ => ApiError::Unauthorized,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}
