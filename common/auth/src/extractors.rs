use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header::AUTHORIZATION, request::Parts};
use tracing::debug;

use crate::claims::Claims;
use crate::error::{AuthError, AuthResult};
use crate::verifier::JwtVerifier;

/// Extracts verified JWT claims from the request using the configured verifier.
///
/// The verified context is cached in the request extensions, so stacking
/// extractors that each need it verifies the token once.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub claims: Claims,
    pub token: String,
}

impl AuthContext {
    pub fn email(&self) -> Option<&str> {
        self.claims.email()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    Arc<JwtVerifier>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(existing) = parts.extensions.get::<AuthContext>() {
            return Ok(existing.clone());
        }

        let header_value = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthorization)?;

        let token = parse_bearer(header_value)?;
        let verifier = Arc::<JwtVerifier>::from_ref(state);
        let claims = verifier.verify(&token).map_err(|err| {
            debug!(reason = err.reason(), "rejected bearer token");
            err
        })?;

        let context = Self { claims, token };
        parts.extensions.insert(context.clone());
        Ok(context)
    }
}

fn parse_bearer(value: &axum::http::HeaderValue) -> AuthResult<String> {
    let raw = value
        .to_str()
        .map_err(|_| AuthError::InvalidAuthorization)?;

    let mut segments = raw.split_whitespace();
    let scheme = segments.next().ok_or(AuthError::InvalidAuthorization)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::InvalidAuthorization);
    }

    let token = segments.next().ok_or(AuthError::InvalidAuthorization)?;
    if segments.next().is_some() {
        return Err(AuthError::InvalidAuthorization);
    }

    Ok(token.to_owned())
}
