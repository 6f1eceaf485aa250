use chrono::{DateTime, Duration, Utc};
use common_auth::{AuthError, AuthResult, IdentityClaim, JwtConfig};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::Value;

/// Signs identity claims with the shared HS256 secret.
pub struct TokenSigner {
    config: JwtConfig,
    encoding_key: EncodingKey,
}

pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub expires_in: i64,
}

impl TokenSigner {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        Self {
            config,
            encoding_key,
        }
    }

    /// Any non-empty JSON object is signed as-is, whether or not a matching
    /// user is registered. `exp`/`iat` are always set by the signer.
    pub fn issue(&self, claim: Value) -> AuthResult<IssuedToken> {
        let identity = IdentityClaim::from_value(claim)?;
        self.issue_at(identity, Utc::now())
    }

    fn issue_at(&self, identity: IdentityClaim, now: DateTime<Utc>) -> AuthResult<IssuedToken> {
        let expires_in = self.config.access_ttl_seconds;
        let expires_at = Duration::try_seconds(expires_in)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| AuthError::Signing(format!("token lifetime {expires_in}s is out of range")))?;

        let mut payload = identity.into_map();
        payload.insert("iat".to_string(), Value::from(now.timestamp()));
        payload.insert("exp".to_string(), Value::from(expires_at.timestamp()));

        let token = encode(
            &Header::new(Algorithm::HS256),
            &payload,
            &self.encoding_key,
        )
        .map_err(|err| AuthError::Signing(err.to_string()))?;

        Ok(IssuedToken {
            token,
            expires_at,
            expires_in,
        })
    }
}
