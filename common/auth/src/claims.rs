use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AuthError, AuthResult};

/// Registered claims owned by the token service. Callers cannot set them.
pub const RESERVED_CLAIMS: &[&str] = &["exp", "iat"];

/// Caller-defined identity payload carried inside a bearer token.
///
/// Any JSON object is accepted; the only field the service itself reads is
/// `email`, which drives ownership and role checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityClaim(Map<String, Value>);

impl IdentityClaim {
    /// Build a claim from an arbitrary JSON value, dropping reserved fields.
    ///
    /// Rejects anything that is not an object or that is empty once the
    /// reserved fields are removed.
    pub fn from_value(value: Value) -> AuthResult<Self> {
        match value {
            Value::Object(mut map) => {
                strip_reserved(&mut map);
                if map.is_empty() {
                    return Err(AuthError::EmptyClaim);
                }
                Ok(Self(map))
            }
            _ => Err(AuthError::EmptyClaim),
        }
    }

    pub fn email(&self) -> Option<&str> {
        self.0.get("email").and_then(Value::as_str)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

fn strip_reserved(map: &mut Map<String, Value>) {
    for key in RESERVED_CLAIMS {
        map.remove(*key);
    }
}

/// Verified token contents.
#[derive(Debug, Clone, Serialize)]
pub struct Claims {
    pub identity: IdentityClaim,
    pub expires_at: DateTime<Utc>,
    pub issued_at: Option<DateTime<Utc>>,
}

impl Claims {
    pub fn email(&self) -> Option<&str> {
        self.identity.email()
    }
}

#[derive(Debug, Deserialize)]
struct ClaimsRepr {
    exp: i64,
    #[serde(default)]
    iat: Option<i64>,
}

impl TryFrom<Value> for Claims {
    type Error = AuthError;

    fn try_from(value: Value) -> AuthResult<Self> {
        let repr: ClaimsRepr = serde_json::from_value(value.clone())
            .map_err(|err| AuthError::MalformedToken(err.to_string()))?;

        let expires_at = Utc
            .timestamp_opt(repr.exp, 0)
            .single()
            .ok_or_else(|| AuthError::InvalidClaim("exp", repr.exp.to_string()))?;

        let issued_at = match repr.iat {
            Some(iat) => Some(
                Utc.timestamp_opt(iat, 0)
                    .single()
                    .ok_or_else(|| AuthError::InvalidClaim("iat", iat.to_string()))?,
            ),
            None => None,
        };

        let mut map = match value {
            Value::Object(map) => map,
            other => {
                return Err(AuthError::MalformedToken(format!(
                    "payload is not an object: {other}"
                )))
            }
        };
        strip_reserved(&mut map);

        Ok(Self {
            identity: IdentityClaim(map),
            expires_at,
            issued_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identity_claim_drops_reserved_fields() {
        let claim = IdentityClaim::from_value(json!({"email": "a@x.com", "exp": 1, "iat": 2}))
            .expect("claim");
        assert_eq!(claim.email(), Some("a@x.com"));
        assert!(claim.get("exp").is_none());
        assert!(claim.get("iat").is_none());
    }

    #[test]
    fn identity_claim_rejects_empty_and_non_objects() {
        for value in [json!({}), json!({"exp": 10}), json!("a@x.com"), json!(null), json!([1])] {
            let err = IdentityClaim::from_value(value).expect_err("should reject");
            assert!(matches!(err, AuthError::EmptyClaim));
        }
    }

    #[test]
    fn identity_claim_without_email_is_accepted() {
        let claim = IdentityClaim::from_value(json!({"name": "guest"})).expect("claim");
        assert_eq!(claim.email(), None);
    }

    #[test]
    fn claims_parse_timestamps_and_keep_identity() {
        let claims = Claims::try_from(json!({
            "email": "a@x.com",
            "name": "Ada",
            "exp": 1_900_000_000,
            "iat": 1_899_996_400
        }))
        .expect("claims");
        assert_eq!(claims.email(), Some("a@x.com"));
        assert_eq!(claims.expires_at.timestamp(), 1_900_000_000);
        assert_eq!(claims.issued_at.map(|t| t.timestamp()), Some(1_899_996_400));
        assert_eq!(claims.identity.as_map().len(), 2);
    }

    #[test]
    fn claims_require_numeric_exp() {
        let err = Claims::try_from(json!({"email": "a@x.com", "exp": "soon"})).expect_err("reject");
        assert!(matches!(err, AuthError::MalformedToken(_)));
    }
}
