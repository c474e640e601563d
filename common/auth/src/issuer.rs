use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use serde_json::Value;

use crate::config::JwtConfig;
use crate::error::{AuthError, AuthResult};

/// Mints HS256 credentials carrying caller-supplied claims plus `iat`/`exp`.
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    ttl: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    #[serde(skip)]
    pub issued_at: DateTime<Utc>,
    #[serde(skip)]
    pub expires_at: DateTime<Utc>,
}

impl TokenIssuer {
    pub fn new(config: &JwtConfig) -> AuthResult<Self> {
        if config.secret.is_empty() {
            return Err(AuthError::MissingSecret);
        }
        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            ttl: Duration::seconds(config.ttl_seconds),
        })
    }

    pub fn issue(&self, claims: Value) -> AuthResult<IssuedToken> {
        self.issue_at(claims, Utc::now())
    }

    /// Issue as if the current time were `now`.
    pub fn issue_at(&self, claims: Value, now: DateTime<Utc>) -> AuthResult<IssuedToken> {
        let Value::Object(mut map) = claims else {
            return Err(AuthError::MissingEmail);
        };

        let has_email = map
            .get("email")
            .and_then(Value::as_str)
            .is_some_and(|email| !email.trim().is_empty());
        if !has_email {
            return Err(AuthError::MissingEmail);
        }

        let expires_at = now + self.ttl;
        map.insert("iat".into(), Value::from(now.timestamp()));
        map.insert("exp".into(), Value::from(expires_at.timestamp()));

        let token = encode(&Header::new(Algorithm::HS256), &map, &self.encoding_key)
            .map_err(|err| AuthError::Signing(err.to_string()))?;

        Ok(IssuedToken {
            token,
            issued_at: now,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn refuses_empty_secret() {
        let err = TokenIssuer::new(&JwtConfig::new("")).err().expect("empty secret");
        assert!(matches!(err, AuthError::MissingSecret));
    }

    #[test]
    fn requires_object_with_email() {
        let issuer = TokenIssuer::new(&JwtConfig::new("secret")).unwrap();
        assert!(matches!(issuer.issue(json!({"name": "x"})), Err(AuthError::MissingEmail)));
        assert!(matches!(issuer.issue(json!({"email": ""})), Err(AuthError::MissingEmail)));
        assert!(matches!(issuer.issue(json!("ana@example.com")), Err(AuthError::MissingEmail)));
    }

    #[test]
    fn expiry_is_seven_days_after_issue() {
        let issuer = TokenIssuer::new(&JwtConfig::new("secret")).unwrap();
        let issued = issuer.issue(json!({"email": "ana@example.com"})).unwrap();
        assert_eq!((issued.expires_at - issued.issued_at).num_days(), 7);
        assert_eq!(issued.token.split('.').count(), 3);
    }
}
