use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// Identity decoded from a verified credential.
///
/// Any `role` field the caller put into the token is kept only inside `raw`;
/// authorization always resolves the current role from the identity store.
#[derive(Debug, Clone, Serialize)]
pub struct Claims {
    pub email: String,
    pub expires_at: DateTime<Utc>,
    pub issued_at: Option<DateTime<Utc>>,
    pub raw: serde_json::Value,
}

impl Claims {
    /// Case-sensitive comparison against an email taken from the request.
    pub fn is_self(&self, email: &str) -> bool {
        self.email == email
    }
}

#[derive(Debug, Deserialize)]
struct ClaimsRepr {
    email: String,
    exp: i64,
    #[serde(default)]
    iat: Option<i64>,
}

impl TryFrom<ClaimsRepr> for Claims {
    type Error = AuthError;

    fn try_from(value: ClaimsRepr) -> AuthResult<Self> {
        if value.email.trim().is_empty() {
            return Err(AuthError::InvalidClaim("email", value.email));
        }

        let expires_at = Utc
            .timestamp_opt(value.exp, 0)
            .single()
            .ok_or_else(|| AuthError::InvalidClaim("exp", value.exp.to_string()))?;

        let issued_at = match value.iat {
            Some(iat) => Some(
                Utc.timestamp_opt(iat, 0)
                    .single()
                    .ok_or_else(|| AuthError::InvalidClaim("iat", iat.to_string()))?,
            ),
            None => None,
        };

        Ok(Self {
            email: value.email,
            expires_at,
            issued_at,
            raw: serde_json::Value::Null,
        })
    }
}

impl TryFrom<serde_json::Value> for Claims {
    type Error = AuthError;

    fn try_from(value: serde_json::Value) -> AuthResult<Self> {
        let repr: ClaimsRepr = serde_json::from_value(value.clone())
            .map_err(|err| AuthError::InvalidJson(err.to_string()))?;
        let mut claims = Claims::try_from(repr)?;
        claims.raw = value;
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_email_and_timestamps() {
        let claims = Claims::try_from(json!({
            "email": "ana@example.com",
            "name": "Ana",
            "iat": 1_700_000_000,
            "exp": 1_700_604_800
        }))
        .expect("claims");
        assert_eq!(claims.email, "ana@example.com");
        assert_eq!(claims.issued_at.unwrap().timestamp(), 1_700_000_000);
        assert_eq!(claims.expires_at.timestamp(), 1_700_604_800);
        assert_eq!(claims.raw["name"], "Ana");
    }

    #[test]
    fn rejects_blank_email() {
        let err = Claims::try_from(json!({"email": "  ", "exp": 1})).expect_err("blank email");
        assert!(matches!(err, AuthError::InvalidClaim("email", _)));
    }

    #[test]
    fn rejects_missing_email() {
        let err = Claims::try_from(json!({"exp": 1})).expect_err("missing email");
        assert!(matches!(err, AuthError::InvalidJson(_)));
    }

    #[test]
    fn self_check_is_case_sensitive() {
        let claims = Claims::try_from(json!({"email": "ana@example.com", "exp": 1})).unwrap();
        assert!(claims.is_self("ana@example.com"));
        assert!(!claims.is_self("Ana@example.com"));
    }
}
