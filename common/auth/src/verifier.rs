use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::Value;
use tracing::debug;

use crate::claims::Claims;
use crate::config::JwtConfig;
use crate::error::AuthResult;

/// Checks signature and expiry of presented credentials. Never consults the
/// identity store.
#[derive(Clone)]
pub struct JwtVerifier {
    config: JwtConfig,
    key: DecodingKey,
}

impl JwtVerifier {
    pub fn new(config: JwtConfig) -> Self {
        let key = DecodingKey::from_secret(config.secret.as_bytes());
        Self { config, key }
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    pub fn verify(&self, token: &str) -> AuthResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = self.config.leeway_seconds.into();
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp"]);

        let token_data = decode::<Value>(token, &self.key, &validation)?;
        let claims = Claims::try_from(token_data.claims)?;
        debug!(email = %claims.email, "verified JWT successfully");
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthError;
    use crate::issuer::TokenIssuer;
    use chrono::{Duration, Utc};
    use serde_json::json;

    fn pair(secret: &str) -> (TokenIssuer, JwtVerifier) {
        let config = JwtConfig::new(secret);
        (TokenIssuer::new(&config).unwrap(), JwtVerifier::new(config))
    }

    #[test]
    fn verifier_accepts_issued_token() {
        let (issuer, verifier) = pair("test-secret");
        let issued = issuer
            .issue(json!({"email": "ana@example.com", "name": "Ana"}))
            .unwrap();
        let claims = verifier.verify(&issued.token).expect("verification succeeds");
        assert_eq!(claims.email, "ana@example.com");
        assert_eq!(claims.raw["name"], "Ana");
        assert_eq!(claims.expires_at.timestamp(), issued.expires_at.timestamp());
    }

    #[test]
    fn verifier_rejects_foreign_secret() {
        let (issuer, _) = pair("secret-a");
        let (_, verifier) = pair("secret-b");
        let issued = issuer.issue(json!({"email": "ana@example.com"})).unwrap();
        let err = verifier.verify(&issued.token).expect_err("signature mismatch");
        assert!(matches!(err, AuthError::Verification(_)));
    }

    #[test]
    fn verifier_rejects_expired_token() {
        let (issuer, verifier) = pair("test-secret");
        let issued = issuer
            .issue_at(json!({"email": "ana@example.com"}), Utc::now() - Duration::days(8))
            .unwrap();
        let err = verifier.verify(&issued.token).expect_err("expired");
        assert!(matches!(err, AuthError::Expired));
    }

    #[test]
    fn verifier_rejects_tampered_payload() {
        let (issuer, verifier) = pair("test-secret");
        let issued = issuer.issue(json!({"email": "ana@example.com"})).unwrap();
        let mut parts: Vec<&str> = issued.token.split('.').collect();
        let forged = issuer.issue(json!({"email": "root@example.com"})).unwrap();
        let forged_payload = forged.token.split('.').nth(1).unwrap().to_string();
        parts[1] = &forged_payload;
        let err = verifier.verify(&parts.join(".")).expect_err("tampered");
        assert!(matches!(err, AuthError::Verification(_)));
    }

    #[test]
    fn verifier_rejects_garbage() {
        let (_, verifier) = pair("test-secret");
        assert!(verifier.verify("not-a-token").is_err());
        assert!(verifier.verify("").is_err());
    }
}
