use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::claims::Claims;
use crate::error::{AuthError, AuthResult};
use crate::verifier::JwtVerifier;

/// The decoded identity of an authenticated caller.
///
/// A handler that takes an `AuthContext` never runs without a valid credential.
/// The first extraction stores the context in the request extensions, so a
/// role guard and a plain `AuthContext` on the same route verify the token once.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub claims: Claims,
}

impl AuthContext {
    /// Verifies the single `Authorization: Bearer <token>` credential in `headers`.
    pub fn authenticate(verifier: &JwtVerifier, headers: &HeaderMap) -> AuthResult<Self> {
        let token = bearer_token(headers)?;
        let claims = verifier.verify(token)?;
        Ok(Self { claims })
    }

    pub fn email(&self) -> &str {
        &self.claims.email
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
        if let Some(cached) = parts.extensions.get::<AuthContext>() {
            return Ok(cached.clone());
        }
        let verifier = Arc::<JwtVerifier>::from_ref(state);
        let context = Self::authenticate(&verifier, &parts.headers)?;
        parts.extensions.insert(context.clone());
        Ok(context)
    }
}

/// The token of a `Bearer` credential. The scheme is case-insensitive and a
/// request carrying several `Authorization` headers is rejected.
pub fn bearer_token(headers: &HeaderMap) -> AuthResult<&str> {
    let mut values = headers.get_all(AUTHORIZATION).iter();
    let value = values.next().ok_or(AuthError::MissingAuthorization)?;
    if values.next().is_some() {
        return Err(AuthError::InvalidAuthorization);
    }

    let credential = value.to_str().map_err(|_| AuthError::InvalidAuthorization)?;
    match credential.trim().split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => {
            let token = token.trim();
            if token.is_empty() {
                Err(AuthError::InvalidAuthorization)
            } else {
                Ok(token)
            }
        }
        _ => Err(AuthError::InvalidAuthorization),
    }
}
