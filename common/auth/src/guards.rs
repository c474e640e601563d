use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use common_http_errors::ApiError;
use thiserror::Error;
use tracing::warn;

use crate::error::AuthError;
use crate::extractors::AuthContext;
use crate::roles::Role;
use crate::verifier::JwtVerifier;

/// Looks up the caller's role as currently stored, not as embedded in the token.
#[async_trait]
pub trait RoleResolver: Send + Sync {
    /// `Ok(None)` when no identity exists or its stored role is unusable.
    async fn current_role(&self, email: &str) -> Result<Option<Role>, GuardError>;
}

#[derive(Debug, Error)]
pub enum GuardError {
    #[error(transparent)]
    Unauthenticated(#[from] AuthError),
    #[error("role '{required}' required")]
    MissingRole { required: Role },
    #[error("request targets another identity")]
    IdentityMismatch,
    #[error("role lookup failed: {0}")]
    Lookup(String),
}

impl From<GuardError> for ApiError {
    fn from(value: GuardError) -> Self {
        match value {
            GuardError::Unauthenticated(err) => ApiError::from(err),
            GuardError::MissingRole { .. } => ApiError::forbidden_role(),
            GuardError::IdentityMismatch => ApiError::forbidden_identity(),
            GuardError::Lookup(message) => ApiError::Unavailable { message: Some(message) },
        }
    }
}

impl IntoResponse for GuardError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

pub async fn ensure_role(
    resolver: &dyn RoleResolver,
    auth: &AuthContext,
    required: Role,
) -> Result<(), GuardError> {
    let current = resolver.current_role(auth.email()).await?;
    if current == Some(required) {
        return Ok(());
    }
    warn!(email = %auth.email(), %required, current = ?current, "role_check_failed");
    Err(GuardError::MissingRole { required })
}

/// Rejects when a request's `email` parameter names someone other than the caller.
pub fn ensure_self(auth: &AuthContext, email: &str) -> Result<(), GuardError> {
    if auth.claims.is_self(email) {
        return Ok(());
    }
    warn!(caller = %auth.email(), requested = %email, "identity_scope_violation");
    Err(GuardError::IdentityMismatch)
}

pub trait RequiredRole: Send + Sync + 'static {
    const ROLE: Role;
}

pub struct AdminRole;
pub struct InstructorRole;

impl RequiredRole for AdminRole {
    const ROLE: Role = Role::Admin;
}

impl RequiredRole for InstructorRole {
    const ROLE: Role = Role::Instructor;
}

/// Authentication followed by a role check against the identity store.
pub struct RoleGuard<R> {
    pub auth: AuthContext,
    _role: PhantomData<R>,
}

pub type RequireAdmin = RoleGuard<AdminRole>;
pub type RequireInstructor = RoleGuard<InstructorRole>;

impl<R> RoleGuard<R> {
    pub fn email(&self) -> &str {
        self.auth.email()
    }
}

#[async_trait]
impl<S, R> FromRequestParts<S> for RoleGuard<R>
where
    Arc<JwtVerifier>: FromRef<S>,
    Arc<dyn RoleResolver>: FromRef<S>,
    S: Send + Sync,
    R: RequiredRole,
{
    type Rejection = GuardError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = AuthContext::from_request_parts(parts, state).await?;
        let resolver = Arc::<dyn RoleResolver>::from_ref(state);
        ensure_role(resolver.as_ref(), &auth, R::ROLE).await?;
        Ok(Self {
            auth,
            _role: PhantomData,
        })
    }
}
