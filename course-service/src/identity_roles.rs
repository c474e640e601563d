use std::sync::Arc;

use async_trait::async_trait;
use common_auth::{GuardError, Role, RoleResolver};

use crate::store::{IdentityStore, StoreError};

/// Resolves roles from the identity store on every call so that role
/// changes take effect without re-issuing credentials.
pub struct StoreRoleResolver {
    identities: Arc<dyn IdentityStore>,
}

impl StoreRoleResolver {
    pub fn new(identities: Arc<dyn IdentityStore>) -> Self {
        Self { identities }
    }
}

#[async_trait]
impl RoleResolver for StoreRoleResolver {
    async fn current_role(&self, email: &str) -> Result<Option<Role>, GuardError> {
        let identity = self
            .identities
            .find_by_email(email)
            .await
            .map_err(|err: StoreError| GuardError::Lookup(err.to_string()))?;
        Ok(identity.and_then(|identity| identity.stored_role()))
    }
}
