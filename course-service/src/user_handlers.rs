use axum::extract::State;
use axum::Json;
use common_auth::{ensure_self, AuthContext, RequireAdmin, Role};
use common_http_errors::ApiResult;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::extract::{ApiJson, ApiPath};
use crate::models::{DeleteOutcome, Identity, ProfileUpdate, UpdateOutcome};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct RoleView {
    pub email: String,
    pub role: Role,
    pub admin: bool,
    pub instructor: bool,
}

#[derive(Debug, Deserialize)]
pub struct RoleChange {
    pub role: Role,
}

pub async fn upsert_user(
    auth: AuthContext,
    State(state): State<AppState>,
    ApiPath(email): ApiPath<String>,
    ApiJson(profile): ApiJson<ProfileUpdate>,
) -> ApiResult<Json<Identity>> {
    ensure_self(&auth, &email)?;
    let identity = state.stores.identities.upsert_by_email(&email, profile).await?;
    Ok(Json(identity))
}

pub async fn get_user_role(
    auth: AuthContext,
    State(state): State<AppState>,
    ApiPath(email): ApiPath<String>,
) -> ApiResult<Json<RoleView>> {
    ensure_self(&auth, &email)?;
    let role = state
        .stores
        .identities
        .find_by_email(&email)
        .await?
        .map(|identity| identity.effective_role())
        .unwrap_or(Role::Student);
    Ok(Json(RoleView {
        email,
        role,
        admin: role == Role::Admin,
        instructor: role == Role::Instructor,
    }))
}

pub async fn list_users(
    _admin: RequireAdmin,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<Identity>>> {
    let identities = state.stores.identities.list_all().await?;
    Ok(Json(identities))
}

pub async fn update_user_role(
    admin: RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(change): ApiJson<RoleChange>,
) -> ApiResult<Json<UpdateOutcome>> {
    let outcome = state
        .stores
        .identities
        .update_role_by_id(id, change.role)
        .await?;
    info!(
        admin = %admin.email(),
        user_id = %id,
        role = %change.role,
        matched = outcome.matched_count,
        "role updated"
    );
    Ok(Json(outcome))
}

pub async fn delete_user(
    admin: RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<DeleteOutcome>> {
    let outcome = state.stores.identities.delete_by_id(id).await?;
    info!(admin = %admin.email(), user_id = %id, deleted = outcome.deleted_count, "user deleted");
    Ok(Json(outcome))
}
