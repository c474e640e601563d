use axum::extract::State;
use axum::Json;
use common_auth::IssuedToken;
use common_http_errors::ApiResult;
use serde_json::Value;
use tracing::info;

use crate::extract::ApiJson;
use crate::AppState;

/// Exchanges caller-supplied claims for a signed credential. Anyone may call
/// this; the claims only identify the caller; authority always comes from the
/// stored role.
pub async fn issue_token(
    State(state): State<AppState>,
    ApiJson(claims): ApiJson<Value>,
) -> ApiResult<Json<IssuedToken>> {
    let issued = state.token_issuer.issue(claims)?;
    info!(expires_at = %issued.expires_at, "issued access token");
    Ok(Json(issued))
}
