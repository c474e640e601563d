use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use common_auth::{ensure_self, AuthContext};
use common_http_errors::{ApiError, ApiResult};
use tracing::info;
use uuid::Uuid;

use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::models::{
    ClassStatus, DeleteOutcome, EmailQuery, NewSelection, PaymentFilter, Selection,
    SelectionFilter,
};
use crate::AppState;

pub async fn select_class(
    auth: AuthContext,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<NewSelection>,
) -> ApiResult<(StatusCode, Json<Selection>)> {
    ensure_self(&auth, &request.email)?;

    let class = state
        .stores
        .classes
        .find_by_id(request.class_id)
        .await?
        .ok_or_else(|| ApiError::not_found("class_not_found"))?;
    if class.class_status() != Some(ClassStatus::Approved) {
        return Err(ApiError::Conflict {
            code: "class_not_approved",
            message: Some(format!("class {} is not open for enrollment", class.id)),
        });
    }
    if class.available_seats <= 0 {
        return Err(ApiError::Conflict {
            code: "class_full",
            message: Some(format!("class {} has no available seats", class.id)),
        });
    }

    let paid = state
        .stores
        .payments
        .find(PaymentFilter {
            email: Some(request.email.clone()),
            enrolled_class_id: Some(class.id),
        })
        .await?;
    if !paid.is_empty() {
        return Err(ApiError::Conflict {
            code: "already_enrolled",
            message: Some(format!("already enrolled in class {}", class.id)),
        });
    }

    // The store rejects a second selection of the same class as `already_selected`.
    let selection = Selection {
        id: Uuid::new_v4(),
        email: request.email,
        class_id: class.id,
        class_name: Some(class.name),
        price: Some(class.price),
        created_at: Utc::now(),
    };
    let stored = state.stores.selections.insert(selection).await?;
    info!(selection_id = %stored.id, class_id = %stored.class_id, "class selected");
    Ok((StatusCode::CREATED, Json(stored)))
}

pub async fn list_selections(
    auth: AuthContext,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<EmailQuery>,
) -> ApiResult<Json<Vec<Selection>>> {
    let Some(email) = query.email else {
        return Ok(Json(Vec::new()));
    };
    ensure_self(&auth, &email)?;
    let selections = state
        .stores
        .selections
        .find(SelectionFilter {
            email: Some(email),
            class_id: None,
        })
        .await?;
    Ok(Json(selections))
}

pub async fn delete_selection(
    auth: AuthContext,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<DeleteOutcome>> {
    let Some(selection) = state.stores.selections.find_by_id(id).await? else {
        return Ok(Json(DeleteOutcome { deleted_count: 0 }));
    };
    ensure_self(&auth, &selection.email)?;
    let outcome = state.stores.selections.delete_by_id(id).await?;
    Ok(Json(outcome))
}
