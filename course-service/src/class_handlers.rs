use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use common_auth::{ensure_self, AuthContext, RequireAdmin, RequireInstructor};
use common_http_errors::{ApiError, ApiResult};
use tracing::info;
use uuid::Uuid;

use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::models::{
    ClassFilter, ClassOffering, ClassStatus, ClassUpdate, EmailQuery, NewClass, StatusChange,
    UpdateOutcome,
};
use crate::AppState;

fn validate_terms(price: Option<f64>, available_seats: Option<i32>) -> ApiResult<()> {
    if let Some(price) = price {
        if !price.is_finite() || price < 0.0 {
            return Err(ApiError::bad_request(
                "invalid_price",
                "price must be a non-negative number",
            ));
        }
    }
    if available_seats.is_some_and(|seats| seats < 0) {
        return Err(ApiError::bad_request(
            "invalid_seats",
            "availableSeats must not be negative",
        ));
    }
    Ok(())
}

pub async fn create_class(
    instructor: RequireInstructor,
    State(state): State<AppState>,
    ApiJson(new_class): ApiJson<NewClass>,
) -> ApiResult<(StatusCode, Json<ClassOffering>)> {
    if new_class.name.trim().is_empty() {
        return Err(ApiError::bad_request("invalid_name", "class name is required"));
    }
    validate_terms(Some(new_class.price), Some(new_class.available_seats))?;

    let class = ClassOffering {
        id: Uuid::new_v4(),
        name: new_class.name,
        image_url: new_class.image_url,
        instructor_name: new_class.instructor_name,
        instructor_email: instructor.email().to_string(),
        price: new_class.price,
        available_seats: new_class.available_seats,
        enrolled: 0,
        status: ClassStatus::Pending.as_str().to_string(),
        feedback: None,
        created_at: Utc::now(),
    };
    let stored = state.stores.classes.insert(class).await?;
    info!(class_id = %stored.id, instructor = %stored.instructor_email, "class submitted for review");
    Ok((StatusCode::CREATED, Json(stored)))
}

pub async fn update_class(
    instructor: RequireInstructor,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(update): ApiJson<ClassUpdate>,
) -> ApiResult<Json<UpdateOutcome>> {
    let class = state
        .stores
        .classes
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("class_not_found"))?;
    ensure_self(&instructor.auth, &class.instructor_email)?;
    validate_terms(update.price, update.available_seats)?;

    let outcome = state.stores.classes.update_by_id(id, update).await?;
    Ok(Json(outcome))
}

pub async fn set_class_status(
    admin: RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(change): ApiJson<StatusChange>,
) -> ApiResult<Json<UpdateOutcome>> {
    let outcome = state
        .stores
        .classes
        .set_status(id, change.status, change.feedback)
        .await?;
    info!(
        admin = %admin.email(),
        class_id = %id,
        status = change.status.as_str(),
        matched = outcome.matched_count,
        "class status changed"
    );
    Ok(Json(outcome))
}

pub async fn list_all_classes(
    _admin: RequireAdmin,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ClassOffering>>> {
    let classes = state.stores.classes.find(ClassFilter::default()).await?;
    Ok(Json(classes))
}

pub async fn list_my_classes(
    auth: AuthContext,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<EmailQuery>,
) -> ApiResult<Json<Vec<ClassOffering>>> {
    let Some(email) = query.email else {
        return Ok(Json(Vec::new()));
    };
    ensure_self(&auth, &email)?;
    let classes = state
        .stores
        .classes
        .find(ClassFilter {
            instructor_email: Some(email),
            ..ClassFilter::default()
        })
        .await?;
    Ok(Json(classes))
}
