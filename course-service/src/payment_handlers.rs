use axum::extract::State;
use axum::Json;
use common_auth::{ensure_self, AuthContext};
use common_http_errors::{ApiError, ApiResult};
use common_money::minor_units_from_f64;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::enrollment::finalize_enrollment;
use crate::extract::{ApiJson, ApiQuery};
use crate::models::{
    ClassFilter, ClassOffering, EmailQuery, EnrollmentReceipt, EnrollmentRequest, PaymentFilter,
    PaymentRecord,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PaymentIntentRequest {
    pub price: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentResponse {
    pub client_secret: String,
    pub amount: i64,
    pub currency: String,
}

pub async fn create_payment_intent(
    auth: AuthContext,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<PaymentIntentRequest>,
) -> ApiResult<Json<PaymentIntentResponse>> {
    let amount = minor_units_from_f64(request.price)
        .map_err(|err| ApiError::bad_request("invalid_price", err.to_string()))?;
    if amount <= 0 {
        return Err(ApiError::bad_request(
            "invalid_price",
            "price must be greater than zero",
        ));
    }

    let intent = state
        .gateway
        .create_payment_intent(amount, &state.payment_currency)
        .await
        .map_err(|err| {
            warn!(error = %err, email = %auth.email(), "payment intent creation failed");
            ApiError::Upstream {
                code: "payment_gateway_error",
                message: None,
            }
        })?;
    info!(email = %auth.email(), intent = %intent.id, amount, "payment intent created");

    Ok(Json(PaymentIntentResponse {
        client_secret: intent.client_secret,
        amount,
        currency: state.payment_currency.clone(),
    }))
}

pub async fn confirm_payment(
    auth: AuthContext,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<EnrollmentRequest>,
) -> ApiResult<Json<EnrollmentReceipt>> {
    ensure_self(&auth, &request.email)?;
    match finalize_enrollment(state.stores.enrollments.as_ref(), request).await {
        Ok(receipt) => {
            state.metrics.enrollment("committed");
            Ok(Json(receipt))
        }
        Err(err) => {
            state.metrics.enrollment(err.outcome());
            Err(err.into())
        }
    }
}

pub async fn list_payments(
    auth: AuthContext,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<EmailQuery>,
) -> ApiResult<Json<Vec<PaymentRecord>>> {
    let Some(email) = query.email else {
        return Ok(Json(Vec::new()));
    };
    ensure_self(&auth, &email)?;
    let payments = state
        .stores
        .payments
        .find(PaymentFilter {
            email: Some(email),
            enrolled_class_id: None,
        })
        .await?;
    Ok(Json(payments))
}

pub async fn list_enrolled_classes(
    auth: AuthContext,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<EmailQuery>,
) -> ApiResult<Json<Vec<ClassOffering>>> {
    let Some(email) = query.email else {
        return Ok(Json(Vec::new()));
    };
    ensure_self(&auth, &email)?;
    let payments = state
        .stores
        .payments
        .find(PaymentFilter {
            email: Some(email),
            enrolled_class_id: None,
        })
        .await?;
    let mut ids: Vec<Uuid> = payments.iter().map(|p| p.enrolled_class_id).collect();
    ids.sort();
    ids.dedup();
    if ids.is_empty() {
        return Ok(Json(Vec::new()));
    }
    let classes = state
        .stores
        .classes
        .find(ClassFilter {
            ids: Some(ids),
            ..ClassFilter::default()
        })
        .await?;
    Ok(Json(classes))
}
