use chrono::Utc;
use common_http_errors::ApiError;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{EnrollmentReceipt, EnrollmentRequest, PaymentRecord};
use crate::store::{EnrollmentStore, StoreError};

#[derive(Debug, Error)]
pub enum EnrollmentError {
    #[error("payment amount must be a positive number")]
    InvalidAmount,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EnrollmentError {
    /// Metric label for a failed attempt.
    pub fn outcome(&self) -> &'static str {
        match self {
            EnrollmentError::InvalidAmount => "invalid_amount",
            EnrollmentError::Store(StoreError::NotFound { entity, .. }) => entity.not_found_code(),
            EnrollmentError::Store(StoreError::Conflict { code, .. })
            | EnrollmentError::Store(StoreError::Rejected { code, .. }) => *code,
            EnrollmentError::Store(StoreError::Unavailable(_)) => "unavailable",
            EnrollmentError::Store(StoreError::Backend(_)) => "error",
        }
    }
}

impl From<EnrollmentError> for ApiError {
    fn from(err: EnrollmentError) -> Self {
        match err {
            EnrollmentError::InvalidAmount => ApiError::bad_request("invalid_amount", err.to_string()),
            EnrollmentError::Store(inner) => ApiError::from(inner),
        }
    }
}

/// Records the payment, consumes the selection and takes one seat, as a
/// single unit. The caller's seat snapshot is only compared for logging;
/// the stored counts decide the outcome.
pub async fn finalize_enrollment(
    store: &dyn EnrollmentStore,
    request: EnrollmentRequest,
) -> Result<EnrollmentReceipt, EnrollmentError> {
    if !request.amount.is_finite() || request.amount <= 0.0 {
        return Err(EnrollmentError::InvalidAmount);
    }

    let snapshot = request.seat_snapshot();
    let payment = PaymentRecord {
        id: Uuid::new_v4(),
        email: request.email,
        amount: request.amount,
        transaction_id: request.transaction_id,
        enrolled_class_id: request.enrolled_class_id,
        deleted_selection_id: request.deleted_selection_id,
        class_name: request.class_name,
        date: Utc::now(),
    };

    let receipt = store.finalize_enrollment(payment).await?;

    if let Some(expected) = snapshot.map(|seats| seats.after_enrollment()) {
        if expected != receipt.updated_seats {
            warn!(
                class_id = %receipt.payment.enrolled_class_id,
                client_available = expected.available_seats,
                stored_available = receipt.updated_seats.available_seats,
                "seat snapshot was stale; stored counts applied"
            );
        }
    }

    info!(
        email = %receipt.payment.email,
        class_id = %receipt.payment.enrolled_class_id,
        payment_id = %receipt.payment_record_id,
        available_seats = receipt.updated_seats.available_seats,
        enrolled = receipt.updated_seats.enrolled,
        "enrollment finalized"
    );
    Ok(receipt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClassOffering, Selection};
    use crate::store::{ClassStore, MemoryStore, SelectionStore};

    async fn seeded(available: i32, enrolled: i32) -> (MemoryStore, ClassOffering, Selection) {
        let store = MemoryStore::new();
        let class = ClassStore::insert(
            &store,
            ClassOffering {
                id: Uuid::new_v4(),
                name: "Pottery".into(),
                image_url: None,
                instructor_name: None,
                instructor_email: "teach@example.com".into(),
                price: 25.0,
                available_seats: available,
                enrolled,
                status: "approved".into(),
                feedback: None,
                created_at: Utc::now(),
            },
        )
        .await
        .unwrap();
        let selection = SelectionStore::insert(
            &store,
            Selection {
                id: Uuid::new_v4(),
                email: "ana@example.com".into(),
                class_id: class.id,
                class_name: Some(class.name.clone()),
                price: Some(class.price),
                created_at: Utc::now(),
            },
        )
        .await
        .unwrap();
        (store, class, selection)
    }

    fn request(class: &ClassOffering, selection: &Selection, amount: f64) -> EnrollmentRequest {
        EnrollmentRequest {
            email: selection.email.clone(),
            amount,
            transaction_id: Some("pi_123".into()),
            enrolled_class_id: class.id,
            deleted_selection_id: selection.id,
            class_name: Some(class.name.clone()),
            available_seats: Some(class.available_seats),
            enrolled: Some(class.enrolled),
        }
    }

    #[tokio::test]
    async fn rejects_non_positive_amounts() {
        let (store, class, selection) = seeded(3, 0).await;
        for amount in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = finalize_enrollment(&store, request(&class, &selection, amount))
                .await
                .unwrap_err();
            assert!(matches!(err, EnrollmentError::InvalidAmount));
        }
    }

    #[tokio::test]
    async fn stale_snapshot_does_not_override_stored_counts() {
        let (store, class, selection) = seeded(5, 2).await;
        let mut req = request(&class, &selection, 25.0);
        req.available_seats = Some(40);
        req.enrolled = Some(0);

        let receipt = finalize_enrollment(&store, req).await.unwrap();
        assert_eq!(receipt.updated_seats.available_seats, 4);
        assert_eq!(receipt.updated_seats.enrolled, 3);
    }

    #[tokio::test]
    async fn second_attempt_on_same_selection_is_rejected() {
        let (store, class, selection) = seeded(5, 0).await;
        finalize_enrollment(&store, request(&class, &selection, 25.0))
            .await
            .unwrap();
        let err = finalize_enrollment(&store, request(&class, &selection, 25.0))
            .await
            .unwrap_err();
        assert_eq!(err.outcome(), "duplicate_record");
    }

    #[tokio::test]
    async fn amount_is_checked_against_stored_price() {
        let (store, class, selection) = seeded(5, 0).await;
        let err = finalize_enrollment(&store, request(&class, &selection, 2.5))
            .await
            .unwrap_err();
        assert_eq!(err.outcome(), "amount_mismatch");
        assert_eq!(ApiError::from(err).status(), axum::http::StatusCode::BAD_REQUEST);
    }
}
