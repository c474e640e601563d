use chrono::{DateTime, Utc};
use common_auth::Role;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub photo_url: Option<String>,
    pub role: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Identity {
    /// Parsed stored role. Unrecognised values are treated as absent so they
    /// never satisfy an elevated check.
    pub fn stored_role(&self) -> Option<Role> {
        let raw = self.role.as_deref()?;
        match raw.parse::<Role>() {
            Ok(role) => Some(role),
            Err(err) => {
                warn!(email = %self.email, error = %err, "ignoring unrecognised stored role");
                None
            }
        }
    }

    pub fn effective_role(&self) -> Role {
        Role::effective(self.stored_role())
    }
}

/// Profile fields a user may write about themselves. `role` is deliberately
/// absent; unknown fields in the request body are dropped.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassStatus {
    Pending,
    Approved,
    Denied,
}

impl ClassStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassStatus::Pending => "pending",
            ClassStatus::Approved => "approved",
            ClassStatus::Denied => "denied",
        }
    }

    pub fn from_str(s: &str) -> Option<ClassStatus> {
        match s {
            "pending" => Some(ClassStatus::Pending),
            "approved" => Some(ClassStatus::Approved),
            "denied" => Some(ClassStatus::Denied),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ClassOffering {
    pub id: Uuid,
    pub name: String,
    pub image_url: Option<String>,
    pub instructor_name: Option<String>,
    pub instructor_email: String,
    pub price: f64,
    pub available_seats: i32,
    pub enrolled: i32,
    pub status: String,
    pub feedback: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ClassOffering {
    pub fn class_status(&self) -> Option<ClassStatus> {
        ClassStatus::from_str(&self.status)
    }

    pub fn seats(&self) -> SeatCounts {
        SeatCounts {
            available_seats: self.available_seats,
            enrolled: self.enrolled,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClass {
    pub name: String,
    pub image_url: Option<String>,
    pub instructor_name: Option<String>,
    pub price: f64,
    pub available_seats: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassUpdate {
    pub name: Option<String>,
    pub image_url: Option<String>,
    pub price: Option<f64>,
    pub available_seats: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusChange {
    pub status: ClassStatus,
    #[serde(default)]
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ClassFilter {
    pub instructor_email: Option<String>,
    pub status: Option<ClassStatus>,
    pub ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SeatCounts {
    pub available_seats: i32,
    pub enrolled: i32,
}

impl SeatCounts {
    /// One seat moves from available to enrolled.
    pub fn after_enrollment(self) -> SeatCounts {
        SeatCounts {
            available_seats: self.available_seats - 1,
            enrolled: self.enrolled + 1,
        }
    }

    pub fn total(self) -> i32 {
        self.available_seats + self.enrolled
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub id: Uuid,
    pub email: String,
    pub class_id: Uuid,
    pub class_name: Option<String>,
    pub price: Option<f64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSelection {
    pub email: String,
    pub class_id: Uuid,
}

#[derive(Debug, Clone, Default)]
pub struct SelectionFilter {
    pub email: Option<String>,
    pub class_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub id: Uuid,
    pub email: String,
    pub amount: f64,
    pub transaction_id: Option<String>,
    pub enrolled_class_id: Uuid,
    pub deleted_selection_id: Uuid,
    pub class_name: Option<String>,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct PaymentFilter {
    pub email: Option<String>,
    pub enrolled_class_id: Option<Uuid>,
}

/// Body of a payment confirmation. `available_seats`/`enrolled` are the
/// client's view of the class when the selection was made.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentRequest {
    pub email: String,
    pub amount: f64,
    #[serde(default)]
    pub transaction_id: Option<String>,
    pub enrolled_class_id: Uuid,
    pub deleted_selection_id: Uuid,
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub available_seats: Option<i32>,
    #[serde(default)]
    pub enrolled: Option<i32>,
}

impl EnrollmentRequest {
    pub fn seat_snapshot(&self) -> Option<SeatCounts> {
        self.available_seats.map(|available_seats| SeatCounts {
            available_seats,
            enrolled: self.enrolled.unwrap_or(0),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentReceipt {
    pub payment_record_id: Uuid,
    pub deleted_selection_id: Uuid,
    pub updated_seats: SeatCounts,
    pub payment: PaymentRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOutcome {
    pub matched_count: u64,
    pub modified_count: u64,
}

impl UpdateOutcome {
    pub fn rows(count: u64) -> Self {
        Self {
            matched_count: count,
            modified_count: count,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    pub deleted_count: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmailQuery {
    pub email: Option<String>,
}
