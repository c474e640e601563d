use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use common_auth::Role;
use common_http_errors::ApiError;
use common_money::minor_units_from_f64;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{StoreBackend, StoreConfig};
use crate::models::{
    ClassFilter, ClassOffering, ClassStatus, ClassUpdate, DeleteOutcome, EnrollmentReceipt,
    Identity, PaymentFilter, PaymentRecord, ProfileUpdate, Selection, SelectionFilter,
    UpdateOutcome,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Identity,
    Class,
    Selection,
}

impl Entity {
    pub fn not_found_code(&self) -> &'static str {
        match self {
            Entity::Identity => "user_not_found",
            Entity::Class => "class_not_found",
            Entity::Selection => "selection_not_found",
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity:?} '{id}' not found")]
    NotFound { entity: Entity, id: String },
    #[error("{message}")]
    Conflict { code: &'static str, message: String },
    #[error("{message}")]
    Rejected { code: &'static str, message: String },
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(entity: Entity, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn class_full(class_id: Uuid) -> Self {
        Self::Conflict {
            code: "class_full",
            message: format!("class {class_id} has no available seats"),
        }
    }

    pub fn already_selected(class_id: Uuid) -> Self {
        Self::Conflict {
            code: "already_selected",
            message: format!("class {class_id} is already selected"),
        }
    }

    pub fn already_enrolled(class_id: Uuid) -> Self {
        Self::Conflict {
            code: "already_enrolled",
            message: format!("already enrolled in class {class_id}"),
        }
    }

    pub fn amount_mismatch(class_id: Uuid, amount: f64, price: f64) -> Self {
        Self::Rejected {
            code: "amount_mismatch",
            message: format!("amount {amount} does not match the price {price} of class {class_id}"),
        }
    }

    pub fn already_paid(selection_id: Uuid) -> Self {
        Self::Conflict {
            code: "duplicate_record",
            message: format!("selection {selection_id} has already been paid for"),
        }
    }
}

/// Compares a paid amount with a class price in minor units.
pub(crate) fn ensure_amount_covers(class_id: Uuid, amount: f64, price: f64) -> StoreResult<()> {
    let paid = minor_units_from_f64(amount)
        .map_err(|_| StoreError::amount_mismatch(class_id, amount, price))?;
    let due = minor_units_from_f64(price).map_err(|err| {
        StoreError::Backend(format!("class {class_id} has an unusable price: {err}"))
    })?;
    if paid != due {
        return Err(StoreError::amount_mismatch(class_id, amount, price));
    }
    Ok(())
}

/// Unique indexes from `migrations/0002_enrollment_uniqueness.sql`.
const SELECTIONS_EMAIL_CLASS_KEY: &str = "selections_email_class_key";
const PAYMENTS_EMAIL_CLASS_KEY: &str = "payments_email_class_key";

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                let code = match db.constraint() {
                    Some(SELECTIONS_EMAIL_CLASS_KEY) => "already_selected",
                    Some(PAYMENTS_EMAIL_CLASS_KEY) => "already_enrolled",
                    _ => "duplicate_record",
                };
                StoreError::Conflict {
                    code,
                    message: db.message().to_string(),
                }
            }
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::Unavailable(err.to_string()),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => ApiError::NotFound {
                code: entity.not_found_code(),
                message: Some(format!("{id} not found")),
            },
            StoreError::Conflict { code, message } => ApiError::Conflict {
                code,
                message: Some(message),
            },
            StoreError::Rejected { code, message } => ApiError::BadRequest {
                code,
                message: Some(message),
            },
            StoreError::Unavailable(message) => {
                warn!(error = %message, "store unavailable");
                ApiError::Unavailable { message: None }
            }
            StoreError::Backend(message) => {
                tracing::error!(error = %message, "store operation failed");
                ApiError::Internal { message: None }
            }
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Identity>>;
    /// Creates the identity on first write; never touches `role`.
    async fn upsert_by_email(&self, email: &str, profile: ProfileUpdate) -> StoreResult<Identity>;
    async fn update_role_by_id(&self, id: Uuid, role: Role) -> StoreResult<UpdateOutcome>;
    async fn delete_by_id(&self, id: Uuid) -> StoreResult<DeleteOutcome>;
    async fn list_all(&self) -> StoreResult<Vec<Identity>>;
}

#[async_trait]
pub trait ClassStore: Send + Sync {
    async fn find(&self, filter: ClassFilter) -> StoreResult<Vec<ClassOffering>>;
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<ClassOffering>>;
    async fn insert(&self, class: ClassOffering) -> StoreResult<ClassOffering>;
    /// Applies the given fields and sends the class back for review.
    async fn update_by_id(&self, id: Uuid, update: ClassUpdate) -> StoreResult<UpdateOutcome>;
    async fn set_status(
        &self,
        id: Uuid,
        status: ClassStatus,
        feedback: Option<String>,
    ) -> StoreResult<UpdateOutcome>;
}

#[async_trait]
pub trait SelectionStore: Send + Sync {
    /// At most one selection per `(email, class_id)`; a second is `already_selected`.
    async fn insert(&self, selection: Selection) -> StoreResult<Selection>;
    async fn find(&self, filter: SelectionFilter) -> StoreResult<Vec<Selection>>;
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Selection>>;
    async fn delete_by_id(&self, id: Uuid) -> StoreResult<DeleteOutcome>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn insert(&self, payment: PaymentRecord) -> StoreResult<PaymentRecord>;
    /// Newest first.
    async fn find(&self, filter: PaymentFilter) -> StoreResult<Vec<PaymentRecord>>;
}

#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    /// Records `payment`, deletes the selection it consumes and moves one seat
    /// of the class from available to enrolled, all or nothing.
    ///
    /// The seat counts are read from the stored class, never from the caller.
    /// Rejected with `duplicate_record` when the selection was already paid
    /// for and `already_enrolled` when the student has paid for the class.
    async fn finalize_enrollment(&self, payment: PaymentRecord) -> StoreResult<EnrollmentReceipt>;
}

#[derive(Clone)]
enum Backend {
    Postgres(PgPool),
    Memory,
}

/// Process-wide handle to every collection. Opened once before serving and
/// closed after the server has drained.
#[derive(Clone)]
pub struct Stores {
    pub identities: Arc<dyn IdentityStore>,
    pub classes: Arc<dyn ClassStore>,
    pub selections: Arc<dyn SelectionStore>,
    pub payments: Arc<dyn PaymentStore>,
    pub enrollments: Arc<dyn EnrollmentStore>,
    backend: Backend,
}

impl Stores {
    pub fn postgres(pool: PgPool) -> Self {
        let store = Arc::new(PgStore::new(pool.clone()));
        Self {
            identities: store.clone(),
            classes: store.clone(),
            selections: store.clone(),
            payments: store.clone(),
            enrollments: store,
            backend: Backend::Postgres(pool),
        }
    }

    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            identities: store.clone(),
            classes: store.clone(),
            selections: store.clone(),
            payments: store.clone(),
            enrollments: store,
            backend: Backend::Memory,
        }
    }

    pub async fn connect(config: &StoreConfig) -> anyhow::Result<Self> {
        match config.backend {
            StoreBackend::Memory => {
                warn!("STORE_BACKEND=memory; data will not survive a restart");
                Ok(Self::memory(Arc::new(MemoryStore::new())))
            }
            StoreBackend::Postgres => {
                let url = config
                    .database_url
                    .as_deref()
                    .context("DATABASE_URL must be set when STORE_BACKEND=postgres")?;
                let pool = PgPoolOptions::new()
                    .max_connections(config.max_connections)
                    .acquire_timeout(Duration::from_secs(5))
                    .connect(url)
                    .await
                    .context("failed to connect to Postgres")?;
                sqlx::migrate!("./migrations")
                    .run(&pool)
                    .await
                    .context("failed to apply migrations")?;
                sqlx::query("SELECT 1")
                    .execute(&pool)
                    .await
                    .context("database ping failed")?;
                info!(max_connections = config.max_connections, "connected to Postgres");
                Ok(Self::postgres(pool))
            }
        }
    }

    pub async fn close(&self) {
        if let Backend::Postgres(pool) = &self.backend {
            pool.close().await;
            info!("Postgres pool closed");
        }
    }
}
