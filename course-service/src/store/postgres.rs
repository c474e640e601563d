use async_trait::async_trait;
use common_auth::Role;
use sqlx::{query, query_as, PgPool};
use tracing::debug;
use uuid::Uuid;

use super::{
    ensure_amount_covers, ClassStore, EnrollmentStore, Entity, IdentityStore, PaymentStore,
    SelectionStore, StoreError, StoreResult,
};
use crate::models::{
    ClassFilter, ClassOffering, ClassStatus, ClassUpdate, DeleteOutcome, EnrollmentReceipt,
    Identity, PaymentFilter, PaymentRecord, ProfileUpdate, SeatCounts, Selection,
    SelectionFilter, UpdateOutcome,
};

const IDENTITY_COLUMNS: &str = "id, email, name, photo_url, role, created_at, updated_at";
const CLASS_COLUMNS: &str = "id, name, image_url, instructor_name, instructor_email, price, \
     available_seats, enrolled, status, feedback, created_at";
const SELECTION_COLUMNS: &str = "id, email, class_id, class_name, price, created_at";
const PAYMENT_COLUMNS: &str = "id, email, amount, transaction_id, enrolled_class_id, \
     deleted_selection_id, class_name, date";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityStore for PgStore {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Identity>> {
        let sql = format!("SELECT {IDENTITY_COLUMNS} FROM users WHERE email = $1");
        let identity = query_as::<_, Identity>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(identity)
    }

    async fn upsert_by_email(&self, email: &str, profile: ProfileUpdate) -> StoreResult<Identity> {
        let sql = format!(
            "INSERT INTO users (id, email, name, photo_url) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (email) DO UPDATE SET \
                name = COALESCE(EXCLUDED.name, users.name), \
                photo_url = COALESCE(EXCLUDED.photo_url, users.photo_url), \
                updated_at = NOW() \
             RETURNING {IDENTITY_COLUMNS}"
        );
        let identity = query_as::<_, Identity>(&sql)
            .bind(Uuid::new_v4())
            .bind(email)
            .bind(profile.name)
            .bind(profile.photo_url)
            .fetch_one(&self.pool)
            .await?;
        Ok(identity)
    }

    async fn update_role_by_id(&self, id: Uuid, role: Role) -> StoreResult<UpdateOutcome> {
        let result = query("UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(role.as_str())
            .execute(&self.pool)
            .await?;
        Ok(UpdateOutcome::rows(result.rows_affected()))
    }

    async fn delete_by_id(&self, id: Uuid) -> StoreResult<DeleteOutcome> {
        let result = query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(DeleteOutcome {
            deleted_count: result.rows_affected(),
        })
    }

    async fn list_all(&self) -> StoreResult<Vec<Identity>> {
        let sql = format!("SELECT {IDENTITY_COLUMNS} FROM users ORDER BY created_at");
        let identities = query_as::<_, Identity>(&sql).fetch_all(&self.pool).await?;
        Ok(identities)
    }
}

#[async_trait]
impl ClassStore for PgStore {
    async fn find(&self, filter: ClassFilter) -> StoreResult<Vec<ClassOffering>> {
        let sql = format!(
            "SELECT {CLASS_COLUMNS} FROM classes \
             WHERE ($1::text IS NULL OR instructor_email = $1) \
               AND ($2::text IS NULL OR status = $2) \
               AND ($3::uuid[] IS NULL OR id = ANY($3)) \
             ORDER BY created_at DESC"
        );
        let classes = query_as::<_, ClassOffering>(&sql)
            .bind(filter.instructor_email)
            .bind(filter.status.map(|status| status.as_str()))
            .bind(filter.ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(classes)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<ClassOffering>> {
        let sql = format!("SELECT {CLASS_COLUMNS} FROM classes WHERE id = $1");
        let class = query_as::<_, ClassOffering>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(class)
    }

    async fn insert(&self, class: ClassOffering) -> StoreResult<ClassOffering> {
        let sql = format!(
            "INSERT INTO classes ({CLASS_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {CLASS_COLUMNS}"
        );
        let stored = query_as::<_, ClassOffering>(&sql)
            .bind(class.id)
            .bind(class.name)
            .bind(class.image_url)
            .bind(class.instructor_name)
            .bind(class.instructor_email)
            .bind(class.price)
            .bind(class.available_seats)
            .bind(class.enrolled)
            .bind(class.status)
            .bind(class.feedback)
            .bind(class.created_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(stored)
    }

    async fn update_by_id(&self, id: Uuid, update: ClassUpdate) -> StoreResult<UpdateOutcome> {
        let result = query(
            "UPDATE classes SET \
                name = COALESCE($2, name), \
                image_url = COALESCE($3, image_url), \
                price = COALESCE($4, price), \
                available_seats = COALESCE($5, available_seats), \
                status = 'pending', \
                feedback = NULL \
             WHERE id = $1",
        )
        .bind(id)
        .bind(update.name)
        .bind(update.image_url)
        .bind(update.price)
        .bind(update.available_seats)
        .execute(&self.pool)
        .await?;
        Ok(UpdateOutcome::rows(result.rows_affected()))
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: ClassStatus,
        feedback: Option<String>,
    ) -> StoreResult<UpdateOutcome> {
        let result = query("UPDATE classes SET status = $2, feedback = $3 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .bind(feedback)
            .execute(&self.pool)
            .await?;
        Ok(UpdateOutcome::rows(result.rows_affected()))
    }
}

#[async_trait]
impl SelectionStore for PgStore {
    async fn insert(&self, selection: Selection) -> StoreResult<Selection> {
        let sql = format!(
            "INSERT INTO selections ({SELECTION_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {SELECTION_COLUMNS}"
        );
        let class_id = selection.class_id;
        // Duplicate (email, class_id) surfaces as `already_selected` via the unique index.
        query_as::<_, Selection>(&sql)
            .bind(selection.id)
            .bind(selection.email)
            .bind(selection.class_id)
            .bind(selection.class_name)
            .bind(selection.price)
            .bind(selection.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|err| match err {
                sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                    StoreError::not_found(Entity::Class, class_id)
                }
                other => StoreError::from(other),
            })
    }

    async fn find(&self, filter: SelectionFilter) -> StoreResult<Vec<Selection>> {
        let sql = format!(
            "SELECT {SELECTION_COLUMNS} FROM selections \
             WHERE ($1::text IS NULL OR email = $1) \
               AND ($2::uuid IS NULL OR class_id = $2) \
             ORDER BY created_at DESC"
        );
        let selections = query_as::<_, Selection>(&sql)
            .bind(filter.email)
            .bind(filter.class_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(selections)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Selection>> {
        let sql = format!("SELECT {SELECTION_COLUMNS} FROM selections WHERE id = $1");
        let selection = query_as::<_, Selection>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(selection)
    }

    async fn delete_by_id(&self, id: Uuid) -> StoreResult<DeleteOutcome> {
        let result = query("DELETE FROM selections WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(DeleteOutcome {
            deleted_count: result.rows_affected(),
        })
    }
}

fn insert_payment_sql() -> String {
    format!(
        "INSERT INTO payments ({PAYMENT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         RETURNING {PAYMENT_COLUMNS}"
    )
}

#[async_trait]
impl PaymentStore for PgStore {
    async fn insert(&self, payment: PaymentRecord) -> StoreResult<PaymentRecord> {
        let sql = insert_payment_sql();
        let stored = query_as::<_, PaymentRecord>(&sql)
            .bind(payment.id)
            .bind(payment.email)
            .bind(payment.amount)
            .bind(payment.transaction_id)
            .bind(payment.enrolled_class_id)
            .bind(payment.deleted_selection_id)
            .bind(payment.class_name)
            .bind(payment.date)
            .fetch_one(&self.pool)
            .await?;
        Ok(stored)
    }

    async fn find(&self, filter: PaymentFilter) -> StoreResult<Vec<PaymentRecord>> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments \
             WHERE ($1::text IS NULL OR email = $1) \
               AND ($2::uuid IS NULL OR enrolled_class_id = $2) \
             ORDER BY date DESC"
        );
        let payments = query_as::<_, PaymentRecord>(&sql)
            .bind(filter.email)
            .bind(filter.enrolled_class_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(payments)
    }
}

#[async_trait]
impl EnrollmentStore for PgStore {
    async fn finalize_enrollment(&self, payment: PaymentRecord) -> StoreResult<EnrollmentReceipt> {
        // Dropping `tx` on any early return rolls every step back.
        let mut tx = self.pool.begin().await?;

        let prior = sqlx::query_scalar::<_, Uuid>(
            "SELECT deleted_selection_id FROM payments \
             WHERE deleted_selection_id = $1 OR (email = $2 AND enrolled_class_id = $3)",
        )
        .bind(payment.deleted_selection_id)
        .bind(&payment.email)
        .bind(payment.enrolled_class_id)
        .fetch_all(&mut *tx)
        .await?;
        if prior.contains(&payment.deleted_selection_id) {
            return Err(StoreError::already_paid(payment.deleted_selection_id));
        }
        if !prior.is_empty() {
            return Err(StoreError::already_enrolled(payment.enrolled_class_id));
        }

        let sql = insert_payment_sql();
        let stored = query_as::<_, PaymentRecord>(&sql)
            .bind(payment.id)
            .bind(&payment.email)
            .bind(payment.amount)
            .bind(&payment.transaction_id)
            .bind(payment.enrolled_class_id)
            .bind(payment.deleted_selection_id)
            .bind(&payment.class_name)
            .bind(payment.date)
            .fetch_one(&mut *tx)
            .await?;

        let removed = query("DELETE FROM selections WHERE id = $1 AND email = $2 AND class_id = $3")
            .bind(payment.deleted_selection_id)
            .bind(&payment.email)
            .bind(payment.enrolled_class_id)
            .execute(&mut *tx)
            .await?;
        if removed.rows_affected() == 0 {
            return Err(StoreError::not_found(
                Entity::Selection,
                payment.deleted_selection_id,
            ));
        }

        // Row lock keeps the price fixed until commit.
        let price =
            sqlx::query_scalar::<_, f64>("SELECT price FROM classes WHERE id = $1 FOR UPDATE")
                .bind(payment.enrolled_class_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| StoreError::not_found(Entity::Class, payment.enrolled_class_id))?;
        ensure_amount_covers(payment.enrolled_class_id, payment.amount, price)?;

        let seats = query_as::<_, SeatCounts>(
            "UPDATE classes \
             SET available_seats = available_seats - 1, enrolled = enrolled + 1 \
             WHERE id = $1 AND available_seats > 0 \
             RETURNING available_seats, enrolled",
        )
        .bind(payment.enrolled_class_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::class_full(payment.enrolled_class_id))?;

        tx.commit().await?;
        debug!(payment_id = %stored.id, "enrollment committed");

        Ok(EnrollmentReceipt {
            payment_record_id: stored.id,
            deleted_selection_id: payment.deleted_selection_id,
            updated_seats: seats,
            payment: stored,
        })
    }
}
