use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use common_auth::Role;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    ensure_amount_covers, ClassStore, EnrollmentStore, Entity, IdentityStore, PaymentStore,
    SelectionStore, StoreError, StoreResult,
};
use crate::models::{
    ClassFilter, ClassOffering, ClassStatus, ClassUpdate, DeleteOutcome, EnrollmentReceipt,
    Identity, PaymentFilter, PaymentRecord, ProfileUpdate, Selection, SelectionFilter,
    UpdateOutcome,
};

/// Store backed by process memory. Every operation takes one lock, so the
/// enrollment steps are applied together or not at all.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    offline: AtomicBool,
}

#[derive(Default)]
struct MemoryState {
    identities: Vec<Identity>,
    classes: HashMap<Uuid, ClassOffering>,
    selections: HashMap<Uuid, Selection>,
    payments: Vec<PaymentRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every operation fails with `StoreError::Unavailable`.
    pub fn simulate_outage(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Identity>> {
        self.ensure_online()?;
        let state = self.state.read().await;
        Ok(state.identities.iter().find(|i| i.email == email).cloned())
    }

    async fn upsert_by_email(&self, email: &str, profile: ProfileUpdate) -> StoreResult<Identity> {
        self.ensure_online()?;
        let mut state = self.state.write().await;
        let now = Utc::now();
        if let Some(existing) = state.identities.iter_mut().find(|i| i.email == email) {
            if profile.name.is_some() {
                existing.name = profile.name;
            }
            if profile.photo_url.is_some() {
                existing.photo_url = profile.photo_url;
            }
            existing.updated_at = now;
            return Ok(existing.clone());
        }
        let identity = Identity {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: profile.name,
            photo_url: profile.photo_url,
            role: None,
            created_at: now,
            updated_at: now,
        };
        state.identities.push(identity.clone());
        Ok(identity)
    }

    async fn update_role_by_id(&self, id: Uuid, role: Role) -> StoreResult<UpdateOutcome> {
        self.ensure_online()?;
        let mut state = self.state.write().await;
        match state.identities.iter_mut().find(|i| i.id == id) {
            Some(identity) => {
                identity.role = Some(role.as_str().to_string());
                identity.updated_at = Utc::now();
                Ok(UpdateOutcome::rows(1))
            }
            None => Ok(UpdateOutcome::rows(0)),
        }
    }

    async fn delete_by_id(&self, id: Uuid) -> StoreResult<DeleteOutcome> {
        self.ensure_online()?;
        let mut state = self.state.write().await;
        let before = state.identities.len();
        state.identities.retain(|i| i.id != id);
        Ok(DeleteOutcome {
            deleted_count: (before - state.identities.len()) as u64,
        })
    }

    async fn list_all(&self) -> StoreResult<Vec<Identity>> {
        self.ensure_online()?;
        let state = self.state.read().await;
        Ok(state.identities.clone())
    }
}

fn class_matches(class: &ClassOffering, filter: &ClassFilter) -> bool {
    filter
        .instructor_email
        .as_ref()
        .map_or(true, |email| &class.instructor_email == email)
        && filter
            .status
            .map_or(true, |status| class.status == status.as_str())
        && filter.ids.as_ref().map_or(true, |ids| ids.contains(&class.id))
}

#[async_trait]
impl ClassStore for MemoryStore {
    async fn find(&self, filter: ClassFilter) -> StoreResult<Vec<ClassOffering>> {
        self.ensure_online()?;
        let state = self.state.read().await;
        let mut classes: Vec<ClassOffering> = state
            .classes
            .values()
            .filter(|class| class_matches(class, &filter))
            .cloned()
            .collect();
        classes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(classes)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<ClassOffering>> {
        self.ensure_online()?;
        let state = self.state.read().await;
        Ok(state.classes.get(&id).cloned())
    }

    async fn insert(&self, class: ClassOffering) -> StoreResult<ClassOffering> {
        self.ensure_online()?;
        let mut state = self.state.write().await;
        state.classes.insert(class.id, class.clone());
        Ok(class)
    }

    async fn update_by_id(&self, id: Uuid, update: ClassUpdate) -> StoreResult<UpdateOutcome> {
        self.ensure_online()?;
        let mut state = self.state.write().await;
        let Some(class) = state.classes.get_mut(&id) else {
            return Ok(UpdateOutcome::rows(0));
        };
        if let Some(name) = update.name {
            class.name = name;
        }
        if update.image_url.is_some() {
            class.image_url = update.image_url;
        }
        if let Some(price) = update.price {
            class.price = price;
        }
        if let Some(seats) = update.available_seats {
            class.available_seats = seats;
        }
        class.status = ClassStatus::Pending.as_str().to_string();
        class.feedback = None;
        Ok(UpdateOutcome::rows(1))
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: ClassStatus,
        feedback: Option<String>,
    ) -> StoreResult<UpdateOutcome> {
        self.ensure_online()?;
        let mut state = self.state.write().await;
        let Some(class) = state.classes.get_mut(&id) else {
            return Ok(UpdateOutcome::rows(0));
        };
        class.status = status.as_str().to_string();
        class.feedback = feedback;
        Ok(UpdateOutcome::rows(1))
    }
}

#[async_trait]
impl SelectionStore for MemoryStore {
    async fn insert(&self, selection: Selection) -> StoreResult<Selection> {
        self.ensure_online()?;
        let mut state = self.state.write().await;
        if !state.classes.contains_key(&selection.class_id) {
            return Err(StoreError::not_found(Entity::Class, selection.class_id));
        }
        if state
            .selections
            .values()
            .any(|s| s.email == selection.email && s.class_id == selection.class_id)
        {
            return Err(StoreError::already_selected(selection.class_id));
        }
        state.selections.insert(selection.id, selection.clone());
        Ok(selection)
    }

    async fn find(&self, filter: SelectionFilter) -> StoreResult<Vec<Selection>> {
        self.ensure_online()?;
        let state = self.state.read().await;
        let mut selections: Vec<Selection> = state
            .selections
            .values()
            .filter(|s| filter.email.as_ref().map_or(true, |email| &s.email == email))
            .filter(|s| filter.class_id.map_or(true, |class_id| s.class_id == class_id))
            .cloned()
            .collect();
        selections.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(selections)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Selection>> {
        self.ensure_online()?;
        let state = self.state.read().await;
        Ok(state.selections.get(&id).cloned())
    }

    async fn delete_by_id(&self, id: Uuid) -> StoreResult<DeleteOutcome> {
        self.ensure_online()?;
        let mut state = self.state.write().await;
        let deleted_count = u64::from(state.selections.remove(&id).is_some());
        Ok(DeleteOutcome { deleted_count })
    }
}

fn has_paid_for(payments: &[PaymentRecord], email: &str, class_id: Uuid) -> bool {
    payments
        .iter()
        .any(|p| p.email == email && p.enrolled_class_id == class_id)
}

#[async_trait]
impl PaymentStore for MemoryStore {
    async fn insert(&self, payment: PaymentRecord) -> StoreResult<PaymentRecord> {
        self.ensure_online()?;
        let mut state = self.state.write().await;
        if state
            .payments
            .iter()
            .any(|p| p.deleted_selection_id == payment.deleted_selection_id)
        {
            return Err(StoreError::already_paid(payment.deleted_selection_id));
        }
        if has_paid_for(&state.payments, &payment.email, payment.enrolled_class_id) {
            return Err(StoreError::already_enrolled(payment.enrolled_class_id));
        }
        state.payments.push(payment.clone());
        Ok(payment)
    }

    async fn find(&self, filter: PaymentFilter) -> StoreResult<Vec<PaymentRecord>> {
        self.ensure_online()?;
        let state = self.state.read().await;
        let mut payments: Vec<PaymentRecord> = state
            .payments
            .iter()
            .filter(|p| filter.email.as_ref().map_or(true, |email| &p.email == email))
            .filter(|p| {
                filter
                    .enrolled_class_id
                    .map_or(true, |class_id| p.enrolled_class_id == class_id)
            })
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(payments)
    }
}

#[async_trait]
impl EnrollmentStore for MemoryStore {
    async fn finalize_enrollment(&self, payment: PaymentRecord) -> StoreResult<EnrollmentReceipt> {
        self.ensure_online()?;
        let mut state = self.state.write().await;

        // Validate every step before mutating anything.
        if state
            .payments
            .iter()
            .any(|p| p.deleted_selection_id == payment.deleted_selection_id)
        {
            return Err(StoreError::already_paid(payment.deleted_selection_id));
        }
        if has_paid_for(&state.payments, &payment.email, payment.enrolled_class_id) {
            return Err(StoreError::already_enrolled(payment.enrolled_class_id));
        }
        let owns_selection = state
            .selections
            .get(&payment.deleted_selection_id)
            .is_some_and(|s| s.email == payment.email && s.class_id == payment.enrolled_class_id);
        if !owns_selection {
            return Err(StoreError::not_found(
                Entity::Selection,
                payment.deleted_selection_id,
            ));
        }
        let seats = match state.classes.get(&payment.enrolled_class_id) {
            None => {
                return Err(StoreError::not_found(Entity::Class, payment.enrolled_class_id));
            }
            Some(class) => {
                ensure_amount_covers(class.id, payment.amount, class.price)?;
                if class.available_seats <= 0 {
                    return Err(StoreError::class_full(class.id));
                }
                class.seats().after_enrollment()
            }
        };

        state.payments.push(payment.clone());
        state.selections.remove(&payment.deleted_selection_id);
        if let Some(class) = state.classes.get_mut(&payment.enrolled_class_id) {
            class.available_seats = seats.available_seats;
            class.enrolled = seats.enrolled;
        }

        Ok(EnrollmentReceipt {
            payment_record_id: payment.id,
            deleted_selection_id: payment.deleted_selection_id,
            updated_seats: seats,
            payment,
        })
    }
}
