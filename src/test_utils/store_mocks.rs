//! In-memory mock implementations for store, membership and visitor repository traits.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::{
        authorization::StoreRoleRepo, invitation::InvitationRepo, store::StoreRepo,
        visitor::VisitorRepo,
    },
    domain::entities::{
        store::Store,
        store_invitation::{InvitationStatus, StoreInvitation},
        store_role::{StoreRole, StoreRoleType},
        visitor::{StoreVisitor, VisitorStats},
    },
};

// ============================================================================
// InMemoryStoreRepo
// ============================================================================

/// In-memory implementation of StoreRepo for testing.
///
/// `list_for_user` only sees ownership; role memberships live in a separate mock.
#[derive(Default)]
pub struct InMemoryStoreRepo {
    pub stores: Mutex<HashMap<Uuid, Store>>,
}

impl InMemoryStoreRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stores(stores: Vec<Store>) -> Self {
        let map: HashMap<Uuid, Store> = stores.into_iter().map(|s| (s.id, s)).collect();
        Self {
            stores: Mutex::new(map),
        }
    }
}

#[async_trait]
impl StoreRepo for InMemoryStoreRepo {
    async fn create(
        &self,
        owner_id: Uuid,
        name: &str,
        slug: &str,
        description: Option<&str>,
    ) -> AppResult<Store> {
        let now = chrono::Utc::now().naive_utc();
        let store = Store {
            id: Uuid::new_v4(),
            owner_id,
            name: name.to_string(),
            slug: slug.to_string(),
            description: description.map(str::to_string),
            logo_url: None,
            is_active: true,
            subdomain: None,
            template: None,
            created_at: Some(now),
            updated_at: Some(now),
        };
        self.stores.lock().unwrap().insert(store.id, store.clone());
        Ok(store)
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Store>> {
        Ok(self.stores.lock().unwrap().get(&id).cloned())
    }

    async fn get_by_subdomain(&self, subdomain: &str) -> AppResult<Option<Store>> {
        Ok(self
            .stores
            .lock()
            .unwrap()
            .values()
            .find(|s| s.subdomain.as_deref() == Some(subdomain))
            .cloned())
    }

    async fn slug_exists(&self, slug: &str) -> AppResult<bool> {
        Ok(self.stores.lock().unwrap().values().any(|s| s.slug == slug))
    }

    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<Store>> {
        let mut stores: Vec<Store> = self
            .stores
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.owner_id == user_id)
            .cloned()
            .collect();
        stores.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(stores)
    }

    async fn list_all(&self) -> AppResult<Vec<Store>> {
        Ok(self.stores.lock().unwrap().values().cloned().collect())
    }

    async fn count_owned_by(&self, user_id: Uuid) -> AppResult<i64> {
        Ok(self
            .stores
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.owner_id == user_id)
            .count() as i64)
    }

    async fn update(&self, store: &Store) -> AppResult<Store> {
        let mut stores = self.stores.lock().unwrap();
        if !stores.contains_key(&store.id) {
            return Err(AppError::NotFound);
        }
        stores.insert(store.id, store.clone());
        Ok(store.clone())
    }

    async fn set_subdomain(&self, id: Uuid, subdomain: Option<&str>) -> AppResult<Store> {
        let mut stores = self.stores.lock().unwrap();
        let store = stores.get_mut(&id).ok_or(AppError::NotFound)?;
        store.subdomain = subdomain.map(str::to_string);
        Ok(store.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.stores.lock().unwrap().remove(&id);
        Ok(())
    }
}

// ============================================================================
// InMemoryStoreRoleRepo
// ============================================================================

/// In-memory implementation of StoreRoleRepo for testing.
#[derive(Default)]
pub struct InMemoryStoreRoleRepo {
    pub roles: Mutex<HashMap<(Uuid, Uuid), StoreRole>>,
}

impl InMemoryStoreRoleRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StoreRoleRepo for InMemoryStoreRoleRepo {
    async fn assign(&self, store_id: Uuid, user_id: Uuid, role: StoreRoleType) -> AppResult<StoreRole> {
        let mut roles = self.roles.lock().unwrap();
        let entry = roles.entry((store_id, user_id)).or_insert_with(|| StoreRole {
            id: Uuid::new_v4(),
            store_id,
            user_id,
            role,
            created_at: Some(chrono::Utc::now().naive_utc()),
        });
        entry.role = role;
        Ok(entry.clone())
    }

    async fn get(&self, store_id: Uuid, user_id: Uuid) -> AppResult<Option<StoreRole>> {
        Ok(self.roles.lock().unwrap().get(&(store_id, user_id)).cloned())
    }

    async fn list_by_store(&self, store_id: Uuid) -> AppResult<Vec<StoreRole>> {
        Ok(self
            .roles
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.store_id == store_id)
            .cloned()
            .collect())
    }

    async fn list_by_user(&self, user_id: Uuid) -> AppResult<Vec<StoreRole>> {
        Ok(self
            .roles
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn update_role(&self, store_id: Uuid, user_id: Uuid, role: StoreRoleType) -> AppResult<StoreRole> {
        let mut roles = self.roles.lock().unwrap();
        let existing = roles.get_mut(&(store_id, user_id)).ok_or(AppError::NotFound)?;
        existing.role = role;
        Ok(existing.clone())
    }

    async fn remove(&self, store_id: Uuid, user_id: Uuid) -> AppResult<()> {
        self.roles.lock().unwrap().remove(&(store_id, user_id));
        Ok(())
    }
}

// ============================================================================
// InMemoryInvitationRepo
// ============================================================================

/// In-memory implementation of InvitationRepo for testing.
#[derive(Default)]
pub struct InMemoryInvitationRepo {
    pub invitations: Mutex<HashMap<Uuid, StoreInvitation>>,
}

impl InMemoryInvitationRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_invitations(invitations: Vec<StoreInvitation>) -> Self {
        let map: HashMap<Uuid, StoreInvitation> =
            invitations.into_iter().map(|i| (i.id, i)).collect();
        Self {
            invitations: Mutex::new(map),
        }
    }

    pub fn get_all(&self) -> Vec<StoreInvitation> {
        self.invitations.lock().unwrap().values().cloned().collect()
    }

    fn pending_where(&self, predicate: impl Fn(&StoreInvitation) -> bool) -> Vec<StoreInvitation> {
        let mut pending: Vec<StoreInvitation> = self
            .invitations
            .lock()
            .unwrap()
            .values()
            .filter(|i| i.status == InvitationStatus::Pending && predicate(i))
            .cloned()
            .collect();
        pending.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        pending
    }
}

#[async_trait]
impl InvitationRepo for InMemoryInvitationRepo {
    async fn create(
        &self,
        store_id: Uuid,
        email: &str,
        role: StoreRoleType,
        invited_by: Uuid,
        expires_at: NaiveDateTime,
    ) -> AppResult<StoreInvitation> {
        let invitation = StoreInvitation {
            id: Uuid::new_v4(),
            store_id,
            email: email.to_string(),
            role,
            status: InvitationStatus::Pending,
            invited_by,
            expires_at,
            responded_at: None,
            created_at: Some(chrono::Utc::now().naive_utc()),
        };
        self.invitations
            .lock()
            .unwrap()
            .insert(invitation.id, invitation.clone());
        Ok(invitation)
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<StoreInvitation>> {
        Ok(self.invitations.lock().unwrap().get(&id).cloned())
    }

    async fn find_pending(&self, store_id: Uuid, email: &str) -> AppResult<Option<StoreInvitation>> {
        Ok(self
            .pending_where(|i| i.store_id == store_id && i.is_addressed_to(email))
            .into_iter()
            .next())
    }

    async fn list_pending_by_store(&self, store_id: Uuid) -> AppResult<Vec<StoreInvitation>> {
        Ok(self.pending_where(|i| i.store_id == store_id))
    }

    async fn list_pending_by_email(&self, email: &str) -> AppResult<Vec<StoreInvitation>> {
        Ok(self.pending_where(|i| i.is_addressed_to(email)))
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: InvitationStatus,
        responded_at: Option<NaiveDateTime>,
    ) -> AppResult<StoreInvitation> {
        let mut invitations = self.invitations.lock().unwrap();
        let invitation = invitations.get_mut(&id).ok_or(AppError::NotFound)?;
        invitation.status = status;
        invitation.responded_at = responded_at;
        Ok(invitation.clone())
    }

    async fn expire_stale(&self, now: NaiveDateTime) -> AppResult<u64> {
        let mut expired = 0;
        for invitation in self.invitations.lock().unwrap().values_mut() {
            if invitation.status == InvitationStatus::Pending && invitation.expires_at < now {
                invitation.status = InvitationStatus::Expired;
                expired += 1;
            }
        }
        Ok(expired)
    }
}

// ============================================================================
// InMemoryVisitorRepo
// ============================================================================

/// In-memory implementation of VisitorRepo for testing.
#[derive(Default)]
pub struct InMemoryVisitorRepo {
    pub visitors: Mutex<HashMap<Uuid, StoreVisitor>>,
}

impl InMemoryVisitorRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_all(&self) -> Vec<StoreVisitor> {
        self.visitors.lock().unwrap().values().cloned().collect()
    }

    fn find(&self, predicate: impl Fn(&StoreVisitor) -> bool) -> Option<StoreVisitor> {
        self.visitors
            .lock()
            .unwrap()
            .values()
            .find(|v| predicate(v))
            .cloned()
    }
}

#[async_trait]
impl VisitorRepo for InMemoryVisitorRepo {
    async fn create(&self, visitor: &StoreVisitor) -> AppResult<StoreVisitor> {
        self.visitors
            .lock()
            .unwrap()
            .insert(visitor.id, visitor.clone());
        Ok(visitor.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<StoreVisitor>> {
        Ok(self.visitors.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_email(&self, store_id: Uuid, email: &str) -> AppResult<Option<StoreVisitor>> {
        Ok(self.find(|v| {
            v.store_id == store_id && v.email.as_deref().is_some_and(|e| e.eq_ignore_ascii_case(email))
        }))
    }

    async fn find_by_key(&self, store_id: Uuid, visitor_key: &str) -> AppResult<Option<StoreVisitor>> {
        Ok(self.find(|v| v.store_id == store_id && v.visitor_key == visitor_key))
    }

    async fn list_by_store(&self, store_id: Uuid) -> AppResult<Vec<StoreVisitor>> {
        let mut visitors: Vec<StoreVisitor> = self
            .visitors
            .lock()
            .unwrap()
            .values()
            .filter(|v| v.store_id == store_id)
            .cloned()
            .collect();
        visitors.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(visitors)
    }

    async fn update(&self, visitor: &StoreVisitor) -> AppResult<StoreVisitor> {
        let mut visitors = self.visitors.lock().unwrap();
        if !visitors.contains_key(&visitor.id) {
            return Err(AppError::NotFound);
        }
        visitors.insert(visitor.id, visitor.clone());
        Ok(visitor.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.visitors.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn stats(&self, store_id: Uuid, since: NaiveDateTime) -> AppResult<VisitorStats> {
        let visitors = self.visitors.lock().unwrap();
        let mine: Vec<&StoreVisitor> = visitors.values().filter(|v| v.store_id == store_id).collect();
        Ok(VisitorStats {
            total_visitors: mine.len() as i64,
            recent_visitors: mine
                .iter()
                .filter(|v| v.created_at.is_some_and(|at| at >= since))
                .count() as i64,
            newsletter_subscribers: mine.iter().filter(|v| v.newsletter).count() as i64,
        })
    }
}
