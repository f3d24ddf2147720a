//! Store-role checks every store-scoped use case runs before acting, plus the
//! resource-level access rules exposed to clients.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::application::use_cases::{
    collection::CollectionRepo, invitation::InvitationRepo, product::ProductRepo,
    store::StoreRepo, user::UserRepo, visitor::VisitorRepo,
};
use crate::domain::entities::{
    store::Store,
    store_role::{StoreRole, StoreRoleType},
    user::User,
};

#[async_trait]
pub trait StoreRoleRepo: Send + Sync {
    async fn assign(&self, store_id: Uuid, user_id: Uuid, role: StoreRoleType) -> AppResult<StoreRole>;
    async fn get(&self, store_id: Uuid, user_id: Uuid) -> AppResult<Option<StoreRole>>;
    async fn list_by_store(&self, store_id: Uuid) -> AppResult<Vec<StoreRole>>;
    async fn list_by_user(&self, user_id: Uuid) -> AppResult<Vec<StoreRole>>;
    async fn update_role(&self, store_id: Uuid, user_id: Uuid, role: StoreRoleType) -> AppResult<StoreRole>;
    async fn remove(&self, store_id: Uuid, user_id: Uuid) -> AppResult<()>;
}

// ============================================================================
// Store role guard
// ============================================================================

#[derive(Clone)]
pub struct StoreAccess {
    stores: Arc<dyn StoreRepo>,
    roles: Arc<dyn StoreRoleRepo>,
}

impl StoreAccess {
    pub fn new(stores: Arc<dyn StoreRepo>, roles: Arc<dyn StoreRoleRepo>) -> Self {
        Self { stores, roles }
    }

    /// The role a user effectively holds in a store. The owner is always `Owner`.
    pub async fn effective_role(&self, user_id: Uuid, store: &Store) -> AppResult<Option<StoreRoleType>> {
        if store.owner_id == user_id {
            return Ok(Some(StoreRoleType::Owner));
        }
        Ok(self.roles.get(store.id, user_id).await?.map(|r| r.role))
    }

    /// Fails with `NotFound` when the store does not exist.
    #[instrument(skip(self))]
    pub async fn has_store_role(
        &self,
        user_id: Uuid,
        store_id: Uuid,
        required: StoreRoleType,
    ) -> AppResult<bool> {
        let store = self.load(store_id).await?;
        self.check(user_id, &store, required).await
    }

    /// Returns the store when the user holds at least `required`, `Forbidden` otherwise.
    #[instrument(skip(self))]
    pub async fn require_store_role(
        &self,
        user_id: Uuid,
        store_id: Uuid,
        required: StoreRoleType,
    ) -> AppResult<Store> {
        let store = self.load(store_id).await?;
        if !self.check(user_id, &store, required).await? {
            tracing::debug!(%user_id, %store_id, required = required.as_str(), "Store role check failed");
            return Err(AppError::Forbidden);
        }
        Ok(store)
    }

    /// Permission strings carried in access tokens.
    pub async fn permissions_for(&self, user_id: Uuid) -> AppResult<Vec<String>> {
        Ok(self
            .roles
            .list_by_user(user_id)
            .await?
            .iter()
            .map(StoreRole::permission)
            .collect())
    }

    async fn load(&self, store_id: Uuid) -> AppResult<Store> {
        self.stores.get_by_id(store_id).await?.ok_or(AppError::NotFound)
    }

    async fn check(&self, user_id: Uuid, store: &Store, required: StoreRoleType) -> AppResult<bool> {
        Ok(self
            .effective_role(user_id, store)
            .await?
            .is_some_and(|role| role.satisfies(required)))
    }
}

/// Plan and catalog administration is limited to platform admins.
pub async fn require_platform_admin(users: &dyn UserRepo, user_id: Uuid) -> AppResult<User> {
    let user = users.get_by_id(user_id).await?.ok_or(AppError::InvalidToken)?;
    if !user.is_platform_admin {
        return Err(AppError::Forbidden);
    }
    Ok(user)
}

// ============================================================================
// Resource access
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    Store,
    Invitation,
    Product,
    Collection,
    Visitor,
}

impl ResourceType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "store" => Some(ResourceType::Store),
            "invitation" => Some(ResourceType::Invitation),
            "product" => Some(ResourceType::Product),
            "collection" => Some(ResourceType::Collection),
            "visitor" => Some(ResourceType::Visitor),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceAction {
    View,
    Edit,
    Delete,
    Manage,
    Accept,
    Decline,
}

impl ResourceAction {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "view" => Some(ResourceAction::View),
            "edit" => Some(ResourceAction::Edit),
            "delete" => Some(ResourceAction::Delete),
            "manage" => Some(ResourceAction::Manage),
            "accept" => Some(ResourceAction::Accept),
            "decline" => Some(ResourceAction::Decline),
            _ => None,
        }
    }
}

/// Role a store-scoped resource requires for an action, `None` when the action
/// does not apply to the resource.
pub fn required_role(resource: ResourceType, action: ResourceAction) -> Option<StoreRoleType> {
    use ResourceAction::*;
    match (resource, action) {
        (ResourceType::Store, View) => Some(StoreRoleType::Staff),
        (ResourceType::Store, Edit) => Some(StoreRoleType::Manager),
        (ResourceType::Store, Delete) => Some(StoreRoleType::Owner),
        (ResourceType::Store, Manage) => Some(StoreRoleType::Admin),
        (ResourceType::Invitation, Delete | Manage) => Some(StoreRoleType::Admin),
        (ResourceType::Product | ResourceType::Collection | ResourceType::Visitor, View) => {
            Some(StoreRoleType::Staff)
        }
        (ResourceType::Product | ResourceType::Collection | ResourceType::Visitor, Edit) => {
            Some(StoreRoleType::Manager)
        }
        (ResourceType::Visitor, Delete) => Some(StoreRoleType::Manager),
        (ResourceType::Product | ResourceType::Collection, Delete) => Some(StoreRoleType::Admin),
        _ => None,
    }
}

#[derive(Clone)]
pub struct ResourceAccessUseCases {
    access: StoreAccess,
    users: Arc<dyn UserRepo>,
    invitations: Arc<dyn InvitationRepo>,
    products: Arc<dyn ProductRepo>,
    collections: Arc<dyn CollectionRepo>,
    visitors: Arc<dyn VisitorRepo>,
}

impl ResourceAccessUseCases {
    pub fn new(
        access: StoreAccess,
        users: Arc<dyn UserRepo>,
        invitations: Arc<dyn InvitationRepo>,
        products: Arc<dyn ProductRepo>,
        collections: Arc<dyn CollectionRepo>,
        visitors: Arc<dyn VisitorRepo>,
    ) -> Self {
        Self {
            access,
            users,
            invitations,
            products,
            collections,
            visitors,
        }
    }

    /// Unknown resource types, unknown actions and missing resources all answer `false`.
    #[instrument(skip(self))]
    pub async fn can_access_resource(
        &self,
        user_id: Uuid,
        resource_type: &str,
        resource_id: Uuid,
        action: &str,
    ) -> AppResult<bool> {
        let (Some(resource), Some(action)) = (
            ResourceType::from_str(resource_type),
            ResourceAction::from_str(action),
        ) else {
            return Ok(false);
        };

        if resource == ResourceType::Invitation {
            return self.can_access_invitation(user_id, resource_id, action).await;
        }

        let Some(required) = required_role(resource, action) else {
            return Ok(false);
        };
        let store_id = match resource {
            ResourceType::Store => Some(resource_id),
            ResourceType::Product => self.products.get_by_id(resource_id).await?.map(|p| p.store_id),
            ResourceType::Collection => {
                self.collections.get_by_id(resource_id).await?.map(|c| c.store_id)
            }
            ResourceType::Visitor => self.visitors.get_by_id(resource_id).await?.map(|v| v.store_id),
            ResourceType::Invitation => None,
        };
        let Some(store_id) = store_id else {
            return Ok(false);
        };
        self.has_role_or_false(user_id, store_id, required).await
    }

    async fn can_access_invitation(
        &self,
        user_id: Uuid,
        invitation_id: Uuid,
        action: ResourceAction,
    ) -> AppResult<bool> {
        let Some(invitation) = self.invitations.get_by_id(invitation_id).await? else {
            return Ok(false);
        };
        match action {
            ResourceAction::View | ResourceAction::Accept | ResourceAction::Decline => {
                let Some(user) = self.users.get_by_id(user_id).await? else {
                    return Ok(false);
                };
                Ok(invitation.is_addressed_to(&user.email))
            }
            ResourceAction::Delete | ResourceAction::Manage => {
                self.has_role_or_false(user_id, invitation.store_id, StoreRoleType::Admin)
                    .await
            }
            ResourceAction::Edit => Ok(false),
        }
    }

    async fn has_role_or_false(
        &self,
        user_id: Uuid,
        store_id: Uuid,
        required: StoreRoleType,
    ) -> AppResult<bool> {
        match self.access.has_store_role(user_id, store_id, required).await {
            Ok(allowed) => Ok(allowed),
            Err(AppError::NotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
