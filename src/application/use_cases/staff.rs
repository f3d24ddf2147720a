use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::application::use_cases::{
    authorization::{StoreAccess, StoreRoleRepo},
    user::UserRepo,
};
use crate::domain::entities::store_role::{StoreRole, StoreRoleType};

#[derive(Debug, Clone, Serialize)]
pub struct StaffMember {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: StoreRoleType,
    pub joined_at: Option<NaiveDateTime>,
}

#[derive(Clone)]
pub struct StaffUseCases {
    access: StoreAccess,
    roles: Arc<dyn StoreRoleRepo>,
    users: Arc<dyn UserRepo>,
}

impl StaffUseCases {
    pub fn new(access: StoreAccess, roles: Arc<dyn StoreRoleRepo>, users: Arc<dyn UserRepo>) -> Self {
        Self { access, roles, users }
    }

    #[instrument(skip(self))]
    pub async fn list_staff(&self, user_id: Uuid, store_id: Uuid) -> AppResult<Vec<StaffMember>> {
        self.access
            .require_store_role(user_id, store_id, StoreRoleType::Staff)
            .await?;

        let mut members = Vec::new();
        for role in self.roles.list_by_store(store_id).await? {
            // Roles can outlive a user row briefly while an account is being deleted.
            if let Some(member) = self.users.get_by_id(role.user_id).await? {
                members.push(StaffMember {
                    user_id: member.id,
                    username: member.username,
                    email: member.email,
                    first_name: member.first_name,
                    last_name: member.last_name,
                    role: role.role,
                    joined_at: role.created_at,
                });
            }
        }
        Ok(members)
    }

    #[instrument(skip(self))]
    pub async fn add_staff(
        &self,
        user_id: Uuid,
        store_id: Uuid,
        target_user_id: Uuid,
        role: StoreRoleType,
    ) -> AppResult<StoreRole> {
        self.access
            .require_store_role(user_id, store_id, StoreRoleType::Admin)
            .await?;
        reject_owner_grant(role)?;

        if self.users.get_by_id(target_user_id).await?.is_none() {
            return Err(AppError::NotFound);
        }
        if self.roles.get(store_id, target_user_id).await?.is_some() {
            return Err(AppError::Conflict {
                field: "user_id",
                message: "User already has a role in this store".into(),
            });
        }

        let assigned = self.roles.assign(store_id, target_user_id, role).await?;
        info!(%store_id, %target_user_id, role = role.as_str(), "Staff member added");
        Ok(assigned)
    }

    #[instrument(skip(self))]
    pub async fn update_staff_role(
        &self,
        user_id: Uuid,
        store_id: Uuid,
        target_user_id: Uuid,
        role: StoreRoleType,
    ) -> AppResult<StoreRole> {
        let store = self
            .access
            .require_store_role(user_id, store_id, StoreRoleType::Admin)
            .await?;
        reject_owner_grant(role)?;
        if store.owner_id == target_user_id {
            return Err(AppError::InvalidInput("The store owner's role cannot be changed".into()));
        }
        if self.roles.get(store_id, target_user_id).await?.is_none() {
            return Err(AppError::NotFound);
        }
        self.roles.update_role(store_id, target_user_id, role).await
    }

    #[instrument(skip(self))]
    pub async fn remove_staff(&self, user_id: Uuid, store_id: Uuid, target_user_id: Uuid) -> AppResult<()> {
        let store = self
            .access
            .require_store_role(user_id, store_id, StoreRoleType::Admin)
            .await?;
        if store.owner_id == target_user_id {
            return Err(AppError::InvalidInput("The store owner cannot be removed".into()));
        }
        if self.roles.get(store_id, target_user_id).await?.is_none() {
            return Err(AppError::NotFound);
        }
        self.roles.remove(store_id, target_user_id).await?;
        info!(%store_id, %target_user_id, "Staff member removed");
        Ok(())
    }
}

fn reject_owner_grant(role: StoreRoleType) -> AppResult<()> {
    if role == StoreRoleType::Owner {
        return Err(AppError::InvalidInput("The owner role cannot be granted".into()));
    }
    Ok(())
}
