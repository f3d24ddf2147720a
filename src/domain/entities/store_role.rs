use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Roles a user can hold in a store, from most to least privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreRoleType {
    Owner,
    Admin,
    Manager,
    Staff,
}

impl StoreRoleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreRoleType::Owner => "owner",
            StoreRoleType::Admin => "admin",
            StoreRoleType::Manager => "manager",
            StoreRoleType::Staff => "staff",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "owner" => Some(StoreRoleType::Owner),
            "admin" => Some(StoreRoleType::Admin),
            "manager" => Some(StoreRoleType::Manager),
            "staff" => Some(StoreRoleType::Staff),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            StoreRoleType::Owner => 4,
            StoreRoleType::Admin => 3,
            StoreRoleType::Manager => 2,
            StoreRoleType::Staff => 1,
        }
    }

    /// True when this role grants at least the privileges of `required`.
    pub fn satisfies(&self, required: StoreRoleType) -> bool {
        self.rank() >= required.rank()
    }

    /// Permission scope carried in access tokens for this role.
    pub fn permission_scope(&self) -> &'static str {
        match self {
            StoreRoleType::Owner => "full_access",
            StoreRoleType::Admin => "manage",
            StoreRoleType::Manager => "edit",
            StoreRoleType::Staff => "view",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreRole {
    pub id: Uuid,
    pub store_id: Uuid,
    pub user_id: Uuid,
    pub role: StoreRoleType,
    pub created_at: Option<NaiveDateTime>,
}

impl StoreRole {
    pub fn permission(&self) -> String {
        format!("store:{}:{}", self.store_id, self.role.permission_scope())
    }
}
