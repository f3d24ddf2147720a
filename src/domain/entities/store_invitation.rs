use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::store_role::StoreRoleType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Declined,
    Expired,
    Cancelled,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Declined => "declined",
            InvitationStatus::Expired => "expired",
            InvitationStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "accepted" => InvitationStatus::Accepted,
            "declined" => InvitationStatus::Declined,
            "expired" => InvitationStatus::Expired,
            "cancelled" | "canceled" => InvitationStatus::Cancelled,
            _ => InvitationStatus::Pending,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreInvitation {
    pub id: Uuid,
    pub store_id: Uuid,
    pub email: String,
    pub role: StoreRoleType,
    pub status: InvitationStatus,
    pub invited_by: Uuid,
    pub expires_at: NaiveDateTime,
    pub responded_at: Option<NaiveDateTime>,
    pub created_at: Option<NaiveDateTime>,
}

impl StoreInvitation {
    pub fn is_expired_at(&self, now: NaiveDateTime) -> bool {
        now > self.expires_at
    }

    /// Invitations are addressed by email; comparison ignores case.
    pub fn is_addressed_to(&self, email: &str) -> bool {
        self.email.eq_ignore_ascii_case(email.trim())
    }
}
