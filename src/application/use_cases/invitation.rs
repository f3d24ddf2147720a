use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDateTime, Utc};
use secrecy::SecretString;
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::application::email_templates::store_invitation_email;
use crate::application::jwt;
use crate::application::use_cases::{
    authorization::{StoreAccess, StoreRoleRepo},
    store::StoreRepo,
    user::{EmailSender, UserRepo},
};
use crate::application::validators::is_valid_email;
use crate::domain::entities::{
    store_invitation::{InvitationStatus, StoreInvitation},
    store_role::{StoreRole, StoreRoleType},
};

#[async_trait]
pub trait InvitationRepo: Send + Sync {
    async fn create(
        &self,
        store_id: Uuid,
        email: &str,
        role: StoreRoleType,
        invited_by: Uuid,
        expires_at: NaiveDateTime,
    ) -> AppResult<StoreInvitation>;
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<StoreInvitation>>;
    async fn find_pending(&self, store_id: Uuid, email: &str) -> AppResult<Option<StoreInvitation>>;
    async fn list_pending_by_store(&self, store_id: Uuid) -> AppResult<Vec<StoreInvitation>>;
    async fn list_pending_by_email(&self, email: &str) -> AppResult<Vec<StoreInvitation>>;
    async fn update_status(
        &self,
        id: Uuid,
        status: InvitationStatus,
        responded_at: Option<NaiveDateTime>,
    ) -> AppResult<StoreInvitation>;
    /// Marks pending invitations past their expiry as expired.
    async fn expire_stale(&self, now: NaiveDateTime) -> AppResult<u64>;
}

#[derive(Debug, Clone, Serialize)]
pub struct InvitationDetails {
    pub invitation_id: Uuid,
    pub email: String,
    pub role: StoreRoleType,
    pub store_name: String,
    pub inviter_name: String,
    pub expires_at: NaiveDateTime,
}

/// Public answer for an invitation link.
#[derive(Debug, Clone, Serialize)]
pub struct InvitationValidation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_exists: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<InvitationDetails>,
}

impl InvitationValidation {
    fn invalid(message: &str) -> Self {
        Self {
            valid: false,
            message: Some(message.to_string()),
            user_exists: None,
            data: None,
        }
    }
}

#[derive(Clone)]
pub struct InvitationSettings {
    pub secret: SecretString,
    pub ttl_days: i64,
    pub app_origin: String,
}

#[derive(Clone)]
pub struct InvitationUseCases {
    invitations: Arc<dyn InvitationRepo>,
    access: StoreAccess,
    roles: Arc<dyn StoreRoleRepo>,
    users: Arc<dyn UserRepo>,
    stores: Arc<dyn StoreRepo>,
    email: Arc<dyn EmailSender>,
    settings: InvitationSettings,
}

impl InvitationUseCases {
    pub fn new(
        invitations: Arc<dyn InvitationRepo>,
        access: StoreAccess,
        roles: Arc<dyn StoreRoleRepo>,
        users: Arc<dyn UserRepo>,
        stores: Arc<dyn StoreRepo>,
        email: Arc<dyn EmailSender>,
        settings: InvitationSettings,
    ) -> Self {
        Self {
            invitations,
            access,
            roles,
            users,
            stores,
            email,
            settings,
        }
    }

    #[instrument(skip(self))]
    pub async fn create_invitation(
        &self,
        user_id: Uuid,
        store_id: Uuid,
        email: &str,
        role: StoreRoleType,
    ) -> AppResult<StoreInvitation> {
        let store = self
            .access
            .require_store_role(user_id, store_id, StoreRoleType::Admin)
            .await?;

        let email = email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return Err(AppError::InvalidInput("Invalid email address".into()));
        }
        if role == StoreRoleType::Owner {
            return Err(AppError::InvalidInput("The owner role cannot be granted".into()));
        }
        if self.invitations.find_pending(store_id, &email).await?.is_some() {
            return Err(AppError::Conflict {
                field: "email",
                message: "A pending invitation already exists for this email".into(),
            });
        }
        if let Some(existing) = self.users.get_by_email(&email).await?
            && (existing.id == store.owner_id
                || self.roles.get(store_id, existing.id).await?.is_some())
        {
            return Err(AppError::Conflict {
                field: "email",
                message: "User is already a member of this store".into(),
            });
        }

        let expires_at = Utc::now().naive_utc() + ChronoDuration::days(self.settings.ttl_days);
        let invitation = self
            .invitations
            .create(store_id, &email, role, user_id, expires_at)
            .await?;

        if let Err(e) = self.send_invitation(user_id, &store.name, &invitation).await {
            // An undelivered invitation must not block a retry for the same email.
            warn!(invitation_id = %invitation.id, error = ?e, "Invitation email failed, cancelling");
            self.invitations
                .update_status(invitation.id, InvitationStatus::Cancelled, None)
                .await?;
            return Err(e);
        }

        info!(invitation_id = %invitation.id, %store_id, "Invitation sent");
        Ok(invitation)
    }

    async fn send_invitation(
        &self,
        inviter_id: Uuid,
        store_name: &str,
        invitation: &StoreInvitation,
    ) -> AppResult<()> {
        let token = jwt::issue_invitation(
            invitation.id,
            &invitation.email,
            &self.settings.secret,
            time::Duration::days(self.settings.ttl_days),
        )?;
        let inviter = self
            .users
            .get_by_id(inviter_id)
            .await?
            .map(|u| u.display_name())
            .unwrap_or_else(|| "A store admin".to_string());
        let link = format!(
            "{}/invitations/accept?token={}",
            self.settings.app_origin, token
        );
        let (subject, html) = store_invitation_email(
            &self.settings.app_origin,
            store_name,
            &inviter,
            invitation.role.as_str(),
            &link,
            invitation.expires_at,
        );
        self.email.send(&invitation.email, &subject, &html).await
    }

    #[instrument(skip(self))]
    pub async fn list_pending(&self, user_id: Uuid, store_id: Uuid) -> AppResult<Vec<StoreInvitation>> {
        self.access
            .require_store_role(user_id, store_id, StoreRoleType::Staff)
            .await?;
        self.invitations.list_pending_by_store(store_id).await
    }

    #[instrument(skip(self))]
    pub async fn list_mine(&self, user_id: Uuid) -> AppResult<Vec<StoreInvitation>> {
        let user = self
            .users
            .get_by_id(user_id)
            .await?
            .ok_or(AppError::NotFound)?;
        self.invitations.list_pending_by_email(&user.email).await
    }

    #[instrument(skip(self))]
    pub async fn accept(&self, user_id: Uuid, invitation_id: Uuid) -> AppResult<StoreRole> {
        let invitation = self.pending_for_invitee(user_id, invitation_id).await?;
        let now = Utc::now().naive_utc();

        if invitation.is_expired_at(now) {
            self.invitations
                .update_status(invitation.id, InvitationStatus::Expired, None)
                .await?;
            return Err(AppError::InvalidInput("Invitation has expired".into()));
        }

        self.invitations
            .update_status(invitation.id, InvitationStatus::Accepted, Some(now))
            .await?;
        let role = match self.roles.get(invitation.store_id, user_id).await? {
            Some(_) => {
                self.roles
                    .update_role(invitation.store_id, user_id, invitation.role)
                    .await?
            }
            None => {
                self.roles
                    .assign(invitation.store_id, user_id, invitation.role)
                    .await?
            }
        };

        info!(%invitation_id, store_id = %invitation.store_id, "Invitation accepted");
        Ok(role)
    }

    #[instrument(skip(self))]
    pub async fn decline(&self, user_id: Uuid, invitation_id: Uuid) -> AppResult<StoreInvitation> {
        let invitation = self.pending_for_invitee(user_id, invitation_id).await?;
        self.invitations
            .update_status(
                invitation.id,
                InvitationStatus::Declined,
                Some(Utc::now().naive_utc()),
            )
            .await
    }

    #[instrument(skip(self))]
    pub async fn cancel(&self, user_id: Uuid, invitation_id: Uuid) -> AppResult<StoreInvitation> {
        let invitation = self
            .invitations
            .get_by_id(invitation_id)
            .await?
            .ok_or(AppError::NotFound)?;
        self.access
            .require_store_role(user_id, invitation.store_id, StoreRoleType::Admin)
            .await?;
        if invitation.status != InvitationStatus::Pending {
            return Err(AppError::InvalidInput("Only pending invitations can be cancelled".into()));
        }
        self.invitations
            .update_status(invitation.id, InvitationStatus::Cancelled, None)
            .await
    }

    /// Public check of an emailed invitation token.
    #[instrument(skip_all)]
    pub async fn validate_token(&self, token: &str) -> AppResult<InvitationValidation> {
        let Ok(invitation_id) = jwt::verify_invitation(token, &self.settings.secret) else {
            return Ok(InvitationValidation::invalid("Invalid or expired invitation token"));
        };
        let Some(invitation) = self.invitations.get_by_id(invitation_id).await? else {
            return Ok(InvitationValidation::invalid("Invitation not found"));
        };
        if invitation.status != InvitationStatus::Pending {
            return Ok(InvitationValidation::invalid(&format!(
                "Invitation is {}",
                invitation.status.as_str()
            )));
        }
        if invitation.is_expired_at(Utc::now().naive_utc()) {
            self.invitations
                .update_status(invitation.id, InvitationStatus::Expired, None)
                .await?;
            return Ok(InvitationValidation::invalid("Invitation has expired"));
        }

        let store_name = self
            .stores
            .get_by_id(invitation.store_id)
            .await?
            .map(|s| s.name)
            .unwrap_or_default();
        let inviter_name = self
            .users
            .get_by_id(invitation.invited_by)
            .await?
            .map(|u| u.display_name())
            .unwrap_or_default();
        let user_exists = self.users.get_by_email(&invitation.email).await?.is_some();

        Ok(InvitationValidation {
            valid: true,
            message: None,
            user_exists: Some(user_exists),
            data: Some(InvitationDetails {
                invitation_id: invitation.id,
                email: invitation.email,
                role: invitation.role,
                store_name,
                inviter_name,
                expires_at: invitation.expires_at,
            }),
        })
    }

    #[instrument(skip(self))]
    pub async fn expire_stale(&self) -> AppResult<u64> {
        let expired = self.invitations.expire_stale(Utc::now().naive_utc()).await?;
        if expired > 0 {
            info!(expired, "Expired stale invitations");
        }
        Ok(expired)
    }

    async fn pending_for_invitee(&self, user_id: Uuid, invitation_id: Uuid) -> AppResult<StoreInvitation> {
        let invitation = self
            .invitations
            .get_by_id(invitation_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let user = self
            .users
            .get_by_id(user_id)
            .await?
            .ok_or(AppError::InvalidToken)?;
        if !invitation.is_addressed_to(&user.email) {
            warn!(%invitation_id, %user_id, "Invitation addressed to someone else");
            return Err(AppError::Forbidden);
        }
        if invitation.status != InvitationStatus::Pending {
            return Err(AppError::InvalidInput(format!(
                "Invitation is {}",
                invitation.status.as_str()
            )));
        }
        Ok(invitation)
    }
}
