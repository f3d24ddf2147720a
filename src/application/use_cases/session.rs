use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::application::use_cases::token_revocation::TokenRevocationUseCases;
use crate::domain::entities::revoked_token::TokenType;
use crate::domain::entities::session::{Session, device_name_from_user_agent};

#[async_trait]
pub trait SessionRepo: Send + Sync {
    async fn create(&self, session: &Session) -> AppResult<Session>;
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Session>>;
    async fn get_by_access_jti(&self, jti: Uuid) -> AppResult<Option<Session>>;
    async fn get_by_refresh_jti(&self, jti: Uuid) -> AppResult<Option<Session>>;
    async fn list_by_user(&self, user_id: Uuid) -> AppResult<Vec<Session>>;
    async fn touch(&self, id: Uuid, at: NaiveDateTime) -> AppResult<()>;
    async fn update_access_jti(&self, id: Uuid, access_jti: Uuid, at: NaiveDateTime) -> AppResult<()>;
    async fn delete(&self, id: Uuid) -> AppResult<()>;
}

/// Client details captured when a session is opened.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub device_name: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub location: Option<String>,
    pub last_activity_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
    pub created_at: Option<NaiveDateTime>,
    pub current: bool,
}

impl SessionView {
    fn from_session(session: Session, current_jti: Option<Uuid>) -> Self {
        Self {
            current: current_jti == Some(session.access_jti),
            id: session.id,
            device_name: session.device_name,
            user_agent: session.user_agent,
            ip_address: session.ip_address,
            location: session.location,
            last_activity_at: session.last_activity_at,
            expires_at: session.expires_at,
            created_at: session.created_at,
        }
    }
}

#[derive(Clone)]
pub struct SessionUseCases {
    repo: Arc<dyn SessionRepo>,
    revocation: TokenRevocationUseCases,
}

impl SessionUseCases {
    pub fn new(repo: Arc<dyn SessionRepo>, revocation: TokenRevocationUseCases) -> Self {
        Self { repo, revocation }
    }

    /// Opens a session for a freshly issued token pair.
    #[instrument(skip(self, client))]
    pub async fn open(
        &self,
        user_id: Uuid,
        access_jti: Uuid,
        refresh_jti: Uuid,
        expires_at: NaiveDateTime,
        client: &ClientInfo,
    ) -> AppResult<Session> {
        let now = Utc::now().naive_utc();
        let session = Session {
            id: Uuid::new_v4(),
            user_id,
            access_jti,
            refresh_jti,
            user_agent: client.user_agent.clone(),
            ip_address: client.ip_address.clone(),
            device_name: client.user_agent.as_deref().map(device_name_from_user_agent),
            location: None,
            last_activity_at: now,
            expires_at,
            created_at: Some(now),
            updated_at: Some(now),
        };
        self.repo.create(&session).await
    }

    #[instrument(skip(self))]
    pub async fn list_sessions(
        &self,
        user_id: Uuid,
        current_jti: Option<Uuid>,
    ) -> AppResult<Vec<SessionView>> {
        let mut sessions = self.repo.list_by_user(user_id).await?;
        sessions.sort_by(|a, b| b.last_activity_at.cmp(&a.last_activity_at));
        Ok(sessions
            .into_iter()
            .map(|s| SessionView::from_session(s, current_jti))
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn current_session(&self, user_id: Uuid, access_jti: Uuid) -> AppResult<SessionView> {
        let mut session = self
            .repo
            .get_by_access_jti(access_jti)
            .await?
            .filter(|s| s.user_id == user_id)
            .ok_or(AppError::NotFound)?;
        let now = Utc::now().naive_utc();
        self.repo.touch(session.id, now).await?;
        session.last_activity_at = now;
        Ok(SessionView::from_session(session, Some(access_jti)))
    }

    /// Called on token refresh so the session follows the newest access token.
    pub async fn rotate_access(&self, refresh_jti: Uuid, access_jti: Uuid) -> AppResult<()> {
        if let Some(session) = self.repo.get_by_refresh_jti(refresh_jti).await? {
            self.repo
                .update_access_jti(session.id, access_jti, Utc::now().naive_utc())
                .await?;
        }
        Ok(())
    }

    pub async fn close_by_access_jti(&self, access_jti: Uuid) -> AppResult<()> {
        if let Some(session) = self.repo.get_by_access_jti(access_jti).await? {
            self.repo.delete(session.id).await?;
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete_session(&self, user_id: Uuid, session_id: Uuid) -> AppResult<()> {
        let session = self
            .repo
            .get_by_id(session_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if session.user_id != user_id {
            return Err(AppError::Forbidden);
        }
        self.revoke_and_delete(&session, "session_deleted").await
    }

    /// Revokes and deletes every session of the user except the current one.
    #[instrument(skip(self))]
    pub async fn delete_other_sessions(&self, user_id: Uuid, access_jti: Uuid) -> AppResult<usize> {
        let sessions = self.repo.list_by_user(user_id).await?;
        let mut removed = 0;
        for session in sessions.iter().filter(|s| s.access_jti != access_jti) {
            self.revoke_and_delete(session, "other_sessions_deleted").await?;
            removed += 1;
        }
        Ok(removed)
    }

    /// Drops all sessions of a user whose account is going away.
    pub async fn delete_all_for_user(&self, user_id: Uuid) -> AppResult<()> {
        for session in self.repo.list_by_user(user_id).await? {
            self.revoke_and_delete(&session, "account_deleted").await?;
        }
        Ok(())
    }

    async fn revoke_and_delete(&self, session: &Session, reason: &str) -> AppResult<()> {
        // Access tokens never outlive the refresh token, so the session expiry bounds both.
        self.revocation
            .revoke_jti(session.access_jti, TokenType::Access, session.expires_at, reason)
            .await?;
        self.revocation
            .revoke_jti(session.refresh_jti, TokenType::Refresh, session.expires_at, reason)
            .await?;
        self.repo.delete(session.id).await
    }
}
