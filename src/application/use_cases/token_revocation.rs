use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::app_error::AppResult;
use crate::application::jwt::{self, JwtKeys};
use crate::domain::entities::revoked_token::TokenType;

#[async_trait]
pub trait RevokedTokenRepo: Send + Sync {
    /// Returns false when the jti was already revoked.
    async fn insert(
        &self,
        token_id: Uuid,
        token_type: TokenType,
        expires_at: NaiveDateTime,
        revoked_by: &str,
    ) -> AppResult<bool>;
    async fn exists(&self, token_id: Uuid) -> AppResult<bool>;
    async fn delete_expired(&self, now: NaiveDateTime) -> AppResult<u64>;
}

#[derive(Clone)]
pub struct TokenRevocationUseCases {
    repo: Arc<dyn RevokedTokenRepo>,
    keys: JwtKeys,
}

impl TokenRevocationUseCases {
    pub fn new(repo: Arc<dyn RevokedTokenRepo>, keys: JwtKeys) -> Self {
        Self { repo, keys }
    }

    /// Revoke a token we signed, even if it has already expired.
    ///
    /// Returns false when no token id can be recovered from `token`.
    #[instrument(skip(self, token))]
    pub async fn revoke(
        &self,
        token: &str,
        token_type: TokenType,
        revoked_by: &str,
    ) -> AppResult<bool> {
        let Some(token_id) = jwt::extract_token_id_even_if_expired(token, &self.keys) else {
            tracing::warn!("Could not extract token id for revocation");
            return Ok(false);
        };
        self.repo
            .insert(token_id.jti, token_type, token_id.expires_at, revoked_by)
            .await?;
        Ok(true)
    }

    pub async fn revoke_access_token(&self, token: &str, revoked_by: &str) -> AppResult<bool> {
        self.revoke(token, TokenType::Access, revoked_by).await
    }

    pub async fn revoke_refresh_token(&self, token: &str, revoked_by: &str) -> AppResult<bool> {
        self.revoke(token, TokenType::Refresh, revoked_by).await
    }

    /// Revoke by jti when the raw token is no longer available (e.g. sessions).
    #[instrument(skip(self))]
    pub async fn revoke_jti(
        &self,
        jti: Uuid,
        token_type: TokenType,
        expires_at: NaiveDateTime,
        revoked_by: &str,
    ) -> AppResult<()> {
        self.repo.insert(jti, token_type, expires_at, revoked_by).await?;
        Ok(())
    }

    pub async fn is_revoked(&self, jti: Uuid) -> AppResult<bool> {
        self.repo.exists(jti).await
    }

    #[instrument(skip(self))]
    pub async fn cleanup_expired(&self) -> AppResult<u64> {
        let deleted = self.repo.delete_expired(Utc::now().naive_utc()).await?;
        info!(deleted, "Purged expired revoked tokens");
        Ok(deleted)
    }
}
