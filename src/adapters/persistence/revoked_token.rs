use async_trait::async_trait;
use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::token_revocation::RevokedTokenRepo,
    domain::entities::revoked_token::TokenType,
};

#[async_trait]
impl RevokedTokenRepo for PostgresPersistence {
    async fn insert(
        &self,
        token_id: Uuid,
        token_type: TokenType,
        expires_at: NaiveDateTime,
        revoked_by: &str,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"INSERT INTO revoked_tokens (id, token_id, token_type, expires_at, revoked_by)
               VALUES ($1, $2, $3, $4, $5)
               ON CONFLICT (token_id) DO NOTHING"#,
        )
        .bind(Uuid::new_v4())
        .bind(token_id)
        .bind(token_type.as_str())
        .bind(expires_at)
        .bind(revoked_by)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(result.rows_affected() == 1)
    }

    async fn exists(&self, token_id: Uuid) -> AppResult<bool> {
        let found: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM revoked_tokens WHERE token_id = $1")
                .bind(token_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(AppError::from)?;
        Ok(found.is_some())
    }

    async fn delete_expired(&self, now: NaiveDateTime) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM revoked_tokens WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(result.rows_affected())
    }
}
