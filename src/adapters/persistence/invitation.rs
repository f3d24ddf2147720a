use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::invitation::InvitationRepo,
    domain::entities::{
        store_invitation::{InvitationStatus, StoreInvitation},
        store_role::StoreRoleType,
    },
};

fn row_to_invitation(row: sqlx::postgres::PgRow) -> StoreInvitation {
    let role: String = row.get("role");
    let status: String = row.get("status");

    StoreInvitation {
        id: row.get("id"),
        store_id: row.get("store_id"),
        email: row.get("email"),
        role: StoreRoleType::from_str(&role).unwrap_or(StoreRoleType::Staff),
        status: InvitationStatus::from_str(&status),
        invited_by: row.get("invited_by"),
        expires_at: row.get("expires_at"),
        responded_at: row.get("responded_at"),
        created_at: row.get("created_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, store_id, email, role, status, invited_by, expires_at, responded_at, created_at
"#;

#[async_trait]
impl InvitationRepo for PostgresPersistence {
    async fn create(
        &self,
        store_id: Uuid,
        email: &str,
        role: StoreRoleType,
        invited_by: Uuid,
        expires_at: NaiveDateTime,
    ) -> AppResult<StoreInvitation> {
        let row = sqlx::query(&format!(
            r#"INSERT INTO store_invitations (id, store_id, email, role, status, invited_by, expires_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING {}"#,
            SELECT_COLS
        ))
        .bind(Uuid::new_v4())
        .bind(store_id)
        .bind(email)
        .bind(role.as_str())
        .bind(InvitationStatus::Pending.as_str())
        .bind(invited_by)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_invitation(row))
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<StoreInvitation>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM store_invitations WHERE id = $1",
            SELECT_COLS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.map(row_to_invitation))
    }

    async fn find_pending(&self, store_id: Uuid, email: &str) -> AppResult<Option<StoreInvitation>> {
        let row = sqlx::query(&format!(
            r#"SELECT {} FROM store_invitations
               WHERE store_id = $1 AND LOWER(email) = LOWER($2) AND status = 'pending'"#,
            SELECT_COLS
        ))
        .bind(store_id)
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.map(row_to_invitation))
    }

    async fn list_pending_by_store(&self, store_id: Uuid) -> AppResult<Vec<StoreInvitation>> {
        let rows = sqlx::query(&format!(
            r#"SELECT {} FROM store_invitations
               WHERE store_id = $1 AND status = 'pending'
               ORDER BY created_at DESC"#,
            SELECT_COLS
        ))
        .bind(store_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_invitation).collect())
    }

    async fn list_pending_by_email(&self, email: &str) -> AppResult<Vec<StoreInvitation>> {
        let rows = sqlx::query(&format!(
            r#"SELECT {} FROM store_invitations
               WHERE LOWER(email) = LOWER($1) AND status = 'pending'
               ORDER BY created_at DESC"#,
            SELECT_COLS
        ))
        .bind(email.trim())
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_invitation).collect())
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: InvitationStatus,
        responded_at: Option<NaiveDateTime>,
    ) -> AppResult<StoreInvitation> {
        let row = sqlx::query(&format!(
            r#"UPDATE store_invitations SET status = $2, responded_at = $3
               WHERE id = $1
               RETURNING {}"#,
            SELECT_COLS
        ))
        .bind(id)
        .bind(status.as_str())
        .bind(responded_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        row.map(row_to_invitation).ok_or(AppError::NotFound)
    }

    async fn expire_stale(&self, now: NaiveDateTime) -> AppResult<u64> {
        let result = sqlx::query(
            r#"UPDATE store_invitations SET status = 'expired'
               WHERE status = 'pending' AND expires_at < $1"#,
        )
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(result.rows_affected())
    }
}
