use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::session::SessionRepo,
    domain::entities::session::Session,
};

fn row_to_session(row: sqlx::postgres::PgRow) -> Session {
    Session {
        id: row.get("id"),
        user_id: row.get("user_id"),
        access_jti: row.get("access_jti"),
        refresh_jti: row.get("refresh_jti"),
        user_agent: row.get("user_agent"),
        ip_address: row.get("ip_address"),
        device_name: row.get("device_name"),
        location: row.get("location"),
        last_activity_at: row.get("last_activity_at"),
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, user_id, access_jti, refresh_jti, user_agent, ip_address, device_name,
    location, last_activity_at, expires_at, created_at, updated_at
"#;

impl PostgresPersistence {
    async fn session_where(&self, clause: &str, value: Uuid) -> AppResult<Option<Session>> {
        let row = sqlx::query(&format!("SELECT {} FROM sessions WHERE {} = $1", SELECT_COLS, clause))
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(row.map(row_to_session))
    }
}

#[async_trait]
impl SessionRepo for PostgresPersistence {
    async fn create(&self, session: &Session) -> AppResult<Session> {
        let row = sqlx::query(&format!(
            r#"INSERT INTO sessions
                 (id, user_id, access_jti, refresh_jti, user_agent, ip_address,
                  device_name, location, last_activity_at, expires_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
               RETURNING {}"#,
            SELECT_COLS
        ))
        .bind(session.id)
        .bind(session.user_id)
        .bind(session.access_jti)
        .bind(session.refresh_jti)
        .bind(&session.user_agent)
        .bind(&session.ip_address)
        .bind(&session.device_name)
        .bind(&session.location)
        .bind(session.last_activity_at)
        .bind(session.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_session(row))
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Session>> {
        self.session_where("id", id).await
    }

    async fn get_by_access_jti(&self, jti: Uuid) -> AppResult<Option<Session>> {
        self.session_where("access_jti", jti).await
    }

    async fn get_by_refresh_jti(&self, jti: Uuid) -> AppResult<Option<Session>> {
        self.session_where("refresh_jti", jti).await
    }

    async fn list_by_user(&self, user_id: Uuid) -> AppResult<Vec<Session>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM sessions WHERE user_id = $1 ORDER BY last_activity_at DESC",
            SELECT_COLS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_session).collect())
    }

    async fn touch(&self, id: Uuid, at: NaiveDateTime) -> AppResult<()> {
        sqlx::query("UPDATE sessions SET last_activity_at = $2, updated_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(())
    }

    async fn update_access_jti(&self, id: Uuid, access_jti: Uuid, at: NaiveDateTime) -> AppResult<()> {
        sqlx::query(
            r#"UPDATE sessions
               SET access_jti = $2, last_activity_at = $3, updated_at = $3
               WHERE id = $1"#,
        )
        .bind(id)
        .bind(access_jti)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(())
    }
}
