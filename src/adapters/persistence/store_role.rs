use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::authorization::StoreRoleRepo,
    domain::entities::store_role::{StoreRole, StoreRoleType},
};

fn row_to_role(row: sqlx::postgres::PgRow) -> StoreRole {
    let raw: String = row.get("role");
    let role = StoreRoleType::from_str(&raw).unwrap_or_else(|| {
        tracing::warn!(role = %raw, "Unknown store role in database, treating as staff");
        StoreRoleType::Staff
    });

    StoreRole {
        id: row.get("id"),
        store_id: row.get("store_id"),
        user_id: row.get("user_id"),
        role,
        created_at: row.get("created_at"),
    }
}

const SELECT_COLS: &str = "id, store_id, user_id, role, created_at";

#[async_trait]
impl StoreRoleRepo for PostgresPersistence {
    async fn assign(&self, store_id: Uuid, user_id: Uuid, role: StoreRoleType) -> AppResult<StoreRole> {
        let row = sqlx::query(&format!(
            r#"INSERT INTO store_roles (id, store_id, user_id, role)
               VALUES ($1, $2, $3, $4)
               RETURNING {}"#,
            SELECT_COLS
        ))
        .bind(Uuid::new_v4())
        .bind(store_id)
        .bind(user_id)
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_role(row))
    }

    async fn get(&self, store_id: Uuid, user_id: Uuid) -> AppResult<Option<StoreRole>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM store_roles WHERE store_id = $1 AND user_id = $2",
            SELECT_COLS
        ))
        .bind(store_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.map(row_to_role))
    }

    async fn list_by_store(&self, store_id: Uuid) -> AppResult<Vec<StoreRole>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM store_roles WHERE store_id = $1 ORDER BY created_at",
            SELECT_COLS
        ))
        .bind(store_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_role).collect())
    }

    async fn list_by_user(&self, user_id: Uuid) -> AppResult<Vec<StoreRole>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM store_roles WHERE user_id = $1 ORDER BY created_at",
            SELECT_COLS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_role).collect())
    }

    async fn update_role(&self, store_id: Uuid, user_id: Uuid, role: StoreRoleType) -> AppResult<StoreRole> {
        let row = sqlx::query(&format!(
            r#"UPDATE store_roles SET role = $3
               WHERE store_id = $1 AND user_id = $2
               RETURNING {}"#,
            SELECT_COLS
        ))
        .bind(store_id)
        .bind(user_id)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        row.map(row_to_role).ok_or(AppError::NotFound)
    }

    async fn remove(&self, store_id: Uuid, user_id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM store_roles WHERE store_id = $1 AND user_id = $2")
            .bind(store_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(())
    }
}
