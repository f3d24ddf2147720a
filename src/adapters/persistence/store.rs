use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::store::StoreRepo,
    domain::entities::store::Store,
};

fn row_to_store(row: sqlx::postgres::PgRow) -> Store {
    Store {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        name: row.get("name"),
        slug: row.get("slug"),
        description: row.get("description"),
        logo_url: row.get("logo_url"),
        is_active: row.get("is_active"),
        subdomain: row.get("subdomain"),
        template: row.get("template"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str = r#"
    s.id, s.owner_id, s.name, s.slug, s.description, s.logo_url,
    s.is_active, s.subdomain, s.template, s.created_at, s.updated_at
"#;

#[async_trait]
impl StoreRepo for PostgresPersistence {
    async fn create(
        &self,
        owner_id: Uuid,
        name: &str,
        slug: &str,
        description: Option<&str>,
    ) -> AppResult<Store> {
        let row = sqlx::query(&format!(
            r#"INSERT INTO stores AS s (id, owner_id, name, slug, description)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING {}"#,
            SELECT_COLS
        ))
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(name)
        .bind(slug)
        .bind(description)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_store(row))
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Store>> {
        let row = sqlx::query(&format!("SELECT {} FROM stores s WHERE s.id = $1", SELECT_COLS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(row.map(row_to_store))
    }

    async fn get_by_subdomain(&self, subdomain: &str) -> AppResult<Option<Store>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM stores s WHERE s.subdomain = $1",
            SELECT_COLS
        ))
        .bind(subdomain)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.map(row_to_store))
    }

    async fn slug_exists(&self, slug: &str) -> AppResult<bool> {
        let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM stores WHERE slug = $1)")
            .bind(slug)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(exists.0)
    }

    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<Store>> {
        let rows = sqlx::query(&format!(
            r#"SELECT DISTINCT {}
               FROM stores s
               LEFT JOIN store_roles r ON r.store_id = s.id AND r.user_id = $1
               WHERE s.owner_id = $1 OR r.user_id IS NOT NULL
               ORDER BY s.created_at DESC"#,
            SELECT_COLS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_store).collect())
    }

    async fn list_all(&self) -> AppResult<Vec<Store>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM stores s ORDER BY s.created_at DESC",
            SELECT_COLS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_store).collect())
    }

    async fn count_owned_by(&self, user_id: Uuid) -> AppResult<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM stores WHERE owner_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(count.0)
    }

    async fn update(&self, store: &Store) -> AppResult<Store> {
        let row = sqlx::query(&format!(
            r#"UPDATE stores AS s SET
                 name = $2, slug = $3, description = $4, logo_url = $5,
                 is_active = $6, template = $7,
                 updated_at = NOW() AT TIME ZONE 'utc'
               WHERE s.id = $1
               RETURNING {}"#,
            SELECT_COLS
        ))
        .bind(store.id)
        .bind(&store.name)
        .bind(&store.slug)
        .bind(&store.description)
        .bind(&store.logo_url)
        .bind(store.is_active)
        .bind(&store.template)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_store(row))
    }

    async fn set_subdomain(&self, id: Uuid, subdomain: Option<&str>) -> AppResult<Store> {
        let row = sqlx::query(&format!(
            r#"UPDATE stores AS s SET subdomain = $2, updated_at = NOW() AT TIME ZONE 'utc'
               WHERE s.id = $1
               RETURNING {}"#,
            SELECT_COLS
        ))
        .bind(id)
        .bind(subdomain)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_store(row))
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM stores WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(())
    }
}
