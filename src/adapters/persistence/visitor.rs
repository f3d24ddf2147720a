use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::visitor::VisitorRepo,
    domain::entities::visitor::{StoreVisitor, VisitorStats},
};

fn row_to_visitor(row: sqlx::postgres::PgRow) -> StoreVisitor {
    StoreVisitor {
        id: row.get("id"),
        store_id: row.get("store_id"),
        visitor_key: row.get("visitor_key"),
        email: row.get("email"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        phone: row.get("phone"),
        discovery_source: row.get("discovery_source"),
        newsletter: row.get("newsletter"),
        source: row.get("source"),
        user_agent: row.get("user_agent"),
        ip_address: row.get("ip_address"),
        last_page_visited: row.get("last_page_visited"),
        total_visits: row.get("total_visits"),
        total_page_views: row.get("total_page_views"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, store_id, visitor_key, email, first_name, last_name, phone,
    discovery_source, newsletter, source, user_agent, ip_address,
    last_page_visited, total_visits, total_page_views, created_at, updated_at
"#;

#[async_trait]
impl VisitorRepo for PostgresPersistence {
    async fn create(&self, visitor: &StoreVisitor) -> AppResult<StoreVisitor> {
        let row = sqlx::query(&format!(
            r#"INSERT INTO store_visitors
                 (id, store_id, visitor_key, email, first_name, last_name, phone,
                  discovery_source, newsletter, source, user_agent, ip_address,
                  last_page_visited, total_visits, total_page_views)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
               RETURNING {}"#,
            SELECT_COLS
        ))
        .bind(visitor.id)
        .bind(visitor.store_id)
        .bind(&visitor.visitor_key)
        .bind(&visitor.email)
        .bind(&visitor.first_name)
        .bind(&visitor.last_name)
        .bind(&visitor.phone)
        .bind(&visitor.discovery_source)
        .bind(visitor.newsletter)
        .bind(&visitor.source)
        .bind(&visitor.user_agent)
        .bind(&visitor.ip_address)
        .bind(&visitor.last_page_visited)
        .bind(visitor.total_visits)
        .bind(visitor.total_page_views)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_visitor(row))
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<StoreVisitor>> {
        let row = sqlx::query(&format!("SELECT {} FROM store_visitors WHERE id = $1", SELECT_COLS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(row.map(row_to_visitor))
    }

    async fn find_by_email(&self, store_id: Uuid, email: &str) -> AppResult<Option<StoreVisitor>> {
        let row = sqlx::query(&format!(
            r#"SELECT {} FROM store_visitors
               WHERE store_id = $1 AND LOWER(email) = LOWER($2)
               ORDER BY created_at
               LIMIT 1"#,
            SELECT_COLS
        ))
        .bind(store_id)
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.map(row_to_visitor))
    }

    async fn find_by_key(&self, store_id: Uuid, visitor_key: &str) -> AppResult<Option<StoreVisitor>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM store_visitors WHERE store_id = $1 AND visitor_key = $2",
            SELECT_COLS
        ))
        .bind(store_id)
        .bind(visitor_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.map(row_to_visitor))
    }

    async fn list_by_store(&self, store_id: Uuid) -> AppResult<Vec<StoreVisitor>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM store_visitors WHERE store_id = $1 ORDER BY created_at DESC",
            SELECT_COLS
        ))
        .bind(store_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_visitor).collect())
    }

    async fn update(&self, visitor: &StoreVisitor) -> AppResult<StoreVisitor> {
        let row = sqlx::query(&format!(
            r#"UPDATE store_visitors SET
                 email = $2, first_name = $3, last_name = $4, phone = $5,
                 discovery_source = $6, newsletter = $7, source = $8, user_agent = $9,
                 ip_address = $10, last_page_visited = $11, total_visits = $12,
                 total_page_views = $13, updated_at = NOW() AT TIME ZONE 'utc'
               WHERE id = $1
               RETURNING {}"#,
            SELECT_COLS
        ))
        .bind(visitor.id)
        .bind(&visitor.email)
        .bind(&visitor.first_name)
        .bind(&visitor.last_name)
        .bind(&visitor.phone)
        .bind(&visitor.discovery_source)
        .bind(visitor.newsletter)
        .bind(&visitor.source)
        .bind(&visitor.user_agent)
        .bind(&visitor.ip_address)
        .bind(&visitor.last_page_visited)
        .bind(visitor.total_visits)
        .bind(visitor.total_page_views)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        row.map(row_to_visitor).ok_or(AppError::NotFound)
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM store_visitors WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(())
    }

    async fn stats(&self, store_id: Uuid, since: NaiveDateTime) -> AppResult<VisitorStats> {
        let (total_visitors, recent_visitors, newsletter_subscribers): (i64, i64, i64) =
            sqlx::query_as(
                r#"SELECT
                     COUNT(*),
                     COUNT(*) FILTER (WHERE created_at > $2),
                     COUNT(*) FILTER (WHERE newsletter = true)
                   FROM store_visitors
                   WHERE store_id = $1"#,
            )
            .bind(store_id)
            .bind(since)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::from)?;

        Ok(VisitorStats {
            total_visitors,
            recent_visitors,
            newsletter_subscribers,
        })
    }
}
