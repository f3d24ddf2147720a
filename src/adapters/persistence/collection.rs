use async_trait::async_trait;
use sqlx::{Postgres, Row, Transaction};
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::collection::CollectionRepo,
    domain::entities::collection::Collection,
};

// Product ids are aggregated in insertion order from the join table.
const SELECT_SQL: &str = r#"
    SELECT c.id, c.store_id, c.name, c.description, c.created_at, c.updated_at,
           COALESCE(
               ARRAY_AGG(cp.product_id ORDER BY cp.position) FILTER (WHERE cp.product_id IS NOT NULL),
               '{}'
           ) AS product_ids
    FROM collections c
    LEFT JOIN collection_products cp ON cp.collection_id = c.id
"#;

const GROUP_BY: &str = "GROUP BY c.id";

fn row_to_collection(row: sqlx::postgres::PgRow) -> Collection {
    Collection {
        id: row.get("id"),
        store_id: row.get("store_id"),
        name: row.get("name"),
        description: row.get("description"),
        product_ids: row.get::<Vec<Uuid>, _>("product_ids"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

async fn replace_products(
    tx: &mut Transaction<'_, Postgres>,
    collection_id: Uuid,
    product_ids: &[Uuid],
) -> AppResult<()> {
    sqlx::query("DELETE FROM collection_products WHERE collection_id = $1")
        .bind(collection_id)
        .execute(&mut **tx)
        .await
        .map_err(AppError::from)?;

    if product_ids.is_empty() {
        return Ok(());
    }

    sqlx::query(
        r#"INSERT INTO collection_products (collection_id, product_id, position)
           SELECT $1, ids.product_id, ids.position::int
           FROM UNNEST($2::uuid[]) WITH ORDINALITY AS ids(product_id, position)
           ON CONFLICT DO NOTHING"#,
    )
    .bind(collection_id)
    .bind(product_ids)
    .execute(&mut **tx)
    .await
    .map_err(AppError::from)?;
    Ok(())
}

impl PostgresPersistence {
    async fn load_collection(&self, id: Uuid) -> AppResult<Option<Collection>> {
        let row = sqlx::query(&format!("{} WHERE c.id = $1 {}", SELECT_SQL, GROUP_BY))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(row.map(row_to_collection))
    }
}

#[async_trait]
impl CollectionRepo for PostgresPersistence {
    async fn create(&self, collection: &Collection) -> AppResult<Collection> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        sqlx::query("INSERT INTO collections (id, store_id, name, description) VALUES ($1, $2, $3, $4)")
            .bind(collection.id)
            .bind(collection.store_id)
            .bind(&collection.name)
            .bind(&collection.description)
            .execute(&mut *tx)
            .await
            .map_err(AppError::from)?;
        replace_products(&mut tx, collection.id, &collection.product_ids).await?;

        tx.commit().await.map_err(AppError::from)?;
        self.load_collection(collection.id).await?.ok_or(AppError::NotFound)
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Collection>> {
        self.load_collection(id).await
    }

    async fn list_by_store(&self, store_id: Uuid) -> AppResult<Vec<Collection>> {
        let rows = sqlx::query(&format!(
            "{} WHERE c.store_id = $1 {} ORDER BY c.name",
            SELECT_SQL, GROUP_BY
        ))
        .bind(store_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_collection).collect())
    }

    async fn update(&self, collection: &Collection) -> AppResult<Collection> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        let result = sqlx::query(
            r#"UPDATE collections
               SET name = $2, description = $3, updated_at = NOW() AT TIME ZONE 'utc'
               WHERE id = $1"#,
        )
        .bind(collection.id)
        .bind(&collection.name)
        .bind(&collection.description)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from)?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        replace_products(&mut tx, collection.id, &collection.product_ids).await?;

        tx.commit().await.map_err(AppError::from)?;
        self.load_collection(collection.id).await?.ok_or(AppError::NotFound)
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM collections WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(())
    }
}
