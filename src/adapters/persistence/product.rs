use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, parse_json_with_fallback, to_json},
    app_error::{AppError, AppResult},
    application::use_cases::product::{ProductRepo, VariantRepo},
    domain::entities::product::{FieldValue, Product, ProductVariant},
};

fn row_to_product(row: sqlx::postgres::PgRow) -> Product {
    let id: Uuid = row.get("id");
    let entity_id = id.to_string();
    let tags_json: serde_json::Value = row.get("tags");
    let values_json: serde_json::Value = row.get("field_values");
    let field_values: Vec<FieldValue> =
        parse_json_with_fallback(&values_json, "field_values", "product", &entity_id);

    Product {
        id,
        store_id: row.get("store_id"),
        product_type_id: row.get("product_type_id"),
        category_id: row.get("category_id"),
        sku: row.get("sku"),
        name: row.get("name"),
        slug: row.get("slug"),
        description: row.get("description"),
        base_price_cents: row.get("base_price_cents"),
        sale_price_cents: row.get("sale_price_cents"),
        is_active: row.get("is_active"),
        manage_stock: row.get("manage_stock"),
        stock_threshold: row.get("stock_threshold"),
        tags: parse_json_with_fallback(&tags_json, "tags", "product", &entity_id),
        field_values,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_variant(row: sqlx::postgres::PgRow) -> ProductVariant {
    let id: Uuid = row.get("id");
    let options_json: serde_json::Value = row.get("option_values");
    let option_values: HashMap<String, String> =
        parse_json_with_fallback(&options_json, "option_values", "product_variant", &id.to_string());

    ProductVariant {
        id,
        product_id: row.get("product_id"),
        name: row.get("name"),
        base_price_cents: row.get("base_price_cents"),
        sale_price_cents: row.get("sale_price_cents"),
        manage_stock: row.get("manage_stock"),
        stock_threshold: row.get("stock_threshold"),
        option_values,
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const PRODUCT_COLS: &str = r#"
    id, store_id, product_type_id, category_id, sku, name, slug, description,
    base_price_cents, sale_price_cents, is_active, manage_stock, stock_threshold,
    tags, field_values, created_at, updated_at
"#;

const VARIANT_COLS: &str = r#"
    id, product_id, name, base_price_cents, sale_price_cents, manage_stock,
    stock_threshold, option_values, is_active, created_at, updated_at
"#;

#[async_trait]
impl ProductRepo for PostgresPersistence {
    async fn create(&self, product: &Product) -> AppResult<Product> {
        let row = sqlx::query(&format!(
            r#"INSERT INTO products
                 (id, store_id, product_type_id, category_id, sku, name, slug, description,
                  base_price_cents, sale_price_cents, is_active, manage_stock, stock_threshold,
                  tags, field_values)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
               RETURNING {}"#,
            PRODUCT_COLS
        ))
        .bind(product.id)
        .bind(product.store_id)
        .bind(product.product_type_id)
        .bind(product.category_id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.slug)
        .bind(&product.description)
        .bind(product.base_price_cents)
        .bind(product.sale_price_cents)
        .bind(product.is_active)
        .bind(product.manage_stock)
        .bind(product.stock_threshold)
        .bind(to_json(&product.tags)?)
        .bind(to_json(&product.field_values)?)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_product(row))
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Product>> {
        let row = sqlx::query(&format!("SELECT {} FROM products WHERE id = $1", PRODUCT_COLS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(row.map(row_to_product))
    }

    async fn list_by_store(&self, store_id: Uuid, limit: i64, offset: i64) -> AppResult<Vec<Product>> {
        let rows = sqlx::query(&format!(
            r#"SELECT {} FROM products
               WHERE store_id = $1
               ORDER BY created_at DESC, id
               LIMIT $2 OFFSET $3"#,
            PRODUCT_COLS
        ))
        .bind(store_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_product).collect())
    }

    async fn count_by_store(&self, store_id: Uuid) -> AppResult<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products WHERE store_id = $1")
            .bind(store_id)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(count.0)
    }

    async fn count_active_by_store(&self, store_id: Uuid) -> AppResult<i64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM products WHERE store_id = $1 AND is_active = true")
                .bind(store_id)
                .fetch_one(&self.pool)
                .await
                .map_err(AppError::from)?;
        Ok(count.0)
    }

    async fn sku_exists(&self, sku: &str, exclude: Option<Uuid>) -> AppResult<bool> {
        let exists: (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM products WHERE sku = $1 AND ($2::uuid IS NULL OR id <> $2))",
        )
        .bind(sku)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(exists.0)
    }

    async fn slug_exists(&self, store_id: Uuid, slug: &str, exclude: Option<Uuid>) -> AppResult<bool> {
        let exists: (bool,) = sqlx::query_as(
            r#"SELECT EXISTS(
                 SELECT 1 FROM products
                 WHERE store_id = $1 AND slug = $2 AND ($3::uuid IS NULL OR id <> $3)
               )"#,
        )
        .bind(store_id)
        .bind(slug)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(exists.0)
    }

    async fn update(&self, product: &Product) -> AppResult<Product> {
        let row = sqlx::query(&format!(
            r#"UPDATE products SET
                 product_type_id = $2, category_id = $3, sku = $4, name = $5, slug = $6,
                 description = $7, base_price_cents = $8, sale_price_cents = $9,
                 is_active = $10, manage_stock = $11, stock_threshold = $12,
                 tags = $13, field_values = $14,
                 updated_at = NOW() AT TIME ZONE 'utc'
               WHERE id = $1
               RETURNING {}"#,
            PRODUCT_COLS
        ))
        .bind(product.id)
        .bind(product.product_type_id)
        .bind(product.category_id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.slug)
        .bind(&product.description)
        .bind(product.base_price_cents)
        .bind(product.sale_price_cents)
        .bind(product.is_active)
        .bind(product.manage_stock)
        .bind(product.stock_threshold)
        .bind(to_json(&product.tags)?)
        .bind(to_json(&product.field_values)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        row.map(row_to_product).ok_or(AppError::NotFound)
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(())
    }
}

#[async_trait]
impl VariantRepo for PostgresPersistence {
    async fn create(&self, variant: &ProductVariant) -> AppResult<ProductVariant> {
        let row = sqlx::query(&format!(
            r#"INSERT INTO product_variants
                 (id, product_id, name, base_price_cents, sale_price_cents, manage_stock,
                  stock_threshold, option_values, is_active)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               RETURNING {}"#,
            VARIANT_COLS
        ))
        .bind(variant.id)
        .bind(variant.product_id)
        .bind(&variant.name)
        .bind(variant.base_price_cents)
        .bind(variant.sale_price_cents)
        .bind(variant.manage_stock)
        .bind(variant.stock_threshold)
        .bind(to_json(&variant.option_values)?)
        .bind(variant.is_active)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_variant(row))
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<ProductVariant>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM product_variants WHERE id = $1",
            VARIANT_COLS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.map(row_to_variant))
    }

    async fn list_by_product(&self, product_id: Uuid) -> AppResult<Vec<ProductVariant>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM product_variants WHERE product_id = $1 ORDER BY created_at",
            VARIANT_COLS
        ))
        .bind(product_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_variant).collect())
    }

    async fn name_exists(&self, product_id: Uuid, name: &str) -> AppResult<bool> {
        let exists: (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM product_variants WHERE product_id = $1 AND LOWER(name) = LOWER($2))",
        )
        .bind(product_id)
        .bind(name.trim())
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(exists.0)
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM product_variants WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(())
    }
}
