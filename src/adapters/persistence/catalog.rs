use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, parse_json_with_fallback, to_json},
    app_error::{AppError, AppResult},
    application::use_cases::catalog::{CategoryRepo, ProductTypeRepo},
    domain::entities::{
        category::Category,
        product_type::{
            FieldType, ProductFieldDefinition, ProductType, ProductTypeDetails,
            VariantOptionDefinition,
        },
    },
};

fn row_to_product_type(row: sqlx::postgres::PgRow) -> ProductType {
    ProductType {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        created_at: row.get("created_at"),
    }
}

fn row_to_field(row: sqlx::postgres::PgRow) -> ProductFieldDefinition {
    let id: Uuid = row.get("id");
    let raw_type: String = row.get("field_type");
    let options_json: serde_json::Value = row.get("options");

    ProductFieldDefinition {
        id,
        product_type_id: row.get("product_type_id"),
        field_name: row.get("field_name"),
        field_type: FieldType::from_str(&raw_type).unwrap_or(FieldType::Text),
        required: row.get("required"),
        order_position: row.get("order_position"),
        regex: row.get("regex"),
        min_value: row.get("min_value"),
        max_value: row.get("max_value"),
        multiple_values: row.get("multiple_values"),
        options: parse_json_with_fallback(&options_json, "options", "product_field", &id.to_string()),
    }
}

fn row_to_variant_option(row: sqlx::postgres::PgRow) -> VariantOptionDefinition {
    let id: Uuid = row.get("id");
    let allowed_json: serde_json::Value = row.get("allowed_values");

    VariantOptionDefinition {
        id,
        product_type_id: row.get("product_type_id"),
        option_name: row.get("option_name"),
        required: row.get("required"),
        order_position: row.get("order_position"),
        allowed_values: parse_json_with_fallback(
            &allowed_json,
            "allowed_values",
            "variant_option",
            &id.to_string(),
        ),
    }
}

fn row_to_category(row: sqlx::postgres::PgRow) -> Category {
    Category {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        description: row.get("description"),
        parent_id: row.get("parent_id"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const TYPE_COLS: &str = "id, name, slug, created_at";

const FIELD_COLS: &str = r#"
    id, product_type_id, field_name, field_type, required, order_position,
    regex, min_value, max_value, multiple_values, options
"#;

const OPTION_COLS: &str =
    "id, product_type_id, option_name, required, order_position, allowed_values";

const CATEGORY_COLS: &str =
    "id, name, slug, description, parent_id, is_active, created_at, updated_at";

#[async_trait]
impl ProductTypeRepo for PostgresPersistence {
    async fn create(&self, details: &ProductTypeDetails) -> AppResult<ProductTypeDetails> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;
        let product_type = &details.product_type;

        let type_row = sqlx::query(&format!(
            "INSERT INTO product_types (id, name, slug) VALUES ($1, $2, $3) RETURNING {}",
            TYPE_COLS
        ))
        .bind(product_type.id)
        .bind(&product_type.name)
        .bind(&product_type.slug)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::from)?;

        let mut fields = Vec::with_capacity(details.fields.len());
        for field in &details.fields {
            let row = sqlx::query(&format!(
                r#"INSERT INTO product_field_definitions
                     (id, product_type_id, field_name, field_type, required, order_position,
                      regex, min_value, max_value, multiple_values, options)
                   VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                   RETURNING {}"#,
                FIELD_COLS
            ))
            .bind(field.id)
            .bind(product_type.id)
            .bind(&field.field_name)
            .bind(field.field_type.as_str())
            .bind(field.required)
            .bind(field.order_position)
            .bind(&field.regex)
            .bind(field.min_value)
            .bind(field.max_value)
            .bind(field.multiple_values)
            .bind(to_json(&field.options)?)
            .fetch_one(&mut *tx)
            .await
            .map_err(AppError::from)?;
            fields.push(row_to_field(row));
        }

        let mut variant_options = Vec::with_capacity(details.variant_options.len());
        for option in &details.variant_options {
            let row = sqlx::query(&format!(
                r#"INSERT INTO variant_option_definitions
                     (id, product_type_id, option_name, required, order_position, allowed_values)
                   VALUES ($1, $2, $3, $4, $5, $6)
                   RETURNING {}"#,
                OPTION_COLS
            ))
            .bind(option.id)
            .bind(product_type.id)
            .bind(&option.option_name)
            .bind(option.required)
            .bind(option.order_position)
            .bind(to_json(&option.allowed_values)?)
            .fetch_one(&mut *tx)
            .await
            .map_err(AppError::from)?;
            variant_options.push(row_to_variant_option(row));
        }

        tx.commit().await.map_err(AppError::from)?;

        Ok(ProductTypeDetails {
            product_type: row_to_product_type(type_row),
            fields,
            variant_options,
        })
    }

    async fn slug_exists(&self, slug: &str) -> AppResult<bool> {
        let exists: (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM product_types WHERE slug = $1)")
                .bind(slug)
                .fetch_one(&self.pool)
                .await
                .map_err(AppError::from)?;
        Ok(exists.0)
    }

    async fn list(&self) -> AppResult<Vec<ProductType>> {
        let rows = sqlx::query(&format!("SELECT {} FROM product_types ORDER BY name", TYPE_COLS))
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_product_type).collect())
    }

    async fn get_details(&self, id: Uuid) -> AppResult<Option<ProductTypeDetails>> {
        let Some(type_row) = sqlx::query(&format!(
            "SELECT {} FROM product_types WHERE id = $1",
            TYPE_COLS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?
        else {
            return Ok(None);
        };

        let fields = sqlx::query(&format!(
            "SELECT {} FROM product_field_definitions WHERE product_type_id = $1 ORDER BY order_position",
            FIELD_COLS
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;

        let options = sqlx::query(&format!(
            "SELECT {} FROM variant_option_definitions WHERE product_type_id = $1 ORDER BY order_position",
            OPTION_COLS
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(Some(ProductTypeDetails {
            product_type: row_to_product_type(type_row),
            fields: fields.into_iter().map(row_to_field).collect(),
            variant_options: options.into_iter().map(row_to_variant_option).collect(),
        }))
    }
}

#[async_trait]
impl CategoryRepo for PostgresPersistence {
    async fn create(&self, category: &Category) -> AppResult<Category> {
        let row = sqlx::query(&format!(
            r#"INSERT INTO categories (id, name, slug, description, parent_id, is_active)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING {}"#,
            CATEGORY_COLS
        ))
        .bind(category.id)
        .bind(&category.name)
        .bind(&category.slug)
        .bind(&category.description)
        .bind(category.parent_id)
        .bind(category.is_active)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_category(row))
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Category>> {
        let row = sqlx::query(&format!("SELECT {} FROM categories WHERE id = $1", CATEGORY_COLS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(row.map(row_to_category))
    }

    async fn slug_exists(&self, slug: &str) -> AppResult<bool> {
        let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM categories WHERE slug = $1)")
            .bind(slug)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(exists.0)
    }

    async fn list_all(&self) -> AppResult<Vec<Category>> {
        let rows = sqlx::query(&format!("SELECT {} FROM categories ORDER BY name", CATEGORY_COLS))
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_category).collect())
    }
}
