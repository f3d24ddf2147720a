use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::application::helpers::slug::{sku_from_name, slugify, with_suffix};
use crate::application::use_cases::{
    authorization::StoreAccess,
    catalog::{CategoryRepo, ProductTypeRepo},
    usage::UsageUseCases,
};
use crate::domain::entities::{
    product::{FieldValue, Product, ProductVariant},
    product_type::ProductTypeDetails,
    store_role::StoreRoleType,
    usage_metric::{LimitType, MetricType},
};

const MAX_UNIQUE_ATTEMPTS: u32 = 100;
pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

#[async_trait]
pub trait ProductRepo: Send + Sync {
    async fn create(&self, product: &Product) -> AppResult<Product>;
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Product>>;
    /// Newest first.
    async fn list_by_store(&self, store_id: Uuid, limit: i64, offset: i64) -> AppResult<Vec<Product>>;
    async fn count_by_store(&self, store_id: Uuid) -> AppResult<i64>;
    async fn count_active_by_store(&self, store_id: Uuid) -> AppResult<i64>;
    async fn sku_exists(&self, sku: &str, exclude: Option<Uuid>) -> AppResult<bool>;
    async fn slug_exists(&self, store_id: Uuid, slug: &str, exclude: Option<Uuid>) -> AppResult<bool>;
    async fn update(&self, product: &Product) -> AppResult<Product>;
    async fn delete(&self, id: Uuid) -> AppResult<()>;
}

#[async_trait]
pub trait VariantRepo: Send + Sync {
    async fn create(&self, variant: &ProductVariant) -> AppResult<ProductVariant>;
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<ProductVariant>>;
    async fn list_by_product(&self, product_id: Uuid) -> AppResult<Vec<ProductVariant>>;
    async fn name_exists(&self, product_id: Uuid, name: &str) -> AppResult<bool>;
    async fn delete(&self, id: Uuid) -> AppResult<()>;
}

#[derive(Debug, Clone, Default)]
pub struct ProductInput {
    pub product_type_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub sku: Option<String>,
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub base_price_cents: i64,
    pub sale_price_cents: Option<i64>,
    pub is_active: bool,
    pub manage_stock: bool,
    pub stock_threshold: Option<i32>,
    pub tags: Vec<String>,
    pub field_values: Vec<FieldValue>,
}

#[derive(Debug, Clone, Default)]
pub struct VariantInput {
    pub name: String,
    pub base_price_cents: Option<i64>,
    pub sale_price_cents: Option<i64>,
    pub manage_stock: bool,
    pub stock_threshold: Option<i32>,
    pub option_values: HashMap<String, String>,
    pub is_active: bool,
}

/// Partial product update. `Some(None)` clears a nullable column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<Option<String>>,
    pub base_price_cents: Option<i64>,
    pub sale_price_cents: Option<Option<i64>>,
    pub is_active: Option<bool>,
    pub manage_stock: Option<bool>,
    pub stock_threshold: Option<Option<i32>>,
    pub tags: Option<Vec<String>>,
}

impl ProductPatch {
    /// Read a patch from loosely typed JSON: numbers may arrive as strings and
    /// booleans as `"true"`/`"false"`. Unknown keys are ignored.
    pub fn from_json(value: &Value) -> AppResult<Self> {
        let Some(object) = value.as_object() else {
            return Err(AppError::InvalidInput("Patch body must be a JSON object".into()));
        };
        let mut patch = ProductPatch::default();
        for (key, value) in object {
            match key.as_str() {
                "name" => patch.name = Some(required_string(key, value)?),
                "slug" => patch.slug = Some(required_string(key, value)?),
                "description" => patch.description = Some(optional_string(key, value)?),
                "base_price_cents" | "base_price" => {
                    patch.base_price_cents = Some(
                        flexible_i64(value)
                            .ok_or_else(|| invalid_value(key))?,
                    )
                }
                "sale_price_cents" | "sale_price" => {
                    patch.sale_price_cents = Some(if value.is_null() {
                        None
                    } else {
                        Some(flexible_i64(value).ok_or_else(|| invalid_value(key))?)
                    })
                }
                "is_active" | "active" => {
                    patch.is_active = Some(flexible_bool(value).ok_or_else(|| invalid_value(key))?)
                }
                "manage_stock" => {
                    patch.manage_stock = Some(flexible_bool(value).ok_or_else(|| invalid_value(key))?)
                }
                "stock_threshold" => {
                    patch.stock_threshold = Some(if value.is_null() {
                        None
                    } else {
                        let n = flexible_i64(value).ok_or_else(|| invalid_value(key))?;
                        Some(i32::try_from(n).map_err(|_| invalid_value(key))?)
                    })
                }
                "tags" => patch.tags = Some(tags(value).ok_or_else(|| invalid_value(key))?),
                _ => {}
            }
        }
        Ok(patch)
    }

    fn apply(self, product: &mut Product) {
        if let Some(name) = self.name {
            product.name = name;
        }
        if let Some(slug) = self.slug {
            product.slug = slug;
        }
        if let Some(description) = self.description {
            product.description = description;
        }
        if let Some(price) = self.base_price_cents {
            product.base_price_cents = price;
        }
        if let Some(price) = self.sale_price_cents {
            product.sale_price_cents = price;
        }
        if let Some(active) = self.is_active {
            product.is_active = active;
        }
        if let Some(manage) = self.manage_stock {
            product.manage_stock = manage;
        }
        if let Some(threshold) = self.stock_threshold {
            product.stock_threshold = threshold;
        }
        if let Some(tags) = self.tags {
            product.tags = tags;
        }
    }
}

fn invalid_value(key: &str) -> AppError {
    AppError::InvalidInput(format!("Invalid value for '{key}'"))
}

fn required_string(key: &str, value: &Value) -> AppResult<String> {
    value
        .as_str()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| invalid_value(key))
}

fn optional_string(key: &str, value: &Value) -> AppResult<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => Ok(Some(s.trim().to_string())),
        _ => Err(invalid_value(key)),
    }
}

fn flexible_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn flexible_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn tags(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Null => Some(vec![]),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(|s| s.trim().to_string()))
            .collect::<Option<Vec<_>>>()
            .map(|tags| tags.into_iter().filter(|t| !t.is_empty()).collect()),
        _ => None,
    }
}

#[derive(Clone)]
pub struct ProductUseCases {
    products: Arc<dyn ProductRepo>,
    variants: Arc<dyn VariantRepo>,
    types: Arc<dyn ProductTypeRepo>,
    categories: Arc<dyn CategoryRepo>,
    usage: UsageUseCases,
    access: StoreAccess,
}

impl ProductUseCases {
    pub fn new(
        products: Arc<dyn ProductRepo>,
        variants: Arc<dyn VariantRepo>,
        types: Arc<dyn ProductTypeRepo>,
        categories: Arc<dyn CategoryRepo>,
        usage: UsageUseCases,
        access: StoreAccess,
    ) -> Self {
        Self {
            products,
            variants,
            types,
            categories,
            usage,
            access,
        }
    }

    // ========================================================================
    // Products
    // ========================================================================

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_product(
        &self,
        user_id: Uuid,
        store_id: Uuid,
        input: ProductInput,
    ) -> AppResult<Product> {
        self.access
            .require_store_role(user_id, store_id, StoreRoleType::Manager)
            .await?;

        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::InvalidInput("Product name is required".into()));
        }
        check_prices(input.base_price_cents, input.sale_price_cents)?;
        self.validate_category(input.category_id).await?;
        self.validate_fields(input.product_type_id, &input.field_values)
            .await?;
        self.usage
            .check_limit(store_id, LimitType::Product, 1, None)
            .await?;

        let sku = match input.sku.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(sku) => {
                if self.products.sku_exists(sku, None).await? {
                    return Err(AppError::Conflict {
                        field: "sku",
                        message: format!("SKU '{sku}' is already in use"),
                    });
                }
                sku.to_string()
            }
            None => self.generate_sku(&name).await?,
        };
        let slug = self
            .store_slug(store_id, input.slug.as_deref().unwrap_or(&name), None)
            .await?;

        let now = Utc::now().naive_utc();
        let product = self
            .products
            .create(&Product {
                id: Uuid::new_v4(),
                store_id,
                product_type_id: input.product_type_id,
                category_id: input.category_id,
                sku,
                name,
                slug,
                description: input.description.filter(|d| !d.trim().is_empty()),
                base_price_cents: input.base_price_cents,
                sale_price_cents: input.sale_price_cents,
                is_active: input.is_active,
                manage_stock: input.manage_stock,
                stock_threshold: input.stock_threshold,
                tags: input.tags,
                field_values: input.field_values,
                created_at: Some(now),
                updated_at: Some(now),
            })
            .await?;
        // Counted only once the row exists so a failed insert costs no quota.
        self.usage
            .increment(store_id, MetricType::ProductCount, 1)
            .await?;
        info!(product_id = %product.id, sku = %product.sku, "Product created");
        Ok(product)
    }

    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        user_id: Uuid,
        store_id: Uuid,
        page: i64,
        size: i64,
    ) -> AppResult<Vec<Product>> {
        self.access
            .require_store_role(user_id, store_id, StoreRoleType::Staff)
            .await?;
        let size = if size <= 0 { DEFAULT_PAGE_SIZE } else { size.min(MAX_PAGE_SIZE) };
        let offset = page
            .max(0)
            .checked_mul(size)
            .ok_or_else(|| AppError::InvalidInput("Page number is out of range".into()))?;
        self.products.list_by_store(store_id, size, offset).await
    }

    #[instrument(skip(self))]
    pub async fn get_product(&self, user_id: Uuid, store_id: Uuid, product_id: Uuid) -> AppResult<Product> {
        self.access
            .require_store_role(user_id, store_id, StoreRoleType::Staff)
            .await?;
        self.load(store_id, product_id).await
    }

    /// Full replacement of the editable product fields.
    #[instrument(skip(self, input))]
    pub async fn update_product(
        &self,
        user_id: Uuid,
        store_id: Uuid,
        product_id: Uuid,
        input: ProductInput,
    ) -> AppResult<Product> {
        self.access
            .require_store_role(user_id, store_id, StoreRoleType::Manager)
            .await?;
        let mut product = self.load(store_id, product_id).await?;

        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::InvalidInput("Product name is required".into()));
        }
        check_prices(input.base_price_cents, input.sale_price_cents)?;
        self.validate_category(input.category_id).await?;
        self.validate_fields(input.product_type_id, &input.field_values)
            .await?;

        if let Some(sku) = input.sku.as_deref().map(str::trim).filter(|s| !s.is_empty())
            && sku != product.sku
        {
            if self.products.sku_exists(sku, Some(product.id)).await? {
                return Err(AppError::Conflict {
                    field: "sku",
                    message: format!("SKU '{sku}' is already in use"),
                });
            }
            product.sku = sku.to_string();
        }
        product.slug = match input.slug.as_deref() {
            Some(slug) => self.store_slug(store_id, slug, Some(product.id)).await?,
            None => product.slug,
        };
        product.product_type_id = input.product_type_id;
        product.category_id = input.category_id;
        product.name = name;
        product.description = input.description.filter(|d| !d.trim().is_empty());
        product.base_price_cents = input.base_price_cents;
        product.sale_price_cents = input.sale_price_cents;
        product.is_active = input.is_active;
        product.manage_stock = input.manage_stock;
        product.stock_threshold = input.stock_threshold;
        product.tags = input.tags;
        product.field_values = input.field_values;
        product.updated_at = Some(Utc::now().naive_utc());

        self.products.update(&product).await
    }

    #[instrument(skip(self, patch))]
    pub async fn patch_product(
        &self,
        user_id: Uuid,
        store_id: Uuid,
        product_id: Uuid,
        patch: ProductPatch,
    ) -> AppResult<Product> {
        self.access
            .require_store_role(user_id, store_id, StoreRoleType::Manager)
            .await?;
        let mut product = self.load(store_id, product_id).await?;

        let slug = match patch.slug.as_deref() {
            Some(slug) => Some(self.store_slug(store_id, slug, Some(product.id)).await?),
            None => None,
        };
        patch.apply(&mut product);
        if let Some(slug) = slug {
            product.slug = slug;
        }
        check_prices(product.base_price_cents, product.sale_price_cents)?;
        product.updated_at = Some(Utc::now().naive_utc());

        self.products.update(&product).await
    }

    #[instrument(skip(self))]
    pub async fn delete_product(&self, user_id: Uuid, store_id: Uuid, product_id: Uuid) -> AppResult<()> {
        self.access
            .require_store_role(user_id, store_id, StoreRoleType::Admin)
            .await?;
        let product = self.load(store_id, product_id).await?;
        self.products.delete(product.id).await?;
        self.usage
            .decrement(store_id, MetricType::ProductCount, 1)
            .await?;
        info!(%product_id, "Product deleted");
        Ok(())
    }

    pub async fn publish(&self, user_id: Uuid, store_id: Uuid, product_id: Uuid) -> AppResult<Product> {
        self.set_active(user_id, store_id, product_id, true).await
    }

    pub async fn unpublish(&self, user_id: Uuid, store_id: Uuid, product_id: Uuid) -> AppResult<Product> {
        self.set_active(user_id, store_id, product_id, false).await
    }

    pub async fn active_count(&self, user_id: Uuid, store_id: Uuid) -> AppResult<i64> {
        self.access
            .require_store_role(user_id, store_id, StoreRoleType::Staff)
            .await?;
        self.products.count_active_by_store(store_id).await
    }

    async fn set_active(
        &self,
        user_id: Uuid,
        store_id: Uuid,
        product_id: Uuid,
        active: bool,
    ) -> AppResult<Product> {
        self.access
            .require_store_role(user_id, store_id, StoreRoleType::Manager)
            .await?;
        let mut product = self.load(store_id, product_id).await?;
        product.is_active = active;
        product.updated_at = Some(Utc::now().naive_utc());
        self.products.update(&product).await
    }

    // ========================================================================
    // Variants
    // ========================================================================

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_variant(
        &self,
        user_id: Uuid,
        store_id: Uuid,
        product_id: Uuid,
        input: VariantInput,
    ) -> AppResult<ProductVariant> {
        self.access
            .require_store_role(user_id, store_id, StoreRoleType::Manager)
            .await?;
        let product = self.load(store_id, product_id).await?;

        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::InvalidInput("Variant name is required".into()));
        }
        if let Some(base) = input.base_price_cents {
            check_prices(base, input.sale_price_cents)?;
        }
        if self.variants.name_exists(product.id, &name).await? {
            return Err(AppError::Conflict {
                field: "name",
                message: format!("Variant '{name}' already exists for this product"),
            });
        }
        if let Some(details) = self.product_type(product.product_type_id).await? {
            details
                .validate_variant_options(&input.option_values)
                .map_err(AppError::InvalidInput)?;
        }

        let now = Utc::now().naive_utc();
        self.variants
            .create(&ProductVariant {
                id: Uuid::new_v4(),
                product_id: product.id,
                name,
                base_price_cents: input.base_price_cents,
                sale_price_cents: input.sale_price_cents,
                manage_stock: input.manage_stock,
                stock_threshold: input.stock_threshold,
                option_values: input.option_values,
                is_active: input.is_active,
                created_at: Some(now),
                updated_at: Some(now),
            })
            .await
    }

    pub async fn list_variants(
        &self,
        user_id: Uuid,
        store_id: Uuid,
        product_id: Uuid,
    ) -> AppResult<Vec<ProductVariant>> {
        self.access
            .require_store_role(user_id, store_id, StoreRoleType::Staff)
            .await?;
        let product = self.load(store_id, product_id).await?;
        self.variants.list_by_product(product.id).await
    }

    #[instrument(skip(self))]
    pub async fn delete_variant(&self, user_id: Uuid, store_id: Uuid, variant_id: Uuid) -> AppResult<()> {
        self.access
            .require_store_role(user_id, store_id, StoreRoleType::Manager)
            .await?;
        let variant = self
            .variants
            .get_by_id(variant_id)
            .await?
            .ok_or(AppError::NotFound)?;
        self.load(store_id, variant.product_id).await?;
        self.variants.delete(variant.id).await
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn load(&self, store_id: Uuid, product_id: Uuid) -> AppResult<Product> {
        self.products
            .get_by_id(product_id)
            .await?
            .filter(|p| p.store_id == store_id)
            .ok_or(AppError::NotFound)
    }

    async fn product_type(&self, type_id: Option<Uuid>) -> AppResult<Option<ProductTypeDetails>> {
        let Some(type_id) = type_id else {
            return Ok(None);
        };
        self.types
            .get_details(type_id)
            .await?
            .map(Some)
            .ok_or_else(|| AppError::InvalidInput("Product type does not exist".into()))
    }

    async fn validate_category(&self, category_id: Option<Uuid>) -> AppResult<()> {
        if let Some(category_id) = category_id
            && self.categories.get_by_id(category_id).await?.is_none()
        {
            return Err(AppError::InvalidInput("Category does not exist".into()));
        }
        Ok(())
    }

    async fn validate_fields(&self, type_id: Option<Uuid>, values: &[FieldValue]) -> AppResult<()> {
        match self.product_type(type_id).await? {
            Some(details) => {
                let pairs: Vec<(String, String)> = values
                    .iter()
                    .map(|v| (v.field_name.clone(), v.value.clone()))
                    .collect();
                details
                    .validate_field_values(&pairs)
                    .map_err(AppError::InvalidInput)
            }
            None if values.is_empty() => Ok(()),
            None => Err(AppError::InvalidInput(
                "Field values require a product type".into(),
            )),
        }
    }

    async fn generate_sku(&self, name: &str) -> AppResult<String> {
        let base = sku_from_name(name);
        for attempt in 0..MAX_UNIQUE_ATTEMPTS {
            let candidate = with_suffix(&base, attempt);
            if !self.products.sku_exists(&candidate, None).await? {
                return Ok(candidate);
            }
        }
        Err(AppError::Conflict {
            field: "sku",
            message: "Could not generate a unique SKU".into(),
        })
    }

    async fn store_slug(&self, store_id: Uuid, source: &str, exclude: Option<Uuid>) -> AppResult<String> {
        let base = slugify(source);
        if base.is_empty() {
            return Err(AppError::InvalidInput("Product slug is empty".into()));
        }
        for attempt in 0..MAX_UNIQUE_ATTEMPTS {
            let candidate = with_suffix(&base, attempt);
            if !self.products.slug_exists(store_id, &candidate, exclude).await? {
                return Ok(candidate);
            }
        }
        Err(AppError::Conflict {
            field: "slug",
            message: "Could not generate a unique slug".into(),
        })
    }
}

fn check_prices(base: i64, sale: Option<i64>) -> AppResult<()> {
    if base < 0 || sale.is_some_and(|s| s < 0) {
        return Err(AppError::InvalidInput("Prices cannot be negative".into()));
    }
    if sale.is_some_and(|s| s > base) {
        return Err(AppError::InvalidInput(
            "Sale price cannot exceed the base price".into(),
        ));
    }
    Ok(())
}
