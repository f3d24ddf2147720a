//! In-memory mock implementations for catalog repository traits.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::{
        catalog::{CategoryRepo, ProductTypeRepo},
        collection::CollectionRepo,
        product::{ProductRepo, VariantRepo},
    },
    domain::entities::{
        category::Category,
        collection::Collection,
        product::{Product, ProductVariant},
        product_type::{ProductType, ProductTypeDetails},
    },
};

// ============================================================================
// InMemoryProductRepo
// ============================================================================

/// In-memory implementation of ProductRepo for testing.
#[derive(Default)]
pub struct InMemoryProductRepo {
    pub products: Mutex<HashMap<Uuid, Product>>,
}

impl InMemoryProductRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(products: Vec<Product>) -> Self {
        let map: HashMap<Uuid, Product> = products.into_iter().map(|p| (p.id, p)).collect();
        Self {
            products: Mutex::new(map),
        }
    }

    pub fn get_all(&self) -> Vec<Product> {
        self.products.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl ProductRepo for InMemoryProductRepo {
    async fn create(&self, product: &Product) -> AppResult<Product> {
        self.products
            .lock()
            .unwrap()
            .insert(product.id, product.clone());
        Ok(product.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Product>> {
        Ok(self.products.lock().unwrap().get(&id).cloned())
    }

    async fn list_by_store(&self, store_id: Uuid, limit: i64, offset: i64) -> AppResult<Vec<Product>> {
        let mut products: Vec<Product> = self
            .products
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.store_id == store_id)
            .cloned()
            .collect();
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.name.cmp(&b.name)));
        Ok(products
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count_by_store(&self, store_id: Uuid) -> AppResult<i64> {
        Ok(self
            .products
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.store_id == store_id)
            .count() as i64)
    }

    async fn count_active_by_store(&self, store_id: Uuid) -> AppResult<i64> {
        Ok(self
            .products
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.store_id == store_id && p.is_active)
            .count() as i64)
    }

    async fn sku_exists(&self, sku: &str, exclude: Option<Uuid>) -> AppResult<bool> {
        Ok(self
            .products
            .lock()
            .unwrap()
            .values()
            .any(|p| p.sku == sku && Some(p.id) != exclude))
    }

    async fn slug_exists(&self, store_id: Uuid, slug: &str, exclude: Option<Uuid>) -> AppResult<bool> {
        Ok(self
            .products
            .lock()
            .unwrap()
            .values()
            .any(|p| p.store_id == store_id && p.slug == slug && Some(p.id) != exclude))
    }

    async fn update(&self, product: &Product) -> AppResult<Product> {
        let mut products = self.products.lock().unwrap();
        if !products.contains_key(&product.id) {
            return Err(AppError::NotFound);
        }
        products.insert(product.id, product.clone());
        Ok(product.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.products.lock().unwrap().remove(&id);
        Ok(())
    }
}

// ============================================================================
// InMemoryVariantRepo
// ============================================================================

/// In-memory implementation of VariantRepo for testing.
#[derive(Default)]
pub struct InMemoryVariantRepo {
    pub variants: Mutex<HashMap<Uuid, ProductVariant>>,
}

impl InMemoryVariantRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VariantRepo for InMemoryVariantRepo {
    async fn create(&self, variant: &ProductVariant) -> AppResult<ProductVariant> {
        self.variants
            .lock()
            .unwrap()
            .insert(variant.id, variant.clone());
        Ok(variant.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<ProductVariant>> {
        Ok(self.variants.lock().unwrap().get(&id).cloned())
    }

    async fn list_by_product(&self, product_id: Uuid) -> AppResult<Vec<ProductVariant>> {
        let mut variants: Vec<ProductVariant> = self
            .variants
            .lock()
            .unwrap()
            .values()
            .filter(|v| v.product_id == product_id)
            .cloned()
            .collect();
        variants.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(variants)
    }

    async fn name_exists(&self, product_id: Uuid, name: &str) -> AppResult<bool> {
        Ok(self
            .variants
            .lock()
            .unwrap()
            .values()
            .any(|v| v.product_id == product_id && v.name.eq_ignore_ascii_case(name)))
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.variants.lock().unwrap().remove(&id);
        Ok(())
    }
}

// ============================================================================
// InMemoryProductTypeRepo
// ============================================================================

/// In-memory implementation of ProductTypeRepo for testing.
#[derive(Default)]
pub struct InMemoryProductTypeRepo {
    pub types: Mutex<HashMap<Uuid, ProductTypeDetails>>,
}

impl InMemoryProductTypeRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_types(types: Vec<ProductTypeDetails>) -> Self {
        let map: HashMap<Uuid, ProductTypeDetails> =
            types.into_iter().map(|t| (t.product_type.id, t)).collect();
        Self {
            types: Mutex::new(map),
        }
    }
}

#[async_trait]
impl ProductTypeRepo for InMemoryProductTypeRepo {
    async fn create(&self, details: &ProductTypeDetails) -> AppResult<ProductTypeDetails> {
        self.types
            .lock()
            .unwrap()
            .insert(details.product_type.id, details.clone());
        Ok(details.clone())
    }

    async fn slug_exists(&self, slug: &str) -> AppResult<bool> {
        Ok(self
            .types
            .lock()
            .unwrap()
            .values()
            .any(|t| t.product_type.slug == slug))
    }

    async fn list(&self) -> AppResult<Vec<ProductType>> {
        let mut types: Vec<ProductType> = self
            .types
            .lock()
            .unwrap()
            .values()
            .map(|t| t.product_type.clone())
            .collect();
        types.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(types)
    }

    async fn get_details(&self, id: Uuid) -> AppResult<Option<ProductTypeDetails>> {
        Ok(self.types.lock().unwrap().get(&id).cloned())
    }
}

// ============================================================================
// InMemoryCategoryRepo
// ============================================================================

/// In-memory implementation of CategoryRepo for testing.
#[derive(Default)]
pub struct InMemoryCategoryRepo {
    pub categories: Mutex<HashMap<Uuid, Category>>,
}

impl InMemoryCategoryRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CategoryRepo for InMemoryCategoryRepo {
    async fn create(&self, category: &Category) -> AppResult<Category> {
        self.categories
            .lock()
            .unwrap()
            .insert(category.id, category.clone());
        Ok(category.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Category>> {
        Ok(self.categories.lock().unwrap().get(&id).cloned())
    }

    async fn slug_exists(&self, slug: &str) -> AppResult<bool> {
        Ok(self
            .categories
            .lock()
            .unwrap()
            .values()
            .any(|c| c.slug == slug))
    }

    async fn list_all(&self) -> AppResult<Vec<Category>> {
        Ok(self.categories.lock().unwrap().values().cloned().collect())
    }
}

// ============================================================================
// InMemoryCollectionRepo
// ============================================================================

/// In-memory implementation of CollectionRepo for testing.
#[derive(Default)]
pub struct InMemoryCollectionRepo {
    pub collections: Mutex<HashMap<Uuid, Collection>>,
}

impl InMemoryCollectionRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CollectionRepo for InMemoryCollectionRepo {
    async fn create(&self, collection: &Collection) -> AppResult<Collection> {
        self.collections
            .lock()
            .unwrap()
            .insert(collection.id, collection.clone());
        Ok(collection.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Collection>> {
        Ok(self.collections.lock().unwrap().get(&id).cloned())
    }

    async fn list_by_store(&self, store_id: Uuid) -> AppResult<Vec<Collection>> {
        Ok(self
            .collections
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.store_id == store_id)
            .cloned()
            .collect())
    }

    async fn update(&self, collection: &Collection) -> AppResult<Collection> {
        let mut collections = self.collections.lock().unwrap();
        if !collections.contains_key(&collection.id) {
            return Err(AppError::NotFound);
        }
        collections.insert(collection.id, collection.clone());
        Ok(collection.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.collections.lock().unwrap().remove(&id);
        Ok(())
    }
}
