use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::application::use_cases::{authorization::StoreAccess, product::ProductRepo};
use crate::domain::entities::{collection::Collection, store_role::StoreRoleType};

#[async_trait]
pub trait CollectionRepo: Send + Sync {
    async fn create(&self, collection: &Collection) -> AppResult<Collection>;
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Collection>>;
    async fn list_by_store(&self, store_id: Uuid) -> AppResult<Vec<Collection>>;
    async fn update(&self, collection: &Collection) -> AppResult<Collection>;
    async fn delete(&self, id: Uuid) -> AppResult<()>;
}

#[derive(Debug, Clone, Default)]
pub struct CollectionInput {
    pub name: String,
    pub description: Option<String>,
    pub product_ids: Vec<Uuid>,
}

#[derive(Clone)]
pub struct CollectionUseCases {
    collections: Arc<dyn CollectionRepo>,
    products: Arc<dyn ProductRepo>,
    access: StoreAccess,
}

impl CollectionUseCases {
    pub fn new(
        collections: Arc<dyn CollectionRepo>,
        products: Arc<dyn ProductRepo>,
        access: StoreAccess,
    ) -> Self {
        Self {
            collections,
            products,
            access,
        }
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, user_id: Uuid, store_id: Uuid, input: CollectionInput) -> AppResult<Collection> {
        self.access
            .require_store_role(user_id, store_id, StoreRoleType::Manager)
            .await?;
        let (name, product_ids) = self.checked(store_id, input.name, input.product_ids).await?;

        let now = Utc::now().naive_utc();
        self.collections
            .create(&Collection {
                id: Uuid::new_v4(),
                store_id,
                name,
                description: input.description.filter(|d| !d.trim().is_empty()),
                product_ids,
                created_at: Some(now),
                updated_at: Some(now),
            })
            .await
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        user_id: Uuid,
        store_id: Uuid,
        collection_id: Uuid,
        input: CollectionInput,
    ) -> AppResult<Collection> {
        self.access
            .require_store_role(user_id, store_id, StoreRoleType::Manager)
            .await?;
        let mut collection = self.load(store_id, collection_id).await?;
        let (name, product_ids) = self.checked(store_id, input.name, input.product_ids).await?;

        collection.name = name;
        collection.description = input.description.filter(|d| !d.trim().is_empty());
        collection.product_ids = product_ids;
        collection.updated_at = Some(Utc::now().naive_utc());
        self.collections.update(&collection).await
    }

    pub async fn get(&self, user_id: Uuid, store_id: Uuid, collection_id: Uuid) -> AppResult<Collection> {
        self.access
            .require_store_role(user_id, store_id, StoreRoleType::Staff)
            .await?;
        self.load(store_id, collection_id).await
    }

    pub async fn list(&self, user_id: Uuid, store_id: Uuid) -> AppResult<Vec<Collection>> {
        self.access
            .require_store_role(user_id, store_id, StoreRoleType::Staff)
            .await?;
        let mut collections = self.collections.list_by_store(store_id).await?;
        collections.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(collections)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, user_id: Uuid, store_id: Uuid, collection_id: Uuid) -> AppResult<()> {
        self.access
            .require_store_role(user_id, store_id, StoreRoleType::Admin)
            .await?;
        let collection = self.load(store_id, collection_id).await?;
        self.collections.delete(collection.id).await
    }

    async fn load(&self, store_id: Uuid, collection_id: Uuid) -> AppResult<Collection> {
        self.collections
            .get_by_id(collection_id)
            .await?
            .filter(|c| c.store_id == store_id)
            .ok_or(AppError::NotFound)
    }

    /// Trimmed name plus de-duplicated product ids, all of which must belong to the store.
    async fn checked(&self, store_id: Uuid, name: String, product_ids: Vec<Uuid>) -> AppResult<(String, Vec<Uuid>)> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::InvalidInput("Collection name is required".into()));
        }
        let mut seen = HashSet::new();
        let mut ids = Vec::with_capacity(product_ids.len());
        for id in product_ids {
            if !seen.insert(id) {
                continue;
            }
            let belongs = self
                .products
                .get_by_id(id)
                .await?
                .is_some_and(|p| p.store_id == store_id);
            if !belongs {
                return Err(AppError::InvalidInput(format!(
                    "Product {id} does not belong to this store"
                )));
            }
            ids.push(id);
        }
        Ok((name, ids))
    }
}
