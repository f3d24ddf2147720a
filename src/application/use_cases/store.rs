use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::application::helpers::slug::{normalize_subdomain, slugify, with_suffix};
use crate::application::use_cases::authorization::{StoreAccess, StoreRoleRepo};
use crate::domain::entities::{store::Store, store_role::StoreRoleType};

const DEFAULT_STORE_SLUG: &str = "store";
const MAX_SLUG_ATTEMPTS: u32 = 1000;

#[async_trait]
pub trait StoreRepo: Send + Sync {
    async fn create(
        &self,
        owner_id: Uuid,
        name: &str,
        slug: &str,
        description: Option<&str>,
    ) -> AppResult<Store>;
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Store>>;
    async fn get_by_subdomain(&self, subdomain: &str) -> AppResult<Option<Store>>;
    async fn slug_exists(&self, slug: &str) -> AppResult<bool>;
    /// Stores the user owns or holds a role in.
    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<Store>>;
    async fn list_all(&self) -> AppResult<Vec<Store>>;
    async fn count_owned_by(&self, user_id: Uuid) -> AppResult<i64>;
    async fn update(&self, store: &Store) -> AppResult<Store>;
    async fn set_subdomain(&self, id: Uuid, subdomain: Option<&str>) -> AppResult<Store>;
    async fn delete(&self, id: Uuid) -> AppResult<()>;
}

#[derive(Debug, Clone, Default)]
pub struct StoreUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub logo_url: Option<String>,
    pub template: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SubdomainAvailability {
    pub subdomain: String,
    pub available: bool,
    pub fqdn: String,
}

#[derive(Clone)]
pub struct StoreUseCases {
    stores: Arc<dyn StoreRepo>,
    roles: Arc<dyn StoreRoleRepo>,
    access: StoreAccess,
    root_domain: String,
}

impl StoreUseCases {
    pub fn new(
        stores: Arc<dyn StoreRepo>,
        roles: Arc<dyn StoreRoleRepo>,
        access: StoreAccess,
        root_domain: String,
    ) -> Self {
        Self {
            stores,
            roles,
            access,
            root_domain,
        }
    }

    // ========================================================================
    // Store CRUD
    // ========================================================================

    #[instrument(skip(self))]
    pub async fn create_store(
        &self,
        user_id: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> AppResult<Store> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidInput("Store name is required".into()));
        }

        let slug = self.unique_slug(name).await?;
        let store = self.stores.create(user_id, name, &slug, description).await?;
        self.roles
            .assign(store.id, user_id, StoreRoleType::Owner)
            .await?;

        info!(store_id = %store.id, slug = %store.slug, "Store created");
        Ok(store)
    }

    #[instrument(skip(self))]
    pub async fn list_user_stores(&self, user_id: Uuid) -> AppResult<Vec<Store>> {
        self.stores.list_for_user(user_id).await
    }

    #[instrument(skip(self))]
    pub async fn get_store(&self, user_id: Uuid, store_id: Uuid) -> AppResult<Store> {
        self.access
            .require_store_role(user_id, store_id, StoreRoleType::Staff)
            .await
    }

    #[instrument(skip(self))]
    pub async fn update_store(
        &self,
        user_id: Uuid,
        store_id: Uuid,
        update: StoreUpdate,
    ) -> AppResult<Store> {
        let mut store = self
            .access
            .require_store_role(user_id, store_id, StoreRoleType::Manager)
            .await?;

        if let Some(name) = update.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(AppError::InvalidInput("Store name is required".into()));
            }
            store.name = name;
        }
        if update.description.is_some() {
            store.description = update.description;
        }
        if update.logo_url.is_some() {
            store.logo_url = update.logo_url;
        }
        if update.template.is_some() {
            store.template = update.template;
        }
        if let Some(active) = update.is_active {
            store.is_active = active;
        }
        self.stores.update(&store).await
    }

    #[instrument(skip(self))]
    pub async fn delete_store(&self, user_id: Uuid, store_id: Uuid) -> AppResult<()> {
        self.access
            .require_store_role(user_id, store_id, StoreRoleType::Owner)
            .await?;
        self.stores.delete(store_id).await?;
        info!(%store_id, "Store deleted");
        Ok(())
    }

    // ========================================================================
    // Subdomains
    // ========================================================================

    #[instrument(skip(self))]
    pub async fn check_subdomain_availability(&self, input: &str) -> AppResult<SubdomainAvailability> {
        let subdomain = self.normalize(input)?;
        let available = self.stores.get_by_subdomain(&subdomain).await?.is_none();
        Ok(SubdomainAvailability {
            fqdn: format!("{subdomain}.{}", self.root_domain),
            subdomain,
            available,
        })
    }

    #[instrument(skip(self))]
    pub async fn assign_subdomain(
        &self,
        user_id: Uuid,
        store_id: Uuid,
        input: &str,
    ) -> AppResult<Store> {
        self.access
            .require_store_role(user_id, store_id, StoreRoleType::Admin)
            .await?;
        let subdomain = self.normalize(input)?;

        if let Some(existing) = self.stores.get_by_subdomain(&subdomain).await?
            && existing.id != store_id
        {
            return Err(AppError::Conflict {
                field: "subdomain",
                message: format!("Subdomain '{subdomain}' is already taken"),
            });
        }
        self.stores.set_subdomain(store_id, Some(&subdomain)).await
    }

    #[instrument(skip(self))]
    pub async fn remove_subdomain(&self, user_id: Uuid, store_id: Uuid) -> AppResult<Store> {
        self.access
            .require_store_role(user_id, store_id, StoreRoleType::Admin)
            .await?;
        self.stores.set_subdomain(store_id, None).await
    }

    fn normalize(&self, input: &str) -> AppResult<String> {
        normalize_subdomain(input, &self.root_domain)
            .ok_or_else(|| AppError::InvalidInput("Subdomain must contain letters or digits".into()))
    }

    async fn unique_slug(&self, name: &str) -> AppResult<String> {
        let mut base = slugify(name);
        if base.is_empty() {
            base = DEFAULT_STORE_SLUG.to_string();
        }
        for attempt in 0..MAX_SLUG_ATTEMPTS {
            let candidate = with_suffix(&base, attempt);
            if !self.stores.slug_exists(&candidate).await? {
                return Ok(candidate);
            }
        }
        Err(AppError::Internal(format!("no free slug for '{base}'")))
    }
}
