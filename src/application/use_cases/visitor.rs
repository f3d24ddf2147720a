//! Store-front visitor tracking and the staff-facing visitor list.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDateTime, Utc};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::application::use_cases::{
    authorization::StoreAccess, store::StoreRepo, usage::UsageUseCases,
};
use crate::application::validators::is_valid_email;
use crate::domain::entities::{
    store_role::StoreRoleType,
    usage_metric::LimitType,
    visitor::{StoreVisitor, VisitorStats},
};

const RECENT_DAYS: i64 = 30;

#[async_trait]
pub trait VisitorRepo: Send + Sync {
    async fn create(&self, visitor: &StoreVisitor) -> AppResult<StoreVisitor>;
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<StoreVisitor>>;
    async fn find_by_email(&self, store_id: Uuid, email: &str) -> AppResult<Option<StoreVisitor>>;
    async fn find_by_key(&self, store_id: Uuid, visitor_key: &str) -> AppResult<Option<StoreVisitor>>;
    /// Newest first.
    async fn list_by_store(&self, store_id: Uuid) -> AppResult<Vec<StoreVisitor>>;
    async fn update(&self, visitor: &StoreVisitor) -> AppResult<StoreVisitor>;
    async fn delete(&self, id: Uuid) -> AppResult<()>;
    /// Totals for the store; `recent_visitors` counts visitors created after `since`.
    async fn stats(&self, store_id: Uuid, since: NaiveDateTime) -> AppResult<VisitorStats>;
}

#[derive(Debug, Clone, Default)]
pub struct TrackInput {
    pub visitor_key: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub discovery_source: Option<String>,
    pub newsletter: Option<bool>,
    pub source: Option<String>,
    pub page_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct VisitorUpdate {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub newsletter: Option<bool>,
}

#[derive(Clone)]
pub struct VisitorUseCases {
    visitors: Arc<dyn VisitorRepo>,
    stores: Arc<dyn StoreRepo>,
    usage: UsageUseCases,
    access: StoreAccess,
}

impl VisitorUseCases {
    pub fn new(
        visitors: Arc<dyn VisitorRepo>,
        stores: Arc<dyn StoreRepo>,
        usage: UsageUseCases,
        access: StoreAccess,
    ) -> Self {
        Self {
            visitors,
            stores,
            usage,
            access,
        }
    }

    // ========================================================================
    // Public store-front calls
    // ========================================================================

    /// Record a visit. Matches an existing visitor by email first, then by key.
    #[instrument(skip(self, input, user_agent))]
    pub async fn track(
        &self,
        store_id: Uuid,
        input: TrackInput,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> AppResult<StoreVisitor> {
        self.ensure_store(store_id).await?;
        let email = normalize_email(input.email.as_deref())?;
        self.usage.consume(store_id, LimitType::ApiCall, 1).await?;

        let existing = match &email {
            Some(email) => self.visitors.find_by_email(store_id, email).await?,
            None => None,
        };
        let existing = match (existing, input.visitor_key.as_deref()) {
            (Some(found), _) => Some(found),
            (None, Some(key)) => self.visitors.find_by_key(store_id, key).await?,
            (None, None) => None,
        };

        let now = Utc::now().naive_utc();
        let visitor = match existing {
            Some(mut visitor) => {
                visitor.total_visits += 1;
                visitor.total_page_views += 1;
                overwrite(&mut visitor.email, email);
                overwrite(&mut visitor.first_name, input.first_name);
                overwrite(&mut visitor.last_name, input.last_name);
                overwrite(&mut visitor.phone, input.phone);
                overwrite(&mut visitor.discovery_source, input.discovery_source);
                overwrite(&mut visitor.source, input.source);
                overwrite(&mut visitor.last_page_visited, input.page_url);
                overwrite(&mut visitor.ip_address, ip_address);
                overwrite(&mut visitor.user_agent, user_agent);
                if let Some(newsletter) = input.newsletter {
                    visitor.newsletter = newsletter;
                }
                visitor.updated_at = Some(now);
                self.visitors.update(&visitor).await?
            }
            None => {
                let visitor_key = input
                    .visitor_key
                    .filter(|k| !k.trim().is_empty())
                    .unwrap_or_else(|| Uuid::new_v4().to_string());
                self.visitors
                    .create(&StoreVisitor {
                        id: Uuid::new_v4(),
                        store_id,
                        visitor_key,
                        email,
                        first_name: input.first_name,
                        last_name: input.last_name,
                        phone: input.phone,
                        discovery_source: input.discovery_source,
                        newsletter: input.newsletter.unwrap_or(false),
                        source: input.source,
                        user_agent,
                        ip_address,
                        last_page_visited: input.page_url,
                        total_visits: 1,
                        total_page_views: 1,
                        created_at: Some(now),
                        updated_at: Some(now),
                    })
                    .await?
            }
        };
        debug!(visitor_id = %visitor.id, visits = visitor.total_visits, "Visit tracked");
        Ok(visitor)
    }

    #[instrument(skip(self))]
    pub async fn subscribe_newsletter(
        &self,
        store_id: Uuid,
        email: &str,
        subscribed: bool,
    ) -> AppResult<StoreVisitor> {
        self.ensure_store(store_id).await?;
        let Some(email) = normalize_email(Some(email))? else {
            return Err(AppError::InvalidInput("Email is required".into()));
        };

        let now = Utc::now().naive_utc();
        match self.visitors.find_by_email(store_id, &email).await? {
            Some(mut visitor) => {
                visitor.newsletter = subscribed;
                visitor.updated_at = Some(now);
                self.visitors.update(&visitor).await
            }
            None => {
                self.visitors
                    .create(&StoreVisitor {
                        id: Uuid::new_v4(),
                        store_id,
                        visitor_key: Uuid::new_v4().to_string(),
                        email: Some(email),
                        first_name: None,
                        last_name: None,
                        phone: None,
                        discovery_source: None,
                        newsletter: subscribed,
                        source: Some("newsletter".into()),
                        user_agent: None,
                        ip_address: None,
                        last_page_visited: None,
                        total_visits: 0,
                        total_page_views: 0,
                        created_at: Some(now),
                        updated_at: Some(now),
                    })
                    .await
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn track_page_view(
        &self,
        store_id: Uuid,
        visitor_key: &str,
        page_url: &str,
    ) -> AppResult<StoreVisitor> {
        self.ensure_store(store_id).await?;
        let mut visitor = self
            .visitors
            .find_by_key(store_id, visitor_key)
            .await?
            .ok_or(AppError::NotFound)?;
        visitor.total_page_views += 1;
        if !page_url.trim().is_empty() {
            visitor.last_page_visited = Some(page_url.trim().to_string());
        }
        visitor.updated_at = Some(Utc::now().naive_utc());
        self.visitors.update(&visitor).await
    }

    // ========================================================================
    // Staff views
    // ========================================================================

    pub async fn list(&self, user_id: Uuid, store_id: Uuid) -> AppResult<Vec<StoreVisitor>> {
        self.access
            .require_store_role(user_id, store_id, StoreRoleType::Staff)
            .await?;
        self.visitors.list_by_store(store_id).await
    }

    pub async fn get(&self, user_id: Uuid, store_id: Uuid, visitor_id: Uuid) -> AppResult<StoreVisitor> {
        self.access
            .require_store_role(user_id, store_id, StoreRoleType::Staff)
            .await?;
        self.load(store_id, visitor_id).await
    }

    #[instrument(skip(self, update))]
    pub async fn update(
        &self,
        user_id: Uuid,
        store_id: Uuid,
        visitor_id: Uuid,
        update: VisitorUpdate,
    ) -> AppResult<StoreVisitor> {
        self.access
            .require_store_role(user_id, store_id, StoreRoleType::Staff)
            .await?;
        let mut visitor = self.load(store_id, visitor_id).await?;
        overwrite(&mut visitor.email, normalize_email(update.email.as_deref())?);
        overwrite(&mut visitor.first_name, update.first_name);
        overwrite(&mut visitor.last_name, update.last_name);
        overwrite(&mut visitor.phone, update.phone);
        if let Some(newsletter) = update.newsletter {
            visitor.newsletter = newsletter;
        }
        visitor.updated_at = Some(Utc::now().naive_utc());
        self.visitors.update(&visitor).await
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, user_id: Uuid, store_id: Uuid, visitor_id: Uuid) -> AppResult<()> {
        self.access
            .require_store_role(user_id, store_id, StoreRoleType::Manager)
            .await?;
        let visitor = self.load(store_id, visitor_id).await?;
        self.visitors.delete(visitor.id).await
    }

    pub async fn stats(&self, user_id: Uuid, store_id: Uuid) -> AppResult<VisitorStats> {
        self.access
            .require_store_role(user_id, store_id, StoreRoleType::Staff)
            .await?;
        let since = Utc::now().naive_utc() - ChronoDuration::days(RECENT_DAYS);
        self.visitors.stats(store_id, since).await
    }

    async fn load(&self, store_id: Uuid, visitor_id: Uuid) -> AppResult<StoreVisitor> {
        self.visitors
            .get_by_id(visitor_id)
            .await?
            .filter(|v| v.store_id == store_id)
            .ok_or(AppError::NotFound)
    }

    async fn ensure_store(&self, store_id: Uuid) -> AppResult<()> {
        match self.stores.get_by_id(store_id).await? {
            Some(_) => Ok(()),
            None => Err(AppError::NotFound),
        }
    }
}

fn overwrite(target: &mut Option<String>, value: Option<String>) {
    if let Some(value) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        *target = Some(value);
    }
}

fn normalize_email(email: Option<&str>) -> AppResult<Option<String>> {
    match email.map(str::trim).filter(|e| !e.is_empty()) {
        None => Ok(None),
        Some(email) if is_valid_email(email) => Ok(Some(email.to_lowercase())),
        Some(_) => Err(AppError::InvalidInput("Invalid email address".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{store::Store, usage_metric::MetricType};
    use crate::test_utils::{
        InMemoryPlanRepo, InMemoryStoreRepo, InMemoryStoreRoleRepo, InMemorySubscriptionRepo,
        InMemoryUsageMetricRepo, InMemoryVisitorRepo, create_test_plan, create_test_store,
        create_test_subscription,
    };

    struct Fixture {
        owner: Uuid,
        store: Store,
        usage: UsageUseCases,
        uc: VisitorUseCases,
    }

    fn fixture(with_subscription: bool) -> Fixture {
        let owner = Uuid::new_v4();
        let store = create_test_store(owner, |_| {});
        let plan = create_test_plan(|_| {});
        let subscriptions = if with_subscription {
            vec![create_test_subscription(store.id, plan.id, |_| {})]
        } else {
            vec![]
        };
        let stores = Arc::new(InMemoryStoreRepo::with_stores(vec![store.clone()]));
        let access = StoreAccess::new(stores.clone(), Arc::new(InMemoryStoreRoleRepo::new()));
        let usage = UsageUseCases::new(
            Arc::new(InMemoryUsageMetricRepo::new()),
            Arc::new(InMemorySubscriptionRepo::with_subscriptions(subscriptions)),
            Arc::new(InMemoryPlanRepo::with_plans(vec![plan])),
            access.clone(),
        );
        let uc = VisitorUseCases::new(
            Arc::new(InMemoryVisitorRepo::new()),
            stores,
            usage.clone(),
            access,
        );
        Fixture {
            owner,
            store,
            usage,
            uc,
        }
    }

    #[tokio::test]
    async fn repeat_visits_merge_by_email_then_key() {
        let f = fixture(true);

        let first = f
            .uc
            .track(
                f.store.id,
                TrackInput {
                    visitor_key: Some("k-1".into()),
                    ..Default::default()
                },
                Some("10.0.0.1".into()),
                None,
            )
            .await
            .unwrap();
        assert_eq!(first.total_visits, 1);
        assert!(!first.newsletter);

        let second = f
            .uc
            .track(
                f.store.id,
                TrackInput {
                    visitor_key: Some("k-1".into()),
                    email: Some("Shopper@Example.com".into()),
                    first_name: Some("Sam".into()),
                    ..Default::default()
                },
                None,
                Some("Mozilla".into()),
            )
            .await
            .unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.total_visits, 2);
        assert_eq!(second.email.as_deref(), Some("shopper@example.com"));
        assert_eq!(second.ip_address.as_deref(), Some("10.0.0.1"));

        let by_email = f
            .uc
            .track(
                f.store.id,
                TrackInput {
                    visitor_key: Some("other-device".into()),
                    email: Some("shopper@example.com".into()),
                    ..Default::default()
                },
                None,
                None,
            )
            .await
            .unwrap();
        assert_eq!(by_email.id, first.id);
        assert_eq!(by_email.total_visits, 3);
        assert_eq!(
            f.usage.get_value(f.store.id, MetricType::ApiCalls).await.unwrap(),
            3
        );
    }

    #[tokio::test]
    async fn tracking_requires_store_and_subscription() {
        let f = fixture(false);
        assert!(matches!(
            f.uc.track(Uuid::new_v4(), TrackInput::default(), None, None).await,
            Err(AppError::NotFound)
        ));
        assert!(matches!(
            f.uc.track(f.store.id, TrackInput::default(), None, None).await,
            Err(AppError::SubscriptionLimitExceeded(_))
        ));
    }

    #[tokio::test]
    async fn newsletter_and_stats() {
        let f = fixture(true);
        f.uc
            .subscribe_newsletter(f.store.id, "fan@example.com", true)
            .await
            .unwrap();
        let visitor = f
            .uc
            .track(f.store.id, TrackInput::default(), None, None)
            .await
            .unwrap();
        let viewed = f
            .uc
            .track_page_view(f.store.id, &visitor.visitor_key, "/products/mug")
            .await
            .unwrap();
        assert_eq!(viewed.total_page_views, 2);
        assert_eq!(viewed.last_page_visited.as_deref(), Some("/products/mug"));

        let stats = f.uc.stats(f.owner, f.store.id).await.unwrap();
        assert_eq!(stats.total_visitors, 2);
        assert_eq!(stats.recent_visitors, 2);
        assert_eq!(stats.newsletter_subscribers, 1);
    }

    #[tokio::test]
    async fn staff_cannot_read_other_stores_visitors() {
        let f = fixture(true);
        let visitor = f
            .uc
            .track(f.store.id, TrackInput::default(), None, None)
            .await
            .unwrap();

        assert!(matches!(
            f.uc.get(Uuid::new_v4(), f.store.id, visitor.id).await,
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            f.uc.get(f.owner, f.store.id, Uuid::new_v4()).await,
            Err(AppError::NotFound)
        ));
        f.uc.delete(f.owner, f.store.id, visitor.id).await.unwrap();
        assert!(f.uc.list(f.owner, f.store.id).await.unwrap().is_empty());
    }
}
