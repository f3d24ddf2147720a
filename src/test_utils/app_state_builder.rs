//! Test app state builder for HTTP-level testing.
//!
//! `TestAppStateBuilder` wires the real use cases on top of in-memory
//! repositories. The repositories stay reachable through the builder so tests
//! can seed rows before `build()` and inspect them afterwards.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderValue;
use secrecy::SecretString;
use time::Duration;
use url::Url;
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState,
    application::jwt,
    domain::entities::{
        product::Product,
        store::Store,
        store_invitation::StoreInvitation,
        store_role::{StoreRole, StoreRoleType},
        store_subscription::StoreSubscription,
        subscription_plan::SubscriptionPlan,
        user::User,
    },
    infra::{
        RateLimiterTrait,
        config::AppConfig,
        setup::{Repositories, build_app_state},
    },
    test_utils::{
        InMemoryCategoryRepo, InMemoryCollectionRepo, InMemoryEmailSender, InMemoryInvitationRepo,
        InMemoryInvoiceRepo, InMemoryPlanRepo, InMemoryProductRepo, InMemoryProductTypeRepo,
        InMemoryRateLimiter, InMemoryRevokedTokenRepo, InMemorySessionRepo, InMemoryStoreRepo,
        InMemoryStoreRoleRepo, InMemorySubscriptionRepo, InMemoryUsageMetricRepo,
        InMemoryUserRepo, InMemoryVariantRepo, InMemoryVisitorRepo, test_jwt_keys,
    },
};

pub const TEST_JWT_SECRET: &str = "test-jwt-secret-with-enough-entropy";

/// Config used by every HTTP test.
pub fn test_config() -> AppConfig {
    AppConfig {
        jwt_secret: SecretString::from(TEST_JWT_SECRET),
        jwt_previous_secrets: vec![],
        access_token_ttl: Duration::minutes(15),
        refresh_token_ttl: Duration::days(7),
        invitation_ttl_days: 7,
        email_verification_ttl_minutes: 60,
        app_origin: Url::parse("http://localhost:3000").unwrap(),
        cors_origin: HeaderValue::from_static("http://localhost:3000"),
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        redis_url: "redis://127.0.0.1:6379".to_string(),
        rate_limit_window_secs: 60,
        rate_limit_per_ip: 1_000,
        rate_limit_per_email: 1_000,
        database_url: "postgres://unused".to_string(),
        trust_proxy: false,
        root_domain: "shopx.test".to_string(),
        resend_api_key: SecretString::from("re_test"),
        email_from: "ShopX <noreply@shopx.test>".to_string(),
        default_trial_days: 14,
        token_cleanup_interval_secs: 3_600,
        subscription_job_interval_secs: 3_600,
        reminder_days_threshold: 3,
    }
}

/// Builder for creating `AppState` with in-memory mocks for testing.
///
/// # Example
///
/// ```ignore
/// let owner = create_test_user(|_| {});
/// let store = create_test_store(owner.id, |_| {});
/// let builder = TestAppStateBuilder::new().with_user(owner.clone()).with_store(store);
/// let token = builder.access_token_for(&owner);
/// let app_state = builder.build();
/// ```
pub struct TestAppStateBuilder {
    pub users: Arc<InMemoryUserRepo>,
    pub sessions: Arc<InMemorySessionRepo>,
    pub revoked_tokens: Arc<InMemoryRevokedTokenRepo>,
    pub stores: Arc<InMemoryStoreRepo>,
    pub roles: Arc<InMemoryStoreRoleRepo>,
    pub invitations: Arc<InMemoryInvitationRepo>,
    pub plans: Arc<InMemoryPlanRepo>,
    pub subscriptions: Arc<InMemorySubscriptionRepo>,
    pub invoices: Arc<InMemoryInvoiceRepo>,
    pub usage_metrics: Arc<InMemoryUsageMetricRepo>,
    pub product_types: Arc<InMemoryProductTypeRepo>,
    pub categories: Arc<InMemoryCategoryRepo>,
    pub products: Arc<InMemoryProductRepo>,
    pub variants: Arc<InMemoryVariantRepo>,
    pub collections: Arc<InMemoryCollectionRepo>,
    pub visitors: Arc<InMemoryVisitorRepo>,
    pub email: Arc<InMemoryEmailSender>,
    rate_limiter: Option<Arc<dyn RateLimiterTrait>>,
}

impl TestAppStateBuilder {
    pub fn new() -> Self {
        Self {
            users: Arc::new(InMemoryUserRepo::new()),
            sessions: Arc::new(InMemorySessionRepo::new()),
            revoked_tokens: Arc::new(InMemoryRevokedTokenRepo::new()),
            stores: Arc::new(InMemoryStoreRepo::new()),
            roles: Arc::new(InMemoryStoreRoleRepo::new()),
            invitations: Arc::new(InMemoryInvitationRepo::new()),
            plans: Arc::new(InMemoryPlanRepo::new()),
            subscriptions: Arc::new(InMemorySubscriptionRepo::new()),
            invoices: Arc::new(InMemoryInvoiceRepo::new()),
            usage_metrics: Arc::new(InMemoryUsageMetricRepo::new()),
            product_types: Arc::new(InMemoryProductTypeRepo::new()),
            categories: Arc::new(InMemoryCategoryRepo::new()),
            products: Arc::new(InMemoryProductRepo::new()),
            variants: Arc::new(InMemoryVariantRepo::new()),
            collections: Arc::new(InMemoryCollectionRepo::new()),
            visitors: Arc::new(InMemoryVisitorRepo::new()),
            email: Arc::new(InMemoryEmailSender::new()),
            rate_limiter: None,
        }
    }

    pub fn with_user(self, user: User) -> Self {
        self.users.users.lock().unwrap().insert(user.id, user);
        self
    }

    pub fn with_store(self, store: Store) -> Self {
        self.stores.stores.lock().unwrap().insert(store.id, store);
        self
    }

    /// Grant `user_id` a role in `store_id`.
    pub fn with_role(self, store_id: Uuid, user_id: Uuid, role: StoreRoleType) -> Self {
        self.roles.roles.lock().unwrap().insert(
            (store_id, user_id),
            StoreRole {
                id: Uuid::new_v4(),
                store_id,
                user_id,
                role,
                created_at: Some(chrono::Utc::now().naive_utc()),
            },
        );
        self
    }

    pub fn with_invitation(self, invitation: StoreInvitation) -> Self {
        self.invitations
            .invitations
            .lock()
            .unwrap()
            .insert(invitation.id, invitation);
        self
    }

    pub fn with_plan(self, plan: SubscriptionPlan) -> Self {
        self.plans.plans.lock().unwrap().insert(plan.id, plan);
        self
    }

    pub fn with_subscription(self, subscription: StoreSubscription) -> Self {
        self.subscriptions
            .subscriptions
            .lock()
            .unwrap()
            .insert(subscription.id, subscription);
        self
    }

    pub fn with_product(self, product: Product) -> Self {
        self.products
            .products
            .lock()
            .unwrap()
            .insert(product.id, product);
        self
    }

    /// Use a custom rate limiter (defaults to an always-allow one).
    pub fn with_rate_limiter(mut self, limiter: Arc<dyn RateLimiterTrait>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// A valid access token for `user`, signed with the test secret.
    pub fn access_token_for(&self, user: &User) -> String {
        jwt::issue_access(
            user.id,
            &user.username,
            &[],
            &test_jwt_keys().current,
            Duration::minutes(15),
        )
        .unwrap()
        .token
    }

    pub fn build(&self) -> AppState {
        let repos = Repositories {
            users: self.users.clone(),
            sessions: self.sessions.clone(),
            revoked_tokens: self.revoked_tokens.clone(),
            stores: self.stores.clone(),
            roles: self.roles.clone(),
            invitations: self.invitations.clone(),
            plans: self.plans.clone(),
            subscriptions: self.subscriptions.clone(),
            invoices: self.invoices.clone(),
            usage_metrics: self.usage_metrics.clone(),
            product_types: self.product_types.clone(),
            categories: self.categories.clone(),
            products: self.products.clone(),
            variants: self.variants.clone(),
            collections: self.collections.clone(),
            visitors: self.visitors.clone(),
        };
        let rate_limiter = self
            .rate_limiter
            .clone()
            .unwrap_or_else(|| Arc::new(InMemoryRateLimiter::permissive()));

        build_app_state(Arc::new(test_config()), repos, self.email.clone(), rate_limiter)
    }
}

impl Default for TestAppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
