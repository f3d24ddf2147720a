use std::fs::File;
use std::sync::Arc;

use chrono::Duration as ChronoDuration;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    adapters::{email::resend::ResendEmailSender, http::app_state::AppState},
    infra::{RateLimiterTrait, config::AppConfig, postgres_persistence, rate_limit::RedisRateLimiter},
    use_cases::{
        analytics::AnalyticsUseCases,
        authorization::{ResourceAccessUseCases, StoreAccess, StoreRoleRepo},
        catalog::{CatalogUseCases, CategoryRepo, ProductTypeRepo},
        collection::{CollectionRepo, CollectionUseCases},
        invitation::{InvitationRepo, InvitationSettings, InvitationUseCases},
        invoice::{InvoiceRepo, InvoiceUseCases},
        product::{ProductRepo, ProductUseCases, VariantRepo},
        session::{SessionRepo, SessionUseCases},
        staff::StaffUseCases,
        store::{StoreRepo, StoreUseCases},
        subscription::{SubscriptionRepo, SubscriptionUseCases},
        subscription_plan::{PlanRepo, PlanUseCases},
        subscription_scheduler::{SchedulerRepos, SchedulerSettings, SubscriptionScheduler},
        token_revocation::{RevokedTokenRepo, TokenRevocationUseCases},
        usage::{UsageMetricRepo, UsageUseCases},
        user::{AuthSettings, AuthUseCases, EmailSender, UserRepo},
        visitor::{VisitorRepo, VisitorUseCases},
    },
};

/// Every repository the use cases need. Postgres implements all of them;
/// tests plug in the in-memory versions.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepo>,
    pub sessions: Arc<dyn SessionRepo>,
    pub revoked_tokens: Arc<dyn RevokedTokenRepo>,
    pub stores: Arc<dyn StoreRepo>,
    pub roles: Arc<dyn StoreRoleRepo>,
    pub invitations: Arc<dyn InvitationRepo>,
    pub plans: Arc<dyn PlanRepo>,
    pub subscriptions: Arc<dyn SubscriptionRepo>,
    pub invoices: Arc<dyn InvoiceRepo>,
    pub usage_metrics: Arc<dyn UsageMetricRepo>,
    pub product_types: Arc<dyn ProductTypeRepo>,
    pub categories: Arc<dyn CategoryRepo>,
    pub products: Arc<dyn ProductRepo>,
    pub variants: Arc<dyn VariantRepo>,
    pub collections: Arc<dyn CollectionRepo>,
    pub visitors: Arc<dyn VisitorRepo>,
}

pub async fn init_app_state() -> anyhow::Result<AppState> {
    let config = AppConfig::from_env()?;

    let postgres_arc = Arc::new(postgres_persistence(&config.database_url).await?);
    let repos = Repositories {
        users: postgres_arc.clone(),
        sessions: postgres_arc.clone(),
        revoked_tokens: postgres_arc.clone(),
        stores: postgres_arc.clone(),
        roles: postgres_arc.clone(),
        invitations: postgres_arc.clone(),
        plans: postgres_arc.clone(),
        subscriptions: postgres_arc.clone(),
        invoices: postgres_arc.clone(),
        usage_metrics: postgres_arc.clone(),
        product_types: postgres_arc.clone(),
        categories: postgres_arc.clone(),
        products: postgres_arc.clone(),
        variants: postgres_arc.clone(),
        collections: postgres_arc.clone(),
        visitors: postgres_arc,
    };

    let rate_limiter: Arc<dyn RateLimiterTrait> = Arc::new(
        RedisRateLimiter::new(
            &config.redis_url,
            config.rate_limit_window_secs,
            config.rate_limit_per_ip,
            config.rate_limit_per_email,
        )
        .await?,
    );

    let email: Arc<dyn EmailSender> = Arc::new(ResendEmailSender::new(
        config.resend_api_key.clone(),
        config.email_from.clone(),
    ));

    Ok(build_app_state(Arc::new(config), repos, email, rate_limiter))
}

/// Wires the use cases on top of a set of repositories.
pub fn build_app_state(
    config: Arc<AppConfig>,
    repos: Repositories,
    email: Arc<dyn EmailSender>,
    rate_limiter: Arc<dyn RateLimiterTrait>,
) -> AppState {
    let keys = config.jwt_keys();
    let app_origin = config.app_origin_str();

    let revocation = TokenRevocationUseCases::new(repos.revoked_tokens.clone(), keys.clone());
    let sessions = SessionUseCases::new(repos.sessions.clone(), revocation.clone());
    let access = StoreAccess::new(repos.stores.clone(), repos.roles.clone());

    let auth = AuthUseCases::new(
        repos.users.clone(),
        repos.stores.clone(),
        repos.roles.clone(),
        sessions.clone(),
        revocation.clone(),
        email.clone(),
        AuthSettings {
            keys: keys.clone(),
            access_token_ttl: config.access_token_ttl,
            refresh_token_ttl: config.refresh_token_ttl,
            email_verification_ttl_minutes: config.email_verification_ttl_minutes,
            app_origin: app_origin.clone(),
        },
    );

    let stores = StoreUseCases::new(
        repos.stores.clone(),
        repos.roles.clone(),
        access.clone(),
        config.root_domain.clone(),
    );
    let resource_access = ResourceAccessUseCases::new(
        access.clone(),
        repos.users.clone(),
        repos.invitations.clone(),
        repos.products.clone(),
        repos.collections.clone(),
        repos.visitors.clone(),
    );
    let staff = StaffUseCases::new(access.clone(), repos.roles.clone(), repos.users.clone());
    let invitations = InvitationUseCases::new(
        repos.invitations.clone(),
        access.clone(),
        repos.roles.clone(),
        repos.users.clone(),
        repos.stores.clone(),
        email.clone(),
        InvitationSettings {
            secret: keys.current.clone(),
            ttl_days: config.invitation_ttl_days,
            app_origin: app_origin.clone(),
        },
    );

    let plans = PlanUseCases::new(repos.plans.clone(), repos.users.clone());
    let invoices = InvoiceUseCases::new(repos.invoices.clone(), repos.plans.clone(), access.clone());
    let usage = UsageUseCases::new(
        repos.usage_metrics.clone(),
        repos.subscriptions.clone(),
        repos.plans.clone(),
        access.clone(),
    );
    let subscriptions = SubscriptionUseCases::new(
        repos.subscriptions.clone(),
        repos.plans.clone(),
        invoices.clone(),
        usage.clone(),
        access.clone(),
        config.default_trial_days,
    );
    let analytics = AnalyticsUseCases::new(
        repos.subscriptions.clone(),
        repos.plans.clone(),
        repos.invoices.clone(),
        usage.clone(),
        repos.users.clone(),
    );

    let catalog = CatalogUseCases::new(
        repos.product_types.clone(),
        repos.categories.clone(),
        repos.users.clone(),
    );
    let products = ProductUseCases::new(
        repos.products.clone(),
        repos.variants.clone(),
        repos.product_types.clone(),
        repos.categories.clone(),
        usage.clone(),
        access.clone(),
    );
    let collections = CollectionUseCases::new(
        repos.collections.clone(),
        repos.products.clone(),
        access.clone(),
    );
    let visitors = VisitorUseCases::new(
        repos.visitors.clone(),
        repos.stores.clone(),
        usage.clone(),
        access,
    );

    let scheduler = SubscriptionScheduler::new(
        SchedulerRepos {
            subscriptions: repos.subscriptions,
            plans: repos.plans,
            invoices: repos.invoices,
            stores: repos.stores,
            users: repos.users,
            products: repos.products,
        },
        subscriptions.clone(),
        invoices.clone(),
        usage.clone(),
        invitations.clone(),
        email,
        SchedulerSettings {
            app_origin,
            reminder_days: config.reminder_days_threshold,
            interval: ChronoDuration::seconds(config.subscription_job_interval_secs as i64),
        },
    );

    AppState {
        config,
        auth_use_cases: Arc::new(auth),
        session_use_cases: Arc::new(sessions),
        token_revocation: Arc::new(revocation),
        store_use_cases: Arc::new(stores),
        resource_access: Arc::new(resource_access),
        staff_use_cases: Arc::new(staff),
        invitation_use_cases: Arc::new(invitations),
        plan_use_cases: Arc::new(plans),
        subscription_use_cases: Arc::new(subscriptions),
        invoice_use_cases: Arc::new(invoices),
        usage_use_cases: Arc::new(usage),
        analytics_use_cases: Arc::new(analytics),
        catalog_use_cases: Arc::new(catalog),
        product_use_cases: Arc::new(products),
        collection_use_cases: Arc::new(collections),
        visitor_use_cases: Arc::new(visitors),
        scheduler: Arc::new(scheduler),
        rate_limiter,
    }
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "shopx_api=debug,tower_http=debug".into());

    let console_layer = fmt::layer().with_target(false).with_level(true).pretty();

    let registry = tracing_subscriber::registry().with(filter).with(console_layer);

    // JSON file logs are best-effort; a read-only working dir only loses the file sink.
    match File::create("app.log") {
        Ok(file) => {
            let json_layer = fmt::layer()
                .json()
                .with_writer(file)
                .with_current_span(true)
                .with_span_list(true);
            registry.with(json_layer).try_init().ok();
        }
        Err(_) => {
            registry.try_init().ok();
        }
    }
}
