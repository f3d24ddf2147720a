use std::sync::Arc;

use crate::{
    infra::{RateLimiterTrait, config::AppConfig},
    use_cases::{
        analytics::AnalyticsUseCases, authorization::ResourceAccessUseCases,
        catalog::CatalogUseCases, collection::CollectionUseCases, invitation::InvitationUseCases,
        invoice::InvoiceUseCases, product::ProductUseCases, session::SessionUseCases,
        staff::StaffUseCases, store::StoreUseCases, subscription::SubscriptionUseCases,
        subscription_plan::PlanUseCases, subscription_scheduler::SubscriptionScheduler,
        token_revocation::TokenRevocationUseCases, usage::UsageUseCases, user::AuthUseCases,
        visitor::VisitorUseCases,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub auth_use_cases: Arc<AuthUseCases>,
    pub session_use_cases: Arc<SessionUseCases>,
    pub token_revocation: Arc<TokenRevocationUseCases>,
    pub store_use_cases: Arc<StoreUseCases>,
    pub resource_access: Arc<ResourceAccessUseCases>,
    pub staff_use_cases: Arc<StaffUseCases>,
    pub invitation_use_cases: Arc<InvitationUseCases>,
    pub plan_use_cases: Arc<PlanUseCases>,
    pub subscription_use_cases: Arc<SubscriptionUseCases>,
    pub invoice_use_cases: Arc<InvoiceUseCases>,
    pub usage_use_cases: Arc<UsageUseCases>,
    pub analytics_use_cases: Arc<AnalyticsUseCases>,
    pub catalog_use_cases: Arc<CatalogUseCases>,
    pub product_use_cases: Arc<ProductUseCases>,
    pub collection_use_cases: Arc<CollectionUseCases>,
    pub visitor_use_cases: Arc<VisitorUseCases>,
    pub scheduler: Arc<SubscriptionScheduler>,
    pub rate_limiter: Arc<dyn RateLimiterTrait>,
}
