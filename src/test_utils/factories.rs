//! Test data factories for creating valid test fixtures.
//!
//! Each factory function creates a complete, valid object with sensible defaults.
//! Use the closure parameter to override specific fields as needed. Dates that
//! drive lifecycle decisions are relative to the current time so fixtures stay
//! live; `test_datetime` is the fixed anchor for calendar arithmetic.

use chrono::{Duration, NaiveDateTime, Utc};
use secrecy::SecretString;
use uuid::Uuid;

use crate::{
    application::jwt::JwtKeys,
    domain::entities::{
        invoice::{InvoiceStatus, SubscriptionInvoice},
        product::Product,
        session::Session,
        store::Store,
        store_invitation::{InvitationStatus, StoreInvitation},
        store_role::StoreRoleType,
        store_subscription::{StoreSubscription, SubscriptionStatus},
        subscription_plan::{BillingCycle, SubscriptionPlan},
        user::{LOCAL_PROVIDER, User},
    },
    test_utils::TEST_JWT_SECRET,
};

fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Create a test user with a unique username and email.
pub fn create_test_user(overrides: impl FnOnce(&mut User)) -> User {
    let now = Utc::now().naive_utc();
    let suffix = short_id();
    let mut user = User {
        id: Uuid::new_v4(),
        username: format!("user_{suffix}"),
        email: format!("user_{suffix}@example.com"),
        password_hash: String::new(),
        provider: LOCAL_PROVIDER.to_string(),
        provider_id: None,
        name: None,
        first_name: Some("Test".to_string()),
        last_name: Some("User".to_string()),
        image_url: None,
        email_verified: true,
        profile_completed: true,
        is_platform_admin: false,
        created_at: Some(now),
        updated_at: Some(now),
    };
    overrides(&mut user);
    user
}

/// Create a test store owned by `owner_id`.
pub fn create_test_store(owner_id: Uuid, overrides: impl FnOnce(&mut Store)) -> Store {
    let now = Utc::now().naive_utc();
    let mut store = Store {
        id: Uuid::new_v4(),
        owner_id,
        name: "Corner Shop".to_string(),
        slug: format!("corner-shop-{}", short_id()),
        description: Some("A small test store".to_string()),
        logo_url: None,
        is_active: true,
        subdomain: None,
        template: None,
        created_at: Some(now),
        updated_at: Some(now),
    };
    overrides(&mut store);
    store
}

/// Create a test session for `user_id` that expires in a week.
pub fn create_test_session(user_id: Uuid, overrides: impl FnOnce(&mut Session)) -> Session {
    let now = Utc::now().naive_utc();
    let mut session = Session {
        id: Uuid::new_v4(),
        user_id,
        access_jti: Uuid::new_v4(),
        refresh_jti: Uuid::new_v4(),
        user_agent: Some("Mozilla/5.0 (X11; Linux x86_64) Firefox/120.0".to_string()),
        ip_address: Some("127.0.0.1".to_string()),
        device_name: Some("Desktop · Firefox".to_string()),
        location: None,
        last_activity_at: now,
        expires_at: now + Duration::days(7),
        created_at: Some(now),
        updated_at: Some(now),
    };
    overrides(&mut session);
    session
}

/// Create a pending invitation to `store_id` for a manager.
pub fn create_test_invitation(
    store_id: Uuid,
    overrides: impl FnOnce(&mut StoreInvitation),
) -> StoreInvitation {
    let now = Utc::now().naive_utc();
    let mut invitation = StoreInvitation {
        id: Uuid::new_v4(),
        store_id,
        email: "invitee@example.com".to_string(),
        role: StoreRoleType::Manager,
        status: InvitationStatus::Pending,
        invited_by: Uuid::new_v4(),
        expires_at: now + Duration::days(7),
        responded_at: None,
        created_at: Some(now),
    };
    overrides(&mut invitation);
    invitation
}

/// Create an active test plan with a trial period.
pub fn create_test_plan(overrides: impl FnOnce(&mut SubscriptionPlan)) -> SubscriptionPlan {
    let now = Utc::now().naive_utc();
    let mut plan = SubscriptionPlan {
        id: Uuid::new_v4(),
        name: "Basic".to_string(),
        description: Some("Starter plan".to_string()),
        monthly_price_cents: 1900,
        yearly_price_cents: 19_000,
        max_products: 100,
        trial_period_days: Some(14),
        features: vec!["analytics".to_string()],
        is_active: true,
        created_at: Some(now),
        updated_at: Some(now),
    };
    overrides(&mut plan);
    plan
}

/// Create an active monthly subscription that started yesterday.
pub fn create_test_subscription(
    store_id: Uuid,
    plan_id: Uuid,
    overrides: impl FnOnce(&mut StoreSubscription),
) -> StoreSubscription {
    let now = Utc::now().naive_utc();
    let mut subscription = StoreSubscription {
        id: Uuid::new_v4(),
        store_id,
        plan_id,
        status: SubscriptionStatus::Active,
        billing_cycle: BillingCycle::Monthly,
        start_date: now - Duration::days(1),
        end_date: now + Duration::days(29),
        trial_end_date: None,
        next_billing_date: Some(now + Duration::days(29)),
        auto_renew: true,
        converted_from_trial: false,
        canceled_at: None,
        created_at: Some(now),
        updated_at: Some(now),
    };
    overrides(&mut subscription);
    subscription
}

/// Create a pending invoice due next week.
pub fn create_test_invoice(
    store_id: Uuid,
    overrides: impl FnOnce(&mut SubscriptionInvoice),
) -> SubscriptionInvoice {
    let now = Utc::now().naive_utc();
    let mut invoice = SubscriptionInvoice {
        id: Uuid::new_v4(),
        subscription_id: Uuid::new_v4(),
        store_id,
        invoice_number: format!("INV-{}-0001", now.format("%Y%m%d")),
        amount_cents: 1900,
        status: InvoiceStatus::Pending,
        issued_at: now,
        due_at: now + Duration::days(7),
        paid_at: None,
        payment_method: None,
        is_renewal: false,
        notes: None,
        created_at: Some(now),
    };
    overrides(&mut invoice);
    invoice
}

/// Create an active product with a unique SKU and slug.
pub fn create_test_product(store_id: Uuid, overrides: impl FnOnce(&mut Product)) -> Product {
    let now = Utc::now().naive_utc();
    let suffix = short_id();
    let mut product = Product {
        id: Uuid::new_v4(),
        store_id,
        product_type_id: None,
        category_id: None,
        sku: format!("SKU-{}", suffix.to_uppercase()),
        name: "Test Product".to_string(),
        slug: format!("test-product-{suffix}"),
        description: None,
        base_price_cents: 1000,
        sale_price_cents: None,
        is_active: true,
        manage_stock: false,
        stock_threshold: None,
        tags: vec![],
        field_values: vec![],
        created_at: Some(now),
        updated_at: Some(now),
    };
    overrides(&mut product);
    product
}

/// Signing keys shared by tests that mint and verify tokens.
pub fn test_jwt_keys() -> JwtKeys {
    JwtKeys::new(SecretString::from(TEST_JWT_SECRET))
}

/// Returns a consistent test datetime (2024-01-15 12:00:00 UTC).
pub fn test_datetime() -> NaiveDateTime {
    NaiveDateTime::parse_from_str("2024-01-15 12:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_users_are_unique() {
        let a = create_test_user(|_| {});
        let b = create_test_user(|_| {});
        assert_ne!(a.email, b.email);
        assert_ne!(a.username, b.username);
    }

    #[test]
    fn test_create_subscription_with_defaults() {
        let store_id = Uuid::new_v4();
        let plan_id = Uuid::new_v4();
        let sub = create_test_subscription(store_id, plan_id, |_| {});
        assert_eq!(sub.store_id, store_id);
        assert_eq!(sub.plan_id, plan_id);
        assert!(sub.is_active(Utc::now().naive_utc()));
    }

    #[test]
    fn test_create_plan_with_overrides() {
        let plan = create_test_plan(|p| {
            p.name = "Pro".to_string();
            p.max_products = 5;
        });
        assert_eq!(plan.name, "Pro");
        assert_eq!(plan.max_products, 5);
        assert!(plan.is_active);
    }

    #[test]
    fn test_products_get_distinct_skus() {
        let store_id = Uuid::new_v4();
        let a = create_test_product(store_id, |_| {});
        let b = create_test_product(store_id, |_| {});
        assert_ne!(a.sku, b.sku);
        assert_ne!(a.slug, b.slug);
    }

    #[test]
    fn test_invitation_is_pending() {
        let invitation = create_test_invitation(Uuid::new_v4(), |_| {});
        assert_eq!(invitation.status, InvitationStatus::Pending);
        assert!(!invitation.is_expired_at(Utc::now().naive_utc()));
    }
}
