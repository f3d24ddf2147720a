//! Store subscription lifecycle. Every status transition happens here.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDateTime, Utc};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::app_error::{AppError, AppResult, LimitExceeded};
use crate::application::use_cases::{
    authorization::StoreAccess,
    invoice::{INVOICE_DUE_DAYS, InvoiceUseCases},
    subscription_plan::PlanRepo,
    usage::UsageUseCases,
};
use crate::domain::entities::{
    store_role::StoreRoleType,
    store_subscription::{StoreSubscription, SubscriptionStatus},
    subscription_plan::{BillingCycle, SubscriptionPlan},
    usage_metric::{LimitType, MetricType},
};

#[async_trait]
pub trait SubscriptionRepo: Send + Sync {
    async fn create(&self, subscription: &StoreSubscription) -> AppResult<StoreSubscription>;
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<StoreSubscription>>;
    /// Newest subscription of the store in trial or active status.
    async fn find_latest_active(&self, store_id: Uuid) -> AppResult<Option<StoreSubscription>>;
    async fn list_by_store(&self, store_id: Uuid) -> AppResult<Vec<StoreSubscription>>;
    async fn list_by_status(&self, statuses: &[SubscriptionStatus]) -> AppResult<Vec<StoreSubscription>>;
    async fn list_all(&self) -> AppResult<Vec<StoreSubscription>>;
    async fn update(&self, subscription: &StoreSubscription) -> AppResult<StoreSubscription>;
}

#[derive(Clone)]
pub struct SubscriptionUseCases {
    subscriptions: Arc<dyn SubscriptionRepo>,
    plans: Arc<dyn PlanRepo>,
    invoices: InvoiceUseCases,
    usage: UsageUseCases,
    access: StoreAccess,
    default_trial_days: i64,
}

impl SubscriptionUseCases {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepo>,
        plans: Arc<dyn PlanRepo>,
        invoices: InvoiceUseCases,
        usage: UsageUseCases,
        access: StoreAccess,
        default_trial_days: i64,
    ) -> Self {
        Self {
            subscriptions,
            plans,
            invoices,
            usage,
            access,
            default_trial_days,
        }
    }

    // ========================================================================
    // Starting a subscription
    // ========================================================================

    #[instrument(skip(self))]
    pub async fn start_trial(
        &self,
        user_id: Uuid,
        store_id: Uuid,
        plan_id: Uuid,
        cycle: BillingCycle,
    ) -> AppResult<StoreSubscription> {
        self.access
            .require_store_role(user_id, store_id, StoreRoleType::Owner)
            .await?;
        let plan = self.active_plan(plan_id).await?;
        self.ensure_no_live_subscription(store_id).await?;

        let now = Utc::now().naive_utc();
        let trial_days = plan
            .trial_period_days
            .map(i64::from)
            .unwrap_or(self.default_trial_days);
        let trial_end = now + ChronoDuration::days(trial_days);
        let subscription = self
            .subscriptions
            .create(&StoreSubscription {
                id: Uuid::new_v4(),
                store_id,
                plan_id: plan.id,
                status: SubscriptionStatus::Trial,
                billing_cycle: cycle,
                start_date: now,
                end_date: cycle.period_end(now),
                trial_end_date: Some(trial_end),
                next_billing_date: Some(trial_end),
                auto_renew: true,
                converted_from_trial: false,
                canceled_at: None,
                created_at: Some(now),
                updated_at: Some(now),
            })
            .await?;
        self.usage.initialize(store_id).await?;

        info!(subscription_id = %subscription.id, %store_id, trial_days, "Trial started");
        Ok(subscription)
    }

    #[instrument(skip(self))]
    pub async fn subscribe(
        &self,
        user_id: Uuid,
        store_id: Uuid,
        plan_id: Uuid,
        cycle: BillingCycle,
    ) -> AppResult<StoreSubscription> {
        self.access
            .require_store_role(user_id, store_id, StoreRoleType::Owner)
            .await?;
        let plan = self.active_plan(plan_id).await?;
        self.ensure_no_live_subscription(store_id).await?;

        let now = Utc::now().naive_utc();
        let end = cycle.period_end(now);
        let subscription = self
            .subscriptions
            .create(&StoreSubscription {
                id: Uuid::new_v4(),
                store_id,
                plan_id: plan.id,
                status: SubscriptionStatus::Active,
                billing_cycle: cycle,
                start_date: now,
                end_date: end,
                trial_end_date: None,
                next_billing_date: Some(end),
                auto_renew: true,
                converted_from_trial: false,
                canceled_at: None,
                created_at: Some(now),
                updated_at: Some(now),
            })
            .await?;
        self.usage.initialize(store_id).await?;
        self.invoices
            .generate(
                &subscription,
                plan.price_for(cycle),
                now + ChronoDuration::days(INVOICE_DUE_DAYS),
            )
            .await?;

        info!(subscription_id = %subscription.id, %store_id, "Subscription started");
        Ok(subscription)
    }

    // ========================================================================
    // Changes to a live subscription
    // ========================================================================

    #[instrument(skip(self))]
    pub async fn change_plan(
        &self,
        user_id: Uuid,
        store_id: Uuid,
        new_plan_id: Uuid,
        cycle: BillingCycle,
    ) -> AppResult<StoreSubscription> {
        self.access
            .require_store_role(user_id, store_id, StoreRoleType::Owner)
            .await?;
        let mut subscription = self.live_subscription(store_id).await?;
        let plan = self.active_plan(new_plan_id).await?;

        if plan.id == subscription.plan_id && cycle == subscription.billing_cycle {
            return Err(AppError::InvalidInput(
                "The store is already on this plan and billing cycle".into(),
            ));
        }

        let products = self.usage.get_value(store_id, MetricType::ProductCount).await?;
        let max_products = i64::from(plan.max_products);
        if products > max_products {
            return Err(AppError::SubscriptionLimitExceeded(
                LimitExceeded::new(
                    LimitType::Product,
                    format!(
                        "The store has {products} products but '{}' allows {max_products}",
                        plan.name
                    ),
                )
                .with_usage(products, max_products),
            ));
        }

        let now = Utc::now().naive_utc();
        subscription.plan_id = plan.id;
        subscription.billing_cycle = cycle;
        subscription.start_date = now;
        subscription.end_date = cycle.period_end(now);
        subscription.updated_at = Some(now);

        let in_trial = subscription.is_in_trial(now);
        if in_trial {
            subscription.next_billing_date = subscription.trial_end_date;
        } else {
            subscription.status = SubscriptionStatus::Active;
            subscription.next_billing_date = Some(subscription.end_date);
        }
        let subscription = self.subscriptions.update(&subscription).await?;

        if !in_trial {
            self.invoices
                .generate(
                    &subscription,
                    plan.price_for(cycle),
                    now + ChronoDuration::days(INVOICE_DUE_DAYS),
                )
                .await?;
        }
        info!(subscription_id = %subscription.id, plan = %plan.name, "Plan changed");
        Ok(subscription)
    }

    /// Starts the next billing period and issues its renewal invoice. A trial
    /// converts into a paid period starting now.
    #[instrument(skip(self, subscription), fields(subscription_id = %subscription.id))]
    pub async fn renew(&self, subscription: &StoreSubscription) -> AppResult<StoreSubscription> {
        let now = Utc::now().naive_utc();
        let mut renewed = subscription.clone();
        let start = if renewed.status == SubscriptionStatus::Trial {
            renewed.converted_from_trial = true;
            renewed.trial_end_date = None;
            now
        } else if renewed.end_date > now {
            renewed.end_date
        } else {
            now
        };

        renewed.status = SubscriptionStatus::Active;
        renewed.start_date = start;
        renewed.end_date = renewed.billing_cycle.period_end(start);
        renewed.next_billing_date = Some(renewed.end_date);
        renewed.canceled_at = None;
        renewed.updated_at = Some(now);

        let renewed = self.subscriptions.update(&renewed).await?;
        self.invoices.generate_renewal(&renewed).await?;
        info!(end_date = %renewed.end_date, "Subscription renewed");
        Ok(renewed)
    }

    /// Cancels now, or at the end of the current period.
    #[instrument(skip(self))]
    pub async fn cancel(
        &self,
        user_id: Uuid,
        store_id: Uuid,
        immediately: bool,
    ) -> AppResult<StoreSubscription> {
        self.access
            .require_store_role(user_id, store_id, StoreRoleType::Owner)
            .await?;
        let mut subscription = self.live_subscription(store_id).await?;
        let now = Utc::now().naive_utc();

        subscription.auto_renew = false;
        subscription.canceled_at = Some(now);
        subscription.next_billing_date = None;
        subscription.updated_at = Some(now);
        if immediately {
            subscription.status = SubscriptionStatus::Canceled;
            subscription.end_date = now;
        }

        let subscription = self.subscriptions.update(&subscription).await?;
        info!(subscription_id = %subscription.id, immediately, "Subscription canceled");
        Ok(subscription)
    }

    #[instrument(skip(self))]
    pub async fn set_auto_renew(
        &self,
        user_id: Uuid,
        store_id: Uuid,
        auto_renew: bool,
    ) -> AppResult<StoreSubscription> {
        self.access
            .require_store_role(user_id, store_id, StoreRoleType::Owner)
            .await?;
        let mut subscription = self.live_subscription(store_id).await?;
        subscription.auto_renew = auto_renew;
        if auto_renew && subscription.canceled_at.take().is_some() {
            // Turning renewal back on withdraws a cancellation at period end.
            subscription.next_billing_date = if subscription.status == SubscriptionStatus::Trial {
                subscription.trial_end_date
            } else {
                Some(subscription.end_date)
            };
            info!(subscription_id = %subscription.id, "Pending cancellation withdrawn");
        }
        subscription.updated_at = Some(Utc::now().naive_utc());
        self.subscriptions.update(&subscription).await
    }

    /// Moves a subscription to `Expired`.
    pub async fn expire(&self, subscription: &StoreSubscription) -> AppResult<StoreSubscription> {
        let mut expired = subscription.clone();
        expired.status = SubscriptionStatus::Expired;
        expired.auto_renew = false;
        expired.next_billing_date = None;
        expired.updated_at = Some(Utc::now().naive_utc());
        self.subscriptions.update(&expired).await
    }

    // ========================================================================
    // Queries
    // ========================================================================

    #[instrument(skip(self))]
    pub async fn active_subscription(&self, user_id: Uuid, store_id: Uuid) -> AppResult<StoreSubscription> {
        self.access
            .require_store_role(user_id, store_id, StoreRoleType::Staff)
            .await?;
        self.live_subscription(store_id).await
    }

    #[instrument(skip(self))]
    pub async fn history(&self, user_id: Uuid, store_id: Uuid) -> AppResult<Vec<StoreSubscription>> {
        self.access
            .require_store_role(user_id, store_id, StoreRoleType::Staff)
            .await?;
        let mut subscriptions = self.subscriptions.list_by_store(store_id).await?;
        subscriptions.sort_by(|a, b| b.start_date.cmp(&a.start_date));
        Ok(subscriptions)
    }

    // ========================================================================
    // Plan validation
    // ========================================================================

    pub async fn can_add_products(&self, store_id: Uuid, count: i64) -> AppResult<bool> {
        let Some((_, plan)) = self.current_plan(store_id).await? else {
            return Ok(false);
        };
        let used = self.usage.get_value(store_id, MetricType::ProductCount).await?;
        Ok(used + count <= i64::from(plan.max_products))
    }

    pub async fn has_feature_access(&self, store_id: Uuid, feature: &str) -> AppResult<bool> {
        Ok(self
            .current_plan(store_id)
            .await?
            .is_some_and(|(_, plan)| plan.has_feature(feature)))
    }

    /// A store without a live subscription counts as over its limits.
    pub async fn is_over_limit(&self, store_id: Uuid) -> AppResult<bool> {
        let Some((_, plan)) = self.current_plan(store_id).await? else {
            return Ok(true);
        };
        let used = self.usage.get_value(store_id, MetricType::ProductCount).await?;
        Ok(used > i64::from(plan.max_products))
    }

    async fn current_plan(&self, store_id: Uuid) -> AppResult<Option<(StoreSubscription, SubscriptionPlan)>> {
        match self.usage.active_plan(store_id).await {
            Ok(found) => Ok(Some(found)),
            Err(AppError::SubscriptionLimitExceeded(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn live_subscription(&self, store_id: Uuid) -> AppResult<StoreSubscription> {
        let now = Utc::now().naive_utc();
        self.subscriptions
            .find_latest_active(store_id)
            .await?
            .filter(|s| s.is_active(now))
            .ok_or(AppError::NotFound)
    }

    async fn ensure_no_live_subscription(&self, store_id: Uuid) -> AppResult<()> {
        let now = Utc::now().naive_utc();
        if self
            .subscriptions
            .find_latest_active(store_id)
            .await?
            .is_some_and(|s| s.is_active(now))
        {
            return Err(AppError::InvalidInput(
                "Store already has an active subscription".into(),
            ));
        }
        Ok(())
    }

    async fn active_plan(&self, plan_id: Uuid) -> AppResult<SubscriptionPlan> {
        let plan = self
            .plans
            .get_by_id(plan_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if !plan.is_active {
            return Err(AppError::InvalidInput("This plan is no longer available".into()));
        }
        Ok(plan)
    }
}

/// Active, auto-renewing, uncanceled subscriptions whose period ends before
/// `now + lead`. Periods that already ended are included so a missed run
/// still renews them.
pub fn due_for_renewal(
    subscriptions: Vec<StoreSubscription>,
    now: NaiveDateTime,
    lead: ChronoDuration,
) -> Vec<StoreSubscription> {
    subscriptions
        .into_iter()
        .filter(|s| {
            s.status == SubscriptionStatus::Active
                && s.auto_renew
                && s.canceled_at.is_none()
                && s.end_date <= now + lead
        })
        .collect()
}
