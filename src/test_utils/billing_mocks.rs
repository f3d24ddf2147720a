//! In-memory mock implementations for plan, subscription, invoice and usage repository traits.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::{
        invoice::InvoiceRepo,
        subscription::SubscriptionRepo,
        subscription_plan::{PlanInput, PlanRepo},
        usage::UsageMetricRepo,
    },
    domain::entities::{
        invoice::{InvoiceStatus, SubscriptionInvoice},
        store_subscription::{StoreSubscription, SubscriptionStatus},
        subscription_plan::SubscriptionPlan,
        usage_metric::{MetricType, UsageMetric},
    },
};

// ============================================================================
// InMemoryPlanRepo
// ============================================================================

/// In-memory implementation of PlanRepo for testing.
#[derive(Default)]
pub struct InMemoryPlanRepo {
    pub plans: Mutex<HashMap<Uuid, SubscriptionPlan>>,
}

impl InMemoryPlanRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plans(plans: Vec<SubscriptionPlan>) -> Self {
        let map: HashMap<Uuid, SubscriptionPlan> = plans.into_iter().map(|p| (p.id, p)).collect();
        Self {
            plans: Mutex::new(map),
        }
    }

    fn sorted(&self, active_only: bool) -> Vec<SubscriptionPlan> {
        let mut plans: Vec<SubscriptionPlan> = self
            .plans
            .lock()
            .unwrap()
            .values()
            .filter(|p| !active_only || p.is_active)
            .cloned()
            .collect();
        plans.sort_by(|a, b| {
            a.monthly_price_cents
                .cmp(&b.monthly_price_cents)
                .then_with(|| a.name.cmp(&b.name))
        });
        plans
    }
}

#[async_trait]
impl PlanRepo for InMemoryPlanRepo {
    async fn create(&self, input: &PlanInput) -> AppResult<SubscriptionPlan> {
        let now = chrono::Utc::now().naive_utc();
        let plan = SubscriptionPlan {
            id: Uuid::new_v4(),
            name: input.name.clone(),
            description: input.description.clone(),
            monthly_price_cents: input.monthly_price_cents,
            yearly_price_cents: input.yearly_price_cents,
            max_products: input.max_products,
            trial_period_days: input.trial_period_days,
            features: input.features.clone(),
            is_active: input.is_active,
            created_at: Some(now),
            updated_at: Some(now),
        };
        self.plans.lock().unwrap().insert(plan.id, plan.clone());
        Ok(plan)
    }

    async fn update(&self, plan: &SubscriptionPlan) -> AppResult<SubscriptionPlan> {
        let mut plans = self.plans.lock().unwrap();
        if !plans.contains_key(&plan.id) {
            return Err(AppError::NotFound);
        }
        plans.insert(plan.id, plan.clone());
        Ok(plan.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<SubscriptionPlan>> {
        Ok(self.plans.lock().unwrap().get(&id).cloned())
    }

    async fn get_by_name(&self, name: &str) -> AppResult<Option<SubscriptionPlan>> {
        Ok(self
            .plans
            .lock()
            .unwrap()
            .values()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    async fn list_active(&self) -> AppResult<Vec<SubscriptionPlan>> {
        Ok(self.sorted(true))
    }

    async fn list_all(&self) -> AppResult<Vec<SubscriptionPlan>> {
        Ok(self.sorted(false))
    }
}

// ============================================================================
// InMemorySubscriptionRepo
// ============================================================================

/// In-memory implementation of SubscriptionRepo for testing.
#[derive(Default)]
pub struct InMemorySubscriptionRepo {
    pub subscriptions: Mutex<HashMap<Uuid, StoreSubscription>>,
}

impl InMemorySubscriptionRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subscriptions(subscriptions: Vec<StoreSubscription>) -> Self {
        let map: HashMap<Uuid, StoreSubscription> =
            subscriptions.into_iter().map(|s| (s.id, s)).collect();
        Self {
            subscriptions: Mutex::new(map),
        }
    }

    pub fn get_all(&self) -> Vec<StoreSubscription> {
        self.subscriptions.lock().unwrap().values().cloned().collect()
    }
}

fn newest_first(subs: &mut [StoreSubscription]) {
    subs.sort_by(|a, b| {
        b.created_at
            .unwrap_or(b.start_date)
            .cmp(&a.created_at.unwrap_or(a.start_date))
    });
}

#[async_trait]
impl SubscriptionRepo for InMemorySubscriptionRepo {
    async fn create(&self, subscription: &StoreSubscription) -> AppResult<StoreSubscription> {
        self.subscriptions
            .lock()
            .unwrap()
            .insert(subscription.id, subscription.clone());
        Ok(subscription.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<StoreSubscription>> {
        Ok(self.subscriptions.lock().unwrap().get(&id).cloned())
    }

    async fn find_latest_active(&self, store_id: Uuid) -> AppResult<Option<StoreSubscription>> {
        let mut live: Vec<StoreSubscription> = self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.store_id == store_id && s.status.is_live())
            .cloned()
            .collect();
        newest_first(&mut live);
        Ok(live.into_iter().next())
    }

    async fn list_by_store(&self, store_id: Uuid) -> AppResult<Vec<StoreSubscription>> {
        let mut subs: Vec<StoreSubscription> = self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.store_id == store_id)
            .cloned()
            .collect();
        newest_first(&mut subs);
        Ok(subs)
    }

    async fn list_by_status(&self, statuses: &[SubscriptionStatus]) -> AppResult<Vec<StoreSubscription>> {
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .filter(|s| statuses.contains(&s.status))
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> AppResult<Vec<StoreSubscription>> {
        Ok(self.get_all())
    }

    async fn update(&self, subscription: &StoreSubscription) -> AppResult<StoreSubscription> {
        let mut subs = self.subscriptions.lock().unwrap();
        if !subs.contains_key(&subscription.id) {
            return Err(AppError::NotFound);
        }
        subs.insert(subscription.id, subscription.clone());
        Ok(subscription.clone())
    }
}

// ============================================================================
// InMemoryInvoiceRepo
// ============================================================================

/// In-memory implementation of InvoiceRepo for testing.
#[derive(Default)]
pub struct InMemoryInvoiceRepo {
    pub invoices: Mutex<HashMap<Uuid, SubscriptionInvoice>>,
}

impl InMemoryInvoiceRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_invoices(invoices: Vec<SubscriptionInvoice>) -> Self {
        let map: HashMap<Uuid, SubscriptionInvoice> =
            invoices.into_iter().map(|i| (i.id, i)).collect();
        Self {
            invoices: Mutex::new(map),
        }
    }

    pub fn get_all(&self) -> Vec<SubscriptionInvoice> {
        self.invoices.lock().unwrap().values().cloned().collect()
    }

    fn filtered(&self, predicate: impl Fn(&SubscriptionInvoice) -> bool) -> Vec<SubscriptionInvoice> {
        let mut invoices: Vec<SubscriptionInvoice> = self
            .invoices
            .lock()
            .unwrap()
            .values()
            .filter(|i| predicate(i))
            .cloned()
            .collect();
        invoices.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
        invoices
    }
}

#[async_trait]
impl InvoiceRepo for InMemoryInvoiceRepo {
    async fn create(&self, invoice: &SubscriptionInvoice) -> AppResult<SubscriptionInvoice> {
        self.invoices
            .lock()
            .unwrap()
            .insert(invoice.id, invoice.clone());
        Ok(invoice.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<SubscriptionInvoice>> {
        Ok(self.invoices.lock().unwrap().get(&id).cloned())
    }

    async fn list_by_store(&self, store_id: Uuid) -> AppResult<Vec<SubscriptionInvoice>> {
        Ok(self.filtered(|i| i.store_id == store_id))
    }

    async fn list_by_subscription(&self, subscription_id: Uuid) -> AppResult<Vec<SubscriptionInvoice>> {
        Ok(self.filtered(|i| i.subscription_id == subscription_id))
    }

    async fn list_by_status(&self, status: InvoiceStatus) -> AppResult<Vec<SubscriptionInvoice>> {
        Ok(self.filtered(|i| i.status == status))
    }

    async fn list_paid_between(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> AppResult<Vec<SubscriptionInvoice>> {
        Ok(self.filtered(|i| {
            i.status == InvoiceStatus::Paid && i.paid_at.is_some_and(|at| at >= from && at < to)
        }))
    }

    async fn list_issued_between(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> AppResult<Vec<SubscriptionInvoice>> {
        Ok(self.filtered(|i| i.issued_at >= from && i.issued_at < to))
    }

    async fn update(&self, invoice: &SubscriptionInvoice) -> AppResult<SubscriptionInvoice> {
        let mut invoices = self.invoices.lock().unwrap();
        if !invoices.contains_key(&invoice.id) {
            return Err(AppError::NotFound);
        }
        invoices.insert(invoice.id, invoice.clone());
        Ok(invoice.clone())
    }

    async fn invoice_number_exists(&self, number: &str) -> AppResult<bool> {
        Ok(self
            .invoices
            .lock()
            .unwrap()
            .values()
            .any(|i| i.invoice_number == number))
    }
}

// ============================================================================
// InMemoryUsageMetricRepo
// ============================================================================

/// In-memory implementation of UsageMetricRepo for testing.
#[derive(Default)]
pub struct InMemoryUsageMetricRepo {
    pub metrics: Mutex<HashMap<(Uuid, MetricType), UsageMetric>>,
}

impl InMemoryUsageMetricRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UsageMetricRepo for InMemoryUsageMetricRepo {
    async fn get(&self, store_id: Uuid, metric: MetricType) -> AppResult<Option<UsageMetric>> {
        Ok(self.metrics.lock().unwrap().get(&(store_id, metric)).cloned())
    }

    async fn set(&self, store_id: Uuid, metric: MetricType, value: i64) -> AppResult<UsageMetric> {
        let row = UsageMetric {
            store_id,
            metric_type: metric,
            count: value,
            updated_at: Some(chrono::Utc::now().naive_utc()),
        };
        self.metrics
            .lock()
            .unwrap()
            .insert((store_id, metric), row.clone());
        Ok(row)
    }

    async fn adjust(&self, store_id: Uuid, metric: MetricType, delta: i64) -> AppResult<UsageMetric> {
        let mut metrics = self.metrics.lock().unwrap();
        let row = metrics.entry((store_id, metric)).or_insert(UsageMetric {
            store_id,
            metric_type: metric,
            count: 0,
            updated_at: None,
        });
        row.count = (row.count + delta).max(0);
        row.updated_at = Some(chrono::Utc::now().naive_utc());
        Ok(row.clone())
    }

    async fn list_by_store(&self, store_id: Uuid) -> AppResult<Vec<UsageMetric>> {
        Ok(self
            .metrics
            .lock()
            .unwrap()
            .values()
            .filter(|m| m.store_id == store_id)
            .cloned()
            .collect())
    }

    async fn list_by_type(&self, metric: MetricType) -> AppResult<Vec<UsageMetric>> {
        Ok(self
            .metrics
            .lock()
            .unwrap()
            .values()
            .filter(|m| m.metric_type == metric)
            .cloned()
            .collect())
    }
}
