//! Billing analytics for platform administrators. Loading happens in
//! `AnalyticsUseCases`; the numbers come from the pure functions below.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Months, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::application::use_cases::{
    authorization::require_platform_admin, invoice::InvoiceRepo, subscription::SubscriptionRepo,
    subscription_plan::PlanRepo, usage::UsageUseCases, user::UserRepo,
};
use crate::domain::entities::{
    invoice::{InvoiceStatus, SubscriptionInvoice},
    store_subscription::{StoreSubscription, SubscriptionStatus},
    subscription_plan::{BillingCycle, SubscriptionPlan},
    usage_metric::MetricType,
};

const MONTHS_PER_YEAR: f64 = 12.0;
pub const MAX_WINDOW_DAYS: i64 = 3_650;

// ============================================================================
// Report types
// ============================================================================

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlanCount {
    pub plan_id: Uuid,
    pub plan_name: String,
    pub subscriptions: i64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
pub struct CycleDistribution {
    pub monthly: i64,
    pub yearly: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlanProductUsage {
    pub plan_id: Uuid,
    pub plan_name: String,
    pub max_products: i32,
    pub average_products: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StoreLimitUsage {
    pub store_id: Uuid,
    pub plan_name: String,
    pub product_count: i64,
    pub max_products: i32,
    pub usage_percentage: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlanRevenue {
    pub plan_id: Uuid,
    pub plan_name: String,
    pub revenue_cents: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MonthlyRevenueReport {
    pub year: i32,
    pub month: u32,
    pub total_revenue_cents: i64,
    pub recurring_revenue_cents: i64,
    pub one_time_revenue_cents: i64,
    pub new_subscriptions: i64,
    pub canceled_subscriptions: i64,
    pub active_subscriptions: i64,
    pub revenue_by_plan: Vec<PlanRevenue>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlanPerformance {
    pub plan_id: Uuid,
    pub plan_name: String,
    pub subscriptions: i64,
    pub conversions: i64,
    pub conversion_rate: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PerformanceReport {
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
    pub total_subscriptions: i64,
    pub new_subscriptions: i64,
    pub renewed_subscriptions: i64,
    pub canceled_subscriptions: i64,
    pub expired_subscriptions: i64,
    pub trial_subscriptions: i64,
    pub conversions: i64,
    pub conversion_rate: f64,
    pub retention_rate: f64,
    pub churn_rate: f64,
    pub revenue_cents: i64,
    pub average_revenue_per_subscription_cents: i64,
    pub by_plan: Vec<PlanPerformance>,
}

// ============================================================================
// Use cases
// ============================================================================

#[derive(Clone)]
pub struct AnalyticsUseCases {
    subscriptions: Arc<dyn SubscriptionRepo>,
    plans: Arc<dyn PlanRepo>,
    invoices: Arc<dyn InvoiceRepo>,
    usage: UsageUseCases,
    users: Arc<dyn UserRepo>,
}

impl AnalyticsUseCases {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepo>,
        plans: Arc<dyn PlanRepo>,
        invoices: Arc<dyn InvoiceRepo>,
        usage: UsageUseCases,
        users: Arc<dyn UserRepo>,
    ) -> Self {
        Self {
            subscriptions,
            plans,
            invoices,
            usage,
            users,
        }
    }

    #[instrument(skip(self))]
    pub async fn trial_conversion_rate(
        &self,
        user_id: Uuid,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> AppResult<f64> {
        let subscriptions = self.load(user_id).await?;
        Ok(trial_conversion_rate(&subscriptions, from, to))
    }

    #[instrument(skip(self))]
    pub async fn monthly_recurring_revenue(&self, user_id: Uuid, at: NaiveDateTime) -> AppResult<i64> {
        let subscriptions = self.load(user_id).await?;
        let plans = self.plan_map().await?;
        Ok(monthly_recurring_revenue(&subscriptions, &plans, at))
    }

    pub async fn churn_rate(&self, user_id: Uuid, days: i64) -> AppResult<f64> {
        let days = window_days(days)?;
        let subscriptions = self.load(user_id).await?;
        Ok(churn_rate(&subscriptions, Utc::now().naive_utc(), days))
    }

    pub async fn retention_rate(&self, user_id: Uuid, days: i64) -> AppResult<f64> {
        Ok(1.0 - self.churn_rate(user_id, days).await?)
    }

    pub async fn auto_renewal_rate(&self, user_id: Uuid) -> AppResult<f64> {
        let subscriptions = self.load(user_id).await?;
        Ok(auto_renewal_rate(&subscriptions, Utc::now().naive_utc()))
    }

    pub async fn distribution_by_plan(&self, user_id: Uuid) -> AppResult<Vec<PlanCount>> {
        let subscriptions = self.load(user_id).await?;
        let plans = self.plan_map().await?;
        Ok(distribution_by_plan(&subscriptions, &plans, Utc::now().naive_utc()))
    }

    pub async fn distribution_by_billing_cycle(&self, user_id: Uuid) -> AppResult<CycleDistribution> {
        let subscriptions = self.load(user_id).await?;
        Ok(distribution_by_billing_cycle(&subscriptions, Utc::now().naive_utc()))
    }

    pub async fn average_product_usage_by_plan(&self, user_id: Uuid) -> AppResult<Vec<PlanProductUsage>> {
        let subscriptions = self.load(user_id).await?;
        let plans = self.plan_map().await?;
        let counts = self.product_counts(&subscriptions).await?;
        Ok(average_product_usage_by_plan(&subscriptions, &plans, &counts, Utc::now().naive_utc()))
    }

    /// Stores whose product usage reached `threshold` (a fraction) of their plan.
    pub async fn stores_near_product_limit(
        &self,
        user_id: Uuid,
        threshold: f64,
    ) -> AppResult<Vec<StoreLimitUsage>> {
        let subscriptions = self.load(user_id).await?;
        let plans = self.plan_map().await?;
        let counts = self.product_counts(&subscriptions).await?;
        Ok(stores_near_product_limit(
            &subscriptions,
            &plans,
            &counts,
            threshold,
            Utc::now().naive_utc(),
        ))
    }

    #[instrument(skip(self))]
    pub async fn monthly_revenue_report(
        &self,
        user_id: Uuid,
        year: i32,
        month: u32,
    ) -> AppResult<MonthlyRevenueReport> {
        let (from, to) = month_range(year, month)?;
        let subscriptions = self.load(user_id).await?;
        let plans = self.plan_map().await?;
        let paid = self.invoices.list_paid_between(from, to).await?;
        Ok(monthly_revenue_report(year, month, from, to, &subscriptions, &plans, &paid))
    }

    #[instrument(skip(self))]
    pub async fn performance_report(
        &self,
        user_id: Uuid,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> AppResult<PerformanceReport> {
        if from >= to {
            return Err(AppError::InvalidInput("`from` must be before `to`".into()));
        }
        let subscriptions = self.load(user_id).await?;
        let plans = self.plan_map().await?;
        let paid = self.invoices.list_paid_between(from, to).await?;
        let issued = self.invoices.list_issued_between(from, to).await?;
        Ok(performance_report(from, to, &subscriptions, &plans, &paid, &issued))
    }

    async fn load(&self, user_id: Uuid) -> AppResult<Vec<StoreSubscription>> {
        require_platform_admin(self.users.as_ref(), user_id).await?;
        self.subscriptions.list_all().await
    }

    async fn plan_map(&self) -> AppResult<HashMap<Uuid, SubscriptionPlan>> {
        Ok(self
            .plans
            .list_all()
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect())
    }

    async fn product_counts(&self, subscriptions: &[StoreSubscription]) -> AppResult<HashMap<Uuid, i64>> {
        let mut counts = HashMap::new();
        for subscription in subscriptions {
            if counts.contains_key(&subscription.store_id) {
                continue;
            }
            let count = self
                .usage
                .get_value(subscription.store_id, MetricType::ProductCount)
                .await?;
            counts.insert(subscription.store_id, count);
        }
        Ok(counts)
    }
}

// ============================================================================
// Computations
// ============================================================================

fn ratio(part: i64, whole: i64) -> f64 {
    if whole <= 0 { 0.0 } else { part as f64 / whole as f64 }
}

fn created(subscription: &StoreSubscription) -> NaiveDateTime {
    subscription.created_at.unwrap_or(subscription.start_date)
}

fn in_range(at: NaiveDateTime, from: NaiveDateTime, to: NaiveDateTime) -> bool {
    at >= from && at < to
}

fn started_as_trial(subscription: &StoreSubscription) -> bool {
    subscription.trial_end_date.is_some() || subscription.converted_from_trial
}

fn plan_name(plans: &HashMap<Uuid, SubscriptionPlan>, plan_id: Uuid) -> String {
    plans
        .get(&plan_id)
        .map(|p| p.name.clone())
        .unwrap_or_else(|| "Unknown plan".to_string())
}

/// Monthly share of a plan price in cents, before rounding.
pub fn monthly_amount_cents(plan: &SubscriptionPlan, cycle: BillingCycle) -> f64 {
    match cycle {
        BillingCycle::Monthly => plan.monthly_price_cents as f64,
        BillingCycle::Yearly => plan.yearly_price_cents as f64 / MONTHS_PER_YEAR,
    }
}

/// Of the subscriptions created as trials within the range, the share that converted.
pub fn trial_conversion_rate(subscriptions: &[StoreSubscription], from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    let trials: Vec<_> = subscriptions
        .iter()
        .filter(|s| started_as_trial(s) && in_range(created(s), from, to))
        .collect();
    let converted = trials.iter().filter(|s| s.converted_from_trial).count();
    ratio(converted as i64, trials.len() as i64)
}

/// Paid subscriptions covering `at`, as monthly cents.
pub fn monthly_recurring_revenue(
    subscriptions: &[StoreSubscription],
    plans: &HashMap<Uuid, SubscriptionPlan>,
    at: NaiveDateTime,
) -> i64 {
    subscriptions
        .iter()
        .filter(|s| s.status == SubscriptionStatus::Active && s.start_date <= at && at < s.end_date)
        .filter_map(|s| plans.get(&s.plan_id).map(|p| monthly_amount_cents(p, s.billing_cycle)))
        .sum::<f64>()
        .round() as i64
}

/// Share of subscriptions that ended within the last `days` among those alive at
/// the start of the window or since.
pub fn churn_rate(subscriptions: &[StoreSubscription], now: NaiveDateTime, days: i64) -> f64 {
    let since = now - ChronoDuration::days(days);
    let ended_in_window = |s: &StoreSubscription| {
        matches!(s.status, SubscriptionStatus::Canceled | SubscriptionStatus::Expired)
            && s.end_date >= since
            && s.end_date <= now
    };
    let churned = subscriptions.iter().filter(|s| ended_in_window(s)).count();
    let alive = subscriptions.iter().filter(|s| s.is_active(now)).count();
    ratio(churned as i64, (churned + alive) as i64)
}

pub fn auto_renewal_rate(subscriptions: &[StoreSubscription], now: NaiveDateTime) -> f64 {
    let live: Vec<_> = subscriptions.iter().filter(|s| s.is_active(now)).collect();
    let renewing = live.iter().filter(|s| s.auto_renew).count();
    ratio(renewing as i64, live.len() as i64)
}

/// Live subscriptions per plan, largest first.
pub fn distribution_by_plan(
    subscriptions: &[StoreSubscription],
    plans: &HashMap<Uuid, SubscriptionPlan>,
    now: NaiveDateTime,
) -> Vec<PlanCount> {
    let mut counts: HashMap<Uuid, i64> = HashMap::new();
    for s in subscriptions.iter().filter(|s| s.is_active(now)) {
        *counts.entry(s.plan_id).or_default() += 1;
    }
    let mut out: Vec<PlanCount> = counts
        .into_iter()
        .map(|(plan_id, subscriptions)| PlanCount {
            plan_id,
            plan_name: plan_name(plans, plan_id),
            subscriptions,
        })
        .collect();
    out.sort_by(|a, b| b.subscriptions.cmp(&a.subscriptions).then(a.plan_name.cmp(&b.plan_name)));
    out
}

pub fn distribution_by_billing_cycle(subscriptions: &[StoreSubscription], now: NaiveDateTime) -> CycleDistribution {
    let mut out = CycleDistribution::default();
    for s in subscriptions.iter().filter(|s| s.is_active(now)) {
        match s.billing_cycle {
            BillingCycle::Monthly => out.monthly += 1,
            BillingCycle::Yearly => out.yearly += 1,
        }
    }
    out
}

pub fn average_product_usage_by_plan(
    subscriptions: &[StoreSubscription],
    plans: &HashMap<Uuid, SubscriptionPlan>,
    product_counts: &HashMap<Uuid, i64>,
    now: NaiveDateTime,
) -> Vec<PlanProductUsage> {
    let mut totals: HashMap<Uuid, (i64, i64)> = HashMap::new();
    for s in subscriptions.iter().filter(|s| s.is_active(now)) {
        let entry = totals.entry(s.plan_id).or_default();
        entry.0 += product_counts.get(&s.store_id).copied().unwrap_or(0);
        entry.1 += 1;
    }
    let mut out: Vec<PlanProductUsage> = totals
        .into_iter()
        .filter_map(|(plan_id, (products, stores))| {
            plans.get(&plan_id).map(|plan| PlanProductUsage {
                plan_id,
                plan_name: plan.name.clone(),
                max_products: plan.max_products,
                average_products: ratio(products, stores),
            })
        })
        .collect();
    out.sort_by(|a, b| a.plan_name.cmp(&b.plan_name));
    out
}

pub fn stores_near_product_limit(
    subscriptions: &[StoreSubscription],
    plans: &HashMap<Uuid, SubscriptionPlan>,
    product_counts: &HashMap<Uuid, i64>,
    threshold: f64,
    now: NaiveDateTime,
) -> Vec<StoreLimitUsage> {
    let mut out: Vec<StoreLimitUsage> = subscriptions
        .iter()
        .filter(|s| s.is_active(now))
        .filter_map(|s| {
            let plan = plans.get(&s.plan_id)?;
            let product_count = product_counts.get(&s.store_id).copied().unwrap_or(0);
            let usage_percentage = if plan.max_products <= 0 {
                1.0
            } else {
                ratio(product_count, i64::from(plan.max_products))
            };
            (usage_percentage >= threshold).then(|| StoreLimitUsage {
                store_id: s.store_id,
                plan_name: plan.name.clone(),
                product_count,
                max_products: plan.max_products,
                usage_percentage,
            })
        })
        .collect();
    out.sort_by(|a, b| b.usage_percentage.total_cmp(&a.usage_percentage));
    out
}

fn revenue_by_plan(
    invoices: &[SubscriptionInvoice],
    subscriptions: &[StoreSubscription],
    plans: &HashMap<Uuid, SubscriptionPlan>,
) -> Vec<PlanRevenue> {
    let plan_of: HashMap<Uuid, Uuid> = subscriptions.iter().map(|s| (s.id, s.plan_id)).collect();
    let mut revenue: HashMap<Uuid, i64> = HashMap::new();
    for invoice in invoices {
        if let Some(plan_id) = plan_of.get(&invoice.subscription_id) {
            *revenue.entry(*plan_id).or_default() += invoice.amount_cents;
        }
    }
    let mut out: Vec<PlanRevenue> = revenue
        .into_iter()
        .map(|(plan_id, revenue_cents)| PlanRevenue {
            plan_id,
            plan_name: plan_name(plans, plan_id),
            revenue_cents,
        })
        .collect();
    out.sort_by(|a, b| b.revenue_cents.cmp(&a.revenue_cents));
    out
}

/// Look-back windows are whole days between 1 and `MAX_WINDOW_DAYS`.
pub fn window_days(days: i64) -> AppResult<i64> {
    if !(1..=MAX_WINDOW_DAYS).contains(&days) {
        return Err(AppError::InvalidInput(format!(
            "days must be between 1 and {MAX_WINDOW_DAYS}"
        )));
    }
    Ok(days)
}

/// First instant of the month and of the following month.
pub fn month_range(year: i32, month: u32) -> AppResult<(NaiveDateTime, NaiveDateTime)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| AppError::InvalidInput(format!("Invalid month {year}-{month}")))?;
    let end = start
        .checked_add_months(Months::new(1))
        .ok_or_else(|| AppError::InvalidInput(format!("Invalid month {year}-{month}")))?;
    Ok((start, end))
}

pub fn monthly_revenue_report(
    year: i32,
    month: u32,
    from: NaiveDateTime,
    to: NaiveDateTime,
    subscriptions: &[StoreSubscription],
    plans: &HashMap<Uuid, SubscriptionPlan>,
    paid: &[SubscriptionInvoice],
) -> MonthlyRevenueReport {
    let paid: Vec<SubscriptionInvoice> = paid
        .iter()
        .filter(|i| i.status == InvoiceStatus::Paid)
        .cloned()
        .collect();
    let recurring: i64 = paid.iter().filter(|i| i.is_renewal).map(|i| i.amount_cents).sum();
    let one_time: i64 = paid.iter().filter(|i| !i.is_renewal).map(|i| i.amount_cents).sum();

    MonthlyRevenueReport {
        year,
        month,
        total_revenue_cents: recurring + one_time,
        recurring_revenue_cents: recurring,
        one_time_revenue_cents: one_time,
        new_subscriptions: subscriptions
            .iter()
            .filter(|s| in_range(created(s), from, to))
            .count() as i64,
        canceled_subscriptions: subscriptions
            .iter()
            .filter(|s| s.canceled_at.is_some_and(|at| in_range(at, from, to)))
            .count() as i64,
        active_subscriptions: subscriptions
            .iter()
            .filter(|s| s.status.is_live() && s.start_date < to && s.end_date >= from)
            .count() as i64,
        revenue_by_plan: revenue_by_plan(&paid, subscriptions, plans),
    }
}

pub fn performance_report(
    from: NaiveDateTime,
    to: NaiveDateTime,
    subscriptions: &[StoreSubscription],
    plans: &HashMap<Uuid, SubscriptionPlan>,
    paid: &[SubscriptionInvoice],
    issued: &[SubscriptionInvoice],
) -> PerformanceReport {
    let created_in_range: Vec<&StoreSubscription> = subscriptions
        .iter()
        .filter(|s| in_range(created(s), from, to))
        .collect();
    let trials: Vec<&&StoreSubscription> = created_in_range
        .iter()
        .filter(|s| started_as_trial(s))
        .collect();
    let conversions = trials.iter().filter(|s| s.converted_from_trial).count() as i64;
    let trial_count = trials.len() as i64;

    let canceled = subscriptions
        .iter()
        .filter(|s| s.canceled_at.is_some_and(|at| in_range(at, from, to)))
        .count() as i64;
    let expired = subscriptions
        .iter()
        .filter(|s| s.status == SubscriptionStatus::Expired && in_range(s.end_date, from, to))
        .count() as i64;
    let renewed = issued.iter().filter(|i| i.is_renewal).count() as i64;

    let ended = subscriptions
        .iter()
        .filter(|s| {
            matches!(s.status, SubscriptionStatus::Canceled | SubscriptionStatus::Expired)
                && in_range(s.end_date, from, to)
        })
        .count() as i64;
    let alive = subscriptions.iter().filter(|s| s.is_active(to)).count() as i64;
    let churn = ratio(ended, ended + alive);

    let revenue: i64 = paid
        .iter()
        .filter(|i| i.status == InvoiceStatus::Paid)
        .map(|i| i.amount_cents)
        .sum();
    let paying: std::collections::HashSet<Uuid> = paid
        .iter()
        .filter(|i| i.status == InvoiceStatus::Paid)
        .map(|i| i.subscription_id)
        .collect();
    let average = if paying.is_empty() {
        0
    } else {
        (revenue as f64 / paying.len() as f64).round() as i64
    };

    let mut per_plan: HashMap<Uuid, (i64, i64, i64)> = HashMap::new();
    for s in &created_in_range {
        let entry = per_plan.entry(s.plan_id).or_default();
        entry.0 += 1;
        if started_as_trial(s) {
            entry.1 += 1;
            if s.converted_from_trial {
                entry.2 += 1;
            }
        }
    }
    let mut by_plan: Vec<PlanPerformance> = per_plan
        .into_iter()
        .map(|(plan_id, (count, trials, converted))| PlanPerformance {
            plan_id,
            plan_name: plan_name(plans, plan_id),
            subscriptions: count,
            conversions: converted,
            conversion_rate: ratio(converted, trials),
        })
        .collect();
    by_plan.sort_by(|a, b| a.plan_name.cmp(&b.plan_name));

    PerformanceReport {
        from,
        to,
        total_subscriptions: subscriptions.len() as i64,
        new_subscriptions: created_in_range.len() as i64,
        renewed_subscriptions: renewed,
        canceled_subscriptions: canceled,
        expired_subscriptions: expired,
        trial_subscriptions: trial_count,
        conversions,
        conversion_rate: ratio(conversions, trial_count),
        retention_rate: 1.0 - churn,
        churn_rate: churn,
        revenue_cents: revenue,
        average_revenue_per_subscription_cents: average,
        by_plan,
    }
}
