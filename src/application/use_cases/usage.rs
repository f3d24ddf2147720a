use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::app_error::{AppError, AppResult, LimitExceeded};
use crate::application::use_cases::{
    authorization::StoreAccess, subscription::SubscriptionRepo, subscription_plan::PlanRepo,
};
use crate::domain::entities::{
    store_role::StoreRoleType,
    store_subscription::StoreSubscription,
    subscription_plan::SubscriptionPlan,
    usage_metric::{LimitType, MetricType, UsageMetric},
};

pub const API_CALL_LIMIT: i64 = 10_000;
pub const STORAGE_LIMIT_MB: i64 = 1_000;
pub const BANDWIDTH_LIMIT_MB: i64 = 5_000;

#[async_trait]
pub trait UsageMetricRepo: Send + Sync {
    async fn get(&self, store_id: Uuid, metric: MetricType) -> AppResult<Option<UsageMetric>>;
    async fn set(&self, store_id: Uuid, metric: MetricType, value: i64) -> AppResult<UsageMetric>;
    /// Adds `delta` atomically, creating the row at 0 first and never going below 0.
    async fn adjust(&self, store_id: Uuid, metric: MetricType, delta: i64) -> AppResult<UsageMetric>;
    async fn list_by_store(&self, store_id: Uuid) -> AppResult<Vec<UsageMetric>>;
    async fn list_by_type(&self, metric: MetricType) -> AppResult<Vec<UsageMetric>>;
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageLine {
    pub metric_type: MetricType,
    pub count: i64,
    pub limit: i64,
    pub usage_percentage: f64,
}

#[derive(Clone)]
pub struct UsageUseCases {
    metrics: Arc<dyn UsageMetricRepo>,
    subscriptions: Arc<dyn SubscriptionRepo>,
    plans: Arc<dyn PlanRepo>,
    access: StoreAccess,
}

impl UsageUseCases {
    pub fn new(
        metrics: Arc<dyn UsageMetricRepo>,
        subscriptions: Arc<dyn SubscriptionRepo>,
        plans: Arc<dyn PlanRepo>,
        access: StoreAccess,
    ) -> Self {
        Self {
            metrics,
            subscriptions,
            plans,
            access,
        }
    }

    // ========================================================================
    // Metrics
    // ========================================================================

    pub async fn set(&self, store_id: Uuid, metric: MetricType, value: i64) -> AppResult<UsageMetric> {
        self.metrics.set(store_id, metric, value.max(0)).await
    }

    pub async fn increment(&self, store_id: Uuid, metric: MetricType, amount: i64) -> AppResult<UsageMetric> {
        self.metrics.adjust(store_id, metric, amount).await
    }

    pub async fn decrement(&self, store_id: Uuid, metric: MetricType, amount: i64) -> AppResult<UsageMetric> {
        self.metrics.adjust(store_id, metric, -amount).await
    }

    pub async fn get_value(&self, store_id: Uuid, metric: MetricType) -> AppResult<i64> {
        Ok(self
            .metrics
            .get(store_id, metric)
            .await?
            .map(|m| m.count)
            .unwrap_or(0))
    }

    pub async fn list(&self, store_id: Uuid) -> AppResult<Vec<UsageMetric>> {
        self.metrics.list_by_store(store_id).await
    }

    /// Sets every metric of the store to 0, creating missing rows.
    #[instrument(skip(self))]
    pub async fn reset(&self, store_id: Uuid) -> AppResult<()> {
        for metric in MetricType::ALL {
            self.metrics.set(store_id, metric, 0).await?;
        }
        Ok(())
    }

    /// Creates any missing metric rows at 0, leaving existing counts alone.
    pub async fn initialize(&self, store_id: Uuid) -> AppResult<()> {
        for metric in MetricType::ALL {
            if self.metrics.get(store_id, metric).await?.is_none() {
                self.metrics.set(store_id, metric, 0).await?;
            }
        }
        Ok(())
    }

    pub async fn is_over_threshold(&self, store_id: Uuid, metric: MetricType, threshold: i64) -> AppResult<bool> {
        Ok(self.get_value(store_id, metric).await? > threshold)
    }

    /// Share of `limit` used, as a fraction. A non-positive limit counts as fully used.
    pub async fn usage_percentage(&self, store_id: Uuid, metric: MetricType, limit: i64) -> AppResult<f64> {
        let value = self.get_value(store_id, metric).await?;
        Ok(fraction(value, limit))
    }

    /// Stores whose count for `metric` has reached `threshold`.
    pub async fn stores_near_limit(&self, metric: MetricType, threshold: i64) -> AppResult<Vec<UsageMetric>> {
        Ok(self
            .metrics
            .list_by_type(metric)
            .await?
            .into_iter()
            .filter(|m| m.count >= threshold)
            .collect())
    }

    /// Usage of a store against its current plan, for store members.
    #[instrument(skip(self))]
    pub async fn store_usage(&self, user_id: Uuid, store_id: Uuid) -> AppResult<Vec<UsageLine>> {
        self.access
            .require_store_role(user_id, store_id, StoreRoleType::Staff)
            .await?;
        let plan = match self.active_plan(store_id).await {
            Ok((_, plan)) => Some(plan),
            Err(AppError::SubscriptionLimitExceeded(_)) => None,
            Err(e) => return Err(e),
        };

        let mut lines = Vec::with_capacity(MetricType::ALL.len());
        for metric in MetricType::ALL {
            let count = self.get_value(store_id, metric).await?;
            let limit = match (metric, &plan) {
                (MetricType::ProductCount, Some(plan)) => i64::from(plan.max_products),
                (MetricType::ProductCount, None) => 0,
                (MetricType::ApiCalls, _) => API_CALL_LIMIT,
                (MetricType::StorageUsage, _) => STORAGE_LIMIT_MB,
                (MetricType::BandwidthUsage, _) => BANDWIDTH_LIMIT_MB,
            };
            lines.push(UsageLine {
                metric_type: metric,
                count,
                limit,
                usage_percentage: fraction(count, limit),
            });
        }
        Ok(lines)
    }

    // ========================================================================
    // Limits
    // ========================================================================

    /// Fails with `SubscriptionLimitExceeded` when `amount` more units would break the plan.
    #[instrument(skip(self))]
    pub async fn check_limit(
        &self,
        store_id: Uuid,
        limit_type: LimitType,
        amount: i64,
        feature: Option<&str>,
    ) -> AppResult<()> {
        let (_, plan) = self.active_plan(store_id).await?;

        if limit_type == LimitType::Feature {
            let feature = feature.unwrap_or_default();
            if !plan.has_feature(feature) {
                return Err(AppError::SubscriptionLimitExceeded(LimitExceeded::new(
                    LimitType::Feature,
                    format!("Your plan does not include the '{feature}' feature"),
                )));
            }
            return Ok(());
        }

        let (Some(metric), Some(max_allowed)) = (limit_type.metric(), limit_for(limit_type, &plan))
        else {
            return Ok(());
        };
        let current = self.get_value(store_id, metric).await?;
        if current + amount > max_allowed {
            debug!(%store_id, limit = limit_type.as_str(), current, max_allowed, "Plan limit reached");
            return Err(AppError::SubscriptionLimitExceeded(
                LimitExceeded::new(
                    limit_type,
                    format!(
                        "{} limit reached: {current} of {max_allowed} used",
                        limit_label(limit_type)
                    ),
                )
                .with_usage(current, max_allowed),
            ));
        }
        Ok(())
    }

    /// Checks the limit, then records the usage.
    pub async fn consume(&self, store_id: Uuid, limit_type: LimitType, amount: i64) -> AppResult<()> {
        self.check_limit(store_id, limit_type, amount, None).await?;
        if let Some(metric) = limit_type.metric() {
            self.metrics.adjust(store_id, metric, amount).await?;
        }
        Ok(())
    }

    /// The store's live subscription and its plan. A store without one is over every limit.
    pub async fn active_plan(&self, store_id: Uuid) -> AppResult<(StoreSubscription, SubscriptionPlan)> {
        let now = Utc::now().naive_utc();
        let subscription = self
            .subscriptions
            .find_latest_active(store_id)
            .await?
            .filter(|s| s.is_active(now))
            .ok_or_else(|| {
                AppError::SubscriptionLimitExceeded(LimitExceeded::new(
                    LimitType::Feature,
                    "This store has no active subscription",
                ))
            })?;
        let plan = self
            .plans
            .get_by_id(subscription.plan_id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("plan {} missing", subscription.plan_id)))?;
        Ok((subscription, plan))
    }
}

/// Maximum allowed for a counted limit. `None` means unlimited.
pub fn limit_for(limit_type: LimitType, plan: &SubscriptionPlan) -> Option<i64> {
    match limit_type {
        LimitType::Product => Some(i64::from(plan.max_products)),
        LimitType::ApiCall => Some(API_CALL_LIMIT),
        LimitType::Storage => Some(STORAGE_LIMIT_MB),
        LimitType::Bandwidth => Some(BANDWIDTH_LIMIT_MB),
        LimitType::User | LimitType::Feature => None,
    }
}

fn limit_label(limit_type: LimitType) -> &'static str {
    match limit_type {
        LimitType::Product => "Product",
        LimitType::ApiCall => "API call",
        LimitType::Storage => "Storage",
        LimitType::Bandwidth => "Bandwidth",
        LimitType::User => "User",
        LimitType::Feature => "Feature",
    }
}

fn fraction(value: i64, limit: i64) -> f64 {
    if limit <= 0 {
        return 1.0;
    }
    value as f64 / limit as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::store_subscription::SubscriptionStatus;
    use crate::test_utils::{
        InMemoryPlanRepo, InMemoryStoreRepo, InMemoryStoreRoleRepo, InMemorySubscriptionRepo,
        InMemoryUsageMetricRepo, create_test_plan, create_test_subscription,
    };

    fn use_cases(
        subscriptions: Vec<StoreSubscription>,
        plans: Vec<SubscriptionPlan>,
    ) -> UsageUseCases {
        UsageUseCases::new(
            Arc::new(InMemoryUsageMetricRepo::new()),
            Arc::new(InMemorySubscriptionRepo::with_subscriptions(subscriptions)),
            Arc::new(InMemoryPlanRepo::with_plans(plans)),
            StoreAccess::new(
                Arc::new(InMemoryStoreRepo::new()),
                Arc::new(InMemoryStoreRoleRepo::new()),
            ),
        )
    }

    #[tokio::test]
    async fn decrement_clamps_at_zero() {
        let uc = use_cases(vec![], vec![]);
        let store_id = Uuid::new_v4();

        uc.increment(store_id, MetricType::ApiCalls, 3).await.unwrap();
        let metric = uc.decrement(store_id, MetricType::ApiCalls, 10).await.unwrap();

        assert_eq!(metric.count, 0);
        assert_eq!(uc.get_value(Uuid::new_v4(), MetricType::ApiCalls).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn initialize_keeps_existing_counts() {
        let uc = use_cases(vec![], vec![]);
        let store_id = Uuid::new_v4();
        uc.increment(store_id, MetricType::ProductCount, 4).await.unwrap();

        uc.initialize(store_id).await.unwrap();

        assert_eq!(uc.get_value(store_id, MetricType::ProductCount).await.unwrap(), 4);
        assert_eq!(uc.list(store_id).await.unwrap().len(), MetricType::ALL.len());
    }

    #[tokio::test]
    async fn product_limit_follows_plan() {
        let plan = create_test_plan(|p| p.max_products = 2);
        let sub = create_test_subscription(Uuid::new_v4(), plan.id, |_| {});
        let uc = use_cases(vec![sub.clone()], vec![plan]);

        uc.consume(sub.store_id, LimitType::Product, 1).await.unwrap();
        uc.consume(sub.store_id, LimitType::Product, 1).await.unwrap();
        let err = uc.consume(sub.store_id, LimitType::Product, 1).await.unwrap_err();

        match err {
            AppError::SubscriptionLimitExceeded(limit) => {
                assert_eq!(limit.limit_type, LimitType::Product);
                assert_eq!(limit.current_value, 2);
                assert_eq!(limit.max_allowed, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(uc.get_value(sub.store_id, MetricType::ProductCount).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn no_subscription_means_over_limit() {
        let uc = use_cases(vec![], vec![]);
        let result = uc.check_limit(Uuid::new_v4(), LimitType::ApiCall, 1, None).await;
        assert!(matches!(result, Err(AppError::SubscriptionLimitExceeded(_))));
    }

    #[tokio::test]
    async fn expired_subscription_does_not_count() {
        let plan = create_test_plan(|_| {});
        let sub = create_test_subscription(Uuid::new_v4(), plan.id, |s| {
            s.status = SubscriptionStatus::Active;
            s.end_date = Utc::now().naive_utc() - chrono::Duration::days(1);
        });
        let uc = use_cases(vec![sub.clone()], vec![plan]);

        assert!(uc.check_limit(sub.store_id, LimitType::Product, 1, None).await.is_err());
    }

    #[tokio::test]
    async fn feature_limit_checks_plan_features() {
        let plan = create_test_plan(|p| p.features = vec!["analytics".into()]);
        let sub = create_test_subscription(Uuid::new_v4(), plan.id, |_| {});
        let uc = use_cases(vec![sub.clone()], vec![plan]);

        assert!(uc.check_limit(sub.store_id, LimitType::Feature, 0, Some("analytics")).await.is_ok());
        assert!(uc.check_limit(sub.store_id, LimitType::Feature, 0, Some("custom_domain")).await.is_err());
    }

    #[tokio::test]
    async fn percentage_and_thresholds() {
        let uc = use_cases(vec![], vec![]);
        let store_id = Uuid::new_v4();
        uc.set(store_id, MetricType::ProductCount, 8).await.unwrap();

        assert_eq!(uc.usage_percentage(store_id, MetricType::ProductCount, 10).await.unwrap(), 0.8);
        assert_eq!(uc.usage_percentage(store_id, MetricType::ProductCount, 0).await.unwrap(), 1.0);
        assert!(uc.is_over_threshold(store_id, MetricType::ProductCount, 7).await.unwrap());
        assert_eq!(uc.stores_near_limit(MetricType::ProductCount, 8).await.unwrap().len(), 1);

        uc.reset(store_id).await.unwrap();
        assert_eq!(uc.list(store_id).await.unwrap().len(), 4);
        assert_eq!(uc.get_value(store_id, MetricType::ProductCount).await.unwrap(), 0);
    }
}
