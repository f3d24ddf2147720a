use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::application::use_cases::{authorization::require_platform_admin, user::UserRepo};
use crate::domain::entities::subscription_plan::SubscriptionPlan;

#[async_trait]
pub trait PlanRepo: Send + Sync {
    async fn create(&self, input: &PlanInput) -> AppResult<SubscriptionPlan>;
    async fn update(&self, plan: &SubscriptionPlan) -> AppResult<SubscriptionPlan>;
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<SubscriptionPlan>>;
    async fn get_by_name(&self, name: &str) -> AppResult<Option<SubscriptionPlan>>;
    async fn list_active(&self) -> AppResult<Vec<SubscriptionPlan>>;
    async fn list_all(&self) -> AppResult<Vec<SubscriptionPlan>>;
}

#[derive(Debug, Clone)]
pub struct PlanInput {
    pub name: String,
    pub description: Option<String>,
    pub monthly_price_cents: i64,
    pub yearly_price_cents: i64,
    pub max_products: i32,
    pub trial_period_days: Option<i32>,
    pub features: Vec<String>,
    pub is_active: bool,
}

impl PlanInput {
    fn validate(&self) -> AppResult<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::InvalidInput("Plan name is required".into()));
        }
        if self.monthly_price_cents < 0 || self.yearly_price_cents < 0 {
            return Err(AppError::InvalidInput("Prices cannot be negative".into()));
        }
        if self.max_products <= 0 {
            return Err(AppError::InvalidInput("max_products must be positive".into()));
        }
        if self.trial_period_days.is_some_and(|d| d < 0) {
            return Err(AppError::InvalidInput("Trial period cannot be negative".into()));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct PlanUseCases {
    plans: Arc<dyn PlanRepo>,
    users: Arc<dyn UserRepo>,
}

impl PlanUseCases {
    pub fn new(plans: Arc<dyn PlanRepo>, users: Arc<dyn UserRepo>) -> Self {
        Self { plans, users }
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_plan(&self, user_id: Uuid, mut input: PlanInput) -> AppResult<SubscriptionPlan> {
        require_platform_admin(self.users.as_ref(), user_id).await?;
        input.name = input.name.trim().to_string();
        input.validate()?;
        if self.plans.get_by_name(&input.name).await?.is_some() {
            return Err(AppError::Conflict {
                field: "name",
                message: format!("A plan named '{}' already exists", input.name),
            });
        }
        input.features = dedup_features(input.features);
        let plan = self.plans.create(&input).await?;
        info!(plan_id = %plan.id, "Plan created");
        Ok(plan)
    }

    #[instrument(skip(self, input))]
    pub async fn update_plan(
        &self,
        user_id: Uuid,
        plan_id: Uuid,
        mut input: PlanInput,
    ) -> AppResult<SubscriptionPlan> {
        require_platform_admin(self.users.as_ref(), user_id).await?;
        input.name = input.name.trim().to_string();
        input.validate()?;
        let mut plan = self.get_plan(plan_id).await?;

        if let Some(other) = self.plans.get_by_name(&input.name).await?
            && other.id != plan_id
        {
            return Err(AppError::Conflict {
                field: "name",
                message: format!("A plan named '{}' already exists", input.name),
            });
        }

        plan.name = input.name;
        plan.description = input.description;
        plan.monthly_price_cents = input.monthly_price_cents;
        plan.yearly_price_cents = input.yearly_price_cents;
        plan.max_products = input.max_products;
        plan.trial_period_days = input.trial_period_days;
        plan.features = dedup_features(input.features);
        plan.is_active = input.is_active;
        self.plans.update(&plan).await
    }

    pub async fn get_plan(&self, plan_id: Uuid) -> AppResult<SubscriptionPlan> {
        self.plans
            .get_by_id(plan_id)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn get_plan_by_name(&self, name: &str) -> AppResult<SubscriptionPlan> {
        self.plans
            .get_by_name(name)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn list_active_plans(&self) -> AppResult<Vec<SubscriptionPlan>> {
        self.plans.list_active().await
    }

    pub async fn list_all_plans(&self, user_id: Uuid) -> AppResult<Vec<SubscriptionPlan>> {
        require_platform_admin(self.users.as_ref(), user_id).await?;
        self.plans.list_all().await
    }

    #[instrument(skip(self))]
    pub async fn set_active(&self, user_id: Uuid, plan_id: Uuid, active: bool) -> AppResult<SubscriptionPlan> {
        require_platform_admin(self.users.as_ref(), user_id).await?;
        let mut plan = self.get_plan(plan_id).await?;
        plan.is_active = active;
        self.plans.update(&plan).await
    }

    #[instrument(skip(self))]
    pub async fn add_feature(&self, user_id: Uuid, plan_id: Uuid, feature: &str) -> AppResult<SubscriptionPlan> {
        require_platform_admin(self.users.as_ref(), user_id).await?;
        let feature = feature.trim();
        if feature.is_empty() {
            return Err(AppError::InvalidInput("Feature name is required".into()));
        }
        let mut plan = self.get_plan(plan_id).await?;
        if !plan.has_feature(feature) {
            plan.features.push(feature.to_string());
        }
        self.plans.update(&plan).await
    }

    #[instrument(skip(self))]
    pub async fn remove_feature(&self, user_id: Uuid, plan_id: Uuid, feature: &str) -> AppResult<SubscriptionPlan> {
        require_platform_admin(self.users.as_ref(), user_id).await?;
        let mut plan = self.get_plan(plan_id).await?;
        plan.features.retain(|f| f != feature.trim());
        self.plans.update(&plan).await
    }
}

fn dedup_features(features: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(features.len());
    for feature in features {
        let feature = feature.trim().to_string();
        if !feature.is_empty() && !out.contains(&feature) {
            out.push(feature);
        }
    }
    out
}
