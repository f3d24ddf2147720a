use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, parse_json_with_fallback, to_json},
    app_error::{AppError, AppResult},
    application::use_cases::subscription_plan::{PlanInput, PlanRepo},
    domain::entities::subscription_plan::SubscriptionPlan,
};

fn row_to_plan(row: sqlx::postgres::PgRow) -> SubscriptionPlan {
    let id: Uuid = row.get("id");
    let features_json: serde_json::Value = row.get("features");
    let features: Vec<String> =
        parse_json_with_fallback(&features_json, "features", "subscription_plan", &id.to_string());

    SubscriptionPlan {
        id,
        name: row.get("name"),
        description: row.get("description"),
        monthly_price_cents: row.get("monthly_price_cents"),
        yearly_price_cents: row.get("yearly_price_cents"),
        max_products: row.get("max_products"),
        trial_period_days: row.get("trial_period_days"),
        features,
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, name, description, monthly_price_cents, yearly_price_cents, max_products,
    trial_period_days, features, is_active, created_at, updated_at
"#;

#[async_trait]
impl PlanRepo for PostgresPersistence {
    async fn create(&self, input: &PlanInput) -> AppResult<SubscriptionPlan> {
        let row = sqlx::query(&format!(
            r#"INSERT INTO subscription_plans
                 (id, name, description, monthly_price_cents, yearly_price_cents,
                  max_products, trial_period_days, features, is_active)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               RETURNING {}"#,
            SELECT_COLS
        ))
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.monthly_price_cents)
        .bind(input.yearly_price_cents)
        .bind(input.max_products)
        .bind(input.trial_period_days)
        .bind(to_json(&input.features)?)
        .bind(input.is_active)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_plan(row))
    }

    async fn update(&self, plan: &SubscriptionPlan) -> AppResult<SubscriptionPlan> {
        let row = sqlx::query(&format!(
            r#"UPDATE subscription_plans SET
                 name = $2, description = $3, monthly_price_cents = $4,
                 yearly_price_cents = $5, max_products = $6, trial_period_days = $7,
                 features = $8, is_active = $9,
                 updated_at = NOW() AT TIME ZONE 'utc'
               WHERE id = $1
               RETURNING {}"#,
            SELECT_COLS
        ))
        .bind(plan.id)
        .bind(&plan.name)
        .bind(&plan.description)
        .bind(plan.monthly_price_cents)
        .bind(plan.yearly_price_cents)
        .bind(plan.max_products)
        .bind(plan.trial_period_days)
        .bind(to_json(&plan.features)?)
        .bind(plan.is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        row.map(row_to_plan).ok_or(AppError::NotFound)
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<SubscriptionPlan>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscription_plans WHERE id = $1",
            SELECT_COLS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.map(row_to_plan))
    }

    async fn get_by_name(&self, name: &str) -> AppResult<Option<SubscriptionPlan>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscription_plans WHERE name = $1",
            SELECT_COLS
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.map(row_to_plan))
    }

    async fn list_active(&self) -> AppResult<Vec<SubscriptionPlan>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM subscription_plans WHERE is_active = true ORDER BY monthly_price_cents, name",
            SELECT_COLS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_plan).collect())
    }

    async fn list_all(&self) -> AppResult<Vec<SubscriptionPlan>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM subscription_plans ORDER BY monthly_price_cents, name",
            SELECT_COLS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_plan).collect())
    }
}
