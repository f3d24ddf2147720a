use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::subscription::SubscriptionRepo,
    domain::entities::{
        store_subscription::{StoreSubscription, SubscriptionStatus},
        subscription_plan::BillingCycle,
    },
};

fn row_to_subscription(row: sqlx::postgres::PgRow) -> StoreSubscription {
    let status: String = row.get("status");
    let billing_cycle: String = row.get("billing_cycle");

    StoreSubscription {
        id: row.get("id"),
        store_id: row.get("store_id"),
        plan_id: row.get("plan_id"),
        status: SubscriptionStatus::from_str(&status),
        billing_cycle: BillingCycle::from_str(&billing_cycle),
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
        trial_end_date: row.get("trial_end_date"),
        next_billing_date: row.get("next_billing_date"),
        auto_renew: row.get("auto_renew"),
        converted_from_trial: row.get("converted_from_trial"),
        canceled_at: row.get("canceled_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, store_id, plan_id, status, billing_cycle, start_date, end_date,
    trial_end_date, next_billing_date, auto_renew, converted_from_trial,
    canceled_at, created_at, updated_at
"#;

#[async_trait]
impl SubscriptionRepo for PostgresPersistence {
    async fn create(&self, subscription: &StoreSubscription) -> AppResult<StoreSubscription> {
        let row = sqlx::query(&format!(
            r#"INSERT INTO store_subscriptions
                 (id, store_id, plan_id, status, billing_cycle, start_date, end_date,
                  trial_end_date, next_billing_date, auto_renew, converted_from_trial, canceled_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
               RETURNING {}"#,
            SELECT_COLS
        ))
        .bind(subscription.id)
        .bind(subscription.store_id)
        .bind(subscription.plan_id)
        .bind(subscription.status.as_str())
        .bind(subscription.billing_cycle.as_str())
        .bind(subscription.start_date)
        .bind(subscription.end_date)
        .bind(subscription.trial_end_date)
        .bind(subscription.next_billing_date)
        .bind(subscription.auto_renew)
        .bind(subscription.converted_from_trial)
        .bind(subscription.canceled_at)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_subscription(row))
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<StoreSubscription>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM store_subscriptions WHERE id = $1",
            SELECT_COLS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.map(row_to_subscription))
    }

    async fn find_latest_active(&self, store_id: Uuid) -> AppResult<Option<StoreSubscription>> {
        let row = sqlx::query(&format!(
            r#"SELECT {} FROM store_subscriptions
               WHERE store_id = $1 AND status IN ('trial', 'active')
               ORDER BY created_at DESC
               LIMIT 1"#,
            SELECT_COLS
        ))
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.map(row_to_subscription))
    }

    async fn list_by_store(&self, store_id: Uuid) -> AppResult<Vec<StoreSubscription>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM store_subscriptions WHERE store_id = $1 ORDER BY created_at DESC",
            SELECT_COLS
        ))
        .bind(store_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_subscription).collect())
    }

    async fn list_by_status(&self, statuses: &[SubscriptionStatus]) -> AppResult<Vec<StoreSubscription>> {
        let statuses: Vec<&str> = statuses.iter().map(SubscriptionStatus::as_str).collect();
        let rows = sqlx::query(&format!(
            "SELECT {} FROM store_subscriptions WHERE status = ANY($1) ORDER BY created_at",
            SELECT_COLS
        ))
        .bind(&statuses)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_subscription).collect())
    }

    async fn list_all(&self) -> AppResult<Vec<StoreSubscription>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM store_subscriptions ORDER BY created_at",
            SELECT_COLS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_subscription).collect())
    }

    async fn update(&self, subscription: &StoreSubscription) -> AppResult<StoreSubscription> {
        let row = sqlx::query(&format!(
            r#"UPDATE store_subscriptions SET
                 plan_id = $2, status = $3, billing_cycle = $4, start_date = $5,
                 end_date = $6, trial_end_date = $7, next_billing_date = $8,
                 auto_renew = $9, converted_from_trial = $10, canceled_at = $11,
                 updated_at = NOW() AT TIME ZONE 'utc'
               WHERE id = $1
               RETURNING {}"#,
            SELECT_COLS
        ))
        .bind(subscription.id)
        .bind(subscription.plan_id)
        .bind(subscription.status.as_str())
        .bind(subscription.billing_cycle.as_str())
        .bind(subscription.start_date)
        .bind(subscription.end_date)
        .bind(subscription.trial_end_date)
        .bind(subscription.next_billing_date)
        .bind(subscription.auto_renew)
        .bind(subscription.converted_from_trial)
        .bind(subscription.canceled_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        row.map(row_to_subscription).ok_or(AppError::NotFound)
    }
}
