use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::usage::UsageMetricRepo,
    domain::entities::usage_metric::{MetricType, UsageMetric},
};

fn row_to_metric(row: sqlx::postgres::PgRow) -> Option<UsageMetric> {
    let raw: String = row.get("metric_type");
    let Some(metric_type) = MetricType::from_str(&raw) else {
        tracing::warn!(metric_type = %raw, "Skipping unknown usage metric");
        return None;
    };

    Some(UsageMetric {
        store_id: row.get("store_id"),
        metric_type,
        count: row.get("count"),
        updated_at: row.get("updated_at"),
    })
}

const SELECT_COLS: &str = "store_id, metric_type, count, updated_at";

#[async_trait]
impl UsageMetricRepo for PostgresPersistence {
    async fn get(&self, store_id: Uuid, metric: MetricType) -> AppResult<Option<UsageMetric>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM usage_metrics WHERE store_id = $1 AND metric_type = $2",
            SELECT_COLS
        ))
        .bind(store_id)
        .bind(metric.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.and_then(row_to_metric))
    }

    async fn set(&self, store_id: Uuid, metric: MetricType, value: i64) -> AppResult<UsageMetric> {
        let row = sqlx::query(&format!(
            r#"INSERT INTO usage_metrics (store_id, metric_type, count)
               VALUES ($1, $2, GREATEST($3, 0))
               ON CONFLICT (store_id, metric_type)
               DO UPDATE SET count = EXCLUDED.count, updated_at = NOW() AT TIME ZONE 'utc'
               RETURNING {}"#,
            SELECT_COLS
        ))
        .bind(store_id)
        .bind(metric.as_str())
        .bind(value)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        row_to_metric(row).ok_or_else(|| AppError::Internal("usage metric round-trip failed".into()))
    }

    async fn adjust(&self, store_id: Uuid, metric: MetricType, delta: i64) -> AppResult<UsageMetric> {
        // Upsert keeps concurrent increments from losing updates.
        let row = sqlx::query(&format!(
            r#"INSERT INTO usage_metrics (store_id, metric_type, count)
               VALUES ($1, $2, GREATEST($3, 0))
               ON CONFLICT (store_id, metric_type)
               DO UPDATE SET count = GREATEST(usage_metrics.count + $3, 0),
                             updated_at = NOW() AT TIME ZONE 'utc'
               RETURNING {}"#,
            SELECT_COLS
        ))
        .bind(store_id)
        .bind(metric.as_str())
        .bind(delta)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        row_to_metric(row).ok_or_else(|| AppError::Internal("usage metric round-trip failed".into()))
    }

    async fn list_by_store(&self, store_id: Uuid) -> AppResult<Vec<UsageMetric>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM usage_metrics WHERE store_id = $1 ORDER BY metric_type",
            SELECT_COLS
        ))
        .bind(store_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().filter_map(row_to_metric).collect())
    }

    async fn list_by_type(&self, metric: MetricType) -> AppResult<Vec<UsageMetric>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM usage_metrics WHERE metric_type = $1",
            SELECT_COLS
        ))
        .bind(metric.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().filter_map(row_to_metric).collect())
    }
}
