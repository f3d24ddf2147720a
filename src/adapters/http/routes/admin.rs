//! Platform administration: subscription plans, billing analytics and product
//! types. Every handler requires a platform admin; the use cases enforce it.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::common::current_user;
use crate::{
    adapters::http::app_state::AppState,
    app_error::AppResult,
    application::use_cases::{
        catalog::{FieldDefinitionInput, ProductTypeInput, VariantOptionInput},
        subscription_plan::PlanInput,
    },
    domain::entities::product_type::FieldType,
};

const DEFAULT_WINDOW_DAYS: i64 = 30;
const DEFAULT_LIMIT_THRESHOLD: f64 = 0.8;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/plans", get(list_plans).post(create_plan))
        .route("/plans/{plan_id}", put(update_plan))
        .route("/plans/{plan_id}/activate", post(activate_plan))
        .route("/plans/{plan_id}/deactivate", post(deactivate_plan))
        .route("/plans/{plan_id}/features", post(add_feature))
        .route("/plans/{plan_id}/features/{feature}", delete(remove_feature))
        .route("/analytics/trial-conversion", get(trial_conversion))
        .route("/analytics/mrr", get(mrr))
        .route("/analytics/churn", get(churn))
        .route("/analytics/retention", get(retention))
        .route("/analytics/auto-renewal", get(auto_renewal))
        .route("/analytics/plan-distribution", get(plan_distribution))
        .route("/analytics/billing-cycles", get(billing_cycles))
        .route("/analytics/product-usage", get(product_usage))
        .route("/analytics/near-limit", get(near_limit))
        .route("/analytics/revenue/{year}/{month}", get(monthly_revenue))
        .route("/analytics/performance", get(performance))
        .route("/product-types", post(create_product_type))
}

// ============================================================================
// Plans
// ============================================================================

#[derive(Deserialize)]
struct PlanPayload {
    name: String,
    description: Option<String>,
    monthly_price_cents: i64,
    yearly_price_cents: i64,
    max_products: i32,
    trial_period_days: Option<i32>,
    #[serde(default)]
    features: Vec<String>,
    #[serde(default = "active_by_default")]
    is_active: bool,
}

fn active_by_default() -> bool {
    true
}

impl From<PlanPayload> for PlanInput {
    fn from(payload: PlanPayload) -> Self {
        Self {
            name: payload.name,
            description: payload.description,
            monthly_price_cents: payload.monthly_price_cents,
            yearly_price_cents: payload.yearly_price_cents,
            max_products: payload.max_products,
            trial_period_days: payload.trial_period_days,
            features: payload.features,
            is_active: payload.is_active,
        }
    }
}

async fn list_plans(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let plans = app_state
        .plan_use_cases
        .list_all_plans(caller.user_id)
        .await?;
    Ok(Json(plans))
}

async fn create_plan(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(payload): Json<PlanPayload>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let plan = app_state
        .plan_use_cases
        .create_plan(caller.user_id, payload.into())
        .await?;
    Ok((StatusCode::CREATED, Json(plan)))
}

async fn update_plan(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(plan_id): Path<Uuid>,
    Json(payload): Json<PlanPayload>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let plan = app_state
        .plan_use_cases
        .update_plan(caller.user_id, plan_id, payload.into())
        .await?;
    Ok(Json(plan))
}

async fn activate_plan(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(plan_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let plan = app_state
        .plan_use_cases
        .set_active(caller.user_id, plan_id, true)
        .await?;
    Ok(Json(plan))
}

async fn deactivate_plan(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(plan_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let plan = app_state
        .plan_use_cases
        .set_active(caller.user_id, plan_id, false)
        .await?;
    Ok(Json(plan))
}

#[derive(Deserialize)]
struct FeaturePayload {
    feature: String,
}

async fn add_feature(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(plan_id): Path<Uuid>,
    Json(payload): Json<FeaturePayload>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let plan = app_state
        .plan_use_cases
        .add_feature(caller.user_id, plan_id, &payload.feature)
        .await?;
    Ok(Json(plan))
}

async fn remove_feature(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path((plan_id, feature)): Path<(Uuid, String)>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let plan = app_state
        .plan_use_cases
        .remove_feature(caller.user_id, plan_id, &feature)
        .await?;
    Ok(Json(plan))
}

// ============================================================================
// Analytics
// ============================================================================

#[derive(Serialize)]
struct RateResponse {
    rate: f64,
}

#[derive(Deserialize)]
struct RangeParams {
    from: NaiveDate,
    to: NaiveDate,
}

impl RangeParams {
    fn bounds(&self) -> (NaiveDateTime, NaiveDateTime) {
        (
            self.from.and_time(NaiveTime::MIN),
            self.to.and_time(NaiveTime::MIN),
        )
    }
}

#[derive(Deserialize)]
struct WindowParams {
    days: Option<i64>,
}

#[derive(Deserialize)]
struct AtParams {
    at: Option<NaiveDate>,
}

#[derive(Deserialize)]
struct ThresholdParams {
    threshold: Option<f64>,
}

#[derive(Serialize)]
struct MrrResponse {
    at: NaiveDateTime,
    mrr_cents: i64,
}

async fn trial_conversion(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Query(params): Query<RangeParams>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let (from, to) = params.bounds();
    let rate = app_state
        .analytics_use_cases
        .trial_conversion_rate(caller.user_id, from, to)
        .await?;
    Ok(Json(RateResponse { rate }))
}

async fn mrr(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Query(params): Query<AtParams>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let at = params
        .at
        .map(|d| d.and_time(NaiveTime::MIN))
        .unwrap_or_else(|| Utc::now().naive_utc());
    let mrr_cents = app_state
        .analytics_use_cases
        .monthly_recurring_revenue(caller.user_id, at)
        .await?;
    Ok(Json(MrrResponse { at, mrr_cents }))
}

async fn churn(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Query(params): Query<WindowParams>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let rate = app_state
        .analytics_use_cases
        .churn_rate(caller.user_id, params.days.unwrap_or(DEFAULT_WINDOW_DAYS))
        .await?;
    Ok(Json(RateResponse { rate }))
}

async fn retention(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Query(params): Query<WindowParams>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let rate = app_state
        .analytics_use_cases
        .retention_rate(caller.user_id, params.days.unwrap_or(DEFAULT_WINDOW_DAYS))
        .await?;
    Ok(Json(RateResponse { rate }))
}

async fn auto_renewal(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let rate = app_state
        .analytics_use_cases
        .auto_renewal_rate(caller.user_id)
        .await?;
    Ok(Json(RateResponse { rate }))
}

async fn plan_distribution(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let counts = app_state
        .analytics_use_cases
        .distribution_by_plan(caller.user_id)
        .await?;
    Ok(Json(counts))
}

async fn billing_cycles(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let distribution = app_state
        .analytics_use_cases
        .distribution_by_billing_cycle(caller.user_id)
        .await?;
    Ok(Json(distribution))
}

async fn product_usage(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let usage = app_state
        .analytics_use_cases
        .average_product_usage_by_plan(caller.user_id)
        .await?;
    Ok(Json(usage))
}

async fn near_limit(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Query(params): Query<ThresholdParams>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let stores = app_state
        .analytics_use_cases
        .stores_near_product_limit(
            caller.user_id,
            params.threshold.unwrap_or(DEFAULT_LIMIT_THRESHOLD),
        )
        .await?;
    Ok(Json(stores))
}

async fn monthly_revenue(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path((year, month)): Path<(i32, u32)>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let report = app_state
        .analytics_use_cases
        .monthly_revenue_report(caller.user_id, year, month)
        .await?;
    Ok(Json(report))
}

async fn performance(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Query(params): Query<RangeParams>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let (from, to) = params.bounds();
    let report = app_state
        .analytics_use_cases
        .performance_report(caller.user_id, from, to)
        .await?;
    Ok(Json(report))
}

// ============================================================================
// Product types
// ============================================================================

#[derive(Deserialize)]
struct FieldPayload {
    field_name: String,
    field_type: FieldType,
    #[serde(default)]
    required: bool,
    regex: Option<String>,
    min_value: Option<f64>,
    max_value: Option<f64>,
    #[serde(default)]
    multiple_values: bool,
    #[serde(default)]
    options: Vec<String>,
}

#[derive(Deserialize)]
struct VariantOptionPayload {
    option_name: String,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    allowed_values: Vec<String>,
}

#[derive(Deserialize)]
struct ProductTypePayload {
    name: String,
    slug: Option<String>,
    #[serde(default)]
    fields: Vec<FieldPayload>,
    #[serde(default)]
    variant_options: Vec<VariantOptionPayload>,
}

async fn create_product_type(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(payload): Json<ProductTypePayload>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let input = ProductTypeInput {
        name: payload.name,
        slug: payload.slug,
        fields: payload
            .fields
            .into_iter()
            .map(|f| FieldDefinitionInput {
                field_name: f.field_name,
                field_type: f.field_type,
                required: f.required,
                regex: f.regex,
                min_value: f.min_value,
                max_value: f.max_value,
                multiple_values: f.multiple_values,
                options: f.options,
            })
            .collect(),
        variant_options: payload
            .variant_options
            .into_iter()
            .map(|o| VariantOptionInput {
                option_name: o.option_name,
                required: o.required,
                allowed_values: o.allowed_values,
            })
            .collect(),
    };
    let details = app_state
        .catalog_use_cases
        .create_product_type(caller.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(details)))
}
