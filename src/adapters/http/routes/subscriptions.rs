use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use uuid::Uuid;

use super::common::current_user;
use crate::{
    adapters::http::app_state::AppState, app_error::AppResult,
    domain::entities::subscription_plan::BillingCycle,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/plans", get(list_plans))
        .route("/plans/by-name/{name}", get(get_plan_by_name))
        .route("/plans/{plan_id}", get(get_plan))
        .route("/stores/{store_id}/active", get(active_subscription))
        .route("/stores/{store_id}/history", get(history))
        .route("/stores/{store_id}/invoices", get(list_invoices))
        .route("/stores/{store_id}/usage", get(usage))
        .route("/stores/{store_id}/trial", post(start_trial))
        .route("/stores/{store_id}/subscribe", post(subscribe))
        .route("/stores/{store_id}/change-plan", put(change_plan))
        .route("/stores/{store_id}/cancel", post(cancel))
        .route("/stores/{store_id}/auto-renew", put(set_auto_renew))
        .route("/invoices/{invoice_id}", get(get_invoice))
        .route("/invoices/{invoice_id}/pay", post(pay_invoice))
}

// ============================================================================
// Plans
// ============================================================================

async fn list_plans(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    let plans = app_state.plan_use_cases.list_active_plans().await?;
    Ok(Json(plans))
}

async fn get_plan(
    State(app_state): State<AppState>,
    Path(plan_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let plan = app_state.plan_use_cases.get_plan(plan_id).await?;
    Ok(Json(plan))
}

async fn get_plan_by_name(
    State(app_state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<impl IntoResponse> {
    let plan = app_state.plan_use_cases.get_plan_by_name(&name).await?;
    Ok(Json(plan))
}

// ============================================================================
// Store subscriptions
// ============================================================================

#[derive(Deserialize)]
struct PlanChoicePayload {
    plan_id: Uuid,
    #[serde(default = "monthly")]
    billing_cycle: BillingCycle,
}

fn monthly() -> BillingCycle {
    BillingCycle::Monthly
}

#[derive(Deserialize)]
struct CancelPayload {
    #[serde(default)]
    immediately: bool,
}

#[derive(Deserialize)]
struct AutoRenewPayload {
    auto_renew: bool,
}

async fn active_subscription(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(store_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let subscription = app_state
        .subscription_use_cases
        .active_subscription(caller.user_id, store_id)
        .await?;
    Ok(Json(subscription))
}

async fn history(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(store_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let subscriptions = app_state
        .subscription_use_cases
        .history(caller.user_id, store_id)
        .await?;
    Ok(Json(subscriptions))
}

async fn usage(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(store_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let lines = app_state
        .usage_use_cases
        .store_usage(caller.user_id, store_id)
        .await?;
    Ok(Json(lines))
}

async fn start_trial(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(store_id): Path<Uuid>,
    Json(payload): Json<PlanChoicePayload>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let subscription = app_state
        .subscription_use_cases
        .start_trial(
            caller.user_id,
            store_id,
            payload.plan_id,
            payload.billing_cycle,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(subscription)))
}

async fn subscribe(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(store_id): Path<Uuid>,
    Json(payload): Json<PlanChoicePayload>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let subscription = app_state
        .subscription_use_cases
        .subscribe(
            caller.user_id,
            store_id,
            payload.plan_id,
            payload.billing_cycle,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(subscription)))
}

async fn change_plan(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(store_id): Path<Uuid>,
    Json(payload): Json<PlanChoicePayload>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let subscription = app_state
        .subscription_use_cases
        .change_plan(
            caller.user_id,
            store_id,
            payload.plan_id,
            payload.billing_cycle,
        )
        .await?;
    Ok(Json(subscription))
}

async fn cancel(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(store_id): Path<Uuid>,
    payload: Option<Json<CancelPayload>>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let immediately = payload.is_some_and(|Json(p)| p.immediately);
    let subscription = app_state
        .subscription_use_cases
        .cancel(caller.user_id, store_id, immediately)
        .await?;
    Ok(Json(subscription))
}

async fn set_auto_renew(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(store_id): Path<Uuid>,
    Json(payload): Json<AutoRenewPayload>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let subscription = app_state
        .subscription_use_cases
        .set_auto_renew(caller.user_id, store_id, payload.auto_renew)
        .await?;
    Ok(Json(subscription))
}

// ============================================================================
// Invoices
// ============================================================================

#[derive(Deserialize)]
struct PayPayload {
    payment_method: String,
}

async fn list_invoices(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(store_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let invoices = app_state
        .invoice_use_cases
        .list_for_store(caller.user_id, store_id)
        .await?;
    Ok(Json(invoices))
}

async fn get_invoice(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(invoice_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let invoice = app_state
        .invoice_use_cases
        .get(caller.user_id, invoice_id)
        .await?;
    Ok(Json(invoice))
}

async fn pay_invoice(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(invoice_id): Path<Uuid>,
    Json(payload): Json<PayPayload>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let invoice = app_state
        .invoice_use_cases
        .pay(caller.user_id, invoice_id, &payload.payment_method)
        .await?;
    Ok(Json(invoice))
}
