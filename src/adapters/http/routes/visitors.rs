//! Storefront visitors. Staff manage them under `/api/stores/{store_id}/visitors`;
//! the storefront reports visits through `/public-api/stores/{store_id}/visitors`.

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use uuid::Uuid;

use super::common::{ClientIp, client_ip, current_user};
use crate::{
    adapters::http::app_state::AppState,
    app_error::AppResult,
    application::use_cases::visitor::{TrackInput, VisitorUpdate},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_visitors))
        .route("/stats", get(stats))
        .route(
            "/{visitor_id}",
            get(get_visitor).put(update_visitor).delete(delete_visitor),
        )
}

/// Unauthenticated storefront tracking.
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/track", post(track))
        .route("/newsletter", post(newsletter))
        .route("/pageview", post(page_view))
}

// ============================================================================
// Staff views
// ============================================================================

async fn list_visitors(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(store_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let visitors = app_state
        .visitor_use_cases
        .list(caller.user_id, store_id)
        .await?;
    Ok(Json(visitors))
}

async fn stats(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(store_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let stats = app_state
        .visitor_use_cases
        .stats(caller.user_id, store_id)
        .await?;
    Ok(Json(stats))
}

async fn get_visitor(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path((store_id, visitor_id)): Path<(Uuid, Uuid)>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let visitor = app_state
        .visitor_use_cases
        .get(caller.user_id, store_id, visitor_id)
        .await?;
    Ok(Json(visitor))
}

#[derive(Deserialize)]
struct UpdateVisitorPayload {
    email: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    phone: Option<String>,
    newsletter: Option<bool>,
}

async fn update_visitor(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path((store_id, visitor_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateVisitorPayload>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let update = VisitorUpdate {
        email: payload.email,
        first_name: payload.first_name,
        last_name: payload.last_name,
        phone: payload.phone,
        newsletter: payload.newsletter,
    };
    let visitor = app_state
        .visitor_use_cases
        .update(caller.user_id, store_id, visitor_id, update)
        .await?;
    Ok(Json(visitor))
}

async fn delete_visitor(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path((store_id, visitor_id)): Path<(Uuid, Uuid)>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    app_state
        .visitor_use_cases
        .delete(caller.user_id, store_id, visitor_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Storefront tracking
// ============================================================================

#[derive(Deserialize)]
struct TrackPayload {
    visitor_key: Option<String>,
    email: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    phone: Option<String>,
    discovery_source: Option<String>,
    newsletter: Option<bool>,
    source: Option<String>,
    page_url: Option<String>,
}

async fn track(
    State(app_state): State<AppState>,
    resolved_ip: Option<Extension<ClientIp>>,
    headers: HeaderMap,
    Path(store_id): Path<Uuid>,
    Json(payload): Json<TrackPayload>,
) -> AppResult<impl IntoResponse> {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let input = TrackInput {
        visitor_key: payload.visitor_key,
        email: payload.email,
        first_name: payload.first_name,
        last_name: payload.last_name,
        phone: payload.phone,
        discovery_source: payload.discovery_source,
        newsletter: payload.newsletter,
        source: payload.source,
        page_url: payload.page_url,
    };
    let visitor = app_state
        .visitor_use_cases
        .track(store_id, input, client_ip(resolved_ip), user_agent)
        .await?;
    Ok(Json(visitor))
}

#[derive(Deserialize)]
struct NewsletterPayload {
    email: String,
    #[serde(default = "subscribed_by_default")]
    subscribed: bool,
}

fn subscribed_by_default() -> bool {
    true
}

async fn newsletter(
    State(app_state): State<AppState>,
    Path(store_id): Path<Uuid>,
    Json(payload): Json<NewsletterPayload>,
) -> AppResult<impl IntoResponse> {
    let visitor = app_state
        .visitor_use_cases
        .subscribe_newsletter(store_id, &payload.email, payload.subscribed)
        .await?;
    Ok(Json(visitor))
}

#[derive(Deserialize)]
struct PageViewPayload {
    visitor_key: String,
    page_url: String,
}

async fn page_view(
    State(app_state): State<AppState>,
    Path(store_id): Path<Uuid>,
    Json(payload): Json<PageViewPayload>,
) -> AppResult<impl IntoResponse> {
    let visitor = app_state
        .visitor_use_cases
        .track_page_view(store_id, &payload.visitor_key, &payload.page_url)
        .await?;
    Ok(Json(visitor))
}
