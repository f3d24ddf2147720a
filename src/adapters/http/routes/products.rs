//! Store products and their variants, mounted under `/stores/{store_id}/products`.

use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::common::current_user;
use crate::{
    adapters::http::app_state::AppState,
    app_error::AppResult,
    application::use_cases::product::{ProductInput, ProductPatch, VariantInput},
    domain::entities::product::FieldValue,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/active-count", get(active_count))
        .route(
            "/{product_id}",
            get(get_product)
                .put(update_product)
                .patch(patch_product)
                .delete(delete_product),
        )
        .route("/{product_id}/publish", post(publish))
        .route("/{product_id}/unpublish", post(unpublish))
        .route(
            "/{product_id}/variants",
            get(list_variants).post(create_variant),
        )
        .route("/{product_id}/variants/{variant_id}", delete(delete_variant))
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
struct ProductPayload {
    product_type_id: Option<Uuid>,
    category_id: Option<Uuid>,
    sku: Option<String>,
    name: String,
    slug: Option<String>,
    description: Option<String>,
    base_price_cents: i64,
    sale_price_cents: Option<i64>,
    #[serde(default = "default_true")]
    is_active: bool,
    #[serde(default)]
    manage_stock: bool,
    stock_threshold: Option<i32>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    field_values: Vec<FieldValue>,
}

impl From<ProductPayload> for ProductInput {
    fn from(payload: ProductPayload) -> Self {
        Self {
            product_type_id: payload.product_type_id,
            category_id: payload.category_id,
            sku: payload.sku,
            name: payload.name,
            slug: payload.slug,
            description: payload.description,
            base_price_cents: payload.base_price_cents,
            sale_price_cents: payload.sale_price_cents,
            is_active: payload.is_active,
            manage_stock: payload.manage_stock,
            stock_threshold: payload.stock_threshold,
            tags: payload.tags,
            field_values: payload.field_values,
        }
    }
}

#[derive(Deserialize)]
struct PageParams {
    #[serde(default)]
    page: i64,
    #[serde(default)]
    size: i64,
}

async fn create_product(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(store_id): Path<Uuid>,
    Json(payload): Json<ProductPayload>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let product = app_state
        .product_use_cases
        .create_product(caller.user_id, store_id, payload.into())
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn list_products(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(store_id): Path<Uuid>,
    Query(params): Query<PageParams>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let products = app_state
        .product_use_cases
        .list_products(caller.user_id, store_id, params.page, params.size)
        .await?;
    Ok(Json(products))
}

#[derive(Serialize)]
struct ActiveCountResponse {
    store_id: Uuid,
    active_products: i64,
}

async fn active_count(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(store_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let active_products = app_state
        .product_use_cases
        .active_count(caller.user_id, store_id)
        .await?;
    Ok(Json(ActiveCountResponse {
        store_id,
        active_products,
    }))
}

async fn get_product(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path((store_id, product_id)): Path<(Uuid, Uuid)>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let product = app_state
        .product_use_cases
        .get_product(caller.user_id, store_id, product_id)
        .await?;
    Ok(Json(product))
}

async fn update_product(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path((store_id, product_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<ProductPayload>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let product = app_state
        .product_use_cases
        .update_product(caller.user_id, store_id, product_id, payload.into())
        .await?;
    Ok(Json(product))
}

/// Partial update from a loosely typed body.
async fn patch_product(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path((store_id, product_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<Value>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let patch = ProductPatch::from_json(&body)?;
    let product = app_state
        .product_use_cases
        .patch_product(caller.user_id, store_id, product_id, patch)
        .await?;
    Ok(Json(product))
}

async fn delete_product(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path((store_id, product_id)): Path<(Uuid, Uuid)>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    app_state
        .product_use_cases
        .delete_product(caller.user_id, store_id, product_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn publish(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path((store_id, product_id)): Path<(Uuid, Uuid)>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let product = app_state
        .product_use_cases
        .publish(caller.user_id, store_id, product_id)
        .await?;
    Ok(Json(product))
}

async fn unpublish(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path((store_id, product_id)): Path<(Uuid, Uuid)>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let product = app_state
        .product_use_cases
        .unpublish(caller.user_id, store_id, product_id)
        .await?;
    Ok(Json(product))
}

// ============================================================================
// Variants
// ============================================================================

#[derive(Deserialize)]
struct VariantPayload {
    name: String,
    base_price_cents: Option<i64>,
    sale_price_cents: Option<i64>,
    #[serde(default)]
    manage_stock: bool,
    stock_threshold: Option<i32>,
    #[serde(default)]
    option_values: HashMap<String, String>,
    #[serde(default = "default_true")]
    is_active: bool,
}

async fn create_variant(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path((store_id, product_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<VariantPayload>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let input = VariantInput {
        name: payload.name,
        base_price_cents: payload.base_price_cents,
        sale_price_cents: payload.sale_price_cents,
        manage_stock: payload.manage_stock,
        stock_threshold: payload.stock_threshold,
        option_values: payload.option_values,
        is_active: payload.is_active,
    };
    let variant = app_state
        .product_use_cases
        .create_variant(caller.user_id, store_id, product_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(variant)))
}

async fn list_variants(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path((store_id, product_id)): Path<(Uuid, Uuid)>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let variants = app_state
        .product_use_cases
        .list_variants(caller.user_id, store_id, product_id)
        .await?;
    Ok(Json(variants))
}

async fn delete_variant(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path((store_id, _product_id, variant_id)): Path<(Uuid, Uuid, Uuid)>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    app_state
        .product_use_cases
        .delete_variant(caller.user_id, store_id, variant_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
