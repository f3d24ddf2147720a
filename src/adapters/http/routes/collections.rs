use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use uuid::Uuid;

use super::common::current_user;
use crate::{
    adapters::http::app_state::AppState, app_error::AppResult,
    application::use_cases::collection::CollectionInput,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_collections).post(create_collection))
        .route(
            "/{collection_id}",
            get(get_collection)
                .put(update_collection)
                .delete(delete_collection),
        )
}

#[derive(Deserialize)]
struct CollectionPayload {
    name: String,
    description: Option<String>,
    #[serde(default)]
    product_ids: Vec<Uuid>,
}

impl From<CollectionPayload> for CollectionInput {
    fn from(payload: CollectionPayload) -> Self {
        Self {
            name: payload.name,
            description: payload.description,
            product_ids: payload.product_ids,
        }
    }
}

async fn create_collection(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(store_id): Path<Uuid>,
    Json(payload): Json<CollectionPayload>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let collection = app_state
        .collection_use_cases
        .create(caller.user_id, store_id, payload.into())
        .await?;
    Ok((StatusCode::CREATED, Json(collection)))
}

async fn list_collections(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(store_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let collections = app_state
        .collection_use_cases
        .list(caller.user_id, store_id)
        .await?;
    Ok(Json(collections))
}

async fn get_collection(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path((store_id, collection_id)): Path<(Uuid, Uuid)>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let collection = app_state
        .collection_use_cases
        .get(caller.user_id, store_id, collection_id)
        .await?;
    Ok(Json(collection))
}

async fn update_collection(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path((store_id, collection_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<CollectionPayload>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let collection = app_state
        .collection_use_cases
        .update(caller.user_id, store_id, collection_id, payload.into())
        .await?;
    Ok(Json(collection))
}

async fn delete_collection(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path((store_id, collection_id)): Path<(Uuid, Uuid)>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    app_state
        .collection_use_cases
        .delete(caller.user_id, store_id, collection_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
