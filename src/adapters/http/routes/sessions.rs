use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{delete, get},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;
use uuid::Uuid;

use super::common::current_user;
use crate::{adapters::http::app_state::AppState, app_error::AppResult};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_sessions))
        .route("/current", get(current_session))
        .route("/all-except-current", delete(delete_other_sessions))
        .route("/{session_id}", delete(delete_session))
}

async fn list_sessions(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let sessions = app_state
        .session_use_cases
        .list_sessions(caller.user_id, Some(caller.token_id))
        .await?;
    Ok(Json(sessions))
}

async fn current_session(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let session = app_state
        .session_use_cases
        .current_session(caller.user_id, caller.token_id)
        .await?;
    Ok(Json(session))
}

async fn delete_session(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(session_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    app_state
        .session_use_cases
        .delete_session(caller.user_id, session_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
struct DeletedSessionsResponse {
    deleted: usize,
}

async fn delete_other_sessions(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let deleted = app_state
        .session_use_cases
        .delete_other_sessions(caller.user_id, caller.token_id)
        .await?;
    Ok(Json(DeletedSessionsResponse { deleted }))
}
