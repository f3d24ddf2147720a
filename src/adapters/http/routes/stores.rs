use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, put},
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    collections,
    common::current_user,
    invitations::{InvitationResponse, RoleResponse},
    products, visitors,
};
use crate::{
    adapters::http::app_state::AppState,
    app_error::AppResult,
    application::use_cases::store::StoreUpdate,
    domain::entities::store_role::StoreRoleType,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_stores).post(create_store))
        .route("/subdomains/check", get(check_subdomain))
        .route(
            "/{store_id}",
            get(get_store).put(update_store).delete(delete_store),
        )
        .route(
            "/{store_id}/subdomain",
            put(assign_subdomain).delete(remove_subdomain),
        )
        .route("/{store_id}/access", get(check_access))
        .route("/{store_id}/staff", get(list_staff).post(add_staff))
        .route("/{store_id}/staff/{user_id}/role", put(update_staff_role))
        .route(
            "/{store_id}/staff/{user_id}",
            axum::routing::delete(remove_staff),
        )
        .route(
            "/{store_id}/invitations",
            get(list_invitations).post(create_invitation),
        )
        .nest("/{store_id}/products", products::router())
        .nest("/{store_id}/collections", collections::router())
        .nest("/{store_id}/visitors", visitors::router())
}

// ============================================================================
// Stores
// ============================================================================

#[derive(Deserialize)]
struct CreateStorePayload {
    name: String,
    description: Option<String>,
}

async fn create_store(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(payload): Json<CreateStorePayload>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let store = app_state
        .store_use_cases
        .create_store(caller.user_id, &payload.name, payload.description.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(store)))
}

async fn list_stores(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let stores = app_state
        .store_use_cases
        .list_user_stores(caller.user_id)
        .await?;
    Ok(Json(stores))
}

async fn get_store(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(store_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let store = app_state
        .store_use_cases
        .get_store(caller.user_id, store_id)
        .await?;
    Ok(Json(store))
}

#[derive(Deserialize)]
struct UpdateStorePayload {
    name: Option<String>,
    description: Option<String>,
    logo_url: Option<String>,
    template: Option<String>,
    is_active: Option<bool>,
}

async fn update_store(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(store_id): Path<Uuid>,
    Json(payload): Json<UpdateStorePayload>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let update = StoreUpdate {
        name: payload.name,
        description: payload.description,
        logo_url: payload.logo_url,
        template: payload.template,
        is_active: payload.is_active,
    };
    let store = app_state
        .store_use_cases
        .update_store(caller.user_id, store_id, update)
        .await?;
    Ok(Json(store))
}

async fn delete_store(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(store_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    app_state
        .store_use_cases
        .delete_store(caller.user_id, store_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Subdomains
// ============================================================================

#[derive(Deserialize)]
struct SubdomainParams {
    subdomain: String,
}

async fn check_subdomain(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Query(params): Query<SubdomainParams>,
) -> AppResult<impl IntoResponse> {
    current_user(&jar, &headers, &app_state).await?;
    let availability = app_state
        .store_use_cases
        .check_subdomain_availability(&params.subdomain)
        .await?;
    Ok(Json(availability))
}

#[derive(Deserialize)]
struct SubdomainPayload {
    subdomain: String,
}

async fn assign_subdomain(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(store_id): Path<Uuid>,
    Json(payload): Json<SubdomainPayload>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let store = app_state
        .store_use_cases
        .assign_subdomain(caller.user_id, store_id, &payload.subdomain)
        .await?;
    Ok(Json(store))
}

async fn remove_subdomain(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(store_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let store = app_state
        .store_use_cases
        .remove_subdomain(caller.user_id, store_id)
        .await?;
    Ok(Json(store))
}

// ============================================================================
// Resource access
// ============================================================================

#[derive(Deserialize)]
struct AccessParams {
    resource_type: String,
    /// Defaults to the store itself.
    resource_id: Option<Uuid>,
    action: String,
}

#[derive(Serialize)]
struct AccessResponse {
    resource_type: String,
    resource_id: Uuid,
    action: String,
    allowed: bool,
}

async fn check_access(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(store_id): Path<Uuid>,
    Query(params): Query<AccessParams>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let resource_id = params.resource_id.unwrap_or(store_id);
    let allowed = app_state
        .resource_access
        .can_access_resource(
            caller.user_id,
            &params.resource_type,
            resource_id,
            &params.action,
        )
        .await?;
    Ok(Json(AccessResponse {
        resource_type: params.resource_type,
        resource_id,
        action: params.action,
        allowed,
    }))
}

// ============================================================================
// Staff
// ============================================================================

#[derive(Deserialize)]
struct AddStaffPayload {
    user_id: Uuid,
    role: StoreRoleType,
}

#[derive(Deserialize)]
struct RolePayload {
    role: StoreRoleType,
}

async fn list_staff(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(store_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let staff = app_state
        .staff_use_cases
        .list_staff(caller.user_id, store_id)
        .await?;
    Ok(Json(staff))
}

async fn add_staff(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(store_id): Path<Uuid>,
    Json(payload): Json<AddStaffPayload>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let role = app_state
        .staff_use_cases
        .add_staff(caller.user_id, store_id, payload.user_id, payload.role)
        .await?;
    Ok((StatusCode::CREATED, Json(RoleResponse::from(role))))
}

async fn update_staff_role(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path((store_id, user_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<RolePayload>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let role = app_state
        .staff_use_cases
        .update_staff_role(caller.user_id, store_id, user_id, payload.role)
        .await?;
    Ok(Json(RoleResponse::from(role)))
}

async fn remove_staff(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path((store_id, user_id)): Path<(Uuid, Uuid)>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    app_state
        .staff_use_cases
        .remove_staff(caller.user_id, store_id, user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Invitations
// ============================================================================

#[derive(Deserialize)]
struct InvitePayload {
    email: String,
    role: StoreRoleType,
}

async fn create_invitation(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(store_id): Path<Uuid>,
    Json(payload): Json<InvitePayload>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let invitation = app_state
        .invitation_use_cases
        .create_invitation(caller.user_id, store_id, &payload.email, payload.role)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(InvitationResponse::from(invitation)),
    ))
}

async fn list_invitations(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(store_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let invitations = app_state
        .invitation_use_cases
        .list_pending(caller.user_id, store_id)
        .await?;
    Ok(Json(
        invitations
            .into_iter()
            .map(InvitationResponse::from)
            .collect::<Vec<_>>(),
    ))
}
