use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::{delete, get, post},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::common::current_user;
use crate::{
    adapters::http::app_state::AppState,
    app_error::AppResult,
    domain::entities::{
        store_invitation::{InvitationStatus, StoreInvitation},
        store_role::{StoreRole, StoreRoleType},
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/mine", get(list_mine))
        .route("/{invitation_id}/accept", post(accept))
        .route("/{invitation_id}/decline", post(decline))
        .route("/{invitation_id}", delete(cancel))
}

/// Unauthenticated invitation lookups, mounted under `/public-api/invitations`.
pub fn public_router() -> Router<AppState> {
    Router::new().route("/validate", get(validate))
}

#[derive(Serialize)]
pub(crate) struct InvitationResponse {
    id: Uuid,
    store_id: Uuid,
    email: String,
    role: StoreRoleType,
    status: InvitationStatus,
    invited_by: Uuid,
    expires_at: NaiveDateTime,
    responded_at: Option<NaiveDateTime>,
    created_at: Option<NaiveDateTime>,
}

impl From<StoreInvitation> for InvitationResponse {
    fn from(invitation: StoreInvitation) -> Self {
        Self {
            id: invitation.id,
            store_id: invitation.store_id,
            email: invitation.email,
            role: invitation.role,
            status: invitation.status,
            invited_by: invitation.invited_by,
            expires_at: invitation.expires_at,
            responded_at: invitation.responded_at,
            created_at: invitation.created_at,
        }
    }
}

#[derive(Serialize)]
pub(crate) struct RoleResponse {
    store_id: Uuid,
    user_id: Uuid,
    role: StoreRoleType,
    created_at: Option<NaiveDateTime>,
}

impl From<StoreRole> for RoleResponse {
    fn from(role: StoreRole) -> Self {
        Self {
            store_id: role.store_id,
            user_id: role.user_id,
            role: role.role,
            created_at: role.created_at,
        }
    }
}

async fn list_mine(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let invitations = app_state
        .invitation_use_cases
        .list_mine(caller.user_id)
        .await?;
    Ok(Json(
        invitations
            .into_iter()
            .map(InvitationResponse::from)
            .collect::<Vec<_>>(),
    ))
}

async fn accept(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(invitation_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let role = app_state
        .invitation_use_cases
        .accept(caller.user_id, invitation_id)
        .await?;
    Ok(Json(RoleResponse::from(role)))
}

async fn decline(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(invitation_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let invitation = app_state
        .invitation_use_cases
        .decline(caller.user_id, invitation_id)
        .await?;
    Ok(Json(InvitationResponse::from(invitation)))
}

async fn cancel(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(invitation_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let invitation = app_state
        .invitation_use_cases
        .cancel(caller.user_id, invitation_id)
        .await?;
    Ok(Json(InvitationResponse::from(invitation)))
}

#[derive(Deserialize)]
struct ValidateParams {
    token: String,
}

async fn validate(
    State(app_state): State<AppState>,
    Query(params): Query<ValidateParams>,
) -> AppResult<impl IntoResponse> {
    let validation = app_state
        .invitation_use_cases
        .validate_token(&params.token)
        .await?;
    Ok(Json(validation))
}
