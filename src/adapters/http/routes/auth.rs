use axum::{
    Extension, Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::common::{
    ACCESS_COOKIE, EMAIL_COOKIE, REFRESH_COOKIE, access_token, append_cookie, auth_cookie,
    ClientIp, clear_auth_cookies, client_info, current_user,
};
use crate::{
    adapters::http::app_state::AppState,
    app_error::{AppError, AppResult},
    domain::entities::user::User,
    use_cases::user::{LoginMode, ProfileUpdate},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/verify-email", post(verify_email))
        .route("/resend-verification", post(resend_verification))
        .route("/status", get(status))
        .route("/me", get(me))
        .route("/profile", put(update_profile))
        .route("/complete-profile", post(complete_profile))
        .route("/change-password", post(change_password))
        .route("/account", delete(delete_account))
}

#[derive(Serialize)]
pub(crate) struct UserResponse {
    id: Uuid,
    username: String,
    email: String,
    name: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    image_url: Option<String>,
    email_verified: bool,
    profile_completed: bool,
    is_platform_admin: bool,
    created_at: Option<NaiveDateTime>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            name: user.name,
            first_name: user.first_name,
            last_name: user.last_name,
            image_url: user.image_url,
            email_verified: user.email_verified,
            profile_completed: user.profile_completed,
            is_platform_admin: user.is_platform_admin,
            created_at: user.created_at,
        }
    }
}

#[derive(Deserialize)]
struct RegisterPayload {
    username: String,
    email: String,
    password: String,
    first_name: Option<String>,
    last_name: Option<String>,
}

async fn register(
    State(app_state): State<AppState>,
    Json(payload): Json<RegisterPayload>,
) -> AppResult<impl IntoResponse> {
    let user = app_state
        .auth_use_cases
        .register(
            &payload.username,
            &payload.email,
            &payload.password,
            payload.first_name,
            payload.last_name,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

#[derive(Deserialize)]
struct LoginPayload {
    /// `email` (default) or `username`.
    mode: Option<String>,
    identifier: String,
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    user: UserResponse,
    access_token: String,
    refresh_token: String,
    access_expires_at: NaiveDateTime,
    refresh_expires_at: NaiveDateTime,
    session_id: Uuid,
}

async fn login(
    State(app_state): State<AppState>,
    resolved_ip: Option<Extension<ClientIp>>,
    headers: HeaderMap,
    Json(payload): Json<LoginPayload>,
) -> AppResult<impl IntoResponse> {
    let mode = match payload.mode.as_deref() {
        None => LoginMode::Email,
        Some(raw) => LoginMode::from_str(raw)
            .ok_or_else(|| AppError::InvalidInput(format!("Unknown login mode '{raw}'")))?,
    };

    let result = app_state
        .auth_use_cases
        .login(
            mode,
            &payload.identifier,
            &payload.password,
            &client_info(&headers, resolved_ip),
        )
        .await?;

    let config = &app_state.config;
    let mut response_headers = HeaderMap::new();
    append_cookie(
        &mut response_headers,
        auth_cookie(
            ACCESS_COOKIE,
            result.access.token.clone(),
            config.access_token_ttl,
            true,
        ),
    )?;
    append_cookie(
        &mut response_headers,
        auth_cookie(
            REFRESH_COOKIE,
            result.refresh.token.clone(),
            config.refresh_token_ttl,
            true,
        ),
    )?;
    append_cookie(
        &mut response_headers,
        auth_cookie(
            EMAIL_COOKIE,
            result.user.email.clone(),
            config.refresh_token_ttl,
            false,
        ),
    )?;

    Ok((
        response_headers,
        Json(LoginResponse {
            user: result.user.into(),
            access_token: result.access.token,
            refresh_token: result.refresh.token,
            access_expires_at: result.access.expires_at,
            refresh_expires_at: result.refresh.expires_at,
            session_id: result.session_id,
        }),
    ))
}

#[derive(Deserialize)]
struct RefreshPayload {
    refresh_token: Option<String>,
}

#[derive(Serialize)]
struct RefreshResponse {
    access_token: String,
    expires_at: NaiveDateTime,
}

async fn refresh(
    State(app_state): State<AppState>,
    jar: CookieJar,
    payload: Option<Json<RefreshPayload>>,
) -> AppResult<impl IntoResponse> {
    let token = payload
        .and_then(|Json(p)| p.refresh_token)
        .or_else(|| jar.get(REFRESH_COOKIE).map(|c| c.value().to_owned()))
        .ok_or(AppError::InvalidToken)?;

    let access = app_state.auth_use_cases.refresh(&token).await?;

    let mut headers = HeaderMap::new();
    append_cookie(
        &mut headers,
        auth_cookie(
            ACCESS_COOKIE,
            access.token.clone(),
            app_state.config.access_token_ttl,
            true,
        ),
    )?;
    Ok((
        headers,
        Json(RefreshResponse {
            access_token: access.token,
            expires_at: access.expires_at,
        }),
    ))
}

/// Always clears cookies; revokes whatever tokens the caller presented.
async fn logout(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> AppResult<impl IntoResponse> {
    if let Some(token) = access_token(&jar, &headers) {
        let refresh = jar.get(REFRESH_COOKIE).map(|c| c.value().to_owned());
        app_state
            .auth_use_cases
            .logout(&token, refresh.as_deref())
            .await?;
    }

    let mut response_headers = HeaderMap::new();
    clear_auth_cookies(&mut response_headers)?;
    Ok((StatusCode::NO_CONTENT, response_headers))
}

#[derive(Deserialize)]
struct VerifyEmailPayload {
    token: String,
}

async fn verify_email(
    State(app_state): State<AppState>,
    Json(payload): Json<VerifyEmailPayload>,
) -> AppResult<impl IntoResponse> {
    let user = app_state.auth_use_cases.verify_email(&payload.token).await?;
    Ok(Json(UserResponse::from(user)))
}

async fn resend_verification(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    app_state
        .auth_use_cases
        .resend_verification(caller.user_id)
        .await?;
    Ok(StatusCode::ACCEPTED)
}

async fn status(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let status = app_state.auth_use_cases.auth_status(caller.user_id).await?;
    Ok(Json(status))
}

async fn me(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let user = app_state.auth_use_cases.me(caller.user_id).await?;
    Ok(Json(UserResponse::from(user)))
}

#[derive(Deserialize)]
struct ProfilePayload {
    name: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    image_url: Option<String>,
}

async fn update_profile(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(payload): Json<ProfilePayload>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let user = app_state
        .auth_use_cases
        .update_profile(
            caller.user_id,
            ProfileUpdate {
                name: payload.name,
                first_name: payload.first_name,
                last_name: payload.last_name,
                image_url: payload.image_url,
            },
        )
        .await?;
    Ok(Json(UserResponse::from(user)))
}

#[derive(Deserialize)]
struct CompleteProfilePayload {
    first_name: String,
    last_name: String,
    email: Option<String>,
}

async fn complete_profile(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(payload): Json<CompleteProfilePayload>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let user = app_state
        .auth_use_cases
        .complete_profile(
            caller.user_id,
            &payload.first_name,
            &payload.last_name,
            payload.email.as_deref(),
        )
        .await?;
    Ok(Json(UserResponse::from(user)))
}

#[derive(Deserialize)]
struct ChangePasswordPayload {
    current_password: String,
    new_password: String,
}

async fn change_password(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(payload): Json<ChangePasswordPayload>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    app_state
        .auth_use_cases
        .change_password(
            caller.user_id,
            &payload.current_password,
            &payload.new_password,
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_account(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    app_state.auth_use_cases.delete_account(caller.user_id).await?;
    app_state
        .token_revocation
        .revoke_access_token(&caller.token, "account_deleted")
        .await?;

    let mut response_headers = HeaderMap::new();
    clear_auth_cookies(&mut response_headers)?;
    Ok((StatusCode::NO_CONTENT, response_headers))
}
