//! Shared helpers for route handlers: caller identity and auth cookies.

use axum::{
    Extension,
    http::{HeaderMap, HeaderValue, header},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState,
    app_error::{AppError, AppResult},
    application::use_cases::session::ClientInfo,
};

pub(crate) const ACCESS_COOKIE: &str = "access_token";
pub(crate) const REFRESH_COOKIE: &str = "refresh_token";
pub(crate) const EMAIL_COOKIE: &str = "user_email";

/// The authenticated caller of a request.
#[derive(Debug, Clone)]
pub(crate) struct CurrentUser {
    pub user_id: Uuid,
    pub token_id: Uuid,
    pub token: String,
}

/// Access token from the `Authorization: Bearer` header, falling back to the cookie.
pub(crate) fn access_token(jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    bearer.or_else(|| jar.get(ACCESS_COOKIE).map(|c| c.value().to_owned()))
}

pub(crate) async fn current_user(
    jar: &CookieJar,
    headers: &HeaderMap,
    app_state: &AppState,
) -> AppResult<CurrentUser> {
    let token = access_token(jar, headers).ok_or(AppError::InvalidCredentials)?;
    let claims = app_state.auth_use_cases.authenticate(&token).await?;
    Ok(CurrentUser {
        user_id: claims.user_id()?,
        token_id: claims.token_id()?,
        token,
    })
}

/// Client address as resolved by the rate limiter, honouring `TRUST_PROXY`.
#[derive(Debug, Clone)]
pub(crate) struct ClientIp(pub String);

pub(crate) fn client_ip(resolved: Option<Extension<ClientIp>>) -> Option<String> {
    resolved.map(|Extension(ClientIp(ip))| ip)
}

pub(crate) fn client_info(headers: &HeaderMap, resolved: Option<Extension<ClientIp>>) -> ClientInfo {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    ClientInfo {
        user_agent,
        ip_address: client_ip(resolved),
    }
}

pub(crate) fn auth_cookie(
    name: &'static str,
    value: String,
    max_age: time::Duration,
    http_only: bool,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(http_only)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(max_age)
        .build()
}

/// Appends a cookie to the headers, handling parse errors gracefully
pub(crate) fn append_cookie(headers: &mut HeaderMap, cookie: Cookie<'_>) -> Result<(), AppError> {
    let value = HeaderValue::from_str(&cookie.to_string())
        .map_err(|_| AppError::Internal("Failed to build cookie header".into()))?;
    headers.append(header::SET_COOKIE, value);
    Ok(())
}

/// Expires the access, refresh and email cookies.
pub(crate) fn clear_auth_cookies(headers: &mut HeaderMap) -> Result<(), AppError> {
    for (name, http_only) in [
        (ACCESS_COOKIE, true),
        (REFRESH_COOKIE, true),
        (EMAIL_COOKIE, false),
    ] {
        append_cookie(
            headers,
            auth_cookie(name, String::new(), time::Duration::seconds(0), http_only),
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        let jar = CookieJar::new().add(Cookie::new(ACCESS_COOKIE, "from-cookie"));
        assert_eq!(access_token(&jar, &headers).as_deref(), Some("abc.def"));
    }

    #[test]
    fn test_cookie_used_without_header() {
        let jar = CookieJar::new().add(Cookie::new(ACCESS_COOKIE, "from-cookie"));
        assert_eq!(
            access_token(&jar, &HeaderMap::new()).as_deref(),
            Some("from-cookie")
        );
    }

    #[test]
    fn test_client_info_ignores_forwarding_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9"));
        headers.insert(header::USER_AGENT, HeaderValue::from_static("curl/8"));
        let info = client_info(&headers, None);
        assert_eq!(info.ip_address, None);
        assert_eq!(info.user_agent.as_deref(), Some("curl/8"));

        let resolved = Some(Extension(ClientIp("192.0.2.10".to_string())));
        assert_eq!(client_info(&headers, resolved).ip_address.as_deref(), Some("192.0.2.10"));
    }

    #[test]
    fn test_clear_cookies_sets_three_headers() {
        let mut headers = HeaderMap::new();
        clear_auth_cookies(&mut headers).unwrap();
        assert_eq!(headers.get_all(header::SET_COOKIE).iter().count(), 3);
    }
}
