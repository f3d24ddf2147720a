use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;

use crate::{
    adapters::http::{
        app_state::AppState,
        routes::common::{ClientIp, EMAIL_COOKIE},
    },
    app_error::AppError,
    infra::RateScope,
};

pub async fn rate_limit_middleware(
    State(app_state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    cookies: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ip = resolve_ip(&request, addr, app_state.config.trust_proxy);
    let email = cookies.get(EMAIL_COOKIE).map(|c| c.value().to_owned());
    let scope = RateScope::for_path(request.uri().path());

    tracing::debug!(
        trust_proxy = app_state.config.trust_proxy,
        connect_ip = %addr.ip(),
        using_ip = %ip,
        email = ?email,
        scope = ?scope,
        "Rate limiting request"
    );

    app_state
        .rate_limiter
        .check(scope, &ip, email.as_deref())
        .await?;

    // Preserve cookie jar and resolved address for downstream extractors.
    request.extensions_mut().insert(cookies);
    request.extensions_mut().insert(ClientIp(ip));

    Ok(next.run(request).await)
}

/// Forwarded headers are only trusted behind a configured reverse proxy.
fn resolve_ip(req: &Request, addr: SocketAddr, trust_proxy: bool) -> String {
    if trust_proxy {
        forwarded_ip(req).unwrap_or_else(|| addr.ip().to_string())
    } else {
        addr.ip().to_string()
    }
}

fn forwarded_ip(req: &Request) -> Option<String> {
    if let Some(forwarded) = req.headers().get("x-forwarded-for")
        && let Ok(val) = forwarded.to_str()
        && let Some(first) = val.split(',').next()
    {
        let trimmed = first.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }
    if let Some(real) = req.headers().get("x-real-ip")
        && let Ok(val) = real.to_str()
        && !val.trim().is_empty()
    {
        return Some(val.trim().to_string());
    }
    None
}
