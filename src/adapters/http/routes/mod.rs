mod admin;
mod auth;
mod catalog;
mod collections;
pub(crate) mod common;
mod invitations;
mod products;
mod sessions;
mod stores;
mod subscriptions;
mod visitors;

use axum::Router;

use crate::adapters::http::app_state::AppState;

/// Authenticated API, mounted under `/api`.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/sessions", sessions::router())
        .nest("/stores", stores::router())
        .nest("/invitations", invitations::router())
        .nest("/subscriptions", subscriptions::router())
        .nest("/admin", admin::router())
        .nest("/catalog", catalog::router())
}

/// Storefront and link-driven endpoints, mounted under `/public-api`.
pub fn public_router() -> Router<AppState> {
    Router::new()
        .nest("/invitations", invitations::public_router())
        .nest("/stores/{store_id}/visitors", visitors::public_router())
}
