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
    application::use_cases::catalog::CategoryInput,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/product-types", get(list_product_types))
        .route("/product-types/{type_id}", get(get_product_type))
        .route("/categories", get(list_categories).post(create_category))
        .route("/categories/tree", get(category_tree))
        .route("/categories/{category_id}", get(get_category))
}

async fn list_product_types(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    let types = app_state.catalog_use_cases.list_product_types().await?;
    Ok(Json(types))
}

async fn get_product_type(
    State(app_state): State<AppState>,
    Path(type_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let details = app_state.catalog_use_cases.get_product_type(type_id).await?;
    Ok(Json(details))
}

async fn list_categories(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    let categories = app_state.catalog_use_cases.list_categories().await?;
    Ok(Json(categories))
}

async fn category_tree(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    let tree = app_state.catalog_use_cases.category_tree().await?;
    Ok(Json(tree))
}

async fn get_category(
    State(app_state): State<AppState>,
    Path(category_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let category = app_state.catalog_use_cases.get_category(category_id).await?;
    Ok(Json(category))
}

#[derive(Deserialize)]
struct CategoryPayload {
    name: String,
    slug: Option<String>,
    description: Option<String>,
    parent_id: Option<Uuid>,
}

async fn create_category(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(payload): Json<CategoryPayload>,
) -> AppResult<impl IntoResponse> {
    let caller = current_user(&jar, &headers, &app_state).await?;
    let input = CategoryInput {
        name: payload.name,
        slug: payload.slug,
        description: payload.description,
        parent_id: payload.parent_id,
    };
    let category = app_state
        .catalog_use_cases
        .create_category(caller.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(category)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum_test::TestServer;
    use serde_json::json;

    use crate::test_utils::{TestAppStateBuilder, create_test_user};

    fn build_test_router(app_state: AppState) -> Router<()> {
        router().with_state(app_state)
    }

    #[tokio::test]
    async fn admin_builds_category_tree() {
        let admin = create_test_user(|u| u.is_platform_admin = true);
        let builder = TestAppStateBuilder::new().with_user(admin.clone());
        let token = builder.access_token_for(&admin);
        let server = TestServer::new(build_test_router(builder.build())).unwrap();

        let parent = server
            .post("/categories")
            .authorization_bearer(&token)
            .json(&json!({ "name": "Clothing" }))
            .await;
        parent.assert_status(StatusCode::CREATED);
        let parent_id = parent.json::<serde_json::Value>()["id"].clone();

        server
            .post("/categories")
            .authorization_bearer(&token)
            .json(&json!({ "name": "Shirts", "parent_id": parent_id }))
            .await
            .assert_status(StatusCode::CREATED);

        let tree = server.get("/categories/tree").await;
        tree.assert_status_ok();
        let roots = tree.json::<Vec<serde_json::Value>>();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0]["name"], "Clothing");
        assert_eq!(roots[0]["children"][0]["name"], "Shirts");
    }

    #[tokio::test]
    async fn regular_users_cannot_create_categories() {
        let user = create_test_user(|_| {});
        let builder = TestAppStateBuilder::new().with_user(user.clone());
        let token = builder.access_token_for(&user);
        let server = TestServer::new(build_test_router(builder.build())).unwrap();

        let response = server
            .post("/categories")
            .authorization_bearer(&token)
            .json(&json!({ "name": "Toys" }))
            .await;

        response.assert_status(StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn unknown_product_type_is_not_found() {
        let server = TestServer::new(build_test_router(TestAppStateBuilder::new().build())).unwrap();

        let response = server
            .get(&format!("/product-types/{}", uuid::Uuid::new_v4()))
            .await;

        response.assert_status(StatusCode::NOT_FOUND);
    }
}
