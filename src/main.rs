use dotenvy::dotenv;
use tracing::info;

use shopx_api::infra::{
    app::create_app,
    background::{run_subscription_maintenance_loop, run_token_cleanup_loop},
    error::InfraError,
    setup::init_app_state,
};
use std::net::SocketAddr;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let app_state = init_app_state().await?;

    let bind_addr = app_state.config.bind_addr;

    let app = create_app(app_state.clone());

    // Background jobs start after create_app so their logs reach the subscriber.
    let revocation = app_state.token_revocation.clone();
    let cleanup_every = app_state.config.token_cleanup_interval_secs;
    tokio::spawn(async move {
        run_token_cleanup_loop(revocation, cleanup_every).await;
    });

    let scheduler = app_state.scheduler.clone();
    let maintenance_every = app_state.config.subscription_job_interval_secs;
    tokio::spawn(async move {
        run_subscription_maintenance_loop(scheduler, maintenance_every).await;
    });

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(InfraError::TcpBind)?;

    info!("Backend listening at {}", &listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(InfraError::Server)?;

    Ok(())
}
