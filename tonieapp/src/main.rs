mod core_context;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use core_context::CoreContext;
use tonieconfig::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("loading settings");
    let settings = Settings::load("")?;
    let http_port = settings.http_port();
    let http_bind = settings.http_bind();

    info!("building core context");
    let ctx = CoreContext::new(settings)?;
    let content_dir = ctx.content_dir.clone();
    tokio::fs::create_dir_all(&content_dir).await?;
    info!(content_dir = %content_dir.display(), "content store ready");

    let http_client = reqwest::Client::new();
    let state = Arc::new(ctx.into_app_state(http_client));
    let app = tonieserver::router(state);

    let addr = format!("{http_bind}:{http_port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "starting HTTP server");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("received Ctrl+C, shutting down");
}
