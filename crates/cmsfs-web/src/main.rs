mod api;
mod config;
mod download;
mod dto;
mod error;
mod state;

use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServerConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cmsfs_web=debug,cmsfs_core=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::load()?;
    let bind_addr = config.bind_addr;
    let body_limit = config.max_body_size_mb * 1024 * 1024;
    tracing::info!(
        "serving files from {} (sync {})",
        config.core.files.root_dir.display(),
        if config.core.sync.enabled { "enabled" } else { "disabled" }
    );

    let state = AppState::new(config);

    let app = axum::Router::new()
        .nest("/api", api::router())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("cmsfs-web listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
