mod app_error;
mod cms;
mod config;
mod content_loader;
mod handlers;
mod hot_reload;
mod models;
mod pages;
mod preview;
mod reading_time;
mod render;
mod retrieval;
mod rich_text;
mod state;
#[cfg(test)]
mod test_support;

use std::{net::SocketAddr, path::Path, sync::Arc};

use anyhow::Context;
use tokio::{net::TcpListener, sync::broadcast};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cms::PrismicClient;
use crate::config::Settings;
use crate::content_loader::{load_templates, CONTENT_DIR};
use crate::hot_reload::start_content_watcher;
use crate::state::{AppState, RouterState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::load()?;
    info!("RUST_ENV is set to development: {}", settings.is_development);
    if settings.comments.repo.is_none() {
        warn!("COMMENTS_REPO is not set, posts render without comments");
    }

    let templates = load_templates(Path::new(CONTENT_DIR))
        .await
        .context("Failed to load initial content files")?;
    let source = PrismicClient::new(
        settings.cms.api_endpoint.clone(),
        settings.cms.access_token.clone(),
    )
    .context("Failed to build CMS client")?;

    let state = Arc::new(AppState::new(settings, Arc::new(source), templates));

    match pages::generate_static_pages(&state).await {
        Ok(count) => info!(count, "Static post pages ready"),
        Err(e) => warn!(
            "Failed to enumerate posts, pages will be generated on request: {}",
            e
        ),
    }

    // Hot-reload setup
    let (tx, _rx) = broadcast::channel(1);
    if state.settings.is_development {
        info!("Hot reload enabled. Check logs for file change events.");
        start_content_watcher(tx.clone(), state.clone());
    }

    let port = state.settings.server.port;
    let router_state = RouterState {
        app_state: state,
        broadcaster: tx,
    };
    let app = handlers::build_router(router_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "listening");
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app).await?;
    Ok(())
}
