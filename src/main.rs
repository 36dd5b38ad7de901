use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use dockterm::config::Config;
use dockterm::server::{build_router, AppState, ClientRegistry};
use dockterm::service::SessionService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    let registry = Arc::new(ClientRegistry::new());
    let service = SessionService::new(&config, registry.clone());
    let app = build_router(
        AppState { service, registry },
        config.static_dir.clone(),
    );

    tracing::info!("serving on http://{}", config.bind);
    let listener = TcpListener::bind(config.bind).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
