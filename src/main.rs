mod config;
mod error;
mod google;
mod hub;
mod routes;
mod singleton;
mod state;
mod store;
#[cfg(test)]
mod testutil;
mod types;
mod watch;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::google::GoogleCalendar;
use crate::state::AppState;
use crate::store::FileStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Ensure only one instance is running
    let _lock = singleton::acquire_lock()?;

    let config = Config::from_env()?;
    let port = config.port;

    let provider = Arc::new(GoogleCalendar::new(&config));
    let store = Arc::new(FileStore::new()?);

    let state = AppState::new(config, provider, store.clone(), store);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::router(state).layer(cors);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    info!("calwatch-server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
