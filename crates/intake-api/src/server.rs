//! API server setup.

use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::routes::create_router;
use crate::state::AppState;
use intake_core::storage::Store;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            enable_cors: false,
        }
    }
}

/// Create the router and the address to serve it on. Passing no store keeps
/// the server up but answering 503 on data routes.
pub fn create_server(config: &ApiConfig, store: Option<Store>) -> anyhow::Result<(Router, SocketAddr)> {
    if let Some(store) = &store {
        store.init_schema()?;
    }
    let state = AppState::new(store);

    let mut router = create_router(state).layer(TraceLayer::new_for_http());
    if config.enable_cors {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    Ok((router, addr))
}

/// Run the API server until the task is cancelled.
pub async fn run_server(config: &ApiConfig, store: Option<Store>) -> anyhow::Result<()> {
    let (router, addr) = create_server(config, store)?;

    tracing::info!(event = "server_listening", addr = %addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

/// Bind (port 0 friendly) and serve in a background task. Used by tests.
pub async fn start_background_server(
    config: &ApiConfig,
    store: Option<Store>,
) -> anyhow::Result<SocketAddr> {
    let (router, addr) = create_server(config, store)?;

    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router).await {
            tracing::error!(event = "server_error", error = %error);
        }
    });

    Ok(actual_addr)
}
