//! Shareable link lists with fetched page metadata.
//!
//! The server side is an axum API over a SQLite row store plus a page
//! metadata fetcher. [`store::ListStore`] is the client-side mirror that talks
//! to any [`backend::ListBackend`], either the database directly or a running
//! server through [`backend::HttpBackend`].

use std::{future::Future, net::SocketAddr, sync::Arc};

use anyhow::Context;
use tokio::{net::TcpListener, signal::ctrl_c};
use tracing::{error, info};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

pub mod backend;
pub mod config;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod model;
pub mod routes;
pub mod slug;
pub mod state;
pub mod store;

use backend::Database;
use config::Config;
use state::AppState;

pub async fn run() -> anyhow::Result<()> {
    logging::init_logging();

    info!("Loading configuration...");
    let config = Config::load()?;

    info!("Opening database at {}", config.database_path.display());
    let database = Database::open(&config.database_path)?;

    let address = SocketAddr::new(config.host, config.port);
    let state = AppState::new(config, database)?;

    info!("Binding to {address}");
    let listener = TcpListener::bind(address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;

    serve(listener, state, shutdown_signal()).await?;
    info!("Server shut down");
    Ok(())
}

/// Serves the API on an already bound listener until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = routes::router(state);
    info!("Server running on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("server error")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!("Failed to install signal handler: {}", err);
                std::future::pending::<()>().await;
            }
        }

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
