//! Process startup: configuration, connection, composition, then either
//! serving traffic or writing route documentation.
//!
//! Every step runs in order and any failure aborts before a listener is
//! bound, so clients never see a half-started service.

use crate::cli::Cli;
use crate::config::{self, ConfigError, ServerConfig};
use crate::context::{self, Context};
use crate::docs::{self, DocsError};
use crate::{app, routes};
use hpcadmin_db::{MigrationError, PoolError};
use std::future::Future;
use thiserror::Error;
use tokio::net::TcpListener;

/// Errors that abort startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Database(#[from] PoolError),

    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error(transparent)]
    Docs(#[from] DocsError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(std::io::Error),
}

/// Runs the process until shutdown, or until docs are written.
///
/// # Errors
///
/// Returns the first startup failure. The caller is expected to exit.
pub async fn run(cli: &Cli) -> Result<(), StartupError> {
    let config = config::load(cli.config.as_deref())?;
    let request = config.database.to_request();
    let settings = config.database.runtime_settings();

    tracing::info!(
        host = %config.host,
        port = config.port,
        database = %request.display_target(),
        oauth_tenant = %config.oauth.tenant_id,
        "configuration loaded"
    );

    if let Some(destination) = &cli.docs {
        // Routers only need the pool per request, so no connection is opened.
        let pool = hpcadmin_db::connect_lazy(&request, settings);
        let ctx = context::with_db_pool(&Context::background(), pool);
        let group = routes::compose(&ctx);
        docs::emit_docs(group.docs(), destination)?;
        return Ok(());
    }

    let pool = hpcadmin_db::connect(&request, settings).await?;

    let applied = hpcadmin_db::run_migrations(&pool).await?;
    if applied > 0 {
        tracing::info!(count = applied, "applied database migrations");
    }

    let ctx = context::with_db_pool(&Context::background(), pool.clone());
    let (router, route_docs) = routes::compose(&ctx).into_parts();
    docs::log_routes(&route_docs);

    serve(&config, app(router), shutdown_signal()).await?;

    pool.close().await;
    tracing::info!("hpcadmin server shut down");
    Ok(())
}

/// Binds `host:port` from the configuration and serves until `shutdown`
/// resolves, then drains in-flight requests.
pub async fn serve<F>(
    config: &ServerConfig,
    router: axum::Router,
    shutdown: F,
) -> Result<(), StartupError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .map_err(|source| StartupError::Bind {
            addr: addr.clone(),
            source,
        })?;

    tracing::info!(%addr, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(StartupError::Serve)
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
