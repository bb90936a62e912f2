//! Connection pool creation and configuration.

use sqlx::postgres::{PgConnectOptions, PgConnection, PgPool, PgPoolOptions, PgSslMode};
use sqlx::Connection;
use std::fmt;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Runtime tunables for the PostgreSQL pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbRuntimeSettings {
    /// Maximum number of pooled connections.
    pub max_connections: u32,

    /// How long to wait for a connection before giving up, in milliseconds.
    pub acquire_timeout_ms: u64,
}

impl Default for DbRuntimeSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout_ms: 5_000,
        }
    }
}

/// A type alias for the PostgreSQL connection pool.
///
/// Cloning is cheap and every clone refers to the same set of connections.
pub type DbPool = PgPool;

/// Parameters for opening the database connection.
///
/// Only used to build the pool; never stored.
#[derive(Clone, PartialEq, Eq)]
pub struct DbRequest {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
    /// Turns transport encryption off (`sslmode=disable`).
    pub disable_ssl: bool,
}

impl fmt::Debug for DbRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbRequest")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("dbname", &self.dbname)
            .field("disable_ssl", &self.disable_ssl)
            .finish()
    }
}

impl DbRequest {
    /// The SSL mode requested for the connection.
    pub fn ssl_mode(&self) -> PgSslMode {
        if self.disable_ssl {
            PgSslMode::Disable
        } else {
            PgSslMode::Prefer
        }
    }

    /// Builds the driver connect options from the request fields.
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.dbname)
            .ssl_mode(self.ssl_mode())
    }

    /// A loggable description of the target, without the password.
    pub fn display_target(&self) -> String {
        let sslmode = if self.disable_ssl { "disable" } else { "prefer" };
        format!(
            "postgres://{}@{}:{}/{}?sslmode={}",
            self.user, self.host, self.port, self.dbname, sslmode
        )
    }
}

/// Errors that can occur when creating the database pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The database was unreachable, rejected the credentials, or the named
    /// database does not exist.
    #[error("failed to connect to database {target}: {source}")]
    Connect {
        /// Password-free description of the connection target.
        target: String,
        /// The driver-level cause.
        source: sqlx::Error,
    },
}

fn pool_options(settings: DbRuntimeSettings) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(Duration::from_millis(settings.acquire_timeout_ms))
}

/// Verifies that the database answers, then builds the pool.
///
/// Makes exactly one direct connection attempt, bounded by
/// `settings.acquire_timeout_ms`. The returned pool opens its own
/// connections on demand.
///
/// # Errors
///
/// Returns `PoolError::Connect` carrying the driver error if the database is
/// unreachable, the credentials are rejected, or the database does not exist.
pub async fn connect(request: &DbRequest, settings: DbRuntimeSettings) -> Result<DbPool, PoolError> {
    let target = request.display_target();
    let options = request.connect_options();
    let timeout = Duration::from_millis(settings.acquire_timeout_ms);
    tracing::debug!(%target, "opening database connection");

    let failed = |source: sqlx::Error| PoolError::Connect {
        target: target.clone(),
        source,
    };

    let mut conn = match tokio::time::timeout(timeout, PgConnection::connect_with(&options)).await {
        Ok(result) => result.map_err(failed)?,
        Err(_) => {
            return Err(failed(sqlx::Error::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("no answer within {}ms", settings.acquire_timeout_ms),
            ))))
        }
    };

    sqlx::query("SELECT 1")
        .execute(&mut conn)
        .await
        .map_err(failed)?;

    if let Err(e) = conn.close().await {
        tracing::debug!(error = %e, "closing verification connection failed");
    }

    tracing::info!(%target, "database connection verified");
    Ok(pool_options(settings).connect_lazy_with(options))
}

/// Builds the pool without opening any connection.
///
/// Connections are established on first use. Requires a Tokio runtime.
pub fn connect_lazy(request: &DbRequest, settings: DbRuntimeSettings) -> DbPool {
    pool_options(settings).connect_lazy_with(request.connect_options())
}
