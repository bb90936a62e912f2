//! Database layer for hpcadmin.
//!
//! Provides PostgreSQL connection pooling (via `sqlx`), embedded SQL
//! migrations, and the query helpers behind the users and pirgs resources.
//!
//! # Design decisions
//!
//! - **One pool per process**: [`connect`] is called once at startup and the
//!   resulting [`DbPool`] is cloned into every request handler. The pool
//!   serializes physical connection use; callers never lock around it.
//! - **Fail fast**: [`connect`] makes a single attempt and verifies the
//!   connection before returning. There is no retry loop.
//! - **Embedded migrations**: SQL files are compiled into the binary via
//!   `include_str!`, so the schema ships with the code that depends on it.

mod migrations;
mod pirgs;
mod pool;
mod users;

pub use migrations::{run_migrations, MigrationError};
pub use pirgs::{
    add_pirg_user, create_pirg, delete_pirg, get_pirg, list_pirg_users, list_pirgs,
    remove_pirg_user, update_pirg, NewPirg, Pirg, PirgUpdate,
};
pub use pool::{connect, connect_lazy, DbPool, DbRequest, DbRuntimeSettings, PoolError};
pub use users::{create_user, delete_user, get_user, list_users, update_user, NewUser, User, UserUpdate};

use thiserror::Error;

/// Errors returned by the resource query helpers.
#[derive(Debug, Error)]
pub enum DbError {
    /// The requested row does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Any other driver-level failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Classifies a write error, turning constraint violations into domain errors.
///
/// Unique violations become [`DbError::Conflict`]; foreign key violations
/// become [`DbError::NotFound`] because they mean a referenced row is absent.
pub(crate) fn classify_write_error(err: sqlx::Error, what: &str) -> DbError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return DbError::Conflict(format!("{what} already exists"));
        }
        if db_err.is_foreign_key_violation() {
            return DbError::NotFound(format!("{what} references a missing row"));
        }
    }
    DbError::Database(err)
}
