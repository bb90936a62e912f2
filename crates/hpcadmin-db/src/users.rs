//! Queries for HPC user accounts.

use crate::{classify_write_error, DbError, DbPool};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An HPC user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create a user.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
}

/// Partial update of a user. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
}

const USER_COLUMNS: &str = "id, username, email, firstname, lastname, created_at, updated_at";

/// Lists all users ordered by id.
pub async fn list_users(pool: &DbPool) -> Result<Vec<User>, DbError> {
    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY id"
    ))
    .fetch_all(pool)
    .await?;
    Ok(users)
}

/// Fetches a single user.
///
/// # Errors
///
/// Returns `DbError::NotFound` if no user has the given id.
pub async fn get_user(pool: &DbPool, id: i64) -> Result<User, DbError> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("user {id}")))
}

/// Inserts a user and returns the stored row.
///
/// # Errors
///
/// Returns `DbError::Conflict` if the username is taken.
pub async fn create_user(pool: &DbPool, new_user: &NewUser) -> Result<User, DbError> {
    let user = sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (username, email, firstname, lastname)
         VALUES ($1, $2, $3, $4)
         RETURNING {USER_COLUMNS}"
    ))
    .bind(&new_user.username)
    .bind(&new_user.email)
    .bind(&new_user.firstname)
    .bind(&new_user.lastname)
    .fetch_one(pool)
    .await
    .map_err(|e| classify_write_error(e, &format!("user '{}'", new_user.username)))?;

    tracing::info!(user_id = user.id, username = %user.username, "created user");
    Ok(user)
}

/// Applies a partial update and returns the updated row.
pub async fn update_user(pool: &DbPool, id: i64, update: &UserUpdate) -> Result<User, DbError> {
    sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET
            email = COALESCE($2, email),
            firstname = COALESCE($3, firstname),
            lastname = COALESCE($4, lastname),
            updated_at = now()
         WHERE id = $1
         RETURNING {USER_COLUMNS}"
    ))
    .bind(id)
    .bind(update.email.as_deref())
    .bind(update.firstname.as_deref())
    .bind(update.lastname.as_deref())
    .fetch_optional(pool)
    .await
    .map_err(|e| classify_write_error(e, &format!("user {id}")))?
    .ok_or_else(|| DbError::NotFound(format!("user {id}")))
}

/// Deletes a user.
///
/// Memberships are removed with the user. A user that still owns a pirg
/// cannot be deleted and yields `DbError::Conflict`.
pub async fn delete_user(pool: &DbPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                DbError::Conflict(format!("user {id} still owns a pirg"))
            }
            other => DbError::Database(other),
        })?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound(format!("user {id}")));
    }
    tracing::info!(user_id = id, "deleted user");
    Ok(())
}
