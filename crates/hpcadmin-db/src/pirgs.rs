//! Queries for pirgs and their memberships.

use crate::{classify_write_error, DbError, DbPool, User};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A resource-allocation group. Every pirg has exactly one owning user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Pirg {
    pub id: i64,
    pub name: String,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create a pirg.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPirg {
    pub name: String,
    pub owner_id: i64,
}

/// Partial update of a pirg. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PirgUpdate {
    pub name: Option<String>,
    pub owner_id: Option<i64>,
}

const PIRG_COLUMNS: &str = "id, name, owner_id, created_at, updated_at";

pub async fn list_pirgs(pool: &DbPool) -> Result<Vec<Pirg>, DbError> {
    let pirgs = sqlx::query_as::<_, Pirg>(&format!(
        "SELECT {PIRG_COLUMNS} FROM pirgs ORDER BY id"
    ))
    .fetch_all(pool)
    .await?;
    Ok(pirgs)
}

pub async fn get_pirg(pool: &DbPool, id: i64) -> Result<Pirg, DbError> {
    sqlx::query_as::<_, Pirg>(&format!("SELECT {PIRG_COLUMNS} FROM pirgs WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("pirg {id}")))
}

/// Inserts a pirg. The owner is also recorded as a member.
///
/// # Errors
///
/// Returns `DbError::Conflict` if the name is taken and `DbError::NotFound`
/// if the owner does not exist.
pub async fn create_pirg(pool: &DbPool, new_pirg: &NewPirg) -> Result<Pirg, DbError> {
    let what = format!("pirg '{}'", new_pirg.name);
    let mut tx = pool.begin().await?;

    let pirg = sqlx::query_as::<_, Pirg>(&format!(
        "INSERT INTO pirgs (name, owner_id) VALUES ($1, $2) RETURNING {PIRG_COLUMNS}"
    ))
    .bind(&new_pirg.name)
    .bind(new_pirg.owner_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| classify_write_error(e, &what))?;

    sqlx::query("INSERT INTO pirg_users (pirg_id, user_id) VALUES ($1, $2)")
        .bind(pirg.id)
        .bind(pirg.owner_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| classify_write_error(e, &what))?;

    tx.commit().await?;

    tracing::info!(pirg_id = pirg.id, name = %pirg.name, owner_id = pirg.owner_id, "created pirg");
    Ok(pirg)
}

/// Applies a partial update.
///
/// When the owner changes, the new owner is added as a member in the same
/// transaction.
///
/// # Errors
///
/// Returns `DbError::NotFound` if the pirg or the new owner does not exist
/// and `DbError::Conflict` if the new name is taken.
pub async fn update_pirg(pool: &DbPool, id: i64, update: &PirgUpdate) -> Result<Pirg, DbError> {
    let what = format!("pirg {id}");
    let mut tx = pool.begin().await?;

    let pirg = sqlx::query_as::<_, Pirg>(&format!(
        "UPDATE pirgs SET
            name = COALESCE($2, name),
            owner_id = COALESCE($3, owner_id),
            updated_at = now()
         WHERE id = $1
         RETURNING {PIRG_COLUMNS}"
    ))
    .bind(id)
    .bind(update.name.as_deref())
    .bind(update.owner_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(|e| classify_write_error(e, &what))?
    .ok_or_else(|| DbError::NotFound(what.clone()))?;

    if update.owner_id.is_some() {
        sqlx::query(
            "INSERT INTO pirg_users (pirg_id, user_id) VALUES ($1, $2)
             ON CONFLICT (pirg_id, user_id) DO NOTHING",
        )
        .bind(pirg.id)
        .bind(pirg.owner_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| classify_write_error(e, &what))?;
    }

    tx.commit().await?;

    tracing::info!(pirg_id = pirg.id, owner_id = pirg.owner_id, "updated pirg");
    Ok(pirg)
}

/// Deletes a pirg together with its memberships.
pub async fn delete_pirg(pool: &DbPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM pirgs WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound(format!("pirg {id}")));
    }
    tracing::info!(pirg_id = id, "deleted pirg");
    Ok(())
}

/// Lists the members of a pirg.
///
/// # Errors
///
/// Returns `DbError::NotFound` if the pirg does not exist.
pub async fn list_pirg_users(pool: &DbPool, pirg_id: i64) -> Result<Vec<User>, DbError> {
    // Distinguish "no members" from "no such pirg".
    get_pirg(pool, pirg_id).await?;

    let users = sqlx::query_as::<_, User>(
        "SELECT u.id, u.username, u.email, u.firstname, u.lastname, u.created_at, u.updated_at
         FROM users u
         JOIN pirg_users pu ON pu.user_id = u.id
         WHERE pu.pirg_id = $1
         ORDER BY u.id",
    )
    .bind(pirg_id)
    .fetch_all(pool)
    .await?;
    Ok(users)
}

/// Adds a user to a pirg. Adding an existing member is a no-op.
pub async fn add_pirg_user(pool: &DbPool, pirg_id: i64, user_id: i64) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO pirg_users (pirg_id, user_id) VALUES ($1, $2)
         ON CONFLICT (pirg_id, user_id) DO NOTHING",
    )
    .bind(pirg_id)
    .bind(user_id)
    .execute(pool)
    .await
    .map_err(|e| classify_write_error(e, &format!("membership of user {user_id} in pirg {pirg_id}")))?;

    tracing::info!(pirg_id, user_id, "added user to pirg");
    Ok(())
}

/// Removes a user from a pirg.
///
/// The owner cannot be removed; transfer ownership first. The pirg row stays
/// locked from the owner check until the delete commits.
pub async fn remove_pirg_user(pool: &DbPool, pirg_id: i64, user_id: i64) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    let owner_id: i64 = sqlx::query_scalar("SELECT owner_id FROM pirgs WHERE id = $1 FOR UPDATE")
        .bind(pirg_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("pirg {pirg_id}")))?;

    if owner_id == user_id {
        return Err(DbError::Conflict(format!(
            "user {user_id} owns pirg {pirg_id}"
        )));
    }

    let result = sqlx::query("DELETE FROM pirg_users WHERE pirg_id = $1 AND user_id = $2")
        .bind(pirg_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound(format!(
            "user {user_id} is not a member of pirg {pirg_id}"
        )));
    }

    tx.commit().await?;

    tracing::info!(pirg_id, user_id, "removed user from pirg");
    Ok(())
}
