//! User account handlers, mounted at `/api/v1/users`.

use crate::{
    api::{validate_email, validate_name, ApiError},
    context::Context,
    routes::RouteGroup,
};
use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
};
use hpcadmin_db::{NewUser, User, UserUpdate};

/// Builds the users router. Handlers reach the pool through `ctx`.
pub fn router(ctx: &Context) -> RouteGroup {
    let ctx = ctx.clone();
    RouteGroup::new()
        .get("/", list_users_handler)
        .post("/", create_user_handler)
        .get("/{id}", get_user_handler)
        .put("/{id}", update_user_handler)
        .delete("/{id}", delete_user_handler)
        .map_router(|router| router.layer(Extension(ctx)))
}

/// GET /api/v1/users
pub async fn list_users_handler(
    Extension(ctx): Extension<Context>,
) -> Result<Json<Vec<User>>, ApiError> {
    let pool = ctx.db_pool()?;
    Ok(Json(hpcadmin_db::list_users(pool).await?))
}

/// POST /api/v1/users
pub async fn create_user_handler(
    Extension(ctx): Extension<Context>,
    Json(payload): Json<NewUser>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    validate_name("username", &payload.username)?;
    validate_email(&payload.email)?;

    let pool = ctx.db_pool()?;
    let user = hpcadmin_db::create_user(pool, &payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /api/v1/users/{id}
pub async fn get_user_handler(
    Extension(ctx): Extension<Context>,
    Path(id): Path<i64>,
) -> Result<Json<User>, ApiError> {
    let pool = ctx.db_pool()?;
    Ok(Json(hpcadmin_db::get_user(pool, id).await?))
}

/// PUT /api/v1/users/{id}
///
/// Usernames are immutable; only contact fields can change.
pub async fn update_user_handler(
    Extension(ctx): Extension<Context>,
    Path(id): Path<i64>,
    Json(payload): Json<UserUpdate>,
) -> Result<Json<User>, ApiError> {
    if let Some(ref email) = payload.email {
        validate_email(email)?;
    }

    let pool = ctx.db_pool()?;
    Ok(Json(hpcadmin_db::update_user(pool, id, &payload).await?))
}

/// DELETE /api/v1/users/{id}
pub async fn delete_user_handler(
    Extension(ctx): Extension<Context>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let pool = ctx.db_pool()?;
    hpcadmin_db::delete_user(pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
