//! Pirg handlers, mounted at `/api/v1/pirgs`.

use crate::{
    api::{validate_name, ApiError},
    context::Context,
    routes::RouteGroup,
};
use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
};
use hpcadmin_db::{NewPirg, Pirg, PirgUpdate, User};

/// Builds the pirgs router. Handlers reach the pool through `ctx`.
pub fn router(ctx: &Context) -> RouteGroup {
    let ctx = ctx.clone();
    RouteGroup::new()
        .get("/", list_pirgs_handler)
        .post("/", create_pirg_handler)
        .get("/{id}", get_pirg_handler)
        .put("/{id}", update_pirg_handler)
        .delete("/{id}", delete_pirg_handler)
        .get("/{id}/users", list_pirg_users_handler)
        .put("/{id}/users/{user_id}", add_pirg_user_handler)
        .delete("/{id}/users/{user_id}", remove_pirg_user_handler)
        .map_router(|router| router.layer(Extension(ctx)))
}

/// GET /api/v1/pirgs
pub async fn list_pirgs_handler(
    Extension(ctx): Extension<Context>,
) -> Result<Json<Vec<Pirg>>, ApiError> {
    let pool = ctx.db_pool()?;
    Ok(Json(hpcadmin_db::list_pirgs(pool).await?))
}

/// POST /api/v1/pirgs
///
/// The owner becomes the first member.
pub async fn create_pirg_handler(
    Extension(ctx): Extension<Context>,
    Json(payload): Json<NewPirg>,
) -> Result<(StatusCode, Json<Pirg>), ApiError> {
    validate_name("pirg name", &payload.name)?;

    let pool = ctx.db_pool()?;
    let pirg = hpcadmin_db::create_pirg(pool, &payload).await?;
    Ok((StatusCode::CREATED, Json(pirg)))
}

/// GET /api/v1/pirgs/{id}
pub async fn get_pirg_handler(
    Extension(ctx): Extension<Context>,
    Path(id): Path<i64>,
) -> Result<Json<Pirg>, ApiError> {
    let pool = ctx.db_pool()?;
    Ok(Json(hpcadmin_db::get_pirg(pool, id).await?))
}

/// PUT /api/v1/pirgs/{id}
///
/// A new owner becomes a member as part of the same update.
pub async fn update_pirg_handler(
    Extension(ctx): Extension<Context>,
    Path(id): Path<i64>,
    Json(payload): Json<PirgUpdate>,
) -> Result<Json<Pirg>, ApiError> {
    if let Some(ref name) = payload.name {
        validate_name("pirg name", name)?;
    }

    let pool = ctx.db_pool()?;
    Ok(Json(hpcadmin_db::update_pirg(pool, id, &payload).await?))
}

/// DELETE /api/v1/pirgs/{id}
pub async fn delete_pirg_handler(
    Extension(ctx): Extension<Context>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let pool = ctx.db_pool()?;
    hpcadmin_db::delete_pirg(pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/pirgs/{id}/users
pub async fn list_pirg_users_handler(
    Extension(ctx): Extension<Context>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<User>>, ApiError> {
    let pool = ctx.db_pool()?;
    Ok(Json(hpcadmin_db::list_pirg_users(pool, id).await?))
}

/// PUT /api/v1/pirgs/{id}/users/{user_id}
pub async fn add_pirg_user_handler(
    Extension(ctx): Extension<Context>,
    Path((id, user_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    let pool = ctx.db_pool()?;
    hpcadmin_db::add_pirg_user(pool, id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/pirgs/{id}/users/{user_id}
pub async fn remove_pirg_user_handler(
    Extension(ctx): Extension<Context>,
    Path((id, user_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    let pool = ctx.db_pool()?;
    hpcadmin_db::remove_pirg_user(pool, id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
