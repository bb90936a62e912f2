//! Administrative namespace, mounted at `/admin`.
//!
//! Takes no context: nothing here touches the database.

use crate::routes::RouteGroup;
use axum::Json;
use serde_json::{json, Value};

pub fn router() -> RouteGroup {
    RouteGroup::new()
        .get("/", index_handler)
        .get("/health", health_handler)
}

/// GET /admin
async fn index_handler() -> Json<Value> {
    Json(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "resources": ["/api/v1/users", "/api/v1/pirgs"]
    }))
}

/// GET /admin/health
///
/// Used by load balancers and monitoring to verify the process is up.
async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
