//! hpcadmin server library logic.

pub mod api;
pub mod api_admin;
pub mod api_pirgs;
pub mod api_users;
pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod context;
pub mod docs;
pub mod routes;

use axum::http::{header, HeaderValue};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

/// Wraps the composed route tree with the process-wide middleware stack.
///
/// Outermost first: request id assignment, request id propagation, HTTP
/// tracing, panic recovery, default JSON content type.
pub fn app(router: Router) -> Router {
    router
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        ))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}
