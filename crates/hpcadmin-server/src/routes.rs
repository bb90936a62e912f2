//! Route tree composition.
//!
//! [`RouteGroup`] wraps an axum [`Router`] and records every path and method
//! registered on it, so the composed tree can be written out by
//! [`crate::docs::emit_docs`] without serving traffic.

use crate::context::Context;
use crate::{api_admin, api_pirgs, api_users};
use axum::handler::Handler;
use axum::http::Method;
use axum::routing::{self, MethodRouter};
use axum::Router;
use serde::Serialize;
use std::collections::BTreeSet;

/// One path pattern and the methods it accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteEntry {
    pub pattern: String,
    pub methods: Vec<String>,
}

/// A sub-tree mounted under a path prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mount {
    pub prefix: String,
    pub group: RouteDocs,
}

/// Structural description of a route group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RouteDocs {
    pub routes: Vec<RouteEntry>,
    pub mounts: Vec<Mount>,
}

impl RouteDocs {
    /// Every route in the tree with its full path, in registration order.
    pub fn flatten(&self) -> Vec<RouteEntry> {
        let mut out = Vec::new();
        self.collect("", &mut out);
        out
    }

    fn collect(&self, prefix: &str, out: &mut Vec<RouteEntry>) {
        for route in &self.routes {
            out.push(RouteEntry {
                pattern: join_path(prefix, &route.pattern),
                methods: route.methods.clone(),
            });
        }
        for mount in &self.mounts {
            mount.group.collect(&join_path(prefix, &mount.prefix), out);
        }
    }

    fn record(&mut self, pattern: &str, method: &Method) {
        let method = method.as_str().to_string();
        match self.routes.iter_mut().find(|r| r.pattern == pattern) {
            Some(entry) => {
                let mut methods: BTreeSet<String> = entry.methods.drain(..).collect();
                methods.insert(method);
                entry.methods = methods.into_iter().collect();
            }
            None => self.routes.push(RouteEntry {
                pattern: pattern.to_string(),
                methods: vec![method],
            }),
        }
    }
}

/// Joins a mount prefix and a nested pattern the way `Router::nest` does.
fn join_path(prefix: &str, pattern: &str) -> String {
    match (prefix, pattern) {
        ("", "") => "/".to_string(),
        ("", p) => p.to_string(),
        (p, "/") | (p, "") => p.to_string(),
        (p, q) => format!("{}{}", p.trim_end_matches('/'), q),
    }
}

/// A documented router under construction.
#[derive(Default)]
pub struct RouteGroup {
    router: Router,
    docs: RouteDocs,
}

impl RouteGroup {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(mut self, path: &str, method: Method, method_router: MethodRouter) -> Self {
        self.docs.record(path, &method);
        self.router = self.router.route(path, method_router);
        self
    }

    pub fn get<H, T>(self, path: &str, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.add(path, Method::GET, routing::get(handler))
    }

    pub fn post<H, T>(self, path: &str, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.add(path, Method::POST, routing::post(handler))
    }

    pub fn put<H, T>(self, path: &str, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.add(path, Method::PUT, routing::put(handler))
    }

    pub fn delete<H, T>(self, path: &str, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.add(path, Method::DELETE, routing::delete(handler))
    }

    /// Nests `child` under `prefix`. Prefixes must be disjoint.
    pub fn mount(mut self, prefix: &str, child: RouteGroup) -> Self {
        self.router = self.router.nest(prefix, child.router);
        self.docs.mounts.push(Mount {
            prefix: prefix.to_string(),
            group: child.docs,
        });
        self
    }

    /// Transforms the underlying router, e.g. to add a layer.
    ///
    /// Layers only wrap routes registered before this call.
    pub fn map_router(mut self, f: impl FnOnce(Router) -> Router) -> Self {
        self.router = f(self.router);
        self
    }

    pub fn docs(&self) -> &RouteDocs {
        &self.docs
    }

    pub fn into_parts(self) -> (Router, RouteDocs) {
        (self.router, self.docs)
    }
}

/// Builds the full route tree from the bound context.
///
/// ```text
/// /admin           api_admin::router()
/// /api/v1/users    api_users::router(ctx)
/// /api/v1/pirgs    api_pirgs::router(ctx)
/// ```
///
/// Performs no I/O.
pub fn compose(ctx: &Context) -> RouteGroup {
    let api_v1 = RouteGroup::new()
        .mount("/users", api_users::router(ctx))
        .mount("/pirgs", api_pirgs::router(ctx));

    RouteGroup::new()
        .mount("/admin", api_admin::router())
        .mount("/api/v1", api_v1)
}
