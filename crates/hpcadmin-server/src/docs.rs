//! Route documentation output.

use crate::routes::{RouteDocs, RouteEntry};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while writing route documentation.
#[derive(Debug, Error)]
pub enum DocsError {
    #[error("failed to serialize route documentation: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write route documentation to {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Serialize)]
struct Document<'a> {
    service: &'static str,
    version: &'static str,
    tree: &'a RouteDocs,
    paths: Vec<RouteEntry>,
}

/// Renders the route tree as pretty-printed JSON.
pub fn render_docs(docs: &RouteDocs) -> Result<String, DocsError> {
    let document = Document {
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        tree: docs,
        paths: docs.flatten(),
    };
    Ok(serde_json::to_string_pretty(&document)?)
}

/// Writes the route tree description to `destination`, replacing any
/// existing file.
///
/// # Errors
///
/// Returns `DocsError::Write` if the file cannot be written.
pub fn emit_docs(docs: &RouteDocs, destination: &Path) -> Result<(), DocsError> {
    let rendered = render_docs(docs)?;
    std::fs::write(destination, rendered).map_err(|source| DocsError::Write {
        path: destination.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %destination.display(), "wrote route documentation");
    Ok(())
}

/// Logs one line per route at startup.
pub fn log_routes(docs: &RouteDocs) {
    for route in docs.flatten() {
        tracing::info!(
            methods = %route.methods.join(","),
            path = %route.pattern,
            "route"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::routes::compose;
    use serde_json::Value;

    #[test]
    fn rendered_docs_list_every_mount_point() {
        let group = compose(&Context::background());
        let json: Value = serde_json::from_str(&render_docs(group.docs()).unwrap()).unwrap();

        let paths: Vec<&str> = json["paths"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["pattern"].as_str().unwrap())
            .collect();
        assert!(paths.contains(&"/admin"));
        assert!(paths.contains(&"/api/v1/users"));
        assert!(paths.contains(&"/api/v1/pirgs"));

        assert_eq!(json["tree"]["mounts"][0]["prefix"], "/admin");
        assert_eq!(json["tree"]["mounts"][1]["group"]["mounts"][0]["prefix"], "/users");
    }

    #[test]
    fn users_collection_supports_get_and_post() {
        let group = compose(&Context::background());
        let users = group
            .docs()
            .flatten()
            .into_iter()
            .find(|r| r.pattern == "/api/v1/users")
            .unwrap();
        assert_eq!(users.methods, vec!["GET", "POST"]);
    }

    #[test]
    fn emit_docs_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("routes.json");
        let group = compose(&Context::background());

        emit_docs(group.docs(), &path).unwrap();

        let written: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written["service"], "hpcadmin-server");
    }

    #[test]
    fn emit_docs_reports_unwritable_destination() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("routes.json");
        let err = emit_docs(&RouteDocs::default(), &path).unwrap_err();
        assert!(matches!(err, DocsError::Write { .. }));
    }
}
