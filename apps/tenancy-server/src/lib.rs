//! Server assembly: database connection, migrations and the HTTP router.
//!
//! Kept out of `main.rs` so the wiring can be exercised in tests without
//! binding a socket.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use axum::{extract::State, middleware, routing::get, Json, Router};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use serde_json::{json, Value};
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;

use extras::Extras;
use modkit::api::request_id::{create_trace_layer, header as request_id_header, MakeReqId};
use modkit::api::{token_auth, Identity, TokenRegistry};
use modkit::viewset::Paging;
use modkit::{DbModule, RestfulModule};
use runtime::{AppConfig, AuthConfig, DatabaseConfig};
use tenancy::Tenancy;

/// Expand a sqlite DSN into an absolute-path DSN using a base directory.
/// - Keeps "sqlite::memory:" as-is.
/// - Normalizes backslashes into forward slashes (important on Windows).
pub fn absolutize_sqlite_dsn(dsn: &str, base_dir: &Path, create_dirs: bool) -> Result<String> {
    if dsn.eq_ignore_ascii_case("sqlite::memory:") || dsn.eq_ignore_ascii_case("sqlite://:memory:")
    {
        return Ok("sqlite::memory:".to_string());
    }
    let db_path = dsn
        .strip_prefix("sqlite://")
        .ok_or_else(|| anyhow!("DSN must start with sqlite:// (got: {})", dsn))?;

    let (path_str, query) = match db_path.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (db_path, None),
    };

    let mut p = PathBuf::from(path_str);
    if p.as_os_str().is_empty() {
        return Err(anyhow!("Empty SQLite path in DSN"));
    }
    if p.is_relative() {
        p = base_dir.join(p);
    }

    if let Some(dir) = p.parent() {
        if create_dirs {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("cannot create database directory {}", dir.display()))?;
        }
    }

    let mut out = String::from("sqlite://");
    out.push_str(&p.to_string_lossy().replace('\\', "/"));
    if let Some(q) = query {
        out.push('?');
        out.push_str(q);
    }
    Ok(out)
}

/// Backend name for a DSN scheme.
pub fn detect_backend(dsn: &str) -> Result<&'static str> {
    let scheme = dsn
        .trim()
        .split_once(':')
        .map(|(s, _)| s.to_ascii_lowercase())
        .ok_or_else(|| anyhow!("Invalid database DSN '{}'", dsn))?;
    match scheme.as_str() {
        "sqlite" | "sqlite3" => Ok("sqlite"),
        "postgres" | "postgresql" => Ok("postgres"),
        other => Err(anyhow!("Unsupported database type: {}", other)),
    }
}

pub async fn connect(cfg: &DatabaseConfig, base_dir: &Path) -> Result<DatabaseConnection> {
    let raw = cfg.url.trim();
    if raw.is_empty() {
        return Err(anyhow!("Database URL not configured"));
    }
    let backend = detect_backend(raw)?;
    let dsn = if backend == "sqlite" {
        absolutize_sqlite_dsn(raw, base_dir, true)?
    } else {
        raw.to_string()
    };
    // In-memory SQLite lives in one connection.
    let max_conns = if dsn == "sqlite::memory:" {
        1
    } else {
        cfg.max_conns.unwrap_or(10)
    };

    let mut opts = ConnectOptions::new(dsn.clone());
    opts.max_connections(max_conns)
        .acquire_timeout(Duration::from_secs(cfg.acquire_timeout_sec.unwrap_or(5)))
        .sqlx_logging(false);

    tracing::info!(backend, dsn = %dsn, max_conns, "Connecting to database");
    let db = Database::connect(opts)
        .await
        .with_context(|| format!("cannot connect to {dsn}"))?;
    Ok(db)
}

/// Every module owning tables, in dependency order.
fn db_modules() -> Vec<Box<dyn DbModule>> {
    vec![Box::new(Extras), Box::new(Tenancy::default())]
}

fn rest_modules() -> Vec<Box<dyn RestfulModule>> {
    vec![Box::new(Extras), Box::new(Tenancy::default())]
}

pub async fn migrate(db: &DatabaseConnection) -> Result<()> {
    for module in db_modules() {
        module.migrate(db).await?;
    }
    Ok(())
}

/// Token table from the `auth` section.
pub fn token_registry(auth: &AuthConfig) -> TokenRegistry {
    let mut registry = TokenRegistry::new();
    for token in &auth.tokens {
        let mut identity = Identity::user(token.user.clone());
        for (object_type, constraint) in &token.constraints {
            identity = identity.with_constraint(object_type, constraint.clone());
        }
        registry.insert(token.key.clone(), identity);
    }
    registry
}

async fn status(State(db): State<DatabaseConnection>) -> Json<Value> {
    let database = match db.ping().await {
        Ok(()) => "ok",
        Err(e) => {
            tracing::warn!(error = %e, "database ping failed");
            "unavailable"
        }
    };
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "database": database,
    }))
}

/// The full application router with its middleware stack.
pub fn build_router(config: &AppConfig, db: DatabaseConnection) -> Result<Router> {
    let paging = Paging {
        default_limit: config.api.default_page_size,
        max_limit: config.api.max_page_size,
    };
    let env = Arc::new(extras::api_env(db.clone(), paging, config.api.base_url.clone()));

    let mut router = Router::new().route("/api/status/", get(status).with_state(db));
    for module in rest_modules() {
        router = module.register_rest(router, &env)?;
    }

    let tokens = Arc::new(token_registry(&config.auth));
    tracing::info!(tokens = tokens.len(), "API tokens loaded");

    router = router.layer(middleware::from_fn_with_state(tokens, token_auth));
    if config.server.timeout_sec > 0 {
        router = router.layer(TimeoutLayer::new(Duration::from_secs(config.server.timeout_sec)));
    }
    let x_request_id = request_id_header();
    Ok(router
        .layer(create_trace_layer())
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(SetRequestIdLayer::new(x_request_id, MakeReqId)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_dsn_is_made_absolute() {
        let dir = tempfile::tempdir().unwrap();
        let dsn = absolutize_sqlite_dsn("sqlite://db/t.db?mode=rwc", dir.path(), true).unwrap();
        assert!(dsn.starts_with("sqlite://"));
        assert!(dsn.ends_with("db/t.db?mode=rwc"));
        assert!(dir.path().join("db").is_dir());
        assert_eq!(
            absolutize_sqlite_dsn("sqlite://:memory:", dir.path(), false).unwrap(),
            "sqlite::memory:"
        );
    }

    #[test]
    fn backends_are_detected_by_scheme() {
        assert_eq!(detect_backend("sqlite::memory:").unwrap(), "sqlite");
        assert_eq!(detect_backend("postgresql://localhost/x").unwrap(), "postgres");
        assert!(detect_backend("mysql://localhost/x").is_err());
        assert!(detect_backend("nonsense").is_err());
    }
}
