//! Server setup for `hejd`

use std::path::Path;

use anyhow::Result;
use axum::Extension;
use axum::Router;
use tower_http::services::ServeDir;
use tower_http::services::ServeFile;
use tower_http::trace::TraceLayer;
use tracing_subscriber::prelude::*;

use crate::api::NotesSchema;
use crate::api::SessionKey;
use crate::api::build_schema;
use crate::api::router;
use crate::config::Config;
use crate::database::migrate;

const DEFAULT_RUST_LOG: &str = "hej=debug,tower_http=debug";

/// Load an optional `.env` file into the environment
pub fn setup_environment() {
    dotenvy::dotenv().ok();
}

/// Log to stdout, filtered by `RUST_LOG`
pub fn setup_tracing() {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::registry;

    registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_RUST_LOG.into()),
        ))
        .with(fmt::layer())
        .init();
}

/// Create and setup the app with its dependencies
///
/// # Errors
///
/// Will return `Err` if any of its dependencies fail to load:
/// - Session key
/// - Database migration
pub async fn setup_app(config: &Config) -> Result<Router> {
    let session_key = SessionKey::new(config.require_session_key()?);

    let applied = migrate(&config.database).await?;
    if !applied.is_empty() {
        tracing::info!("Applied migrations {applied:?} to {}", config.database);
    }

    let schema = build_schema(config.database.clone(), session_key);

    Ok(create_router(schema, &config.static_dir))
}

/// Create the router for Hej
///
/// Everything outside of the API comes from the static directory, unknown paths get the
/// `index.html` so the frontend can handle its own routes.
pub fn create_router(schema: NotesSchema, static_dir: &Path) -> Router {
    let static_files =
        ServeDir::new(static_dir).fallback(ServeFile::new(static_dir.join("index.html")));

    router()
        .fallback_service(static_files)
        .layer(TraceLayer::new_for_http())
        .layer(Extension(schema))
}
