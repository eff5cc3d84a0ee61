//! Hej server: the GraphQL API and the frontend

use anyhow::Result;
use tokio::net::TcpListener;

use hej::config::Config;
use hej::graceful_shutdown;
use hej::server::setup_app;
use hej::server::setup_environment;
use hej::server::setup_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    setup_environment();
    setup_tracing();

    let config = Config::from_env()?;
    tracing::info!("Using database {}", config.database);

    let app = setup_app(&config).await?;

    let listener = TcpListener::bind(config.address).await?;
    tracing::info!("Listening on {}", config.address);

    axum::serve(listener, app)
        .with_graceful_shutdown(graceful_shutdown::handler())
        .await?;

    Ok(())
}
