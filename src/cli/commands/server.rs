use anyhow::Context;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::{AppConfig, Environment, StoreBackend};
use crate::database::DatabaseManager;
use crate::{app, store, AppState};

/// Open the store, then serve the API until the process is stopped.
pub async fn serve(config: AppConfig, port: Option<u16>) -> anyhow::Result<()> {
    if matches!(config.environment, Environment::Production) && config.security.jwt_secret.is_empty() {
        anyhow::bail!("JWT_SECRET must be set in production");
    }

    tracing::info!("Starting Field Ops API in {:?} mode", config.environment);

    let store = store::open(&config.database).await.context("failed to open store")?;
    let port = port.unwrap_or(config.api.port);
    let state = AppState::new(store, config);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Field Ops API listening on http://{}", bind_addr);
    axum::serve(listener, app(state)).await.context("server error")?;
    Ok(())
}

pub async fn migrate(config: AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    if config.database.backend == StoreBackend::Memory {
        anyhow::bail!("The in-memory store has no schema to migrate");
    }

    let pool = DatabaseManager::connect(&config.database).await?;
    DatabaseManager::migrate(&pool).await?;
    output_success::<()>(output_format, "Migrations applied", None)
}
