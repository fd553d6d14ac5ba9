use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::services::SyncService;
use crate::store;

pub async fn rebuild(config: AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    let store = store::open(&config.database).await?;
    let journeys = SyncService::new(store, config.sync.clone()).rebuild_journeys().await?;

    let message = format!("Rebuilt {} journeys from the op log", journeys);
    output_success(output_format, &message, Some(&json!({ "journeys": journeys })))
}
