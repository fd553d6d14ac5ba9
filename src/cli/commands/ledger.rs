use uuid::Uuid;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::policy::PointsPolicy;
use crate::services::LedgerService;
use crate::store;

pub async fn reconcile(config: AppConfig, mason: Option<Uuid>, output_format: OutputFormat) -> anyhow::Result<()> {
    let store = store::open(&config.database).await?;
    let service = LedgerService::new(store, PointsPolicy::new(config.points.clone()));

    let reports = match mason {
        Some(id) => match service.reconcile(id).await? {
            Some(report) => vec![report],
            None => anyhow::bail!("Mason {} not found", id),
        },
        None => service.reconcile_all().await?,
    };

    let corrected = reports.iter().filter(|r| r.corrected).count();
    if let OutputFormat::Text = output_format {
        for report in reports.iter().filter(|r| r.corrected) {
            println!(
                "  {}: balance {} -> {}, bags {} -> {}",
                report.mason_id, report.cached_balance, report.ledger_balance, report.cached_bags, report.approved_bags
            );
        }
    }

    let message = format!("Reconciled {} accounts, {} corrected", reports.len(), corrected);
    output_success(output_format, &message, Some(&reports))
}
