use anyhow::{Context, Result};
use dbfleet::cli::actions::ingest::IngestAction;
use dbfleet::config::IngestionConfig;
use dbfleet::ingest;
use dbfleet::scheduler::shutdown::CancelToken;

#[tokio::main]
async fn main() -> Result<()> {
    let IngestAction::Run { config_path, once } = dbfleet::cli::start_ingest()?;

    let config = IngestionConfig::load(&config_path)
        .await
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    tracing::info!(config = %config.masked_summary(), "starting ingestion");

    if once {
        let report = ingest::run_once(&config).await?;
        tracing::info!(
            discovered = report.discovered,
            written = report.written,
            failures = report.parse_failures,
            "ingestion pass complete"
        );
        if report.parse_failures > 0 && report.written == 0 && report.discovered > 0 {
            std::process::exit(1);
        }
    } else {
        let token = CancelToken::new();
        token.spawn_watcher();
        ingest::run_continuous(&config, &token).await;
    }

    Ok(())
}
