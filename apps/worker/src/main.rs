use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use logger::init_tracing;
use upcheck_worker::config::{Config, NotifierKind};
use upcheck_worker::monitoring::{
    HttpProber, LogRotator, MonitoringScheduler, OutcomeLogger, OutcomeProcessor,
};
use upcheck_worker::notifier::{LogNotifier, Notifier, TwilioCredentials, TwilioNotifier};
use upcheck_worker::storage::{FileLogStore, FileStore};

#[derive(Debug, Parser)]
#[command(version, about = "Probes configured checks and alerts owners when they go up or down")]
struct Cli {
    /// Path to the config file (defaults to $XDG_CONFIG_HOME/upcheck/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Run a single probe cycle and a single log rotation, then exit
    #[arg(long)]
    once: bool,
}

fn build_notifier(config: &Config) -> Result<Arc<dyn Notifier>> {
    let notifier: Arc<dyn Notifier> = match config.notifier.kind {
        NotifierKind::Log => Arc::new(LogNotifier),
        NotifierKind::Twilio => {
            let settings = &config.notifier;
            let credentials = TwilioCredentials {
                account_sid: settings.account_sid.clone().context("missing account_sid")?,
                auth_token: settings.auth_token.clone().context("missing auth_token")?,
                from_phone: settings.from_phone.clone().context("missing from_phone")?,
            };
            let api_base =
                settings.api_base.as_deref().unwrap_or(TwilioNotifier::DEFAULT_API_BASE);
            Arc::new(TwilioNotifier::new(api_base, credentials))
        }
    };
    Ok(notifier)
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_config(cli.config.as_ref()).context("failed to load config")?;

    if cli.print_config {
        print!("{config}");
        return Ok(());
    }

    let store = Arc::new(FileStore::new(&config.worker.data_dir));
    let logger = Arc::new(OutcomeLogger::new(Arc::new(FileLogStore::new(&config.worker.logs_dir))));
    let prober = Arc::new(HttpProber::new().context("failed to build HTTP client")?);
    let processor = Arc::new(OutcomeProcessor::new(
        store.clone(),
        logger.clone(),
        build_notifier(&config)?,
        config.worker.checks_category.clone(),
    ));
    let rotator = Arc::new(LogRotator::new(logger));
    let scheduler = Arc::new(MonitoringScheduler::new(
        store,
        prober,
        processor,
        rotator.clone(),
        config.scheduler(),
    ));

    if cli.once {
        let probed = scheduler.run_probe_cycle().await;
        let report = rotator.rotate_all().await;
        info!(probed, archived = report.archived(), "single pass finished");
        return Ok(());
    }

    let handle = scheduler.start();
    tokio::signal::ctrl_c().await.context("failed to listen for shutdown signal")?;
    info!("shutdown requested");
    handle.shutdown().await;

    Ok(())
}
