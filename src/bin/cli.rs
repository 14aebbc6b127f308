//! offerwatch CLI
//!
//! Intended to be run once a day from a scheduler.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use offerwatch::{
    error::Result,
    models::{Config, Keywords},
    notify::{Notifier, TransportSettings},
    pipeline::{self, RunOptions},
    services::OfferFetcher,
    storage::{CsvMasterStore, DailyExport, OfferStore},
    utils::http,
};

/// offerwatch - job offer watcher
#[derive(Parser, Debug)]
#[command(
    name = "offerwatch",
    version,
    about = "Scrape job offers, record new ones and email a digest"
)]
struct Cli {
    /// Path to storage directory holding config, keywords and CSV files
    #[arg(short, long, default_value = "data", global = true)]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Force a full backfill even if the master store exists
    #[arg(long, global = true)]
    full: bool,

    /// Fetch and diff only: no append, no files, no email
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch, diff, append and notify (default)
    Run,

    /// Validate configuration, keywords and email transport
    Validate,

    /// Show master store info
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Ok(path) = dotenvy::dotenv() {
        log::debug!("Loaded environment from {}", path.display());
    }

    let config_path = cli.storage_dir.join("config.toml");
    let config = Config::load_or_default(&config_path)?;
    if let Err(e) = config.validate() {
        log::error!("Config validation failed: {}", e);
        return Err(e);
    }

    let keywords = Keywords::load_or_default(config.keywords_path(&cli.storage_dir))?;
    let settings = TransportSettings::from_env()?;
    let store = CsvMasterStore::new(config.master_path(&cli.storage_dir));

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let client = http::create_client(&config.fetcher)?;
            let notifier = Notifier::from_settings(settings.as_ref(), client.clone(), &config)?;
            if !notifier.is_enabled() {
                log::warn!("No email transport configured, new offers are only recorded");
            }
            let export = DailyExport::new(&cli.storage_dir, &config.paths.daily_prefix);
            let config = Arc::new(config);
            let fetcher = OfferFetcher::new(Arc::clone(&config), client)?;

            let options = RunOptions {
                force_full: cli.full,
                dry_run: cli.dry_run,
            };
            let report = pipeline::run_scrape(
                &config, &keywords, &store, &fetcher, &notifier, &export, options,
            )
            .await?;

            if report.page_failures > 0 {
                log::warn!("{} page request(s) failed during this run", report.page_failures);
            }
        }

        Command::Validate => {
            log::info!("✓ Config OK ({})", config_path.display());
            log::info!("✓ {} keyword(s): {:?}", keywords.len(), keywords);
            match &settings {
                Some(settings) => log::info!("✓ Email transport: {:?}", settings),
                None => log::warn!("No email transport configured, notifications disabled"),
            }
            log::info!("All validations passed!");
        }

        Command::Info => {
            log::info!("Storage directory: {}", cli.storage_dir.display());
            log::info!("Master store: {}", store.location());

            if store.exists().await? {
                let offers = store.load().await?;
                log::info!("Recorded offers: {}", offers.len());
                match offers.last() {
                    Some(last) => log::info!("Last first_seen: {}", last.first_seen),
                    None => log::info!("Master store is empty."),
                }
            } else {
                log::info!("No master store yet, next run is a full backfill.");
            }
        }
    }

    Ok(())
}
