//! Catalog archive CLI
//!
//! Runs the crawl loop together with the read API, or performs one-off
//! crawls and inspections of the backup directory.

use std::path::PathBuf;
use std::sync::Arc;

use catalog_archive::{
    error::{AppError, Result},
    models::Config,
    server,
    services::{CatalogService, CrawlOrchestrator, HttpSourceClient, SourceClient},
    storage::LocalStorage,
};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinError;

/// Catalog archive - incremental backups of a native function catalog
#[derive(Parser, Debug)]
#[command(
    name = "catalog-archive",
    version,
    about = "Incremental backup service for a native function catalog"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the crawl loop and serve the read API
    Serve {
        /// Override the bind address (host:port)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Crawl once, write one backup record, and exit
    Crawl,

    /// Show backup history info
    Info,

    /// Validate the configuration file
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Wire the HTTP source, orchestrator and local store into a service.
fn build_service(config: &Config, shutdown: watch::Receiver<bool>) -> Result<Arc<CatalogService>> {
    let source: Arc<dyn SourceClient> = Arc::new(HttpSourceClient::new(&config.source)?);
    let orchestrator = CrawlOrchestrator::new(
        source,
        config.source.namespaces.clone(),
        config.pacing.clone(),
    )
    .with_shutdown(shutdown);
    let store = Arc::new(LocalStorage::new(&config.service.storage_dir));

    Ok(Arc::new(CatalogService::new(
        orchestrator,
        store,
        config.service.cooldown(),
    )))
}

fn join_error(error: JoinError) -> AppError {
    AppError::Io(std::io::Error::other(error))
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load_or_default(&cli.config);
    log::info!("Loaded configuration from {}", cli.config.display());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    match cli.command {
        Command::Serve { bind } => {
            config.validate()?;
            let service = build_service(&config, shutdown_rx.clone())?;

            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            let listener = TcpListener::bind(&bind).await?;
            let api = tokio::spawn(server::serve(
                listener,
                Arc::clone(&service),
                shutdown_rx.clone(),
            ));

            let mut worker = {
                let service = Arc::clone(&service);
                let shutdown = shutdown_rx.clone();
                tokio::spawn(async move {
                    let startup = service.init().await?;
                    log::info!("Startup: {startup:?}");
                    service.run(startup, shutdown).await;
                    Ok::<(), AppError>(())
                })
            };

            let finished = tokio::select! {
                signal = tokio::signal::ctrl_c() => {
                    signal?;
                    log::info!("Shutdown requested");
                    None
                }
                joined = &mut worker => Some(joined),
            };

            shutdown_tx.send_replace(true);
            let joined = match finished {
                Some(joined) => joined,
                None => worker.await,
            };
            joined.map_err(join_error)??;
            api.await.map_err(join_error)??;
        }

        Command::Crawl => {
            config.validate()?;
            let service = build_service(&config, shutdown_rx)?;
            service.restore().await?;

            let record = service.crawl_once().await?;
            log::info!(
                "Backup record {} written ({:?})",
                record.path().display(),
                record.kind()
            );
        }

        Command::Info => {
            let service = build_service(&config, shutdown_rx)?;
            let count = service.restore().await?;

            log::info!(
                "Storage directory: {}",
                config.service.storage_dir.display()
            );
            log::info!("Backup records: {count}");

            let records = service.records().await;
            if let (Some(first), Some(last)) = (records.first(), records.last()) {
                log::info!("First capture: {}", first.captured_at());
                log::info!("Last capture: {}", last.captured_at());
            }

            match service.latest() {
                Some(latest) => {
                    for (namespace, entries) in &latest.namespaces {
                        log::info!("  {namespace}: {} entries", entries.len());
                    }
                    log::info!("Total entries: {}", latest.item_count());
                }
                None => log::info!("No backup found yet."),
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!(
                "✓ Config OK ({} namespaces, storage in {})",
                config.source.namespaces.len(),
                config.service.storage_dir.display()
            );
        }
    }

    log::info!("Done!");

    Ok(())
}
