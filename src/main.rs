use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lsranks_sync::{
    config::Config,
    database::Database,
    ingestor::{SchedulerService, SyncOrchestrator, SyncRequest, SyncStateManager},
    sources::HttpFetcher,
    web::{AppState, WebServer},
};

#[derive(Parser)]
#[command(name = "lsranks-sync")]
#[command(version)]
#[command(about = "Scrapes lifesaving world record tables and keeps a normalised record store in sync")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Database URL (overrides config file)
    #[arg(short = 'd', long, value_name = "URL")]
    database_url: Option<String>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    /// Run one sync, print its summary as JSON and exit
    #[arg(long)]
    once: bool,

    /// With --once: include sample records in the summary
    #[arg(long, requires = "once")]
    debug_samples: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = if cli.log_level == "trace" {
        format!("lsranks_sync={},tower_http=trace", cli.log_level)
    } else {
        format!("lsranks_sync={}", cli.log_level)
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting lsranks-sync v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load(&cli.config)?;
    info!("Configuration loaded from: {}", cli.config);

    if let Some(host) = cli.host {
        config.web.host = host;
    }
    if let Some(port) = cli.port {
        config.web.port = port;
    }
    if let Some(database_url) = cli.database_url {
        config.database.url = database_url;
    }

    info!("Using database: {}", config.database.url);
    let database = Database::new(&config.database).await?;
    database.migrate().await?;
    info!("Database connection established and migrations applied");

    let fetcher = Arc::new(HttpFetcher::from_config(&config.sync));
    let orchestrator = SyncOrchestrator::new(
        config.clone(),
        fetcher,
        Arc::new(database.clone()),
        SyncStateManager::new(),
    )
    .with_run_log(Arc::new(database.clone()));

    if cli.once {
        let summary = orchestrator.run(SyncRequest::cli(cli.debug_samples)).await?;
        println!("{}", serde_json::to_string_pretty(&summary)?);
        if !summary.ok {
            std::process::exit(2);
        }
        return Ok(());
    }

    if let Some(expression) = config.sync.schedule.as_deref().filter(|s| !s.trim().is_empty()) {
        let scheduler = SchedulerService::new(
            orchestrator.clone(),
            database.clone(),
            expression,
            config.sync.run_missed_immediately,
        )?;
        tokio::spawn(async move {
            if let Err(e) = scheduler.start().await {
                error!("Scheduler service failed: {}", e);
            }
        });
    } else {
        info!("No sync schedule configured; runs are triggered over HTTP only");
    }

    let web_server = WebServer::new(
        &config.web,
        AppState {
            database,
            orchestrator,
        },
    )?;

    info!(
        "Starting web server on {}:{}",
        web_server.host(),
        web_server.port()
    );
    web_server.serve().await?;

    Ok(())
}
