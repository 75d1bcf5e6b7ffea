//! eBay Repricer - Main Entry Point
//!
//! Loads a catalog snapshot, wires the engine to the HTTP pricing gateway and
//! runs one item or every active listing once.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use ebay_repricer::config::load_config;
use ebay_repricer::{
    CatalogSnapshot, Collaborators, CompetitorFeed, ConfigStore, HttpGateway, ManualCompetitorStore, StrategyExecutor, SystemClock,
};

/// CLI arguments for the application
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long)]
    log_level: Option<String>,

    /// JSON catalog with strategies, rules, listings and manual competitors
    #[arg(long, env = "REPRICER_CATALOG")]
    catalog: String,

    /// Where to write the updated catalog; defaults to the --catalog path
    #[arg(long)]
    save: Option<String>,

    /// Do not write execution history and refreshed prices back
    #[arg(long)]
    read_only: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reprice a single listing
    Execute {
        /// eBay item id
        #[arg(long)]
        item: String,
    },
    /// Reprice every listing bound to an active strategy
    ExecuteAll,
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let config = load_config(Some(&args.config)).context("loading configuration")?;

    let level = parse_level(args.log_level.as_deref().unwrap_or(&config.settings.log_level));
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting eBay repricer");
    info!("Configuration file: {}", args.config);

    let snapshot = CatalogSnapshot::load(&args.catalog)
        .with_context(|| format!("loading catalog {}", args.catalog))?;

    let clock = Arc::new(SystemClock);
    let store = Arc::new(
        ConfigStore::with_clock(clock.clone()).with_history_limit(config.engine.execution_history_limit),
    );
    store.import(&snapshot).await?;

    let competitors = Arc::new(ManualCompetitorStore::with_clock(clock.clone()));
    for list in snapshot.manual_competitors {
        competitors.insert_list(list).await;
    }

    let gateway = Arc::new(HttpGateway::from_config(&config.gateway)?);
    let executor = StrategyExecutor::new(
        Collaborators {
            lookup: store.clone(),
            gateway: gateway.clone(),
            competitors: competitors.clone(),
            feed: Some(gateway as Arc<dyn CompetitorFeed>),
            sink: store.clone(),
        },
        &config.engine,
        clock,
    );

    let output = match args.command {
        Command::Execute { item } => serde_json::to_string_pretty(&executor.execute_for_item(&item).await?)?,
        Command::ExecuteAll => serde_json::to_string_pretty(&executor.execute_all_active().await?)?,
    };
    println!("{}", output);

    if !args.read_only {
        let path = args.save.as_deref().unwrap_or(&args.catalog);
        CatalogSnapshot::capture(&store, &competitors)
            .await
            .save(path)
            .with_context(|| format!("saving catalog {}", path))?;
        info!("Saved catalog to {}", path);
    }

    Ok(())
}
