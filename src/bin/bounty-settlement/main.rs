//! bounty-settlement operator CLI entry point.

mod cli;

use bounty_settlement::cache::TtlCache;
use bounty_settlement::config::EngineConfig;
use bounty_settlement::event::create_event_channel;
use bounty_settlement::payout::{IdempotencyLedger, PayoutRecord};
use bounty_settlement::registry::{VulnerabilityRecord, VulnerabilityRegistry};
use bounty_settlement::store::JsonFileStore;
use clap::Parser;
use cli::{Cli, Command};
use color_eyre::eyre::eyre;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let subscriber = tracing_subscriber::registry().with(filter);
    if cli.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber.with(fmt::layer().with_writer(std::io::stderr)).init();
    }

    info!("bounty-settlement v{}", env!("CARGO_PKG_VERSION"));

    let config = cli.load_config()?;

    match cli.command {
        Command::Stats => {
            let registry = open_registry(&config).await?;
            print_json(&registry.get_statistics().await?)?;
        }
        Command::History { auditor } => {
            let ledger = open_ledger(&config).await?;
            print_json(&ledger.history(&auditor).await?)?;
        }
        Command::Validate { proof_id } => {
            let ledger = open_ledger(&config).await?;
            print_json(&ledger.validate(&proof_id).await?)?;
        }
        Command::Search(args) => {
            let registry = open_registry(&config).await?;
            print_json(&registry.search_vulnerabilities(&args.into()).await?)?;
        }
        Command::CheckConfig => {
            let problems = config.validate();
            if !problems.is_empty() {
                for problem in &problems {
                    eprintln!("  - {problem}");
                }
                return Err(eyre!("configuration has {} problem(s)", problems.len()));
            }
            println!("Configuration OK");
        }
        Command::InitConfig { path } => {
            config.to_file(&path)?;
            println!("Wrote configuration to {}", path.display());
        }
    }

    Ok(())
}

async fn open_ledger(config: &EngineConfig) -> color_eyre::Result<IdempotencyLedger> {
    let store: JsonFileStore<PayoutRecord> = JsonFileStore::open(config.ledger_path()).await?;
    let cache = TtlCache::with_capacity(
        config.payout.ledger_cache_capacity,
        Duration::from_secs(config.payout.ledger_cache_ttl_secs),
    );
    Ok(IdempotencyLedger::new(Arc::new(store), cache))
}

async fn open_registry(config: &EngineConfig) -> color_eyre::Result<VulnerabilityRegistry> {
    let store: JsonFileStore<VulnerabilityRecord> =
        JsonFileStore::open(config.registry_path()).await?;
    let (events, _) = create_event_channel();
    Ok(VulnerabilityRegistry::new(
        &config.registry,
        Arc::new(store),
        events,
    ))
}

fn print_json<T: Serialize>(value: &T) -> color_eyre::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
