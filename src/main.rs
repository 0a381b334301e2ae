use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use keenetic_geosite_sync::{HttpFetcher, NdmcRouter, RunOutcome, SyncConfig, sync};

#[derive(Parser)]
#[command(name = "geosite-sync")]
#[command(about = "Sync Keenetic DNS-routing object-groups with geosite domain lists")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// JSON config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Apply the commands instead of printing them
    #[arg(long, global = true)]
    apply: bool,

    /// Name prefix of managed object-groups
    #[arg(long, global = true)]
    prefix: Option<String>,

    /// Route managed groups through this interface
    #[arg(long, global = true)]
    interface: Option<String>,

    /// Maximum domains per object-group
    #[arg(long, global = true)]
    max_entries: Option<usize>,

    /// Domain-list source root
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Read the running config from a file instead of the router
    #[arg(long, global = true)]
    running_config: Option<PathBuf>,

    /// Seed description used when no managed group exists (repeatable)
    #[arg(long = "init", global = true)]
    initial_domains: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile managed groups with their domain lists (default)
    Sync,
    /// Remove every managed group and route
    Drop,
}

/// Diagnostics go to stderr; stdout carries the report and commands.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "keenetic_geosite_sync=info".into()),
    );
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(cli: &Cli) -> anyhow::Result<SyncConfig> {
    let mut config = match &cli.config {
        Some(path) => SyncConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => SyncConfig::default(),
    };

    if cli.apply {
        config.dry_run = false;
    }
    if let Some(prefix) = &cli.prefix {
        config.prefix.clone_from(prefix);
    }
    if let Some(interface) = &cli.interface {
        config.route_interface = Some(interface.clone());
    }
    if let Some(max) = cli.max_entries {
        config.max_entries_per_group = max;
    }
    if let Some(base_url) = &cli.base_url {
        config.base_url.clone_from(base_url);
    }
    if let Some(path) = &cli.running_config {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read running config {}", path.display()))?;
        config.running_config_text = Some(text);
    }
    if !cli.initial_domains.is_empty() {
        config.initial_domains.clone_from(&cli.initial_domains);
    }

    config.validate()?;
    Ok(config)
}

fn print_outcome(outcome: &RunOutcome) {
    print!("{}", outcome.plan.report);
    if !outcome.applied {
        for line in outcome.plan.command_lines() {
            println!("{line}");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = load_config(&cli)?;
    let router = NdmcRouter::new();

    let outcome = match cli.command.unwrap_or(Commands::Sync) {
        Commands::Sync => {
            let fetcher = HttpFetcher::new()?;
            sync::run(&config, &fetcher, &router).await?
        }
        Commands::Drop => sync::drop_all(&config, &router).await?,
    };

    print_outcome(&outcome);
    if outcome.applied {
        tracing::info!(
            commands = outcome.plan.commands.len(),
            "Router configuration updated"
        );
    }
    Ok(())
}
