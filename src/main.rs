use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::time::{Duration, MissedTickBehavior};
use tracing::{error, info, warn};

use equipment_monitor::config::Config;
use equipment_monitor::model::{self, bootstrap::SyntheticTrainingData};
use equipment_monitor::monitor::Monitor;
use equipment_monitor::publisher::Publisher;
use equipment_monitor::source;

#[derive(Parser, Debug)]
#[command(name = "equipment-monitor", about = "Near-real-time equipment health monitor")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "monitor.toml")]
    config: PathBuf,

    /// Validate config and exit
    #[arg(long)]
    check: bool,

    /// Print version and exit
    #[arg(short, long)]
    version: bool,

    /// Stop after this many ticks
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    ticks: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("equipment-monitor {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Load configuration
    let config = Config::load(&cli.config)?;

    if cli.check {
        println!("Configuration is valid.");
        return Ok(());
    }

    init_logging(&config)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        machine = %config.agent.machine_id,
        "Starting equipment monitor"
    );

    if let Err(e) = run(config, cli.ticks).await {
        error!(error = %e, "Monitor terminated with error");
        return Err(e);
    }

    Ok(())
}

fn init_logging(config: &Config) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.agent.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .try_init()
        .map_err(|e| anyhow!("failed to initialize logging: {}", e))
}

async fn run(config: Config, max_ticks: Option<u64>) -> Result<()> {
    // Classifier first: no tick runs until one exists
    let model_config = config.model.clone();
    let model = tokio::task::spawn_blocking(move || {
        let mut provider = SyntheticTrainingData::new(model_config.seed, model_config.label_noise);
        model::load_or_bootstrap(&model_config, &mut provider)
    })
    .await
    .context("classifier initialization task failed")??;

    info!(
        model = model.classifier.name(),
        origin = %model.origin,
        labels = model.classifier.labels().len(),
        "Classifier ready"
    );

    let source = source::create_source(&config.source)?;
    let mut publisher = Publisher::new(&config.publish).await?;
    let mut monitor = Monitor::new(&config, source, model);

    let mut interval = tokio::time::interval(Duration::from_secs(config.monitor.interval_secs));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut attempted = 0u64;
    loop {
        tokio::select! {
            _ = interval.tick() => {}
            res = &mut shutdown => {
                res.context("failed to listen for shutdown signal")?;
                info!("Received shutdown signal, exiting");
                break;
            }
        }

        match monitor.tick().await {
            Ok(snapshot) => publisher.dispatch(&snapshot).await,
            Err(e) => warn!(error = %e, "Tick aborted, previous snapshot retained"),
        }

        attempted += 1;
        if max_ticks.is_some_and(|n| attempted >= n) {
            info!(ticks = attempted, completed = monitor.ticks(), "Tick limit reached, exiting");
            break;
        }
    }

    Ok(())
}
