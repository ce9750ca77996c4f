use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;

use wavebot::api::KrakenClient;
use wavebot::config::{self, BotConfig};
use wavebot::execution::Coordinator;

#[derive(Parser)]
#[command(name = "wavebot", about = "Signal-driven Kraken trading bot")]
struct Args {
    /// Path to a TOML config file (defaults to ./wavebot.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let args = Args::parse();
    let cfg = config::load(args.config.as_deref()).context("loading configuration")?;
    let credentials = config::credentials_from_env().context("reading API credentials")?;

    tracing::info!("🚀 wavebot starting");
    log_configuration(&cfg);

    let exchange = Arc::new(
        KrakenClient::new(&cfg.exchange, credentials.api_key, credentials.api_secret)
            .context("building exchange client")?,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut tasks = Vec::with_capacity(cfg.loops.len());
    for loop_config in &cfg.loops {
        let coordinator = Coordinator::new(
            exchange.clone(),
            loop_config.strategy.build(),
            loop_config.clone(),
            cfg.trade_volume,
            cfg.fee_rate,
            cfg.backoff,
        );
        tasks.push(tokio::spawn(coordinator.run(shutdown_rx.clone())));
    }
    drop(shutdown_rx);

    tracing::info!("✅ {} loop(s) spawned, press Ctrl+C to stop", tasks.len());

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    tracing::info!("⚠️  Received Ctrl+C, shutting down...");

    // Loops finish their in-flight cycle (bounded by the client timeout)
    // before exiting.
    let _ = shutdown_tx.send(true);
    for task in tasks {
        let _ = task.await;
    }

    tracing::info!("👋 wavebot stopped");
    Ok(())
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wavebot=info".into()),
        )
        .init();
}

fn log_configuration(cfg: &BotConfig) {
    tracing::info!("📊 Configuration:");
    tracing::info!("  Trade volume: {}", cfg.trade_volume);
    tracing::info!("  Fee rate: {}%", cfg.fee_rate * 100.0);
    tracing::info!("  Exchange: {}", cfg.exchange.base_url);
    for loop_config in &cfg.loops {
        tracing::info!(
            "  Loop: {} @ {}m ({:?})",
            loop_config.pair,
            loop_config.interval_minutes,
            loop_config.strategy
        );
    }
}
