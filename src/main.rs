use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tokio::time::Duration;

use tradeguard::backtest::{BacktestRunner, MarketScenario, SyntheticDataGenerator};
use tradeguard::logging::setup_logging;
use tradeguard::models::Candle;
use tradeguard::strategy::StrategyConfig;
use tradeguard::{Engine, EngineConfig, EngineEvent, EngineHandle};

#[derive(Parser)]
#[command(
    name = "tradeguard",
    about = "Candle-driven signal engine with stop-loss, ROI and protection guards"
)]
struct Cli {
    /// TOML config file, layered under TRADEGUARD__* environment variables
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured rule variant
    /// (trend_crossover, volatility_breakout, mean_reversion, trend_following)
    #[arg(long, global = true)]
    strategy: Option<String>,

    /// Replace [risk] with the variant's own stop-loss, ROI, trailing and ATR stop settings
    #[arg(long, global = true)]
    risk_preset: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct DataArgs {
    /// Synthetic market: uptrend, downtrend, sideways, volatile, gaps, squeeze, crash
    #[arg(long, default_value = "volatile")]
    scenario: MarketScenario,

    /// Comma-separated pairs
    #[arg(long, value_delimiter = ',', default_value = "SOL/USDT,JUP/USDT")]
    pairs: Vec<String>,

    /// Candles per pair
    #[arg(long, default_value_t = 500)]
    candles: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay synthetic candles deterministically and print a report
    Backtest {
        #[command(flatten)]
        data: DataArgs,

        /// Print the report as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Stream synthetic candles through the async engine with a simulated executor
    Paper {
        #[command(flatten)]
        data: DataArgs,

        /// Pause between candle rounds
        #[arg(long, default_value_t = 0)]
        delay_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();

    let mut config = EngineConfig::load(cli.config.as_deref()).context("failed to load config")?;
    if let Some(name) = &cli.strategy {
        config.strategy =
            StrategyConfig::from_name(name).ok_or_else(|| anyhow!("unknown strategy '{}'", name))?;
    }
    if cli.risk_preset {
        config.risk = config.strategy.risk_preset();
    }
    if cli.strategy.is_some() || cli.risk_preset {
        config.validate()?;
    }

    match cli.command {
        Commands::Backtest { data, json } => {
            let candles = generate(&data, config.timeframe_minutes);
            let report = BacktestRunner::new(config).run(candles)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                report.print_summary();
            }
        }
        Commands::Paper { data, delay_ms } => {
            let candles = generate(&data, config.timeframe_minutes);
            run_paper(config, candles, Duration::from_millis(delay_ms)).await?;
        }
    }

    Ok(())
}

fn generate(data: &DataArgs, timeframe_minutes: i64) -> Vec<Candle> {
    let mut generator = SyntheticDataGenerator::new(data.seed);
    let mut candles: Vec<Candle> = data
        .pairs
        .iter()
        .flat_map(|pair| generator.generate(pair, data.scenario, data.candles, timeframe_minutes))
        .collect();
    candles.sort_by_key(|c| c.open_time);
    candles
}

async fn run_paper(config: EngineConfig, candles: Vec<Candle>, delay: Duration) -> Result<()> {
    tracing::info!("🚀 Paper trading {} candles", candles.len());

    let (handle, events) = Engine::start(config)?;
    let executor = tokio::spawn(simulated_execution(handle.clone(), events));

    let feed = async {
        let mut last_open = None;
        for candle in candles {
            if delay > Duration::ZERO && last_open.is_some_and(|t| t != candle.open_time) {
                tokio::time::sleep(delay).await;
            }
            last_open = Some(candle.open_time);
            handle.submit_candle(candle).await?;
        }
        anyhow::Ok(())
    };

    tokio::select! {
        result = feed => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("⚠️  Received Ctrl+C, shutting down...");
        }
    }

    handle.shutdown().await?;
    let stats = executor.await.context("execution task panicked")?;

    tracing::info!(
        "📊 Paper session done: {} entries, {} closes, {} locks, {} rejected candles",
        stats.entries,
        stats.closes,
        stats.locks,
        stats.rejected
    );
    Ok(())
}

#[derive(Default)]
struct PaperStats {
    entries: usize,
    closes: usize,
    locks: usize,
    rejected: usize,
}

/// Fills every entry at the signalled price and books every close
async fn simulated_execution(
    handle: EngineHandle,
    mut events: tokio::sync::mpsc::UnboundedReceiver<EngineEvent>,
) -> PaperStats {
    let mut stats = PaperStats::default();

    while let Some(event) = events.recv().await {
        let sent = match event {
            EngineEvent::Report { pair, report } => {
                let mut sent = Ok(());
                if let Some((id, entry)) = report.entry {
                    tracing::info!(
                        "📈 {} filled {:.4} x{} stake {} ({})",
                        pair,
                        entry.entry_price,
                        entry.leverage,
                        entry.stake,
                        entry.rule_id
                    );
                    stats.entries += 1;
                    sent = handle.acknowledge_entry(&pair, id).await;
                }
                if let Some(outcome) = report.outcome {
                    stats.closes += 1;
                    sent = sent.and(handle.report_outcome(outcome).await);
                }
                sent
            }
            EngineEvent::LocksApplied { pair, locks } => {
                for lock in &locks {
                    tracing::info!(
                        "🔒 {} {:?} locked until {}: {}",
                        pair,
                        lock.scope,
                        lock.until,
                        lock.reason
                    );
                }
                stats.locks += locks.len();
                Ok(())
            }
            EngineEvent::CandleRejected { pair, error } => {
                tracing::warn!("{} candle rejected: {}", pair, error);
                stats.rejected += 1;
                Ok(())
            }
        };

        if let Err(e) = sent {
            tracing::debug!("Engine gone before execution feedback: {}", e);
        }
    }

    stats
}
