use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rangebreak::backtest::{
    load_candles_csv, BacktestReport, BacktestRunner, MarketScenario, SyntheticDataGenerator,
};
use rangebreak::config::AppConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "rangebreak",
    about = "Session range-breakout engine for index futures"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay 1-minute bars from a CSV file.
    Replay {
        /// CSV with timestamp,symbol,open,high,low,close,volume,open_interest.
        #[arg(long)]
        data: PathBuf,

        /// TOML config file. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print the report as JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Run the engine over seeded synthetic bars.
    Synthetic {
        /// trending-up, trending-down, range-bound or volatile.
        #[arg(long, default_value = "volatile")]
        scenario: MarketScenario,

        /// Days of 1-minute bars (the first is warm-up).
        #[arg(long, default_value_t = 5)]
        days: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// TOML config file. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print the report as JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();
    match cli.command {
        Commands::Replay { data, config, json } => {
            let config = load_config(config)?;
            let candles = load_candles_csv(&data, config.backtest.min_open_interest)
                .with_context(|| format!("loading bars from {}", data.display()))?;
            anyhow::ensure!(!candles.is_empty(), "no usable bars in {}", data.display());

            tracing::info!("🚀 Replaying {} bars from {}", candles.len(), data.display());
            let report = run(config, candles).await?;
            render(&report, json)
        }
        Commands::Synthetic {
            scenario,
            days,
            seed,
            config,
            json,
        } => {
            let config = load_config(config)?;
            let candles = SyntheticDataGenerator::new(seed)
                .with_symbol(format!("{}Z3", config.broker.symbol))
                .generate(scenario, days);

            tracing::info!("🚀 Running {} synthetic days ({}, seed {})", days, scenario, seed);
            let report = run(config, candles).await?;
            render(&report, json)
        }
    }
}

fn setup_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rangebreak=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(path: Option<PathBuf>) -> Result<AppConfig> {
    let config = AppConfig::load(path.as_deref()).context("loading configuration")?;
    tracing::info!("\n📊 Configuration:");
    tracing::info!(
        "  Retracement {}, SL {} std, TP {} std, min RR {}",
        config.strategy.retracement_pct,
        config.strategy.std_sl,
        config.strategy.std_tp,
        config.strategy.minimum_rr
    );
    tracing::info!("  Risk per trade: {}%", config.risk.position_max_risk * 100.0);
    tracing::info!(
        "  Flatten on: {}",
        if config.strategy.cancel_orders_on_open {
            "next session open"
        } else {
            "session end"
        }
    );
    Ok(config)
}

async fn run(config: AppConfig, candles: Vec<rangebreak::Candle>) -> Result<BacktestReport> {
    let runner = BacktestRunner::new(config)?;
    tracing::info!("Press Ctrl+C to stop early...");
    let report = runner
        .run_streaming(candles, tokio::signal::ctrl_c())
        .await?;
    Ok(report)
}

fn render(report: &BacktestReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        report.metrics.print_report(&report.stats);
    }
    Ok(())
}
