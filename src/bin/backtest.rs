use anyhow::Result;
use rangebreak::backtest::{BacktestReport, BacktestRunner, MarketScenario, SyntheticDataGenerator};
use rangebreak::config::AppConfig;
use std::path::PathBuf;

const DAYS: usize = 10;
const SEED: u64 = 42;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter("rangebreak=warn")
        .init();

    println!("\n╔═══════════════════════════════════════════════════════╗");
    println!("║          RANGEBREAK BACKTESTING SUITE                 ║");
    println!("╚═══════════════════════════════════════════════════════╝");

    // Optional config file as the only argument
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref())?;
    let runner = BacktestRunner::new(config)?;

    let scenarios = [
        (MarketScenario::TrendingUp, "📈 Trending up"),
        (MarketScenario::TrendingDown, "📉 Trending down"),
        (MarketScenario::RangeBound, "↔️  Range bound"),
        (MarketScenario::Volatile, "⚡ Volatile"),
    ];

    let mut all_reports = Vec::new();

    for (scenario, name) in scenarios {
        let candles = SyntheticDataGenerator::new(SEED).generate(scenario, DAYS);

        match runner.run(candles) {
            Ok(report) => {
                println!("\n{}", name);
                report.metrics.print_report(&report.stats);
                all_reports.push((name.to_string(), report));
            }
            Err(e) => {
                eprintln!("❌ Backtest failed for {}: {}", name, e);
            }
        }
    }

    print_summary_comparison(&all_reports);

    Ok(())
}

fn print_summary_comparison(results: &[(String, BacktestReport)]) {
    println!("\n╔═══════════════════════════════════════════════════════╗");
    println!("║              SCENARIO COMPARISON                      ║");
    println!("╚═══════════════════════════════════════════════════════╝\n");

    println!(
        "{:<22} {:>12} {:>9} {:>7} {:>7} {:>5} {:>5} {:>5}",
        "Scenario", "P&L", "Return%", "Trades", "Win%", "SL", "TP", "EOS"
    );
    println!("{}", "─".repeat(80));

    for (name, report) in results {
        let m = &report.metrics;
        println!(
            "{:<22} {:>12.2} {:>9.2} {:>7} {:>7.1} {:>5} {:>5} {:>5}",
            name,
            m.total_pnl,
            m.total_return_pct,
            m.total_trades,
            m.win_rate,
            report.stats.exits_stop_loss,
            report.stats.exits_take_profit,
            report.stats.exits_end_of_session
        );
    }

    println!("\n");
}
