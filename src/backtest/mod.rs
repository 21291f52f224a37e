pub mod loader;
pub mod metrics;
pub mod runner;
pub mod synthetic;

pub use loader::{load_candles_csv, read_candles};
pub use metrics::{BacktestMetrics, ExitBreakdown, TradeRecord};
pub use runner::{BacktestReport, BacktestRunner, BarTally};
pub use synthetic::{MarketScenario, SyntheticDataGenerator};
