use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::EngineError;
use crate::models::{Direction, Session};
use crate::Result;

/// Main configuration structure
///
/// Every section has defaults, so an empty file (or no file) yields the
/// reference parameter set. Environment variables override file values,
/// e.g. `RANGEBREAK__STRATEGY__MINIMUM_RR=1.0`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub strategy: StrategyConfig,
    pub risk: RiskConfig,
    pub sessions: SessionConfig,
    pub broker: BrokerConfig,
    pub backtest: BacktestConfig,
    pub news: NewsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Retracement back into the IDR for the entry, as a fraction of its range
    pub retracement_pct: f64,
    /// IDR std multiple beyond the opposite IDR edge for the stop loss
    pub std_sl: f64,
    /// IDR std multiple beyond the IDR edge for the take profit
    pub std_tp: f64,
    /// Setups with reward:risk below this are discarded
    pub minimum_rr: f64,
    /// Look-back covered by both the DR and the IDR
    pub dr_lookback_minutes: u32,
    /// Aggregation period of the bars feeding the IDR and the phase machine
    pub aggregation_minutes: u32,
    /// Flatten/cancel at the next session's start (true) or the owning session's end (false)
    pub cancel_orders_on_open: bool,
    pub enable_odr_entries: bool,
    pub enable_rdr_entries: bool,
    pub enable_adr_entries: bool,
    pub enable_long_entries: bool,
    pub enable_short_entries: bool,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            retracement_pct: 0.75,
            std_sl: 0.05,
            std_tp: 0.55,
            minimum_rr: 0.7,
            dr_lookback_minutes: 60,
            aggregation_minutes: 5,
            cancel_orders_on_open: true,
            enable_odr_entries: true,
            enable_rdr_entries: true,
            enable_adr_entries: true,
            enable_long_entries: true,
            enable_short_entries: true,
        }
    }
}

impl StrategyConfig {
    /// Window length of the 1-minute DR trackers
    pub fn dr_window(&self) -> usize {
        self.dr_lookback_minutes.max(1) as usize
    }

    /// Window length of the aggregated IDR trackers (same look-back duration)
    pub fn idr_window(&self) -> usize {
        (self.dr_lookback_minutes / self.aggregation_minutes.max(1)).max(1) as usize
    }

    pub fn lookback(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.dr_lookback_minutes))
    }

    pub fn session_enabled(&self, session: Session) -> bool {
        match session {
            Session::Overnight => self.enable_odr_entries,
            Session::Regular => self.enable_rdr_entries,
            Session::After => self.enable_adr_entries,
        }
    }

    pub fn direction_enabled(&self, direction: Direction) -> bool {
        match direction {
            Direction::Long => self.enable_long_entries,
            Direction::Short => self.enable_short_entries,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Fraction of total portfolio value risked per trade
    pub position_max_risk: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            position_max_risk: 0.05,
        }
    }
}

/// Wall-clock window of one session, `HH:MM` in exchange time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionWindowConfig {
    pub start: String,
    pub end: String,
}

impl SessionWindowConfig {
    fn new(start: &str, end: &str) -> Self {
        Self {
            start: start.to_string(),
            end: end.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub overnight: SessionWindowConfig,
    pub regular: SessionWindowConfig,
    pub after: SessionWindowConfig,
    /// Offset of exchange time from UTC, in minutes (0 when bar timestamps
    /// are already in exchange time)
    pub utc_offset_minutes: i32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            overnight: SessionWindowConfig::new("04:00", "08:30"),
            regular: SessionWindowConfig::new("10:30", "16:00"),
            after: SessionWindowConfig::new("20:30", "02:00"),
            utc_offset_minutes: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Root symbol used for synthetic data
    pub symbol: String,
    pub initial_cash: f64,
    /// Initial margin per contract; bounds the maximum order quantity
    pub initial_margin: f64,
    /// Dollar value of one point per contract
    pub contract_multiplier: f64,
    /// Fill market orders at the next bar's open instead of immediately
    pub fill_on_next_bar: bool,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            symbol: "ES".to_string(),
            initial_cash: 10_000_000.0,
            initial_margin: 12_000.0,
            contract_multiplier: 50.0,
            fill_on_next_bar: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Data warm-up before session events are honoured
    pub warmup_minutes: u32,
    /// Contracts at or below this open interest are never selected
    pub min_open_interest: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            warmup_minutes: 24 * 60,
            min_open_interest: 100.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsConfig {
    /// When false every session is allowed to trade
    pub enabled: bool,
    pub calendar_path: Option<String>,
}

impl AppConfig {
    /// Load configuration from an optional file plus `RANGEBREAK__*` environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix("RANGEBREAK")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let app: AppConfig = config.try_deserialize()?;
        app.validate()?;
        Ok(app)
    }

    /// Reject parameter sets the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        let s = &self.strategy;
        if s.minimum_rr <= 0.0 {
            return Err(invalid("strategy.minimum_rr must be > 0"));
        }
        if !(0.0..=1.0).contains(&s.retracement_pct) {
            return Err(invalid("strategy.retracement_pct must be within [0, 1]"));
        }
        if s.std_sl < 0.0 || s.std_tp <= 0.0 {
            return Err(invalid("strategy.std_sl must be >= 0 and strategy.std_tp > 0"));
        }
        if s.dr_lookback_minutes == 0 || s.aggregation_minutes == 0 {
            return Err(invalid("strategy look-back and aggregation must be > 0"));
        }
        if s.dr_lookback_minutes % s.aggregation_minutes != 0 {
            return Err(invalid(
                "strategy.dr_lookback_minutes must be a multiple of strategy.aggregation_minutes",
            ));
        }
        if !(self.risk.position_max_risk > 0.0 && self.risk.position_max_risk < 1.0) {
            return Err(invalid("risk.position_max_risk must be in (0, 1)"));
        }
        if self.broker.initial_cash <= 0.0
            || self.broker.initial_margin <= 0.0
            || self.broker.contract_multiplier <= 0.0
        {
            return Err(invalid("broker cash, margin and multiplier must be > 0"));
        }
        if self.news.enabled && self.news.calendar_path.is_none() {
            return Err(invalid("news.enabled requires news.calendar_path"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> EngineError {
    EngineError::InvalidConfig(msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_reference_parameters() {
        let config = AppConfig::default();
        assert_eq!(config.strategy.retracement_pct, 0.75);
        assert_eq!(config.strategy.std_sl, 0.05);
        assert_eq!(config.strategy.std_tp, 0.55);
        assert_eq!(config.strategy.minimum_rr, 0.7);
        assert_eq!(config.risk.position_max_risk, 0.05);
        assert!(config.strategy.cancel_orders_on_open);
        assert!(!config.news.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_window_lengths_cover_same_duration() {
        let strategy = StrategyConfig::default();
        assert_eq!(strategy.dr_window(), 60);
        assert_eq!(strategy.idr_window(), 12);
    }

    #[test]
    fn test_entry_switches() {
        let strategy = StrategyConfig {
            enable_rdr_entries: false,
            enable_short_entries: false,
            ..StrategyConfig::default()
        };
        assert!(strategy.session_enabled(Session::Overnight));
        assert!(!strategy.session_enabled(Session::Regular));
        assert!(strategy.direction_enabled(Direction::Long));
        assert!(!strategy.direction_enabled(Direction::Short));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.strategy.minimum_rr = 0.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.risk.position_max_risk = 1.5;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.strategy.dr_lookback_minutes = 62;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.news.enabled = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("rangebreak-{}.toml", uuid::Uuid::new_v4()));
        {
            let mut file = std::fs::File::create(&path).unwrap();
            writeln!(file, "[strategy]\nminimum_rr = 1.5\ncancel_orders_on_open = false").unwrap();
            writeln!(file, "[risk]\nposition_max_risk = 0.01").unwrap();
        }

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.strategy.minimum_rr, 1.5);
        assert!(!config.strategy.cancel_orders_on_open);
        assert_eq!(config.risk.position_max_risk, 0.01);
        // untouched sections keep defaults
        assert_eq!(config.strategy.std_tp, 0.55);
        assert_eq!(config.broker.contract_multiplier, 50.0);

        std::fs::remove_file(&path).ok();
    }
}
