use crate::indicators::round_to_tick;
use crate::models::Candle;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Market scenario types for synthetic data generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketScenario {
    /// Steady uptrend with noise (about +70 points a day)
    TrendingUp,
    /// Steady downtrend with noise (about -70 points a day)
    TrendingDown,
    /// Choppy market pulled back toward the starting price
    RangeBound,
    /// Large swings and occasional jumps
    Volatile,
}

impl MarketScenario {
    pub const ALL: [MarketScenario; 4] = [
        MarketScenario::TrendingUp,
        MarketScenario::TrendingDown,
        MarketScenario::RangeBound,
        MarketScenario::Volatile,
    ];
}

impl fmt::Display for MarketScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MarketScenario::TrendingUp => "trending-up",
            MarketScenario::TrendingDown => "trending-down",
            MarketScenario::RangeBound => "range-bound",
            MarketScenario::Volatile => "volatile",
        };
        f.write_str(name)
    }
}

impl FromStr for MarketScenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MarketScenario::ALL
            .into_iter()
            .find(|scenario| scenario.to_string() == s.to_ascii_lowercase())
            .ok_or_else(|| format!("unknown scenario '{}'", s))
    }
}

const MINUTES_PER_DAY: usize = 24 * 60;

/// Generates seeded 1-minute futures bars for backtesting
pub struct SyntheticDataGenerator {
    rng: StdRng,
    symbol: String,
    base_price: f64,
    base_volume: f64,
    start: DateTime<Utc>,
}

impl SyntheticDataGenerator {
    /// Create a new generator with a seed for reproducibility
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            symbol: "ESZ3".to_string(),
            base_price: 4500.0,
            base_volume: 1_500.0,
            start: Utc
                .with_ymd_and_hms(2023, 9, 4, 0, 0, 0)
                .single()
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        }
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = symbol.into();
        self
    }

    pub fn with_start(mut self, start: DateTime<Utc>) -> Self {
        self.start = start;
        self
    }

    pub fn base_price(&self) -> f64 {
        self.base_price
    }

    /// Generate bars for a specific market scenario
    ///
    /// # Arguments
    /// * `scenario` - The market scenario to simulate
    /// * `days` - Whole days of continuous 1-minute bars
    ///
    /// # Returns
    /// Bars stamped at their close, starting one minute after midnight UTC
    pub fn generate(&mut self, scenario: MarketScenario, days: usize) -> Vec<Candle> {
        let num_bars = days * MINUTES_PER_DAY;

        match scenario {
            MarketScenario::TrendingUp => self.generate_trend(num_bars, 0.05),
            MarketScenario::TrendingDown => self.generate_trend(num_bars, -0.05),
            MarketScenario::RangeBound => self.generate_range_bound(num_bars),
            MarketScenario::Volatile => self.generate_volatile(num_bars),
        }
    }

    /// Random walk with constant drift (points per minute)
    fn generate_trend(&mut self, num_bars: usize, drift: f64) -> Vec<Candle> {
        let mut candles = Vec::with_capacity(num_bars);
        let mut price = self.base_price;

        for i in 0..num_bars {
            let open = price;
            price += drift + self.rng.gen_range(-1.0..1.0);
            candles.push(self.create_candle(i, open, price, 0.75));
        }

        candles
    }

    /// Mean reversion toward the base price plus noise
    fn generate_range_bound(&mut self, num_bars: usize) -> Vec<Candle> {
        let mut candles = Vec::with_capacity(num_bars);
        let mut price = self.base_price;

        for i in 0..num_bars {
            let open = price;
            let reversion = (self.base_price - price) * 0.02;
            price += reversion + self.rng.gen_range(-1.0..1.0);
            candles.push(self.create_candle(i, open, price, 0.75));
        }

        candles
    }

    /// Wide noise with a 1% chance of a 10-25 point jump each minute
    fn generate_volatile(&mut self, num_bars: usize) -> Vec<Candle> {
        let mut candles = Vec::with_capacity(num_bars);
        let mut price = self.base_price;
        let floor = self.base_price * 0.5;

        for i in 0..num_bars {
            let open = price;
            let reversion = (self.base_price - price) * 0.002;
            let mut change = reversion + self.rng.gen_range(-3.0..3.0);
            if self.rng.gen_bool(0.01) {
                let jump = self.rng.gen_range(10.0..25.0);
                change += if self.rng.gen_bool(0.5) { jump } else { -jump };
            }
            price = (price + change).max(floor);
            candles.push(self.create_candle(i, open, price, 2.0));
        }

        candles
    }

    /// Build a tick-aligned bar around an open/close pair
    fn create_candle(&mut self, index: usize, open: f64, close: f64, wick: f64) -> Candle {
        let open = round_to_tick(open);
        let close = round_to_tick(close);
        let high = round_to_tick(open.max(close) + self.rng.gen_range(0.0..wick));
        let low = round_to_tick(open.min(close) - self.rng.gen_range(0.0..wick));

        // Vary volume ±30%
        let volume = (self.base_volume * self.rng.gen_range(0.7..1.3)).round();

        Candle {
            symbol: self.symbol.clone(),
            timestamp: self.start + Duration::minutes(index as i64 + 1),
            open,
            high,
            low,
            close,
            volume,
            open_interest: 250_000.0,
        }
    }
}
