use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// OHLC bar for a single futures contract
///
/// `timestamp` is the bar's close instant. A 1-minute bar stamped 10:05
/// covers 10:04-10:05.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(default)]
    pub open_interest: f64,
}

impl Candle {
    /// True when `price` lies strictly inside the bar's low/high
    pub fn brackets(&self, price: f64) -> bool {
        self.low < price && price < self.high
    }
}

/// Trade direction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1 for long, -1 for short
    pub fn sign(self) -> i64 {
        match self {
            Direction::Long => 1,
            Direction::Short => -1,
        }
    }

    pub fn signum(self) -> f64 {
        self.sign() as f64
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "long"),
            Direction::Short => write!(f, "short"),
        }
    }
}

/// The three daily trading sessions
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Session {
    /// Overnight defining range (ODR)
    Overnight,
    /// Regular defining range (RDR)
    Regular,
    /// After-hours defining range (ADR), wraps past midnight
    After,
}

impl Session {
    pub const ALL: [Session; 3] = [Session::Overnight, Session::Regular, Session::After];

    /// Short tag used in logs and order tags
    pub fn code(self) -> &'static str {
        match self {
            Session::Overnight => "ODR",
            Session::Regular => "RDR",
            Session::After => "ADR",
        }
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Why a position was closed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    EndOfSession,
    EndOfData,
}

impl ExitReason {
    pub fn tag(self) -> &'static str {
        match self {
            ExitReason::StopLoss => "SL",
            ExitReason::TakeProfit => "TP",
            ExitReason::EndOfSession => "EOS",
            ExitReason::EndOfData => "EOD",
        }
    }

    /// Parse the reason from an order tag ending in its short code, e.g. `"ODR SL"`
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.split_whitespace().last()? {
            "SL" => Some(ExitReason::StopLoss),
            "TP" => Some(ExitReason::TakeProfit),
            "EOS" => Some(ExitReason::EndOfSession),
            "EOD" => Some(ExitReason::EndOfData),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(low: f64, high: f64) -> Candle {
        Candle {
            symbol: "ESZ3".to_string(),
            timestamp: Utc::now(),
            open: low,
            high,
            low,
            close: high,
            volume: 100.0,
            open_interest: 1_000.0,
        }
    }

    #[test]
    fn test_direction_sign() {
        assert_eq!(Direction::Long.sign(), 1);
        assert_eq!(Direction::Short.sign(), -1);
        assert_eq!(Direction::Long.opposite(), Direction::Short);
    }

    #[test]
    fn test_brackets_is_strict() {
        let bar = candle(4488.0, 4496.0);
        assert!(bar.brackets(4490.0));
        assert!(!bar.brackets(4488.0));
        assert!(!bar.brackets(4496.0));
        assert!(!bar.brackets(4500.0));
    }

    #[test]
    fn test_session_codes() {
        assert_eq!(Session::Overnight.to_string(), "ODR");
        assert_eq!(Session::Regular.code(), "RDR");
        assert_eq!(Session::After.code(), "ADR");
    }

    #[test]
    fn test_exit_reason_from_tag() {
        assert_eq!(ExitReason::from_tag("ODR SL"), Some(ExitReason::StopLoss));
        assert_eq!(ExitReason::from_tag("ADR EOS"), Some(ExitReason::EndOfSession));
        assert_eq!(ExitReason::from_tag("RDR entry"), None);
        assert_eq!(ExitReason::from_tag(""), None);
    }
}
