use crate::error::EngineError;
use crate::models::Candle;
use crate::Result;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::path::Path;

/// One contract's bar as stored on disk
#[derive(Debug, Deserialize)]
struct BarRow {
    timestamp: String,
    symbol: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    open_interest: f64,
}

/// Load 1-minute bars, keeping one contract per timestamp
///
/// # Arguments
/// * `path` - CSV with header `timestamp,symbol,open,high,low,close,volume,open_interest`
/// * `min_open_interest` - contracts at or below this are never selected
///
/// # Returns
/// Bars sorted by timestamp; at each timestamp the contract with the highest
/// open interest wins (first seen on ties)
pub fn load_candles_csv(path: impl AsRef<Path>, min_open_interest: f64) -> Result<Vec<Candle>> {
    let path = path.as_ref();
    let reader = csv::Reader::from_path(path)?;
    let candles = read_candles(reader, min_open_interest)?;
    tracing::info!("📥 Loaded {} bars from {}", candles.len(), path.display());
    Ok(candles)
}

/// Same as [`load_candles_csv`] over any CSV reader
pub fn read_candles<R: std::io::Read>(
    mut reader: csv::Reader<R>,
    min_open_interest: f64,
) -> Result<Vec<Candle>> {
    let mut selected: BTreeMap<DateTime<Utc>, Candle> = BTreeMap::new();
    let mut skipped = 0usize;

    for row in reader.deserialize() {
        let row: BarRow = row?;
        if row.open_interest <= min_open_interest {
            skipped += 1;
            continue;
        }

        let candle = Candle {
            timestamp: parse_timestamp(&row.timestamp)?,
            symbol: row.symbol,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
            open_interest: row.open_interest,
        };

        match selected.entry(candle.timestamp) {
            Entry::Vacant(slot) => {
                slot.insert(candle);
            }
            Entry::Occupied(mut slot) => {
                if candle.open_interest > slot.get().open_interest {
                    slot.insert(candle);
                }
            }
        }
    }

    if skipped > 0 {
        tracing::debug!(
            "Skipped {} rows at or below open interest {}",
            skipped,
            min_open_interest
        );
    }

    Ok(selected.into_values().collect())
}

/// RFC 3339, or `YYYY-MM-DD HH:MM:SS` taken as UTC
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|e| EngineError::InvalidMarketData(format!("bad timestamp '{}': {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
timestamp,symbol,open,high,low,close,volume,open_interest
2023-09-01T04:01:00Z,ESU3,4500.0,4501.0,4499.0,4500.5,900,150000
2023-09-01T04:01:00Z,ESZ3,4520.0,4521.0,4519.0,4520.5,300,90000
2023-09-01T04:02:00Z,ESU3,4500.5,4502.0,4500.0,4501.0,800,150000
2023-09-01T04:02:00Z,ESZ3,4521.0,4522.0,4520.0,4521.5,400,160000
2023-09-01 04:03:00,ESZ3,4521.5,4523.0,4521.0,4522.0,500,160000
2023-09-01T04:04:00Z,ESH4,4540.0,4541.0,4539.0,4540.0,1,50
";

    fn load(data: &str, min_oi: f64) -> Result<Vec<Candle>> {
        read_candles(csv::Reader::from_reader(data.as_bytes()), min_oi)
    }

    #[test]
    fn test_selects_highest_open_interest_per_timestamp() {
        let candles = load(SAMPLE, 100.0).unwrap();

        let symbols: Vec<&str> = candles.iter().map(|c| c.symbol.as_str()).collect();
        // roll from ESU3 to ESZ3 once its open interest is larger
        assert_eq!(symbols, vec!["ESU3", "ESZ3", "ESZ3"]);
        assert_eq!(candles[2].close, 4522.0);
    }

    #[test]
    fn test_thin_contracts_are_dropped() {
        let candles = load(SAMPLE, 100.0).unwrap();
        assert!(candles.iter().all(|c| c.symbol != "ESH4"));

        let everything = load(SAMPLE, 0.0).unwrap();
        assert_eq!(everything.len(), 4);
    }

    #[test]
    fn test_sorted_even_when_input_is_not() {
        let data = "\
timestamp,symbol,open,high,low,close,volume,open_interest
2023-09-01T04:05:00Z,ESZ3,1,1,1,1,1,500
2023-09-01T04:03:00Z,ESZ3,1,1,1,1,1,500
";
        let candles = load(data, 100.0).unwrap();
        assert!(candles[0].timestamp < candles[1].timestamp);
    }

    #[test]
    fn test_bad_timestamp_is_an_error() {
        let data = "\
timestamp,symbol,open,high,low,close,volume,open_interest
yesterday,ESZ3,1,1,1,1,1,500
";
        assert!(matches!(load(data, 100.0), Err(EngineError::InvalidMarketData(_))));
    }
}
