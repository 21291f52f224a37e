use chrono::{DateTime, Duration, Utc};

use crate::models::Candle;

/// Folds 1-minute bars into fixed-interval bars
///
/// Bars are stamped at their close instant, so a 1-minute bar stamped
/// 10:05 belongs to the 10:00-10:05 bucket and completes it. A bucket whose
/// closing minute is missing is emitted when the next bucket starts.
#[derive(Debug, Clone)]
pub struct CandleAggregator {
    interval_secs: i64,
    bucket_start: Option<i64>,
    partial: Option<Candle>,
}

impl CandleAggregator {
    /// # Arguments
    /// * `minutes` - aggregation period, e.g. 5 for 5-minute bars
    pub fn new(minutes: u32) -> Self {
        Self {
            interval_secs: i64::from(minutes.max(1)) * 60,
            bucket_start: None,
            partial: None,
        }
    }

    pub fn interval_secs(&self) -> i64 {
        self.interval_secs
    }

    /// Add a 1-minute bar; returns every aggregated bar it completed
    pub fn push(&mut self, bar: &Candle) -> Vec<Candle> {
        let mut completed = Vec::new();

        let opened_at = (bar.timestamp - Duration::minutes(1)).timestamp();
        let bucket = opened_at.div_euclid(self.interval_secs) * self.interval_secs;
        let bucket_end = bucket + self.interval_secs;

        if self.bucket_start.is_some_and(|start| start != bucket) {
            if let Some(stale) = self.flush() {
                tracing::debug!("Emitting incomplete bucket ending {}", stale.timestamp);
                completed.push(stale);
            }
        }

        let close_time = DateTime::<Utc>::from_timestamp(bucket_end, 0).unwrap_or(bar.timestamp);
        match self.partial.as_mut() {
            Some(partial) => {
                partial.symbol.clone_from(&bar.symbol);
                partial.high = partial.high.max(bar.high);
                partial.low = partial.low.min(bar.low);
                partial.close = bar.close;
                partial.volume += bar.volume;
                partial.open_interest = bar.open_interest;
            }
            None => {
                self.bucket_start = Some(bucket);
                self.partial = Some(Candle {
                    timestamp: close_time,
                    ..bar.clone()
                });
            }
        }

        if bar.timestamp.timestamp() == bucket_end {
            if let Some(done) = self.flush() {
                completed.push(done);
            }
        }

        completed
    }

    /// Take the bucket in progress, if any
    pub fn flush(&mut self) -> Option<Candle> {
        self.bucket_start = None;
        self.partial.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn minute(h: u32, m: u32, open: f64, close: f64) -> Candle {
        Candle {
            symbol: "ESZ3".to_string(),
            timestamp: Utc.with_ymd_and_hms(2023, 9, 1, h, m, 0).unwrap(),
            open,
            high: open.max(close) + 0.5,
            low: open.min(close) - 0.5,
            close,
            volume: 10.0,
            open_interest: 500.0,
        }
    }

    #[test]
    fn test_five_bars_make_one() {
        let mut agg = CandleAggregator::new(5);
        assert!(agg.push(&minute(10, 1, 100.0, 101.0)).is_empty());
        assert!(agg.push(&minute(10, 2, 101.0, 103.0)).is_empty());
        assert!(agg.push(&minute(10, 3, 103.0, 99.0)).is_empty());
        assert!(agg.push(&minute(10, 4, 99.0, 100.0)).is_empty());
        let out = agg.push(&minute(10, 5, 100.0, 102.0));

        assert_eq!(out.len(), 1);
        let bar = &out[0];
        assert_eq!(bar.timestamp, Utc.with_ymd_and_hms(2023, 9, 1, 10, 5, 0).unwrap());
        assert_eq!(bar.open, 100.0);
        assert_eq!(bar.close, 102.0);
        assert_eq!(bar.high, 103.5);
        assert_eq!(bar.low, 98.5);
        assert_eq!(bar.volume, 50.0);
    }

    #[test]
    fn test_bar_on_boundary_closes_previous_bucket() {
        let mut agg = CandleAggregator::new(5);
        // 10:05 closes 10:00-10:05; 10:06 opens the next bucket
        agg.push(&minute(10, 5, 100.0, 101.0));
        let out = agg.push(&minute(10, 6, 101.0, 102.0));
        assert!(out.is_empty());
    }

    #[test]
    fn test_gap_flushes_incomplete_bucket() {
        let mut agg = CandleAggregator::new(5);
        agg.push(&minute(10, 1, 100.0, 101.0));
        agg.push(&minute(10, 2, 101.0, 102.0));
        // 10:03..10:05 missing
        let out = agg.push(&minute(10, 7, 105.0, 106.0));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].close, 102.0);
        assert_eq!(out[0].timestamp, Utc.with_ymd_and_hms(2023, 9, 1, 10, 5, 0).unwrap());

        let rest = agg.flush().unwrap();
        assert_eq!(rest.open, 105.0);
        assert!(agg.flush().is_none());
    }
}
