use serde::{Deserialize, Serialize};

use crate::indicators::{round_to_tick, RollingExtremum};
use crate::models::Candle;

/// Half-std bounds around a band: `anchor ± scale / 2`, tick-rounded
///
/// The DR scales by its own range. The IDR is anchored on its own edges but
/// scaled by the DR's range, not the IDR's.
pub fn half_std_bounds(anchor_high: f64, anchor_low: f64, scale_range: f64) -> (f64, f64) {
    (
        round_to_tick(anchor_high + scale_range / 2.0),
        round_to_tick(anchor_low - scale_range / 2.0),
    )
}

/// Session defining range, frozen at session start
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DefiningRange {
    pub high: f64,
    pub low: f64,
    pub range: f64,
    pub mid: f64,
    pub half_std_high: f64,
    pub half_std_low: f64,
}

impl DefiningRange {
    /// Build from raw extremes; every field is tick-rounded
    pub fn from_extremes(high: f64, low: f64) -> Self {
        let high = round_to_tick(high);
        let low = round_to_tick(low);
        let range = round_to_tick(high - low);
        let (half_std_high, half_std_low) = half_std_bounds(high, low, range);
        Self {
            high,
            low,
            range,
            mid: round_to_tick((high + low) / 2.0),
            half_std_high,
            half_std_low,
        }
    }

    /// A non-positive range means missing warm-up data or a flat feed
    pub fn is_degenerate(&self) -> bool {
        self.range <= 0.0
    }
}

/// Session implied defining range (open/close extremes of aggregated bars)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpliedDefiningRange {
    pub high: f64,
    pub low: f64,
    pub range: f64,
    pub mid: f64,
    pub half_std_high: f64,
    pub half_std_low: f64,
}

impl ImpliedDefiningRange {
    /// Build from body extremes; half-std bounds take the DR's range as scale
    pub fn from_extremes(high: f64, low: f64, dr: &DefiningRange) -> Self {
        let high = round_to_tick(high);
        let low = round_to_tick(low);
        let range = round_to_tick(high - low);
        let (half_std_high, half_std_low) = half_std_bounds(high, low, dr.range);
        Self {
            high,
            low,
            range,
            mid: round_to_tick((high + low) / 2.0),
            half_std_high,
            half_std_low,
        }
    }
}

/// DR and IDR frozen for one session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeSnapshot {
    pub dr: DefiningRange,
    pub idr: ImpliedDefiningRange,
}

/// Rolling extremes feeding the session ranges
///
/// The windows are never reset: a session's DR is exactly the trailing
/// look-back ending at the session start.
#[derive(Debug, Clone)]
pub struct RangeTracker {
    dr_max_high: RollingExtremum,
    dr_min_low: RollingExtremum,
    idr_max_open: RollingExtremum,
    idr_max_close: RollingExtremum,
    idr_min_open: RollingExtremum,
    idr_min_close: RollingExtremum,
}

impl RangeTracker {
    /// # Arguments
    /// * `dr_window` - number of 1-minute bars in the DR look-back
    /// * `idr_window` - number of aggregated bars covering the same duration
    pub fn new(dr_window: usize, idr_window: usize) -> Self {
        Self {
            dr_max_high: RollingExtremum::max(dr_window),
            dr_min_low: RollingExtremum::min(dr_window),
            idr_max_open: RollingExtremum::max(idr_window),
            idr_max_close: RollingExtremum::max(idr_window),
            idr_min_open: RollingExtremum::min(idr_window),
            idr_min_close: RollingExtremum::min(idr_window),
        }
    }

    /// Feed a raw 1-minute bar
    pub fn update_minute(&mut self, candle: &Candle) {
        self.dr_max_high.update(candle.high);
        self.dr_min_low.update(candle.low);
    }

    /// Feed a completed aggregated bar
    pub fn update_aggregated(&mut self, candle: &Candle) {
        self.idr_max_open.update(candle.open);
        self.idr_max_close.update(candle.close);
        self.idr_min_open.update(candle.open);
        self.idr_min_close.update(candle.close);
    }

    /// True once both look-backs are full
    pub fn is_ready(&self) -> bool {
        self.dr_max_high.is_ready() && self.idr_max_open.is_ready()
    }

    /// Read and freeze the current extremes
    ///
    /// Returns None until both the 1-minute and aggregated windows hold data.
    pub fn snapshot(&self) -> Option<RangeSnapshot> {
        let dr = DefiningRange::from_extremes(
            self.dr_max_high.current()?,
            self.dr_min_low.current()?,
        );
        let idr_high = self
            .idr_max_open
            .current()?
            .max(self.idr_max_close.current()?);
        let idr_low = self
            .idr_min_open
            .current()?
            .min(self.idr_min_close.current()?);
        let idr = ImpliedDefiningRange::from_extremes(idr_high, idr_low, &dr);

        if !self.is_ready() {
            tracing::debug!(
                "Range snapshot taken before the look-back is full ({} / {} minute bars)",
                self.dr_max_high.len(),
                self.dr_max_high.period()
            );
        }

        Some(RangeSnapshot { dr, idr })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn bar(open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            symbol: "ESZ3".to_string(),
            timestamp: Utc::now(),
            open,
            high,
            low,
            close,
            volume: 10.0,
            open_interest: 500.0,
        }
    }

    #[test]
    fn test_defining_range_fields() {
        let dr = DefiningRange::from_extremes(4500.0, 4490.0);
        assert_eq!(dr.range, 10.0);
        assert_eq!(dr.mid, 4495.0);
        assert_eq!(dr.half_std_high, 4505.0);
        assert_eq!(dr.half_std_low, 4485.0);
        assert!(!dr.is_degenerate());
    }

    #[test]
    fn test_defining_range_rounds_to_tick() {
        let dr = DefiningRange::from_extremes(4500.1, 4489.9);
        assert_eq!(dr.high, 4500.0);
        assert_eq!(dr.low, 4490.0);
        assert_eq!(dr.range, 10.0);
    }

    #[test]
    fn test_idr_half_std_scales_by_dr_range() {
        let dr = DefiningRange::from_extremes(4500.0, 4490.0);
        let idr = ImpliedDefiningRange::from_extremes(4505.0, 4485.0, &dr);
        assert_eq!(idr.range, 20.0);
        // DR range is 10, so the IDR bounds move by 5, not by 10
        assert_eq!(idr.half_std_high, 4510.0);
        assert_eq!(idr.half_std_low, 4480.0);
    }

    #[test]
    fn test_degenerate_range() {
        let dr = DefiningRange::from_extremes(4500.0, 4500.0);
        assert!(dr.is_degenerate());
    }

    #[test]
    fn test_snapshot_requires_data() {
        let mut tracker = RangeTracker::new(3, 2);
        assert!(tracker.snapshot().is_none());

        tracker.update_minute(&bar(1.0, 2.0, 0.5, 1.5));
        // no aggregated bar yet
        assert!(tracker.snapshot().is_none());

        tracker.update_aggregated(&bar(1.0, 2.0, 0.5, 1.5));
        assert!(tracker.snapshot().is_some());
    }

    #[test]
    fn test_snapshot_tracks_trailing_window() {
        let mut tracker = RangeTracker::new(3, 2);
        tracker.update_minute(&bar(4495.0, 4520.0, 4480.0, 4500.0));
        tracker.update_minute(&bar(4495.0, 4505.0, 4490.0, 4500.0));
        tracker.update_minute(&bar(4495.0, 4506.0, 4491.0, 4500.0));
        tracker.update_minute(&bar(4495.0, 4504.0, 4492.0, 4500.0));

        tracker.update_aggregated(&bar(4470.0, 0.0, 0.0, 4470.0));
        tracker.update_aggregated(&bar(4493.0, 0.0, 0.0, 4501.0));
        tracker.update_aggregated(&bar(4502.0, 0.0, 0.0, 4496.0));

        let snapshot = tracker.snapshot().unwrap();
        // first minute bar (4520 / 4480) has been evicted
        assert_eq!(snapshot.dr.high, 4506.0);
        assert_eq!(snapshot.dr.low, 4490.0);
        // first aggregated bar (4470) has been evicted
        assert_eq!(snapshot.idr.high, 4502.0);
        assert_eq!(snapshot.idr.low, 4493.0);
        assert!(tracker.is_ready());
    }
}
