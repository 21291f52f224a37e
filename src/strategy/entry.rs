use serde::{Deserialize, Serialize};

use super::range::ImpliedDefiningRange;
use crate::config::StrategyConfig;
use crate::models::Direction;

/// Entry, stop and target for one session direction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeProposal {
    pub direction: Direction,
    pub entry: f64,
    pub stop: f64,
    pub target: f64,
}

impl TradeProposal {
    /// Stop distance and target distance, signed so both are positive for a sane trade
    pub fn ranges(&self) -> (f64, f64) {
        trade_ranges(self.entry, self.stop, self.target, self.direction)
    }

    pub fn reward_risk(&self) -> Option<f64> {
        let (sl_range, tp_range) = self.ranges();
        if sl_range == 0.0 || tp_range == 0.0 {
            None
        } else {
            Some(tp_range / sl_range)
        }
    }
}

/// Level multipliers applied to the IDR
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryModel {
    pub retracement_pct: f64,
    pub std_sl: f64,
    pub std_tp: f64,
    pub minimum_rr: f64,
}

impl Default for EntryModel {
    fn default() -> Self {
        Self::from_config(&StrategyConfig::default())
    }
}

impl EntryModel {
    pub fn from_config(config: &StrategyConfig) -> Self {
        Self {
            retracement_pct: config.retracement_pct,
            std_sl: config.std_sl,
            std_tp: config.std_tp,
            minimum_rr: config.minimum_rr,
        }
    }

    /// Levels for a direction off the IDR snapshot
    ///
    /// Pure in its inputs: calling it again with the same IDR yields the same
    /// prices bit for bit, which the fill path relies on.
    pub fn levels(&self, direction: Direction, idr: &ImpliedDefiningRange) -> TradeProposal {
        let r = idr.range;
        match direction {
            Direction::Long => TradeProposal {
                direction,
                entry: idr.high - r * self.retracement_pct,
                stop: idr.low - r * self.std_sl,
                target: idr.high + r * self.std_tp,
            },
            Direction::Short => TradeProposal {
                direction,
                entry: idr.low + r * self.retracement_pct,
                stop: idr.high + r * self.std_sl,
                target: idr.low - r * self.std_tp,
            },
        }
    }

    /// Compute the levels and gate them on reward:risk
    ///
    /// Returns None when the proposal is rejected.
    pub fn propose(&self, direction: Direction, idr: &ImpliedDefiningRange) -> Option<TradeProposal> {
        let proposal = self.levels(direction, idr);
        if verify_rr(
            proposal.entry,
            proposal.stop,
            proposal.target,
            direction,
            self.minimum_rr,
        ) {
            Some(proposal)
        } else {
            None
        }
    }
}

fn trade_ranges(entry: f64, stop: f64, target: f64, direction: Direction) -> (f64, f64) {
    match direction {
        Direction::Long => (entry - stop, target - entry),
        Direction::Short => (stop - entry, entry - target),
    }
}

/// Reward:risk gate
///
/// Rejects a zero stop distance, a zero target distance, or a ratio below
/// `minimum_rr`. No side effects beyond logging.
pub fn verify_rr(entry: f64, stop: f64, target: f64, direction: Direction, minimum_rr: f64) -> bool {
    let (sl_range, tp_range) = trade_ranges(entry, stop, target, direction);

    if sl_range == 0.0 || tp_range == 0.0 {
        tracing::debug!(
            "RR check failed for {}: zero range (slr: {}, tpr: {})",
            direction,
            sl_range,
            tp_range
        );
        return false;
    }

    let ratio = tp_range / sl_range;
    let accepted = ratio >= minimum_rr;

    tracing::debug!(
        "Checking RR: {:.3}, minRR: {}, direction: {}, entry: {}, sl: {}, tp: {} -> {}",
        ratio,
        minimum_rr,
        direction,
        entry,
        stop,
        target,
        accepted
    );

    accepted
}
