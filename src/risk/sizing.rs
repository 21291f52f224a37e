use serde::{Deserialize, Serialize};

use crate::models::Direction;

/// How the sizer arrived at its contract count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SizingOutcome {
    /// The account's maximum quantity fits the risk budget
    Full,
    /// Shrunk below the maximum to fit the risk budget
    Reduced,
    /// Not even one contract fits; the trade is cancelled
    RiskBudgetExhausted,
    /// The account's maximum quantity points the wrong way; forced to zero
    SignMismatch,
}

/// Inputs to a sizing decision
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingRequest {
    pub direction: Direction,
    pub entry: f64,
    pub stop: f64,
    pub account_value: f64,
    /// Fraction of account value risked on the trade
    pub risk_fraction: f64,
    /// Dollar value of one point for one contract
    pub tick_value: f64,
    /// Signed buying-power ceiling from the account
    pub max_order_quantity: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeDecision {
    /// Signed like the direction, or zero
    pub contracts: i64,
    pub outcome: SizingOutcome,
}

impl SizeDecision {
    fn zero(outcome: SizingOutcome) -> Self {
        Self {
            contracts: 0,
            outcome,
        }
    }
}

/// Largest contract count whose stop-loss exposure stays within the risk budget
///
/// Equivalent to starting at the account maximum and shrinking by one
/// contract while `contracts * tick_value * sl_range > cash_risk`.
pub fn size_position(request: &SizingRequest) -> SizeDecision {
    let direction = request.direction;
    let max_order = request.max_order_quantity;

    if max_order != 0 && max_order.signum() != direction.sign() {
        tracing::error!(
            "❌ Sizing fault: max order quantity {} disagrees with {} direction, forcing size to 0",
            max_order,
            direction
        );
        return SizeDecision::zero(SizingOutcome::SignMismatch);
    }

    let max_contracts = max_order.abs();
    if max_contracts == 0 {
        tracing::warn!("No buying power for a {} position, trade cancelled", direction);
        return SizeDecision::zero(SizingOutcome::RiskBudgetExhausted);
    }

    let cash_risk = request.account_value * request.risk_fraction;
    let sl_range = (request.entry - request.stop) * direction.signum();
    let per_contract = request.tick_value * sl_range;

    // A stop on the wrong side never exceeds the budget, so the maximum stands
    if !(per_contract > 0.0) {
        tracing::warn!(
            "Non-positive stop distance {} for {} entry {}, using max quantity {}",
            sl_range,
            direction,
            request.entry,
            max_contracts
        );
        return SizeDecision {
            contracts: max_contracts * direction.sign(),
            outcome: SizingOutcome::Full,
        };
    }

    let estimate = (cash_risk / per_contract).floor();
    let mut contracts = if estimate.is_finite() && estimate > 0.0 {
        estimate.min(max_contracts as f64) as i64
    } else {
        0
    };

    // Float division can land one off the exact boundary
    while contracts > 0 && contracts as f64 * per_contract > cash_risk {
        contracts -= 1;
    }
    while contracts < max_contracts && (contracts + 1) as f64 * per_contract <= cash_risk {
        contracts += 1;
    }

    let outcome = if contracts == 0 {
        tracing::warn!(
            "{} position cancelled: one contract risks ${:.2}, budget is ${:.2}",
            direction,
            per_contract,
            cash_risk
        );
        SizingOutcome::RiskBudgetExhausted
    } else if contracts == max_contracts {
        SizingOutcome::Full
    } else {
        SizingOutcome::Reduced
    };

    tracing::debug!(
        "Sized {} entry {} stop {}: {} contracts (max {}, risk ${:.2} of ${:.2})",
        direction,
        request.entry,
        request.stop,
        contracts,
        max_contracts,
        contracts as f64 * per_contract,
        cash_risk
    );

    SizeDecision {
        contracts: contracts * direction.sign(),
        outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(account_value: f64, max_order_quantity: i64) -> SizingRequest {
        SizingRequest {
            direction: Direction::Long,
            entry: 4490.0,
            stop: 4484.0,
            account_value,
            risk_fraction: 0.05,
            tick_value: 50.0,
            max_order_quantity,
        }
    }

    #[test]
    fn test_budget_covers_max_quantity() {
        // 100 * 50 * 6 = 30,000 <= 50,000
        let decision = size_position(&request(1_000_000.0, 100));
        assert_eq!(decision.contracts, 100);
        assert_eq!(decision.outcome, SizingOutcome::Full);
    }

    #[test]
    fn test_budget_shrinks_quantity() {
        // cash risk 10,000 at 300 per contract
        let decision = size_position(&request(200_000.0, 100));
        assert_eq!(decision.contracts, 33);
        assert_eq!(decision.outcome, SizingOutcome::Reduced);
    }

    #[test]
    fn test_exact_boundary_is_kept() {
        // 30 * 300 = 9,000 == budget: strict comparison keeps it
        let decision = size_position(&request(180_000.0, 100));
        assert_eq!(decision.contracts, 30);
    }

    #[test]
    fn test_short_is_negative() {
        let decision = size_position(&SizingRequest {
            direction: Direction::Short,
            entry: 4500.0,
            stop: 4506.0,
            ..request(200_000.0, -100)
        });
        assert_eq!(decision.contracts, -33);
    }

    #[test]
    fn test_budget_exhausted() {
        let decision = size_position(&request(1_000.0, 100));
        assert_eq!(decision.contracts, 0);
        assert_eq!(decision.outcome, SizingOutcome::RiskBudgetExhausted);
    }

    #[test]
    fn test_sign_mismatch_forces_zero() {
        let decision = size_position(&request(1_000_000.0, -100));
        assert_eq!(decision, SizeDecision::zero(SizingOutcome::SignMismatch));
    }

    #[test]
    fn test_no_buying_power() {
        let decision = size_position(&request(1_000_000.0, 0));
        assert_eq!(decision.contracts, 0);
        assert_eq!(decision.outcome, SizingOutcome::RiskBudgetExhausted);
    }

    #[test]
    fn test_inverted_stop_keeps_max() {
        let decision = size_position(&SizingRequest {
            stop: 4495.0,
            ..request(1_000.0, 7)
        });
        assert_eq!(decision.contracts, 7);
    }
}
