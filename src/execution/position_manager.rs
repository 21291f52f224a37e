use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{Direction, ExitReason};

/// Net futures position in one contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetPosition {
    pub symbol: String,
    /// Signed contracts
    pub quantity: i64,
    /// Average entry price
    pub entry_price: f64,
    pub opened_at: DateTime<Utc>,
    pub entry_tag: String,
}

impl NetPosition {
    pub fn direction(&self) -> Direction {
        if self.quantity >= 0 {
            Direction::Long
        } else {
            Direction::Short
        }
    }
}

/// A completed round trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub id: Uuid,
    pub symbol: String,
    pub direction: Direction,
    /// Contracts closed, unsigned
    pub quantity: i64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub realized_pnl: f64,
    pub entry_tag: String,
    pub exit_tag: String,
}

impl ClosedTrade {
    pub fn exit_reason(&self) -> Option<ExitReason> {
        ExitReason::from_tag(&self.exit_tag)
    }

    pub fn is_win(&self) -> bool {
        self.realized_pnl > 0.0
    }
}

/// Net positions and realized P&L, fed by broker fills
#[derive(Debug, Clone)]
pub struct PositionBook {
    contract_multiplier: f64,
    positions: HashMap<String, NetPosition>,
    closed: Vec<ClosedTrade>,
    total_pnl: f64,
}

impl PositionBook {
    pub fn new(contract_multiplier: f64) -> Self {
        Self {
            contract_multiplier,
            positions: HashMap::new(),
            closed: Vec::new(),
            total_pnl: 0.0,
        }
    }

    /// Apply a fill; returns the round trip it closed, if any
    ///
    /// # Arguments
    /// * `quantity` - signed contracts, positive buys
    /// * `tag` - order tag, kept on the position or the closed trade
    pub fn apply_fill(
        &mut self,
        symbol: &str,
        quantity: i64,
        price: f64,
        at: DateTime<Utc>,
        tag: &str,
    ) -> Option<ClosedTrade> {
        if quantity == 0 {
            return None;
        }

        let Some(existing) = self.positions.get_mut(symbol) else {
            self.positions.insert(
                symbol.to_string(),
                NetPosition {
                    symbol: symbol.to_string(),
                    quantity,
                    entry_price: price,
                    opened_at: at,
                    entry_tag: tag.to_string(),
                },
            );
            return None;
        };

        if existing.quantity.signum() == quantity.signum() {
            // Adding to the position: average the entry
            let held = existing.quantity.abs() as f64;
            let added = quantity.abs() as f64;
            existing.entry_price = (existing.entry_price * held + price * added) / (held + added);
            existing.quantity += quantity;
            return None;
        }

        let closing = existing.quantity.abs().min(quantity.abs());
        let pnl = (price - existing.entry_price)
            * closing as f64
            * existing.quantity.signum() as f64
            * self.contract_multiplier;

        let trade = ClosedTrade {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            direction: existing.direction(),
            quantity: closing,
            entry_price: existing.entry_price,
            exit_price: price,
            entry_time: existing.opened_at,
            exit_time: at,
            realized_pnl: pnl,
            entry_tag: existing.entry_tag.clone(),
            exit_tag: tag.to_string(),
        };

        let remaining = existing.quantity + quantity;
        if remaining == 0 {
            self.positions.remove(symbol);
        } else if remaining.signum() == existing.quantity.signum() {
            existing.quantity = remaining;
        } else {
            // Flipped through flat: the remainder opens at the fill price
            *existing = NetPosition {
                symbol: symbol.to_string(),
                quantity: remaining,
                entry_price: price,
                opened_at: at,
                entry_tag: tag.to_string(),
            };
        }

        self.total_pnl += pnl;
        tracing::info!(
            "Closed {} {} x{} {} -> {} (P&L: ${:.2})",
            trade.direction,
            symbol,
            closing,
            trade.entry_price,
            price,
            pnl
        );
        self.closed.push(trade.clone());
        Some(trade)
    }

    pub fn position(&self, symbol: &str) -> Option<&NetPosition> {
        self.positions.get(symbol)
    }

    pub fn quantity(&self, symbol: &str) -> i64 {
        self.positions.get(symbol).map_or(0, |p| p.quantity)
    }

    pub fn open_positions(&self) -> impl Iterator<Item = &NetPosition> {
        self.positions.values()
    }

    pub fn closed_trades(&self) -> &[ClosedTrade] {
        &self.closed
    }

    /// Total realized P&L
    pub fn total_pnl(&self) -> f64 {
        self.total_pnl
    }

    /// Mark-to-market P&L of open positions; positions without a mark count as flat
    pub fn unrealized_pnl(&self, marks: &HashMap<String, f64>) -> f64 {
        self.positions
            .values()
            .filter_map(|p| {
                marks
                    .get(&p.symbol)
                    .map(|mark| (mark - p.entry_price) * p.quantity as f64 * self.contract_multiplier)
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn test_open_and_close_long() {
        let mut book = PositionBook::new(50.0);
        assert!(book.apply_fill("ESZ3", 2, 4490.0, now(), "ODR entry").is_none());
        assert_eq!(book.quantity("ESZ3"), 2);

        let trade = book.apply_fill("ESZ3", -2, 4516.0, now(), "ODR TP").unwrap();
        assert_eq!(trade.realized_pnl, 26.0 * 2.0 * 50.0);
        assert_eq!(trade.direction, Direction::Long);
        assert_eq!(trade.exit_reason(), Some(ExitReason::TakeProfit));
        assert_eq!(book.quantity("ESZ3"), 0);
        assert_eq!(book.total_pnl(), 2600.0);
    }

    #[test]
    fn test_short_loss() {
        let mut book = PositionBook::new(50.0);
        book.apply_fill("ESZ3", -3, 4500.0, now(), "RDR entry");
        let trade = book.apply_fill("ESZ3", 3, 4506.0, now(), "RDR SL").unwrap();
        assert_eq!(trade.realized_pnl, -6.0 * 3.0 * 50.0);
        assert!(!trade.is_win());
        assert_eq!(trade.exit_reason(), Some(ExitReason::StopLoss));
    }

    #[test]
    fn test_averaging_and_partial_close() {
        let mut book = PositionBook::new(1.0);
        book.apply_fill("ESZ3", 1, 100.0, now(), "a");
        book.apply_fill("ESZ3", 1, 110.0, now(), "b");
        assert_eq!(book.position("ESZ3").unwrap().entry_price, 105.0);

        let trade = book.apply_fill("ESZ3", -1, 115.0, now(), "c").unwrap();
        assert_eq!(trade.quantity, 1);
        assert_eq!(trade.realized_pnl, 10.0);
        assert_eq!(book.quantity("ESZ3"), 1);
    }

    #[test]
    fn test_flip_opens_remainder() {
        let mut book = PositionBook::new(1.0);
        book.apply_fill("ESZ3", 2, 100.0, now(), "a");
        book.apply_fill("ESZ3", -5, 90.0, now(), "b");
        let position = book.position("ESZ3").unwrap();
        assert_eq!(position.quantity, -3);
        assert_eq!(position.entry_price, 90.0);
        assert_eq!(book.total_pnl(), -20.0);
    }

    #[test]
    fn test_unrealized_pnl() {
        let mut book = PositionBook::new(50.0);
        book.apply_fill("ESZ3", -1, 4500.0, now(), "a");
        let marks = HashMap::from([("ESZ3".to_string(), 4490.0)]);
        assert_eq!(book.unrealized_pnl(&marks), 500.0);
        assert_eq!(book.unrealized_pnl(&HashMap::new()), 0.0);
    }
}
