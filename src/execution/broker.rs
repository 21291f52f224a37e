use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Candle, Direction};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BrokerError {
    #[error("Warming up, no orders may be submitted")]
    WarmingUp,

    #[error("Order not found: {0}")]
    OrderNotFound(Uuid),

    #[error("Order rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Submitted,
    Filled,
    Canceled,
}

/// Broker-side view of a market order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderTicket {
    pub id: Uuid,
    pub symbol: String,
    /// Signed contracts: positive buys, negative sells
    pub quantity: i64,
    pub status: OrderStatus,
    pub fill_price: Option<f64>,
    pub submitted_at: DateTime<Utc>,
    pub filled_at: Option<DateTime<Utc>>,
    pub tag: String,
}

impl OrderTicket {
    pub fn is_open(&self) -> bool {
        self.status == OrderStatus::Submitted
    }

    pub fn is_filled(&self) -> bool {
        self.status == OrderStatus::Filled
    }
}

/// Order routing seam
pub trait Broker {
    /// Called with every bar before the engine looks at it
    fn update_market(&mut self, _bar: &Candle) {}

    fn place_market_order(
        &mut self,
        symbol: &str,
        quantity: i64,
        tag: &str,
    ) -> Result<OrderTicket, BrokerError>;

    fn cancel_order(&mut self, id: Uuid) -> Result<OrderTicket, BrokerError>;

    fn open_orders(&self, symbol: &str) -> Vec<OrderTicket>;

    fn order(&self, id: Uuid) -> Option<OrderTicket>;

    /// Signed net contracts held
    fn position_quantity(&self, symbol: &str) -> i64;
}

/// Account and margin seam
pub trait Account {
    fn total_portfolio_value(&self) -> f64;

    /// Buying-power ceiling, signed like `direction`
    fn max_order_quantity(&self, symbol: &str, direction: Direction) -> i64;

    /// Dollar value of a one-point move for one contract
    fn contract_tick_value(&self, symbol: &str) -> f64;
}
