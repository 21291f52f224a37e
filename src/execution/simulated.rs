use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use super::broker::{Account, Broker, BrokerError, OrderStatus, OrderTicket};
use super::position_manager::PositionBook;
use crate::config::BrokerConfig;
use crate::models::{Candle, Direction};

/// In-process futures broker for backtests
///
/// Market orders fill at the last close of their contract, or at the next
/// bar's open when `fill_on_next_bar` is set. Buying power is cash over
/// initial margin per contract.
#[derive(Debug, Clone)]
pub struct SimulatedBroker {
    initial_cash: f64,
    initial_margin: f64,
    contract_multiplier: f64,
    fill_on_next_bar: bool,
    marks: HashMap<String, f64>,
    clock: Option<DateTime<Utc>>,
    orders: Vec<OrderTicket>,
    book: PositionBook,
}

impl SimulatedBroker {
    pub fn new(config: &BrokerConfig) -> Self {
        Self {
            initial_cash: config.initial_cash,
            initial_margin: config.initial_margin,
            contract_multiplier: config.contract_multiplier,
            fill_on_next_bar: config.fill_on_next_bar,
            marks: HashMap::new(),
            clock: None,
            orders: Vec::new(),
            book: PositionBook::new(config.contract_multiplier),
        }
    }

    pub fn book(&self) -> &PositionBook {
        &self.book
    }

    /// Every order ever submitted, in submission order
    pub fn orders(&self) -> &[OrderTicket] {
        &self.orders
    }

    pub fn mark(&self, symbol: &str) -> Option<f64> {
        self.marks.get(symbol).copied()
    }

    pub fn initial_cash(&self) -> f64 {
        self.initial_cash
    }

    /// Fill every working order at its contract's last mark
    ///
    /// Ends a run with nothing left pending when orders wait for a next bar
    /// that never comes. Returns how many orders were filled.
    pub fn settle_open_orders(&mut self) -> usize {
        let Some(now) = self.clock else {
            return 0;
        };
        let pending: Vec<(usize, f64)> = self
            .orders
            .iter()
            .enumerate()
            .filter(|(_, o)| o.is_open())
            .filter_map(|(i, o)| self.marks.get(&o.symbol).map(|mark| (i, *mark)))
            .collect();
        for &(index, mark) in &pending {
            self.fill(index, mark, now);
        }
        pending.len()
    }

    fn fill(&mut self, index: usize, price: f64, at: DateTime<Utc>) {
        let ticket = &mut self.orders[index];
        ticket.status = OrderStatus::Filled;
        ticket.fill_price = Some(price);
        ticket.filled_at = Some(at);

        tracing::debug!(
            "Filled {} x{} {} @ {} ({})",
            ticket.symbol,
            ticket.quantity,
            ticket.id,
            price,
            ticket.tag
        );

        let (symbol, quantity, tag) = (ticket.symbol.clone(), ticket.quantity, ticket.tag.clone());
        self.book.apply_fill(&symbol, quantity, price, at, &tag);
    }

    fn find(&self, id: Uuid) -> Option<usize> {
        self.orders.iter().position(|o| o.id == id)
    }
}

impl Broker for SimulatedBroker {
    fn update_market(&mut self, bar: &Candle) {
        self.clock = Some(bar.timestamp);

        if self.fill_on_next_bar {
            let pending: Vec<usize> = self
                .orders
                .iter()
                .enumerate()
                .filter(|(_, o)| o.is_open() && o.symbol == bar.symbol)
                .map(|(i, _)| i)
                .collect();
            for index in pending {
                self.fill(index, bar.open, bar.timestamp);
            }
        }

        self.marks.insert(bar.symbol.clone(), bar.close);
    }

    fn place_market_order(
        &mut self,
        symbol: &str,
        quantity: i64,
        tag: &str,
    ) -> Result<OrderTicket, BrokerError> {
        if quantity == 0 {
            return Err(BrokerError::Rejected("zero quantity".to_string()));
        }
        let (Some(mark), Some(now)) = (self.mark(symbol), self.clock) else {
            return Err(BrokerError::Rejected(format!("no market for {}", symbol)));
        };

        self.orders.push(OrderTicket {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            quantity,
            status: OrderStatus::Submitted,
            fill_price: None,
            submitted_at: now,
            filled_at: None,
            tag: tag.to_string(),
        });
        let index = self.orders.len() - 1;

        if !self.fill_on_next_bar {
            self.fill(index, mark, now);
        }

        Ok(self.orders[index].clone())
    }

    fn cancel_order(&mut self, id: Uuid) -> Result<OrderTicket, BrokerError> {
        let index = self.find(id).ok_or(BrokerError::OrderNotFound(id))?;
        let ticket = &mut self.orders[index];
        if !ticket.is_open() {
            return Err(BrokerError::Rejected(format!(
                "order {} is already {:?}",
                id, ticket.status
            )));
        }
        ticket.status = OrderStatus::Canceled;
        Ok(ticket.clone())
    }

    fn open_orders(&self, symbol: &str) -> Vec<OrderTicket> {
        self.orders
            .iter()
            .filter(|o| o.is_open() && o.symbol == symbol)
            .cloned()
            .collect()
    }

    fn order(&self, id: Uuid) -> Option<OrderTicket> {
        self.orders.iter().find(|o| o.id == id).cloned()
    }

    fn position_quantity(&self, symbol: &str) -> i64 {
        self.book.quantity(symbol)
    }
}

impl Account for SimulatedBroker {
    fn total_portfolio_value(&self) -> f64 {
        self.initial_cash + self.book.total_pnl() + self.book.unrealized_pnl(&self.marks)
    }

    fn max_order_quantity(&self, symbol: &str, direction: Direction) -> i64 {
        let used = self.book.quantity(symbol).abs() as f64 * self.initial_margin;
        let free = self.total_portfolio_value() - used;
        let contracts = (free / self.initial_margin).floor();
        if contracts.is_finite() && contracts > 0.0 {
            contracts as i64 * direction.sign()
        } else {
            0
        }
    }

    fn contract_tick_value(&self, _symbol: &str) -> f64 {
        self.contract_multiplier
    }
}
