use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::broker::{Broker, BrokerError, OrderStatus};
use crate::models::{Candle, Direction, ExitReason, Session};

/// Lifecycle of the single trade a session may take
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    Idle,
    EntryPending,
    Filled,
    Closed,
}

/// The managed position with its protective levels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionState {
    pub symbol: String,
    pub session: Session,
    pub direction: Direction,
    /// Signed contracts; the requested size until the entry fills
    pub quantity: i64,
    /// Proposal entry until the fill, then the broker's fill price
    pub entry_price: f64,
    pub stop: f64,
    pub target: f64,
    pub opened_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    EntryFilled {
        direction: Direction,
        quantity: i64,
        price: f64,
    },
    EntryCancelled,
    Exited {
        reason: ExitReason,
        direction: Direction,
        quantity: i64,
    },
}

/// What a flatten pass actually did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlattenReport {
    /// Signed contracts sent to close the position (0 when flat)
    pub closed_quantity: i64,
    pub cancelled_orders: usize,
}

/// Drives one entry order and the resulting position through
/// `Idle -> EntryPending -> Filled -> Closed`
#[derive(Debug, Clone)]
pub struct OrderManager {
    state: LifecycleState,
    entry_ticket: Option<Uuid>,
    /// Stop or target close order, left working until it fills
    exit_ticket: Option<Uuid>,
    position: Option<PositionState>,
    warming_up: bool,
}

impl Default for OrderManager {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderManager {
    pub fn new() -> Self {
        Self {
            state: LifecycleState::Idle,
            entry_ticket: None,
            exit_ticket: None,
            position: None,
            warming_up: false,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn position(&self) -> Option<&PositionState> {
        self.position.as_ref()
    }

    pub fn entry_ticket(&self) -> Option<Uuid> {
        self.entry_ticket
    }

    pub fn exit_ticket(&self) -> Option<Uuid> {
        self.exit_ticket
    }

    pub fn set_warming_up(&mut self, warming_up: bool) {
        self.warming_up = warming_up;
    }

    pub fn is_warming_up(&self) -> bool {
        self.warming_up
    }

    /// A working entry order or an open position
    pub fn has_exposure(&self) -> bool {
        matches!(
            self.state,
            LifecycleState::EntryPending | LifecycleState::Filled
        )
    }

    /// Submit the entry market order for a sized position
    ///
    /// Moves to Filled when the broker fills immediately, otherwise to
    /// EntryPending until `sync` sees the fill.
    pub fn submit_entry<B: Broker>(
        &mut self,
        broker: &mut B,
        planned: PositionState,
    ) -> Result<LifecycleState, BrokerError> {
        self.guard_warm_up()?;
        if self.has_exposure() {
            return Err(BrokerError::Rejected(format!(
                "entry already working in state {:?}",
                self.state
            )));
        }

        let tag = format!("{} entry", planned.session);
        let ticket = broker.place_market_order(&planned.symbol, planned.quantity, &tag)?;

        let mut position = PositionState {
            quantity: ticket.quantity,
            ..planned
        };
        self.entry_ticket = Some(ticket.id);
        self.exit_ticket = None;

        self.state = match (ticket.status, ticket.fill_price) {
            (OrderStatus::Filled, Some(price)) => {
                position.entry_price = price;
                LifecycleState::Filled
            }
            _ => LifecycleState::EntryPending,
        };

        tracing::info!(
            "🎯 {} {} entry x{} @ {} (sl: {}, tp: {}) -> {:?}",
            position.session,
            position.direction,
            position.quantity,
            position.entry_price,
            position.stop,
            position.target,
            self.state
        );

        self.position = Some(position);
        Ok(self.state)
    }

    /// Pick up broker-side fills or cancellations of a pending entry
    pub fn sync<B: Broker>(&mut self, broker: &B) -> Option<LifecycleEvent> {
        if self.state != LifecycleState::EntryPending {
            return None;
        }
        let id = self.entry_ticket?;
        let ticket = broker.order(id);

        match ticket {
            Some(ticket) if ticket.is_filled() => {
                let position = self.position.as_mut()?;
                position.quantity = ticket.quantity;
                if let Some(price) = ticket.fill_price {
                    position.entry_price = price;
                }
                if let Some(at) = ticket.filled_at {
                    position.opened_at = at;
                }
                self.state = LifecycleState::Filled;
                Some(LifecycleEvent::EntryFilled {
                    direction: position.direction,
                    quantity: position.quantity,
                    price: position.entry_price,
                })
            }
            Some(ticket) if ticket.is_open() => None,
            _ => {
                tracing::warn!("Entry order {} was cancelled before filling", id);
                self.position = None;
                self.state = LifecycleState::Closed;
                Some(LifecycleEvent::EntryCancelled)
            }
        }
    }

    /// Stop and target check for one bar; the stop wins when both are inside
    pub fn check_exits<B: Broker>(
        &mut self,
        broker: &mut B,
        bar: &Candle,
    ) -> Result<Option<LifecycleEvent>, BrokerError> {
        if !self.has_exposure() {
            return Ok(None);
        }
        let Some(position) = self.position.as_ref() else {
            return Ok(None);
        };

        let reason = if bar.brackets(position.stop) {
            ExitReason::StopLoss
        } else if bar.brackets(position.target) {
            ExitReason::TakeProfit
        } else {
            return Ok(None);
        };

        self.guard_warm_up()?;

        if self.state == LifecycleState::EntryPending {
            if let Some(id) = self.entry_ticket {
                broker.cancel_order(id)?;
            }
            tracing::info!(
                "{} level hit before the entry filled, entry cancelled",
                reason.tag()
            );
            self.position = None;
            self.state = LifecycleState::Closed;
            return Ok(Some(LifecycleEvent::EntryCancelled));
        }

        let symbol = position.symbol.clone();
        let session = position.session;
        let direction = position.direction;
        let held = broker.position_quantity(&symbol);
        if held != 0 {
            let ticket =
                broker.place_market_order(&symbol, -held, &format!("{} {}", session, reason.tag()))?;
            if ticket.is_open() {
                self.exit_ticket = Some(ticket.id);
            }
        }

        tracing::info!(
            "{} {} exit: {} x{} @ bar close {}",
            if reason == ExitReason::StopLoss { "🛑" } else { "💰" },
            session,
            reason.tag(),
            held.abs(),
            bar.close
        );

        self.position = None;
        self.state = LifecycleState::Closed;
        if held == 0 {
            tracing::warn!(
                "{} {} hit with no contracts held at the broker, nothing to close",
                session,
                reason.tag()
            );
            return Ok(None);
        }
        Ok(Some(LifecycleEvent::Exited {
            reason,
            direction,
            quantity: held.abs(),
        }))
    }

    /// End-of-session cleanup: cancel working orders, close at market, back to Idle
    ///
    /// A stop or target close that is still working is left to fill and its
    /// quantity counts as already closed.
    ///
    /// # Arguments
    /// * `symbol` - contract to flatten when no managed position names one
    /// * `session` - session whose trade is being closed, used in the order tag
    /// * `reason` - EndOfSession, or EndOfData when the feed runs out
    pub fn flatten_and_cancel<B: Broker>(
        &mut self,
        broker: &mut B,
        symbol: &str,
        session: Session,
        reason: ExitReason,
    ) -> Result<FlattenReport, BrokerError> {
        self.guard_warm_up()?;

        let symbol = self
            .position
            .as_ref()
            .map_or(symbol, |p| p.symbol.as_str())
            .to_string();
        let session = self.position.as_ref().map_or(session, |p| p.session);

        let mut report = FlattenReport::default();
        let mut in_flight = 0;
        for order in broker.open_orders(&symbol) {
            if Some(order.id) == self.exit_ticket {
                tracing::info!("Exit order {} ({}) still working, left to fill", order.id, order.tag);
                in_flight += order.quantity;
                continue;
            }
            tracing::info!("Pending order found, cancelling {} ({})", order.id, order.tag);
            broker.cancel_order(order.id)?;
            report.cancelled_orders += 1;
        }

        let held = broker.position_quantity(&symbol) + in_flight;
        if held != 0 {
            broker.place_market_order(&symbol, -held, &format!("{} {}", session, reason.tag()))?;
            report.closed_quantity = -held;
            tracing::info!("⏰ {} {} exit x{}", session, reason.tag(), held.abs());
        }

        self.position = None;
        self.entry_ticket = None;
        self.state = LifecycleState::Idle;
        Ok(report)
    }

    fn guard_warm_up(&self) -> Result<(), BrokerError> {
        if self.warming_up {
            tracing::warn!("Warming up, no orders should be submitted");
            return Err(BrokerError::WarmingUp);
        }
        Ok(())
    }
}
