// Event-driven session engine
pub mod aggregator;
pub mod events;

pub use aggregator::CandleAggregator;
pub use events::{EngineEvent, EventSequencer};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{AppConfig, RiskConfig, StrategyConfig};
use crate::error::EngineError;
use crate::execution::{
    Account, Broker, BrokerError, LifecycleEvent, OrderManager, PositionState,
};
use crate::models::{Candle, Direction, ExitReason, Session};
use crate::risk::{size_position, SizingOutcome, SizingRequest};
use crate::strategy::{
    DailyRanges, EntryModel, EntryModelOutcome, NewsCalendar, PhaseTransition, RangeTracker,
    SessionContext, SessionSchedule,
};
use crate::Result;

/// Counters over the whole run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    pub sessions_opened: u64,
    pub total_entries: u64,
    pub exits_stop_loss: u64,
    pub exits_take_profit: u64,
    pub exits_end_of_session: u64,
    pub long_failures: u64,
    pub short_failures: u64,
    pub rejected_proposals: u64,
    pub risk_budget_cancellations: u64,
    pub sizing_faults: u64,
    pub degenerate_sessions: u64,
    pub news_blocked_sessions: u64,
    pub warmup_rejections: u64,
}

/// Single-instrument session breakout engine
///
/// Owns all mutable state and processes one event at a time.
pub struct Engine<B: Broker + Account> {
    broker: B,
    strategy: StrategyConfig,
    risk: RiskConfig,
    schedule: SessionSchedule,
    model: EntryModel,
    ranges: RangeTracker,
    aggregator: CandleAggregator,
    context: SessionContext,
    daily: DailyRanges,
    orders: OrderManager,
    calendar: Option<NewsCalendar>,
    news_allowed: bool,
    stats: EngineStats,
    warmup: Duration,
    first_bar_at: Option<DateTime<Utc>>,
    last_symbol: Option<String>,
}

impl<B: Broker + Account> Engine<B> {
    pub fn new(config: &AppConfig, broker: B) -> Result<Self> {
        config.validate()?;
        let strategy = config.strategy.clone();
        Ok(Self {
            broker,
            model: EntryModel::from_config(&strategy),
            ranges: RangeTracker::new(strategy.dr_window(), strategy.idr_window()),
            aggregator: CandleAggregator::new(strategy.aggregation_minutes),
            schedule: SessionSchedule::from_config(&config.sessions)?,
            strategy,
            risk: config.risk.clone(),
            context: SessionContext::default(),
            daily: DailyRanges::default(),
            orders: OrderManager::new(),
            calendar: None,
            news_allowed: true,
            stats: EngineStats::default(),
            warmup: Duration::minutes(i64::from(config.backtest.warmup_minutes)),
            first_bar_at: None,
            last_symbol: None,
        })
    }

    /// Gate entries on a high-impact news calendar
    pub fn with_calendar(mut self, calendar: NewsCalendar) -> Self {
        self.calendar = Some(calendar);
        self
    }

    pub fn schedule(&self) -> &SessionSchedule {
        &self.schedule
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn daily_ranges(&self) -> &DailyRanges {
        &self.daily
    }

    pub fn order_manager(&self) -> &OrderManager {
        &self.orders
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    pub fn into_broker(self) -> B {
        self.broker
    }

    /// True until `warmup` has elapsed since the first bar
    pub fn is_warming_up(&self, at: DateTime<Utc>) -> bool {
        match self.first_bar_at {
            Some(first) => at < first + self.warmup,
            None => true,
        }
    }

    /// Process one event to completion
    pub fn handle(&mut self, event: EngineEvent) -> Result<()> {
        match event {
            EngineEvent::Bar(bar) => self.on_bar(&bar),
            EngineEvent::SessionStart { session, at } => {
                self.on_session_start(session, at);
                Ok(())
            }
            EngineEvent::SessionEnd { session, at } => {
                self.on_session_end(session, at);
                Ok(())
            }
        }
    }

    /// Close whatever is still open when the data runs out
    pub fn close_out(&mut self) {
        let session = self.context.session().unwrap_or(Session::After);
        self.flatten(session, ExitReason::EndOfData);
    }

    // =========================================================================
    // Bars
    // =========================================================================

    fn on_bar(&mut self, bar: &Candle) -> Result<()> {
        validate_bar(bar)?;

        if self.first_bar_at.is_none() {
            self.first_bar_at = Some(bar.timestamp);
        }
        let warming_up = self.is_warming_up(bar.timestamp);
        self.orders.set_warming_up(warming_up);
        self.last_symbol = Some(bar.symbol.clone());

        self.broker.update_market(bar);
        if let Some(event) = self.orders.sync(&self.broker) {
            self.record_lifecycle(event);
        }

        self.ranges.update_minute(bar);
        for aggregated in self.aggregator.push(bar) {
            self.ranges.update_aggregated(&aggregated);
            let transitions = self.context.advance(aggregated.close);
            for transition in transitions {
                self.record_transition(transition, aggregated.close);
            }
        }

        self.run_entry_model();
        self.check_entry(bar);

        match self.orders.check_exits(&mut self.broker, bar) {
            Ok(Some(event)) => self.record_lifecycle(event),
            Ok(None) => {}
            Err(e) => self.record_broker_error("exit", e),
        }
        Ok(())
    }

    fn run_entry_model(&mut self) {
        if self.context.entry_models_initialized() || !self.context.phase().is_live_signal() {
            return;
        }
        let Some(session) = self.context.session() else {
            return;
        };

        if !self.news_allowed {
            if self.context.note_news_block() {
                tracing::info!(
                    "📰 High impact news this {} session, no trades shall be taken",
                    session
                );
            }
            return;
        }

        match self.context.initialize_entry_model(&self.model) {
            Some(EntryModelOutcome::Published(proposal)) => {
                tracing::info!(
                    "{} {} trade model initialized: entry {}, sl {}, tp {}",
                    session,
                    proposal.direction,
                    proposal.entry,
                    proposal.stop,
                    proposal.target
                );
            }
            Some(EntryModelOutcome::Rejected(proposal)) => {
                self.stats.rejected_proposals += 1;
                tracing::warn!(
                    "{} RR verification failed for {} (entry {}, sl {}, tp {}), no trade this session",
                    session,
                    proposal.direction,
                    proposal.entry,
                    proposal.stop,
                    proposal.target
                );
            }
            None => {}
        }
    }

    fn check_entry(&mut self, bar: &Candle) {
        let Some(proposal) = self.context.proposal().copied() else {
            return;
        };
        let (Some(session), Some(idr)) = (self.context.session(), self.context.idr().copied()) else {
            return;
        };

        if !self.context.can_trade()
            || self.context.phase().phase3()
            || self.orders.has_exposure()
            || !self.strategy.session_enabled(session)
            || !self.strategy.direction_enabled(proposal.direction)
            || !bar.brackets(proposal.entry)
        {
            return;
        }

        self.context.take_trade_slot();

        // Same IDR snapshot, same prices as the published proposal
        let levels = self.model.levels(proposal.direction, &idr);
        let decision = size_position(&SizingRequest {
            direction: proposal.direction,
            entry: levels.entry,
            stop: levels.stop,
            account_value: self.broker.total_portfolio_value(),
            risk_fraction: self.risk.position_max_risk,
            tick_value: self.broker.contract_tick_value(&bar.symbol),
            max_order_quantity: self.broker.max_order_quantity(&bar.symbol, proposal.direction),
        });

        match decision.outcome {
            SizingOutcome::RiskBudgetExhausted => {
                self.stats.risk_budget_cancellations += 1;
                return;
            }
            SizingOutcome::SignMismatch => {
                self.stats.sizing_faults += 1;
                return;
            }
            SizingOutcome::Full | SizingOutcome::Reduced => {}
        }

        let planned = PositionState {
            symbol: bar.symbol.clone(),
            session,
            direction: proposal.direction,
            quantity: decision.contracts,
            entry_price: levels.entry,
            stop: levels.stop,
            target: levels.target,
            opened_at: bar.timestamp,
        };
        match self.orders.submit_entry(&mut self.broker, planned) {
            Ok(_) => self.stats.total_entries += 1,
            Err(e) => self.record_broker_error("entry", e),
        }
    }

    // =========================================================================
    // Session boundaries
    // =========================================================================

    fn on_session_start(&mut self, session: Session, at: DateTime<Utc>) {
        if self.is_warming_up(at) {
            tracing::debug!("Warming up, ignoring {} start at {}", session, at);
            return;
        }
        self.orders.set_warming_up(false);

        // A carried position is tagged with its own session, not this one
        if self.strategy.cancel_orders_on_open {
            self.flatten(session, ExitReason::EndOfSession);
        }

        if let Some(open) = self.context.session() {
            tracing::warn!("{} still open at {} start, resetting it", open, session);
            self.context.reset();
        }

        let snapshot = self.ranges.snapshot();
        let (context, edge) = SessionContext::open(session, snapshot);
        self.context = context;
        self.stats.sessions_opened += 1;

        match (edge, snapshot) {
            (Some(edge), Some(snapshot)) => {
                self.daily.record(session, snapshot);
                self.record_transition(edge, f64::NAN);
                tracing::debug!(
                    "{} IDR [{} -- {}], half-std [{} -- {}]",
                    session,
                    snapshot.idr.low,
                    snapshot.idr.high,
                    snapshot.idr.half_std_low,
                    snapshot.idr.half_std_high
                );
            }
            _ => {
                self.stats.degenerate_sessions += 1;
                tracing::warn!(
                    "{} session has no valid defining range, no trading this session",
                    session
                );
            }
        }

        self.news_allowed = self.calendar.as_ref().map_or(true, |calendar| {
            calendar.allows_entries(session, at, &self.schedule, self.strategy.lookback())
        });
        if !self.news_allowed {
            self.stats.news_blocked_sessions += 1;
        }
    }

    fn on_session_end(&mut self, session: Session, at: DateTime<Utc>) {
        if self.context.session() != Some(session) {
            if self.is_warming_up(at) {
                tracing::debug!("Warming up, ignoring {} end at {}", session, at);
            } else {
                tracing::warn!(
                    "{} end at {} does not match the current session ({:?}), ignored",
                    session,
                    at,
                    self.context.session()
                );
            }
            return;
        }

        if !self.strategy.cancel_orders_on_open {
            self.flatten(session, ExitReason::EndOfSession);
        }

        tracing::info!(
            "{} session ended: phases {}/{}/{}/{}",
            session,
            self.context.phase().phase1(),
            self.context.phase().phase2(),
            self.context.phase().phase3(),
            self.context.phase().phase4()
        );
        self.context.reset();

        if session == Session::After {
            self.daily.clear();
            tracing::info!(
                "📊 Day complete: {} entries, {} SL, {} TP, {} EOS so far",
                self.stats.total_entries,
                self.stats.exits_stop_loss,
                self.stats.exits_take_profit,
                self.stats.exits_end_of_session
            );
        }
    }

    fn flatten(&mut self, session: Session, reason: ExitReason) {
        let Some(symbol) = self.last_symbol.clone() else {
            return;
        };
        match self
            .orders
            .flatten_and_cancel(&mut self.broker, &symbol, session, reason)
        {
            Ok(report) => {
                if report.closed_quantity != 0 && reason == ExitReason::EndOfSession {
                    self.stats.exits_end_of_session += 1;
                }
            }
            Err(e) => self.record_broker_error("flatten", e),
        }
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    fn record_transition(&mut self, transition: PhaseTransition, close: f64) {
        let session = self
            .context
            .session()
            .map_or_else(|| "-".to_string(), |s| s.to_string());
        match transition {
            PhaseTransition::RangeEstablished => {
                if let Some(dr) = self.context.dr() {
                    tracing::info!(
                        "{} session DR range created [{} -- {}]",
                        session,
                        dr.low,
                        dr.high
                    );
                }
            }
            PhaseTransition::DirectionConfirmed(direction) => {
                tracing::info!("📈 {} phase 2: {} signal on close {}", session, direction, close);
            }
            PhaseTransition::SignalFailed(direction) => {
                match direction {
                    Direction::Long => self.stats.long_failures += 1,
                    Direction::Short => self.stats.short_failures += 1,
                }
                tracing::info!(
                    "{} phase 3: {} signal failed on close {}, false session",
                    session,
                    direction,
                    close
                );
            }
            PhaseTransition::HalfStdReached => {
                tracing::info!("{} phase 4: 0.5 STD reached on close {}", session, close);
            }
        }
    }

    fn record_lifecycle(&mut self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::Exited { reason, .. } => match reason {
                ExitReason::StopLoss => self.stats.exits_stop_loss += 1,
                ExitReason::TakeProfit => self.stats.exits_take_profit += 1,
                ExitReason::EndOfSession => self.stats.exits_end_of_session += 1,
                ExitReason::EndOfData => {}
            },
            LifecycleEvent::EntryFilled {
                direction,
                quantity,
                price,
            } => {
                tracing::info!("Entry filled: {} x{} @ {}", direction, quantity, price);
            }
            LifecycleEvent::EntryCancelled => {}
        }
    }

    fn record_broker_error(&mut self, action: &str, error: BrokerError) {
        match error {
            BrokerError::WarmingUp => {
                self.stats.warmup_rejections += 1;
                tracing::warn!("{} skipped: {}", action, error);
            }
            other => tracing::warn!("{} failed: {}", action, other),
        }
    }
}

fn validate_bar(bar: &Candle) -> Result<()> {
    let prices = [bar.open, bar.high, bar.low, bar.close];
    if prices.iter().any(|p| !p.is_finite()) {
        return Err(EngineError::InvalidMarketData(format!(
            "non-finite price in {} bar at {}",
            bar.symbol, bar.timestamp
        )));
    }
    if bar.high < bar.low {
        return Err(EngineError::InvalidMarketData(format!(
            "high {} below low {} in {} bar at {}",
            bar.high, bar.low, bar.symbol, bar.timestamp
        )));
    }
    Ok(())
}
