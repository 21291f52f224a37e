use crate::backtest::metrics::BacktestMetrics;
use crate::config::AppConfig;
use crate::engine::{Engine, EngineEvent, EngineStats, EventSequencer};
use crate::error::EngineError;
use crate::execution::{Account, SimulatedBroker};
use crate::models::Candle;
use crate::strategy::NewsCalendar;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio::sync::mpsc;

/// Bounded queue between the feeder task and the engine
const EVENT_BUFFER: usize = 1024;

/// Everything a finished run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    pub metrics: BacktestMetrics,
    pub stats: EngineStats,
    pub bars_processed: usize,
    pub bars_rejected: usize,
}

/// Backtest runner that replays bars through the engine and a simulated broker
pub struct BacktestRunner {
    config: AppConfig,
    calendar: Option<NewsCalendar>,
}

impl BacktestRunner {
    /// Create a runner; loads the news calendar when `news.enabled` is set
    pub fn new(config: AppConfig) -> Result<Self> {
        config.validate()?;
        let calendar = match (&config.news.enabled, &config.news.calendar_path) {
            (true, Some(path)) => {
                let calendar = NewsCalendar::from_csv_path(path)?.high_impact_usd();
                tracing::info!("📰 {} high impact USD events loaded", calendar.len());
                Some(calendar)
            }
            _ => None,
        };
        Ok(Self { config, calendar })
    }

    /// Gate entries on an already loaded calendar
    pub fn with_calendar(mut self, calendar: NewsCalendar) -> Self {
        self.calendar = Some(calendar);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Fresh engine over a fresh simulated account
    pub fn build_engine(&self) -> Result<Engine<SimulatedBroker>> {
        let broker = SimulatedBroker::new(&self.config.broker);
        let engine = Engine::new(&self.config, broker)?;
        Ok(match &self.calendar {
            Some(calendar) => engine.with_calendar(calendar.clone()),
            None => engine,
        })
    }

    /// Run a backtest over 1-minute bars
    ///
    /// # Arguments
    /// * `candles` - bars in timestamp order, one contract per timestamp
    ///
    /// # Returns
    /// Metrics over the closed trades plus the engine's counters
    pub fn run(&self, candles: Vec<Candle>) -> Result<BacktestReport> {
        if candles.is_empty() {
            return Err(EngineError::InvalidMarketData(
                "no bars to backtest".to_string(),
            ));
        }

        tracing::info!(
            "Starting backtest: {} bars from {} to {}",
            candles.len(),
            candles[0].timestamp,
            candles[candles.len() - 1].timestamp
        );

        let mut engine = self.build_engine()?;
        let mut tally = BarTally::default();
        let events = EventSequencer::new(candles.into_iter(), engine.schedule().clone());
        for event in events {
            self.feed(&mut engine, event, &mut tally);
        }

        Ok(self.finish(engine, tally))
    }

    /// Run with a feeder task sequencing events over a bounded channel
    ///
    /// Stops early when `shutdown` resolves; whatever is open is closed out
    /// either way.
    pub async fn run_streaming<F>(&self, candles: Vec<Candle>, shutdown: F) -> Result<BacktestReport>
    where
        F: Future,
    {
        let mut engine = self.build_engine()?;
        let schedule = engine.schedule().clone();
        let (tx, mut rx) = mpsc::channel::<EngineEvent>(EVENT_BUFFER);

        let feeder = tokio::spawn(async move {
            for event in EventSequencer::new(candles.into_iter(), schedule) {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });

        let mut tally = BarTally::default();
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    tracing::info!("⚠️  Shutdown requested, closing out...");
                    break;
                }
                event = rx.recv() => match event {
                    Some(event) => self.feed(&mut engine, event, &mut tally),
                    None => break,
                },
            }
        }
        feeder.abort();

        Ok(self.finish(engine, tally))
    }

    /// Hand one event to the engine, skipping bars it rejects
    pub fn feed(&self, engine: &mut Engine<SimulatedBroker>, event: EngineEvent, tally: &mut BarTally) {
        let is_bar = matches!(event, EngineEvent::Bar(_));
        match engine.handle(event) {
            Ok(()) if is_bar => tally.processed += 1,
            Ok(()) => {}
            Err(e) => {
                tally.rejected += 1;
                tracing::warn!("Skipping event: {}", e);
            }
        }
    }

    /// Close out the engine and compute the report
    pub fn finish(&self, mut engine: Engine<SimulatedBroker>, tally: BarTally) -> BacktestReport {
        engine.close_out();

        let stats = engine.stats().clone();
        let mut broker = engine.into_broker();
        let settled = broker.settle_open_orders();
        if settled > 0 {
            tracing::debug!("Settled {} orders still working at the end of data", settled);
        }
        let initial = broker.initial_cash();
        let final_value = broker.total_portfolio_value();
        let metrics = BacktestMetrics::from_trades(broker.book().closed_trades(), initial, final_value);

        tracing::info!(
            "✅ Backtest complete: {} trades, P&L ${:.2}",
            metrics.total_trades,
            metrics.total_pnl
        );

        BacktestReport {
            metrics,
            stats,
            bars_processed: tally.processed,
            bars_rejected: tally.rejected,
        }
    }
}

/// Bars accepted and rejected during a run
#[derive(Debug, Clone, Copy, Default)]
pub struct BarTally {
    pub processed: usize,
    pub rejected: usize,
}
