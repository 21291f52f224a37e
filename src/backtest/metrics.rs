use crate::engine::EngineStats;
use crate::execution::ClosedTrade;
use crate::models::{Direction, ExitReason, Session};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Record of a single round trip for analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub symbol: String,
    pub session: Option<Session>,
    pub direction: Direction,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_price: f64,
    pub contracts: i64,
    pub pnl: f64,
    pub points: f64,
    pub holding_period_minutes: i64,
    pub exit_reason: Option<ExitReason>,
}

impl TradeRecord {
    pub fn from_trade(trade: &ClosedTrade) -> Self {
        let points = (trade.exit_price - trade.entry_price) * trade.direction.signum();
        Self {
            symbol: trade.symbol.clone(),
            session: session_from_tag(&trade.entry_tag),
            direction: trade.direction,
            entry_time: trade.entry_time,
            exit_time: trade.exit_time,
            entry_price: trade.entry_price,
            exit_price: trade.exit_price,
            contracts: trade.quantity,
            pnl: trade.realized_pnl,
            points,
            holding_period_minutes: (trade.exit_time - trade.entry_time).num_minutes(),
            exit_reason: trade.exit_reason(),
        }
    }
}

fn session_from_tag(tag: &str) -> Option<Session> {
    let code = tag.split_whitespace().next()?;
    Session::ALL.into_iter().find(|s| s.code() == code)
}

/// Closed trades broken down by why they closed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitBreakdown {
    pub stop_loss: usize,
    pub take_profit: usize,
    pub end_of_session: usize,
    pub end_of_data: usize,
    pub untagged: usize,
}

impl ExitBreakdown {
    fn from_trades(trades: &[TradeRecord]) -> Self {
        let mut breakdown = Self::default();
        for trade in trades {
            match trade.exit_reason {
                Some(ExitReason::StopLoss) => breakdown.stop_loss += 1,
                Some(ExitReason::TakeProfit) => breakdown.take_profit += 1,
                Some(ExitReason::EndOfSession) => breakdown.end_of_session += 1,
                Some(ExitReason::EndOfData) => breakdown.end_of_data += 1,
                None => breakdown.untagged += 1,
            }
        }
        breakdown
    }
}

/// Complete backtest performance metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestMetrics {
    // P&L
    pub total_pnl: f64,
    pub total_return_pct: f64,
    pub initial_portfolio_value: f64,
    pub final_portfolio_value: f64,

    // Trade statistics
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub long_trades: usize,
    pub short_trades: usize,

    // P&L distribution
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub profit_factor: f64, // gross wins / gross losses

    // Risk
    pub max_drawdown: f64,
    pub max_drawdown_pct: f64,

    pub avg_holding_period_minutes: f64,
    pub exits: ExitBreakdown,

    pub trades: Vec<TradeRecord>,
}

impl BacktestMetrics {
    /// Calculate metrics from the closed round trips of a run
    ///
    /// # Arguments
    /// * `closed` - round trips in the order they closed
    /// * `initial_portfolio_value` - account value before the first bar
    /// * `final_portfolio_value` - account value after close-out
    pub fn from_trades(
        closed: &[ClosedTrade],
        initial_portfolio_value: f64,
        final_portfolio_value: f64,
    ) -> Self {
        let trades: Vec<TradeRecord> = closed.iter().map(TradeRecord::from_trade).collect();
        let total_trades = trades.len();

        if total_trades == 0 {
            return Self::empty(initial_portfolio_value, final_portfolio_value);
        }

        let total_pnl = final_portfolio_value - initial_portfolio_value;
        let total_return_pct = (total_pnl / initial_portfolio_value) * 100.0;

        let wins: Vec<f64> = trades.iter().filter(|t| t.pnl > 0.0).map(|t| t.pnl).collect();
        let losses: Vec<f64> = trades.iter().filter(|t| t.pnl < 0.0).map(|t| t.pnl).collect();

        let winning_trades = wins.len();
        let losing_trades = losses.len();
        let win_rate = (winning_trades as f64 / total_trades as f64) * 100.0;

        let gross_wins: f64 = wins.iter().sum();
        let gross_losses: f64 = losses.iter().sum::<f64>().abs();

        let avg_win = if winning_trades > 0 {
            gross_wins / winning_trades as f64
        } else {
            0.0
        };
        let avg_loss = if losing_trades > 0 {
            -gross_losses / losing_trades as f64
        } else {
            0.0
        };

        let largest_win = wins.iter().copied().fold(0.0, f64::max);
        let largest_loss = losses.iter().copied().fold(0.0, f64::min);

        let profit_factor = if gross_losses > 0.0 {
            gross_wins / gross_losses
        } else if gross_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_pct) =
            Self::calculate_drawdown(&trades, initial_portfolio_value);

        let avg_holding_period_minutes = trades
            .iter()
            .map(|t| t.holding_period_minutes as f64)
            .sum::<f64>()
            / total_trades as f64;

        let long_trades = trades
            .iter()
            .filter(|t| t.direction == Direction::Long)
            .count();

        Self {
            total_pnl,
            total_return_pct,
            initial_portfolio_value,
            final_portfolio_value,
            total_trades,
            winning_trades,
            losing_trades,
            win_rate,
            long_trades,
            short_trades: total_trades - long_trades,
            avg_win,
            avg_loss,
            largest_win,
            largest_loss,
            profit_factor,
            max_drawdown,
            max_drawdown_pct,
            avg_holding_period_minutes,
            exits: ExitBreakdown::from_trades(&trades),
            trades,
        }
    }

    fn empty(initial_portfolio_value: f64, final_portfolio_value: f64) -> Self {
        let total_pnl = final_portfolio_value - initial_portfolio_value;
        Self {
            total_pnl,
            total_return_pct: (total_pnl / initial_portfolio_value) * 100.0,
            initial_portfolio_value,
            final_portfolio_value,
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            win_rate: 0.0,
            long_trades: 0,
            short_trades: 0,
            avg_win: 0.0,
            avg_loss: 0.0,
            largest_win: 0.0,
            largest_loss: 0.0,
            profit_factor: 0.0,
            max_drawdown: 0.0,
            max_drawdown_pct: 0.0,
            avg_holding_period_minutes: 0.0,
            exits: ExitBreakdown::default(),
            trades: vec![],
        }
    }

    /// Peak-to-trough drop of the closed-trade equity curve
    fn calculate_drawdown(trades: &[TradeRecord], initial_value: f64) -> (f64, f64) {
        let mut peak = initial_value;
        let mut max_dd = 0.0;
        let mut max_dd_pct = 0.0;
        let mut equity = initial_value;

        for trade in trades {
            equity += trade.pnl;
            if equity > peak {
                peak = equity;
            }

            let dd = peak - equity;
            if dd > max_dd {
                max_dd = dd;
                max_dd_pct = (dd / peak) * 100.0;
            }
        }

        (max_dd, max_dd_pct)
    }

    /// Print a formatted report to stdout
    pub fn print_report(&self, stats: &EngineStats) {
        println!("\n╔═══════════════════════════════════════════════════════╗");
        println!("║          SESSION BREAKOUT BACKTEST RESULTS            ║");
        println!("╚═══════════════════════════════════════════════════════╝\n");

        println!("📊 P&L SUMMARY");
        println!(
            "  Initial Portfolio:     ${:.2}",
            self.initial_portfolio_value
        );
        println!(
            "  Final Portfolio:       ${:.2}",
            self.final_portfolio_value
        );
        println!(
            "  Net P&L:               ${:.2} ({:+.2}%)",
            self.total_pnl, self.total_return_pct
        );

        println!("\n📈 TRADE STATISTICS");
        println!("  Total Trades:          {}", self.total_trades);
        println!(
            "  Winning Trades:        {} ({:.1}%)",
            self.winning_trades, self.win_rate
        );
        println!("  Losing Trades:         {}", self.losing_trades);
        println!(
            "  Long / Short:          {} / {}",
            self.long_trades, self.short_trades
        );

        if self.total_trades > 0 {
            println!("\n💰 WIN/LOSS ANALYSIS");
            println!("  Average Win:           ${:.2}", self.avg_win);
            println!("  Average Loss:          ${:.2}", self.avg_loss);
            println!("  Largest Win:           ${:.2}", self.largest_win);
            println!("  Largest Loss:          ${:.2}", self.largest_loss);
            println!("  Profit Factor:         {:.2}", self.profit_factor);
            println!(
                "  Avg Holding Period:    {:.1} minutes",
                self.avg_holding_period_minutes
            );

            println!("\n⚠️  RISK METRICS");
            println!(
                "  Max Drawdown:          ${:.2} ({:.2}%)",
                self.max_drawdown, self.max_drawdown_pct
            );

            println!("\n🚪 EXITS");
            println!("  Stop Loss:             {}", self.exits.stop_loss);
            println!("  Take Profit:           {}", self.exits.take_profit);
            println!("  End of Session:        {}", self.exits.end_of_session);
            println!("  End of Data:           {}", self.exits.end_of_data);
        }

        println!("\n🕐 SESSIONS");
        println!("  Sessions Opened:       {}", stats.sessions_opened);
        println!("  Entries:               {}", stats.total_entries);
        println!(
            "  Failed Breakouts:      {} long / {} short",
            stats.long_failures, stats.short_failures
        );
        println!("  RR Rejections:         {}", stats.rejected_proposals);
        println!("  Risk Budget Cancels:   {}", stats.risk_budget_cancellations);
        println!("  No Valid Range:        {}", stats.degenerate_sessions);
        println!("  News Blocked:          {}", stats.news_blocked_sessions);

        println!("\n═══════════════════════════════════════════════════════\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn create_test_trade(pnl: f64, direction: Direction, exit_tag: &str) -> ClosedTrade {
        let entry_time = Utc.with_ymd_and_hms(2023, 9, 1, 4, 30, 0).unwrap();
        let quantity = 2;
        let entry_price = 4500.0;
        let exit_price = entry_price + direction.signum() * pnl / (quantity as f64 * 50.0);

        ClosedTrade {
            id: uuid::Uuid::new_v4(),
            symbol: "ESZ3".to_string(),
            direction,
            quantity,
            entry_price,
            exit_price,
            entry_time,
            exit_time: entry_time + Duration::minutes(45),
            realized_pnl: pnl,
            entry_tag: "ODR entry".to_string(),
            exit_tag: exit_tag.to_string(),
        }
    }

    #[test]
    fn test_metrics_with_winning_trades() {
        let trades = vec![
            create_test_trade(1_000.0, Direction::Long, "ODR TP"),
            create_test_trade(500.0, Direction::Short, "ODR TP"),
            create_test_trade(-300.0, Direction::Long, "ODR SL"),
        ];

        let metrics = BacktestMetrics::from_trades(&trades, 100_000.0, 101_200.0);

        assert_eq!(metrics.total_trades, 3);
        assert_eq!(metrics.winning_trades, 2);
        assert_eq!(metrics.losing_trades, 1);
        assert_eq!(metrics.long_trades, 2);
        assert_eq!(metrics.short_trades, 1);
        assert!((metrics.win_rate - 66.66).abs() < 0.1);
        assert!((metrics.total_pnl - 1_200.0).abs() < 0.01);
        assert!((metrics.total_return_pct - 1.2).abs() < 1e-9);
        assert_eq!(metrics.exits.take_profit, 2);
        assert_eq!(metrics.exits.stop_loss, 1);
        assert_eq!(metrics.trades[0].session, Some(Session::Overnight));
        assert_eq!(metrics.trades[0].holding_period_minutes, 45);
    }

    #[test]
    fn test_metrics_with_no_trades() {
        let metrics = BacktestMetrics::from_trades(&[], 100_000.0, 100_000.0);

        assert_eq!(metrics.total_trades, 0);
        assert_eq!(metrics.win_rate, 0.0);
        assert_eq!(metrics.total_pnl, 0.0);
        assert_eq!(metrics.exits, ExitBreakdown::default());
    }

    #[test]
    fn test_profit_factor_calculation() {
        let trades = vec![
            create_test_trade(2_000.0, Direction::Long, "RDR TP"),
            create_test_trade(1_000.0, Direction::Long, "RDR TP"),
            create_test_trade(-500.0, Direction::Short, "RDR EOS"),
        ];

        let metrics = BacktestMetrics::from_trades(&trades, 100_000.0, 102_500.0);

        // 3000 / 500
        assert!((metrics.profit_factor - 6.0).abs() < 0.01);
        assert_eq!(metrics.exits.end_of_session, 1);
    }

    #[test]
    fn test_drawdown_calculation() {
        let trades = vec![
            create_test_trade(1_000.0, Direction::Long, "ADR TP"),
            create_test_trade(-2_000.0, Direction::Long, "ADR SL"),
            create_test_trade(500.0, Direction::Long, "ADR TP"),
        ];

        let metrics = BacktestMetrics::from_trades(&trades, 100_000.0, 99_500.0);

        assert!((metrics.max_drawdown - 2_000.0).abs() < 0.01);
        assert!((metrics.max_drawdown_pct - 2_000.0 / 101_000.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_short_points_are_positive_when_price_falls() {
        let trade = create_test_trade(1_000.0, Direction::Short, "ODR TP");
        let record = TradeRecord::from_trade(&trade);
        assert!(record.exit_price < record.entry_price);
        assert!((record.points - 10.0).abs() < 1e-9);
    }
}
