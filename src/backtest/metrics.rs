use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::execution::ExitReason;
use crate::risk::cumulative_drawdown;

/// Record of a single round trip for analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub pair: String,
    pub entry_rule: String,
    pub opened_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_price: f64,
    pub exit_reason: ExitReason,
    /// Leveraged profit ratio
    pub profit_ratio: f64,
}

impl TradeRecord {
    pub fn holding_period_minutes(&self) -> i64 {
        (self.closed_at - self.opened_at).num_minutes()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExitReasonCounts {
    pub stop_loss: usize,
    pub roi: usize,
    pub trailing_stop: usize,
    pub custom_exit: usize,
    pub signal: usize,
}

impl ExitReasonCounts {
    pub fn record(&mut self, reason: ExitReason) {
        match reason {
            ExitReason::StopLoss => self.stop_loss += 1,
            ExitReason::Roi => self.roi += 1,
            ExitReason::TrailingStop => self.trailing_stop += 1,
            ExitReason::CustomExit => self.custom_exit += 1,
            ExitReason::Signal => self.signal += 1,
        }
    }
}

/// Summary of a replay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub strategy: String,
    pub candles_processed: usize,
    pub rejected_candles: usize,

    // Trade Statistics
    pub total_trades: usize,
    pub winning_trades: usize,
    pub win_rate: f64,
    pub total_profit_ratio: f64,
    /// Peak-to-trough fall of cumulative profit ratio, in close order
    pub max_drawdown: f64,
    pub avg_holding_period_minutes: f64,
    pub exit_reasons: ExitReasonCounts,

    // Protections
    pub suppressed_entries: usize,
    pub locks_applied: usize,

    // Trade Records
    pub trades: Vec<TradeRecord>,
}

impl BacktestReport {
    /// Aggregate closed trades (in close order) into a report
    pub fn from_trades(
        strategy: &str,
        trades: Vec<TradeRecord>,
        candles_processed: usize,
        rejected_candles: usize,
        suppressed_entries: usize,
        locks_applied: usize,
    ) -> Self {
        let total_trades = trades.len();
        let winning_trades = trades.iter().filter(|t| t.profit_ratio > 0.0).count();
        let win_rate = if total_trades > 0 {
            winning_trades as f64 / total_trades as f64
        } else {
            0.0
        };

        let mut exit_reasons = ExitReasonCounts::default();
        for trade in &trades {
            exit_reasons.record(trade.exit_reason);
        }

        let avg_holding_period_minutes = if total_trades > 0 {
            trades.iter().map(|t| t.holding_period_minutes()).sum::<i64>() as f64
                / total_trades as f64
        } else {
            0.0
        };

        Self {
            strategy: strategy.to_string(),
            candles_processed,
            rejected_candles,
            total_trades,
            winning_trades,
            win_rate,
            total_profit_ratio: trades.iter().map(|t| t.profit_ratio).sum(),
            max_drawdown: cumulative_drawdown(trades.iter().map(|t| t.profit_ratio)),
            avg_holding_period_minutes,
            exit_reasons,
            suppressed_entries,
            locks_applied,
            trades,
        }
    }

    /// Print a human-readable summary
    pub fn print_summary(&self) {
        println!("\n{}", "=".repeat(60));
        println!("BACKTEST RESULTS: {}", self.strategy);
        println!("{}", "=".repeat(60));

        println!("\n📊 Feed:");
        println!("  Candles Processed: {}", self.candles_processed);
        println!("  Rejected Candles:  {}", self.rejected_candles);

        println!("\n📈 Trades:");
        println!("  Total Trades:      {}", self.total_trades);
        println!("  Winning Trades:    {}", self.winning_trades);
        println!("  Win Rate:          {:.2}%", self.win_rate * 100.0);
        println!("  Total Profit:      {:+.2}%", self.total_profit_ratio * 100.0);
        println!("  Max Drawdown:      {:.2}%", self.max_drawdown * 100.0);
        println!("  Avg Hold:          {:.0} min", self.avg_holding_period_minutes);

        println!("\n🚪 Exit Reasons:");
        println!("  Stop Loss:         {}", self.exit_reasons.stop_loss);
        println!("  ROI:               {}", self.exit_reasons.roi);
        println!("  Trailing Stop:     {}", self.exit_reasons.trailing_stop);
        println!("  Custom Exit:       {}", self.exit_reasons.custom_exit);
        println!("  Signal:            {}", self.exit_reasons.signal);

        println!("\n🔒 Protections:");
        println!("  Locks Applied:     {}", self.locks_applied);
        println!("  Suppressed Entries: {}", self.suppressed_entries);

        println!("\n{}", "=".repeat(60));
    }
}
