use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};

use crate::backtest::metrics::{BacktestReport, TradeRecord};
use crate::config::EngineConfig;
use crate::execution::PairEvaluator;
use crate::models::{Candle, EntryInstruction};
use crate::risk::{EntryRejection, GlobalProtection};

/// Replays candles through the same per-pair pipeline the live engine uses,
/// on a single thread and in time order.
///
/// Entries are acknowledged immediately and closed trades are fed straight
/// back into the protection ledgers, so locks affect later candles exactly
/// as they would live.
pub struct BacktestRunner {
    config: EngineConfig,
}

struct OpenTrade {
    opened_at: DateTime<Utc>,
    instruction: EntryInstruction,
}

impl BacktestRunner {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run a backtest over `candles`, which may mix pairs in any order
    pub fn run(&self, mut candles: Vec<Candle>) -> anyhow::Result<BacktestReport> {
        self.config
            .validate()
            .context("backtest configuration is invalid")?;

        let strategy = self.config.strategy.build();
        let needed = strategy.min_candles_required();

        let mut per_pair: HashMap<String, usize> = HashMap::new();
        for candle in &candles {
            *per_pair.entry(candle.pair.clone()).or_default() += 1;
        }
        if !per_pair.values().any(|&n| n >= needed) {
            bail!(
                "Not enough candles for backtest. Need {} for at least one pair, got {:?}",
                needed,
                per_pair
            );
        }

        // Stable: equal timestamps keep the order of pairs as given
        candles.sort_by_key(|c| c.open_time);

        tracing::info!(
            "🔬 Starting backtest: {} candles across {} pairs, {} needs {}",
            candles.len(),
            per_pair.len(),
            strategy.name(),
            needed
        );

        let global = Arc::new(GlobalProtection::new());
        let mut evaluators: HashMap<String, PairEvaluator> = HashMap::new();
        let mut open_trades: HashMap<String, OpenTrade> = HashMap::new();

        let mut trades = Vec::new();
        let mut candles_processed = 0;
        let mut rejected_candles = 0;
        let mut suppressed_entries = 0;
        let mut locks_applied = 0;

        for candle in candles {
            let pair = candle.pair.clone();
            let close_time = candle.close_time(self.config.timeframe_minutes);
            let evaluator = evaluators.entry(pair.clone()).or_insert_with(|| {
                PairEvaluator::new(&pair, &self.config, Arc::clone(&strategy), Arc::clone(&global))
            });

            let report = match evaluator.on_candle(candle) {
                Ok(report) => report,
                Err(_) => {
                    rejected_candles += 1;
                    continue;
                }
            };
            candles_processed += 1;

            if let (Some(close), Some(outcome)) = (report.close, report.outcome) {
                if let Some(open) = open_trades.remove(&pair) {
                    trades.push(TradeRecord {
                        pair: pair.clone(),
                        entry_rule: open.instruction.rule_id,
                        opened_at: open.opened_at,
                        closed_at: outcome.closed_at,
                        entry_price: open.instruction.entry_price,
                        exit_price: close.exit_price,
                        exit_reason: close.exit_reason,
                        profit_ratio: outcome.profit_ratio,
                    });
                }
                locks_applied += evaluator.record_outcome(outcome).len();
            }

            if let Some((id, instruction)) = report.entry {
                evaluator.acknowledge_entry(id);
                open_trades.insert(
                    pair,
                    OpenTrade {
                        opened_at: close_time,
                        instruction,
                    },
                );
            }

            if matches!(report.suppressed, Some(EntryRejection::Locked { .. })) {
                suppressed_entries += 1;
            }
        }

        if !open_trades.is_empty() {
            tracing::info!("{} positions still open at end of data", open_trades.len());
        }

        let report = BacktestReport::from_trades(
            strategy.name(),
            trades,
            candles_processed,
            rejected_candles,
            suppressed_entries,
            locks_applied,
        );

        tracing::info!(
            "✅ Backtest complete: {} trades, profit {:+.2}%, {} entries suppressed",
            report.total_trades,
            report.total_profit_ratio * 100.0,
            report.suppressed_entries
        );

        Ok(report)
    }
}
