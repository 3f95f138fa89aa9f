use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::execution::{CandleBuffer, ExitContext, Position, PositionManager};
use crate::models::{Candle, CloseInstruction, EntryInstruction, Signal, TradeOutcome};
use crate::risk::{
    EntryRejection, GlobalProtection, PositionSizer, ProtectionLock, ProtectionManager,
    SizingDecision,
};
use crate::strategy::{Analysis, Strategy, TradeState};

/// Everything the evaluator decided for one closed candle
#[derive(Debug, Clone, Serialize)]
pub struct CandleReport {
    pub signal: Signal,
    /// Provisional entry awaiting acknowledgement
    pub entry: Option<(Uuid, EntryInstruction)>,
    pub close: Option<CloseInstruction>,
    /// Outcome of the position closed on this candle, for the ledger
    pub outcome: Option<TradeOutcome>,
    pub suppressed: Option<EntryRejection>,
}

/// Runs the per-candle pipeline for one pair: window, indicators, signal,
/// exits, protections and sizing
pub struct PairEvaluator {
    pair: String,
    timeframe_minutes: i64,
    buffer: CandleBuffer,
    strategy: Arc<dyn Strategy>,
    sizer: PositionSizer,
    positions: PositionManager,
    protection: ProtectionManager,
}

impl PairEvaluator {
    pub fn new(
        pair: &str,
        config: &EngineConfig,
        strategy: Arc<dyn Strategy>,
        global: Arc<GlobalProtection>,
    ) -> Self {
        Self {
            pair: pair.to_string(),
            timeframe_minutes: config.timeframe_minutes,
            buffer: CandleBuffer::new(pair, config.window_size, config.timeframe_minutes),
            strategy,
            sizer: PositionSizer::new(config.risk.clone()),
            positions: PositionManager::new(pair, &config.risk, config.timeframe_minutes),
            protection: ProtectionManager::new(
                pair,
                config.protections.build_guards(),
                config.timeframe_minutes,
                global,
            ),
        }
    }

    pub fn pair(&self) -> &str {
        &self.pair
    }

    pub fn position(&self) -> Option<&Position> {
        self.positions.position()
    }

    pub fn protection(&self) -> &ProtectionManager {
        &self.protection
    }

    pub fn candle_count(&self) -> usize {
        self.buffer.candle_count()
    }

    /// Evaluate a newly closed candle.
    ///
    /// Malformed, out-of-order and misrouted candles are rejected with the
    /// window left untouched.
    pub fn on_candle(&mut self, candle: Candle) -> Result<CandleReport> {
        if let Err(e) = self.buffer.add_candle(candle.clone()) {
            tracing::warn!("Rejected candle: {}", e);
            return Err(e);
        }

        let now = candle.close_time(self.timeframe_minutes);
        let analysis = self.strategy.analyze(self.buffer.get_candles());
        let (signal, snapshots) = match analysis {
            Some(Analysis { signal, snapshots }) => (signal, snapshots),
            None => (
                Signal::none(&self.pair, candle.open_time, "insufficient_data"),
                Vec::new(),
            ),
        };
        tracing::debug!(
            "{} {} -> {:?} ({})",
            self.pair,
            candle.open_time,
            signal.kind,
            signal.rule_id
        );

        let mut report = CandleReport {
            signal,
            entry: None,
            close: None,
            outcome: None,
            suppressed: None,
        };

        let custom_exit = self
            .positions
            .position()
            .filter(|p| p.confirmed && now > p.opened_at)
            .and_then(|p| {
                let trade = TradeState {
                    profit_ratio: p.profit_ratio(candle.close),
                    held_minutes: (now - p.opened_at).num_minutes(),
                };
                self.strategy.custom_exit(&trade, &snapshots)
            });
        let ctx = ExitContext {
            signal: &report.signal,
            custom_exit,
            atr: snapshots.last().map(|s| s.atr),
        };

        // A candle that closes a position does not also open one
        if let Some(closed) = self.positions.on_candle(&candle, &ctx) {
            report.close = Some(closed.instruction);
            report.outcome = Some(closed.outcome);
            return Ok(report);
        }

        if report.signal.is_entry() {
            let lock = self.protection.check(now);

            match self.sizer.size(
                &report.signal,
                candle.close,
                now,
                self.positions.has_open_position(),
                lock,
            ) {
                SizingDecision::Open(position, instruction) => {
                    let id = self.positions.open(position);
                    report.entry = Some((id, instruction));
                }
                SizingDecision::Rejected(rejection) => {
                    match &rejection {
                        EntryRejection::PositionOpen => {
                            tracing::debug!("{}: entry ignored, position already open", self.pair)
                        }
                        EntryRejection::Locked { .. } => {
                            tracing::warn!("{}: entry suppressed, reason={}", self.pair, rejection)
                        }
                    }
                    report.suppressed = Some(rejection);
                }
            }
        }

        Ok(report)
    }

    /// Execution side confirmed the fill of a provisional entry
    pub fn acknowledge_entry(&mut self, id: Uuid) -> bool {
        let known = self.positions.acknowledge(id);
        if !known {
            tracing::warn!("{}: acknowledgement for unknown position {}", self.pair, id);
        }
        known
    }

    /// Execution side refused a provisional entry; frees the slot
    pub fn reject_entry(&mut self, id: Uuid) -> bool {
        let dropped = self.positions.reject(id).is_some();
        if dropped {
            tracing::info!("{}: provisional position {} rejected by execution", self.pair, id);
        }
        dropped
    }

    /// Ledger reported a closed trade; returns the locks it triggered
    pub fn record_outcome(&mut self, outcome: TradeOutcome) -> Vec<ProtectionLock> {
        self.protection.record_outcome(outcome)
    }
}
