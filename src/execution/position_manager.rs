use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Candle, CloseInstruction, Signal, TradeOutcome};
use crate::risk::{ExitCheck, RiskConfig, RoiTable, TrailingStopConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionStatus {
    Open,
    Closed,
}

/// Terminal state a position closed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    Roi,
    TrailingStop,
    CustomExit, // Strategy's early-exit rule
    Signal,     // Rule-driven EXIT_LONG
}

#[derive(Debug, Clone, Serialize)]
pub struct Position {
    pub id: Uuid,
    pub pair: String,
    pub entry_price: f64,
    pub stake: f64,
    pub leverage: f64,
    pub opened_at: DateTime<Utc>, // Close time of the entry candle
    pub stop_loss_price: f64,
    pub roi_table: RoiTable,
    pub trailing_stop_active: bool,
    pub trailing_stop_price: Option<f64>,
    pub high_water: f64, // Highest price seen since entry
    pub status: PositionStatus,
    /// Provisional until the execution side acknowledges the fill
    pub confirmed: bool,
    pub entry_rule: String,
    pub exit_price: Option<f64>,
    pub closed_at: Option<DateTime<Utc>>,
    pub exit_reason: Option<ExitReason>,
}

impl Position {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pair: &str,
        entry_price: f64,
        stake: f64,
        leverage: f64,
        opened_at: DateTime<Utc>,
        stop_loss_price: f64,
        roi_table: RoiTable,
        entry_rule: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            pair: pair.to_string(),
            entry_price,
            stake,
            leverage,
            opened_at,
            stop_loss_price,
            roi_table,
            trailing_stop_active: false,
            trailing_stop_price: None,
            high_water: entry_price,
            status: PositionStatus::Open,
            confirmed: false,
            entry_rule: entry_rule.to_string(),
            exit_price: None,
            closed_at: None,
            exit_reason: None,
        }
    }

    /// Leveraged profit ratio at `price`
    pub fn profit_ratio(&self, price: f64) -> f64 {
        (price / self.entry_price - 1.0) * self.leverage
    }

    /// Price at which the leveraged profit ratio equals `ratio`
    fn price_at_ratio(&self, ratio: f64) -> f64 {
        self.entry_price * (1.0 + ratio / self.leverage)
    }

    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }
}

/// Exit decided for a candle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Exit {
    pub reason: ExitReason,
    pub price: f64,
    /// Rule that fired, for custom exits
    pub rule: Option<&'static str>,
}

impl Exit {
    fn at(reason: ExitReason, price: f64) -> Self {
        Self {
            reason,
            price,
            rule: None,
        }
    }
}

/// Per-candle inputs to the exit state machine besides the candle itself
#[derive(Debug, Clone, Copy)]
pub struct ExitContext<'a> {
    pub signal: &'a Signal,
    /// Custom exit rule that matched on this candle, if any
    pub custom_exit: Option<&'static str>,
    /// ATR of this candle, for the dynamic stop
    pub atr: Option<f64>,
}

impl<'a> ExitContext<'a> {
    pub fn from_signal(signal: &'a Signal) -> Self {
        Self {
            signal,
            custom_exit: None,
            atr: None,
        }
    }
}

/// Result of closing a position
#[derive(Debug, Clone)]
pub struct ClosedPosition {
    pub position: Position,
    pub instruction: CloseInstruction,
    pub outcome: TradeOutcome,
}

/// Owns the single position slot for one pair and runs the exit state machine
#[derive(Debug)]
pub struct PositionManager {
    pair: String,
    position: Option<Position>,
    trailing: TrailingStopConfig,
    exit_order: Vec<ExitCheck>,
    atr_stop_multiplier: Option<f64>,
    timeframe: Duration,
}

impl PositionManager {
    pub fn new(pair: &str, risk: &RiskConfig, timeframe_minutes: i64) -> Self {
        Self {
            pair: pair.to_string(),
            position: None,
            trailing: risk.trailing.clone(),
            exit_order: risk.exit_order.clone(),
            atr_stop_multiplier: risk.atr_stop_multiplier,
            timeframe: Duration::minutes(timeframe_minutes),
        }
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn has_open_position(&self) -> bool {
        self.position.is_some()
    }

    /// Take ownership of a freshly sized position.
    ///
    /// # Panics
    /// If a position is already open for this pair.
    pub fn open(&mut self, position: Position) -> Uuid {
        assert!(
            self.position.is_none(),
            "second position opened for {} while one is open",
            self.pair
        );
        assert_eq!(position.pair, self.pair, "position routed to the wrong pair");

        let id = position.id;
        tracing::info!(
            "📈 Provisional LONG {} @ {:.4} (stake {:.2}, {}x, stop {:.4}, rule {})",
            position.pair,
            position.entry_price,
            position.stake,
            position.leverage,
            position.stop_loss_price,
            position.entry_rule
        );
        self.position = Some(position);
        id
    }

    /// Mark the provisional position as filled. Returns false for unknown ids.
    pub fn acknowledge(&mut self, id: Uuid) -> bool {
        match self.position.as_mut() {
            Some(p) if p.id == id => {
                p.confirmed = true;
                true
            }
            _ => false,
        }
    }

    /// Drop a provisional position the execution side refused, freeing the slot
    pub fn reject(&mut self, id: Uuid) -> Option<Position> {
        match &self.position {
            Some(p) if p.id == id && !p.confirmed => self.position.take(),
            _ => None,
        }
    }

    /// Decide whether `candle` closes the open position on `signal` alone
    pub fn check_exit(&mut self, candle: &Candle, signal: &Signal) -> Option<Exit> {
        self.check_exit_with(candle, &ExitContext::from_signal(signal))
    }

    /// Decide whether `candle` closes the open position, updating trailing
    /// and ATR stop state along the way.
    ///
    /// Nothing is evaluated for provisional positions or on the entry candle.
    pub fn check_exit_with(&mut self, candle: &Candle, ctx: &ExitContext<'_>) -> Option<Exit> {
        let candle_close = candle.close_time(self.timeframe.num_minutes());
        let position = self.position.as_mut()?;
        if !position.confirmed || candle_close <= position.opened_at {
            return None;
        }

        // Worst case first: the low may have touched the stop before anything else
        if candle.low <= position.stop_loss_price {
            return Some(Exit::at(ExitReason::StopLoss, position.stop_loss_price));
        }

        for check in &self.exit_order {
            let exit = match check {
                ExitCheck::Roi => Self::check_roi(position, candle, candle_close),
                ExitCheck::TrailingStop => Self::check_trailing(position, &self.trailing, candle),
            };
            if exit.is_some() {
                return exit;
            }
        }

        if let Some(rule) = ctx.custom_exit {
            return Some(Exit {
                rule: Some(rule),
                ..Exit::at(ExitReason::CustomExit, candle.close)
            });
        }
        if ctx.signal.is_exit() {
            return Some(Exit::at(ExitReason::Signal, candle.close));
        }

        // Position survives the candle; the ATR stop applies from the next one
        if let (Some(k), Some(atr)) = (self.atr_stop_multiplier, ctx.atr) {
            let candidate = candle.close - k * atr;
            if atr.is_finite() && candidate > position.stop_loss_price {
                tracing::debug!(
                    "{} ATR stop raised {:.4} -> {:.4}",
                    position.pair,
                    position.stop_loss_price,
                    candidate
                );
                position.stop_loss_price = candidate;
            }
        }

        None
    }

    fn check_roi(
        position: &Position,
        candle: &Candle,
        candle_close: DateTime<Utc>,
    ) -> Option<Exit> {
        let elapsed = (candle_close - position.opened_at).num_minutes();
        let min_profit = position.roi_table.min_profit_at(elapsed)?;

        (position.profit_ratio(candle.close) >= min_profit)
            .then_some(Exit::at(ExitReason::Roi, candle.close))
    }

    fn check_trailing(
        position: &mut Position,
        trailing: &TrailingStopConfig,
        candle: &Candle,
    ) -> Option<Exit> {
        if !trailing.enabled {
            return None;
        }

        if let Some(stop) = position.trailing_stop_price {
            if candle.low <= stop {
                return Some(Exit::at(ExitReason::TrailingStop, stop));
            }
        }

        position.high_water = position.high_water.max(candle.high);
        let best = position.profit_ratio(position.high_water);
        if best < trailing.activation {
            return None;
        }

        let candidate = position.price_at_ratio(best - trailing.offset);
        let stop = position
            .trailing_stop_price
            .map_or(candidate, |current| current.max(candidate));
        if !position.trailing_stop_active {
            tracing::debug!("{} trailing stop active at {:.4}", position.pair, stop);
        }
        position.trailing_stop_active = true;
        position.trailing_stop_price = Some(stop);

        (candle.close <= stop).then_some(Exit::at(ExitReason::TrailingStop, candle.close))
    }

    /// Close the open position at `closed_at`, freeing the slot
    pub fn close(&mut self, exit: Exit, closed_at: DateTime<Utc>) -> Option<ClosedPosition> {
        let mut position = self.position.take()?;

        position.status = PositionStatus::Closed;
        position.exit_price = Some(exit.price);
        position.closed_at = Some(closed_at);
        position.exit_reason = Some(exit.reason);

        let profit_ratio = position.profit_ratio(exit.price);
        tracing::info!(
            "📉 Closed {} @ {:.4} ({:?}, profit {:+.2}%)",
            position.pair,
            exit.price,
            exit.reason,
            profit_ratio * 100.0
        );

        let instruction = CloseInstruction {
            pair: position.pair.clone(),
            exit_reason: exit.reason,
            exit_price: exit.price,
            exit_rule: exit.rule.map(str::to_string),
        };
        let outcome = TradeOutcome {
            pair: position.pair.clone(),
            closed_at,
            profit_ratio,
            was_stop_loss: exit.reason == ExitReason::StopLoss,
            exit_reason: exit.reason,
        };

        Some(ClosedPosition {
            position,
            instruction,
            outcome,
        })
    }

    /// Run the exit state machine for `candle` and close on a match
    pub fn on_candle(&mut self, candle: &Candle, ctx: &ExitContext<'_>) -> Option<ClosedPosition> {
        let exit = self.check_exit_with(candle, ctx)?;
        self.close(exit, candle.close_time(self.timeframe.num_minutes()))
    }
}
