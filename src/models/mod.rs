use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::execution::ExitReason;

/// OHLCV candlestick for a trading pair. Only closed candles enter the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub pair: String,
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Time at which this candle closed, given the feed timeframe
    pub fn close_time(&self, timeframe_minutes: i64) -> DateTime<Utc> {
        self.open_time + Duration::minutes(timeframe_minutes)
    }

    /// Reject candles that can't have come from a real market
    pub fn validate(&self) -> Result<(), EngineError> {
        let malformed = |reason: &str| EngineError::MalformedCandle {
            pair: self.pair.clone(),
            open_time: self.open_time,
            reason: reason.to_string(),
        };

        let values = [self.open, self.high, self.low, self.close, self.volume];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(malformed("non-finite value"));
        }
        if self.volume < 0.0 {
            return Err(malformed("negative volume"));
        }
        if self.low <= 0.0 {
            return Err(malformed("non-positive price"));
        }
        if self.high < self.open.max(self.close) {
            return Err(malformed("high below open/close"));
        }
        if self.low > self.open.min(self.close) {
            return Err(malformed("low above open/close"));
        }

        Ok(())
    }
}

/// What a rule decided for a candle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalKind {
    EntryLong,
    ExitLong,
    None,
}

/// Trading signal produced once per (pair, closed candle)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Signal {
    pub pair: String,
    pub open_time: DateTime<Utc>,
    pub kind: SignalKind,
    pub rule_id: String,
}

impl Signal {
    pub fn new(pair: &str, open_time: DateTime<Utc>, kind: SignalKind, rule_id: &str) -> Self {
        Self {
            pair: pair.to_string(),
            open_time,
            kind,
            rule_id: rule_id.to_string(),
        }
    }

    pub fn none(pair: &str, open_time: DateTime<Utc>, rule_id: &str) -> Self {
        Self::new(pair, open_time, SignalKind::None, rule_id)
    }

    pub fn is_entry(&self) -> bool {
        self.kind == SignalKind::EntryLong
    }

    pub fn is_exit(&self) -> bool {
        self.kind == SignalKind::ExitLong
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Long,
}

/// Open-order instruction handed to the execution collaborator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntryInstruction {
    pub pair: String,
    pub direction: Direction,
    pub stake: f64,
    pub leverage: f64,
    pub entry_price: f64,
    pub stop_loss_price: f64,
    pub rule_id: String,
}

/// Close-order instruction handed to the execution collaborator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CloseInstruction {
    pub pair: String,
    pub exit_reason: ExitReason,
    pub exit_price: f64,
    /// Rule behind a custom exit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_rule: Option<String>,
}

/// Realized result of a closed position, fed back into the protections
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradeOutcome {
    pub pair: String,
    pub closed_at: DateTime<Utc>,
    pub profit_ratio: f64,
    pub was_stop_loss: bool,
    pub exit_reason: ExitReason,
}
