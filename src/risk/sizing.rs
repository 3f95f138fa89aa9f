use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::execution::Position;
use crate::models::{Direction, EntryInstruction, Signal};
use crate::risk::circuit_breakers::{LockScope, ProtectionLock};

/// One step of the ROI ladder: after `after_minutes` in the trade, close once
/// the leveraged profit ratio reaches `min_profit`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoiStep {
    pub after_minutes: i64,
    pub min_profit: f64,
}

/// Time-bucketed minimum profit targets, sorted by `after_minutes`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<RoiStep>", into = "Vec<RoiStep>")]
pub struct RoiTable {
    steps: Vec<RoiStep>,
}

impl RoiTable {
    pub fn new(mut steps: Vec<RoiStep>) -> Self {
        steps.sort_by_key(|s| s.after_minutes);
        Self { steps }
    }

    pub fn steps(&self) -> &[RoiStep] {
        &self.steps
    }

    /// Minimum profit required after `elapsed_minutes`; None before the first step
    pub fn min_profit_at(&self, elapsed_minutes: i64) -> Option<f64> {
        self.steps
            .iter()
            .take_while(|s| s.after_minutes <= elapsed_minutes)
            .last()
            .map(|s| s.min_profit)
    }
}

impl From<Vec<RoiStep>> for RoiTable {
    fn from(steps: Vec<RoiStep>) -> Self {
        Self::new(steps)
    }
}

impl From<RoiTable> for Vec<RoiStep> {
    fn from(table: RoiTable) -> Self {
        table.steps
    }
}

impl Default for RoiTable {
    fn default() -> Self {
        Self::new(vec![
            RoiStep { after_minutes: 0, min_profit: 0.15 },
            RoiStep { after_minutes: 60, min_profit: 0.10 },
            RoiStep { after_minutes: 120, min_profit: 0.05 },
            RoiStep { after_minutes: 180, min_profit: 0.02 },
        ])
    }
}

/// Trailing stop parameters, in leveraged profit-ratio terms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrailingStopConfig {
    pub enabled: bool,
    /// Distance kept below the best profit seen
    pub offset: f64,
    /// Best profit that must be reached before the stop trails at all
    pub activation: f64,
}

impl Default for TrailingStopConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            offset: 0.01,
            activation: 0.02,
        }
    }
}

/// Exit checks whose relative order is configurable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitCheck {
    Roi,
    TrailingStop,
}

impl ExitCheck {
    pub const DEFAULT_ORDER: [ExitCheck; 2] = [ExitCheck::Roi, ExitCheck::TrailingStop];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Fixed stake per trade, in quote currency
    pub stake_amount: f64,
    pub leverage: f64,
    /// Stop-loss distance as a (leveraged) profit ratio, e.g. 0.05
    pub stop_loss_pct: f64,
    /// Divide stop_loss_pct by leverage to get the price distance
    pub stop_loss_relative_to_leverage: bool,
    pub roi: RoiTable,
    pub trailing: TrailingStopConfig,
    /// Order of the ROI and trailing-stop checks; stop-loss always runs first
    /// and signal exits always last
    pub exit_order: Vec<ExitCheck>,
    /// Tighten the stop to `close - k * ATR` while the position is open; the
    /// stop never loosens and never drops below the fixed stop-loss
    pub atr_stop_multiplier: Option<f64>,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            stake_amount: 100.0,
            leverage: 10.0,
            stop_loss_pct: 0.05,
            stop_loss_relative_to_leverage: true,
            roi: RoiTable::default(),
            trailing: TrailingStopConfig::default(),
            exit_order: ExitCheck::DEFAULT_ORDER.to_vec(),
            atr_stop_multiplier: None,
        }
    }
}

/// Why an entry signal did not become a position
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryRejection {
    PositionOpen,
    Locked {
        scope: LockScope,
        reason: String,
        until: DateTime<Utc>,
    },
}

impl std::fmt::Display for EntryRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PositionOpen => write!(f, "position already open"),
            Self::Locked { scope, reason, until } => {
                write!(f, "{:?} lock until {}: {}", scope, until, reason)
            }
        }
    }
}

impl From<ProtectionLock> for EntryRejection {
    fn from(lock: ProtectionLock) -> Self {
        Self::Locked {
            scope: lock.scope,
            reason: lock.reason,
            until: lock.until,
        }
    }
}

#[derive(Debug, Clone)]
pub enum SizingDecision {
    Open(Position, EntryInstruction),
    Rejected(EntryRejection),
}

/// Turns accepted entry signals into provisional positions
#[derive(Debug, Clone)]
pub struct PositionSizer {
    config: RiskConfig,
}

impl PositionSizer {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn stop_loss_price(&self, entry_price: f64) -> f64 {
        let adjustment = if self.config.stop_loss_relative_to_leverage {
            self.config.leverage
        } else {
            1.0
        };
        entry_price * (1.0 - self.config.stop_loss_pct / adjustment)
    }

    /// Size an entry at `entry_price` for a position opened at `opened_at`.
    ///
    /// An open position takes precedence over a lock as rejection reason.
    pub fn size(
        &self,
        signal: &Signal,
        entry_price: f64,
        opened_at: DateTime<Utc>,
        has_open_position: bool,
        lock: Option<ProtectionLock>,
    ) -> SizingDecision {
        if has_open_position {
            return SizingDecision::Rejected(EntryRejection::PositionOpen);
        }
        if let Some(lock) = lock {
            return SizingDecision::Rejected(lock.into());
        }

        let stop_loss_price = self.stop_loss_price(entry_price);
        let position = Position::new(
            &signal.pair,
            entry_price,
            self.config.stake_amount,
            self.config.leverage,
            opened_at,
            stop_loss_price,
            self.config.roi.clone(),
            &signal.rule_id,
        );
        let instruction = EntryInstruction {
            pair: signal.pair.clone(),
            direction: Direction::Long,
            stake: self.config.stake_amount,
            leverage: self.config.leverage,
            entry_price,
            stop_loss_price,
            rule_id: signal.rule_id.clone(),
        };

        SizingDecision::Open(position, instruction)
    }
}

impl Default for PositionSizer {
    fn default() -> Self {
        Self::new(RiskConfig::default())
    }
}
