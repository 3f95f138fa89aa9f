use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::TradeOutcome;

/// Whether a lock blocks one pair or every pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockScope {
    Pair,
    Global,
}

/// Entry lock requested by a guard or reported by the protection manager
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProtectionLock {
    pub scope: LockScope,
    pub until: DateTime<Utc>,
    pub reason: String,
}

/// Circuit breaker evaluated after every trade closure.
///
/// `outcomes` are the outcomes visible in the guard's scope, ordered by
/// `closed_at`; `now` is the newest `closed_at` among them and `candle` the
/// duration of one candle.
pub trait ProtectionGuard: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    fn scope(&self) -> LockScope;

    /// How far back (in candles) this guard looks at outcomes
    fn lookback_candles(&self) -> u32;

    fn evaluate(
        &self,
        outcomes: &[TradeOutcome],
        now: DateTime<Utc>,
        candle: Duration,
    ) -> Option<ProtectionLock>;
}

/// Outcomes strictly inside the trailing lookback window ending at `now`
fn in_window<'a>(
    outcomes: &'a [TradeOutcome],
    now: DateTime<Utc>,
    lookback: Duration,
) -> impl Iterator<Item = &'a TradeOutcome> {
    let start = now - lookback;
    outcomes
        .iter()
        .filter(move |o| o.closed_at > start && o.closed_at <= now)
}

fn candles(candle: Duration, count: u32) -> Duration {
    candle * count as i32
}

fn scope_for(only_per_pair: bool) -> LockScope {
    if only_per_pair {
        LockScope::Pair
    } else {
        LockScope::Global
    }
}

/// Locks after too many stop-loss exits within the lookback window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoplossGuard {
    pub trade_limit: usize,
    pub lookback_period_candles: u32,
    pub stop_duration_candles: u32,
    pub only_per_pair: bool,
    /// Only stop-loss exits with profit below this count
    pub required_profit: f64,
}

impl Default for StoplossGuard {
    fn default() -> Self {
        Self {
            trade_limit: 3,
            lookback_period_candles: 60,
            stop_duration_candles: 20,
            only_per_pair: false,
            required_profit: 0.0,
        }
    }
}

impl ProtectionGuard for StoplossGuard {
    fn name(&self) -> &'static str {
        "StoplossGuard"
    }

    fn scope(&self) -> LockScope {
        scope_for(self.only_per_pair)
    }

    fn lookback_candles(&self) -> u32 {
        self.lookback_period_candles
    }

    fn evaluate(
        &self,
        outcomes: &[TradeOutcome],
        now: DateTime<Utc>,
        candle: Duration,
    ) -> Option<ProtectionLock> {
        let lookback = candles(candle, self.lookback_period_candles);
        let stops = in_window(outcomes, now, lookback)
            .filter(|o| o.was_stop_loss && o.profit_ratio < self.required_profit)
            .count();

        if stops < self.trade_limit {
            return None;
        }

        Some(ProtectionLock {
            scope: self.scope(),
            until: now + candles(candle, self.stop_duration_candles),
            reason: format!(
                "{} stoplosses in {} candles",
                stops, self.lookback_period_candles
            ),
        })
    }
}

/// Locks when the trailing trades draw cumulative profit down too far
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaxDrawdown {
    pub trade_limit: usize,
    pub lookback_period_candles: u32,
    pub stop_duration_candles: u32,
    pub max_allowed_drawdown: f64,
    pub only_per_pair: bool,
}

impl Default for MaxDrawdown {
    fn default() -> Self {
        Self {
            trade_limit: 20,
            lookback_period_candles: 200,
            stop_duration_candles: 12,
            max_allowed_drawdown: 0.15,
            only_per_pair: false,
        }
    }
}

/// Tolerance for a drawdown landing exactly on the limit
const DRAWDOWN_EPSILON: f64 = 1e-9;

/// Largest peak-to-trough fall of the cumulative profit, starting from zero
pub fn cumulative_drawdown(profits: impl IntoIterator<Item = f64>) -> f64 {
    let mut cumulative = 0.0_f64;
    let mut peak = 0.0_f64;
    let mut max_drawdown = 0.0_f64;

    for profit in profits {
        cumulative += profit;
        peak = peak.max(cumulative);
        max_drawdown = max_drawdown.max(peak - cumulative);
    }

    max_drawdown
}

impl ProtectionGuard for MaxDrawdown {
    fn name(&self) -> &'static str {
        "MaxDrawdown"
    }

    fn scope(&self) -> LockScope {
        scope_for(self.only_per_pair)
    }

    fn lookback_candles(&self) -> u32 {
        self.lookback_period_candles
    }

    fn evaluate(
        &self,
        outcomes: &[TradeOutcome],
        now: DateTime<Utc>,
        candle: Duration,
    ) -> Option<ProtectionLock> {
        let lookback = candles(candle, self.lookback_period_candles);
        let window: Vec<f64> = in_window(outcomes, now, lookback)
            .map(|o| o.profit_ratio)
            .collect();

        if window.len() < self.trade_limit {
            return None;
        }

        let recent = &window[window.len() - self.trade_limit..];
        let drawdown = cumulative_drawdown(recent.iter().copied());
        if drawdown + DRAWDOWN_EPSILON < self.max_allowed_drawdown {
            return None;
        }

        Some(ProtectionLock {
            scope: self.scope(),
            until: now + candles(candle, self.stop_duration_candles),
            reason: format!(
                "drawdown {:.4} over last {} trades >= {:.4}",
                drawdown, self.trade_limit, self.max_allowed_drawdown
            ),
        })
    }
}

/// Pauses a pair for a few candles after every exit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CooldownPeriod {
    pub stop_duration_candles: u32,
}

impl Default for CooldownPeriod {
    fn default() -> Self {
        Self {
            stop_duration_candles: 2,
        }
    }
}

impl ProtectionGuard for CooldownPeriod {
    fn name(&self) -> &'static str {
        "CooldownPeriod"
    }

    fn scope(&self) -> LockScope {
        LockScope::Pair
    }

    fn lookback_candles(&self) -> u32 {
        0
    }

    fn evaluate(
        &self,
        outcomes: &[TradeOutcome],
        now: DateTime<Utc>,
        candle: Duration,
    ) -> Option<ProtectionLock> {
        let last = outcomes.last()?;
        if last.closed_at != now || self.stop_duration_candles == 0 {
            return None;
        }

        Some(ProtectionLock {
            scope: LockScope::Pair,
            until: now + candles(candle, self.stop_duration_candles),
            reason: format!("cooldown for {} candles", self.stop_duration_candles),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::ExitReason;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn outcome(minute: i64, profit_ratio: f64, was_stop_loss: bool) -> TradeOutcome {
        TradeOutcome {
            pair: "SOL/USDT".to_string(),
            closed_at: t0() + Duration::minutes(minute),
            profit_ratio,
            was_stop_loss,
            exit_reason: if was_stop_loss {
                ExitReason::StopLoss
            } else {
                ExitReason::Roi
            },
        }
    }

    const CANDLE: i64 = 5;

    fn candle() -> Duration {
        Duration::minutes(CANDLE)
    }

    #[test]
    fn test_stoploss_guard_trips_at_limit() {
        let guard = StoplossGuard::default();
        let outcomes = vec![
            outcome(10, -0.05, true),
            outcome(50, -0.05, true),
            outcome(100, -0.05, true),
        ];
        let now = outcomes[2].closed_at;

        let lock = guard.evaluate(&outcomes, now, candle()).unwrap();
        assert_eq!(lock.until, now + Duration::minutes(20 * CANDLE));
        assert_eq!(lock.scope, LockScope::Global);

        assert!(guard.evaluate(&outcomes[..2], outcomes[1].closed_at, candle()).is_none());
    }

    #[test]
    fn test_stoploss_guard_ignores_old_and_non_stop_exits() {
        let guard = StoplossGuard::default();
        // Lookback is 60 candles = 300 minutes
        let outcomes = vec![
            outcome(0, -0.05, true),
            outcome(200, 0.02, false),
            outcome(250, -0.05, true),
            outcome(300, -0.05, true),
        ];
        // The first stop sits exactly on the window edge and is excluded
        assert!(guard.evaluate(&outcomes, outcomes[3].closed_at, candle()).is_none());
    }

    #[test]
    fn test_stoploss_guard_required_profit() {
        let guard = StoplossGuard {
            trade_limit: 1,
            ..StoplossGuard::default()
        };
        // A stop-loss that still made money does not count
        let outcomes = vec![outcome(10, 0.01, true)];
        assert!(guard.evaluate(&outcomes, outcomes[0].closed_at, candle()).is_none());
    }

    #[test]
    fn test_cumulative_drawdown_from_zero_baseline() {
        assert!((cumulative_drawdown([-0.15]) - 0.15).abs() < 1e-12);
        assert!((cumulative_drawdown([0.10, -0.05, -0.10, 0.02]) - 0.15).abs() < 1e-12);
        assert_eq!(cumulative_drawdown([0.05, 0.05]), 0.0);
    }

    #[test]
    fn test_max_drawdown_exact_limit_trips() {
        let guard = MaxDrawdown {
            trade_limit: 3,
            ..MaxDrawdown::default()
        };
        let outcomes = vec![
            outcome(10, 0.10, false),
            outcome(20, -0.10, true),
            outcome(30, -0.05, true),
        ];
        // Peak 0.10, trough -0.05
        let lock = guard.evaluate(&outcomes, outcomes[2].closed_at, candle());
        assert!(lock.is_some());

        let below = vec![
            outcome(10, 0.0, false),
            outcome(20, -0.05, true),
            outcome(30, -0.0999, true),
        ];
        // 0.1499 drawdown, one basis point short
        assert!(guard.evaluate(&below, below[2].closed_at, candle()).is_none());
    }

    #[test]
    fn test_max_drawdown_needs_trade_limit_outcomes() {
        let guard = MaxDrawdown {
            trade_limit: 3,
            ..MaxDrawdown::default()
        };
        let outcomes = vec![outcome(10, -0.5, true), outcome(20, -0.5, true)];
        assert!(guard.evaluate(&outcomes, outcomes[1].closed_at, candle()).is_none());
    }

    #[test]
    fn test_max_drawdown_uses_trailing_trades() {
        let guard = MaxDrawdown {
            trade_limit: 2,
            ..MaxDrawdown::default()
        };
        // The big loss falls out of the trailing two trades
        let outcomes = vec![
            outcome(10, -0.5, true),
            outcome(20, 0.01, false),
            outcome(30, 0.01, false),
        ];
        assert!(guard.evaluate(&outcomes, outcomes[2].closed_at, candle()).is_none());
    }

    #[test]
    fn test_cooldown_locks_pair_after_exit() {
        let guard = CooldownPeriod::default();
        let outcomes = vec![outcome(10, 0.02, false)];
        let now = outcomes[0].closed_at;

        let lock = guard.evaluate(&outcomes, now, candle()).unwrap();
        assert_eq!(lock.scope, LockScope::Pair);
        assert_eq!(lock.until, now + Duration::minutes(2 * CANDLE));
    }
}
