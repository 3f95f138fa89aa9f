use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::TradeOutcome;
use crate::risk::circuit_breakers::{
    CooldownPeriod, LockScope, MaxDrawdown, ProtectionGuard, ProtectionLock, StoplossGuard,
};

/// Which guards run; a missing entry disables that guard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtectionConfig {
    pub stoploss_guard: Option<StoplossGuard>,
    pub max_drawdown: Option<MaxDrawdown>,
    pub cooldown_period: Option<CooldownPeriod>,
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self {
            stoploss_guard: Some(StoplossGuard::default()),
            max_drawdown: Some(MaxDrawdown::default()),
            cooldown_period: None,
        }
    }
}

impl ProtectionConfig {
    /// Guards in evaluation order
    pub fn build_guards(&self) -> Vec<Arc<dyn ProtectionGuard>> {
        let mut guards: Vec<Arc<dyn ProtectionGuard>> = Vec::new();
        if let Some(g) = &self.stoploss_guard {
            guards.push(Arc::new(g.clone()));
        }
        if let Some(g) = &self.max_drawdown {
            guards.push(Arc::new(g.clone()));
        }
        if let Some(g) = &self.cooldown_period {
            guards.push(Arc::new(g.clone()));
        }
        guards
    }
}

/// Lock state for one scope (a pair, or the whole engine)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProtectionState {
    pub scope: LockScope,
    pub locked_until: Option<DateTime<Utc>>,
    pub trigger_reason: Option<String>,
}

impl ProtectionState {
    pub fn new(scope: LockScope) -> Self {
        Self {
            scope,
            locked_until: None,
            trigger_reason: None,
        }
    }

    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| now < until)
    }

    /// Active lock at `now`; an expired record reads as unlocked
    pub fn active_lock(&self, now: DateTime<Utc>) -> Option<ProtectionLock> {
        let until = self.locked_until.filter(|&until| now < until)?;
        Some(ProtectionLock {
            scope: self.scope,
            until,
            reason: self.trigger_reason.clone().unwrap_or_default(),
        })
    }

    /// Extend the lock to `lock.until`; never shortens an active lock.
    ///
    /// Returns true when the lock end moved.
    pub fn apply(&mut self, lock: &ProtectionLock, now: DateTime<Utc>) -> bool {
        if !self.is_locked(now) {
            self.locked_until = None;
            self.trigger_reason = None;
        }

        if self.locked_until.is_some_and(|current| current >= lock.until) {
            return false;
        }

        self.locked_until = Some(lock.until);
        self.trigger_reason = Some(lock.reason.clone());
        true
    }
}

/// Outcome history plus lock state for one scope
#[derive(Debug)]
struct ScopeLedger {
    outcomes: Vec<TradeOutcome>,
    state: ProtectionState,
}

impl ScopeLedger {
    fn new(scope: LockScope) -> Self {
        Self {
            outcomes: Vec::new(),
            state: ProtectionState::new(scope),
        }
    }

    fn insert(&mut self, outcome: TradeOutcome) {
        let idx = self
            .outcomes
            .partition_point(|o| o.closed_at <= outcome.closed_at);
        self.outcomes.insert(idx, outcome);
    }

    /// Run the guards of `scope`, apply the latest-ending lock, then drop
    /// outcomes no guard can see any more.
    ///
    /// The ledger clock is the newest `closed_at` it holds, so an outcome
    /// reported late is judged against the current window rather than one
    /// that has already been pruned.
    fn evaluate(
        &mut self,
        guards: &[Arc<dyn ProtectionGuard>],
        scope: LockScope,
        candle: Duration,
    ) -> Option<ProtectionLock> {
        let now = self.outcomes.last()?.closed_at;
        let in_scope = || guards.iter().filter(|g| g.scope() == scope);

        let lock = in_scope()
            .filter_map(|g| {
                let lock = g.evaluate(&self.outcomes, now, candle);
                if let Some(lock) = &lock {
                    tracing::debug!("{} requests {:?} lock until {}", g.name(), scope, lock.until);
                }
                lock
            })
            .max_by_key(|lock| lock.until);

        let max_lookback = in_scope().map(|g| g.lookback_candles()).max().unwrap_or(0);
        let horizon = now - candle * max_lookback as i32;
        self.outcomes.retain(|o| o.closed_at > horizon);

        let lock = lock?;
        self.state.apply(&lock, now).then_some(lock)
    }
}

/// Engine-wide protection cell shared by every pair
#[derive(Debug)]
pub struct GlobalProtection {
    inner: Mutex<ScopeLedger>,
}

impl GlobalProtection {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ScopeLedger::new(LockScope::Global)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ScopeLedger> {
        // Ledger mutations are single insert/retain/assign steps
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> ProtectionState {
        self.lock().state.clone()
    }

    pub fn active_lock(&self, now: DateTime<Utc>) -> Option<ProtectionLock> {
        self.lock().state.active_lock(now)
    }
}

impl Default for GlobalProtection {
    fn default() -> Self {
        Self::new()
    }
}

/// Protection state owned by one pair's evaluation sequence, plus a handle to
/// the shared global cell
#[derive(Debug)]
pub struct ProtectionManager {
    pair: String,
    guards: Vec<Arc<dyn ProtectionGuard>>,
    candle: Duration,
    ledger: ScopeLedger,
    global: Arc<GlobalProtection>,
}

impl ProtectionManager {
    pub fn new(
        pair: &str,
        guards: Vec<Arc<dyn ProtectionGuard>>,
        timeframe_minutes: i64,
        global: Arc<GlobalProtection>,
    ) -> Self {
        Self {
            pair: pair.to_string(),
            guards,
            candle: Duration::minutes(timeframe_minutes),
            ledger: ScopeLedger::new(LockScope::Pair),
            global,
        }
    }

    pub fn pair_state(&self) -> &ProtectionState {
        &self.ledger.state
    }

    pub fn global(&self) -> &Arc<GlobalProtection> {
        &self.global
    }

    /// Feed a closed trade to every guard. Returns the locks that moved.
    pub fn record_outcome(&mut self, outcome: TradeOutcome) -> Vec<ProtectionLock> {
        let mut applied = Vec::new();

        self.ledger.insert(outcome.clone());
        if let Some(lock) = self.ledger.evaluate(&self.guards, LockScope::Pair, self.candle) {
            tracing::info!("🔒 {} locked until {}: {}", self.pair, lock.until, lock.reason);
            applied.push(lock);
        }

        let mut global = self.global.lock();
        global.insert(outcome);
        if let Some(lock) = global.evaluate(&self.guards, LockScope::Global, self.candle) {
            tracing::info!(
                "🔒 all pairs locked until {} (after {} exit): {}",
                lock.until,
                self.pair,
                lock.reason
            );
            applied.push(lock);
        }

        applied
    }

    /// Active lock blocking entries for this pair at `now`, whichever of the
    /// pair and global locks ends later
    pub fn check(&self, now: DateTime<Utc>) -> Option<ProtectionLock> {
        let pair_lock = self.ledger.state.active_lock(now);
        let global_lock = self.global.active_lock(now);

        match (pair_lock, global_lock) {
            (Some(p), Some(g)) => Some(if g.until > p.until { g } else { p }),
            (p, g) => p.or(g),
        }
    }
}
