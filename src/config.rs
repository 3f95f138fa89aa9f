use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::risk::{ExitCheck, ProtectionConfig, RiskConfig};
use crate::strategy::StrategyConfig;

/// Static per-run configuration for the whole engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Candle duration; candle-denominated settings are converted with it
    pub timeframe_minutes: i64,
    /// Candles kept per pair for indicator recomputation
    pub window_size: usize,
    pub strategy: StrategyConfig,
    pub risk: RiskConfig,
    pub protections: ProtectionConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeframe_minutes: 5,
            window_size: 200,
            strategy: StrategyConfig::default(),
            risk: RiskConfig::default(),
            protections: ProtectionConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Defaults for `strategy`, with that variant's risk preset
    pub fn for_strategy(strategy: StrategyConfig) -> Self {
        Self {
            risk: strategy.risk_preset(),
            strategy,
            ..Self::default()
        }
    }

    /// Load from an optional TOML file layered with `TRADEGUARD__*` env vars,
    /// then validate
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix("TRADEGUARD")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;

        tracing::debug!("Loaded engine config: {:?}", config);
        Ok(config)
    }

    /// Reject settings the engine can't run with
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(EngineError::InvalidConfig(msg));

        // -- Feed ---------------------------------------------------------------
        if self.timeframe_minutes <= 0 {
            return invalid(format!(
                "timeframe_minutes must be positive, got {}",
                self.timeframe_minutes
            ));
        }
        let needed = self.strategy.build().min_candles_required();
        if self.window_size < needed {
            return invalid(format!(
                "window_size {} is shorter than the {} candles the strategy needs",
                self.window_size, needed
            ));
        }

        // -- Risk ---------------------------------------------------------------
        let risk = &self.risk;
        if !(risk.stake_amount > 0.0) {
            return invalid(format!(
                "stake_amount must be positive, got {}",
                risk.stake_amount
            ));
        }
        if !(risk.leverage >= 1.0) {
            return invalid(format!(
                "leverage must be at least 1, got {}",
                risk.leverage
            ));
        }
        if !(risk.stop_loss_pct > 0.0 && risk.stop_loss_pct < 1.0) {
            return invalid(format!(
                "stop_loss_pct must be in (0, 1), got {}",
                risk.stop_loss_pct
            ));
        }
        if risk.roi.steps().is_empty() {
            return invalid("roi ladder is empty".to_string());
        }
        if risk
            .roi
            .steps()
            .iter()
            .any(|s| s.after_minutes < 0 || !s.min_profit.is_finite())
        {
            return invalid("roi steps need non-negative minutes and finite profits".to_string());
        }
        if risk.trailing.enabled
            && !(risk.trailing.offset > 0.0 && risk.trailing.activation >= risk.trailing.offset)
        {
            return invalid(format!(
                "trailing stop needs 0 < offset <= activation, got offset {} activation {}",
                risk.trailing.offset, risk.trailing.activation
            ));
        }
        let unique: HashSet<_> = risk.exit_order.iter().collect();
        if unique.len() != risk.exit_order.len() {
            return invalid("exit_order lists a check twice".to_string());
        }
        if let Some(missing) = ExitCheck::DEFAULT_ORDER
            .iter()
            .find(|check| !unique.contains(check))
        {
            return invalid(format!("exit_order must list every check, {:?} is missing", missing));
        }
        if let Some(k) = risk.atr_stop_multiplier {
            if !(k > 0.0 && k.is_finite()) {
                return invalid(format!("atr_stop_multiplier must be positive, got {}", k));
            }
        }

        // -- Protections --------------------------------------------------------
        if let Some(g) = &self.protections.stoploss_guard {
            if g.trade_limit == 0
                || g.lookback_period_candles == 0
                || g.stop_duration_candles == 0
            {
                return invalid("stoploss_guard limits must be non-zero".to_string());
            }
        }
        if let Some(g) = &self.protections.max_drawdown {
            if g.trade_limit == 0
                || g.lookback_period_candles == 0
                || g.stop_duration_candles == 0
            {
                return invalid("max_drawdown limits must be non-zero".to_string());
            }
            if !(g.max_allowed_drawdown > 0.0) {
                return invalid(format!(
                    "max_allowed_drawdown must be positive, got {}",
                    g.max_allowed_drawdown
                ));
            }
        }

        Ok(())
    }
}
