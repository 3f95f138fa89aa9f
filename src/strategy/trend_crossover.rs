use serde::{Deserialize, Serialize};

use crate::indicators::{is_volume_spike, IndicatorConfig, IndicatorEngine, IndicatorSnapshot};
use crate::strategy::signals::{crossed_above, crossed_below, Decision};
use crate::strategy::{Strategy, TradeState};

/// EMA crossover scalping strategy
///
/// Entry conditions (ALL must be true):
/// - Fast EMA crosses above medium EMA on the current candle
/// - Medium EMA is above slow EMA (uptrend)
/// - RSI strictly inside (rsi_lower, rsi_upper)
/// - Volume above volume_multiplier x trailing mean
///
/// Exit conditions (ANY triggers exit):
/// - Fast EMA crosses below medium EMA
/// - RSI at or beyond either bound
#[derive(Debug, Clone)]
pub struct TrendCrossoverStrategy {
    config: TrendCrossoverConfig,
    engine: IndicatorEngine,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendCrossoverConfig {
    pub indicators: IndicatorConfig,

    /// Lower RSI bound (exclusive) for entries
    pub rsi_lower: f64,

    /// Upper RSI bound (exclusive) for entries
    pub rsi_upper: f64,

    /// Volume multiplier to confirm the cross (e.g. 1.5 = 1.5x average volume)
    pub volume_multiplier: f64,
}

impl Default for TrendCrossoverConfig {
    fn default() -> Self {
        Self {
            indicators: IndicatorConfig::default(), // EMA 5/10/21, RSI 14
            rsi_lower: 30.0,
            rsi_upper: 70.0,
            volume_multiplier: 1.5,
        }
    }
}

impl TrendCrossoverStrategy {
    pub fn new(config: TrendCrossoverConfig) -> Self {
        let engine = IndicatorEngine::new(config.indicators.clone());
        Self { config, engine }
    }
}

impl Default for TrendCrossoverStrategy {
    fn default() -> Self {
        Self::new(TrendCrossoverConfig::default())
    }
}

impl Strategy for TrendCrossoverStrategy {
    fn name(&self) -> &str {
        "Trend Crossover"
    }

    fn indicators(&self) -> &IndicatorEngine {
        &self.engine
    }

    fn custom_exit(
        &self,
        trade: &TradeState,
        history: &[IndicatorSnapshot],
    ) -> Option<&'static str> {
        let cur = history.last()?;

        if trade.profit_ratio > 0.02 && trade.held_minutes < 2 {
            return Some("quick_profit_scalp");
        }
        if trade.profit_ratio > 0.005 && cur.rsi > 80.0 {
            return Some("rsi_extreme_exit");
        }
        None
    }

    fn evaluate(&self, history: &[IndicatorSnapshot]) -> Decision {
        let [.., prev, cur] = history else {
            return Decision::insufficient_data();
        };
        let c = &self.config;

        let rsi_in_band = cur.rsi > c.rsi_lower && cur.rsi < c.rsi_upper;
        let entry_conditions = [
            crossed_above(prev.ema_fast, prev.ema_medium, cur.ema_fast, cur.ema_medium),
            cur.ema_medium > cur.ema_slow,
            rsi_in_band,
            is_volume_spike(cur.volume, cur.volume_mean, c.volume_multiplier),
        ];

        tracing::debug!(
            "Trend Crossover Entry Check [{}]: ema {:.4}/{:.4}/{:.4}, rsi={:.1}, \
             volume_ratio={:.2}x | {}/4 conditions",
            cur.pair,
            cur.ema_fast,
            cur.ema_medium,
            cur.ema_slow,
            cur.rsi,
            cur.volume_ratio(),
            entry_conditions.iter().filter(|&&x| x).count()
        );

        if entry_conditions.iter().all(|&x| x) {
            return Decision::entry("ema_cross_up");
        }

        if crossed_below(prev.ema_fast, prev.ema_medium, cur.ema_fast, cur.ema_medium) {
            return Decision::exit("ema_cross_down");
        }
        if !rsi_in_band {
            return Decision::exit("rsi_out_of_band");
        }

        Decision::hold()
    }
}
