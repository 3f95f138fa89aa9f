use serde::{Deserialize, Serialize};

use crate::indicators::{is_volume_spike, IndicatorConfig, IndicatorEngine, IndicatorSnapshot};
use crate::strategy::signals::Decision;
use crate::strategy::{Strategy, TradeState};

/// Bollinger squeeze breakout strategy
///
/// Waits for the bands to compress (width below its trailing percentile),
/// then buys the first close that escapes the squeezed range upward with a
/// volume spike and Keltner confirmation. Exits once the expanded bands
/// contract back to their typical width, or the volume spike fades.
#[derive(Debug, Clone)]
pub struct VolatilityBreakoutStrategy {
    config: VolatilityBreakoutConfig,
    engine: IndicatorEngine,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolatilityBreakoutConfig {
    pub indicators: IndicatorConfig,

    /// Volume multiplier to confirm the breakout (e.g. 2.0 = 2x average volume)
    pub volume_multiplier: f64,

    /// How many candles before the current one may hold the squeeze
    pub squeeze_recency: usize,
}

impl Default for VolatilityBreakoutConfig {
    fn default() -> Self {
        Self {
            indicators: IndicatorConfig::default(), // BB 20/2.0, Keltner 20/2.0
            volume_multiplier: 2.0,
            squeeze_recency: 1,
        }
    }
}

impl VolatilityBreakoutStrategy {
    pub fn new(config: VolatilityBreakoutConfig) -> Self {
        let engine = IndicatorEngine::new(config.indicators.clone());
        Self { config, engine }
    }

    /// Top of the squeezed range: highest upper band among squeezed candles
    fn squeeze_ceiling(prior: &[IndicatorSnapshot]) -> Option<f64> {
        prior
            .iter()
            .filter(|s| s.squeeze)
            .map(|s| s.bb_upper)
            .fold(None, |acc, upper| Some(acc.map_or(upper, |a: f64| a.max(upper))))
    }
}

impl Default for VolatilityBreakoutStrategy {
    fn default() -> Self {
        Self::new(VolatilityBreakoutConfig::default())
    }
}

impl Strategy for VolatilityBreakoutStrategy {
    fn name(&self) -> &str {
        "Volatility Breakout"
    }

    fn indicators(&self) -> &IndicatorEngine {
        &self.engine
    }

    fn history_required(&self) -> usize {
        self.config.squeeze_recency.max(1) + 1
    }

    fn custom_exit(
        &self,
        trade: &TradeState,
        history: &[IndicatorSnapshot],
    ) -> Option<&'static str> {
        let cur = history.last()?;

        if trade.profit_ratio > 0.03 {
            return Some("high_profit_exit");
        }
        // Bands compressed again: the move is over
        if trade.profit_ratio > 0.01 && cur.squeeze {
            return Some("squeeze_return_exit");
        }
        if trade.profit_ratio > 0.008 && cur.rsi > 75.0 {
            return Some("rsi_extreme_exit");
        }
        None
    }

    fn evaluate(&self, history: &[IndicatorSnapshot]) -> Decision {
        let Some((cur, prior)) = history.split_last() else {
            return Decision::insufficient_data();
        };
        let Some(prev) = prior.last() else {
            return Decision::insufficient_data();
        };
        let c = &self.config;

        if let Some(ceiling) = Self::squeeze_ceiling(prior) {
            let breakout = cur.close > ceiling;
            let volume_ok = is_volume_spike(cur.volume, cur.volume_mean, c.volume_multiplier);
            let keltner_ok = cur.close > cur.keltner_upper;

            tracing::debug!(
                "Squeeze Breakout Check [{}]: close={:.4} ceiling={:.4} ({}), \
             volume_ratio={:.2}x ({}), keltner_upper={:.4} ({})",
                cur.pair,
                cur.close,
                ceiling,
                breakout,
                cur.volume_ratio(),
                volume_ok,
                cur.keltner_upper,
                keltner_ok
            );

            if breakout && volume_ok && keltner_ok {
                return Decision::entry("squeeze_breakout");
            }
        }

        // Only the move from expanded back to typical counts
        if prev.bb_width > prev.bb_width_typical && cur.bb_width <= cur.bb_width_typical {
            return Decision::exit("width_normalized");
        }
        if is_volume_spike(prev.volume, prev.volume_mean, c.volume_multiplier)
            && cur.volume < cur.volume_mean
        {
            return Decision::exit("volume_normalized");
        }

        Decision::hold()
    }
}
