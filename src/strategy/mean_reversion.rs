use serde::{Deserialize, Serialize};

use crate::indicators::{IndicatorConfig, IndicatorEngine, IndicatorSnapshot};
use crate::strategy::signals::{crossed_below, Decision};
use crate::strategy::Strategy;

/// Mean reversion trading strategy
///
/// Buys oversold closes at or under the lower Bollinger band, filtered by
/// positive MACD and a minimum ADX so that only dips inside a live trend are
/// taken.
///
/// Entry conditions (ALL must be true):
/// - RSI below rsi_oversold
/// - Close at or below the lower band
/// - MACD above zero
/// - ADX above adx_min
///
/// Exit conditions (ANY triggers exit):
/// - RSI above rsi_overbought and close at or above the upper band
/// - MACD crosses below its signal line
#[derive(Debug, Clone)]
pub struct MeanReversionStrategy {
    config: MeanReversionConfig,
    engine: IndicatorEngine,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeanReversionConfig {
    pub indicators: IndicatorConfig,

    /// RSI level for "oversold" (e.g. 30)
    pub rsi_oversold: f64,

    /// RSI level for "overbought" (e.g. 70)
    pub rsi_overbought: f64,

    /// Minimum trend strength for entries
    pub adx_min: f64,
}

impl Default for MeanReversionConfig {
    fn default() -> Self {
        Self {
            indicators: IndicatorConfig::default(), // BB 20/2.0, RSI 14
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            adx_min: 20.0,
        }
    }
}

impl MeanReversionStrategy {
    pub fn new(config: MeanReversionConfig) -> Self {
        let engine = IndicatorEngine::new(config.indicators.clone());
        Self { config, engine }
    }
}

impl Default for MeanReversionStrategy {
    fn default() -> Self {
        Self::new(MeanReversionConfig::default())
    }
}

impl Strategy for MeanReversionStrategy {
    fn name(&self) -> &str {
        "Mean Reversion"
    }

    fn indicators(&self) -> &IndicatorEngine {
        &self.engine
    }

    fn evaluate(&self, history: &[IndicatorSnapshot]) -> Decision {
        let [.., prev, cur] = history else {
            return Decision::insufficient_data();
        };
        let c = &self.config;

        let entry_conditions = [
            cur.rsi < c.rsi_oversold,
            cur.close <= cur.bb_lower,
            cur.macd > 0.0,
            cur.adx > c.adx_min,
        ];

        tracing::debug!(
            "Mean Reversion Entry Check [{}]: rsi={:.1} (<{}?={}), \
             close={:.4} vs lower={:.4} ({}), macd={:.5} ({}), adx={:.1} (>{}?={})",
            cur.pair,
            cur.rsi,
            c.rsi_oversold,
            entry_conditions[0],
            cur.close,
            cur.bb_lower,
            entry_conditions[1],
            cur.macd,
            entry_conditions[2],
            cur.adx,
            c.adx_min,
            entry_conditions[3]
        );

        if entry_conditions.iter().all(|&x| x) {
            return Decision::entry("oversold_lower_band");
        }

        if cur.rsi > c.rsi_overbought && cur.close >= cur.bb_upper {
            return Decision::exit("overbought_upper_band");
        }
        if crossed_below(prev.macd, prev.macd_signal, cur.macd, cur.macd_signal) {
            return Decision::exit("macd_cross_down");
        }

        Decision::hold()
    }
}
