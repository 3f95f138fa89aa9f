use serde::{Deserialize, Serialize};

use crate::indicators::{is_volume_spike, IndicatorConfig, IndicatorEngine, IndicatorSnapshot};
use crate::strategy::signals::{crossed_above, crossed_below, Decision};
use crate::strategy::{Strategy, TradeState};

/// MACD + EMA stack trend-following strategy
///
/// Entry conditions (ALL must be true):
/// - MACD crosses above its signal line
/// - EMA(12) > EMA(21) > EMA(50)
/// - Volume above volume_multiplier x trailing mean
/// - RSI below rsi_max (not overextended)
/// - ADX above adx_min
///
/// Exit conditions (ANY triggers exit):
/// - MACD crosses below its signal line
/// - Trend structure breaks: close under EMA(12) while EMA(12) < EMA(21)
#[derive(Debug, Clone)]
pub struct TrendFollowingStrategy {
    config: TrendFollowingConfig,
    engine: IndicatorEngine,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendFollowingConfig {
    pub indicators: IndicatorConfig,

    /// Volume multiplier to confirm the cross (e.g. 1.8 = 1.8x average volume)
    pub volume_multiplier: f64,

    /// Entries are skipped at or above this RSI
    pub rsi_max: f64,

    /// Minimum trend strength for entries
    pub adx_min: f64,
}

impl Default for TrendFollowingConfig {
    fn default() -> Self {
        Self {
            indicators: IndicatorConfig {
                ema_fast: 12,
                ema_medium: 21,
                ema_slow: 50,
                ..IndicatorConfig::default()
            },
            volume_multiplier: 1.8,
            rsi_max: 70.0,
            adx_min: 25.0,
        }
    }
}

impl TrendFollowingStrategy {
    pub fn new(config: TrendFollowingConfig) -> Self {
        let engine = IndicatorEngine::new(config.indicators.clone());
        Self { config, engine }
    }
}

impl Default for TrendFollowingStrategy {
    fn default() -> Self {
        Self::new(TrendFollowingConfig::default())
    }
}

impl Strategy for TrendFollowingStrategy {
    fn name(&self) -> &str {
        "Trend Following"
    }

    fn indicators(&self) -> &IndicatorEngine {
        &self.engine
    }
    fn custom_exit(
        &self,
        trade: &TradeState,
        history: &[IndicatorSnapshot],
    ) -> Option<&'static str> {
        let [.., oldest, prev, cur] = history else {
            return None;
        };

        if trade.profit_ratio > 0.15 && cur.rsi > 85.0 {
            return Some("high_profit_extreme_rsi");
        }
        // Momentum fading for three candles in a row
        if trade.profit_ratio > 0.05
            && cur.macd_hist < prev.macd_hist
            && prev.macd_hist < oldest.macd_hist
        {
            return Some("macd_histogram_declining");
        }
        None
    }

    fn evaluate(&self, history: &[IndicatorSnapshot]) -> Decision {
        let [.., prev, cur] = history else {
            return Decision::insufficient_data();
        };
        let c = &self.config;

        let entry_conditions = [
            crossed_above(prev.macd, prev.macd_signal, cur.macd, cur.macd_signal),
            cur.ema_fast > cur.ema_medium && cur.ema_medium > cur.ema_slow,
            is_volume_spike(cur.volume, cur.volume_mean, c.volume_multiplier),
            cur.rsi < c.rsi_max,
            cur.adx > c.adx_min,
        ];

        tracing::debug!(
            "Trend Following Entry Check [{}]: macd={:.5}/{:.5}, ema {:.4}/{:.4}/{:.4}, \
             volume_ratio={:.2}x, rsi={:.1}, adx={:.1} | {}/5 conditions",
            cur.pair,
            cur.macd,
            cur.macd_signal,
            cur.ema_fast,
            cur.ema_medium,
            cur.ema_slow,
            cur.volume_ratio(),
            cur.rsi,
            cur.adx,
            entry_conditions.iter().filter(|&&x| x).count()
        );

        if entry_conditions.iter().all(|&x| x) {
            return Decision::entry("macd_cross_up");
        }

        if crossed_below(prev.macd, prev.macd_signal, cur.macd, cur.macd_signal) {
            return Decision::exit("macd_cross_down");
        }
        if cur.close < cur.ema_fast && cur.ema_fast < cur.ema_medium {
            return Decision::exit("trend_break");
        }

        Decision::hold()
    }
}
