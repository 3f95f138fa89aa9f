// Trading strategy module
pub mod mean_reversion;
pub mod signals;
pub mod trend_crossover;
pub mod trend_following;
pub mod volatility_breakout;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::indicators::{IndicatorConfig, IndicatorEngine, IndicatorSnapshot};
use crate::models::{Candle, Signal};
use crate::risk::{RiskConfig, RoiStep, RoiTable, TrailingStopConfig};

pub use mean_reversion::{MeanReversionConfig, MeanReversionStrategy};
pub use signals::{crossed_above, crossed_below, crossover, Cross, Decision};
pub use trend_crossover::{TrendCrossoverConfig, TrendCrossoverStrategy};
pub use trend_following::{TrendFollowingConfig, TrendFollowingStrategy};
pub use volatility_breakout::{VolatilityBreakoutConfig, VolatilityBreakoutStrategy};

/// Common evaluation contract for every rule variant.
///
/// Implementations are pure: the decision depends only on the snapshot
/// history passed in, never on state kept between calls.
pub trait Strategy: Send + Sync {
    /// Get strategy name
    fn name(&self) -> &str;

    /// Indicator engine configured with this variant's periods
    fn indicators(&self) -> &IndicatorEngine;

    /// Snapshots (current one included) the rule looks at
    fn history_required(&self) -> usize {
        2
    }

    /// Decide on the last snapshot of `history` (oldest first)
    fn evaluate(&self, history: &[IndicatorSnapshot]) -> Decision;

    /// Minimum candles required before this strategy can emit anything but NONE
    fn min_candles_required(&self) -> usize {
        self.indicators().warmup() + self.history_required() - 1
    }

    /// Rule-specific early exit for an open, confirmed position, checked after
    /// ROI and trailing stop and before the signal exit.
    ///
    /// `history` ends with the snapshot of the candle being evaluated.
    fn custom_exit(
        &self,
        _trade: &TradeState,
        _history: &[IndicatorSnapshot],
    ) -> Option<&'static str> {
        None
    }

    /// Signal for the last candle of `window` together with the trailing
    /// snapshots it was decided on.
    ///
    /// Returns `None` only for an empty window; a window that is still warming
    /// up yields a NONE signal tagged `insufficient_data` and no snapshots.
    fn analyze(&self, window: &[Candle]) -> Option<Analysis> {
        let current = window.last()?;

        let mut snapshots = self.indicators().compute(window);
        let current_row = snapshots
            .last()
            .is_some_and(|last| last.open_time == current.open_time);
        let keep = self.history_required().max(CUSTOM_EXIT_HISTORY);
        let start = snapshots.len().saturating_sub(keep);
        let mut history = if current_row {
            snapshots.split_off(start)
        } else {
            Vec::new()
        };

        let decision = if history.len() < self.history_required() {
            history.clear();
            Decision::insufficient_data()
        } else {
            let from = history.len() - self.history_required();
            self.evaluate(&history[from..])
        };

        Some(Analysis {
            signal: Signal::new(
                &current.pair,
                current.open_time,
                decision.kind,
                decision.rule_id,
            ),
            snapshots: history,
        })
    }

    /// Generate the signal for the last (most recent closed) candle of `window`
    fn generate_signal(&self, window: &[Candle]) -> Option<Signal> {
        self.analyze(window).map(|analysis| analysis.signal)
    }
}

/// Snapshots kept for custom exits that look back over several candles
const CUSTOM_EXIT_HISTORY: usize = 3;

/// Output of [`Strategy::analyze`]
#[derive(Debug, Clone)]
pub struct Analysis {
    pub signal: Signal,
    /// Trailing snapshots, oldest first, ending at the signal's candle
    pub snapshots: Vec<IndicatorSnapshot>,
}

impl Analysis {
    pub fn latest(&self) -> Option<&IndicatorSnapshot> {
        self.snapshots.last()
    }
}

/// Open position as seen by a custom exit rule
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeState {
    /// Leveraged profit ratio at the candle close
    pub profit_ratio: f64,
    pub held_minutes: i64,
}

/// Rule variant selection plus its parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum StrategyConfig {
    TrendCrossover(TrendCrossoverConfig),
    VolatilityBreakout(VolatilityBreakoutConfig),
    MeanReversion(MeanReversionConfig),
    TrendFollowing(TrendFollowingConfig),
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self::TrendCrossover(TrendCrossoverConfig::default())
    }
}

impl StrategyConfig {
    pub fn build(&self) -> Arc<dyn Strategy> {
        match self {
            Self::TrendCrossover(c) => Arc::new(TrendCrossoverStrategy::new(c.clone())),
            Self::VolatilityBreakout(c) => Arc::new(VolatilityBreakoutStrategy::new(c.clone())),
            Self::MeanReversion(c) => Arc::new(MeanReversionStrategy::new(c.clone())),
            Self::TrendFollowing(c) => Arc::new(TrendFollowingStrategy::new(c.clone())),
        }
    }

    pub fn indicators(&self) -> &IndicatorConfig {
        match self {
            Self::TrendCrossover(c) => &c.indicators,
            Self::VolatilityBreakout(c) => &c.indicators,
            Self::MeanReversion(c) => &c.indicators,
            Self::TrendFollowing(c) => &c.indicators,
        }
    }

    /// Parse a variant name as used on the command line
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "trend_crossover" => Some(Self::TrendCrossover(Default::default())),
            "volatility_breakout" => Some(Self::VolatilityBreakout(Default::default())),
            "mean_reversion" => Some(Self::MeanReversion(Default::default())),
            "trend_following" => Some(Self::TrendFollowing(Default::default())),
            _ => None,
        }
    }

    /// Stop-loss, ROI ladder, trailing stop and ATR stop tuned for this
    /// variant's timeframe and trade length
    pub fn risk_preset(&self) -> RiskConfig {
        let ladder = |steps: &[(i64, f64)]| {
            RoiTable::new(
                steps
                    .iter()
                    .map(|&(after_minutes, min_profit)| RoiStep { after_minutes, min_profit })
                    .collect(),
            )
        };
        let trailing = |offset, activation| TrailingStopConfig {
            enabled: true,
            offset,
            activation,
        };

        match self {
            // 1m scalping
            Self::TrendCrossover(_) => RiskConfig {
                stop_loss_pct: 0.02,
                roi: ladder(&[(0, 0.03), (3, 0.02), (5, 0.015), (10, 0.01), (15, 0.005)]),
                trailing: trailing(0.005, 0.01),
                atr_stop_multiplier: Some(1.5),
                ..RiskConfig::default()
            },
            // 5m squeeze scalping
            Self::VolatilityBreakout(_) => RiskConfig {
                stop_loss_pct: 0.025,
                roi: ladder(&[(0, 0.04), (5, 0.025), (10, 0.02), (20, 0.015), (30, 0.01)]),
                trailing: trailing(0.008, 0.015),
                atr_stop_multiplier: Some(2.0),
                ..RiskConfig::default()
            },
            // 1h swing; the engine-wide defaults
            Self::MeanReversion(_) => RiskConfig::default(),
            // 4h trend riding
            Self::TrendFollowing(_) => RiskConfig {
                stop_loss_pct: 0.06,
                roi: ladder(&[(0, 0.20), (120, 0.15), (240, 0.10), (480, 0.05), (720, 0.02)]),
                trailing: trailing(0.015, 0.025),
                atr_stop_multiplier: Some(2.5),
                ..RiskConfig::default()
            },
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    /// Neutral snapshot: flat EMAs, mid-range RSI, average volume
    pub fn snapshot(i: i64) -> IndicatorSnapshot {
        IndicatorSnapshot {
            pair: "TEST".to_string(),
            open_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                + Duration::minutes(i * 5),
            close: 100.0,
            high: 100.5,
            low: 99.5,
            volume: 1000.0,
            ema_fast: 100.0,
            ema_medium: 100.0,
            ema_slow: 100.0,
            rsi: 50.0,
            macd: 0.0,
            macd_signal: 0.0,
            macd_hist: 0.0,
            bb_upper: 102.0,
            bb_mid: 100.0,
            bb_lower: 98.0,
            bb_width: 0.04,
            bb_width_typical: 0.04,
            squeeze: false,
            keltner_upper: 103.0,
            keltner_lower: 97.0,
            atr: 1.5,
            adx: 15.0,
            plus_di: 20.0,
            minus_di: 20.0,
            volume_mean: 1000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn flat_candles(n: usize) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| Candle {
                pair: "TEST".to_string(),
                open_time: start + Duration::minutes(i as i64 * 5),
                open: 100.0,
                high: 100.5,
                low: 99.5,
                close: 100.0,
                volume: 1000.0,
            })
            .collect()
    }

    #[test]
    fn test_warming_window_yields_none_signal() {
        for config in [
            StrategyConfig::TrendCrossover(Default::default()),
            StrategyConfig::VolatilityBreakout(Default::default()),
            StrategyConfig::MeanReversion(Default::default()),
            StrategyConfig::TrendFollowing(Default::default()),
        ] {
            let strategy = config.build();
            let candles = flat_candles(strategy.min_candles_required() - 1);
            let signal = strategy.generate_signal(&candles).unwrap();
            assert_eq!(signal.kind, crate::models::SignalKind::None, "{}", strategy.name());
            assert_eq!(signal.rule_id, Decision::INSUFFICIENT_DATA);
        }
    }

    #[test]
    fn test_empty_window_has_no_signal() {
        let strategy = StrategyConfig::default().build();
        assert!(strategy.generate_signal(&[]).is_none());
    }

    #[test]
    fn test_signal_stamped_with_last_candle() {
        let strategy = StrategyConfig::default().build();
        let candles = flat_candles(strategy.min_candles_required());
        let signal = strategy.generate_signal(&candles).unwrap();
        assert_eq!(signal.open_time, candles.last().unwrap().open_time);
        assert_eq!(signal.pair, "TEST");
        assert_ne!(signal.rule_id, Decision::INSUFFICIENT_DATA);
    }

    #[test]
    fn test_analyze_keeps_trailing_snapshots() {
        let strategy = StrategyConfig::default().build();
        let candles = flat_candles(strategy.min_candles_required() + 5);
        let analysis = strategy.analyze(&candles).unwrap();

        assert_eq!(analysis.snapshots.len(), 3);
        assert_eq!(
            analysis.latest().map(|s| s.open_time),
            candles.last().map(|c| c.open_time)
        );
        assert_eq!(Some(analysis.signal), strategy.generate_signal(&candles));
    }

    #[test]
    fn test_analyze_warming_window_has_no_snapshots() {
        let strategy = StrategyConfig::default().build();
        let candles = flat_candles(strategy.min_candles_required() - 1);
        assert!(strategy.analyze(&candles).unwrap().snapshots.is_empty());
    }

    #[test]
    fn test_risk_presets_follow_variant() {
        use crate::config::EngineConfig;

        let scalp = StrategyConfig::from_name("trend_crossover").unwrap().risk_preset();
        assert_eq!(scalp.stop_loss_pct, 0.02);
        assert_eq!(scalp.roi.min_profit_at(4), Some(0.02));
        assert_eq!(scalp.roi.min_profit_at(60), Some(0.005));
        assert_eq!(scalp.trailing.offset, 0.005);
        assert_eq!(scalp.atr_stop_multiplier, Some(1.5));

        let swing = StrategyConfig::from_name("mean_reversion").unwrap().risk_preset();
        assert_eq!(swing, RiskConfig::default());

        let trend = StrategyConfig::from_name("trend_following").unwrap().risk_preset();
        assert_eq!(trend.roi.min_profit_at(300), Some(0.10));
        assert_eq!(trend.atr_stop_multiplier, Some(2.5));

        let names = ["trend_crossover", "volatility_breakout", "mean_reversion", "trend_following"];
        for name in names {
            let config = EngineConfig::for_strategy(StrategyConfig::from_name(name).unwrap());
            assert!(config.validate().is_ok(), "{} preset is invalid", name);
        }
    }

    #[test]
    fn test_from_name() {
        assert!(matches!(
            StrategyConfig::from_name("mean_reversion"),
            Some(StrategyConfig::MeanReversion(_))
        ));
        assert!(StrategyConfig::from_name("martingale").is_none());
    }

    #[test]
    fn test_tagged_config_deserializes() {
        let json = r#"{"variant": "trend_following", "adx_min": 30.0}"#;
        let config: StrategyConfig = serde_json::from_str(json).unwrap();
        match config {
            StrategyConfig::TrendFollowing(c) => {
                assert_eq!(c.adx_min, 30.0);
                assert_eq!(c.indicators.ema_slow, 50);
            }
            other => panic!("unexpected variant {:?}", other),
        }
    }
}
