use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::adx::adx_series;
use super::atr::{atr_series, keltner_series};
use super::bollinger::{bollinger_series, is_squeeze, trailing_percentile};
use super::macd::macd_series;
use super::moving_average::ema_series;
use super::rsi::rsi_series;
use super::volume::trailing_volume_mean;
use crate::models::Candle;

/// Periods and multipliers for every indicator in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub ema_fast: usize,
    pub ema_medium: usize,
    pub ema_slow: usize,
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bb_period: usize,
    pub bb_std: f64,
    /// Trailing band widths the squeeze percentile is taken over
    pub squeeze_lookback: usize,
    /// Width below this quantile of its trailing distribution is a squeeze
    pub squeeze_percentile: f64,
    pub keltner_period: usize,
    pub keltner_atr_mult: f64,
    pub adx_period: usize,
    pub volume_period: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            ema_fast: 5,
            ema_medium: 10,
            ema_slow: 21,
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bb_period: 20,
            bb_std: 2.0,
            squeeze_lookback: 50,
            squeeze_percentile: 0.2,
            keltner_period: 20,
            keltner_atr_mult: 2.0,
            adx_period: 14,
            volume_period: 20,
        }
    }
}

/// Read-only indicator values for one closed candle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorSnapshot {
    pub pair: String,
    pub open_time: DateTime<Utc>,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub volume: f64,
    pub ema_fast: f64,
    pub ema_medium: f64,
    pub ema_slow: f64,
    pub rsi: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub macd_hist: f64,
    pub bb_upper: f64,
    pub bb_mid: f64,
    pub bb_lower: f64,
    pub bb_width: f64,
    /// Median band width over the squeeze lookback
    pub bb_width_typical: f64,
    pub squeeze: bool,
    pub keltner_upper: f64,
    pub keltner_lower: f64,
    pub atr: f64,
    pub adx: f64,
    pub plus_di: f64,
    pub minus_di: f64,
    pub volume_mean: f64,
}

impl IndicatorSnapshot {
    pub fn volume_ratio(&self) -> f64 {
        if self.volume_mean > 0.0 {
            self.volume / self.volume_mean
        } else {
            0.0
        }
    }
}

/// Builds snapshots from a trailing candle window.
///
/// Every call recomputes from the window it is given, so the same window
/// always produces the same snapshots.
#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    config: IndicatorConfig,
}

impl IndicatorEngine {
    pub fn new(config: IndicatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IndicatorConfig {
        &self.config
    }

    /// Minimum number of candles before the first snapshot exists
    pub fn warmup(&self) -> usize {
        let c = &self.config;
        [
            c.ema_fast.max(c.ema_medium).max(c.ema_slow),
            c.rsi_period + 1,
            c.macd_fast.max(c.macd_slow) + c.macd_signal - 1,
            c.bb_period + c.squeeze_lookback - 1,
            c.bb_period.max(c.keltner_period + 1),
            2 * c.adx_period,
            c.volume_period + 1,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }

    /// One snapshot per candle once every indicator is defined, oldest first.
    ///
    /// Returns an empty vector while warming up.
    pub fn compute(&self, window: &[Candle]) -> Vec<IndicatorSnapshot> {
        if window.len() < self.warmup() {
            return Vec::new();
        }

        let c = &self.config;
        let closes: Vec<f64> = window.iter().map(|k| k.close).collect();
        let volumes: Vec<f64> = window.iter().map(|k| k.volume).collect();

        let ema_fast = ema_series(&closes, c.ema_fast);
        let ema_medium = ema_series(&closes, c.ema_medium);
        let ema_slow = ema_series(&closes, c.ema_slow);
        let rsi = rsi_series(&closes, c.rsi_period);
        let macd = macd_series(&closes, c.macd_fast, c.macd_slow, c.macd_signal);
        let bands = bollinger_series(&closes, c.bb_period, c.bb_std);
        let widths: Vec<Option<f64>> = bands.iter().map(|b| b.map(|b| b.width())).collect();
        let squeeze_threshold =
            trailing_percentile(&widths, c.squeeze_lookback, c.squeeze_percentile);
        let typical_width = trailing_percentile(&widths, c.squeeze_lookback, 0.5);
        let atr = atr_series(window, c.keltner_period);
        let mids: Vec<Option<f64>> = bands.iter().map(|b| b.map(|b| b.mid)).collect();
        let keltner = keltner_series(&mids, &atr, c.keltner_atr_mult);
        let adx = adx_series(window, c.adx_period);
        let volume_mean = trailing_volume_mean(&volumes, c.volume_period);

        window
            .iter()
            .enumerate()
            .filter_map(|(i, candle)| {
                let band = bands[i]?;
                let macd = macd[i]?;
                let (keltner_upper, keltner_lower) = keltner[i]?;
                let adx = adx[i]?;
                let threshold = squeeze_threshold[i]?;

                Some(IndicatorSnapshot {
                    pair: candle.pair.clone(),
                    open_time: candle.open_time,
                    close: candle.close,
                    high: candle.high,
                    low: candle.low,
                    volume: candle.volume,
                    ema_fast: ema_fast[i]?,
                    ema_medium: ema_medium[i]?,
                    ema_slow: ema_slow[i]?,
                    rsi: rsi[i]?,
                    macd: macd.macd,
                    macd_signal: macd.signal,
                    macd_hist: macd.histogram,
                    bb_upper: band.upper,
                    bb_mid: band.mid,
                    bb_lower: band.lower,
                    bb_width: band.width(),
                    bb_width_typical: typical_width[i]?,
                    squeeze: is_squeeze(band.width(), threshold),
                    keltner_upper,
                    keltner_lower,
                    atr: atr[i]?,
                    adx: adx.adx,
                    plus_di: adx.plus_di,
                    minus_di: adx.minus_di,
                    volume_mean: volume_mean[i]?,
                })
            })
            .collect()
    }

    /// Snapshot for the most recent candle, or None while warming up
    pub fn latest(&self, window: &[Candle]) -> Option<IndicatorSnapshot> {
        self.compute(window).pop()
    }
}

impl Default for IndicatorEngine {
    fn default() -> Self {
        Self::new(IndicatorConfig::default())
    }
}
