// Technical indicators module
// Windowed EMA, RSI, MACD, Bollinger, ATR/Keltner, ADX and volume mean,
// assembled into per-candle snapshots

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod macd;
pub mod moving_average;
pub mod rsi;
pub mod snapshot;
pub mod volume;

pub use adx::{adx_series, calculate_adx, AdxPoint};
pub use atr::{atr_series, calculate_atr, keltner_series};
pub use bollinger::{bollinger_series, is_squeeze, trailing_percentile, BollingerPoint};
pub use macd::{macd_series, MacdPoint};
pub use moving_average::{calculate_ema, calculate_sma, ema_of_defined, ema_series, sma_series};
pub use rsi::{calculate_rsi, rsi_series};
pub use snapshot::{IndicatorConfig, IndicatorEngine, IndicatorSnapshot};
pub use volume::{is_volume_spike, trailing_volume_mean};
