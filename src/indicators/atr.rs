/// Average True Range (ATR) indicator
///
/// Measures market volatility by calculating the average of true ranges over a period.
/// True Range is the greatest of:
/// - Current High - Current Low
/// - Abs(Current High - Previous Close)
/// - Abs(Current Low - Previous Close)
///
/// Uses Wilder's smoothing (same as RSI and ADX) for the moving average.
use crate::models::Candle;

/// True range for each candle after the first (index `i` holds TR of candle `i + 1`)
pub(crate) fn true_ranges(candles: &[Candle]) -> Vec<f64> {
    candles
        .windows(2)
        .map(|w| {
            let (prev, cur) = (&w[0], &w[1]);
            (cur.high - cur.low)
                .max((cur.high - prev.close).abs())
                .max((cur.low - prev.close).abs())
        })
        .collect()
}

/// ATR aligned with candles; the first value appears at index `period`
pub fn atr_series(candles: &[Candle], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; candles.len()];
    if period == 0 || candles.len() < period + 1 {
        return out;
    }

    let trs = true_ranges(candles);

    // First ATR is simple average of first 'period' true ranges
    let mut atr: f64 = trs[..period].iter().sum::<f64>() / period as f64;
    out[period] = Some(atr);

    // Apply Wilder's smoothing for subsequent values
    for (i, tr) in trs.iter().enumerate().skip(period) {
        atr = (atr * (period as f64 - 1.0) + tr) / period as f64;
        out[i + 1] = Some(atr);
    }

    out
}

/// Current ATR value, or None if insufficient data
pub fn calculate_atr(candles: &[Candle], period: usize) -> Option<f64> {
    atr_series(candles, period).last().copied().flatten()
}

/// Keltner channel bounds around a middle line: `mid ± multiplier * ATR`
pub fn keltner_series(
    mid: &[Option<f64>],
    atr: &[Option<f64>],
    multiplier: f64,
) -> Vec<Option<(f64, f64)>> {
    mid.iter()
        .zip(atr)
        .map(|(m, a)| match (m, a) {
            (Some(m), Some(a)) => Some((m + multiplier * a, m - multiplier * a)),
            _ => None,
        })
        .collect()
}
