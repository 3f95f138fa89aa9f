/// Relative Strength Index (RSI) with Wilder smoothing
///
/// RSI measures the magnitude of recent price changes to evaluate
/// overbought or oversold conditions.
///
/// Values:
/// - RSI > 70: Overbought
/// - RSI < 30: Oversold
///
/// Average gain and loss are seeded with the simple mean of the first
/// `period` changes, then smoothed as `(prev * (period - 1) + current) / period`.
pub fn rsi_series(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; prices.len()];
    if period == 0 || prices.len() < period + 1 {
        return out;
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..=period {
        let (gain, loss) = split_change(prices[i] - prices[i - 1]);
        avg_gain += gain;
        avg_loss += loss;
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;
    out[period] = Some(rsi_from_averages(avg_gain, avg_loss));

    let p = period as f64;
    for i in (period + 1)..prices.len() {
        let (gain, loss) = split_change(prices[i] - prices[i - 1]);
        avg_gain = (avg_gain * (p - 1.0) + gain) / p;
        avg_loss = (avg_loss * (p - 1.0) + loss) / p;
        out[i] = Some(rsi_from_averages(avg_gain, avg_loss));
    }

    out
}

/// RSI at the last price
pub fn calculate_rsi(prices: &[f64], period: usize) -> Option<f64> {
    rsi_series(prices, period).last().copied().flatten()
}

fn split_change(change: f64) -> (f64, f64) {
    if change > 0.0 {
        (change, 0.0)
    } else {
        (0.0, -change)
    }
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        // Flat window is neutral, pure gains saturate
        return if avg_gain == 0.0 { 50.0 } else { 100.0 };
    }

    let rs = avg_gain / avg_loss;
    100.0 - (100.0 / (1.0 + rs))
}
