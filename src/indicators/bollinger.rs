/// Bollinger Bands: SMA(N) ± k * population standard deviation over N closes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerPoint {
    pub upper: f64,
    pub mid: f64,
    pub lower: f64,
}

impl BollingerPoint {
    /// Normalized band width `(upper - lower) / mid`
    pub fn width(&self) -> f64 {
        if self.mid == 0.0 {
            0.0
        } else {
            (self.upper - self.lower) / self.mid
        }
    }
}

pub fn bollinger_series(
    closes: &[f64],
    period: usize,
    num_std: f64,
) -> Vec<Option<BollingerPoint>> {
    let mut out = vec![None; closes.len()];
    if period == 0 || closes.len() < period {
        return out;
    }

    for (i, window) in closes.windows(period).enumerate() {
        let mid = window.iter().sum::<f64>() / period as f64;
        let variance = window.iter().map(|c| (c - mid).powi(2)).sum::<f64>() / period as f64;
        let std = variance.sqrt();

        out[i + period - 1] = Some(BollingerPoint {
            upper: mid + num_std * std,
            mid,
            lower: mid - num_std * std,
        });
    }

    out
}

/// Nearest-rank percentile of each trailing `lookback` window (current value included)
///
/// Windows containing an undefined value yield `None`.
pub fn trailing_percentile(
    values: &[Option<f64>],
    lookback: usize,
    quantile: f64,
) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if lookback == 0 || values.len() < lookback {
        return out;
    }

    for (i, window) in values.windows(lookback).enumerate() {
        let Some(mut sorted) = window.iter().copied().collect::<Option<Vec<f64>>>() else {
            continue;
        };
        sorted.sort_by(f64::total_cmp);

        let rank = (quantile.clamp(0.0, 1.0) * lookback as f64).ceil() as usize;
        out[i + lookback - 1] = Some(sorted[rank.clamp(1, lookback) - 1]);
    }

    out
}

/// Squeeze: band width strictly below the percentile of its own trailing distribution
pub fn is_squeeze(width: f64, threshold: f64) -> bool {
    width < threshold
}
