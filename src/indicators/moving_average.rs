/// Calculate Simple Moving Average (SMA) of the last `period` values
pub fn calculate_sma(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let sum: f64 = prices.iter().rev().take(period).sum();
    Some(sum / period as f64)
}

/// Calculate Exponential Moving Average (EMA) at the last value
pub fn calculate_ema(prices: &[f64], period: usize) -> Option<f64> {
    ema_series(prices, period).last().copied().flatten()
}

/// SMA aligned with the input; `None` until `period` values are available
pub fn sma_series(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    let mut sum: f64 = values[..period].iter().sum();
    out[period - 1] = Some(sum / period as f64);
    for i in period..values.len() {
        sum += values[i] - values[i - period];
        out[i] = Some(sum / period as f64);
    }

    out
}

/// EMA aligned with the input, seeded from the SMA of the first `period` values
pub fn ema_series(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    let multiplier = 2.0 / (period as f64 + 1.0);

    // Start with SMA
    let mut ema = values[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(ema);

    for (i, value) in values.iter().enumerate().skip(period) {
        ema = (value - ema) * multiplier + ema;
        out[i] = Some(ema);
    }

    out
}

/// EMA over a series that only becomes defined part-way through (e.g. the MACD line)
///
/// Seeding starts at the first defined value; the output stays aligned with the input.
pub fn ema_of_defined(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    let Some(start) = values.iter().position(Option::is_some) else {
        return out;
    };

    let tail: Vec<f64> = values[start..].iter().map_while(|v| *v).collect();
    for (offset, value) in ema_series(&tail, period).into_iter().enumerate() {
        out[start + offset] = value;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma() {
        let prices = vec![100.0, 102.0, 104.0, 106.0, 108.0];
        let sma = calculate_sma(&prices, 5);
        assert_eq!(sma, Some(104.0));
    }

    #[test]
    fn test_sma_insufficient_data() {
        let prices = vec![100.0, 102.0];
        let sma = calculate_sma(&prices, 5);
        assert!(sma.is_none());
    }

    #[test]
    fn test_ema() {
        let prices = vec![100.0, 102.0, 104.0, 106.0, 108.0, 110.0];
        let ema = calculate_ema(&prices, 5);
        assert!(ema.is_some());
        assert!(ema.unwrap() > 104.0); // EMA should be above initial SMA
    }

    #[test]
    fn test_ema_seeded_from_sma() {
        let prices = vec![1.0, 2.0, 3.0, 4.0];
        let series = ema_series(&prices, 3);
        assert_eq!(series[0], None);
        assert_eq!(series[1], None);
        assert_eq!(series[2], Some(2.0));
        // multiplier 0.5: (4 - 2) * 0.5 + 2
        assert_eq!(series[3], Some(3.0));
    }

    #[test]
    fn test_sma_series_matches_scalar() {
        let prices: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        let series = sma_series(&prices, 10);
        let last = series.last().copied().flatten().unwrap();
        let scalar = calculate_sma(&prices, 10).unwrap();
        assert!((last - scalar).abs() < 1e-9);
    }

    #[test]
    fn test_ema_of_defined_offsets_seed() {
        let values = vec![None, None, Some(1.0), Some(2.0), Some(3.0)];
        let series = ema_of_defined(&values, 2);
        assert_eq!(series[2], None);
        assert_eq!(series[3], Some(1.5));
        assert!(series[4].unwrap() > 2.0);
    }

    #[test]
    fn test_zero_period_is_undefined() {
        assert!(ema_series(&[1.0, 2.0], 0).iter().all(Option::is_none));
        assert!(calculate_sma(&[1.0, 2.0], 0).is_none());
    }
}
