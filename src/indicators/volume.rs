/// Mean volume of the `period` candles preceding each candle (current excluded)
pub fn trailing_volume_mean(volumes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; volumes.len()];
    if period == 0 {
        return out;
    }

    for i in period..volumes.len() {
        out[i] = Some(volumes[i - period..i].iter().sum::<f64>() / period as f64);
    }

    out
}

/// Check for a volume spike relative to the trailing mean
pub fn is_volume_spike(volume: f64, mean: f64, multiplier: f64) -> bool {
    mean > 0.0 && volume > mean * multiplier
}
