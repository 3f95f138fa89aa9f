/// Average Directional Index (ADX) - Measures trend strength
///
/// ADX ranges from 0 to 100:
/// - ADX > 25: Strong trend (bull or bear)
/// - ADX 20-25: Moderate trend
/// - ADX < 20: Weak trend / choppy / ranging market
///
/// Also returns +DI and -DI to determine trend direction:
/// - +DI > -DI: Uptrend
/// - -DI > +DI: Downtrend
use super::atr::true_ranges;
use crate::models::Candle;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdxPoint {
    pub adx: f64,
    pub plus_di: f64,
    pub minus_di: f64,
}

/// ADX series aligned with candles
///
/// DX is available from index `period`; ADX is the mean of the first `period`
/// DX values (index `2 * period - 1`) and Wilder-smoothed afterwards.
pub fn adx_series(candles: &[Candle], period: usize) -> Vec<Option<AdxPoint>> {
    let mut out = vec![None; candles.len()];
    if period == 0 || candles.len() < 2 * period {
        return out;
    }

    let trs = true_ranges(candles);
    let (plus_dms, minus_dms): (Vec<f64>, Vec<f64>) = candles
        .windows(2)
        .map(|w| {
            let up_move = w[1].high - w[0].high;
            let down_move = w[0].low - w[1].low;

            let plus_dm = if up_move > down_move && up_move > 0.0 {
                up_move
            } else {
                0.0
            };
            let minus_dm = if down_move > up_move && down_move > 0.0 {
                down_move
            } else {
                0.0
            };
            (plus_dm, minus_dm)
        })
        .unzip();

    let p = period as f64;
    let mut smoothed_tr = trs[..period].iter().sum::<f64>() / p;
    let mut smoothed_plus = plus_dms[..period].iter().sum::<f64>() / p;
    let mut smoothed_minus = minus_dms[..period].iter().sum::<f64>() / p;

    let mut dx_sum = 0.0;
    let mut adx: Option<f64> = None;

    // DM/TR index j describes candle j + 1
    for j in (period - 1)..trs.len() {
        if j >= period {
            smoothed_tr = (smoothed_tr * (p - 1.0) + trs[j]) / p;
            smoothed_plus = (smoothed_plus * (p - 1.0) + plus_dms[j]) / p;
            smoothed_minus = (smoothed_minus * (p - 1.0) + minus_dms[j]) / p;
        }

        let (plus_di, minus_di) = if smoothed_tr > 0.0 {
            (
                smoothed_plus / smoothed_tr * 100.0,
                smoothed_minus / smoothed_tr * 100.0,
            )
        } else {
            (0.0, 0.0)
        };
        let di_sum = plus_di + minus_di;
        let dx = if di_sum > 0.0 {
            (plus_di - minus_di).abs() / di_sum * 100.0
        } else {
            0.0
        };

        let candle_idx = j + 1;
        let dx_count = candle_idx - period + 1;
        adx = match adx {
            Some(prev) => Some((prev * (p - 1.0) + dx) / p),
            None => {
                dx_sum += dx;
                (dx_count == period).then(|| dx_sum / p)
            }
        };

        if let Some(adx) = adx {
            out[candle_idx] = Some(AdxPoint {
                adx,
                plus_di,
                minus_di,
            });
        }
    }

    out
}

/// Calculate ADX, +DI, and -DI for trend strength and direction
///
/// Returns (adx, plus_di, minus_di) or None if insufficient data
pub fn calculate_adx(candles: &[Candle], period: usize) -> Option<(f64, f64, f64)> {
    adx_series(candles, period)
        .last()
        .copied()
        .flatten()
        .map(|p| (p.adx, p.plus_di, p.minus_di))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn create_test_candles(prices: &[(f64, f64, f64, f64)]) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, &(open, high, low, close))| Candle {
                pair: "TEST".to_string(),
                open_time: start + Duration::hours(i as i64),
                open,
                high,
                low,
                close,
                volume: 1000.0,
            })
            .collect()
    }

    #[test]
    fn test_adx_strong_uptrend() {
        // Simulating a strong uptrend
        let prices: Vec<(f64, f64, f64, f64)> = (0..30)
            .map(|i| {
                let base = 100.0 + i as f64 * 3.0;
                (base, base + 5.0, base - 1.0, base + 3.0)
            })
            .collect();

        let candles = create_test_candles(&prices);
        let (adx, plus_di, minus_di) = calculate_adx(&candles, 14).unwrap();

        assert!(plus_di > minus_di, "+DI should be > -DI in uptrend");
        assert!(adx > 25.0, "ADX should be strong in a clean trend, got {:.2}", adx);
    }

    #[test]
    fn test_adx_choppy_market() {
        // Simulating a choppy/ranging market
        let pattern = [
            (100.0, 102.0, 98.0, 100.0),
            (100.0, 103.0, 97.0, 99.0),
            (99.0, 102.0, 98.0, 101.0),
            (101.0, 103.0, 99.0, 100.0),
            (100.0, 102.0, 98.0, 99.0),
        ];
        let prices: Vec<(f64, f64, f64, f64)> = pattern.iter().cycle().take(30).copied().collect();

        let candles = create_test_candles(&prices);
        let (adx, _plus_di, _minus_di) = calculate_adx(&candles, 14).unwrap();

        assert!(
            adx < 40.0,
            "ADX should be lower in choppy market, got {:.2}",
            adx
        );
    }

    #[test]
    fn test_adx_insufficient_data() {
        let prices = vec![(100.0, 102.0, 99.0, 101.0); 27];

        let candles = create_test_candles(&prices);
        assert!(calculate_adx(&candles, 14).is_none());
    }

    #[test]
    fn test_adx_first_value_index() {
        let prices: Vec<(f64, f64, f64, f64)> = (0..30)
            .map(|i| {
                let base = 100.0 + i as f64;
                (base, base + 2.0, base - 1.0, base + 1.0)
            })
            .collect();
        let series = adx_series(&create_test_candles(&prices), 14);

        assert!(series[26].is_none());
        assert!(series[27].is_some());
        assert!(series[29].is_some());
    }
}
