use super::moving_average::{ema_of_defined, ema_series};

/// MACD line, signal line and histogram at one candle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdPoint {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// MACD = EMA(fast) - EMA(slow), signal = EMA(signal) of the MACD line
pub fn macd_series(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal: usize,
) -> Vec<Option<MacdPoint>> {
    let fast_ema = ema_series(closes, fast);
    let slow_ema = ema_series(closes, slow);

    let line: Vec<Option<f64>> = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| Some((*f)? - (*s)?))
        .collect();
    let signal_line = ema_of_defined(&line, signal);

    line.iter()
        .zip(&signal_line)
        .map(|(m, s)| {
            let (macd, signal) = ((*m)?, (*s)?);
            Some(MacdPoint {
                macd,
                signal,
                histogram: macd - signal,
            })
        })
        .collect()
}
