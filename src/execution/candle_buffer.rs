use std::collections::VecDeque;

use chrono::Duration;

use crate::error::{EngineError, Result};
use crate::models::Candle;

/// Rolling window of closed candles for one pair
///
/// Candles must arrive with strictly increasing `open_time`. Anything else is
/// rejected and leaves the window untouched. Gaps are allowed and passed
/// through as-is.
#[derive(Debug, Clone)]
pub struct CandleBuffer {
    pair: String,
    candles: VecDeque<Candle>,
    max_candles: usize,
    timeframe: Duration,
}

impl CandleBuffer {
    /// Create a new candle buffer
    ///
    /// # Arguments
    /// * `max_candles` - Maximum number of candles to keep
    /// * `timeframe_minutes` - Expected spacing between candles, for gap detection
    pub fn new(pair: &str, max_candles: usize, timeframe_minutes: i64) -> Self {
        Self {
            pair: pair.to_string(),
            candles: VecDeque::with_capacity(max_candles + 1),
            max_candles,
            timeframe: Duration::minutes(timeframe_minutes),
        }
    }

    pub fn pair(&self) -> &str {
        &self.pair
    }

    /// Add a candle
    ///
    /// If the buffer is full, removes the oldest candle
    pub fn add_candle(&mut self, candle: Candle) -> Result<()> {
        if candle.pair != self.pair {
            return Err(EngineError::PairMismatch {
                expected: self.pair.clone(),
                got: candle.pair,
            });
        }
        candle.validate()?;

        if let Some(last) = self.candles.back() {
            if candle.open_time <= last.open_time {
                return Err(EngineError::OutOfOrderCandle {
                    pair: candle.pair,
                    open_time: candle.open_time,
                    last_open_time: last.open_time,
                });
            }

            let gap = candle.open_time - last.open_time;
            if gap > self.timeframe {
                tracing::warn!(
                    "{}: gap of {} minutes before {} (expected {})",
                    self.pair,
                    gap.num_minutes(),
                    candle.open_time,
                    self.timeframe.num_minutes()
                );
            }
        }

        self.candles.push_back(candle);

        // Remove oldest if exceeds max
        while self.candles.len() > self.max_candles {
            self.candles.pop_front();
        }

        Ok(())
    }

    /// All buffered candles, oldest first
    pub fn get_candles(&mut self) -> &[Candle] {
        self.candles.make_contiguous()
    }

    /// Get the N most recent candles
    pub fn get_recent_candles(&self, n: usize) -> Vec<Candle> {
        let skip = self.candles.len().saturating_sub(n);
        self.candles.iter().skip(skip).cloned().collect()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.back()
    }

    pub fn candle_count(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn t(i: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(i * 5)
    }

    fn create_test_candle(i: i64, price: f64) -> Candle {
        Candle {
            pair: "SOL".to_string(),
            open_time: t(i),
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 1000.0,
        }
    }

    #[test]
    fn test_add_candle() {
        let mut buffer = CandleBuffer::new("SOL", 100, 5);
        assert!(buffer.is_empty());

        buffer.add_candle(create_test_candle(0, 100.0)).unwrap();
        assert_eq!(buffer.candle_count(), 1);
        assert_eq!(buffer.last().unwrap().close, 100.0);
    }

    #[test]
    fn test_max_candles_limit() {
        let mut buffer = CandleBuffer::new("SOL", 5, 5);

        // Add 10 candles
        for i in 0..10 {
            buffer
                .add_candle(create_test_candle(i, 100.0 + i as f64))
                .unwrap();
        }

        let candles = buffer.get_candles();
        assert_eq!(candles.len(), 5); // Should only keep last 5

        // Should have prices 105-109
        assert_eq!(candles[0].close, 105.0);
        assert_eq!(candles[4].close, 109.0);
    }

    #[test]
    fn test_get_recent_candles() {
        let mut buffer = CandleBuffer::new("SOL", 100, 5);

        for i in 0..10 {
            buffer
                .add_candle(create_test_candle(i, 100.0 + i as f64))
                .unwrap();
        }

        let recent = buffer.get_recent_candles(3);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].close, 107.0); // Last 3: 107, 108, 109
        assert_eq!(recent[2].close, 109.0);
    }

    #[test]
    fn test_out_of_order_rejected_without_change() {
        let mut buffer = CandleBuffer::new("SOL", 100, 5);
        buffer.add_candle(create_test_candle(0, 100.0)).unwrap();
        buffer.add_candle(create_test_candle(1, 101.0)).unwrap();
        let before = buffer.get_candles().to_vec();

        let err = buffer.add_candle(create_test_candle(0, 99.0)).unwrap_err();
        assert!(matches!(err, EngineError::OutOfOrderCandle { .. }));

        // Duplicate open_time is out of order too
        let err = buffer.add_candle(create_test_candle(1, 101.5)).unwrap_err();
        assert!(matches!(err, EngineError::OutOfOrderCandle { .. }));

        assert_eq!(buffer.get_candles(), before.as_slice());
    }

    #[test]
    fn test_malformed_rejected() {
        let mut buffer = CandleBuffer::new("SOL", 100, 5);
        let mut candle = create_test_candle(0, 100.0);
        candle.high = 90.0;

        assert!(matches!(
            buffer.add_candle(candle),
            Err(EngineError::MalformedCandle { .. })
        ));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_wrong_pair_rejected() {
        let mut buffer = CandleBuffer::new("SOL", 100, 5);
        let mut candle = create_test_candle(0, 100.0);
        candle.pair = "JUP".to_string();

        assert!(matches!(
            buffer.add_candle(candle),
            Err(EngineError::PairMismatch { .. })
        ));
    }

    #[test]
    fn test_gap_is_passed_through() {
        let mut buffer = CandleBuffer::new("SOL", 100, 5);
        buffer.add_candle(create_test_candle(0, 100.0)).unwrap();
        buffer.add_candle(create_test_candle(4, 101.0)).unwrap();

        let candles = buffer.get_candles();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[1].open_time, t(4));
    }
}
