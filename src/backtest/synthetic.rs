use std::str::FromStr;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::models::Candle;

/// Market scenario types for synthetic data generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketScenario {
    /// Steady uptrend with noise (+2% daily average)
    Uptrend,
    /// Steady downtrend with noise (-2% daily average)
    Downtrend,
    /// Mean-reverting chop around the base price
    Sideways,
    /// Large swings, ±5% per candle
    Volatile,
    /// Every 50th candle missing
    WithGaps,
    /// Tight range that breaks out upward on heavy volume
    Squeeze,
    /// Gentle rise, then a sharp 25% slide to exercise stops and protections
    Crash,
}

impl MarketScenario {
    pub const ALL: [MarketScenario; 7] = [
        Self::Uptrend,
        Self::Downtrend,
        Self::Sideways,
        Self::Volatile,
        Self::WithGaps,
        Self::Squeeze,
        Self::Crash,
    ];
}

impl FromStr for MarketScenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "uptrend" => Ok(Self::Uptrend),
            "downtrend" => Ok(Self::Downtrend),
            "sideways" => Ok(Self::Sideways),
            "volatile" => Ok(Self::Volatile),
            "gaps" | "with_gaps" => Ok(Self::WithGaps),
            "squeeze" => Ok(Self::Squeeze),
            "crash" => Ok(Self::Crash),
            other => Err(format!("unknown scenario '{}'", other)),
        }
    }
}

/// Seeded candle generator; the same seed always yields the same series
pub struct SyntheticDataGenerator {
    rng: StdRng,
    base_price: f64,
    base_volume: f64,
    start: DateTime<Utc>,
}

impl SyntheticDataGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            base_price: 150.0,
            base_volume: 1_000_000.0,
            // 2024-01-01T00:00:00Z
            start: Utc.timestamp_opt(1_704_067_200, 0).single().unwrap_or_default(),
        }
    }

    /// Override the first candle's open time
    pub fn with_start(mut self, start: DateTime<Utc>) -> Self {
        self.start = start;
        self
    }

    pub fn base_price(&self) -> f64 {
        self.base_price
    }

    /// Generate `num_candles` slots of `interval_minutes` for `pair`.
    ///
    /// `WithGaps` leaves some slots empty, so it returns fewer candles.
    pub fn generate(
        &mut self,
        pair: &str,
        scenario: MarketScenario,
        num_candles: usize,
        interval_minutes: i64,
    ) -> Vec<Candle> {
        let mut candles = Vec::with_capacity(num_candles);
        let mut price = self.base_price;
        let per_day = 24.0 * 60.0 / interval_minutes as f64;

        for i in 0..num_candles {
            if scenario == MarketScenario::WithGaps && i % 50 == 49 {
                continue;
            }

            let mut volume_mult = 1.0;
            let mut spread = 0.002;

            price = match scenario {
                MarketScenario::Uptrend => {
                    price * (1.0 + 0.02 / per_day + self.rng.gen_range(-0.001..0.001))
                }
                MarketScenario::Downtrend => {
                    price * (1.0 - 0.02 / per_day + self.rng.gen_range(-0.001..0.001))
                }
                MarketScenario::Sideways => {
                    let reversion = (self.base_price - price) * 0.1;
                    price + reversion + price * self.rng.gen_range(-0.01..0.01)
                }
                MarketScenario::Volatile => {
                    let next = price * (1.0 + self.rng.gen_range(-0.05..0.05));
                    next.max(self.base_price * 0.5)
                }
                MarketScenario::WithGaps => price * (1.0 + self.rng.gen_range(-0.01..0.01)),
                MarketScenario::Squeeze => {
                    let breakout = num_candles * 3 / 4;
                    if i < breakout {
                        // Range narrows towards the breakout
                        let amplitude = 0.004 * (1.0 - i as f64 / breakout as f64) + 0.0005;
                        spread = amplitude;
                        self.base_price * (1.0 + self.rng.gen_range(-amplitude..amplitude))
                    } else {
                        volume_mult = if i < breakout + 3 { 4.0 } else { 1.5 };
                        price * (1.0 + self.rng.gen_range(0.002..0.008))
                    }
                }
                MarketScenario::Crash => {
                    if i < num_candles / 2 {
                        price * (1.0 + self.rng.gen_range(-0.005..0.01))
                    } else {
                        let drop = -0.25 / (num_candles as f64 / 2.0);
                        price * (1.0 + drop + self.rng.gen_range(-0.005..0.005))
                    }
                }
            };

            let open_time = self.start + Duration::minutes(i as i64 * interval_minutes);
            candles.push(self.create_candle(pair, price, open_time, spread, volume_mult));
        }

        candles
    }

    /// Build an internally consistent OHLCV bar around `close`
    fn create_candle(
        &mut self,
        pair: &str,
        close: f64,
        open_time: DateTime<Utc>,
        spread: f64,
        volume_mult: f64,
    ) -> Candle {
        let high = close * (1.0 + self.rng.gen_range(0.0..spread));
        let low = close * (1.0 - self.rng.gen_range(0.0..spread));
        let open = (close * (1.0 + self.rng.gen_range(-spread..spread))).clamp(low, high);
        let volume = self.base_volume * volume_mult * self.rng.gen_range(0.7..1.3);

        Candle {
            pair: pair.to_string(),
            open_time,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}
