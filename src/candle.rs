//! OHLCV candle value type.

use serde::{Deserialize, Serialize};

/// One immutable OHLCV candle. `timestamp` is the bucket-start instant in
/// milliseconds since the UTC epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: u64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
    #[serde(default)]
    pub tick_count: u64,
}

impl Candle {
    pub fn new(timestamp: u64, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume: 0.0,
            tick_count: 0,
        }
    }

    pub fn with_volume(mut self, volume: f64, tick_count: u64) -> Self {
        self.volume = volume;
        self.tick_count = tick_count;
        self
    }

    /// HLC/3, used by volume-weighted indicators.
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    pub fn mid(&self) -> f64 {
        (self.high + self.low) / 2.0
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// OHLC bounds hold and volume is non-negative.
    pub fn is_coherent(&self) -> bool {
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.volume >= 0.0
    }
}
