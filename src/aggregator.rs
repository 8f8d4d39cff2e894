//! Wall-clock candle aggregation across instruments.
//!
//! One `CandleAggregator` instance manages every instrument on a feed: it
//! keeps one open bucket per instrument and emits the completed target-period
//! candle the moment a base candle lands in a newer bucket. Missing base
//! candles are tolerated — the emitted candle reflects whatever was actually
//! observed in the prior window.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::candle::Candle;
use crate::error::Error;
use crate::events::Instrument;
use crate::period::{choose_base_period, default_supported_periods, Period};

/// Accumulation state for one instrument's open bucket.
#[derive(Debug, Clone, Copy)]
struct Bucket {
    start: u64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    tick_count: u64,
    count: u32,
}

impl Bucket {
    fn seed(start: u64, candle: &Candle) -> Self {
        Self {
            start,
            open: candle.open,
            high: candle.high,
            low: candle.low,
            close: candle.close,
            volume: candle.volume,
            tick_count: candle.tick_count,
            count: 1,
        }
    }

    fn merge(&mut self, candle: &Candle) {
        self.high = self.high.max(candle.high);
        self.low = self.low.min(candle.low);
        self.close = candle.close;
        self.volume += candle.volume;
        self.tick_count += candle.tick_count;
        self.count += 1;
    }

    fn finalize(&self) -> Candle {
        Candle {
            timestamp: self.start,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
            tick_count: self.tick_count,
        }
    }
}

/// Aggregates base-period candles into a coarser target period using
/// epoch-anchored time bucketing (not count-based).
pub struct CandleAggregator {
    base_period: Period,
    target_period: Period,
    factor: u32,
    buckets: HashMap<Instrument, Bucket>,
}

impl CandleAggregator {
    /// Build with the base period auto-selected from the default broker
    /// scales.
    pub fn new(target_period: Period) -> Result<Self, Error> {
        Self::with_supported_periods(target_period, &default_supported_periods())
    }

    /// Build with the base period auto-selected from a caller-supplied set.
    pub fn with_supported_periods(
        target_period: Period,
        supported: &[Period],
    ) -> Result<Self, Error> {
        let base_period = choose_base_period(target_period, supported)?;
        Self::with_base_period(target_period, base_period)
    }

    /// Build with an explicit base period; fails fast when it does not
    /// evenly divide the target.
    pub fn with_base_period(target_period: Period, base_period: Period) -> Result<Self, Error> {
        let factor = Period::factor(base_period, target_period)?;
        Ok(Self {
            base_period,
            target_period,
            factor,
            buckets: HashMap::new(),
        })
    }

    /// Feed one base-period candle. Returns the completed target-period
    /// candle when the instrument's bucket rolls, `None` while accumulating.
    ///
    /// Candles mapping to an older bucket than the open one are rejected
    /// with `StaleCandle` and leave the accumulator untouched.
    pub fn update(
        &mut self,
        instrument: &Instrument,
        candle: &Candle,
    ) -> Result<Option<Candle>, Error> {
        let bucket_start = self.target_period.bucket_start(candle.timestamp)?;

        match self.buckets.entry(instrument.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(Bucket::seed(bucket_start, candle));
                Ok(None)
            }
            Entry::Occupied(mut slot) => {
                let current = slot.get_mut();
                if bucket_start == current.start {
                    current.merge(candle);
                    Ok(None)
                } else if bucket_start < current.start {
                    Err(Error::StaleCandle {
                        instrument: instrument.clone(),
                        candle_bucket: bucket_start,
                        current_bucket: current.start,
                    })
                } else {
                    let completed = current.finalize();
                    *current = Bucket::seed(bucket_start, candle);
                    Ok(Some(completed))
                }
            }
        }
    }

    /// Discard the accumulator for an instrument (no-op if absent). Used on
    /// reconnect or recovery.
    pub fn reset(&mut self, instrument: &Instrument) {
        self.buckets.remove(instrument);
    }

    /// `(base_period, target_period, factor)` for debugging.
    pub fn describe(&self) -> (Period, Period, u32) {
        (self.base_period, self.target_period, self.factor)
    }
}
