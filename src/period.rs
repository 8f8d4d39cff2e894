//! Canonical candle periods and wall-clock bucket math.
//!
//! All buckets are anchored to UTC epoch zero: every instrument and every
//! target period shares the same global bucket grid regardless of when the
//! first candle arrives.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Upper bound for minute-multiple periods (4 hours).
pub const MAX_MINUTE_MULTIPLE: u32 = 240;
/// Upper bound for hour-multiple periods (1 day).
pub const MAX_HOUR_MULTIPLE: u32 = 24;

/// A fixed candle duration, identified the way broker chart scales are
/// (`SECOND`, `15MINUTE`, `HOUR`, `4HOUR`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Period {
    Second,
    Minutes(u32),
    Hours(u32),
}

impl Period {
    /// Duration ignoring multiple bounds; keeps `Ord` total over all values.
    fn raw_ms(&self) -> u64 {
        match *self {
            Period::Second => 1_000,
            Period::Minutes(n) => u64::from(n) * 60_000,
            Period::Hours(n) => u64::from(n) * 3_600_000,
        }
    }

    fn variant_rank(&self) -> u8 {
        match self {
            Period::Second => 0,
            Period::Minutes(_) => 1,
            Period::Hours(_) => 2,
        }
    }

    /// Fixed duration lookup in milliseconds.
    pub fn duration_ms(&self) -> Result<u64, Error> {
        match *self {
            Period::Second => Ok(1_000),
            Period::Minutes(n) if (1..=MAX_MINUTE_MULTIPLE).contains(&n) => {
                Ok(u64::from(n) * 60_000)
            }
            Period::Hours(n) if (1..=MAX_HOUR_MULTIPLE).contains(&n) => {
                Ok(u64::from(n) * 3_600_000)
            }
            _ => Err(Error::InvalidPeriod(self.to_string())),
        }
    }

    /// Start of the bucket containing `timestamp_ms`, anchored to epoch zero.
    pub fn bucket_start(&self, timestamp_ms: u64) -> Result<u64, Error> {
        let duration = self.duration_ms()?;
        Ok(timestamp_ms - timestamp_ms % duration)
    }

    /// How many `base` candles make up one `target` candle.
    pub fn factor(base: Period, target: Period) -> Result<u32, Error> {
        let base_ms = base.duration_ms()?;
        let target_ms = target.duration_ms()?;
        if base_ms > target_ms || target_ms % base_ms != 0 {
            return Err(Error::IncompatiblePeriods { base, target });
        }
        Ok((target_ms / base_ms) as u32)
    }
}

impl PartialOrd for Period {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Period {
    // Ordered by duration; ties (e.g. 60MINUTE vs HOUR) break on variant so
    // the ordering stays consistent with equality.
    fn cmp(&self, other: &Self) -> Ordering {
        self.raw_ms()
            .cmp(&other.raw_ms())
            .then_with(|| self.variant_rank().cmp(&other.variant_rank()))
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Period::Second => write!(f, "SECOND"),
            Period::Minutes(n) => write!(f, "{}MINUTE", n),
            Period::Hours(1) => write!(f, "HOUR"),
            Period::Hours(n) => write!(f, "{}HOUR", n),
        }
    }
}

impl FromStr for Period {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        let invalid = || Error::InvalidPeriod(s.trim().to_string());

        let period = if normalized == "SECOND" {
            Period::Second
        } else if normalized == "HOUR" {
            Period::Hours(1)
        } else if let Some(n) = normalized.strip_suffix("MINUTE") {
            Period::Minutes(n.parse().map_err(|_| invalid())?)
        } else if let Some(n) = normalized.strip_suffix("HOUR") {
            Period::Hours(n.parse().map_err(|_| invalid())?)
        } else {
            return Err(invalid());
        };

        period.duration_ms().map_err(|_| invalid())?;
        Ok(period)
    }
}

/// Broker-supported chart scales used when no explicit set is given.
pub fn default_supported_periods() -> Vec<Period> {
    vec![
        Period::Second,
        Period::Minutes(1),
        Period::Minutes(5),
        Period::Hours(1),
    ]
}

/// Choose the coarsest base period that can build `target`, to minimize
/// update frequency.
///
/// Priority: an hour-scale period that evenly divides the target (largest
/// such), then `5MINUTE` for targets of at least five minutes divisible by
/// five, then `1MINUTE`, then `SECOND`.
pub fn choose_base_period(target: Period, supported: &[Period]) -> Result<Period, Error> {
    if supported.is_empty() {
        return Err(Error::NoCompatibleBasePeriod { target });
    }
    let target_ms = target.duration_ms()?;

    let mut hour_pick: Option<(u64, Period)> = None;
    for period in supported {
        if let Period::Hours(_) = period {
            let duration = period.duration_ms()?;
            if duration <= target_ms
                && target_ms % duration == 0
                && hour_pick.map_or(true, |(best, _)| duration > best)
            {
                hour_pick = Some((duration, *period));
            }
        }
    }
    if let Some((_, period)) = hour_pick {
        return Ok(period);
    }

    if supported.contains(&Period::Minutes(5)) && target_ms >= 300_000 && target_ms % 300_000 == 0 {
        return Ok(Period::Minutes(5));
    }
    if supported.contains(&Period::Minutes(1)) && target_ms >= 60_000 && target_ms % 60_000 == 0 {
        return Ok(Period::Minutes(1));
    }
    if supported.contains(&Period::Second) {
        return Ok(Period::Second);
    }

    Err(Error::NoCompatibleBasePeriod { target })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_lookup() {
        assert_eq!(Period::Second.duration_ms().unwrap(), 1_000);
        assert_eq!(Period::Minutes(15).duration_ms().unwrap(), 900_000);
        assert_eq!(Period::Hours(1).duration_ms().unwrap(), 3_600_000);
        assert_eq!(Period::Hours(4).duration_ms().unwrap(), 14_400_000);
    }

    #[test]
    fn out_of_bounds_multiples_are_invalid() {
        assert!(matches!(
            Period::Minutes(0).duration_ms(),
            Err(Error::InvalidPeriod(_))
        ));
        assert!(matches!(
            Period::Minutes(MAX_MINUTE_MULTIPLE + 1).duration_ms(),
            Err(Error::InvalidPeriod(_))
        ));
        assert!(matches!(
            Period::Hours(25).duration_ms(),
            Err(Error::InvalidPeriod(_))
        ));
    }

    #[test]
    fn ordered_by_duration() {
        assert!(Period::Second < Period::Minutes(1));
        assert!(Period::Minutes(5) < Period::Minutes(15));
        assert!(Period::Minutes(90) > Period::Hours(1));
        assert!(Period::Minutes(30) < Period::Hours(1));
    }

    #[test]
    fn parse_and_display_round_trip() {
        for text in ["SECOND", "1MINUTE", "15MINUTE", "HOUR", "4HOUR"] {
            let period: Period = text.parse().unwrap();
            assert_eq!(period.to_string(), text);
        }
        assert_eq!(" 5minute ".parse::<Period>().unwrap(), Period::Minutes(5));
        assert_eq!("hour".parse::<Period>().unwrap(), Period::Hours(1));
    }

    #[test]
    fn parse_rejects_unknown_identifiers() {
        for text in ["", "DAY", "5MIN", "0MINUTE", "xMINUTE", "999MINUTE"] {
            assert!(matches!(
                text.parse::<Period>(),
                Err(Error::InvalidPeriod(_))
            ));
        }
    }

    #[test]
    fn bucket_start_is_epoch_anchored() {
        let fifteen = Period::Minutes(15);
        // 2026-01-01 00:20:00 UTC falls in the bucket starting 00:15:00.
        let ts = 1_767_225_600_000u64 + 20 * 60 * 1_000;
        let start = fifteen.bucket_start(ts).unwrap();
        assert_eq!(start, 1_767_225_600_000 + 15 * 60 * 1_000);
        assert_eq!(start % fifteen.duration_ms().unwrap(), 0);
        // Exact boundary maps to itself.
        assert_eq!(fifteen.bucket_start(start).unwrap(), start);
    }

    #[test]
    fn factor_requires_exact_multiple() {
        assert_eq!(
            Period::factor(Period::Minutes(5), Period::Minutes(15)).unwrap(),
            3
        );
        assert_eq!(
            Period::factor(Period::Hours(1), Period::Hours(4)).unwrap(),
            4
        );
        assert!(matches!(
            Period::factor(Period::Minutes(5), Period::Minutes(7)),
            Err(Error::IncompatiblePeriods { .. })
        ));
        // Base coarser than target is rejected.
        assert!(matches!(
            Period::factor(Period::Hours(1), Period::Minutes(15)),
            Err(Error::IncompatiblePeriods { .. })
        ));
    }

    #[test]
    fn selector_prefers_hour_scale() {
        let supported = default_supported_periods();
        assert_eq!(
            choose_base_period(Period::Hours(1), &supported).unwrap(),
            Period::Hours(1)
        );
        assert_eq!(
            choose_base_period(Period::Hours(4), &supported).unwrap(),
            Period::Hours(1)
        );
        // Largest evenly-dividing hour scale wins.
        let hours = [Period::Hours(1), Period::Hours(2), Period::Minutes(5)];
        assert_eq!(
            choose_base_period(Period::Hours(4), &hours).unwrap(),
            Period::Hours(2)
        );
    }

    #[test]
    fn selector_five_then_one_then_second() {
        let supported = default_supported_periods();
        assert_eq!(
            choose_base_period(Period::Minutes(15), &supported).unwrap(),
            Period::Minutes(5)
        );
        assert_eq!(
            choose_base_period(Period::Minutes(30), &supported).unwrap(),
            Period::Minutes(5)
        );
        assert_eq!(
            choose_base_period(Period::Minutes(7), &supported).unwrap(),
            Period::Minutes(1)
        );
        assert_eq!(
            choose_base_period(Period::Second, &supported).unwrap(),
            Period::Second
        );
    }

    #[test]
    fn selector_failure_modes() {
        assert!(matches!(
            choose_base_period(Period::Minutes(15), &[]),
            Err(Error::NoCompatibleBasePeriod { .. })
        ));
        // Nothing in the set can build a 7-minute target.
        assert!(matches!(
            choose_base_period(Period::Minutes(7), &[Period::Minutes(5)]),
            Err(Error::NoCompatibleBasePeriod { .. })
        ));
    }
}
