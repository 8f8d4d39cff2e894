use thiserror::Error;

use crate::events::Instrument;
use crate::period::Period;

/// Error taxonomy for the aggregation core.
///
/// The period/configuration variants are fatal to construction; `StaleCandle`
/// is per-update and recoverable — the caller may log it and continue the
/// stream with the accumulator untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("invalid period: {0}")]
    InvalidPeriod(String),

    #[error("incompatible periods: {base} does not evenly divide {target}")]
    IncompatiblePeriods { base: Period, target: Period },

    #[error("no compatible base period for {target} in the supported set")]
    NoCompatibleBasePeriod { target: Period },

    #[error("stale candle for {instrument}: bucket {candle_bucket} is older than current bucket {current_bucket}")]
    StaleCandle {
        instrument: Instrument,
        candle_bucket: u64,
        current_bucket: u64,
    },
}
