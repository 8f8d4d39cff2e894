//! Event and record types flowing between the feed, the orchestrator, and
//! downstream analytics.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::candle::Candle;
use crate::period::Period;

/// Opaque instrument identifier (a symbol string). Equality and hashing are
/// all the system assumes about it; it is the map key throughout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Instrument(String);

impl Instrument {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Instrument {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for Instrument {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A completed candle for one instrument and period, consumed exactly once
/// by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandleClosedEvent {
    pub instrument: Instrument,
    pub period: Period,
    pub candle: Candle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

/// One trade fill, as emitted for the downstream analytics collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillRecord {
    pub timestamp: u64,
    pub instrument: Instrument,
    pub side: Side,
    pub size: f64,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Portfolio equity at an instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquitySnapshot {
    pub timestamp: u64,
    pub equity: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instrument_is_transparent_over_its_symbol() {
        let inst = Instrument::from("EURUSD");
        assert_eq!(inst.as_str(), "EURUSD");
        assert_eq!(inst.to_string(), "EURUSD");
        assert_eq!(serde_json::to_string(&inst).unwrap(), r#""EURUSD""#);
    }

    #[test]
    fn fill_record_omits_empty_reason() {
        let fill = FillRecord {
            timestamp: 1_000,
            instrument: Instrument::from("EURUSD"),
            side: Side::Buy,
            size: 1.5,
            price: 1.0842,
            reason: None,
        };
        let json = serde_json::to_string(&fill).unwrap();
        assert!(!json.contains("reason"));
        assert!(json.contains(r#""side":"BUY""#));
    }
}
