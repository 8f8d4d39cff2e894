//! Performance analytics over fill and equity streams.
//!
//! Consumes the plain event data the core emits — ordered fills and equity
//! snapshots — and independently reconstructs round trips and aggregate
//! statistics. Pairing assumes one open position per instrument with fills
//! alternating entry/exit.

use std::collections::HashMap;

use anyhow::{bail, Result};
use serde::Serialize;

use crate::events::{EquitySnapshot, FillRecord, Instrument, Side};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

/// A completed entry/exit pair for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundTrip {
    pub instrument: Instrument,
    pub direction: Direction,
    pub entry_ts: u64,
    pub exit_ts: u64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub size: f64,
    pub pnl: f64,
    pub exit_reason: Option<String>,
}

/// Aggregate performance statistics.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub trades: usize,
    pub round_trips: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub profit_factor: f64,
    pub expectancy: f64,
    pub max_drawdown: f64,
    pub final_equity: f64,
    pub avg_hold_minutes: f64,
    pub exits_by_reason: HashMap<String, u32>,
}

/// Reconstruct round trips from an ordered fill stream. A trailing
/// unmatched entry is left open and not reported; a size mismatch between
/// entry and exit is an error since the simple alternating pairing cannot
/// represent partial closes.
pub fn round_trips_from_fills(fills: &[FillRecord]) -> Result<Vec<RoundTrip>> {
    struct OpenPosition {
        direction: Direction,
        entry_ts: u64,
        entry_price: f64,
        size: f64,
    }

    let mut open: HashMap<Instrument, OpenPosition> = HashMap::new();
    let mut trips = Vec::new();

    for fill in fills {
        match open.remove(&fill.instrument) {
            None => {
                let direction = match fill.side {
                    Side::Buy => Direction::Long,
                    Side::Sell => Direction::Short,
                };
                open.insert(
                    fill.instrument.clone(),
                    OpenPosition {
                        direction,
                        entry_ts: fill.timestamp,
                        entry_price: fill.price,
                        size: fill.size,
                    },
                );
            }
            Some(entry) => {
                if (entry.size - fill.size).abs() > 1e-9 {
                    bail!(
                        "size mismatch for {}: entry {} exit {}",
                        fill.instrument,
                        entry.size,
                        fill.size
                    );
                }
                let pnl = match entry.direction {
                    Direction::Long => (fill.price - entry.entry_price) * fill.size,
                    Direction::Short => (entry.entry_price - fill.price) * fill.size,
                };
                trips.push(RoundTrip {
                    instrument: fill.instrument.clone(),
                    direction: entry.direction,
                    entry_ts: entry.entry_ts,
                    exit_ts: fill.timestamp,
                    entry_price: entry.entry_price,
                    exit_price: fill.price,
                    size: fill.size,
                    pnl,
                    exit_reason: fill.reason.clone(),
                });
            }
        }
    }

    Ok(trips)
}

/// Maximum drawdown of an equity curve, returned as a non-positive number.
pub fn max_drawdown(equity: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut mdd = 0.0f64;
    for &value in equity {
        peak = peak.max(value);
        mdd = mdd.min(value - peak);
    }
    mdd
}

/// Minimal equity curve from round trips by cumulatively summing PnL.
pub fn equity_from_round_trips(trips: &[RoundTrip], starting_equity: f64) -> Vec<EquitySnapshot> {
    let mut equity = starting_equity;
    trips
        .iter()
        .map(|trip| {
            equity += trip.pnl;
            EquitySnapshot {
                timestamp: trip.exit_ts,
                equity,
            }
        })
        .collect()
}

/// Compute the aggregate report from equity snapshots and the fill stream.
pub fn compute_report(equity_rows: &[EquitySnapshot], fills: &[FillRecord]) -> Result<Report> {
    let trips = round_trips_from_fills(fills)?;
    let equity: Vec<f64> = equity_rows.iter().map(|row| row.equity).collect();
    let final_equity = equity.last().copied().unwrap_or(0.0);

    let mut exits_by_reason: HashMap<String, u32> = HashMap::new();
    for trip in &trips {
        let key = trip
            .exit_reason
            .clone()
            .unwrap_or_else(|| "unknown".to_string());
        *exits_by_reason.entry(key).or_insert(0) += 1;
    }

    let wins: Vec<f64> = trips.iter().map(|t| t.pnl).filter(|p| *p > 0.0).collect();
    let losses: Vec<f64> = trips.iter().map(|t| t.pnl).filter(|p| *p < 0.0).collect();
    let win_sum: f64 = wins.iter().sum();
    let loss_sum: f64 = losses.iter().sum();

    let avg_win = if wins.is_empty() {
        0.0
    } else {
        win_sum / wins.len() as f64
    };
    // Negative by construction.
    let avg_loss = if losses.is_empty() {
        0.0
    } else {
        loss_sum / losses.len() as f64
    };
    let profit_factor = if loss_sum.abs() > 0.0 {
        win_sum / loss_sum.abs()
    } else if !wins.is_empty() {
        f64::INFINITY
    } else {
        0.0
    };
    let win_rate = if trips.is_empty() {
        0.0
    } else {
        wins.len() as f64 / trips.len() as f64
    };
    let expectancy = if trips.is_empty() {
        0.0
    } else {
        win_rate * avg_win + (1.0 - win_rate) * avg_loss
    };

    let avg_hold_minutes = if trips.is_empty() {
        0.0
    } else {
        trips
            .iter()
            .map(|t| t.exit_ts.saturating_sub(t.entry_ts) as f64 / 60_000.0)
            .sum::<f64>()
            / trips.len() as f64
    };

    Ok(Report {
        trades: fills.len(),
        round_trips: trips.len(),
        wins: wins.len(),
        losses: losses.len(),
        win_rate,
        avg_win,
        avg_loss,
        profit_factor,
        expectancy,
        max_drawdown: max_drawdown(&equity),
        final_equity,
        avg_hold_minutes,
        exits_by_reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(ts: u64, inst: &str, side: Side, size: f64, price: f64, reason: Option<&str>) -> FillRecord {
        FillRecord {
            timestamp: ts,
            instrument: Instrument::from(inst),
            side,
            size,
            price,
            reason: reason.map(|r| r.to_string()),
        }
    }

    #[test]
    fn pairs_alternating_fills_per_instrument() {
        let fills = vec![
            fill(0, "EURUSD", Side::Buy, 1.0, 100.0, None),
            fill(60_000, "GBPUSD", Side::Sell, 2.0, 50.0, None),
            fill(120_000, "EURUSD", Side::Sell, 1.0, 110.0, Some("take_profit")),
            fill(180_000, "GBPUSD", Side::Buy, 2.0, 48.0, Some("stop")),
        ];
        let trips = round_trips_from_fills(&fills).unwrap();
        assert_eq!(trips.len(), 2);

        let long = &trips[0];
        assert_eq!(long.direction, Direction::Long);
        assert!((long.pnl - 10.0).abs() < 1e-9);
        assert_eq!(long.exit_reason.as_deref(), Some("take_profit"));

        let short = &trips[1];
        assert_eq!(short.direction, Direction::Short);
        assert!((short.pnl - 4.0).abs() < 1e-9);
    }

    #[test]
    fn trailing_open_entry_is_not_reported() {
        let fills = vec![
            fill(0, "EURUSD", Side::Buy, 1.0, 100.0, None),
            fill(60_000, "EURUSD", Side::Sell, 1.0, 101.0, None),
            fill(120_000, "EURUSD", Side::Buy, 1.0, 102.0, None),
        ];
        let trips = round_trips_from_fills(&fills).unwrap();
        assert_eq!(trips.len(), 1);
    }

    #[test]
    fn size_mismatch_is_an_error() {
        let fills = vec![
            fill(0, "EURUSD", Side::Buy, 1.0, 100.0, None),
            fill(60_000, "EURUSD", Side::Sell, 0.5, 101.0, None),
        ];
        assert!(round_trips_from_fills(&fills).is_err());
    }

    #[test]
    fn drawdown_is_peak_relative_and_non_positive() {
        assert_eq!(max_drawdown(&[]), 0.0);
        assert_eq!(max_drawdown(&[100.0, 110.0, 120.0]), 0.0);
        assert_eq!(max_drawdown(&[100.0, 120.0, 90.0, 105.0]), -30.0);
    }

    #[test]
    fn equity_curve_accumulates_pnl() {
        let fills = vec![
            fill(0, "EURUSD", Side::Buy, 1.0, 100.0, None),
            fill(60_000, "EURUSD", Side::Sell, 1.0, 110.0, None),
            fill(120_000, "EURUSD", Side::Buy, 1.0, 110.0, None),
            fill(180_000, "EURUSD", Side::Sell, 1.0, 106.0, None),
        ];
        let trips = round_trips_from_fills(&fills).unwrap();
        let curve = equity_from_round_trips(&trips, 1_000.0);
        assert_eq!(curve.len(), 2);
        assert!((curve[0].equity - 1_010.0).abs() < 1e-9);
        assert!((curve[1].equity - 1_006.0).abs() < 1e-9);
    }

    #[test]
    fn report_statistics() {
        let fills = vec![
            fill(0, "EURUSD", Side::Buy, 1.0, 100.0, None),
            fill(600_000, "EURUSD", Side::Sell, 1.0, 110.0, Some("take_profit")),
            fill(1_200_000, "EURUSD", Side::Buy, 1.0, 110.0, None),
            fill(1_800_000, "EURUSD", Side::Sell, 1.0, 105.0, Some("stop")),
        ];
        let trips = round_trips_from_fills(&fills).unwrap();
        let equity = equity_from_round_trips(&trips, 1_000.0);
        let report = compute_report(&equity, &fills).unwrap();

        assert_eq!(report.trades, 4);
        assert_eq!(report.round_trips, 2);
        assert_eq!(report.wins, 1);
        assert_eq!(report.losses, 1);
        assert!((report.win_rate - 0.5).abs() < 1e-9);
        assert!((report.avg_win - 10.0).abs() < 1e-9);
        assert!((report.avg_loss + 5.0).abs() < 1e-9);
        assert!((report.profit_factor - 2.0).abs() < 1e-9);
        // 0.5 * 10 + 0.5 * (-5)
        assert!((report.expectancy - 2.5).abs() < 1e-9);
        assert!((report.final_equity - 1_005.0).abs() < 1e-9);
        assert!((report.max_drawdown + 5.0).abs() < 1e-9);
        assert!((report.avg_hold_minutes - 10.0).abs() < 1e-9);
        assert_eq!(report.exits_by_reason["take_profit"], 1);
        assert_eq!(report.exits_by_reason["stop"], 1);
    }

    #[test]
    fn profit_factor_with_no_losses_is_infinite() {
        let fills = vec![
            fill(0, "EURUSD", Side::Buy, 1.0, 100.0, None),
            fill(60_000, "EURUSD", Side::Sell, 1.0, 110.0, None),
        ];
        let trips = round_trips_from_fills(&fills).unwrap();
        let equity = equity_from_round_trips(&trips, 0.0);
        let report = compute_report(&equity, &fills).unwrap();
        assert!(report.profit_factor.is_infinite());
    }
}
