//! Concrete strategies implementing the portfolio capability contract.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;

use crate::candle::Candle;
use crate::events::{CandleClosedEvent, FillRecord, Instrument, Side};
use crate::portfolio::PortfolioStrategy;
use crate::sizing::atr_normalised_size;

/// Tuning for `TrendStrategy`.
#[derive(Debug, Clone, Copy)]
pub struct TrendParams {
    pub ema_fast: u32,
    pub ema_slow: u32,
    pub atr_window: u32,
    pub atr_risk_mult: f64,
    pub min_size: f64,
    pub max_size: f64,
}

impl Default for TrendParams {
    fn default() -> Self {
        Self {
            ema_fast: 6,
            ema_slow: 24,
            atr_window: 14,
            atr_risk_mult: 2.0,
            min_size: 0.0,
            max_size: 10.0,
        }
    }
}

/// Long-only EMA crossover strategy with ATR-normalised sizing.
///
/// The regime is active while the fast EMA sits above the slow EMA, once a
/// full slow window of candles has been seen. Entries and exits are emitted
/// as fills on the provided channel; position sizing uses the per-trade risk
/// assigned by the orchestrator in the current cycle.
pub struct TrendStrategy {
    instrument: Instrument,
    params: TrendParams,
    fills: UnboundedSender<FillRecord>,
    ema_fast: Option<f64>,
    ema_slow: Option<f64>,
    atr: Option<f64>,
    prev_close: Option<f64>,
    last_ts: u64,
    last_close: f64,
    samples: u32,
    regime_active: bool,
    risk_per_trade: f64,
    position: f64,
}

impl TrendStrategy {
    pub fn new(
        instrument: Instrument,
        params: TrendParams,
        fills: UnboundedSender<FillRecord>,
    ) -> Self {
        Self {
            instrument,
            params,
            fills,
            ema_fast: None,
            ema_slow: None,
            atr: None,
            prev_close: None,
            last_ts: 0,
            last_close: 0.0,
            samples: 0,
            regime_active: false,
            risk_per_trade: 0.0,
            position: 0.0,
        }
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    fn next_ema(current: Option<f64>, close: f64, window: u32) -> f64 {
        let k = 2.0 / (f64::from(window) + 1.0);
        match current {
            None => close,
            Some(prev) => prev + k * (close - prev),
        }
    }

    // Wilder smoothing over the true range.
    fn update_atr(&mut self, candle: &Candle) {
        let true_range = match self.prev_close {
            None => candle.range(),
            Some(prev) => candle.high.max(prev) - candle.low.min(prev),
        };
        let window = f64::from(self.params.atr_window);
        self.atr = Some(match self.atr {
            None => true_range,
            Some(prev) => (prev * (window - 1.0) + true_range) / window,
        });
    }

    fn emit_fill(&self, side: Side, size: f64, reason: Option<&str>) -> Result<()> {
        self.fills
            .send(FillRecord {
                timestamp: self.last_ts,
                instrument: self.instrument.clone(),
                side,
                size,
                price: self.last_close,
                reason: reason.map(|r| r.to_string()),
            })
            .map_err(|_| anyhow!("fill channel closed for {}", self.instrument))
    }
}

#[async_trait]
impl PortfolioStrategy for TrendStrategy {
    fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    fn set_risk_per_trade(&mut self, value: f64) {
        self.risk_per_trade = value;
    }

    fn is_regime_active(&self) -> bool {
        self.regime_active
    }

    async fn update_state(&mut self, event: &CandleClosedEvent) -> Result<()> {
        let candle = &event.candle;
        self.update_atr(candle);
        self.ema_fast = Some(Self::next_ema(self.ema_fast, candle.close, self.params.ema_fast));
        self.ema_slow = Some(Self::next_ema(self.ema_slow, candle.close, self.params.ema_slow));
        self.prev_close = Some(candle.close);
        self.last_ts = candle.timestamp;
        self.last_close = candle.close;
        self.samples += 1;

        self.regime_active = self.samples >= self.params.ema_slow
            && matches!(
                (self.ema_fast, self.ema_slow),
                (Some(fast), Some(slow)) if fast > slow
            );
        Ok(())
    }

    async fn evaluate_signals(&mut self) -> Result<()> {
        if self.regime_active && self.position == 0.0 {
            let size = atr_normalised_size(
                self.risk_per_trade,
                self.atr.unwrap_or(0.0),
                self.params.atr_risk_mult,
                self.params.min_size,
                self.params.max_size,
            );
            if size > 0.0 {
                self.emit_fill(Side::Buy, size, None)?;
                self.position = size;
            }
        } else if !self.regime_active && self.position > 0.0 {
            self.emit_fill(Side::Sell, self.position, Some("regime_exit"))?;
            self.position = 0.0;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::Period;
    use tokio::sync::mpsc;

    const MINUTE: u64 = 60_000;

    fn event(instrument: &Instrument, ts: u64, close: f64) -> CandleClosedEvent {
        CandleClosedEvent {
            instrument: instrument.clone(),
            period: Period::Minutes(15),
            candle: Candle::new(ts, close, close * 1.01, close * 0.99, close),
        }
    }

    fn small_params() -> TrendParams {
        TrendParams {
            ema_fast: 2,
            ema_slow: 4,
            atr_window: 3,
            atr_risk_mult: 1.0,
            min_size: 0.0,
            max_size: 100.0,
        }
    }

    #[tokio::test]
    async fn enters_on_regime_and_exits_on_regime_loss() {
        let inst = Instrument::from("BTCUSDT");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut strategy = TrendStrategy::new(inst.clone(), small_params(), tx);
        strategy.set_risk_per_trade(50.0);

        // Rising closes: regime activates once the slow window is filled.
        for (i, close) in [100.0, 102.0, 104.0, 106.0, 108.0].iter().enumerate() {
            strategy
                .update_state(&event(&inst, i as u64 * 15 * MINUTE, *close))
                .await
                .unwrap();
            strategy.evaluate_signals().await.unwrap();
        }
        assert!(strategy.is_regime_active());
        assert!(strategy.position() > 0.0);

        let entry = rx.try_recv().unwrap();
        assert_eq!(entry.side, Side::Buy);
        assert!(entry.size > 0.0);

        // Falling closes flip the regime off; the position is closed.
        for (i, close) in [90.0, 80.0, 70.0].iter().enumerate() {
            strategy
                .update_state(&event(&inst, (5 + i as u64) * 15 * MINUTE, *close))
                .await
                .unwrap();
            strategy.evaluate_signals().await.unwrap();
        }
        assert!(!strategy.is_regime_active());
        assert_eq!(strategy.position(), 0.0);

        let exit = rx.try_recv().unwrap();
        assert_eq!(exit.side, Side::Sell);
        assert_eq!(exit.size, entry.size);
        assert_eq!(exit.reason.as_deref(), Some("regime_exit"));
    }

    #[tokio::test]
    async fn no_entry_before_slow_window_fills() {
        let inst = Instrument::from("BTCUSDT");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut strategy = TrendStrategy::new(inst.clone(), small_params(), tx);
        strategy.set_risk_per_trade(50.0);

        for (i, close) in [100.0, 105.0, 110.0].iter().enumerate() {
            strategy
                .update_state(&event(&inst, i as u64 * 15 * MINUTE, *close))
                .await
                .unwrap();
            strategy.evaluate_signals().await.unwrap();
        }
        assert!(!strategy.is_regime_active());
        assert!(rx.try_recv().is_err());
    }
}
