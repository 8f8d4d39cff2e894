//! Phased multi-instrument orchestration.
//!
//! Every candle-close event runs a strict three-phase cycle: the event's
//! strategy observes the market, then the shared risk budget is recomputed
//! across all instruments, then — and only then — the event's strategy may
//! act. The allocation a strategy trades on is always the one computed in
//! the same cycle.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

use crate::events::{CandleClosedEvent, Instrument};
use crate::policy::RiskAllocationPolicy;

/// Capability contract the orchestrator drives strategies through.
///
/// `update_state` must not place trades; `evaluate_signals` runs only after
/// the cycle's risk allocation has been applied. Both may suspend; the
/// orchestrator awaits each hook to completion before advancing.
#[async_trait]
pub trait PortfolioStrategy: Send {
    fn instrument(&self) -> &Instrument;

    /// Per-trade risk budget, set by the orchestrator each cycle.
    fn set_risk_per_trade(&mut self, value: f64);

    /// Whether the strategy's trading regime is currently active. Read by
    /// the orchestrator to build the allocation set.
    fn is_regime_active(&self) -> bool;

    /// Update indicators, regime state, and position tracking from a new
    /// candle.
    async fn update_state(&mut self, event: &CandleClosedEvent) -> Result<()>;

    /// Make entry/exit decisions using the allocated risk budget.
    async fn evaluate_signals(&mut self) -> Result<()>;
}

/// Orchestrates a fixed set of per-instrument strategies under one shared
/// risk allocation policy.
pub struct PortfolioRunner {
    strategies: HashMap<Instrument, Box<dyn PortfolioStrategy>>,
    policy: Box<dyn RiskAllocationPolicy>,
    default_risk_per_trade: f64,
}

impl PortfolioRunner {
    /// Build from a list of strategies, keyed by their own instrument. The
    /// registry is fixed for the runner's lifetime.
    pub fn new(
        strategies: Vec<Box<dyn PortfolioStrategy>>,
        policy: Box<dyn RiskAllocationPolicy>,
        default_risk_per_trade: f64,
    ) -> Self {
        let strategies = strategies
            .into_iter()
            .map(|strategy| (strategy.instrument().clone(), strategy))
            .collect();
        Self {
            strategies,
            policy,
            default_risk_per_trade,
        }
    }

    pub fn instruments(&self) -> impl Iterator<Item = &Instrument> {
        self.strategies.keys()
    }

    pub fn strategy(&self, instrument: &Instrument) -> Option<&dyn PortfolioStrategy> {
        self.strategies.get(instrument).map(|boxed| boxed.as_ref())
    }

    fn active_instruments(&self) -> Vec<Instrument> {
        self.strategies
            .iter()
            .filter(|(_, strategy)| strategy.is_regime_active())
            .map(|(instrument, _)| instrument.clone())
            .collect()
    }

    /// Recompute the shared risk budget across every registered strategy.
    /// Instruments absent from the policy's result get the default risk.
    fn apply_risk_budgets(&mut self) -> Result<()> {
        let active = self.active_instruments();
        let allocation = self.policy.allocate(&active)?;
        for (instrument, strategy) in self.strategies.iter_mut() {
            let risk = allocation
                .get(instrument)
                .copied()
                .unwrap_or(self.default_risk_per_trade);
            strategy.set_risk_per_trade(risk);
        }
        Ok(())
    }

    /// Run one candle-close event through the three-phase lifecycle.
    ///
    /// The phases are total barriers: each hook future is awaited before the
    /// next phase starts, and the exclusive borrow keeps whole cycles from
    /// interleaving. Hook and policy errors abort the cycle and propagate.
    /// Events for unregistered instruments are ignored.
    pub async fn on_candle_close(&mut self, event: &CandleClosedEvent) -> Result<()> {
        // Phase 1: the event's strategy observes the market and may flip its
        // regime flag. No other strategy sees this event.
        match self.strategies.get_mut(&event.instrument) {
            Some(strategy) => strategy.update_state(event).await?,
            None => return Ok(()),
        }

        // Phase 2: reallocate across all instruments. A regime flip on any
        // instrument repartitions the shared budget in this same cycle.
        self.apply_risk_budgets()?;

        // Phase 3: only the strategy with fresh data acts, under the
        // allocation computed moments ago.
        if let Some(strategy) = self.strategies.get_mut(&event.instrument) {
            strategy.evaluate_signals().await?;
        }
        Ok(())
    }
}
