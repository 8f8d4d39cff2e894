//! Portfolio risk allocation policies.

use std::collections::HashMap;

use anyhow::{ensure, Result};

use crate::events::Instrument;

/// Splits a shared risk budget across whichever instruments are currently in
/// regime. An empty active set is a valid state and yields an empty mapping.
///
/// Contract for implementations: allocations sum to at most the budget,
/// empty input produces empty output, and strictly positive weights produce
/// strictly positive allocations. Faults propagate to the orchestrator — no
/// fallback allocation is substituted.
pub trait RiskAllocationPolicy: Send + Sync {
    fn allocate(&self, active_instruments: &[Instrument]) -> Result<HashMap<Instrument, f64>>;
}

/// `budget / k` for each of the `k` active instruments.
#[derive(Debug, Clone, Copy)]
pub struct EqualSplitPolicy {
    portfolio_risk_budget: f64,
}

impl EqualSplitPolicy {
    pub fn new(portfolio_risk_budget: f64) -> Self {
        Self {
            portfolio_risk_budget,
        }
    }
}

impl RiskAllocationPolicy for EqualSplitPolicy {
    fn allocate(&self, active: &[Instrument]) -> Result<HashMap<Instrument, f64>> {
        if active.is_empty() {
            return Ok(HashMap::new());
        }
        let per = self.portfolio_risk_budget / active.len() as f64;
        Ok(active.iter().map(|inst| (inst.clone(), per)).collect())
    }
}

/// Fixed relative weights, renormalized over the active subset.
///
/// Active instruments without a configured weight are ignored; when none of
/// the active instruments are configured the policy falls back to an equal
/// split across the active set.
#[derive(Debug, Clone)]
pub struct FixedWeightPolicy {
    portfolio_risk_budget: f64,
    base_weights: HashMap<Instrument, f64>,
}

impl FixedWeightPolicy {
    pub fn new(
        portfolio_risk_budget: f64,
        weights: HashMap<Instrument, f64>,
    ) -> Result<Self> {
        let positive: HashMap<Instrument, f64> =
            weights.into_iter().filter(|(_, w)| *w > 0.0).collect();
        ensure!(
            !positive.is_empty(),
            "at least one allocation weight must be > 0"
        );
        let total: f64 = positive.values().sum();
        let base_weights = positive
            .into_iter()
            .map(|(inst, weight)| (inst, weight / total))
            .collect();
        Ok(Self {
            portfolio_risk_budget,
            base_weights,
        })
    }
}

impl RiskAllocationPolicy for FixedWeightPolicy {
    fn allocate(&self, active: &[Instrument]) -> Result<HashMap<Instrument, f64>> {
        if active.is_empty() {
            return Ok(HashMap::new());
        }

        let configured: Vec<(&Instrument, f64)> = active
            .iter()
            .filter_map(|inst| self.base_weights.get(inst).map(|w| (inst, *w)))
            .collect();

        if configured.is_empty() {
            let per = self.portfolio_risk_budget / active.len() as f64;
            return Ok(active.iter().map(|inst| (inst.clone(), per)).collect());
        }

        let total: f64 = configured.iter().map(|(_, w)| w).sum();
        Ok(configured
            .into_iter()
            .map(|(inst, weight)| {
                (inst.clone(), weight / total * self.portfolio_risk_budget)
            })
            .collect())
    }
}
