// In crates/execution/src/types.rs

use crate::pending::PendingOrder;
use crate::swap::SwapPolicy;
use core_types::{Leverage, Position};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Knobs shared by the order engine and the position ledger.
#[derive(Debug, Clone, Deserialize)]
pub struct SimulationSettings {
    /// Leverage ratios an order may request, e.g. `[1, 2, 5, 10, 20, 50, 100]`.
    #[serde(default = "default_leverages")]
    pub supported_leverages: Vec<Leverage>,

    /// Fraction of notional charged per side (e.g. 0.0001 for 0.01%).
    #[serde(default, with = "rust_decimal::serde::float")]
    pub commission_rate: Decimal,

    #[serde(default)]
    pub swap: SwapPolicy,
}

fn default_leverages() -> Vec<Leverage> {
    [1, 2, 5, 10, 20, 50, 100].into_iter().map(Leverage).collect()
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            supported_leverages: default_leverages(),
            commission_rate: Decimal::ZERO,
            swap: SwapPolicy::default(),
        }
    }
}

/// The outcome of an accepted order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum Placement {
    /// A market order, filled at the entry side of the quote.
    Filled(Position),
    /// A limit, stop or stop-limit order waiting in the book.
    Pending(PendingOrder),
}

/// Everything a single quote tick changed in the ledger.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Positions auto-closed by a stop-loss or take-profit.
    pub closed: Vec<Position>,
    /// Positions opened by triggered pending orders.
    pub filled: Vec<Position>,
    /// Pending orders that triggered but could no longer be afforded.
    pub dropped: Vec<PendingOrder>,
}

impl TickReport {
    pub fn is_empty(&self) -> bool {
        self.closed.is_empty() && self.filled.is_empty() && self.dropped.is_empty()
    }
}
