// In crates/risk/src/lib.rs

use core_types::{Instrument, Order, Quote, Signal};
pub mod portfolio;
pub mod simple_manager;

pub mod error;
pub mod types;

// Re-export public types
pub use error::{Error, Result};
pub use portfolio::{MarginBand, MarginLevel, PortfolioSnapshot, MARGIN_CALL_LEVEL, SAFE_MARGIN_LEVEL};
pub use types::SizingSettings;

/// The universal interface for a risk management module.
///
/// A `RiskManager` is responsible for evaluating a trading `Signal` against a set of
/// risk rules and, if approved, calculating the appropriate position size and creating
/// a final `Order`.
pub trait RiskManager: Sync {
    /// The name of the risk management strategy.
    fn name(&self) -> &'static str;

    /// Evaluates a signal and the current portfolio state to produce an order.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(Order))`: If the signal is approved and a new order should be placed.
    /// * `Ok(None)`: If the signal needs no new order (`Hold` or `Close`).
    /// * `Err(Error::Vetoed)`: If the signal is rejected due to a risk rule violation.
    fn evaluate(
        &self,
        signal: &Signal,
        instrument: &Instrument,
        quote: &Quote,
        portfolio: &PortfolioSnapshot,
    ) -> Result<Option<Order>>;
}
