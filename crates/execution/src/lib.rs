// In crates/execution/src/lib.rs

pub mod engine;
pub mod ledger;
pub mod pending;
pub mod swap;
pub mod types;

// Re-export public types
pub use core_types::{Error, Result};
pub use engine::{check_protective_levels, OrderEngine};
pub use ledger::PositionLedger;
pub use pending::{PendingBook, PendingOrder};
pub use swap::SwapPolicy;
pub use types::{Placement, SimulationSettings, TickReport};
