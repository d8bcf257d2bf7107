pub mod error;
pub mod strategy;
pub mod types;

// Re-export the most important types for easy access from other crates.
pub use error::{Error, RejectReason, Result};
pub use strategy::StrategyConfig;
pub use types::{
    AssetClass, CloseReason, Instrument, Leverage, Order, OrderType, Position, PositionId,
    PositionStatus, ProtectiveLevels, Quote, Side, Signal, Symbol,
};
