//! Synthetic price feed: a seeded, bounded random walk per instrument.

pub mod generator;
pub mod history;

pub use generator::QuoteGenerator;
pub use history::QuoteHistory;

/// Look-back length reseeded when an instrument is selected.
pub const DEFAULT_HISTORY_LEN: usize = 20;
