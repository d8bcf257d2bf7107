// In crates/backtester/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BacktestError {
    #[error("Strategy not found: {0}")]
    UnknownStrategy(String),

    #[error("Invalid backtest parameters: {0}")]
    InvalidParams(String),

    #[error("Backtest cancelled")]
    Cancelled,

    #[error("Backtest exceeded its {budget_secs}s budget")]
    TimedOut { budget_secs: u64 },

    #[error("Order error: {0}")]
    Order(#[from] core_types::Error),

    #[error("Backtest task failed: {0}")]
    Aborted(String),
}

impl From<strategies::Error> for BacktestError {
    fn from(err: strategies::Error) -> Self {
        match err {
            strategies::Error::UnknownStrategy(id) => BacktestError::UnknownStrategy(id),
            strategies::Error::InvalidParameters(detail) => BacktestError::InvalidParams(detail),
        }
    }
}

impl From<risk::Error> for BacktestError {
    fn from(err: risk::Error) -> Self {
        BacktestError::InvalidParams(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BacktestError>;
