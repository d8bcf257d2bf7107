// In crates/engine/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Rejected(#[from] core_types::Error),

    #[error(transparent)]
    Backtest(#[from] backtester::BacktestError),

    #[error("Session task has stopped")]
    Stopped,
}

pub type Result<T> = std::result::Result<T, Error>;
