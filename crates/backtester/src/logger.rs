// In crates/backtester/src/logger.rs

use analytics::{EquityPoint, TradeRecord};
use chrono::{DateTime, Utc};
use core_types::{Instrument, Position};
use rust_decimal::Decimal;

/// A logger responsible for recording trades and equity changes during a backtest.
#[derive(Debug, Default)]
pub struct TradeLogger {
    pub trades: Vec<TradeRecord>,
    pub equity_curve: Vec<EquityPoint>,
}

impl TradeLogger {
    /// Creates a new, empty logger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a point in the equity curve.
    pub fn record_equity(&mut self, timestamp: DateTime<Utc>, value: Decimal) {
        self.equity_curve.push(EquityPoint { timestamp, value });
    }

    /// Records closed positions as trades. Anything still open is skipped.
    pub fn record_closed<'a>(&mut self, positions: impl IntoIterator<Item = &'a Position>, instrument: &Instrument) {
        for position in positions {
            match TradeRecord::from_position(position, instrument) {
                Some(trade) => {
                    tracing::debug!(id = %trade.id, profit = %trade.profit, reason = %trade.close_reason, "Trade logged.");
                    self.trades.push(trade);
                }
                None => tracing::warn!(id = %position.id, "Skipping position that is still open."),
            }
        }
    }
}
