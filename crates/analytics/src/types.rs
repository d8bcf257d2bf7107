// In crates/analytics/src/types.rs

use chrono::{DateTime, Utc};
use core_types::{CloseReason, Instrument, Leverage, Position, PositionId, Side, Symbol};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A comprehensive record of a single closed trade, from entry to exit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRecord {
    pub id: PositionId,
    pub symbol: Symbol,
    pub side: Side,
    pub quantity: Decimal,
    pub leverage: Leverage,
    pub open_price: Decimal,
    pub close_price: Decimal,
    pub open_time: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
    pub duration_secs: i64,
    /// Net realized profit: price P&L plus swap minus commission.
    pub profit: Decimal,
    /// Favourable price movement in pips/points; negative when it went against the trade.
    pub pips: Decimal,
    pub commission: Decimal,
    pub swap: Decimal,
    pub close_reason: CloseReason,
}

impl TradeRecord {
    /// Projects a closed position into a trade record. Open positions have no
    /// record yet.
    pub fn from_position(position: &Position, instrument: &Instrument) -> Option<Self> {
        let close_price = position.close_price?;
        let close_time = position.close_time?;
        let profit = position.realized_pnl?;
        let close_reason = position.close_reason?;
        let delta = (close_price - position.open_price) * position.side.sign();

        Some(Self {
            id: position.id,
            symbol: position.symbol.clone(),
            side: position.side,
            quantity: position.quantity,
            leverage: position.leverage,
            open_price: position.open_price,
            close_price,
            open_time: position.open_time,
            close_time,
            duration_secs: (close_time - position.open_time).num_seconds(),
            profit,
            pips: instrument.pips(delta),
            commission: position.commission,
            swap: position.swap,
            close_reason,
        })
    }

    pub fn outcome(&self) -> Outcome {
        if self.profit > Decimal::ZERO {
            Outcome::Win
        } else if self.profit < Decimal::ZERO {
            Outcome::Loss
        } else {
            Outcome::BreakEven
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Win,
    Loss,
    BreakEven,
}

/// Narrows a trade history. Unset fields match everything; `from` is
/// inclusive and `to` exclusive, both applied to the close time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub direction: Option<Side>,
    pub outcome: Option<Outcome>,
}

impl TradeFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn since(from: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            ..Self::default()
        }
    }

    pub fn with_direction(mut self, side: Side) -> Self {
        self.direction = Some(side);
        self
    }

    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    pub fn matches(&self, trade: &TradeRecord) -> bool {
        self.from.is_none_or(|from| trade.close_time >= from)
            && self.to.is_none_or(|to| trade.close_time < to)
            && self.direction.is_none_or(|side| trade.side == side)
            && self.outcome.is_none_or(|outcome| trade.outcome() == outcome)
    }

    /// Returns the matching trades ordered by close time.
    pub fn apply<'a>(&self, trades: impl IntoIterator<Item = &'a TradeRecord>) -> Vec<TradeRecord> {
        let mut matched: Vec<TradeRecord> = trades.into_iter().filter(|t| self.matches(t)).cloned().collect();
        matched.sort_by_key(|t| (t.close_time, t.id));
        matched
    }
}

/// A struct to hold a point in the portfolio's equity curve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub value: Decimal,
}

/// Performance statistics over a set of closed trades.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct PerformanceReport {
    pub total_trades: u32,
    pub winning_trades: u32,
    pub losing_trades: u32,
    /// Percentage of trades with positive profit; 0 without trades.
    pub win_rate: f64,
    /// Gross profit over gross loss; `None` when there are no losing trades.
    pub profit_factor: Option<f64>,
    pub average_win: Decimal,
    /// Mean of the losing trades, as a negative number.
    pub average_loss: Decimal,
    pub largest_win: Decimal,
    pub largest_loss: Decimal,
    pub gross_profit: Decimal,
    pub gross_loss: Decimal,
    pub net_profit: Decimal,
    /// Net profit relative to the initial balance, in percent.
    pub net_profit_pct: f64,
    /// Mean profit per trade.
    pub expectancy: Decimal,
    /// Largest peak-to-trough decline of cumulative realized P&L.
    pub max_drawdown: Decimal,
    pub max_drawdown_pct: f64,
    pub sharpe_ratio: f64,
    pub avg_trade_duration_secs: f64,
    pub total_commission: Decimal,
    pub total_swap: Decimal,
}

impl PerformanceReport {
    /// Creates a new, empty report with zero values.
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use core_types::{AssetClass, PositionStatus};
    use rust_decimal_macros::dec;

    fn closed_short() -> (Position, Instrument) {
        let open = Utc::now();
        let instrument = Instrument::new("EURUSD", "Euro / US Dollar", AssetClass::Forex, dec!(0.0001), dec!(1.0850));
        let position = Position {
            id: PositionId(4),
            symbol: instrument.symbol.clone(),
            side: Side::Sell,
            quantity: dec!(1000),
            leverage: Leverage(10),
            open_price: dec!(1.0850),
            open_time: open,
            stop_loss: None,
            take_profit: None,
            status: PositionStatus::Closed,
            close_price: Some(dec!(1.0830)),
            close_time: Some(open + Duration::minutes(5)),
            close_reason: Some(CloseReason::Manual),
            swap: dec!(-0.10),
            commission: dec!(0.20),
            unrealized_pnl: Decimal::ZERO,
            realized_pnl: Some(dec!(1.70)),
            marked_at: open,
        };
        (position, instrument)
    }

    #[test]
    fn test_record_from_closed_position() {
        let (position, instrument) = closed_short();
        let record = TradeRecord::from_position(&position, &instrument).unwrap();
        assert_eq!(record.pips, dec!(20));
        assert_eq!(record.duration_secs, 300);
        assert_eq!(record.profit, dec!(1.70));
        assert_eq!(record.outcome(), Outcome::Win);
    }

    #[test]
    fn test_open_position_has_no_record() {
        let (mut position, instrument) = closed_short();
        position.status = PositionStatus::Open;
        position.close_price = None;
        position.close_time = None;
        assert!(TradeRecord::from_position(&position, &instrument).is_none());
    }

    #[test]
    fn test_filter_by_window_direction_and_outcome() {
        let (position, instrument) = closed_short();
        let record = TradeRecord::from_position(&position, &instrument).unwrap();

        assert!(TradeFilter::all().matches(&record));
        assert!(TradeFilter::since(record.close_time).matches(&record));
        assert!(!TradeFilter::since(record.close_time + Duration::seconds(1)).matches(&record));
        let until = TradeFilter {
            to: Some(record.close_time),
            ..TradeFilter::default()
        };
        assert!(!until.matches(&record));
        assert!(!TradeFilter::all().with_direction(Side::Buy).matches(&record));
        assert!(TradeFilter::all().with_outcome(Outcome::Win).matches(&record));
        assert!(!TradeFilter::all().with_outcome(Outcome::Loss).matches(&record));
    }
}
