// In crates/risk/src/portfolio.rs

use core_types::Position;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

/// Margin level at or above which an account is considered safe.
pub const SAFE_MARGIN_LEVEL: Decimal = dec!(200);

/// Margin level below which an account is at risk of a margin call.
/// Nothing liquidates automatically; callers may act on this threshold.
pub const MARGIN_CALL_LEVEL: Decimal = dec!(100);

/// Equity as a percentage of used margin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MarginLevel {
    /// No margin is in use.
    Unbounded,
    Percent(Decimal),
}

impl MarginLevel {
    pub fn as_percent(&self) -> Option<Decimal> {
        match self {
            MarginLevel::Unbounded => None,
            MarginLevel::Percent(p) => Some(*p),
        }
    }

    pub fn band(&self) -> MarginBand {
        match self {
            MarginLevel::Unbounded => MarginBand::Safe,
            MarginLevel::Percent(p) if *p >= SAFE_MARGIN_LEVEL => MarginBand::Safe,
            MarginLevel::Percent(p) if *p >= MARGIN_CALL_LEVEL => MarginBand::Caution,
            MarginLevel::Percent(_) => MarginBand::MarginCall,
        }
    }
}

/// Liquidation-risk indicator derived from the margin level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarginBand {
    Safe,
    Caution,
    MarginCall,
}

/// Account-level aggregates at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSnapshot {
    pub balance: Decimal,
    pub equity: Decimal,
    pub used_margin: Decimal,
    pub free_margin: Decimal,
    pub margin_level: MarginLevel,
    pub margin_band: MarginBand,
    pub unrealized_pnl: Decimal,
    pub open_positions: usize,
}

impl PortfolioSnapshot {
    /// Recomputes every aggregate from scratch. Closed positions are ignored.
    pub fn compute<'a>(balance: Decimal, positions: impl IntoIterator<Item = &'a Position>) -> Self {
        let mut unrealized_pnl = Decimal::ZERO;
        let mut used_margin = Decimal::ZERO;
        let mut open_positions = 0;

        for position in positions.into_iter().filter(|p| p.is_open()) {
            unrealized_pnl += position.unrealized_pnl;
            used_margin += position.required_margin();
            open_positions += 1;
        }

        let equity = balance + unrealized_pnl;
        let margin_level = if used_margin.is_zero() {
            MarginLevel::Unbounded
        } else {
            MarginLevel::Percent(equity / used_margin * dec!(100))
        };

        Self {
            balance,
            equity,
            used_margin,
            free_margin: equity - used_margin,
            margin_level,
            margin_band: margin_level.band(),
            unrealized_pnl,
            open_positions,
        }
    }

    pub fn is_margin_call(&self) -> bool {
        self.margin_band == MarginBand::MarginCall
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use core_types::{Leverage, PositionId, PositionStatus, Side, Symbol};

    fn position(open_price: Decimal, quantity: Decimal, leverage: u32, unrealized: Decimal) -> Position {
        let now = Utc::now();
        Position {
            id: PositionId(1),
            symbol: Symbol::from("EURUSD"),
            side: Side::Buy,
            quantity,
            leverage: Leverage(leverage),
            open_price,
            open_time: now,
            stop_loss: None,
            take_profit: None,
            status: PositionStatus::Open,
            close_price: None,
            close_time: None,
            close_reason: None,
            swap: Decimal::ZERO,
            commission: Decimal::ZERO,
            unrealized_pnl: unrealized,
            realized_pnl: None,
            marked_at: now,
        }
    }

    #[test]
    fn test_margin_level_unbounded_without_positions() {
        let snapshot = PortfolioSnapshot::compute(dec!(10_000), &Vec::<Position>::new());
        assert_eq!(snapshot.margin_level, MarginLevel::Unbounded);
        assert_eq!(snapshot.margin_band, MarginBand::Safe);
        assert_eq!(snapshot.equity, dec!(10_000));
        assert_eq!(snapshot.free_margin, dec!(10_000));
    }

    #[test]
    fn test_used_and_free_margin() {
        let positions = vec![position(dec!(1.0850), dec!(1000), 10, dec!(1.00))];
        let snapshot = PortfolioSnapshot::compute(dec!(10_000), &positions);
        assert_eq!(snapshot.used_margin, dec!(108.50));
        assert_eq!(snapshot.equity, dec!(10_001.00));
        assert_eq!(snapshot.free_margin, dec!(9_892.50));
        assert_eq!(snapshot.open_positions, 1);
        assert_eq!(snapshot.margin_band, MarginBand::Safe);
    }

    #[test]
    fn test_closed_positions_do_not_count() {
        let mut closed = position(dec!(100), dec!(10), 1, dec!(50));
        closed.status = PositionStatus::Closed;
        let snapshot = PortfolioSnapshot::compute(dec!(1_000), &[closed]);
        assert_eq!(snapshot.used_margin, Decimal::ZERO);
        assert_eq!(snapshot.unrealized_pnl, Decimal::ZERO);
    }

    #[test]
    fn test_margin_bands() {
        assert_eq!(MarginLevel::Percent(dec!(200)).band(), MarginBand::Safe);
        assert_eq!(MarginLevel::Percent(dec!(199.9)).band(), MarginBand::Caution);
        assert_eq!(MarginLevel::Percent(dec!(100)).band(), MarginBand::Caution);
        assert_eq!(MarginLevel::Percent(dec!(99.99)).band(), MarginBand::MarginCall);

        // 1,000 margin against 900 equity.
        let positions = vec![position(dec!(100), dec!(100), 10, dec!(-100))];
        let snapshot = PortfolioSnapshot::compute(dec!(1_000), &positions);
        assert_eq!(snapshot.margin_level, MarginLevel::Percent(dec!(90)));
        assert!(snapshot.is_margin_call());
    }

    #[test]
    fn test_recompute_is_deterministic() {
        let positions = vec![
            position(dec!(1.0850), dec!(1000), 10, dec!(1.00)),
            position(dec!(250), dec!(4), 5, dec!(-3.25)),
        ];
        let a = PortfolioSnapshot::compute(dec!(5_000), &positions);
        let b = PortfolioSnapshot::compute(dec!(5_000), &positions);
        assert_eq!(a, b);
        assert_eq!(a.equity, a.balance + a.unrealized_pnl);
    }
}
