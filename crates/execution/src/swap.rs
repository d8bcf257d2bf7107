// In crates/execution/src/swap.rs

use chrono::Duration;
use core_types::{Position, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const SECONDS_PER_DAY: i64 = 86_400;

/// How overnight financing (swap/carry) accrues on open positions.
///
/// Rates are amounts per unit of quantity; a negative rate is a cost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SwapPolicy {
    #[default]
    NoSwap,
    /// Daily rates, prorated by the time elapsed between marks.
    DailyRate {
        #[serde(with = "rust_decimal::serde::float")]
        long: Decimal,
        #[serde(with = "rust_decimal::serde::float")]
        short: Decimal,
    },
    /// A fixed amount charged on every tick the position is marked.
    PerTick {
        #[serde(with = "rust_decimal::serde::float")]
        long: Decimal,
        #[serde(with = "rust_decimal::serde::float")]
        short: Decimal,
    },
}

impl SwapPolicy {
    /// Swap accrued by `position` over `elapsed` since its last mark.
    pub fn accrue(&self, position: &Position, elapsed: Duration) -> Decimal {
        match self {
            SwapPolicy::NoSwap => Decimal::ZERO,
            SwapPolicy::DailyRate { long, short } => {
                let seconds = elapsed.num_seconds().max(0);
                if seconds == 0 {
                    return Decimal::ZERO;
                }
                let rate = Self::rate_for(position.side, *long, *short);
                rate * position.quantity * Decimal::from(seconds) / Decimal::from(SECONDS_PER_DAY)
            }
            SwapPolicy::PerTick { long, short } => {
                Self::rate_for(position.side, *long, *short) * position.quantity
            }
        }
    }

    fn rate_for(side: Side, long: Decimal, short: Decimal) -> Decimal {
        match side {
            Side::Buy => long,
            Side::Sell => short,
        }
    }
}
