// In crates/strategies/src/lib.rs

use chrono::{DateTime, Utc};
use core_types::{Quote, Side, Signal};
pub mod error;
pub mod factory;
pub mod ma_crossover;
pub mod mean_reversion;
pub mod types;

pub use error::{Error, Result};
pub use factory::{create_strategy, STRATEGY_IDS};

/// The universal interface for a trading strategy.
///
/// A strategy is responsible for analyzing market data and producing a trading `Signal`.
/// It is a stateful entity, meaning it can keep track of previous data points,
/// indicator values, or its own internal state across multiple calls.
pub trait Strategy {
    /// The name of the strategy.
    fn name(&self) -> &'static str;

    /// Assesses the newest quote of `history`. Quotes already seen on an
    /// earlier call are skipped, so passing the full history or only a
    /// trailing window gives the same result.
    fn assess(&mut self, history: &[Quote]) -> Signal;

    /// Tells the strategy which side, if any, is actually held before the
    /// next assessment. Positions can close on a protective level and
    /// entries can be vetoed without the strategy seeing it.
    fn sync_position(&mut self, _open: Option<Side>) {}
}

/// The suffix of `history` newer than `last_seen`.
pub(crate) fn unseen(history: &[Quote], last_seen: Option<DateTime<Utc>>) -> &[Quote] {
    match last_seen {
        Some(seen) => {
            let start = history.partition_point(|q| q.timestamp <= seen);
            &history[start..]
        }
        None => history,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{Duration, Utc};
    use core_types::{Quote, Symbol};
    use num_traits::FromPrimitive;
    use rust_decimal::Decimal;

    /// One quote per price, a minute apart.
    pub fn quotes(prices: &[f64]) -> Vec<Quote> {
        let start = Utc::now();
        prices
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let price = Decimal::from_f64(*p).unwrap();
                Quote::new(Symbol::from("TEST"), price, Decimal::ZERO, start + Duration::minutes(i as i64))
            })
            .collect()
    }
}
