// In crates/quotes/src/generator.rs

use chrono::{DateTime, Duration, Utc};
use core_types::{Error, Instrument, Quote, Result};
use num_traits::FromPrimitive;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;

/// Produces synthetic quotes by a bounded random walk.
///
/// Each step moves the price by `previous × volatility × u` with `u` drawn
/// uniformly from `[-1, 1]`, rounded to the instrument's tick precision.
/// The price never drops below one tick.
///
/// The random source is injected. Use [`QuoteGenerator::seeded`] anywhere
/// results must be reproducible (tests, backtests) and
/// [`QuoteGenerator::from_entropy`] for an interactive session.
#[derive(Debug, Clone)]
pub struct QuoteGenerator<R = ChaCha8Rng> {
    rng: R,
}

impl QuoteGenerator<ChaCha8Rng> {
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(ChaCha8Rng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::with_rng(ChaCha8Rng::from_entropy())
    }
}

impl<R: Rng> QuoteGenerator<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    /// Draws the next price from `previous`.
    pub fn next_price(&mut self, instrument: &Instrument, previous: Decimal) -> Decimal {
        let draw: f64 = self.rng.gen_range(-1.0..=1.0);
        let u = Decimal::from_f64(draw).unwrap_or(Decimal::ZERO).round_dp(8);
        let delta = previous * instrument.volatility * u;
        let next = instrument.round_price(previous + delta);
        let floor = min_price(instrument);
        if next < floor {
            tracing::debug!(symbol = %instrument.symbol, %previous, %next, "Clamping non-positive draw.");
            floor
        } else {
            next
        }
    }

    /// Advances the instrument's walk by one tick from its current price.
    pub fn next_quote(&mut self, instrument: &Instrument, timestamp: DateTime<Utc>) -> Quote {
        let price = self.next_price(instrument, instrument.current_price());
        instrument.quote_at(price, timestamp)
    }

    /// Builds a look-back history of `len` quotes ending at `end`.
    ///
    /// The newest quote sits exactly at the instrument's current price so a
    /// chart switching to this instrument continues seamlessly from it.
    /// Fails only when the window reaches outside the representable time range.
    pub fn reseed_history(
        &mut self,
        instrument: &Instrument,
        len: usize,
        end: DateTime<Utc>,
        interval: Duration,
    ) -> Result<Vec<Quote>> {
        if len == 0 {
            return Ok(Vec::new());
        }
        let steps = len - 1;
        span(interval, steps).and_then(|back| end.checked_sub_signed(back)).ok_or_else(|| {
            Error::WindowOutOfRange(format!("{} quotes of {} ending at {}", len, interval, end))
        })?;

        let mut prices = Vec::with_capacity(len);
        let mut price = instrument.round_price(instrument.current_price()).max(min_price(instrument));
        prices.push(price);
        for _ in 1..len {
            price = self.next_price(instrument, price);
            prices.push(price);
        }
        // The walk was generated forward from the current price; read it
        // backwards so that it ends there instead.
        prices.reverse();

        prices
            .into_iter()
            .enumerate()
            .map(|(i, price)| -> Result<Quote> {
                let back = span(interval, steps - i).ok_or_else(|| {
                    Error::WindowOutOfRange(format!("{} steps of {}", steps - i, interval))
                })?;
                Ok(instrument.quote_at(price, end - back))
            })
            .collect()
    }

    /// Builds a forward series of `len` quotes starting at the reference price.
    pub fn series(
        &mut self,
        instrument: &Instrument,
        len: usize,
        start: DateTime<Utc>,
        interval: Duration,
    ) -> Result<Vec<Quote>> {
        if len > 0 {
            span(interval, len - 1).and_then(|ahead| start.checked_add_signed(ahead)).ok_or_else(|| {
                Error::WindowOutOfRange(format!("{} quotes of {} starting at {}", len, interval, start))
            })?;
        }
        let mut quotes = Vec::with_capacity(len);
        let mut price = instrument.round_price(instrument.reference_price).max(min_price(instrument));
        for i in 0..len {
            if i > 0 {
                price = self.next_price(instrument, price);
            }
            let ahead = span(interval, i)
                .ok_or_else(|| Error::WindowOutOfRange(format!("{} steps of {}", i, interval)))?;
            quotes.push(instrument.quote_at(price, start + ahead));
        }
        Ok(quotes)
    }
}

/// `interval × steps`, or `None` if it overflows.
fn span(interval: Duration, steps: usize) -> Option<Duration> {
    i32::try_from(steps).ok().and_then(|n| interval.checked_mul(n))
}

/// The smallest price a walk may reach: one tick.
fn min_price(instrument: &Instrument) -> Decimal {
    if instrument.tick_size > Decimal::ZERO {
        instrument.tick_size
    } else {
        Decimal::new(1, 8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::AssetClass;
    use rust_decimal_macros::dec;

    fn eurusd() -> Instrument {
        Instrument::new("EURUSD", "Euro / US Dollar", AssetClass::Forex, dec!(0.0001), dec!(1.0850))
    }

    #[test]
    fn test_same_seed_same_walk() {
        let instrument = eurusd();
        let start = Utc::now();
        let a = QuoteGenerator::seeded(42).series(&instrument, 50, start, Duration::seconds(1)).unwrap();
        let b = QuoteGenerator::seeded(42).series(&instrument, 50, start, Duration::seconds(1)).unwrap();
        assert_eq!(a, b);

        let c = QuoteGenerator::seeded(7).series(&instrument, 50, start, Duration::seconds(1)).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_steps_are_bounded_by_volatility() {
        let instrument = eurusd();
        let mut generator = QuoteGenerator::seeded(1);
        let mut price = instrument.reference_price;
        for _ in 0..1_000 {
            let next = generator.next_price(&instrument, price);
            let bound = price * instrument.volatility + instrument.tick_size;
            assert!((next - price).abs() <= bound, "step {} -> {} exceeds {}", price, next, bound);
            assert_eq!(next, instrument.round_price(next));
            price = next;
        }
    }

    #[test]
    fn test_price_never_goes_non_positive() {
        let instrument = Instrument::new("PENNY", "Penny", AssetClass::Equity, dec!(0.01), dec!(0.02))
            .with_volatility(dec!(5));
        let mut generator = QuoteGenerator::seeded(3);
        let mut price = instrument.reference_price;
        for _ in 0..500 {
            price = generator.next_price(&instrument, price);
            assert!(price >= dec!(0.01));
        }
    }

    #[test]
    fn test_reseeded_history_ends_at_current_price() {
        let instrument = eurusd();
        let end = Utc::now();
        let history = QuoteGenerator::seeded(9).reseed_history(&instrument, 20, end, Duration::seconds(2)).unwrap();
        assert_eq!(history.len(), 20);
        let last = history.last().unwrap();
        assert_eq!(last.price, dec!(1.0850));
        assert_eq!(last.timestamp, end);
        assert_eq!(history[0].timestamp, end - Duration::seconds(38));
        assert!(history.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn test_oversized_window_is_rejected() {
        let instrument = eurusd();
        let mut generator = QuoteGenerator::seeded(5);
        let too_many = i32::MAX as usize + 2;

        let err = generator
            .series(&instrument, too_many, DateTime::UNIX_EPOCH, Duration::seconds(1))
            .unwrap_err();
        assert!(matches!(err, Error::WindowOutOfRange(_)));

        let err = generator
            .reseed_history(&instrument, 10, DateTime::UNIX_EPOCH, Duration::days(365 * 300_000))
            .unwrap_err();
        assert!(matches!(err, Error::WindowOutOfRange(_)));
    }
}
