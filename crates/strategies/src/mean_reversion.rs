// In crates/strategies/src/mean_reversion.rs

use crate::types::MeanReversionSettings;
use crate::{unseen, Error, Result, Signal, Strategy};
use chrono::{DateTime, Utc};
use core_types::{Quote, Side};
use rust_decimal::prelude::*;
use ta::indicators::{BollingerBands, BollingerBandsOutput, RelativeStrengthIndex as Rsi};
use ta::Next;

/// Fades moves to the Bollinger extremes once RSI shows exhaustion.
///
/// A setup bar closes outside a band with RSI beyond its threshold; the
/// entry fires on the next quote only if price has already turned back.
/// The position is exited when price returns to the middle band.
#[derive(Debug)]
pub struct MeanReversion {
    settings: MeanReversionSettings,
    // Indicators from the `ta` crate
    bbands: BollingerBands,
    rsi: Rsi,
    samples: usize,
    last_seen: Option<DateTime<Utc>>,
    // Internal state for the two-stage confirmation
    pending_setup: Option<(Side, f64)>,
    // Side held in the account, refreshed through `sync_position`
    in_position: Option<Side>,
}

impl MeanReversion {
    /// Creates a new `MeanReversion` strategy instance.
    pub fn new(settings: MeanReversionSettings) -> Result<Self> {
        if settings.rsi_oversold >= settings.rsi_overbought {
            return Err(Error::InvalidParameters(format!(
                "rsi_oversold ({}) must be below rsi_overbought ({})",
                settings.rsi_oversold, settings.rsi_overbought
            )));
        }
        let bbands = BollingerBands::new(settings.bband_period as usize, settings.bband_stddev)
            .map_err(|e| Error::InvalidParameters(format!("bollinger bands: {:?}", e)))?;
        let rsi = Rsi::new(settings.rsi_period as usize).map_err(|e| Error::InvalidParameters(format!("rsi: {:?}", e)))?;

        Ok(Self {
            settings,
            bbands,
            rsi,
            samples: 0,
            last_seen: None,
            pending_setup: None,
            in_position: None,
        })
    }

    fn warm_up_len(&self) -> usize {
        (self.settings.bband_period as usize).max(self.settings.rsi_period as usize + 1)
    }

    fn step(&mut self, price: f64, bands: &BollingerBandsOutput, rsi: f64) -> Signal {
        // 1. Check for EXIT first: has price reverted to the mean?
        match self.in_position {
            Some(Side::Buy) if price >= bands.average => {
                self.in_position = None;
                self.pending_setup = None;
                return Signal::Close;
            }
            Some(Side::Sell) if price <= bands.average => {
                self.in_position = None;
                self.pending_setup = None;
                return Signal::Close;
            }
            _ => {}
        }

        // 2. Check for ENTRY CONFIRMATION of the previous setup.
        if let Some((side, setup_price)) = self.pending_setup.take() {
            let turned = match side {
                Side::Buy => price > setup_price,
                Side::Sell => price < setup_price,
            };
            if turned && self.in_position.is_none() {
                self.in_position = Some(side);
                let confidence = self.settings.confidence;
                return match side {
                    Side::Buy => Signal::GoLong { confidence },
                    Side::Sell => Signal::GoShort { confidence },
                };
            }
        }

        // 3. Look for a NEW SETUP on the current quote.
        if self.in_position.is_none() {
            if price <= bands.lower && rsi < self.settings.rsi_oversold {
                self.pending_setup = Some((Side::Buy, price));
            } else if price >= bands.upper && rsi > self.settings.rsi_overbought {
                self.pending_setup = Some((Side::Sell, price));
            }
        }

        Signal::Hold
    }
}

impl Strategy for MeanReversion {
    fn name(&self) -> &'static str {
        "MeanReversion"
    }

    fn assess(&mut self, history: &[Quote]) -> Signal {
        let mut signal = Signal::Hold;

        for quote in unseen(history, self.last_seen) {
            let price = quote.price.to_f64().unwrap_or(0.0);
            let bands = self.bbands.next(price);
            let rsi = self.rsi.next(price);
            self.samples += 1;
            self.last_seen = Some(quote.timestamp);

            signal = if self.samples >= self.warm_up_len() {
                self.step(price, &bands, rsi)
            } else {
                Signal::Hold
            };
        }

        signal
    }

    fn sync_position(&mut self, open: Option<Side>) {
        self.in_position = open;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::quotes;

    fn strategy() -> MeanReversion {
        MeanReversion::new(MeanReversionSettings {
            bband_period: 5,
            bband_stddev: 1.5,
            rsi_period: 3,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            confidence: 0.6,
        })
        .unwrap()
    }

    #[test]
    fn test_confirmed_dip_is_bought_and_exited_at_the_mean() {
        let history = quotes(&[10.0, 10.1, 9.9, 10.0, 10.1, 9.9, 10.0, 10.0, 8.0, 8.3, 10.5]);
        let mut strategy = strategy();
        let signals: Vec<Signal> = (1..=history.len()).map(|n| strategy.assess(&history[..n])).collect();

        assert!(signals[..9].iter().all(|s| *s == Signal::Hold), "{:?}", signals);
        assert_eq!(signals[9], Signal::GoLong { confidence: 0.6 });
        assert_eq!(signals[10], Signal::Close);
    }

    #[test]
    fn test_follows_the_position_actually_held() {
        let history = quotes(&[10.0, 10.1, 9.9, 10.0, 10.1, 9.9, 10.0, 10.0, 8.0, 8.3, 10.5]);
        let mut strategy = strategy();
        assert_eq!(strategy.assess(&history[..10]), Signal::GoLong { confidence: 0.6 });

        // The long was stopped out before price got back to the mean.
        strategy.sync_position(None);
        assert_eq!(strategy.assess(&history), Signal::Hold);
        assert_eq!(strategy.in_position, None);
    }

    #[test]
    fn test_unconfirmed_setup_is_discarded() {
        // The quote after the setup keeps falling, so no entry.
        let history = quotes(&[10.0, 10.1, 9.9, 10.0, 10.1, 9.9, 10.0, 10.0, 8.0, 7.5]);
        let mut strategy = strategy();
        let signal = strategy.assess(&history);
        assert!(!matches!(signal, Signal::GoLong { .. }));
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        let settings = MeanReversionSettings {
            rsi_oversold: 80.0,
            rsi_overbought: 20.0,
            ..MeanReversionSettings::default()
        };
        assert!(matches!(MeanReversion::new(settings), Err(Error::InvalidParameters(_))));
    }
}
