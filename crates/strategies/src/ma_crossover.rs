// In crates/strategies/src/ma_crossover.rs

use crate::types::MACrossoverSettings;
use crate::{unseen, Error, Result, Signal, Strategy};
use chrono::{DateTime, Utc};
use core_types::Quote;
use num_traits::cast::ToPrimitive;
use ta::indicators::ExponentialMovingAverage as Ema;
use ta::Next;

/// The stateful struct for the EMA crossover strategy.
#[derive(Debug)]
pub struct MACrossover {
    /// The configuration for this strategy instance.
    settings: MACrossoverSettings,
    fast_ema: Ema,
    slow_ema: Ema,
    /// EMA values after the previous quote, as `(fast, slow)`.
    last_values: Option<(f64, f64)>,
    samples: usize,
    last_seen: Option<DateTime<Utc>>,
}

impl MACrossover {
    /// Creates a new `MACrossover` strategy instance from its settings.
    pub fn new(settings: MACrossoverSettings) -> Result<Self> {
        if settings.fast_period == 0 || settings.fast_period >= settings.slow_period {
            return Err(Error::InvalidParameters(format!(
                "fast_period ({}) must be positive and below slow_period ({})",
                settings.fast_period, settings.slow_period
            )));
        }
        let fast_ema = Ema::new(settings.fast_period as usize).map_err(|e| Error::InvalidParameters(format!("{:?}", e)))?;
        let slow_ema = Ema::new(settings.slow_period as usize).map_err(|e| Error::InvalidParameters(format!("{:?}", e)))?;
        Ok(Self {
            settings,
            fast_ema,
            slow_ema,
            last_values: None,
            samples: 0,
            last_seen: None,
        })
    }
}

impl Strategy for MACrossover {
    fn name(&self) -> &'static str {
        "MACrossover"
    }

    fn assess(&mut self, history: &[Quote]) -> Signal {
        let mut signal = Signal::Hold;

        for quote in unseen(history, self.last_seen) {
            // We calculate the indicator on the mid price of each quote.
            let price = quote.price.to_f64().unwrap_or(0.0);
            let fast = self.fast_ema.next(price);
            let slow = self.slow_ema.next(price);
            self.samples += 1;
            self.last_seen = Some(quote.timestamp);

            // Crossovers only count once the slow EMA has a full period behind it.
            let warmed_up = self.samples > self.settings.slow_period as usize;
            signal = match self.last_values {
                Some((last_fast, last_slow)) if warmed_up => {
                    if fast > slow && last_fast <= last_slow {
                        // Bullish Crossover: Fast line just crossed above the slow line.
                        Signal::GoLong { confidence: self.settings.confidence }
                    } else if fast < slow && last_fast >= last_slow {
                        // Bearish Crossover: Fast line just crossed below the slow line.
                        Signal::GoShort { confidence: self.settings.confidence }
                    } else {
                        Signal::Hold
                    }
                }
                _ => Signal::Hold,
            };
            self.last_values = Some((fast, slow));
        }

        signal
    }
}
