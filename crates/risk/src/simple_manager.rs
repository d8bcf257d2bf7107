// In crates/risk/src/simple_manager.rs

use crate::portfolio::PortfolioSnapshot;
use crate::types::SizingSettings;
use crate::{Error, Result, RiskManager}; // Import our own trait and errors
use core_types::{Instrument, Leverage, Order, Quote, Side, Signal};
use num_traits::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec; // For creating decimals from literals

/// A simple risk manager that uses a fixed fractional position sizing model.
///
/// This manager implements three basic rules:
/// 1. Vetoes trades if signal confidence is below a configured threshold.
/// 2. Vetoes trades once the maximum number of concurrent positions is open.
/// 3. Commits a fixed percentage of equity as margin and places the
///    stop-loss and take-profit at fixed percentage distances from entry.
#[derive(Debug)]
pub struct SimpleRiskManager {
    /// The configuration for this risk manager instance.
    settings: SizingSettings,
}

impl SimpleRiskManager {
    /// Creates a new `SimpleRiskManager` instance from its settings.
    pub fn new(settings: SizingSettings) -> Result<Self> {
        if settings.position_size_pct <= 0.0 || settings.position_size_pct > 100.0 {
            return Err(Error::InvalidParameters(format!(
                "position_size_pct must be in (0, 100], got {}",
                settings.position_size_pct
            )));
        }
        if settings.stop_loss_pct < 0.0 || settings.stop_loss_pct >= 100.0 {
            return Err(Error::InvalidParameters(format!(
                "stop_loss_pct must be in [0, 100), got {}",
                settings.stop_loss_pct
            )));
        }
        if settings.take_profit_pct < 0.0 || settings.take_profit_pct >= 100.0 {
            return Err(Error::InvalidParameters(format!(
                "take_profit_pct must be in [0, 100), got {}",
                settings.take_profit_pct
            )));
        }
        if settings.max_concurrent_positions == 0 || settings.leverage == 0 {
            return Err(Error::InvalidParameters(
                "max_concurrent_positions and leverage must be at least 1".to_string(),
            ));
        }
        Ok(Self { settings })
    }

    pub fn settings(&self) -> &SizingSettings {
        &self.settings
    }
}

fn percent(value: f64) -> Result<Decimal> {
    Decimal::from_f64(value)
        .map(|v| v / dec!(100))
        .ok_or_else(|| Error::InvalidParameters(format!("{} is not a representable percentage", value)))
}

impl RiskManager for SimpleRiskManager {
    fn name(&self) -> &'static str {
        "SimpleRiskManager"
    }

    fn evaluate(
        &self,
        signal: &Signal,
        instrument: &Instrument,
        quote: &Quote,
        portfolio: &PortfolioSnapshot,
    ) -> Result<Option<Order>> {
        // --- Veto & Early Exit Logic ---

        // We are only interested in entries; `Close` is handled by the caller.
        let (side, confidence) = match signal {
            Signal::GoLong { confidence } => (Side::Buy, *confidence),
            Signal::GoShort { confidence } => (Side::Sell, *confidence),
            Signal::Hold | Signal::Close => return Ok(None),
        };

        // Rule: Veto once the concurrency limit is reached.
        if portfolio.open_positions >= self.settings.max_concurrent_positions {
            return Err(Error::Vetoed {
                reason: format!(
                    "{} positions already open (max {})",
                    portfolio.open_positions, self.settings.max_concurrent_positions
                ),
            });
        }

        // Rule: Veto if confidence is below the configured threshold.
        if confidence < self.settings.minimum_confidence {
            return Err(Error::Vetoed {
                reason: format!(
                    "Signal confidence ({:.2}) is below threshold ({:.2})",
                    confidence, self.settings.minimum_confidence
                ),
            });
        }

        // --- Position Sizing Logic ---

        let entry_price = quote.entry_price(side);
        let leverage = Leverage(self.settings.leverage);
        let margin_budget = portfolio.equity * percent(self.settings.position_size_pct)?;
        if margin_budget <= Decimal::ZERO || entry_price <= Decimal::ZERO {
            return Err(Error::Vetoed {
                reason: "No equity available to size a position".to_string(),
            });
        }

        // Notional exposure the margin budget buys, converted to units.
        let quantity_scale = instrument.min_quantity.normalize().scale();
        let quantity = (margin_budget * leverage.ratio() / entry_price)
            .round_dp_with_strategy(quantity_scale, RoundingStrategy::ToZero)
            .min(instrument.max_quantity);
        if quantity < instrument.min_quantity {
            return Err(Error::Vetoed {
                reason: format!(
                    "Sized quantity {} is below the instrument minimum {}",
                    quantity, instrument.min_quantity
                ),
            });
        }

        // --- Protective Levels ---

        let stop_distance = percent(self.settings.stop_loss_pct)?;
        let target_distance = percent(self.settings.take_profit_pct)?;
        let (stop_loss, take_profit) = match side {
            Side::Buy => (
                entry_price * (dec!(1) - stop_distance),
                entry_price * (dec!(1) + target_distance),
            ),
            Side::Sell => (
                entry_price * (dec!(1) + stop_distance),
                entry_price * (dec!(1) - target_distance),
            ),
        };

        // --- Construct the Order ---

        let mut order = Order::market(instrument.symbol.clone(), side, quantity, leverage).at(quote.timestamp);
        if !stop_distance.is_zero() {
            order = order.with_stop_loss(instrument.round_price(stop_loss));
        }
        if !target_distance.is_zero() {
            order = order.with_take_profit(instrument.round_price(take_profit));
        }

        Ok(Some(order))
    }
}
