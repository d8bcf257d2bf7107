// In crates/execution/src/engine.rs

use crate::ledger::PositionLedger;
use crate::types::{Placement, SimulationSettings};
use core_types::{Error, Instrument, Order, OrderType, ProtectiveLevels, Quote, RejectReason, Result, Side};
use rust_decimal::Decimal;

/// Validates orders and turns accepted ones into positions or pending orders.
///
/// Rejections never touch the ledger.
#[derive(Debug, Clone)]
pub struct OrderEngine {
    settings: SimulationSettings,
}

impl OrderEngine {
    pub fn new(settings: SimulationSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SimulationSettings {
        &self.settings
    }

    /// Validates `order` against `quote` and either fills it at the entry side
    /// (market) or files it in the ledger's pending book.
    pub fn place_order(
        &self,
        order: Order,
        instrument: &Instrument,
        quote: &Quote,
        ledger: &mut PositionLedger,
    ) -> Result<Placement> {
        if order.symbol != instrument.symbol || quote.symbol != instrument.symbol {
            return Err(Error::InvariantViolation(format!(
                "order for {} priced with {} quote on {}",
                order.symbol, quote.symbol, instrument.symbol
            )));
        }

        if let Err(e) = self.validate(&order, instrument, quote, ledger) {
            tracing::info!(symbol = %order.symbol, side = %order.side, order_type = %order.order_type, error = %e, "Order rejected.");
            return Err(e);
        }

        match order.order_type {
            OrderType::Market => {
                let fill_price = quote.entry_price(order.side);
                let position = ledger.open_position(&order, fill_price, quote);
                Ok(Placement::Filled(position))
            }
            OrderType::Limit | OrderType::Stop | OrderType::StopLimit => {
                let pending = ledger.add_pending(order);
                tracing::info!(id = %pending.id, symbol = %pending.order.symbol, order_type = %pending.order.order_type, "Pending order accepted.");
                Ok(Placement::Pending(pending))
            }
        }
    }

    /// Runs the validation pipeline; the first failing step decides the reason.
    pub fn validate(&self, order: &Order, instrument: &Instrument, quote: &Quote, ledger: &PositionLedger) -> Result<()> {
        // --- 1. Quantity ---
        if order.quantity <= Decimal::ZERO {
            return Err(Error::validation(
                RejectReason::InvalidQuantity,
                format!("quantity must be positive, got {}", order.quantity),
            ));
        }
        if order.quantity < instrument.min_quantity || order.quantity > instrument.max_quantity {
            return Err(Error::validation(
                RejectReason::InvalidQuantity,
                format!(
                    "quantity {} outside [{}, {}] for {}",
                    order.quantity, instrument.min_quantity, instrument.max_quantity, instrument.symbol
                ),
            ));
        }

        // --- 2. Leverage ---
        if !self.settings.supported_leverages.contains(&order.leverage) || order.leverage > instrument.max_leverage {
            return Err(Error::validation(
                RejectReason::InvalidLeverage,
                format!(
                    "leverage {} not available for {} (max {})",
                    order.leverage, instrument.symbol, instrument.max_leverage
                ),
            ));
        }

        // --- 3. Trigger prices ---
        check_trigger_prices(order, quote)?;

        // --- 4. Protective levels against the intended entry ---
        let entry = order.intended_entry(quote).ok_or_else(|| {
            Error::validation(RejectReason::InvalidPriceLevel, "order has no entry price")
        })?;
        check_protective_levels(order.side, entry, &order.protective_levels())?;

        // --- 5. Margin ---
        let required = order.quantity * entry / order.leverage.ratio();
        let available = ledger.snapshot().free_margin;
        if required > available {
            return Err(Error::InsufficientMargin { required, available });
        }

        Ok(())
    }
}

fn check_trigger_prices(order: &Order, quote: &Quote) -> Result<()> {
    let side = order.side;
    let entry = quote.entry_price(side);
    let missing = |what: &str| Error::validation(RejectReason::InvalidPriceLevel, format!("{} order needs a {} price", order.order_type, what));

    match order.order_type {
        OrderType::Market => Ok(()),
        OrderType::Limit => {
            let limit = order.limit_price.ok_or_else(|| missing("limit"))?;
            // Buy limits rest below the ask, sell limits above the bid.
            let valid = match side {
                Side::Buy => limit < entry,
                Side::Sell => limit > entry,
            };
            ensure_level(valid && limit > Decimal::ZERO, "limit", limit, entry)
        }
        OrderType::Stop => {
            let stop = order.stop_price.ok_or_else(|| missing("stop"))?;
            ensure_stop(side, stop, entry)
        }
        OrderType::StopLimit => {
            let stop = order.stop_price.ok_or_else(|| missing("stop"))?;
            let limit = order.limit_price.ok_or_else(|| missing("limit"))?;
            ensure_stop(side, stop, entry)?;
            let valid = match side {
                Side::Buy => limit >= stop,
                Side::Sell => limit <= stop,
            };
            ensure_level(valid, "limit", limit, stop)
        }
    }
}

fn ensure_stop(side: Side, stop: Decimal, entry: Decimal) -> Result<()> {
    // Buy stops sit above the ask, sell stops below the bid.
    let valid = match side {
        Side::Buy => stop > entry,
        Side::Sell => stop < entry,
    };
    ensure_level(valid && stop > Decimal::ZERO, "stop", stop, entry)
}

fn ensure_level(valid: bool, what: &str, level: Decimal, reference: Decimal) -> Result<()> {
    if valid {
        Ok(())
    } else {
        Err(Error::validation(
            RejectReason::InvalidPriceLevel,
            format!("{} price {} is on the wrong side of {}", what, level, reference),
        ))
    }
}

/// Checks that a stop-loss sits strictly on the loss side of `reference` and a
/// take-profit strictly on the profit side.
pub fn check_protective_levels(side: Side, reference: Decimal, levels: &ProtectiveLevels) -> Result<()> {
    if let Some(sl) = levels.stop_loss {
        let valid = sl > Decimal::ZERO
            && match side {
                Side::Buy => sl < reference,
                Side::Sell => sl > reference,
            };
        if !valid {
            return Err(Error::validation(
                RejectReason::InvalidProtectiveLevel,
                format!("stop-loss {} must be on the loss side of {} for a {}", sl, reference, side),
            ));
        }
    }
    if let Some(tp) = levels.take_profit {
        let valid = tp > Decimal::ZERO
            && match side {
                Side::Buy => tp > reference,
                Side::Sell => tp < reference,
            };
        if !valid {
            return Err(Error::validation(
                RejectReason::InvalidProtectiveLevel,
                format!("take-profit {} must be on the profit side of {} for a {}", tp, reference, side),
            ));
        }
    }
    Ok(())
}
