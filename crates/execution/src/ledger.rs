// In crates/execution/src/ledger.rs

use crate::engine::check_protective_levels;
use crate::pending::{PendingBook, PendingOrder};
use crate::swap::SwapPolicy;
use crate::types::{SimulationSettings, TickReport};
use core_types::{
    CloseReason, Error, Instrument, Order, Position, PositionId, PositionStatus, ProtectiveLevels, Quote, Result,
    Symbol,
};
use risk::PortfolioSnapshot;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// The single owner of account balance, positions and pending orders.
///
/// Positions are only ever mutated here: by a quote tick (mark-to-market,
/// swap, stop-loss/take-profit) or by an explicit close/modify command.
#[derive(Debug, Clone)]
pub struct PositionLedger {
    initial_balance: Decimal,
    balance: Decimal,
    next_id: u64,
    positions: BTreeMap<PositionId, Position>,
    pending: PendingBook,
    swap: SwapPolicy,
    commission_rate: Decimal,
}

impl PositionLedger {
    pub fn new(initial_balance: Decimal, settings: &SimulationSettings) -> Self {
        Self {
            initial_balance,
            balance: initial_balance,
            next_id: 1,
            positions: BTreeMap::new(),
            pending: PendingBook::new(),
            swap: settings.swap,
            commission_rate: settings.commission_rate,
        }
    }

    pub fn initial_balance(&self) -> Decimal {
        self.initial_balance
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn snapshot(&self) -> PortfolioSnapshot {
        PortfolioSnapshot::compute(self.balance, self.positions.values())
    }

    pub fn position(&self, id: PositionId) -> Option<&Position> {
        self.positions.get(&id)
    }

    pub fn open_positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values().filter(|p| p.is_open())
    }

    /// Closed positions in the order they were closed.
    pub fn closed_positions(&self) -> Vec<&Position> {
        let mut closed: Vec<&Position> = self.positions.values().filter(|p| !p.is_open()).collect();
        closed.sort_by_key(|p| (p.close_time, p.id));
        closed
    }

    pub fn pending_orders(&self) -> impl Iterator<Item = &PendingOrder> {
        self.pending.iter()
    }

    /// Whether `symbol` has open positions or pending orders that need ticks.
    pub fn has_exposure(&self, symbol: &Symbol) -> bool {
        self.open_positions().any(|p| &p.symbol == symbol) || self.pending.has_symbol(symbol)
    }

    fn allocate_id(&mut self) -> PositionId {
        let id = PositionId(self.next_id);
        self.next_id += 1;
        id
    }

    fn commission_on(&self, price: Decimal, quantity: Decimal) -> Decimal {
        self.commission_rate * price * quantity
    }

    /// Opens a position for an already validated order at `fill_price`.
    pub(crate) fn open_position(&mut self, order: &Order, fill_price: Decimal, quote: &Quote) -> Position {
        let id = self.allocate_id();
        let position = self.insert_position(id, order, fill_price, quote);
        tracing::info!(
            %id,
            symbol = %position.symbol,
            side = %position.side,
            quantity = %position.quantity,
            price = %position.open_price,
            leverage = %position.leverage,
            "Position opened."
        );
        position
    }

    fn insert_position(&mut self, id: PositionId, order: &Order, fill_price: Decimal, quote: &Quote) -> Position {
        let mut position = Position {
            id,
            symbol: order.symbol.clone(),
            side: order.side,
            quantity: order.quantity,
            leverage: order.leverage,
            open_price: fill_price,
            open_time: quote.timestamp,
            stop_loss: order.stop_loss,
            take_profit: order.take_profit,
            status: PositionStatus::Open,
            close_price: None,
            close_time: None,
            close_reason: None,
            swap: Decimal::ZERO,
            commission: self.commission_on(fill_price, order.quantity),
            unrealized_pnl: Decimal::ZERO,
            realized_pnl: None,
            marked_at: quote.timestamp,
        };
        position.unrealized_pnl = position.pnl_at(quote.exit_price(position.side));
        self.positions.insert(id, position.clone());
        position
    }

    /// Files an already validated order in the pending book.
    pub(crate) fn add_pending(&mut self, order: Order) -> PendingOrder {
        let pending = PendingOrder::new(self.allocate_id(), order);
        self.pending.insert(pending.clone());
        pending
    }

    /// Applies one quote tick for `instrument`.
    ///
    /// Open positions are marked at the exit side and closed if a protective
    /// level was crossed, then pending orders on the instrument are evaluated
    /// in placement order.
    pub fn on_tick(&mut self, instrument: &Instrument, quote: &Quote) -> Result<TickReport> {
        if quote.symbol != instrument.symbol {
            return Err(Error::InvariantViolation(format!(
                "{} quote applied to {}",
                quote.symbol, instrument.symbol
            )));
        }

        let mut report = TickReport::default();

        // --- 1. Mark open positions and sweep protective levels ---
        let open_ids: Vec<PositionId> = self
            .open_positions()
            .filter(|p| p.symbol == quote.symbol)
            .map(|p| p.id)
            .collect();

        for id in open_ids {
            let trigger = {
                let position = self.mark(id, quote)?;
                position.triggered_level(quote.exit_price(position.side))
            };
            if let Some(reason) = trigger {
                let closed = self.settle(id, quote, reason)?;
                report.closed.push(closed);
            }
        }

        // --- 2. Evaluate pending orders ---
        for id in self.pending.ids_for(&quote.symbol) {
            let fill_price = match self.pending.get_mut(id) {
                Some(pending) => pending.evaluate(quote),
                None => continue,
            };
            let Some(fill_price) = fill_price else {
                continue;
            };
            let Some(pending) = self.pending.remove(id) else {
                continue;
            };

            let required = pending.order.quantity * fill_price / pending.order.leverage.ratio();
            let available = self.snapshot().free_margin;
            if required > available {
                tracing::warn!(
                    %id,
                    symbol = %pending.order.symbol,
                    %required,
                    %available,
                    "Pending order triggered without enough free margin. Dropping it."
                );
                report.dropped.push(pending);
                continue;
            }

            // A gap can carry the fill past the order's own stop-loss or take-profit.
            let levels = pending.order.protective_levels();
            if let Err(e) = check_protective_levels(pending.order.side, fill_price, &levels) {
                tracing::warn!(
                    %id,
                    symbol = %pending.order.symbol,
                    price = %fill_price,
                    error = %e,
                    "Pending order filled through its protective levels. Dropping it."
                );
                report.dropped.push(pending);
                continue;
            }

            let position = self.insert_position(id, &pending.order, fill_price, quote);
            tracing::info!(
                %id,
                symbol = %position.symbol,
                side = %position.side,
                order_type = %pending.order.order_type,
                price = %fill_price,
                "Pending order filled."
            );
            report.filled.push(position);
        }

        Ok(report)
    }

    /// Marks an open position at `quote` and accrues swap since its last mark.
    fn mark(&mut self, id: PositionId, quote: &Quote) -> Result<&Position> {
        let swap = self.swap;
        let position = self
            .positions
            .get_mut(&id)
            .ok_or(Error::NotFound(id))?;
        if !position.is_open() {
            return Err(Error::InvariantViolation(format!("cannot mark closed position {}", id)));
        }

        let elapsed = quote.timestamp - position.marked_at;
        position.swap += swap.accrue(position, elapsed);
        position.unrealized_pnl = position.pnl_at(quote.exit_price(position.side));
        position.marked_at = position.marked_at.max(quote.timestamp);
        Ok(&*position)
    }

    /// Closes an open position at the exit side of `quote` and credits the
    /// realized P&L to the balance.
    fn settle(&mut self, id: PositionId, quote: &Quote, reason: CloseReason) -> Result<Position> {
        let commission_rate = self.commission_rate;
        let position = self
            .positions
            .get_mut(&id)
            .ok_or(Error::NotFound(id))?;
        if !position.is_open() {
            tracing::error!(%id, "Attempted to settle a closed position.");
            return Err(Error::InvariantViolation(format!("position {} is already closed", id)));
        }

        let exit_price = quote.exit_price(position.side);
        let gross = position.pnl_at(exit_price);
        position.commission += commission_rate * exit_price * position.quantity;
        let realized = gross + position.swap - position.commission;

        position.status = PositionStatus::Closed;
        position.close_price = Some(exit_price);
        position.close_time = Some(quote.timestamp);
        position.close_reason = Some(reason);
        position.unrealized_pnl = Decimal::ZERO;
        position.realized_pnl = Some(realized);
        self.balance += realized;

        tracing::info!(
            %id,
            symbol = %position.symbol,
            %reason,
            price = %exit_price,
            pnl = %realized,
            balance = %self.balance,
            "Position closed."
        );
        Ok(position.clone())
    }

    /// Closes a position at the exit side of `quote`.
    ///
    /// Closing an already closed position returns it unchanged; an unknown id
    /// is a no-op.
    pub fn close_position(&mut self, id: PositionId, quote: &Quote) -> Result<Option<Position>> {
        self.close_with_reason(id, quote, CloseReason::Manual)
    }

    pub fn close_with_reason(&mut self, id: PositionId, quote: &Quote, reason: CloseReason) -> Result<Option<Position>> {
        let Some(position) = self.positions.get(&id) else {
            tracing::debug!(%id, "Close requested for unknown position. Ignoring.");
            return Ok(None);
        };
        if !position.is_open() {
            return Ok(Some(position.clone()));
        }
        if position.symbol != quote.symbol {
            return Err(Error::InvariantViolation(format!(
                "position {} on {} closed with a {} quote",
                id, position.symbol, quote.symbol
            )));
        }

        self.mark(id, quote)?;
        self.settle(id, quote, reason).map(Some)
    }

    /// Closes every open position on the quote's instrument.
    pub fn close_all(&mut self, quote: &Quote, reason: CloseReason) -> Result<Vec<Position>> {
        let ids: Vec<PositionId> = self
            .open_positions()
            .filter(|p| p.symbol == quote.symbol)
            .map(|p| p.id)
            .collect();
        let mut closed = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(position) = self.close_with_reason(id, quote, reason)? {
                closed.push(position);
            }
        }
        Ok(closed)
    }

    /// Replaces both protective levels of an open position after validating
    /// them against the current exit-side price.
    pub fn modify_position(&mut self, id: PositionId, levels: ProtectiveLevels, quote: &Quote) -> Result<Position> {
        let position = self.positions.get_mut(&id).ok_or(Error::NotFound(id))?;
        if !position.is_open() {
            return Err(Error::InvariantViolation(format!("position {} is closed and cannot be modified", id)));
        }
        if position.symbol != quote.symbol {
            return Err(Error::InvariantViolation(format!(
                "position {} on {} modified with a {} quote",
                id, position.symbol, quote.symbol
            )));
        }

        check_protective_levels(position.side, quote.exit_price(position.side), &levels)?;
        position.stop_loss = levels.stop_loss;
        position.take_profit = levels.take_profit;
        tracing::info!(%id, stop_loss = ?levels.stop_loss, take_profit = ?levels.take_profit, "Position modified.");
        Ok(position.clone())
    }

    pub fn cancel_order(&mut self, id: PositionId) -> Result<PendingOrder> {
        let pending = self.pending.remove(id).ok_or(Error::NotFound(id))?;
        tracing::info!(%id, symbol = %pending.order.symbol, "Pending order cancelled.");
        Ok(pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::OrderEngine;
    use crate::types::Placement;
    use chrono::{DateTime, Duration, Utc};
    use core_types::{AssetClass, Leverage, RejectReason, Side};
    use rust_decimal_macros::dec;

    struct Fixture {
        engine: OrderEngine,
        instrument: Instrument,
        ledger: PositionLedger,
        now: DateTime<Utc>,
    }

    impl Fixture {
        fn new(settings: SimulationSettings) -> Self {
            let instrument = Instrument::new("EURUSD", "Euro / US Dollar", AssetClass::Forex, dec!(0.0001), dec!(1.0850))
                .with_spread(Decimal::ZERO);
            Self {
                engine: OrderEngine::new(settings.clone()),
                instrument,
                ledger: PositionLedger::new(dec!(10_000), &settings),
                now: Utc::now(),
            }
        }

        fn quote(&mut self, price: Decimal) -> Quote {
            self.now += Duration::seconds(1);
            self.instrument.quote_at(price, self.now)
        }

        fn place(&mut self, order: Order) -> Result<Placement> {
            let quote = self.instrument.quote_at(dec!(1.0850), self.now);
            self.engine.place_order(order.at(self.now), &self.instrument, &quote, &mut self.ledger)
        }

        fn buy(&mut self, order: Order) -> Position {
            match self.place(order) {
                Ok(Placement::Filled(position)) => position,
                other => panic!("expected a fill, got {:?}", other),
            }
        }

        fn tick(&mut self, price: Decimal) -> TickReport {
            let quote = self.quote(price);
            self.ledger.on_tick(&self.instrument, &quote).unwrap()
        }
    }

    fn market(quantity: Decimal) -> Order {
        Order::market("EURUSD", Side::Buy, quantity, Leverage(10))
    }

    #[test]
    fn test_mark_to_market_moves_equity() {
        let mut fx = Fixture::new(SimulationSettings::default());
        fx.buy(market(dec!(1000)));
        fx.tick(dec!(1.0860));

        let snapshot = fx.ledger.snapshot();
        assert_eq!(snapshot.unrealized_pnl, dec!(1.00));
        assert_eq!(snapshot.equity, dec!(10_001.00));
        assert_eq!(snapshot.balance, dec!(10_000));
    }

    #[test]
    fn test_stop_loss_closes_at_crossing_price() {
        let mut fx = Fixture::new(SimulationSettings::default());
        let position = fx.buy(market(dec!(1000)).with_stop_loss(dec!(1.0820)));

        // Touching the level is not a cross.
        assert!(fx.tick(dec!(1.0820)).closed.is_empty());

        let report = fx.tick(dec!(1.0815));
        assert_eq!(report.closed.len(), 1);
        let closed = &report.closed[0];
        assert_eq!(closed.id, position.id);
        assert_eq!(closed.close_price, Some(dec!(1.0815)));
        assert_eq!(closed.close_reason, Some(CloseReason::StopLoss));
        assert_eq!(closed.realized_pnl, Some(dec!(-3.50)));
        assert_eq!(fx.ledger.balance(), dec!(9_996.50));
        assert_eq!(fx.ledger.open_positions().count(), 0);
    }

    #[test]
    fn test_take_profit_on_short() {
        let mut fx = Fixture::new(SimulationSettings::default());
        let order = Order::market("EURUSD", Side::Sell, dec!(1000), Leverage(10)).with_take_profit(dec!(1.0800));
        fx.buy(order);
        let report = fx.tick(dec!(1.0799));
        assert_eq!(report.closed[0].close_reason, Some(CloseReason::TakeProfit));
        assert_eq!(report.closed[0].realized_pnl, Some(dec!(5.10)));
    }

    #[test]
    fn test_close_is_idempotent_and_unknown_is_noop() {
        let mut fx = Fixture::new(SimulationSettings::default());
        let position = fx.buy(market(dec!(1000)));
        let quote = fx.quote(dec!(1.0870));

        let first = fx.ledger.close_position(position.id, &quote).unwrap().unwrap();
        assert_eq!(first.realized_pnl, Some(dec!(2.00)));
        let balance = fx.ledger.balance();

        let later = fx.quote(dec!(1.0900));
        let second = fx.ledger.close_position(position.id, &later).unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(fx.ledger.balance(), balance);

        assert_eq!(fx.ledger.close_position(PositionId(99), &later).unwrap(), None);
    }

    #[test]
    fn test_modify_position_validates_against_exit_price() {
        let mut fx = Fixture::new(SimulationSettings::default());
        let position = fx.buy(market(dec!(1000)));
        let quote = fx.quote(dec!(1.0860));

        let levels = ProtectiveLevels {
            stop_loss: Some(dec!(1.0855)),
            take_profit: Some(dec!(1.0900)),
        };
        let modified = fx.ledger.modify_position(position.id, levels, &quote).unwrap();
        assert_eq!(modified.stop_loss, Some(dec!(1.0855)));

        let bad = ProtectiveLevels {
            stop_loss: Some(dec!(1.0865)),
            take_profit: None,
        };
        let err = fx.ledger.modify_position(position.id, bad, &quote).unwrap_err();
        assert_eq!(err.reason(), Some(RejectReason::InvalidProtectiveLevel));
        assert_eq!(fx.ledger.position(position.id).unwrap().stop_loss, Some(dec!(1.0855)));

        assert_eq!(
            fx.ledger.modify_position(PositionId(42), levels, &quote).unwrap_err(),
            Error::NotFound(PositionId(42))
        );

        fx.ledger.close_position(position.id, &quote).unwrap();
        assert!(matches!(
            fx.ledger.modify_position(position.id, levels, &quote),
            Err(Error::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_pending_limit_fills_on_first_crossing_tick() {
        let mut fx = Fixture::new(SimulationSettings::default());
        let order = Order::limit("EURUSD", Side::Buy, dec!(1000), dec!(1.0840), Leverage(10));
        let Ok(Placement::Pending(pending)) = fx.place(order) else {
            panic!("limit order should rest");
        };
        assert!(fx.ledger.has_exposure(&fx.instrument.symbol));

        assert!(fx.tick(dec!(1.0845)).filled.is_empty());
        let report = fx.tick(dec!(1.0835));
        assert_eq!(report.filled.len(), 1);
        assert_eq!(report.filled[0].id, pending.id);
        assert_eq!(report.filled[0].open_price, dec!(1.0835));
        assert_eq!(fx.ledger.pending_orders().count(), 0);
    }

    #[test]
    fn test_gap_through_stop_loss_drops_limit() {
        let mut fx = Fixture::new(SimulationSettings::default());
        let order =
            Order::limit("EURUSD", Side::Buy, dec!(1000), dec!(1.0840), Leverage(10)).with_stop_loss(dec!(1.0830));
        let Ok(Placement::Pending(pending)) = fx.place(order) else {
            panic!("limit order should rest");
        };

        let report = fx.tick(dec!(1.0820));
        assert!(report.filled.is_empty());
        assert_eq!(report.dropped.len(), 1);
        assert_eq!(report.dropped[0].id, pending.id);
        assert_eq!(fx.ledger.open_positions().count(), 0);
        assert_eq!(fx.ledger.pending_orders().count(), 0);
        assert_eq!(fx.ledger.balance(), dec!(10_000));

        // A fill that stays above the stop-loss keeps it on the loss side.
        let order =
            Order::limit("EURUSD", Side::Buy, dec!(1000), dec!(1.0840), Leverage(10)).with_stop_loss(dec!(1.0830));
        fx.place(order).unwrap();
        let report = fx.tick(dec!(1.0835));
        assert_eq!(report.filled.len(), 1);
        let position = &report.filled[0];
        assert!(position.stop_loss.unwrap() < position.open_price);
        assert!(fx.tick(dec!(1.0836)).closed.is_empty());
    }

    #[test]
    fn test_unaffordable_trigger_is_dropped() {
        let mut fx = Fixture::new(SimulationSettings::default());
        // Two limits, each affordable alone but not together.
        let order = Order::limit("EURUSD", Side::Buy, dec!(500_000), dec!(1.0840), Leverage(100));
        fx.place(order.clone()).unwrap();
        fx.place(order).unwrap();

        let report = fx.tick(dec!(1.0830));
        assert_eq!(report.filled.len(), 1);
        assert_eq!(report.dropped.len(), 1);
        assert_eq!(fx.ledger.pending_orders().count(), 0);
    }

    #[test]
    fn test_cancel_order() {
        let mut fx = Fixture::new(SimulationSettings::default());
        let order = Order::stop("EURUSD", Side::Buy, dec!(1000), dec!(1.0900), Leverage(10));
        let Ok(Placement::Pending(pending)) = fx.place(order) else {
            panic!("stop order should rest");
        };
        assert_eq!(fx.ledger.cancel_order(pending.id).unwrap().id, pending.id);
        assert_eq!(fx.ledger.cancel_order(pending.id).unwrap_err(), Error::NotFound(pending.id));
        assert!(fx.tick(dec!(1.0950)).is_empty());
    }

    #[test]
    fn test_commission_and_swap_reduce_realized_pnl() {
        let settings = SimulationSettings {
            commission_rate: dec!(0.001),
            swap: SwapPolicy::PerTick {
                long: dec!(-0.001),
                short: Decimal::ZERO,
            },
            ..SimulationSettings::default()
        };
        let mut fx = Fixture::new(settings);
        let position = fx.buy(market(dec!(1000)));
        assert_eq!(position.commission, dec!(1.085));

        fx.tick(dec!(1.0850));
        let quote = fx.quote(dec!(1.0850));
        let closed = fx.ledger.close_position(position.id, &quote).unwrap().unwrap();

        // Two marks of -1.00 swap, 1.085 commission each way.
        assert_eq!(closed.swap, dec!(-2));
        assert_eq!(closed.commission, dec!(2.17));
        assert_eq!(closed.realized_pnl, Some(dec!(-4.17)));
        assert_eq!(fx.ledger.balance(), dec!(9_995.83));
    }

    #[test]
    fn test_ids_are_shared_between_positions_and_orders() {
        let mut fx = Fixture::new(SimulationSettings::default());
        let a = fx.buy(market(dec!(1000)));
        let Ok(Placement::Pending(b)) =
            fx.place(Order::limit("EURUSD", Side::Buy, dec!(1000), dec!(1.0800), Leverage(10)))
        else {
            panic!("limit order should rest");
        };
        let c = fx.buy(market(dec!(1000)));
        assert_eq!((a.id, b.id, c.id), (PositionId(1), PositionId(2), PositionId(3)));
    }
}
