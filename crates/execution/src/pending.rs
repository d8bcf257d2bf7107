// In crates/execution/src/pending.rs

use chrono::{DateTime, Utc};
use core_types::{Order, OrderType, PositionId, Quote, Side, Symbol};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// An accepted limit, stop or stop-limit order waiting for its trigger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingOrder {
    /// Drawn from the same sequence as position ids.
    pub id: PositionId,
    pub order: Order,
    /// Stop-limit only: set once the stop has been crossed.
    pub armed: bool,
}

impl PendingOrder {
    pub fn new(id: PositionId, order: Order) -> Self {
        Self { id, order, armed: false }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.order.symbol
    }

    /// Evaluates `quote` against the trigger and returns the fill price if
    /// this tick fills the order. Triggers are inclusive: touching the level
    /// is enough. A stop-limit may arm and fill on the same tick.
    pub fn evaluate(&mut self, quote: &Quote) -> Option<Decimal> {
        let side = self.order.side;
        let entry = quote.entry_price(side);
        let filled = match self.order.order_type {
            OrderType::Market => true,
            OrderType::Limit => self.order.limit_price.is_some_and(|limit| within_limit(side, entry, limit)),
            OrderType::Stop => self.order.stop_price.is_some_and(|stop| stop_crossed(side, entry, stop)),
            OrderType::StopLimit => {
                if !self.armed && self.order.stop_price.is_some_and(|stop| stop_crossed(side, entry, stop)) {
                    tracing::debug!(id = %self.id, %entry, "Stop-limit armed.");
                    self.armed = true;
                }
                self.armed && self.order.limit_price.is_some_and(|limit| within_limit(side, entry, limit))
            }
        };
        filled.then_some(entry)
    }
}

fn within_limit(side: Side, entry: Decimal, limit: Decimal) -> bool {
    match side {
        Side::Buy => entry <= limit,
        Side::Sell => entry >= limit,
    }
}

fn stop_crossed(side: Side, entry: Decimal, stop: Decimal) -> bool {
    match side {
        Side::Buy => entry >= stop,
        Side::Sell => entry <= stop,
    }
}

/// Pending orders keyed by `(created_at, id)` so triggers are evaluated in
/// placement order.
#[derive(Debug, Clone, Default)]
pub struct PendingBook {
    orders: BTreeMap<(DateTime<Utc>, PositionId), PendingOrder>,
}

impl PendingBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, pending: PendingOrder) {
        self.orders.insert((pending.order.created_at, pending.id), pending);
    }

    pub fn remove(&mut self, id: PositionId) -> Option<PendingOrder> {
        let key = self.orders.keys().find(|(_, order_id)| *order_id == id).copied()?;
        self.orders.remove(&key)
    }

    pub fn get(&self, id: PositionId) -> Option<&PendingOrder> {
        self.orders.values().find(|p| p.id == id)
    }

    pub fn get_mut(&mut self, id: PositionId) -> Option<&mut PendingOrder> {
        self.orders.values_mut().find(|p| p.id == id)
    }

    /// Ids of the orders on `symbol`, in trigger-evaluation order.
    pub fn ids_for(&self, symbol: &Symbol) -> Vec<PositionId> {
        self.orders
            .values()
            .filter(|p| p.symbol() == symbol)
            .map(|p| p.id)
            .collect()
    }

    pub fn has_symbol(&self, symbol: &Symbol) -> bool {
        self.orders.values().any(|p| p.symbol() == symbol)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingOrder> {
        self.orders.values()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use core_types::Leverage;
    use rust_decimal_macros::dec;

    fn quote(price: Decimal) -> Quote {
        Quote::new(Symbol::from("EURUSD"), price, Decimal::ZERO, Utc::now())
    }

    #[test]
    fn test_limit_and_stop_triggers_are_inclusive() {
        let buy_limit = Order::limit("EURUSD", Side::Buy, dec!(1000), dec!(1.0800), Leverage(10));
        let mut pending = PendingOrder::new(PositionId(1), buy_limit);
        assert_eq!(pending.evaluate(&quote(dec!(1.0801))), None);
        assert_eq!(pending.evaluate(&quote(dec!(1.0800))), Some(dec!(1.0800)));
        assert_eq!(pending.evaluate(&quote(dec!(1.0790))), Some(dec!(1.0790)));

        let sell_stop = Order::stop("EURUSD", Side::Sell, dec!(1000), dec!(1.0800), Leverage(10));
        let mut pending = PendingOrder::new(PositionId(2), sell_stop);
        assert_eq!(pending.evaluate(&quote(dec!(1.0810))), None);
        assert_eq!(pending.evaluate(&quote(dec!(1.0795))), Some(dec!(1.0795)));
    }

    #[test]
    fn test_stop_limit_arms_then_fills_within_limit() {
        let order = Order::stop_limit("EURUSD", Side::Buy, dec!(1000), dec!(1.0900), dec!(1.0910), Leverage(10));
        let mut pending = PendingOrder::new(PositionId(1), order);

        assert_eq!(pending.evaluate(&quote(dec!(1.0890))), None);
        assert!(!pending.armed);

        // Gaps through the limit: armed, but too expensive to fill.
        assert_eq!(pending.evaluate(&quote(dec!(1.0920))), None);
        assert!(pending.armed);

        // Back below the stop but within the limit: fills because it is armed.
        assert_eq!(pending.evaluate(&quote(dec!(1.0895))), Some(dec!(1.0895)));
    }

    #[test]
    fn test_stop_limit_can_fill_on_arming_tick() {
        let order = Order::stop_limit("EURUSD", Side::Sell, dec!(1000), dec!(1.0800), dec!(1.0790), Leverage(10));
        let mut pending = PendingOrder::new(PositionId(1), order);
        assert_eq!(pending.evaluate(&quote(dec!(1.0795))), Some(dec!(1.0795)));
    }

    #[test]
    fn test_book_orders_by_creation_time() {
        let now = Utc::now();
        let mut book = PendingBook::new();
        let late = Order::limit("EURUSD", Side::Buy, dec!(1), dec!(1.07), Leverage(10)).at(now);
        let early =
            Order::limit("EURUSD", Side::Buy, dec!(1), dec!(1.07), Leverage(10)).at(now - Duration::seconds(5));
        let other = Order::limit("GBPUSD", Side::Buy, dec!(1), dec!(1.20), Leverage(10)).at(now);
        book.insert(PendingOrder::new(PositionId(1), late));
        book.insert(PendingOrder::new(PositionId(2), early));
        book.insert(PendingOrder::new(PositionId(3), other));

        assert_eq!(book.ids_for(&Symbol::from("EURUSD")), vec![PositionId(2), PositionId(1)]);
        assert!(book.has_symbol(&Symbol::from("GBPUSD")));

        assert!(book.remove(PositionId(3)).is_some());
        assert!(book.remove(PositionId(3)).is_none());
        assert!(!book.has_symbol(&Symbol::from("GBPUSD")));
        assert_eq!(book.len(), 2);
    }
}
