// In crates/core-types/src/types.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A unique instrument key such as `EURUSD` or `BTCUSD`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol(pub String);

impl Symbol {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    Forex,
    Equity,
    Crypto,
    Commodity,
}

impl AssetClass {
    /// Per-tick volatility as a fraction of price.
    pub fn default_volatility(&self) -> Decimal {
        match self {
            AssetClass::Forex => dec!(0.0002),
            AssetClass::Equity => dec!(0.0015),
            AssetClass::Crypto => dec!(0.004),
            AssetClass::Commodity => dec!(0.001),
        }
    }

    /// The quoted spread, expressed in ticks.
    pub fn default_spread_ticks(&self) -> Decimal {
        match self {
            AssetClass::Forex => dec!(1),
            AssetClass::Equity => dec!(2),
            AssetClass::Crypto => dec!(10),
            AssetClass::Commodity => dec!(3),
        }
    }

    pub fn max_leverage(&self) -> Leverage {
        match self {
            AssetClass::Forex => Leverage(100),
            AssetClass::Equity => Leverage(5),
            AssetClass::Crypto => Leverage(20),
            AssetClass::Commodity => Leverage(50),
        }
    }

    /// The `(min, max)` quantity band an order must fall within.
    pub fn default_quantity_band(&self) -> (Decimal, Decimal) {
        match self {
            AssetClass::Forex => (dec!(1), dec!(10_000_000)),
            AssetClass::Equity => (dec!(1), dec!(100_000)),
            AssetClass::Crypto => (dec!(0.0001), dec!(1_000)),
            AssetClass::Commodity => (dec!(0.01), dec!(100_000)),
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetClass::Forex => write!(f, "forex"),
            AssetClass::Equity => write!(f, "equity"),
            AssetClass::Crypto => write!(f, "crypto"),
            AssetClass::Commodity => write!(f, "commodity"),
        }
    }
}

/// Direction of an order or position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// +1 for buy, -1 for sell.
    pub fn sign(&self) -> Decimal {
        match self {
            Side::Buy => Decimal::ONE,
            Side::Sell => Decimal::NEGATIVE_ONE,
        }
    }

    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// Leverage expressed as `1:N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Leverage(pub u32);

impl Leverage {
    pub fn ratio(&self) -> Decimal {
        Decimal::from(self.0)
    }
}

impl fmt::Display for Leverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "1:{}", self.0)
    }
}

/// A tradable instrument and its simulation constants.
///
/// Everything but `last_quote` is fixed for the life of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: Symbol,
    pub name: String,
    pub asset_class: AssetClass,
    /// The pip/point size; price deltas are divided by it for display.
    pub tick_size: Decimal,
    /// Absolute bid/ask spread.
    pub spread: Decimal,
    /// Per-tick volatility as a fraction of price.
    pub volatility: Decimal,
    pub min_quantity: Decimal,
    pub max_quantity: Decimal,
    pub max_leverage: Leverage,
    /// Price the random walk restarts from when no quote has been seen.
    pub reference_price: Decimal,
    pub last_quote: Option<Quote>,
}

impl Instrument {
    pub fn new(
        symbol: impl Into<Symbol>,
        name: impl Into<String>,
        asset_class: AssetClass,
        tick_size: Decimal,
        reference_price: Decimal,
    ) -> Self {
        let (min_quantity, max_quantity) = asset_class.default_quantity_band();
        Self {
            symbol: symbol.into(),
            name: name.into(),
            asset_class,
            tick_size,
            spread: tick_size * asset_class.default_spread_ticks(),
            volatility: asset_class.default_volatility(),
            min_quantity,
            max_quantity,
            max_leverage: asset_class.max_leverage(),
            reference_price,
            last_quote: None,
        }
    }

    pub fn with_spread(mut self, spread: Decimal) -> Self {
        self.spread = spread;
        self
    }

    pub fn with_volatility(mut self, volatility: Decimal) -> Self {
        self.volatility = volatility;
        self
    }

    pub fn with_quantity_band(mut self, min: Decimal, max: Decimal) -> Self {
        self.min_quantity = min;
        self.max_quantity = max;
        self
    }

    pub fn with_max_leverage(mut self, leverage: Leverage) -> Self {
        self.max_leverage = leverage;
        self
    }

    /// Number of decimal places a price carries for this instrument.
    pub fn price_precision(&self) -> u32 {
        self.tick_size.normalize().scale()
    }

    pub fn round_price(&self, price: Decimal) -> Decimal {
        price.round_dp(self.price_precision())
    }

    /// Converts a price delta into pips/points.
    pub fn pips(&self, delta: Decimal) -> Decimal {
        if self.tick_size.is_zero() {
            return Decimal::ZERO;
        }
        delta / self.tick_size
    }

    /// Last quoted price, or the reference price before the first tick.
    pub fn current_price(&self) -> Decimal {
        self.last_quote
            .as_ref()
            .map(|q| q.price)
            .unwrap_or(self.reference_price)
    }

    pub fn quote_at(&self, price: Decimal, timestamp: DateTime<Utc>) -> Quote {
        Quote::new(self.symbol.clone(), price, self.spread, timestamp)
    }
}

/// A point-in-time price. Superseded, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: Symbol,
    /// Mid price.
    pub price: Decimal,
    pub bid: Decimal,
    pub ask: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl Quote {
    pub fn new(symbol: Symbol, price: Decimal, spread: Decimal, timestamp: DateTime<Utc>) -> Self {
        let half = spread / dec!(2);
        Self {
            symbol,
            price,
            bid: price - half,
            ask: price + half,
            timestamp,
        }
    }

    /// The price an order on `side` opens at: ask for buys, bid for sells.
    pub fn entry_price(&self, side: Side) -> Decimal {
        match side {
            Side::Buy => self.ask,
            Side::Sell => self.bid,
        }
    }

    /// The price a position on `side` is marked and closed at.
    pub fn exit_price(&self, side: Side) -> Decimal {
        match side {
            Side::Buy => self.bid,
            Side::Sell => self.ask,
        }
    }

    pub fn spread(&self) -> Decimal {
        self.ask - self.bid
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Market,
    Limit,
    Stop,
    StopLimit,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Market => write!(f, "market"),
            OrderType::Limit => write!(f, "limit"),
            OrderType::Stop => write!(f, "stop"),
            OrderType::StopLimit => write!(f, "stop_limit"),
        }
    }
}

/// A transient request to open a position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub limit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub leverage: Leverage,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn market(symbol: impl Into<Symbol>, side: Side, quantity: Decimal, leverage: Leverage) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            order_type: OrderType::Market,
            quantity,
            limit_price: None,
            stop_price: None,
            stop_loss: None,
            take_profit: None,
            leverage,
            created_at: Utc::now(),
        }
    }

    pub fn limit(
        symbol: impl Into<Symbol>,
        side: Side,
        quantity: Decimal,
        limit_price: Decimal,
        leverage: Leverage,
    ) -> Self {
        Self {
            order_type: OrderType::Limit,
            limit_price: Some(limit_price),
            ..Self::market(symbol, side, quantity, leverage)
        }
    }

    pub fn stop(
        symbol: impl Into<Symbol>,
        side: Side,
        quantity: Decimal,
        stop_price: Decimal,
        leverage: Leverage,
    ) -> Self {
        Self {
            order_type: OrderType::Stop,
            stop_price: Some(stop_price),
            ..Self::market(symbol, side, quantity, leverage)
        }
    }

    pub fn stop_limit(
        symbol: impl Into<Symbol>,
        side: Side,
        quantity: Decimal,
        stop_price: Decimal,
        limit_price: Decimal,
        leverage: Leverage,
    ) -> Self {
        Self {
            order_type: OrderType::StopLimit,
            stop_price: Some(stop_price),
            limit_price: Some(limit_price),
            ..Self::market(symbol, side, quantity, leverage)
        }
    }

    pub fn with_stop_loss(mut self, price: Decimal) -> Self {
        self.stop_loss = Some(price);
        self
    }

    pub fn with_take_profit(mut self, price: Decimal) -> Self {
        self.take_profit = Some(price);
        self
    }

    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// The price at which this order is expected to open.
    ///
    /// Market orders open at the entry side of `quote`; limit and stop-limit
    /// at their limit; stop orders at their stop.
    pub fn intended_entry(&self, quote: &Quote) -> Option<Decimal> {
        match self.order_type {
            OrderType::Market => Some(quote.entry_price(self.side)),
            OrderType::Limit | OrderType::StopLimit => self.limit_price,
            OrderType::Stop => self.stop_price,
        }
    }

    pub fn protective_levels(&self) -> ProtectiveLevels {
        ProtectiveLevels {
            stop_loss: self.stop_loss,
            take_profit: self.take_profit,
        }
    }
}

/// Stop-loss and take-profit levels of a position. `None` means no level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProtectiveLevels {
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
}

/// Identifies both positions and pending orders; they share one sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PositionId(pub u64);

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    Manual,
    StopLoss,
    TakeProfit,
    EndOfBacktest,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Manual => write!(f, "manual"),
            CloseReason::StopLoss => write!(f, "stop_loss"),
            CloseReason::TakeProfit => write!(f, "take_profit"),
            CloseReason::EndOfBacktest => write!(f, "end_of_backtest"),
        }
    }
}

/// An open or closed simulated trade, owned by the position ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub symbol: Symbol,
    pub side: Side,
    pub quantity: Decimal,
    /// Fixed at open; margin is never revalued.
    pub leverage: Leverage,
    pub open_price: Decimal,
    pub open_time: DateTime<Utc>,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub status: PositionStatus,
    pub close_price: Option<Decimal>,
    pub close_time: Option<DateTime<Utc>>,
    pub close_reason: Option<CloseReason>,
    /// Accrued swap/carry; negative is a cost.
    pub swap: Decimal,
    pub commission: Decimal,
    pub unrealized_pnl: Decimal,
    pub realized_pnl: Option<Decimal>,
    /// Time of the last mark, used to prorate swap.
    pub marked_at: DateTime<Utc>,
}

impl Position {
    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    /// Price P&L if the position were closed at `exit_price`.
    pub fn pnl_at(&self, exit_price: Decimal) -> Decimal {
        (exit_price - self.open_price) * self.quantity * self.side.sign()
    }

    /// Margin reserved at the leverage the position was opened with.
    pub fn required_margin(&self) -> Decimal {
        self.open_price * self.quantity / self.leverage.ratio()
    }

    pub fn levels(&self) -> ProtectiveLevels {
        ProtectiveLevels {
            stop_loss: self.stop_loss,
            take_profit: self.take_profit,
        }
    }

    /// Returns the protective level `exit_price` has strictly crossed, if any.
    /// The stop-loss wins when a gap crosses both.
    pub fn triggered_level(&self, exit_price: Decimal) -> Option<CloseReason> {
        let (sl_hit, tp_hit) = match self.side {
            Side::Buy => (
                self.stop_loss.is_some_and(|sl| exit_price < sl),
                self.take_profit.is_some_and(|tp| exit_price > tp),
            ),
            Side::Sell => (
                self.stop_loss.is_some_and(|sl| exit_price > sl),
                self.take_profit.is_some_and(|tp| exit_price < tp),
            ),
        };
        if sl_hit {
            Some(CloseReason::StopLoss)
        } else if tp_hit {
            Some(CloseReason::TakeProfit)
        } else {
            None
        }
    }
}

/// The output of a strategy's assessment of recent quotes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Signal {
    Hold,
    GoLong { confidence: f64 },
    GoShort { confidence: f64 },
    Close,
}
