// In crates/engine/src/session.rs

use analytics::{
    AnalyticsEngine, Leaderboard, LeaderboardEntry, LeaderboardPeriod, Participant, PerformanceReport, PeriodStanding,
    TradeFilter, TradeRecord,
};
use app_config::Settings;
use backtester::{BacktestJob, BacktestRequest};
use chrono::{DateTime, Duration, Utc};
use core_types::{Error, Instrument, Order, Position, PositionId, ProtectiveLevels, Quote, Result, StrategyConfig, Symbol};
use events::SessionEvent;
use execution::{OrderEngine, PendingOrder, Placement, PositionLedger, SimulationSettings, TickReport};
use quotes::{QuoteGenerator, QuoteHistory, DEFAULT_HISTORY_LEN};
use risk::PortfolioSnapshot;
use rust_decimal::Decimal;
use rust_decimal::prelude::*;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Invoked with every new quote of the subscribed instrument.
pub type QuoteCallback = Box<dyn FnMut(&Quote) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

struct Subscription {
    symbol: Symbol,
    callback: QuoteCallback,
}

/// Everything a session needs besides its instrument catalog.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub initial_balance: Decimal,
    pub simulation: SimulationSettings,
    pub history_len: usize,
    /// Spacing of the look-back quotes generated on selection.
    pub history_interval: Duration,
    /// `None` draws the live feed from entropy.
    pub seed: Option<u64>,
    /// Name of the session's own row on the leaderboard.
    pub display_name: String,
    pub participants: Vec<Participant>,
    /// Session clock before the first tick.
    pub start: DateTime<Utc>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            initial_balance: Decimal::from(10_000),
            simulation: SimulationSettings::default(),
            history_len: DEFAULT_HISTORY_LEN,
            history_interval: Duration::seconds(1),
            seed: None,
            display_name: "You".to_string(),
            participants: Vec::new(),
            start: Utc::now(),
        }
    }
}

impl SessionConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        let interval_ms = settings.simulation.tick_interval_ms.max(1);
        Self {
            initial_balance: settings.account.initial_balance,
            simulation: settings.simulation.engine_settings(),
            history_len: settings.simulation.history_len,
            history_interval: Duration::milliseconds(interval_ms as i64),
            seed: settings.simulation.seed,
            display_name: settings.account.display_name.clone(),
            participants: settings.leaderboard.participants.clone(),
            start: Utc::now(),
        }
    }
}

/// What one call to [`Session::tick`] produced, across all instruments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickSummary {
    pub quotes: Vec<Quote>,
    pub closed: Vec<Position>,
    pub filled: Vec<Position>,
    pub dropped: Vec<PendingOrder>,
}

impl TickSummary {
    fn absorb(&mut self, report: TickReport) {
        self.closed.extend(report.closed);
        self.filled.extend(report.filled);
        self.dropped.extend(report.dropped);
    }
}

/// One user's simulated trading context.
///
/// Owns the instrument registry, the price feed, the ledger and the order
/// engine. Every operation is synchronous; [`crate::task::SessionTask`]
/// serializes commands and ticks when a session is driven asynchronously.
pub struct Session {
    instruments: BTreeMap<Symbol, Instrument>,
    generator: QuoteGenerator,
    histories: HashMap<Symbol, QuoteHistory>,
    history_len: usize,
    history_interval: Duration,
    selected: Option<Symbol>,
    engine: OrderEngine,
    ledger: PositionLedger,
    subscriptions: BTreeMap<SubscriptionId, Subscription>,
    next_subscription: u64,
    leaderboard: Leaderboard,
    display_name: String,
    analytics: AnalyticsEngine,
    events: broadcast::Sender<SessionEvent>,
    now: DateTime<Utc>,
}

impl Session {
    pub fn new(instruments: Vec<Instrument>, config: SessionConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self::with_event_sender(instruments, config, events)
    }

    /// Builds a session that broadcasts on an existing channel, so a log
    /// forwarder can be installed before the session exists.
    pub fn with_event_sender(
        instruments: Vec<Instrument>,
        config: SessionConfig,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        let generator = match config.seed {
            Some(seed) => QuoteGenerator::seeded(seed),
            None => QuoteGenerator::from_entropy(),
        };
        let instruments = instruments.into_iter().map(|i| (i.symbol.clone(), i)).collect();

        Self {
            instruments,
            generator,
            histories: HashMap::new(),
            history_len: config.history_len.max(1),
            history_interval: config.history_interval,
            selected: None,
            engine: OrderEngine::new(config.simulation.clone()),
            ledger: PositionLedger::new(config.initial_balance, &config.simulation),
            subscriptions: BTreeMap::new(),
            next_subscription: 1,
            leaderboard: Leaderboard::new(config.participants),
            display_name: config.display_name,
            analytics: AnalyticsEngine::new(),
            events,
            now: config.start,
        }
    }

    // --- Read model ---

    pub fn instruments(&self) -> impl Iterator<Item = &Instrument> {
        self.instruments.values()
    }

    pub fn instrument(&self, symbol: &Symbol) -> Result<&Instrument> {
        self.instruments
            .get(symbol)
            .ok_or_else(|| Error::UnknownInstrument(symbol.clone()))
    }

    pub fn selected(&self) -> Option<&Symbol> {
        self.selected.as_ref()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn current_quote(&self, symbol: &Symbol) -> Result<Quote> {
        self.instrument(symbol)?
            .last_quote
            .clone()
            .ok_or_else(|| Error::QuoteUnavailable(symbol.clone()))
    }

    pub fn history(&self, symbol: &Symbol) -> Vec<Quote> {
        self.histories.get(symbol).map(QuoteHistory::to_vec).unwrap_or_default()
    }

    pub fn portfolio_snapshot(&self) -> PortfolioSnapshot {
        self.ledger.snapshot()
    }

    pub fn position(&self, id: PositionId) -> Option<Position> {
        self.ledger.position(id).cloned()
    }

    pub fn open_positions(&self) -> Vec<Position> {
        self.ledger.open_positions().cloned().collect()
    }

    pub fn pending_orders(&self) -> Vec<PendingOrder> {
        self.ledger.pending_orders().cloned().collect()
    }

    /// Closed trades matching `filter`, ordered by close time.
    pub fn trade_history(&self, filter: &TradeFilter) -> Vec<TradeRecord> {
        let records: Vec<TradeRecord> = self
            .ledger
            .closed_positions()
            .into_iter()
            .filter_map(|p| {
                let instrument = self.instruments.get(&p.symbol)?;
                TradeRecord::from_position(p, instrument)
            })
            .collect();
        filter.apply(&records)
    }

    pub fn performance(&self, filter: &TradeFilter) -> PerformanceReport {
        let trades = self.trade_history(filter);
        self.analytics.calculate(self.ledger.initial_balance(), &trades)
    }

    /// Ranks the configured roster together with this session's own results
    /// over `period`.
    pub fn leaderboard(&self, period: LeaderboardPeriod) -> Vec<LeaderboardEntry> {
        let filter = match period.window_start(self.now) {
            Some(from) => TradeFilter::since(from),
            None => TradeFilter::all(),
        };
        let trades = self.trade_history(&filter);
        let standing = PeriodStanding::from_trades(&trades, self.ledger.initial_balance());
        self.leaderboard
            .rank(period, Some((self.display_name.as_str(), standing)))
    }

    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn event_sender(&self) -> broadcast::Sender<SessionEvent> {
        self.events.clone()
    }

    // --- Instrument selection and subscriptions ---

    /// Makes `symbol` the active instrument and returns its current quote with
    /// the look-back history. The first selection seeds a history that ends
    /// at the instrument's current price.
    pub fn select_instrument(&mut self, symbol: &Symbol) -> Result<(Quote, Vec<Quote>)> {
        let instrument = self
            .instruments
            .get_mut(symbol)
            .ok_or_else(|| Error::UnknownInstrument(symbol.clone()))?;
        let history = self
            .histories
            .entry(symbol.clone())
            .or_insert_with(|| QuoteHistory::new(self.history_len));

        if history.is_empty() {
            let seeded = self
                .generator
                .reseed_history(instrument, self.history_len, self.now, self.history_interval)?;
            history.reset(seeded);
            instrument.last_quote = history.latest().cloned();
        }

        let quote = instrument
            .last_quote
            .clone()
            .ok_or_else(|| Error::QuoteUnavailable(symbol.clone()))?;
        let lookback = history.to_vec();
        self.selected = Some(symbol.clone());
        info!(%symbol, price = %quote.price, history = lookback.len(), "Instrument selected.");
        Ok((quote, lookback))
    }

    pub fn subscribe_quotes(&mut self, symbol: &Symbol, callback: QuoteCallback) -> Result<SubscriptionId> {
        self.instrument(symbol)?;
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscriptions.insert(
            id,
            Subscription {
                symbol: symbol.clone(),
                callback,
            },
        );
        debug!(subscription = id.0, %symbol, "Quote subscription added.");
        Ok(id)
    }

    /// Returns whether the subscription existed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let removed = self.subscriptions.remove(&id).is_some();
        if removed {
            debug!(subscription = id.0, "Quote subscription removed.");
        }
        removed
    }

    // --- Commands ---

    /// Validates and places `order` against the instrument's current quote.
    pub fn place_order(&mut self, order: Order) -> Result<Placement> {
        let instrument = self
            .instruments
            .get(&order.symbol)
            .ok_or_else(|| Error::UnknownInstrument(order.symbol.clone()))?;
        let quote = instrument
            .last_quote
            .clone()
            .ok_or_else(|| Error::QuoteUnavailable(order.symbol.clone()))?;

        let placement = self.engine.place_order(order, instrument, &quote, &mut self.ledger)?;
        match &placement {
            Placement::Filled(position) => self.publish(SessionEvent::PositionOpened(position.clone())),
            Placement::Pending(pending) => self.publish(SessionEvent::OrderPending(pending.clone())),
        }
        self.publish_portfolio();
        Ok(placement)
    }

    /// Closes a position at the current exit-side quote.
    ///
    /// Closing an already closed position returns it unchanged; an unknown id
    /// returns `Ok(None)`.
    pub fn close_position(&mut self, id: PositionId) -> Result<Option<Position>> {
        let symbol = match self.ledger.position(id) {
            None => return Ok(None),
            Some(position) if !position.is_open() => return Ok(Some(position.clone())),
            Some(position) => position.symbol.clone(),
        };
        let quote = self.current_quote(&symbol)?;
        let closed = self.ledger.close_position(id, &quote)?;
        if let Some(position) = &closed {
            self.publish(SessionEvent::PositionClosed(position.clone()));
            self.publish_portfolio();
        }
        Ok(closed)
    }

    pub fn modify_position(&mut self, id: PositionId, levels: ProtectiveLevels) -> Result<Position> {
        let symbol = self
            .ledger
            .position(id)
            .map(|p| p.symbol.clone())
            .ok_or(Error::NotFound(id))?;
        let quote = self.current_quote(&symbol)?;
        let position = self.ledger.modify_position(id, levels, &quote)?;
        self.publish(SessionEvent::PositionModified(position.clone()));
        Ok(position)
    }

    pub fn cancel_order(&mut self, id: PositionId) -> Result<PendingOrder> {
        let cancelled = self.ledger.cancel_order(id)?;
        self.publish(SessionEvent::OrderCancelled(cancelled.clone()));
        Ok(cancelled)
    }

    /// A backtest request for `strategy` on a catalog instrument, using this
    /// session's order engine settings. The live ledger is not involved.
    pub fn backtest_request(&self, strategy: StrategyConfig, symbol: &Symbol) -> Result<BacktestRequest> {
        let mut instrument = self.instrument(symbol)?.clone();
        if let Some(quote) = instrument.last_quote.take() {
            instrument.reference_price = quote.price;
        }
        Ok(BacktestRequest::new(strategy, instrument)
            .with_initial_balance(self.ledger.initial_balance())
            .with_simulation(self.engine.settings().clone()))
    }

    /// Starts `request` on its own task. Must be called within a tokio runtime.
    pub fn run_backtest(&self, request: BacktestRequest) -> backtester::Result<BacktestJob> {
        info!(strategy = %request.strategy.id, symbol = %request.instrument.symbol, "Scheduling backtest.");
        backtester::spawn(request)
    }

    // --- Ticks ---

    /// Advances every active instrument by one generated quote.
    ///
    /// An instrument is active while it is selected, subscribed, or carries
    /// open positions or pending orders. A failing sweep is logged and the
    /// remaining instruments still tick.
    pub fn tick(&mut self, now: DateTime<Utc>) -> TickSummary {
        self.now = now;
        let active: Vec<Symbol> = self
            .instruments
            .keys()
            .filter(|symbol| self.is_active(symbol))
            .cloned()
            .collect();

        let mut summary = TickSummary::default();
        for symbol in active {
            let Some(instrument) = self.instruments.get(&symbol) else {
                continue;
            };
            let quote = self.generator.next_quote(instrument, now);
            summary.quotes.push(quote.clone());
            match self.apply_quote(quote) {
                Ok(report) => summary.absorb(report),
                Err(e) => warn!(%symbol, error = %e, "Tick sweep failed. Skipping instrument."),
            }
        }

        if !summary.quotes.is_empty() {
            debug!(quotes = summary.quotes.len(), closed = summary.closed.len(), "Tick processed.");
            self.publish_portfolio();
        }
        summary
    }

    /// Applies an externally supplied quote as the instrument's next tick.
    pub fn ingest_quote(&mut self, quote: Quote) -> Result<TickReport> {
        if quote.timestamp > self.now {
            self.now = quote.timestamp;
        }
        let report = self.apply_quote(quote)?;
        self.publish_portfolio();
        Ok(report)
    }

    fn is_active(&self, symbol: &Symbol) -> bool {
        self.selected.as_ref() == Some(symbol)
            || self.subscriptions.values().any(|s| &s.symbol == symbol)
            || self.ledger.has_exposure(symbol)
    }

    fn apply_quote(&mut self, quote: Quote) -> Result<TickReport> {
        let instrument = self
            .instruments
            .get_mut(&quote.symbol)
            .ok_or_else(|| Error::UnknownInstrument(quote.symbol.clone()))?;
        instrument.last_quote = Some(quote.clone());
        self.histories
            .entry(quote.symbol.clone())
            .or_insert_with(|| QuoteHistory::new(self.history_len))
            .push(quote.clone());

        let sweep = self.ledger.on_tick(instrument, &quote);

        for subscription in self.subscriptions.values_mut().filter(|s| s.symbol == quote.symbol) {
            (subscription.callback)(&quote);
        }
        self.publish(SessionEvent::Quote(quote));

        let report = sweep?;
        for position in &report.closed {
            self.publish(SessionEvent::PositionClosed(position.clone()));
        }
        for position in &report.filled {
            self.publish(SessionEvent::PositionOpened(position.clone()));
        }
        for pending in &report.dropped {
            self.publish(SessionEvent::OrderDropped(pending.clone()));
        }
        Ok(report)
    }

    fn publish(&self, event: SessionEvent) {
        let kind = event.kind();
        // No receivers is fine; events are advisory.
        if self.events.send(event).is_err() {
            tracing::trace!(kind, "No event listeners.");
        } else {
            tracing::trace!(kind, "Event published.");
        }
    }

    fn publish_portfolio(&self) {
        let snapshot = self.ledger.snapshot();
        if snapshot.is_margin_call() {
            warn!(
                equity = %snapshot.equity,
                used_margin = %snapshot.used_margin,
                margin_level = ?snapshot.margin_level.as_percent().and_then(|p| p.to_f64()),
                "Margin level below the margin-call threshold."
            );
        }
        self.publish(SessionEvent::PortfolioUpdate(snapshot));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{AssetClass, Leverage, Side};
    use rust_decimal_macros::dec;
    use std::sync::{Arc, Mutex};

    fn catalog() -> Vec<Instrument> {
        vec![
            Instrument::new("EURUSD", "Euro / US Dollar", AssetClass::Forex, dec!(0.0001), dec!(1.0850)),
            Instrument::new("BTCUSD", "Bitcoin / US Dollar", AssetClass::Crypto, dec!(0.01), dec!(64_000)),
        ]
    }

    fn session() -> Session {
        Session::new(
            catalog(),
            SessionConfig {
                seed: Some(11),
                start: DateTime::UNIX_EPOCH,
                ..SessionConfig::default()
            },
        )
    }

    fn eurusd() -> Symbol {
        Symbol::from("EURUSD")
    }

    #[test]
    fn test_selection_seeds_history_ending_at_current_price() {
        let mut session = session();
        let (quote, history) = session.select_instrument(&eurusd()).unwrap();

        assert_eq!(history.len(), DEFAULT_HISTORY_LEN);
        assert_eq!(quote.price, dec!(1.0850));
        assert_eq!(history.last(), Some(&quote));
        assert!(history.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert_eq!(session.selected(), Some(&eurusd()));

        // Reselecting keeps the existing history.
        let (again, history_again) = session.select_instrument(&eurusd()).unwrap();
        assert_eq!(again, quote);
        assert_eq!(history_again, history);
    }

    #[test]
    fn test_unknown_instrument() {
        let mut session = session();
        let missing = Symbol::from("DOGEUSD");
        assert_eq!(
            session.select_instrument(&missing).err(),
            Some(Error::UnknownInstrument(missing.clone()))
        );
        let order = Order::market("DOGEUSD", Side::Buy, dec!(1), Leverage(1));
        assert_eq!(session.place_order(order).err(), Some(Error::UnknownInstrument(missing)));
    }

    #[test]
    fn test_order_needs_a_quote() {
        let mut session = session();
        let order = Order::market("EURUSD", Side::Buy, dec!(1000), Leverage(10));
        assert_eq!(session.place_order(order).err(), Some(Error::QuoteUnavailable(eurusd())));
    }

    #[test]
    fn test_tick_only_advances_active_instruments() {
        let mut session = session();
        assert!(session.tick(DateTime::UNIX_EPOCH + Duration::seconds(1)).quotes.is_empty());

        session.select_instrument(&eurusd()).unwrap();
        let summary = session.tick(DateTime::UNIX_EPOCH + Duration::seconds(2));
        assert_eq!(summary.quotes.len(), 1);
        assert_eq!(summary.quotes[0].symbol, eurusd());
        assert_eq!(session.current_quote(&eurusd()).unwrap(), summary.quotes[0]);
        assert!(session.current_quote(&Symbol::from("BTCUSD")).is_err());
    }

    #[test]
    fn test_subscribers_receive_quotes_until_unsubscribed() {
        let mut session = session();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let btc = Symbol::from("BTCUSD");
        let id = session
            .subscribe_quotes(&btc, Box::new(move |q: &Quote| sink.lock().unwrap().push(q.price)))
            .unwrap();

        session.tick(DateTime::UNIX_EPOCH + Duration::seconds(1));
        session.tick(DateTime::UNIX_EPOCH + Duration::seconds(2));
        assert_eq!(seen.lock().unwrap().len(), 2);

        assert!(session.unsubscribe(id));
        assert!(!session.unsubscribe(id));
        session.tick(DateTime::UNIX_EPOCH + Duration::seconds(3));
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_events_are_broadcast() {
        let mut session = session();
        let mut events = session.events();
        session.select_instrument(&eurusd()).unwrap();
        let order = Order::market("EURUSD", Side::Buy, dec!(1000), Leverage(10));
        session.place_order(order).unwrap();

        assert!(matches!(events.try_recv(), Ok(SessionEvent::PositionOpened(_))));
        assert!(matches!(events.try_recv(), Ok(SessionEvent::PortfolioUpdate(_))));
    }

    #[test]
    fn test_leaderboard_includes_own_row() {
        let participants = vec![Participant {
            name: "Rival".to_string(),
            day: PeriodStanding::default(),
            week: PeriodStanding::default(),
            month: PeriodStanding::default(),
            all_time: PeriodStanding {
                profit_pct: 5.0,
                win_rate: 60.0,
                trades: 10,
            },
        }];
        let session = Session::new(
            catalog(),
            SessionConfig {
                participants,
                ..SessionConfig::default()
            },
        );

        let board = session.leaderboard(LeaderboardPeriod::AllTime);
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].name, "Rival");
        assert!(board[1].is_self);
        assert_eq!(board[1].trades, 0);
    }
}
