use crate::error::{Error, Result};
use crate::session::{Session, SubscriptionId, TickSummary};
use analytics::{LeaderboardEntry, LeaderboardPeriod, PerformanceReport, TradeFilter, TradeRecord};
use backtester::{BacktestJob, BacktestRequest};
use chrono::{DateTime, Utc};
use core_types::{Order, Position, PositionId, ProtectiveLevels, Quote, Symbol};
use events::SessionEvent;
use execution::{PendingOrder, Placement};
use risk::PortfolioSnapshot;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{Interval, MissedTickBehavior};

/// A unit of work run against the session between ticks.
type Command = Box<dyn FnOnce(&mut Session) + Send>;

/// Owns a [`Session`] and serializes every command and tick through one loop.
pub struct SessionTask {
    session: Session,
    commands: mpsc::UnboundedReceiver<Command>,
    tick_interval: Option<Duration>,
}

impl SessionTask {
    /// Wraps `session`. With `tick_interval` set to `None` the feed only
    /// advances through [`SessionHandle::advance`].
    pub fn new(session: Session, tick_interval: Option<Duration>) -> (Self, SessionHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = SessionHandle {
            commands: tx,
            events: session.event_sender(),
        };
        let task = Self {
            session,
            commands: rx,
            tick_interval,
        };
        (task, handle)
    }

    /// Runs until every handle has been dropped, then returns the session.
    pub async fn run(mut self) -> Session {
        tracing::info!(interval = ?self.tick_interval, "Starting session task.");
        let mut interval = self.tick_interval.map(|period| {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => command(&mut self.session),
                    None => break,
                },
                _ = next_tick(&mut interval) => {
                    self.session.tick(Utc::now());
                }
            }
        }

        tracing::info!("All session handles dropped. Session task stopping.");
        self.session
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<Session> {
        tokio::spawn(self.run())
    }
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Cloneable async facade over a running [`SessionTask`].
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    /// Runs `f` on the session task and waits for its result.
    async fn call<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Session) -> T + Send + 'static,
    {
        let (reply, response) = oneshot::channel();
        let command: Command = Box::new(move |session| {
            let _ = reply.send(f(session));
        });
        self.commands.send(command).map_err(|_| Error::Stopped)?;
        response.await.map_err(|_| Error::Stopped)
    }

    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn select_instrument(&self, symbol: Symbol) -> Result<(Quote, Vec<Quote>)> {
        Ok(self.call(move |s| s.select_instrument(&symbol)).await??)
    }

    /// Streams every new quote of `symbol` until the stream is dropped.
    pub async fn subscribe_quotes(&self, symbol: Symbol) -> Result<QuoteStream> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self
            .call(move |s| {
                s.subscribe_quotes(
                    &symbol,
                    Box::new(move |quote: &Quote| {
                        let _ = tx.send(quote.clone());
                    }),
                )
            })
            .await??;
        Ok(QuoteStream {
            id,
            quotes: rx,
            commands: self.commands.clone(),
            active: true,
        })
    }

    pub async fn place_order(&self, order: Order) -> Result<Placement> {
        Ok(self.call(move |s| s.place_order(order)).await??)
    }

    pub async fn close_position(&self, id: PositionId) -> Result<Option<Position>> {
        Ok(self.call(move |s| s.close_position(id)).await??)
    }

    pub async fn modify_position(&self, id: PositionId, levels: ProtectiveLevels) -> Result<Position> {
        Ok(self.call(move |s| s.modify_position(id, levels)).await??)
    }

    pub async fn cancel_order(&self, id: PositionId) -> Result<PendingOrder> {
        Ok(self.call(move |s| s.cancel_order(id)).await??)
    }

    pub async fn portfolio_snapshot(&self) -> Result<PortfolioSnapshot> {
        self.call(|s| s.portfolio_snapshot()).await
    }

    pub async fn open_positions(&self) -> Result<Vec<Position>> {
        self.call(|s| s.open_positions()).await
    }

    pub async fn pending_orders(&self) -> Result<Vec<PendingOrder>> {
        self.call(|s| s.pending_orders()).await
    }

    pub async fn trade_history(&self, filter: TradeFilter) -> Result<Vec<TradeRecord>> {
        self.call(move |s| s.trade_history(&filter)).await
    }

    pub async fn performance(&self, filter: TradeFilter) -> Result<PerformanceReport> {
        self.call(move |s| s.performance(&filter)).await
    }

    pub async fn leaderboard(&self, period: LeaderboardPeriod) -> Result<Vec<LeaderboardEntry>> {
        self.call(move |s| s.leaderboard(period)).await
    }

    pub async fn run_backtest(&self, request: BacktestRequest) -> Result<BacktestJob> {
        Ok(self.call(move |s| s.run_backtest(request)).await??)
    }

    /// Ticks the session once at `now`. Used when no interval drives it.
    pub async fn advance(&self, now: DateTime<Utc>) -> Result<TickSummary> {
        self.call(move |s| s.tick(now)).await
    }
}

/// Quotes for one subscription. Dropping it unsubscribes.
pub struct QuoteStream {
    id: SubscriptionId,
    quotes: mpsc::UnboundedReceiver<Quote>,
    commands: mpsc::UnboundedSender<Command>,
    active: bool,
}

impl QuoteStream {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// The next quote, or `None` once the session has stopped.
    pub async fn recv(&mut self) -> Option<Quote> {
        self.quotes.recv().await
    }

    pub fn unsubscribe(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        let id = self.id;
        let command: Command = Box::new(move |session| {
            session.unsubscribe(id);
        });
        // The session may already be gone, which unsubscribes everything anyway.
        let _ = self.commands.send(command);
    }
}

impl Drop for QuoteStream {
    fn drop(&mut self) {
        self.detach();
    }
}
