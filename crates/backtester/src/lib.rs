pub mod error;
pub mod logger;
pub mod types;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use analytics::AnalyticsEngine;
use chrono::Duration;
use core_types::{CloseReason, Instrument, Quote, Side, Signal};
use execution::{OrderEngine, PositionLedger};
use quotes::QuoteGenerator;
use risk::{RiskManager, simple_manager::SimpleRiskManager};
use rust_decimal::Decimal;
use strategies::{Strategy, create_strategy};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub use error::{BacktestError, Result};
pub use logger::TradeLogger;
pub use types::{BacktestParams, BacktestRequest, BacktestResult, BacktestWindow};

/// Number of quotes a strategy sees on each assessment.
const QUOTE_HISTORY_SIZE: usize = 100;

/// Ticks between cooperative yields back to the runtime.
const YIELD_EVERY: usize = 256;

/// Shared flag that asks a running backtest to stop at its next tick.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A backtest running on its own tokio task.
#[derive(Debug)]
pub struct BacktestJob {
    handle: JoinHandle<Result<BacktestResult>>,
    cancel: CancelHandle,
}

impl BacktestJob {
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits for the run to finish.
    pub async fn join(self) -> Result<BacktestResult> {
        self.handle
            .await
            .map_err(|e| BacktestError::Aborted(e.to_string()))?
    }
}

/// Replays one strategy over a seeded synthetic series with its own ledger
/// and order engine.
pub struct Backtester {
    request: BacktestRequest,
    strategy: Box<dyn Strategy + Send>,
    risk_manager: SimpleRiskManager,
    engine: OrderEngine,
    ledger: PositionLedger,
    logger: TradeLogger,
    cancel: CancelHandle,
}

impl Backtester {
    /// Builds the strategy and risk manager up front so bad requests fail
    /// before any work is scheduled.
    pub fn new(request: BacktestRequest) -> Result<Self> {
        if request.window.ticks == 0 {
            return Err(BacktestError::InvalidParams("window must contain at least one tick".to_string()));
        }
        if request.window.interval_secs <= 0 {
            return Err(BacktestError::InvalidParams(format!(
                "tick interval must be positive, got {}s",
                request.window.interval_secs
            )));
        }
        let fits = Duration::try_seconds(request.window.interval_secs)
            .zip(i32::try_from(request.window.ticks - 1).ok())
            .and_then(|(step, steps)| step.checked_mul(steps))
            .and_then(|span| request.window.start.checked_add_signed(span))
            .is_some();
        if !fits {
            return Err(BacktestError::InvalidParams(format!(
                "{} ticks of {}s overflow the time range",
                request.window.ticks, request.window.interval_secs
            )));
        }
        if request.initial_balance <= Decimal::ZERO {
            return Err(BacktestError::InvalidParams(format!(
                "initial balance must be positive, got {}",
                request.initial_balance
            )));
        }

        let strategy = create_strategy(&request.strategy)?;
        let risk_manager = SimpleRiskManager::new(request.params.sizing())?;
        let engine = OrderEngine::new(request.simulation.clone());
        let ledger = PositionLedger::new(request.initial_balance, &request.simulation);

        Ok(Self {
            request,
            strategy,
            risk_manager,
            engine,
            ledger,
            logger: TradeLogger::new(),
            cancel: CancelHandle::new(),
        })
    }

    pub fn with_cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Runs the replay to completion, cancellation or budget exhaustion.
    pub async fn run(mut self) -> Result<BacktestResult> {
        let started = Instant::now();
        let instrument = self.request.instrument.clone();
        let window = self.request.window;
        let series = QuoteGenerator::seeded(self.request.seed).series(
            &instrument,
            window.ticks,
            window.start,
            window.interval(),
        )
        .map_err(|e| BacktestError::InvalidParams(e.to_string()))?;

        info!(
            strategy = %self.request.strategy.id,
            symbol = %instrument.symbol,
            seed = self.request.seed,
            ticks = window.ticks,
            "Starting backtest."
        );

        for (i, quote) in series.iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!(tick = i, "Backtest cancelled.");
                return Err(BacktestError::Cancelled);
            }
            if let Some(budget) = self.request.budget {
                if started.elapsed() >= budget {
                    warn!(tick = i, budget_secs = budget.as_secs(), "Backtest ran out of time.");
                    return Err(BacktestError::TimedOut {
                        budget_secs: budget.as_secs(),
                    });
                }
            }

            let lookback = &series[i.saturating_sub(QUOTE_HISTORY_SIZE - 1)..=i];
            self.process_tick(&instrument, quote, lookback)?;

            if (i + 1) % YIELD_EVERY == 0 {
                tokio::task::yield_now().await;
            }
        }

        // Whatever is still open is closed at the final quote.
        if let Some(last) = series.last() {
            let closed = self.ledger.close_all(last, CloseReason::EndOfBacktest)?;
            if !closed.is_empty() {
                debug!(count = closed.len(), "Closed remaining positions at end of backtest.");
            }
        }

        Ok(self.finish(&instrument, series.len()))
    }

    fn process_tick(&mut self, instrument: &Instrument, quote: &Quote, lookback: &[Quote]) -> Result<()> {
        // --- 1. Sweep protective levels and pending orders ---
        self.ledger.on_tick(instrument, quote)?;
        self.logger.record_equity(quote.timestamp, self.ledger.snapshot().equity);

        // --- 2. Ask the strategy ---
        let held = self
            .ledger
            .open_positions()
            .find(|p| p.symbol == instrument.symbol)
            .map(|p| p.side);
        self.strategy.sync_position(held);
        let signal = self.strategy.assess(lookback);
        let entry_side = match signal {
            Signal::Hold => return Ok(()),
            Signal::Close => {
                self.ledger.close_all(quote, CloseReason::Manual)?;
                return Ok(());
            }
            Signal::GoLong { .. } => Side::Buy,
            Signal::GoShort { .. } => Side::Sell,
        };

        // A signal against an open position closes it first.
        let opposite: Vec<_> = self
            .ledger
            .open_positions()
            .filter(|p| p.side == entry_side.opposite())
            .map(|p| p.id)
            .collect();
        for id in opposite {
            self.ledger.close_position(id, quote)?;
        }

        // --- 3. Size the entry ---
        let snapshot = self.ledger.snapshot();
        let order = match self.risk_manager.evaluate(&signal, instrument, quote, &snapshot) {
            Ok(Some(order)) => order,
            Ok(None) => return Ok(()),
            Err(e) => {
                debug!(time = %quote.timestamp, ?signal, reason = %e, "Signal vetoed.");
                return Ok(());
            }
        };

        // --- 4. Place it ---
        match self.engine.place_order(order, instrument, quote, &mut self.ledger) {
            Ok(placement) => {
                debug!(time = %quote.timestamp, ?placement, "Backtest order placed.");
                Ok(())
            }
            Err(e) if e.is_recoverable() => {
                warn!(time = %quote.timestamp, error = %e, "Backtest order rejected.");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn finish(mut self, instrument: &Instrument, ticks_processed: usize) -> BacktestResult {
        let closed = self.ledger.closed_positions();
        self.logger.record_closed(closed, instrument);

        let analytics = AnalyticsEngine::new();
        let report = analytics.calculate(self.request.initial_balance, &self.logger.trades);
        let final_balance = self.ledger.balance();

        info!(
            strategy = %self.request.strategy.id,
            trades = report.total_trades,
            net_profit = %report.net_profit,
            %final_balance,
            "Backtest finished."
        );

        BacktestResult {
            strategy: self.request.strategy,
            params: self.request.params,
            window: self.request.window,
            symbol: instrument.symbol.clone(),
            seed: self.request.seed,
            initial_balance: self.request.initial_balance,
            final_balance,
            report,
            trades: self.logger.trades,
            equity_curve: self.logger.equity_curve,
            ticks_processed,
        }
    }
}

/// Runs a backtest on the current task.
pub async fn run_backtest(request: BacktestRequest) -> Result<BacktestResult> {
    Backtester::new(request)?.run().await
}

/// Validates `request` and starts it on a separate tokio task.
pub fn spawn(request: BacktestRequest) -> Result<BacktestJob> {
    let backtester = Backtester::new(request)?;
    let cancel = backtester.cancel_handle();
    let handle = tokio::spawn(backtester.run());
    Ok(BacktestJob { handle, cancel })
}
