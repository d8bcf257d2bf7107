// In crates/backtester/src/types.rs

use analytics::{EquityPoint, PerformanceReport, TradeRecord};
use chrono::{DateTime, Duration, Utc};
use core_types::{Instrument, StrategyConfig, Symbol};
use execution::SimulationSettings;
use risk::SizingSettings;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Position sizing and protective-level parameters for a backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestParams {
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    /// Share of equity committed as margin per trade.
    pub position_size_pct: f64,
    pub max_concurrent_positions: usize,
    pub leverage: u32,
}

impl Default for BacktestParams {
    fn default() -> Self {
        Self {
            stop_loss_pct: 1.0,
            take_profit_pct: 2.0,
            position_size_pct: 10.0,
            max_concurrent_positions: 1,
            leverage: 10,
        }
    }
}

impl BacktestParams {
    pub fn sizing(&self) -> SizingSettings {
        SizingSettings {
            stop_loss_pct: self.stop_loss_pct,
            take_profit_pct: self.take_profit_pct,
            position_size_pct: self.position_size_pct,
            max_concurrent_positions: self.max_concurrent_positions,
            leverage: self.leverage,
            minimum_confidence: 0.0,
        }
    }
}

/// How much synthetic history to replay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BacktestWindow {
    pub ticks: usize,
    pub interval_secs: i64,
    /// Timestamp of the first tick.
    pub start: DateTime<Utc>,
}

impl BacktestWindow {
    pub fn new(ticks: usize, interval_secs: i64) -> Self {
        Self {
            ticks,
            interval_secs,
            start: DateTime::UNIX_EPOCH,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::seconds(self.interval_secs)
    }
}

impl Default for BacktestWindow {
    fn default() -> Self {
        Self::new(500, 60)
    }
}

/// Everything needed to replay a strategy. Two equal requests produce equal
/// results.
#[derive(Debug, Clone)]
pub struct BacktestRequest {
    pub strategy: StrategyConfig,
    pub params: BacktestParams,
    pub window: BacktestWindow,
    pub instrument: Instrument,
    pub seed: u64,
    pub initial_balance: Decimal,
    pub simulation: SimulationSettings,
    /// Wall-clock limit; `None` runs to completion.
    pub budget: Option<std::time::Duration>,
}

impl BacktestRequest {
    pub fn new(strategy: StrategyConfig, instrument: Instrument) -> Self {
        Self {
            strategy,
            params: BacktestParams::default(),
            window: BacktestWindow::default(),
            instrument,
            seed: 42,
            initial_balance: dec!(10_000),
            simulation: SimulationSettings::default(),
            budget: None,
        }
    }

    pub fn with_params(mut self, params: BacktestParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_window(mut self, window: BacktestWindow) -> Self {
        self.window = window;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_initial_balance(mut self, balance: Decimal) -> Self {
        self.initial_balance = balance;
        self
    }

    pub fn with_simulation(mut self, simulation: SimulationSettings) -> Self {
        self.simulation = simulation;
        self
    }

    pub fn with_budget(mut self, budget: std::time::Duration) -> Self {
        self.budget = Some(budget);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResult {
    pub strategy: StrategyConfig,
    pub params: BacktestParams,
    pub window: BacktestWindow,
    pub symbol: Symbol,
    pub seed: u64,
    pub initial_balance: Decimal,
    pub final_balance: Decimal,
    pub report: PerformanceReport,
    pub trades: Vec<TradeRecord>,
    pub equity_curve: Vec<EquityPoint>,
    pub ticks_processed: usize,
}
