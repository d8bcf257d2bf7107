// In crates/app-config/src/types.rs

use analytics::Participant;
use backtester::BacktestParams;
use core_types::{AssetClass, Instrument, Leverage, StrategyConfig};
use execution::{SimulationSettings, SwapPolicy};
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    /// The application's general settings.
    pub app: AppSettings,
    pub account: AccountSettings,
    #[serde(default)]
    pub simulation: SessionSettings,
    #[serde(default)]
    pub backtest: BacktestSettings,
    /// The tradable instrument catalog.
    pub instruments: Vec<InstrumentSettings>,
    #[serde(default)]
    pub leaderboard: LeaderboardSettings,
}

impl Settings {
    /// Builds the instrument catalog in configuration order.
    pub fn instrument_catalog(&self) -> Vec<Instrument> {
        self.instruments.iter().map(InstrumentSettings::to_instrument).collect()
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct AppSettings {
    /// The environment the application is running in (e.g., "development", "production").
    pub environment: String,
    /// The log level for the application.
    pub log_level: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct AccountSettings {
    #[serde(with = "rust_decimal::serde::float")]
    pub initial_balance: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Name shown for the live session on the leaderboard.
    #[serde(default = "default_display_name")]
    pub display_name: String,
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_display_name() -> String {
    "You".to_string()
}

/// Live session cadence plus the order engine and ledger knobs.
#[derive(Deserialize, Debug, Clone)]
pub struct SessionSettings {
    /// Milliseconds between ticks; `0` leaves ticking to the caller.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Look-back quotes generated when an instrument is selected.
    #[serde(default = "default_history_len")]
    pub history_len: usize,
    /// Optional seed for a reproducible live feed.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_leverages")]
    pub supported_leverages: Vec<u32>,
    #[serde(default, with = "rust_decimal::serde::float")]
    pub commission_rate: Decimal,
    #[serde(default)]
    pub swap: SwapPolicy,
}

fn default_tick_interval_ms() -> u64 {
    1_000
}

fn default_history_len() -> usize {
    quotes::DEFAULT_HISTORY_LEN
}

fn default_leverages() -> Vec<u32> {
    SimulationSettings::default().supported_leverages.iter().map(|l| l.0).collect()
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            history_len: default_history_len(),
            seed: None,
            supported_leverages: default_leverages(),
            commission_rate: Decimal::ZERO,
            swap: SwapPolicy::default(),
        }
    }
}

impl SessionSettings {
    /// The order engine and ledger settings for a session or backtest.
    pub fn engine_settings(&self) -> SimulationSettings {
        SimulationSettings {
            supported_leverages: self.supported_leverages.iter().copied().map(Leverage).collect(),
            commission_rate: self.commission_rate,
            swap: self.swap,
        }
    }

    /// `None` when ticks are driven manually.
    pub fn tick_interval(&self) -> Option<std::time::Duration> {
        (self.tick_interval_ms > 0).then(|| std::time::Duration::from_millis(self.tick_interval_ms))
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct BacktestSettings {
    pub seed: u64,
    pub ticks: usize,
    pub interval_secs: i64,
    /// Wall-clock limit per run; `0` means unbounded.
    pub budget_secs: u64,
    pub params: BacktestParams,
    /// Per-strategy parameter tables, e.g. `[[backtest.strategies]]`.
    pub strategies: Vec<StrategyConfig>,
}

impl Default for BacktestSettings {
    fn default() -> Self {
        Self {
            seed: 42,
            ticks: 500,
            interval_secs: 60,
            budget_secs: 30,
            params: BacktestParams::default(),
            strategies: Vec::new(),
        }
    }
}

impl BacktestSettings {
    /// The configured parameters for `id`, or the strategy defaults.
    pub fn strategy_config(&self, id: &str) -> StrategyConfig {
        self.strategies
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .unwrap_or_else(|| StrategyConfig::new(id))
    }

    pub fn budget(&self) -> Option<std::time::Duration> {
        (self.budget_secs > 0).then(|| std::time::Duration::from_secs(self.budget_secs))
    }
}

/// One catalog entry. Omitted fields take the asset-class defaults.
#[derive(Deserialize, Debug, Clone)]
pub struct InstrumentSettings {
    pub symbol: String,
    pub name: String,
    pub asset_class: AssetClass,
    #[serde(with = "rust_decimal::serde::float")]
    pub tick_size: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub reference_price: Decimal,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub spread: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub volatility: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub min_quantity: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub max_quantity: Option<Decimal>,
    #[serde(default)]
    pub max_leverage: Option<u32>,
}

impl InstrumentSettings {
    pub fn to_instrument(&self) -> Instrument {
        let mut instrument = Instrument::new(
            self.symbol.as_str(),
            self.name.as_str(),
            self.asset_class,
            self.tick_size,
            self.reference_price,
        );
        if let Some(spread) = self.spread {
            instrument = instrument.with_spread(spread);
        }
        if let Some(volatility) = self.volatility {
            instrument = instrument.with_volatility(volatility);
        }
        if self.min_quantity.is_some() || self.max_quantity.is_some() {
            let min = self.min_quantity.unwrap_or(instrument.min_quantity);
            let max = self.max_quantity.unwrap_or(instrument.max_quantity);
            instrument = instrument.with_quantity_band(min, max);
        }
        if let Some(leverage) = self.max_leverage {
            instrument = instrument.with_max_leverage(Leverage(leverage));
        }
        instrument
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct LeaderboardSettings {
    #[serde(default)]
    pub participants: Vec<Participant>,
}
