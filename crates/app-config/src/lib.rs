// In crates/app-config/src/lib.rs

use config::{Config, Environment, File};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::path::Path;

pub mod error;
pub mod types;

// Re-export the most important types for easy access.
pub use error::{Error, Result};
pub use types::{
    AccountSettings, AppSettings, BacktestSettings, InstrumentSettings, LeaderboardSettings, SessionSettings,
    Settings,
};

/// Loads the application settings from various sources.
///
/// This function orchestrates the layered configuration loading:
/// 1. Reads from a default `base.toml` file.
/// 2. Merges settings from an environment-specific file (e.g., `development.toml`).
/// 3. Merges settings from environment variables.
pub fn load_settings() -> Result<Settings> {
    // Get the current environment. Default to "development" if not set.
    let environment = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "development".into());

    let settings = Config::builder()
        // 1. Load the base configuration file.
        .add_source(File::with_name("config/base"))
        // 2. Load the environment-specific configuration file.
        .add_source(File::with_name(&format!("config/{}", environment)).required(false))
        // 3. Load settings from environment variables (e.g., `APP_ACCOUNT__INITIAL_BALANCE=...`).
        // The prefix is `APP`, separator is `__`.
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    // Deserialize the configuration into our `Settings` struct.
    let settings: Settings = settings.try_deserialize()?;
    validate(&settings)?;

    Ok(settings)
}

/// Loads settings from a single TOML file, without layering.
pub fn load_settings_from_file(path: impl AsRef<Path>) -> Result<Settings> {
    let content = std::fs::read_to_string(path)?;
    let settings: Settings = toml::from_str(&content)?;
    validate(&settings)?;
    Ok(settings)
}

/// Rejects settings no session could start from.
pub fn validate(settings: &Settings) -> Result<()> {
    if settings.account.initial_balance <= Decimal::ZERO {
        return Err(Error::Invalid(format!(
            "account.initial_balance must be positive, got {}",
            settings.account.initial_balance
        )));
    }
    if settings.instruments.is_empty() {
        return Err(Error::Invalid("at least one instrument must be configured".to_string()));
    }

    let mut seen = HashSet::new();
    for instrument in &settings.instruments {
        if !seen.insert(instrument.symbol.as_str()) {
            return Err(Error::Invalid(format!("duplicate instrument symbol {}", instrument.symbol)));
        }
        if instrument.tick_size <= Decimal::ZERO || instrument.reference_price <= Decimal::ZERO {
            return Err(Error::Invalid(format!(
                "{}: tick_size and reference_price must be positive",
                instrument.symbol
            )));
        }
    }

    if settings.simulation.supported_leverages.is_empty() {
        return Err(Error::Invalid("simulation.supported_leverages is empty".to_string()));
    }
    Ok(())
}
