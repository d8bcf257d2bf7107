use crate::types::{MACrossoverSettings, MeanReversionSettings};
use crate::{ma_crossover::MACrossover, mean_reversion::MeanReversion, Error, Result, Strategy};
use core_types::StrategyConfig;
use serde::de::DeserializeOwned;

/// Every strategy id [`create_strategy`] understands.
pub const STRATEGY_IDS: &[&str] = &["ma_crossover", "mean_reversion"];

/// Builds a fresh strategy instance from its id and optional parameter table.
/// Missing parameters fall back to the strategy's defaults.
pub fn create_strategy(config: &StrategyConfig) -> Result<Box<dyn Strategy + Send>> {
    let strategy: Box<dyn Strategy + Send> = match config.id.as_str() {
        "ma_crossover" => {
            let settings: MACrossoverSettings = params_or_default(config)?;
            Box::new(MACrossover::new(settings)?)
        }
        "mean_reversion" => {
            let settings: MeanReversionSettings = params_or_default(config)?;
            Box::new(MeanReversion::new(settings)?)
        }
        unknown => return Err(Error::UnknownStrategy(unknown.to_string())),
    };
    tracing::debug!(id = %config.id, name = strategy.name(), "Strategy created.");
    Ok(strategy)
}

fn params_or_default<T: DeserializeOwned + Default>(config: &StrategyConfig) -> Result<T> {
    match &config.params {
        Some(params) => params
            .clone()
            .try_into()
            .map_err(|e| Error::InvalidParameters(format!("{}: {}", config.id, e))),
        None => Ok(T::default()),
    }
}
