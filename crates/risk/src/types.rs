// In crates/risk/src/types.rs

use serde::{Deserialize, Serialize};

/// Position sizing and protective-level settings for strategy-driven orders.
///
/// Percentages are expressed out of 100, so `1.5` means 1.5%.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SizingSettings {
    /// Stop-loss distance from entry. `0` places no stop.
    pub stop_loss_pct: f64,
    /// Take-profit distance from entry. `0` places no target.
    pub take_profit_pct: f64,
    /// Share of equity committed as margin per position.
    pub position_size_pct: f64,
    pub max_concurrent_positions: usize,
    pub leverage: u32,
    #[serde(default)]
    pub minimum_confidence: f64,
}

impl Default for SizingSettings {
    fn default() -> Self {
        Self {
            stop_loss_pct: 1.0,
            take_profit_pct: 2.0,
            position_size_pct: 10.0,
            max_concurrent_positions: 1,
            leverage: 10,
            minimum_confidence: 0.0,
        }
    }
}
