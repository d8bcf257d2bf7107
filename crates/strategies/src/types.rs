// In crates/strategies/src/types.rs

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct MACrossoverSettings {
    pub fast_period: u32,
    pub slow_period: u32,

    // The confidence score to assign to signals from this strategy
    pub confidence: f64,
}

impl Default for MACrossoverSettings {
    fn default() -> Self {
        Self {
            fast_period: 9,
            slow_period: 21,
            confidence: 0.75,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct MeanReversionSettings {
    pub bband_period: u32,
    pub bband_stddev: f64,
    pub rsi_period: u32,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub confidence: f64,
}

impl Default for MeanReversionSettings {
    fn default() -> Self {
        Self {
            bband_period: 20,
            bband_stddev: 2.0,
            rsi_period: 14,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            confidence: 0.7,
        }
    }
}
