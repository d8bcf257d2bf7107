use serde::{Deserialize, Serialize};
use toml::Value;

/// Names a strategy and carries its strategy-specific parameters.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    pub id: String,
    // This will hold the `params = { ... }` table from the TOML
    #[serde(default)]
    pub params: Option<Value>,
}

impl StrategyConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            params: None,
        }
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }
}
