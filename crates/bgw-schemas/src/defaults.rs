//! Constants embedded by the message templates.
//!
//! Each struct's `Default` carries the production values. All of them
//! deserialize with `#[serde(default)]`, so a defaults file only needs the
//! keys it overrides:
//!
//! ```yaml
//! execution_settings:
//!   slippage: 0.002
//! data:
//!   frequency: 1h
//! ```

use serde::{Deserialize, Serialize};

/// Fill model attached to every backtest request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSettings {
    pub slippage: f64,
    pub commission: f64,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            slippage: 0.001,
            commission: 0.0003,
        }
    }
}

/// Risk limits attached to every backtest request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskSettings {
    pub max_position_size: f64,
    pub max_drawdown: f64,
}

impl Default for RiskSettings {
    fn default() -> Self {
        Self {
            max_position_size: 0.2,
            max_drawdown: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyDefaults {
    /// Used when the upload names no version.
    pub version: String,
    pub tags: Vec<String>,
}

impl Default for StrategyDefaults {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            tags: vec!["example".to_string(), "test".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataDefaults {
    pub frequency: String,
}

impl Default for DataDefaults {
    fn default() -> Self {
        Self {
            frequency: "1d".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileDefaults {
    pub file_type: String,
}

impl Default for FileDefaults {
    fn default() -> Self {
        Self {
            file_type: "unknown".to_string(),
        }
    }
}

/// All template constants, injected wherever templates are called.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateDefaults {
    pub execution_settings: ExecutionSettings,
    pub risk_settings: RiskSettings,
    pub strategy: StrategyDefaults,
    pub data: DataDefaults,
    pub file: FileDefaults,
}
