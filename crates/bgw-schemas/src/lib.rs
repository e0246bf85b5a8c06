//! Message envelope and payload shapes published by the gateway.
//!
//! Every message that leaves the gateway is an [`Envelope`] wrapping one
//! [`Payload`] variant. Templates in [`templates`] shape the payload and stamp
//! the fixed `message_type`; [`defaults`] holds the constants they embed.

pub mod defaults;
pub mod envelope;
pub mod payload;
pub mod templates;

pub use defaults::{
    DataDefaults, ExecutionSettings, FileDefaults, RiskSettings, StrategyDefaults,
    TemplateDefaults,
};
pub use envelope::{build_envelope, Envelope};
pub use payload::{
    BacktestConfig, BacktestPayload, DataRequestPayload, FileUploadPayload, Payload,
    StrategyUploadPayload,
};
pub use templates::TemplateError;

/// Message types stamped by the templates. These double as routing keys.
pub mod message_types {
    pub const BACKTEST_REQUEST: &str = "backtest.request";
    pub const STRATEGY_UPLOAD: &str = "strategy.upload";
    pub const DATA_REQUEST: &str = "data.request";
    pub const FILE_UPLOAD: &str = "file.upload";
    /// Used by the custom-message endpoint when the caller names no type.
    pub const CUSTOM: &str = "custom";
}
