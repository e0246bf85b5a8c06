//! Typed payload variants, one per message type.
//!
//! `Payload` serializes untagged: on the wire the envelope's `payload` field
//! is the bare object below, and `message_type` carries the discriminant.
//! Decoding therefore goes through [`Payload::from_wire`], which needs that
//! discriminant; `Payload` itself is not `Deserialize`.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::defaults::{ExecutionSettings, RiskSettings};
use crate::message_types;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Backtest(BacktestPayload),
    StrategyUpload(StrategyUploadPayload),
    DataRequest(DataRequestPayload),
    FileUpload(FileUploadPayload),
    /// Caller-defined payload, passed through unchanged.
    Custom(serde_json::Value),
}

impl Payload {
    /// Fixed message type for templated variants; `None` for `Custom`.
    pub fn message_type(&self) -> Option<&'static str> {
        match self {
            Payload::Backtest(_) => Some(message_types::BACKTEST_REQUEST),
            Payload::StrategyUpload(_) => Some(message_types::STRATEGY_UPLOAD),
            Payload::DataRequest(_) => Some(message_types::DATA_REQUEST),
            Payload::FileUpload(_) => Some(message_types::FILE_UPLOAD),
            Payload::Custom(_) => None,
        }
    }

    /// Rebuild the payload published under `message_type`.
    ///
    /// A known type yields its typed variant only when the typed form
    /// re-serializes to exactly `value`. Anything else, including extra keys
    /// sent through the custom endpoint under a templated type, stays
    /// `Custom` so no field is dropped.
    pub fn from_wire(message_type: &str, value: Value) -> Payload {
        let typed = match message_type {
            message_types::BACKTEST_REQUEST => decode_exact(&value, Payload::Backtest),
            message_types::STRATEGY_UPLOAD => decode_exact(&value, Payload::StrategyUpload),
            message_types::DATA_REQUEST => decode_exact(&value, Payload::DataRequest),
            message_types::FILE_UPLOAD => decode_exact(&value, Payload::FileUpload),
            _ => None,
        };
        typed.unwrap_or(Payload::Custom(value))
    }
}

fn decode_exact<T>(value: &Value, wrap: fn(T) -> Payload) -> Option<Payload>
where
    T: DeserializeOwned + Serialize,
{
    let typed: T = serde_json::from_value(value.clone()).ok()?;
    match serde_json::to_value(&typed) {
        Ok(back) if &back == value => Some(wrap(typed)),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// backtest.request
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestPayload {
    pub strategy_id: String,
    pub config: BacktestConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub start_date: String,
    pub end_date: String,
    /// Caller's number, passed through without float conversion.
    pub initial_capital: Number,
    pub instruments: Vec<String>,
    pub execution_settings: ExecutionSettings,
    pub risk_settings: RiskSettings,
}

// ---------------------------------------------------------------------------
// strategy.upload
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyUploadPayload {
    pub strategy_id: String,
    pub name: String,
    pub version: String,
    pub code: String,
    pub parameters: serde_json::Map<String, serde_json::Value>,
    pub tags: Vec<String>,
}

// ---------------------------------------------------------------------------
// data.request
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataRequestPayload {
    pub instrument_id: String,
    pub start_date: String,
    pub end_date: String,
    pub frequency: String,
}

// ---------------------------------------------------------------------------
// file.upload
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileUploadPayload {
    pub file_name: String,
    /// Base64 (standard alphabet, padded).
    pub file_content: String,
    pub file_type: String,
    /// Decoded byte length of `file_content`.
    pub file_size: u64,
    /// Serialized as `null` when absent.
    pub related_id: Option<String>,
    pub upload_time: DateTime<Utc>,
}
