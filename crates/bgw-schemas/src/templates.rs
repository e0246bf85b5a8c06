//! Message templates: shape a payload, then stamp it with its fixed type.
//!
//! Field presence is checked by the caller (the HTTP layer) before a template
//! runs; templates only fill in defaults and derived fields.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;

use crate::defaults::TemplateDefaults;
use crate::envelope::{build_envelope, Envelope};
use crate::message_types;
use crate::payload::{
    BacktestConfig, BacktestPayload, DataRequestPayload, FileUploadPayload, Payload,
    StrategyUploadPayload,
};

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("file_content is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
}

/// Required inputs of a backtest request.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestRequest {
    pub strategy_id: String,
    pub start_date: String,
    pub end_date: String,
    pub initial_capital: serde_json::Number,
    pub instruments: Vec<String>,
}

/// Inputs of a file upload; `file_content_base64` is the encoded file body.
#[derive(Debug, Clone, PartialEq)]
pub struct FileUpload {
    pub file_name: String,
    pub file_content_base64: String,
    pub file_type: Option<String>,
    pub related_id: Option<String>,
}

/// `backtest.request`. Execution and risk settings always come from
/// `defaults`; callers have no way to override them per request.
pub fn backtest_request(req: BacktestRequest, defaults: &TemplateDefaults) -> Envelope {
    let payload = BacktestPayload {
        strategy_id: req.strategy_id,
        config: BacktestConfig {
            start_date: req.start_date,
            end_date: req.end_date,
            initial_capital: req.initial_capital,
            instruments: req.instruments,
            execution_settings: defaults.execution_settings.clone(),
            risk_settings: defaults.risk_settings.clone(),
        },
    };
    build_envelope(message_types::BACKTEST_REQUEST, Payload::Backtest(payload), None)
}

/// `strategy.upload`.
pub fn strategy_upload(
    strategy_id: String,
    name: String,
    code: String,
    version: Option<String>,
    defaults: &TemplateDefaults,
) -> Envelope {
    let payload = StrategyUploadPayload {
        strategy_id,
        name,
        version: version.unwrap_or_else(|| defaults.strategy.version.clone()),
        code,
        parameters: serde_json::Map::new(),
        tags: defaults.strategy.tags.clone(),
    };
    build_envelope(
        message_types::STRATEGY_UPLOAD,
        Payload::StrategyUpload(payload),
        None,
    )
}

/// `data.request`.
pub fn data_request(
    instrument_id: String,
    start_date: String,
    end_date: String,
    frequency: Option<String>,
    defaults: &TemplateDefaults,
) -> Envelope {
    let payload = DataRequestPayload {
        instrument_id,
        start_date,
        end_date,
        frequency: frequency.unwrap_or_else(|| defaults.data.frequency.clone()),
    };
    build_envelope(message_types::DATA_REQUEST, Payload::DataRequest(payload), None)
}

/// `file.upload`.
///
/// `file_size` is the decoded length of the content, so malformed base64 is
/// an error rather than a wrong size.
pub fn file_upload(
    upload: FileUpload,
    defaults: &TemplateDefaults,
) -> Result<Envelope, TemplateError> {
    let decoded = STANDARD.decode(upload.file_content_base64.as_bytes())?;

    let payload = FileUploadPayload {
        file_name: upload.file_name,
        file_content: upload.file_content_base64,
        file_type: upload
            .file_type
            .unwrap_or_else(|| defaults.file.file_type.clone()),
        file_size: decoded.len() as u64,
        related_id: upload.related_id,
        upload_time: Utc::now(),
    };
    Ok(build_envelope(
        message_types::FILE_UPLOAD,
        Payload::FileUpload(payload),
        None,
    ))
}

/// Caller-defined message. The payload passes through untouched.
pub fn custom(
    message_type: Option<String>,
    payload: serde_json::Value,
    correlation_id: Option<String>,
) -> Envelope {
    let message_type = message_type
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| message_types::CUSTOM.to_string());
    build_envelope(message_type, Payload::Custom(payload), correlation_id)
}

/// Encode raw file bytes the way [`file_upload`] expects them.
pub fn encode_file_content(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload_json(env: &Envelope) -> serde_json::Value {
        serde_json::to_value(&env.payload).unwrap()
    }

    #[test]
    fn backtest_embeds_fixed_settings() {
        let env = backtest_request(
            BacktestRequest {
                strategy_id: "s1".into(),
                start_date: "2024-01-01".into(),
                end_date: "2024-06-01".into(),
                initial_capital: serde_json::Number::from(100_000u64),
                instruments: vec!["AAPL".into(), "MSFT".into()],
            },
            &TemplateDefaults::default(),
        );

        assert_eq!(env.message_type, "backtest.request");
        let p = payload_json(&env);
        assert_eq!(p["strategy_id"], "s1");
        assert_eq!(p["config"]["initial_capital"].to_string(), "100000");
        assert_eq!(p["config"]["instruments"], json!(["AAPL", "MSFT"]));
        assert_eq!(
            p["config"]["execution_settings"],
            json!({"slippage": 0.001, "commission": 0.0003})
        );
        assert_eq!(
            p["config"]["risk_settings"],
            json!({"max_position_size": 0.2, "max_drawdown": 0.1})
        );
    }

    #[test]
    fn backtest_uses_injected_defaults() {
        let mut defaults = TemplateDefaults::default();
        defaults.risk_settings.max_drawdown = 0.05;
        let env = backtest_request(
            BacktestRequest {
                strategy_id: "s1".into(),
                start_date: "a".into(),
                end_date: "b".into(),
                initial_capital: serde_json::Number::from(1u64),
                instruments: vec![],
            },
            &defaults,
        );
        assert_eq!(payload_json(&env)["config"]["risk_settings"]["max_drawdown"], 0.05);
    }

    #[test]
    fn strategy_upload_fills_version_parameters_and_tags() {
        let env = strategy_upload(
            "s1".into(),
            "Momentum".into(),
            "def run(): pass".into(),
            None,
            &TemplateDefaults::default(),
        );
        assert_eq!(env.message_type, "strategy.upload");
        let p = payload_json(&env);
        assert_eq!(p["version"], "1.0");
        assert_eq!(p["parameters"], json!({}));
        assert_eq!(p["tags"], json!(["example", "test"]));

        let env = strategy_upload(
            "s1".into(),
            "Momentum".into(),
            String::new(),
            Some("2.3".into()),
            &TemplateDefaults::default(),
        );
        assert_eq!(payload_json(&env)["version"], "2.3");
    }

    #[test]
    fn data_request_defaults_frequency() {
        let env = data_request(
            "AAPL".into(),
            "2024-01-01".into(),
            "2024-06-01".into(),
            None,
            &TemplateDefaults::default(),
        );
        assert_eq!(env.message_type, "data.request");
        assert_eq!(payload_json(&env)["frequency"], "1d");
    }

    #[test]
    fn file_size_is_decoded_length() {
        let bytes: Vec<u8> = vec![0x00, 0xff, 0xfe, 0x80, 0x7f, 0xc3, 0x28];
        let encoded = encode_file_content(&bytes);
        assert_ne!(encoded.len(), bytes.len());

        let env = file_upload(
            FileUpload {
                file_name: "blob.bin".into(),
                file_content_base64: encoded.clone(),
                file_type: None,
                related_id: None,
            },
            &TemplateDefaults::default(),
        )
        .unwrap();

        let p = payload_json(&env);
        assert_eq!(env.message_type, "file.upload");
        assert_eq!(p["file_size"], bytes.len() as u64);
        assert_eq!(p["file_content"], encoded);
        assert_eq!(p["file_type"], "unknown");
        assert!(p["related_id"].is_null());
        assert!(p["upload_time"].is_string());
    }

    #[test]
    fn empty_file_has_zero_size() {
        let env = file_upload(
            FileUpload {
                file_name: "empty.txt".into(),
                file_content_base64: String::new(),
                file_type: Some("text".into()),
                related_id: Some("bt-1".into()),
            },
            &TemplateDefaults::default(),
        )
        .unwrap();
        let p = payload_json(&env);
        assert_eq!(p["file_size"], 0);
        assert_eq!(p["related_id"], "bt-1");
    }

    #[test]
    fn malformed_base64_is_rejected() {
        let err = file_upload(
            FileUpload {
                file_name: "x".into(),
                file_content_base64: "not base64!!".into(),
                file_type: None,
                related_id: None,
            },
            &TemplateDefaults::default(),
        )
        .unwrap_err();
        assert!(matches!(err, TemplateError::InvalidBase64(_)));
    }

    #[test]
    fn custom_defaults_message_type_and_keeps_payload() {
        let env = custom(None, json!({"x": 1}), None);
        assert_eq!(env.message_type, "custom");
        assert_eq!(payload_json(&env), json!({"x": 1}));

        let env = custom(Some("risk.alert".into()), json!([1, 2]), Some("c-1".into()));
        assert_eq!(env.message_type, "risk.alert");
        assert_eq!(env.correlation_id, "c-1");
    }
}
