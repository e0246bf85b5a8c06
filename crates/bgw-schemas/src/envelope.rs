use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::payload::Payload;

/// Canonical wrapper around every published message.
///
/// Write-once: built per API call, serialized, handed to the broker and
/// dropped. Nothing mutates an envelope after [`build_envelope`] returns.
///
/// Decoding picks the payload variant from `message_type`
/// (see [`Payload::from_wire`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireEnvelope")]
pub struct Envelope {
    /// Fresh v4 UUID per envelope, never reused.
    pub message_id: Uuid,
    /// Dotted category such as `backtest.request`. Informational only; the
    /// broker routes on the routing key, not on this field.
    pub message_type: String,
    /// Creation instant, server clock.
    pub timestamp: DateTime<Utc>,
    /// Caller-supplied or freshly generated; never empty.
    pub correlation_id: String,
    pub payload: Payload,
}

/// Envelope as read off the wire, payload still untyped.
#[derive(Deserialize)]
struct WireEnvelope {
    message_id: Uuid,
    message_type: String,
    timestamp: DateTime<Utc>,
    correlation_id: String,
    payload: serde_json::Value,
}

impl From<WireEnvelope> for Envelope {
    fn from(w: WireEnvelope) -> Self {
        let payload = Payload::from_wire(&w.message_type, w.payload);
        Envelope {
            message_id: w.message_id,
            message_type: w.message_type,
            timestamp: w.timestamp,
            correlation_id: w.correlation_id,
            payload,
        }
    }
}

impl Envelope {
    /// JSON body as written to the broker.
    pub fn to_json_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Wrap `payload` in a new envelope.
///
/// `correlation_id` is kept when it is present and not blank; otherwise a new
/// random identifier is generated, so callers cannot force an empty one.
pub fn build_envelope(
    message_type: impl Into<String>,
    payload: Payload,
    correlation_id: Option<String>,
) -> Envelope {
    let correlation_id = correlation_id
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    Envelope {
        message_id: Uuid::new_v4(),
        message_type: message_type.into(),
        timestamp: Utc::now(),
        correlation_id,
        payload,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::DataRequestPayload;
    use serde_json::json;

    fn custom(v: serde_json::Value) -> Payload {
        Payload::Custom(v)
    }

    #[test]
    fn message_ids_are_unique_per_envelope() {
        let a = build_envelope("custom", custom(json!({})), None);
        let b = build_envelope("custom", custom(json!({})), None);
        assert_ne!(a.message_id, b.message_id);
    }

    #[test]
    fn supplied_correlation_id_is_kept() {
        let env = build_envelope("custom", custom(json!({})), Some("corr-42".to_string()));
        assert_eq!(env.correlation_id, "corr-42");
    }

    #[test]
    fn blank_correlation_id_is_replaced() {
        for supplied in [None, Some(String::new()), Some("   ".to_string())] {
            let env = build_envelope("custom", custom(json!({})), supplied);
            assert!(!env.correlation_id.trim().is_empty());
            assert!(Uuid::parse_str(&env.correlation_id).is_ok());
        }
    }

    #[test]
    fn json_shape_matches_wire_format() {
        let env = build_envelope("custom", custom(json!({"x": 1})), Some("c".to_string()));
        let v: serde_json::Value = serde_json::from_slice(&env.to_json_bytes().unwrap()).unwrap();

        assert_eq!(v["message_id"], env.message_id.to_string());
        assert_eq!(v["message_type"], "custom");
        assert_eq!(v["correlation_id"], "c");
        assert_eq!(v["payload"], json!({"x": 1}));
        let ts = v["timestamp"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(ts).is_ok(), "timestamp not ISO-8601: {ts}");
    }

    #[test]
    fn custom_payload_shaped_like_data_request_decodes_unchanged() {
        let body = json!({
            "instrument_id": "a",
            "start_date": "b",
            "end_date": "c",
            "frequency": "d",
            "extra": 1
        });
        let env = build_envelope("custom", custom(body.clone()), None);

        let back: Envelope = serde_json::from_slice(&env.to_json_bytes().unwrap()).unwrap();
        assert_eq!(back.payload, Payload::Custom(body));
        assert_eq!(back, env);
    }

    #[test]
    fn templated_type_with_extra_keys_stays_custom() {
        let body = json!({
            "instrument_id": "AAPL",
            "start_date": "2024-01-01",
            "end_date": "2024-06-01",
            "frequency": "1d",
            "note": "from the custom endpoint"
        });
        let env = build_envelope("data.request", custom(body.clone()), None);

        let back: Envelope = serde_json::from_slice(&env.to_json_bytes().unwrap()).unwrap();
        assert_eq!(back.payload, Payload::Custom(body));
    }

    #[test]
    fn templated_envelope_decodes_to_typed_variant() {
        let env = build_envelope(
            "data.request",
            Payload::DataRequest(DataRequestPayload {
                instrument_id: "AAPL".to_string(),
                start_date: "2024-01-01".to_string(),
                end_date: "2024-06-01".to_string(),
                frequency: "1d".to_string(),
            }),
            None,
        );

        let back: Envelope = serde_json::from_slice(&env.to_json_bytes().unwrap()).unwrap();
        assert!(matches!(back.payload, Payload::DataRequest(_)));
        assert_eq!(back, env);
    }
}
