//! Body parsing and field validation shared by the handlers.
//!
//! Handlers read raw bodies instead of using axum's `Json` extractor so that
//! every malformed body is answered with the gateway's own 400 error shape.

use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Request},
    http::{header::CONTENT_TYPE, HeaderMap},
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::GatewayError;

/// Largest accepted request body (JSON or multipart).
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

pub type JsonObject = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Json,
    Multipart,
    Other,
}

/// Classify by `Content-Type`. `application/*+json` counts as JSON.
pub fn body_kind(headers: &HeaderMap) -> BodyKind {
    let Some(ct) = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return BodyKind::Other;
    };
    let mime = ct
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if mime == "multipart/form-data" {
        BodyKind::Multipart
    } else if mime == "application/json"
        || (mime.starts_with("application/") && mime.ends_with("+json"))
    {
        BodyKind::Json
    } else {
        BodyKind::Other
    }
}

pub fn parse_json_object(body: &[u8]) -> Result<JsonObject, GatewayError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| GatewayError::MalformedBody(format!("invalid JSON: {e}")))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(GatewayError::MalformedBody(
            "expected a JSON object".to_string(),
        )),
    }
}

/// Fail on the first field in `fields` that is absent. A present `null`
/// counts as present; type checks happen when the field is read.
pub fn require_fields(obj: &JsonObject, fields: &[&str]) -> Result<(), GatewayError> {
    match fields.iter().find(|f| !obj.contains_key(**f)) {
        Some(missing) => Err(GatewayError::MissingField(missing.to_string())),
        None => Ok(()),
    }
}

/// Read an identifier-like field: strings as-is, numbers stringified.
pub fn string_field(obj: &JsonObject, name: &str) -> Result<String, GatewayError> {
    match obj.get(name) {
        None => Err(GatewayError::MissingField(name.to_string())),
        Some(v) => as_text(v).ok_or_else(|| GatewayError::invalid(name, "expected a string")),
    }
}

/// Like [`string_field`], but absent or `null` yields `None`.
pub fn optional_string(obj: &JsonObject, name: &str) -> Result<Option<String>, GatewayError> {
    match obj.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => as_text(v)
            .map(Some)
            .ok_or_else(|| GatewayError::invalid(name, "expected a string")),
    }
}

pub fn typed_field<T: DeserializeOwned>(obj: &JsonObject, name: &str) -> Result<T, GatewayError> {
    let v = obj
        .get(name)
        .ok_or_else(|| GatewayError::MissingField(name.to_string()))?;
    serde_json::from_value(v.clone()).map_err(|e| GatewayError::invalid(name, e.to_string()))
}

fn as_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub async fn read_body(req: Request) -> Result<Bytes, GatewayError> {
    axum::body::to_bytes(req.into_body(), MAX_BODY_BYTES)
        .await
        .map_err(|e| GatewayError::MalformedBody(e.to_string()))
}

pub async fn read_json_object(req: Request) -> Result<JsonObject, GatewayError> {
    let body = read_body(req).await?;
    parse_json_object(&body)
}

// ---------------------------------------------------------------------------
// multipart/form-data
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Client-supplied file name; empty when the part carried none.
    pub file_name: String,
    pub bytes: Bytes,
}

/// The `file` part plus every other text field. First occurrence wins.
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub file: Option<UploadedFile>,
    pub fields: HashMap<String, String>,
}

impl MultipartForm {
    /// Text field value, `None` when absent.
    pub fn field(&self, name: &str) -> Option<String> {
        self.fields.get(name).cloned()
    }
}

pub async fn read_multipart(req: Request) -> Result<MultipartForm, GatewayError> {
    let mut multipart = Multipart::from_request(req, &())
        .await
        .map_err(|e| GatewayError::MalformedBody(e.body_text()))?;

    let mut form = MultipartForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| GatewayError::MalformedBody(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == "file" && form.file.is_none() {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| GatewayError::MalformedBody(e.body_text()))?;
            form.file = Some(UploadedFile { file_name, bytes });
        } else {
            let text = field
                .text()
                .await
                .map_err(|e| GatewayError::MalformedBody(e.body_text()))?;
            form.fields.entry(name).or_insert(text);
        }
    }
    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde_json::json;

    fn obj(v: Value) -> JsonObject {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn body_kind_reads_mime_essence() {
        let mut h = HeaderMap::new();
        assert_eq!(body_kind(&h), BodyKind::Other);

        h.insert(CONTENT_TYPE, HeaderValue::from_static("application/json; charset=utf-8"));
        assert_eq!(body_kind(&h), BodyKind::Json);

        h.insert(CONTENT_TYPE, HeaderValue::from_static("application/vnd.api+json"));
        assert_eq!(body_kind(&h), BodyKind::Json);

        h.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("multipart/form-data; boundary=xyz"),
        );
        assert_eq!(body_kind(&h), BodyKind::Multipart);

        h.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        assert_eq!(body_kind(&h), BodyKind::Other);
    }

    #[test]
    fn require_fields_fails_fast_in_order() {
        let o = obj(json!({"a": 1}));
        match require_fields(&o, &["a", "b", "c"]) {
            Err(GatewayError::MissingField(f)) => assert_eq!(f, "b"),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(require_fields(&o, &["a"]).is_ok());
    }

    #[test]
    fn null_counts_as_present_but_fails_type_check() {
        let o = obj(json!({"a": null}));
        assert!(require_fields(&o, &["a"]).is_ok());
        assert!(matches!(
            string_field(&o, "a"),
            Err(GatewayError::InvalidField { .. })
        ));
        assert_eq!(optional_string(&o, "a").unwrap(), None);
    }

    #[test]
    fn numbers_are_accepted_as_identifiers() {
        let o = obj(json!({"id": 42}));
        assert_eq!(string_field(&o, "id").unwrap(), "42");
    }

    #[test]
    fn non_object_json_is_malformed() {
        assert!(matches!(
            parse_json_object(b"[1,2]"),
            Err(GatewayError::MalformedBody(_))
        ));
        assert!(matches!(
            parse_json_object(b"{nope"),
            Err(GatewayError::MalformedBody(_))
        ));
    }
}
