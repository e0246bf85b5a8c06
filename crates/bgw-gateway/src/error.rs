//! Request failures and their HTTP rendering.
//!
//! Every variant renders as `{"error": "<message>"}`. Client mistakes are
//! 400. Broker failures are 500 with a generic message; the detail goes to
//! the log, not to the caller.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bgw_schemas::TemplateError;
use tracing::{debug, error};

use crate::api_types::ErrorResponse;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("invalid field {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("malformed request body: {0}")]
    MalformedBody(String),

    #[error("invalid request format: send JSON or a multipart file")]
    UnsupportedFormat,

    #[error("no file found in request")]
    MissingFile,

    #[error("no file selected")]
    NoFileSelected,

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("routing key '{0}' matches no queue binding")]
    UnroutableKey(String),

    #[error("failed to send {0}")]
    PublishFailed(&'static str),

    #[error("{0}")]
    Internal(String),
}

impl GatewayError {
    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        GatewayError::InvalidField {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::MissingField(_)
            | GatewayError::InvalidField { .. }
            | GatewayError::MalformedBody(_)
            | GatewayError::UnsupportedFormat
            | GatewayError::MissingFile
            | GatewayError::NoFileSelected
            | GatewayError::Template(_)
            | GatewayError::UnroutableKey(_) => StatusCode::BAD_REQUEST,
            GatewayError::PublishFailed(_) | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        } else {
            debug!(error = %self, "request rejected");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_400_and_broker_errors_500() {
        assert_eq!(
            GatewayError::MissingField("strategy_id".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(GatewayError::MissingFile.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            GatewayError::PublishFailed("backtest request").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn missing_field_message_names_the_field() {
        let msg = GatewayError::MissingField("end_date".into()).to_string();
        assert_eq!(msg, "missing required field: end_date");
    }
}
