//! Axum router and all HTTP handlers for bgw-gateway.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! tracing/CORS layers.  Every POST handler follows the same one-shot flow:
//! validate fields, build the envelope via a template, open a fresh broker
//! session, publish under the message type's routing key, close, respond.

use std::{any::Any, sync::Arc};

use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bgw_broker::publish_with_fresh_connection;
use bgw_config::UnroutablePolicy;
use bgw_schemas::{
    message_types,
    templates::{self, BacktestRequest, FileUpload},
    Envelope, Payload,
};
use chrono::Utc;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    api_types::{
        BacktestAccepted, CustomAccepted, DataAccepted, ErrorResponse, FileAccepted,
        HealthResponse, StrategyAccepted,
    },
    error::GatewayError,
    extract::{
        body_kind, optional_string, read_json_object, read_multipart, require_fields,
        string_field, typed_field, BodyKind, MAX_BODY_BYTES,
    },
    state::AppState,
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Panic containment is applied here so that a panicking handler still
/// answers with a JSON 500. Tracing and CORS are **not** applied here;
/// `main.rs` attaches them so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .route("/api/backtest", post(backtest))
        .route("/api/strategy/upload", post(strategy_upload))
        .route("/api/data/request", post(data_request))
        .route("/api/file/upload", post(file_upload))
        .route("/api/message/custom", post(custom_message))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state);
    catch_panics(router)
}

/// Convert handler panics into `500 {"error": ...}` instead of dropping the
/// connection.
pub fn catch_panics(router: Router) -> Router {
    router.layer(CatchPanicLayer::custom(panic_response))
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    error!(%detail, "handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse { error: detail }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Publish step shared by all POST handlers
// ---------------------------------------------------------------------------

/// Publish `envelope` on a fresh connection.
///
/// `caller_key` marks a routing key chosen by the client; only those can be
/// refused under [`UnroutablePolicy::Reject`]. Fixed template keys are
/// warned about at most.
async fn dispatch(
    st: &AppState,
    routing_key: &str,
    envelope: &Envelope,
    what: &'static str,
    caller_key: bool,
) -> Result<(), GatewayError> {
    if !st.topology.is_routable(routing_key) {
        if caller_key && st.unroutable_policy == UnroutablePolicy::Reject {
            return Err(GatewayError::UnroutableKey(routing_key.to_string()));
        }
        warn!(
            routing_key,
            exchange = %st.topology.exchange.name,
            "routing key matches no binding; broker will drop the message"
        );
    }

    match publish_with_fresh_connection(st.connector.as_ref(), routing_key, envelope).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(GatewayError::PublishFailed(what)),
        Err(err) => {
            error!(routing_key, error = %err, "broker connection failed");
            Err(GatewayError::PublishFailed(what))
        }
    }
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
        }),
    )
}

// ---------------------------------------------------------------------------
// POST /api/backtest
// ---------------------------------------------------------------------------

pub(crate) async fn backtest(
    State(st): State<Arc<AppState>>,
    req: Request,
) -> Result<Json<BacktestAccepted>, GatewayError> {
    let body = read_json_object(req).await?;
    require_fields(
        &body,
        &[
            "strategy_id",
            "start_date",
            "end_date",
            "initial_capital",
            "instruments",
        ],
    )?;

    let envelope = templates::backtest_request(
        BacktestRequest {
            strategy_id: string_field(&body, "strategy_id")?,
            start_date: string_field(&body, "start_date")?,
            end_date: string_field(&body, "end_date")?,
            initial_capital: typed_field(&body, "initial_capital")?,
            instruments: typed_field(&body, "instruments")?,
        },
        &st.defaults,
    );

    dispatch(
        &st,
        message_types::BACKTEST_REQUEST,
        &envelope,
        "backtest request",
        false,
    )
    .await?;

    info!(message_id = %envelope.message_id, "backtest request accepted");
    Ok(Json(BacktestAccepted {
        message: "backtest request sent".to_string(),
        message_id: envelope.message_id,
        correlation_id: envelope.correlation_id,
    }))
}

// ---------------------------------------------------------------------------
// POST /api/strategy/upload
// ---------------------------------------------------------------------------

/// Accepts a multipart `file` (code = file contents) or a JSON body with
/// `code`. Missing ids are generated; a missing name falls back to the file
/// name (multipart) or `Strategy_<id>` (JSON).
pub(crate) async fn strategy_upload(
    State(st): State<Arc<AppState>>,
    req: Request,
) -> Result<Json<StrategyAccepted>, GatewayError> {
    let (strategy_id, name, code, version) = match body_kind(req.headers()) {
        BodyKind::Multipart => {
            let form = read_multipart(req).await?;
            let file = form.file.as_ref().ok_or(GatewayError::MissingFile)?;
            let code = String::from_utf8(file.bytes.to_vec())
                .map_err(|_| GatewayError::invalid("file", "strategy file is not valid UTF-8"))?;

            let strategy_id = form
                .field("strategy_id")
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            let name = form
                .field("strategy_name")
                .or_else(|| Some(file.file_name.clone()).filter(|n| !n.is_empty()))
                .unwrap_or_else(|| format!("Strategy_{strategy_id}"));
            (strategy_id, name, code, form.field("version"))
        }
        BodyKind::Json => {
            let body = read_json_object(req).await?;
            require_fields(&body, &["code"])?;

            let strategy_id = optional_string(&body, "strategy_id")?
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            let name = optional_string(&body, "strategy_name")?
                .unwrap_or_else(|| format!("Strategy_{strategy_id}"));
            let code = string_field(&body, "code")?;
            let version = optional_string(&body, "version")?;
            (strategy_id, name, code, version)
        }
        BodyKind::Other => return Err(GatewayError::UnsupportedFormat),
    };

    let envelope =
        templates::strategy_upload(strategy_id.clone(), name, code, version, &st.defaults);

    dispatch(
        &st,
        message_types::STRATEGY_UPLOAD,
        &envelope,
        "strategy upload",
        false,
    )
    .await?;

    info!(%strategy_id, message_id = %envelope.message_id, "strategy upload accepted");
    Ok(Json(StrategyAccepted {
        message: "strategy uploaded".to_string(),
        strategy_id,
        message_id: envelope.message_id,
    }))
}

// ---------------------------------------------------------------------------
// POST /api/data/request
// ---------------------------------------------------------------------------

pub(crate) async fn data_request(
    State(st): State<Arc<AppState>>,
    req: Request,
) -> Result<Json<DataAccepted>, GatewayError> {
    let body = read_json_object(req).await?;
    require_fields(&body, &["instrument_id", "start_date", "end_date"])?;

    let envelope = templates::data_request(
        string_field(&body, "instrument_id")?,
        string_field(&body, "start_date")?,
        string_field(&body, "end_date")?,
        optional_string(&body, "frequency")?,
        &st.defaults,
    );

    dispatch(
        &st,
        message_types::DATA_REQUEST,
        &envelope,
        "data request",
        false,
    )
    .await?;

    info!(message_id = %envelope.message_id, "data request accepted");
    Ok(Json(DataAccepted {
        message: "data request sent".to_string(),
        message_id: envelope.message_id,
    }))
}

// ---------------------------------------------------------------------------
// POST /api/file/upload
// ---------------------------------------------------------------------------

/// Multipart `file` (+ optional `file_type`, `related_id`), or JSON with the
/// content already base64-encoded in `file_content`.
pub(crate) async fn file_upload(
    State(st): State<Arc<AppState>>,
    req: Request,
) -> Result<Json<FileAccepted>, GatewayError> {
    let upload = match body_kind(req.headers()) {
        BodyKind::Multipart => {
            let form = read_multipart(req).await?;
            let file = form.file.as_ref().ok_or(GatewayError::MissingFile)?;
            if file.file_name.is_empty() {
                return Err(GatewayError::NoFileSelected);
            }
            FileUpload {
                file_name: file.file_name.clone(),
                file_content_base64: templates::encode_file_content(&file.bytes),
                file_type: form.field("file_type"),
                related_id: form.field("related_id"),
            }
        }
        BodyKind::Json => {
            let body = read_json_object(req).await?;
            require_fields(&body, &["file_name", "file_content"])?;
            let file_name = string_field(&body, "file_name")?;
            if file_name.is_empty() {
                return Err(GatewayError::NoFileSelected);
            }
            FileUpload {
                file_name,
                file_content_base64: string_field(&body, "file_content")?,
                file_type: optional_string(&body, "file_type")?,
                related_id: optional_string(&body, "related_id")?,
            }
        }
        BodyKind::Other => return Err(GatewayError::MissingFile),
    };

    let envelope = templates::file_upload(upload, &st.defaults)?;
    let (file_name, file_size) = match &envelope.payload {
        Payload::FileUpload(p) => (p.file_name.clone(), p.file_size),
        _ => {
            return Err(GatewayError::Internal(
                "file upload template produced a foreign payload".to_string(),
            ))
        }
    };

    dispatch(
        &st,
        message_types::FILE_UPLOAD,
        &envelope,
        "file upload",
        false,
    )
    .await?;

    info!(%file_name, file_size, message_id = %envelope.message_id, "file upload accepted");
    Ok(Json(FileAccepted {
        message: "file uploaded".to_string(),
        file_name,
        file_size,
        message_id: envelope.message_id,
    }))
}

// ---------------------------------------------------------------------------
// POST /api/message/custom
// ---------------------------------------------------------------------------

pub(crate) async fn custom_message(
    State(st): State<Arc<AppState>>,
    req: Request,
) -> Result<Json<CustomAccepted>, GatewayError> {
    let body = read_json_object(req).await?;
    require_fields(&body, &["routing_key", "payload"])?;

    let routing_key = string_field(&body, "routing_key")?;
    if routing_key.trim().is_empty() {
        return Err(GatewayError::invalid("routing_key", "must not be empty"));
    }
    let payload = body.get("payload").cloned().unwrap_or_default();

    let envelope = templates::custom(
        optional_string(&body, "message_type")?,
        payload,
        optional_string(&body, "correlation_id")?,
    );

    dispatch(&st, &routing_key, &envelope, "custom message", true).await?;

    info!(%routing_key, message_id = %envelope.message_id, "custom message accepted");
    Ok(Json(CustomAccepted {
        message: "custom message sent".to_string(),
        message_id: envelope.message_id,
        routing_key,
        correlation_id: envelope.correlation_id,
    }))
}
