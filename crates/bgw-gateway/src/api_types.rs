//! Response bodies returned by the gateway endpoints.
//!
//! Request bodies are read as raw JSON objects in `extract.rs`; only the
//! replies are typed. Deserialize is derived so clients and tests can decode
//! them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always "ok" while the process is serving.
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub service: String,
    pub version: String,
}

// ---------------------------------------------------------------------------
// Errors (400 / 500)
// ---------------------------------------------------------------------------

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ---------------------------------------------------------------------------
// POST /api/backtest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestAccepted {
    pub message: String,
    pub message_id: Uuid,
    pub correlation_id: String,
}

// ---------------------------------------------------------------------------
// POST /api/strategy/upload
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyAccepted {
    pub message: String,
    pub strategy_id: String,
    pub message_id: Uuid,
}

// ---------------------------------------------------------------------------
// POST /api/data/request
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataAccepted {
    pub message: String,
    pub message_id: Uuid,
}

// ---------------------------------------------------------------------------
// POST /api/file/upload
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAccepted {
    pub message: String,
    pub file_name: String,
    /// Byte length of the decoded file content.
    pub file_size: u64,
    pub message_id: Uuid,
}

// ---------------------------------------------------------------------------
// POST /api/message/custom
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomAccepted {
    pub message: String,
    pub message_id: Uuid,
    pub routing_key: String,
    /// Supplied by the caller, or generated when absent.
    pub correlation_id: String,
}
