//! Connection seam and the fire-and-forget publish contract.
//!
//! # Contract
//! - One session per request: `open` (connect, channel, ensure topology),
//!   publish once, `close` on every exit path.
//! - [`publish`] never propagates: any transport error becomes `false` and an
//!   `error!` log line.
//! - No publisher confirms, no retry, no backpressure. Delivery guarantees are
//!   whatever persistent delivery mode gives once the broker has the message.

use async_trait::async_trait;
use bgw_schemas::Envelope;
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::BrokerError;

/// AMQP persistent delivery mode.
pub const DELIVERY_MODE_PERSISTENT: u8 = 2;
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Acquires a fresh broker session. Shared across handlers.
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    /// Connect, open a channel and ensure the topology on it.
    async fn open(&self) -> Result<Box<dyn BrokerSession>, BrokerError>;
}

/// A single connection + channel, owned by one request.
#[async_trait]
pub trait BrokerSession: Send {
    async fn publish(&mut self, routing_key: &str, envelope: &Envelope)
        -> Result<(), BrokerError>;

    async fn close(self: Box<Self>) -> Result<(), BrokerError>;
}

/// Message properties written alongside the JSON body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WireProperties {
    pub delivery_mode: u8,
    pub content_type: &'static str,
    pub message_id: String,
    pub correlation_id: String,
    /// Seconds since the Unix epoch at publish time.
    pub timestamp: u64,
}

/// Properties for `envelope`, stamped with the current time.
pub fn wire_properties(envelope: &Envelope) -> WireProperties {
    WireProperties {
        delivery_mode: DELIVERY_MODE_PERSISTENT,
        content_type: CONTENT_TYPE_JSON,
        message_id: envelope.message_id.to_string(),
        correlation_id: envelope.correlation_id.clone(),
        timestamp: Utc::now().timestamp().max(0) as u64,
    }
}

/// Publish `envelope` under `routing_key`. Returns `true` on success.
pub async fn publish(
    session: &mut dyn BrokerSession,
    routing_key: &str,
    envelope: &Envelope,
) -> bool {
    match session.publish(routing_key, envelope).await {
        Ok(()) => {
            info!(
                routing_key,
                message_id = %envelope.message_id,
                message_type = %envelope.message_type,
                "message published"
            );
            true
        }
        Err(err) => {
            error!(
                routing_key,
                message_id = %envelope.message_id,
                error = %err,
                "publish failed"
            );
            false
        }
    }
}

/// Open a session, publish once, close it.
///
/// `Err` only when the session could not be opened. Publish failures come
/// back as `Ok(false)`. Close failures are logged and do not change the
/// outcome, since the message was already handed over (or not).
pub async fn publish_with_fresh_connection(
    connector: &dyn BrokerConnector,
    routing_key: &str,
    envelope: &Envelope,
) -> Result<bool, BrokerError> {
    let mut session = connector.open().await?;
    let published = publish(session.as_mut(), routing_key, envelope).await;
    if let Err(err) = session.close().await {
        warn!(error = %err, "closing broker session failed");
    }
    Ok(published)
}
