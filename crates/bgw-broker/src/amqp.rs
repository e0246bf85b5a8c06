//! lapin-backed connector: one AMQP connection and channel per session.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use bgw_config::BrokerConfig;
use bgw_schemas::Envelope;
use lapin::{
    options::BasicPublishOptions, uri::AMQPUri, BasicProperties, Channel, Connection,
    ConnectionProperties,
};
use tracing::{debug, error, warn};

use crate::error::BrokerError;
use crate::publisher::{wire_properties, BrokerConnector, BrokerSession, WireProperties};
use crate::topology::{ensure_topology, Topology};

/// Connection URI for `cfg`, heartbeat included. Built field by field so
/// credentials and vhost never need percent-encoding.
pub fn amqp_uri(cfg: &BrokerConfig) -> AMQPUri {
    let mut uri = AMQPUri::default();
    uri.authority.host = cfg.host.clone();
    uri.authority.port = cfg.port;
    uri.authority.userinfo.username = cfg.username.clone();
    uri.authority.userinfo.password = cfg.password.clone();
    uri.vhost = cfg.vhost.clone();
    uri.query.heartbeat = Some(cfg.heartbeat_secs);
    uri
}

fn to_basic_properties(p: WireProperties) -> BasicProperties {
    BasicProperties::default()
        .with_delivery_mode(p.delivery_mode)
        .with_content_type(p.content_type.into())
        .with_message_id(p.message_id.into())
        .with_correlation_id(p.correlation_id.into())
        .with_timestamp(p.timestamp)
}

#[derive(Debug, Clone)]
pub struct AmqpConnector {
    config: BrokerConfig,
    topology: Topology,
}

impl AmqpConnector {
    pub fn new(config: BrokerConfig, topology: Topology) -> Self {
        Self { config, topology }
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    fn connection_properties(&self) -> ConnectionProperties {
        ConnectionProperties::default()
            .with_connection_name(self.config.connection_name.clone().into())
            .with_executor(tokio_executor_trait::Tokio::current())
            .with_reactor(tokio_reactor_trait::Tokio)
    }
}

#[async_trait]
impl BrokerConnector for AmqpConnector {
    async fn open(&self) -> Result<Box<dyn BrokerSession>, BrokerError> {
        let target = self.config.display_target();
        debug!(%target, "connecting to broker");

        let connection = Connection::connect_uri(amqp_uri(&self.config), self.connection_properties())
            .await
            .map_err(|source| BrokerError::Connect {
                target: target.clone(),
                source,
            })?;

        let channel = match connection.create_channel().await {
            Ok(ch) => ch,
            Err(err) => {
                close_after_failed_open(&connection, "channel open failed").await;
                return Err(BrokerError::Channel(err));
            }
        };

        if let Err(err) = ensure_topology(&channel, &self.topology).await {
            error!(%target, error = %err, "topology declaration failed");
            close_after_failed_open(&connection, "topology declaration failed").await;
            return Err(err);
        }

        Ok(Box::new(AmqpSession {
            connection,
            channel,
            exchange: self.topology.exchange.name.clone(),
            blocked_timeout: Duration::from_secs(self.config.blocked_connection_timeout_secs),
        }))
    }
}

async fn close_after_failed_open(connection: &Connection, reason: &str) {
    if let Err(err) = connection.close(200, reason).await {
        warn!(error = %err, reason, "closing broker connection failed");
    }
}

/// Bound a publish by `limit`. A broker applying flow control never
/// completes the send; expiry becomes [`BrokerError::Blocked`].
async fn within_blocked_timeout<T, F>(limit: Duration, send: F) -> Result<T, BrokerError>
where
    F: Future<Output = Result<T, lapin::Error>>,
{
    match tokio::time::timeout(limit, send).await {
        Ok(Ok(v)) => Ok(v),
        Ok(Err(err)) => Err(BrokerError::Publish(err)),
        Err(_) => Err(BrokerError::Blocked(limit)),
    }
}

struct AmqpSession {
    connection: Connection,
    channel: Channel,
    exchange: String,
    blocked_timeout: Duration,
}

#[async_trait]
impl BrokerSession for AmqpSession {
    async fn publish(
        &mut self,
        routing_key: &str,
        envelope: &Envelope,
    ) -> Result<(), BrokerError> {
        let body = envelope.to_json_bytes()?;
        let properties = to_basic_properties(wire_properties(envelope));

        let send = self.channel.basic_publish(
            &self.exchange,
            routing_key,
            BasicPublishOptions::default(),
            &body,
            properties,
        );

        // The returned confirm is dropped: no confirm mode, fire-and-forget.
        within_blocked_timeout(self.blocked_timeout, send)
            .await
            .map(|_confirm| ())
    }

    async fn close(self: Box<Self>) -> Result<(), BrokerError> {
        // Closing the connection also closes its channels; only report the
        // channel error if the connection close itself succeeded.
        let channel_result = self.channel.close(200, "OK").await;
        self.connection
            .close(200, "OK")
            .await
            .map_err(BrokerError::Close)?;
        channel_result.map_err(BrokerError::Close)
    }
}
