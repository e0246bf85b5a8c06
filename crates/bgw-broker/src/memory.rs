//! In-memory broker double.
//!
//! Behaves like a single broker process shared by every session opened from
//! the same `MemoryConnector` (clones share state):
//! - each `open` declares the topology; an identical re-declaration is a
//!   no-op, a different one is a `TopologyConflict`,
//! - each publish is recorded with its wire properties and the queues the
//!   topology would route it to (empty = dropped by a real broker),
//! - open and publish failures can be switched on to exercise error paths.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bgw_schemas::Envelope;

use crate::error::BrokerError;
use crate::publisher::{wire_properties, BrokerConnector, BrokerSession, WireProperties};
use crate::topology::Topology;

#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub routing_key: String,
    pub envelope: Envelope,
    /// Exact bytes that would go on the wire.
    pub body: Vec<u8>,
    pub properties: WireProperties,
    pub routed_to: Vec<String>,
}

#[derive(Debug, Default)]
struct MemoryBroker {
    declared: Option<Topology>,
    declarations: usize,
    opened: usize,
    closed: usize,
    published: Vec<PublishedMessage>,
    fail_open: bool,
    fail_publish: bool,
}

#[derive(Debug, Clone)]
pub struct MemoryConnector {
    topology: Topology,
    inner: Arc<Mutex<MemoryBroker>>,
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::with_topology(Topology::standard())
    }

    /// Sessions from this connector will declare `topology`.
    pub fn with_topology(topology: Topology) -> Self {
        Self {
            topology,
            inner: Arc::new(Mutex::new(MemoryBroker::default())),
        }
    }

    /// A connector declaring `topology` against the same broker state as
    /// `self`. Used to simulate a second process with different settings.
    pub fn sharing_broker(&self, topology: Topology) -> Self {
        Self {
            topology,
            inner: Arc::clone(&self.inner),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryBroker> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn fail_open(&self, on: bool) {
        self.lock().fail_open = on;
    }

    pub fn fail_publish(&self, on: bool) {
        self.lock().fail_publish = on;
    }

    pub fn opened(&self) -> usize {
        self.lock().opened
    }

    pub fn closed(&self) -> usize {
        self.lock().closed
    }

    pub fn declarations(&self) -> usize {
        self.lock().declarations
    }

    pub fn declared(&self) -> Option<Topology> {
        self.lock().declared.clone()
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.lock().published.clone()
    }

    pub fn last_published(&self) -> Option<PublishedMessage> {
        self.lock().published.last().cloned()
    }
}

#[async_trait]
impl BrokerConnector for MemoryConnector {
    async fn open(&self) -> Result<Box<dyn BrokerSession>, BrokerError> {
        let mut b = self.lock();
        if b.fail_open {
            return Err(BrokerError::Unavailable("connection refused".to_string()));
        }

        match &b.declared {
            Some(existing) if existing != &self.topology => {
                return Err(BrokerError::TopologyConflict(format!(
                    "exchange {} already declared with different parameters",
                    existing.exchange.name
                )));
            }
            Some(_) => {}
            None => b.declared = Some(self.topology.clone()),
        }
        b.declarations += 1;
        b.opened += 1;

        Ok(Box::new(MemorySession {
            topology: self.topology.clone(),
            inner: Arc::clone(&self.inner),
        }))
    }
}

struct MemorySession {
    topology: Topology,
    inner: Arc<Mutex<MemoryBroker>>,
}

#[async_trait]
impl BrokerSession for MemorySession {
    async fn publish(
        &mut self,
        routing_key: &str,
        envelope: &Envelope,
    ) -> Result<(), BrokerError> {
        let body = envelope.to_json_bytes()?;
        let mut b = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        if b.fail_publish {
            return Err(BrokerError::Unavailable("channel closed".to_string()));
        }
        b.published.push(PublishedMessage {
            routing_key: routing_key.to_string(),
            envelope: envelope.clone(),
            body,
            properties: wire_properties(envelope),
            routed_to: self
                .topology
                .matching_queues(routing_key)
                .into_iter()
                .map(str::to_string)
                .collect(),
        });
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), BrokerError> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner()).closed += 1;
        Ok(())
    }
}
