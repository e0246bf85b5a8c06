//! Broker side of the gateway: exchange/queue topology, the connection seam,
//! and the fire-and-forget publisher.
//!
//! Handlers never talk to lapin directly. They hold an
//! `Arc<dyn BrokerConnector>`, open one [`BrokerSession`] per request, publish,
//! and close it. [`AmqpConnector`] is the production implementation;
//! `MemoryConnector` (feature `testkit`) records everything in memory.

pub mod amqp;
pub mod error;
#[cfg(any(test, feature = "testkit"))]
pub mod memory;
pub mod publisher;
pub mod topology;

pub use amqp::{amqp_uri, AmqpConnector};
pub use error::BrokerError;
#[cfg(any(test, feature = "testkit"))]
pub use memory::{MemoryConnector, PublishedMessage};
pub use publisher::{
    publish, publish_with_fresh_connection, wire_properties, BrokerConnector, BrokerSession,
    WireProperties,
};
pub use topology::{topic_matches, Topology};
