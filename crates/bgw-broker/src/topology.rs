//! Exchange, queues and bindings the gateway publishes into.
//!
//! # Invariants
//! - The plan is fixed: one durable topic exchange, three durable queues,
//!   one binding each. [`Topology::standard`] is the only production plan.
//! - Declaring it again with the same parameters is a broker-side no-op.
//!   Declaring it with different durability is a channel error and is
//!   surfaced, never swallowed.
//! - A routing key matching no binding pattern is dropped by the broker.
//!   [`Topology::is_routable`] lets callers detect that before publishing.

use lapin::{
    options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions},
    types::FieldTable,
    Channel, ExchangeKind,
};
use serde::Serialize;
use tracing::debug;

use crate::error::BrokerError;

pub const EXCHANGE_NAME: &str = "backtest_exchange";
pub const BACKTEST_QUEUE: &str = "backtest_queue";
pub const STRATEGY_QUEUE: &str = "strategy_queue";
pub const DATA_QUEUE: &str = "data_queue";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExchangeSpec {
    pub name: String,
    /// Always `topic` for this gateway.
    pub kind: String,
    pub durable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueSpec {
    pub name: String,
    pub durable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindingSpec {
    pub queue: String,
    pub pattern: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Topology {
    pub exchange: ExchangeSpec,
    pub queues: Vec<QueueSpec>,
    pub bindings: Vec<BindingSpec>,
}

impl Default for Topology {
    fn default() -> Self {
        Self::standard()
    }
}

impl Topology {
    pub fn standard() -> Self {
        let queue = |name: &str| QueueSpec {
            name: name.to_string(),
            durable: true,
        };
        let bind = |queue: &str, pattern: &str| BindingSpec {
            queue: queue.to_string(),
            pattern: pattern.to_string(),
        };

        Self {
            exchange: ExchangeSpec {
                name: EXCHANGE_NAME.to_string(),
                kind: "topic".to_string(),
                durable: true,
            },
            queues: vec![queue(BACKTEST_QUEUE), queue(STRATEGY_QUEUE), queue(DATA_QUEUE)],
            bindings: vec![
                bind(BACKTEST_QUEUE, "backtest.*"),
                bind(STRATEGY_QUEUE, "strategy.*"),
                bind(DATA_QUEUE, "data.*"),
            ],
        }
    }

    /// Queues that would receive a message published under `routing_key`,
    /// in binding order, without duplicates.
    pub fn matching_queues(&self, routing_key: &str) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for b in &self.bindings {
            if topic_matches(&b.pattern, routing_key) && !out.contains(&b.queue.as_str()) {
                out.push(b.queue.as_str());
            }
        }
        out
    }

    pub fn is_routable(&self, routing_key: &str) -> bool {
        !self.matching_queues(routing_key).is_empty()
    }
}

/// AMQP topic matching: words are `.`-separated, `*` matches exactly one
/// word and `#` matches zero or more.
pub fn topic_matches(pattern: &str, routing_key: &str) -> bool {
    let p: Vec<&str> = pattern.split('.').collect();
    let k: Vec<&str> = routing_key.split('.').collect();
    match_words(&p, &k)
}

fn match_words(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((&"#", rest)) => (0..=key.len()).any(|skip| match_words(rest, &key[skip..])),
        Some((&"*", rest)) => !key.is_empty() && match_words(rest, &key[1..]),
        Some((word, rest)) => key.first() == Some(word) && match_words(rest, &key[1..]),
    }
}

/// Declare exchange, then queues, then bindings on `channel`.
///
/// Safe to call on every connection; no retry on failure.
pub async fn ensure_topology(channel: &Channel, topology: &Topology) -> Result<(), BrokerError> {
    let ex = &topology.exchange;
    debug!(exchange = %ex.name, "declaring exchange");
    channel
        .exchange_declare(
            &ex.name,
            ExchangeKind::Topic,
            ExchangeDeclareOptions {
                durable: ex.durable,
                ..ExchangeDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|source| BrokerError::Topology {
            what: format!("exchange {}", ex.name),
            source,
        })?;

    for q in &topology.queues {
        debug!(queue = %q.name, "declaring queue");
        channel
            .queue_declare(
                &q.name,
                QueueDeclareOptions {
                    durable: q.durable,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|source| BrokerError::Topology {
                what: format!("queue {}", q.name),
                source,
            })?;
    }

    for b in &topology.bindings {
        debug!(queue = %b.queue, pattern = %b.pattern, "binding queue");
        channel
            .queue_bind(
                &b.queue,
                &ex.name,
                &b.pattern,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|source| BrokerError::Topology {
                what: format!("binding {} -> {}", b.pattern, b.queue),
                source,
            })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_plan_is_durable_topic() {
        let t = Topology::standard();
        assert_eq!(t.exchange.name, "backtest_exchange");
        assert_eq!(t.exchange.kind, "topic");
        assert!(t.exchange.durable);
        assert_eq!(t.queues.len(), 3);
        assert!(t.queues.iter().all(|q| q.durable));
        assert_eq!(t.bindings.len(), 3);
    }

    #[test]
    fn star_matches_exactly_one_word() {
        assert!(topic_matches("backtest.*", "backtest.request"));
        assert!(topic_matches("backtest.*", "backtest.custom"));
        assert!(!topic_matches("backtest.*", "backtest"));
        assert!(!topic_matches("backtest.*", "backtest.request.v2"));
        assert!(!topic_matches("backtest.*", "strategy.upload"));
    }

    #[test]
    fn hash_matches_zero_or_more_words() {
        assert!(topic_matches("backtest.#", "backtest"));
        assert!(topic_matches("backtest.#", "backtest.a.b.c"));
        assert!(topic_matches("#", "anything.at.all"));
        assert!(topic_matches("#.done", "a.b.done"));
        assert!(!topic_matches("#.done", "a.b.started"));
    }

    #[test]
    fn template_keys_route_as_declared() {
        let t = Topology::standard();
        assert_eq!(t.matching_queues("backtest.request"), vec![BACKTEST_QUEUE]);
        assert_eq!(t.matching_queues("strategy.upload"), vec![STRATEGY_QUEUE]);
        assert_eq!(t.matching_queues("data.request"), vec![DATA_QUEUE]);
        // No binding covers file.*; the broker drops these.
        assert!(!t.is_routable("file.upload"));
    }
}
