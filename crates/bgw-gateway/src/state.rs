//! Shared runtime state for bgw-gateway.
//!
//! Read-only after startup. Handlers receive `State<Arc<AppState>>` from
//! Axum; nothing here is mutated per request. Broker connections are not
//! held here: each request opens and closes its own through `connector`.

use std::sync::Arc;

use bgw_broker::{AmqpConnector, BrokerConnector, Topology};
use bgw_config::{GatewayConfig, UnroutablePolicy};
use bgw_schemas::TemplateDefaults;

/// Static build metadata included in health responses.
#[derive(Clone, Debug)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self {
            service: "bgw-gateway",
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Cloneable (Arc) handle shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Opens one broker session per request.
    pub connector: Arc<dyn BrokerConnector>,
    /// Used to detect routing keys the broker would drop.
    pub topology: Topology,
    /// Constants embedded by the message templates.
    pub defaults: TemplateDefaults,
    pub unroutable_policy: UnroutablePolicy,
    pub build: BuildInfo,
}

impl AppState {
    /// State over `connector` with the standard topology and built-in
    /// defaults.
    pub fn new(connector: Arc<dyn BrokerConnector>) -> Self {
        Self {
            connector,
            topology: Topology::standard(),
            defaults: TemplateDefaults::default(),
            unroutable_policy: UnroutablePolicy::default(),
            build: BuildInfo::default(),
        }
    }

    /// Production wiring: lapin connector from the resolved config.
    pub fn from_config(cfg: &GatewayConfig) -> Self {
        let topology = Topology::standard();
        let connector = AmqpConnector::new(cfg.broker.clone(), topology.clone());
        Self::new(Arc::new(connector))
            .with_topology(topology)
            .with_defaults(cfg.defaults.clone())
            .with_unroutable_policy(cfg.unroutable_policy)
    }

    pub fn with_topology(mut self, topology: Topology) -> Self {
        self.topology = topology;
        self
    }

    pub fn with_defaults(mut self, defaults: TemplateDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_unroutable_policy(mut self, policy: UnroutablePolicy) -> Self {
        self.unroutable_policy = policy;
        self
    }
}
