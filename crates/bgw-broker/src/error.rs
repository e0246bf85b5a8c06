use std::time::Duration;

/// Connectivity and publish failures. None of these are retried here.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("connect to broker at {target} failed: {source}")]
    Connect {
        target: String,
        #[source]
        source: lapin::Error,
    },

    #[error("open channel failed: {0}")]
    Channel(#[source] lapin::Error),

    #[error("declare {what} failed: {source}")]
    Topology {
        what: String,
        #[source]
        source: lapin::Error,
    },

    #[error("topology conflict: {0}")]
    TopologyConflict(String),

    #[error("serialize envelope failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("publish failed: {0}")]
    Publish(#[source] lapin::Error),

    #[error("publish blocked for more than {0:?}")]
    Blocked(Duration),

    #[error("close failed: {0}")]
    Close(#[source] lapin::Error),

    #[error("broker unavailable: {0}")]
    Unavailable(String),
}
