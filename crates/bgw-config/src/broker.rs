/// Broker connection parameters, read once at startup and shared read-only.
///
/// **The password is redacted in `Debug` output.**
#[derive(Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub vhost: String,
    pub username: String,
    pub password: String,
    /// AMQP heartbeat negotiated on every connection.
    pub heartbeat_secs: u16,
    /// Upper bound on a single publish while the broker is applying
    /// flow control to the connection.
    pub blocked_connection_timeout_secs: u64,
    /// Shown in the broker's management UI.
    pub connection_name: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5672,
            vhost: "/".to_string(),
            username: "guest".to_string(),
            password: "guest".to_string(),
            heartbeat_secs: 600,
            blocked_connection_timeout_secs: 300,
            connection_name: "bgw-gateway".to_string(),
        }
    }
}

impl std::fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("vhost", &self.vhost)
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .field("heartbeat_secs", &self.heartbeat_secs)
            .field(
                "blocked_connection_timeout_secs",
                &self.blocked_connection_timeout_secs,
            )
            .field("connection_name", &self.connection_name)
            .finish()
    }
}

impl BrokerConfig {
    /// `host:port/vhost` for log lines. Never includes credentials.
    pub fn display_target(&self) -> String {
        format!("{}:{}{}", self.host, self.port, vhost_path(&self.vhost))
    }
}

fn vhost_path(vhost: &str) -> String {
    if vhost.starts_with('/') {
        vhost.to_string()
    } else {
        format!("/{vhost}")
    }
}
