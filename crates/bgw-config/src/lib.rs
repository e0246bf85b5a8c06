//! Gateway configuration.
//!
//! # Contract
//! - Everything is environment-sourced, resolved **once** at startup via
//!   [`GatewayConfig::from_env`], then shared read-only. Do not scatter
//!   `std::env::var` calls across the codebase.
//! - Unset or blank variables fall back to documented defaults.
//! - Unparseable values fail with the variable **name** in the message.
//!
//! | Variable                    | Default     |
//! |-----------------------------|-------------|
//! | `RABBITMQ_HOST`             | `localhost` |
//! | `RABBITMQ_PORT`             | `5672`      |
//! | `RABBITMQ_USER`             | `guest`     |
//! | `RABBITMQ_PASS`             | `guest`     |
//! | `RABBITMQ_VHOST`            | `/`         |
//! | `PORT`                      | `5000`      |
//! | `GATEWAY_ADDR`              | `0.0.0.0:$PORT` |
//! | `GATEWAY_DEFAULTS_FILE`     | unset (built-in template defaults) |
//! | `GATEWAY_UNROUTABLE_POLICY` | `warn`      |

use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use bgw_schemas::TemplateDefaults;

pub mod broker;

pub use broker::BrokerConfig;

pub const ENV_RABBITMQ_HOST: &str = "RABBITMQ_HOST";
pub const ENV_RABBITMQ_PORT: &str = "RABBITMQ_PORT";
pub const ENV_RABBITMQ_USER: &str = "RABBITMQ_USER";
pub const ENV_RABBITMQ_PASS: &str = "RABBITMQ_PASS";
pub const ENV_RABBITMQ_VHOST: &str = "RABBITMQ_VHOST";
pub const ENV_PORT: &str = "PORT";
pub const ENV_GATEWAY_ADDR: &str = "GATEWAY_ADDR";
pub const ENV_DEFAULTS_FILE: &str = "GATEWAY_DEFAULTS_FILE";
pub const ENV_UNROUTABLE_POLICY: &str = "GATEWAY_UNROUTABLE_POLICY";

const DEFAULT_HTTP_PORT: u16 = 5000;

/// What to do with a caller-supplied routing key that matches no binding.
///
/// The broker silently drops such messages. `Warn` keeps that behaviour and
/// logs it; `Reject` refuses the request with a client error instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnroutablePolicy {
    #[default]
    Warn,
    Reject,
}

impl UnroutablePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnroutablePolicy::Warn => "warn",
            UnroutablePolicy::Reject => "reject",
        }
    }
}

impl FromStr for UnroutablePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "warn" => Ok(UnroutablePolicy::Warn),
            "reject" => Ok(UnroutablePolicy::Reject),
            other => bail!("unrecognised policy '{}'; expected one of: warn | reject", other),
        }
    }
}

/// Effective process-wide configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    pub bind_addr: SocketAddr,
    pub broker: BrokerConfig,
    pub defaults: TemplateDefaults,
    pub unroutable_policy: UnroutablePolicy,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_HTTP_PORT)),
            broker: BrokerConfig::default(),
            defaults: TemplateDefaults::default(),
            unroutable_policy: UnroutablePolicy::default(),
        }
    }
}

impl GatewayConfig {
    /// Resolve from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut cfg = GatewayConfig::default();

        if let Some(host) = get(ENV_RABBITMQ_HOST) {
            cfg.broker.host = host.trim().to_string();
        }
        if let Some(port) = get(ENV_RABBITMQ_PORT) {
            cfg.broker.port = parse_var(ENV_RABBITMQ_PORT, &port)?;
        }
        if let Some(user) = get(ENV_RABBITMQ_USER) {
            cfg.broker.username = user;
        }
        if let Some(pass) = get(ENV_RABBITMQ_PASS) {
            cfg.broker.password = pass;
        }
        if let Some(vhost) = get(ENV_RABBITMQ_VHOST) {
            cfg.broker.vhost = vhost.trim().to_string();
        }

        if let Some(addr) = get(ENV_GATEWAY_ADDR) {
            cfg.bind_addr = parse_var(ENV_GATEWAY_ADDR, &addr)?;
        } else if let Some(port) = get(ENV_PORT) {
            cfg.bind_addr.set_port(parse_var(ENV_PORT, &port)?);
        }

        if let Some(path) = get(ENV_DEFAULTS_FILE) {
            cfg.defaults = load_defaults_file(Path::new(path.trim()))?;
        }

        if let Some(policy) = get(ENV_UNROUTABLE_POLICY) {
            cfg.unroutable_policy = policy
                .parse()
                .with_context(|| format!("CONFIG_INVALID: {ENV_UNROUTABLE_POLICY}"))?;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values that can only fail later at connect time.
    pub fn validate(&self) -> Result<()> {
        if self.broker.host.trim().is_empty() {
            bail!("CONFIG_INVALID: {ENV_RABBITMQ_HOST} must not be empty");
        }
        if self.broker.port == 0 {
            bail!("CONFIG_INVALID: {ENV_RABBITMQ_PORT} must be non-zero");
        }
        if self.broker.vhost.is_empty() {
            bail!("CONFIG_INVALID: {ENV_RABBITMQ_VHOST} must not be empty");
        }
        if self.broker.heartbeat_secs == 0 {
            bail!("CONFIG_INVALID: broker heartbeat must be positive");
        }
        if self.broker.blocked_connection_timeout_secs == 0 {
            bail!("CONFIG_INVALID: broker blocked-connection timeout must be positive");
        }
        Ok(())
    }
}

/// Load template defaults from a YAML file. Missing keys keep their built-in
/// values.
pub fn load_defaults_file(path: &Path) -> Result<TemplateDefaults> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read defaults file failed: {}", path.display()))?;
    if raw.trim().is_empty() {
        return Ok(TemplateDefaults::default());
    }
    serde_yaml::from_str(&raw)
        .with_context(|| format!("parse defaults yaml failed: {}", path.display()))
}

fn parse_var<T>(name: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("CONFIG_INVALID: {name}='{}': {e}", raw.trim()))
}
