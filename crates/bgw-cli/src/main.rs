use anyhow::{bail, Context, Result};
use bgw_broker::{publish_with_fresh_connection, AmqpConnector, BrokerConnector, Topology};
use bgw_config::GatewayConfig;
use bgw_schemas::templates;
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::warn;

#[derive(Parser)]
#[command(name = "bgw")]
#[command(about = "Backtest gateway operator CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective configuration (password redacted)
    Config,

    /// Print the exchange/queue/binding plan
    Topology {
        /// Also connect to the broker and declare it
        #[arg(long, default_value_t = false)]
        declare: bool,
    },

    /// Publish one custom message and print its message id
    Publish {
        /// Routing key on the topic exchange (e.g. backtest.rerun)
        #[arg(long)]
        routing_key: String,

        /// Payload JSON string, sent unchanged
        #[arg(long)]
        payload: String,

        /// Envelope message_type (defaults to "custom")
        #[arg(long)]
        message_type: Option<String>,

        /// Correlation id (generated when omitted)
        #[arg(long)]
        correlation_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env.local if present (dev convenience).
    let _ = dotenvy::from_filename(".env.local");

    // Logs go to stderr; stdout carries only command output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = GatewayConfig::from_env().context("resolve gateway config")?;

    match cli.cmd {
        Commands::Config => print_config(&cfg)?,

        Commands::Topology { declare } => {
            let topology = Topology::standard();
            print_topology(&topology);

            if declare {
                let connector = AmqpConnector::new(cfg.broker.clone(), topology);
                let session = connector
                    .open()
                    .await
                    .with_context(|| format!("declare topology on {}", cfg.broker.display_target()))?;
                session.close().await.context("close broker session")?;
                println!("declared=true broker={}", cfg.broker.display_target());
            }
        }

        Commands::Publish {
            routing_key,
            payload,
            message_type,
            correlation_id,
        } => {
            if routing_key.trim().is_empty() {
                bail!("--routing-key must not be empty");
            }
            let payload: Value =
                serde_json::from_str(&payload).context("--payload is not valid JSON")?;

            let topology = Topology::standard();
            if !topology.is_routable(&routing_key) {
                warn!(
                    routing_key = %routing_key,
                    "routing key matches no binding; broker will drop the message"
                );
            }

            let envelope = templates::custom(message_type, payload, correlation_id);
            let connector = AmqpConnector::new(cfg.broker.clone(), topology);
            let published = publish_with_fresh_connection(&connector, &routing_key, &envelope)
                .await
                .with_context(|| format!("connect to broker {}", cfg.broker.display_target()))?;

            if !published {
                bail!("publish failed: routing_key={}", routing_key);
            }
            println!("message_id={}", envelope.message_id);
            println!("correlation_id={}", envelope.correlation_id);
            println!("routing_key={}", routing_key);
        }
    }

    Ok(())
}

fn print_config(cfg: &GatewayConfig) -> Result<()> {
    println!("bind_addr={}", cfg.bind_addr);
    println!("broker_host={}", cfg.broker.host);
    println!("broker_port={}", cfg.broker.port);
    println!("broker_vhost={}", cfg.broker.vhost);
    println!("broker_user={}", cfg.broker.username);
    println!("broker_password=<REDACTED>");
    println!("heartbeat_secs={}", cfg.broker.heartbeat_secs);
    println!(
        "blocked_connection_timeout_secs={}",
        cfg.broker.blocked_connection_timeout_secs
    );
    println!("connection_name={}", cfg.broker.connection_name);
    println!("unroutable_policy={}", cfg.unroutable_policy.as_str());
    println!(
        "template_defaults={}",
        serde_json::to_string(&cfg.defaults).context("serialize template defaults")?
    );
    Ok(())
}

fn print_topology(topology: &Topology) {
    println!(
        "exchange={} kind={} durable={}",
        topology.exchange.name, topology.exchange.kind, topology.exchange.durable
    );
    for q in &topology.queues {
        println!("queue={} durable={}", q.name, q.durable);
    }
    for b in &topology.bindings {
        println!("binding={} -> {}", b.pattern, b.queue);
    }
}
