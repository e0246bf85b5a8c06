use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

/// `bgw` with every gateway variable cleared, so the host environment cannot
/// leak into assertions. None of these commands reach a broker.
fn bgw() -> Command {
    let mut cmd = Command::cargo_bin("bgw").expect("bgw binary not built");
    for var in [
        bgw_config::ENV_RABBITMQ_HOST,
        bgw_config::ENV_RABBITMQ_PORT,
        bgw_config::ENV_RABBITMQ_USER,
        bgw_config::ENV_RABBITMQ_PASS,
        bgw_config::ENV_RABBITMQ_VHOST,
        bgw_config::ENV_PORT,
        bgw_config::ENV_GATEWAY_ADDR,
        bgw_config::ENV_DEFAULTS_FILE,
        bgw_config::ENV_UNROUTABLE_POLICY,
    ] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn config_prints_defaults() {
    bgw()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("bind_addr=0.0.0.0:5000"))
        .stdout(predicate::str::contains("broker_host=localhost"))
        .stdout(predicate::str::contains("broker_port=5672"))
        .stdout(predicate::str::contains("unroutable_policy=warn"))
        .stdout(predicate::str::contains("\"frequency\":\"1d\""));
}

#[test]
fn config_never_prints_the_password() {
    bgw()
        .arg("config")
        .env(bgw_config::ENV_RABBITMQ_PASS, "s3cret-pass")
        .env(bgw_config::ENV_PORT, "8080")
        .assert()
        .success()
        .stdout(predicate::str::contains("broker_password=<REDACTED>"))
        .stdout(predicate::str::contains("bind_addr=0.0.0.0:8080"))
        .stdout(predicate::str::contains("s3cret-pass").not());
}

#[test]
fn config_names_the_bad_variable() {
    bgw()
        .arg("config")
        .env(bgw_config::ENV_RABBITMQ_PORT, "not-a-port")
        .assert()
        .failure()
        .stderr(predicate::str::contains("RABBITMQ_PORT"));
}

#[test]
fn topology_prints_plan_without_connecting() {
    bgw()
        .arg("topology")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "exchange=backtest_exchange kind=topic durable=true",
        ))
        .stdout(predicate::str::contains("binding=backtest.* -> backtest_queue"))
        .stdout(predicate::str::contains("binding=strategy.* -> strategy_queue"))
        .stdout(predicate::str::contains("binding=data.* -> data_queue"))
        .stdout(predicate::str::contains("declared=").not());
}

#[test]
fn publish_rejects_invalid_payload_before_connecting() {
    bgw()
        .args(["publish", "--routing-key", "backtest.rerun", "--payload", "{nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--payload is not valid JSON"));
}

#[test]
fn publish_rejects_blank_routing_key() {
    bgw()
        .args(["publish", "--routing-key", " ", "--payload", "{}"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--routing-key must not be empty"));
}

#[test]
fn publish_requires_payload_argument() {
    bgw()
        .args(["publish", "--routing-key", "backtest.rerun"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--payload"));
}
