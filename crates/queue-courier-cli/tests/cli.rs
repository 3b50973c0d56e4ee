//! Binary-level tests for the queue-courier command.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn courier() -> Command {
    let mut cmd = Command::cargo_bin("queue-courier").unwrap();
    cmd.env_remove("QUEUE_COURIER_CONFIG").env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_lists_commands() {
    courier()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("publish"))
        .stdout(predicate::str::contains("list-consume"));
}

#[test]
fn test_config_show_reads_explicit_file() {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(file, "sqs:\n  region: eu-west-1\npublisher:\n  max_retries: 7").unwrap();

    courier()
        .args(["--config", file.path().to_str().unwrap(), "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"region\": \"eu-west-1\""))
        .stdout(predicate::str::contains("\"max_retries\": 7"));
}

#[test]
fn test_invalid_configuration_exits_with_code_one() {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(file, "publisher:\n  max_retries: 0").unwrap();

    courier()
        .args(["--config", file.path().to_str().unwrap(), "config", "show"])
        .assert()
        .code(1);
}
