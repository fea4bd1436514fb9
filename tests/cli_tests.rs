//! Tests for the `megalista-reader` binary that need no warehouse.

use std::io::Write;
use std::process::{Command, Output};

use tempfile::NamedTempFile;

fn executions_file(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file
}

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_megalista-reader"))
        .args(args)
        .env_remove("MEGALISTA_WAREHOUSE_URL")
        .env_remove("MEGALISTA_CONFIG")
        .env_remove("MEGALISTA_QUERY_BATCH_SIZE")
        .env_remove("MEGALISTA_LOG")
        .env_remove("MEGALISTA_LOG_FORMAT")
        .output()
        .expect("failed to run megalista-reader")
}

const ONE_EXECUTION: &str = r#"[{
    "source": {"source_name": "events", "source_type": "BIG_QUERY",
               "source_metadata": ["marketing", "events"]},
    "destination": {"destination_name": "ga", "destination_type": "GA_MEASUREMENT_PROTOCOL"}
}]"#;

#[test]
fn test_empty_execution_list_succeeds_without_output() {
    let file = executions_file("[]");
    let out = run(&[
        "--executions",
        file.path().to_str().unwrap(),
        "--warehouse-url",
        "host=127.0.0.1 port=1",
    ]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    assert!(out.stdout.is_empty());
    assert!(String::from_utf8_lossy(&out.stderr).contains("Completed successfully!"));
}

#[test]
fn test_filtered_out_executions_issue_no_query() {
    // Port 1 would fail to connect; filtering means no connection is attempted.
    let file = executions_file(ONE_EXECUTION);
    let out = run(&[
        "--executions",
        file.path().to_str().unwrap(),
        "--warehouse-url",
        "host=127.0.0.1 port=1",
        "--destination",
        "ADS_SSD_UPLOAD",
    ]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    assert!(out.stdout.is_empty());
}

#[test]
fn test_missing_connection_is_config_error() {
    let file = executions_file(ONE_EXECUTION);
    let out = run(&["--executions", file.path().to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("no warehouse connection configured"));
}

#[test]
fn test_unknown_destination_is_usage_error() {
    let file = executions_file(ONE_EXECUTION);
    let out = run(&[
        "--executions",
        file.path().to_str().unwrap(),
        "--warehouse-url",
        "host=127.0.0.1 port=1",
        "--destination",
        "CARRIER_PIGEON",
    ]);
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("unknown destination type"));
}

#[test]
fn test_zero_query_batch_size_rejected() {
    let file = executions_file("[]");
    let out = run(&[
        "--executions",
        file.path().to_str().unwrap(),
        "--query-batch-size",
        "0",
    ]);
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("query_batch_size must be positive"));
}

#[test]
fn test_unreachable_warehouse_is_warehouse_error() {
    let file = executions_file(ONE_EXECUTION);
    let out = run(&[
        "--executions",
        file.path().to_str().unwrap(),
        "--warehouse-url",
        "host=127.0.0.1 port=1 connect_timeout=1",
    ]);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("warehouse error"));
}
