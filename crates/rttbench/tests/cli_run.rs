#![cfg(feature = "cli")]

use std::io::{BufRead, BufReader};
use std::net::TcpListener;
use std::process::{Child, ChildStdout, Command, Output, Stdio};

struct Server {
    child: Child,
    port: u16,
    // Held so the server's stdout stays open for the whole test.
    _stdout: BufReader<ChildStdout>,
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn start_server() -> Server {
    let mut child = Command::new(env!("CARGO_BIN_EXE_rttbench"))
        .args(["--log-level", "error", "serve", "--host", "127.0.0.1", "--port", "0"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("serve command should start");

    let mut stdout = BufReader::new(child.stdout.take().expect("stdout should be piped"));
    let mut line = String::new();
    stdout
        .read_line(&mut line)
        .expect("server should announce its address");
    let port = line
        .trim()
        .rsplit(':')
        .next()
        .and_then(|p| p.parse().ok())
        .unwrap_or_else(|| panic!("unexpected listen line: {line:?}"));

    Server {
        child,
        port,
        _stdout: stdout,
    }
}

fn run_client(port: u16, extra: &[&str]) -> Output {
    let port = port.to_string();
    Command::new(env!("CARGO_BIN_EXE_rttbench"))
        .args(["--log-level", "error", "--format", "json", "run", "--port"])
        .arg(&port)
        .args(extra)
        .env_remove("RTTBENCH_HOST")
        .env_remove("RTTBENCH_MSG")
        .env_remove("RTTBENCH_COUNT")
        .output()
        .expect("run command should execute")
}

fn json_stdout(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(stdout.trim()).expect("run should emit a json report")
}

#[test]
fn run_against_server_reports_ordered_percentiles() {
    let server = start_server();
    let output = run_client(
        server.port,
        &["--msg", "ping", "--count", "5", "--no-warmup"],
    );

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let report = json_stdout(&output);
    assert_eq!(report["status"], "completed");
    assert_eq!(report["sent"], 5);
    assert_eq!(report["received"], 5);
    assert_eq!(report["samples"], 5);

    let summary = &report["summary"];
    let metric = |name: &str| summary[name].as_f64().expect("metric should be numeric");
    assert!(metric("min_us") <= metric("p50_us"));
    assert!(metric("p50_us") <= metric("p90_us"));
    assert!(metric("p90_us") <= metric("p99_us"));
    assert!(metric("p99_us") <= metric("max_us"));
    assert!(metric("min_us") <= metric("avg_us") && metric("avg_us") <= metric("max_us"));
}

#[test]
fn warmup_samples_are_excluded_from_report() {
    let server = start_server();
    let output = run_client(server.port, &["--count", "150", "--warmup", "100"]);

    assert!(output.status.success());
    let report = json_stdout(&output);
    assert_eq!(report["sent"], 150);
    assert_eq!(report["warmup"], 100);
    assert_eq!(report["samples"], 50);
}

#[test]
fn empty_message_round_trips() {
    let server = start_server();
    let output = run_client(server.port, &["--msg", "", "--count", "3", "--no-warmup"]);

    assert!(output.status.success());
    let report = json_stdout(&output);
    assert_eq!(report["message_bytes"], 0);
    assert_eq!(report["samples"], 3);
}

#[test]
fn pretty_report_is_plain_text() {
    let server = start_server();
    let output = Command::new(env!("CARGO_BIN_EXE_rttbench"))
        .args(["--format", "pretty", "run", "--count", "2", "--no-warmup", "--port"])
        .arg(server.port.to_string())
        .output()
        .expect("run command should execute");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("Samples: 2\n"));
    for label in ["min:", "p50:", "p90:", "p99:", "max:", "avg:"] {
        assert!(stdout.contains(label), "missing {label} in {stdout}");
    }
}

#[test]
fn missing_server_exits_with_transport_error() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("ephemeral bind should work");
        listener.local_addr().expect("local addr").port()
    };

    let output = run_client(port, &["--count", "1"]);
    assert_eq!(output.status.code(), Some(3));
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("run failed"));
}

#[test]
fn oversized_message_is_a_usage_error() {
    let output = run_client(1, &["--msg", "too long for four", "--max-frame", "4"]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn version_prints_package_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_rttbench"))
        .arg("version")
        .output()
        .expect("version should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout.trim(),
        format!("rttbench {}", env!("CARGO_PKG_VERSION"))
    );
}
