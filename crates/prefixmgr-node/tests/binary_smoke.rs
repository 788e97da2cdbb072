//! Smoke test for the `prefixmgr-node` binary.

#[cfg(unix)]
#[test]
fn binary_starts_and_stops_cleanly() {
    use std::io::{BufRead, BufReader};
    use std::process::{Command, Stdio};

    let bin = env!("CARGO_BIN_EXE_prefixmgr-node");

    let config_content = br#"[node]
node_name = "smoke"
areas = ["0"]

[[originated_prefixes]]
prefix = "10.0.0.0/8"
install_to_fib = true
"#;
    let mut config_file = tempfile::NamedTempFile::new().unwrap();
    std::io::Write::write_all(&mut config_file, config_content).unwrap();

    // tracing_subscriber writes to stdout by default
    let stdout_file = tempfile::NamedTempFile::new().unwrap();
    let stdout_writer = stdout_file.reopen().unwrap();

    let child = Command::new(bin)
        .args(["--config", config_file.path().to_str().unwrap()])
        .env("RUST_LOG_FORMAT", "json")
        .env("RUST_LOG", "info")
        .stdout(Stdio::from(stdout_writer))
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn prefixmgr-node");

    let pid = child.id();

    std::thread::sleep(std::time::Duration::from_millis(500));

    Command::new("kill")
        .args(["-INT", &pid.to_string()])
        .status()
        .expect("failed to send SIGINT");

    // Kill after 5s if SIGINT was not honoured
    let guard = std::thread::spawn(move || {
        std::thread::sleep(std::time::Duration::from_secs(5));
        let _ = Command::new("kill").args(["-9", &pid.to_string()]).status();
    });

    let output = child.wait_with_output().expect("failed to wait on child");
    drop(guard);

    assert!(
        output.status.success(),
        "expected exit code 0, got {:?}",
        output.status.code()
    );

    let stdout_content = std::fs::read_to_string(stdout_file.path()).unwrap();
    let lines: Vec<String> = BufReader::new(stdout_content.as_bytes())
        .lines()
        .map_while(Result::ok)
        .collect();
    assert!(
        lines.iter().any(|l| l.starts_with('{')),
        "expected at least one JSON log line, got: {stdout_content}"
    );
    assert!(
        lines.iter().any(|l| l.contains("program static route")),
        "expected the threshold-0 aggregate to be programmed, got: {stdout_content}"
    );
}

#[test]
fn binary_rejects_invalid_config() {
    use std::process::{Command, Stdio};

    let bin = env!("CARGO_BIN_EXE_prefixmgr-node");
    let mut config_file = tempfile::NamedTempFile::new().unwrap();
    std::io::Write::write_all(&mut config_file, b"[node]\nareas = []\n").unwrap();

    let status = Command::new(bin)
        .args(["--config", config_file.path().to_str().unwrap()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .expect("failed to run prefixmgr-node");
    assert_eq!(status.code(), Some(1));
}
