use assert_cmd::Command;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

// Valve on the sim backend, no encoders, so runs use the [timing] values.
const VALVE_TOML: &str = r#"
[pins]
stop = 26
go = 16
pause = 14
valve = 6

[timing]
total_duration_s = 2
actuation_interval_s = 0.4
safety_margin_s = 0.1

[runner]
tick_ms = 5

[display]
refresh_ms = 100
"#;

const MOTOR_TOML: &str = r#"
[pins]
stop = 26
go = 16
motor_forward = 12
motor_backward = 13

[actuator]
kind = "motor"
"#;

// threshold must be below bound
const INVALID_TOML: &str = r#"
[pins]
stop = 26
go = 16
valve = 6

[encoder]
bound = 10
threshold = 20
"#;

fn write_config(dir: &tempfile::TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("cycler.toml");
    fs::write(&path, body).unwrap();
    path
}

fn cycler(cfg: &PathBuf) -> Command {
    let mut cmd = Command::cargo_bin("cycler").unwrap();
    cmd.env_remove("RUST_LOG")
        .env_remove("CYCLER_TEST_SIM_FAULT")
        .arg("--config")
        .arg(cfg);
    cmd
}

#[rstest]
#[case(VALVE_TOML, &["--help"], 0, "Usage:", "stdout")]
#[case(VALVE_TOML, &["self-check"], 0, "self-check ok (valve safe)", "stdout")]
#[case(MOTOR_TOML, &["self-check"], 0, "self-check ok (motor safe)", "stdout")]
#[case(MOTOR_TOML, &["hold-time", "--interval-s", "5", "--repeat", "2"], 0, "hold time: 0.50 s", "stdout")]
#[case(MOTOR_TOML, &["hold-time", "--interval-s", "3", "--repeat", "1"], 0, "hold time: 0.50 s", "stdout")]
#[case(MOTOR_TOML, &["hold-time", "--interval-s", "1", "--repeat", "2"], 0, "raised to the minimum 4.00 s", "stdout")]
#[case(MOTOR_TOML, &["hold-time", "--interval-s", "30", "--repeat", "4294967295"], 0, "lowered to the maximum 10", "stdout")]
#[case(MOTOR_TOML, &["hold-time", "--interval-s", "30", "--repeat", "4294967295"], 0, "hold time: 0.95 s", "stdout")]
#[case(MOTOR_TOML, &["hold-time", "--interval-s", "3"], 2, "required", "stderr")]
#[case(INVALID_TOML, &["self-check"], 5, "encoder.threshold", "stderr")]
fn cli_table_cases(
    #[case] body: &str,
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, body);
    let assert = cycler(&cfg).args(args).assert().code(exit_code);
    if stream == "stdout" {
        assert.stdout(predicate::str::contains(needle));
    } else {
        assert.stderr(predicate::str::contains(needle));
    }
}

#[test]
fn run_completes_and_reports_cycles() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, VALVE_TOML);
    cycler(&cfg)
        .args(["run", "--auto-start", "--exit-on-complete"])
        .timeout(std::time::Duration::from_secs(20))
        .assert()
        .success()
        .stdout(predicate::str::contains("RUNNING"))
        .stdout(predicate::str::contains("run complete: 00:00:02 elapsed, 5 cycles"));
}

#[test]
fn setters_from_the_command_line_shape_the_run() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, VALVE_TOML);
    // 1 s at 0.5 s: boundaries at 0.25 and 0.75.
    cycler(&cfg)
        .args([
            "run",
            "--total-s",
            "1",
            "--interval-s",
            "0.5",
            "--auto-start",
            "--exit-on-complete",
        ])
        .timeout(std::time::Duration::from_secs(20))
        .assert()
        .success()
        .stdout(predicate::str::contains("run complete: 00:00:01 elapsed, 2 cycles"));
}

#[test]
fn json_run_emits_parseable_status_lines() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, VALVE_TOML);
    let out = cycler(&cfg)
        .args(["--json", "run", "--total-s", "1", "--auto-start", "--exit-on-complete"])
        .timeout(std::time::Duration::from_secs(20))
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let stdout = String::from_utf8(out.stdout).unwrap();
    let events: Vec<serde_json::Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).expect("each stdout line is JSON"))
        .collect();
    assert!(events.iter().any(|e| e["event"] == "status" && e["state"] == "RUNNING"));
    let last = events.last().expect("at least one line");
    assert_eq!(last["event"], "complete");
    assert_eq!(last["elapsed_ms"], 1000);
}

#[test]
fn simulated_output_fault_exits_with_hardware_code() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, VALVE_TOML);
    cycler(&cfg)
        .env("CYCLER_TEST_SIM_FAULT", "1")
        .arg("self-check")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Hardware fault"));
}

#[test]
fn simulated_output_fault_aborts_run_as_json() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, VALVE_TOML);
    let out = cycler(&cfg)
        .env("CYCLER_TEST_SIM_FAULT", "1")
        .args(["--json", "run", "--auto-start"])
        .timeout(std::time::Duration::from_secs(20))
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&out.stderr);
    let err_line = stderr
        .lines()
        .filter_map(|l| serde_json::from_str::<serde_json::Value>(l).ok())
        .find(|v| v.get("reason").is_some())
        .expect("structured error on stderr");
    assert_eq!(err_line["reason"], "HardwareFault");
}

#[test]
fn missing_config_file_is_a_config_error() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    cycler(&missing)
        .arg("self-check")
        .assert()
        .code(5)
        .stderr(predicate::str::contains("Could not read the config file"));
}

/// Start a long run, wait for it to report RUNNING, send `signal`, and
/// return the exit code.
#[cfg(unix)]
fn signalled_run_exit_code(signal: &str) -> Option<i32> {
    use std::io::{BufRead, BufReader};
    use std::process::Stdio;

    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, VALVE_TOML);
    let mut child = std::process::Command::new(env!("CARGO_BIN_EXE_cycler"))
        .env_remove("RUST_LOG")
        .env_remove("CYCLER_TEST_SIM_FAULT")
        .arg("--config")
        .arg(&cfg)
        .args(["run", "--total-s", "600", "--auto-start"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    let stdout = child.stdout.take().unwrap();
    let mut lines = BufReader::new(stdout).lines();
    let running = lines.by_ref().map_while(Result::ok).any(|l| l.contains("RUNNING"));
    assert!(running, "run never reported RUNNING");

    let sent = std::process::Command::new("kill")
        .args([signal, &child.id().to_string()])
        .status()
        .unwrap();
    assert!(sent.success());
    // Drain so the child never blocks on a full pipe.
    lines.for_each(drop);
    child.wait().unwrap().code()
}

#[cfg(unix)]
#[rstest]
#[case("-INT")]
#[case("-TERM")]
fn signals_stop_a_run_with_the_interrupted_code(#[case] signal: &str) {
    assert_eq!(signalled_run_exit_code(signal), Some(4));
}
