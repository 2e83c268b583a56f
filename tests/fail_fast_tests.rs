//! Backend failures end the process
//!
//! Each scenario re-runs this test binary with `FAIL_FAST_SCENARIO` set, so
//! only the `fail_fast_child` test does anything, and inspects how the child
//! exited.

use std::process::{Command, Output};

use anyhow::{Context, Result};
use tensorforge::backend::hip_backend::{check_hip, check_hipblas, check_hipfft, check_hipsolver, check_hiptensor};

const SCENARIO_ENV: &str = "FAIL_FAST_SCENARIO";
const AFTER_FAILURE: &str = "continued past a failed status";

/// Entry point inside the child process; a no-op in the normal test run
#[test]
fn fail_fast_child() {
    let Ok(scenario) = std::env::var(SCENARIO_ENV) else {
        return;
    };
    // successful statuses pass straight through
    check_hip(0);
    check_hipblas(0);

    match scenario.as_str() {
        "hipblas" => check_hipblas(7),
        "hipsolver" => check_hipsolver(3),
        "hipfft" => check_hipfft(5),
        "hiptensor" => check_hiptensor(15),
        "hip-low-byte-zero" => check_hip(256),
        other => panic!("unknown scenario {other}"),
    }
    eprintln!("{AFTER_FAILURE}");
    check_hipblas(1);
}

fn run_scenario(scenario: &str) -> Result<Output> {
    let exe = std::env::current_exe().context("locating test binary")?;
    Command::new(exe)
        .args(["fail_fast_child", "--exact", "--nocapture", "--test-threads=1"])
        .env(SCENARIO_ENV, scenario)
        .output()
        .context("spawning child test process")
}

fn assert_terminated(output: &Output, code: i32, library: &str) {
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(output.status.code(), Some(code), "stderr: {stderr}");
    assert!(
        stderr.contains(&format!("Internal {library} failure with error code")),
        "stderr: {stderr}"
    );
    assert!(stderr.contains(file!()), "diagnostic lacks source file: {stderr}");
    assert!(stderr.contains(" at line "), "diagnostic lacks source line: {stderr}");
    assert!(!stderr.contains(AFTER_FAILURE), "child kept running: {stderr}");
}

#[test]
fn test_hipblas_failure_exits_with_status() -> Result<()> {
    let output = run_scenario("hipblas")?;
    assert_terminated(&output, 7, "hipBLAS");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error code 7 (HIPBLAS_STATUS_NOT_SUPPORTED)"), "stderr: {stderr}");
    Ok(())
}

#[test]
fn test_every_library_is_named() -> Result<()> {
    for (scenario, code, library) in [
        ("hipsolver", 3, "hipSOLVER"),
        ("hipfft", 5, "hipFFT"),
        ("hiptensor", 15, "hipTensor"),
    ] {
        let output = run_scenario(scenario)?;
        assert_terminated(&output, code, library);
    }
    Ok(())
}

#[test]
fn test_status_with_zero_low_byte_still_fails() -> Result<()> {
    let output = run_scenario("hip-low-byte-zero")?;
    assert_terminated(&output, 1, "HIP");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error code 256"), "stderr: {stderr}");
    Ok(())
}
