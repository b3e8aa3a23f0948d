use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

const SENSORS: &str = r#"
[[sensor]]
type_name = "NO2"
unit_name = "ppb"
feedback_ohms = 10
target_power_mw = 43
supply_adc = 0
feedback_adc = 1
sensor_adc = 2
wiper = 0
divider_ohms = [4700, 10000, 47000]
r0_ohms = 2200
curve = [[24.8, 198.9], [98.8, 418.2]]

[[sensor]]
type_name = "CO"
unit_name = "ppb"
feedback_ohms = 10
target_power_mw = 76
supply_adc = 3
feedback_adc = 4
sensor_adc = 5
wiper = 1
divider_ohms = [4700, 10000, 47000]
r0_ohms = 750000
curve = [[0.402, 41250.0], [0.723, 990.0]]
"#;

// Minimal valid TOML config for the sim backend with a fast control period
fn write_config(dir: &tempfile::TempDir, sensors: &str) -> PathBuf {
    let toml = format!(
        r#"
[control]
period_ms = 1
momentum_step = 1

[sampler]
settle_ms = 0

[identity]
module_id = "00:04:a3:0b:00:1c"

[logging]
level = "warn"
{sensors}"#
    );
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["registers"], 0, "sensor[1].raw", "stdout")]
#[case(&["run", "--ticks", "2"], 0, "regulation stopped after 2 passes", "stdout")]
#[case(&["read", "--addr", "0x0000"], 0, "0x0000 sensor_count: 02", "stdout")]
#[case(&["read", "--addr", "1"], 0, "00 04 a3 0b 00 1c", "stdout")]
#[case(&["read", "--addr", "0x0100"], 0, "4e 4f 32 00", "stdout")]
#[case(&["read", "--addr", "0x00ff"], 0, "unknown: 00 00 00 00", "stdout")]
#[case(&["read"], 2, "required", "stderr")]
#[case(&["read", "--addr", "0x10000"], 2, "invalid register address", "stderr")]
#[case(&["self-check"], 0, "digipot status 0x1f0", "stdout")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, SENSORS);

    let mut cmd = Command::cargo_bin("egg_cli").unwrap();

    // Always include a valid config to avoid relying on default path
    cmd.arg("--config").arg(&cfg);
    for a in args {
        cmd.arg(a);
    }

    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
fn cli_rejects_shared_wiper() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, &SENSORS.replacen("wiper = 1", "wiper = 0", 1));

    Command::cargo_bin("egg_cli")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("self-check")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("wiper 0 is already used"));
}

#[rstest]
fn cli_reports_missing_config_file() {
    let dir = tempdir().unwrap();
    Command::cargo_bin("egg_cli")
        .unwrap()
        .arg("--config")
        .arg(dir.path().join("nope.toml"))
        .arg("self-check")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Could not read the config file"));
}

#[rstest]
fn cli_reports_bad_curve_header() {
    let dir = tempdir().unwrap();
    let mut f = fs::File::create(dir.path().join("co.csv")).unwrap();
    writeln!(f, "ratio,ppb").unwrap();
    writeln!(f, "0.4,41250").unwrap();

    let sensors = SENSORS.replacen(
        "curve = [[0.402, 41250.0], [0.723, 990.0]]",
        "curve_csv = \"co.csv\"",
        1,
    );
    let cfg = write_config(&dir, &sensors);

    Command::cargo_bin("egg_cli")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("self-check")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("ratio,concentration"));
}

#[rstest]
fn curve_csv_resolves_next_to_config() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("co.csv"),
        "ratio,concentration\n0.402,41250\n0.723,990\n",
    )
    .unwrap();
    let sensors = SENSORS.replacen(
        "curve = [[0.402, 41250.0], [0.723, 990.0]]",
        "curve_csv = \"co.csv\"",
        1,
    );
    let cfg = write_config(&dir, &sensors);

    Command::cargo_bin("egg_cli")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("self-check")
        .assert()
        .success()
        .stdout(predicate::str::contains("ok:"));
}

#[rstest]
fn json_run_emits_one_object_per_line() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, SENSORS);

    let out = Command::cargo_bin("egg_cli")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("--json")
        .args(["run", "--ticks", "3"])
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let lines: Vec<serde_json::Value> = String::from_utf8(out.stdout)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).expect("each stdout line is JSON"))
        .collect();
    assert_eq!(lines.len(), 3, "header plus one line per heater");
    assert_eq!(lines[0]["passes"], 3);
    for (ch, line) in lines[1..].iter().enumerate() {
        assert_eq!(line["channel"], ch);
        assert_eq!(line["ticks"], 3);
        assert!(line["power_mw"].as_u64().unwrap() > 0);
    }
    assert_eq!(lines[1]["type"], "NO2");
    assert_eq!(lines[2]["target_mw"], 76);
}

#[rstest]
fn json_errors_are_structured() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, &SENSORS.replacen("feedback_ohms = 10", "feedback_ohms = 0", 1));

    let out = Command::cargo_bin("egg_cli")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("--json")
        .arg("self-check")
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(2));
    let stderr = String::from_utf8(out.stderr).unwrap();
    let last = stderr.lines().last().unwrap();
    let v: serde_json::Value = serde_json::from_str(last).unwrap();
    assert_eq!(v["reason"], "InvalidConfig");
    assert!(v["message"].as_str().unwrap().contains("feedback_ohms"));
}
