use assert_cmd::Command;
use predicates::prelude::*;

fn ventd() -> Command {
    Command::cargo_bin("ventd").unwrap()
}

#[test]
fn help_lists_the_subcommands() {
    ventd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("sweep"));
}

#[test]
fn run_emits_one_json_snapshot_per_cycle() {
    let out = ventd()
        .args([
            "--json",
            "run",
            "--cycles",
            "3",
            "--interval-ms",
            "1",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let lines: Vec<&str> = std::str::from_utf8(&out)
        .unwrap()
        .lines()
        .filter(|l| l.starts_with('{'))
        .collect();
    assert_eq!(lines.len(), 3, "one snapshot per cycle");
    for line in lines {
        let v: serde_json::Value = serde_json::from_str(line).unwrap();
        assert!(v["cycle"].is_u64());
        let fans = v["fans"].as_array().unwrap();
        assert!(!fans.is_empty());
        assert!(fans[0]["rpm"].is_u64());
        assert!(fans[0]["target"].is_i64() || fans[0]["target"].is_u64());
        assert!(fans[0]["drive"].is_u64());
        assert!(fans[0]["stable"].is_boolean());
    }
}

#[test]
fn status_prints_the_human_block() {
    ventd()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("cycle"))
        .stdout(predicate::str::contains("fan0"));
}

#[test]
fn run_respects_a_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = dir.path().join("ventd.toml");
    std::fs::write(
        &cfg,
        r#"
[cycle]
interval_ms = 1
watchdog = false

[[fans]]
name = "attic"
profile = "theoretical"
"#,
    )
    .unwrap();

    let out = ventd()
        .args(["--config", cfg.to_str().unwrap(), "--json", "run", "--cycles", "1"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let line = std::str::from_utf8(&out)
        .unwrap()
        .lines()
        .find(|l| l.starts_with('{'))
        .unwrap()
        .to_owned();
    let v: serde_json::Value = serde_json::from_str(&line).unwrap();
    assert_eq!(v["fans"][0]["name"], "attic");
}

#[test]
fn sweep_prints_curve_csv_rows() {
    let out = ventd()
        .args(["sweep", "--steps", "4", "--settle-ms", "20"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = std::str::from_utf8(&out).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("rpm,pwm"));
    let rows: Vec<&str> = lines.collect();
    assert_eq!(rows.len(), 5, "steps+1 rows: {rows:?}");
    for row in rows {
        let (rpm, pwm) = row.split_once(',').expect("two columns");
        rpm.parse::<u32>().unwrap();
        pwm.parse::<u32>().unwrap();
    }
}

#[test]
fn bad_config_still_runs_on_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = dir.path().join("broken.toml");
    std::fs::write(&cfg, "this is ( not toml").unwrap();

    ventd()
        .args(["--config", cfg.to_str().unwrap(), "--json", "run", "--cycles", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"fans\""));
}
