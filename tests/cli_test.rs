//! Binary contract tests
//!
//! Runs the built `scamscreen-train` binary with an isolated config
//! directory and checks exit codes, stdout and written files.

use std::path::Path;
use std::process::{Command, Output};

fn trainer_bin() -> &'static str {
    env!("CARGO_BIN_EXE_scamscreen-train")
}

fn setup_data(dir: &Path) {
    let mut csv = String::from("message,label,pushes_external_platform\n");
    for i in 0..6 {
        csv.push_str(&format!("\"pay now on discord {}\",1,1\n", i));
        csv.push_str(&format!("\"see you at the lobby later {}\",0,0\n", i));
    }
    std::fs::write(dir.join("training.csv"), csv).unwrap();
}

fn run(dir: &Path, args: &[&str]) -> Output {
    Command::new(trainer_bin())
        .args(args)
        .current_dir(dir)
        .env("XDG_CONFIG_HOME", dir.join("config"))
        .env("HOME", dir)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

#[test]
fn test_writes_model_and_archives() {
    let dir = tempfile::tempdir().unwrap();
    setup_data(dir.path());

    let out = run(
        dir.path(),
        &["--data", "training.csv", "--out", "out/model.json", "--iterations", "300"],
    );
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Wrote model to"), "stdout: {stdout}");
    assert!(stdout.contains("model.json"));

    let model = dir.path().join("out/model.json");
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&model).unwrap()).unwrap();
    assert_eq!(json["version"], 9);

    let again = run(
        dir.path(),
        &["--data", "training.csv", "--out", "out/model.json", "--funnel"],
    );
    assert!(again.status.success());
    assert!(dir.path().join("out/old/models/model.json.old.1").is_file());

    let no_archive = run(
        dir.path(),
        &["--data", "training.csv", "--out", "out/model.json", "--funnel", "--no-archive"],
    );
    assert!(no_archive.status.success());
    assert!(!dir.path().join("out/old/models/model.json.old.2").exists());
}

#[test]
fn test_stats_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    setup_data(dir.path());

    let out = run(dir.path(), &["--data", "training.csv", "--stats"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Training Data Statistics:"));
    assert!(stdout.contains("Usable rows:  12"));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn test_failures_exit_nonzero() {
    let dir = tempfile::tempdir().unwrap();

    let missing = run(dir.path(), &["--data", "missing.csv", "--out", "model.json"]);
    assert!(!missing.status.success());
    assert!(String::from_utf8_lossy(&missing.stderr).contains("missing.csv"));

    std::fs::write(dir.path().join("tiny.csv"), "message,label\nhello,1\nbye,0\n").unwrap();
    let tiny = run(dir.path(), &["--data", "tiny.csv", "--out", "model.json"]);
    assert!(!tiny.status.success());
    assert!(!dir.path().join("model.json").exists());

    setup_data(dir.path());
    let bad_config = run(
        dir.path(),
        &["--data", "training.csv", "--out", "model.json", "--config", "nope.toml"],
    );
    assert!(!bad_config.status.success());
    assert!(!dir.path().join("model.json").exists());
}
