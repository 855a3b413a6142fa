use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use serde_json::Value;
use std::error::Error;
use std::fs;
use std::path::Path;

fn dataset(temp: &TempDir) -> Result<(), Box<dyn Error>> {
    temp.child("datasets/ds").create_dir_all()?;
    temp.child("datasets/ds/notes.txt")
        .write_str("contact me at a@b.com")?;
    Ok(())
}

fn analyze(temp: &TempDir) -> Result<Command, Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("teesub-cli")?;
    cmd.env_remove("ANTHROPIC_API_KEY")
        .env_remove("TEESUB_SAMPLE_SIZE")
        .args([
            "analyze",
            "--dataset-id",
            "ds-1",
            "--merkle-root",
            "0xroot",
            "--blob-id",
            "ds",
            "--policy-version",
            "policy-v1",
            "--model-version",
            "model-v1",
            "--base-dir",
            temp.child("datasets").path().to_str().unwrap(),
        ]);
    Ok(cmd)
}

fn read_json(path: &Path) -> Result<Value, Box<dyn Error>> {
    let contents = fs::read_to_string(path)?;
    let value = serde_json::from_str(contents.trim())?;
    Ok(value)
}

#[test]
fn analyze_writes_json_file_when_requested() -> Result<(), Box<dyn Error>> {
    let temp = TempDir::new()?;
    dataset(&temp)?;
    let json_file = temp.child("analyze.json");

    let output = analyze(&temp)?
        .args(["--json-file", json_file.path().to_str().unwrap()])
        .output()?;

    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    let value = read_json(json_file.path())?;
    assert_eq!(value["cmd"], "analyze");
    assert_eq!(value["verdict"], "WARN");
    assert_eq!(value["score"], 70);
    assert_eq!(value["findings"], 1);
    assert_eq!(
        value["report_hash"],
        value["response"]["payload"]["reportHash"]
    );
    assert_eq!(
        value["response"]["attestation"]["provider"],
        "LOCAL_DEV_SUBSTITUTE"
    );
    Ok(())
}

#[test]
fn print_json_with_json_file_stays_silent() -> Result<(), Box<dyn Error>> {
    let temp = TempDir::new()?;
    dataset(&temp)?;
    let json_file = temp.child("analyze.json");

    let output = analyze(&temp)?
        .args([
            "--print-json",
            "--json-file",
            json_file.path().to_str().unwrap(),
        ])
        .output()?;

    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    let value = read_json(json_file.path())?;
    assert_eq!(value["cmd"], "analyze");
    Ok(())
}

#[test]
fn print_json_emits_one_line() -> Result<(), Box<dyn Error>> {
    let temp = TempDir::new()?;
    dataset(&temp)?;

    let output = analyze(&temp)?.arg("--print-json").output()?;

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    assert_eq!(stdout.lines().count(), 1);
    let value: Value = serde_json::from_str(stdout.trim())?;
    assert_eq!(value["ok"], true);
    Ok(())
}

#[test]
fn quiet_json_file_combination_still_writes() -> Result<(), Box<dyn Error>> {
    let temp = TempDir::new()?;
    dataset(&temp)?;
    let json_file = temp.child("analyze.json");

    let output = analyze(&temp)?
        .args(["--quiet", "--json-file", json_file.path().to_str().unwrap()])
        .output()?;

    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    assert!(json_file.path().exists());
    Ok(())
}
