use std::fs;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use serde_json::Value;

/// Run the binary in list mode from `cwd`, isolated from the caller's environment.
fn run_buildlogs(cwd: &Path, args: &[&str]) -> Result<Output, Box<dyn std::error::Error>> {
    let mut command = Command::new(env!("CARGO_BIN_EXE_buildlogs"));
    for (key, _) in std::env::vars_os() {
        if key.to_string_lossy().starts_with("BUILDLOGS_") {
            command.env_remove(&key);
        }
    }
    let output = command
        .args(args)
        .env("RUST_LOG", "off")
        .stdin(Stdio::null())
        .current_dir(cwd)
        .output()
        .map_err(|err| format!("failed to spawn buildlogs: {err}"))?;
    Ok(output)
}

/// A scratch directory with an empty config so discovery never walks past it.
fn workspace() -> Result<tempfile::TempDir, Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join("buildlogs.json"), "{}")?;
    Ok(dir)
}

#[test]
fn query_prints_matching_card() -> Result<(), Box<dyn std::error::Error>> {
    let dir = workspace()?;
    let output = run_buildlogs(dir.path(), &["--no-tui", "--query", "WEBRTC"])?;
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.starts_with("Jul 26, 2025 [in-progress] [MeetSync]\n"));
    assert!(stdout.contains("Launched MeetSync | Video Calling & Meeting App"));
    assert!(stdout.contains("Tags: React.js, WebRTC, Node.js, Socket.IO"));
    assert!(!stdout.contains("Password Manager"));
    Ok(())
}

#[test]
fn json_output_respects_project_filter() -> Result<(), Box<dyn std::error::Error>> {
    let dir = workspace()?;
    let output = run_buildlogs(dir.path(), &["--json", "--project", "Store-IT"])?;
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let parsed: Value = serde_json::from_slice(&output.stdout)?;
    let entries = parsed.as_array().ok_or("expected a JSON array")?;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["title"], "Deployed Store-IT | Cloud Storage Platform");
    assert_eq!(entries[0]["nextSteps"][0], "Add folder support");
    Ok(())
}

#[test]
fn zero_matches_prints_nothing() -> Result<(), Box<dyn std::error::Error>> {
    let dir = workspace()?;
    let output = run_buildlogs(dir.path(), &["--no-tui", "--query", "zzzznotfound"])?;
    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    Ok(())
}

#[test]
fn data_file_from_config_replaces_builtin_entries() -> Result<(), Box<dyn std::error::Error>> {
    let dir = workspace()?;
    fs::create_dir_all(dir.path().join("logs"))?;
    fs::write(
        dir.path().join("logs").join("mine.json"),
        r#"[
  {"date": "2024-12-31", "title": "Shipped parser", "content": "Tokenizer rewrite", "project": "Compiler", "tags": ["rust"], "status": "planned"},
  {"date": "2025-01-01", "title": "Wrote docs", "content": "Guides", "project": "", "impact": ""}
]"#,
    )?;
    fs::write(dir.path().join("buildlogs.json"), r#"{"data": "logs/mine.json", "noTui": true}"#)?;

    let output = run_buildlogs(dir.path(), &["--status", "planned"])?;
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8(output.stdout)?;
    assert_eq!(stdout, "Dec 31, 2024 [planned] [Compiler]\nShipped parser\nTokenizer rewrite\nTags: rust\n");

    let output = run_buildlogs(dir.path(), &["--json", "--query", "docs"])?;
    let parsed: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(parsed[0]["title"], "Wrote docs");
    assert!(parsed[0].get("project").is_none());
    Ok(())
}

#[test]
fn unknown_status_fails() -> Result<(), Box<dyn std::error::Error>> {
    let dir = workspace()?;
    let output = run_buildlogs(dir.path(), &["--no-tui", "--status", "done"])?;
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("done"));
    Ok(())
}

#[test]
fn unreadable_data_file_fails_with_path() -> Result<(), Box<dyn std::error::Error>> {
    let dir = workspace()?;
    let output = run_buildlogs(dir.path(), &["--no-tui", "--data", "missing.json"])?;
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("missing.json"));
    Ok(())
}
