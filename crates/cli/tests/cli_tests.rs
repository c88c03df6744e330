// Integration tests for the headless commands: set, show, functions, config.
// Run with: cargo test -p termgrid-cli --test cli_tests -- --nocapture
//
// The full-screen `open` command needs a real TTY and is not covered here.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

fn termgrid(dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_termgrid"));
    cmd.current_dir(dir);
    // Never read the developer's own settings
    cmd.env("TERMGRID_CONFIG", dir.join("settings.json"));
    cmd
}

fn run(dir: &Path, args: &[&str]) -> Output {
    termgrid(dir).args(args).output().expect("run termgrid")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

fn book(dir: &TempDir) -> PathBuf {
    dir.path().join("book.tgrid")
}

// ---------------------------------------------------------------------------
// set
// ---------------------------------------------------------------------------

#[test]
fn set_creates_and_recalculates() {
    let dir = TempDir::new().unwrap();
    let path = book(&dir);
    let p = path.to_str().unwrap();

    let out = run(dir.path(), &["set", p, "A1", "10", "--create"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert!(path.exists());

    let out = run(dir.path(), &["set", p, "B1", "$=A1 * 2"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert!(stdout(&out).contains("Sheet1!B1 = 20.00"));

    // Changing the input reports the recalculated dependent
    let out = run(dir.path(), &["set", p, "A1", "-3"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let text = stdout(&out);
    assert!(text.contains("Sheet1!A1 = -3"), "{}", text);
    assert!(text.contains("B1 = -6.00"), "{}", text);
}

#[test]
fn set_without_create_on_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    let out = run(dir.path(), &["set", book(&dir).to_str().unwrap(), "A1", "1"]);
    assert_eq!(out.status.code(), Some(3));
    assert!(stderr(&out).contains("--create"));
}

#[test]
fn set_rejects_cycle_and_keeps_file() {
    let dir = TempDir::new().unwrap();
    let path = book(&dir);
    let p = path.to_str().unwrap();

    assert!(run(dir.path(), &["set", p, "A1", "$=B1 + 1", "--create"]).status.success());
    let before = std::fs::read_to_string(&path).unwrap();

    let out = run(dir.path(), &["set", p, "B1", "$=A1 + 1"]);
    assert_eq!(out.status.code(), Some(5), "stderr: {}", stderr(&out));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
}

#[test]
fn set_bad_reference_is_usage_error() {
    let dir = TempDir::new().unwrap();
    let out = run(dir.path(), &["set", book(&dir).to_str().unwrap(), "A0", "1", "--create"]);
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn set_unknown_sheet_lists_sheets() {
    let dir = TempDir::new().unwrap();
    let out = run(
        dir.path(),
        &["set", book(&dir).to_str().unwrap(), "A1", "1", "--create", "--sheet", "Nope"],
    );
    assert_eq!(out.status.code(), Some(2));
    assert!(stderr(&out).contains("Sheet1"));
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

#[test]
fn show_prints_window() {
    let dir = TempDir::new().unwrap();
    let path = book(&dir);
    let p = path.to_str().unwrap();
    assert!(run(dir.path(), &["set", p, "A1", "1", "--create"]).status.success());
    assert!(run(dir.path(), &["set", p, "A2", "2"]).status.success());
    assert!(run(dir.path(), &["set", p, "A3", "$=SUM(A1:A2)"]).status.success());
    assert!(run(dir.path(), &["set", p, "B3", "$=A3 / 0"]).status.success());

    let out = run(dir.path(), &["show", p, "--rows", "3", "--cols", "2"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let text = stdout(&out);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "Sheet1");
    // name, header, separator, three rows
    assert_eq!(lines.len(), 6, "{}", text);
    assert!(lines[5].contains("3.00"));
    assert!(lines[5].contains("#DIV/0!"));
}

#[test]
fn show_scrolled_window() {
    let dir = TempDir::new().unwrap();
    let path = book(&dir);
    let p = path.to_str().unwrap();
    assert!(run(dir.path(), &["set", p, "C10", "far", "--create"]).status.success());

    let out = run(dir.path(), &["show", p, "--at", "C10", "--rows", "1", "--cols", "1"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let text = stdout(&out);
    assert!(text.lines().nth(1).unwrap().contains('C'));
    assert!(text.lines().nth(3).unwrap().trim_start().starts_with("10 far"));
}

#[test]
fn show_missing_file() {
    let dir = TempDir::new().unwrap();
    let out = run(dir.path(), &["show", book(&dir).to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(3));
}

#[test]
fn show_rejects_unreadable_workbook() {
    let dir = TempDir::new().unwrap();
    let path = book(&dir);
    std::fs::write(&path, "not a workbook").unwrap();
    let out = run(dir.path(), &["show", path.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(4));
}

// ---------------------------------------------------------------------------
// functions / config
// ---------------------------------------------------------------------------

#[test]
fn functions_lists_registry() {
    let dir = TempDir::new().unwrap();
    let out = run(dir.path(), &["functions"]);
    assert!(out.status.success());
    let text = stdout(&out);
    let names: Vec<&str> = text.lines().collect();
    for expected in ["SUM", "AVG", "IF", "LEN", "DATEDIFF"] {
        assert!(names.contains(&expected), "missing {}", expected);
    }
    let mut sorted = names.clone();
    sorted.sort_unstable();
    assert_eq!(names, sorted);
}

#[test]
fn config_honors_settings_file() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("settings.json"), r#"{ "number.decimalPoints": 0 }"#).unwrap();

    let out = run(dir.path(), &["config"]);
    assert!(out.status.success());
    assert!(stdout(&out).contains("\"number.decimalPoints\": 0"));

    let path = book(&dir);
    let p = path.to_str().unwrap();
    assert!(run(dir.path(), &["set", p, "A1", "7", "--create"]).status.success());
    let out = run(dir.path(), &["set", p, "A2", "$=A1 / 2"]);
    assert!(stdout(&out).contains("A2 = 4"), "{}", stdout(&out));
}
