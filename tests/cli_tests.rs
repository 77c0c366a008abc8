// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const SOURCE: &str = "
Iterator<Integer> count(int n) {
    for (int i = 0; i < n; i++) step(i);
}

Iterator<Integer> twice(int n) {
    stepAll(count(n));
    stepAll(count(n));
}
";

fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).expect("Failed to write test file");
    path
}

fn genlower(args: &[&str], file: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_genlower"))
        .args(args)
        .arg(file)
        .output()
        .expect("Failed to run genlower")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_lower_prints_java() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let file = write(&dir, "gen.java", SOURCE);

    let output = genlower(&["lower"], &file);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let text = stdout(&output);
    assert!(text.contains("public final class count$Generator"));
    assert!(text.contains("public final class twice$Generator"));
    assert!(text.contains("private boolean advance()"));
}

#[test]
fn test_lower_json_to_output_file() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let file = write(&dir, "gen.java", SOURCE);
    let out = dir.path().join("classes.json");

    let output = genlower(
        &["lower", "--format", "json", "--output", out.to_str().unwrap()],
        &file,
    );
    assert!(output.status.success());

    let classes: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    let names: Vec<&str> = classes
        .as_array()
        .unwrap()
        .iter()
        .map(|class| class["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["count$Generator", "twice$Generator"]);
}

#[test]
fn test_config_changes_suffix() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let file = write(&dir, "gen.java", SOURCE);
    let config = write(&dir, "config.json", r#"{"class_suffix": "Iterator"}"#);

    let output = genlower(&["lower", "--config", config.to_str().unwrap()], &file);
    assert!(output.status.success());
    assert!(stdout(&output).contains("public final class countIterator"));
}

#[test]
fn test_check_reports_diagnostics() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let file = write(
        &dir,
        "bad.java",
        "Iterator<Integer> ok() { step(1); }\nIterator<Integer> bad() { return 3; }\n",
    );

    let output = genlower(&["check"], &file);
    assert!(!output.status.success());
    let text = stdout(&output);
    assert!(text.contains("bad: "));
    assert!(text.contains("cannot return a value"));
    assert!(text.contains("1 lowered, 1 failed"));
}

#[test]
fn test_run_prints_values() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let file = write(&dir, "gen.java", SOURCE);

    let output = genlower(&["run", "--procedure", "twice", "--arg", "2"], &file);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(stdout(&output), "0\n1\n0\n1\n");
}

#[test]
fn test_run_respects_limit() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let file = write(&dir, "gen.java", SOURCE);

    let output = genlower(&["run", "-p", "count", "-a", "100", "--limit", "3"], &file);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "0\n1\n2\n");
}

#[test]
fn test_run_reports_uncaught_failure() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let file = write(
        &dir,
        "fail.java",
        "Iterator<Integer> gen() { step(1); throw error(\"boom\"); }",
    );

    let output = genlower(&["run", "--procedure", "gen"], &file);
    assert!(!output.status.success());
    assert_eq!(stdout(&output), "1\n");
    assert!(String::from_utf8_lossy(&output.stderr).contains("boom"));
}

#[test]
fn test_json_unit_input() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let unit = r#"{"procedures": [{
        "name": "one",
        "return_type": {"name": "Iterator", "args": [{"name": "Integer"}]},
        "body": [{"kind": {"Expr": {"Call": {"callee": "step", "args": [{"Literal": {"Int": 7}}]}}}}]
    }]}"#;
    let file = write(&dir, "unit.json", unit);

    let output = genlower(&["run", "--procedure", "one"], &file);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(stdout(&output), "7\n");
}

#[test]
fn test_unknown_procedure_fails() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let file = write(&dir, "gen.java", SOURCE);

    let output = genlower(&["run", "--procedure", "missing"], &file);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("no procedure named `missing`"));
}
