//! CLI smoke tests.

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;

/// Writes a scratch input file and cleans it up on drop.
struct Fixture {
    path: PathBuf,
}

impl Fixture {
    fn new(name: &str, contents: &str) -> Self {
        let path = std::env::temp_dir().join(format!("ctex-{}-{}", std::process::id(), name));
        fs::write(&path, contents).unwrap();
        Self { path }
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn ctex() -> Command {
    Command::cargo_bin("ctex").unwrap()
}

#[test]
fn expand_prints_the_substituted_text() {
    let fixture = Fixture::new(
        "expand.ct",
        "function (arr) { return ct.last(arr).ct; }",
    );
    ctex()
        .arg("expand")
        .arg(&fixture.path)
        .assert()
        .success()
        .stdout(predicate::str::contains("(arr)[(arr).length - 1]"));
}

#[test]
fn run_prints_the_stable_form() {
    let fixture = Fixture::new(
        "run.ct",
        "function (x) { return ct.tli('x is ${x}').ct; }",
    );
    ctex()
        .arg("run")
        .arg(&fixture.path)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "(function (x) { return ('x is '+(x)); })",
        ));
}

#[test]
fn trace_emits_json_steps() {
    let fixture = Fixture::new("trace.ct", "1 + ct.mix(2 * 3).ct");
    ctex()
        .arg("trace")
        .arg(&fixture.path)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"macro_name\": \"mix\""))
        .stdout(predicate::str::contains("\"replacement\": \"6\""));
}

#[test]
fn list_names_the_builtin_macros() {
    ctex()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("mix"))
        .stdout(predicate::str::contains("afor"));
}

#[test]
fn unknown_macro_fails_with_a_diagnostic() {
    let fixture = Fixture::new("bad.ct", "ct.nope(1).ct");
    ctex()
        .arg("run")
        .arg(&fixture.path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown macro"));
}
