//! End-to-end tests against the built `chore` binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Helper to create a temp directory that is cleaned up on drop.
struct TempDir {
    path: PathBuf,
}

impl TempDir {
    fn new(name: &str) -> Self {
        let path = std::env::temp_dir().join(format!("chore_cli_test_{name}_{}", std::process::id()));
        let _ = fs::remove_dir_all(&path);
        fs::create_dir_all(&path).expect("failed to create temp dir");
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

fn write_script(dir: &TempDir, content: &str) {
    fs::write(dir.path().join("chore.star"), content).expect("failed to write script");
}

fn chore(dir: &TempDir, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_chore"))
        .current_dir(dir.path())
        .env("XDG_CACHE_HOME", dir.path().join("xdg-cache"))
        .args(args)
        .output()
        .expect("failed to run chore")
}

const BASIC_SCRIPT: &str = r#"
cli("demo", usage = "demo project tasks")

def hello(ctx):
    print("hello " + ctx.args.name)

def fail(ctx):
    shell("exit 9", stream = False)

command("hello", hello, help = "say hello", args = ["name"])
command("fail", fail, help = "always fails")
"#;

#[test]
fn successful_action_exits_zero() {
    let dir = TempDir::new("success");
    write_script(&dir, BASIC_SCRIPT);
    let output = chore(&dir, &["hello", "world"]);
    assert_eq!(output.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&output.stderr));
}

#[test]
fn action_failure_exits_one() {
    let dir = TempDir::new("failure");
    write_script(&dir, BASIC_SCRIPT);
    let output = chore(&dir, &["fail"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("chore:"), "stderr: {stderr}");
}

#[test]
fn unknown_command_exits_two_with_guidance() {
    let dir = TempDir::new("unknown_command");
    write_script(&dir, BASIC_SCRIPT);
    let output = chore(&dir, &["deploy"]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown command"), "stderr: {stderr}");
    // Usage guidance is printed next to the error.
    assert!(stderr.contains("Usage:"), "stderr: {stderr}");
}

#[test]
fn unknown_flag_exits_two() {
    let dir = TempDir::new("unknown_flag");
    write_script(&dir, BASIC_SCRIPT);
    let output = chore(&dir, &["hello", "world", "--bogus"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn empty_invocation_prints_help_and_exits_zero() {
    let dir = TempDir::new("root_help");
    write_script(&dir, BASIC_SCRIPT);
    let output = chore(&dir, &[]);
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("demo - demo project tasks"), "stdout: {stdout}");
    assert!(stdout.contains("hello"), "stdout: {stdout}");
}

#[test]
fn script_is_discovered_from_subdirectories() {
    let dir = TempDir::new("upward_discovery");
    write_script(&dir, BASIC_SCRIPT);
    let nested = dir.path().join("a/b");
    fs::create_dir_all(&nested).expect("failed to create nested dir");

    let output = Command::new(env!("CARGO_BIN_EXE_chore"))
        .current_dir(&nested)
        .env("XDG_CACHE_HOME", dir.path().join("xdg-cache"))
        .args(["hello", "world"])
        .output()
        .expect("failed to run chore");
    assert_eq!(output.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&output.stderr));
}

#[test]
fn missing_script_exits_two() {
    let dir = TempDir::new("missing_script");
    let output = chore(&dir, &["anything"]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("chore.star"), "stderr: {stderr}");
}

#[test]
fn registration_error_is_fatal_before_any_command_runs() {
    let dir = TempDir::new("registration_error");
    write_script(
        &dir,
        r#"
def noop(ctx):
    pass

command("test", noop)
command("test", noop)
"#,
    );
    let output = chore(&dir, &["test"]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("duplicate command"), "stderr: {stderr}");
}

#[test]
fn list_commands_prints_paths_and_flags() {
    let dir = TempDir::new("list_commands");
    write_script(
        &dir,
        r#"
def noop(ctx):
    pass

command("build", noop, flags = {"fast": {"type": "bool"}})
command("db", noop)
sub_command(["db", "migrate"], noop)
"#,
    );
    let output = chore(&dir, &["--list-commands"]);
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("build\t--fast"), "stdout: {stdout}");
    assert!(stdout.contains("db migrate"), "stdout: {stdout}");
}

#[test]
fn no_cache_flag_forces_reproduction() {
    let dir = TempDir::new("no_cache");
    write_script(
        &dir,
        r#"
def compute(ctx):
    def produce():
        shell("echo x >> produced", stream = False)
        return "v"
    print(cache("k", produce))

command("compute", compute)
"#,
    );

    // Two cached runs produce once; a bypassed run produces again.
    assert_eq!(chore(&dir, &["compute"]).status.code(), Some(0));
    assert_eq!(chore(&dir, &["compute"]).status.code(), Some(0));
    assert_eq!(chore(&dir, &["--no-cache", "compute"]).status.code(), Some(0));

    let produced = fs::read_to_string(dir.path().join("produced")).expect("produced file");
    assert_eq!(produced.lines().count(), 2);
}
