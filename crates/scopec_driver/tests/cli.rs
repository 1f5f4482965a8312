use std::path::PathBuf;
use std::process::{Command, Output};

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(path)
}

fn scopec(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_scopec"))
        .args(["--color", "never"])
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

#[test]
fn run_exits_with_main_result() {
    let path = fixture("valid/nested_names.c");
    let output = scopec(&["run", path.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(28));
}

#[test]
fn resolve_prints_renamed_program_and_bindings() {
    let path = fixture("valid/block_function_declaration.c");
    let output = scopec(&["resolve", path.to_str().unwrap()]);
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("int a.0 = 10;"));
    assert!(stdout.contains("int f(int a.1);"));
    assert!(stdout.contains("return f(a.0);"));
    assert!(stdout.contains("=== Bindings ==="));

    let output = scopec(&["resolve", "--no-bindings", path.to_str().unwrap()]);
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(!stdout.contains("=== Bindings ==="));
}

#[test]
fn resolve_reports_error_with_prior_declaration() {
    let path = fixture("invalid/switch_duplicate.c");
    let output = scopec(&["resolve", path.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));

    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("duplicate declaration of 'b'"));
    assert!(stderr.contains("previous declaration is here"));
}

#[test]
fn check_reports_every_file_in_order() {
    let good = fixture("valid/for_shadow.c");
    let bad = fixture("invalid/undeclared.c");
    let also_good = fixture("valid/linkage.c");
    let output = scopec(&[
        "check",
        good.to_str().unwrap(),
        bad.to_str().unwrap(),
        also_good.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(1));

    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<_> = stdout.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].ends_with("for_shadow.c: ok (5 declarations, 4 renamed)"));
    assert!(lines[1].ends_with("undeclared.c: failed"));
    assert!(lines[2].contains("linkage.c: ok"));

    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("use of undeclared identifier 'inner'"));
    assert!(stderr.contains("1 of 3 files failed"));
}

#[test]
fn missing_file_is_an_error() {
    let output = scopec(&["parse", "does/not/exist.c"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("failed to read"));
}
