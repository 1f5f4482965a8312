//! Runs every C fixture under `tests/fixtures` through the pipeline.
//!
//! `valid/*.c` must resolve with every generated name distinct; a leading
//! `// expect: N` line also requires `main` to return N. `invalid/*.c` start
//! with `// error: Kind` naming the resolve error they must produce.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use scopec_eval::Interpreter;
use scopec_parser::Parser;
use scopec_resolve::Resolver;

fn fixtures(dir: &str) -> Vec<PathBuf> {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(dir);
    let mut files: Vec<_> = fs::read_dir(&dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "c"))
        .collect();
    files.sort();
    assert!(!files.is_empty(), "no fixtures in {}", dir.display());
    files
}

fn header<'a>(source: &'a str, key: &str) -> Option<&'a str> {
    source
        .lines()
        .next()?
        .strip_prefix("// ")?
        .strip_prefix(key)?
        .strip_prefix(": ")
        .map(str::trim)
}

#[test]
fn valid_fixtures_resolve() {
    for path in fixtures("valid") {
        let source = fs::read_to_string(&path).unwrap();
        let program = Parser::parse(&source)
            .unwrap_or_else(|e| panic!("{}: {}", path.display(), e));
        let resolved = Resolver::resolve_program(program)
            .unwrap_or_else(|e| panic!("{}: {}", path.display(), e));

        let mut seen = HashSet::new();
        for binding in resolved.renamed() {
            assert!(
                seen.insert(binding.unique_name.clone()),
                "{}: '{}' generated twice",
                path.display(),
                binding.unique_name
            );
        }

        if let Some(expected) = header(&source, "expect") {
            let expected: i32 = expected.parse().unwrap();
            let value = Interpreter::run_main(&resolved.program)
                .unwrap_or_else(|e| panic!("{}: {}", path.display(), e));
            assert_eq!(value, expected, "{}", path.display());
        }
    }
}

#[test]
fn invalid_fixtures_fail_with_expected_kind() {
    for path in fixtures("invalid") {
        let source = fs::read_to_string(&path).unwrap();
        let expected = header(&source, "error")
            .unwrap_or_else(|| panic!("{}: missing '// error:' header", path.display()));

        let program = Parser::parse(&source)
            .unwrap_or_else(|e| panic!("{}: {}", path.display(), e));
        let err = match Resolver::resolve(program) {
            Ok(_) => panic!("{}: resolved without error", path.display()),
            Err(err) => err,
        };

        let kind = format!("{:?}", err.kind);
        assert!(
            kind.starts_with(expected),
            "{}: expected {}, got {}",
            path.display(),
            expected,
            kind
        );
        assert!(err.span.end <= source.len());
    }
}

#[test]
fn resolution_is_deterministic_across_fixtures() {
    for path in fixtures("valid") {
        let source = fs::read_to_string(&path).unwrap();
        let first = Resolver::resolve_program(Parser::parse(&source).unwrap()).unwrap();
        let second = Resolver::resolve_program(Parser::parse(&source).unwrap()).unwrap();
        assert_eq!(first.program, second.program, "{}", path.display());
        assert_eq!(first.bindings, second.bindings, "{}", path.display());
    }
}
