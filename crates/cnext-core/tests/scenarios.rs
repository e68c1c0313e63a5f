//! End-to-end scenarios driven through the public `transpile` entry point
//! against real files on disk, covering the multi-file cases that the
//! in-memory single-source tests in `driver.rs` can't exercise.

use std::fs;
use std::path::PathBuf;

use cnext_core::config::Options;
use cnext_core::{transpile, TranspileRequest};

fn write(dir: &std::path::Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write fixture file");
    path
}

fn find_output(result: &cnext_core::TranspileResult, name: &str) -> &cnext_core::FileResult {
    result
        .files
        .iter()
        .find(|f| f.source_path.file_name().map(|n| n == name).unwrap_or(false))
        .unwrap_or_else(|| panic!("no file result for {name}"))
}

#[test]
fn cross_file_enum_resolves_to_scope_qualified_members() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.cnx", "enum Status { Idle, Running, Stopped }");
    let b = write(
        dir.path(),
        "b.cnx",
        "#include \"a.cnx\"\nStatus s <- Status.Idle;\nvoid start() { s <- Status.Running; }\n",
    );

    let result = transpile(TranspileRequest::Files {
        inputs: vec![b],
        options: Options::default(),
    });

    assert!(result.success, "errors: {:?}", result.errors);
    let b_out = find_output(&result, "b.cnx");
    assert!(b_out.success, "b.cnx errors: {:?}", b_out.errors);
    assert!(b_out.code.contains("Status_Idle"));
    assert!(b_out.code.contains("Status_Running"));
}

#[test]
fn array_literal_infers_its_declared_length() {
    let dir = tempfile::tempdir().unwrap();
    let file = write(
        dir.path(),
        "values.cnx",
        "const u8 VALUES[] <- [1, 2, 3, 4, 5]; void main() { u8 x <- VALUES[0]; }",
    );

    let result = transpile(TranspileRequest::Files {
        inputs: vec![file],
        options: Options::default(),
    });

    assert!(result.success, "errors: {:?}", result.errors);
    let out = find_output(&result, "values.cnx");
    assert!(out.success, "values.cnx errors: {:?}", out.errors);
    assert!(out.code.contains("VALUES[5]"), "code was:\n{}", out.code);
    assert!(out.code.contains("{ 1, 2, 3, 4, 5 }"), "code was:\n{}", out.code);
}

#[test]
fn unmodified_parameter_is_const_qualified_across_files() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.cnx", "void f(u32 p) { }");
    let b = write(
        dir.path(),
        "b.cnx",
        "#include \"a.cnx\"\nvoid g(u32 x) { f(x); }\n",
    );

    let result = transpile(TranspileRequest::Files {
        inputs: vec![b],
        options: Options::default(),
    });

    assert!(result.success, "errors: {:?}", result.errors);
    let a_out = find_output(&result, "a.cnx");
    assert!(a_out.success, "a.cnx errors: {:?}", a_out.errors);
    assert!(
        a_out.code.contains("void f(const uint32_t *p)") || a_out.code.contains("void f(const uint32_t* p)"),
        "code was:\n{}",
        a_out.code
    );
}
