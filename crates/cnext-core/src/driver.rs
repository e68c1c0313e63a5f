//! Pipeline driver (A5): orders C2-C7 and owns the state that crosses
//! file boundaries — the modification accumulator, the C++-mode latch,
//! and the include-directive map (§4.6, §5). Grounded on the teacher's
//! top-level compile entry that threads one mutable context through
//! discovery, collection, and emission in a fixed phase order.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::cache::{content_hash, HeaderCache};
use crate::cnext_collector;
use crate::codegen::{self, GenOptions};
use crate::config::{find_project_root, Options};
use crate::diagnostics::{Diagnostic, Severity};
use crate::fs::{FileSystem, MemoryFileSystem, OsFileSystem};
use crate::header_collector::HeaderCollector;
use crate::include_resolver::{self, FileType};
use crate::modification_analyzer::ModificationAccumulator;
use crate::symbol_table::{Conflict, SymbolTable};
use crate::syntax::{Parser, Program};

/// The two request shapes named in §6: a list of on-disk inputs, or an
/// in-memory source text with no backing file.
pub enum TranspileRequest {
    Files {
        inputs: Vec<PathBuf>,
        options: Options,
    },
    Source {
        text: String,
        working_dir: PathBuf,
        source_path: Option<PathBuf>,
        options: Options,
    },
}

pub struct FileResult {
    pub source_path: PathBuf,
    pub code: String,
    pub header_code: Option<String>,
    pub success: bool,
    pub errors: Vec<Diagnostic>,
    pub output_path: Option<PathBuf>,
}

#[derive(Default)]
pub struct TranspileResult {
    pub success: bool,
    pub files: Vec<FileResult>,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
    pub files_processed: usize,
    pub symbols_collected: usize,
    pub output_files: Vec<PathBuf>,
    pub conflicts: Vec<Conflict>,
}

pub fn transpile(request: TranspileRequest) -> TranspileResult {
    match request {
        TranspileRequest::Files { inputs, options } => {
            let fs = OsFileSystem;
            run(&fs, &inputs, &options)
        }
        TranspileRequest::Source {
            text,
            working_dir,
            source_path,
            options,
        } => {
            let path = source_path.unwrap_or_else(|| working_dir.join("source.cnx"));
            let fs = MemoryFileSystem::new().with_file(path.clone(), text);
            run(&fs, &[path], &options)
        }
    }
}

fn debug(options: &Options, message: impl std::fmt::Display) {
    if options.debug_mode {
        println!("[DEBUG] {message}");
    }
}

fn run(fs: &dyn FileSystem, inputs: &[PathBuf], options: &Options) -> TranspileResult {
    let mut result = TranspileResult::default();
    if inputs.is_empty() {
        result.success = true;
        result
            .warnings
            .push(Diagnostic::warning(PathBuf::new(), 0, 0, "no sources discovered"));
        return result;
    }

    // Step 2: reset the cross-file modification accumulator.
    let mut modified = ModificationAccumulator::new();

    // Step 3: discover files transitively from every input.
    let mut cnext_files: Vec<PathBuf> = Vec::new();
    let mut headers: Vec<PathBuf> = Vec::new();
    let mut directive_for: HashMap<PathBuf, String> = HashMap::new();
    for input in inputs {
        let discovered = include_resolver::resolve_transitive(fs, input, &options.include_dirs);
        for f in discovered.cnext_files {
            if !cnext_files.contains(&f) {
                cnext_files.push(f);
            }
        }
        for h in discovered.headers {
            if !headers.contains(&h) {
                headers.push(h);
            }
        }
        directive_for.extend(discovered.directive_for);
        result.warnings.extend(discovered.warnings);
    }
    debug(
        options,
        format!(
            "discovered {} source file(s), {} header(s)",
            cnext_files.len(),
            headers.len()
        ),
    );

    if cnext_files.is_empty() {
        result
            .warnings
            .push(Diagnostic::warning(inputs[0].clone(), 0, 0, "no sources discovered"));
        result.success = true;
        return result;
    }

    // Step 4: files included by others are processed first.
    let mut ordered = cnext_files.clone();
    ordered.reverse();

    // Step 1: cache init, keyed off the project root starting at the
    // first input's directory (§6 "Project root").
    let start_dir = inputs[0]
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    let project_root = find_project_root(fs, &start_dir);
    let mut cache = if options.no_cache {
        None
    } else {
        project_root.as_ref().map(|root| HeaderCache::load(fs, root))
    };

    // Step 5: ensure output directories exist.
    if !options.parse_only {
        if let Some(out_dir) = &options.out_dir {
            let _ = fs.ensure_dir(out_dir);
        }
        if let Some(header_out_dir) = &options.header_out_dir {
            let _ = fs.ensure_dir(header_out_dir);
        }
    }

    // Step 6a: collect header symbols, latching C++ mode along the way.
    let mut table = SymbolTable::new();
    let mut cpp_mode = options.cpp_required;
    let mut header_collector = HeaderCollector::new();
    for header in &headers {
        let diags = header_collector.collect(
            fs,
            header,
            &mut table,
            &options.include_dirs,
            cache.as_mut(),
            &mut cpp_mode,
        );
        result.warnings.extend(diags);
    }
    if let Some(cache) = cache.as_mut() {
        for header in &headers {
            if let Ok(text) = fs.read_file(header) {
                let hash = content_hash(&text);
                let symbols = table.get_symbols_by_file(header).to_vec();
                cache.store(header, hash, symbols);
            }
        }
    }
    debug(options, format!("collected header symbols from {} file(s)", headers.len()));

    // Step 6b: parse and collect C-Next symbols. Parse trees are kept
    // around for the C6/C7 passes that follow (§9 "ownership of parse
    // trees": single-owner, borrowed by both passes).
    let mut programs: HashMap<PathBuf, Program> = HashMap::new();
    let mut parse_failures: HashMap<PathBuf, Diagnostic> = HashMap::new();
    for file in &ordered {
        let text = match fs.read_file(file) {
            Ok(text) => text,
            Err(_) => {
                parse_failures.insert(
                    file.clone(),
                    Diagnostic::warning(file.clone(), 0, 0, "could not read source"),
                );
                continue;
            }
        };
        match Parser::parse_program(&text) {
            Ok(program) => {
                let collected = cnext_collector::collect(file, &program);
                table.add_symbols(file, collected.symbols);
                result.warnings.extend(collected.diagnostics);
                programs.insert(file.clone(), program);
            }
            Err(err) => {
                parse_failures.insert(
                    file.clone(),
                    Diagnostic {
                        severity: Severity::Error,
                        code: None,
                        file: file.clone(),
                        line: err.span.line,
                        column: err.span.column,
                        message: err.message,
                        hint: None,
                    },
                );
            }
        }
    }
    let symbols_collected: usize = table.files().map(|f| table.get_symbols_by_file(f).len()).sum();
    debug(
        options,
        format!(
            "collected {symbols_collected} symbol(s) across {} file(s)",
            table.files().count()
        ),
    );

    // Step 7: resolve external array dimensions, then surface conflicts.
    table.resolve_external_array_dimensions();
    let conflicts = table.get_conflicts();
    let conflict_diags = SymbolTable::as_diagnostics(&conflicts);
    debug(options, format!("found {} conflict(s)", conflicts.len()));
    result.conflicts = conflicts;
    let fatal_conflict = conflict_diags.iter().any(|d| d.severity == Severity::Error);
    for diag in conflict_diags {
        match diag.severity {
            Severity::Error => result.errors.push(diag),
            Severity::Warning => result.warnings.push(diag),
        }
    }
    if fatal_conflict {
        // Symbol conflicts fail the run before generation (§7).
        result.files_processed = 0;
        result.symbols_collected = symbols_collected;
        result.success = false;
        return result;
    }

    // Step 8: for each file in sorted order, run C6, then C7.
    let body_ext = if cpp_mode { "cpp" } else { "c" };
    let header_ext = if cpp_mode { "hpp" } else { "h" };
    for file in &ordered {
        if let Some(diag) = parse_failures.get(file) {
            result.errors.push(diag.clone());
            result.files.push(FileResult {
                source_path: file.clone(),
                code: String::new(),
                header_code: None,
                success: false,
                errors: vec![diag.clone()],
                output_path: None,
            });
            continue;
        }
        let Some(program) = programs.get(file) else { continue };

        modified.analyze_file(program);
        table.apply_auto_const(file, &modified);

        let user_includes = file_user_includes(fs, file, &options.include_dirs, cpp_mode);
        let gen_options = GenOptions {
            cpp_mode,
            target: options.target.clone(),
            user_includes,
        };
        let gen = codegen::generate_file(file, program, &table, &modified, &gen_options);

        let file_errors: Vec<Diagnostic> = gen
            .diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .cloned()
            .collect();
        let file_warnings: Vec<Diagnostic> = gen
            .diagnostics
            .into_iter()
            .filter(|d| d.severity == Severity::Warning)
            .collect();
        result.warnings.extend(file_warnings);
        let file_success = file_errors.is_empty();
        result.errors.extend(file_errors.iter().cloned());

        let mut output_path = None;
        if file_success && !options.parse_only {
            let body_path = output_path_for(file, options.out_dir.as_ref(), body_ext, options);
            let header_path = output_path_for(
                file,
                options.header_out_dir.as_ref().or(options.out_dir.as_ref()),
                header_ext,
                options,
            );
            if fs.write_file(&body_path, &gen.code).is_ok()
                && fs.write_file(&header_path, &gen.header_code).is_ok()
            {
                result.output_files.push(body_path.clone());
                result.output_files.push(header_path);
                output_path = Some(body_path);
            }
        }

        result.files.push(FileResult {
            source_path: file.clone(),
            code: gen.code,
            header_code: Some(gen.header_code),
            success: file_success,
            errors: file_errors,
            output_path,
        });
    }

    if let Some(cache) = &cache {
        let _ = cache.flush(fs);
    }

    result.files_processed = ordered.len();
    result.symbols_collected = symbols_collected;
    result.success = result.files.iter().all(|f| f.success);
    result
}

/// `outDir`/`headerOutDir`/`basePath` relative layout (§6): strip
/// `basePath` when set, otherwise keep only the file's own name.
fn relative_layout(file: &Path, options: &Options) -> PathBuf {
    match &options.base_path {
        Some(base) => file
            .strip_prefix(base)
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|_| PathBuf::from(file.file_name().unwrap_or_default())),
        None => PathBuf::from(file.file_name().unwrap_or_default()),
    }
}

fn output_path_for(file: &Path, dir: Option<&PathBuf>, ext: &str, options: &Options) -> PathBuf {
    let rel = relative_layout(file, options).with_extension(ext);
    match dir {
        Some(d) => d.join(rel),
        None => file.with_extension(ext),
    }
}

/// Builds this file's own `user_includes` for the generated body/header:
/// foreign includes pass through verbatim, while includes of another
/// `.cnx` file are rewritten to that file's generated header (§6
/// "Include transformation").
fn file_user_includes(
    fs: &dyn FileSystem,
    file: &Path,
    search_paths: &[PathBuf],
    cpp_mode: bool,
) -> Vec<String> {
    let Ok(text) = fs.read_file(file) else {
        return Vec::new();
    };
    let dir = file.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
    include_resolver::extract(&text)
        .into_iter()
        .map(|include| {
            let resolved = include_resolver::resolve(fs, &include.path, include.is_local, &dir, search_paths);
            match resolved {
                Some(target) if include_resolver::classify(&target) == FileType::CNext => {
                    let stem = target.file_stem().and_then(|s| s.to_str()).unwrap_or("generated");
                    let ext = if cpp_mode { "hpp" } else { "h" };
                    format!("\"{stem}.{ext}\"")
                }
                _ if include.is_local => format!("\"{}\"", include.path),
                _ => format!("<{}>", include.path),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFileSystem;

    fn run_source(text: &str) -> TranspileResult {
        transpile(TranspileRequest::Source {
            text: text.to_string(),
            working_dir: PathBuf::from("/proj"),
            source_path: Some(PathBuf::from("/proj/a.cnx")),
            options: Options::default(),
        })
    }

    #[test]
    fn scope_member_access_end_to_end() {
        let result = run_source(
            "scope Counter { u8 value <- 0; public void inc() { value <- value + 1; } public u8 get() { return value; } } void main() { Counter.inc(); }",
        );
        assert!(result.success, "errors: {:?}", result.errors);
        let file = &result.files[0];
        assert!(file.code.contains("Counter_value"));
        assert!(file.code.contains("Counter_inc"));
    }

    #[test]
    fn narrowing_assignment_reports_line_three() {
        let result = run_source("void test() {\n  u32 large <- 1000;\n  u8 small <- large;\n}\n");
        assert!(!result.success);
        assert_eq!(result.files[0].errors[0].line, 3);
    }

    #[test]
    fn repeated_transpile_is_isolated() {
        let first = run_source("u8 a <- 1; void main() {}");
        let second = transpile(TranspileRequest::Source {
            text: "u8 b <- 2; void main() {}".to_string(),
            working_dir: PathBuf::from("/proj"),
            source_path: Some(PathBuf::from("/proj/a.cnx")),
            options: Options::default(),
        });
        assert!(first.files[0].code.contains(" a"));
        assert!(!first.files[0].code.contains(" b"));
        assert!(second.files[0].code.contains(" b"));
        assert!(!second.files[0].code.contains(" a"));
    }

    #[test]
    fn files_and_source_requests_agree() {
        let text = "void f(u32 p) { }";
        let fs = MemoryFileSystem::new().with_file("/proj/a.cnx", text);
        let via_files = run(&fs, &[PathBuf::from("/proj/a.cnx")], &Options::default());
        let via_source = run_source(text);
        assert_eq!(via_files.files[0].code, via_source.files[0].code);
    }
}
