//! Include resolver (C2). Extracts `#include` directives, resolves them
//! against search paths, classifies the result, and walks the transitive
//! include graph. Grounded on the teacher's worklist-based
//! `resolve_dependencies` (visited set + candidate probing), adapted from
//! ESM import resolution to C-style quoted/angle includes.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::diagnostics::Diagnostic;
use crate::fs::FileSystem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    CNext,
    CHeader,
    CppHeader,
    Unknown,
}

pub fn classify(path: &Path) -> FileType {
    match path.extension().and_then(|e| e.to_str()) {
        Some("cnx") | Some("cnext") => FileType::CNext,
        Some("h") => FileType::CHeader,
        Some("hpp") | Some("hxx") | Some("hh") => FileType::CppHeader,
        _ => FileType::Unknown,
    }
}

#[derive(Debug, Clone)]
pub struct IncludeRef {
    pub directive_text: String,
    pub path: String,
    pub is_local: bool,
}

static INCLUDE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^\s*#\s*include\s*([<"])([^>"]+)[>"]"#).unwrap());

/// Extracts `#include` directives in file order, preserving the exact
/// directive text for later re-emission in generated headers.
pub fn extract(text: &str) -> Vec<IncludeRef> {
    INCLUDE_RE
        .captures_iter(text)
        .map(|cap| {
            let is_local = &cap[1] == "\"";
            let path = cap[2].to_string();
            IncludeRef {
                directive_text: cap[0].to_string(),
                path,
                is_local,
            }
        })
        .collect()
}

/// Resolves a single include against the source directory (local includes
/// only) followed by the configured include directories.
pub fn resolve(
    fs: &dyn FileSystem,
    raw_path: &str,
    is_local: bool,
    source_dir: &Path,
    search_paths: &[PathBuf],
) -> Option<PathBuf> {
    let mut candidates = Vec::new();
    if is_local {
        candidates.push(source_dir.join(raw_path));
    }
    for dir in search_paths {
        candidates.push(dir.join(raw_path));
    }
    candidates
        .into_iter()
        .find(|candidate| fs.exists(candidate))
        .and_then(|candidate| fs.canonicalize(&candidate).ok())
}

pub struct TransitiveResult {
    /// `.cnx`/`.cnext` files in discovery order.
    pub cnext_files: Vec<PathBuf>,
    /// Every foreign header reached transitively.
    pub headers: Vec<PathBuf>,
    /// Canonical header path -> the exact `#include` directive text that
    /// referenced it, for re-emission in generated headers.
    pub directive_for: std::collections::HashMap<PathBuf, String>,
    pub warnings: Vec<Diagnostic>,
}

/// Recursively resolves `#include`s starting from `root`, classifying
/// each reachable file. Cycles are broken by a visited set keyed on the
/// canonical path, never by aborting mid-parse.
pub fn resolve_transitive(
    fs: &dyn FileSystem,
    root: &Path,
    search_paths: &[PathBuf],
) -> TransitiveResult {
    let mut visited: HashSet<PathBuf> = HashSet::new();
    let mut cnext_files = Vec::new();
    let mut headers = Vec::new();
    let mut directive_for = std::collections::HashMap::new();
    let mut warnings = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(current) = stack.pop() {
        let canonical = fs.canonicalize(&current).unwrap_or(current.clone());
        if !visited.insert(canonical.clone()) {
            continue;
        }
        match classify(&canonical) {
            FileType::CNext => cnext_files.push(canonical.clone()),
            FileType::CHeader | FileType::CppHeader => headers.push(canonical.clone()),
            FileType::Unknown => {}
        }

        let Ok(text) = fs.read_file(&canonical) else {
            continue;
        };
        let dir = canonical.parent().unwrap_or(Path::new(".")).to_path_buf();
        for include in extract(&text) {
            match resolve(fs, &include.path, include.is_local, &dir, search_paths) {
                Some(resolved) => {
                    let resolved_canonical = fs.canonicalize(&resolved).unwrap_or(resolved);
                    if !matches!(classify(&resolved_canonical), FileType::CNext) {
                        directive_for
                            .entry(resolved_canonical.clone())
                            .or_insert_with(|| include.directive_text.clone());
                    }
                    stack.push(resolved_canonical);
                }
                None => {
                    if include.is_local {
                        warnings.push(Diagnostic::warning(
                            canonical.clone(),
                            0,
                            0,
                            format!("unresolved local include \"{}\"", include.path),
                        ));
                    }
                    // System includes that fail to resolve are silently
                    // ignored per §4.1 / §7 kind 2: the C compiler reports them.
                }
            }
        }
    }

    TransitiveResult {
        cnext_files,
        headers,
        directive_for,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFileSystem;

    #[test]
    fn extract_distinguishes_local_and_system() {
        let refs = extract("#include \"a.cnx\"\n#include <stdint.h>\n");
        assert_eq!(refs.len(), 2);
        assert!(refs[0].is_local);
        assert!(!refs[1].is_local);
    }

    #[test]
    fn classify_by_extension() {
        assert_eq!(classify(Path::new("a.cnx")), FileType::CNext);
        assert_eq!(classify(Path::new("a.cnext")), FileType::CNext);
        assert_eq!(classify(Path::new("a.h")), FileType::CHeader);
        assert_eq!(classify(Path::new("a.hpp")), FileType::CppHeader);
        assert_eq!(classify(Path::new("a.txt")), FileType::Unknown);
    }

    #[test]
    fn resolve_transitive_breaks_cycles() {
        let fs = MemoryFileSystem::new()
            .with_file("/proj/a.cnx", "#include \"b.cnx\"\n")
            .with_file("/proj/b.cnx", "#include \"a.cnx\"\n");
        let result = resolve_transitive(&fs, Path::new("/proj/a.cnx"), &[]);
        assert_eq!(result.cnext_files.len(), 2);
    }

    #[test]
    fn unresolved_local_include_is_a_warning_not_fatal() {
        let fs = MemoryFileSystem::new().with_file("/proj/a.cnx", "#include \"missing.cnx\"\n");
        let result = resolve_transitive(&fs, Path::new("/proj/a.cnx"), &[]);
        assert_eq!(result.cnext_files.len(), 1);
        assert_eq!(result.warnings.len(), 1);
    }
}
