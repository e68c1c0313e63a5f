//! Header symbol collector (C3): populates the shared symbol table from
//! foreign C and C++ headers. No Rust crate parses arbitrary C/C++, so
//! this implements the "parse with the C/C++ parser" step of §4.2 as a
//! heuristic declaration extractor over the preprocessed text — the
//! narrow, contract-level foreign-header collaborator named in §1.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::cache::HeaderCache;
use crate::diagnostics::Diagnostic;
use crate::fs::FileSystem;
use crate::include_resolver::{extract, resolve};
use crate::symbol::{
    CallbackPayload, FunctionPayload, ParamInfo, Symbol, SymbolKey, SymbolKind, SymbolPayload,
};
use crate::symbol_table::SymbolTable;

const GENERATED_SENTINEL: &str = "Generated by the C-Next transpiler";

static CPP_EVIDENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(template|namespace|class|typename)\b|\benum\s+\w+\s*:\s*\w+").unwrap()
});

static TYPEDEF_AGGREGATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)typedef\s+(struct|union|enum)\s*\w*\s*\{.*?\}\s*(\w+)\s*;").unwrap()
});

static FUNCTION_PROTO_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:extern\s+)?([\w][\w\s\*]*?)\s+(\w+)\s*\(([^;{}]*)\)\s*;").unwrap()
});

static FUNCTION_POINTER_TYPEDEF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*typedef\s+([\w][\w\s\*]*?)\s*\(\s*\*\s*(\w+)\s*\)\s*\(([^;{}]*)\)\s*;").unwrap()
});

static EXTERN_VAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*extern\s+([\w][\w\s\*]*?)\s+(\w+)\s*;").unwrap());

static DEFINE_CONST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*#\s*define\s+(\w+)\s+([^\s/]+)").unwrap());

pub struct HeaderCollector {
    processed: HashSet<PathBuf>,
}

impl HeaderCollector {
    pub fn new() -> Self {
        HeaderCollector {
            processed: HashSet::new(),
        }
    }

    /// Idempotent: returns immediately if `file` was already processed
    /// this run.
    pub fn collect(
        &mut self,
        fs: &dyn FileSystem,
        file: &Path,
        table: &mut SymbolTable,
        search_paths: &[PathBuf],
        cache: Option<&mut HeaderCache>,
        cpp_mode: &mut bool,
    ) -> Vec<Diagnostic> {
        let canonical = fs.canonicalize(file).unwrap_or_else(|_| file.to_path_buf());
        if !self.processed.insert(canonical.clone()) {
            return Vec::new();
        }

        let mut diagnostics = Vec::new();
        let Ok(text) = fs.read_file(&canonical) else {
            diagnostics.push(Diagnostic::warning(
                canonical.clone(),
                0,
                0,
                "could not read header",
            ));
            return diagnostics;
        };

        if CPP_EVIDENCE_RE.is_match(&text) || has_cpp_extension(&canonical) {
            *cpp_mode = true;
        }

        let prefix: String = text.chars().take(200).collect();
        if prefix.contains(GENERATED_SENTINEL) {
            return diagnostics;
        }

        let mut restored = false;
        if let Some(cache) = cache {
            let hash = crate::cache::content_hash(&text);
            if let Some(entry) = cache.lookup(&canonical, hash) {
                table.add_symbols(&canonical, entry.symbols.clone());
                restored = true;
            }
        }

        let dir = canonical.parent().unwrap_or(Path::new(".")).to_path_buf();
        for include in extract(&text) {
            if let Some(resolved) = resolve(fs, &include.path, include.is_local, &dir, search_paths)
            {
                if matches!(
                    crate::include_resolver::classify(&resolved),
                    crate::include_resolver::FileType::CHeader
                        | crate::include_resolver::FileType::CppHeader
                ) {
                    diagnostics.extend(self.collect(
                        fs,
                        &resolved,
                        table,
                        search_paths,
                        None,
                        cpp_mode,
                    ));
                }
            }
        }

        if restored {
            return diagnostics;
        }

        let symbols = extract_declarations(&canonical, &text);
        table.add_symbols(&canonical, symbols);

        diagnostics
    }
}

fn has_cpp_extension(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("hpp") | Some("hxx") | Some("hh")
    )
}

/// Heuristic extraction of typedef'd aggregates, function prototypes,
/// extern variables, and `#define` constants. A best-effort view rather
/// than a full grammar, matching §4.2 step 4's "possibly-partial view"
/// contract for unparsable input.
fn extract_declarations(file: &Path, text: &str) -> Vec<Symbol> {
    let mut symbols = Vec::new();

    for cap in TYPEDEF_AGGREGATE_RE.captures_iter(text) {
        let kind = match &cap[1] {
            "struct" | "union" => SymbolKind::Struct,
            "enum" => SymbolKind::Enum,
            _ => SymbolKind::TypeAlias,
        };
        let name = cap[2].to_string();
        symbols.push(Symbol {
            key: SymbolKey {
                name: name.clone(),
                file: file.to_path_buf(),
            },
            kind,
            declared_type: name,
            is_exported: true,
            is_const: false,
            initial_value: None,
            payload: match kind {
                SymbolKind::Struct => SymbolPayload::Struct(Default::default()),
                SymbolKind::Enum => SymbolPayload::Enum(Default::default()),
                _ => SymbolPayload::None,
            },
        });
    }

    for cap in FUNCTION_POINTER_TYPEDEF_RE.captures_iter(text) {
        let return_type = cap[1].trim().to_string();
        let name = cap[2].to_string();
        let param_types = param_base_types(&cap[3]);
        symbols.push(Symbol {
            key: SymbolKey {
                name: name.clone(),
                file: file.to_path_buf(),
            },
            kind: SymbolKind::TypeAlias,
            declared_type: name,
            is_exported: true,
            is_const: false,
            initial_value: None,
            payload: SymbolPayload::Callback(CallbackPayload {
                return_type,
                param_types,
            }),
        });
    }

    for cap in FUNCTION_PROTO_RE.captures_iter(text) {
        let return_type = cap[1].trim().to_string();
        let name = cap[2].to_string();
        if is_control_keyword(&name) {
            continue;
        }
        let params = cap[3]
            .split(',')
            .filter_map(|raw| {
                let raw = raw.trim();
                if raw.is_empty() || raw == "void" {
                    return None;
                }
                let is_const = raw.starts_with("const ");
                let base = raw.trim_start_matches("const ").trim();
                let parts: Vec<&str> = base.rsplitn(2, char::is_whitespace).collect();
                let (pname, base_type) = if parts.len() == 2 {
                    (parts[0].trim_start_matches('*').to_string(), parts[1].to_string())
                } else {
                    ("_".to_string(), base.to_string())
                };
                Some(ParamInfo {
                    name: pname,
                    base_type,
                    is_const,
                    is_array: raw.contains('['),
                    is_auto_const: false,
                })
            })
            .collect();
        symbols.push(Symbol {
            key: SymbolKey {
                name: name.clone(),
                file: file.to_path_buf(),
            },
            kind: SymbolKind::Function,
            declared_type: return_type.clone(),
            is_exported: true,
            is_const: false,
            initial_value: None,
            payload: SymbolPayload::Function(FunctionPayload {
                params,
                return_type,
            }),
        });
    }

    for cap in EXTERN_VAR_RE.captures_iter(text) {
        let ty = cap[1].trim().to_string();
        let name = cap[2].to_string();
        symbols.push(Symbol {
            key: SymbolKey {
                name: name.clone(),
                file: file.to_path_buf(),
            },
            kind: SymbolKind::Variable,
            declared_type: ty,
            is_exported: true,
            is_const: false,
            initial_value: None,
            payload: SymbolPayload::None,
        });
    }

    for cap in DEFINE_CONST_RE.captures_iter(text) {
        let name = cap[1].to_string();
        let value = cap[2].to_string();
        symbols.push(Symbol {
            key: SymbolKey {
                name: name.clone(),
                file: file.to_path_buf(),
            },
            kind: SymbolKind::Variable,
            declared_type: "i32".to_string(),
            is_exported: true,
            is_const: true,
            initial_value: Some(value),
            payload: SymbolPayload::None,
        });
    }

    symbols
}

/// Base types of a parenthesized parameter list, in declaration order,
/// ignoring parameter names (§4.7.3 callback signature comparison only
/// needs types). `void` or an empty list yields no parameters.
fn param_base_types(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter_map(|raw| {
            let raw = raw.trim();
            if raw.is_empty() || raw == "void" {
                return None;
            }
            let base = raw.trim_start_matches("const ").trim();
            let parts: Vec<&str> = base.rsplitn(2, char::is_whitespace).collect();
            let base_type = if parts.len() == 2 { parts[1] } else { base };
            Some(base_type.trim_end_matches('*').trim().to_string())
        })
        .collect()
}

fn is_control_keyword(name: &str) -> bool {
    matches!(name, "if" | "for" | "while" | "switch" | "return" | "sizeof")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFileSystem;

    #[test]
    fn extracts_function_prototype() {
        let fs = MemoryFileSystem::new()
            .with_file("/sdk/gpio.h", "void gpio_set(int pin, int value);\n");
        let mut table = SymbolTable::new();
        let mut collector = HeaderCollector::new();
        let mut cpp = false;
        let diags = collector.collect(
            &fs,
            Path::new("/sdk/gpio.h"),
            &mut table,
            &[],
            None,
            &mut cpp,
        );
        assert!(diags.is_empty());
        let syms = table.get_symbols_by_file(Path::new("/sdk/gpio.h"));
        assert!(syms.iter().any(|s| s.name() == "gpio_set"));
        assert!(!cpp);
    }

    #[test]
    fn detects_cpp_evidence() {
        let fs = MemoryFileSystem::new()
            .with_file("/sdk/thing.h", "namespace sdk { class Thing {}; }\n");
        let mut table = SymbolTable::new();
        let mut collector = HeaderCollector::new();
        let mut cpp = false;
        collector.collect(&fs, Path::new("/sdk/thing.h"), &mut table, &[], None, &mut cpp);
        assert!(cpp);
    }

    #[test]
    fn extracts_function_pointer_typedef_as_callback() {
        let fs = MemoryFileSystem::new()
            .with_file("/sdk/cb.h", "typedef void (*OnTick)(uint32_t ms);\n");
        let mut table = SymbolTable::new();
        let mut collector = HeaderCollector::new();
        let mut cpp = false;
        collector.collect(&fs, Path::new("/sdk/cb.h"), &mut table, &[], None, &mut cpp);
        let syms = table.get_symbols_by_file(Path::new("/sdk/cb.h"));
        let cb = syms
            .iter()
            .find(|s| s.name() == "OnTick")
            .expect("OnTick symbol")
            .as_callback()
            .expect("callback payload");
        assert_eq!(cb.return_type, "void");
        assert_eq!(cb.param_types, vec!["uint32_t".to_string()]);
    }

    #[test]
    fn is_idempotent() {
        let fs = MemoryFileSystem::new().with_file("/sdk/a.h", "void f(void);\n");
        let mut table = SymbolTable::new();
        let mut collector = HeaderCollector::new();
        let mut cpp = false;
        collector.collect(&fs, Path::new("/sdk/a.h"), &mut table, &[], None, &mut cpp);
        collector.collect(&fs, Path::new("/sdk/a.h"), &mut table, &[], None, &mut cpp);
        assert_eq!(table.get_symbols_by_file(Path::new("/sdk/a.h")).len(), 1);
    }
}
