//! Symbol table (C5): unified per-file storage, global indices, conflict
//! detection, and external array-dimension resolution.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::diagnostics::{Diagnostic, ErrorCode};
use crate::symbol::{function_signature, FieldDim, Symbol, SymbolKind, SymbolPayload};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct Conflict {
    pub name: String,
    pub severity: ConflictSeverity,
    pub files: Vec<PathBuf>,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    /// Per-file symbol lists, insertion-ordered (drives deterministic
    /// header emission, invariant 5 in §8 of the core spec).
    by_file: IndexMap<PathBuf, Vec<Symbol>>,
    /// name -> list of (file, index into by_file[file]) for conflict
    /// detection and general lookup.
    by_name: HashMap<String, Vec<(PathBuf, usize)>>,
    /// struct/scope name -> field map, sourced from whichever file
    /// defined it. The single source of truth per invariant 5.
    struct_fields: HashMap<String, Vec<(String, crate::symbol::FieldInfo)>>,
    needs_struct_keyword: HashMap<String, bool>,
    constants: HashMap<String, String>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_symbols(&mut self, file: &Path, symbols: Vec<Symbol>) {
        let entry = self.by_file.entry(file.to_path_buf()).or_default();
        for symbol in symbols {
            let idx = entry.len();
            if let Some(struct_payload) = symbol.as_struct() {
                self.struct_fields
                    .insert(symbol.name().to_string(), struct_payload.fields.clone());
                self.needs_struct_keyword
                    .entry(symbol.name().to_string())
                    .or_insert(true);
            }
            if symbol.is_const {
                if let Some(value) = &symbol.initial_value {
                    self.constants.insert(symbol.name().to_string(), value.clone());
                }
            }
            self.by_name
                .entry(symbol.name().to_string())
                .or_default()
                .push((file.to_path_buf(), idx));
            entry.push(symbol);
        }
    }

    pub fn get_symbols_by_file(&self, file: &Path) -> &[Symbol] {
        self.by_file.get(file).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn files(&self) -> impl Iterator<Item = &PathBuf> {
        self.by_file.keys()
    }

    pub fn lookup_by_name(&self, name: &str) -> Vec<&Symbol> {
        self.by_name
            .get(name)
            .map(|refs| {
                refs.iter()
                    .filter_map(|(file, idx)| self.by_file.get(file).and_then(|v| v.get(*idx)))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn get_struct_fields(&self, name: &str) -> Option<&[(String, crate::symbol::FieldInfo)]> {
        self.struct_fields.get(name).map(|v| v.as_slice())
    }

    pub fn check_needs_struct_keyword(&self, name: &str) -> bool {
        *self.needs_struct_keyword.get(name).unwrap_or(&false)
    }

    pub fn mark_no_struct_keyword(&mut self, name: &str) {
        self.needs_struct_keyword.insert(name.to_string(), false);
    }

    /// Pairwise conflict detection: same name in different files is a
    /// hard error unless both entries are function declarations with
    /// identical signatures (§4.4). Declarations that collapse onto the
    /// same canonical path (re-included header) never conflict.
    pub fn get_conflicts(&self) -> Vec<Conflict> {
        let mut conflicts = Vec::new();
        for (name, refs) in &self.by_name {
            if refs.len() < 2 {
                continue;
            }
            let mut by_file_unique: Vec<&(PathBuf, usize)> = Vec::new();
            for r in refs {
                if !by_file_unique.iter().any(|(f, _)| f == &r.0) {
                    by_file_unique.push(r);
                }
            }
            if by_file_unique.len() < 2 {
                continue;
            }
            let symbols: Vec<&Symbol> = by_file_unique
                .iter()
                .filter_map(|(file, idx)| self.by_file.get(file).and_then(|v| v.get(*idx)))
                .collect();

            let kinds_match = symbols.windows(2).all(|w| w[0].kind == w[1].kind);
            if !kinds_match {
                conflicts.push(Conflict {
                    name: name.clone(),
                    severity: ConflictSeverity::Error,
                    files: by_file_unique.iter().map(|(f, _)| f.clone()).collect(),
                    message: format!("'{name}' is declared with different kinds across files"),
                });
                continue;
            }

            if symbols[0].kind == SymbolKind::Function {
                let sigs: Vec<_> = symbols
                    .iter()
                    .filter_map(|s| s.as_function())
                    .map(function_signature)
                    .collect();
                let all_same = sigs.windows(2).all(|w| w[0] == w[1]);
                if all_same {
                    // Compatible redeclarations across files: a warning,
                    // not a hard error (§4.4).
                    conflicts.push(Conflict {
                        name: name.clone(),
                        severity: ConflictSeverity::Warning,
                        files: by_file_unique.iter().map(|(f, _)| f.clone()).collect(),
                        message: format!(
                            "'{name}' is redeclared with an identical signature in multiple files"
                        ),
                    });
                } else {
                    conflicts.push(Conflict {
                        name: name.clone(),
                        severity: ConflictSeverity::Error,
                        files: by_file_unique.iter().map(|(f, _)| f.clone()).collect(),
                        message: format!("'{name}' is redefined with a different signature"),
                    });
                }
            } else {
                conflicts.push(Conflict {
                    name: name.clone(),
                    severity: ConflictSeverity::Error,
                    files: by_file_unique.iter().map(|(f, _)| f.clone()).collect(),
                    message: format!("'{name}' is redefined in multiple files"),
                });
            }
        }
        conflicts
    }

    pub fn as_diagnostics(conflicts: &[Conflict]) -> Vec<Diagnostic> {
        conflicts
            .iter()
            .map(|c| {
                let code = match c.severity {
                    ConflictSeverity::Error => ErrorCode::E1002,
                    ConflictSeverity::Warning => ErrorCode::E1001,
                };
                let mut d = Diagnostic::error(
                    code,
                    c.files.first().cloned().unwrap_or_default(),
                    0,
                    0,
                    c.message.clone(),
                );
                if c.severity == ConflictSeverity::Warning {
                    d.severity = crate::diagnostics::Severity::Warning;
                }
                d
            })
            .collect()
    }

    /// Substitutes named array dimensions with the numeric `initialValue`
    /// of the matching constant symbol, across every struct field and
    /// variable symbol in the table. Unresolved references are left as
    /// `Name` and only become errors when the array is actually used by
    /// the generator (§4.4).
    pub fn resolve_external_array_dimensions(&mut self) {
        let constants = self.constants.clone();
        for fields in self.struct_fields.values_mut() {
            for (_, field) in fields.iter_mut() {
                resolve_dims(&mut field.array_dims, &constants);
            }
        }
        for symbols in self.by_file.values_mut() {
            for symbol in symbols.iter_mut() {
                if let SymbolPayload::Struct(s) = &mut symbol.payload {
                    for (_, field) in s.fields.iter_mut() {
                        resolve_dims(&mut field.array_dims, &constants);
                    }
                }
            }
        }
    }

    pub fn constant_value(&self, name: &str) -> Option<&str> {
        self.constants.get(name).map(|s| s.as_str())
    }

    /// Sets `isAutoConst` on every pointer-eligible parameter C6 found
    /// unmodified (§4.5, §3 invariant 4). Run once the accumulator has
    /// reached fixed point for the file being finalized.
    pub fn apply_auto_const(
        &mut self,
        file: &Path,
        modified: &crate::modification_analyzer::ModificationAccumulator,
    ) {
        if let Some(symbols) = self.by_file.get_mut(file) {
            for symbol in symbols.iter_mut() {
                let name = symbol.key.name.clone();
                if let Some(function) = symbol.as_function_mut() {
                    let modified_params = modified.modified(&name);
                    for param in function.params.iter_mut() {
                        let pointer_eligible = !matches!(
                            param.base_type.as_str(),
                            "u8" | "u16" | "u32" | "u64" | "i8" | "i16" | "i32" | "i64" | "f32"
                                | "f64" | "bool"
                        ) || param.is_array;
                        param.is_auto_const =
                            pointer_eligible && !modified_params.contains(&param.name);
                    }
                }
            }
        }
    }
}

fn resolve_dims(dims: &mut [FieldDim], constants: &HashMap<String, String>) {
    for dim in dims.iter_mut() {
        if let FieldDim::Name(name) = dim {
            if let Some(value) = constants.get(name) {
                if let Ok(n) = value.trim().parse::<u64>() {
                    *dim = FieldDim::Literal(n);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{FunctionPayload, ParamInfo, Symbol, SymbolKey, SymbolKind, SymbolPayload};
    use std::path::PathBuf;

    fn make_fn(file: &str, name: &str, ret: &str) -> Symbol {
        Symbol {
            key: SymbolKey {
                name: name.to_string(),
                file: PathBuf::from(file),
            },
            kind: SymbolKind::Function,
            declared_type: ret.to_string(),
            is_exported: true,
            is_const: false,
            initial_value: None,
            payload: SymbolPayload::Function(FunctionPayload {
                params: vec![ParamInfo {
                    name: "p".into(),
                    base_type: "u32".into(),
                    is_const: false,
                    is_array: false,
                    is_auto_const: false,
                }],
                return_type: ret.to_string(),
            }),
        }
    }

    #[test]
    fn identical_signatures_across_files_are_a_warning() {
        let mut table = SymbolTable::new();
        table.add_symbols(Path::new("a.cnx"), vec![make_fn("a.cnx", "f", "void")]);
        table.add_symbols(Path::new("b.cnx"), vec![make_fn("b.cnx", "f", "void")]);
        let conflicts = table.get_conflicts();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].severity, ConflictSeverity::Warning);
    }

    #[test]
    fn different_signatures_across_files_are_an_error() {
        let mut table = SymbolTable::new();
        table.add_symbols(Path::new("a.cnx"), vec![make_fn("a.cnx", "f", "void")]);
        table.add_symbols(Path::new("b.cnx"), vec![make_fn("b.cnx", "f", "u32")]);
        let conflicts = table.get_conflicts();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].severity, ConflictSeverity::Error);
    }

    #[test]
    fn no_conflict_within_the_same_file() {
        let mut table = SymbolTable::new();
        table.add_symbols(
            Path::new("a.cnx"),
            vec![make_fn("a.cnx", "f", "void"), make_fn("a.cnx", "g", "void")],
        );
        assert!(table.get_conflicts().is_empty());
    }
}
