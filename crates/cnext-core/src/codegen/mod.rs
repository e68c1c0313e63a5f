//! Code generator (C7): walks one file's parse tree once, emitting a C or
//! C++ body plus a header string (§4.7).

mod expr;
mod header;
mod signature;
mod state;
mod stmt;
mod types;

use std::path::Path;

use crate::diagnostics::Diagnostic;
use crate::modification_analyzer::ModificationAccumulator;
use crate::symbol_table::SymbolTable;
use crate::syntax::{FunctionDecl, Item, Program, ScopeDecl};

pub use state::GeneratorState;
pub use types::IncludeNeeds;

pub struct GenResult {
    pub code: String,
    pub header_code: String,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct GenOptions {
    pub cpp_mode: bool,
    pub target: Option<String>,
    pub user_includes: Vec<String>,
}

pub fn generate_file(
    file: &Path,
    program: &Program,
    table: &SymbolTable,
    modified: &ModificationAccumulator,
    options: &GenOptions,
) -> GenResult {
    let mut gen = FileGenerator {
        state: GeneratorState::new(file.to_path_buf(), options.cpp_mode, options.target.clone()),
        table,
        modified,
    };

    let mut body_sections = Vec::new();
    for item in &program.items {
        if let Some(text) = gen.generate_item(item, None) {
            body_sections.push(text);
        }
    }

    let header_code = header::generate_header(
        file,
        table,
        modified,
        options.cpp_mode,
        &options.user_includes,
    );

    let prologue = gen.prologue(file, &options.user_includes);
    let code = format!("{prologue}\n\n{}", body_sections.join("\n\n"));

    GenResult {
        code,
        header_code,
        diagnostics: gen.state.diagnostics,
    }
}

struct FileGenerator<'a> {
    state: GeneratorState,
    table: &'a SymbolTable,
    modified: &'a ModificationAccumulator,
}

impl<'a> FileGenerator<'a> {
    fn prologue(&self, file: &Path, user_includes: &[String]) -> String {
        let header_name = header_include_name(file, self.state.cpp_mode);
        let mut lines = vec![format!("#include \"{header_name}\"")];
        if self.state.includes.contains(IncludeNeeds::STDINT) {
            lines.push(include_line("stdint.h", "cstdint", self.state.cpp_mode));
        }
        if self.state.includes.contains(IncludeNeeds::STDBOOL) && !self.state.cpp_mode {
            lines.push("#include <stdbool.h>".to_string());
        }
        if self.state.includes.contains(IncludeNeeds::STRING) {
            lines.push(include_line("string.h", "cstring", self.state.cpp_mode));
        }
        if self.state.includes.contains(IncludeNeeds::LIMITS) {
            lines.push(include_line("limits.h", "climits", self.state.cpp_mode));
        }
        for include in user_includes {
            lines.push(format!("#include {include}"));
        }
        lines.join("\n")
    }

    fn generate_item(&mut self, item: &Item, scope: Option<&str>) -> Option<String> {
        match item {
            Item::Include(_) => None,
            Item::Scope(decl) => Some(self.generate_scope(decl)),
            Item::Enum(_) | Item::Bitmap(_) | Item::Struct(_) => None,
            Item::Const(v) | Item::GlobalVar(v) => Some(self.generate_global_var(v, scope)),
            Item::Function(f) => Some(self.generate_function(f, scope)),
            Item::Register(_) => None,
        }
    }

    fn generate_scope(&mut self, decl: &ScopeDecl) -> String {
        let saved = self.state.current_scope.replace(decl.name.clone());
        let mut parts = Vec::new();
        for member in &decl.members {
            if let Some(text) = self.generate_item(&member.item, Some(&decl.name)) {
                parts.push(text);
            }
        }
        self.state.current_scope = saved;
        parts.join("\n\n")
    }

    fn generate_global_var(&mut self, decl: &crate::syntax::VarDecl, scope: Option<&str>) -> String {
        self.state.need(types::include_needs_for_type(&decl.ty.name));
        let c_type = types::c_type_name(&decl.ty.name);
        let name = match scope {
            Some(s) => format!("{s}_{}", decl.name),
            None => decl.name.clone(),
        };
        let array_suffix = self.array_dims_suffix(decl);
        let init = decl
            .initializer
            .as_ref()
            .map(|e| format!(" = {}", expr::generate_expr(&mut self.state, self.table, e)))
            .unwrap_or_default();
        let qualifier = if decl.is_const { "static const " } else { "static " };
        format!("{qualifier}{c_type} {name}{array_suffix}{init};")
    }

    /// Renders `[N]` for each declared dimension, resolving a named
    /// dimension against a known constant and an empty (`[]`, parsed as a
    /// `Literal(0)` sentinel) dimension against the initializer's array
    /// literal length (§4.3 inferred array size). A named dimension with
    /// no matching constant is unresolved at the point of use (§7 E0901).
    fn array_dims_suffix(&mut self, decl: &crate::syntax::VarDecl) -> String {
        use crate::syntax::{ArrayDim, ExprKind};

        if decl.array_dims.is_empty() {
            return String::new();
        }
        let inferred_len = match &decl.initializer {
            Some(e) => match &e.kind {
                ExprKind::ArrayLiteral(items) => Some(items.len() as u64),
                _ => None,
            },
            None => None,
        };
        decl.array_dims
            .iter()
            .map(|dim| match dim {
                ArrayDim::Literal(0) => inferred_len.unwrap_or(0).to_string(),
                ArrayDim::Literal(n) => n.to_string(),
                ArrayDim::Name(name) => match self
                    .table
                    .constant_value(name)
                    .and_then(|v| v.trim().parse::<u64>().ok())
                {
                    Some(n) => n.to_string(),
                    None => {
                        self.state.diagnostics.push(crate::diagnostics::Diagnostic::error(
                            crate::diagnostics::ErrorCode::E0901,
                            self.state.file.clone(),
                            decl.span.line,
                            decl.span.column,
                            format!("array dimension '{name}' has no matching constant symbol"),
                        ));
                        name.clone()
                    }
                },
            })
            .map(|d| format!("[{d}]"))
            .collect()
    }

    fn generate_function(&mut self, decl: &FunctionDecl, scope: Option<&str>) -> String {
        self.state.reset_for_function();
        let lookup_name = match scope {
            Some(s) => format!("{s}::{}", decl.name),
            None => decl.name.clone(),
        };
        let emitted_name = match scope {
            Some(s) => format!("{s}_{}", decl.name),
            None => decl.name.clone(),
        };

        let function_payload = self
            .table
            .lookup_by_name(&lookup_name)
            .into_iter()
            .find_map(|s| s.as_function())
            .cloned();

        let params_text;
        if let Some(payload) = &function_payload {
            let rendered = signature::render_params(
                &lookup_name,
                payload,
                self.modified,
                self.state.cpp_mode,
            );
            for (info, rendered_param) in payload.params.iter().zip(&rendered) {
                self.state.need(types::include_needs_for_type(&info.base_type));
                self.state.params.insert(info.name.clone(), rendered_param.binding.clone());
            }
            params_text = if rendered.is_empty() {
                "void".to_string()
            } else {
                rendered
                    .into_iter()
                    .map(|p| p.declaration)
                    .collect::<Vec<_>>()
                    .join(", ")
            };
        } else {
            params_text = "void".to_string();
        }

        let return_type_name = if decl.name == "main" {
            "int".to_string()
        } else {
            types::c_type_name(&decl.return_type.name).to_string()
        };
        self.state.need(types::include_needs_for_type(&decl.return_type.name));

        self.state.indent = 0;
        let body = stmt::generate_block(&mut self.state, self.table, &decl.body);
        format!("{return_type_name} {emitted_name}({params_text}) {body}")
    }
}

fn header_include_name(file: &Path, cpp_mode: bool) -> String {
    let stem = file.file_stem().and_then(|s| s.to_str()).unwrap_or("generated");
    if cpp_mode {
        format!("{stem}.hpp")
    } else {
        format!("{stem}.h")
    }
}

fn include_line(c_header: &str, cpp_header: &str, cpp_mode: bool) -> String {
    if cpp_mode {
        format!("#include <{cpp_header}>")
    } else {
        format!("#include <{c_header}>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cnext_collector;
    use crate::syntax::Parser;

    fn build_table(src: &str, path: &str) -> (Program, SymbolTable) {
        let program = Parser::parse_program(src).expect("parse");
        let result = cnext_collector::collect(Path::new(path), &program);
        let mut table = SymbolTable::new();
        table.add_symbols(Path::new(path), result.symbols);
        (program, table)
    }

    #[test]
    fn scope_member_access_emits_prefixed_names() {
        let (program, table) = build_table(
            "scope Counter { u8 value <- 0; public void inc() { value <- value + 1; } public u8 get() { return value; } } void main() { }",
            "a.cnx",
        );
        let acc = ModificationAccumulator::new();
        let options = GenOptions {
            cpp_mode: false,
            target: None,
            user_includes: vec![],
        };
        let result = generate_file(Path::new("a.cnx"), &program, &table, &acc, &options);
        assert!(result.code.contains("Counter_value"));
        assert!(result.code.contains("void Counter_inc(void)"));
    }

    #[test]
    fn unmodified_param_emitted_const() {
        let (program, table) = build_table("void f(u32 p) { }", "a.cnx");
        let mut acc = ModificationAccumulator::new();
        acc.analyze_file(&program);
        let options = GenOptions {
            cpp_mode: false,
            target: None,
            user_includes: vec![],
        };
        let result = generate_file(Path::new("a.cnx"), &program, &table, &acc, &options);
        assert!(result.code.contains("const uint32_t* p"));
    }

    #[test]
    fn narrowing_assignment_is_flagged() {
        let (program, table) = build_table(
            "void test() { u32 large <- 1000; u8 small <- large; }",
            "a.cnx",
        );
        let acc = ModificationAccumulator::new();
        let options = GenOptions {
            cpp_mode: false,
            target: None,
            user_includes: vec![],
        };
        let result = generate_file(Path::new("a.cnx"), &program, &table, &acc, &options);
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.code == Some(crate::diagnostics::ErrorCode::E0381)));
    }

    #[test]
    fn empty_array_dim_infers_length_from_literal() {
        let (program, table) = build_table(
            "const u8 VALUES[] <- [1, 2, 3, 4, 5]; void main() { u8 x <- VALUES[0]; }",
            "a.cnx",
        );
        let acc = ModificationAccumulator::new();
        let options = GenOptions {
            cpp_mode: false,
            target: None,
            user_includes: vec![],
        };
        let result = generate_file(Path::new("a.cnx"), &program, &table, &acc, &options);
        assert!(result.code.contains("VALUES[5]"), "code was:\n{}", result.code);
        assert!(
            result.code.contains("{ 1, 2, 3, 4, 5 }"),
            "code was:\n{}",
            result.code
        );
    }
}
