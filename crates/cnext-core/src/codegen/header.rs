//! Header emission (§4.7.9): `isExported = true` declarations with guard.

use std::path::Path;

use crate::modification_analyzer::ModificationAccumulator;
use crate::symbol::{Symbol, SymbolKind};
use crate::symbol_table::SymbolTable;

use super::signature::render_params;
use super::types;

pub fn generate_header(
    file: &Path,
    table: &SymbolTable,
    modified: &ModificationAccumulator,
    cpp_mode: bool,
    user_includes: &[String],
) -> String {
    let basename = file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("generated");
    let guard = format!("{}_H", basename.to_uppercase());

    let mut lines = Vec::new();
    lines.push(format!("#ifndef {guard}"));
    lines.push(format!("#define {guard}"));
    lines.push(String::new());
    if cpp_mode {
        lines.push("#include <cstdint>".to_string());
    } else {
        lines.push("#include <stdint.h>".to_string());
    }
    for include in user_includes {
        lines.push(format!("#include {include}"));
    }
    lines.push(String::new());

    for symbol in table.get_symbols_by_file(file) {
        if !symbol.is_exported {
            continue;
        }
        if let Some(decl) = declare_symbol(symbol, modified, cpp_mode) {
            lines.push(decl);
        }
    }

    lines.push(String::new());
    lines.push(format!("#endif // {guard}"));
    lines.join("\n")
}

/// Scope-qualified collector keys (`"Scope::member"`, `cnext_collector.rs`)
/// are lookup names, not C identifiers. The body emits scope members as
/// `Scope_member` (`codegen/mod.rs`'s `generate_scope`); the header must
/// spell the same identifier or the two never link.
fn emitted_name(name: &str) -> String {
    name.replace("::", "_")
}

fn declare_symbol(
    symbol: &Symbol,
    modified: &ModificationAccumulator,
    cpp_mode: bool,
) -> Option<String> {
    let name = emitted_name(symbol.name());
    match symbol.kind {
        SymbolKind::Enum => {
            let payload = symbol.as_enum()?;
            let backing = match payload.backing_width {
                64 => "uint64_t",
                32 => "uint32_t",
                16 => "uint16_t",
                _ => "uint8_t",
            };
            let members: Vec<String> = payload
                .members
                .iter()
                .map(|(member, value)| format!("    {name}_{member} = {value},"))
                .collect();
            Some(format!(
                "typedef {backing} {name}_t;\nenum {name} {{\n{}\n}};",
                members.join("\n"),
            ))
        }
        SymbolKind::Bitmap => {
            let payload = symbol.as_bitmap()?;
            let backing = match payload.backing_width {
                64 => "uint64_t",
                32 => "uint32_t",
                16 => "uint16_t",
                _ => "uint8_t",
            };
            Some(format!("typedef {backing} {name}_t;"))
        }
        SymbolKind::Struct => {
            let payload = symbol.as_struct()?;
            let fields: Vec<String> = payload
                .fields
                .iter()
                .map(|(field, info)| {
                    let ty = types::c_type_name(&info.ty);
                    if info.is_array {
                        format!("    {ty} {field}[];")
                    } else {
                        format!("    {ty} {field};")
                    }
                })
                .collect();
            Some(format!(
                "typedef struct {{\n{}\n}} {name}_t;",
                fields.join("\n"),
            ))
        }
        SymbolKind::Function => {
            let payload = symbol.as_function()?;
            let params = render_params(symbol.name(), payload, modified, cpp_mode);
            let decls: Vec<String> = params.into_iter().map(|p| p.declaration).collect();
            let params_text = if decls.is_empty() {
                "void".to_string()
            } else {
                decls.join(", ")
            };
            let ret = types::c_type_name(&symbol.declared_type);
            Some(format!("{ret} {name}({params_text});"))
        }
        SymbolKind::Variable => {
            let ty = types::c_type_name(&symbol.declared_type);
            Some(format!("extern {ty} {name};"))
        }
        SymbolKind::Register => Some(format!("/* register {name} mapped externally */")),
        SymbolKind::Scope | SymbolKind::TypeAlias | SymbolKind::Class => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cnext_collector;
    use crate::syntax::Parser;

    fn build_table(src: &str, path: &str) -> SymbolTable {
        let program = Parser::parse_program(src).expect("parse");
        let result = cnext_collector::collect(Path::new(path), &program);
        let mut table = SymbolTable::new();
        table.add_symbols(Path::new(path), result.symbols);
        table
    }

    #[test]
    fn exported_scope_member_function_uses_underscore_not_double_colon() {
        let table = build_table(
            "scope Counter { u8 value <- 0; public void inc() { value <- value + 1; } }",
            "a.cnx",
        );
        let modified = ModificationAccumulator::new();
        let header = generate_header(Path::new("a.cnx"), &table, &modified, false, &[]);
        assert!(header.contains("void Counter_inc(void);"), "header was:\n{header}");
        assert!(!header.contains("::"), "header was:\n{header}");
    }

    #[test]
    fn exported_scope_member_variable_uses_underscore_not_double_colon() {
        let table = build_table("scope Counter { public u8 value <- 0; }", "a.cnx");
        let modified = ModificationAccumulator::new();
        let header = generate_header(Path::new("a.cnx"), &table, &modified, false, &[]);
        assert!(header.contains("extern uint8_t Counter_value;"), "header was:\n{header}");
        assert!(!header.contains("::"), "header was:\n{header}");
    }
}
