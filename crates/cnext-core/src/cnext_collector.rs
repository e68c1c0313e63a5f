//! C-Next symbol collector (C4): walks the parse tree and records
//! scopes, enums, bitmaps, structs, registers, functions, and constants.

use crate::diagnostics::Diagnostic;
use crate::symbol::{
    BitmapPayload, EnumPayload, FieldDim, FieldInfo, FunctionPayload, ParamInfo, RegisterPayload,
    ScopePayload, StructPayload, Symbol, SymbolKey, SymbolKind, SymbolPayload,
};
use crate::syntax::*;
use std::path::{Path, PathBuf};

pub struct CollectResult {
    pub symbols: Vec<Symbol>,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn collect(file: &Path, program: &Program) -> CollectResult {
    let mut ctx = Ctx {
        file: file.to_path_buf(),
        scope: None,
        symbols: Vec::new(),
        diagnostics: Vec::new(),
    };
    for item in &program.items {
        ctx.collect_item(item, true);
    }
    CollectResult {
        symbols: ctx.symbols,
        diagnostics: ctx.diagnostics,
    }
}

struct Ctx {
    file: PathBuf,
    /// `Some(name)` while collecting members of `scope name { .. }`.
    scope: Option<String>,
    symbols: Vec<Symbol>,
    diagnostics: Vec<Diagnostic>,
}

fn dim_to_field(dim: &ArrayDim) -> FieldDim {
    match dim {
        ArrayDim::Literal(n) => FieldDim::Literal(*n),
        ArrayDim::Name(n) => FieldDim::Name(n.clone()),
    }
}

fn literal_text(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::IntLiteral(v) => v.to_string(),
        ExprKind::FloatLiteral(v) => v.to_string(),
        ExprKind::BoolLiteral(v) => v.to_string(),
        ExprKind::StringLiteral(s) => s.clone(),
        ExprKind::ArrayLiteral(items) => {
            let parts: Vec<String> = items.iter().map(literal_text).collect();
            format!("[{}]", parts.join(", "))
        }
        ExprKind::Unary(UnaryOp::Neg, inner) => format!("-{}", literal_text(inner)),
        ExprKind::Ident(name) => name.clone(),
        _ => String::new(),
    }
}

impl Ctx {
    fn key(&self, name: &str) -> SymbolKey {
        let full = match &self.scope {
            Some(scope) => format!("{scope}::{name}"),
            None => name.to_string(),
        };
        SymbolKey {
            name: full,
            file: self.file.clone(),
        }
    }

    /// Rewrites `this.T` to `S_T` per §4.3 when collecting inside scope `S`.
    fn normalize_type(&self, ty: &TypeRef) -> String {
        if let Some(rest) = ty.name.strip_prefix("this.") {
            if let Some(scope) = &self.scope {
                return format!("{scope}_{rest}");
            }
        }
        ty.name.clone()
    }

    fn collect_item(&mut self, item: &Item, at_top_level: bool) {
        match item {
            Item::Include(_) => {}
            Item::Scope(decl) => self.collect_scope(decl),
            Item::Enum(decl) => self.collect_enum(decl, at_top_level),
            Item::Bitmap(decl) => self.collect_bitmap(decl, at_top_level),
            Item::Struct(decl) => self.collect_struct(decl, at_top_level),
            Item::Const(decl) => self.collect_var(decl, true, at_top_level),
            Item::GlobalVar(decl) => self.collect_var(decl, false, at_top_level),
            Item::Function(decl) => self.collect_function(decl),
            Item::Register(decl) => self.collect_register(decl),
        }
    }

    fn collect_scope(&mut self, decl: &ScopeDecl) {
        let scope_symbol = Symbol {
            key: SymbolKey {
                name: decl.name.clone(),
                file: self.file.clone(),
            },
            kind: SymbolKind::Scope,
            declared_type: decl.name.clone(),
            is_exported: true,
            is_const: false,
            initial_value: None,
            payload: SymbolPayload::Scope(ScopePayload {
                members: decl.members.iter().map(|m| member_name(&m.item)).collect(),
                public_members: decl
                    .members
                    .iter()
                    .filter(|m| m.is_public)
                    .map(|m| member_name(&m.item))
                    .collect(),
            }),
        };
        self.symbols.push(scope_symbol);

        let saved = self.scope.replace(decl.name.clone());
        for member in &decl.members {
            self.collect_member(member);
        }
        self.scope = saved;
    }

    fn collect_member(&mut self, member: &ScopeMember) {
        let before = self.symbols.len();
        self.collect_item(&member.item, false);
        for symbol in &mut self.symbols[before..] {
            symbol.is_exported = member.is_public;
        }
    }

    fn collect_enum(&mut self, decl: &EnumDecl, at_top_level: bool) {
        let mut next_value: i64 = 0;
        let mut members = Vec::new();
        let mut max_abs: u64 = 0;
        for member in &decl.members {
            let value = member.explicit_value.unwrap_or(next_value);
            members.push((member.name.clone(), value));
            max_abs = max_abs.max(value.unsigned_abs());
            next_value = value + 1;
        }
        let backing_width = if max_abs > u32::MAX as u64 { 64 } else if max_abs > u16::MAX as u64 {
            32
        } else if max_abs > u8::MAX as u64 {
            16
        } else {
            8
        };
        self.symbols.push(Symbol {
            key: self.key(&decl.name),
            kind: SymbolKind::Enum,
            declared_type: decl.name.clone(),
            is_exported: at_top_level,
            is_const: false,
            initial_value: None,
            payload: SymbolPayload::Enum(EnumPayload {
                members,
                backing_width,
            }),
        });
    }

    fn collect_bitmap(&mut self, decl: &BitmapDecl, at_top_level: bool) {
        let mut offset = 0u32;
        let mut fields = Vec::new();
        for field in &decl.fields {
            if offset + field.bits > decl.width {
                self.diagnostics.push(Diagnostic::warning(
                    self.file.clone(),
                    field.span.line,
                    field.span.column,
                    format!(
                        "bitmap field '{}' overflows its {}-bit backing type",
                        field.name, decl.width
                    ),
                ));
            }
            fields.push((field.name.clone(), (offset, field.bits)));
            offset += field.bits;
        }
        self.symbols.push(Symbol {
            key: self.key(&decl.name),
            kind: SymbolKind::Bitmap,
            declared_type: decl.name.clone(),
            is_exported: at_top_level,
            is_const: false,
            initial_value: None,
            payload: SymbolPayload::Bitmap(BitmapPayload {
                backing_width: decl.width,
                fields,
            }),
        });
    }

    fn collect_struct(&mut self, decl: &StructDecl, at_top_level: bool) {
        let fields = decl
            .fields
            .iter()
            .map(|f| {
                (
                    f.name.clone(),
                    FieldInfo {
                        ty: self.normalize_type(&f.ty),
                        array_dims: f.array_dims.iter().map(dim_to_field).collect(),
                        is_array: !f.array_dims.is_empty(),
                    },
                )
            })
            .collect();
        self.symbols.push(Symbol {
            key: self.key(&decl.name),
            kind: SymbolKind::Struct,
            declared_type: decl.name.clone(),
            is_exported: at_top_level,
            is_const: false,
            initial_value: None,
            payload: SymbolPayload::Struct(StructPayload { fields }),
        });
    }

    fn collect_var(&mut self, decl: &VarDecl, is_const: bool, at_top_level: bool) {
        let initial_value = decl.initializer.as_ref().map(literal_text);
        self.symbols.push(Symbol {
            key: self.key(&decl.name),
            kind: SymbolKind::Variable,
            declared_type: self.normalize_type(&decl.ty),
            is_exported: at_top_level,
            is_const,
            initial_value,
            payload: SymbolPayload::None,
        });
    }

    fn collect_function(&mut self, decl: &FunctionDecl) {
        let params = decl
            .params
            .iter()
            .map(|p| ParamInfo {
                name: p.name.clone(),
                base_type: self.normalize_type(&p.ty),
                is_const: p.is_const,
                is_array: p.is_array,
                is_auto_const: false,
            })
            .collect();
        self.symbols.push(Symbol {
            key: self.key(&decl.name),
            kind: SymbolKind::Function,
            declared_type: self.normalize_type(&decl.return_type),
            is_exported: decl.is_public || self.scope.is_none(),
            is_const: false,
            initial_value: None,
            payload: SymbolPayload::Function(FunctionPayload {
                params,
                return_type: self.normalize_type(&decl.return_type),
            }),
        });
    }

    fn collect_register(&mut self, decl: &RegisterDecl) {
        self.symbols.push(Symbol {
            key: self.key(&decl.name),
            kind: SymbolKind::Register,
            declared_type: self.normalize_type(&decl.ty),
            is_exported: true,
            is_const: false,
            initial_value: None,
            payload: SymbolPayload::Register(RegisterPayload {
                address: decl.address,
            }),
        });
    }
}

fn member_name(item: &Item) -> String {
    match item {
        Item::Enum(d) => d.name.clone(),
        Item::Bitmap(d) => d.name.clone(),
        Item::Struct(d) => d.name.clone(),
        Item::Const(d) => d.name.clone(),
        Item::GlobalVar(d) => d.name.clone(),
        Item::Function(d) => d.name.clone(),
        Item::Register(d) => d.name.clone(),
        Item::Scope(d) => d.name.clone(),
        Item::Include(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::Parser;

    fn collect_source(src: &str) -> CollectResult {
        let program = Parser::parse_program(src).expect("parse");
        collect(Path::new("a.cnx"), &program)
    }

    #[test]
    fn enum_values_default_left_to_right_with_override() {
        let result = collect_source("enum Status { Idle, Running, Stopped <- 17, Fault }");
        let sym = result.symbols.iter().find(|s| s.name() == "Status").unwrap();
        let e = sym.as_enum().unwrap();
        assert_eq!(
            e.members,
            vec![
                ("Idle".to_string(), 0),
                ("Running".to_string(), 1),
                ("Stopped".to_string(), 17),
                ("Fault".to_string(), 18),
            ]
        );
    }

    #[test]
    fn scope_members_are_keyed_with_double_colon() {
        let result = collect_source(
            "scope Counter { u8 value <- 0; public void inc() { value <- value + 1; } }",
        );
        assert!(result.symbols.iter().any(|s| s.name() == "Counter::value"));
        let inc = result
            .symbols
            .iter()
            .find(|s| s.name() == "Counter::inc")
            .unwrap();
        assert!(inc.is_exported);
        let value = result
            .symbols
            .iter()
            .find(|s| s.name() == "Counter::value")
            .unwrap();
        assert!(!value.is_exported);
    }

    #[test]
    fn bitmap_allocates_contiguous_bits() {
        let result = collect_source("bitmap8 Flags { Enabled, Level[3], Reserved }");
        let sym = result.symbols.iter().find(|s| s.name() == "Flags").unwrap();
        let bm = sym.as_bitmap().unwrap();
        assert_eq!(bm.fields[0], ("Enabled".to_string(), (0, 1)));
        assert_eq!(bm.fields[1], ("Level".to_string(), (1, 3)));
        assert_eq!(bm.fields[2], ("Reserved".to_string(), (4, 1)));
    }
}
