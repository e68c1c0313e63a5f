//! Expression codegen and name resolution (§4.7.2).

use crate::diagnostics::{Diagnostic, ErrorCode};
use crate::symbol::{SymbolKind, SymbolPayload};
use crate::symbol_table::SymbolTable;
use crate::syntax::{BinOp, Expr, ExprKind, Span, UnaryOp};

use super::state::GeneratorState;
use super::types::{self, IncludeNeeds};

/// Bare-identifier resolution priority: parameters -> locals -> current
/// scope's members -> global symbols (§4.7.2).
pub fn resolve_ident(state: &GeneratorState, table: &SymbolTable, name: &str) -> String {
    if let Some(binding) = state.params.get(name) {
        if binding.is_pointer && !state.cpp_mode {
            return format!("(*{name})");
        }
        return name.to_string();
    }
    if state.locals.contains_key(name) {
        return name.to_string();
    }
    if let Some(scope) = &state.current_scope {
        let qualified = format!("{scope}::{name}");
        if table.lookup_by_name(&qualified).into_iter().next().is_some() {
            return format!("{scope}_{name}");
        }
    }
    if let Some(enum_type) = &state.expected_type {
        if enum_has_member(table, enum_type, name) {
            return enum_member_ref(state, enum_type, name);
        }
    }
    if let Some(register_ref) = register_dereference(table, name) {
        return register_ref;
    }
    name.to_string()
}

/// A bare reference to a `register` symbol emits `*((volatile T*)ADDRESS)`
/// (§4.3/§4.7 register emission supplement).
fn register_dereference(table: &SymbolTable, name: &str) -> Option<String> {
    let symbol = table
        .lookup_by_name(name)
        .into_iter()
        .find(|s| s.kind == SymbolKind::Register)?;
    let SymbolPayload::Register(payload) = &symbol.payload else {
        return None;
    };
    let c_type = types::c_type_name(&symbol.declared_type);
    Some(format!(
        "(*((volatile {c_type}*){:#x}))",
        payload.address
    ))
}

fn enum_has_member(table: &SymbolTable, enum_name: &str, member: &str) -> bool {
    table
        .lookup_by_name(enum_name)
        .into_iter()
        .find_map(|s| s.as_enum())
        .map(|e| e.members.iter().any(|(n, _)| n == member))
        .unwrap_or(false)
}

fn enum_member_ref(state: &GeneratorState, enum_name: &str, member: &str) -> String {
    if state.cpp_mode {
        format!("{enum_name}::{member}")
    } else {
        format!("{enum_name}_{member}")
    }
}

/// Renders `expr`, recording diagnostics for the type/numeric rules of
/// §4.7.4 that can be checked purely from syntax.
pub fn generate_expr(state: &mut GeneratorState, table: &SymbolTable, expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Ident(name) => {
            if table
                .lookup_by_name(name)
                .into_iter()
                .any(|s| s.kind == SymbolKind::Register)
            {
                state.need(IncludeNeeds::STDINT);
            }
            resolve_ident(state, table, name)
        }
        ExprKind::IntLiteral(v) => v.to_string(),
        ExprKind::FloatLiteral(v) => format!("{v}"),
        ExprKind::BoolLiteral(v) => v.to_string(),
        ExprKind::StringLiteral(s) => {
            state.need(IncludeNeeds::STRING);
            format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
        }
        ExprKind::ArrayLiteral(items) => {
            let parts: Vec<String> = items
                .iter()
                .map(|item| generate_expr(state, table, item))
                .collect();
            format!("{{ {} }}", parts.join(", "))
        }
        ExprKind::Member(base, field) => generate_member(state, table, base, field),
        ExprKind::ScopeQualified(path) => path.join("::"),
        ExprKind::Index(base, idx) => {
            let base_text = generate_expr(state, table, base);
            check_array_bounds(state, table, base, idx);
            let idx_text = generate_expr(state, table, idx);
            format!("{base_text}[{idx_text}]")
        }
        ExprKind::BitIndex(base, idx) => {
            let base_text = generate_expr(state, table, base);
            let idx_text = generate_expr(state, table, idx);
            if let ExprKind::IntLiteral(k) = idx.kind {
                if k < 0 {
                    state.diagnostics.push(error(
                        state,
                        expr,
                        ErrorCode::E0383,
                        "bit index must be non-negative",
                    ));
                }
            }
            match float_shadow(state, base, &base_text) {
                Some(shadow) => format!("((({shadow}) >> ({idx_text})) & 1u)"),
                None => format!("(({base_text} >> ({idx_text})) & 1u)"),
            }
        }
        ExprKind::BitRange(base, lo, width) => {
            let base_text = generate_expr(state, table, base);
            let lo_text = generate_expr(state, table, lo);
            if let ExprKind::IntLiteral(w) = width.kind {
                if w <= 0 {
                    state.diagnostics.push(error(
                        state,
                        expr,
                        ErrorCode::E0383,
                        "bit range width must be positive",
                    ));
                }
            }
            let width_text = generate_expr(state, table, width);
            match float_shadow(state, base, &base_text) {
                Some(shadow) => {
                    format!("((({shadow}) >> ({lo_text})) & ((1u << ({width_text})) - 1u))")
                }
                None => format!("(({base_text} >> ({lo_text})) & ((1u << ({width_text})) - 1u))"),
            }
        }
        ExprKind::Call(callee, args) => {
            let callee_text = generate_expr(state, table, callee);
            let arg_texts: Vec<String> = args
                .iter()
                .map(|arg| generate_call_argument(state, table, callee, arg))
                .collect();
            format!("{callee_text}({})", arg_texts.join(", "))
        }
        ExprKind::Unary(op, inner) => {
            let inner_text = generate_expr(state, table, inner);
            format!("{}{}", unary_symbol(*op), inner_text)
        }
        ExprKind::Binary(op, lhs, rhs) => {
            let lhs_text = generate_expr(state, table, lhs);
            let rhs_text = generate_expr(state, table, rhs);
            if matches!(op, BinOp::Shl | BinOp::Shr) {
                check_shift_amount(state, infer_type(state, lhs).as_deref(), rhs, expr.span);
            }
            format!("({lhs_text} {} {rhs_text})", binop_symbol(*op))
        }
        ExprKind::Ternary(cond, then_e, else_e) => {
            if is_nested_ternary(then_e) || is_nested_ternary(else_e) {
                state.diagnostics.push(error(
                    state,
                    expr,
                    ErrorCode::E0504,
                    "nested ternary expressions are not allowed",
                ));
            }
            let cond_text = generate_expr(state, table, cond);
            let then_text = generate_expr(state, table, then_e);
            let else_text = generate_expr(state, table, else_e);
            format!("({cond_text} ? {then_text} : {else_text})")
        }
        ExprKind::Cast(ty, inner) => generate_cast(state, table, ty, inner),
        ExprKind::SizeOf(inner) => {
            if has_side_effects(inner) {
                state.diagnostics.push(error(
                    state,
                    expr,
                    ErrorCode::E0505,
                    "sizeof operand must not have side effects",
                ));
            }
            let inner_text = generate_expr(state, table, inner);
            format!("sizeof({inner_text})")
        }
        ExprKind::AddressOf(inner) => {
            let inner_text = generate_expr(state, table, inner);
            format!("&{inner_text}")
        }
    }
}

fn generate_member(state: &mut GeneratorState, table: &SymbolTable, base: &Expr, field: &str) -> String {
    if let ExprKind::Ident(name) = &base.kind {
        match name.as_str() {
            "this" => {
                let scope = state.current_scope.clone().unwrap_or_default();
                return format!("{scope}_{field}");
            }
            "global" => return field.to_string(),
            _ => {
                if let Some(scope_sym) = table
                    .lookup_by_name(name)
                    .into_iter()
                    .find(|s| s.kind == SymbolKind::Scope)
                {
                    return format!("{}_{}", scope_sym.name(), field);
                }
                if enum_has_member(table, name, field) {
                    return enum_member_ref(state, name, field);
                }
            }
        }
    }
    let base_text = generate_expr(state, table, base);
    let accessor = if is_struct_pointer_base(state, base) && !state.cpp_mode {
        "->"
    } else {
        "."
    };
    format!("{base_text}{accessor}{field}")
}

fn is_struct_pointer_base(state: &GeneratorState, base: &Expr) -> bool {
    if let ExprKind::Ident(name) = &base.kind {
        if let Some(binding) = state.params.get(name) {
            return binding.is_struct && binding.is_pointer;
        }
    }
    false
}

/// Arguments bound to a pointer/reference parameter per §4.7.3 need the
/// call-site `&arg` in C when the callee's corresponding parameter was
/// emitted as a raw pointer (modified primitive/struct).
fn generate_call_argument(
    state: &mut GeneratorState,
    table: &SymbolTable,
    callee: &Expr,
    arg: &Expr,
) -> String {
    let arg_text = generate_expr(state, table, arg);
    if state.cpp_mode {
        return arg_text;
    }
    let ExprKind::Ident(callee_name) = &callee.kind else {
        return arg_text;
    };
    let Some(function) = table
        .lookup_by_name(callee_name)
        .into_iter()
        .find_map(|s| s.as_function())
    else {
        return arg_text;
    };
    // Best-effort: only Ident arguments are addressable lvalues.
    if matches!(arg.kind, ExprKind::Ident(_)) {
        let takes_pointer = function
            .params
            .first()
            .map(|p| types::is_pointer_eligible(&p.base_type, p.is_array) && !p.is_auto_const)
            .unwrap_or(false);
        if takes_pointer {
            return format!("&{arg_text}");
        }
    }
    arg_text
}

fn generate_cast(state: &mut GeneratorState, table: &SymbolTable, ty: &crate::syntax::TypeRef, inner: &Expr) -> String {
    let inner_text = generate_expr(state, table, inner);
    let target = types::c_type_name(&ty.name);
    if is_float_expr(state, inner) && types::is_integer_type(&ty.name) {
        state.need(IncludeNeeds::LIMITS);
        let max = types::type_max_macro(&ty.name);
        let min = types::type_min_macro(&ty.name);
        return format!(
            "({inner_text} > {max} ? {max} : {inner_text} < {min} ? {min} : ({target}){inner_text})"
        );
    }
    format!("({target}){inner_text}")
}

/// Best-effort declared-type lookup used for the narrowing/sign-change
/// checks (§4.7.4). Not full type inference (out of scope): only
/// identifiers with a tracked declaration and explicit casts resolve.
pub fn infer_type(state: &GeneratorState, expr: &Expr) -> Option<String> {
    match &expr.kind {
        ExprKind::Ident(name) => state
            .locals
            .get(name)
            .cloned()
            .or_else(|| state.params.get(name).map(|p| p.base_type.clone())),
        ExprKind::Cast(ty, _) => Some(ty.name.clone()),
        _ => None,
    }
}

/// Best-effort float-typed check from locally tracked declarations; the
/// generator does not perform full type inference (out of scope).
fn is_float_expr(state: &GeneratorState, expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::FloatLiteral(_) => true,
        ExprKind::Ident(name) => state
            .locals
            .get(name)
            .or_else(|| state.params.get(name).map(|p| &p.base_type))
            .map(|t| types::is_float_type(t))
            .unwrap_or(false),
        ExprKind::Binary(_, lhs, rhs) => is_float_expr(state, lhs) || is_float_expr(state, rhs),
        ExprKind::Cast(ty, _) => types::is_float_type(&ty.name),
        ExprKind::Unary(_, inner) => is_float_expr(state, inner),
        _ => false,
    }
}

fn check_array_bounds(state: &mut GeneratorState, table: &SymbolTable, base: &Expr, idx: &Expr) {
    let ExprKind::Ident(name) = &base.kind else {
        return;
    };
    let Some(&declared_len) = state.local_arrays.get(name) else {
        return;
    };
    if let ExprKind::IntLiteral(i) = idx.kind {
        if i < 0 || i as u64 >= declared_len {
            state.diagnostics.push(error(
                state,
                idx,
                ErrorCode::E0385,
                format!("index {i} out of bounds for array '{name}' of length {declared_len}"),
            ));
        }
    }
    let _ = table;
}

/// Constant shift amounts outside `[0, width(T))` are an error (§4.7.4); an
/// unknown (non-literal) shift amount or an operand of untracked type is
/// left unchecked, consistent with `infer_type`'s best-effort scope.
pub(super) fn check_shift_amount(
    state: &mut GeneratorState,
    operand_type: Option<&str>,
    amount: &Expr,
    span: Span,
) {
    let ExprKind::IntLiteral(k) = amount.kind else {
        return;
    };
    let Some(width) = operand_type.and_then(types::width_bits) else {
        return;
    };
    if k < 0 || (k as u64) >= width as u64 {
        state.diagnostics.push(Diagnostic::error(
            ErrorCode::E0383,
            state.file.clone(),
            span.line,
            span.column,
            format!("shift amount {k} out of bounds for a {width}-bit operand"),
        ));
    }
}

/// Bit-index/bit-range reads on an `f32`/`f64` base reinterpret it through a
/// shadow `uint32_t`/`uint64_t` (§4.7.6 float-bit-write) since C forbids
/// bitwise operators on floating-point types. Returns the name of a fresh
/// temp already holding the reinterpreted bits, with its declaration queued
/// in `state.pending_temps` for the enclosing statement to hoist.
fn float_shadow(state: &mut GeneratorState, base: &Expr, base_text: &str) -> Option<String> {
    let width = float_shadow_width(state, base)?;
    state.need(IncludeNeeds::STRING);
    let shadow_type = if width == 64 { "uint64_t" } else { "uint32_t" };
    let temp = state.fresh_temp();
    state.pending_temps.push(format!(
        "{shadow_type} {temp}; memcpy(&{temp}, &({base_text}), sizeof({temp}));"
    ));
    Some(temp)
}

pub(super) fn float_shadow_width(state: &GeneratorState, expr: &Expr) -> Option<u32> {
    match &expr.kind {
        ExprKind::Ident(name) => state
            .locals
            .get(name)
            .or_else(|| state.params.get(name).map(|p| &p.base_type))
            .filter(|t| types::is_float_type(t))
            .and_then(|t| types::width_bits(t)),
        ExprKind::Cast(ty, _) if types::is_float_type(&ty.name) => types::width_bits(&ty.name),
        _ => None,
    }
}

fn is_nested_ternary(expr: &Expr) -> bool {
    matches!(expr.kind, ExprKind::Ternary(_, _, _))
}

fn has_side_effects(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Call(_, _) => true,
        ExprKind::Unary(_, inner) | ExprKind::Cast(_, inner) | ExprKind::SizeOf(inner) => {
            has_side_effects(inner)
        }
        ExprKind::Binary(_, lhs, rhs) => has_side_effects(lhs) || has_side_effects(rhs),
        ExprKind::Member(base, _) => has_side_effects(base),
        ExprKind::Index(base, idx) => has_side_effects(base) || has_side_effects(idx),
        _ => false,
    }
}

fn unary_symbol(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Neg => "-",
        UnaryOp::Not => "!",
        UnaryOp::BitNot => "~",
    }
}

fn binop_symbol(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Mod => "%",
        BinOp::Eq => "==",
        BinOp::Ne => "!=",
        BinOp::Lt => "<",
        BinOp::Le => "<=",
        BinOp::Gt => ">",
        BinOp::Ge => ">=",
        BinOp::And => "&&",
        BinOp::Or => "||",
        BinOp::BitAnd => "&",
        BinOp::BitOr => "|",
        BinOp::BitXor => "^",
        BinOp::Shl => "<<",
        BinOp::Shr => ">>",
    }
}

fn error(state: &GeneratorState, expr: &Expr, code: ErrorCode, message: impl Into<String>) -> Diagnostic {
    Diagnostic::error(code, state.file.clone(), expr.span.line, expr.span.column, message)
}
