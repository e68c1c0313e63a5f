//! Statement codegen: assignment decomposition (§4.7.6), control flow,
//! atomic/critical regions (§4.7.7).

use crate::diagnostics::{Diagnostic, ErrorCode};
use crate::symbol::SymbolKind;
use crate::symbol_table::SymbolTable;
use crate::syntax::{AssignOp, AssignStmt, Block, Expr, ExprKind, Span, Stmt, StmtKind};

use super::expr::{check_shift_amount, float_shadow_width, generate_expr, infer_type, resolve_ident};
use super::state::GeneratorState;
use super::types::{self, IncludeNeeds};

pub fn generate_block(state: &mut GeneratorState, table: &SymbolTable, block: &Block) -> String {
    state.indent += 1;
    let mut lines = Vec::new();
    for stmt in &block.stmts {
        lines.push(generate_stmt(state, table, stmt));
    }
    state.indent -= 1;
    let indent = state.indent_str();
    format!("{{\n{}\n{indent}}}", lines.join("\n"))
}

pub fn generate_stmt(state: &mut GeneratorState, table: &SymbolTable, stmt: &Stmt) -> String {
    // `pending_temps` is a single shared vec across the whole tree walk; a
    // nested statement (e.g. a loop body) may push and drain its own temps
    // before this call resumes, so only the slice pushed by *this* call's
    // own expression evaluation (from `start` onward) belongs to it.
    let start = state.pending_temps.len();
    let rendered = generate_stmt_inner(state, table, stmt);
    if state.pending_temps.len() == start {
        return rendered;
    }
    let indent = state.indent_str();
    let temps: String = state
        .pending_temps
        .split_off(start)
        .into_iter()
        .map(|t| format!("{indent}{t}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{temps}\n{rendered}")
}

fn generate_stmt_inner(state: &mut GeneratorState, table: &SymbolTable, stmt: &Stmt) -> String {
    let indent = state.indent_str();
    match &stmt.kind {
        StmtKind::VarDecl(decl) => {
            if let Some(init) = &decl.initializer {
                check_assignment_type_rules(state, &decl.ty.name, init, stmt.span);
            }
            state.locals.insert(decl.name.clone(), decl.ty.name.clone());
            if let Some(len) = decl.array_dims.first() {
                if let crate::syntax::ArrayDim::Literal(n) = len {
                    state.local_arrays.insert(decl.name.clone(), *n);
                }
            }
            state.need(super::types::include_needs_for_type(&decl.ty.name));
            let c_type = super::types::c_type_name(&decl.ty.name);
            let init = decl
                .initializer
                .as_ref()
                .map(|e| format!(" = {}", generate_expr(state, table, e)))
                .unwrap_or_default();
            let brackets = if decl.array_dims.is_empty() {
                String::new()
            } else {
                "[]".to_string()
            };
            format!("{indent}{c_type} {}{brackets}{init};", decl.name)
        }
        StmtKind::Assign(assign) => generate_assign(state, table, assign, &indent),
        StmtKind::If(s) => {
            let cond = generate_expr(state, table, &s.cond);
            let then_text = generate_block(state, table, &s.then_branch);
            let mut text = format!("{indent}if ({cond}) {then_text}");
            if let Some(else_b) = &s.else_branch {
                let else_text = generate_block(state, table, else_b);
                text.push_str(&format!(" else {else_text}"));
            }
            text
        }
        StmtKind::While(s) => {
            let cond = generate_expr(state, table, &s.cond);
            let body = generate_block(state, table, &s.body);
            format!("{indent}while ({cond}) {body}")
        }
        StmtKind::DoWhile(s) => {
            check_boolean_condition(state, &s.cond, ErrorCode::E0504);
            let body = generate_block(state, table, &s.body);
            let cond = generate_expr(state, table, &s.cond);
            format!("{indent}do {body} while ({cond});")
        }
        StmtKind::For(s) => {
            let init = s
                .init
                .as_ref()
                .map(|i| generate_stmt(state, table, i).trim_start().trim_end_matches(';').to_string())
                .unwrap_or_default();
            let cond = s
                .cond
                .as_ref()
                .map(|c| generate_expr(state, table, c))
                .unwrap_or_default();
            let step = s
                .step
                .as_ref()
                .map(|st| generate_stmt(state, table, st).trim_start().trim_end_matches(';').to_string())
                .unwrap_or_default();
            let body = generate_block(state, table, &s.body);
            format!("{indent}for ({init}; {cond}; {step}) {body}")
        }
        StmtKind::Switch(s) => generate_switch(state, table, s, &indent),
        StmtKind::Return(Some(e)) => {
            let text = generate_expr(state, table, e);
            format!("{indent}return {text};")
        }
        StmtKind::Return(None) => format!("{indent}return;"),
        StmtKind::Break => format!("{indent}break;"),
        StmtKind::Expr(e) => format!("{indent}{};", generate_expr(state, table, e)),
        StmtKind::Critical(body) => generate_critical(state, table, body, &indent),
        StmtKind::Atomic(body) => generate_atomic(state, table, body, &indent),
        StmtKind::Block(body) => format!("{indent}{}", generate_block(state, table, body)),
    }
}

fn generate_assign(
    state: &mut GeneratorState,
    table: &SymbolTable,
    assign: &AssignStmt,
    indent: &str,
) -> String {
    check_const_target(state, table, assign);
    let op = assign_op_symbol(assign.op);
    match &assign.target.kind {
        ExprKind::BitIndex(base, idx) => {
            let base_text = generate_expr(state, table, base);
            let idx_text = generate_expr(state, table, idx);
            let value = generate_expr(state, table, &assign.value);
            match float_shadow_width(state, base) {
                Some(width) => float_bit_write(state, indent, width, &base_text, |shadow| {
                    format!("({shadow} & ~(1u << ({idx_text}))) | ((({value}) & 1u) << ({idx_text}))")
                }),
                None => format!(
                    "{indent}{base_text} = ({base_text} & ~(1u << ({idx_text}))) | ((({value}) & 1u) << ({idx_text}));"
                ),
            }
        }
        ExprKind::BitRange(base, lo, width) => {
            let base_text = generate_expr(state, table, base);
            let lo_text = generate_expr(state, table, lo);
            let width_text = generate_expr(state, table, width);
            let value = generate_expr(state, table, &assign.value);
            match float_shadow_width(state, base) {
                Some(shadow_width) => {
                    float_bit_write(state, indent, shadow_width, &base_text, |shadow| {
                        format!(
                            "({shadow} & ~(((1u << ({width_text})) - 1u) << ({lo_text}))) | (({value} & ((1u << ({width_text})) - 1u)) << ({lo_text}))"
                        )
                    })
                }
                None => format!(
                    "{indent}{base_text} = ({base_text} & ~(((1u << ({width_text})) - 1u) << ({lo_text}))) | (({value} & ((1u << ({width_text})) - 1u)) << ({lo_text}));"
                ),
            }
        }
        _ => {
            if let Some(target_type) = infer_type(state, &assign.target) {
                check_assignment_type_rules(state, &target_type, &assign.value, assign.span);
                if matches!(assign.op, AssignOp::Shl | AssignOp::Shr) {
                    check_shift_amount(state, Some(target_type.as_str()), &assign.value, assign.span);
                }
            }
            if let ExprKind::Member(base, field) = &assign.target.kind {
                check_bitmap_field_literal(state, table, base, field, &assign.value, assign.span);
                check_callback_signature(state, table, base, field, &assign.value, assign.span);
            }
            let target = generate_expr(state, table, &assign.target);
            let value = generate_expr(state, table, &assign.value);
            format!("{indent}{target} {op} {value};")
        }
    }
}

/// Writes a bit-index/bit-range target whose base is `f32`/`f64` by
/// reinterpreting it through a shadow integer (§4.7.6 float-bit-write),
/// since C forbids bitwise operators directly on floating-point operands.
/// `compute_new_value` receives the shadow temp's name and returns the
/// expression assigned back into it.
fn float_bit_write(
    state: &mut GeneratorState,
    indent: &str,
    width: u32,
    base_text: &str,
    compute_new_value: impl FnOnce(&str) -> String,
) -> String {
    state.need(IncludeNeeds::STRING);
    let shadow_type = if width == 64 { "uint64_t" } else { "uint32_t" };
    let temp = state.fresh_temp();
    let new_value = compute_new_value(&temp);
    format!(
        "{indent}{{\n\
         {indent}    {shadow_type} {temp};\n\
         {indent}    memcpy(&{temp}, &({base_text}), sizeof({temp}));\n\
         {indent}    {temp} = {new_value};\n\
         {indent}    memcpy(&({base_text}), &{temp}, sizeof({temp}));\n\
         {indent}}}"
    )
}

/// A literal written into a bitmap field must fit in the field's declared
/// bit width (§7 E0384).
fn check_bitmap_field_literal(
    state: &mut GeneratorState,
    table: &SymbolTable,
    base: &Expr,
    field: &str,
    value: &Expr,
    span: Span,
) {
    let ExprKind::IntLiteral(v) = value.kind else {
        return;
    };
    let ExprKind::Ident(base_name) = &base.kind else {
        return;
    };
    let Some(base_type) = state
        .locals
        .get(base_name)
        .cloned()
        .or_else(|| state.params.get(base_name).map(|p| p.base_type.clone()))
    else {
        return;
    };
    let Some(width) = table
        .lookup_by_name(&base_type)
        .into_iter()
        .find_map(|s| s.as_bitmap())
        .and_then(|b| b.fields.iter().find(|(n, _)| n == field).map(|(_, (_, w))| *w))
    else {
        return;
    };
    let max = if width >= 64 { u64::MAX } else { (1u64 << width) - 1 };
    if v < 0 || (v as u64) > max {
        state.diagnostics.push(Diagnostic::error(
            ErrorCode::E0384,
            state.file.clone(),
            span.line,
            span.column,
            format!("literal {v} does not fit in {width}-bit bitmap field '{field}'"),
        ));
    }
}

/// A function assigned to a struct field typed by a function-pointer
/// typedef must match that typedef's signature (§4.7.3, §7 E0424).
fn check_callback_signature(
    state: &mut GeneratorState,
    table: &SymbolTable,
    base: &Expr,
    field: &str,
    value: &Expr,
    span: Span,
) {
    let ExprKind::Ident(fn_name) = &value.kind else {
        return;
    };
    let Some(function) = table.lookup_by_name(fn_name).into_iter().find_map(|s| s.as_function()) else {
        return;
    };
    let Some(base_name) = base_ident(base) else {
        return;
    };
    let Some(struct_type) = variable_type(state, table, base_name) else {
        return;
    };
    let Some(field_ty) = table
        .get_struct_fields(&struct_type)
        .and_then(|fields| fields.iter().find(|(n, _)| n == field))
        .map(|(_, info)| info.ty.clone())
    else {
        return;
    };
    let Some(callback) = table.lookup_by_name(&field_ty).into_iter().find_map(|s| s.as_callback()) else {
        return;
    };
    let params_match = function.params.len() == callback.param_types.len()
        && function
            .params
            .iter()
            .zip(&callback.param_types)
            .all(|(p, ty)| types::c_type_name(&p.base_type) == ty.as_str());
    if !params_match || types::c_type_name(&function.return_type) != callback.return_type {
        state.diagnostics.push(Diagnostic::error(
            ErrorCode::E0424,
            state.file.clone(),
            span.line,
            span.column,
            format!(
                "function '{fn_name}' does not match callback signature of '{field_ty}' for field '{field}'"
            ),
        ));
    }
}

fn base_ident(base: &Expr) -> Option<&str> {
    match &base.kind {
        ExprKind::Ident(name) => Some(name.as_str()),
        _ => None,
    }
}

/// Narrowing (`u32 -> u8`) and sign-changing assignments are errors
/// (§4.7.4); bit-indexing is the sanctioned narrowing path instead.
fn check_assignment_type_rules(
    state: &mut GeneratorState,
    target_type: &str,
    value: &crate::syntax::Expr,
    span: crate::syntax::Span,
) {
    let Some(source_type) = infer_type(state, value) else {
        return;
    };
    let (Some(target_width), Some(source_width)) =
        (types::width_bits(target_type), types::width_bits(&source_type))
    else {
        return;
    };
    if types::is_integer_type(target_type) && types::is_integer_type(&source_type) {
        if types::is_signed(target_type) != types::is_signed(&source_type) {
            state.diagnostics.push(Diagnostic::error(
                ErrorCode::E0382,
                state.file.clone(),
                span.line,
                span.column,
                format!("sign-changing assignment from '{source_type}' to '{target_type}'"),
            ));
            return;
        }
        if source_width > target_width {
            state.diagnostics.push(Diagnostic::error(
                ErrorCode::E0381,
                state.file.clone(),
                span.line,
                span.column,
                format!("narrowing assignment from '{source_type}' to '{target_type}'"),
            ));
        }
    }
}

fn check_const_target(state: &mut GeneratorState, _table: &SymbolTable, assign: &AssignStmt) {
    if let ExprKind::Ident(name) = &assign.target.kind {
        if let Some(binding) = state.params.get(name) {
            if binding.is_const {
                state.diagnostics.push(Diagnostic::error(
                    ErrorCode::E0503,
                    state.file.clone(),
                    assign.span.line,
                    assign.span.column,
                    format!("write to const-qualified parameter '{name}'"),
                ));
            }
        }
    }
}

fn check_boolean_condition(state: &mut GeneratorState, cond: &crate::syntax::Expr, code: ErrorCode) {
    let is_boolean_shaped = matches!(
        cond.kind,
        ExprKind::BoolLiteral(_)
            | ExprKind::Binary(crate::syntax::BinOp::Eq, _, _)
            | ExprKind::Binary(crate::syntax::BinOp::Ne, _, _)
            | ExprKind::Binary(crate::syntax::BinOp::Lt, _, _)
            | ExprKind::Binary(crate::syntax::BinOp::Le, _, _)
            | ExprKind::Binary(crate::syntax::BinOp::Gt, _, _)
            | ExprKind::Binary(crate::syntax::BinOp::Ge, _, _)
            | ExprKind::Binary(crate::syntax::BinOp::And, _, _)
            | ExprKind::Binary(crate::syntax::BinOp::Or, _, _)
            | ExprKind::Unary(crate::syntax::UnaryOp::Not, _)
    );
    if !is_boolean_shaped {
        state.diagnostics.push(Diagnostic::error(
            code,
            state.file.clone(),
            cond.span.line,
            cond.span.column,
            "condition must be a boolean expression",
        ));
    }
}

fn generate_switch(
    state: &mut GeneratorState,
    table: &SymbolTable,
    s: &crate::syntax::SwitchStmt,
    indent: &str,
) -> String {
    if s.cases.len() < 2 && s.default.is_none() {
        state.diagnostics.push(Diagnostic::error(
            ErrorCode::E0701,
            state.file.clone(),
            s.span.line,
            s.span.column,
            "switch must have at least two cases or a default clause",
        ));
    }
    if let Some(enum_name) = switch_enum_type(state, table, &s.scrutinee) {
        if let Some(missing) = missing_enum_variants(table, &enum_name, s) {
            match &s.default {
                None => {
                    state.diagnostics.push(Diagnostic::error(
                        ErrorCode::E0701,
                        state.file.clone(),
                        s.span.line,
                        s.span.column,
                        format!("switch does not cover all variants of '{enum_name}'"),
                    ));
                }
                Some((_, Some(asserted))) if *asserted as usize != missing.len() => {
                    state.diagnostics.push(Diagnostic::error(
                        ErrorCode::E0702,
                        state.file.clone(),
                        s.span.line,
                        s.span.column,
                        format!(
                            "default({asserted}) does not match the {} statically missing variant(s)",
                            missing.len()
                        ),
                    ));
                }
                _ => {}
            }
        }
    }

    let scrutinee = generate_expr(state, table, &s.scrutinee);
    state.indent += 1;
    let mut body = Vec::new();
    for case in &s.cases {
        let value = generate_expr(state, table, &case.value);
        body.push(format!("{}case {value}: {{", state.indent_str()));
        let case_block = generate_block(state, table, &case.body);
        body.push(case_block);
        body.push(format!("{}break;", state.indent_str()));
        body.push(format!("{}}}", state.indent_str()));
    }
    if let Some((default_body, _)) = &s.default {
        body.push(format!("{}default: {{", state.indent_str()));
        body.push(generate_block(state, table, default_body));
        body.push(format!("{}break;", state.indent_str()));
        body.push(format!("{}}}", state.indent_str()));
    }
    state.indent -= 1;
    format!("{indent}switch ({scrutinee}) {{\n{}\n{indent}}}", body.join("\n"))
}

fn switch_enum_type(_state: &GeneratorState, table: &SymbolTable, scrutinee: &crate::syntax::Expr) -> Option<String> {
    if let ExprKind::Ident(name) = &scrutinee.kind {
        for sym in table.lookup_by_name(name) {
            if sym.as_enum().is_some() {
                return Some(sym.name().to_string());
            }
        }
    }
    None
}

fn missing_enum_variants(
    table: &SymbolTable,
    enum_name: &str,
    s: &crate::syntax::SwitchStmt,
) -> Option<Vec<String>> {
    let members = table
        .lookup_by_name(enum_name)
        .into_iter()
        .find_map(|sym| sym.as_enum())?
        .members
        .iter()
        .map(|(n, _)| n.clone())
        .collect::<Vec<_>>();
    let covered: Vec<&str> = s
        .cases
        .iter()
        .filter_map(|c| match &c.value.kind {
            ExprKind::Member(_, field) => Some(field.as_str()),
            ExprKind::Ident(name) => Some(name.as_str()),
            _ => None,
        })
        .collect();
    let missing: Vec<String> = members
        .into_iter()
        .filter(|m| !covered.contains(&m.as_str()))
        .collect();
    Some(missing)
}

/// `critical { .. }` saves/restores the interrupt mask; early exits inside
/// it are errors (§4.7.7).
fn generate_critical(state: &mut GeneratorState, table: &SymbolTable, body: &Block, indent: &str) -> String {
    reject_early_exit(state, body);
    let save_restore = target_critical_section(state.target.as_deref());
    state.need(IncludeNeeds::CMSIS);
    let inner = generate_block(state, table, body);
    format!(
        "{indent}{{\n{indent}    {};\n{indent}    {inner}\n{indent}    {};\n{indent}}}",
        save_restore.0, save_restore.1
    )
}

fn target_critical_section(target: Option<&str>) -> (&'static str, &'static str) {
    match target {
        Some("teensy41") | Some("cortex-m4") | Some("cortex-m7") => (
            "uint32_t __cnx_primask; __asm volatile (\"MRS %0, primask\" : \"=r\" (__cnx_primask)); __asm volatile (\"cpsid i\")",
            "__asm volatile (\"MSR primask, %0\" : : \"r\" (__cnx_primask))",
        ),
        Some("avr") => (
            "uint8_t __cnx_sreg = SREG; cli()",
            "SREG = __cnx_sreg",
        ),
        _ => (
            "uint32_t __cnx_primask = __get_PRIMASK(); __disable_irq()",
            "__set_PRIMASK(__cnx_primask)",
        ),
    }
}

fn reject_early_exit(state: &mut GeneratorState, body: &Block) {
    for stmt in &body.stmts {
        match &stmt.kind {
            StmtKind::Return(_) | StmtKind::Break => {
                state.diagnostics.push(Diagnostic::error(
                    ErrorCode::E0703,
                    state.file.clone(),
                    stmt.span.line,
                    stmt.span.column,
                    "early exit is not allowed inside a critical region",
                ));
            }
            StmtKind::If(s) => {
                reject_early_exit(state, &s.then_branch);
                if let Some(e) = &s.else_branch {
                    reject_early_exit(state, e);
                }
            }
            StmtKind::Block(b) => reject_early_exit(state, b),
            _ => {}
        }
    }
}

/// Atomic read-modify-write (§4.7.7): a single integer compound-assignment
/// body (`x +<- v;`, `x &<- v;`, ...) lowers to a genuine LDREX/STREX retry
/// loop on capable cores. Anything else a body could contain — more than
/// one statement, a non-integer or untyped target, an RHS that calls a
/// function and so can't safely re-run on a STREX retry — falls back to
/// the same interrupt-mask guard `critical { }` uses, since the exclusive
/// monitor only ever protects a single load/store pair.
fn generate_atomic(state: &mut GeneratorState, table: &SymbolTable, body: &Block, indent: &str) -> String {
    let capable = matches!(state.target.as_deref(), Some("cortex-m4") | Some("cortex-m7"));
    if capable {
        if let Some(ldrex_loop) = try_generate_ldrex_loop(state, table, body, indent) {
            return ldrex_loop;
        }
    }
    let inner = generate_block(state, table, body);
    let guard = target_critical_section(state.target.as_deref());
    state.need(IncludeNeeds::CMSIS);
    format!(
        "{indent}{{\n{indent}    {}; \n{indent}    {inner}\n{indent}    {};\n{indent}}}",
        guard.0, guard.1
    )
}

fn try_generate_ldrex_loop(
    state: &mut GeneratorState,
    table: &SymbolTable,
    body: &Block,
    indent: &str,
) -> Option<String> {
    if body.stmts.len() != 1 {
        return None;
    }
    let StmtKind::Assign(assign) = &body.stmts[0].kind else {
        return None;
    };
    let ExprKind::Ident(name) = &assign.target.kind else {
        return None;
    };
    let binop = match assign.op {
        AssignOp::Add => "+",
        AssignOp::Sub => "-",
        AssignOp::BitAnd => "&",
        AssignOp::BitOr => "|",
        AssignOp::BitXor => "^",
        _ => return None,
    };
    if contains_call(&assign.value) {
        return None;
    }
    let target_type = variable_type(state, table, name)?;
    if !types::is_integer_type(&target_type) {
        return None;
    }
    let suffix = match types::width_bits(&target_type)? {
        8 => "B",
        16 => "H",
        32 => "W",
        _ => return None,
    };
    let c_type = types::c_type_name(&target_type);
    state.need(IncludeNeeds::CMSIS);
    let addr = resolve_ident(state, table, name);
    let value_text = generate_expr(state, table, &assign.value);
    let temp = state.fresh_temp();
    Some(format!(
        "{indent}{{\n\
         {indent}    {c_type} {temp};\n\
         {indent}    do {{\n\
         {indent}        {temp} = __LDREX{suffix}((volatile {c_type}*)&({addr}));\n\
         {indent}        {temp} = {temp} {binop} ({value_text});\n\
         {indent}    }} while (__STREX{suffix}({temp}, (volatile {c_type}*)&({addr})));\n\
         {indent}}}"
    ))
}

/// Best-effort declared-type lookup covering both locally tracked
/// declarations (`infer_type`'s scope) and file-level variables/registers
/// an atomic block typically targets.
fn variable_type(state: &GeneratorState, table: &SymbolTable, name: &str) -> Option<String> {
    if let Some(t) = state.locals.get(name) {
        return Some(t.clone());
    }
    if let Some(p) = state.params.get(name) {
        return Some(p.base_type.clone());
    }
    table
        .lookup_by_name(name)
        .into_iter()
        .find(|s| matches!(s.kind, SymbolKind::Variable | SymbolKind::Register))
        .map(|s| s.declared_type.clone())
}

fn contains_call(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Call(_, _) => true,
        ExprKind::Unary(_, inner)
        | ExprKind::Cast(_, inner)
        | ExprKind::SizeOf(inner)
        | ExprKind::AddressOf(inner) => contains_call(inner),
        ExprKind::Binary(_, lhs, rhs) => contains_call(lhs) || contains_call(rhs),
        ExprKind::Member(base, _) => contains_call(base),
        ExprKind::Index(base, idx) => contains_call(base) || contains_call(idx),
        ExprKind::Ternary(c, t, e) => contains_call(c) || contains_call(t) || contains_call(e),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{
        CallbackPayload, FieldInfo, FunctionPayload, ParamInfo, StructPayload, Symbol, SymbolKey,
        SymbolPayload,
    };
    use std::path::PathBuf;

    fn push_struct(table: &mut SymbolTable, file: &str, name: &str, field: &str, field_ty: &str) {
        table.add_symbols(
            Path::new(file),
            vec![Symbol {
                key: SymbolKey { name: name.into(), file: PathBuf::from(file) },
                kind: SymbolKind::Struct,
                declared_type: name.into(),
                is_exported: true,
                is_const: false,
                initial_value: None,
                payload: SymbolPayload::Struct(StructPayload {
                    fields: vec![(
                        field.into(),
                        FieldInfo { ty: field_ty.into(), array_dims: vec![], is_array: false },
                    )],
                }),
            }],
        );
    }

    fn push_callback(table: &mut SymbolTable, file: &str, name: &str, ret: &str, params: &[&str]) {
        table.add_symbols(
            Path::new(file),
            vec![Symbol {
                key: SymbolKey { name: name.into(), file: PathBuf::from(file) },
                kind: SymbolKind::TypeAlias,
                declared_type: name.into(),
                is_exported: true,
                is_const: false,
                initial_value: None,
                payload: SymbolPayload::Callback(CallbackPayload {
                    return_type: ret.into(),
                    param_types: params.iter().map(|s| s.to_string()).collect(),
                }),
            }],
        );
    }

    fn push_function(table: &mut SymbolTable, file: &str, name: &str, ret: &str, param_types: &[&str]) {
        table.add_symbols(
            Path::new(file),
            vec![Symbol {
                key: SymbolKey { name: name.into(), file: PathBuf::from(file) },
                kind: SymbolKind::Function,
                declared_type: ret.into(),
                is_exported: true,
                is_const: false,
                initial_value: None,
                payload: SymbolPayload::Function(FunctionPayload {
                    params: param_types
                        .iter()
                        .map(|t| ParamInfo {
                            name: "_".into(),
                            base_type: t.to_string(),
                            is_const: false,
                            is_array: false,
                            is_auto_const: false,
                        })
                        .collect(),
                    return_type: ret.into(),
                }),
            }],
        );
    }

    fn assign_fn_to_field(fn_name: &str, base: &str, field: &str) -> AssignStmt {
        AssignStmt {
            target: Expr {
                kind: ExprKind::Member(
                    Box::new(Expr { kind: ExprKind::Ident(base.into()), span: Span::default() }),
                    field.into(),
                ),
                span: Span::default(),
            },
            op: AssignOp::Simple,
            value: Expr { kind: ExprKind::Ident(fn_name.into()), span: Span::default() },
            span: Span::default(),
        }
    }

    #[test]
    fn mismatched_callback_signature_is_flagged() {
        let mut table = SymbolTable::new();
        push_struct(&mut table, "a.cnx", "Widget", "on_tick", "OnTick");
        push_callback(&mut table, "sdk.h", "OnTick", "void", &["uint32_t"]);
        push_function(&mut table, "a.cnx", "bad_handler", "void", &["u8"]);

        let mut state = GeneratorState::new(PathBuf::from("a.cnx"), false, None);
        state.locals.insert("w".into(), "Widget".into());
        let assign = assign_fn_to_field("bad_handler", "w", "on_tick");
        generate_assign(&mut state, &table, &assign, "");

        assert!(state.diagnostics.iter().any(|d| d.code == Some(ErrorCode::E0424)));
    }

    #[test]
    fn matching_callback_signature_is_not_flagged() {
        let mut table = SymbolTable::new();
        push_struct(&mut table, "a.cnx", "Widget", "on_tick", "OnTick");
        push_callback(&mut table, "sdk.h", "OnTick", "void", &["uint32_t"]);
        push_function(&mut table, "a.cnx", "good_handler", "void", &["u32"]);

        let mut state = GeneratorState::new(PathBuf::from("a.cnx"), false, None);
        state.locals.insert("w".into(), "Widget".into());
        let assign = assign_fn_to_field("good_handler", "w", "on_tick");
        generate_assign(&mut state, &table, &assign, "");

        assert!(!state.diagnostics.iter().any(|d| d.code == Some(ErrorCode::E0424)));
    }
}

fn assign_op_symbol(op: AssignOp) -> &'static str {
    match op {
        AssignOp::Simple => "=",
        AssignOp::Add => "+=",
        AssignOp::Sub => "-=",
        AssignOp::Mul => "*=",
        AssignOp::Div => "/=",
        AssignOp::BitAnd => "&=",
        AssignOp::BitOr => "|=",
        AssignOp::BitXor => "^=",
        AssignOp::Shl => "<<=",
        AssignOp::Shr => ">>=",
    }
}
