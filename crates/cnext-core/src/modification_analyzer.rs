//! Modification analyzer (C6): per-function parameter mutation dataflow,
//! propagated across call sites to fixed point, cross-file accumulator
//! carried forward between files in dependency order.

use std::collections::{HashMap, HashSet};

use crate::syntax::*;

/// One call site: for each argument that is itself one of the caller's own
/// parameters, `(call-site index, caller parameter name)`.
#[derive(Debug, Clone, Default)]
pub struct CallEdge {
    pub callee: String,
    pub arg_positions: Vec<(usize, String)>,
}

#[derive(Debug, Clone, Default)]
pub struct FunctionFacts {
    pub params: Vec<String>,
    pub modified: HashSet<String>,
    pub calls: Vec<CallEdge>,
}

/// Cross-file accumulator reused across files in dependency order (§4.5).
#[derive(Debug, Default)]
pub struct ModificationAccumulator {
    functions: HashMap<String, FunctionFacts>,
}

impl ModificationAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn modified(&self, function: &str) -> &HashSet<String> {
        static EMPTY: once_cell::sync::Lazy<HashSet<String>> =
            once_cell::sync::Lazy::new(HashSet::new);
        self.functions
            .get(function)
            .map(|f| &f.modified)
            .unwrap_or(&EMPTY)
    }

    pub fn param_list(&self, function: &str) -> &[String] {
        self.functions
            .get(function)
            .map(|f| f.params.as_slice())
            .unwrap_or(&[])
    }

    /// Collects per-function parameter lists and direct-mutation facts for
    /// every function declared in `program`, merging them into the
    /// accumulator (step 1-2 of §4.5), then runs propagation to fixed
    /// point (step 3-4).
    pub fn analyze_file(&mut self, program: &Program) {
        collect_items(&program.items, None, self);
        self.propagate();
    }

    fn propagate(&mut self) {
        loop {
            let mut changed = false;
            let callers: Vec<String> = self.functions.keys().cloned().collect();
            for caller in callers {
                let edges = self.functions.get(&caller).map(|f| f.calls.clone()).unwrap_or_default();
                for edge in edges {
                    let Some(callee) = self.functions.get(&edge.callee) else {
                        continue;
                    };
                    let callee_modified_indices: Vec<usize> = callee
                        .params
                        .iter()
                        .enumerate()
                        .filter(|(_, name)| callee.modified.contains(*name))
                        .map(|(i, _)| i)
                        .collect();
                    let caller_facts = self.functions.get_mut(&caller).unwrap();
                    for (arg_index, param_name) in &edge.arg_positions {
                        if callee_modified_indices.contains(arg_index)
                            && caller_facts.modified.insert(param_name.clone())
                        {
                            changed = true;
                        }
                    }
                }
            }
            if !changed {
                break;
            }
        }
    }
}

fn collect_items(items: &[Item], scope: Option<&str>, acc: &mut ModificationAccumulator) {
    for item in items {
        match item {
            Item::Function(f) => collect_function(f, scope, acc),
            Item::Scope(s) => {
                for member in &s.members {
                    collect_items(std::slice::from_ref(&member.item), Some(&s.name), acc);
                }
            }
            _ => {}
        }
    }
}

/// Keys facts by the same scope-qualified name the collector (C4) and
/// codegen (C7) use for lookup, so a call to `inc()` inside `Counter`
/// never aliases an unrelated top-level `inc`.
fn qualified_name(scope: Option<&str>, name: &str) -> String {
    match scope {
        Some(s) => format!("{s}::{name}"),
        None => name.to_string(),
    }
}

fn collect_function(decl: &FunctionDecl, scope: Option<&str>, acc: &mut ModificationAccumulator) {
    let params: Vec<String> = decl.params.iter().map(|p| p.name.clone()).collect();
    let mut facts = FunctionFacts {
        params: params.clone(),
        modified: HashSet::new(),
        calls: Vec::new(),
    };
    let param_set: HashSet<&str> = params.iter().map(|s| s.as_str()).collect();
    walk_block(&decl.body, &param_set, scope, &mut facts);
    acc.functions
        .entry(qualified_name(scope, &decl.name))
        .and_modify(|existing| {
            existing.modified.extend(facts.modified.iter().cloned());
            existing.calls.extend(facts.calls.iter().cloned());
        })
        .or_insert(facts);
}

fn walk_block(block: &Block, params: &HashSet<&str>, scope: Option<&str>, facts: &mut FunctionFacts) {
    for stmt in &block.stmts {
        walk_stmt(stmt, params, scope, facts);
    }
}

fn walk_stmt(stmt: &Stmt, params: &HashSet<&str>, scope: Option<&str>, facts: &mut FunctionFacts) {
    match &stmt.kind {
        StmtKind::Assign(a) => {
            mark_if_param_target(&a.target, params, facts);
            walk_expr(&a.value, params, scope, facts);
        }
        StmtKind::VarDecl(v) => {
            if let Some(init) = &v.initializer {
                walk_expr(init, params, scope, facts);
            }
        }
        StmtKind::If(s) => {
            walk_expr(&s.cond, params, scope, facts);
            walk_block(&s.then_branch, params, scope, facts);
            if let Some(else_b) = &s.else_branch {
                walk_block(else_b, params, scope, facts);
            }
        }
        StmtKind::While(s) => {
            walk_expr(&s.cond, params, scope, facts);
            walk_block(&s.body, params, scope, facts);
        }
        StmtKind::DoWhile(s) => {
            walk_block(&s.body, params, scope, facts);
            walk_expr(&s.cond, params, scope, facts);
        }
        StmtKind::For(s) => {
            if let Some(init) = &s.init {
                walk_stmt(init, params, scope, facts);
            }
            if let Some(cond) = &s.cond {
                walk_expr(cond, params, scope, facts);
            }
            if let Some(step) = &s.step {
                walk_stmt(step, params, scope, facts);
            }
            walk_block(&s.body, params, scope, facts);
        }
        StmtKind::Switch(s) => {
            walk_expr(&s.scrutinee, params, scope, facts);
            for case in &s.cases {
                walk_expr(&case.value, params, scope, facts);
                walk_block(&case.body, params, scope, facts);
            }
            if let Some((body, _)) = &s.default {
                walk_block(body, params, scope, facts);
            }
        }
        StmtKind::Return(Some(e)) => walk_expr(e, params, scope, facts),
        StmtKind::Return(None) | StmtKind::Break => {}
        StmtKind::Expr(e) => walk_expr(e, params, scope, facts),
        StmtKind::Critical(b) | StmtKind::Atomic(b) | StmtKind::Block(b) => {
            walk_block(b, params, scope, facts)
        }
    }
}

/// Marks `p`, `p.member`, or `p[i]` as modified when `p` is a parameter.
fn mark_if_param_target(target: &Expr, params: &HashSet<&str>, facts: &mut FunctionFacts) {
    match &target.kind {
        ExprKind::Ident(name) if params.contains(name.as_str()) => {
            facts.modified.insert(name.clone());
        }
        ExprKind::Member(base, _) | ExprKind::Index(base, _) => {
            mark_if_param_target(base, params, facts)
        }
        _ => {}
    }
}

fn walk_expr(expr: &Expr, params: &HashSet<&str>, scope: Option<&str>, facts: &mut FunctionFacts) {
    match &expr.kind {
        ExprKind::AddressOf(inner) => {
            mark_if_param_target(inner, params, facts);
            walk_expr(inner, params, scope, facts);
        }
        ExprKind::Call(callee, args) => {
            if let ExprKind::Ident(name) = &callee.kind {
                let arg_positions: Vec<(usize, String)> = args
                    .iter()
                    .enumerate()
                    .filter_map(|(i, a)| match &a.kind {
                        ExprKind::Ident(arg_name) if params.contains(arg_name.as_str()) => {
                            Some((i, arg_name.clone()))
                        }
                        _ => None,
                    })
                    .collect();
                if !arg_positions.is_empty() {
                    // A bare call inside a scope resolves to a sibling
                    // member first (§4.7.2 priority order), so the callee
                    // is qualified the same way C4/C7 key their own name.
                    facts.calls.push(CallEdge {
                        callee: qualified_name(scope, name),
                        arg_positions,
                    });
                }
            }
            for arg in args {
                walk_expr(arg, params, scope, facts);
            }
        }
        ExprKind::Member(base, _) => walk_expr(base, params, scope, facts),
        ExprKind::Index(base, idx) => {
            walk_expr(base, params, scope, facts);
            walk_expr(idx, params, scope, facts);
        }
        ExprKind::BitIndex(base, idx) => {
            walk_expr(base, params, scope, facts);
            walk_expr(idx, params, scope, facts);
        }
        ExprKind::BitRange(base, lo, hi) => {
            walk_expr(base, params, scope, facts);
            walk_expr(lo, params, scope, facts);
            walk_expr(hi, params, scope, facts);
        }
        ExprKind::Unary(_, inner) | ExprKind::Cast(_, inner) | ExprKind::SizeOf(inner) => {
            walk_expr(inner, params, scope, facts)
        }
        ExprKind::Binary(_, lhs, rhs) => {
            walk_expr(lhs, params, scope, facts);
            walk_expr(rhs, params, scope, facts);
        }
        ExprKind::Ternary(c, t, f) => {
            walk_expr(c, params, scope, facts);
            walk_expr(t, params, scope, facts);
            walk_expr(f, params, scope, facts);
        }
        ExprKind::ArrayLiteral(items) => {
            for item in items {
                walk_expr(item, params, scope, facts);
            }
        }
        ExprKind::Ident(_)
        | ExprKind::IntLiteral(_)
        | ExprKind::FloatLiteral(_)
        | ExprKind::BoolLiteral(_)
        | ExprKind::StringLiteral(_)
        | ExprKind::ScopeQualified(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::Parser;

    fn analyze(src: &str) -> ModificationAccumulator {
        let program = Parser::parse_program(src).expect("parse");
        let mut acc = ModificationAccumulator::new();
        acc.analyze_file(&program);
        acc
    }

    #[test]
    fn direct_assignment_marks_param_modified() {
        let acc = analyze("void bump(u32 p) { p <- p + 1; }");
        assert!(acc.modified("bump").contains("p"));
    }

    #[test]
    fn unmodified_param_stays_clean() {
        let acc = analyze("u32 read(u32 p) { return p + 1; }");
        assert!(acc.modified("read").is_empty());
    }

    #[test]
    fn mutation_propagates_through_call_chain() {
        let acc = analyze(
            "void inner(u32 x) { x <- 0; } void outer(u32 y) { inner(y); }",
        );
        assert!(acc.modified("inner").contains("x"));
        assert!(acc.modified("outer").contains("y"));
    }

    #[test]
    fn member_write_marks_base_param_modified() {
        let acc = analyze("void set(Point p) { p.x <- 1; }");
        assert!(acc.modified("set").contains("p"));
    }
}
