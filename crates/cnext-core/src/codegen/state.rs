//! Per-file generator state (§4.7.1, §9 "generator state"): an explicit
//! context value threaded through every generator function rather than a
//! global, carrying the ambient bookkeeping a tree walk needs.

use std::collections::HashMap;
use std::path::PathBuf;

use super::types::IncludeNeeds;
use crate::diagnostics::Diagnostic;

#[derive(Debug, Clone)]
pub struct ParamBinding {
    pub base_type: String,
    pub is_const: bool,
    pub is_array: bool,
    pub is_struct: bool,
    /// Whether the body must dereference this name (`*p` in C) because
    /// it was emitted as a pointer per §4.7.3.
    pub is_pointer: bool,
}

#[derive(Debug)]
pub struct GeneratorState {
    pub file: PathBuf,
    pub cpp_mode: bool,
    pub target: Option<String>,

    pub current_scope: Option<String>,
    pub indent: u32,
    pub in_function_body: bool,

    pub locals: HashMap<String, String>,
    pub local_arrays: HashMap<String, u64>,
    pub params: HashMap<String, ParamBinding>,

    /// Drives unqualified enum-member and struct-literal resolution.
    pub expected_type: Option<String>,

    pub pending_temps: Vec<String>,
    pub includes: IncludeNeeds,
    pub diagnostics: Vec<Diagnostic>,

    temp_counter: u32,
}

impl GeneratorState {
    pub fn new(file: PathBuf, cpp_mode: bool, target: Option<String>) -> Self {
        GeneratorState {
            file,
            cpp_mode,
            target,
            current_scope: None,
            indent: 0,
            in_function_body: false,
            locals: HashMap::new(),
            local_arrays: HashMap::new(),
            params: HashMap::new(),
            expected_type: None,
            pending_temps: Vec::new(),
            includes: IncludeNeeds::empty(),
            diagnostics: Vec::new(),
            temp_counter: 0,
        }
    }

    /// Resets the per-function slice of state; the file-level fields
    /// (scope, includes, diagnostics) persist across functions.
    pub fn reset_for_function(&mut self) {
        self.locals.clear();
        self.local_arrays.clear();
        self.params.clear();
        self.expected_type = None;
        self.pending_temps.clear();
        self.in_function_body = true;
    }

    pub fn indent_str(&self) -> String {
        "    ".repeat(self.indent as usize)
    }

    pub fn fresh_temp(&mut self) -> String {
        self.temp_counter += 1;
        format!("__cnx_tmp{}", self.temp_counter)
    }

    pub fn need(&mut self, needs: IncludeNeeds) {
        self.includes |= needs;
    }
}
