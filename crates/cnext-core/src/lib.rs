//! C-Next to C/C++ transpiler core: filesystem abstraction, include
//! resolution, symbol collection, cross-file dataflow, and code
//! generation (C1-C7), plus the ambient config/cache/driver glue.

pub mod cache;
pub mod cnext_collector;
pub mod codegen;
pub mod config;
pub mod diagnostics;
pub mod driver;
pub mod fs;
pub mod header_collector;
pub mod include_resolver;
pub mod modification_analyzer;
pub mod symbol;
pub mod symbol_table;
pub mod syntax;

pub use diagnostics::{Diagnostic, ErrorCode, Severity};
pub use driver::{transpile, FileResult, TranspileRequest, TranspileResult};
