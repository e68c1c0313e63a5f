//! Stable diagnostic codes and the `Diagnostic` value every fallible
//! collector/generator pass produces. Mirrors the numbered, sparsely
//! documented `ErrorCode` enum convention used throughout the teacher's
//! diagnostics package.

use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Narrowing assignment, e.g. `u32 -> u8` without bit-indexing.
    E0381,
    /// Sign-changing assignment between signed and unsigned types.
    E0382,
    /// Bit-index/bit-range width, or a constant shift amount, outside
    /// `[0, width(T))`.
    E0383,
    /// Bitmap field literal exceeds its declared bit width.
    E0384,
    /// Constant array index outside the declared dimension.
    E0385,
    /// Write to a `const`-qualified target.
    E0503,
    /// Non-boolean ternary/`do`-`while` condition, or a nested ternary.
    E0504,
    /// `sizeof` applied to an expression with side effects.
    E0505,
    /// `switch` missing enum coverage without `default`/`default(n)`.
    E0701,
    /// `default(n)` count mismatch against the statically missing variants.
    E0702,
    /// Early exit (`return`/`break`) inside `critical { }`.
    E0703,
    /// Callback-compatible function signature mismatch against its typedef.
    E0424,
    /// Array dimension name reference with no matching constant symbol.
    E0901,
    /// Redefinition of a symbol across files with incompatible signatures.
    E1001,
    /// Function defined in more than one `.cnx` file.
    E1002,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::E0381 => "E0381",
            ErrorCode::E0382 => "E0382",
            ErrorCode::E0383 => "E0383",
            ErrorCode::E0384 => "E0384",
            ErrorCode::E0385 => "E0385",
            ErrorCode::E0503 => "E0503",
            ErrorCode::E0504 => "E0504",
            ErrorCode::E0505 => "E0505",
            ErrorCode::E0701 => "E0701",
            ErrorCode::E0702 => "E0702",
            ErrorCode::E0703 => "E0703",
            ErrorCode::E0424 => "E0424",
            ErrorCode::E0901 => "E0901",
            ErrorCode::E1001 => "E1001",
            ErrorCode::E1002 => "E1002",
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{}:{line}:{column}: {prefix}{message}", file.display(), prefix = code.map(|c| format!("{}: ", c.as_str())).unwrap_or_default())]
pub struct Diagnostic {
    pub severity: Severity,
    /// Absent for discovery/include-resolution warnings, which carry no
    /// stable code in §7 of the core spec.
    pub code: Option<ErrorCode>,
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
    pub message: String,
    pub hint: Option<String>,
}

impl Diagnostic {
    pub fn error(
        code: ErrorCode,
        file: impl Into<PathBuf>,
        line: u32,
        column: u32,
        message: impl Into<String>,
    ) -> Self {
        Diagnostic {
            severity: Severity::Error,
            code: Some(code),
            file: file.into(),
            line,
            column,
            message: message.into(),
            hint: None,
        }
    }

    pub fn warning(
        file: impl Into<PathBuf>,
        line: u32,
        column: u32,
        message: impl Into<String>,
    ) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            code: None,
            file: file.into(),
            line,
            column,
            message: message.into(),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
