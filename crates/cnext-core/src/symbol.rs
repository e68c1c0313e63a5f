//! The symbol data model shared by C3/C4 (collection) and C5 (storage).

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SymbolKey {
    pub name: String,
    pub file: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Variable,
    Function,
    Struct,
    Enum,
    Bitmap,
    Scope,
    Register,
    TypeAlias,
    Class,
}

#[derive(Debug, Clone)]
pub struct ParamInfo {
    pub name: String,
    pub base_type: String,
    pub is_const: bool,
    pub is_array: bool,
    /// Set by C6 once fixed-point propagation concludes the parameter is
    /// never modified (and is pointer-eligible per §4.7.3).
    pub is_auto_const: bool,
}

#[derive(Debug, Clone)]
pub struct FunctionPayload {
    pub params: Vec<ParamInfo>,
    pub return_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldDim {
    Literal(u64),
    Name(String),
}

#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub ty: String,
    pub array_dims: Vec<FieldDim>,
    pub is_array: bool,
}

#[derive(Debug, Clone, Default)]
pub struct StructPayload {
    /// Insertion-ordered field map: declaration order drives header and
    /// brace-init emission determinism.
    pub fields: Vec<(String, FieldInfo)>,
}

#[derive(Debug, Clone, Default)]
pub struct EnumPayload {
    pub members: Vec<(String, i64)>,
    pub backing_width: u32,
}

#[derive(Debug, Clone, Default)]
pub struct BitmapPayload {
    pub backing_width: u32,
    /// field name -> (bit offset, bit width)
    pub fields: Vec<(String, (u32, u32))>,
}

#[derive(Debug, Clone, Default)]
pub struct ScopePayload {
    pub members: Vec<String>,
    pub public_members: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct RegisterPayload {
    pub address: u64,
}

/// A function-pointer typedef (`typedef T (*Name)(params);`), modeled as a
/// signature rather than a full type so a callback-compatible function can
/// be checked against it (§4.7.3, §7 E0424).
#[derive(Debug, Clone, Default)]
pub struct CallbackPayload {
    pub return_type: String,
    pub param_types: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum SymbolPayload {
    None,
    Function(FunctionPayload),
    Struct(StructPayload),
    Enum(EnumPayload),
    Bitmap(BitmapPayload),
    Scope(ScopePayload),
    Register(RegisterPayload),
    Callback(CallbackPayload),
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub key: SymbolKey,
    pub kind: SymbolKind,
    pub declared_type: String,
    pub is_exported: bool,
    pub is_const: bool,
    pub initial_value: Option<String>,
    pub payload: SymbolPayload,
}

impl Symbol {
    pub fn name(&self) -> &str {
        &self.key.name
    }

    pub fn as_function(&self) -> Option<&FunctionPayload> {
        match &self.payload {
            SymbolPayload::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_function_mut(&mut self) -> Option<&mut FunctionPayload> {
        match &mut self.payload {
            SymbolPayload::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructPayload> {
        match &self.payload {
            SymbolPayload::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumPayload> {
        match &self.payload {
            SymbolPayload::Enum(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_bitmap(&self) -> Option<&BitmapPayload> {
        match &self.payload {
            SymbolPayload::Bitmap(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_callback(&self) -> Option<&CallbackPayload> {
        match &self.payload {
            SymbolPayload::Callback(c) => Some(c),
            _ => None,
        }
    }
}

/// Function signature shape used for the "identical signature" half of
/// the conflict policy in §4.4.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSignature {
    pub return_type: String,
    pub param_types: Vec<(String, bool, bool)>, // (base type, is_const, is_array)
}

pub fn function_signature(f: &FunctionPayload) -> FunctionSignature {
    FunctionSignature {
        return_type: f.return_type.clone(),
        param_types: f
            .params
            .iter()
            .map(|p| (p.base_type.clone(), p.is_const, p.is_array))
            .collect(),
    }
}
