//! Type-name mapping and the include-need flags latched during generation.

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct IncludeNeeds: u32 {
        const STDINT  = 0b0001;
        const STDBOOL = 0b0010;
        const STRING  = 0b0100;
        const LIMITS  = 0b1000;
        const CMSIS   = 0b10000;
    }
}

/// Maps a C-Next primitive type name to its C/C++ spelling. Anything not
/// recognized here is a user-defined struct/enum/bitmap/scope name and is
/// passed through unchanged.
pub fn c_type_name(cnext_type: &str) -> &str {
    match cnext_type {
        "u8" => "uint8_t",
        "u16" => "uint16_t",
        "u32" => "uint32_t",
        "u64" => "uint64_t",
        "i8" => "int8_t",
        "i16" => "int16_t",
        "i32" => "int32_t",
        "i64" => "int64_t",
        "f32" => "float",
        "f64" => "double",
        "bool" => "bool",
        "void" => "void",
        other => other,
    }
}

pub fn include_needs_for_type(cnext_type: &str) -> IncludeNeeds {
    match cnext_type {
        "u8" | "u16" | "u32" | "u64" | "i8" | "i16" | "i32" | "i64" => IncludeNeeds::STDINT,
        "bool" => IncludeNeeds::STDBOOL,
        _ => IncludeNeeds::empty(),
    }
}

pub fn is_integer_type(cnext_type: &str) -> bool {
    matches!(
        cnext_type,
        "u8" | "u16" | "u32" | "u64" | "i8" | "i16" | "i32" | "i64"
    )
}

pub fn is_float_type(cnext_type: &str) -> bool {
    matches!(cnext_type, "f32" | "f64")
}

pub fn is_signed(cnext_type: &str) -> bool {
    matches!(cnext_type, "i8" | "i16" | "i32" | "i64")
}

pub fn width_bits(cnext_type: &str) -> Option<u32> {
    match cnext_type {
        "u8" | "i8" => Some(8),
        "u16" | "i16" => Some(16),
        "u32" | "i32" | "f32" => Some(32),
        "u64" | "i64" | "f64" => Some(64),
        _ => None,
    }
}

/// `true` for types eligible for the auto-const pointer/reference rules of
/// §4.7.3. Integers and aggregates take `T*`/`const T*`; floats and `bool`
/// are always passed by value regardless of modification.
pub fn is_pointer_eligible(cnext_type: &str, is_array: bool) -> bool {
    is_array || !(is_float_type(cnext_type) || cnext_type == "bool")
}

pub fn type_max_macro(cnext_type: &str) -> String {
    format!("{}_MAX", cnext_type.to_uppercase())
}

pub fn type_min_macro(cnext_type: &str) -> String {
    if is_signed(cnext_type) {
        format!("{}_MIN", cnext_type.to_uppercase())
    } else {
        "0".to_string()
    }
}
