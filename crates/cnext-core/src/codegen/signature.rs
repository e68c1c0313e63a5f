//! Parameter-passing decisions (§4.7.3): translates a function's
//! `ParamInfo` list plus C6's modification facts into concrete C/C++
//! parameter declarations and the `ParamBinding`s used inside the body.

use smallvec::SmallVec;

use crate::modification_analyzer::ModificationAccumulator;
use crate::symbol::{FunctionPayload, ParamInfo};

use super::state::ParamBinding;
use super::types;

pub struct RenderedParam {
    pub declaration: String,
    pub binding: ParamBinding,
}

/// Most C-Next functions take a handful of parameters; `SmallVec` keeps
/// the common case off the heap.
pub type RenderedParams = SmallVec<[RenderedParam; 6]>;

pub fn render_params(
    function_name: &str,
    function: &FunctionPayload,
    modified: &ModificationAccumulator,
    cpp_mode: bool,
) -> RenderedParams {
    let modified_set = modified.modified(function_name);
    function
        .params
        .iter()
        .map(|p| render_param(p, modified_set.contains(&p.name), cpp_mode))
        .collect()
}

fn render_param(p: &ParamInfo, is_modified: bool, cpp_mode: bool) -> RenderedParam {
    let c_type = types::c_type_name(&p.base_type).to_string();
    let is_struct = !types::is_integer_type(&p.base_type)
        && !types::is_float_type(&p.base_type)
        && p.base_type != "bool";

    if p.is_array {
        return RenderedParam {
            declaration: format!("{c_type} {}[]", p.name),
            binding: ParamBinding {
                base_type: p.base_type.clone(),
                is_const: p.is_const || !is_modified,
                is_array: true,
                is_struct,
                is_pointer: true,
            },
        };
    }

    let pointer_eligible = types::is_pointer_eligible(&p.base_type, false);
    if !pointer_eligible {
        return RenderedParam {
            declaration: format!("{c_type} {}", p.name),
            binding: ParamBinding {
                base_type: p.base_type.clone(),
                is_const: false,
                is_array: false,
                is_struct: false,
                is_pointer: false,
            },
        };
    }

    let const_qualified = p.is_const || !is_modified;
    let qualifier = if const_qualified { "const " } else { "" };
    let declaration = if cpp_mode {
        format!("{qualifier}{c_type}& {}", p.name)
    } else {
        format!("{qualifier}{c_type}* {}", p.name)
    };

    RenderedParam {
        declaration,
        binding: ParamBinding {
            base_type: p.base_type.clone(),
            is_const: const_qualified,
            is_array: false,
            is_struct,
            is_pointer: !cpp_mode,
        },
    }
}
