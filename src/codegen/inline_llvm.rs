//! Inline LLVM bodies (§4.6, §1.1): an `llvm { ... }` callable body is raw
//! LLVM IR text with `$name` tokens standing in for the callable's bound
//! pattern-cell types. We substitute those tokens with the cell's concrete
//! LLVM type spelling, wrap the result in a `define` matching the already
//! declared function's signature, parse it as a standalone module, and link
//! that module into the codegen module so LLVM resolves the existing
//! declaration against the new definition.

use std::rc::Rc;

use inkwell::memory_buffer::MemoryBuffer;
use inkwell::values::FunctionValue;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::env::EnvValue;
use crate::error::ClayError;
use crate::resolver::InvokeEntry;
use crate::types::StaticObject;

use super::CodegenContext;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)").unwrap());

/// Resolves a single `$name` token against the invoke-entry's environment,
/// rendering a bound pattern cell as its LLVM type's textual form.
fn resolve_token<'ctx, 'r>(ctx: &CodegenContext<'ctx, 'r>, entry: &InvokeEntry, name: &str) -> Option<String> {
    match entry.env.lookup(name).ok()? {
        EnvValue::PatternCell(cell) => match cell.get()? {
            StaticObject::Type(ty) => Some(ctx.llvm_type(&ty).print_to_string().to_string()),
            _ => None,
        },
        EnvValue::Type(ty) => Some(ctx.llvm_type(&ty).print_to_string().to_string()),
        _ => None,
    }
}

pub fn codegen_inline_llvm<'ctx, 'r>(
    ctx: &CodegenContext<'ctx, 'r>,
    entry: &Rc<InvokeEntry>,
    function: FunctionValue<'ctx>,
    source: &Rc<str>,
) -> Result<(), ClayError> {
    let mut missing = None;
    let substituted = TOKEN_RE.replace_all(source.as_ref(), |caps: &regex::Captures| {
        let name = &caps[1];
        match resolve_token(ctx, entry, name) {
            Some(spelled) => spelled,
            None => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });
    if let Some(name) = missing {
        return Err(ClayError::Internal(format!(
            "inline llvm body of `{}` references unbound pattern cell `${name}`",
            entry.callable
        )));
    }

    let fn_name = function.get_name().to_str().unwrap_or("").to_string();
    let fn_type = function.get_type();
    let ret_spelling = fn_type
        .get_return_type()
        .map(|t| t.print_to_string().to_string())
        .unwrap_or_else(|| "void".to_string());
    let params_spelling = fn_type
        .get_param_types()
        .iter()
        .map(|t| t.print_to_string().to_string())
        .collect::<Vec<_>>()
        .join(", ");

    let ir = format!(
        "define {ret_spelling} @\"{fn_name}\"({params_spelling}) {{\n{substituted}\n}}\n"
    );

    let buffer = MemoryBuffer::create_from_memory_range_copy(ir.as_bytes(), &format!("{fn_name}.ll"));
    let parsed = ctx
        .llvm
        .create_module_from_ir(buffer)
        .map_err(|e| ClayError::Internal(format!("inline llvm body of `{}` failed to parse: {}", entry.callable, e)))?;

    ctx.module
        .link_in_module(parsed)
        .map_err(|e| ClayError::Internal(format!("inline llvm body of `{}` failed to link: {}", entry.callable, e)))?;

    Ok(())
}
