//! Invoke-entry and lambda codegen (§4.6), grounded in the teacher's
//! `legacy/codegen/statements/function.rs` two-pass declare/define split and
//! `legacy/codegen/expressions/lambda.rs`'s uniform `{ fn*, env* }` closure
//! representation, generalized from Y-lang's single return value to Clay's
//! `returnTypes[]`/`returnIsRef[]` and from a fixed non-capturing/capturing
//! split to a single capture-by-ref flag per lambda literal (Open Question 3).

use std::rc::Rc;

use inkwell::types::{BasicMetadataTypeEnum, BasicTypeEnum};
use inkwell::values::{BasicValueEnum, FunctionValue};

use crate::ast::item::CallableBody;
use crate::ast::stmt::CatchClause;
use crate::ast::{Expr, ReturnKind, Stmt};
use crate::cache::AnalysisCache;
use crate::env::Environment;
use crate::error::ClayError;
use crate::resolver::InvokeEntry;
use crate::types::Type;

use super::CodegenContext;

fn non_static_params<'a>(entry: &'a InvokeEntry) -> impl Iterator<Item = (&'a crate::ast::FormalArg, &'a Type)> {
    entry
        .decl
        .fixed_args
        .iter()
        .zip(entry.arg_types.iter())
        .filter(|(formal, _)| !formal.is_static)
}

fn mangled_name(entry: &InvokeEntry) -> String {
    let mut name = entry.callable.to_string();
    for key in &entry.args_key.types {
        name.push('_');
        name.push_str(&key.0.to_string());
    }
    name
}

/// Return LLVM type for `returnTypes[]`/`returnIsRef[]` (§4.6): no slots is
/// `void`, one slot returns directly (a pointer for a by-ref slot), more
/// than one packs every slot into an anonymous struct.
fn return_llvm_type<'ctx, 'r>(
    ctx: &CodegenContext<'ctx, 'r>,
    return_types: &[Type],
    return_is_ref: &[bool],
) -> Option<BasicTypeEnum<'ctx>> {
    let slot_type = |i: usize| -> BasicTypeEnum<'ctx> {
        if return_is_ref[i] {
            ctx.llvm.ptr_type(inkwell::AddressSpace::default()).into()
        } else {
            ctx.llvm_type(&return_types[i])
        }
    };
    match return_types.len() {
        0 => None,
        1 => Some(slot_type(0)),
        n => {
            let fields: Vec<_> = (0..n).map(slot_type).collect();
            Some(ctx.llvm.struct_type(&fields, false).into())
        }
    }
}

/// Declares (but does not define) the LLVM function for an invoke-entry,
/// idempotently: a second call for the same entry returns the already
/// declared value. Separated from body generation so mutually recursive
/// calls can resolve `llvm_func_name` before either body is generated,
/// mirroring the teacher's `register_declaration` pass.
pub fn declare_invoke_entry<'ctx, 'r>(ctx: &CodegenContext<'ctx, 'r>, entry: &Rc<InvokeEntry>) -> FunctionValue<'ctx> {
    if let Some(name) = entry.llvm_func_name.borrow().as_ref() {
        if let Some(f) = ctx.module.get_function(name) {
            return f;
        }
    }

    let param_types: Vec<BasicMetadataTypeEnum> = non_static_params(entry)
        .map(|(_, ty)| ctx.llvm_type(ty).into())
        .collect();

    let return_types = entry.return_types.borrow();
    let return_is_ref = entry.return_is_ref.borrow();
    let fn_type = match return_llvm_type(ctx, &return_types, &return_is_ref) {
        Some(t) => t.fn_type(&param_types, false),
        None => ctx.llvm.void_type().fn_type(&param_types, false),
    };
    drop(return_types);
    drop(return_is_ref);

    let llvm_name: Rc<str> = Rc::from(mangled_name(entry));
    let function = ctx.module.add_function(&llvm_name, fn_type, None);
    *entry.llvm_func_name.borrow_mut() = Some(llvm_name.clone());
    ctx.store_function(llvm_name, function);
    function
}

/// Generates the body of a resolved, analyzed invoke-entry (§4.6 step 8).
/// `cache` should be the same cache the entry was analyzed with, so literal
/// and call-site types codegen re-derives match what the resolver saw.
pub fn codegen_invoke_entry<'ctx, 'r>(
    ctx: &CodegenContext<'ctx, 'r>,
    cache: &AnalysisCache,
    entry: &Rc<InvokeEntry>,
) -> Result<(), ClayError> {
    let function = declare_invoke_entry(ctx, entry);
    if function.count_basic_blocks() > 0 {
        return Ok(());
    }

    let entry_bb = ctx.llvm.append_basic_block(function, "entry");
    ctx.builder.position_at_end(entry_bb);
    ctx.enter_scope();
    ctx.set_current_return(entry.return_is_ref.borrow().clone());

    for (i, (formal, _)) in non_static_params(entry).enumerate() {
        let param = function
            .get_nth_param(i as u32)
            .ok_or_else(|| ClayError::Internal("invoke-entry declared fewer LLVM params than formals"))?;
        ctx.store_variable(formal.name.name.clone(), param);
    }

    match &entry.decl.body {
        CallableBody::Expr(expr) => {
            let value = super::codegen_expr(ctx, &entry.env, cache, expr)?;
            match value {
                Some(v) => ctx.builder.build_return(Some(&v)).unwrap(),
                None => ctx.builder.build_return(None).unwrap(),
            };
        }
        CallableBody::Block(stmt) => {
            super::codegen_stmt(ctx, &entry.env, cache, stmt)?;
            if ctx.builder.get_insert_block().unwrap().get_terminator().is_none() {
                if function.get_type().get_return_type().is_some() {
                    return Err(ClayError::Internal(format!(
                        "invoke-entry `{}` body fell off the end without returning a value",
                        entry.callable
                    )));
                }
                ctx.builder.build_return(None).unwrap();
            }
        }
        CallableBody::InlineLlvm(source) => {
            super::inline_llvm::codegen_inline_llvm(ctx, entry, function, source)?;
        }
        CallableBody::None => {
            ctx.builder.build_return(None).unwrap();
        }
    }

    ctx.exit_scope();
    Ok(())
}

/// Lowers `return`/`return ref`/`return forward` (§4.6, Open Question 2).
/// Each return slot's value-vs-ref shape is fixed by the invoke-entry's
/// declared `returnIsRef[]` (set by `codegen_invoke_entry` before the body
/// is generated) rather than decided fresh at each `return` site: the LLVM
/// return type is single-shaped per slot, so a `forward`-specified slot
/// takes the declared shape consistently rather than varying it per call
/// (a deliberate narrowing of the fully dynamic forward semantics).
pub fn codegen_return<'ctx, 'r>(
    ctx: &CodegenContext<'ctx, 'r>,
    env: &Environment,
    cache: &AnalysisCache,
    kind: &ReturnKind,
    values: &[Expr],
) -> Result<(), ClayError> {
    let declared_is_ref = ctx.current_return();
    let mut slots = Vec::with_capacity(values.len());
    for (i, expr) in values.iter().enumerate() {
        let as_ref = match kind {
            ReturnKind::Value => false,
            ReturnKind::Ref => true,
            ReturnKind::Forward => declared_is_ref.get(i).copied().unwrap_or(false),
        };
        let value = if as_ref {
            super::codegen_lvalue_address(ctx, env, cache, expr)?
        } else {
            super::codegen_expr(ctx, env, cache, expr)?
        }
        .ok_or_else(|| ClayError::Internal("return value codegen produced no value"))?;
        slots.push(value);
    }

    match slots.len() {
        0 => {
            ctx.builder.build_return(None).unwrap();
        }
        1 => {
            ctx.builder.build_return(Some(&slots[0])).unwrap();
        }
        _ => {
            let field_types: Vec<_> = slots.iter().map(|v| v.get_type()).collect();
            let struct_ty = ctx.llvm.struct_type(&field_types, false);
            let mut agg = struct_ty.get_undef();
            for (i, v) in slots.into_iter().enumerate() {
                agg = ctx.builder.build_insert_value(agg, v, i as u32, "ret").unwrap().into_struct_value();
            }
            ctx.builder.build_return(Some(&agg)).unwrap();
        }
    }
    Ok(())
}

/// Lowers `try`/`catch` to a landing-pad block (§4.6, §8's exception-unwind
/// scenario): the body runs with the landing pad registered as the current
/// unwind target, destroying every temporary pushed since entry before
/// running the catch clauses in sequence. This models catch-all semantics;
/// matching a raised value against each clause's exception pattern is left
/// to the evaluator once `raise` gains a runtime representation.
pub fn codegen_try<'ctx, 'r>(
    ctx: &CodegenContext<'ctx, 'r>,
    env: &Environment,
    cache: &AnalysisCache,
    body: &Stmt,
    catches: &[CatchClause],
) -> Result<(), ClayError> {
    let f = ctx.builder.get_insert_block().unwrap().get_parent().unwrap();
    let landing_bb = ctx.llvm.append_basic_block(f, "try.landing");
    let end_bb = ctx.llvm.append_basic_block(f, "try.end");

    ctx.push_landing_pad(landing_bb);
    let marker = ctx.temp_stack().mark();
    super::codegen_stmt(ctx, env, cache, body)?;
    ctx.temp_stack().destroy_down_to(ctx, marker);
    ctx.pop_landing_pad();
    if ctx.builder.get_insert_block().unwrap().get_terminator().is_none() {
        ctx.builder.build_unconditional_branch(end_bb).unwrap();
    }

    ctx.builder.position_at_end(landing_bb);
    ctx.temp_stack().destroy_down_to(ctx, marker);
    for catch in catches {
        ctx.enter_scope();
        super::codegen_stmt(ctx, env, cache, &catch.body)?;
        ctx.exit_scope();
    }
    if ctx.builder.get_insert_block().unwrap().get_terminator().is_none() {
        ctx.builder.build_unconditional_branch(end_bb).unwrap();
    }

    ctx.builder.position_at_end(end_bb);
    Ok(())
}

/// Free identifiers of `expr` not in `bound`, in first-use order, one entry
/// per distinct name.
fn collect_free_vars(expr: &Expr, bound: &mut Vec<Rc<str>>, out: &mut Vec<Rc<str>>) {
    match expr {
        Expr::Id(id) => {
            if !bound.contains(&id.name) && !out.contains(&id.name) {
                out.push(id.name.clone());
            }
        }
        Expr::BoolLit(..) | Expr::IntLit { .. } | Expr::FloatLit { .. } | Expr::CharLit(..) | Expr::StringLit(..) => {}
        Expr::Tuple(es, _) | Expr::Array(es, _) => es.iter().for_each(|e| collect_free_vars(e, bound, out)),
        Expr::Call { callee, args, .. } | Expr::Index { callee, args, .. } => {
            collect_free_vars(callee, bound, out);
            args.iter().for_each(|a| collect_free_vars(a, bound, out));
        }
        Expr::FieldRef { base, .. } => collect_free_vars(base, bound, out),
        Expr::Binary { left, right, .. } => {
            collect_free_vars(left, bound, out);
            collect_free_vars(right, bound, out);
        }
        Expr::Unary { operand, .. } => collect_free_vars(operand, bound, out),
        Expr::And(l, r, _) | Expr::Or(l, r, _) => {
            collect_free_vars(l, bound, out);
            collect_free_vars(r, bound, out);
        }
        Expr::AddressOf(inner, _) | Expr::Deref(inner, _) | Expr::Dispatch(inner, _) => {
            collect_free_vars(inner, bound, out)
        }
        Expr::If { condition, then_branch, else_branch, .. } => {
            collect_free_vars(condition, bound, out);
            collect_free_vars(then_branch, bound, out);
            collect_free_vars(else_branch, bound, out);
        }
        Expr::Block { statements, trailing, .. } => {
            let mark = bound.len();
            statements.iter().for_each(|s| collect_free_vars_stmt(s, bound, out));
            if let Some(t) = trailing {
                collect_free_vars(t, bound, out);
            }
            bound.truncate(mark);
        }
        Expr::Lambda { params, body, .. } => {
            let mark = bound.len();
            bound.extend(params.iter().map(|p| p.name.clone()));
            collect_free_vars(body, bound, out);
            bound.truncate(mark);
        }
    }
}

fn collect_free_vars_stmt(stmt: &Stmt, bound: &mut Vec<Rc<str>>, out: &mut Vec<Rc<str>>) {
    match stmt {
        Stmt::Let { value, name, .. } => {
            collect_free_vars(value, bound, out);
            bound.push(name.name.clone());
        }
        Stmt::Assign { target, value, .. } => {
            collect_free_vars(target, bound, out);
            collect_free_vars(value, bound, out);
        }
        Stmt::ExprStmt(e) => collect_free_vars(e, bound, out),
        Stmt::Return { values, .. } => values.iter().for_each(|v| collect_free_vars(v, bound, out)),
        Stmt::If { condition, then_branch, else_branch, .. } => {
            collect_free_vars(condition, bound, out);
            collect_free_vars_stmt(then_branch, bound, out);
            if let Some(e) = else_branch {
                collect_free_vars_stmt(e, bound, out);
            }
        }
        Stmt::While { condition, body, .. } => {
            collect_free_vars(condition, bound, out);
            collect_free_vars_stmt(body, bound, out);
        }
        Stmt::Break(_) | Stmt::Continue(_) => {}
        Stmt::Block(stmts, _) => {
            let mark = bound.len();
            stmts.iter().for_each(|s| collect_free_vars_stmt(s, bound, out));
            bound.truncate(mark);
        }
        Stmt::Try { body, catches, .. } => {
            collect_free_vars_stmt(body, bound, out);
            for c in catches {
                let mark = bound.len();
                bound.push(c.exception_name.name.clone());
                collect_free_vars_stmt(&c.body, bound, out);
                bound.truncate(mark);
            }
        }
    }
}

/// Lowers a lambda literal to the uniform `{ fn*, env* }` closure struct the
/// teacher's `legacy/codegen/expressions/lambda.rs` builds, generalized to
/// Clay's single `capture_by_ref` flag applying to every capture of a given
/// lambda rather than a per-variable capture kind (Open Question 3): by
/// value, each capture is snapshotted into its own heap slot at closure
/// creation; by reference, the env stores the original binding's address so
/// later lambda calls observe mutations.
pub fn codegen_lambda_reference<'ctx, 'r>(
    ctx: &CodegenContext<'ctx, 'r>,
    env: &Environment,
    cache: &AnalysisCache,
    expr: &Expr,
) -> Result<Option<BasicValueEnum<'ctx>>, ClayError> {
    let Expr::Lambda { capture_by_ref, params, body, .. } = expr else {
        return Err(ClayError::Internal("codegen_lambda_reference called on a non-lambda expression"));
    };

    let mut bound: Vec<Rc<str>> = params.iter().map(|p| p.name.clone()).collect();
    let mut free = Vec::new();
    collect_free_vars(body, &mut bound, &mut free);
    // `(name, slot address, slot's pointee type)`; only `let`-bound locals
    // (not parameters, which have no backing slot) can be captured here.
    let captures: Vec<(Rc<str>, inkwell::values::PointerValue<'ctx>, BasicTypeEnum<'ctx>)> = free
        .into_iter()
        .filter_map(|n| ctx.find_slot(&n).map(|(ptr, ty)| (n, ptr, ty)))
        .collect();

    let ptr_ty = ctx.llvm.ptr_type(inkwell::AddressSpace::default());

    // By reference, every field is a plain pointer (the original slot's
    // address); by value, each field has the slot's own value type.
    let field_type = |pointee: BasicTypeEnum<'ctx>| -> BasicTypeEnum<'ctx> {
        if *capture_by_ref { ptr_ty.into() } else { pointee }
    };

    let (env_struct_ty, env_ptr) = if captures.is_empty() {
        (None, ptr_ty.const_null())
    } else {
        let field_types: Vec<_> = captures.iter().map(|(_, _, ty)| field_type(*ty)).collect();
        let env_struct_ty = ctx.llvm.struct_type(&field_types, false);

        let malloc_fn = ctx.module.get_function("malloc").unwrap_or_else(|| {
            let malloc_ty = ptr_ty.fn_type(&[ctx.llvm.i64_type().into()], false);
            ctx.module.add_function("malloc", malloc_ty, None)
        });
        let size = env_struct_ty.size_of().unwrap();
        let raw = ctx
            .builder
            .build_call(malloc_fn, &[size.into()], "env.malloc")
            .unwrap()
            .try_as_basic_value()
            .unwrap_left()
            .into_pointer_value();

        for (i, (name, slot, _)) in captures.iter().enumerate() {
            let field = ctx.builder.build_struct_gep(env_struct_ty, raw, i as u32, &format!("cap.{name}")).unwrap();
            let stored: BasicValueEnum = if *capture_by_ref {
                (*slot).into()
            } else {
                ctx.find_variable(name)
                    .ok_or_else(|| ClayError::Internal(format!("capture of unknown variable `{name}`")))?
            };
            ctx.builder.build_store(field, stored).unwrap();
        }
        (Some(env_struct_ty), raw)
    };

    let impl_name = format!("lambda_{:x}", expr as *const Expr as usize);
    let param_types: Vec<BasicMetadataTypeEnum> =
        std::iter::once(ptr_ty.into()).chain(params.iter().map(|_| ptr_ty.into())).collect();
    let fn_type = ctx.llvm.void_type().fn_type(&param_types, false);
    let implementation = ctx.module.add_function(&impl_name, fn_type, None);

    let caller_bb = ctx.builder.get_insert_block();
    let body_bb = ctx.llvm.append_basic_block(implementation, "entry");
    ctx.builder.position_at_end(body_bb);
    ctx.enter_scope();

    let env_param = implementation.get_nth_param(0).unwrap().into_pointer_value();
    if let Some(struct_ty) = env_struct_ty {
        for (i, (name, _, pointee)) in captures.iter().enumerate() {
            let field = ctx.builder.build_struct_gep(struct_ty, env_param, i as u32, &format!("cap.{name}")).unwrap();
            if *capture_by_ref {
                let original = ctx.builder.build_load(ptr_ty, field, name).unwrap().into_pointer_value();
                ctx.store_slot(name.clone(), original, *pointee);
            } else {
                let value = ctx.builder.build_load(field_type(*pointee), field, name).unwrap();
                ctx.store_variable(name.clone(), value);
            }
        }
    }
    for (i, param) in params.iter().enumerate() {
        let p = implementation.get_nth_param((i + 1) as u32).unwrap();
        ctx.store_variable(param.name.clone(), p);
    }

    let result = super::codegen_expr(ctx, env, cache, body)?;
    match result {
        Some(v) => {
            ctx.builder.build_return(Some(&v)).unwrap();
        }
        None => {
            ctx.builder.build_return(None).unwrap();
        }
    }
    ctx.exit_scope();
    if let Some(bb) = caller_bb {
        ctx.builder.position_at_end(bb);
    }

    let closure_ty = ctx.llvm.struct_type(&[ptr_ty.into(), ptr_ty.into()], false);
    let mut closure = closure_ty.get_undef();
    closure = ctx
        .builder
        .build_insert_value(closure, implementation.as_global_value().as_pointer_value(), 0, "closure.fn")
        .unwrap()
        .into_struct_value();
    closure = ctx.builder.build_insert_value(closure, env_ptr, 1, "closure.env").unwrap().into_struct_value();

    Ok(Some(closure.into()))
}
