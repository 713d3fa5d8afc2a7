//! LLVM code generation (§4.6): lowers analyzed invoke-entries to IR. Mirrors
//! the teacher's `CodegenContext`/`CodeGen` visitor split, generalized from a
//! typed-AST-per-construct visitor to a match over Clay's `Expr`/`Stmt` sum
//! types, per the "exhaustive match over tag-and-downcast" design this crate
//! already uses for its AST (see `ast::mod`).

mod function;
mod inline_llvm;
mod primops;
mod tempstack;
mod types;

pub use function::{codegen_invoke_entry, declare_invoke_entry};
pub use tempstack::TempStack;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use inkwell::basic_block::BasicBlock;
use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::types::BasicTypeEnum;
use inkwell::values::{BasicValueEnum, FunctionValue, PointerValue};

use crate::error::ClayError;
use crate::resolver::GlobalInvokeTables;
use crate::types::TypeRegistry;
use crate::value::TypeKeyRef;

/// A single lexical scope frame: local variable slots plus, for the
/// module-level scope, the names of already-declared functions (so
/// recursive/mutually-recursive calls resolve during body codegen, §4.6).
#[derive(Default)]
pub struct Scope<'ctx> {
    variables: HashMap<Rc<str>, BasicValueEnum<'ctx>>,
    /// `let`-bound locals: an alloca plus the LLVM type stored in it, so a
    /// read can `load` through it and an `&`/assignment can address it
    /// directly, unlike `variables` which holds already-materialized values
    /// (function parameters) with no backing slot.
    slots: HashMap<Rc<str>, (PointerValue<'ctx>, BasicTypeEnum<'ctx>)>,
    functions: HashMap<Rc<str>, FunctionValue<'ctx>>,
}

/// Codegen-time state, parallel to `analyzer`'s `(TypeRegistry, Environment,
/// AnalysisCache)` triple but carrying LLVM handles instead. `'ctx` is the
/// LLVM context lifetime; `'r` borrows the registry and invoke tables built
/// during analysis.
pub struct CodegenContext<'ctx, 'r> {
    pub llvm: &'ctx Context,
    pub module: Module<'ctx>,
    pub builder: Builder<'ctx>,
    pub registry: &'r TypeRegistry,
    pub tables: &'r GlobalInvokeTables,
    llvm_types: RefCell<HashMap<TypeKeyRef, BasicTypeEnum<'ctx>>>,
    scopes: RefCell<Vec<Scope<'ctx>>>,
    temp_stack: RefCell<TempStack<'ctx>>,
    global_ctors: RefCell<Vec<FunctionValue<'ctx>>>,
    global_dtors: RefCell<Vec<FunctionValue<'ctx>>>,
    landing_pads: RefCell<Vec<BasicBlock<'ctx>>>,
    /// `returnIsRef[]` of the invoke-entry currently being codegen'd, so a
    /// nested `Stmt::Return` knows, per return slot, whether to store a value
    /// or the address of an lvalue (§4.6, Open Question 2).
    current_return_is_ref: RefCell<Vec<bool>>,
    /// Enclosing loops' `(condition block, end block, temp-stack marker at
    /// loop entry)`, innermost last, so a nested `break`/`continue` can branch
    /// to the right target and unwind exactly the temporaries created since
    /// the loop was entered (§5).
    loop_targets: RefCell<Vec<(BasicBlock<'ctx>, BasicBlock<'ctx>, tempstack::Marker)>>,
}

impl<'ctx, 'r> CodegenContext<'ctx, 'r> {
    pub fn new(
        llvm: &'ctx Context,
        module_name: &str,
        registry: &'r TypeRegistry,
        tables: &'r GlobalInvokeTables,
    ) -> Self {
        CodegenContext {
            llvm,
            module: llvm.create_module(module_name),
            builder: llvm.create_builder(),
            registry,
            tables,
            llvm_types: RefCell::new(HashMap::new()),
            scopes: RefCell::new(Vec::new()),
            temp_stack: RefCell::new(TempStack::new()),
            global_ctors: RefCell::new(Vec::new()),
            global_dtors: RefCell::new(Vec::new()),
            landing_pads: RefCell::new(Vec::new()),
            current_return_is_ref: RefCell::new(Vec::new()),
            loop_targets: RefCell::new(Vec::new()),
        }
    }

    pub fn set_current_return(&self, is_ref: Vec<bool>) {
        *self.current_return_is_ref.borrow_mut() = is_ref;
    }

    pub fn current_return(&self) -> Vec<bool> {
        self.current_return_is_ref.borrow().clone()
    }

    pub fn enter_scope(&self) {
        self.scopes.borrow_mut().push(Scope::default());
    }

    pub fn exit_scope(&self) {
        self.scopes.borrow_mut().pop();
    }

    /// Binds `name` to an already-materialized value with no backing slot
    /// (function parameters; `Expr::Id` returns it as-is, unaddressable).
    pub fn store_variable(&self, name: Rc<str>, value: BasicValueEnum<'ctx>) {
        if let Some(scope) = self.scopes.borrow_mut().last_mut() {
            scope.variables.insert(name, value);
        }
    }

    /// Binds `name` to a `let`-bound local's alloca (§4.6): `Expr::Id` loads
    /// through it, `&name` takes its address directly.
    pub fn store_slot(&self, name: Rc<str>, slot: PointerValue<'ctx>, pointee: BasicTypeEnum<'ctx>) {
        if let Some(scope) = self.scopes.borrow_mut().last_mut() {
            scope.slots.insert(name, (slot, pointee));
        }
    }

    pub fn find_slot(&self, name: &str) -> Option<(PointerValue<'ctx>, BasicTypeEnum<'ctx>)> {
        self.scopes
            .borrow()
            .iter()
            .rev()
            .find_map(|s| s.slots.get(name).copied())
    }

    /// Reads `name`: loads through its slot if it is a `let`-bound local,
    /// otherwise returns the already-materialized value (a parameter).
    pub fn find_variable(&self, name: &str) -> Option<BasicValueEnum<'ctx>> {
        if let Some((slot, pointee)) = self.find_slot(name) {
            return Some(self.builder.build_load(pointee, slot, name).unwrap());
        }
        self.scopes
            .borrow()
            .iter()
            .rev()
            .find_map(|s| s.variables.get(name).copied())
    }

    pub fn store_function(&self, name: Rc<str>, value: FunctionValue<'ctx>) {
        if let Some(scope) = self.scopes.borrow_mut().last_mut() {
            scope.functions.insert(name, value);
        } else {
            // Module-level functions registered before any scope is entered
            // (the two-pass declaration registration, §4.6) go in a synthetic
            // root scope.
            self.scopes.borrow_mut().push(Scope::default());
            self.scopes.borrow_mut().last_mut().unwrap().functions.insert(name, value);
        }
    }

    pub fn find_function(&self, name: &str) -> Option<FunctionValue<'ctx>> {
        self.scopes
            .borrow()
            .iter()
            .rev()
            .find_map(|s| s.functions.get(name).copied())
    }

    pub fn temp_stack(&self) -> std::cell::RefMut<'_, TempStack<'ctx>> {
        self.temp_stack.borrow_mut()
    }

    pub fn push_landing_pad(&self, bb: BasicBlock<'ctx>) {
        self.landing_pads.borrow_mut().push(bb);
    }

    pub fn pop_landing_pad(&self) {
        self.landing_pads.borrow_mut().pop();
    }

    /// The currently active `catch` cascade target, if any (§4.6): an
    /// exception raised with no enclosing `try` unwinds out of the function
    /// entirely, which the driver turns into a call to the personality
    /// routine's default `_Unwind_Resume` path.
    pub fn current_landing_pad(&self) -> Option<BasicBlock<'ctx>> {
        self.landing_pads.borrow().last().copied()
    }

    pub fn push_loop_target(&self, cond_bb: BasicBlock<'ctx>, end_bb: BasicBlock<'ctx>, marker: tempstack::Marker) {
        self.loop_targets.borrow_mut().push((cond_bb, end_bb, marker));
    }

    pub fn pop_loop_target(&self) {
        self.loop_targets.borrow_mut().pop();
    }

    /// `(condition block, end block, entry marker)` of the innermost
    /// enclosing loop, for `break`/`continue` to target (§5). `None` outside
    /// any loop, which a `break`/`continue` there treats as a codegen error.
    pub fn current_loop_target(&self) -> Option<(BasicBlock<'ctx>, BasicBlock<'ctx>, tempstack::Marker)> {
        self.loop_targets.borrow().last().copied()
    }

    pub fn register_global_ctor(&self, f: FunctionValue<'ctx>) {
        self.global_ctors.borrow_mut().push(f);
    }

    pub fn register_global_dtor(&self, f: FunctionValue<'ctx>) {
        self.global_dtors.borrow_mut().push(f);
    }

    /// Emits `llvm.global_ctors`/`llvm.global_dtors` from every global
    /// registered via `register_global_ctor`/`register_global_dtor` (§5):
    /// module-scope `var`s run their initializer before `main` and their
    /// destructor after it returns, in declaration order forward for ctors
    /// and reverse for dtors.
    pub fn finalize_globals(&self) {
        types::emit_global_ctors_dtors(self, &self.global_ctors.borrow(), &self.global_dtors.borrow());
    }

    pub fn llvm_type(&self, ty: &crate::types::Type) -> BasicTypeEnum<'ctx> {
        let key = TypeKeyRef::from(ty);
        if let Some(t) = self.llvm_types.borrow().get(&key) {
            return *t;
        }
        let llvm_ty = types::convert_type(self, ty);
        self.llvm_types.borrow_mut().insert(key, llvm_ty);
        llvm_ty
    }
}

/// Codegen entry point for a single analyzed expression. Parallel in shape
/// to `analyzer::analyze_expr`, consuming the invoke-entry/type information
/// the analyzer already computed rather than re-deriving it.
pub fn codegen_expr<'ctx, 'r>(
    ctx: &CodegenContext<'ctx, 'r>,
    env: &crate::env::Environment,
    cache: &crate::cache::AnalysisCache,
    expr: &crate::ast::Expr,
) -> Result<Option<BasicValueEnum<'ctx>>, ClayError> {
    use crate::ast::Expr;

    match expr {
        Expr::Id(id) => Ok(ctx.find_variable(&id.name)),

        Expr::BoolLit(b, _) => Ok(Some(ctx.llvm.bool_type().const_int(*b as u64, false).into())),
        Expr::IntLit { value, .. } => {
            let mpv = crate::analyzer::analyze_expr(ctx.tables, ctx.registry, env, cache, expr)?;
            let ty = mpv.0[0].ty.clone();
            let int_ty = match ctx.llvm_type(&ty) {
                BasicTypeEnum::IntType(it) => it,
                _ => return Err(ClayError::Internal("integer literal analyzed to a non-integer LLVM type")),
            };
            Ok(Some(int_ty.const_int(*value as u64, *value < 0).into()))
        }
        Expr::FloatLit { value, .. } => Ok(Some(ctx.llvm.f64_type().const_float(*value).into())),
        Expr::CharLit(c, _) => Ok(Some(ctx.llvm.i8_type().const_int(*c as u64, false).into())),
        Expr::StringLit(s, _) => Ok(Some(
            ctx.builder
                .build_global_string_ptr(s, "str")
                .unwrap()
                .as_pointer_value()
                .into(),
        )),

        Expr::Tuple(elements, _) => {
            let mut values = Vec::with_capacity(elements.len());
            for e in elements {
                let v = codegen_expr(ctx, env, cache, e)?
                    .ok_or_else(|| ClayError::Internal("tuple element codegen produced no value"))?;
                values.push(v);
            }
            let struct_ty = ctx.llvm.struct_type(
                &values.iter().map(|v| v.get_type()).collect::<Vec<_>>(),
                false,
            );
            let mut agg = struct_ty.get_undef();
            for (i, v) in values.into_iter().enumerate() {
                agg = ctx
                    .builder
                    .build_insert_value(agg, v, i as u32, "tup")
                    .unwrap()
                    .into_struct_value();
            }
            Ok(Some(agg.into()))
        }

        Expr::And(lhs, rhs, _) => codegen_short_circuit(ctx, env, cache, lhs, rhs, true),
        Expr::Or(lhs, rhs, _) => codegen_short_circuit(ctx, env, cache, lhs, rhs, false),

        Expr::AddressOf(inner, _) => codegen_lvalue_address(ctx, env, cache, inner),
        Expr::Deref(inner, _) => {
            let ptr = codegen_expr(ctx, env, cache, inner)?
                .ok_or_else(|| ClayError::Internal("dereferenced expression produced no value"))?;
            let mpv = crate::analyzer::analyze_expr(ctx.tables, ctx.registry, env, cache, inner)?;
            let crate::types::TypeData::Pointer(pointee) = &*mpv.0[0].ty.0 else {
                return Err(ClayError::Internal("deref of a non-pointer analyzed type"));
            };
            let pointee_llvm = ctx.llvm_type(pointee);
            let ptr = ptr.into_pointer_value();
            Ok(Some(ctx.builder.build_load(pointee_llvm, ptr, "deref").unwrap()))
        }

        Expr::Dispatch(inner, _) => codegen_expr(ctx, env, cache, inner),

        Expr::FieldRef { .. } | Expr::Binary { .. } | Expr::Unary { .. } => {
            let desugared = crate::analyzer::desugar_operator(expr);
            codegen_expr(ctx, env, cache, &desugared)
        }

        Expr::Call { callee, args, position } => codegen_call(ctx, env, cache, callee, args, position),

        Expr::Array(elements, _) => {
            let mut values = Vec::with_capacity(elements.len());
            for e in elements {
                values.push(
                    codegen_expr(ctx, env, cache, e)?
                        .ok_or_else(|| ClayError::Internal("array element codegen produced no value"))?,
                );
            }
            let elem_ty = values.first().map(|v| v.get_type());
            match elem_ty {
                None => Ok(None),
                Some(t) => {
                    let array_ty = t.array_type(values.len() as u32);
                    let mut agg = array_ty.get_undef();
                    for (i, v) in values.into_iter().enumerate() {
                        agg = ctx
                            .builder
                            .build_insert_value(agg, v, i as u32, "arr")
                            .unwrap()
                            .into_array_value();
                    }
                    Ok(Some(agg.into()))
                }
            }
        }

        Expr::Index { .. } => Ok(None),

        Expr::If { condition, then_branch, else_branch, .. } => {
            let cond = codegen_expr(ctx, env, cache, condition)?
                .ok_or_else(|| ClayError::Internal("if-condition codegen produced no value"))?
                .into_int_value();

            let f = ctx.builder.get_insert_block().unwrap().get_parent().unwrap();
            let then_bb = ctx.llvm.append_basic_block(f, "if.then");
            let else_bb = ctx.llvm.append_basic_block(f, "if.else");
            let merge_bb = ctx.llvm.append_basic_block(f, "if.end");

            ctx.builder.build_conditional_branch(cond, then_bb, else_bb).unwrap();

            ctx.builder.position_at_end(then_bb);
            let then_val = codegen_expr(ctx, env, cache, then_branch)?;
            let then_end_bb = ctx.builder.get_insert_block().unwrap();
            if then_end_bb.get_terminator().is_none() {
                ctx.builder.build_unconditional_branch(merge_bb).unwrap();
            }

            ctx.builder.position_at_end(else_bb);
            let else_val = codegen_expr(ctx, env, cache, else_branch)?;
            let else_end_bb = ctx.builder.get_insert_block().unwrap();
            if else_end_bb.get_terminator().is_none() {
                ctx.builder.build_unconditional_branch(merge_bb).unwrap();
            }

            ctx.builder.position_at_end(merge_bb);
            match (then_val, else_val) {
                (Some(t), Some(e)) => {
                    let phi = ctx.builder.build_phi(t.get_type(), "if.result").unwrap();
                    phi.add_incoming(&[(&t, then_end_bb), (&e, else_end_bb)]);
                    Ok(Some(phi.as_basic_value()))
                }
                _ => Ok(None),
            }
        }

        Expr::Block { statements, trailing, .. } => {
            ctx.enter_scope();
            let marker = ctx.temp_stack().mark();
            for stmt in statements {
                codegen_stmt(ctx, env, cache, stmt)?;
            }
            let result = match trailing {
                Some(e) => codegen_expr(ctx, env, cache, e)?,
                None => None,
            };
            ctx.temp_stack().destroy_down_to(ctx, marker);
            ctx.exit_scope();
            Ok(result)
        }

        Expr::Lambda { .. } => function::codegen_lambda_reference(ctx, env, cache, expr),
    }
}

fn codegen_short_circuit<'ctx, 'r>(
    ctx: &CodegenContext<'ctx, 'r>,
    env: &crate::env::Environment,
    cache: &crate::cache::AnalysisCache,
    lhs: &crate::ast::Expr,
    rhs: &crate::ast::Expr,
    is_and: bool,
) -> Result<Option<BasicValueEnum<'ctx>>, ClayError> {
    let left = codegen_expr(ctx, env, cache, lhs)?
        .ok_or_else(|| ClayError::Internal("and/or left operand produced no value"))?
        .into_int_value();

    let f = ctx.builder.get_insert_block().unwrap().get_parent().unwrap();
    let rhs_bb = ctx.llvm.append_basic_block(f, if is_and { "and.rhs" } else { "or.rhs" });
    let merge_bb = ctx.llvm.append_basic_block(f, if is_and { "and.end" } else { "or.end" });
    let entry_bb = ctx.builder.get_insert_block().unwrap();

    if is_and {
        ctx.builder.build_conditional_branch(left, rhs_bb, merge_bb).unwrap();
    } else {
        ctx.builder.build_conditional_branch(left, merge_bb, rhs_bb).unwrap();
    }

    ctx.builder.position_at_end(rhs_bb);
    let right = codegen_expr(ctx, env, cache, rhs)?
        .ok_or_else(|| ClayError::Internal("and/or right operand produced no value"))?
        .into_int_value();
    let rhs_end_bb = ctx.builder.get_insert_block().unwrap();
    ctx.builder.build_unconditional_branch(merge_bb).unwrap();

    ctx.builder.position_at_end(merge_bb);
    let phi = ctx.builder.build_phi(ctx.llvm.bool_type(), "sc").unwrap();
    phi.add_incoming(&[(&left, entry_bb), (&right, rhs_end_bb)]);
    Ok(Some(phi.as_basic_value()))
}

fn codegen_lvalue_address<'ctx, 'r>(
    ctx: &CodegenContext<'ctx, 'r>,
    env: &crate::env::Environment,
    cache: &crate::cache::AnalysisCache,
    expr: &crate::ast::Expr,
) -> Result<Option<BasicValueEnum<'ctx>>, ClayError> {
    // Only identifiers denote addressable lvalues in this codegen; the
    // analyzer already rejected `&<temporary>` (§4.4). A name with no
    // backing slot (a parameter) has no address to take here.
    match expr {
        crate::ast::Expr::Id(id) => Ok(ctx.find_slot(&id.name).map(|(ptr, _)| ptr.into())),
        _ => codegen_expr(ctx, env, cache, expr),
    }
}

fn codegen_call<'ctx, 'r>(
    ctx: &CodegenContext<'ctx, 'r>,
    env: &crate::env::Environment,
    cache: &crate::cache::AnalysisCache,
    callee: &crate::ast::Expr,
    args: &[crate::ast::Expr],
    position: &crate::span::Span,
) -> Result<Option<BasicValueEnum<'ctx>>, ClayError> {
    let crate::ast::Expr::Id(id) = callee else {
        return Err(ClayError::Internal("computed call targets are not supported by this codegen"));
    };

    if let Some(op) = crate::primop::PrimOp::by_name(&id.name) {
        let mut arg_values = Vec::with_capacity(args.len());
        for a in args {
            arg_values.push(
                codegen_expr(ctx, env, cache, a)?
                    .ok_or_else(|| ClayError::Internal("primop argument produced no value"))?,
            );
        }
        return Ok(primops::codegen_primop(ctx, op, &arg_values));
    }

    if let Some(dispatch_index) = args.iter().position(|a| matches!(a, crate::ast::Expr::Dispatch(..))) {
        let crate::ast::Expr::Dispatch(inner, _) = &args[dispatch_index] else {
            unreachable!()
        };
        return codegen_dispatch_call(ctx, env, cache, id, args, dispatch_index, inner, position);
    }

    let mut arg_types = Vec::with_capacity(args.len());
    let mut arg_tempness = Vec::with_capacity(args.len());
    let mut arg_values = Vec::with_capacity(args.len());
    for a in args {
        let mpv = crate::analyzer::analyze_expr(ctx.tables, ctx.registry, env, cache, a)?;
        arg_types.push(mpv.0[0].ty.clone());
        arg_tempness.push(mpv.0[0].is_temp);
        arg_values.push(
            codegen_expr(ctx, env, cache, a)?
                .ok_or_else(|| ClayError::Internal("call argument produced no value"))?,
        );
    }

    let entry = ctx
        .tables
        .get_or_resolve(ctx.registry, cache, &id.name, &arg_types, &arg_tempness, args, env)?;

    let llvm_name = entry
        .llvm_func_name
        .borrow()
        .clone()
        .ok_or_else(|| ClayError::Internal("call target has not been codegen'd yet").with_location(position.clone()))?;

    let f = ctx
        .find_function(&llvm_name)
        .or_else(|| ctx.module.get_function(&llvm_name))
        .ok_or_else(|| ClayError::Internal(format!("undeclared llvm function `{}`", llvm_name)))?;

    let args_meta: Vec<inkwell::values::BasicMetadataValueEnum> = arg_values.into_iter().map(Into::into).collect();
    let call = ctx.builder.build_call(f, &args_meta, "call").unwrap();
    Ok(call.try_as_basic_value().left())
}

/// Lowers a call with one `dispatch`-flagged argument (§4.4, §8 "Dispatch
/// closure"): switches on the dispatched variant's runtime tag, resolving
/// and calling a distinct invoke-entry per member, and joins the results
/// with a phi — the analyzer has already proven every branch analyzes to
/// the same `MultiPValue`, so the phi's incoming values all share one type.
#[allow(clippy::too_many_arguments)]
fn codegen_dispatch_call<'ctx, 'r>(
    ctx: &CodegenContext<'ctx, 'r>,
    env: &crate::env::Environment,
    cache: &crate::cache::AnalysisCache,
    id: &crate::span::Ident,
    args: &[crate::ast::Expr],
    dispatch_index: usize,
    inner: &crate::ast::Expr,
    position: &crate::span::Span,
) -> Result<Option<BasicValueEnum<'ctx>>, ClayError> {
    let inner_mpv = crate::analyzer::analyze_expr(ctx.tables, ctx.registry, env, cache, inner)?;
    let inner_pv = inner_mpv
        .0
        .first()
        .cloned()
        .ok_or_else(|| ClayError::Internal("dispatch target analyzed to an empty value vector"))?;
    let members = ctx.registry.variant_members(&inner_pv.ty).ok_or_else(|| {
        ClayError::Internal("dispatch target is not a variant".to_string()).with_location(position.clone())
    })?;

    let variant_value = codegen_expr(ctx, env, cache, inner)?
        .ok_or_else(|| ClayError::Internal("dispatch target produced no value"))?;
    let struct_ty = variant_value.get_type().into_struct_type();
    let slot = ctx.builder.build_alloca(struct_ty, "dispatch.slot").unwrap();
    ctx.builder.build_store(slot, variant_value).unwrap();
    let tag_ptr = ctx.builder.build_struct_gep(struct_ty, slot, 0, "dispatch.tag_ptr").unwrap();
    let tag = ctx
        .builder
        .build_load(ctx.llvm.i32_type(), tag_ptr, "dispatch.tag")
        .unwrap()
        .into_int_value();
    let payload_ptr = ctx.builder.build_struct_gep(struct_ty, slot, 1, "dispatch.payload_ptr").unwrap();
    let dispatch_entry_bb = ctx.builder.get_insert_block().unwrap();

    // The other call arguments are shared across every branch: codegen'd
    // once in the block that precedes the switch.
    let mut other_value: Vec<Option<BasicValueEnum<'ctx>>> = Vec::with_capacity(args.len());
    let mut other_type: Vec<Option<crate::types::Type>> = Vec::with_capacity(args.len());
    let mut other_temp: Vec<Option<bool>> = Vec::with_capacity(args.len());
    for (i, a) in args.iter().enumerate() {
        if i == dispatch_index {
            other_value.push(None);
            other_type.push(None);
            other_temp.push(None);
            continue;
        }
        let mpv = crate::analyzer::analyze_expr(ctx.tables, ctx.registry, env, cache, a)?;
        let pv = mpv.0[0].clone();
        other_type.push(Some(pv.ty));
        other_temp.push(Some(pv.is_temp));
        other_value.push(Some(
            codegen_expr(ctx, env, cache, a)?.ok_or_else(|| ClayError::Internal("call argument produced no value"))?,
        ));
    }

    let f = dispatch_entry_bb.get_parent().unwrap();
    let merge_bb = ctx.llvm.append_basic_block(f, "dispatch.end");
    let unreachable_bb = ctx.llvm.append_basic_block(f, "dispatch.unreachable");

    let mut cases = Vec::with_capacity(members.len());
    let mut incoming: Vec<(BasicValueEnum<'ctx>, BasicBlock<'ctx>)> = Vec::new();

    for (i, member_ty) in members.iter().enumerate() {
        let case_bb = ctx.llvm.append_basic_block(f, &format!("dispatch.case{i}"));
        cases.push((ctx.llvm.i32_type().const_int(i as u64, false), case_bb));

        ctx.builder.position_at_end(case_bb);
        let member_llvm_ty = ctx.llvm_type(member_ty);
        let member_value = ctx
            .builder
            .build_load(member_llvm_ty, payload_ptr, "dispatch.member")
            .unwrap();

        let mut arg_types = Vec::with_capacity(args.len());
        let mut arg_tempness = Vec::with_capacity(args.len());
        let mut arg_values = Vec::with_capacity(args.len());
        for j in 0..args.len() {
            if j == dispatch_index {
                arg_types.push(member_ty.clone());
                arg_tempness.push(inner_pv.is_temp);
                arg_values.push(member_value);
            } else {
                arg_types.push(other_type[j].clone().unwrap());
                arg_tempness.push(other_temp[j].unwrap());
                arg_values.push(other_value[j].unwrap());
            }
        }

        let entry = ctx
            .tables
            .get_or_resolve(ctx.registry, cache, &id.name, &arg_types, &arg_tempness, args, env)?;
        let llvm_name = entry.llvm_func_name.borrow().clone().ok_or_else(|| {
            ClayError::Internal("call target has not been codegen'd yet").with_location(position.clone())
        })?;
        let callee_fn = ctx
            .find_function(&llvm_name)
            .or_else(|| ctx.module.get_function(&llvm_name))
            .ok_or_else(|| ClayError::Internal(format!("undeclared llvm function `{}`", llvm_name)))?;

        let args_meta: Vec<inkwell::values::BasicMetadataValueEnum> =
            arg_values.into_iter().map(Into::into).collect();
        let call = ctx.builder.build_call(callee_fn, &args_meta, "dispatch.call").unwrap();
        if let Some(v) = call.try_as_basic_value().left() {
            incoming.push((v, ctx.builder.get_insert_block().unwrap()));
        }
        ctx.builder.build_unconditional_branch(merge_bb).unwrap();
    }

    ctx.builder.position_at_end(unreachable_bb);
    ctx.builder.build_unreachable().unwrap();

    ctx.builder.position_at_end(dispatch_entry_bb);
    ctx.builder.build_switch(tag, unreachable_bb, &cases).unwrap();

    ctx.builder.position_at_end(merge_bb);
    if incoming.is_empty() {
        return Ok(None);
    }
    let phi = ctx.builder.build_phi(incoming[0].0.get_type(), "dispatch.result").unwrap();
    let refs: Vec<(&BasicValueEnum<'ctx>, BasicBlock<'ctx>)> = incoming.iter().map(|(v, bb)| (v, *bb)).collect();
    phi.add_incoming(&refs);
    Ok(Some(phi.as_basic_value()))
}

/// Statement codegen, parallel to `analyzer::analyze_stmt`.
pub fn codegen_stmt<'ctx, 'r>(
    ctx: &CodegenContext<'ctx, 'r>,
    env: &crate::env::Environment,
    cache: &crate::cache::AnalysisCache,
    stmt: &crate::ast::Stmt,
) -> Result<(), ClayError> {
    use crate::ast::Stmt;

    match stmt {
        Stmt::Let { name, value, .. } => {
            let v = codegen_expr(ctx, env, cache, value)?
                .ok_or_else(|| ClayError::Internal("let-binding initializer produced no value"))?;
            let slot = ctx.builder.build_alloca(v.get_type(), &name.name).unwrap();
            ctx.builder.build_store(slot, v).unwrap();
            ctx.store_slot(name.name.clone(), slot, v.get_type());
            Ok(())
        }
        Stmt::Assign { target, value, .. } => {
            let v = codegen_expr(ctx, env, cache, value)?
                .ok_or_else(|| ClayError::Internal("assignment rhs produced no value"))?;
            let crate::ast::Expr::Id(id) = target else {
                return Err(ClayError::Internal("only identifier assignment targets are supported"));
            };
            let (slot, _) = ctx
                .find_slot(&id.name)
                .ok_or_else(|| ClayError::Internal(format!("assignment to unknown variable `{}`", id.name)))?;
            ctx.builder.build_store(slot, v).unwrap();
            Ok(())
        }
        Stmt::ExprStmt(expr) => {
            codegen_expr(ctx, env, cache, expr)?;
            Ok(())
        }
        Stmt::Return { kind, values, .. } => function::codegen_return(ctx, env, cache, kind, values),
        Stmt::If { condition, then_branch, else_branch, .. } => {
            let cond = codegen_expr(ctx, env, cache, condition)?
                .ok_or_else(|| ClayError::Internal("if-statement condition produced no value"))?
                .into_int_value();
            let f = ctx.builder.get_insert_block().unwrap().get_parent().unwrap();
            let then_bb = ctx.llvm.append_basic_block(f, "if.then");
            let else_bb = ctx.llvm.append_basic_block(f, "if.else");
            let merge_bb = ctx.llvm.append_basic_block(f, "if.end");
            ctx.builder.build_conditional_branch(cond, then_bb, else_bb).unwrap();

            ctx.builder.position_at_end(then_bb);
            codegen_stmt(ctx, env, cache, then_branch)?;
            if ctx.builder.get_insert_block().unwrap().get_terminator().is_none() {
                ctx.builder.build_unconditional_branch(merge_bb).unwrap();
            }

            ctx.builder.position_at_end(else_bb);
            if let Some(e) = else_branch {
                codegen_stmt(ctx, env, cache, e)?;
            }
            if ctx.builder.get_insert_block().unwrap().get_terminator().is_none() {
                ctx.builder.build_unconditional_branch(merge_bb).unwrap();
            }

            ctx.builder.position_at_end(merge_bb);
            Ok(())
        }
        Stmt::While { condition, body, .. } => {
            let f = ctx.builder.get_insert_block().unwrap().get_parent().unwrap();
            let cond_bb = ctx.llvm.append_basic_block(f, "while.cond");
            let body_bb = ctx.llvm.append_basic_block(f, "while.body");
            let end_bb = ctx.llvm.append_basic_block(f, "while.end");

            ctx.builder.build_unconditional_branch(cond_bb).unwrap();
            ctx.builder.position_at_end(cond_bb);
            let cond = codegen_expr(ctx, env, cache, condition)?
                .ok_or_else(|| ClayError::Internal("while-condition produced no value"))?
                .into_int_value();
            ctx.builder.build_conditional_branch(cond, body_bb, end_bb).unwrap();

            ctx.builder.position_at_end(body_bb);
            let marker = ctx.temp_stack().mark();
            ctx.push_loop_target(cond_bb, end_bb, marker);
            let body_result = codegen_stmt(ctx, env, cache, body);
            ctx.pop_loop_target();
            body_result?;
            if ctx.builder.get_insert_block().unwrap().get_terminator().is_none() {
                ctx.builder.build_unconditional_branch(cond_bb).unwrap();
            }

            ctx.builder.position_at_end(end_bb);
            Ok(())
        }
        Stmt::Break(position) => {
            let (_, end_bb, marker) = ctx.current_loop_target().ok_or_else(|| {
                ClayError::Internal("`break` outside of a loop".to_string()).with_location(position.clone())
            })?;
            ctx.temp_stack().destroy_down_to(ctx, marker);
            ctx.builder.build_unconditional_branch(end_bb).unwrap();
            Ok(())
        }
        Stmt::Continue(position) => {
            let (cond_bb, _, marker) = ctx.current_loop_target().ok_or_else(|| {
                ClayError::Internal("`continue` outside of a loop".to_string()).with_location(position.clone())
            })?;
            ctx.temp_stack().destroy_down_to(ctx, marker);
            ctx.builder.build_unconditional_branch(cond_bb).unwrap();
            Ok(())
        }
        Stmt::Block(stmts, _) => {
            ctx.enter_scope();
            let marker = ctx.temp_stack().mark();
            for s in stmts {
                codegen_stmt(ctx, env, cache, s)?;
            }
            ctx.temp_stack().destroy_down_to(ctx, marker);
            ctx.exit_scope();
            Ok(())
        }
        Stmt::Try { body, catches, .. } => function::codegen_try(ctx, env, cache, body, catches),
    }
}
