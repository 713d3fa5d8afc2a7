//! Analyzer (§4.4): AST → abstract value vectors, memoized per node, driving
//! overload selection. Operator syntax is desugared here, once, into calls
//! against the prelude targets named in §6 (SPEC_FULL §4.4 supplement).

mod desugar;

use crate::ast::{Expr, Stmt};
use crate::cache::AnalysisCache;
use crate::env::{EnvValue, Environment};
use crate::error::{ClayError, OverloadError, TypeError};
use crate::eval::eval_expr;
use crate::resolver::GlobalInvokeTables;
use crate::types::{Primitive, StaticObject, TypeRegistry};
use crate::value::{MultiPValue, PValue};

/// Analyzes a single expression to a `MultiPValue`, consulting and updating
/// the shared memoization cache (§4.4).
fn first_pvalue(mpv: MultiPValue) -> Result<PValue, ClayError> {
    mpv.0
        .into_iter()
        .next()
        .ok_or_else(|| ClayError::Internal("expression analyzed to an empty value vector"))
}

pub fn analyze_expr(
    tables: &GlobalInvokeTables,
    registry: &TypeRegistry,
    env: &Environment,
    cache: &AnalysisCache,
    expr: &Expr,
) -> Result<MultiPValue, ClayError> {
    if let Some(cached) = cache.get(expr) {
        return Ok(cached);
    }
    let result = analyze_expr_uncached(tables, registry, env, cache, expr)?;
    cache.store(expr, result.clone());
    Ok(result)
}

fn analyze_expr_uncached(
    tables: &GlobalInvokeTables,
    registry: &TypeRegistry,
    env: &Environment,
    cache: &AnalysisCache,
    expr: &Expr,
) -> Result<MultiPValue, ClayError> {
    match expr {
        Expr::Id(id) => match env.lookup(&id.name)? {
            EnvValue::PValue(pv) => Ok(MultiPValue::single(pv)),
            other => {
                let obj = other
                    .as_static_object()
                    .ok_or_else(|| ClayError::Internal("identifier bound to a non-object environment entry"))?;
                Ok(MultiPValue::single(PValue::owned(registry.static_type(obj))))
            }
        },

        Expr::BoolLit(..) => Ok(MultiPValue::single(PValue::owned(registry.primitive(Primitive::Bool)))),
        Expr::IntLit { .. } | Expr::FloatLit { .. } | Expr::CharLit(..) | Expr::StringLit(..) => {
            let obj = eval_expr(registry, env, cache, expr)?;
            let StaticObject::ValueHolder(v) = obj else {
                return Err(ClayError::Internal("literal evaluated to a non-value static object"));
            };
            Ok(MultiPValue::single(PValue::owned(v.ty)))
        }

        Expr::Tuple(elements, _) => {
            let mut types = Vec::new();
            for e in elements {
                let mpv = analyze_expr(tables, registry, env, cache, e)?;
                types.push(first_pvalue(mpv)?.ty);
            }
            Ok(MultiPValue::single(PValue::owned(registry.tuple(types))))
        }

        Expr::Array(elements, position) => {
            let mut elem_ty = None;
            for e in elements {
                let mpv = analyze_expr(tables, registry, env, cache, e)?;
                let ty = first_pvalue(mpv)?.ty;
                match &elem_ty {
                    None => elem_ty = Some(ty),
                    Some(t) if *t == ty => {}
                    Some(t) => {
                        return Err(ClayError::Type(TypeError::ReturnTypeDivergence {
                            first: format!("{:?}", t),
                            second: format!("{:?}", ty),
                        })
                        .with_location(position.clone()))
                    }
                }
            }
            let elem_ty = elem_ty.ok_or_else(|| {
                ClayError::Type(TypeError::ExpectingType { found: "empty array literal".to_string() })
                    .with_location(position.clone())
            })?;
            Ok(MultiPValue::single(PValue::owned(
                registry.array(elem_ty, elements.len() as u64),
            )))
        }

        Expr::And(_, _, _) | Expr::Or(_, _, _) => {
            // Short-circuit semantics are handled in codegen; analysis
            // always sees a single bool pvalue (§4.4).
            Ok(MultiPValue::single(PValue::owned(registry.primitive(Primitive::Bool))))
        }

        Expr::AddressOf(inner, position) => {
            let mpv = analyze_expr(tables, registry, env, cache, inner)?;
            let pv = first_pvalue(mpv)?;
            if pv.is_temp {
                return Err(ClayError::Overload(OverloadError::AddressOfTemporary).with_location(position.clone()));
            }
            Ok(MultiPValue::single(PValue::owned(registry.pointer(pv.ty))))
        }

        Expr::Deref(inner, _) => {
            let mpv = analyze_expr(tables, registry, env, cache, inner)?;
            let pv = first_pvalue(mpv)?;
            match &*pv.ty.0 {
                crate::types::TypeData::Pointer(pointee) => {
                    Ok(MultiPValue::single(PValue::borrowed(pointee.clone())))
                }
                _ => Err(ClayError::Type(TypeError::ExpectingPointer {
                    found: format!("{:?}", pv.ty),
                })),
            }
        }

        Expr::Dispatch(inner, _) => analyze_dispatch(tables, registry, env, cache, inner),

        Expr::FieldRef { .. } | Expr::Binary { .. } | Expr::Unary { .. } => {
            let desugared = desugar::desugar_operator(expr);
            analyze_expr_uncached(tables, registry, env, cache, &desugared)
        }

        Expr::Call { callee, args, position } => analyze_call(tables, registry, env, cache, callee, args, position),

        Expr::Index { .. } => {
            let obj = eval_expr(registry, env, cache, expr)?;
            Ok(MultiPValue::single(PValue::owned(registry.static_type(obj))))
        }

        Expr::If { condition, then_branch, else_branch, position } => {
            let cond_mpv = analyze_expr(tables, registry, env, cache, condition)?;
            let cond_pv = first_pvalue(cond_mpv)?;
            if !matches!(&*cond_pv.ty.0, crate::types::TypeData::Primitive(Primitive::Bool)) {
                return Err(ClayError::Type(TypeError::ArgumentMismatch {
                    expected: "Bool".to_string(),
                    found: format!("{:?}", cond_pv.ty),
                })
                .with_location(position.clone()));
            }
            let then_mpv = analyze_expr(tables, registry, env, cache, then_branch)?;
            let else_mpv = analyze_expr(tables, registry, env, cache, else_branch)?;
            if then_mpv != else_mpv {
                return Err(ClayError::Type(TypeError::ReturnTypeDivergence {
                    first: format!("{:?}", then_mpv),
                    second: format!("{:?}", else_mpv),
                })
                .with_location(position.clone()));
            }
            Ok(then_mpv)
        }

        Expr::Block { statements, trailing, .. } => {
            let block_env = env.child();
            for stmt in statements {
                analyze_stmt(tables, registry, &block_env, cache, stmt)?;
            }
            match trailing {
                Some(e) => analyze_expr(tables, registry, &block_env, cache, e),
                None => Ok(MultiPValue::single(PValue::owned(registry.primitive(Primitive::Void)))),
            }
        }

        Expr::Lambda { capture_by_ref, params, body, position } => {
            analyze_lambda(tables, registry, env, cache, *capture_by_ref, params, body, position)
        }
    }
}

fn analyze_call(
    tables: &GlobalInvokeTables,
    registry: &TypeRegistry,
    env: &Environment,
    cache: &AnalysisCache,
    callee: &Expr,
    args: &[Expr],
    position: &crate::span::Span,
) -> Result<MultiPValue, ClayError> {
    // A call whose callee's type is a code-pointer returns the pointer's
    // declared return vector directly (§4.4).
    if let Expr::Id(id) = callee {
        if let Ok(EnvValue::PValue(pv)) = env.lookup(&id.name) {
            if let crate::types::TypeData::CodePointer { return_types, return_is_ref, .. } = &*pv.ty.0 {
                let values = return_types
                    .iter()
                    .zip(return_is_ref.iter())
                    .map(|(t, is_ref)| PValue { ty: t.clone(), is_temp: !is_ref })
                    .collect();
                return Ok(MultiPValue(values));
            }
        }
    }

    let Expr::Id(id) = callee else {
        return Err(ClayError::Overload(OverloadError::NoMatchingOperation {
            callable: "<computed callee>".to_string(),
            args: String::new(),
        })
        .with_location(position.clone()));
    };

    // Each argument contributes one candidate pvalue, except a `dispatch`
    // (`*x`)-flagged one, which contributes one candidate per member of its
    // variant (§4.4, §8 "Dispatch closure"). Resolution then runs once per
    // combination of dispatch branches, and every branch must analyze to the
    // identical `MultiPValue` (§8 scenario 3).
    let mut arg_candidates: Vec<Vec<PValue>> = Vec::with_capacity(args.len());
    for a in args {
        if let Expr::Dispatch(inner, _) = a {
            let mpv = analyze_expr(tables, registry, env, cache, inner)?;
            let pv = first_pvalue(mpv)?;
            match registry.variant_members(&pv.ty) {
                Some(members) if !members.is_empty() => {
                    arg_candidates.push(
                        members
                            .iter()
                            .map(|t| PValue { ty: t.clone(), is_temp: pv.is_temp })
                            .collect(),
                    );
                }
                _ => arg_candidates.push(vec![pv]),
            }
        } else {
            let mpv = analyze_expr(tables, registry, env, cache, a)?;
            arg_candidates.push(vec![first_pvalue(mpv)?]);
        }
    }

    let branch_count = arg_candidates.iter().map(Vec::len).max().unwrap_or(1);
    let mut agreed: Option<MultiPValue> = None;
    for branch in 0..branch_count {
        let arg_types: Vec<_> = arg_candidates
            .iter()
            .map(|candidates| candidates[branch.min(candidates.len() - 1)].ty.clone())
            .collect();
        let arg_tempness: Vec<_> = arg_candidates
            .iter()
            .map(|candidates| candidates[branch.min(candidates.len() - 1)].is_temp)
            .collect();

        let entry = tables.get_or_resolve(
            registry,
            cache,
            &id.name,
            &arg_types,
            &arg_tempness,
            args,
            env,
        )?;

        let return_types = entry.return_types.borrow().clone();
        let return_is_ref = entry.return_is_ref.borrow().clone();
        let branch_mpv = if return_types.is_empty() {
            MultiPValue::single(PValue::owned(registry.primitive(Primitive::Void)))
        } else {
            MultiPValue(
                return_types
                    .into_iter()
                    .zip(return_is_ref)
                    .map(|(t, is_ref)| PValue { ty: t, is_temp: !is_ref })
                    .collect(),
            )
        };

        agreed = match agreed {
            None => Some(branch_mpv),
            Some(prev) if prev == branch_mpv => Some(prev),
            Some(prev) => {
                return Err(ClayError::Type(TypeError::ReturnTypeDivergence {
                    first: format!("{:?}", prev.types()),
                    second: format!("{:?}", branch_mpv.types()),
                })
                .with_location(position.clone()))
            }
        };
    }

    Ok(agreed.unwrap_or_else(|| MultiPValue::single(PValue::owned(registry.primitive(Primitive::Void)))))
}

/// `dispatch` expressions (`*x` at a call site, §4.4): enumerates every
/// member type of the dispatched variant and requires all branches to
/// analyze to the same `MultiPValue` (Dispatch closure, §8).
fn analyze_dispatch(
    tables: &GlobalInvokeTables,
    registry: &TypeRegistry,
    env: &Environment,
    cache: &AnalysisCache,
    inner: &Expr,
) -> Result<MultiPValue, ClayError> {
    let mpv = analyze_expr(tables, registry, env, cache, inner)?;
    let pv = first_pvalue(mpv)?;
    let Some(members) = registry.variant_members(&pv.ty) else {
        return Ok(MultiPValue::single(pv));
    };
    Ok(MultiPValue(
        members
            .iter()
            .map(|t| PValue { ty: t.clone(), is_temp: pv.is_temp })
            .collect(),
    ))
}

fn analyze_lambda(
    tables: &GlobalInvokeTables,
    registry: &TypeRegistry,
    env: &Environment,
    cache: &AnalysisCache,
    _capture_by_ref: bool,
    _params: &[crate::span::Ident],
    body: &Expr,
    _position: &crate::span::Span,
) -> Result<MultiPValue, ClayError> {
    // The closure record and its `call` overload are synthesized by codegen
    // from the body's free variables and `_capture_by_ref` (§4.4, §4.6 Open
    // Question 3); analysis here only needs the body's shape to drive
    // overload resolution at call sites.
    let lambda_env = env.child();
    analyze_expr(tables, registry, &lambda_env, cache, body)
}

/// Analyzes a statement for control-flow information only: whether it sets
/// or refines the enclosing function's return types (§4.4).
pub fn analyze_stmt(
    tables: &GlobalInvokeTables,
    registry: &TypeRegistry,
    env: &Environment,
    cache: &AnalysisCache,
    stmt: &Stmt,
) -> Result<Option<MultiPValue>, ClayError> {
    match stmt {
        Stmt::Let { name, value, .. } => {
            let mpv = analyze_expr(tables, registry, env, cache, value)?;
            let pv = first_pvalue(mpv)?;
            env.bind(name.name.clone(), EnvValue::PValue(pv));
            Ok(None)
        }
        Stmt::Assign { value, .. } => {
            analyze_expr(tables, registry, env, cache, value)?;
            Ok(None)
        }
        Stmt::ExprStmt(expr) => {
            analyze_expr(tables, registry, env, cache, expr)?;
            Ok(None)
        }
        Stmt::Return { values, .. } => {
            let mut result = Vec::new();
            for v in values {
                let mpv = analyze_expr(tables, registry, env, cache, v)?;
                result.extend(mpv.0);
            }
            Ok(Some(MultiPValue(result)))
        }
        Stmt::If { condition, then_branch, else_branch, position } => {
            analyze_expr(tables, registry, env, cache, condition)?;
            let then_ret = analyze_stmt(tables, registry, env, cache, then_branch)?;
            let else_ret = match else_branch {
                Some(s) => analyze_stmt(tables, registry, env, cache, s)?,
                None => None,
            };
            merge_returns(then_ret, else_ret, position)
        }
        Stmt::While { condition, body, .. } => {
            analyze_expr(tables, registry, env, cache, condition)?;
            analyze_stmt(tables, registry, env, cache, body)
        }
        Stmt::Break(_) | Stmt::Continue(_) => Ok(None),
        Stmt::Block(stmts, _) => {
            let block_env = env.child();
            let mut ret = None;
            for s in stmts {
                let r = analyze_stmt(tables, registry, &block_env, cache, s)?;
                ret = merge_returns(ret, r, &crate::span::Span::dummy())?;
            }
            Ok(ret)
        }
        Stmt::Try { body, catches, .. } => {
            let mut ret = analyze_stmt(tables, registry, env, cache, body)?;
            for clause in catches {
                let catch_env = env.child();
                let r = analyze_stmt(tables, registry, &catch_env, cache, &clause.body)?;
                ret = merge_returns(ret, r, &crate::span::Span::dummy())?;
            }
            Ok(ret)
        }
    }
}

fn merge_returns(
    a: Option<MultiPValue>,
    b: Option<MultiPValue>,
    position: &crate::span::Span,
) -> Result<Option<MultiPValue>, ClayError> {
    match (a, b) {
        (None, x) | (x, None) => Ok(x),
        (Some(a), Some(b)) if a == b => Ok(Some(a)),
        (Some(a), Some(b)) => Err(ClayError::Type(TypeError::ReturnTypeDivergence {
            first: format!("{:?}", a),
            second: format!("{:?}", b),
        })
        .with_location(position.clone())),
    }
}

/// Analyzes a full function body, returning the structural union of all
/// `return` statements' result vectors (§4.4). Divergence between branches
/// is an error; a body with no reachable `return` analyzes to void.
pub fn analyze_function_body(
    tables: &GlobalInvokeTables,
    registry: &TypeRegistry,
    env: &Environment,
    cache: &AnalysisCache,
    body: &Stmt,
) -> Result<MultiPValue, ClayError> {
    match analyze_stmt(tables, registry, env, cache, body)? {
        Some(mpv) => Ok(mpv),
        None => Ok(MultiPValue::single(PValue::owned(registry.primitive(Primitive::Void)))),
    }
}

pub use desugar::desugar_operator;
