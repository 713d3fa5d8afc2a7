//! Pattern engine (§4.2): unification of patterns against types and values.
//! Unification is one-shot — there is no backtracking; ambiguity among
//! candidates is resolved by declaration order in the resolver (§4.5), not
//! by re-trying a pattern with a different binding.

use crate::ast::pattern::PatternExpr;
use crate::cache::AnalysisCache;
use crate::env::{Cell, EnvValue, Environment};
use crate::error::{ClayError, StaticEvalError};
use crate::eval::eval_expr;
use crate::types::{StaticObject, Type, TypeData, TypeRegistry};
use crate::value::PValue;

/// Binds a fresh cell to `object`; a previously-bound cell requires
/// `objectEquals` (structural-or-identity equality, §4.1) against the new
/// object.
pub fn unify_pattern_obj(
    registry: &TypeRegistry,
    env: &Environment,
    cache: &AnalysisCache,
    pattern: &PatternExpr,
    object: StaticObject,
) -> Result<bool, ClayError> {
    match pattern {
        PatternExpr::CellRef(name) => {
            let cell = match env.lookup(&name.name) {
                Ok(EnvValue::PatternCell(cell)) => cell,
                _ => {
                    let cell = Cell::new(name.clone());
                    env.bind(name.name.clone(), EnvValue::PatternCell(cell.clone()));
                    cell
                }
            };
            match cell.get() {
                None => {
                    *cell.bound.borrow_mut() = Some(object);
                    Ok(true)
                }
                Some(existing) => Ok(existing == object),
            }
        }
        PatternExpr::Expr(expr) => {
            let evaluated = eval_expr(registry, env, cache, expr)?;
            Ok(evaluated == object)
        }
    }
}

/// Evaluates the pattern to a type (possibly via a type-constructor
/// application) and structurally matches it against `ty`, binding any cells
/// encountered along the way (§4.2: `Pointer[T]` binds `T` to the pointee,
/// `Array[T, n]` binds both the element type and the size).
pub fn unify_type(
    registry: &TypeRegistry,
    env: &Environment,
    cache: &AnalysisCache,
    pattern: &PatternExpr,
    ty: &Type,
) -> Result<bool, ClayError> {
    match pattern {
        PatternExpr::CellRef(_) => {
            unify_pattern_obj(registry, env, cache, pattern, StaticObject::Type(ty.clone()))
        }
        PatternExpr::Expr(crate::ast::Expr::Index { callee, args, .. }) => {
            unify_constructor_application(registry, env, cache, callee, args, ty)
        }
        PatternExpr::Expr(expr) => {
            let evaluated = eval_expr(registry, env, cache, expr)?;
            match evaluated {
                StaticObject::Type(t) => Ok(&t == ty),
                _ => Err(ClayError::Type(crate::error::TypeError::ExpectingType {
                    found: format!("{:?}", evaluated),
                })
                .with_location(expr.position().clone())),
            }
        }
    }
}

fn unify_constructor_application(
    registry: &TypeRegistry,
    env: &Environment,
    cache: &AnalysisCache,
    callee: &crate::ast::Expr,
    args: &[crate::ast::Expr],
    ty: &Type,
) -> Result<bool, ClayError> {
    let crate::ast::Expr::Id(id) = callee else {
        return Ok(false);
    };

    match (id.name.as_ref(), &*ty.0) {
        ("Pointer", TypeData::Pointer(pointee)) => {
            let [arg] = args else { return Ok(false) };
            unify_as_pattern(registry, env, cache, arg, pointee)
        }
        ("Array", TypeData::Array(elem, len)) => {
            let [elem_pat, len_pat] = args else { return Ok(false) };
            let elem_ok = unify_as_pattern(registry, env, cache, elem_pat, elem)?;
            let len_ok = unify_pattern_obj(
                registry,
                env,
                cache,
                &pattern_of(len_pat),
                StaticObject::ValueHolder(crate::types::ValueHolder::from_i128(
                    registry.primitive(crate::types::Primitive::Int(
                        crate::types::IntWidth::W64,
                        false,
                    )),
                    *len as i128,
                )),
            )?;
            Ok(elem_ok && len_ok)
        }
        ("Tuple", TypeData::Tuple(elems)) => {
            if args.len() != elems.len() {
                return Ok(false);
            }
            for (pat, t) in args.iter().zip(elems.iter()) {
                if !unify_as_pattern(registry, env, cache, pat, t)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        _ => Ok(false),
    }
}

fn pattern_of(expr: &crate::ast::Expr) -> PatternExpr {
    match expr {
        crate::ast::Expr::Id(id) => PatternExpr::CellRef(id.clone()),
        other => PatternExpr::Expr(other.clone()),
    }
}

fn unify_as_pattern(
    registry: &TypeRegistry,
    env: &Environment,
    cache: &AnalysisCache,
    expr: &crate::ast::Expr,
    ty: &Type,
) -> Result<bool, ClayError> {
    unify_type(registry, env, cache, &pattern_of(expr), ty)
}

/// Used for `static` formal arguments: unifies a pattern against an actual
/// argument's compile-time value rather than its type (§4.2, §4.5).
pub fn unify_value(
    registry: &TypeRegistry,
    env: &Environment,
    cache: &AnalysisCache,
    pattern: &PatternExpr,
    object: &StaticObject,
) -> Result<bool, ClayError> {
    unify_pattern_obj(registry, env, cache, pattern, object.clone())
}

/// After a successful match, every cell introduced by the candidate's
/// pattern vars must be bound; an unbound cell is an error naming the cell's
/// declaring identifier (§4.2).
pub fn require_all_cells_bound(env: &Environment, pattern_vars: &[crate::span::Ident]) -> Result<(), ClayError> {
    for name in pattern_vars {
        match env.lookup(&name.name) {
            Ok(EnvValue::PatternCell(cell)) if cell.get().is_some() => {}
            _ => {
                return Err(ClayError::StaticEval(StaticEvalError::UnresolvedCell {
                    name: name.name.to_string(),
                })
                .with_location(name.position.clone()))
            }
        }
    }
    Ok(())
}

/// Tempness compatibility check for a formal argument (§4.5): an `rvalue`
/// formal admits only temps, `lvalue` only non-temps, unadorned admits
/// either.
pub fn tempness_compatible(tempness: crate::ast::ArgTempness, actual: &PValue) -> bool {
    match tempness {
        crate::ast::ArgTempness::RValue => actual.is_temp,
        crate::ast::ArgTempness::LValue => !actual.is_temp,
        crate::ast::ArgTempness::Either => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Expr;
    use crate::env::Environment;
    use crate::span::{Ident, Span};
    use crate::types::{IntWidth, Primitive, TypeRegistry};
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    fn test_env() -> Environment {
        Environment::for_module(Rc::from("test"), Rc::new(RefCell::new(HashMap::new())))
    }

    #[test]
    fn cell_ref_binds_on_first_match_and_checks_equality_on_second() {
        let registry = TypeRegistry::new();
        let cache = AnalysisCache::new();
        let env = test_env();
        let byte = registry.primitive(Primitive::Int(IntWidth::W8, false));
        let pattern = PatternExpr::CellRef(Ident::new("T", Span::dummy()));

        assert!(unify_pattern_obj(&registry, &env, &cache, &pattern, StaticObject::Type(byte.clone())).unwrap());
        assert!(unify_pattern_obj(&registry, &env, &cache, &pattern, StaticObject::Type(byte)).unwrap());

        let bool_ty = registry.primitive(Primitive::Bool);
        assert!(!unify_pattern_obj(&registry, &env, &cache, &pattern, StaticObject::Type(bool_ty)).unwrap());
    }

    #[test]
    fn pointer_pattern_binds_pointee_cell() {
        let registry = TypeRegistry::new();
        let cache = AnalysisCache::new();
        let env = test_env();
        let byte = registry.primitive(Primitive::Int(IntWidth::W8, false));
        let ptr_ty = registry.pointer(byte.clone());

        let pointer_pattern = PatternExpr::Expr(Expr::Index {
            callee: Box::new(Expr::Id(Ident::new("Pointer", Span::dummy()))),
            args: vec![Expr::Id(Ident::new("T", Span::dummy()))],
            position: Span::dummy(),
        });

        assert!(unify_type(&registry, &env, &cache, &pointer_pattern, &ptr_ty).unwrap());
        match env.lookup("T").unwrap() {
            EnvValue::PatternCell(cell) => assert_eq!(cell.get(), Some(StaticObject::Type(byte))),
            other => panic!("expected a bound pattern cell, got {:?}", other),
        }
    }

    #[test]
    fn pointer_pattern_rejects_non_pointer_type() {
        let registry = TypeRegistry::new();
        let cache = AnalysisCache::new();
        let env = test_env();
        let bool_ty = registry.primitive(Primitive::Bool);

        let pointer_pattern = PatternExpr::Expr(Expr::Index {
            callee: Box::new(Expr::Id(Ident::new("Pointer", Span::dummy()))),
            args: vec![Expr::Id(Ident::new("T", Span::dummy()))],
            position: Span::dummy(),
        });

        assert!(!unify_type(&registry, &env, &cache, &pointer_pattern, &bool_ty).unwrap());
    }

    #[test]
    fn tempness_compatible_matches_rvalue_lvalue_either() {
        let ty_env_ty = TypeRegistry::new().primitive(Primitive::Bool);
        let temp = PValue::owned(ty_env_ty.clone());
        let lval = PValue::borrowed(ty_env_ty);

        assert!(tempness_compatible(crate::ast::ArgTempness::RValue, &temp));
        assert!(!tempness_compatible(crate::ast::ArgTempness::RValue, &lval));
        assert!(!tempness_compatible(crate::ast::ArgTempness::LValue, &temp));
        assert!(tempness_compatible(crate::ast::ArgTempness::LValue, &lval));
        assert!(tempness_compatible(crate::ast::ArgTempness::Either, &temp));
        assert!(tempness_compatible(crate::ast::ArgTempness::Either, &lval));
    }
}
