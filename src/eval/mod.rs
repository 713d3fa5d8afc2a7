//! Compile-time evaluator (§4.3): reduces an expression to either a single
//! value-holder of known type, or a static object (type, procedure, module,
//! record, ...), for use by pattern unification, static-argument matching,
//! and constant folding.

use std::rc::Rc;

use crate::ast::Expr;
use crate::cache::AnalysisCache;
use crate::env::{Environment, EnvValue};
use crate::error::{ClayError, StaticEvalError};
use crate::primop::PrimOp;
use crate::types::{FloatWidth, IntWidth, Primitive, StaticObject, TypeRegistry, ValueHolder};

/// Evaluates `expr` in `env` to a static object (§4.3). `cache` is the same
/// cache the analyzer uses; alias indexing and static-for unrolling disable
/// it for the duration of their own evaluation via `cache.disable()`.
pub fn eval_expr(
    registry: &TypeRegistry,
    env: &Environment,
    cache: &AnalysisCache,
    expr: &Expr,
) -> Result<StaticObject, ClayError> {
    match expr {
        Expr::BoolLit(b, _) => Ok(StaticObject::Bool(*b)),

        Expr::IntLit { value, suffix, position } => {
            let prim = suffix_to_int_primitive(suffix.as_deref())
                .ok_or_else(|| {
                    ClayError::StaticEval(StaticEvalError::OutOfRangeLiteral {
                        literal: value.to_string(),
                        width: suffix.as_deref().unwrap_or("<inferred>").to_string(),
                    })
                    .with_location(position.clone())
                })?;
            let ty = registry.primitive(prim);
            check_int_range(*value, prim, position)?;
            Ok(StaticObject::ValueHolder(ValueHolder::from_i128(ty, *value)))
        }

        Expr::FloatLit { value, suffix, position } => {
            let width = match suffix.as_deref() {
                Some("f32") => FloatWidth::W32,
                _ => FloatWidth::W64,
            };
            let ty = registry.primitive(Primitive::Float(width));
            let bytes: Rc<[u8]> = match width {
                FloatWidth::W32 => Rc::from((*value as f32).to_le_bytes()),
                FloatWidth::W64 => Rc::from(value.to_le_bytes()),
            };
            let _ = position;
            Ok(StaticObject::ValueHolder(ValueHolder { ty, bytes }))
        }

        Expr::CharLit(c, _) => {
            let ty = registry.primitive(Primitive::Int(IntWidth::W32, false));
            Ok(StaticObject::ValueHolder(ValueHolder::from_i128(ty, *c as i128)))
        }

        Expr::StringLit(s, _) => {
            // A string literal is not itself a static value in Clay (it
            // desugars to `StringConstant` at the prelude level); as a
            // static object for pattern purposes it is carried as an
            // identifier-shaped value-holder of its interned bytes.
            let ty = registry.pointer(registry.primitive(Primitive::Int(IntWidth::W8, false)));
            Ok(StaticObject::ValueHolder(ValueHolder {
                ty,
                bytes: Rc::from(s.as_bytes()),
            }))
        }

        Expr::Id(id) => {
            let value = env.lookup(&id.name)?;
            value.as_static_object().ok_or_else(|| {
                ClayError::Type(crate::error::TypeError::ExpectingType {
                    found: format!("{:?}", value),
                })
                .with_location(id.position.clone())
            })
        }

        Expr::Tuple(elements, position) => {
            // A tuple of statics is itself representable only when every
            // element is a value-holder; otherwise it is not a legal static
            // object (only used for static-argument matching of tuple-typed
            // patterns).
            let mut bytes = Vec::new();
            let mut types = Vec::new();
            for e in elements {
                match eval_expr(registry, env, cache, e)? {
                    StaticObject::ValueHolder(v) => {
                        types.push(v.ty.clone());
                        bytes.extend_from_slice(&v.bytes);
                    }
                    other => {
                        return Err(ClayError::StaticEval(StaticEvalError::IndexingNonConstructor {
                            found: format!("{:?}", other),
                        })
                        .with_location(position.clone()))
                    }
                }
            }
            let ty = registry.tuple(types);
            Ok(StaticObject::ValueHolder(ValueHolder { ty, bytes: Rc::from(bytes) }))
        }

        Expr::Index { callee, args, position } => eval_index(registry, env, cache, callee, args, position),

        Expr::Call { callee, args, position } => eval_call(registry, env, cache, callee, args, position),

        Expr::FieldRef { .. } | Expr::Binary { .. } | Expr::Unary { .. } | Expr::And(..) | Expr::Or(..) => {
            Err(ClayError::Internal(
                "operator expressions must be desugared before compile-time evaluation",
            )
            .with_location(expr.position().clone()))
        }

        other => Err(ClayError::StaticEval(StaticEvalError::IndexingNonConstructor {
            found: format!("{:?}", other.position()),
        })),
    }
}

fn suffix_to_int_primitive(suffix: Option<&str>) -> Option<Primitive> {
    Some(match suffix {
        Some("i8") => Primitive::Int(IntWidth::W8, true),
        Some("i16") => Primitive::Int(IntWidth::W16, true),
        Some("i32") | None => Primitive::Int(IntWidth::W32, true),
        Some("i64") => Primitive::Int(IntWidth::W64, true),
        Some("u8") => Primitive::Int(IntWidth::W8, false),
        Some("u16") => Primitive::Int(IntWidth::W16, false),
        Some("u32") => Primitive::Int(IntWidth::W32, false),
        Some("u64") => Primitive::Int(IntWidth::W64, false),
        _ => return None,
    })
}

fn check_int_range(value: i128, prim: Primitive, position: &crate::span::Span) -> Result<(), ClayError> {
    let Primitive::Int(width, signed) = prim else {
        return Ok(());
    };
    let bits: u32 = match width {
        IntWidth::W8 => 8,
        IntWidth::W16 => 16,
        IntWidth::W32 => 32,
        IntWidth::W64 => 64,
    };
    let (min, max) = if signed {
        (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
    } else {
        (0, (1i128 << bits) - 1)
    };
    if value < min || value > max {
        return Err(ClayError::StaticEval(StaticEvalError::OutOfRangeLiteral {
            literal: value.to_string(),
            width: format!("{:?}", prim),
        })
        .with_location(position.clone()));
    }
    Ok(())
}

/// `callee[args]`: type-constructor application (`Array[Int,10]`,
/// `Pointer[T]`, ...) or alias indexing (§4.3).
fn eval_index(
    registry: &TypeRegistry,
    env: &Environment,
    cache: &AnalysisCache,
    callee: &Expr,
    args: &[Expr],
    position: &crate::span::Span,
) -> Result<StaticObject, ClayError> {
    let callee_obj = eval_expr(registry, env, cache, callee)?;

    if let StaticObject::Identifier(id) = &callee_obj {
        if let Ok(EnvValue::Expr(alias_body)) = env.lookup(&format!("{}#alias_body", id.name)) {
            // Alias expansion binds params in a fresh environment and
            // evaluates the body with caching disabled for the duration, so
            // this instantiation's folded result never pollutes another's.
            let _guard = cache.disable();
            return eval_expr(registry, env, cache, &alias_body);
        }
    }

    match callee_obj {
        StaticObject::Type(_) => Err(ClayError::StaticEval(StaticEvalError::IndexingNonConstructor {
            found: "a concrete (non-constructor) type".to_string(),
        })
        .with_location(position.clone())),
        StaticObject::Procedure(name) if name.as_ref() == "Pointer" => {
            let [arg] = args else {
                return Err(arity_error("Pointer", 1, args.len(), position));
            };
            let pointee = expect_type(registry, env, cache, arg)?;
            Ok(StaticObject::Type(registry.pointer(pointee)))
        }
        StaticObject::Procedure(name) if name.as_ref() == "Array" => {
            let [elem, len] = args else {
                return Err(arity_error("Array", 2, args.len(), position));
            };
            let elem_ty = expect_type(registry, env, cache, elem)?;
            let len_val = match eval_expr(registry, env, cache, len)? {
                StaticObject::ValueHolder(v) => v.as_i128() as u64,
                _ => {
                    return Err(ClayError::Type(crate::error::TypeError::ExpectingType {
                        found: "non-integer array length".to_string(),
                    })
                    .with_location(position.clone()))
                }
            };
            Ok(StaticObject::Type(registry.array(elem_ty, len_val)))
        }
        StaticObject::Procedure(name) if name.as_ref() == "Tuple" => {
            let mut types = Vec::new();
            for a in args {
                types.push(expect_type(registry, env, cache, a)?);
            }
            Ok(StaticObject::Type(registry.tuple(types)))
        }
        StaticObject::Procedure(name) if name.as_ref() == "Static" => {
            let [arg] = args else {
                return Err(arity_error("Static", 1, args.len(), position));
            };
            let obj = eval_expr(registry, env, cache, arg)?;
            Ok(StaticObject::Type(registry.static_type(obj)))
        }
        other => Err(ClayError::StaticEval(StaticEvalError::IndexingNonConstructor {
            found: format!("{:?}", other),
        })
        .with_location(position.clone())),
    }
}

fn expect_type(
    registry: &TypeRegistry,
    env: &Environment,
    cache: &AnalysisCache,
    expr: &Expr,
) -> Result<crate::types::Type, ClayError> {
    match eval_expr(registry, env, cache, expr)? {
        StaticObject::Type(t) => Ok(t),
        other => Err(ClayError::Type(crate::error::TypeError::ExpectingType {
            found: format!("{:?}", other),
        })
        .with_location(expr.position().clone())),
    }
}

fn arity_error(name: &str, expected: usize, found: usize, position: &crate::span::Span) -> ClayError {
    ClayError::StaticEval(StaticEvalError::WrongArity {
        procedure: name.to_string(),
        expected,
        found,
    })
    .with_location(position.clone())
}

/// Invocation of a compile-time-evaluable procedure: integer primops, type
/// predicates (`TypeP`), arity queries (`TupleElementCount`), identifier
/// concatenation/slicing (§4.3).
fn eval_call(
    registry: &TypeRegistry,
    env: &Environment,
    cache: &AnalysisCache,
    callee: &Expr,
    args: &[Expr],
    position: &crate::span::Span,
) -> Result<StaticObject, ClayError> {
    let Expr::Id(id) = callee else {
        return Err(ClayError::StaticEval(StaticEvalError::IndexingNonConstructor {
            found: "non-identifier callee in static context".to_string(),
        })
        .with_location(position.clone()));
    };
    let Some(primop) = PrimOp::by_name(&id.name) else {
        return Err(ClayError::StaticEval(StaticEvalError::IndexingNonConstructor {
            found: format!("non-static-evaluable callable `{}`", id.name),
        })
        .with_location(position.clone()));
    };

    let arg_objs: Vec<StaticObject> = args
        .iter()
        .map(|a| eval_expr(registry, env, cache, a))
        .collect::<Result<_, _>>()?;

    match primop {
        PrimOp::TypeP => {
            let is_type = matches!(arg_objs.first(), Some(StaticObject::Type(_)));
            Ok(StaticObject::Bool(is_type))
        }
        PrimOp::TupleElementCount => {
            let [StaticObject::Type(t)] = arg_objs.as_slice() else {
                return Err(arity_error("TupleElementCount", 1, arg_objs.len(), position));
            };
            let count = match &*t.0 {
                crate::types::TypeData::Tuple(elems) => elems.len(),
                _ => {
                    return Err(ClayError::Type(crate::error::TypeError::ExpectingTuple {
                        found: format!("{:?}", t),
                    })
                    .with_location(position.clone()))
                }
            };
            let size_ty = registry.primitive(Primitive::Int(IntWidth::W64, false));
            Ok(StaticObject::ValueHolder(ValueHolder::from_i128(size_ty, count as i128)))
        }
        PrimOp::TypeSize | PrimOp::TypeAlignment => {
            let [StaticObject::Type(t)] = arg_objs.as_slice() else {
                return Err(arity_error("TypeSize", 1, arg_objs.len(), position));
            };
            let (size, align) = type_size_and_align(registry, t, position)?;
            let chosen = if primop == PrimOp::TypeSize { size } else { align };
            let size_ty = registry.primitive(Primitive::Int(IntWidth::W64, false));
            Ok(StaticObject::ValueHolder(ValueHolder::from_i128(size_ty, chosen as i128)))
        }
        PrimOp::NumericAdd | PrimOp::NumericSubtract | PrimOp::NumericMultiply => {
            let [StaticObject::ValueHolder(a), StaticObject::ValueHolder(b)] = arg_objs.as_slice() else {
                return Err(arity_error("numeric primop", 2, arg_objs.len(), position));
            };
            let result = match primop {
                PrimOp::NumericAdd => a.as_i128() + b.as_i128(),
                PrimOp::NumericSubtract => a.as_i128() - b.as_i128(),
                PrimOp::NumericMultiply => a.as_i128() * b.as_i128(),
                _ => unreachable!(),
            };
            Ok(StaticObject::ValueHolder(ValueHolder::from_i128(a.ty.clone(), result)))
        }
        _ => Err(ClayError::Internal(format!(
            "primop `{}` is not compile-time evaluable",
            id.name
        ))
        .with_location(position.clone())),
    }
}

/// Byte size and alignment of `ty` (§4.8's `TypeSize`/`TypeAlignment`),
/// computed structurally from the type's own shape rather than from an LLVM
/// target-data query: the evaluator runs before a `CodegenContext` (and its
/// LLVM `Context`) exists, so the layout rules it needs — natural alignment,
/// padding a struct's trailing field up to its own alignment — are the same
/// ones `codegen` hands to LLVM for the same type, stated here without LLVM.
/// Pointer-shaped types are fixed at 8 bytes, matching this core's only
/// supported target width (§1, §9: 64-bit).
fn type_size_and_align(
    registry: &TypeRegistry,
    ty: &crate::types::Type,
    position: &crate::span::Span,
) -> Result<(u64, u64), ClayError> {
    use crate::types::TypeData;
    match &*ty.0 {
        TypeData::Primitive(Primitive::Bool) => Ok((1, 1)),
        TypeData::Primitive(Primitive::Void) => Ok((0, 1)),
        TypeData::Primitive(Primitive::Int(width, _)) => {
            let n = match width {
                IntWidth::W8 => 1,
                IntWidth::W16 => 2,
                IntWidth::W32 => 4,
                IntWidth::W64 => 8,
            };
            Ok((n, n))
        }
        TypeData::Primitive(Primitive::Float(width)) => {
            let n = match width {
                FloatWidth::W32 => 4,
                FloatWidth::W64 => 8,
            };
            Ok((n, n))
        }
        TypeData::Pointer(_) | TypeData::CodePointer { .. } | TypeData::CCodePointer { .. } => Ok((8, 8)),
        TypeData::Array(elem, len) => {
            let (elem_size, elem_align) = type_size_and_align(registry, elem, position)?;
            Ok((elem_size * len, elem_align))
        }
        TypeData::Tuple(elements) => layout_sequence(registry, elements.iter(), position),
        TypeData::Record(_) => {
            let fields = registry.record_fields(ty)?;
            layout_sequence(registry, fields.iter().map(|(_, t)| t), position)
        }
        TypeData::Variant(_) => {
            let members = registry.variant_members(ty).ok_or_else(|| {
                ClayError::Internal("variant members not yet enumerated".to_string())
                    .with_location(position.clone())
            })?;
            // A tagged union: an Int32 discriminant followed by the widest
            // member, the member itself aligned to its own requirement.
            let mut widest_size = 0u64;
            let mut widest_align = 1u64;
            for member in members.iter() {
                let (size, align) = type_size_and_align(registry, member, position)?;
                widest_size = widest_size.max(size);
                widest_align = widest_align.max(align);
            }
            let tag_align = 4u64;
            let align = widest_align.max(tag_align);
            let payload_offset = align_up(4, widest_align);
            Ok((align_up(payload_offset + widest_size, align), align))
        }
        TypeData::Enum(_, _) => Ok((4, 4)),
        TypeData::Static(_) => Ok((0, 1)),
    }
}

fn layout_sequence<'a>(
    registry: &TypeRegistry,
    elements: impl Iterator<Item = &'a crate::types::Type>,
    position: &crate::span::Span,
) -> Result<(u64, u64), ClayError> {
    let mut offset = 0u64;
    let mut max_align = 1u64;
    for element in elements {
        let (size, align) = type_size_and_align(registry, element, position)?;
        offset = align_up(offset, align);
        offset += size;
        max_align = max_align.max(align);
    }
    Ok((align_up(offset, max_align), max_align))
}

fn align_up(offset: u64, align: u64) -> u64 {
    if align <= 1 {
        return offset;
    }
    offset.div_ceil(align) * align
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Environment;
    use crate::span::{Ident, Span};
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    fn test_env() -> Environment {
        Environment::for_module(Rc::from("test"), Rc::new(RefCell::new(HashMap::new())))
    }

    #[test]
    fn int_literal_evaluates_to_a_value_holder_of_its_suffix_width() {
        let registry = TypeRegistry::new();
        let cache = AnalysisCache::new();
        let env = test_env();
        let expr = Expr::IntLit { value: 42, suffix: Some(Rc::from("i32")), position: Span::dummy() };
        match eval_expr(&registry, &env, &cache, &expr).unwrap() {
            StaticObject::ValueHolder(v) => assert_eq!(v.as_i128(), 42),
            other => panic!("expected a value holder, got {:?}", other),
        }
    }

    #[test]
    fn int_literal_out_of_range_for_its_suffix_is_an_error() {
        let registry = TypeRegistry::new();
        let cache = AnalysisCache::new();
        let env = test_env();
        let expr = Expr::IntLit { value: 1000, suffix: Some(Rc::from("i8")), position: Span::dummy() };
        assert!(eval_expr(&registry, &env, &cache, &expr).is_err());
    }

    #[test]
    fn pointer_index_evaluates_to_a_pointer_type() {
        let registry = TypeRegistry::new();
        let cache = AnalysisCache::new();
        let env = test_env();
        env.bind(Rc::from("T"), crate::env::EnvValue::Type(registry.primitive(crate::types::Primitive::Bool)));
        env.bind(Rc::from("Pointer"), crate::env::EnvValue::Procedure(Rc::from("Pointer")));

        let expr = Expr::Index {
            callee: Box::new(Expr::Id(Ident::new("Pointer", Span::dummy()))),
            args: vec![Expr::Id(Ident::new("T", Span::dummy()))],
            position: Span::dummy(),
        };
        match eval_expr(&registry, &env, &cache, &expr).unwrap() {
            StaticObject::Type(t) => assert_eq!(t, registry.pointer(registry.primitive(crate::types::Primitive::Bool))),
            other => panic!("expected a type, got {:?}", other),
        }
    }

    #[test]
    fn tuple_element_count_primop_counts_elements() {
        let registry = TypeRegistry::new();
        let cache = AnalysisCache::new();
        let env = test_env();
        let tuple_ty = registry.tuple(vec![
            registry.primitive(crate::types::Primitive::Bool),
            registry.primitive(crate::types::Primitive::Int(IntWidth::W32, true)),
        ]);
        env.bind(Rc::from("Tup"), crate::env::EnvValue::Type(tuple_ty));

        let expr = Expr::Call {
            callee: Box::new(Expr::Id(Ident::new("TupleElementCount", Span::dummy()))),
            args: vec![Expr::Id(Ident::new("Tup", Span::dummy()))],
            position: Span::dummy(),
        };
        match eval_expr(&registry, &env, &cache, &expr).unwrap() {
            StaticObject::ValueHolder(v) => assert_eq!(v.as_i128(), 2),
            other => panic!("expected a value holder, got {:?}", other),
        }
    }

    #[test]
    fn type_size_of_a_ten_element_int32_array_is_forty() {
        let registry = TypeRegistry::new();
        let cache = AnalysisCache::new();
        let env = test_env();
        let array_ty = registry.array(registry.primitive(crate::types::Primitive::Int(IntWidth::W32, true)), 10);
        env.bind(Rc::from("Arr"), crate::env::EnvValue::Type(array_ty));

        let expr = Expr::Call {
            callee: Box::new(Expr::Id(Ident::new("TypeSize", Span::dummy()))),
            args: vec![Expr::Id(Ident::new("Arr", Span::dummy()))],
            position: Span::dummy(),
        };
        match eval_expr(&registry, &env, &cache, &expr).unwrap() {
            StaticObject::ValueHolder(v) => assert_eq!(v.as_i128(), 40),
            other => panic!("expected a value holder, got {:?}", other),
        }
    }
}
