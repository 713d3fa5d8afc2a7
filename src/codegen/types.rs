//! Clay type → LLVM type conversion (§4.6), grounded in the teacher's
//! `convert_our_type_to_llvm_basic_metadata_type`: a flat match over the
//! closed type sum, with records/tuples building LLVM struct types from
//! already-converted field types.

use inkwell::types::BasicTypeEnum;
use inkwell::values::FunctionValue;

use crate::types::{FloatWidth, IntWidth, Primitive, Type, TypeData};

use super::CodegenContext;

pub fn convert_type<'ctx, 'r>(ctx: &CodegenContext<'ctx, 'r>, ty: &Type) -> BasicTypeEnum<'ctx> {
    match &*ty.0 {
        TypeData::Primitive(Primitive::Bool) => ctx.llvm.bool_type().into(),
        TypeData::Primitive(Primitive::Int(width, _)) => int_type(ctx, *width).into(),
        TypeData::Primitive(Primitive::Float(width)) => float_type(ctx, *width).into(),
        TypeData::Primitive(Primitive::Void) => {
            // Never actually materialized as an LLVM value; callers filter
            // void out before requesting a type (§4.6 return lowering).
            ctx.llvm.i8_type().into()
        }
        TypeData::Pointer(_) => ctx.llvm.ptr_type(inkwell::AddressSpace::default()).into(),
        TypeData::Array(elem, len) => ctx.llvm_type(elem).array_type(*len as u32).into(),
        TypeData::Tuple(elems) => {
            let field_types: Vec<_> = elems.iter().map(|t| ctx.llvm_type(t)).collect();
            ctx.llvm.struct_type(&field_types, false).into()
        }
        TypeData::Record(r) => {
            let fields = ctx
                .registry
                .record_fields(ty)
                .map(|f| f.iter().map(|(_, t)| ctx.llvm_type(t)).collect::<Vec<_>>())
                .unwrap_or_default();
            let _ = &r.decl.name;
            ctx.llvm.struct_type(&fields, false).into()
        }
        TypeData::Variant(v) => {
            // A closed variant is represented as `{ i32 tag, [N x i8] storage }`
            // sized to the widest member, matching the discriminated-union
            // layout the original implementation's codegen uses for variants.
            let members = ctx.registry.variant_members(ty);
            let widest = members
                .as_ref()
                .and_then(|ms| {
                    ms.iter()
                        .map(|m| ctx.llvm_type(m))
                        .max_by_key(|t| llvm_size_hint(*t))
                })
                .unwrap_or_else(|| ctx.llvm.i8_type().into());
            let _ = &v.decl.name;
            ctx.llvm
                .struct_type(&[ctx.llvm.i32_type().into(), widest], false)
                .into()
        }
        TypeData::Enum(_, members) => {
            let _ = members.len();
            ctx.llvm.i32_type().into()
        }
        TypeData::CodePointer { .. } | TypeData::CCodePointer { .. } => {
            ctx.llvm.ptr_type(inkwell::AddressSpace::default()).into()
        }
        TypeData::Static(_) => {
            // A `Static(obj)` type carries no runtime representation; values
            // of this type are only ever manipulated at compile time (§4.1).
            ctx.llvm.struct_type(&[], false).into()
        }
    }
}

fn llvm_size_hint(t: BasicTypeEnum) -> u32 {
    match t {
        BasicTypeEnum::IntType(i) => i.get_bit_width(),
        BasicTypeEnum::FloatType(_) => 64,
        BasicTypeEnum::PointerType(_) => 64,
        BasicTypeEnum::ArrayType(a) => a.len() * llvm_size_hint(a.get_element_type()),
        BasicTypeEnum::StructType(s) => s.get_field_types().iter().map(|t| llvm_size_hint(*t)).sum(),
        BasicTypeEnum::VectorType(v) => v.get_size() * llvm_size_hint(v.get_element_type()),
        BasicTypeEnum::ScalableVectorType(_) => 128,
    }
}

fn int_type<'ctx, 'r>(ctx: &CodegenContext<'ctx, 'r>, width: IntWidth) -> inkwell::types::IntType<'ctx> {
    match width {
        IntWidth::W8 => ctx.llvm.i8_type(),
        IntWidth::W16 => ctx.llvm.i16_type(),
        IntWidth::W32 => ctx.llvm.i32_type(),
        IntWidth::W64 => ctx.llvm.i64_type(),
    }
}

fn float_type<'ctx, 'r>(ctx: &CodegenContext<'ctx, 'r>, width: FloatWidth) -> inkwell::types::FloatType<'ctx> {
    match width {
        FloatWidth::W32 => ctx.llvm.f32_type(),
        FloatWidth::W64 => ctx.llvm.f64_type(),
    }
}

/// Builds the `llvm.global_ctors`/`llvm.global_dtors` arrays LLVM's runtime
/// support recognizes, each entry `{ i32 priority, void()* fn, i8* data }`
/// with a fixed priority of 65535 and a null data pointer (§5).
pub fn emit_global_ctors_dtors<'ctx, 'r>(
    ctx: &CodegenContext<'ctx, 'r>,
    ctors: &[FunctionValue<'ctx>],
    dtors: &[FunctionValue<'ctx>],
) {
    emit_one(ctx, "llvm.global_ctors", ctors);
    emit_one(ctx, "llvm.global_dtors", dtors.iter().rev().copied().collect::<Vec<_>>().as_slice());
}

fn emit_one<'ctx, 'r>(ctx: &CodegenContext<'ctx, 'r>, array_name: &str, fns: &[FunctionValue<'ctx>]) {
    if fns.is_empty() {
        return;
    }
    let i32_ty = ctx.llvm.i32_type();
    let ptr_ty = ctx.llvm.ptr_type(inkwell::AddressSpace::default());
    let entry_ty = ctx.llvm.struct_type(&[i32_ty.into(), ptr_ty.into(), ptr_ty.into()], false);

    let entries: Vec<_> = fns
        .iter()
        .map(|f| {
            entry_ty.const_named_struct(&[
                i32_ty.const_int(65535, false).into(),
                f.as_global_value().as_pointer_value().into(),
                ptr_ty.const_null().into(),
            ])
        })
        .collect();

    let array_ty = entry_ty.array_type(entries.len() as u32);
    let global = ctx.module.add_global(array_ty, None, array_name);
    global.set_linkage(inkwell::module::Linkage::Appending);
    global.set_initializer(&entry_ty.const_array(&entries));
}
