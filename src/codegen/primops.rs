//! Primop lowering table (§4.8): each `PrimOp` maps to a fixed LLVM
//! instruction sequence. Type-construction primops (`Pointer`, `Array`, ...)
//! never reach here — they are consumed by `analyzer`'s `Index` handling
//! instead (§4.8) — so this table only covers the value-level operations.

use inkwell::values::BasicValueEnum;

use crate::primop::PrimOp;

use super::CodegenContext;

pub fn codegen_primop<'ctx, 'r>(
    ctx: &CodegenContext<'ctx, 'r>,
    op: PrimOp,
    args: &[BasicValueEnum<'ctx>],
) -> Option<BasicValueEnum<'ctx>> {
    let b = &ctx.builder;
    match op {
        PrimOp::BoolNot => {
            let v = args[0].into_int_value();
            Some(b.build_not(v, "not").unwrap().into())
        }
        PrimOp::NumericAdd => binary_numeric(ctx, args, |b, l, r| b.build_int_add(l, r, "add"), |b, l, r| b.build_float_add(l, r, "fadd")),
        PrimOp::NumericSubtract => binary_numeric(ctx, args, |b, l, r| b.build_int_sub(l, r, "sub"), |b, l, r| b.build_float_sub(l, r, "fsub")),
        PrimOp::NumericMultiply => binary_numeric(ctx, args, |b, l, r| b.build_int_mul(l, r, "mul"), |b, l, r| b.build_float_mul(l, r, "fmul")),
        PrimOp::NumericDivide => binary_numeric(ctx, args, |b, l, r| b.build_int_signed_div(l, r, "sdiv"), |b, l, r| b.build_float_div(l, r, "fdiv")),
        PrimOp::NumericNegate => {
            if args[0].is_float_value() {
                Some(b.build_float_neg(args[0].into_float_value(), "fneg").unwrap().into())
            } else {
                Some(b.build_int_neg(args[0].into_int_value(), "neg").unwrap().into())
            }
        }
        PrimOp::NumericEqualsP => cmp(ctx, args, inkwell::IntPredicate::EQ, inkwell::FloatPredicate::OEQ),
        PrimOp::NumericLesserP => cmp(ctx, args, inkwell::IntPredicate::SLT, inkwell::FloatPredicate::OLT),
        PrimOp::IntegerRemainder => {
            Some(b.build_int_signed_rem(args[0].into_int_value(), args[1].into_int_value(), "srem").unwrap().into())
        }
        PrimOp::IntegerShiftLeft => {
            Some(b.build_left_shift(args[0].into_int_value(), args[1].into_int_value(), "shl").unwrap().into())
        }
        PrimOp::IntegerShiftRight => {
            Some(b.build_right_shift(args[0].into_int_value(), args[1].into_int_value(), true, "ashr").unwrap().into())
        }
        PrimOp::IntegerBitwiseAnd => {
            Some(b.build_and(args[0].into_int_value(), args[1].into_int_value(), "and").unwrap().into())
        }
        PrimOp::IntegerBitwiseOr => {
            Some(b.build_or(args[0].into_int_value(), args[1].into_int_value(), "or").unwrap().into())
        }
        PrimOp::IntegerBitwiseXor => {
            Some(b.build_xor(args[0].into_int_value(), args[1].into_int_value(), "xor").unwrap().into())
        }
        PrimOp::IntegerBitwiseNot => Some(b.build_not(args[0].into_int_value(), "bnot").unwrap().into()),
        PrimOp::PointerEqualsP => Some(
            b.build_int_compare(
                inkwell::IntPredicate::EQ,
                b.build_ptr_to_int(args[0].into_pointer_value(), ctx.llvm.i64_type(), "p2i0").unwrap(),
                b.build_ptr_to_int(args[1].into_pointer_value(), ctx.llvm.i64_type(), "p2i1").unwrap(),
                "ptreq",
            )
            .unwrap()
            .into(),
        ),
        PrimOp::PointerDereference => {
            // The pointee LLVM type is supplied by the caller's analyzed
            // type, not recoverable from an opaque `ptr` value alone; callers
            // needing a typed load go through `codegen::codegen_expr`'s
            // `Expr::Deref` arm instead of this table entry.
            None
        }
        PrimOp::PointerOffset => Some(
            unsafe {
                b.build_gep(ctx.llvm.i8_type(), args[0].into_pointer_value(), &[args[1].into_int_value()], "gep")
            }
            .unwrap()
            .into(),
        ),
        PrimOp::PointerToInt => Some(
            b.build_ptr_to_int(args[0].into_pointer_value(), ctx.llvm.i64_type(), "ptoi").unwrap().into(),
        ),
        PrimOp::IntToPointer => Some(
            b.build_int_to_ptr(args[0].into_int_value(), ctx.llvm.ptr_type(inkwell::AddressSpace::default()), "itop")
                .unwrap()
                .into(),
        ),
        PrimOp::PointerCast => Some(args[0]),
        PrimOp::PrimitiveCopy => Some(args[0]),
        PrimOp::EnumToInt | PrimOp::IntToEnum => Some(args[0]),
        _ => None,
    }
}

fn binary_numeric<'ctx, 'r>(
    ctx: &CodegenContext<'ctx, 'r>,
    args: &[BasicValueEnum<'ctx>],
    int_op: impl FnOnce(&inkwell::builder::Builder<'ctx>, inkwell::values::IntValue<'ctx>, inkwell::values::IntValue<'ctx>) -> Result<inkwell::values::IntValue<'ctx>, inkwell::builder::BuilderError>,
    float_op: impl FnOnce(&inkwell::builder::Builder<'ctx>, inkwell::values::FloatValue<'ctx>, inkwell::values::FloatValue<'ctx>) -> Result<inkwell::values::FloatValue<'ctx>, inkwell::builder::BuilderError>,
) -> Option<BasicValueEnum<'ctx>> {
    if args[0].is_float_value() {
        Some(float_op(&ctx.builder, args[0].into_float_value(), args[1].into_float_value()).unwrap().into())
    } else {
        Some(int_op(&ctx.builder, args[0].into_int_value(), args[1].into_int_value()).unwrap().into())
    }
}

fn cmp<'ctx, 'r>(
    ctx: &CodegenContext<'ctx, 'r>,
    args: &[BasicValueEnum<'ctx>],
    int_pred: inkwell::IntPredicate,
    float_pred: inkwell::FloatPredicate,
) -> Option<BasicValueEnum<'ctx>> {
    if args[0].is_float_value() {
        Some(
            ctx.builder
                .build_float_compare(float_pred, args[0].into_float_value(), args[1].into_float_value(), "fcmp")
                .unwrap()
                .into(),
        )
    } else {
        Some(
            ctx.builder
                .build_int_compare(int_pred, args[0].into_int_value(), args[1].into_int_value(), "icmp")
                .unwrap()
                .into(),
        )
    }
}
