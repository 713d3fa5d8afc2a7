//! The primop catalog exposed by the synthesized `__primitives__` module
//! (§6, §4.8). Each variant is handled by exactly one analysis rule and one
//! codegen rule; type-construction primops are not invokable as values
//! (§4.8) and are consumed directly by indexing-expression analysis instead.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimOp {
    TypeP,
    TypeSize,
    TypeAlignment,
    CallDefinedP,
    PrimitiveCopy,
    BoolNot,
    NumericEqualsP,
    NumericLesserP,
    NumericAdd,
    NumericSubtract,
    NumericMultiply,
    NumericDivide,
    NumericNegate,
    IntegerRemainder,
    IntegerShiftLeft,
    IntegerShiftRight,
    IntegerBitwiseAnd,
    IntegerBitwiseOr,
    IntegerBitwiseXor,
    IntegerBitwiseNot,
    NumericConvert,
    Pointer,
    AddressOf,
    PointerDereference,
    PointerEqualsP,
    PointerLesserP,
    PointerOffset,
    PointerToInt,
    IntToPointer,
    CodePointer,
    MakeCodePointer,
    CCodePointer,
    MakeCCodePointer,
    PointerCast,
    Array,
    ArrayRef,
    Tuple,
    TupleElementCount,
    TupleRef,
    TupleElements,
    Union,
    RecordP,
    RecordFieldCount,
    RecordFieldName,
    RecordFieldRef,
    RecordFieldRefByName,
    RecordFields,
    VariantP,
    VariantMemberIndex,
    VariantMemberCount,
    VariantRepr,
    Static,
    StaticName,
    StaticIntegers,
    EnumP,
    EnumToInt,
    IntToEnum,
    IdentifierSize,
    IdentifierConcat,
    IdentifierSlice,
}

impl PrimOp {
    pub fn by_name(name: &str) -> Option<PrimOp> {
        use PrimOp::*;
        Some(match name {
            "TypeP" => TypeP,
            "TypeSize" => TypeSize,
            "TypeAlignment" => TypeAlignment,
            "CallDefinedP" => CallDefinedP,
            "primitiveCopy" => PrimitiveCopy,
            "boolNot" => BoolNot,
            "numericEqualsP" => NumericEqualsP,
            "numericLesserP" => NumericLesserP,
            "numericAdd" => NumericAdd,
            "numericSubtract" => NumericSubtract,
            "numericMultiply" => NumericMultiply,
            "numericDivide" => NumericDivide,
            "numericNegate" => NumericNegate,
            "integerRemainder" => IntegerRemainder,
            "integerShiftLeft" => IntegerShiftLeft,
            "integerShiftRight" => IntegerShiftRight,
            "integerBitwiseAnd" => IntegerBitwiseAnd,
            "integerBitwiseOr" => IntegerBitwiseOr,
            "integerBitwiseXor" => IntegerBitwiseXor,
            "integerBitwiseNot" => IntegerBitwiseNot,
            "numericConvert" => NumericConvert,
            "Pointer" => Pointer,
            "addressOf" => AddressOf,
            "pointerDereference" => PointerDereference,
            "pointerEqualsP" => PointerEqualsP,
            "pointerLesserP" => PointerLesserP,
            "pointerOffset" => PointerOffset,
            "pointerToInt" => PointerToInt,
            "intToPointer" => IntToPointer,
            "CodePointer" => CodePointer,
            "makeCodePointer" => MakeCodePointer,
            "CCodePointer" => CCodePointer,
            "makeCCodePointer" => MakeCCodePointer,
            "pointerCast" => PointerCast,
            "Array" => Array,
            "arrayRef" => ArrayRef,
            "Tuple" => Tuple,
            "TupleElementCount" => TupleElementCount,
            "tupleRef" => TupleRef,
            "tupleElements" => TupleElements,
            "Union" => Union,
            "RecordP" => RecordP,
            "RecordFieldCount" => RecordFieldCount,
            "RecordFieldName" => RecordFieldName,
            "recordFieldRef" => RecordFieldRef,
            "recordFieldRefByName" => RecordFieldRefByName,
            "recordFields" => RecordFields,
            "VariantP" => VariantP,
            "VariantMemberIndex" => VariantMemberIndex,
            "VariantMemberCount" => VariantMemberCount,
            "variantRepr" => VariantRepr,
            "Static" => Static,
            "StaticName" => StaticName,
            "staticIntegers" => StaticIntegers,
            "EnumP" => EnumP,
            "enumToInt" => EnumToInt,
            "intToEnum" => IntToEnum,
            "IdentifierSize" => IdentifierSize,
            "IdentifierConcat" => IdentifierConcat,
            "IdentifierSlice" => IdentifierSlice,
            _ => return None,
        })
    }

    /// Type-construction primops are not invokable as values (§4.8); they
    /// are consumed by indexing-expression analysis instead.
    pub fn is_type_constructor(self) -> bool {
        matches!(
            self,
            PrimOp::Pointer
                | PrimOp::Array
                | PrimOp::Tuple
                | PrimOp::CodePointer
                | PrimOp::CCodePointer
                | PrimOp::Static
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn by_name_resolves_every_lowercase_arithmetic_op() {
        assert_eq!(PrimOp::by_name("numericAdd"), Some(PrimOp::NumericAdd));
        assert_eq!(PrimOp::by_name("numericSubtract"), Some(PrimOp::NumericSubtract));
        assert_eq!(PrimOp::by_name("numericMultiply"), Some(PrimOp::NumericMultiply));
    }

    #[test]
    fn by_name_resolves_capitalized_type_constructors() {
        assert_eq!(PrimOp::by_name("Pointer"), Some(PrimOp::Pointer));
        assert_eq!(PrimOp::by_name("Array"), Some(PrimOp::Array));
        assert_eq!(PrimOp::by_name("Tuple"), Some(PrimOp::Tuple));
    }

    #[test]
    fn by_name_rejects_unknown_names() {
        assert_eq!(PrimOp::by_name("notAPrimop"), None);
    }

    #[test]
    fn type_constructors_are_not_invokable_as_values() {
        assert!(PrimOp::Pointer.is_type_constructor());
        assert!(PrimOp::Array.is_type_constructor());
        assert!(!PrimOp::NumericAdd.is_type_constructor());
        assert!(!PrimOp::RecordP.is_type_constructor());
    }
}
