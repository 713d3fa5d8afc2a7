//! Abstract and concrete value shapes shared across the analyzer, resolver
//! and codegen (§3).

use crate::types::Type;

/// `(type, isTemp)`: `is_temp = true` means owned, to be moved/destroyed by
/// the consumer; `false` means a borrow of an lvalue outliving the enclosing
/// expression.
#[derive(Debug, Clone, PartialEq)]
pub struct PValue {
    pub ty: Type,
    pub is_temp: bool,
}

impl PValue {
    pub fn owned(ty: Type) -> Self {
        PValue { ty, is_temp: true }
    }
    pub fn borrowed(ty: Type) -> Self {
        PValue { ty, is_temp: false }
    }
}

/// Ordered list of `PValue`s an expression analyzes to; length 1 except for
/// tuple/unpack expressions, which expand (§4.4).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MultiPValue(pub Vec<PValue>);

impl MultiPValue {
    pub fn single(pv: PValue) -> Self {
        MultiPValue(vec![pv])
    }

    pub fn types(&self) -> Vec<Type> {
        self.0.iter().map(|pv| pv.ty.clone()).collect()
    }

    pub fn tempness(&self) -> Vec<bool> {
        self.0.iter().map(|pv| pv.is_temp).collect()
    }
}

/// The argument key the resolver's invoke-entry cache is keyed by: the
/// argument types plus their tempness (§3, §4.5).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArgsKey {
    pub types: Vec<TypeKeyRef>,
    pub tempness: Vec<bool>,
}

/// Pointer-identity view of a `Type` suitable for hashing in the invoke-entry
/// cache, without re-deriving `Hash`/`Eq` on `Type` itself in a way that
/// would leak into unrelated contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeKeyRef(pub usize);

impl From<&Type> for TypeKeyRef {
    fn from(t: &Type) -> Self {
        TypeKeyRef(std::rc::Rc::as_ptr(&t.0) as usize)
    }
}

impl ArgsKey {
    pub fn new(types: &[Type], tempness: &[bool]) -> Self {
        ArgsKey {
            types: types.iter().map(TypeKeyRef::from).collect(),
            tempness: tempness.to_vec(),
        }
    }
}
