//! Compile-time objects (§3: environments bind names to one of these kinds)
//! and the value-holder representation of a compile-time constant.
//!
//! This is the Rust stand-in for the source's `objKind`-discriminated
//! `Object` base class, scoped to exactly the kinds a `Static(obj)` type or a
//! record/variant parameter can carry — the analyzer/codegen value kinds
//! (pvalue, cvalue) live in their own modules instead, since they are never
//! legal type-registry keys.

use std::rc::Rc;

use crate::span::Ident;
use crate::types::Type;

/// A typed byte buffer for a compile-time constant. Hash and equality are
/// defined by type and bytewise contents (§3).
#[derive(Clone)]
pub struct ValueHolder {
    pub ty: Type,
    pub bytes: Rc<[u8]>,
}

impl ValueHolder {
    pub fn from_i128(ty: Type, value: i128) -> Self {
        ValueHolder {
            ty,
            bytes: Rc::from(value.to_le_bytes()),
        }
    }

    pub fn from_bool(ty: Type, value: bool) -> Self {
        ValueHolder {
            ty,
            bytes: Rc::from([value as u8]),
        }
    }

    pub fn as_i128(&self) -> i128 {
        let mut buf = [0u8; 16];
        let n = self.bytes.len().min(16);
        buf[..n].copy_from_slice(&self.bytes[..n]);
        i128::from_le_bytes(buf)
    }
}

impl std::fmt::Debug for ValueHolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ValueHolder({:?}, {:?})", self.ty, self.bytes)
    }
}

impl PartialEq for ValueHolder {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty && self.bytes == other.bytes
    }
}

#[derive(Clone)]
pub enum StaticObject {
    Type(Type),
    Record(Rc<crate::ast::item::RecordDecl>),
    Variant(Rc<crate::ast::item::VariantDecl>),
    Procedure(Rc<str>),
    Overloadable(Rc<str>),
    Module(Rc<str>),
    Identifier(Ident),
    ValueHolder(ValueHolder),
    Bool(bool),
}

impl std::fmt::Debug for StaticObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StaticObject::Type(t) => write!(f, "{:?}", t),
            StaticObject::Record(r) => write!(f, "Record({})", r.name),
            StaticObject::Variant(v) => write!(f, "Variant({})", v.name),
            StaticObject::Procedure(n) => write!(f, "Procedure({})", n),
            StaticObject::Overloadable(n) => write!(f, "Overloadable({})", n),
            StaticObject::Module(n) => write!(f, "Module({})", n),
            StaticObject::Identifier(i) => write!(f, "#{}", i.name),
            StaticObject::ValueHolder(v) => write!(f, "{:?}", v),
            StaticObject::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Structural-or-identity key for a `StaticObject`, matching §4.1's
/// `objectEquals`: deep structural equality over value-holders and
/// identifiers, identity for procedures/records/variants/modules/types.
#[derive(PartialEq, Eq, Hash)]
pub enum ObjectKey {
    Type(usize),
    Record(usize),
    Variant(usize),
    Procedure(Rc<str>),
    Overloadable(Rc<str>),
    Module(Rc<str>),
    Identifier(Rc<str>),
    ValueHolder(usize, Vec<u8>),
    Bool(bool),
}

pub fn key_of(obj: &StaticObject) -> ObjectKey {
    match obj {
        StaticObject::Type(t) => ObjectKey::Type(Rc::as_ptr(&t.0) as usize),
        StaticObject::Record(r) => ObjectKey::Record(Rc::as_ptr(r) as usize),
        StaticObject::Variant(v) => ObjectKey::Variant(Rc::as_ptr(v) as usize),
        StaticObject::Procedure(n) => ObjectKey::Procedure(n.clone()),
        StaticObject::Overloadable(n) => ObjectKey::Overloadable(n.clone()),
        StaticObject::Module(n) => ObjectKey::Module(n.clone()),
        StaticObject::Identifier(i) => ObjectKey::Identifier(i.name.clone()),
        StaticObject::ValueHolder(v) => {
            ObjectKey::ValueHolder(Rc::as_ptr(&v.ty.0) as usize, v.bytes.to_vec())
        }
        StaticObject::Bool(b) => ObjectKey::Bool(*b),
    }
}

impl PartialEq for StaticObject {
    fn eq(&self, other: &Self) -> bool {
        key_of(self) == key_of(other)
    }
}
