//! Tagged tree of expressions, statements and top-level items, plus interned
//! identifiers and source locations (§3 Data Model, §9 "refcounted AST in the
//! source").
//!
//! The historical implementation represents every node as a single refcounted
//! `Object` discriminated by an `objKind` tag. Here each syntactic category is
//! its own closed enum and dispatch is an exhaustive `match`, per the Design
//! Notes' recommendation to replace the tag-and-downcast scheme with sum
//! types.

pub mod expr;
pub mod item;
pub mod pattern;
pub mod stmt;

pub use expr::Expr;
pub use item::{Module, TopLevelItem};
pub use pattern::PatternExpr;
pub use stmt::{ReturnKind, Stmt};

use crate::span::Ident;

/// Formal-argument tempness annotation (§4.5): `rvalue` admits only temps,
/// `lvalue` only non-temps, unadorned admits either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ArgTempness {
    RValue,
    LValue,
    Either,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ReturnSpec {
    ByValue,
    ByRef,
    Forward,
}

/// A single formal argument in a procedure/overload signature.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FormalArg {
    pub name: Ident,
    pub tempness: ArgTempness,
    pub is_static: bool,
    pub type_pattern: Option<PatternExpr>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VarArg {
    pub name: Ident,
    pub type_pattern: Option<PatternExpr>,
}
