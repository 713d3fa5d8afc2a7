//! Top-level items and modules (§6 External Interfaces).

use std::rc::Rc;

use crate::ast::pattern::PatternExpr;
use crate::ast::{Expr, FormalArg, ReturnSpec, Stmt, VarArg};
use crate::span::Ident;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CallingConvention {
    Default,
    Stdcall,
    Fastcall,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RecordField {
    pub name: Ident,
    pub type_expr: PatternExpr,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RecordDecl {
    pub name: Ident,
    pub params: Vec<Ident>,
    pub fields: Vec<RecordField>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VariantDecl {
    pub name: Ident,
    pub params: Vec<Ident>,
    pub members: Vec<PatternExpr>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EnumDecl {
    pub name: Ident,
    pub members: Vec<Ident>,
}

/// Shared shape of `procedure`/`overload`/`overloadable` bodies: the target
/// pattern (for `overload`, what the overload is attached to — a procedure
/// name, or a type-naming pattern), the formal argument list, and a body that
/// is either a normal expression body, a macro template, or an inline-LLVM
/// template (§4.6).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum CallableBody {
    Expr(Expr),
    Block(Stmt),
    /// Raw LLVM IR with `$TypeExpr` substitution tokens (§4.6).
    InlineLlvm(Rc<str>),
    /// No body: declares the name as overloadable without a default.
    None,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OverloadDecl {
    pub target: PatternExpr,
    pub pattern_vars: Vec<Ident>,
    pub fixed_args: Vec<FormalArg>,
    pub var_arg: Option<VarArg>,
    pub return_specs: Vec<ReturnSpec>,
    pub predicate: Option<Expr>,
    pub is_static: bool,
    pub is_macro: bool,
    pub is_inline: bool,
    pub body: CallableBody,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ExternalDecl {
    pub name: Ident,
    pub convention: CallingConvention,
    pub varargs: bool,
    pub params: Vec<PatternExpr>,
    pub return_type: Option<PatternExpr>,
    pub attributes: Vec<Rc<str>>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AliasDecl {
    pub name: Ident,
    pub params: Vec<Ident>,
    pub body: Expr,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ImportForm {
    Module,
    Star,
    Members(Vec<(Ident, Option<Ident>)>),
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ImportDecl {
    pub dotted_name: Vec<Ident>,
    pub alias: Option<Ident>,
    pub form: ImportForm,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum TopLevelItem {
    Record(RecordDecl),
    Variant(VariantDecl),
    Enum(EnumDecl),
    Overload(OverloadDecl),
    Var {
        name: Ident,
        type_annotation: Option<PatternExpr>,
        value: Expr,
    },
    Static {
        name: Ident,
        value: Expr,
    },
    External(ExternalDecl),
    Alias(AliasDecl),
    Import(ImportDecl),
}

/// Platform suffix a loaded file was matched under (§4.7).
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct PlatformSuffix {
    pub os: Option<Rc<str>>,
    pub bits: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Module {
    pub dotted_name: Vec<Rc<str>>,
    pub suffix: PlatformSuffix,
    pub items: Vec<TopLevelItem>,
}
