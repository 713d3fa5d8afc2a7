//! Statement nodes. Statements carry no value; analysis of a statement
//! produces only control-flow information about the enclosing function's
//! return types (§4.4).

use crate::ast::pattern::PatternExpr;
use crate::ast::Expr;
use crate::span::{Ident, Span};

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ReturnKind {
    Value,
    Ref,
    /// Per-value, decided by the returned expression's analyzed tempness
    /// (§4.6, Open Question 2).
    Forward,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Stmt {
    Let {
        name: Ident,
        mutable: bool,
        type_annotation: Option<PatternExpr>,
        value: Expr,
        position: Span,
    },
    Assign {
        target: Expr,
        value: Expr,
        position: Span,
    },
    ExprStmt(Expr),
    Return {
        kind: ReturnKind,
        values: Vec<Expr>,
        position: Span,
    },
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
        position: Span,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
        position: Span,
    },
    Break(Span),
    Continue(Span),
    Block(Vec<Stmt>, Span),
    Try {
        body: Box<Stmt>,
        catches: Vec<CatchClause>,
        position: Span,
    },
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CatchClause {
    pub exception_name: Ident,
    pub exception_type: Option<PatternExpr>,
    pub body: Box<Stmt>,
}
