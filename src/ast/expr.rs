//! Expression nodes (§3 Data Model, §4.4 Analyzer).
//!
//! Operator syntax (`a + b`, `a.b`, `a[b]`) is represented directly here and
//! desugared once, during analysis, into calls against the prelude targets
//! named in §6 (see `analyzer::desugar`). The AST does not pre-desugar so
//! that formatting/printing (out of scope) and error messages can still refer
//! to the original operator form.

use std::rc::Rc;

use crate::ast::stmt::Stmt;
use crate::span::{Ident, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Lt,
    Gt,
    Le,
    Ge,
    Ne,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum UnOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Expr {
    Id(Ident),

    BoolLit(bool, Span),
    /// Integer literal with an optional suffix determining its width
    /// (`42i32`, `7u8`); `None` leaves the width to be inferred contextually.
    IntLit {
        value: i128,
        suffix: Option<Rc<str>>,
        position: Span,
    },
    FloatLit {
        value: f64,
        suffix: Option<Rc<str>>,
        position: Span,
    },
    CharLit(char, Span),
    StringLit(Rc<str>, Span),

    Tuple(Vec<Expr>, Span),
    Array(Vec<Expr>, Span),

    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        position: Span,
    },
    /// `callee[args]` — type-constructor indexing or alias indexing (§4.3).
    Index {
        callee: Box<Expr>,
        args: Vec<Expr>,
        position: Span,
    },
    FieldRef {
        base: Box<Expr>,
        field: Ident,
        position: Span,
    },

    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
        position: Span,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr>,
        position: Span,
    },

    And(Box<Expr>, Box<Expr>, Span),
    Or(Box<Expr>, Box<Expr>, Span),

    AddressOf(Box<Expr>, Span),
    Deref(Box<Expr>, Span),

    /// `*x` at a call site: marks `x` so the resolver enumerates the variant
    /// members of its type (§4.4, Dispatch closure in §8).
    Dispatch(Box<Expr>, Span),

    If {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
        position: Span,
    },
    Block {
        statements: Vec<Stmt>,
        trailing: Option<Box<Expr>>,
        position: Span,
    },

    /// `lambda(...){}` (by-value capture) or `block(...){}` (by-ref capture),
    /// rewritten at first analysis into a closure record plus a `call`
    /// overload (§4.4, Open Question 3).
    Lambda {
        capture_by_ref: bool,
        params: Vec<Ident>,
        body: Box<Expr>,
        position: Span,
    },
}

impl Expr {
    pub fn position(&self) -> &Span {
        match self {
            Expr::Id(id) => &id.position,
            Expr::BoolLit(_, s)
            | Expr::CharLit(_, s)
            | Expr::StringLit(_, s)
            | Expr::Tuple(_, s)
            | Expr::Array(_, s)
            | Expr::And(_, _, s)
            | Expr::Or(_, _, s)
            | Expr::AddressOf(_, s)
            | Expr::Deref(_, s)
            | Expr::Dispatch(_, s) => s,
            Expr::IntLit { position, .. }
            | Expr::FloatLit { position, .. }
            | Expr::Call { position, .. }
            | Expr::Index { position, .. }
            | Expr::FieldRef { position, .. }
            | Expr::Binary { position, .. }
            | Expr::Unary { position, .. }
            | Expr::If { position, .. }
            | Expr::Block { position, .. }
            | Expr::Lambda { position, .. } => position,
        }
    }
}
