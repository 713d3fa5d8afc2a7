//! Pattern syntax (§4.2): the AST side of the pattern engine. A pattern is
//! either a bare cell reference (a pattern variable coming into scope) or an
//! expression evaluated with those cells visible, e.g. `Pointer[T]` or
//! `Array[T, n]`.

use crate::ast::Expr;
use crate::span::Ident;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum PatternExpr {
    /// A bare pattern-variable occurrence, e.g. the `T` in `x: T`.
    CellRef(Ident),
    /// An expression pattern, e.g. `Pointer[T]`, `Array[T, 10]`, `Int32`.
    Expr(Expr),
}
