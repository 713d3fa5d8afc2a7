//! Operator desugaring (§4.4 supplement): `a + b`, `a.b`, unary `-a` rewrite
//! once, at analysis time, into calls against the prelude targets named in
//! §6. The rewritten node is what gets memoized in the analysis cache — the
//! original operator node is never re-desugared on a cache hit, since the
//! cache key is the original node's address and the stored value is already
//! the resolved `MultiPValue`.

use crate::ast::expr::{BinOp, UnOp};
use crate::ast::Expr;
use crate::span::Ident;

fn prelude_call(name: &str, args: Vec<Expr>, position: crate::span::Span) -> Expr {
    Expr::Call {
        callee: Box::new(Expr::Id(Ident::new(name.into(), position.clone()))),
        args,
        position,
    }
}

fn binop_target(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "prelude_expr_add",
        BinOp::Sub => "prelude_expr_subtract",
        BinOp::Mul => "prelude_expr_multiply",
        BinOp::Div => "prelude_expr_divide",
        BinOp::Eq => "prelude_expr_equalsP",
        BinOp::Ne => "prelude_expr_notEqualsP",
        BinOp::Lt => "prelude_expr_lesserP",
        BinOp::Le => "prelude_expr_lesserEqualsP",
        BinOp::Gt => "prelude_expr_greaterP",
        BinOp::Ge => "prelude_expr_greaterEqualsP",
    }
}

fn unop_target(op: UnOp) -> &'static str {
    match op {
        UnOp::Neg => "prelude_expr_negate",
        UnOp::Not => "prelude_expr_not",
    }
}

/// Rewrites one operator-syntax node into the equivalent prelude call.
/// Panics if handed a node that is not one of `FieldRef`/`Binary`/`Unary` —
/// callers only invoke this after matching on those variants.
pub fn desugar_operator(expr: &Expr) -> Expr {
    match expr {
        Expr::Binary { op, left, right, position } => prelude_call(
            binop_target(*op),
            vec![(**left).clone(), (**right).clone()],
            position.clone(),
        ),
        Expr::Unary { op, operand, position } => {
            prelude_call(unop_target(*op), vec![(**operand).clone()], position.clone())
        }
        Expr::FieldRef { base, field, position } => prelude_call(
            "prelude_expr_fieldRef",
            vec![
                (**base).clone(),
                Expr::StringLit(field.name.clone(), field.position.clone()),
            ],
            position.clone(),
        ),
        _ => unreachable!("desugar_operator called on a non-operator expression"),
    }
}
