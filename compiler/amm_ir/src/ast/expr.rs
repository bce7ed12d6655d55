//! Expression AST nodes.

use crate::{Name, Span};
use super::items::{Param, TypeAnnotation};
use super::stmt::Stmt;

/// A literal value as written in source.
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

/// One element of a flat operator expression, before precedence resolution.
///
/// spec.md §4.6: "operands and operator references are gathered into a
/// linear list; then the highest-precedence operator is repeatedly
/// located." The parser hands us this flat alternation rather than an
/// already-precedence-climbed tree.
#[derive(Clone, Debug, PartialEq)]
pub enum OpElem {
    Operand(Expr),
    Operator(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Expr { kind, span }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    /// A dotted name reference, e.g. `x` or `a.b.c`.
    Path(Vec<Name>),
    /// `base[index]`.
    Index(Box<Expr>, Box<Expr>),
    /// `callee(args...)` where `callee` is a dotted path (spec.md §4.6
    /// "Chained / method-style calls": the longest callable prefix of the
    /// path is resolved first).
    Call(Vec<Name>, Vec<Expr>),
    /// `receiver.method(args...)` once the receiver has been resolved as a
    /// value rather than a further path segment.
    MethodCall(Box<Expr>, Name, Vec<Expr>),
    ArrayLiteral(Vec<Expr>),
    ObjectLiteral(Name, Vec<(Name, Expr)>),
    /// A flat operand/operator alternation awaiting precedence resolution.
    OperatorExpr(Vec<OpElem>),
    Typeof(Box<Expr>),
    Closure(Vec<Param>, Option<TypeAnnotation>, Vec<Stmt>),
}
