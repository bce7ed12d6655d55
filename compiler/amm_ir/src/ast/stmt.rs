//! Statement AST nodes.

use crate::{Name, Span};
use super::expr::Expr;
use super::items::TypeAnnotation;

#[derive(Clone, Debug, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Stmt { kind, span }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum StmtKind {
    ConstDecl {
        name: Name,
        ty: Option<TypeAnnotation>,
        value: Expr,
    },
    LetDecl {
        name: Name,
        ty: Option<TypeAnnotation>,
        value: Option<Expr>,
    },
    /// `path = expr`. `path` is a dotted lvalue (`x` or `x.field`).
    Assign {
        path: Vec<Name>,
        value: Expr,
    },
    If {
        cond: Expr,
        then_body: Vec<Stmt>,
        /// `else { ... }` or an `else if` recursively represented as a
        /// single-element body containing another `If` statement
        /// (spec.md §4.5: "nested `else if` chains recursively rewrite
        /// into nested `cond`s").
        else_body: Option<Vec<Stmt>>,
    },
    Return(Option<Expr>),
    Emit {
        event: Name,
        value: Option<Expr>,
    },
    /// A bare expression evaluated for its side effect (typically a call).
    ExprStmt(Expr),
}

impl Stmt {
    /// spec.md §4.5: a statement is "conditional" iff it is (or contains,
    /// for desugaring purposes) an `if`.
    pub fn is_conditional(&self) -> bool {
        matches!(self.kind, StmtKind::If { .. })
    }

    pub fn is_return(&self) -> bool {
        matches!(self.kind, StmtKind::Return(_))
    }
}
