//! Surface AST node shapes.
//!
//! spec.md scopes the surface-syntax parser out of this pass entirely
//! ("produces an abstract syntax tree exposing labelled child accessors");
//! what follows is the data contract that external parser is documented to
//! satisfy. Every lowering entry point in `amm_lower` consumes these types
//! and nothing upstream of them.

mod expr;
mod items;
mod stmt;

pub use expr::{Expr, ExprKind, Literal, OpElem};
pub use items::{
    EventDecl, FunctionDecl, FunctionSig, HandlerDecl, ImportDecl, InterfaceDecl, Module,
    ModuleConst, OperatorDecl, OperatorSig, Param, TypeAnnotation, TypeDecl, TypeDeclBody,
};
pub use stmt::{Stmt, StmtKind};
