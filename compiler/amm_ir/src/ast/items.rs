//! Module-level item AST nodes: imports, types, interfaces, functions,
//! operators, exports, events, and handlers (spec.md §4.4).

use crate::{Name, Span};
use super::expr::Expr;
use super::stmt::Stmt;

/// A parsed type annotation, prior to resolution against a `Scope`.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeAnnotation {
    /// `Name<Generic, Args>` (zero generics for a plain nominal reference).
    Named { name: Name, generics: Vec<TypeAnnotation> },
    /// `A | B | C`.
    Union(Vec<TypeAnnotation>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub name: Name,
    pub ty: Option<TypeAnnotation>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ImportDecl {
    /// `import path as alias` — binds the imported module's export scope.
    Standard { path: String, alias: Name },
    /// `from path import a, b as c` — copies named bindings, with optional
    /// renaming.
    From { path: String, items: Vec<(Name, Option<Name>)> },
}

#[derive(Clone, Debug, PartialEq)]
pub struct TypeDecl {
    pub name: Name,
    pub generics: Vec<Name>,
    pub body: TypeDeclBody,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TypeDeclBody {
    /// `type T { prop: Ty, ... }`.
    Properties(Vec<(Name, TypeAnnotation)>),
    /// `type T = OtherType` (single alias) or `type T = A | B` (inline
    /// union handled via `TypeAnnotation::Union`).
    Alias(TypeAnnotation),
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionSig {
    pub name: Option<Name>,
    pub args: Vec<TypeAnnotation>,
    pub ret: TypeAnnotation,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OperatorSig {
    pub token: String,
    pub is_prefix: bool,
    pub args: Vec<TypeAnnotation>,
    pub ret: TypeAnnotation,
}

#[derive(Clone, Debug, PartialEq)]
pub struct InterfaceDecl {
    pub name: Name,
    pub functions: Vec<FunctionSig>,
    pub operators: Vec<OperatorSig>,
    pub required_properties: Vec<(Name, TypeAnnotation)>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDecl {
    pub name: Option<Name>,
    pub args: Vec<Param>,
    pub return_type: Option<TypeAnnotation>,
    pub body: Vec<Stmt>,
    pub pure: bool,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OperatorDecl {
    pub token: String,
    pub precedence: u32,
    pub is_prefix: bool,
    pub function_name: Name,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EventDecl {
    pub name: Name,
    pub carried_type: Option<TypeAnnotation>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HandlerDecl {
    pub event: Name,
    pub handler: FunctionDecl,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModuleConst {
    pub name: Name,
    pub ty: Option<TypeAnnotation>,
    pub value: Expr,
    pub span: Span,
}

/// The whole of one parsed source file, in the phase order spec.md §4.4
/// requires `populateModule` to process it: imports, types, interfaces,
/// module-scope constants, events, functions, operator mappings, exports,
/// event handlers.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Module {
    pub imports: Vec<ImportDecl>,
    pub types: Vec<TypeDecl>,
    pub interfaces: Vec<InterfaceDecl>,
    pub constants: Vec<ModuleConst>,
    pub events: Vec<EventDecl>,
    pub functions: Vec<FunctionDecl>,
    pub operators: Vec<OperatorDecl>,
    pub exports: Vec<Name>,
    pub handlers: Vec<HandlerDecl>,
}
