//! Bundled module fixtures mirroring `stdlib/*.ln` (spec.md §6 "Standard
//! library discovery").
//!
//! The surface-syntax parser is an external collaborator out of scope for
//! this pass (spec.md §1), so the `.ln` files under `stdlib/` at the
//! workspace root are illustrative text only — nothing here reads them off
//! disk. This module hand-builds the `Module` ASTs those files describe,
//! the same way `amm_lower`'s own test fixtures construct ASTs directly,
//! so `ammc demo` has something real to drive `DriverContext::run` with.

use rustc_hash::FxHashMap;

use amm_ir::ast::{
    Expr, ExprKind, FunctionDecl, HandlerDecl, ImportDecl, Literal, Module, ModuleConst, OpElem, Param, Stmt,
    StmtKind, TypeAnnotation,
};
use amm_ir::{Span, StringInterner};

fn named(name: amm_ir::Name) -> TypeAnnotation {
    TypeAnnotation::Named { name, generics: Vec::new() }
}

fn path(name: amm_ir::Name) -> Expr {
    Expr::new(ExprKind::Path(vec![name]), Span::DUMMY)
}

fn int_literal(n: i64) -> Expr {
    Expr::new(ExprKind::Literal(Literal::Int(n)), Span::DUMMY)
}

/// `@std/root`: the standard library's entry point, loaded before any
/// `@std/...` import a user module requires (spec.md §6). Empty here since
/// the real standard library's contents are out of scope — present only
/// to exercise the "`<root>` first" rule.
pub fn std_root(_interner: &StringInterner) -> Module {
    Module::default()
}

/// `@std/math`: one constant and one pure function, enough to exercise the
/// loader pulling a transitive `@std/...` import in before its dependent.
pub fn std_math(interner: &StringInterner) -> Module {
    let int64 = interner.intern("int64");
    let one = interner.intern("one");
    let double = interner.intern("double");
    let n = interner.intern("n");

    let mut module = Module::default();
    module.constants.push(ModuleConst {
        name: one,
        ty: Some(named(int64)),
        value: int_literal(1),
        span: Span::DUMMY,
    });
    module.functions.push(FunctionDecl {
        name: Some(double),
        args: vec![Param { name: n, ty: Some(named(int64)) }],
        return_type: Some(named(int64)),
        body: vec![Stmt::new(
            StmtKind::Return(Some(Expr::new(
                ExprKind::OperatorExpr(vec![OpElem::Operand(path(n)), OpElem::Operator("+".to_string()), OpElem::Operand(path(n))]),
                Span::DUMMY,
            ))),
            Span::DUMMY,
        )],
        pure: true,
        span: Span::DUMMY,
    });
    module.exports.push(one);
    module.exports.push(double);
    module
}

/// Every `@std/...` module `ammc demo` knows about, keyed by import path.
pub fn std_modules(interner: &StringInterner) -> FxHashMap<String, Module> {
    let mut modules = FxHashMap::default();
    modules.insert("@std/root".to_string(), std_root(interner));
    modules.insert("@std/math".to_string(), std_math(interner));
    modules
}

/// A root module exercising §8's worked scenarios end to end: an `import`
/// of a standard-library module, an event declaration, and a handler whose
/// body desugars an `if/else` into the `retVal`/`retNotSet` writeback
/// (spec.md §4.5) around an operator expression (spec.md §4.6 item 5).
pub fn demo_root(interner: &StringInterner) -> Module {
    let int64 = interner.intern("int64");
    let math = interner.intern("math");
    let tick = interner.intern("tick");
    let n = interner.intern("n");

    let mut module = Module::default();
    module.imports.push(ImportDecl::Standard { path: "@std/math".to_string(), alias: math });
    module.events.push(amm_ir::ast::EventDecl { name: tick, carried_type: Some(named(int64)), span: Span::DUMMY });
    module.handlers.push(HandlerDecl {
        event: tick,
        handler: FunctionDecl {
            name: None,
            args: vec![Param { name: n, ty: Some(named(int64)) }],
            return_type: Some(named(int64)),
            body: vec![Stmt::new(
                StmtKind::If {
                    cond: Expr::new(
                        ExprKind::OperatorExpr(vec![OpElem::Operand(path(n)), OpElem::Operator(">".to_string()), OpElem::Operand(int_literal(0))]),
                        Span::DUMMY,
                    ),
                    then_body: vec![Stmt::new(StmtKind::Return(Some(path(n))), Span::DUMMY)],
                    else_body: Some(vec![Stmt::new(StmtKind::Return(Some(int_literal(0))), Span::DUMMY)]),
                },
                Span::DUMMY,
            )],
            pure: true,
            span: Span::DUMMY,
        },
        span: Span::DUMMY,
    });
    module
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn std_math_exports_both_bindings() {
        let interner = StringInterner::new();
        let module = std_math(&interner);
        assert_eq!(module.exports.len(), 2);
    }

    #[test]
    fn demo_root_imports_std_math_and_declares_tick() {
        let interner = StringInterner::new();
        let module = demo_root(&interner);
        assert_eq!(module.imports.len(), 1);
        assert_eq!(module.events.len(), 1);
        assert_eq!(module.handlers.len(), 1);
    }
}
