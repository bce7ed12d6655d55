//! Standard-library discovery (spec.md §6): build `<root>` first against
//! the opcode scope, then load the transitive closure of `@std/...`
//! imports a user module requires, in topological (dependency-first)
//! order.
//!
//! Reading the library off disk and parsing each `.ln` file is the
//! surface parser's job, out of scope here same as the rest of this
//! crate's input — `ammc` hands this module a pre-parsed `path -> Module`
//! table; this module only decides *which* of those modules to populate,
//! and in what order.

use rustc_hash::FxHashMap;

use amm_diagnostic::{Diagnostic, ErrorCode};
use amm_ir::ast::{ImportDecl, Module};
use amm_ir::Span;

use crate::driver::DriverContext;

/// The conventional path the standard library's own root module is
/// registered under (spec.md §6 "`<root>`").
pub const STD_ROOT_PATH: &str = "@std/root";

/// Populates the standard library's root module, if one was supplied.
/// Per spec.md §6 this always happens before any `@std/...` module a user
/// import pulls in, since `<root>` is allowed to be depended on implicitly.
pub fn load_stdlib(driver: &mut DriverContext, std_modules: &FxHashMap<String, Module>) -> Result<(), Diagnostic> {
    if let Some(root) = std_modules.get(STD_ROOT_PATH) {
        load_module(driver, STD_ROOT_PATH, root, std_modules, &mut Vec::new())?;
    }
    Ok(())
}

/// Loads every `@std/...` module `ast`'s imports transitively require,
/// skipping modules already populated, each dependency loaded before its
/// dependent.
pub fn load_required(driver: &mut DriverContext, ast: &Module, std_modules: &FxHashMap<String, Module>) -> Result<(), Diagnostic> {
    for import in &ast.imports {
        let path = import_path(import);
        if is_std_path(path) && !driver.modules().contains_key(path) {
            let dep_ast = lookup_std_module(std_modules, path)?;
            load_module(driver, path, dep_ast, std_modules, &mut Vec::new())?;
        }
    }
    Ok(())
}

fn load_module(
    driver: &mut DriverContext,
    path: &str,
    ast: &Module,
    std_modules: &FxHashMap<String, Module>,
    visiting: &mut Vec<String>,
) -> Result<(), Diagnostic> {
    if driver.modules().contains_key(path) {
        return Ok(());
    }
    if visiting.iter().any(|p| p == path) {
        return Err(Diagnostic::new(
            ErrorCode::E1002UnresolvedImport,
            format!("cyclic `@std` import involving `{}`", path),
            Span::DUMMY,
        )
        .with_token(path.to_string()));
    }
    visiting.push(path.to_string());

    for import in &ast.imports {
        let dep_path = import_path(import);
        if is_std_path(dep_path) && !driver.modules().contains_key(dep_path) {
            let dep_ast = lookup_std_module(std_modules, dep_path)?;
            load_module(driver, dep_path, dep_ast, std_modules, visiting)?;
        }
    }

    driver.populate(path, ast, true)?;
    visiting.pop();
    Ok(())
}

fn import_path(import: &ImportDecl) -> &str {
    match import {
        ImportDecl::Standard { path, .. } => path,
        ImportDecl::From { path, .. } => path,
    }
}

fn is_std_path(path: &str) -> bool {
    path.starts_with("@std/")
}

fn lookup_std_module<'a>(std_modules: &'a FxHashMap<String, Module>, path: &str) -> Result<&'a Module, Diagnostic> {
    std_modules.get(path).ok_or_else(|| {
        Diagnostic::new(ErrorCode::E1002UnresolvedImport, format!("unresolved standard-library import `{}`", path), Span::DUMMY)
            .with_token(path.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use amm_ir::StringInterner;
    use amm_types::Scope;

    fn opcode_scope() -> amm_types::ScopeRef {
        Scope::new(None)
    }

    #[test]
    fn load_stdlib_is_a_noop_without_a_root_module() {
        let mut driver = DriverContext::new(StringInterner::new(), opcode_scope());
        let std_modules = FxHashMap::default();
        load_stdlib(&mut driver, &std_modules).expect("noop succeeds");
        assert!(driver.modules().is_empty());
    }

    #[test]
    fn load_required_pulls_in_transitive_std_imports_before_the_dependent() {
        let mut driver = DriverContext::new(StringInterner::new(), opcode_scope());
        driver.opcode_scope.borrow_mut().put(
            driver.interner.intern("int64"),
            amm_types::Value::Type(amm_types::new_builtin("int64")),
        );

        let mut leaf = Module::default();
        leaf.exports.push(driver.interner.intern("helper"));
        leaf.constants.push(amm_ir::ast::ModuleConst {
            name: driver.interner.intern("helper"),
            ty: Some(amm_ir::ast::TypeAnnotation::Named { name: driver.interner.intern("int64"), generics: Vec::new() }),
            value: amm_ir::ast::Expr::new(amm_ir::ast::ExprKind::Literal(amm_ir::ast::Literal::Int(1)), Span::DUMMY),
            span: Span::DUMMY,
        });

        let mut mid = Module::default();
        mid.imports.push(ImportDecl::Standard { path: "@std/leaf".to_string(), alias: driver.interner.intern("leaf") });

        let mut root = Module::default();
        root.imports.push(ImportDecl::Standard { path: "@std/mid".to_string(), alias: driver.interner.intern("mid") });

        let mut std_modules = FxHashMap::default();
        std_modules.insert("@std/leaf".to_string(), leaf);
        std_modules.insert("@std/mid".to_string(), mid);

        load_required(&mut driver, &root, &std_modules).expect("transitive load succeeds");
        assert!(driver.modules().contains_key("@std/leaf"));
        assert!(driver.modules().contains_key("@std/mid"));
    }

    #[test]
    fn cyclic_std_import_is_fatal() {
        let mut driver = DriverContext::new(StringInterner::new(), opcode_scope());
        let mut a = Module::default();
        a.imports.push(ImportDecl::Standard { path: "@std/b".to_string(), alias: driver.interner.intern("b") });
        let mut b = Module::default();
        b.imports.push(ImportDecl::Standard { path: "@std/a".to_string(), alias: driver.interner.intern("a") });

        let mut std_modules = FxHashMap::default();
        std_modules.insert("@std/a".to_string(), a.clone());
        std_modules.insert("@std/b".to_string(), b);

        let err = load_module(&mut driver, "@std/a", &a, &std_modules, &mut Vec::new()).unwrap_err();
        assert_eq!(err.code, ErrorCode::E1002UnresolvedImport);
    }
}
