//! Module assembly: `populateModule` (spec.md §4.4), the nine-phase walk
//! that turns one parsed `Module` into a working scope plus the subset of
//! bindings visible to importers.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use amm_diagnostic::{Diagnostic, ErrorCode};
use amm_ir::ast::{FunctionDecl, ImportDecl, InterfaceDecl, Module, Stmt, StmtKind, TypeDecl, TypeDeclBody};
use amm_ir::{Name, Span, StringInterner, SynthNamer};
use amm_types::{BuiltinTypes, Callable, FunctionType, Interface, OperatorType, OrderedMap, Operator, Scope, ScopeRef, Type, Value};

use crate::event::EventTable;
use crate::user_function::{resolve_type_annotation, UserFunction};

/// What `populate_module` hands back for one source file: the working
/// scope every phase wrote into, and the subset of it an importer sees.
#[derive(Clone)]
pub struct LoweredModule {
    pub module_scope: ScopeRef,
    pub export_scope: ScopeRef,
}

/// spec.md §4.4: processes `ast` in the fixed order imports → type
/// declarations → interface declarations → module-scope constants → events
/// → functions → operator mappings → exports → event handlers. `modules`
/// must already hold a `LoweredModule` for every path this module imports
/// — the driver is responsible for visiting imports in topological order
/// before calling this.
#[allow(clippy::too_many_arguments)]
pub fn populate_module(
    ast: &Module,
    root_scope: &ScopeRef,
    modules: &FxHashMap<String, LoweredModule>,
    events: &EventTable,
    builtins: &BuiltinTypes,
    interner: &StringInterner,
    synth: &SynthNamer,
    is_std: bool,
) -> Result<LoweredModule, Diagnostic> {
    let _ = is_std;
    let module_scope = Scope::new(Some(root_scope.clone()));
    let export_scope = Scope::new(None);

    populate_imports(ast, &module_scope, modules, interner)?;
    populate_types(ast, &module_scope, interner, synth)?;
    populate_interfaces(ast, &module_scope, interner, synth)?;
    populate_constants(ast, &module_scope, interner)?;
    populate_events(ast, &module_scope, events, builtins, interner, synth)?;
    populate_functions(ast, &module_scope, interner)?;
    populate_operators(ast, &module_scope, interner)?;
    populate_exports(ast, &module_scope, &export_scope, interner)?;
    populate_handlers(ast, &module_scope, events, builtins, interner)?;

    Ok(LoweredModule { module_scope, export_scope })
}

/// `name` if nothing is already bound under it in `scope`'s own bindings,
/// otherwise a UUID-derived-suffixed name distinct from it (spec.md:304-306,
/// SPEC_FULL.md "Driver" section "resolve naming collisions by UUID-derived
/// suffixing"). The first declaration under a name always keeps it; only
/// later collisions get renamed.
fn dedupe_name(scope: &ScopeRef, name: Name, interner: &StringInterner, synth: &SynthNamer) -> Name {
    if scope.borrow().shallow_get(name).is_none() {
        return name;
    }
    let suffixed = format!("{}_{}", interner.resolve(name), synth.next_suffix());
    interner.intern(&suffixed)
}

fn resolve_import<'a>(modules: &'a FxHashMap<String, LoweredModule>, path: &str) -> Result<&'a LoweredModule, Diagnostic> {
    modules.get(path).ok_or_else(|| {
        Diagnostic::new(ErrorCode::E1002UnresolvedImport, format!("unresolved import `{}`", path), Span::DUMMY).with_token(path.to_string())
    })
}

/// Binds `value` under `name` in `scope`, concatenating onto an existing
/// `Function`/`Operator` overload set rather than overwriting it (spec.md
/// §4.4 "Function bindings merge by concatenation ... operator bindings
/// merge the same way").
fn bind_merging(scope: &ScopeRef, name: Name, value: Value) {
    let mut scope_mut = scope.borrow_mut();
    match (&value, scope_mut.shallow_get(name)) {
        (Value::Function(incoming), Some(Value::Function(existing))) => {
            let additions: Vec<_> = incoming.borrow().iter().cloned().collect();
            existing.borrow_mut().extend(additions);
        }
        (Value::Operator(incoming), Some(Value::Operator(existing))) => {
            let additions: Vec<_> = incoming.borrow().iter().cloned().collect();
            existing.borrow_mut().extend(additions);
        }
        _ => scope_mut.put(name, value),
    }
}

fn as_callable(f: Rc<UserFunction>) -> Rc<dyn Callable> {
    f
}

// ---- 1. imports -----------------------------------------------------

fn populate_imports(ast: &Module, module_scope: &ScopeRef, modules: &FxHashMap<String, LoweredModule>, interner: &StringInterner) -> Result<(), Diagnostic> {
    for import in &ast.imports {
        match import {
            ImportDecl::Standard { path, alias } => {
                let source = resolve_import(modules, path)?;
                module_scope.borrow_mut().put(*alias, Value::Scope(source.export_scope.clone()));
            }
            ImportDecl::From { path, items } => {
                let source = resolve_import(modules, path)?;
                for (name, rename) in items {
                    let binding = source.export_scope.borrow().shallow_get(*name).ok_or_else(|| {
                        Diagnostic::new(
                            ErrorCode::E1001UndefinedReference,
                            format!("`{}` is not exported by `{}`", interner.resolve(*name), path),
                            Span::DUMMY,
                        )
                        .with_token(interner.resolve(*name))
                    })?;
                    let dest_name = rename.unwrap_or(*name);
                    bind_merging(module_scope, dest_name, binding.clone());

                    // spec.md §4.4: a from-imported `Type` carrying an
                    // `iface` pulls in every matching type/function/operator
                    // from the same source module under its own name.
                    if let Value::Type(ty) = &binding {
                        if let Some(iface) = ty.iface.clone() {
                            pull_interface_bindings(&source.export_scope, module_scope, &iface);
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

fn pull_interface_bindings(source_export: &ScopeRef, dest: &ScopeRef, iface: &Interface) {
    let source = source_export.borrow();

    let candidate_types: Vec<(Name, Type)> = source
        .shallow_iter()
        .filter_map(|(name, value)| match value {
            Value::Type(ty) => Some((*name, ty.clone())),
            _ => None,
        })
        .collect();
    for (name, ty) in candidate_types {
        if iface.type_applies(&ty, &source) {
            dest.borrow_mut().put(name, Value::Type(ty));
        }
    }

    for required in &iface.functions {
        let Some(fn_name) = required.name else { continue };
        if let Some(binding @ Value::Function(_)) = source.shallow_get(fn_name) {
            bind_merging(dest, fn_name, binding);
        }
    }
    for required in &iface.operators {
        if let Some(binding @ Value::Operator(_)) = source.shallow_get(required.token) {
            bind_merging(dest, required.token, binding);
        }
    }
}

// ---- 2. type declarations --------------------------------------------

fn populate_types(ast: &Module, module_scope: &ScopeRef, interner: &StringInterner, synth: &SynthNamer) -> Result<(), Diagnostic> {
    for decl in &ast.types {
        let ty = build_type_from_decl(decl, module_scope, interner)?;
        let name = dedupe_name(module_scope, decl.name, interner, synth);
        module_scope.borrow_mut().put(name, Value::Type(ty));
    }
    Ok(())
}

fn build_type_from_decl(decl: &TypeDecl, module_scope: &ScopeRef, interner: &StringInterner) -> Result<Type, Diagnostic> {
    let type_scope = Scope::new(Some(module_scope.clone()));
    let mut generics = OrderedMap::new();
    for (idx, generic_name) in decl.generics.iter().enumerate() {
        generics.insert(*generic_name, idx);
        let standin = amm_types::new_generic_standin(interner.resolve(*generic_name), idx);
        type_scope.borrow_mut().put(*generic_name, Value::Type(standin));
    }

    match &decl.body {
        TypeDeclBody::Properties(fields) => {
            let mut properties = OrderedMap::new();
            for (field_name, ann) in fields {
                properties.insert(*field_name, resolve_type_annotation(ann, &type_scope, interner)?);
            }
            Ok(amm_types::new_nominal(interner.resolve(decl.name), properties, generics))
        }
        TypeDeclBody::Alias(ann) => {
            let target = resolve_type_annotation(ann, &type_scope, interner)?;
            Ok(amm_types::new_alias(interner.resolve(decl.name), target))
        }
    }
}

// ---- 3. interface declarations ----------------------------------------

fn populate_interfaces(ast: &Module, module_scope: &ScopeRef, interner: &StringInterner, synth: &SynthNamer) -> Result<(), Diagnostic> {
    for decl in &ast.interfaces {
        let iface = build_interface_from_decl(decl, module_scope, interner)?;
        let ty = amm_types::new_interface_type(interner.resolve(decl.name), iface);
        let name = dedupe_name(module_scope, decl.name, interner, synth);
        module_scope.borrow_mut().put(name, Value::Type(ty));
    }
    Ok(())
}

fn build_interface_from_decl(decl: &InterfaceDecl, scope: &ScopeRef, interner: &StringInterner) -> Result<Interface, Diagnostic> {
    let mut required_properties = OrderedMap::new();
    for (name, ann) in &decl.required_properties {
        required_properties.insert(*name, resolve_type_annotation(ann, scope, interner)?);
    }

    let mut functions = Vec::with_capacity(decl.functions.len());
    for sig in &decl.functions {
        let mut args = Vec::with_capacity(sig.args.len());
        for ann in &sig.args {
            args.push(resolve_type_annotation(ann, scope, interner)?);
        }
        functions.push(FunctionType { name: sig.name, args, ret: resolve_type_annotation(&sig.ret, scope, interner)? });
    }

    let mut operators = Vec::with_capacity(decl.operators.len());
    for sig in &decl.operators {
        let mut args = Vec::with_capacity(sig.args.len());
        for ann in &sig.args {
            args.push(resolve_type_annotation(ann, scope, interner)?);
        }
        operators.push(OperatorType {
            token: interner.intern(&sig.token),
            is_prefix: sig.is_prefix,
            args,
            ret: resolve_type_annotation(&sig.ret, scope, interner)?,
        });
    }

    Ok(Interface { interfacename: decl.name, functions, operators, required_properties })
}

// ---- 4. module-scope constants ----------------------------------------

/// A module-level `const` is modeled as a zero-argument function (its
/// value expression as the body's sole `return`) so it inlines through
/// `UserFunction::microstatement_inlining` at every reference the same way
/// a call does, rather than needing a separate binding kind. The driver's
/// constant hoist (spec.md §4.7) then collapses the resulting per-handler
/// literal CONSTDECs back down to one.
fn populate_constants(ast: &Module, module_scope: &ScopeRef, interner: &StringInterner) -> Result<(), Diagnostic> {
    for decl in &ast.constants {
        let synthetic = FunctionDecl {
            name: Some(decl.name),
            args: Vec::new(),
            return_type: decl.ty.clone(),
            body: vec![Stmt::new(StmtKind::Return(Some(decl.value.clone())), decl.span)],
            pure: true,
            span: decl.span,
        };
        let user_fn = UserFunction::from_ast(&synthetic, module_scope, module_scope, interner)?;
        bind_merging(module_scope, decl.name, Value::Function(Rc::new(RefCell::new(vec![as_callable(user_fn)]))));
    }
    Ok(())
}

// ---- 5. events ----------------------------------------------------------

fn populate_events(ast: &Module, module_scope: &ScopeRef, events: &EventTable, builtins: &BuiltinTypes, interner: &StringInterner, synth: &SynthNamer) -> Result<(), Diagnostic> {
    for decl in &ast.events {
        let carried = match &decl.carried_type {
            Some(ann) => resolve_type_annotation(ann, module_scope, interner)?,
            None => builtins.void.clone(),
        };
        events.register(crate::event::Event::new(decl.name, carried, false), interner, synth);
    }
    Ok(())
}

// ---- 6. functions ---------------------------------------------------

fn populate_functions(ast: &Module, module_scope: &ScopeRef, interner: &StringInterner) -> Result<(), Diagnostic> {
    for decl in &ast.functions {
        let Some(name) = decl.name else {
            return Err(Diagnostic::new(ErrorCode::E6001MalformedDeclaration, "module-level function has no name", decl.span));
        };
        let user_fn = UserFunction::from_ast(decl, module_scope, module_scope, interner)?;
        bind_merging(module_scope, name, Value::Function(Rc::new(RefCell::new(vec![as_callable(user_fn)]))));
    }
    Ok(())
}

// ---- 7. operator mappings --------------------------------------------

fn populate_operators(ast: &Module, module_scope: &ScopeRef, interner: &StringInterner) -> Result<(), Diagnostic> {
    for decl in &ast.operators {
        let Some(Value::Function(overloads)) = module_scope.borrow().deep_get(decl.function_name) else {
            return Err(Diagnostic::new(
                ErrorCode::E1001UndefinedReference,
                format!("operator `{}` references undefined function `{}`", decl.token, interner.resolve(decl.function_name)),
                decl.span,
            )
            .with_token(interner.resolve(decl.function_name)));
        };
        let token = interner.intern(&decl.token);
        let op = Operator::new(token, decl.precedence, decl.is_prefix, overloads);

        let mut scope_mut = module_scope.borrow_mut();
        match scope_mut.shallow_get(token) {
            Some(Value::Operator(existing)) => existing.borrow_mut().push(op),
            _ => scope_mut.put(token, Value::Operator(Rc::new(RefCell::new(vec![op])))),
        }
    }
    Ok(())
}

// ---- 8. exports -------------------------------------------------------

fn populate_exports(ast: &Module, module_scope: &ScopeRef, export_scope: &ScopeRef, interner: &StringInterner) -> Result<(), Diagnostic> {
    for name in &ast.exports {
        let Some(value) = module_scope.borrow().deep_get(*name) else {
            return Err(Diagnostic::new(
                ErrorCode::E1001UndefinedReference,
                format!("export `{}` is undefined", interner.resolve(*name)),
                Span::DUMMY,
            )
            .with_token(interner.resolve(*name)));
        };
        export_scope.borrow_mut().put(*name, value);
    }
    Ok(())
}

// ---- 9. event handlers ------------------------------------------------

fn populate_handlers(ast: &Module, module_scope: &ScopeRef, events: &EventTable, builtins: &BuiltinTypes, interner: &StringInterner) -> Result<(), Diagnostic> {
    for decl in &ast.handlers {
        let Some(event) = events.get(decl.event) else {
            return Err(Diagnostic::new(
                ErrorCode::E1001UndefinedReference,
                format!("undefined event `{}`", interner.resolve(decl.event)),
                decl.span,
            )
            .with_token(interner.resolve(decl.event)));
        };

        let expected_arity = if event.carried_type.same_type(&builtins.void) { 0 } else { 1 };
        if decl.handler.args.len() != expected_arity {
            return Err(Diagnostic::new(
                ErrorCode::E2005HandlerArgMismatch,
                format!(
                    "handler for `{}` expects {} argument(s), found {}",
                    interner.resolve(decl.event),
                    expected_arity,
                    decl.handler.args.len()
                ),
                decl.span,
            ));
        }

        if expected_arity == 1 {
            let param = &decl.handler.args[0];
            let Some(ann) = param.ty.as_ref() else {
                return Err(Diagnostic::new(
                    ErrorCode::E6001MalformedDeclaration,
                    format!("handler parameter `{}` has no type annotation", interner.resolve(param.name)),
                    decl.span,
                ));
            };
            let param_ty = resolve_type_annotation(ann, module_scope, interner)?;
            if !param_ty.same_type(&event.carried_type) && !param_ty.castable(&event.carried_type) {
                return Err(Diagnostic::new(
                    ErrorCode::E2005HandlerArgMismatch,
                    format!(
                        "handler for `{}` expects `{}`, found `{}`",
                        interner.resolve(decl.event),
                        event.carried_type.typename,
                        param_ty.typename
                    ),
                    decl.span,
                ));
            }
        }

        let user_fn = UserFunction::from_ast(&decl.handler, module_scope, module_scope, interner)?;
        events.add_handler(decl.event, as_callable(user_fn));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use amm_ir::ast::{Expr, ExprKind, Literal, Param};
    use amm_ir::SynthNamer;

    fn ctx() -> (StringInterner, BuiltinTypes, EventTable, SynthNamer) {
        let interner = StringInterner::new();
        let builtins = BuiltinTypes::new(&interner);
        (interner, builtins, EventTable::new(), SynthNamer::new())
    }

    fn int_literal(n: i64) -> Expr {
        Expr::new(ExprKind::Literal(Literal::Int(n)), Span::DUMMY)
    }

    #[test]
    fn module_scope_constant_is_bound_as_zero_arg_function() {
        let (interner, builtins, events, synth) = ctx();
        let root = Scope::new(None);
        root.borrow_mut().put(interner.intern("int64"), Value::Type(builtins.int64.clone()));

        let mut ast = Module::default();
        ast.constants.push(amm_ir::ast::ModuleConst {
            name: interner.intern("answer"),
            ty: Some(amm_ir::ast::TypeAnnotation::Named { name: interner.intern("int64"), generics: Vec::new() }),
            value: int_literal(42),
            span: Span::DUMMY,
        });

        let modules = FxHashMap::default();
        let lowered = populate_module(&ast, &root, &modules, &events, &builtins, &interner, &synth, false).expect("module populates");

        match lowered.module_scope.borrow().shallow_get(interner.intern("answer")) {
            Some(Value::Function(overloads)) => assert_eq!(overloads.borrow().len(), 1),
            other => panic!("expected a function binding, got {:?}", other.is_some()),
        }
    }

    #[test]
    fn exports_copy_named_bindings_into_export_scope() {
        let (interner, builtins, events, synth) = ctx();
        let root = Scope::new(None);
        root.borrow_mut().put(interner.intern("int64"), Value::Type(builtins.int64.clone()));

        let mut ast = Module::default();
        let name = interner.intern("Thing");
        ast.types.push(TypeDecl { name, generics: Vec::new(), body: TypeDeclBody::Properties(Vec::new()), span: Span::DUMMY });
        ast.exports.push(name);

        let modules = FxHashMap::default();
        let lowered = populate_module(&ast, &root, &modules, &events, &builtins, &interner, &synth, false).expect("module populates");

        assert!(matches!(lowered.export_scope.borrow().shallow_get(name), Some(Value::Type(_))));
    }

    #[test]
    fn duplicate_type_declarations_get_a_suffixed_second_binding() {
        let (interner, builtins, events, synth) = ctx();
        let root = Scope::new(None);

        let mut ast = Module::default();
        let name = interner.intern("Thing");
        ast.types.push(TypeDecl { name, generics: Vec::new(), body: TypeDeclBody::Properties(Vec::new()), span: Span::DUMMY });
        ast.types.push(TypeDecl { name, generics: Vec::new(), body: TypeDeclBody::Properties(Vec::new()), span: Span::DUMMY });

        let modules = FxHashMap::default();
        let lowered = populate_module(&ast, &root, &modules, &events, &builtins, &interner, &synth, false).expect("module populates");

        assert!(matches!(lowered.module_scope.borrow().shallow_get(name), Some(Value::Type(_))));
        let bound: Vec<Name> = lowered.module_scope.borrow().shallow_iter().map(|(n, _)| *n).filter(|n| interner.resolve(*n).starts_with("Thing")).collect();
        assert_eq!(bound.len(), 2, "expected the plain name plus one suffixed duplicate");
    }

    #[test]
    fn duplicate_event_declarations_get_a_suffixed_second_registration() {
        let (interner, builtins, events, synth) = ctx();
        let root = Scope::new(None);

        let mut ast = Module::default();
        let tick = interner.intern("tick");
        ast.events.push(amm_ir::ast::EventDecl { name: tick, carried_type: None, span: Span::DUMMY });
        ast.events.push(amm_ir::ast::EventDecl { name: tick, carried_type: None, span: Span::DUMMY });

        let modules = FxHashMap::default();
        populate_module(&ast, &root, &modules, &events, &builtins, &interner, &synth, false).expect("module populates");

        let all = events.all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, tick);
        assert_ne!(all[1].name, tick);
        assert!(interner.resolve(all[1].name).starts_with("tick_"));
    }

    #[test]
    fn handler_arity_mismatch_is_fatal() {
        let (interner, builtins, events, synth) = ctx();
        let root = Scope::new(None);
        let tick = interner.intern("tick");
        events.register(crate::event::Event::new(tick, builtins.void.clone(), false), &interner, &synth);

        let mut ast = Module::default();
        ast.handlers.push(amm_ir::ast::HandlerDecl {
            event: tick,
            handler: FunctionDecl {
                name: None,
                args: vec![Param { name: interner.intern("n"), ty: Some(amm_ir::ast::TypeAnnotation::Named { name: interner.intern("int64"), generics: Vec::new() }) }],
                return_type: None,
                body: vec![Stmt::new(StmtKind::Return(None), Span::DUMMY)],
                pure: true,
                span: Span::DUMMY,
            },
            span: Span::DUMMY,
        });

        let modules = FxHashMap::default();
        let err = populate_module(&ast, &root, &modules, &events, &builtins, &interner, &synth, false).unwrap_err();
        assert_eq!(err.code, ErrorCode::E2005HandlerArgMismatch);
    }
}
