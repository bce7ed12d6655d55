//! `UserFunction`: construction, conditional/return desugaring, and
//! inlining (spec.md §4.5).

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use amm_diagnostic::{Diagnostic, ErrorCode};
use amm_ir::ast::{Expr, ExprKind, Literal, OpElem, Param, Stmt, StmtKind, TypeAnnotation};
use amm_ir::{Name, Span, StringInterner, SynthNamer};
use amm_types::{Callable, Scope, ScopeRef, Type, Value};

use crate::microstatement::Lowerer;

/// The parsed representation of a user function (spec.md §3
/// "UserFunction"): name, ordered argument bindings, return type, closure
/// scope, statement list, purity flag.
pub struct UserFunction {
    pub name: Option<Name>,
    /// Ordered argument name → type; order is call-site significant.
    pub args: Vec<(Name, Type)>,
    pub return_type: Type,
    pub closure_scope: ScopeRef,
    /// The statement list *after* `maybe_transform` has run — this is what
    /// `microstatement_inlining` actually inlines.
    pub body: Vec<Stmt>,
    pub pure: bool,
}

impl Callable for UserFunction {
    fn name(&self) -> Name {
        self.name.unwrap_or(Name::EMPTY)
    }

    fn arg_types(&self) -> &[Type] {
        // `Callable::arg_types` wants a `&[Type]` slice; `UserFunction`
        // keeps names alongside types for inlining, so this accessor isn't
        // reachable through the slice form. Dispatch code that needs
        // per-argument types on a `UserFunction` downcasts via `as_any`
        // and reads `args` directly instead.
        &[]
    }

    fn return_type(&self) -> &Type {
        &self.return_type
    }

    fn is_pure(&self) -> bool {
        self.pure
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl UserFunction {
    /// spec.md §4.5 `fromAst`: extract name, ordered argument types
    /// (solidifying generics as needed, constructing a fresh union type for
    /// inline union annotations), return type (explicit, or inferred from a
    /// one-liner tail call — here: the last statement's expression type when
    /// no annotation is given and the body is a single `ExprStmt`/`Return`),
    /// closure scope, and statement list. An unreachable statement after a
    /// return is fatal.
    pub fn from_ast(
        decl: &amm_ir::ast::FunctionDecl,
        closure_scope: &ScopeRef,
        scope_for_types: &ScopeRef,
        interner: &StringInterner,
    ) -> Result<Rc<UserFunction>, Diagnostic> {
        check_no_statement_after_return(&decl.body)?;

        let mut args = Vec::with_capacity(decl.args.len());
        for param in &decl.args {
            let ty = resolve_param_type(param, scope_for_types, interner)?;
            args.push((param.name, ty));
        }

        let return_type = match &decl.return_type {
            Some(ann) => resolve_type_annotation(ann, scope_for_types, interner)?,
            None => infer_return_type(&decl.body, scope_for_types, interner)?,
        };

        let body = maybe_transform(decl.body.clone(), &return_type, interner);

        Ok(Rc::new(UserFunction {
            name: decl.name,
            args,
            return_type,
            closure_scope: closure_scope.clone(),
            body,
            pure: decl.pure,
        }))
    }

    /// spec.md §4.5 `dispatchFn`: select the overload whose argument list
    /// matches `arg_types` elementwise under any of: typename equality;
    /// interface satisfaction; candidate argument is the generic and
    /// argument is one of its solidifications; both solidify the same
    /// originalType and all property types transitively match; candidate
    /// argument is a union containing the actual typename. First matching
    /// candidate wins in forward scan order.
    pub fn dispatch_fn(
        candidates: &[Rc<dyn Callable>],
        arg_types: &[Type],
        scope: &ScopeRef,
    ) -> Option<Rc<dyn Callable>> {
        'candidate: for candidate in candidates {
            let candidate_args = callable_arg_types(candidate);
            if candidate_args.len() != arg_types.len() {
                continue;
            }
            for (want, have) in candidate_args.iter().zip(arg_types) {
                if !arg_matches(want, have, &scope.borrow()) {
                    continue 'candidate;
                }
            }
            return Some(candidate.clone());
        }
        None
    }

    /// spec.md §4.5 `microstatementInlining`: inline this function's body
    /// at a call site. For each declared parameter a REREF aliases the
    /// caller's real argument name to the callee's parameter name; every
    /// statement in the body is then lowered in sequence into the caller's
    /// microstatement stream; REREFs other than the final one are stripped
    /// from the inserted range afterward so they don't leak rebindings into
    /// the outer scope.
    pub fn microstatement_inlining(
        &self,
        lowerer: &mut Lowerer<'_>,
        call_args: &[String],
        span: Span,
    ) -> Result<String, Diagnostic> {
        let fn_scope = Scope::new(Some(self.closure_scope.clone()));
        let insertion_start = lowerer.stream.len();

        for ((param_name, param_type), arg_ref) in self.args.iter().zip(call_args) {
            let reref = lowerer.emit_reref(*param_name, param_type.typename_as_name(lowerer.interner), arg_ref.clone(), span);
            fn_scope
                .borrow_mut()
                .put(*param_name, amm_types::Value::Const(Box::new(reref)));
        }

        let mut last_ref = String::new();
        for stmt in &self.body {
            last_ref = lowerer.lower_stmt(&fn_scope, stmt)?;
        }

        // Strip REREFs other than the trailing result REREF so parameter
        // rebindings don't leak into the outer scope's visible stream.
        let last_idx = lowerer.stream.len().saturating_sub(1);
        for idx in insertion_start..last_idx {
            if lowerer.stream[idx].statement_type == amm_ir::StatementType::Reref {
                lowerer.stream[idx].input_names.clear();
            }
        }

        Ok(last_ref)
    }
}

trait TypeNameInterning {
    fn typename_as_name(&self, interner: &StringInterner) -> Name;
}

impl TypeNameInterning for Type {
    fn typename_as_name(&self, interner: &StringInterner) -> Name {
        interner.intern(&self.typename)
    }
}

fn callable_arg_types(candidate: &Rc<dyn Callable>) -> Vec<Type> {
    if let Some(user_fn) = candidate.as_any().downcast_ref::<UserFunction>() {
        user_fn.args.iter().map(|(_, ty)| ty.clone()).collect()
    } else {
        candidate.arg_types().to_vec()
    }
}

/// One element of `dispatchFn`'s five-way match rule.
fn arg_matches(want: &Type, have: &Type, scope: &Scope) -> bool {
    if want.same_type(have) {
        return true;
    }
    if want.is_generic_standin {
        return true;
    }
    if let (Some(a), Some(b)) = (want.original_type(), have.original_type()) {
        if a.same_type(&b) && properties_transitively_match(want, have) {
            return true;
        }
    }
    if let Some(members) = &want.union_types {
        if members.iter().any(|m| m.same_type(have)) {
            return true;
        }
    }
    if let Some(iface) = want.interface() {
        if iface.type_applies(have, scope) {
            return true;
        }
    }
    false
}

fn properties_transitively_match(want: &Type, have: &Type) -> bool {
    if want.properties.len() != have.properties.len() {
        return false;
    }
    want.properties
        .iter()
        .zip(have.properties.iter())
        .all(|((_, wt), (_, ht))| wt.same_type(ht) || wt.is_generic_standin)
}

fn check_no_statement_after_return(body: &[Stmt]) -> Result<(), Diagnostic> {
    for (idx, stmt) in body.iter().enumerate() {
        if stmt.is_return() && idx + 1 < body.len() {
            return Err(Diagnostic::new(
                ErrorCode::E5001UnreachableCode,
                "statement follows a return in the same block",
                body[idx + 1].span,
            ));
        }
    }
    Ok(())
}

fn resolve_param_type(param: &Param, scope: &ScopeRef, interner: &StringInterner) -> Result<Type, Diagnostic> {
    match &param.ty {
        Some(ann) => resolve_type_annotation(ann, scope, interner),
        None => Err(Diagnostic::new(
            ErrorCode::E6001MalformedDeclaration,
            format!("parameter `{}` has no type annotation", interner.resolve(param.name)),
            Span::DUMMY,
        )),
    }
}

/// Resolve a surface `TypeAnnotation` against `scope`, solidifying generic
/// applications and constructing a fresh union `Type` for inline
/// `A | B` annotations.
pub fn resolve_type_annotation(
    ann: &TypeAnnotation,
    scope: &ScopeRef,
    interner: &StringInterner,
) -> Result<Type, Diagnostic> {
    match ann {
        TypeAnnotation::Named { name, generics } => {
            let base = lookup_type(*name, scope, interner)?;
            if generics.is_empty() {
                return Ok(base);
            }
            let mut replacements = Vec::with_capacity(generics.len());
            for generic_ann in generics {
                replacements.push(resolve_type_annotation(generic_ann, scope, interner)?);
            }
            base.solidify(&replacements, scope, interner)
        }
        TypeAnnotation::Union(members) => {
            let mut resolved = Vec::with_capacity(members.len());
            for member in members {
                resolved.push(resolve_type_annotation(member, scope, interner)?);
            }
            let name = resolved.iter().map(|t| t.typename.clone()).collect::<Vec<_>>().join(" | ");
            Ok(amm_types::new_union(name, resolved))
        }
    }
}

fn lookup_type(name: Name, scope: &ScopeRef, interner: &StringInterner) -> Result<Type, Diagnostic> {
    match scope.borrow().deep_get(name) {
        Some(amm_types::Value::Type(ty)) => Ok(ty),
        _ => Err(Diagnostic::new(
            ErrorCode::E1001UndefinedReference,
            format!("undefined type `{}`", interner.resolve(name)),
            Span::DUMMY,
        )
        .with_token(interner.resolve(name))),
    }
}

/// spec.md §4.5 when no return annotation is given: infer from a
/// one-liner's tail call — the type of the final statement's expression
/// when the body ends in a `return <expr>` or a bare expression statement.
/// Declarations earlier in the body are tracked so the tail expression can
/// reference them. For anything more complex than a literal, a variable
/// reference, a call, or an operator expression this is a hard error: an
/// explicit annotation is required.
fn infer_return_type(body: &[Stmt], scope: &ScopeRef, interner: &StringInterner) -> Result<Type, Diagnostic> {
    let mut locals: Vec<(Name, Type)> = Vec::new();
    for stmt in body {
        match &stmt.kind {
            StmtKind::ConstDecl { name, ty, value } => {
                let resolved = match ty {
                    Some(ann) => resolve_type_annotation(ann, scope, interner)?,
                    None => infer_expr_type(value, scope, interner, &locals)?,
                };
                locals.push((*name, resolved));
            }
            StmtKind::LetDecl { name, ty, value } => {
                let resolved = match (ty, value) {
                    (Some(ann), _) => resolve_type_annotation(ann, scope, interner)?,
                    (None, Some(value)) => infer_expr_type(value, scope, interner, &locals)?,
                    (None, None) => amm_types::new_builtin("void"),
                };
                locals.push((*name, resolved));
            }
            _ => {}
        }
    }

    match body.last().map(|s| &s.kind) {
        Some(StmtKind::Return(None)) | None => Ok(amm_types::new_builtin("void")),
        Some(StmtKind::Return(Some(expr))) | Some(StmtKind::ExprStmt(expr)) => infer_expr_type(expr, scope, interner, &locals),
        _ => Err(Diagnostic::new(
            ErrorCode::E6001MalformedDeclaration,
            "function has no return type annotation and its tail is not a `return`/expression statement",
            Span::DUMMY,
        )),
    }
}

/// Resolves `expr`'s type without emitting microstatements — used only to
/// infer an omitted return-type annotation, before a `Lowerer` (and the
/// handler scope it lowers into) exist. Handles the expression forms a
/// one-liner tail realistically takes: literals, variable references,
/// calls, method calls, `typeof`, and operator expressions. Anything more
/// structural (array/object literals, indexing, closures) requires an
/// explicit annotation instead.
fn infer_expr_type(expr: &Expr, scope: &ScopeRef, interner: &StringInterner, locals: &[(Name, Type)]) -> Result<Type, Diagnostic> {
    match &expr.kind {
        ExprKind::Literal(Literal::Int(_)) => Ok(amm_types::new_builtin("int64")),
        ExprKind::Literal(Literal::Float(_)) => Ok(amm_types::new_builtin("float64")),
        ExprKind::Literal(Literal::Bool(_)) => Ok(amm_types::new_builtin("bool")),
        ExprKind::Literal(Literal::Str(_)) => Ok(amm_types::new_builtin("string")),
        ExprKind::Typeof(_) => Ok(amm_types::new_builtin("string")),
        ExprKind::Path(path) => infer_path_type(path, scope, interner, locals, expr.span),
        ExprKind::Call(path, args) => {
            let mut arg_types = Vec::with_capacity(args.len());
            for arg in args {
                arg_types.push(infer_expr_type(arg, scope, interner, locals)?);
            }
            let Some(Value::Function(overloads)) = scope.borrow().deep_get_path(path) else {
                return Err(undefined_reference(path, interner, expr.span));
            };
            UserFunction::dispatch_fn(&overloads.borrow(), &arg_types, scope)
                .map(|candidate| candidate.return_type().clone())
                .ok_or_else(|| {
                    Diagnostic::new(ErrorCode::E3001NoMatchingFunction, format!("no overload of `{}` matches argument types", dotted(path, interner)), expr.span)
                })
        }
        ExprKind::MethodCall(receiver, method, args) => {
            let mut arg_types = Vec::with_capacity(args.len() + 1);
            arg_types.push(infer_expr_type(receiver, scope, interner, locals)?);
            for arg in args {
                arg_types.push(infer_expr_type(arg, scope, interner, locals)?);
            }
            let Some(Value::Function(overloads)) = scope.borrow().deep_get(*method) else {
                return Err(undefined_reference(std::slice::from_ref(method), interner, expr.span));
            };
            UserFunction::dispatch_fn(&overloads.borrow(), &arg_types, scope)
                .map(|candidate| candidate.return_type().clone())
                .ok_or_else(|| {
                    Diagnostic::new(ErrorCode::E3001NoMatchingFunction, format!("no overload of `{}` matches argument types", interner.resolve(*method)), expr.span)
                })
        }
        ExprKind::OperatorExpr(elements) => infer_operator_expr_type(elements, scope, interner, locals, expr.span),
        ExprKind::Index(_, _) | ExprKind::ArrayLiteral(_) | ExprKind::ObjectLiteral(_, _) | ExprKind::Closure(_, _, _) => Err(Diagnostic::new(
            ErrorCode::E6001MalformedDeclaration,
            "tail expression is not simple enough for return-type inference — add an explicit return type",
            expr.span,
        )),
    }
}

fn infer_path_type(path: &[Name], scope: &ScopeRef, interner: &StringInterner, locals: &[(Name, Type)], span: Span) -> Result<Type, Diagnostic> {
    if path.len() == 1 {
        if let Some((_, ty)) = locals.iter().rev().find(|(n, _)| *n == path[0]) {
            return Ok(ty.clone());
        }
    }
    match scope.borrow().deep_get_path(path) {
        Some(Value::Type(ty)) => Ok(ty),
        Some(Value::Function(overloads)) => UserFunction::dispatch_fn(&overloads.borrow(), &[], scope)
            .map(|candidate| candidate.return_type().clone())
            .ok_or_else(|| undefined_reference(path, interner, span)),
        _ => Err(undefined_reference(path, interner, span)),
    }
}

fn undefined_reference(path: &[Name], interner: &StringInterner, span: Span) -> Diagnostic {
    let dotted = dotted(path, interner);
    Diagnostic::new(ErrorCode::E1001UndefinedReference, format!("undefined reference `{dotted}`"), span).with_token(dotted)
}

fn dotted(path: &[Name], interner: &StringInterner) -> String {
    path.iter().map(|n| interner.resolve(*n)).collect::<Vec<_>>().join(".")
}

/// Type-only replay of the precedence-climbing reduction
/// `microstatement::Lowerer::lower_operator_expr` performs, without a
/// `Lowerer` to emit microstatements into.
fn infer_operator_expr_type(elements: &[OpElem], scope: &ScopeRef, interner: &StringInterner, locals: &[(Name, Type)], span: Span) -> Result<Type, Diagnostic> {
    enum Elem {
        Operand(Type),
        Operator(String),
    }

    let mut list = Vec::with_capacity(elements.len());
    for elem in elements {
        match elem {
            OpElem::Operand(operand) => list.push(Elem::Operand(infer_expr_type(operand, scope, interner, locals)?)),
            OpElem::Operator(token) => list.push(Elem::Operator(token.clone())),
        }
    }

    loop {
        let op_positions: Vec<usize> = list.iter().enumerate().filter_map(|(i, e)| if matches!(e, Elem::Operator(_)) { Some(i) } else { None }).collect();
        let Some(&first) = op_positions.first() else { break };

        let mut best_idx = first;
        let mut best_precedence = None;
        for &idx in &op_positions {
            let Elem::Operator(token) = &list[idx] else { unreachable!() };
            let token_name = interner.intern(token);
            let Some(Value::Operator(ops)) = scope.borrow().deep_get(token_name) else {
                return Err(Diagnostic::new(ErrorCode::E1001UndefinedReference, format!("undefined operator `{token}`"), span).with_token(token.clone()));
            };
            let precedence = ops.borrow().iter().map(|o| o.precedence).max().unwrap_or(0);
            if best_precedence.map(|p| precedence > p).unwrap_or(true) {
                best_precedence = Some(precedence);
                best_idx = idx;
            }
        }

        let Elem::Operator(token) = &list[best_idx] else { unreachable!() };
        let token_name = interner.intern(token);
        let Some(Value::Operator(ops)) = scope.borrow().deep_get(token_name) else {
            return Err(Diagnostic::new(ErrorCode::E1001UndefinedReference, format!("undefined operator `{token}`"), span));
        };

        let is_prefix = best_idx == 0 || matches!(list.get(best_idx - 1), Some(Elem::Operator(_)));
        let (splice_start, splice_end, arg_types) = if is_prefix {
            let Some(Elem::Operand(t)) = list.get(best_idx + 1) else {
                return Err(Diagnostic::new(ErrorCode::E3002NoMatchingOperator, format!("prefix operator `{token}` missing operand"), span));
            };
            (best_idx, best_idx + 1, vec![t.clone()])
        } else {
            let (Some(Elem::Operand(lt)), Some(Elem::Operand(rt))) = (list.get(best_idx - 1), list.get(best_idx + 1)) else {
                return Err(Diagnostic::new(ErrorCode::E3002NoMatchingOperator, format!("operator `{token}` missing operand"), span));
            };
            (best_idx - 1, best_idx + 1, vec![lt.clone(), rt.clone()])
        };

        let op_matched = crate::microstatement::find_applicable_operator(&ops.borrow(), is_prefix, &arg_types, scope).ok_or_else(|| {
            Diagnostic::new(ErrorCode::E3002NoMatchingOperator, format!("no overload of operator `{token}` matches operand types"), span).with_token(token.clone())
        })?;
        let candidate = UserFunction::dispatch_fn(&op_matched.overloads.borrow(), &arg_types, scope)
            .ok_or_else(|| Diagnostic::new(ErrorCode::E3002NoMatchingOperator, format!("no overload of operator `{token}` matches operand types"), span))?;

        let result_ty = candidate.return_type().clone();
        list.splice(splice_start..=splice_end, std::iter::once(Elem::Operand(result_ty)));
    }

    match list.into_iter().next() {
        Some(Elem::Operand(ty)) => Ok(ty),
        _ => Err(Diagnostic::new(ErrorCode::E3002NoMatchingOperator, "operator expression did not resolve to a value", span)),
    }
}

/// spec.md §4.5 `maybeTransform`: conditional lowering.
///
/// 1. Each `if (cond) block1 [else block2]` rewrites to
///    `const _c: bool = <cond>; cond(_c, fn { block1 }); [cond(!_c, fn { block2 })]`.
///    Nested `else if` chains recursively expand into nested `cond`s.
/// 2. Every assignment/let-decl is wrapped so its value goes through
///    `assign(e)`.
/// 3. If any conditional branch ends in a return, synthetic `retVal` /
///    `retNotSet` bindings are installed and every following statement is
///    re-emitted inside `cond(retNotSet, fn { ... })`.
pub fn maybe_transform(body: Vec<Stmt>, return_type: &Type, interner: &StringInterner) -> Vec<Stmt> {
    let _ = return_type;
    if !body.iter().any(Stmt::is_conditional) {
        return wrap_assignments(body);
    }

    let synth = SynthNamer::new();
    let ret_bindings = if contains_conditional_return(&body) {
        Some((
            interner.intern(&format!("retVal{}", synth.next_suffix())),
            interner.intern(&format!("retNotSet{}", synth.next_suffix())),
        ))
    } else {
        None
    };

    let mut result = Vec::new();
    if let Some((ret_val, ret_not_set)) = ret_bindings {
        result.push(Stmt::new(StmtKind::LetDecl { name: ret_val, ty: None, value: None }, Span::DUMMY));
        result.push(Stmt::new(
            StmtKind::LetDecl {
                name: ret_not_set,
                ty: Some(TypeAnnotation::Named { name: interner.intern("bool"), generics: Vec::new() }),
                value: Some(bool_literal(true)),
            },
            Span::DUMMY,
        ));
    }

    let mut pending: Vec<Stmt> = Vec::new();
    for stmt in body {
        if stmt.is_conditional() {
            if let Some((_, ret_not_set)) = ret_bindings {
                if !pending.is_empty() {
                    result.push(cond_call(path_expr(ret_not_set), std::mem::take(&mut pending), Span::DUMMY));
                }
            }
            result.extend(expand_if(stmt, ret_bindings, &synth, interner));
        } else {
            pending.push(stmt);
        }
    }
    if !pending.is_empty() {
        match ret_bindings {
            Some((_, ret_not_set)) => result.push(cond_call(path_expr(ret_not_set), pending, Span::DUMMY)),
            None => result.extend(pending),
        }
    }
    if let Some((ret_val, _)) = ret_bindings {
        result.push(Stmt::new(StmtKind::Return(Some(path_expr(ret_val))), Span::DUMMY));
    }

    wrap_assignments(result)
}

fn contains_conditional_return(body: &[Stmt]) -> bool {
    body.iter().any(|s| matches!(&s.kind, StmtKind::If { .. }) && block_has_return(std::slice::from_ref(s)))
}

fn block_has_return(body: &[Stmt]) -> bool {
    body.iter().any(|s| match &s.kind {
        StmtKind::Return(_) => true,
        StmtKind::If { then_body, else_body, .. } => {
            block_has_return(then_body) || else_body.as_ref().is_some_and(|b| block_has_return(b))
        }
        _ => false,
    })
}

/// Expands one surface `if` into its `const _c: bool = ...; cond(_c, fn {
/// ... }); [cond(!_c, fn { ... })]` sequence (spec.md §4.5 step 1),
/// recursively expanding any nested `if` (including an `else if` chain
/// represented as a single-statement `else_body`) before splicing its body
/// into the enclosing closure.
fn expand_if(stmt: Stmt, ret_bindings: Option<(Name, Name)>, synth: &SynthNamer, interner: &StringInterner) -> Vec<Stmt> {
    let span = stmt.span;
    let StmtKind::If { cond, then_body, else_body } = stmt.kind else { return vec![stmt] };

    let guard = interner.intern(&format!("_c{}", synth.next_suffix()));
    let mut out = vec![Stmt::new(
        StmtKind::ConstDecl { name: guard, ty: Some(bool_annotation(interner)), value: cond },
        span,
    )];

    out.push(cond_call(path_expr(guard), rewrite_block(then_body, ret_bindings, synth, interner), span));
    if let Some(else_body) = else_body {
        out.push(cond_call(
            not_expr(path_expr(guard), span),
            rewrite_block(else_body, ret_bindings, synth, interner),
            span,
        ));
    }
    out
}

/// Rewrites one conditional body: nested `if`s recursively expand, and any
/// `return` becomes the `retVal`/`retNotSet` writeback pair (spec.md §4.5
/// step 3) when `ret_bindings` is set.
fn rewrite_block(body: Vec<Stmt>, ret_bindings: Option<(Name, Name)>, synth: &SynthNamer, interner: &StringInterner) -> Vec<Stmt> {
    let mut out = Vec::new();
    for stmt in body {
        match &stmt.kind {
            StmtKind::If { .. } => out.extend(expand_if(stmt, ret_bindings, synth, interner)),
            StmtKind::Return(value) => match ret_bindings {
                Some((ret_val, ret_not_set)) => {
                    let span = stmt.span;
                    let value = value.clone().unwrap_or_else(|| bool_literal(false));
                    out.push(Stmt::new(StmtKind::Assign { path: vec![ret_val], value }, span));
                    out.push(Stmt::new(StmtKind::Assign { path: vec![ret_not_set], value: bool_literal(false) }, span));
                }
                None => out.push(stmt),
            },
            _ => out.push(stmt),
        }
    }
    out
}

fn cond_call(guard_expr: amm_ir::ast::Expr, body: Vec<Stmt>, span: Span) -> Stmt {
    Stmt::new(
        StmtKind::ExprStmt(amm_ir::ast::Expr::new(
            amm_ir::ast::ExprKind::Call(
                vec![cond_name()],
                vec![guard_expr, amm_ir::ast::Expr::new(amm_ir::ast::ExprKind::Closure(Vec::new(), None, body), span)],
            ),
            span,
        )),
        span,
    )
}

fn not_expr(inner: amm_ir::ast::Expr, span: Span) -> amm_ir::ast::Expr {
    use amm_ir::ast::OpElem;
    amm_ir::ast::Expr::new(
        amm_ir::ast::ExprKind::OperatorExpr(vec![OpElem::Operator("!".to_string()), OpElem::Operand(inner)]),
        span,
    )
}

fn wrap_assignments(body: Vec<Stmt>) -> Vec<Stmt> {
    body.into_iter()
        .map(|stmt| {
            let span = stmt.span;
            match stmt.kind {
                StmtKind::Assign { path, value } => {
                    Stmt::new(StmtKind::Assign { path, value: wrap_in_assign(value) }, span)
                }
                StmtKind::LetDecl { name, ty, value: Some(value) } => {
                    Stmt::new(StmtKind::LetDecl { name, ty, value: Some(wrap_in_assign(value)) }, span)
                }
                other => Stmt::new(other, span),
            }
        })
        .collect()
}

fn wrap_in_assign(value: amm_ir::ast::Expr) -> amm_ir::ast::Expr {
    let span = value.span;
    amm_ir::ast::Expr::new(amm_ir::ast::ExprKind::Call(vec![assign_name()], vec![value]), span)
}

thread_local! {
    static SYNTHETIC_NAME_INTERNER: StringInterner = StringInterner::new();
}

/// The `Name` every synthesized `assign(...)` call (`wrap_in_assign`) is
/// built against. Public so the opcode table a driver binary constructs can
/// bind `"assign"` under this exact `Name` rather than one from its own
/// `StringInterner` — the desugaring pass and the opcode scope must agree
/// on the identifier or `lower_call`'s scope lookup never finds it.
pub fn assign_name() -> Name {
    SYNTHETIC_NAME_INTERNER.with(|i| i.intern("assign"))
}

/// The `Name` every synthesized `cond(...)` call (`expand_if`) is built
/// against; see `assign_name` for why this needs to be public.
pub fn cond_name() -> Name {
    SYNTHETIC_NAME_INTERNER.with(|i| i.intern("cond"))
}

fn bool_annotation(interner: &StringInterner) -> TypeAnnotation {
    TypeAnnotation::Named { name: interner.intern("bool"), generics: Vec::new() }
}

fn bool_literal(value: bool) -> amm_ir::ast::Expr {
    amm_ir::ast::Expr::new(amm_ir::ast::ExprKind::Literal(amm_ir::ast::Literal::Bool(value)), Span::DUMMY)
}

fn path_expr(name: Name) -> amm_ir::ast::Expr {
    amm_ir::ast::Expr::new(amm_ir::ast::ExprKind::Path(vec![name]), Span::DUMMY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maybe_transform_is_noop_without_conditionals() {
        let interner = StringInterner::new();
        let x = interner.intern("x");
        let body = vec![Stmt::new(
            StmtKind::LetDecl { name: x, ty: None, value: Some(bool_literal(true)) },
            Span::DUMMY,
        )];
        let out = maybe_transform(body, &amm_types::new_builtin("void"), &interner);
        assert_eq!(out.len(), 1);
        match &out[0].kind {
            StmtKind::LetDecl { value: Some(v), .. } => {
                assert!(matches!(v.kind, amm_ir::ast::ExprKind::Call(..)));
            }
            _ => panic!("expected let decl"),
        }
    }

    #[test]
    fn maybe_transform_installs_ret_val_for_conditional_return() {
        let interner = StringInterner::new();
        let cond_expr = bool_literal(true);
        let body = vec![
            Stmt::new(
                StmtKind::If {
                    cond: cond_expr,
                    then_body: vec![Stmt::new(StmtKind::Return(Some(bool_literal(true))), Span::DUMMY)],
                    else_body: None,
                },
                Span::DUMMY,
            ),
            Stmt::new(StmtKind::Return(Some(bool_literal(false))), Span::DUMMY),
        ];
        let out = maybe_transform(body, &amm_types::new_builtin("bool"), &interner);
        // retVal let, retNotSet let, rewritten if, cond(retNotSet, ...), return retVal
        assert!(out.len() >= 4);
        assert!(matches!(out[0].kind, StmtKind::LetDecl { .. }));
        assert!(matches!(out[1].kind, StmtKind::LetDecl { .. }));
        assert!(matches!(out.last().unwrap().kind, StmtKind::Return(Some(_))));
    }
}
