//! Expression/statement lowering entry points (spec.md §4.6): every
//! composite AST form flattened into a linear `Vec<Microstatement>`.

use amm_diagnostic::{Diagnostic, ErrorCode};
use amm_ir::ast::{Expr, ExprKind, Literal, OpElem, Stmt, StmtKind};
use amm_ir::{FnBinding, Microstatement, Name, Span, StatementType, StringInterner, SynthNamer};
use amm_types::{BuiltinTypes, Callable, Operator, Scope, ScopeRef, Type, Value};

use crate::event::EventTable;
use crate::user_function::UserFunction;
use std::rc::Rc;

/// Holds the cross-cutting context every lowering entry point needs
/// (the synthetic-name counter, the interner, and the built-in type
/// table) plus the microstatement stream currently being assembled.
///
/// One `Lowerer` is created per handler; `UserFunction::microstatement_inlining`
/// borrows it mutably to splice an inlined call's body into the same
/// stream, which is how full inlining of user function calls (spec.md §1
/// item 3) is achieved without a separate call-graph pass.
pub struct Lowerer<'a> {
    pub synth: &'a SynthNamer,
    pub interner: &'a StringInterner,
    pub builtins: &'a BuiltinTypes,
    pub events: &'a EventTable,
    pub stream: Vec<Microstatement>,
}

impl<'a> Lowerer<'a> {
    pub fn new(synth: &'a SynthNamer, interner: &'a StringInterner, builtins: &'a BuiltinTypes, events: &'a EventTable) -> Self {
        Lowerer { synth, interner, builtins, events, stream: Vec::new() }
    }

    fn fresh_name(&self) -> String {
        self.synth.next_name()
    }

    fn type_name(&self, ty: &Type) -> Name {
        self.interner.intern(&ty.typename)
    }

    fn push(&mut self, ms: Microstatement) -> String {
        let reference = ms.reference_name().to_string();
        self.stream.push(ms);
        reference
    }

    /// Emits a REREF exposing `source_ref` under `alias`, per spec.md §4.5's
    /// inlining protocol: "a REREF is emitted aliasing the caller's real
    /// argument name to the callee's parameter name." Returns the emitted
    /// microstatement (the caller keeps a copy to bind in the callee's
    /// closure scope).
    pub fn emit_reref(&mut self, alias: Name, output_type: Name, source_ref: String, span: Span) -> Microstatement {
        let mut ms = Microstatement::new(StatementType::Reref, self.fresh_name(), output_type, span);
        ms.alias = self.interner.resolve(alias);
        ms.input_names.push(source_ref);
        self.stream.push(ms.clone());
        ms
    }

    /// Looks up `path` in `scope` and returns the microstatement-stream
    /// reference it currently resolves to. `path` segments beyond the
    /// first walk through sub-scopes/instances, same as `Scope::deep_get_path`.
    fn resolve_value_ref(&mut self, scope: &ScopeRef, path: &[Name], span: Span) -> Result<(String, Type), Diagnostic> {
        match scope.borrow().deep_get_path(path) {
            Some(Value::Const(ms)) => {
                let ty = match scope.borrow().deep_get(ms.output_type) {
                    Some(Value::Type(ty)) => ty,
                    _ => self.builtins.by_name(&self.interner.resolve(ms.output_type)).unwrap_or_else(|| self.builtins.void.clone()),
                };
                Ok((ms.reference_name().to_string(), ty))
            }
            // A bare name resolving to a function set is a module-level
            // constant (spec.md §4.4 "Constants" models these as zero-arg
            // functions so they inline through the same path as calls):
            // dispatch with no arguments and inline its body.
            Some(Value::Function(overloads)) => {
                let name = path.last().copied().unwrap_or(Name::EMPTY);
                self.dispatch_and_emit_mixed(scope, name, &overloads.borrow(), Vec::new(), span)
            }
            _ => {
                let name = path.last().copied().unwrap_or(Name::EMPTY);
                Err(Diagnostic::new(
                    ErrorCode::E1001UndefinedReference,
                    format!("undefined reference `{}`", dotted(path, self.interner)),
                    span,
                )
                .with_token(self.interner.resolve(name)))
            }
        }
    }

    /// spec.md §4.6: lowers one statement, returning the stream reference of
    /// the value it produced (meaningful for `ExprStmt`/tail-call use by
    /// `microstatement_inlining`; ignored elsewhere).
    pub fn lower_stmt(&mut self, scope: &ScopeRef, stmt: &Stmt) -> Result<String, Diagnostic> {
        match &stmt.kind {
            StmtKind::ConstDecl { name, value, .. } => {
                let (value_ref, ty) = self.lower_expr(scope, value)?;
                let reference = self.bind_declaration(scope, *name, value_ref, ty, StatementType::ConstDec, stmt.span);
                Ok(reference)
            }
            StmtKind::LetDecl { name, ty, value } => {
                let (value_ref, resolved_ty) = match value {
                    Some(expr) => self.lower_expr(scope, expr)?,
                    None => self.lower_default_value(scope, ty.as_ref(), stmt.span)?,
                };
                let reference = self.bind_declaration(scope, *name, value_ref, resolved_ty, StatementType::LetDec, stmt.span);
                Ok(reference)
            }
            StmtKind::Assign { path, value } => {
                if path.len() == 1 {
                    self.lower_reassignment(scope, path[0], value, stmt.span)
                } else {
                    let (value_ref, ty) = self.lower_expr(scope, value)?;
                    let mut ms = Microstatement::new(StatementType::Assignment, self.fresh_name(), self.type_name(&ty), stmt.span);
                    ms.input_names.push(value_ref.clone());
                    if !scope.borrow_mut().deep_put_path(path, Value::Const(Box::new(ms))) {
                        return Err(Diagnostic::new(
                            ErrorCode::E1001UndefinedReference,
                            format!("undefined reference `{}`", dotted(path, self.interner)),
                            stmt.span,
                        ));
                    }
                    Ok(value_ref)
                }
            }
            StmtKind::Return(value) => match value {
                Some(expr) => {
                    let (value_ref, ty) = self.lower_expr(scope, expr)?;
                    let mut ms = Microstatement::new(StatementType::Exit, self.fresh_name(), self.type_name(&ty), stmt.span);
                    ms.input_names.push(value_ref);
                    Ok(self.push(ms))
                }
                None => {
                    let ms = Microstatement::new(StatementType::Exit, self.fresh_name(), Name::EMPTY, stmt.span);
                    Ok(self.push(ms))
                }
            },
            StmtKind::Emit { event, value } => {
                let mut ms = Microstatement::new(StatementType::Emit, self.interner.resolve(*event), Name::EMPTY, stmt.span);
                if let Some(expr) = value {
                    let (value_ref, ty) = self.lower_expr(scope, expr)?;
                    if let Some(known) = self.events.get(*event) {
                        if !ty.same_type(&known.carried_type) && !ty.castable(&known.carried_type) {
                            return Err(Diagnostic::new(
                                ErrorCode::E2002EmitTypeMismatch,
                                format!("`emit {}` expects `{}`, found `{}`", self.interner.resolve(*event), known.carried_type.typename, ty.typename),
                                stmt.span,
                            )
                            .with_token(self.interner.resolve(*event)));
                        }
                    }
                    ms.output_type = self.type_name(&ty);
                    ms.input_names.push(value_ref);
                }
                Ok(self.push(ms))
            }
            StmtKind::ExprStmt(expr) => {
                let (value_ref, _) = self.lower_expr(scope, expr)?;
                Ok(value_ref)
            }
            // `maybe_transform` eliminates every surface `If` before
            // lowering runs; one reaching here means the caller skipped
            // that pass, which is a programming error in this crate, not a
            // user-facing condition — fail loudly rather than silently
            // dropping the branch.
            StmtKind::If { .. } => Err(Diagnostic::new(
                ErrorCode::E6001MalformedDeclaration,
                "unexpanded conditional reached microstatement lowering",
                stmt.span,
            )),
        }
    }

    fn bind_declaration(
        &mut self,
        scope: &ScopeRef,
        name: Name,
        value_ref: String,
        ty: Type,
        statement_type: StatementType,
        span: Span,
    ) -> String {
        let mut ms = Microstatement::new(statement_type, self.fresh_name(), self.type_name(&ty), span);
        ms.alias = self.interner.resolve(name);
        ms.input_names.push(value_ref);
        let reference = self.push(ms.clone());
        scope.borrow_mut().put(name, Value::Const(Box::new(ms)));
        reference
    }

    /// spec.md §9 Open Question (b), resolved: built-in scalars get their
    /// natural zero value; `Array`/`Map` get an empty placeholder; any other
    /// non-built-in type with no initializer is a hard error.
    fn lower_default_value(&mut self, scope: &ScopeRef, ty: Option<&amm_ir::ast::TypeAnnotation>, span: Span) -> Result<(String, Type), Diagnostic> {
        let resolved = match ty {
            Some(ann) => crate::user_function::resolve_type_annotation(ann, scope, self.interner)?,
            None => {
                return Err(Diagnostic::new(
                    ErrorCode::E6002LetReassignNoValue,
                    "`let` declaration has neither a value nor a type annotation",
                    span,
                ))
            }
        };

        if resolved.same_type(&self.builtins.array) || resolved.original_type().is_some_and(|o| o.same_type(&self.builtins.array)) {
            let zero = self.lower_literal_value("0", &self.builtins.int64, span);
            let arr_ref = self.lower_new_array(&[], resolved.clone(), span)?;
            let _ = zero;
            return Ok((arr_ref, resolved));
        }
        if resolved.same_type(&self.builtins.map) || resolved.original_type().is_some_and(|o| o.same_type(&self.builtins.map)) {
            let mut ms = Microstatement::new(StatementType::Call, self.fresh_name(), self.type_name(&resolved), span);
            ms.fns.push(FnBinding { name: self.interner.intern("newmap"), overload_id: 0 });
            return Ok((self.push(ms), resolved));
        }
        if let Some(zero) = zero_literal_for(&resolved) {
            return Ok((self.lower_literal_value(&zero, &resolved, span), resolved));
        }
        Err(Diagnostic::new(
            ErrorCode::E6003NoDefaultValue,
            format!("type `{}` has no default value and no initializer was given", resolved.typename),
            span,
        ))
    }

    fn lower_literal_value(&mut self, literal: &str, ty: &Type, span: Span) -> String {
        let mut ms = Microstatement::new(StatementType::ConstDec, self.fresh_name(), self.type_name(ty), span);
        ms.input_names.push(literal.to_string());
        self.push(ms)
    }

    /// spec.md §4.6: only allowed if the target was declared with `let`;
    /// rewrites the tail microstatement's `outputName` to the original
    /// binding and flips its statementType to ASSIGNMENT.
    fn lower_reassignment(&mut self, scope: &ScopeRef, target: Name, value: &Expr, span: Span) -> Result<String, Diagnostic> {
        let existing = scope.borrow().deep_get(target);
        match existing {
            Some(Value::Const(prior)) if prior.statement_type == StatementType::ConstDec => {
                Err(Diagnostic::new(
                    ErrorCode::E4001AssignToConst,
                    format!("cannot assign to const `{}`", self.interner.resolve(target)),
                    span,
                )
                .with_token(self.interner.resolve(target)))
            }
            Some(Value::Const(prior)) if prior.statement_type == StatementType::Reref => Err(Diagnostic::new(
                ErrorCode::E4002RebindReref,
                format!("cannot rebind `{}`", self.interner.resolve(target)),
                span,
            )
            .with_token(self.interner.resolve(target))),
            Some(Value::Const(_)) => {
                let (value_ref, ty) = self.lower_expr(scope, value)?;
                let mut ms = Microstatement::new(StatementType::Assignment, self.interner.resolve(target), self.type_name(&ty), span);
                ms.input_names.push(value_ref);
                let reference = self.push(ms.clone());
                scope.borrow_mut().put(target, Value::Const(Box::new(ms)));
                Ok(reference)
            }
            _ => Err(Diagnostic::new(
                ErrorCode::E1001UndefinedReference,
                format!("undefined reference `{}`", self.interner.resolve(target)),
                span,
            )
            .with_token(self.interner.resolve(target))),
        }
    }

    /// spec.md §4.6: lowers an expression, returning its stream reference
    /// and resolved `Type`.
    pub fn lower_expr(&mut self, scope: &ScopeRef, expr: &Expr) -> Result<(String, Type), Diagnostic> {
        match &expr.kind {
            ExprKind::Literal(lit) => self.lower_literal(lit, expr.span),
            ExprKind::Path(path) => {
                let (reference, ty) = self.resolve_value_ref(scope, path, expr.span)?;
                Ok((reference, ty))
            }
            ExprKind::Index(base, index) => self.lower_index(scope, base, index, expr.span),
            ExprKind::Call(path, args) => self.lower_call(scope, path, args, expr.span),
            ExprKind::MethodCall(receiver, method, args) => self.lower_method_call(scope, receiver, *method, args, expr.span),
            ExprKind::ArrayLiteral(elements) => self.lower_array_literal(scope, elements, expr.span),
            ExprKind::ObjectLiteral(type_name, fields) => self.lower_object_literal(scope, *type_name, fields, expr.span),
            ExprKind::OperatorExpr(elements) => self.lower_operator_expr(scope, elements, expr.span),
            ExprKind::Typeof(inner) => self.lower_typeof(scope, inner, expr.span),
            ExprKind::Closure(params, ret, body) => self.lower_closure(scope, params, ret.as_ref(), body, expr.span),
        }
    }

    fn lower_literal(&mut self, lit: &Literal, span: Span) -> Result<(String, Type), Diagnostic> {
        let (text, ty) = match lit {
            Literal::Int(n) => (n.to_string(), self.builtins.int64.clone()),
            Literal::Float(f) => (f.to_string(), self.builtins.float64.clone()),
            Literal::Bool(b) => (b.to_string(), self.builtins.bool_.clone()),
            Literal::Str(s) => (s.clone(), self.builtins.string.clone()),
        };
        Ok((self.lower_literal_value(&text, &ty, span), ty))
    }

    /// spec.md §4.6 "Field access": a CONSTDEC for the numeric field index,
    /// then the opcode `copyfrom(base, index)` inlined; `outputType` is the
    /// resolved field's actual type.
    fn lower_index(&mut self, scope: &ScopeRef, base: &Expr, index: &Expr, span: Span) -> Result<(String, Type), Diagnostic> {
        let (base_ref, base_ty) = self.lower_expr(scope, base)?;
        let (index_ref, index_ty) = self.lower_expr(scope, index)?;
        if !index_ty.same_type(&self.builtins.int64) {
            return Err(Diagnostic::new(
                ErrorCode::E2003IndexNotInt64,
                format!("array index must be int64, found `{}`", index_ty.typename),
                index.span,
            ));
        }
        let element_ty = base_ty.property(self.interner.intern("value")).unwrap_or_else(|| self.builtins.void.clone());
        let mut ms = Microstatement::new(StatementType::Call, self.fresh_name(), self.type_name(&element_ty), span);
        ms.input_names.push(base_ref);
        ms.input_names.push(index_ref);
        ms.fns.push(FnBinding { name: self.interner.intern("copyfrom"), overload_id: 0 });
        Ok((self.push(ms), element_ty))
    }

    /// spec.md §4.6 "Array literal": each element lowered, then `newarr(len)`
    /// inlined, then one `pusharr(arr, elt, sz)` per element, closed by a
    /// REREF whose `outputType` is `Array<ElemType>`.
    fn lower_array_literal(&mut self, scope: &ScopeRef, elements: &[Expr], span: Span) -> Result<(String, Type), Diagnostic> {
        let mut element_refs = Vec::with_capacity(elements.len());
        let mut element_ty = self.builtins.void.clone();
        for (idx, element) in elements.iter().enumerate() {
            let (reference, ty) = self.lower_expr(scope, element)?;
            if idx == 0 {
                element_ty = ty.clone();
            }
            element_refs.push((reference, ty));
        }
        let array_ty = self.builtins.array.solidify(&[element_ty], scope, self.interner)?;
        let reference = self.lower_new_array(&element_refs, array_ty.clone(), span)?;
        Ok((reference, array_ty))
    }

    fn lower_new_array(&mut self, elements: &[(String, Type)], array_ty: Type, span: Span) -> Result<String, Diagnostic> {
        let len_ref = self.lower_literal_value(&elements.len().to_string(), &self.builtins.int64, span);
        let mut newarr = Microstatement::new(StatementType::Call, self.fresh_name(), self.type_name(&array_ty), span);
        newarr.input_names.push(len_ref);
        newarr.fns.push(FnBinding { name: self.interner.intern("newarr"), overload_id: 0 });
        let arr_ref = self.push(newarr);

        for (elt_ref, elt_ty) in elements {
            let size = element_size(elt_ty);
            let size_ref = self.lower_literal_value(&size.to_string(), &self.builtins.int64, span);
            let mut pusharr = Microstatement::new(StatementType::Call, self.fresh_name(), Name::EMPTY, span);
            pusharr.input_names.push(arr_ref.clone());
            pusharr.input_names.push(elt_ref.clone());
            pusharr.input_names.push(size_ref);
            pusharr.fns.push(FnBinding { name: self.interner.intern("pusharr"), overload_id: 0 });
            self.push(pusharr);
        }

        let mut close = Microstatement::new(StatementType::Reref, self.fresh_name(), self.type_name(&array_ty), span);
        close.input_names.push(arr_ref);
        Ok(self.push(close))
    }

    /// spec.md §4.6 "Object literal": the literal's field set must match the
    /// type's declared properties exactly; fields are then laid out in the
    /// type's declared order using the array-literal protocol.
    fn lower_object_literal(
        &mut self,
        scope: &ScopeRef,
        type_name: Name,
        fields: &[(Name, Expr)],
        span: Span,
    ) -> Result<(String, Type), Diagnostic> {
        let ty = match scope.borrow().deep_get(type_name) {
            Some(Value::Type(ty)) => ty,
            _ => {
                return Err(Diagnostic::new(
                    ErrorCode::E1001UndefinedReference,
                    format!("undefined type `{}`", self.interner.resolve(type_name)),
                    span,
                )
                .with_token(self.interner.resolve(type_name)))
            }
        };

        if fields.len() != ty.properties.len() || !ty.properties.keys().all(|k| fields.iter().any(|(n, _)| n == k)) {
            return Err(Diagnostic::new(
                ErrorCode::E2001ObjectFieldMismatch,
                format!("object literal field set doesn't match declared type `{}`", ty.typename),
                span,
            ));
        }

        let mut ordered = Vec::with_capacity(fields.len());
        for prop_name in ty.properties.keys() {
            let (_, expr) = fields.iter().find(|(n, _)| n == prop_name).ok_or_else(|| {
                Diagnostic::new(
                    ErrorCode::E2001ObjectFieldMismatch,
                    format!("internal error: field `{}` missing after field-set check passed", self.interner.resolve(*prop_name)),
                    span,
                )
            })?;
            ordered.push(self.lower_expr(scope, expr)?);
        }

        let reference = self.lower_new_array(&ordered, ty.clone(), span)?;
        Ok((reference, ty))
    }

    /// spec.md §4.6 "`typeof e`": lowers `e`, then emits a CONSTDEC of a
    /// string literal naming `e`'s type. Per spec.md §9 Open Question (a),
    /// resolved: always the solidified name.
    fn lower_typeof(&mut self, scope: &ScopeRef, inner: &Expr, span: Span) -> Result<(String, Type), Diagnostic> {
        let (_, ty) = self.lower_expr(scope, inner)?;
        Ok((self.lower_literal_value(&ty.typename, &self.builtins.string, span), self.builtins.string.clone()))
    }

    fn lower_closure(
        &mut self,
        scope: &ScopeRef,
        params: &[amm_ir::ast::Param],
        _ret: Option<&amm_ir::ast::TypeAnnotation>,
        body: &[Stmt],
        span: Span,
    ) -> Result<(String, Type), Diagnostic> {
        let closure_scope = Scope::new(Some(scope.clone()));
        for param in params {
            let arg_ty = param
                .ty
                .as_ref()
                .map(|ann| crate::user_function::resolve_type_annotation(ann, scope, self.interner))
                .transpose()?
                .unwrap_or_else(|| self.builtins.void.clone());
            let mut arg_ms = Microstatement::new(StatementType::Arg, self.interner.resolve(param.name), self.type_name(&arg_ty), span);
            arg_ms.alias = self.interner.resolve(param.name);
            closure_scope.borrow_mut().put(param.name, Value::Const(Box::new(arg_ms)));
        }

        let mut inner = Lowerer::new(self.synth, self.interner, self.builtins, self.events);
        let mut last_ref = String::new();
        for stmt in body {
            last_ref = inner.lower_stmt(&closure_scope, stmt)?;
        }
        let _ = last_ref;

        let mut closure_def = Microstatement::new(StatementType::ClosureDef, self.fresh_name(), self.builtins.function.typename_as_name(self.interner), span);
        closure_def.closure_statements = inner.stream;
        Ok((self.push(closure_def), self.builtins.function.clone()))
    }

    /// spec.md §4.6 "Chained / method-style calls": `a.b.c(d)` resolves the
    /// longest prefix of `a.b.c` that denotes a callable; otherwise the
    /// first n-1 segments resolve as a value and the last segment is the
    /// method name, becoming an implicit-first-argument call.
    fn lower_call(&mut self, scope: &ScopeRef, path: &[Name], args: &[Expr], span: Span) -> Result<(String, Type), Diagnostic> {
        if let Some(Value::Function(overloads)) = scope.borrow().deep_get_path(path) {
            return self.dispatch_and_emit(scope, path.last().copied().unwrap_or(Name::EMPTY), &overloads.borrow(), args, span);
        }
        let Some((last, prefix)) = path.split_last() else {
            return Err(Diagnostic::new(ErrorCode::E6001MalformedDeclaration, "empty call path", span));
        };
        if prefix.is_empty() {
            return Err(Diagnostic::new(
                ErrorCode::E1001UndefinedReference,
                format!("undefined function `{}`", self.interner.resolve(*last)),
                span,
            )
            .with_token(self.interner.resolve(*last)));
        }
        let (receiver_ref, receiver_ty) = self.resolve_value_ref(scope, prefix, span)?;
        self.lower_method_call_on(scope, receiver_ref, receiver_ty, *last, args, span)
    }

    fn lower_method_call(&mut self, scope: &ScopeRef, receiver: &Expr, method: Name, args: &[Expr], span: Span) -> Result<(String, Type), Diagnostic> {
        let (receiver_ref, receiver_ty) = self.lower_expr(scope, receiver)?;
        self.lower_method_call_on(scope, receiver_ref, receiver_ty, method, args, span)
    }

    fn lower_method_call_on(
        &mut self,
        scope: &ScopeRef,
        receiver_ref: String,
        receiver_ty: Type,
        method: Name,
        args: &[Expr],
        span: Span,
    ) -> Result<(String, Type), Diagnostic> {
        let Some(Value::Function(overloads)) = scope.borrow().deep_get(method) else {
            return Err(Diagnostic::new(
                ErrorCode::E1001UndefinedReference,
                format!("undefined function `{}`", self.interner.resolve(method)),
                span,
            )
            .with_token(self.interner.resolve(method)));
        };
        let mut full_args = Vec::with_capacity(args.len() + 1);
        full_args.push(ImplicitArg::Resolved(receiver_ref, receiver_ty));
        for arg in args {
            full_args.push(ImplicitArg::Expr(arg));
        }
        self.dispatch_and_emit_mixed(scope, method, &overloads.borrow(), full_args, span)
    }

    fn dispatch_and_emit(&mut self, scope: &ScopeRef, name: Name, overloads: &[Rc<dyn Callable>], args: &[Expr], span: Span) -> Result<(String, Type), Diagnostic> {
        let mixed = args.iter().map(ImplicitArg::Expr).collect();
        self.dispatch_and_emit_mixed(scope, name, overloads, mixed, span)
    }

    fn dispatch_and_emit_mixed(
        &mut self,
        scope: &ScopeRef,
        name: Name,
        overloads: &[Rc<dyn Callable>],
        args: Vec<ImplicitArg<'_>>,
        span: Span,
    ) -> Result<(String, Type), Diagnostic> {
        let mut arg_refs = Vec::with_capacity(args.len());
        let mut arg_types = Vec::with_capacity(args.len());
        for arg in args {
            let (reference, ty) = match arg {
                ImplicitArg::Resolved(reference, ty) => (reference, ty),
                ImplicitArg::Expr(expr) => self.lower_expr(scope, expr)?,
            };
            arg_refs.push(reference);
            arg_types.push(ty);
        }

        let candidate = UserFunction::dispatch_fn(overloads, &arg_types, scope).ok_or_else(|| {
            Diagnostic::new(
                ErrorCode::E3001NoMatchingFunction,
                format!("no overload of `{}` matches the supplied argument types", self.interner.resolve(name)),
                span,
            )
            .with_token(self.interner.resolve(name))
        })?;

        if let Some(user_fn) = candidate.as_any().downcast_ref::<UserFunction>() {
            let reference = user_fn.microstatement_inlining(self, &arg_refs, span)?;
            let ty = user_fn.return_type.clone();
            return Ok((reference, ty));
        }

        let ret_ty = candidate.return_type().clone();
        let mut ms = Microstatement::new(StatementType::Call, self.fresh_name(), self.type_name(&ret_ty), span);
        ms.input_names = arg_refs;
        ms.fns.push(FnBinding { name, overload_id: 0 });
        Ok((self.push(ms), ret_ty))
    }

    /// spec.md §4.6 "Operator expression": operands/operators gathered into
    /// a linear list; repeatedly locate the highest-precedence operator,
    /// dispatch its applicable overload, inline it, and splice out its
    /// neighbours. An unresolvable list is a hard error.
    fn lower_operator_expr(&mut self, scope: &ScopeRef, elements: &[OpElem], span: Span) -> Result<(String, Type), Diagnostic> {
        enum Elem {
            Operand(String, Type),
            Operator(String),
        }
        let mut list = Vec::with_capacity(elements.len());
        for elem in elements {
            match elem {
                OpElem::Operand(expr) => {
                    let (reference, ty) = self.lower_expr(scope, expr)?;
                    list.push(Elem::Operand(reference, ty));
                }
                OpElem::Operator(token) => list.push(Elem::Operator(token.clone())),
            }
        }

        loop {
            let op_positions: Vec<usize> = list
                .iter()
                .enumerate()
                .filter_map(|(i, e)| if matches!(e, Elem::Operator(_)) { Some(i) } else { None })
                .collect();
            if op_positions.is_empty() {
                break;
            }

            let mut best_idx = op_positions[0];
            let mut best_precedence = None;
            for &idx in &op_positions {
                let Elem::Operator(token) = &list[idx] else { unreachable!() };
                let token_name = self.interner.intern(token);
                let Some(Value::Operator(ops)) = scope.borrow().deep_get(token_name) else {
                    return Err(Diagnostic::new(
                        ErrorCode::E1001UndefinedReference,
                        format!("undefined operator `{token}`"),
                        span,
                    )
                    .with_token(token.clone()));
                };
                let precedence = ops.borrow().iter().map(|o| o.precedence).max().unwrap_or(0);
                if best_precedence.map(|p| precedence > p).unwrap_or(true) {
                    best_precedence = Some(precedence);
                    best_idx = idx;
                }
            }

            let Elem::Operator(token) = &list[best_idx] else { unreachable!() };
            let token_name = self.interner.intern(token);
            let Some(Value::Operator(ops)) = scope.borrow().deep_get(token_name) else {
                return Err(Diagnostic::new(ErrorCode::E1001UndefinedReference, format!("undefined operator `{token}`"), span));
            };

            let is_prefix = best_idx == 0 || matches!(list.get(best_idx - 1), Some(Elem::Operator(_)));
            let (splice_start, splice_end, operand_refs_types): (usize, usize, Vec<(String, Type)>) = if is_prefix {
                let Some(Elem::Operand(r, t)) = list.get(best_idx + 1) else {
                    return Err(Diagnostic::new(ErrorCode::E3002NoMatchingOperator, format!("prefix operator `{token}` missing operand"), span));
                };
                (best_idx, best_idx + 1, vec![(r.clone(), t.clone())])
            } else {
                let (Some(Elem::Operand(lr, lt)), Some(Elem::Operand(rr, rt))) = (list.get(best_idx - 1), list.get(best_idx + 1)) else {
                    return Err(Diagnostic::new(ErrorCode::E3002NoMatchingOperator, format!("operator `{token}` missing operand"), span));
                };
                (best_idx - 1, best_idx + 1, vec![(lr.clone(), lt.clone()), (rr.clone(), rt.clone())])
            };

            let arg_types: Vec<Type> = operand_refs_types.iter().map(|(_, t)| t.clone()).collect();
            let op_matched = find_applicable_operator(&ops.borrow(), is_prefix, &arg_types, scope);
            let operator = op_matched.ok_or_else(|| {
                Diagnostic::new(ErrorCode::E3002NoMatchingOperator, format!("no overload of operator `{token}` matches operand types"), span)
                    .with_token(token.clone())
            })?;

            let arg_refs: Vec<String> = operand_refs_types.iter().map(|(r, _)| r.clone()).collect();
            let candidate = UserFunction::dispatch_fn(&operator.overloads.borrow(), &arg_types, scope).ok_or_else(|| {
                Diagnostic::new(ErrorCode::E3002NoMatchingOperator, format!("no overload of operator `{token}` matches operand types"), span)
            })?;

            let (result_ref, result_ty) = if let Some(user_fn) = candidate.as_any().downcast_ref::<UserFunction>() {
                let reference = user_fn.microstatement_inlining(self, &arg_refs, span)?;
                (reference, user_fn.return_type.clone())
            } else {
                let ret_ty = candidate.return_type().clone();
                let mut ms = Microstatement::new(StatementType::Call, self.fresh_name(), self.type_name(&ret_ty), span);
                ms.input_names = arg_refs;
                ms.fns.push(FnBinding { name: token_name, overload_id: 0 });
                (self.push(ms), ret_ty)
            };

            list.splice(splice_start..=splice_end, std::iter::once(Elem::Operand(result_ref, result_ty)));
        }

        match list.into_iter().next() {
            Some(Elem::Operand(reference, ty)) => Ok((reference, ty)),
            _ => Err(Diagnostic::new(ErrorCode::E3002NoMatchingOperator, "operator expression did not resolve to a value", span)),
        }
    }
}

enum ImplicitArg<'a> {
    Resolved(String, Type),
    Expr(&'a Expr),
}

trait TypeNameAccess {
    fn typename_as_name(&self, interner: &StringInterner) -> Name;
}

impl TypeNameAccess for Type {
    fn typename_as_name(&self, interner: &StringInterner) -> Name {
        interner.intern(&self.typename)
    }
}

fn dotted(path: &[Name], interner: &StringInterner) -> String {
    path.iter().map(|n| interner.resolve(*n)).collect::<Vec<_>>().join(".")
}

/// `sz` for `pusharr`: 8 for built-in non-string scalars, else 0 (spec.md
/// §4.6 "Array literal").
fn element_size(ty: &Type) -> u32 {
    if ty.built_in && ty.typename != "string" {
        8
    } else {
        0
    }
}

fn zero_literal_for(ty: &Type) -> Option<String> {
    Some(match ty.typename.as_str() {
        "int8" | "int16" | "int32" | "int64" => "0".to_string(),
        "float32" | "float64" => "0.0".to_string(),
        "bool" => "false".to_string(),
        "string" => String::new(),
        _ => return None,
    })
}

/// The "extended with intermediate attempts to find prefix operators"
/// matching spec.md §4.6 asks for: first try the operator entries whose
/// `is_prefix` flag matches exactly, then fall back to any entry under the
/// same token if none of the exact-arity ones work.
/// `pub(crate)` so `user_function::infer_return_type` can resolve an
/// operator expression's result type with the exact same candidate-picking
/// rule this lowers calls with, rather than a second, divergent copy of it.
pub(crate) fn find_applicable_operator(ops: &[Operator], is_prefix: bool, arg_types: &[Type], scope: &ScopeRef) -> Option<Operator> {
    ops.iter()
        .find(|op| op.is_prefix == is_prefix && UserFunction::dispatch_fn(&op.overloads.borrow(), arg_types, scope).is_some())
        .or_else(|| ops.iter().find(|op| UserFunction::dispatch_fn(&op.overloads.borrow(), arg_types, scope).is_some()))
        .cloned()
}
