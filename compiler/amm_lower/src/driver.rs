//! The driver: ties the standard-library loader, module population, and
//! the hoist/finalDedupe passes together into one compilation run
//! producing AMM text (spec.md §4.7, §6).

use std::fmt::Write as _;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::{debug, info, instrument};

use amm_diagnostic::Diagnostic;
use amm_ir::ast::Module;
use amm_ir::{Microstatement, Name, Span, StatementType, StringInterner, SynthNamer};
use amm_types::{BuiltinTypes, Callable, Scope, ScopeRef, Type, Value};

use crate::event::{Event, EventTable};
use crate::microstatement::Lowerer;
use crate::module::{populate_module, LoweredModule};
use crate::stdlib;
use crate::user_function::UserFunction;

/// Owns everything one compilation run needs (spec.md §5: "the
/// process-wide `Event.allEvents` list and the `modules` map are mutable
/// singletons whose lifecycle is the driver run"): the opcode scope every
/// module's root points at, the interner and synthetic-name counter every
/// lowering call shares, the built-in type table, and the event table
/// every handler binds into.
pub struct DriverContext {
    pub interner: StringInterner,
    pub synth: SynthNamer,
    pub builtins: BuiltinTypes,
    pub events: EventTable,
    pub opcode_scope: ScopeRef,
    modules: FxHashMap<String, LoweredModule>,
}

impl DriverContext {
    /// `interner` must be the same `StringInterner` instance used to build
    /// `opcode_scope` and every AST this run will populate — a `Name` is
    /// only meaningful against the interner that produced it (spec.md §9:
    /// no global mutable state means no implicit shared interner to fall
    /// back on), so the caller owns getting this right.
    pub fn new(interner: StringInterner, opcode_scope: ScopeRef) -> Self {
        let builtins = BuiltinTypes::new(&interner);
        DriverContext {
            interner,
            synth: SynthNamer::new(),
            builtins,
            events: EventTable::new(),
            opcode_scope,
            modules: FxHashMap::default(),
        }
    }

    /// Registers a built-in event (`start`, `__conn`, ...) before any
    /// module is populated, so user handlers can bind to it.
    pub fn register_builtin_event(&self, name: &str, carried: Type) {
        let name = self.interner.intern(name);
        self.events.register(Event::new(name, carried, true), &self.interner, &self.synth);
    }

    pub fn modules(&self) -> &FxHashMap<String, LoweredModule> {
        &self.modules
    }

    /// Populates one module and records it under `path` for later imports
    /// to resolve against.
    pub fn populate(&mut self, path: &str, ast: &Module, is_std: bool) -> Result<(), Diagnostic> {
        let lowered = populate_module(ast, &self.opcode_scope, &self.modules, &self.events, &self.builtins, &self.interner, &self.synth, is_std)?;
        self.modules.insert(path.to_string(), lowered);
        Ok(())
    }

    /// Loads the standard library (spec.md §6: `<root>` first, then the
    /// transitive closure of `@std/...` imports `root_ast` requires),
    /// populates `root_path`, and renders the resulting AMM text.
    #[instrument(skip_all, fields(root = root_path))]
    pub fn run(&mut self, root_path: &str, root_ast: &Module, std_modules: &FxHashMap<String, Module>) -> Result<String, Diagnostic> {
        stdlib::load_stdlib(self, std_modules)?;
        stdlib::load_required(self, root_ast, std_modules)?;
        info!(modules = self.modules.len(), "standard library loaded");

        self.populate(root_path, root_ast, false)?;
        self.render()
    }

    /// Lowers every user-visible event's handlers, runs the hoist and
    /// `finalDedupe` passes, and renders the result as AMM text (spec.md
    /// §4.7, §6).
    fn render(&mut self) -> Result<String, Diagnostic> {
        let mut handler_streams: Vec<(Event, Rc<dyn Callable>, Vec<Microstatement>)> = Vec::new();
        for event in self.events.user_visible() {
            for handler in event.handlers.clone() {
                let stream = self.lower_handler(&handler)?;
                handler_streams.push((event.clone(), handler, stream));
            }
        }
        debug!(handlers = handler_streams.len(), "handlers lowered");

        let (constants, renames) = hoist_constants(handler_streams.iter_mut().map(|(_, _, s)| s));
        for (_, _, stream) in &mut handler_streams {
            final_dedupe(stream, &renames);
        }

        Ok(render_amm(&constants, &self.events.user_visible(), &handler_streams, &self.interner))
    }

    /// Lowers one handler's body to a flat microstatement list: an ENTERFN
    /// marker, one ARG per declared parameter, then every body statement
    /// in sequence.
    fn lower_handler(&self, handler: &Rc<dyn Callable>) -> Result<Vec<Microstatement>, Diagnostic> {
        let Some(user_fn) = handler.as_any().downcast_ref::<UserFunction>() else {
            return Ok(Vec::new());
        };
        let mut lowerer = Lowerer::new(&self.synth, &self.interner, &self.builtins, &self.events);
        let handler_scope = Scope::new(Some(user_fn.closure_scope.clone()));

        let mut enter = Microstatement::new(StatementType::EnterFn, self.synth.next_name(), Name::EMPTY, Span::DUMMY);
        enter.fns.push(amm_ir::FnBinding { name: handler.name(), overload_id: 0 });
        lowerer.stream.push(enter);

        for (param_name, param_ty) in &user_fn.args {
            let type_name = self.interner.intern(&param_ty.typename);
            let mut arg_ms = Microstatement::new(StatementType::Arg, self.interner.resolve(*param_name), type_name, Span::DUMMY);
            arg_ms.alias = self.interner.resolve(*param_name);
            handler_scope.borrow_mut().put(*param_name, Value::Const(Box::new(arg_ms.clone())));
            lowerer.stream.push(arg_ms);
        }

        for stmt in &user_fn.body {
            lowerer.lower_stmt(&handler_scope, stmt)?;
        }

        Ok(lowerer.stream)
    }
}

/// spec.md §4.7 hoist pass: walks every handler's microstatement list
/// (recursing into CLOSURE/CLOSUREDEF bodies), pulling every literal
/// CONSTDEC (empty `fns`) out to a single global instance keyed by its
/// literal token, and recording a rename for every duplicate removed.
fn hoist_constants<'a>(streams: impl Iterator<Item = &'a mut Vec<Microstatement>>) -> (Vec<Microstatement>, FxHashMap<String, String>) {
    let mut seen: FxHashMap<String, String> = FxHashMap::default();
    let mut constants = Vec::new();
    let mut renames: FxHashMap<String, String> = FxHashMap::default();
    for stream in streams {
        hoist_stream(stream, &mut seen, &mut constants, &mut renames);
    }
    (constants, renames)
}

fn hoist_stream(stream: &mut Vec<Microstatement>, seen: &mut FxHashMap<String, String>, constants: &mut Vec<Microstatement>, renames: &mut FxHashMap<String, String>) {
    let mut idx = 0;
    while idx < stream.len() {
        if matches!(stream[idx].statement_type, StatementType::Closure | StatementType::ClosureDef) {
            let mut inner = std::mem::take(&mut stream[idx].closure_statements);
            hoist_stream(&mut inner, seen, constants, renames);
            stream[idx].closure_statements = inner;
            idx += 1;
            continue;
        }

        let is_literal_constdec = stream[idx].statement_type == StatementType::ConstDec && stream[idx].fns.is_empty() && !stream[idx].input_names.is_empty();
        if !is_literal_constdec {
            idx += 1;
            continue;
        }

        let token = stream[idx].input_names[0].clone();
        match seen.get(&token) {
            Some(surviving) => {
                let removed = stream.remove(idx).output_name;
                renames.insert(removed, surviving.clone());
            }
            None => {
                let removed = stream.remove(idx);
                seen.insert(token, removed.output_name.clone());
                constants.push(removed);
            }
        }
    }
}

/// spec.md §4.7 `finalDedupe`: rewrite every surviving microstatement's
/// `inputNames` through the hoist pass's rename table, skipping LETDEC and
/// CLOSURE/CLOSUREDEF (their own bindings are never collapsed into a
/// hoisted constant).
fn final_dedupe(stream: &mut [Microstatement], renames: &FxHashMap<String, String>) {
    for ms in stream.iter_mut() {
        let skip = matches!(ms.statement_type, StatementType::LetDec | StatementType::Closure | StatementType::ClosureDef);
        if !skip {
            for input in ms.input_names.iter_mut() {
                if let Some(surviving) = renames.get(input) {
                    *input = surviving.clone();
                }
            }
        }
        if !ms.closure_statements.is_empty() {
            final_dedupe(&mut ms.closure_statements, renames);
        }
    }
}

fn render_value(ms: &Microstatement, interner: &StringInterner) -> Option<String> {
    if let Some(lit) = ms.literal_value() {
        return Some(lit.to_string());
    }
    render_call(ms, interner)
}

fn render_call(ms: &Microstatement, interner: &StringInterner) -> Option<String> {
    let binding = ms.fns.first()?;
    Some(format!("{}({})", interner.resolve(binding.name), ms.input_names.join(", ")))
}

/// Renders one microstatement's AMM text, per the statementType (spec.md
/// §6: CONSTDEC, LETDEC, ASSIGNMENT, CALL, EMIT, CLOSURE); `None` for the
/// elided kinds (`StatementType::renders_empty`).
fn render_microstatement_line(ms: &Microstatement, interner: &StringInterner) -> Option<String> {
    if ms.statement_type.renders_empty() {
        return None;
    }
    let type_name = interner.resolve(ms.output_type);
    Some(match ms.statement_type {
        StatementType::ConstDec => match render_value(ms, interner) {
            Some(value) => format!("const {}: {} = {}", ms.output_name, type_name, value),
            None => format!("const {}: {}", ms.output_name, type_name),
        },
        StatementType::LetDec => match render_value(ms, interner) {
            Some(value) => format!("let {}: {} = {}", ms.output_name, type_name, value),
            None => format!("let {}: {}", ms.output_name, type_name),
        },
        StatementType::Assignment => format!("{} = {}", ms.output_name, render_value(ms, interner).unwrap_or_default()),
        StatementType::Call => format!("{}: {} = {}", ms.output_name, type_name, render_call(ms, interner).unwrap_or_default()),
        StatementType::Emit => match ms.input_names.first() {
            Some(value) => format!("emit {}({})", ms.output_name, value),
            None => format!("emit {}", ms.output_name),
        },
        StatementType::Exit => match ms.input_names.first() {
            Some(value) => format!("return {}", value),
            None => "return".to_string(),
        },
        StatementType::Closure | StatementType::ClosureDef => {
            let mut block = format!("{}: {} = fn () {{\n", ms.output_name, type_name);
            for inner in &ms.closure_statements {
                if let Some(line) = render_microstatement_line(inner, interner) {
                    let _ = writeln!(block, "    {}", line);
                }
            }
            block.push('}');
            block
        }
        StatementType::Reref | StatementType::Arg | StatementType::EnterFn | StatementType::EnterCondFn | StatementType::Tail => unreachable!("elided by renders_empty"),
    })
}

fn render_amm(
    constants: &[Microstatement],
    events: &[Event],
    handler_streams: &[(Event, Rc<dyn Callable>, Vec<Microstatement>)],
    interner: &StringInterner,
) -> String {
    let mut out = String::new();

    for constant in constants {
        if let Some(line) = render_microstatement_line(constant, interner) {
            let _ = writeln!(out, "{}", line);
        }
    }

    for event in events {
        let _ = writeln!(out, "event {}: {}", interner.resolve(event.name), event.carried_type.typename);
    }

    for (event, handler, stream) in handler_streams {
        let Some(user_fn) = handler.as_any().downcast_ref::<UserFunction>() else { continue };
        let args = user_fn
            .args
            .iter()
            .map(|(name, ty)| format!("{}: {}", interner.resolve(*name), ty.typename))
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(out, "on {} fn ({}): {} {{", interner.resolve(event.name), args, user_fn.return_type.typename);
        for ms in stream {
            if let Some(line) = render_microstatement_line(ms, interner) {
                let _ = writeln!(out, "  {}", line);
            }
        }
        let _ = writeln!(out, "}}");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use amm_ir::ast::{Expr, ExprKind, FunctionDecl, HandlerDecl, Literal, Param, Stmt, StmtKind, TypeAnnotation};

    fn opcode_scope(interner: &StringInterner) -> ScopeRef {
        let scope = Scope::new(None);
        for name in crate::opcode::builtin_opcode_names() {
            let n = interner.intern(name);
            scope.borrow_mut().put(
                n,
                Value::Function(std::rc::Rc::new(std::cell::RefCell::new(vec![
                    std::rc::Rc::new(crate::opcode::NativeFunction::new(n, Vec::new(), amm_types::new_builtin("void"), false)) as Rc<dyn Callable>,
                ]))),
            );
        }
        scope
    }

    fn int_literal(n: i64) -> Expr {
        Expr::new(ExprKind::Literal(Literal::Int(n)), Span::DUMMY)
    }

    #[test]
    fn duplicate_literal_constants_hoist_to_one() {
        let interner = StringInterner::new();
        let scope = opcode_scope(&interner);
        let mut driver = DriverContext::new(interner, scope);
        driver.register_builtin_event("start", amm_types::new_builtin("void"));

        let tick = driver.interner.intern("tick");
        driver.events.register(Event::new(tick, amm_types::new_builtin("void"), false), &driver.interner, &driver.synth);

        let mut ast = Module::default();
        let int64 = driver.interner.intern("int64");
        let make_handler = || HandlerDecl {
            event: tick,
            handler: FunctionDecl {
                name: None,
                args: Vec::new(),
                return_type: None,
                body: vec![
                    Stmt::new(StmtKind::ConstDecl { name: driver.interner.intern("x"), ty: Some(TypeAnnotation::Named { name: int64, generics: Vec::new() }), value: int_literal(3) }, Span::DUMMY),
                    Stmt::new(StmtKind::Return(None), Span::DUMMY),
                ],
                pure: true,
                span: Span::DUMMY,
            },
            span: Span::DUMMY,
        };
        ast.handlers.push(make_handler());
        ast.handlers.push(make_handler());

        let std_modules = FxHashMap::default();
        let amm = driver.run("root.ln", &ast, &std_modules).expect("driver run succeeds");
        assert_eq!(amm.matches("const _").count(), 1, "expected exactly one hoisted constant:\n{amm}");
    }

    #[test]
    fn handler_body_renders_and_elides_empty_kinds() {
        let interner = StringInterner::new();
        let scope = opcode_scope(&interner);
        let mut driver = DriverContext::new(interner, scope);
        let tick = driver.interner.intern("tick");
        driver.events.register(Event::new(tick, amm_types::new_builtin("int64"), false), &driver.interner, &driver.synth);

        let mut ast = Module::default();
        let n = driver.interner.intern("n");
        let int64 = driver.interner.intern("int64");
        ast.handlers.push(HandlerDecl {
            event: tick,
            handler: FunctionDecl {
                name: None,
                args: vec![Param { name: n, ty: Some(TypeAnnotation::Named { name: int64, generics: Vec::new() }) }],
                return_type: None,
                body: vec![Stmt::new(StmtKind::Return(None), Span::DUMMY)],
                pure: true,
                span: Span::DUMMY,
            },
            span: Span::DUMMY,
        });

        let std_modules = FxHashMap::default();
        let amm = driver.run("root.ln", &ast, &std_modules).expect("driver run succeeds");
        assert!(amm.contains("on tick fn (n: int64): void {"));
        assert!(!amm.contains("REREF"));
    }
}
