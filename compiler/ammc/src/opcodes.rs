//! Registers the opcode-table primitives the lowering pass assumes are
//! present in its root scope (spec.md §1 "the opcode table ... specified
//! only by interface"): the control-flow/collection primitives
//! `amm_lower::opcode::builtin_opcode_names()` lists, plus the
//! arithmetic/comparison/logical operator functions needed to lower
//! expressions like `1 + 2 * 3` end to end (spec.md §8, §4.6 item 5).
//!
//! `cond` and `assign` must be bound under the exact `Name`s
//! `amm_lower::{cond_name, assign_name}` return — the conditional/return
//! desugaring pass builds its synthesized `Call` nodes against those
//! `Name`s directly, from an interner private to that pass, not from
//! whatever `StringInterner` the rest of a run uses. Every other opcode
//! name is looked up through the run's own interner, the same way
//! `Lowerer` interns `"newarr"`/`"copyfrom"`/etc. when stamping a
//! microstatement's `fns` field.

use std::cell::RefCell;
use std::rc::Rc;

use amm_ir::{Name, StringInterner};
use amm_lower::opcode::{builtin_opcode_names, NativeFunction};
use amm_lower::{assign_name, cond_name};
use amm_types::{new_builtin, Callable, Operator, Scope, ScopeRef, Type, Value};

/// Arithmetic, comparison, and logical operator tokens bound alongside the
/// opcode table, with their precedence (spec.md §4.6 item 5: `*` binds
/// tighter than `+`).
const OPERATORS: &[(&str, u32)] = &[
    ("||", 1),
    ("&&", 1),
    ("==", 2),
    ("!=", 2),
    ("<", 2),
    (">", 2),
    ("<=", 2),
    (">=", 2),
    ("+", 3),
    ("-", 3),
    ("*", 4),
    ("/", 4),
];

/// Builds the root scope every populated module ultimately chains up to:
/// the opcode scope spec.md's `<root>` and every handler's lowering
/// depends on.
pub fn builtin_opcodes(interner: &StringInterner) -> ScopeRef {
    let scope = Scope::new(None);
    let void = new_builtin("void");
    let int64 = new_builtin("int64");
    let bool_ = new_builtin("bool");

    for opcode in builtin_opcode_names() {
        let (name, args, ret) = match *opcode {
            "cond" => (cond_name(), vec![bool_.clone(), void.clone(), void.clone()], void.clone()),
            "assign" => (assign_name(), vec![void.clone()], void.clone()),
            "newarr" => (interner.intern(opcode), vec![int64.clone()], void.clone()),
            "pusharr" => (interner.intern(opcode), vec![void.clone(), void.clone()], void.clone()),
            "newmap" => (interner.intern(opcode), Vec::new(), void.clone()),
            "copyfrom" => (interner.intern(opcode), vec![void.clone(), int64.clone()], void.clone()),
            "getR" => (interner.intern(opcode), vec![void.clone()], void.clone()),
            "noneM" => (interner.intern(opcode), Vec::new(), void.clone()),
            other => (interner.intern(other), Vec::new(), void.clone()),
        };
        bind_function(&scope, name, args, ret);
    }

    for (token, precedence) in OPERATORS {
        let ret = if matches!(*token, "+" | "-" | "*" | "/") { int64.clone() } else { bool_.clone() };
        bind_operator(&scope, interner, token, *precedence, vec![int64.clone(), int64.clone()], ret);
    }

    scope
}

fn bind_function(scope: &ScopeRef, name: Name, arg_types: Vec<Type>, return_type: Type) {
    let native = NativeFunction::new(name, arg_types, return_type, true);
    let overloads: Vec<Rc<dyn Callable>> = vec![Rc::new(native)];
    scope.borrow_mut().put(name, Value::Function(Rc::new(RefCell::new(overloads))));
}

fn bind_operator(scope: &ScopeRef, interner: &StringInterner, token: &str, precedence: u32, arg_types: Vec<Type>, return_type: Type) {
    let name = interner.intern(token);
    let fn_name = interner.intern(&format!("operator_{}", operator_slug(token)));
    let native = NativeFunction::new(fn_name, arg_types, return_type, true);
    let overloads: Rc<RefCell<Vec<Rc<dyn Callable>>>> = Rc::new(RefCell::new(vec![Rc::new(native)]));
    let operator = Operator::new(name, precedence, false, overloads);
    scope.borrow_mut().put(name, Value::Operator(Rc::new(RefCell::new(vec![operator]))));
}

fn operator_slug(token: &str) -> String {
    token
        .chars()
        .map(|c| match c {
            '+' => 'a',
            '-' => 's',
            '*' => 'm',
            '/' => 'd',
            '=' => 'e',
            '!' => 'n',
            '<' => 'l',
            '>' => 'g',
            '&' => 'A',
            '|' => 'O',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_opcode_name_is_bound() {
        let interner = StringInterner::new();
        let scope = builtin_opcodes(&interner);
        for opcode in builtin_opcode_names() {
            let name = match *opcode {
                "cond" => cond_name(),
                "assign" => assign_name(),
                other => interner.intern(other),
            };
            assert!(scope.borrow().shallow_get(name).is_some(), "missing opcode binding: {opcode}");
        }
    }

    #[test]
    fn arithmetic_and_comparison_operators_are_bound() {
        let interner = StringInterner::new();
        let scope = builtin_opcodes(&interner);
        for token in ["+", "-", "*", "/", "==", "<", "&&"] {
            let name = interner.intern(token);
            assert!(matches!(scope.borrow().shallow_get(name), Some(Value::Operator(_))), "missing operator: {token}");
        }
    }
}
