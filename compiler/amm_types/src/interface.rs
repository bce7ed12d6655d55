//! `Interface` and its structural-matching requirement types (spec.md §3,
//! §4.2).

use amm_ir::Name;

use crate::ordered_map::OrderedMap;
use crate::scope::{Scope, Value};
use crate::type_kind::Type;

/// A required function signature: an optional concrete name, ordered
/// argument types, and a return type.
#[derive(Clone, Debug)]
pub struct FunctionType {
    pub name: Option<Name>,
    pub args: Vec<Type>,
    pub ret: Type,
}

/// A required operator signature. `token` is the interned operator text
/// (e.g. `+`), looked up in scope the same way a function name is.
#[derive(Clone, Debug)]
pub struct OperatorType {
    pub token: Name,
    pub is_prefix: bool,
    pub args: Vec<Type>,
    pub ret: Type,
}

/// A structural type predicate: required properties, function signatures,
/// and operator signatures.
#[derive(Clone, Debug)]
pub struct Interface {
    pub interfacename: Name,
    pub functions: Vec<FunctionType>,
    pub operators: Vec<OperatorType>,
    pub required_properties: OrderedMap<Name, Type>,
}

impl Interface {
    /// spec.md §4.2: true iff (i) every required property exists on the
    /// candidate, (ii) every required function signature with a concrete
    /// name has a matching overload in scope, and (iii) every required
    /// operator signature matches analogously.
    pub fn type_applies(&self, candidate: &Type, scope: &Scope) -> bool {
        for prop_name in self.required_properties.keys() {
            if candidate.property(*prop_name).is_none() {
                return false;
            }
        }

        for required in &self.functions {
            let Some(fn_name) = required.name else { continue };
            let Some(Value::Function(overloads)) = scope.deep_get(fn_name) else {
                return false;
            };
            let matched = overloads.borrow().iter().any(|candidate_fn| {
                candidate_fn.arg_types().len() == required.args.len()
                    && candidate_fn
                        .arg_types()
                        .iter()
                        .zip(&required.args)
                        .all(|(have, want)| args_match(have, want, candidate))
            });
            if !matched {
                return false;
            }
        }

        for required in &self.operators {
            let Some(Value::Operator(ops)) = scope.deep_get(required.token) else {
                return false;
            };
            let matched = ops.borrow().iter().any(|op| {
                op.is_prefix == required.is_prefix
                    && op.overloads.borrow().iter().any(|candidate_fn| {
                        candidate_fn.arg_types().len() == required.args.len()
                            && candidate_fn
                                .arg_types()
                                .iter()
                                .zip(&required.args)
                                .all(|(have, want)| args_match(have, want, candidate))
                    })
            });
            if !matched {
                return false;
            }
        }

        true
    }
}

/// An argument type "matches" a required argument type when it is
/// identical to it, shares an `originalType` with it, is the candidate
/// type itself (self-reference), or shares an interface with it
/// (spec.md §4.2).
fn args_match(have: &Type, want: &Type, candidate: &Type) -> bool {
    if have.same_type(want) {
        return true;
    }
    if have.same_type(candidate) {
        return true;
    }
    if let (Some(a), Some(b)) = (have.original_type(), want.original_type()) {
        if a.same_type(&b) {
            return true;
        }
    }
    if let (Some(a), Some(b)) = (have.interface(), want.interface()) {
        if a.interfacename == b.interfacename {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::BuiltinTypes;
    use amm_ir::StringInterner;

    #[test]
    fn args_match_identical_types() {
        let interner = StringInterner::new();
        let builtins = BuiltinTypes::new(&interner);
        assert!(args_match(&builtins.int64, &builtins.int64, &builtins.int64));
        assert!(!args_match(&builtins.int64, &builtins.string, &builtins.int64));
    }

    #[test]
    fn args_match_self_reference() {
        let interner = StringInterner::new();
        let builtins = BuiltinTypes::new(&interner);
        // `have` differs from `want` but equals the candidate itself.
        assert!(args_match(&builtins.int64, &builtins.string, &builtins.int64));
    }
}
