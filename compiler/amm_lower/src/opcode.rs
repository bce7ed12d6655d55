//! The opcode scope: the read-only catalogue of built-in functions and
//! types the lowering pass consults for primitives like `cond`, `assign`,
//! `newarr` (spec.md §1 "Out of scope: the opcode table ... made available
//! through a distinguished opcode scope", GLOSSARY "Opcode scope").
//!
//! spec.md treats the opcode table's contents as an external catalogue
//! "specified only by interface" — this module defines the shape
//! (`NativeFunction`, the name list) that catalogue must have to slot into
//! `Scope`/`dispatch_fn`; the concrete registration of each primitive lives
//! in `ammc`, the driver binary, the same way the reference compiler keeps
//! its builtin table behind the CLI crate rather than the canon crate.

use std::any::Any;

use amm_types::{Callable, Type};
use amm_ir::Name;

/// Names of the primitive opcode-scope functions spec.md names by name
/// (§4.6, §9 GLOSSARY): the minimal control-flow and collection primitives
/// the lowering pass itself emits calls to while desugaring surface syntax.
pub const BUILTIN_OPCODE_NAMES: &[&str] =
    &["cond", "assign", "newarr", "pusharr", "newmap", "copyfrom", "getR", "noneM"];

/// A function bound directly to a Rust closure rather than to a lowered
/// user-function body — the shape every opcode-scope entry takes.
///
/// `amm_lower` never constructs these itself (the opcode table is an
/// external collaborator); it only requires that whatever is bound under
/// `cond`/`assign`/etc. in the opcode scope implements `Callable` so
/// `dispatch_fn` and `Operator::applicable_function`-style matching see
/// a uniform overload set.
pub struct NativeFunction {
    pub name: Name,
    pub arg_types: Vec<Type>,
    pub return_type: Type,
    pub pure: bool,
}

impl NativeFunction {
    pub fn new(name: Name, arg_types: Vec<Type>, return_type: Type, pure: bool) -> Self {
        NativeFunction { name, arg_types, return_type, pure }
    }
}

impl Callable for NativeFunction {
    fn name(&self) -> Name {
        self.name
    }

    fn arg_types(&self) -> &[Type] {
        &self.arg_types
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

/// The opcode names this crate's lowering entry points assume are present
/// in whatever scope is passed as the opcode scope. Exposed so `ammc`'s
/// `builtin_opcodes()` can assert it has registered all of them.
pub fn builtin_opcode_names() -> &'static [&'static str] {
    BUILTIN_OPCODE_NAMES
}
