//! Type system for the AMM lowering pass.
//!
//! Covers spec.md §4.1–§4.3: `Type` (nominal types, structural generics,
//! unions, interfaces, solidification), `Scope` (a stack of bindings with
//! a parent pointer), and the dispatch-support metadata types `Operator`,
//! `FunctionType`, `OperatorType`, `Interface`.
//!
//! # Representation
//!
//! `Type` is `Rc<TypeData>`: types are "shared freely by reference
//! (lifetime = process)" per spec.md §5, so reference-counted sharing with
//! pointer-identity interning keys is the natural fit — there is no
//! separate flat arena of type indices the way there is for
//! microstatements, because a `Type`'s properties are themselves `Type`
//! values, not indices into a side table.

mod builtins;
mod interface;
mod operator;
mod ordered_map;
mod scope;
mod type_kind;

pub use builtins::BuiltinTypes;
pub use interface::{FunctionType, Interface, OperatorType};
pub use operator::Operator;
pub use ordered_map::OrderedMap;
pub use scope::{Callable, Scope, ScopeRef, Value};
pub use type_kind::{
    new_alias, new_builtin, new_generic_standin, new_interface_type, new_nominal, new_union, Type, TypeData,
};
