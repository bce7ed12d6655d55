//! AMM IR - shared data types for the lowering pass.
//!
//! This crate holds the pieces that the type system, the lowering logic, and
//! the driver all need a shared definition of:
//! - Spans for source locations
//! - Interned `Name`s for identifiers
//! - The surface AST node shapes handed to us by the (external) parser
//! - `Microstatement`, the flat AMM IR node
//!
//! # Design philosophy
//!
//! - **Intern identifiers**: `Name` is a cheap `Copy` handle into a shared
//!   string table, not a `String`.
//! - **Own microstatement data directly**: unlike a tree-shaped AST, the AMM
//!   IR is already flat, so `Microstatement` does not need an arena of its
//!   own — a handler's `Vec<Microstatement>` *is* the arena, indexed by
//!   backward linear scan per spec.

pub mod ast;
mod microstatement;
mod name;
mod span;
mod synth;

pub use microstatement::{FnBinding, Microstatement, StatementType};
pub use name::{Name, StringInterner};
pub use span::Span;
pub use synth::SynthNamer;
