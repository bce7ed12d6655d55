//! Diagnostic system for the AMM lowering pass.
//!
//! spec.md §7: "All errors in the core are fatal and abort the run with a
//! diagnostic." This crate gives that informal contract a concrete shape:
//! every fallible operation returns `Result<T, Diagnostic>`, and a
//! `Diagnostic` always carries an `ErrorCode`, a message, and the source
//! span of the offending AST node.

mod diagnostic;
mod emitter;
mod error_code;

pub use diagnostic::Diagnostic;
pub use emitter::render;
pub use error_code::ErrorCode;
