//! Function lowering, module assembly, the standard-library loader, and the
//! driver: the bulk of the AMM lowering pass (spec.md §4.4–§4.7).

pub mod driver;
pub mod event;
pub mod microstatement;
pub mod module;
pub mod opcode;
pub mod stdlib;
pub mod user_function;

pub use driver::DriverContext;
pub use event::{Event, EventTable};
pub use module::{populate_module, LoweredModule};
pub use opcode::builtin_opcode_names;
pub use user_function::{assign_name, cond_name, UserFunction};
