//! `Operator` metadata (spec.md §3, §4.4).

use std::cell::RefCell;
use std::rc::Rc;

use amm_ir::Name;

use crate::scope::Callable;

/// One operator mapping: a token, a precedence, a prefix/infix flag, and
/// the function overload set it dispatches to.
///
/// spec.md §4.4: "Operator mappings construct an Operator with a
/// precedence and an isPrefix flag, referencing a function set already in
/// scope; they push onto any existing Operator list under the same
/// operator token." Multiple `Operator`s can therefore share a token (one
/// prefix, one infix, or simply multiple declarations that all apply).
#[derive(Clone)]
pub struct Operator {
    pub token: Name,
    pub precedence: u32,
    pub is_prefix: bool,
    pub overloads: Rc<RefCell<Vec<Rc<dyn Callable>>>>,
}

impl Operator {
    pub fn new(token: Name, precedence: u32, is_prefix: bool, overloads: Rc<RefCell<Vec<Rc<dyn Callable>>>>) -> Self {
        Operator { token, precedence, is_prefix, overloads }
    }
}
