//! `Microstatement` — the AMM IR node (spec.md §3, §4.6).
//!
//! Unlike a tree-shaped AST, the AMM IR is already flat: a handler's
//! `Vec<Microstatement>` *is* the program, addressed by backward linear
//! scan rather than by arena index. There is deliberately no separate
//! `MicroArena` type.

use crate::{Name, Span};

/// What kind of operation a microstatement performs.
///
/// spec.md §3: one variant per surface concept, collapsing the source's
/// dynamically-keyed `statementType` string into an exhaustively-matched
/// enum (spec.md §9 "Tagged variants").
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum StatementType {
    ConstDec,
    LetDec,
    Assignment,
    Call,
    Emit,
    /// Re-exposes a prior value by (possibly new) alias; owns no data,
    /// renders to the empty string.
    Reref,
    Closure,
    /// A bound function argument; renders to the empty string.
    Arg,
    /// Entry marker for a function body being inlined; elided before the
    /// handler is finalized.
    EnterFn,
    /// Entry marker for a `cond`-wrapped conditional body.
    EnterCondFn,
    Exit,
    /// Tail value of an inlined function body.
    Tail,
    /// The function value produced by a closure literal, prior to it being
    /// passed as an argument to e.g. `cond`.
    ClosureDef,
}

impl StatementType {
    /// spec.md §4.7 "textual form is empty": REREF, ARG, ENTERFN,
    /// ENTERCONDFN, and TAIL are elided from rendered AMM output.
    pub fn renders_empty(self) -> bool {
        matches!(
            self,
            StatementType::Reref
                | StatementType::Arg
                | StatementType::EnterFn
                | StatementType::EnterCondFn
                | StatementType::Tail
        )
    }
}

/// A binding to one overload of the function(s) a CALL/EMIT/CLOSURE
/// microstatement invokes. Empty for pure moves/constants (spec.md §3).
#[derive(Clone, Debug, PartialEq)]
pub struct FnBinding {
    pub name: Name,
    /// Opaque identifier distinguishing overloads of the same name; the
    /// lowering layer assigns these, the IR layer only stores them.
    pub overload_id: u32,
}

/// One node of the flat AMM IR.
#[derive(Clone, Debug, PartialEq)]
pub struct Microstatement {
    pub statement_type: StatementType,
    pub pure: bool,
    /// Unique synthetic identifier (`_<32 hex>`) for non-aliased
    /// microstatements, or the visible surface name for ARG/EMIT.
    pub output_name: String,
    /// Empty string, or the surface name the user gave this binding
    /// (carried through REREF/assignment so later diagnostics can name the
    /// user-visible variable).
    pub alias: String,
    pub output_type: Name,
    /// Prior microstatements' `output_name`s this one reads from. Must
    /// resolve, by backward linear scan, to an earlier entry in the same
    /// list or an enclosing one (spec.md §3 invariant).
    pub input_names: Vec<String>,
    pub fns: Vec<FnBinding>,
    /// Inner microstatement list for CLOSURE / CLOSUREDEF.
    pub closure_statements: Vec<Microstatement>,
    pub span: Span,
}

impl Microstatement {
    pub fn new(statement_type: StatementType, output_name: String, output_type: Name, span: Span) -> Self {
        Microstatement {
            statement_type,
            pure: false,
            output_name,
            alias: String::new(),
            output_type,
            input_names: Vec::new(),
            fns: Vec::new(),
            closure_statements: Vec::new(),
            span,
        }
    }

    /// The name later microstatements should reference when addressing
    /// this one's value: the alias if one was given, else the synthetic
    /// output name.
    pub fn reference_name(&self) -> &str {
        if self.alias.is_empty() {
            &self.output_name
        } else {
            &self.alias
        }
    }

    /// A CONSTDEC/LETDEC with empty `fns` carries its literal value (or
    /// default) in `input_names[0]` (spec.md §3 invariant).
    pub fn literal_value(&self) -> Option<&str> {
        if self.fns.is_empty()
            && matches!(self.statement_type, StatementType::ConstDec | StatementType::LetDec)
        {
            self.input_names.first().map(String::as_str)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_empty_matches_spec_list() {
        assert!(StatementType::Reref.renders_empty());
        assert!(StatementType::Arg.renders_empty());
        assert!(StatementType::EnterFn.renders_empty());
        assert!(StatementType::EnterCondFn.renders_empty());
        assert!(StatementType::Tail.renders_empty());
        assert!(!StatementType::ConstDec.renders_empty());
        assert!(!StatementType::Call.renders_empty());
        assert!(!StatementType::Emit.renders_empty());
        assert!(!StatementType::Closure.renders_empty());
    }

    #[test]
    fn reference_name_prefers_alias() {
        let mut m = Microstatement::new(StatementType::Reref, "_abc".into(), Name::EMPTY, Span::DUMMY);
        assert_eq!(m.reference_name(), "_abc");
        m.alias = "x".into();
        assert_eq!(m.reference_name(), "x");
    }

    #[test]
    fn literal_value_only_for_empty_fns_declarations() {
        let mut m = Microstatement::new(StatementType::ConstDec, "_c".into(), Name::EMPTY, Span::DUMMY);
        m.input_names.push("3".into());
        assert_eq!(m.literal_value(), Some("3"));

        m.fns.push(FnBinding { name: Name::EMPTY, overload_id: 0 });
        assert_eq!(m.literal_value(), None);
    }
}
