//! The `Diagnostic` type itself.

use amm_ir::Span;

use crate::ErrorCode;

/// A fatal diagnostic raised by the lowering pass.
///
/// spec.md §7: "surfaced with a textual location (source line and column
/// of the offending AST node) and the offending token." `span` plus
/// `token` carry exactly that; `message` and `code` identify what went
/// wrong.
#[derive(Clone, Eq, PartialEq, Debug, thiserror::Error)]
#[error("{code}: {message}")]
pub struct Diagnostic {
    pub code: ErrorCode,
    pub message: String,
    pub span: Span,
    /// The offending token or identifier text, when there is one to name.
    pub token: Option<String>,
}

impl Diagnostic {
    pub fn new(code: ErrorCode, message: impl Into<String>, span: Span) -> Self {
        Diagnostic { code, message: message.into(), span, token: None }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code_and_message() {
        let d = Diagnostic::new(ErrorCode::E1001UndefinedReference, "unknown name `foo`", Span::DUMMY);
        assert_eq!(format!("{d}"), "E1001: unknown name `foo`");
    }

    #[test]
    fn with_token_is_chainable() {
        let d = Diagnostic::new(ErrorCode::E1001UndefinedReference, "unknown name", Span::DUMMY)
            .with_token("foo");
        assert_eq!(d.token.as_deref(), Some("foo"));
    }
}
