//! Terminal rendering of a `Diagnostic`, in the style of the reference
//! compiler's `rustc`-like single-line-plus-caret format.

use amm_ir::Span;

use crate::Diagnostic;

/// Render a diagnostic against its originating source text as a
/// human-readable, multi-line report:
///
/// ```text
/// error[E1001]: unknown name `foo`
///   --> line 3, column 5
///   |
/// 3 | const x: int64 = foo
///   |                  ^^^
/// ```
pub fn render(diagnostic: &Diagnostic, source: &str) -> String {
    let (line, col) = Span::line_col(diagnostic.span.start, source);
    let line_text = source.lines().nth((line - 1) as usize).unwrap_or("");
    let caret_len = diagnostic.span.len().max(1) as usize;
    let mut out = String::new();
    out.push_str(&format!(
        "error[{}]: {}\n",
        diagnostic.code.code(),
        diagnostic.message
    ));
    out.push_str(&format!("  --> line {line}, column {col}\n"));
    out.push_str("  |\n");
    out.push_str(&format!("{line} | {line_text}\n"));
    out.push_str(&format!(
        "  | {}{}\n",
        " ".repeat((col - 1) as usize),
        "^".repeat(caret_len)
    ));
    if let Some(token) = &diagnostic.token {
        out.push_str(&format!("  = token: `{token}`\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorCode;

    #[test]
    fn render_points_at_offending_span() {
        let source = "const x: int64 = foo";
        let diagnostic = Diagnostic::new(
            ErrorCode::E1001UndefinedReference,
            "unknown name `foo`",
            Span::new(18, 21),
        )
        .with_token("foo");
        let rendered = render(&diagnostic, source);
        assert!(rendered.contains("error[E1001]: unknown name `foo`"));
        assert!(rendered.contains("line 1, column 19"));
        assert!(rendered.contains("token: `foo`"));
    }
}
