use colored::Colorize;

use crate::frontend::{SourceFile, lexer::Span};

/// A non-fatal problem found while checking a program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub span: Span,
    pub line: usize,
    pub column: usize,
}

impl Diagnostic {
    pub fn new(source: &SourceFile, span: Span, message: impl Into<String>) -> Self {
        let (line, column) = source.line_col(span.start);

        Self {
            message: message.into(),
            span,
            line,
            column,
        }
    }

    /// `error: <message> (at <origin>:<line>:<column>)`, with the offending
    /// source line underneath
    pub fn render(&self, source: &SourceFile) -> String {
        let position = format!("(at {}:{}:{})", source.origin, self.line, self.column);
        let mut rendered = format!("{}: {} {}", "error".red(), self.message, position.white());

        if let Some(text) = source.contents.lines().nth(self.line - 1) {
            let width = source.value_of_span(self.span).lines().next().map_or(1, str::len);
            rendered.push_str(&format!(
                "\n  {text}\n  {}{}",
                " ".repeat(self.column - 1),
                "^".repeat(width.max(1)).red()
            ));
        }

        rendered
    }
}

impl core::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}:{})", self.message, self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_points_at_span() {
        let source = SourceFile::memory("a := 1;\nb := c;\n");
        let diagnostic = Diagnostic::new(&source, Span::new(13, 14), "variable 'c' undefined");

        assert_eq!(diagnostic.line, 2);
        assert_eq!(diagnostic.column, 6);

        let rendered = strip_ansi_escapes::strip_str(diagnostic.render(&source));
        assert_eq!(
            rendered,
            "error: variable 'c' undefined (at <memory>:2:6)\n  b := c;\n       ^"
        );
    }
}
