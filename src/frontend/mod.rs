use std::path::PathBuf;

use thiserror::Error;

use self::lexer::Span;

pub mod ast;
pub mod intern;
pub mod lexer;
pub mod parser;

#[derive(Debug)]
pub struct SourceFile {
    pub contents: String,
    pub origin: SourceFileOrigin,
}

impl SourceFile {
    pub fn memory(contents: impl Into<String>) -> Self {
        Self {
            contents: contents.into(),
            origin: SourceFileOrigin::Memory,
        }
    }

    pub fn value_of_span(&self, span: Span) -> &str {
        &self.contents[span.start..span.end]
    }

    /// 1-based line and column of a byte offset
    pub fn line_col(&self, position: usize) -> (usize, usize) {
        let position = position.min(self.contents.len());
        let before = &self.contents[..position];

        let line = before.matches('\n').count() + 1;
        let column = match before.rfind('\n') {
            Some(newline) => position - newline,
            None => position + 1,
        };

        (line, column)
    }
}

#[derive(Debug)]
pub enum SourceFileOrigin {
    Memory,
    File(PathBuf),
}

impl core::fmt::Display for SourceFileOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceFileOrigin::Memory => f.write_str("<memory>"),
            SourceFileOrigin::File(path) => f.write_fmt(format_args!("{}", path.display())),
        }
    }
}

/// A lexing or parsing failure. Fatal for the compilation unit it came from.
#[derive(Debug, Clone, Error)]
#[error("{message} ({origin}:{line}:{column})")]
pub struct SyntaxError {
    pub message: String,
    pub span: Span,
    pub origin: String,
    pub line: usize,
    pub column: usize,
}

impl SyntaxError {
    pub fn new(source: &SourceFile, span: Span, message: impl Into<String>) -> Self {
        let (line, column) = source.line_col(span.start);

        Self {
            message: message.into(),
            span,
            origin: source.origin.to_string(),
            line,
            column,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_col_is_one_based() {
        let source = SourceFile::memory("a := 1;\nb := 2;\n");

        assert_eq!(source.line_col(0), (1, 1));
        assert_eq!(source.line_col(5), (1, 6));
        assert_eq!(source.line_col(8), (2, 1));
        assert_eq!(source.line_col(10), (2, 3));
    }
}
