use std::{
    collections::{BTreeMap, VecDeque},
    str::Chars,
};

use itertools::{PeekNth, peek_nth};
use once_cell::sync::Lazy;
use strum::EnumString;

use super::SyntaxError;
use crate::SourceFile;

#[derive(Debug)]
pub struct Lexer<'source> {
    source: &'source SourceFile,
    mode: LexMode,
    position: usize,
    chars: PeekNth<Chars<'source>>,
    peek_buffer: VecDeque<Token>,
}

/// Selects which vocabulary the lexer recognizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexMode {
    /// Boa programs: keywords and `T"..."` time literals
    Boa,
    /// Host-language expression text for the interchange format: no keywords,
    /// char literals and the `?` operator
    Interchange,
}

#[derive(Debug, Clone, Copy)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /* Words */
    Keyword(Keyword), // foreach
    Identifier,       // counts

    /* Literals */
    BooleanLiteral, // true
    CharLiteral,    // 'A'
    IntegerLiteral, // 1
    FloatLiteral,   // 1.0
    StringLiteral,  // "hello, world"
    TimeLiteral,    // T"Mon Jan 1 00:00:00 UTC 2024"

    /* Delimiters */
    OpenParen,    // (
    CloseParen,   // )
    OpenBracket,  // [
    CloseBracket, // ]
    OpenBrace,    // {
    CloseBrace,   // }
    Semicolon,    // ;
    Comma,        // ,

    /* Other */
    Colon,    // :
    Dot,      // .
    Arrow,    // ->
    Question, // ?

    /* Unary Ops */
    Bang,      // !
    Tilde,     // ~
    Increment, // ++
    Decrement, // --

    /* Unary + Binary Ops */
    Minus, // -
    Plus,  // +

    /* Binary Ops */
    Asterisk,             // *
    Divide,               // /
    Modulus,              // %
    LogicalAnd,           // &&
    LogicalOr,            // ||
    BitwiseXor,           // ^
    BitwiseAnd,           // &
    BitwiseOr,            // |
    ShiftLeft,            // <<
    ShiftRight,           // >>
    DoubleEquals,         // ==
    NotEquals,            // !=
    LessThan,             // <
    LessThanOrEqualTo,    // <=
    GreaterThan,          // >
    GreaterThanOrEqualTo, // >=

    /* Assignment */
    Equals,           // =
    PlusEquals,       // +=
    MinusEquals,      // -=
    MultiplyEquals,   // *=
    DivideEquals,     // /=
    ModulusEquals,    // %=
    BitwiseXorEquals, // ^=
    BitwiseAndEquals, // &=
    BitwiseOrEquals,  // |=
    ShiftLeftEquals,  // <<=
    ShiftRightEquals, // >>=
}

impl TokenKind {
    pub fn is_assignment_operator(&self) -> bool {
        matches!(
            self,
            Self::Equals
                | Self::PlusEquals
                | Self::MinusEquals
                | Self::MultiplyEquals
                | Self::DivideEquals
                | Self::ModulusEquals
                | Self::BitwiseXorEquals
                | Self::BitwiseAndEquals
                | Self::BitwiseOrEquals
                | Self::ShiftLeftEquals
                | Self::ShiftRightEquals
        )
    }

    pub fn is_comparison_operator(&self) -> bool {
        matches!(
            self,
            Self::NotEquals
                | Self::DoubleEquals
                | Self::LessThan
                | Self::LessThanOrEqualTo
                | Self::GreaterThan
                | Self::GreaterThanOrEqualTo
        )
    }

    pub fn is_relational_operator(&self) -> bool {
        matches!(
            self,
            Self::LessThan
                | Self::LessThanOrEqualTo
                | Self::GreaterThan
                | Self::GreaterThanOrEqualTo
        )
    }

    pub fn is_bit_shift_operator(&self) -> bool {
        matches!(self, Self::ShiftLeft | Self::ShiftRight)
    }

    pub fn is_term_operator(&self) -> bool {
        matches!(self, Self::Plus | Self::Minus)
    }

    pub fn is_factor_operator(&self) -> bool {
        matches!(self, Self::Asterisk | Self::Divide | Self::Modulus)
    }

    pub fn is_unary_operator(&self) -> bool {
        matches!(
            self,
            Self::Bang | Self::Tilde | Self::Minus | Self::Plus | Self::Increment | Self::Decrement
        )
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Self::BooleanLiteral
                | Self::CharLiteral
                | Self::IntegerLiteral
                | Self::FloatLiteral
                | Self::StringLiteral
                | Self::TimeLiteral
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Keyword {
    If,
    Else,
    While,
    Do,
    For,
    Foreach,
    Exists,
    Ifall,
    Switch,
    Case,
    Default,
    Return,
    Break,
    Continue,
    Stop,
    Type,
    View,
    Visitor,
    Before,
    After,
    Output,
    Of,
    Weight,
    Function,
    Array,
    Map,
    Stack,
    Set,
    Queue,
    Table,
    Model,
}

/// Table of single char tokens (matched after longer sequences are checked for)
static SINGLE_TOKENS: Lazy<BTreeMap<char, TokenKind>> = Lazy::new(|| {
    BTreeMap::from([
        ('(', TokenKind::OpenParen),
        (')', TokenKind::CloseParen),
        ('[', TokenKind::OpenBracket),
        (']', TokenKind::CloseBracket),
        ('{', TokenKind::OpenBrace),
        ('}', TokenKind::CloseBrace),
        (';', TokenKind::Semicolon),
        (',', TokenKind::Comma),
        ('!', TokenKind::Bang),
        ('~', TokenKind::Tilde),
        (':', TokenKind::Colon),
        ('.', TokenKind::Dot),
        ('?', TokenKind::Question),
        ('*', TokenKind::Asterisk),
        ('-', TokenKind::Minus),
        ('=', TokenKind::Equals),
        ('+', TokenKind::Plus),
        ('/', TokenKind::Divide),
        ('%', TokenKind::Modulus),
        ('^', TokenKind::BitwiseXor),
        ('&', TokenKind::BitwiseAnd),
        ('|', TokenKind::BitwiseOr),
        ('<', TokenKind::LessThan),
        ('>', TokenKind::GreaterThan),
    ])
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Smallest span covering both spans
    pub fn to(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }
}

impl core::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

impl<'source> Lexer<'source> {
    pub fn new(source: &'source SourceFile, mode: LexMode) -> Self {
        Self {
            source,
            mode,
            chars: peek_nth(source.contents.chars()),
            position: 0,
            peek_buffer: VecDeque::new(),
        }
    }

    pub fn source(&self) -> &'source SourceFile {
        self.source
    }

    /// Span of the end of input, used when reporting unexpected EOF
    pub fn eof_span(&self) -> Span {
        Span::new(self.source.contents.len(), self.source.contents.len())
    }

    fn error<T>(&self, start: usize, message: impl Into<String>) -> Result<T, SyntaxError> {
        Err(SyntaxError::new(
            self.source,
            Span::new(start, self.position.max(start + 1)),
            message,
        ))
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.position += c.len_utf8();
        Some(c)
    }

    fn peek_char_is(&mut self, n: usize, expected: char) -> bool {
        self.chars.peek_nth(n).is_some_and(|c| *c == expected)
    }

    fn ignore_whitespace(&mut self) {
        while self.chars.peek().is_some_and(|c| c.is_whitespace()) {
            self.bump();
        }
    }

    fn ignore_line(&mut self) {
        while self.chars.peek().is_some_and(|c| *c != '\n') {
            self.bump();
        }
    }

    fn ignore_block_comment(&mut self) -> Result<(), SyntaxError> {
        let start_position = self.position;

        // Consume the opening `/*`
        self.bump();
        self.bump();

        while self.chars.peek().is_some() {
            if self.peek_char_is(0, '*') && self.peek_char_is(1, '/') {
                self.bump();
                self.bump();
                return Ok(());
            }

            self.bump();
        }

        self.error(start_position, "Reached end of file while reading block comment")
    }

    fn read_wrapped_escapable(
        &mut self,
        start_position: usize,
        wrapper: char,
        kind: TokenKind,
    ) -> Result<Token, SyntaxError> {
        // Consume first wrapper
        self.bump();

        while let Some(c) = self.bump() {
            if c == '\n' {
                return self.error(
                    start_position,
                    format!("Reached end of line while reading wrapped literal: {kind:?}"),
                );
            }

            // Skip whatever follows an escape
            if c == '\\' {
                self.bump();
                continue;
            }

            if c == wrapper {
                return Ok(Token {
                    span: self.new_span(start_position),
                    kind,
                });
            }
        }

        self.error(
            start_position,
            format!("Reached end of file while reading wrapped literal: {kind:?}"),
        )
    }

    // Keyword, identifier, or boolean literal
    fn read_word(&mut self) -> Token {
        let start_position = self.position;

        while self
            .chars
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '$')
        {
            self.bump();
        }

        let span = self.new_span(start_position);
        let value = self.source.value_of_span(span);

        let keyword = match self.mode {
            LexMode::Boa => value.parse().ok(),
            LexMode::Interchange => None,
        };

        let kind = if let Some(keyword) = keyword {
            TokenKind::Keyword(keyword)
        } else {
            match value {
                "true" | "false" => TokenKind::BooleanLiteral,
                _ => TokenKind::Identifier,
            }
        };

        Token { kind, span }
    }

    fn read_digits(&mut self) {
        while self
            .chars
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || *c == '_')
        {
            self.bump();
        }
    }

    fn read_number(&mut self) -> Token {
        let start_position = self.position;
        let mut kind = TokenKind::IntegerLiteral;

        // Hexadecimal integers
        if self.peek_char_is(0, '0') && (self.peek_char_is(1, 'x') || self.peek_char_is(1, 'X')) {
            self.bump();
            self.bump();

            while self.chars.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.bump();
            }
        } else {
            self.read_digits();

            if self.peek_char_is(0, '.')
                && self.chars.peek_nth(1).is_some_and(|c| c.is_ascii_digit())
            {
                kind = TokenKind::FloatLiteral;
                self.bump();
                self.read_digits();
            }

            if self.read_exponent() {
                kind = TokenKind::FloatLiteral;
            }
        }

        if self.mode == LexMode::Interchange {
            match self.chars.peek().copied() {
                Some('l' | 'L') => {
                    self.bump();
                }
                Some('f' | 'F' | 'd' | 'D') => {
                    kind = TokenKind::FloatLiteral;
                    self.bump();
                }
                _ => {}
            }
        }

        Token {
            kind,
            span: self.new_span(start_position),
        }
    }

    // .5
    fn read_decimal_part(&mut self) -> Token {
        let start_position = self.position;

        self.bump();
        self.read_digits();
        self.read_exponent();

        Token {
            kind: TokenKind::FloatLiteral,
            span: self.new_span(start_position),
        }
    }

    fn read_exponent(&mut self) -> bool {
        if !(self.peek_char_is(0, 'e') || self.peek_char_is(0, 'E')) {
            return false;
        }

        let digit_offset = if self.peek_char_is(1, '+') || self.peek_char_is(1, '-') {
            2
        } else {
            1
        };

        if !self
            .chars
            .peek_nth(digit_offset)
            .is_some_and(|c| c.is_ascii_digit())
        {
            return false;
        }

        for _ in 0..digit_offset {
            self.bump();
        }

        self.read_digits();
        true
    }

    fn read_sequence(&mut self, length: usize, kind: TokenKind) -> Token {
        let start_position = self.position;

        for _ in 0..length {
            self.bump();
        }

        Token {
            kind,
            span: self.new_span(start_position),
        }
    }

    fn new_span(&self, start: usize) -> Span {
        Span {
            start,
            end: self.position,
        }
    }

    pub fn peek(&mut self) -> Result<Option<Token>, SyntaxError> {
        self.peek_nth(0)
    }

    /// Looks `n` tokens ahead without consuming anything
    pub fn peek_nth(&mut self, n: usize) -> Result<Option<Token>, SyntaxError> {
        while self.peek_buffer.len() <= n {
            match self.read_token()? {
                Some(token) => self.peek_buffer.push_back(token),
                None => return Ok(None),
            }
        }

        Ok(self.peek_buffer.get(n).cloned())
    }

    pub fn next(&mut self) -> Result<Option<Token>, SyntaxError> {
        if let Some(token) = self.peek_buffer.pop_front() {
            return Ok(Some(token));
        }

        self.read_token()
    }

    fn read_token(&mut self) -> Result<Option<Token>, SyntaxError> {
        while let Some(c) = self.chars.peek().copied() {
            let token = match c {
                // Ignore whitespace
                c if c.is_whitespace() => {
                    self.ignore_whitespace();
                    continue;
                }
                // Ignore comments
                '#' if self.mode == LexMode::Boa => {
                    self.ignore_line();
                    continue;
                }
                '/' if self.peek_char_is(1, '/') => {
                    self.ignore_line();
                    continue;
                }
                '/' if self.peek_char_is(1, '*') => {
                    self.ignore_block_comment()?;
                    continue;
                }

                // Time literals
                'T' if self.mode == LexMode::Boa && self.peek_char_is(1, '"') => {
                    let start_position = self.position;
                    self.bump();
                    self.read_wrapped_escapable(start_position, '"', TokenKind::TimeLiteral)?
                }
                // String literals
                '"' => self.read_wrapped_escapable(self.position, '"', TokenKind::StringLiteral)?,
                // Char literals
                '\'' if self.mode == LexMode::Interchange => {
                    self.read_wrapped_escapable(self.position, '\'', TokenKind::CharLiteral)?
                }

                // Integer and float literals
                n if n.is_ascii_digit() => self.read_number(),
                '.' if self.chars.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) => {
                    self.read_decimal_part()
                }

                // Identifiers, keywords, and boolean literals
                a if a.is_ascii_alphabetic() || a == '_' || a == '$' => self.read_word(),

                // Arrow (->)
                '-' if self.peek_char_is(1, '>') => self.read_sequence(2, TokenKind::Arrow),
                // Increment (++) and decrement (--)
                '+' if self.peek_char_is(1, '+') => self.read_sequence(2, TokenKind::Increment),
                '-' if self.peek_char_is(1, '-') => self.read_sequence(2, TokenKind::Decrement),

                // Double Equals (==)
                '=' if self.peek_char_is(1, '=') => self.read_sequence(2, TokenKind::DoubleEquals),
                // Not Equals (!=)
                '!' if self.peek_char_is(1, '=') => self.read_sequence(2, TokenKind::NotEquals),

                // Shift left equals (<<=)
                '<' if self.peek_char_is(1, '<') && self.peek_char_is(2, '=') => {
                    self.read_sequence(3, TokenKind::ShiftLeftEquals)
                }
                // Shift right equals (>>=)
                '>' if self.peek_char_is(1, '>') && self.peek_char_is(2, '=') => {
                    self.read_sequence(3, TokenKind::ShiftRightEquals)
                }
                // Shift left (<<)
                '<' if self.peek_char_is(1, '<') => self.read_sequence(2, TokenKind::ShiftLeft),
                // Shift right (>>)
                '>' if self.peek_char_is(1, '>') => self.read_sequence(2, TokenKind::ShiftRight),

                // Less than or equal (<=)
                '<' if self.peek_char_is(1, '=') => {
                    self.read_sequence(2, TokenKind::LessThanOrEqualTo)
                }
                // Greater than or equal (>=)
                '>' if self.peek_char_is(1, '=') => {
                    self.read_sequence(2, TokenKind::GreaterThanOrEqualTo)
                }

                // Plus equals (+=)
                '+' if self.peek_char_is(1, '=') => self.read_sequence(2, TokenKind::PlusEquals),
                // Minus equals (-=)
                '-' if self.peek_char_is(1, '=') => self.read_sequence(2, TokenKind::MinusEquals),
                // Multiply equals (*=)
                '*' if self.peek_char_is(1, '=') => {
                    self.read_sequence(2, TokenKind::MultiplyEquals)
                }
                // Divide equals (/=)
                '/' if self.peek_char_is(1, '=') => self.read_sequence(2, TokenKind::DivideEquals),
                // Modulus equals (%=)
                '%' if self.peek_char_is(1, '=') => self.read_sequence(2, TokenKind::ModulusEquals),
                // Bitwise xor equals (^=)
                '^' if self.peek_char_is(1, '=') => {
                    self.read_sequence(2, TokenKind::BitwiseXorEquals)
                }

                // Logical And (&&)
                '&' if self.peek_char_is(1, '&') => self.read_sequence(2, TokenKind::LogicalAnd),
                // Logical Or (||)
                '|' if self.peek_char_is(1, '|') => self.read_sequence(2, TokenKind::LogicalOr),
                // Bitwise and equals (&=)
                '&' if self.peek_char_is(1, '=') => {
                    self.read_sequence(2, TokenKind::BitwiseAndEquals)
                }
                // Bitwise or equals (|=)
                '|' if self.peek_char_is(1, '=') => {
                    self.read_sequence(2, TokenKind::BitwiseOrEquals)
                }

                s if SINGLE_TOKENS.contains_key(&s) => match SINGLE_TOKENS.get(&s) {
                    Some(kind) => self.read_sequence(1, *kind),
                    None => unreachable!("checked by the guard"),
                },
                c => {
                    let start_position = self.position;
                    self.bump();
                    return self.error(
                        start_position,
                        format!("Unexpected character in stream: `{c}`"),
                    );
                }
            };

            return Ok(Some(token));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn kinds(text: &str, mode: LexMode) -> Vec<TokenKind> {
        let source = SourceFile::memory(text);
        let mut lexer = Lexer::new(&source, mode);
        let mut kinds = Vec::new();

        while let Some(token) = lexer.next().unwrap() {
            kinds.push(token.kind);
        }

        kinds
    }

    #[test]
    fn lexes_boa_declarations() {
        assert_eq!(
            kinds("counts: output sum of int; # trailing", LexMode::Boa),
            vec![
                TokenKind::Identifier,
                TokenKind::Colon,
                TokenKind::Keyword(Keyword::Output),
                TokenKind::Identifier,
                TokenKind::Keyword(Keyword::Of),
                TokenKind::Identifier,
                TokenKind::Semicolon,
            ]
        );
    }

    #[test]
    fn lexes_emit_and_arrows() {
        assert_eq!(
            kinds("before n: Project -> counts << 1;", LexMode::Boa),
            vec![
                TokenKind::Keyword(Keyword::Before),
                TokenKind::Identifier,
                TokenKind::Colon,
                TokenKind::Identifier,
                TokenKind::Arrow,
                TokenKind::Identifier,
                TokenKind::ShiftLeft,
                TokenKind::IntegerLiteral,
                TokenKind::Semicolon,
            ]
        );
    }

    #[test]
    fn interchange_mode_has_no_keywords() {
        assert_eq!(
            kinds("map.set(x, 'c') ? 1.5f : 10L", LexMode::Interchange),
            vec![
                TokenKind::Identifier,
                TokenKind::Dot,
                TokenKind::Identifier,
                TokenKind::OpenParen,
                TokenKind::Identifier,
                TokenKind::Comma,
                TokenKind::CharLiteral,
                TokenKind::CloseParen,
                TokenKind::Question,
                TokenKind::FloatLiteral,
                TokenKind::Colon,
                TokenKind::IntegerLiteral,
            ]
        );
    }

    #[test]
    fn distinguishes_increment_from_negation() {
        assert_eq!(
            kinds("- -x --y", LexMode::Interchange),
            vec![
                TokenKind::Minus,
                TokenKind::Minus,
                TokenKind::Identifier,
                TokenKind::Decrement,
                TokenKind::Identifier,
            ]
        );
    }

    #[test]
    fn numbers_and_times() {
        assert_eq!(
            kinds("1 2.5 .5 1e3 0x1F T\"Mon Jan 1 2024\"", LexMode::Boa),
            vec![
                TokenKind::IntegerLiteral,
                TokenKind::FloatLiteral,
                TokenKind::FloatLiteral,
                TokenKind::FloatLiteral,
                TokenKind::IntegerLiteral,
                TokenKind::TimeLiteral,
            ]
        );
    }

    #[test]
    fn unterminated_string_is_a_syntax_error() {
        let source = SourceFile::memory("s := \"abc");
        let mut lexer = Lexer::new(&source, LexMode::Boa);

        let error = loop {
            match lexer.next() {
                Ok(Some(_)) => continue,
                Ok(None) => panic!("expected an error"),
                Err(error) => break error,
            }
        };

        assert_eq!(error.line, 1);
        assert_eq!(error.column, 6);
    }
}
