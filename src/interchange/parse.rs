//! Parses host-language expression text into interchange [`Expression`]s.
//!
//! The grammar is the Java expression grammar: assignment, `?:`, the binary
//! operator ladder, prefix and postfix operators, casts, field access, method
//! calls, indexing and `new`. Grouping parentheses become `PAREN` nodes.

use tracing::trace;

use super::{Expression, ExpressionKind, Type, TypeKind};
use crate::{
    DEFAULT_MAX_NESTING_DEPTH,
    frontend::{
        SourceFile, SyntaxError,
        lexer::{LexMode, Lexer, Span, Token, TokenKind},
    },
};

type ParseResult<T> = Result<T, SyntaxError>;

pub fn parse_expression(text: &str) -> ParseResult<Expression> {
    parse_expression_with_depth(text, DEFAULT_MAX_NESTING_DEPTH)
}

/// Like [`parse_expression`], failing once grouping and operands nest deeper
/// than `max_depth`
pub fn parse_expression_with_depth(text: &str, max_depth: usize) -> ParseResult<Expression> {
    let source = SourceFile::memory(text);
    let mut parser = ExpressionParser {
        lexer: Lexer::new(&source, LexMode::Interchange),
        depth: 0,
        max_depth,
    };

    let expression = parser.parse_expression()?;

    if let Some(token) = parser.lexer.next()? {
        return parser.unexpected(token, "end of expression");
    }

    trace!(text, "parsed interchange expression");

    Ok(expression)
}

struct ExpressionParser<'source> {
    lexer: Lexer<'source>,
    depth: usize,
    max_depth: usize,
}

/// One rung of the left associative binary operator ladder
type OperatorTable = &'static [(TokenKind, ExpressionKind)];

const LADDER: &[OperatorTable] = &[
    &[(TokenKind::LogicalOr, ExpressionKind::LogicalOr)],
    &[(TokenKind::LogicalAnd, ExpressionKind::LogicalAnd)],
    &[(TokenKind::BitwiseOr, ExpressionKind::BitOr)],
    &[(TokenKind::BitwiseXor, ExpressionKind::BitXor)],
    &[(TokenKind::BitwiseAnd, ExpressionKind::BitAnd)],
    &[
        (TokenKind::DoubleEquals, ExpressionKind::Eq),
        (TokenKind::NotEquals, ExpressionKind::Neq),
    ],
    &[
        (TokenKind::LessThan, ExpressionKind::Lt),
        (TokenKind::GreaterThan, ExpressionKind::Gt),
        (TokenKind::LessThanOrEqualTo, ExpressionKind::Lteq),
        (TokenKind::GreaterThanOrEqualTo, ExpressionKind::Gteq),
    ],
    &[
        (TokenKind::ShiftLeft, ExpressionKind::BitLshift),
        (TokenKind::ShiftRight, ExpressionKind::BitRshift),
    ],
    &[
        (TokenKind::Plus, ExpressionKind::OpAdd),
        (TokenKind::Minus, ExpressionKind::OpSub),
    ],
    &[
        (TokenKind::Asterisk, ExpressionKind::OpMult),
        (TokenKind::Divide, ExpressionKind::OpDiv),
        (TokenKind::Modulus, ExpressionKind::OpMod),
    ],
];

impl<'source> ExpressionParser<'source> {
    fn text(&self, span: Span) -> &'source str {
        self.lexer.source().value_of_span(span)
    }

    fn error<T>(&self, span: Span, message: impl Into<String>) -> ParseResult<T> {
        Err(SyntaxError::new(self.lexer.source(), span, message))
    }

    fn unexpected<T>(&self, token: Token, expecting: &str) -> ParseResult<T> {
        self.error(
            token.span,
            format!("expected {expecting} but found '{}'", self.text(token.span)),
        )
    }

    fn expect_next(&mut self, expecting: &str) -> ParseResult<Token> {
        let Some(token) = self.lexer.next()? else {
            return self.error(
                self.lexer.eof_span(),
                format!("expected {expecting} but reached end of input"),
            );
        };

        Ok(token)
    }

    fn expect_next_to_be(&mut self, kind: TokenKind, expecting: &str) -> ParseResult<Token> {
        let token = self.expect_next(expecting)?;

        if token.kind != kind {
            return self.unexpected(token, expecting);
        }

        Ok(token)
    }

    fn peek_kind(&mut self, n: usize) -> ParseResult<Option<TokenKind>> {
        Ok(self.lexer.peek_nth(n)?.map(|token| token.kind))
    }

    fn eat(&mut self, kind: TokenKind) -> ParseResult<bool> {
        if self.peek_kind(0)? == Some(kind) {
            self.lexer.next()?;
            return Ok(true);
        }

        Ok(false)
    }

    /// Whether the next two tokens touch, as in `>>` `>` spelling `>>>`
    fn adjacent(&mut self) -> ParseResult<bool> {
        let first = self.lexer.peek_nth(0)?;
        let second = self.lexer.peek_nth(1)?;

        Ok(matches!((first, second), (Some(a), Some(b)) if a.span.end == b.span.start))
    }

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        if self.depth >= self.max_depth {
            let span = self
                .lexer
                .peek()?
                .map(|token| token.span)
                .unwrap_or_else(|| self.lexer.eof_span());

            return self.error(
                span,
                format!("nesting exceeds the maximum depth of {}", self.max_depth),
            );
        }

        self.depth += 1;
        let result = f(self);
        self.depth -= 1;

        result
    }

    fn parse_expression(&mut self) -> ParseResult<Expression> {
        self.nested(Self::parse_assignment)
    }

    fn assignment_operator(&mut self) -> ParseResult<Option<(ExpressionKind, usize)>> {
        let kind = match self.peek_kind(0)? {
            Some(TokenKind::Equals) => ExpressionKind::Assign,
            Some(TokenKind::PlusEquals) => ExpressionKind::AssignAdd,
            Some(TokenKind::MinusEquals) => ExpressionKind::AssignSub,
            Some(TokenKind::MultiplyEquals) => ExpressionKind::AssignMult,
            Some(TokenKind::DivideEquals) => ExpressionKind::AssignDiv,
            Some(TokenKind::ModulusEquals) => ExpressionKind::AssignMod,
            Some(TokenKind::BitwiseXorEquals) => ExpressionKind::AssignBitxor,
            Some(TokenKind::BitwiseAndEquals) => ExpressionKind::AssignBitand,
            Some(TokenKind::BitwiseOrEquals) => ExpressionKind::AssignBitor,
            Some(TokenKind::ShiftLeftEquals) => ExpressionKind::AssignLshift,
            Some(TokenKind::ShiftRightEquals) => ExpressionKind::AssignRshift,
            // >>>=
            Some(TokenKind::ShiftRight)
                if self.peek_kind(1)? == Some(TokenKind::GreaterThanOrEqualTo)
                    && self.adjacent()? =>
            {
                return Ok(Some((ExpressionKind::AssignUnsignedRshift, 2)));
            }
            _ => return Ok(None),
        };

        Ok(Some((kind, 1)))
    }

    // a = b += c
    fn parse_assignment(&mut self) -> ParseResult<Expression> {
        let target = self.parse_conditional()?;

        let Some((kind, tokens)) = self.assignment_operator()? else {
            return Ok(target);
        };

        for _ in 0..tokens {
            self.lexer.next()?;
        }

        let value = self.parse_expression()?;
        Ok(Expression::new(kind, vec![target, value]))
    }

    // c ? a : b
    fn parse_conditional(&mut self) -> ParseResult<Expression> {
        let condition = self.parse_binary(0)?;

        if !self.eat(TokenKind::Question)? {
            return Ok(condition);
        }

        let then = self.parse_expression()?;
        self.expect_next_to_be(TokenKind::Colon, "':'")?;
        let otherwise = self.nested(Self::parse_conditional)?;

        Ok(Expression::new(
            ExpressionKind::Conditional,
            vec![condition, then, otherwise],
        ))
    }

    fn binary_operator(&mut self, level: usize) -> ParseResult<Option<(ExpressionKind, usize)>> {
        let Some(kind) = self.peek_kind(0)? else {
            return Ok(None);
        };

        // `>>` `>=` spells `>>>=`, left to the assignment level
        if kind == TokenKind::ShiftRight
            && self.peek_kind(1)? == Some(TokenKind::GreaterThanOrEqualTo)
            && self.adjacent()?
        {
            return Ok(None);
        }

        // `>>` `>` spells the unsigned shift
        if kind == TokenKind::ShiftRight
            && self.peek_kind(1)? == Some(TokenKind::GreaterThan)
            && self.adjacent()?
        {
            return Ok(LADDER[level]
                .iter()
                .any(|(token, _)| *token == TokenKind::ShiftRight)
                .then_some((ExpressionKind::BitUnsignedRshift, 2)));
        }

        Ok(LADDER[level]
            .iter()
            .find(|(token, _)| *token == kind)
            .map(|(_, expression)| (*expression, 1)))
    }

    fn parse_binary(&mut self, level: usize) -> ParseResult<Expression> {
        if level == LADDER.len() {
            return self.parse_unary();
        }

        let mut expression = self.parse_binary(level + 1)?;

        loop {
            // x instanceof T sits on the relational rung
            if LADDER[level][0].0 == TokenKind::LessThan && self.peek_is_word("instanceof")? {
                self.lexer.next()?;
                let ty = self.parse_type_name()?;

                expression = Expression {
                    new_type: Some(ty),
                    ..Expression::new(ExpressionKind::TypeCompare, vec![expression])
                };
                continue;
            }

            let Some((kind, tokens)) = self.binary_operator(level)? else {
                break;
            };

            for _ in 0..tokens {
                self.lexer.next()?;
            }

            let rhs = self.parse_binary(level + 1)?;
            expression = Expression::new(kind, vec![expression, rhs]);
        }

        Ok(expression)
    }

    fn peek_is_word(&mut self, word: &str) -> ParseResult<bool> {
        Ok(self.lexer.peek()?.is_some_and(|token| {
            token.kind == TokenKind::Identifier && self.text(token.span) == word
        }))
    }

    /// `(T) x` is a cast when a parenthesized dotted name is directly followed
    /// by something that can start an operand other than a sign
    fn peek_is_cast(&mut self) -> ParseResult<bool> {
        if self.peek_kind(0)? != Some(TokenKind::OpenParen) {
            return Ok(false);
        }

        let mut n = 1;
        loop {
            if self.peek_kind(n)? != Some(TokenKind::Identifier) {
                return Ok(false);
            }

            n += 1;
            match self.peek_kind(n)? {
                Some(TokenKind::Dot) => n += 1,
                Some(TokenKind::CloseParen) => break,
                _ => return Ok(false),
            }
        }

        Ok(matches!(
            self.peek_kind(n + 1)?,
            Some(
                TokenKind::Identifier
                    | TokenKind::OpenParen
                    | TokenKind::Bang
                    | TokenKind::Tilde
                    | TokenKind::BooleanLiteral
                    | TokenKind::CharLiteral
                    | TokenKind::IntegerLiteral
                    | TokenKind::FloatLiteral
                    | TokenKind::StringLiteral
            )
        ))
    }

    fn parse_unary(&mut self) -> ParseResult<Expression> {
        self.nested(|parser| {
            if parser.peek_is_cast()? {
                parser.lexer.next()?;
                let ty = parser.parse_type_name()?;
                parser.expect_next_to_be(TokenKind::CloseParen, "')'")?;
                let operand = parser.parse_unary()?;

                return Ok(Expression {
                    new_type: Some(ty),
                    ..Expression::new(ExpressionKind::Cast, vec![operand])
                });
            }

            let kind = match parser.peek_kind(0)? {
                Some(TokenKind::Plus) => ExpressionKind::OpAdd,
                Some(TokenKind::Minus) => ExpressionKind::OpSub,
                Some(TokenKind::Increment) => ExpressionKind::OpInc,
                Some(TokenKind::Decrement) => ExpressionKind::OpDec,
                Some(TokenKind::Bang) => ExpressionKind::LogicalNot,
                Some(TokenKind::Tilde) => ExpressionKind::BitNot,
                _ => return parser.parse_postfix(),
            };

            parser.lexer.next()?;
            let operand = parser.parse_unary()?;

            Ok(Expression::new(kind, vec![operand]))
        })
    }

    fn parse_arguments(&mut self) -> ParseResult<Vec<Expression>> {
        self.expect_next_to_be(TokenKind::OpenParen, "'('")?;
        let arguments = self.parse_list(TokenKind::CloseParen)?;
        self.expect_next_to_be(TokenKind::CloseParen, "')'")?;

        Ok(arguments)
    }

    /// `item (, item)*` up to (not including) `close`
    fn parse_list(&mut self, close: TokenKind) -> ParseResult<Vec<Expression>> {
        let mut items = Vec::new();

        if self.peek_kind(0)? == Some(close) {
            return Ok(items);
        }

        loop {
            items.push(self.parse_expression()?);

            if !self.eat(TokenKind::Comma)? {
                break;
            }
        }

        Ok(items)
    }

    fn parse_name(&mut self) -> ParseResult<&'source str> {
        let token = self.expect_next_to_be(TokenKind::Identifier, "identifier")?;
        Ok(self.text(token.span))
    }

    // java.util.List
    fn parse_type_name(&mut self) -> ParseResult<Type> {
        let mut name = self.parse_name()?.to_string();

        while self.peek_kind(0)? == Some(TokenKind::Dot)
            && self.peek_kind(1)? == Some(TokenKind::Identifier)
        {
            self.lexer.next()?;
            name.push('.');
            name.push_str(self.parse_name()?);
        }

        Ok(Type {
            name,
            kind: TypeKind::Other,
        })
    }

    fn parse_postfix(&mut self) -> ParseResult<Expression> {
        let mut expression = self.parse_primary()?;

        while let Some(kind) = self.peek_kind(0)? {
            expression = match kind {
                // a.b, a.b()
                TokenKind::Dot => {
                    self.lexer.next()?;
                    let name = self.parse_name()?;

                    if self.peek_kind(0)? == Some(TokenKind::OpenParen) {
                        let arguments = self.parse_arguments()?;
                        Expression::method_call(Some(expression), name, arguments)
                    } else {
                        Expression::variable(Some(expression), name)
                    }
                }
                // a[i]
                TokenKind::OpenBracket => {
                    self.lexer.next()?;
                    let index = self.parse_expression()?;
                    self.expect_next_to_be(TokenKind::CloseBracket, "']'")?;

                    Expression::new(ExpressionKind::ArrayIndex, vec![expression, index])
                }
                // a++, a--
                TokenKind::Increment | TokenKind::Decrement => {
                    self.lexer.next()?;

                    let kind = if kind == TokenKind::Increment {
                        ExpressionKind::OpInc
                    } else {
                        ExpressionKind::OpDec
                    };

                    Expression {
                        is_postfix: true,
                        ..Expression::new(kind, vec![expression])
                    }
                }
                _ => break,
            };
        }

        Ok(expression)
    }

    fn parse_primary(&mut self) -> ParseResult<Expression> {
        let token = self.expect_next("expression")?;

        match token.kind {
            TokenKind::BooleanLiteral
            | TokenKind::CharLiteral
            | TokenKind::IntegerLiteral
            | TokenKind::FloatLiteral
            | TokenKind::StringLiteral => Ok(Expression::literal(self.text(token.span))),
            TokenKind::Identifier => {
                let name = self.text(token.span);

                match name {
                    "null" => Ok(Expression::literal(name)),
                    "new" => self.parse_new(),
                    _ if self.peek_kind(0)? == Some(TokenKind::OpenParen) => {
                        let arguments = self.parse_arguments()?;
                        Ok(Expression::method_call(None, name, arguments))
                    }
                    _ => Ok(Expression::variable(None, name)),
                }
            }
            // (a + b)
            TokenKind::OpenParen => {
                let inner = self.parse_expression()?;
                self.expect_next_to_be(TokenKind::CloseParen, "')'")?;

                Ok(Expression::paren(inner))
            }
            // { 1, 2 }
            TokenKind::OpenBrace => {
                let elements = self.parse_list(TokenKind::CloseBrace)?;
                self.expect_next_to_be(TokenKind::CloseBrace, "'}'")?;

                Ok(Expression::new(ExpressionKind::ArrayInit, elements))
            }
            _ => self.unexpected(token, "expression"),
        }
    }

    // new Foo(a), new int[n][m]
    fn parse_new(&mut self) -> ParseResult<Expression> {
        let ty = self.parse_type_name()?;

        if self.peek_kind(0)? == Some(TokenKind::OpenBracket) {
            let mut dimensions = Vec::new();

            while self.eat(TokenKind::OpenBracket)? {
                dimensions.push(self.parse_expression()?);
                self.expect_next_to_be(TokenKind::CloseBracket, "']'")?;
            }

            return Ok(Expression {
                new_type: Some(ty),
                ..Expression::new(ExpressionKind::NewArray, dimensions)
            });
        }

        let arguments = self.parse_arguments()?;

        Ok(Expression {
            new_type: Some(ty),
            ..Expression::new(ExpressionKind::New, arguments)
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::interchange::pretty_print::print_expression;

    #[rstest]
    #[case("a + b * c")]
    #[case("(a + b) * c")]
    #[case("a - (b - c)")]
    #[case("- -x")]
    #[case("-x--")]
    #[case("++a + b.func() - a--")]
    #[case("foo(x + 3, 2)[i].len")]
    #[case("x = y += 3")]
    #[case("a ? b : c ? d : e")]
    #[case("(String) o")]
    #[case("o instanceof java.util.List")]
    #[case("new Foo(1, 'c')")]
    #[case("new int[n][2]")]
    #[case("a >>> 2 >> 1")]
    #[case("x >>>= 3")]
    #[case("!done && ~mask != 0 || null == p")]
    #[case("{1, 2.5f, \"s\"}")]
    fn reprints_verbatim(#[case] text: &str) {
        let expression = parse_expression(text).unwrap();
        assert_eq!(print_expression(&expression), text);
    }

    #[test]
    fn negative_literals_are_negations() {
        let expression = parse_expression("-5").unwrap();
        assert_eq!(expression, Expression::negate(Expression::literal("5")));
    }

    #[test]
    fn left_associative_chains() {
        let expression = parse_expression("a - b - c").unwrap();

        assert_eq!(expression.kind, ExpressionKind::OpSub);
        assert_eq!(expression.expressions[0].kind, ExpressionKind::OpSub);
        assert_eq!(expression.expressions[1], Expression::variable(None, "c"));
    }

    #[test]
    fn parenthesized_names_before_signs_are_not_casts() {
        let expression = parse_expression("(x) - y").unwrap();

        assert_eq!(expression.kind, ExpressionKind::OpSub);
        assert_eq!(expression.expressions[0].kind, ExpressionKind::Paren);
    }

    #[test]
    fn unsigned_shift_assignment_is_not_a_shift() {
        let expression = parse_expression("x >>>= 3").unwrap();

        assert_eq!(expression.kind, ExpressionKind::AssignUnsignedRshift);
        assert_eq!(expression.expressions[0], Expression::variable(None, "x"));
        assert_eq!(
            parse_expression("x >>> 3").unwrap().kind,
            ExpressionKind::BitUnsignedRshift
        );
    }

    #[test]
    fn nesting_limit() {
        // Every parenthesis opens an expression and an operand
        let nested = |depth: usize| format!("{}x{}", "(".repeat(depth), ")".repeat(depth));

        assert!(parse_expression_with_depth(&nested(7), 16).is_ok());

        let error = parse_expression_with_depth(&nested(8), 16).unwrap_err();
        assert_eq!(error.message, "nesting exceeds the maximum depth of 16");

        let deepest = (DEFAULT_MAX_NESTING_DEPTH - 2) / 2;
        assert!(parse_expression(&nested(deepest)).is_ok());
        assert!(parse_expression(&nested(deepest + 1)).is_err());
    }

    #[test]
    fn trailing_input_is_rejected() {
        let error = parse_expression("a b").unwrap_err();

        assert_eq!(error.column, 3);
        assert!(error.message.contains("end of expression"));
    }
}
