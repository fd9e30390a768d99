use tracing::debug;

use super::{
    SourceFile, SyntaxError,
    ast::{
        Assignment, Ast, BinaryExpression, BinaryOperatorKind, CallExpression, CollectionKind,
        CollectionType, Component, DoWhileStatement, EmitStatement, ForStatement,
        FunctionLiteral, FunctionType, Identifier, IfStatement, IndexExpression, Literal,
        LiteralKind, MapType, NodeId, NodeKind, OutputType, QuantifierKind, QuantifierStatement,
        SelectorExpression, SwitchCase, SwitchStatement, TableType, TypeDecl, UnaryExpression,
        UnaryOperatorKind, VarDecl, ViewDecl, VisitClause, VisitTiming, WhileStatement,
    },
    lexer::{Keyword, LexMode, Lexer, Span, Token, TokenKind},
};
use crate::CompilerConfig;

type ParseResult<T> = Result<T, SyntaxError>;

#[derive(Debug)]
pub struct Parser<'source> {
    lexer: Lexer<'source>,
    ast: Ast<'source>,
    depth: usize,
    max_depth: usize,
}

impl<'source> Parser<'source> {
    pub fn parse_program(
        source_file: &'source SourceFile,
        config: &CompilerConfig,
    ) -> ParseResult<Ast<'source>> {
        let mut parser = Self {
            lexer: Lexer::new(source_file, LexMode::Boa),
            ast: Ast::new(source_file),
            depth: 0,
            max_depth: config.max_nesting_depth,
        };

        debug!(origin = %source_file.origin, "parsing program");

        let mut statements = Vec::new();

        while parser.lexer.peek()?.is_some() {
            statements.push(parser.parse_statement()?);
        }

        let root = parser.ast.push(
            Span::new(0, source_file.contents.len()),
            NodeKind::Program(statements),
        );
        parser.ast.set_root(root);

        debug!(nodes = parser.ast.len(), "parsed program");

        Ok(parser.ast)
    }

    fn text(&self, span: Span) -> &'source str {
        self.lexer.source().value_of_span(span)
    }

    fn error<T>(&self, span: Span, message: impl Into<String>) -> ParseResult<T> {
        Err(SyntaxError::new(self.lexer.source(), span, message))
    }

    fn unexpected<T>(&self, token: Token, expecting: &str) -> ParseResult<T> {
        self.error(
            token.span,
            format!(
                "expected {expecting} but found '{}'",
                self.text(token.span)
            ),
        )
    }

    fn expect_peek(&mut self, expecting: &str) -> ParseResult<Token> {
        let Some(token) = self.lexer.peek()? else {
            return self.error(
                self.lexer.eof_span(),
                format!("expected {expecting} but reached end of file"),
            );
        };

        Ok(token)
    }

    fn expect_next(&mut self, expecting: &str) -> ParseResult<Token> {
        let Some(token) = self.lexer.next()? else {
            return self.error(
                self.lexer.eof_span(),
                format!("expected {expecting} but reached end of file"),
            );
        };

        Ok(token)
    }

    fn expect_next_to_be(&mut self, kind: TokenKind) -> ParseResult<Token> {
        let expecting = describe(kind);
        let token = self.expect_next(&expecting)?;

        if token.kind != kind {
            return self.unexpected(token, &expecting);
        }

        Ok(token)
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> ParseResult<Token> {
        self.expect_next_to_be(TokenKind::Keyword(keyword))
    }

    fn peek_is(&mut self, kind: TokenKind) -> ParseResult<bool> {
        Ok(self.lexer.peek()?.is_some_and(|token| token.kind == kind))
    }

    /// Consumes the next token if it is of the given kind
    fn eat(&mut self, kind: TokenKind) -> ParseResult<Option<Token>> {
        if self.peek_is(kind)? {
            self.lexer.next()
        } else {
            Ok(None)
        }
    }

    /// Whether the upcoming tokens are `IDENT :`
    fn peek_is_labelled(&mut self) -> ParseResult<bool> {
        Ok(self.peek_is(TokenKind::Identifier)?
            && self
                .lexer
                .peek_nth(1)?
                .is_some_and(|token| token.kind == TokenKind::Colon))
    }

    /// Runs `f` one nesting level deeper, failing once the configured maximum
    /// depth is exceeded
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

    fn span_of(&self, id: NodeId) -> Span {
        self.ast.span(id)
    }

    fn identifier_at(&mut self, span: Span) -> Identifier {
        let symbol = self.ast.intern(self.text(span));
        Identifier { symbol, span }
    }

    // counts
    fn parse_identifier(&mut self) -> ParseResult<Identifier> {
        let token = self.expect_next_to_be(TokenKind::Identifier)?;
        Ok(self.identifier_at(token.span))
    }

    /// Parses `item (, item)*` up to (not including) `close`. An immediately
    /// closed list is empty.
    fn parse_comma_separated(
        &mut self,
        close: TokenKind,
        mut item: impl FnMut(&mut Self) -> ParseResult<NodeId>,
    ) -> ParseResult<Vec<NodeId>> {
        let mut items = Vec::new();

        if self.peek_is(close)? {
            return Ok(items);
        }

        loop {
            items.push(item(self)?);

            if self.eat(TokenKind::Comma)?.is_none() {
                break;
            }
        }

        Ok(items)
    }

    fn parse_statement(&mut self) -> ParseResult<NodeId> {
        self.nested(|parser| {
            let token = parser.expect_peek("statement")?;

            match token.kind {
                TokenKind::OpenBrace => parser.parse_block(),
                TokenKind::Keyword(Keyword::If) => parser.parse_if_statement(),
                TokenKind::Keyword(Keyword::While) => parser.parse_while_statement(),
                TokenKind::Keyword(Keyword::Do) => parser.parse_do_while_statement(),
                TokenKind::Keyword(Keyword::For) => parser.parse_for_statement(),
                TokenKind::Keyword(Keyword::Foreach | Keyword::Exists | Keyword::Ifall) => {
                    parser.parse_quantifier_statement()
                }
                TokenKind::Keyword(Keyword::Switch) => parser.parse_switch_statement(),
                TokenKind::Keyword(Keyword::Return) => parser.parse_return_statement(),
                TokenKind::Keyword(Keyword::Break) => parser.parse_jump_statement(NodeKind::Break),
                TokenKind::Keyword(Keyword::Continue) => {
                    parser.parse_jump_statement(NodeKind::Continue)
                }
                TokenKind::Keyword(Keyword::Stop) => parser.parse_jump_statement(NodeKind::Stop),
                TokenKind::Keyword(Keyword::Type) => parser.parse_type_declaration(),
                TokenKind::Keyword(Keyword::View) => parser.parse_view_declaration(),
                _ => {
                    let statement = parser.parse_simple_statement()?;
                    parser.expect_next_to_be(TokenKind::Semicolon)?;
                    Ok(statement)
                }
            }
        })
    }

    /// { statement* }
    fn parse_block(&mut self) -> ParseResult<NodeId> {
        let open = self.expect_next_to_be(TokenKind::OpenBrace)?;
        let mut statements = Vec::new();

        while self.expect_peek("statement or closing brace")?.kind != TokenKind::CloseBrace {
            statements.push(self.parse_statement()?);
        }

        let close = self.expect_next_to_be(TokenKind::CloseBrace)?;

        Ok(self
            .ast
            .push(open.span.to(close.span), NodeKind::Block(statements)))
    }

    /// ( expr )
    fn parse_condition(&mut self) -> ParseResult<NodeId> {
        self.expect_next_to_be(TokenKind::OpenParen)?;
        let condition = self.parse_expression()?;
        self.expect_next_to_be(TokenKind::CloseParen)?;

        Ok(condition)
    }

    /// if (cond) statement else statement
    fn parse_if_statement(&mut self) -> ParseResult<NodeId> {
        let keyword = self.expect_keyword(Keyword::If)?;
        let condition = self.parse_condition()?;
        let then_branch = self.parse_statement()?;

        let else_branch = match self.eat(TokenKind::Keyword(Keyword::Else))? {
            Some(_) => Some(self.parse_statement()?),
            None => None,
        };

        let span = keyword
            .span
            .to(self.span_of(else_branch.unwrap_or(then_branch)));

        Ok(self.ast.push(
            span,
            NodeKind::If(IfStatement {
                condition,
                then_branch,
                else_branch,
            }),
        ))
    }

    /// while (cond) statement
    fn parse_while_statement(&mut self) -> ParseResult<NodeId> {
        let keyword = self.expect_keyword(Keyword::While)?;
        let condition = self.parse_condition()?;
        let body = self.parse_statement()?;

        let span = keyword.span.to(self.span_of(body));

        Ok(self
            .ast
            .push(span, NodeKind::While(WhileStatement { condition, body })))
    }

    /// do statement while (cond);
    fn parse_do_while_statement(&mut self) -> ParseResult<NodeId> {
        let keyword = self.expect_keyword(Keyword::Do)?;
        let body = self.parse_statement()?;
        self.expect_keyword(Keyword::While)?;
        let condition = self.parse_condition()?;
        let semicolon = self.expect_next_to_be(TokenKind::Semicolon)?;

        Ok(self.ast.push(
            keyword.span.to(semicolon.span),
            NodeKind::DoWhile(DoWhileStatement { body, condition }),
        ))
    }

    /// for (init; cond; update) statement
    fn parse_for_statement(&mut self) -> ParseResult<NodeId> {
        let keyword = self.expect_keyword(Keyword::For)?;
        self.expect_next_to_be(TokenKind::OpenParen)?;

        let init = if self.peek_is(TokenKind::Semicolon)? {
            None
        } else {
            Some(self.parse_simple_statement()?)
        };
        self.expect_next_to_be(TokenKind::Semicolon)?;

        let condition = if self.peek_is(TokenKind::Semicolon)? {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_next_to_be(TokenKind::Semicolon)?;

        let update = if self.peek_is(TokenKind::CloseParen)? {
            None
        } else {
            Some(self.parse_simple_statement()?)
        };
        self.expect_next_to_be(TokenKind::CloseParen)?;

        let body = self.parse_statement()?;
        let span = keyword.span.to(self.span_of(body));

        Ok(self.ast.push(
            span,
            NodeKind::For(ForStatement {
                init,
                condition,
                update,
                body,
            }),
        ))
    }

    /// foreach (i: int; cond) statement
    fn parse_quantifier_statement(&mut self) -> ParseResult<NodeId> {
        let keyword = self.expect_next("quantifier")?;

        let kind = match keyword.kind {
            TokenKind::Keyword(Keyword::Foreach) => QuantifierKind::Foreach,
            TokenKind::Keyword(Keyword::Exists) => QuantifierKind::Exists,
            TokenKind::Keyword(Keyword::Ifall) => QuantifierKind::Ifall,
            _ => return self.unexpected(keyword, "quantifier"),
        };

        self.expect_next_to_be(TokenKind::OpenParen)?;
        let binding = self.parse_identifier()?;
        self.expect_next_to_be(TokenKind::Colon)?;
        let ty = self.parse_type()?;
        self.expect_next_to_be(TokenKind::Semicolon)?;
        let condition = self.parse_expression()?;
        self.expect_next_to_be(TokenKind::CloseParen)?;
        let body = self.parse_statement()?;

        let span = keyword.span.to(self.span_of(body));

        Ok(self.ast.push(
            span,
            NodeKind::Quantifier(QuantifierStatement {
                kind,
                binding,
                ty,
                condition,
                body,
            }),
        ))
    }

    /// switch (expr) { case a, b: statement* default: statement* }
    fn parse_switch_statement(&mut self) -> ParseResult<NodeId> {
        let keyword = self.expect_keyword(Keyword::Switch)?;
        let scrutinee = self.parse_condition()?;
        self.expect_next_to_be(TokenKind::OpenBrace)?;

        let mut cases = Vec::new();

        loop {
            let token = self.expect_peek("case, default or closing brace")?;

            match token.kind {
                TokenKind::CloseBrace => break,
                TokenKind::Keyword(Keyword::Case | Keyword::Default) => {
                    cases.push(self.parse_switch_case()?)
                }
                _ => return self.unexpected(token, "case, default or closing brace"),
            }
        }

        let close = self.expect_next_to_be(TokenKind::CloseBrace)?;

        Ok(self.ast.push(
            keyword.span.to(close.span),
            NodeKind::Switch(SwitchStatement { scrutinee, cases }),
        ))
    }

    fn parse_switch_case(&mut self) -> ParseResult<NodeId> {
        let keyword = self.expect_next("case or default")?;

        let values = if keyword.kind == TokenKind::Keyword(Keyword::Case) {
            self.parse_comma_separated(TokenKind::Colon, Self::parse_expression)?
        } else {
            Vec::new()
        };

        let colon = self.expect_next_to_be(TokenKind::Colon)?;
        let mut body = Vec::new();

        while !matches!(
            self.expect_peek("statement")?.kind,
            TokenKind::Keyword(Keyword::Case | Keyword::Default) | TokenKind::CloseBrace
        ) {
            body.push(self.parse_statement()?);
        }

        let end = body
            .last()
            .map(|statement| self.span_of(*statement))
            .unwrap_or(colon.span);

        Ok(self.ast.push(
            keyword.span.to(end),
            NodeKind::Case(SwitchCase { values, body }),
        ))
    }

    /// return expr?;
    fn parse_return_statement(&mut self) -> ParseResult<NodeId> {
        let keyword = self.expect_keyword(Keyword::Return)?;

        let value = if self.peek_is(TokenKind::Semicolon)? {
            None
        } else {
            Some(self.parse_expression()?)
        };

        let semicolon = self.expect_next_to_be(TokenKind::Semicolon)?;

        Ok(self
            .ast
            .push(keyword.span.to(semicolon.span), NodeKind::Return(value)))
    }

    /// break; continue; stop;
    fn parse_jump_statement(&mut self, kind: NodeKind) -> ParseResult<NodeId> {
        let keyword = self.expect_next("statement")?;
        let semicolon = self.expect_next_to_be(TokenKind::Semicolon)?;

        Ok(self.ast.push(keyword.span.to(semicolon.span), kind))
    }

    /// type Name = type;
    fn parse_type_declaration(&mut self) -> ParseResult<NodeId> {
        let keyword = self.expect_keyword(Keyword::Type)?;
        let name = self.parse_identifier()?;
        self.expect_next_to_be(TokenKind::Equals)?;
        let ty = self.parse_type()?;
        let semicolon = self.expect_next_to_be(TokenKind::Semicolon)?;

        Ok(self.ast.push(
            keyword.span.to(semicolon.span),
            NodeKind::TypeDecl(TypeDecl { name, ty }),
        ))
    }

    /// view name { statement* }
    fn parse_view_declaration(&mut self) -> ParseResult<NodeId> {
        let keyword = self.expect_keyword(Keyword::View)?;
        let name = self.parse_identifier()?;
        let body = self.parse_block()?;

        let span = keyword.span.to(self.span_of(body));

        Ok(self.ast.push(span, NodeKind::View(ViewDecl { name, body })))
    }

    /// A statement without its trailing semicolon: a declaration, assignment,
    /// emit or bare expression
    fn parse_simple_statement(&mut self) -> ParseResult<NodeId> {
        if self.peek_is_labelled()? {
            return self.parse_variable_declaration();
        }

        let expression = self.parse_expression()?;

        if self.eat(TokenKind::Equals)?.is_some() {
            let value = self.parse_expression()?;
            let span = self.span_of(expression).to(self.span_of(value));

            return Ok(self.ast.push(
                span,
                NodeKind::Assignment(Assignment {
                    target: expression,
                    value,
                }),
            ));
        }

        if let NodeKind::Binary(binary) = self.ast.kind(expression) {
            if binary.operator == BinaryOperatorKind::ShiftLeft {
                let (target, value) = (binary.lhs, binary.rhs);
                return self.finish_emit(expression, target, value);
            }
        }

        Ok(self.ast.push(
            self.span_of(expression),
            NodeKind::ExpressionStatement(expression),
        ))
    }

    /// Turns a top level `target << value` in place into an emit statement,
    /// picking up an optional `weight expr`
    fn finish_emit(&mut self, id: NodeId, target: NodeId, value: NodeId) -> ParseResult<NodeId> {
        let weight = match self.eat(TokenKind::Keyword(Keyword::Weight))? {
            Some(_) => Some(self.parse_expression()?),
            None => None,
        };

        let span = self.span_of(id).to(self.span_of(weight.unwrap_or(value)));

        self.ast.rekind(
            id,
            span,
            NodeKind::Emit(EmitStatement {
                target,
                value,
                weight,
            }),
        );

        Ok(id)
    }

    /// name: type = expr, name: type or name := expr
    fn parse_variable_declaration(&mut self) -> ParseResult<NodeId> {
        let name = self.parse_identifier()?;
        self.expect_next_to_be(TokenKind::Colon)?;

        let ty = if self.peek_is(TokenKind::Equals)? {
            None
        } else {
            Some(self.parse_type()?)
        };

        let initializer = match self.eat(TokenKind::Equals)? {
            Some(_) => Some(self.parse_expression()?),
            None => None,
        };

        let end = initializer
            .or(ty)
            .map(|id| self.span_of(id))
            .unwrap_or(name.span);

        Ok(self.ast.push(
            name.span.to(end),
            NodeKind::VarDecl(VarDecl {
                name,
                ty,
                initializer,
            }),
        ))
    }

    /// Expressions, from loosest to tightest binding:
    ///
    /// ```text
    /// logical_or  := logical_and ("||" logical_and)*
    /// logical_and := comparison ("&&" comparison)*
    /// comparison  := bitwise_or (("==" | "!=" | "<" | "<=" | ">" | ">=") bitwise_or)*
    /// bitwise_or  := bitwise_xor ("|" bitwise_xor)*
    /// bitwise_xor := bitwise_and ("^" bitwise_and)*
    /// bitwise_and := bit_shift ("&" bit_shift)*
    /// bit_shift   := term (("<<" | ">>") term)*
    /// term        := factor (("+" | "-") factor)*
    /// factor      := unary (("*" | "/" | "%") unary)*
    /// unary       := ("-" | "+" | "!" | "~" | "++" | "--") unary | postfix
    /// postfix     := atom ("(" args ")" | "[" expr "]" | "." IDENT | "++" | "--")*
    /// ```
    pub(crate) fn parse_expression(&mut self) -> ParseResult<NodeId> {
        self.parse_logical_or_expression()
    }

    /// Parses a left associative chain of binary operators, all at the same
    /// precedence level
    fn parse_binary_chain(
        &mut self,
        operand: fn(&mut Self) -> ParseResult<NodeId>,
        operator: fn(TokenKind) -> Option<BinaryOperatorKind>,
    ) -> ParseResult<NodeId> {
        let mut expression = operand(self)?;

        while let Some(kind) = self.lexer.peek()?.and_then(|token| operator(token.kind)) {
            self.lexer.next()?;
            let rhs = operand(self)?;
            let span = self.span_of(expression).to(self.span_of(rhs));

            expression = self.ast.push(
                span,
                NodeKind::Binary(BinaryExpression {
                    operator: kind,
                    lhs: expression,
                    rhs,
                }),
            );
        }

        Ok(expression)
    }

    fn parse_logical_or_expression(&mut self) -> ParseResult<NodeId> {
        self.parse_binary_chain(Self::parse_logical_and_expression, |kind| {
            (kind == TokenKind::LogicalOr).then_some(BinaryOperatorKind::LogicalOr)
        })
    }

    fn parse_logical_and_expression(&mut self) -> ParseResult<NodeId> {
        self.parse_binary_chain(Self::parse_comparison_expression, |kind| {
            (kind == TokenKind::LogicalAnd).then_some(BinaryOperatorKind::LogicalAnd)
        })
    }

    fn parse_comparison_expression(&mut self) -> ParseResult<NodeId> {
        self.parse_binary_chain(Self::parse_bitwise_or_expression, |kind| match kind {
            TokenKind::DoubleEquals => Some(BinaryOperatorKind::Equals),
            TokenKind::NotEquals => Some(BinaryOperatorKind::NotEquals),
            TokenKind::LessThan => Some(BinaryOperatorKind::LessThan),
            TokenKind::LessThanOrEqualTo => Some(BinaryOperatorKind::LessThanOrEqualTo),
            TokenKind::GreaterThan => Some(BinaryOperatorKind::GreaterThan),
            TokenKind::GreaterThanOrEqualTo => Some(BinaryOperatorKind::GreaterThanOrEqualTo),
            _ => None,
        })
    }

    fn parse_bitwise_or_expression(&mut self) -> ParseResult<NodeId> {
        self.parse_binary_chain(Self::parse_bitwise_xor_expression, |kind| {
            (kind == TokenKind::BitwiseOr).then_some(BinaryOperatorKind::BitwiseOr)
        })
    }

    fn parse_bitwise_xor_expression(&mut self) -> ParseResult<NodeId> {
        self.parse_binary_chain(Self::parse_bitwise_and_expression, |kind| {
            (kind == TokenKind::BitwiseXor).then_some(BinaryOperatorKind::BitwiseXor)
        })
    }

    fn parse_bitwise_and_expression(&mut self) -> ParseResult<NodeId> {
        self.parse_binary_chain(Self::parse_bit_shift_expression, |kind| {
            (kind == TokenKind::BitwiseAnd).then_some(BinaryOperatorKind::BitwiseAnd)
        })
    }

    fn parse_bit_shift_expression(&mut self) -> ParseResult<NodeId> {
        self.parse_binary_chain(Self::parse_term_expression, |kind| match kind {
            TokenKind::ShiftLeft => Some(BinaryOperatorKind::ShiftLeft),
            TokenKind::ShiftRight => Some(BinaryOperatorKind::ShiftRight),
            _ => None,
        })
    }

    fn parse_term_expression(&mut self) -> ParseResult<NodeId> {
        self.parse_binary_chain(Self::parse_factor_expression, |kind| match kind {
            TokenKind::Plus => Some(BinaryOperatorKind::Add),
            TokenKind::Minus => Some(BinaryOperatorKind::Subtract),
            _ => None,
        })
    }

    fn parse_factor_expression(&mut self) -> ParseResult<NodeId> {
        self.parse_binary_chain(Self::parse_unary_expression, |kind| match kind {
            TokenKind::Asterisk => Some(BinaryOperatorKind::Multiply),
            TokenKind::Divide => Some(BinaryOperatorKind::Divide),
            TokenKind::Modulus => Some(BinaryOperatorKind::Modulus),
            _ => None,
        })
    }

    fn parse_unary_expression(&mut self) -> ParseResult<NodeId> {
        self.nested(|parser| {
            let token = parser.expect_peek("expression")?;

            let operator = match token.kind {
                TokenKind::Minus => UnaryOperatorKind::Negate,
                TokenKind::Plus => UnaryOperatorKind::Plus,
                TokenKind::Bang => UnaryOperatorKind::LogicalNot,
                TokenKind::Tilde => UnaryOperatorKind::BitwiseNot,
                TokenKind::Increment => UnaryOperatorKind::PreIncrement,
                TokenKind::Decrement => UnaryOperatorKind::PreDecrement,
                _ => return parser.parse_postfix_expression(),
            };

            parser.lexer.next()?;
            let operand = parser.parse_unary_expression()?;
            let span = token.span.to(parser.span_of(operand));

            Ok(parser
                .ast
                .push(span, NodeKind::Unary(UnaryExpression { operator, operand })))
        })
    }

    fn parse_postfix_expression(&mut self) -> ParseResult<NodeId> {
        let mut expression = self.parse_atom()?;

        while let Some(token) = self.lexer.peek()? {
            let start = self.span_of(expression);

            expression = match token.kind {
                // f(a, b)
                TokenKind::OpenParen => {
                    self.lexer.next()?;
                    let arguments =
                        self.parse_comma_separated(TokenKind::CloseParen, Self::parse_expression)?;
                    let close = self.expect_next_to_be(TokenKind::CloseParen)?;

                    self.ast.push(
                        start.to(close.span),
                        NodeKind::Call(CallExpression {
                            target: expression,
                            arguments,
                        }),
                    )
                }
                // counts[key]
                TokenKind::OpenBracket => {
                    self.lexer.next()?;
                    let index = self.parse_expression()?;
                    let close = self.expect_next_to_be(TokenKind::CloseBracket)?;

                    self.ast.push(
                        start.to(close.span),
                        NodeKind::Index(IndexExpression {
                            target: expression,
                            index,
                        }),
                    )
                }
                // input.code_repositories
                TokenKind::Dot => {
                    self.lexer.next()?;
                    let field = self.expect_next("field name")?;

                    // Field names may collide with keywords (`x.type`)
                    if !matches!(field.kind, TokenKind::Identifier | TokenKind::Keyword(_)) {
                        return self.unexpected(field, "field name");
                    }

                    let field = self.identifier_at(field.span);

                    self.ast.push(
                        start.to(field.span),
                        NodeKind::Selector(SelectorExpression {
                            target: expression,
                            field,
                        }),
                    )
                }
                TokenKind::Increment | TokenKind::Decrement => {
                    self.lexer.next()?;

                    let operator = if token.kind == TokenKind::Increment {
                        UnaryOperatorKind::PostIncrement
                    } else {
                        UnaryOperatorKind::PostDecrement
                    };

                    self.ast.push(
                        start.to(token.span),
                        NodeKind::Unary(UnaryExpression {
                            operator,
                            operand: expression,
                        }),
                    )
                }
                _ => break,
            };
        }

        Ok(expression)
    }

    fn parse_atom(&mut self) -> ParseResult<NodeId> {
        let token = self.expect_next("expression")?;

        let literal_kind = match token.kind {
            TokenKind::BooleanLiteral => Some(LiteralKind::Boolean),
            TokenKind::IntegerLiteral => Some(LiteralKind::Integer),
            TokenKind::FloatLiteral => Some(LiteralKind::Float),
            TokenKind::StringLiteral => Some(LiteralKind::String),
            TokenKind::TimeLiteral => Some(LiteralKind::Time),
            _ => None,
        };

        if let Some(kind) = literal_kind {
            let symbol = self.ast.intern(self.text(token.span));
            return Ok(self
                .ast
                .push(token.span, NodeKind::Literal(Literal { kind, symbol })));
        }

        match token.kind {
            TokenKind::Identifier => {
                let identifier = self.identifier_at(token.span);
                Ok(self.ast.push(token.span, NodeKind::Identifier(identifier)))
            }
            // (expr)
            TokenKind::OpenParen => {
                let inner = self.parse_expression()?;
                let close = self.expect_next_to_be(TokenKind::CloseParen)?;

                Ok(self
                    .ast
                    .push(token.span.to(close.span), NodeKind::Paren(inner)))
            }
            // {a, b, c}
            TokenKind::OpenBrace => {
                let items =
                    self.parse_comma_separated(TokenKind::CloseBrace, Self::parse_expression)?;
                let close = self.expect_next_to_be(TokenKind::CloseBrace)?;

                Ok(self
                    .ast
                    .push(token.span.to(close.span), NodeKind::Composite(items)))
            }
            TokenKind::Keyword(Keyword::Function) => self.parse_function_literal(token),
            TokenKind::Keyword(Keyword::Visitor) => self.parse_visitor_literal(token),
            _ => self.unexpected(token, "expression"),
        }
    }

    /// function(a: int): int { ... }, after the `function` keyword
    fn parse_function_literal(&mut self, keyword: Token) -> ParseResult<NodeId> {
        let ty = self.parse_function_type(keyword)?;
        let body = self.parse_block()?;

        let span = keyword.span.to(self.span_of(body));

        Ok(self
            .ast
            .push(span, NodeKind::FunctionLiteral(FunctionLiteral { ty, body })))
    }

    /// visitor { before n: Project -> stmt ... }, after the `visitor` keyword
    fn parse_visitor_literal(&mut self, keyword: Token) -> ParseResult<NodeId> {
        self.expect_next_to_be(TokenKind::OpenBrace)?;
        let mut clauses = Vec::new();

        while self.expect_peek("visit clause or closing brace")?.kind != TokenKind::CloseBrace {
            clauses.push(self.parse_visit_clause()?);
        }

        let close = self.expect_next_to_be(TokenKind::CloseBrace)?;

        Ok(self
            .ast
            .push(keyword.span.to(close.span), NodeKind::VisitorLiteral(clauses)))
    }

    /// before _ -> stmt, before n: T -> stmt or before T, U -> stmt
    fn parse_visit_clause(&mut self) -> ParseResult<NodeId> {
        let keyword = self.expect_next("before or after")?;

        let timing = match keyword.kind {
            TokenKind::Keyword(Keyword::Before) => VisitTiming::Before,
            TokenKind::Keyword(Keyword::After) => VisitTiming::After,
            _ => return self.unexpected(keyword, "before or after"),
        };

        let next = self.expect_peek("visit type")?;

        let (binding, types) =
            if next.kind == TokenKind::Identifier && self.text(next.span) == "_" {
                self.lexer.next()?;
                (None, Vec::new())
            } else if self.peek_is_labelled()? {
                let binding = self.parse_identifier()?;
                self.expect_next_to_be(TokenKind::Colon)?;
                (Some(binding), vec![self.parse_type()?])
            } else {
                let mut types = vec![self.parse_type()?];

                while self.eat(TokenKind::Comma)?.is_some() {
                    types.push(self.parse_type()?);
                }

                (None, types)
            };

        self.expect_next_to_be(TokenKind::Arrow)?;
        let body = self.parse_statement()?;

        let span = keyword.span.to(self.span_of(body));

        Ok(self.ast.push(
            span,
            NodeKind::VisitClause(VisitClause {
                timing,
                binding,
                types,
                body,
            }),
        ))
    }

    fn parse_type(&mut self) -> ParseResult<NodeId> {
        self.nested(|parser| {
            let token = parser.expect_next("type")?;

            match token.kind {
                // array of T
                TokenKind::Keyword(Keyword::Array) => {
                    parser.expect_keyword(Keyword::Of)?;
                    let element = parser.parse_type()?;
                    let span = token.span.to(parser.span_of(element));

                    Ok(parser.ast.push(span, NodeKind::ArrayType(element)))
                }
                // map[K] of V
                TokenKind::Keyword(Keyword::Map) => {
                    parser.expect_next_to_be(TokenKind::OpenBracket)?;
                    let key = parser.parse_type()?;
                    parser.expect_next_to_be(TokenKind::CloseBracket)?;
                    parser.expect_keyword(Keyword::Of)?;
                    let value = parser.parse_type()?;
                    let span = token.span.to(parser.span_of(value));

                    Ok(parser
                        .ast
                        .push(span, NodeKind::MapType(MapType { key, value })))
                }
                // stack of T
                TokenKind::Keyword(keyword @ (Keyword::Stack | Keyword::Set | Keyword::Queue)) => {
                    let kind = match keyword {
                        Keyword::Stack => CollectionKind::Stack,
                        Keyword::Set => CollectionKind::Set,
                        _ => CollectionKind::Queue,
                    };

                    parser.expect_keyword(Keyword::Of)?;
                    let element = parser.parse_type()?;
                    let span = token.span.to(parser.span_of(element));

                    Ok(parser.ast.push(
                        span,
                        NodeKind::CollectionType(CollectionType { kind, element }),
                    ))
                }
                // {name: string, int}
                TokenKind::OpenBrace => {
                    let components =
                        parser.parse_comma_separated(TokenKind::CloseBrace, Self::parse_component)?;
                    let close = parser.expect_next_to_be(TokenKind::CloseBrace)?;

                    Ok(parser
                        .ast
                        .push(token.span.to(close.span), NodeKind::TupleType(components)))
                }
                TokenKind::Keyword(Keyword::Function) => parser.parse_function_type(token),
                TokenKind::Keyword(Keyword::Output) => parser.parse_output_type(token),
                // table[year: int] of count: int
                TokenKind::Keyword(Keyword::Table) => {
                    let indices = parser.parse_index_components()?;
                    parser.expect_keyword(Keyword::Of)?;
                    let value = parser.parse_component()?;
                    let span = token.span.to(parser.span_of(value));

                    Ok(parser
                        .ast
                        .push(span, NodeKind::TableType(TableType { indices, value })))
                }
                // model of T
                TokenKind::Keyword(Keyword::Model) => {
                    parser.expect_keyword(Keyword::Of)?;
                    let inner = parser.parse_type()?;
                    let span = token.span.to(parser.span_of(inner));

                    Ok(parser.ast.push(span, NodeKind::ModelType(inner)))
                }
                TokenKind::Keyword(Keyword::Visitor) => {
                    Ok(parser.ast.push(token.span, NodeKind::VisitorType))
                }
                TokenKind::Identifier => {
                    let name = parser.identifier_at(token.span);
                    Ok(parser.ast.push(token.span, NodeKind::NamedType(name)))
                }
                _ => parser.unexpected(token, "type"),
            }
        })
    }

    /// (a: int, b: string): int, after the `function` keyword
    fn parse_function_type(&mut self, keyword: Token) -> ParseResult<NodeId> {
        self.expect_next_to_be(TokenKind::OpenParen)?;
        let parameters = self.parse_comma_separated(TokenKind::CloseParen, Self::parse_component)?;
        let close = self.expect_next_to_be(TokenKind::CloseParen)?;

        let return_type = match self.eat(TokenKind::Colon)? {
            Some(_) => Some(self.parse_type()?),
            None => None,
        };

        let end = return_type.map(|ty| self.span_of(ty)).unwrap_or(close.span);

        Ok(self.ast.push(
            keyword.span.to(end),
            NodeKind::FunctionType(FunctionType {
                parameters,
                return_type,
            }),
        ))
    }

    /// sum(10)[year: int] of count: int weight int, after the `output` keyword
    fn parse_output_type(&mut self, keyword: Token) -> ParseResult<NodeId> {
        // Aggregator names may collide with keywords (`output set of int`)
        let name = self.expect_next("aggregator name")?;
        if !matches!(name.kind, TokenKind::Identifier | TokenKind::Keyword(_)) {
            return self.unexpected(name, "aggregator name");
        }
        let aggregator = self.identifier_at(name.span);

        let arguments = match self.eat(TokenKind::OpenParen)? {
            Some(_) => {
                let arguments =
                    self.parse_comma_separated(TokenKind::CloseParen, Self::parse_expression)?;
                self.expect_next_to_be(TokenKind::CloseParen)?;
                arguments
            }
            None => Vec::new(),
        };

        let indices = self.parse_index_components()?;
        self.expect_keyword(Keyword::Of)?;
        let value = self.parse_component()?;

        let weight = match self.eat(TokenKind::Keyword(Keyword::Weight))? {
            Some(_) => Some(self.parse_type()?),
            None => None,
        };

        let end = self.span_of(weight.unwrap_or(value));

        Ok(self.ast.push(
            keyword.span.to(end),
            NodeKind::OutputType(OutputType {
                aggregator,
                arguments,
                indices,
                value,
                weight,
            }),
        ))
    }

    /// ([component])*
    fn parse_index_components(&mut self) -> ParseResult<Vec<NodeId>> {
        let mut indices = Vec::new();

        while self.eat(TokenKind::OpenBracket)?.is_some() {
            indices.push(self.parse_component()?);
            self.expect_next_to_be(TokenKind::CloseBracket)?;
        }

        Ok(indices)
    }

    /// name: type, or just type
    fn parse_component(&mut self) -> ParseResult<NodeId> {
        let name = if self.peek_is_labelled()? {
            let name = self.parse_identifier()?;
            self.expect_next_to_be(TokenKind::Colon)?;
            Some(name)
        } else {
            None
        };

        let ty = self.parse_type()?;
        let start = name.map(|name| name.span).unwrap_or(self.span_of(ty));
        let span = start.to(self.span_of(ty));

        Ok(self
            .ast
            .push(span, NodeKind::Component(Component { name, ty })))
    }
}

/// Human readable name of a token kind for error messages
fn describe(kind: TokenKind) -> String {
    let symbol = match kind {
        TokenKind::Keyword(keyword) => return format!("'{keyword}'"),
        TokenKind::Identifier => return "identifier".to_string(),
        TokenKind::OpenParen => "(",
        TokenKind::CloseParen => ")",
        TokenKind::OpenBracket => "[",
        TokenKind::CloseBracket => "]",
        TokenKind::OpenBrace => "{",
        TokenKind::CloseBrace => "}",
        TokenKind::Semicolon => ";",
        TokenKind::Comma => ",",
        TokenKind::Colon => ":",
        TokenKind::Arrow => "->",
        TokenKind::Equals => "=",
        other => return format!("{other:?}"),
    };

    format!("'{symbol}'")
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;

    fn parse(source: &SourceFile) -> Ast<'_> {
        Parser::parse_program(source, &CompilerConfig::default()).unwrap()
    }

    fn statements(ast: &Ast<'_>) -> Vec<NodeId> {
        ast.children(ast.root().unwrap())
    }

    #[test]
    fn declarations() {
        let source = SourceFile::memory(indoc! {"
            a := 1;
            b: int;
            c: array of string = {\"x\", \"y\"};
        "});
        let ast = parse(&source);
        let statements = statements(&ast);

        assert_eq!(statements.len(), 3);

        let NodeKind::VarDecl(a) = ast.kind(statements[0]) else {
            panic!("expected a declaration");
        };
        assert_eq!(ast.identifier(a.name), "a");
        assert_eq!(a.ty, None);
        assert!(a.initializer.is_some());

        let NodeKind::VarDecl(b) = ast.kind(statements[1]) else {
            panic!("expected a declaration");
        };
        assert!(matches!(ast.kind(b.ty.unwrap()), NodeKind::NamedType(_)));
        assert_eq!(b.initializer, None);

        let NodeKind::VarDecl(c) = ast.kind(statements[2]) else {
            panic!("expected a declaration");
        };
        assert!(matches!(ast.kind(c.ty.unwrap()), NodeKind::ArrayType(_)));
        assert!(matches!(
            ast.kind(c.initializer.unwrap()),
            NodeKind::Composite(items) if items.len() == 2
        ));
    }

    #[test]
    fn top_level_shift_becomes_emit() {
        let source = SourceFile::memory("counts[\"a\"] << 1 weight 2;");
        let ast = parse(&source);
        let statement = statements(&ast)[0];

        let NodeKind::Emit(emit) = ast.kind(statement) else {
            panic!("expected an emit statement, got {:?}", ast.kind(statement));
        };

        assert!(matches!(ast.kind(emit.target), NodeKind::Index(_)));
        assert_eq!(ast.parent(emit.target), Some(statement));
        assert_eq!(ast.parent(emit.weight.unwrap()), Some(statement));
        assert_eq!(ast.span(statement), Span::new(0, source.contents.len() - 1));
    }

    #[test]
    fn precedence() {
        let source = SourceFile::memory("x := 1 + 2 * 3 == 7 && !done;");
        let ast = parse(&source);

        let NodeKind::VarDecl(decl) = ast.kind(statements(&ast)[0]) else {
            panic!("expected a declaration");
        };

        let NodeKind::Binary(and) = ast.kind(decl.initializer.unwrap()) else {
            panic!("expected a binary expression");
        };
        assert_eq!(and.operator, BinaryOperatorKind::LogicalAnd);

        let NodeKind::Binary(equals) = ast.kind(and.lhs) else {
            panic!("expected a binary expression");
        };
        assert_eq!(equals.operator, BinaryOperatorKind::Equals);

        let NodeKind::Binary(sum) = ast.kind(equals.lhs) else {
            panic!("expected a binary expression");
        };
        assert_eq!(sum.operator, BinaryOperatorKind::Add);
        assert!(matches!(
            ast.kind(sum.rhs),
            NodeKind::Binary(BinaryExpression {
                operator: BinaryOperatorKind::Multiply,
                ..
            })
        ));
    }

    #[test]
    fn every_child_points_back_to_its_parent() {
        let source = SourceFile::memory(indoc! {"
            counts: output sum[string] of int;
            visit(input, visitor {
                before n: Project -> {
                    foreach (i: int; def(n.code_repositories[i]))
                        counts[n.name] << 1;
                }
                after _ -> stop;
            });
        "});
        let ast = parse(&source);

        let mut stack = vec![ast.root().unwrap()];
        let mut seen = 0;

        while let Some(id) = stack.pop() {
            for child in ast.children(id) {
                assert_eq!(ast.parent(child), Some(id));
                stack.push(child);
            }
            seen += 1;
        }

        assert_eq!(seen, ast.len());
    }

    #[test]
    fn missing_semicolon_reports_position() {
        let source = SourceFile::memory("a := 1\nb := 2;");
        let error = Parser::parse_program(&source, &CompilerConfig::default()).unwrap_err();

        assert_eq!(error.message, "expected ';' but found 'b'");
        assert_eq!((error.line, error.column), (2, 1));
    }

    #[test]
    fn nesting_limit() {
        let config = CompilerConfig {
            max_nesting_depth: 16,
            ..CompilerConfig::default()
        };

        let shallow = SourceFile::memory(format!("x := {}1{};", "(".repeat(4), ")".repeat(4)));
        assert!(Parser::parse_program(&shallow, &config).is_ok());

        // The statement and the outermost operand take two levels
        let deepest = SourceFile::memory(format!("x := {}1{};", "(".repeat(14), ")".repeat(14)));
        assert!(Parser::parse_program(&deepest, &config).is_ok());

        let deep = SourceFile::memory(format!("x := {}1{};", "(".repeat(15), ")".repeat(15)));
        let error = Parser::parse_program(&deep, &config).unwrap_err();
        assert_eq!(error.message, "nesting exceeds the maximum depth of 16");
    }
}
