//! Folds numeric arithmetic in place using the normal-form reducer.
//!
//! Each maximal `+ - * /` subtree of numeric type is lowered to an interchange
//! expression, reduced, and raised back into the arena when the reduction
//! changed it. Integer divisions are never lowered, so arithmetic around them
//! folds only in the subtrees beside them. In [`FoldMode::Constants`] only
//! subtrees made entirely of decimal literals are touched.
//! [`FoldMode::Algebraic`] also rewrites around variables and other numeric
//! operands, which it treats as opaque atoms.

use tracing::{debug, trace};

use super::{primitive::PrimitiveKind, ty::Type, type_checker::TypeCheckResult};
use crate::{
    FoldMode,
    frontend::{
        ast::{
            Ast, BinaryExpression, BinaryOperatorKind, Identifier, Literal, LiteralKind, NodeId,
            NodeKind, UnaryExpression, UnaryOperatorKind,
            visit::{InternalError, RewriteVisitor, Traversal, rewrite},
        },
        lexer::Span,
    },
    interchange::{Expression, ExpressionKind, pretty_print::print_expression},
    normal_form::{number::Number, reduce},
};

/// Opaque operands are lowered to variables with this prefix, which no Boa
/// identifier can start with
const PLACEHOLDER: char = '#';

#[derive(Debug)]
pub struct ConstantFolder<'t> {
    mode: FoldMode,
    types: &'t TypeCheckResult,
    folded: usize,
}

impl<'t> ConstantFolder<'t> {
    pub fn new(mode: FoldMode, types: &'t TypeCheckResult) -> Self {
        Self {
            mode,
            types,
            folded: 0,
        }
    }

    /// Folds the whole program and returns how many subtrees were rewritten
    pub fn fold(mut self, ast: &mut Ast<'_>) -> Result<usize, InternalError> {
        debug!(mode = %self.mode, "folding arithmetic");

        if let Some(root) = ast.root() {
            rewrite(&mut self, ast, root)?;
        }

        debug!(folded = self.folded, "folded arithmetic");
        Ok(self.folded)
    }

    fn is_numeric(&self, id: NodeId) -> bool {
        matches!(
            self.types.type_of(id),
            Some(Type::Primitive(PrimitiveKind::Int | PrimitiveKind::Float))
        )
    }

    fn is_float(&self, id: NodeId) -> bool {
        matches!(
            self.types.type_of(id),
            Some(Type::Primitive(PrimitiveKind::Float))
        )
    }

    /// Lowers the arithmetic rooted at `id`. Operands that are not arithmetic
    /// become atoms, or abort the lowering in constants mode.
    fn lower(
        &mut self,
        ast: &mut Ast<'_>,
        id: NodeId,
        atoms: &mut Vec<NodeId>,
    ) -> Result<Option<Expression>, InternalError> {
        let expression = match ast.kind(id).clone() {
            // Integer division truncates, so `6 / 4 * 2` must not regroup
            NodeKind::Binary(BinaryExpression {
                operator: BinaryOperatorKind::Divide,
                ..
            }) if !self.is_float(id) => return Ok(None),
            NodeKind::Binary(BinaryExpression { operator, lhs, rhs }) => {
                match arithmetic_kind(operator) {
                    Some(kind) => {
                        let Some(lhs) = self.lower(ast, lhs, atoms)? else {
                            return Ok(None);
                        };
                        let Some(rhs) = self.lower(ast, rhs, atoms)? else {
                            return Ok(None);
                        };

                        Expression::new(kind, vec![lhs, rhs])
                    }
                    None => return self.lower_atom(ast, id, atoms),
                }
            }
            NodeKind::Unary(UnaryExpression { operator, operand })
                if matches!(operator, UnaryOperatorKind::Negate | UnaryOperatorKind::Plus) =>
            {
                let Some(operand) = self.lower(ast, operand, atoms)? else {
                    return Ok(None);
                };

                let kind = if operator == UnaryOperatorKind::Negate {
                    ExpressionKind::OpSub
                } else {
                    ExpressionKind::OpAdd
                };

                Expression::new(kind, vec![operand])
            }
            NodeKind::Paren(inner) => match self.lower(ast, inner, atoms)? {
                Some(inner) => Expression::paren(inner),
                None => return Ok(None),
            },
            NodeKind::Literal(Literal {
                kind: LiteralKind::Integer | LiteralKind::Float,
                symbol,
            }) if Number::parse(ast.symbol(symbol)).is_some() => {
                Expression::literal(ast.symbol(symbol))
            }
            NodeKind::Identifier(identifier)
                if self.mode == FoldMode::Algebraic && self.is_numeric(id) =>
            {
                Expression::variable(None, ast.identifier(identifier))
            }
            _ => return self.lower_atom(ast, id, atoms),
        };

        Ok(Some(expression))
    }

    fn lower_atom(
        &mut self,
        ast: &mut Ast<'_>,
        id: NodeId,
        atoms: &mut Vec<NodeId>,
    ) -> Result<Option<Expression>, InternalError> {
        if self.mode == FoldMode::Constants || !self.is_numeric(id) {
            return Ok(None);
        }

        // Operands with the same text are the same value unless evaluating
        // them changes something
        let text = ast.source().value_of_span(ast.span(id));
        let existing = atoms.iter().position(|&atom| {
            ast.source().value_of_span(ast.span(atom)) == text && !has_side_effects(ast, atom)
        });

        let index = match existing {
            Some(index) if !has_side_effects(ast, id) => index,
            _ => {
                // The atom is copied into the result, so fold inside it first
                rewrite(self, ast, id)?;
                atoms.push(id);
                atoms.len() - 1
            }
        };

        Ok(Some(Expression::variable(None, format!("{PLACEHOLDER}{index}"))))
    }

    fn raise(
        &self,
        ast: &mut Ast<'_>,
        expression: &Expression,
        atoms: &[NodeId],
        span: Span,
    ) -> Result<NodeId, InternalError> {
        let operands = expression.expressions.as_slice();

        let kind = match (expression.kind, operands) {
            (ExpressionKind::Literal, _) => {
                let text = expression.literal.as_deref().unwrap_or_default();
                let kind = if text.contains('.') {
                    LiteralKind::Float
                } else {
                    LiteralKind::Integer
                };

                NodeKind::Literal(Literal {
                    kind,
                    symbol: ast.intern(text),
                })
            }
            (ExpressionKind::VarAccess, []) => {
                let name = expression.variable.as_deref().unwrap_or_default();

                let atom = name
                    .strip_prefix(PLACEHOLDER)
                    .and_then(|index| index.parse::<usize>().ok())
                    .and_then(|index| atoms.get(index));

                match atom {
                    Some(&atom) => return Ok(ast.clone_subtree(atom)),
                    None => NodeKind::Identifier(Identifier {
                        symbol: ast.intern(name),
                        span,
                    }),
                }
            }
            (ExpressionKind::Paren, [inner]) => {
                NodeKind::Paren(self.raise(ast, inner, atoms, span)?)
            }
            (ExpressionKind::OpAdd | ExpressionKind::OpSub, [operand]) => {
                let operator = if expression.kind == ExpressionKind::OpSub {
                    UnaryOperatorKind::Negate
                } else {
                    UnaryOperatorKind::Plus
                };

                NodeKind::Unary(UnaryExpression {
                    operator,
                    operand: self.raise(ast, operand, atoms, span)?,
                })
            }
            (kind, operands) => match (binary_operator(kind), operands) {
                (Some(operator), [lhs, rhs]) => NodeKind::Binary(BinaryExpression {
                    operator,
                    lhs: self.raise(ast, lhs, atoms, span)?,
                    rhs: self.raise(ast, rhs, atoms, span)?,
                }),
                _ => {
                    return Err(InternalError::UnusedNode {
                        kind: kind.into(),
                        span,
                    });
                }
            },
        };

        Ok(ast.push(span, kind))
    }
}

fn arithmetic_kind(operator: BinaryOperatorKind) -> Option<ExpressionKind> {
    match operator {
        BinaryOperatorKind::Add => Some(ExpressionKind::OpAdd),
        BinaryOperatorKind::Subtract => Some(ExpressionKind::OpSub),
        BinaryOperatorKind::Multiply => Some(ExpressionKind::OpMult),
        BinaryOperatorKind::Divide => Some(ExpressionKind::OpDiv),
        _ => None,
    }
}

fn binary_operator(kind: ExpressionKind) -> Option<BinaryOperatorKind> {
    match kind {
        ExpressionKind::OpAdd => Some(BinaryOperatorKind::Add),
        ExpressionKind::OpSub => Some(BinaryOperatorKind::Subtract),
        ExpressionKind::OpMult => Some(BinaryOperatorKind::Multiply),
        ExpressionKind::OpDiv => Some(BinaryOperatorKind::Divide),
        _ => None,
    }
}

fn has_side_effects(ast: &Ast<'_>, id: NodeId) -> bool {
    let mut stack = vec![id];

    while let Some(id) = stack.pop() {
        if let NodeKind::Unary(unary) = ast.kind(id)
            && !matches!(
                unary.operator,
                UnaryOperatorKind::Negate
                    | UnaryOperatorKind::Plus
                    | UnaryOperatorKind::LogicalNot
                    | UnaryOperatorKind::BitwiseNot
            )
        {
            return true;
        }

        stack.extend(ast.children(id));
    }

    false
}

fn is_arithmetic_root(kind: &NodeKind) -> bool {
    match kind {
        NodeKind::Binary(binary) => arithmetic_kind(binary.operator).is_some(),
        NodeKind::Unary(unary) => {
            matches!(unary.operator, UnaryOperatorKind::Negate | UnaryOperatorKind::Plus)
        }
        _ => false,
    }
}

impl RewriteVisitor for ConstantFolder<'_> {
    fn rewrite_expression(
        &mut self,
        ast: &mut Ast<'_>,
        id: NodeId,
    ) -> Result<Traversal, InternalError> {
        if !is_arithmetic_root(ast.kind(id)) || !self.is_numeric(id) {
            return Ok(Traversal::Continue);
        }

        let Some(parent) = ast.parent(id) else {
            return Ok(Traversal::Continue);
        };

        let mut atoms = Vec::new();
        let Some(expression) = self.lower(ast, id, &mut atoms)? else {
            return Ok(Traversal::Continue);
        };

        let reduced = reduce(&expression);
        if reduced == expression {
            return Ok(Traversal::SkipChildren);
        }

        trace!(
            from = %print_expression(&expression),
            to = %print_expression(&reduced),
            span = %ast.span(id),
            "folded arithmetic"
        );

        let replacement = self.raise(ast, &reduced, &atoms, ast.span(id))?;
        ast.replace_child(parent, id, replacement)?;
        self.folded += 1;

        Ok(Traversal::SkipChildren)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        CompilerConfig, SourceFile,
        frontend::parser::Parser,
        middle::type_checker::TypeChecker,
    };

    /// Folds `program` and returns the folded initializer of its last
    /// declaration, printed back through the interchange form
    fn fold_last(program: &str, mode: FoldMode) -> (usize, String) {
        let source = SourceFile::memory(program);
        let config = CompilerConfig::default();
        let mut ast = Parser::parse_program(&source, &config).unwrap();
        let types = TypeChecker::check(&ast, &config).unwrap();
        assert!(types.is_ok(), "{:?}", types.diagnostics);

        let folded = ConstantFolder::new(mode, &types).fold(&mut ast).unwrap();

        let root = ast.root().unwrap();
        let last = *ast.children(root).last().unwrap();
        let NodeKind::VarDecl(decl) = ast.kind(last).clone() else {
            panic!("expected a declaration");
        };

        (folded, render(&ast, decl.initializer.unwrap()))
    }

    fn render(ast: &Ast<'_>, id: NodeId) -> String {
        match ast.kind(id) {
            NodeKind::Literal(literal) => ast.symbol(literal.symbol).to_string(),
            NodeKind::Identifier(identifier) => ast.identifier(*identifier).to_string(),
            NodeKind::Paren(inner) => format!("({})", render(ast, *inner)),
            NodeKind::Unary(unary) => match unary.operator {
                UnaryOperatorKind::PostIncrement | UnaryOperatorKind::PostDecrement => {
                    format!("{}{}", render(ast, unary.operand), unary.operator)
                }
                _ => format!("{}{}", unary.operator, render(ast, unary.operand)),
            },
            NodeKind::Binary(binary) => format!(
                "{} {} {}",
                render(ast, binary.lhs),
                binary.operator,
                render(ast, binary.rhs)
            ),
            NodeKind::Call(call) => format!("{}(..)", render(ast, call.target)),
            other => other.name().to_string(),
        }
    }

    #[test]
    fn folds_constant_subtrees() {
        let (folded, text) = fold_last("x := 1 + 2 * 3;", FoldMode::Constants);

        assert_eq!(folded, 1);
        assert_eq!(text, "7");
    }

    #[test]
    fn constants_mode_leaves_variables_alone() {
        let program = "a := 1; x := a + 2 + 3;";

        assert_eq!(fold_last(program, FoldMode::Constants), (0, "a + 2 + 3".into()));
        assert_eq!(fold_last(program, FoldMode::Algebraic), (1, "5 + a".into()));
    }

    #[test]
    fn inexact_integer_division_is_kept() {
        let (folded, text) = fold_last("x := 10 / 4;", FoldMode::Constants);

        assert_eq!(folded, 0);
        assert_eq!(text, "10 / 4");
    }

    #[test]
    fn integer_division_is_never_regrouped() {
        assert_eq!(
            fold_last("x := 6 / 4 * 2;", FoldMode::Constants),
            (0, "6 / 4 * 2".into())
        );
        assert_eq!(
            fold_last("x := 1 / 2 * 2;", FoldMode::Algebraic),
            (0, "1 / 2 * 2".into())
        );
        assert_eq!(
            fold_last("a := 7; x := a / 2 * 2;", FoldMode::Algebraic),
            (0, "a / 2 * 2".into())
        );
    }

    #[test]
    fn arithmetic_beside_integer_division_still_folds() {
        let (folded, text) = fold_last("x := (1 + 2) * 3 + 7 / 2;", FoldMode::Constants);

        assert_eq!(folded, 1);
        assert_eq!(text, "9 + 7 / 2");
    }

    #[test]
    fn float_division_folds() {
        let (folded, text) = fold_last("x := 6.0 / 2 * 2;", FoldMode::Constants);

        assert_eq!(folded, 1);
        assert_eq!(text, "6.0");
    }

    #[test]
    fn algebraic_mode_merges_repeated_operands() {
        let program = "s := \"abc\"; x := len(s) * 2 - len(s) + 1 + 1;";
        let (folded, text) = fold_last(program, FoldMode::Algebraic);

        assert_eq!(folded, 1);
        assert_eq!(text, "2 + len(..)");
    }

    #[test]
    fn operands_with_side_effects_stay_apart() {
        let program = "a := 1; x := a++ - a++;";
        let (folded, text) = fold_last(program, FoldMode::Algebraic);

        assert_eq!(folded, 0);
        assert_eq!(text, "a++ - a++");
    }
}
