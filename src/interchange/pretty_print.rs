//! Renders interchange expressions as host-language source text.
//!
//! Output follows Java operator precedence and only adds parentheses where a
//! child would otherwise bind differently. Explicit `PAREN` nodes are always
//! printed, so `parse_expression(print_expression(e)) == e` for trees that came
//! out of the parser.

use super::{Expression, ExpressionKind};

const ASSIGNMENT: u8 = 1;
const CONDITIONAL: u8 = 2;
const NULL_COALESCE: u8 = 3;
const UNARY: u8 = 14;
const POSTFIX: u8 = 15;

pub fn print_expression(expression: &Expression) -> String {
    let mut out = String::new();
    write_expression(&mut out, expression);
    out
}

/// Binding strength of the operator at the root of `expression`. Higher binds
/// tighter.
pub fn precedence(expression: &Expression) -> u8 {
    use ExpressionKind::*;

    match expression.kind {
        OpAdd | OpSub if expression.expressions.len() == 1 => UNARY,
        OpInc | OpDec if expression.is_postfix => POSTFIX,
        OpInc | OpDec | LogicalNot | BitNot | Cast => UNARY,
        Conditional => CONDITIONAL,
        NullCoalesce => NULL_COALESCE,
        kind => match binary_operator(kind) {
            Some((_, precedence)) => precedence,
            None => POSTFIX,
        },
    }
}

/// Symbol and precedence of binary and assignment operators
fn binary_operator(kind: ExpressionKind) -> Option<(&'static str, u8)> {
    use ExpressionKind::*;

    let operator = match kind {
        Assign => ("=", ASSIGNMENT),
        AssignAdd => ("+=", ASSIGNMENT),
        AssignSub => ("-=", ASSIGNMENT),
        AssignMult => ("*=", ASSIGNMENT),
        AssignDiv => ("/=", ASSIGNMENT),
        AssignMod => ("%=", ASSIGNMENT),
        AssignBitxor => ("^=", ASSIGNMENT),
        AssignBitand => ("&=", ASSIGNMENT),
        AssignBitor => ("|=", ASSIGNMENT),
        AssignLshift => ("<<=", ASSIGNMENT),
        AssignRshift => (">>=", ASSIGNMENT),
        AssignUnsignedRshift => (">>>=", ASSIGNMENT),
        NullCoalesce => ("??", NULL_COALESCE),
        LogicalOr => ("||", 4),
        LogicalAnd => ("&&", 5),
        BitOr => ("|", 6),
        BitXor => ("^", 7),
        BitAnd => ("&", 8),
        Eq => ("==", 9),
        Neq => ("!=", 9),
        Lt => ("<", 10),
        Gt => (">", 10),
        Lteq => ("<=", 10),
        Gteq => (">=", 10),
        BitLshift => ("<<", 11),
        BitRshift => (">>", 11),
        BitUnsignedRshift => (">>>", 11),
        OpAdd => ("+", 12),
        OpSub => ("-", 12),
        OpMult => ("*", 13),
        OpDiv => ("/", 13),
        OpMod => ("%", 13),
        _ => return None,
    };

    Some(operator)
}

fn write_operand(out: &mut String, operand: &Expression, parenthesize: bool) {
    if parenthesize {
        out.push('(');
        write_expression(out, operand);
        out.push(')');
    } else {
        write_expression(out, operand);
    }
}

fn write_list(out: &mut String, expressions: &[Expression]) {
    for (i, expression) in expressions.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }

        write_expression(out, expression);
    }
}

/// `-x`, `++x`, `!x`. Repeated signs are spaced apart so they do not lex as
/// `--` or `++`.
fn write_prefix(out: &mut String, operator: &str, operand: &Expression) {
    let mut rendered = String::new();
    write_operand(&mut rendered, operand, precedence(operand) < UNARY);

    out.push_str(operator);

    let sign = |c: char| c == '+' || c == '-';
    if operator.ends_with(sign) && rendered.starts_with(sign) {
        out.push(' ');
    }

    out.push_str(&rendered);
}

fn write_receiver(out: &mut String, expression: &Expression) {
    if let Some(receiver) = expression.expressions.first() {
        write_operand(out, receiver, precedence(receiver) < POSTFIX);
        out.push('.');
    }
}

fn write_expression(out: &mut String, expression: &Expression) {
    use ExpressionKind::*;

    let operands = expression.expressions.as_slice();
    let type_name = expression
        .new_type
        .as_ref()
        .map_or("", |ty| ty.name.as_str());

    match expression.kind {
        Literal => out.push_str(expression.literal.as_deref().unwrap_or_default()),
        VarAccess => {
            write_receiver(out, expression);
            out.push_str(expression.variable.as_deref().unwrap_or_default());
        }
        MethodCall => {
            write_receiver(out, expression);
            out.push_str(expression.method.as_deref().unwrap_or_default());
            out.push('(');
            write_list(out, &expression.method_args);
            out.push(')');
        }
        ArrayIndex => {
            if let [target, indices @ ..] = operands {
                write_operand(out, target, precedence(target) < POSTFIX);

                for index in indices {
                    out.push('[');
                    write_expression(out, index);
                    out.push(']');
                }
            }
        }
        Paren => {
            out.push('(');
            write_list(out, operands);
            out.push(')');
        }
        New => {
            out.push_str("new ");
            out.push_str(type_name);
            out.push('(');
            write_list(out, operands);
            out.push(')');
        }
        NewArray => {
            out.push_str("new ");
            out.push_str(type_name);

            for dimension in operands {
                out.push('[');
                write_expression(out, dimension);
                out.push(']');
            }
        }
        ArrayInit => {
            out.push('{');
            write_list(out, operands);
            out.push('}');
        }
        Cast => {
            out.push('(');
            out.push_str(type_name);
            out.push_str(") ");

            if let Some(operand) = operands.first() {
                write_operand(out, operand, precedence(operand) < UNARY);
            }
        }
        TypeCompare => {
            if let Some(operand) = operands.first() {
                write_operand(out, operand, precedence(operand) < 10);
            }

            out.push_str(" instanceof ");
            out.push_str(type_name);
        }
        VarDecl => {
            for (i, variable) in expression.variable_decls.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                } else if let Some(ty) = &variable.variable_type {
                    out.push_str(&ty.name);
                    out.push(' ');
                }

                out.push_str(&variable.name);

                if let Some(initializer) = &variable.initializer {
                    out.push_str(" = ");
                    write_expression(out, initializer);
                }
            }
        }
        OpInc | OpDec => {
            let operator = if expression.kind == OpInc { "++" } else { "--" };

            if let Some(operand) = operands.first() {
                if expression.is_postfix {
                    write_operand(out, operand, precedence(operand) < POSTFIX);
                    out.push_str(operator);
                } else {
                    write_prefix(out, operator, operand);
                }
            }
        }
        OpAdd | OpSub if operands.len() == 1 => {
            let operator = if expression.kind == OpAdd { "+" } else { "-" };
            write_prefix(out, operator, &operands[0]);
        }
        LogicalNot | BitNot => {
            let operator = if expression.kind == LogicalNot { "!" } else { "~" };

            if let Some(operand) = operands.first() {
                write_prefix(out, operator, operand);
            }
        }
        Conditional => {
            if let [condition, then, otherwise] = operands {
                write_operand(out, condition, precedence(condition) <= CONDITIONAL);
                out.push_str(" ? ");
                write_operand(out, then, precedence(then) < CONDITIONAL);
                out.push_str(" : ");
                write_operand(out, otherwise, precedence(otherwise) < CONDITIONAL);
            }
        }
        kind => match binary_operator(kind) {
            Some((symbol, level)) => {
                // Assignments and `??` group to the right, everything else to
                // the left
                let right_associative = level <= NULL_COALESCE;

                for (i, operand) in operands.iter().enumerate() {
                    let inner = precedence(operand);
                    let parenthesize = match (i, right_associative) {
                        (0, false) => inner < level,
                        (0, true) => inner <= level,
                        (_, false) => inner <= level,
                        (_, true) => inner < level,
                    };

                    if i > 0 {
                        out.push(' ');
                        out.push_str(symbol);
                        out.push(' ');
                    }

                    write_operand(out, operand, parenthesize);
                }
            }
            // Annotations, templates and other host constructs carry their
            // source text as a literal
            None => out.push_str(expression.literal.as_deref().unwrap_or_default()),
        },
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn var(name: &str) -> Expression {
        Expression::variable(None, name)
    }

    fn binary(kind: ExpressionKind, lhs: Expression, rhs: Expression) -> Expression {
        Expression::new(kind, vec![lhs, rhs])
    }

    #[test]
    fn adds_only_required_parentheses() {
        let sum = binary(ExpressionKind::OpAdd, var("a"), var("b"));

        let product = binary(ExpressionKind::OpMult, sum.clone(), var("c"));
        assert_eq!(print_expression(&product), "(a + b) * c");

        let left_deep = binary(ExpressionKind::OpSub, sum.clone(), var("c"));
        assert_eq!(print_expression(&left_deep), "a + b - c");

        let right_nested = binary(ExpressionKind::OpSub, var("c"), sum);
        assert_eq!(print_expression(&right_nested), "c - (a + b)");
    }

    #[test]
    fn explicit_parentheses_are_kept() {
        let product = binary(ExpressionKind::OpMult, var("a"), var("b"));
        let quotient = binary(ExpressionKind::OpDiv, var("x"), Expression::paren(product));

        assert_eq!(print_expression(&quotient), "x / (a * b)");
    }

    #[test]
    fn repeated_signs_are_spaced() {
        let twice = Expression::negate(Expression::negate(var("x")));
        assert_eq!(print_expression(&twice), "- -x");

        let mut decrement = Expression::new(ExpressionKind::OpDec, vec![var("x")]);
        assert_eq!(print_expression(&Expression::negate(decrement.clone())), "- --x");

        decrement.is_postfix = true;
        assert_eq!(print_expression(&Expression::negate(decrement)), "-x--");
    }

    #[test]
    fn receivers_and_calls() {
        let call = Expression::method_call(
            Some(Expression::variable(Some(var("a")), "b")),
            "foo",
            vec![var("x"), Expression::literal("1")],
        );
        assert_eq!(print_expression(&call), "a.b.foo(x, 1)");

        let index = Expression::new(
            ExpressionKind::ArrayIndex,
            vec![call, Expression::literal("0")],
        );
        assert_eq!(print_expression(&index), "a.b.foo(x, 1)[0]");
    }

    #[test]
    fn assignments_group_right() {
        let inner = binary(ExpressionKind::Assign, var("b"), var("c"));
        let outer = binary(ExpressionKind::Assign, var("a"), inner);

        assert_eq!(print_expression(&outer), "a = b = c");
    }
}
