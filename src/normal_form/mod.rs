//! Canonical normal form for arithmetic over interchange expressions.
//!
//! [`reduce`] flattens `+ - * /` into a sum of terms, folds the numeric parts
//! exactly, merges like terms and renders the result in a fixed order. Two
//! expressions that are equal under these rules reduce to the same tree, so
//! the output doubles as an equality oracle.

use tracing::trace;

use self::{number::Number, term::Sum};
use crate::interchange::{Expression, ExpressionKind, pretty_print::print_expression};

pub mod number;
mod term;

/// Rewrites `expression` into its normal form. Pure, and idempotent:
/// `reduce(&reduce(e)) == reduce(e)`.
pub fn reduce(expression: &Expression) -> Expression {
    let reduced = lower(expression).to_expression();

    trace!(
        input = %print_expression(expression),
        output = %print_expression(&reduced),
        "reduced expression"
    );

    reduced
}

fn lower(expression: &Expression) -> Sum {
    use ExpressionKind::*;

    match (expression.kind, expression.expressions.as_slice()) {
        (Literal, _) => match expression.literal.as_deref().and_then(Number::parse) {
            Some(value) => Sum::constant(value),
            None => Sum::atom(expression.clone()),
        },
        (Paren | OpAdd, [operand]) => lower(operand),
        (OpSub, [operand]) => -lower(operand),
        (OpAdd | OpSub | OpMult | OpDiv, [first, rest @ ..]) if !rest.is_empty() => {
            rest.iter().fold(lower(first), |lhs, operand| {
                let rhs = lower(operand);

                match expression.kind {
                    OpAdd => lhs + rhs,
                    OpSub => lhs - rhs,
                    OpMult => &lhs * &rhs,
                    _ => &lhs / &rhs,
                }
            })
        }
        _ => Sum::atom(reduce_operands(expression)),
    }
}

/// Calls, field accesses, indexing and every other non-arithmetic node are
/// kept whole, with their operands reduced
fn reduce_operands(expression: &Expression) -> Expression {
    Expression {
        expressions: expression.expressions.iter().map(reduce).collect(),
        method_args: expression.method_args.iter().map(reduce).collect(),
        ..expression.clone()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::interchange::parse::parse_expression;

    fn reduced(text: &str) -> String {
        print_expression(&reduce(&parse_expression(text).unwrap()))
    }

    #[rstest]
    #[case("- - -2", "-2")]
    #[case("10 / 3", "10 / 3")]
    #[case("x / 0", "x / 0")]
    #[case("foo(x + 3, 2 + 1)", "foo(3 + x, 3)")]
    #[case("a[1 + 1]", "a[2]")]
    #[case("c - ++a - a--", "c - ++a - a--")]
    fn small_cases(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(reduced(input), expected);
    }

    #[test]
    fn output_reparses_to_the_same_tree() {
        let once = reduce(&parse_expression("c * (d - b) / ((a - b) * 3)").unwrap());
        let printed = print_expression(&once);

        assert_eq!(parse_expression(&printed).unwrap(), once);
        assert_eq!(reduce(&once), once);
    }
}
