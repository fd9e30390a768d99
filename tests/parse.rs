//! Parsing programs into the arena, and expressions through the interchange
//! printer

use boac::{
    CompilerConfig, SourceFile,
    frontend::{
        ast::{Ast, BinaryExpression, NodeId, NodeKind, VarDecl},
        parser::Parser,
    },
    interchange::{
        Expression, ExpressionKind, parse::parse_expression, pretty_print::print_expression,
    },
    normal_form::reduce,
};
use indoc::indoc;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn initializer(ast: &Ast<'_>, statement: usize) -> NodeId {
    let root = ast.root().unwrap();
    let NodeKind::VarDecl(VarDecl {
        initializer: Some(value),
        ..
    }) = ast.kind(ast.children(root)[statement])
    else {
        panic!("statement {statement} is not an initialized declaration");
    };

    *value
}

#[test]
fn every_child_points_back_at_its_parent() {
    let source = SourceFile::memory(indoc! {"
        counts: output sum[string] of int;
        visit(input, visitor {
            before n: Project -> {
                foreach (i: int; def(n.code_repositories[i]))
                    counts[n.name] << 1;
            }
        });
        f := function(x: int): int { return -x * (x + 1); };
    "});
    let ast = Parser::parse_program(&source, &CompilerConfig::default()).unwrap();

    let root = ast.root().unwrap();
    assert_eq!(ast.parent(root), None);

    let mut stack = vec![root];
    let mut visited = 0;

    while let Some(id) = stack.pop() {
        visited += 1;

        for child in ast.children(id) {
            assert_eq!(ast.parent(child), Some(id), "{}", ast.kind(child).name());
            stack.push(child);
        }
    }

    assert_eq!(visited, ast.len());
}

#[test]
fn cloned_subtree_can_replace_a_child() {
    let source = SourceFile::memory("x := a * (b + 1);");
    let mut ast = Parser::parse_program(&source, &CompilerConfig::default()).unwrap();

    let product = initializer(&ast, 0);
    let NodeKind::Binary(BinaryExpression { lhs, rhs, .. }) = ast.kind(product).clone() else {
        panic!("expected a product");
    };

    let copy = ast.clone_subtree(rhs);
    assert_ne!(copy, rhs);
    assert_eq!(ast.parent(copy), None);
    assert_eq!(ast.kind(copy).name(), ast.kind(rhs).name());

    ast.replace_child(product, lhs, copy).unwrap();

    assert_eq!(ast.parent(copy), Some(product));
    assert_eq!(ast.parent(lhs), None);
    assert_eq!(ast.children(product), vec![copy, rhs]);
    assert_eq!(source.value_of_span(ast.span(copy)), "(b + 1)");

    // Attached nodes can not be attached a second time
    assert!(ast.replace_child(product, rhs, copy).is_err());
}

#[test]
fn syntax_errors_carry_a_position() {
    let source = SourceFile::memory("x := 1;\ny := (2 + ;\n");
    let error = Parser::parse_program(&source, &CompilerConfig::default()).unwrap_err();

    assert_eq!((error.line, error.column), (2, 11));
}

#[test]
fn deeply_nested_programs_are_rejected() {
    let depth = boac::DEFAULT_MAX_NESTING_DEPTH + 1;
    let program = format!("x := {}1{};", "(".repeat(depth), ")".repeat(depth));
    let source = SourceFile::memory(program);

    let error = Parser::parse_program(&source, &CompilerConfig::default()).unwrap_err();

    assert_eq!(
        error.message,
        format!(
            "nesting exceeds the maximum depth of {}",
            boac::DEFAULT_MAX_NESTING_DEPTH
        )
    );
}

#[test]
fn programs_nested_up_to_the_limit_parse() {
    let depth = boac::DEFAULT_MAX_NESTING_DEPTH - 2;
    let program = format!(
        "x := {}1{};\nif (x > 0) {}{}",
        "(".repeat(depth),
        ")".repeat(depth),
        "{".repeat(depth - 2),
        "}".repeat(depth - 2)
    );
    let source = SourceFile::memory(program);

    assert!(Parser::parse_program(&source, &CompilerConfig::default()).is_ok());
}

fn arithmetic() -> impl Strategy<Value = Expression> {
    let leaf = prop_oneof![
        (1..10u8).prop_map(|value| Expression::literal(value.to_string())),
        prop::sample::select(vec!["a", "b", "c"]).prop_map(|name| Expression::variable(None, name)),
    ];

    leaf.prop_recursive(4, 24, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone())
                .prop_map(|(l, r)| Expression::new(ExpressionKind::OpAdd, vec![l, r])),
            (inner.clone(), inner.clone())
                .prop_map(|(l, r)| Expression::new(ExpressionKind::OpSub, vec![l, r])),
            (inner.clone(), inner.clone())
                .prop_map(|(l, r)| Expression::new(ExpressionKind::OpMult, vec![l, r])),
            inner.clone().prop_map(Expression::negate),
            inner.prop_map(Expression::paren),
        ]
    })
}

proptest! {
    #[test]
    fn printed_expressions_parse_back(expression in arithmetic()) {
        let printed = print_expression(&expression);
        let reparsed = parse_expression(&printed).unwrap();

        prop_assert_eq!(print_expression(&reparsed), printed);
    }

    #[test]
    fn reduction_is_idempotent(expression in arithmetic()) {
        let once = reduce(&expression);
        prop_assert_eq!(reduce(&once), once);
    }

    #[test]
    fn reduction_ignores_operand_order(lhs in arithmetic(), rhs in arithmetic()) {
        let sum = |l: &Expression, r: &Expression| {
            Expression::new(ExpressionKind::OpAdd, vec![l.clone(), r.clone()])
        };
        let product = |l: &Expression, r: &Expression| {
            Expression::new(ExpressionKind::OpMult, vec![l.clone(), r.clone()])
        };

        prop_assert_eq!(reduce(&sum(&lhs, &rhs)), reduce(&sum(&rhs, &lhs)));
        prop_assert_eq!(reduce(&product(&lhs, &rhs)), reduce(&product(&rhs, &lhs)));
    }
}
