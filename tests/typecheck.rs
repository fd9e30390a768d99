//! Type checking whole programs

use boac::{
    CompilerConfig, SourceFile,
    frontend::parser::Parser,
    middle::{diagnostic::Diagnostic, type_checker::TypeChecker},
};
use indoc::indoc;
use pretty_assertions::assert_eq;
use rstest::rstest;

fn check(program: &str) -> Vec<Diagnostic> {
    let source = SourceFile::memory(program);
    let config = CompilerConfig::default();
    let ast = Parser::parse_program(&source, &config)
        .unwrap_or_else(|error| panic!("{program}: {error}"));

    TypeChecker::check(&ast, &config).unwrap().diagnostics
}

fn messages(program: &str) -> Vec<String> {
    check(program)
        .into_iter()
        .map(|diagnostic| diagnostic.message)
        .collect()
}

#[rstest]
#[case("x := !1;", "type 'int' does not support the '!' operator")]
#[case("x := 1 + \"a\";", "types 'int' and 'string' do not support '+' operator")]
#[case("x := 1; x: string;", "variable 'x' already declared as 'int'")]
#[case("x := nosuch(1, \"a\");", "no such function nosuch([int, string])")]
#[case(
    "a: array of int; x := a[\"k\"];",
    "invalid index type 'string' for indexing into 'array of int'"
)]
#[case(
    "t: table[year: int] of count: int; x := t[\"a\"];",
    "invalid index type 'string' for indexing into 'table[year:int] of count:int' - expected 'year:int'"
)]
#[case("t: table[year: int] of count: int; x := t[1][2];", "too many indices")]
#[case(
    "x: int = \"a\";",
    "incompatible types for assignment: required 'int', found 'string'"
)]
#[case(
    "t: table[year: int] of count: int; r: {string, string}; t >> r;",
    "cannot assign row from table type 'table[year:int] of count:int' to tuple type 'tuple [string, string]'"
)]
#[case("_1 := 1;", "invalid identifier '_1'")]
#[case(
    "visit(input, visitor { before _ -> return; });",
    "return statement not allowed inside visitors"
)]
#[case("return 1;", "return statement not allowed outside functions")]
#[case(
    "f := function(): int { return \"a\"; };",
    "incompatible types for return: required 'int', found 'string'"
)]
#[case("stop;", "stop statement only allowed inside 'before' visits")]
#[case(
    "visit(input, visitor { after _ -> stop; });",
    "stop statement only allowed inside 'before' visits"
)]
#[case(
    "if (1) x := 2;",
    "incompatible types for if condition: required 'boolean', found 'int'"
)]
#[case(
    "while (\"a\") break;",
    "incompatible types for while condition: required 'boolean', found 'string'"
)]
#[case(
    "do x := 1; while (1.5);",
    "incompatible types for do condition: required 'boolean', found 'float'"
)]
#[case(
    "for (i := 0; i; i++) x := i;",
    "incompatible types for for condition: required 'boolean', found 'int'"
)]
#[case(
    "foreach (i: int; i) x := i;",
    "incompatible types for foreach condition: required 'boolean', found 'int'"
)]
#[case(
    "exists (i: int; i) x := i;",
    "incompatible types for exists condition: required 'boolean', found 'int'"
)]
#[case(
    "ifall (i: int; i) x := i;",
    "incompatible types for ifall condition: required 'boolean', found 'int'"
)]
#[case(
    "switch (1) { case \"a\": break; }",
    "incompatible types for switch case: required 'int', found 'string'"
)]
#[case("x: nosuchtype;", "type 'nosuchtype' undefined")]
#[case("x := int;", "type 'int' is not a value and can not be assigned")]
#[case(
    "s: stack of int; v := push(s, 1);",
    "functions without a return type can not be used as initializers"
)]
#[case("x := y;", "variable 'y' undefined")]
#[case("x := input.nosuch;", "'Project' has no member named 'nosuch'")]
#[case("view v { x := sv.o; }", "subview 'sv' undefined")]
#[case(
    "view a { counts: output sum of int; } view b { t := a.missing; }",
    "output variable 'missing' not found in subview 'a'"
)]
#[case("v := 1; view v { }", "name conflict: identifier name 'v' already exists")]
#[case("t: table[year: int] of count: int; x := t.count;", "invalid selector on BoaTable")]
#[case(
    "t: table[p: string] of temp: int; r: {int, string, int} = t;",
    "incompatible types for assignment: required 'tuple [int, string, int]', found 'table[p:string] of temp:int'"
)]
#[case(
    "view years { counts: output sum[int] of int; } view report { x := years.counts[\"a\"]; }",
    "index type string doesn't match with view column type int"
)]
#[case(
    "view years { counts: output sum[int][string] of int; } view report { x := years.counts[1][2]; }",
    "index type int doesn't match with view column type string"
)]
#[case(
    "t: table[year: string] of count: int; f := function(year: int): bool { return year > 2000; }; x := t[f];",
    "invalid index type 'int' for table filter"
)]
#[case(
    "t: table[year: int] of count: int; f := function(year: int): int { return year; }; x := t[f];",
    "invalid index type 'function[int]: int' for table filter"
)]
#[case(
    "a: array of {}; f := function(x: int): bool { return x > 0; }; x := a[f];",
    "expected a table type instead of array of tuple []"
)]
#[case("o: output nosuch of int;", "unknown aggregator 'nosuch'")]
#[case(
    "counts: output sum[string] of int; counts << 1;",
    "incorrect number of indices for 'counts': required 1, found 0"
)]
#[case(
    "counts: output sum of int; counts << \"a\";",
    "incompatible types for emit: required 'int', found 'string'"
)]
fn reports(#[case] program: &str, #[case] expected: &str) {
    assert_eq!(messages(program), vec![expected]);
}

#[rstest]
#[case::visitor(indoc! {"
    counts: output sum[string] of int;
    visit(input, visitor {
        before n: Project -> {
            foreach (i: int; def(n.code_repositories[i]))
                counts[n.name] << 1;
            stop;
        }
    });
"})]
#[case::function(indoc! {"
    square := function(x: int): int {
        return x * x;
    };
    total: int = square(3) + 1;
    ratio: float = total / 2;
"})]
#[case::view(indoc! {"
    view years {
        counts: output sum[int] of int;
        counts[2024] << 1;
    }
    view report {
        t := years.counts;
        row: {year: int, count: int};
        t >> row;
    }
"})]
#[case::table_filter(indoc! {"
    t: table[year: int] of count: int;
    recent := function(year: int): bool {
        return year > 2000;
    };
    row: {int, int};
    t[recent] >> row;
"})]
#[case::collections(indoc! {"
    s: stack of int;
    push(s, 1);
    top: int = pop(s);
    m: map[string] of int;
    m[\"a\"] = 1;
    names := keys(m);
    first: string = names[0];
"})]
#[case::redeclaration_with_same_type(indoc! {"
    x := 1;
    x: int = 2;
"})]
fn accepts(#[case] program: &str) {
    assert_eq!(messages(program), Vec::<String>::new());
}

#[test]
fn diagnostics_are_reported_in_order_with_positions() {
    let diagnostics = check(indoc! {"
        a := b;
        c: int = \"x\";
    "});

    let found = diagnostics
        .iter()
        .map(|diagnostic| (diagnostic.message.as_str(), diagnostic.line, diagnostic.column))
        .collect::<Vec<_>>();

    assert_eq!(
        found,
        vec![
            ("variable 'b' undefined", 1, 6),
            (
                "incompatible types for assignment: required 'int', found 'string'",
                2,
                1
            ),
        ]
    );
}

#[test]
fn a_checked_program_can_be_checked_again() {
    let source = SourceFile::memory("x := 1 + 2; y: string = x;");
    let config = CompilerConfig::default();
    let ast = Parser::parse_program(&source, &config).unwrap();

    let first = TypeChecker::check(&ast, &config).unwrap();
    let second = TypeChecker::check(&ast, &config).unwrap();

    assert_eq!(first.diagnostics, second.diagnostics);
    assert_eq!(first.diagnostics.len(), 1);
}
