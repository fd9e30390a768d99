//! Visitor traits over the arena AST
//!
//! [`Visitor`] computes a value per node, [`VisitorNoReturn`] is driven by
//! [`walk`] in DFS order with enter/leave hooks, and [`RewriteVisitor`] is
//! driven by [`rewrite`] with mutable access to the arena.

use paste::paste;
use thiserror::Error;

use super::{
    Assignment, Ast, BinaryExpression, CallExpression, CollectionType, Component,
    DoWhileStatement, EmitStatement, ForStatement, FunctionLiteral, FunctionType, Identifier,
    IfStatement, IndexExpression, Literal, MapType, NodeCategory, NodeId, NodeKind, OutputType,
    QuantifierStatement, SelectorExpression, SwitchCase, SwitchStatement, TableType, TypeDecl,
    UnaryExpression, VarDecl, ViewDecl, VisitClause, WhileStatement,
};
use crate::frontend::lexer::Span;

/// Compiler bugs surfaced by the visitor framework. These are never user
/// errors and abort the pass that hit them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InternalError {
    #[error("visitor does not handle {kind} node at {span}")]
    UnusedNode { kind: &'static str, span: Span },
    #[error("node {child} is not a child of node {parent}")]
    NotAChild { parent: NodeId, child: NodeId },
    #[error("node {0} already has a parent")]
    AlreadyAttached(NodeId),
}

impl InternalError {
    pub fn unused(ast: &Ast<'_>, id: NodeId) -> Self {
        Self::UnusedNode {
            kind: ast.kind(id).name(),
            span: ast.span(id),
        }
    }
}

/// Whether a walk descends into the children of the node just visited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traversal {
    Continue,
    SkipChildren,
}

macro_rules! value_visitor {
    (
        payload { $($variant:ident($payload:ty)),* $(,)? }
        unit { $($unit:ident),* $(,)? }
    ) => {
        paste! {
            /// A visitor producing a value for each node it is asked about.
            ///
            /// Every kind defaults to [`InternalError::UnusedNode`], so an
            /// implementation only handles the kinds it expects to see and
            /// fails loudly on anything else.
            pub trait Visitor {
                type Output;
                type Context;

                $(
                    fn [<visit_ $variant:snake>](
                        &mut self,
                        ast: &Ast<'_>,
                        id: NodeId,
                        _node: &$payload,
                        _cx: &mut Self::Context,
                    ) -> Result<Self::Output, InternalError> {
                        Err(InternalError::unused(ast, id))
                    }
                )*

                $(
                    fn [<visit_ $unit:snake>](
                        &mut self,
                        ast: &Ast<'_>,
                        id: NodeId,
                        _cx: &mut Self::Context,
                    ) -> Result<Self::Output, InternalError> {
                        Err(InternalError::unused(ast, id))
                    }
                )*

                fn visit(
                    &mut self,
                    ast: &Ast<'_>,
                    id: NodeId,
                    cx: &mut Self::Context,
                ) -> Result<Self::Output, InternalError> {
                    match ast.kind(id) {
                        $(NodeKind::$variant(node) => self.[<visit_ $variant:snake>](ast, id, node, cx),)*
                        $(NodeKind::$unit => self.[<visit_ $unit:snake>](ast, id, cx),)*
                    }
                }
            }
        }
    };
}

value_visitor! {
    payload {
        Program([NodeId]),
        Block([NodeId]),
        If(IfStatement),
        While(WhileStatement),
        DoWhile(DoWhileStatement),
        For(ForStatement),
        Quantifier(QuantifierStatement),
        Switch(SwitchStatement),
        Case(SwitchCase),
        Return(Option<NodeId>),
        ExpressionStatement(NodeId),
        Assignment(Assignment),
        Emit(EmitStatement),
        VarDecl(VarDecl),
        TypeDecl(TypeDecl),
        View(ViewDecl),
        Literal(Literal),
        Identifier(Identifier),
        Call(CallExpression),
        Index(IndexExpression),
        Selector(SelectorExpression),
        Binary(BinaryExpression),
        Unary(UnaryExpression),
        Paren(NodeId),
        Composite([NodeId]),
        FunctionLiteral(FunctionLiteral),
        VisitorLiteral([NodeId]),
        VisitClause(VisitClause),
        NamedType(Identifier),
        ArrayType(NodeId),
        MapType(MapType),
        CollectionType(CollectionType),
        TupleType([NodeId]),
        Component(Component),
        FunctionType(FunctionType),
        OutputType(OutputType),
        TableType(TableType),
        ModelType(NodeId),
    }
    unit { Break, Continue, Stop, VisitorType }
}

macro_rules! walking_visitor {
    (
        payload { $($variant:ident($payload:ty)),* $(,)? }
        unit { $($unit:ident),* $(,)? }
    ) => {
        paste! {
            /// A visitor driven by [`walk`]. Statements get a hook per kind;
            /// expressions and types are funneled through one hook each.
            pub trait VisitorNoReturn {
                type Context;

                $(
                    fn [<visit_ $variant:snake>](
                        &mut self,
                        _ast: &Ast<'_>,
                        _id: NodeId,
                        _node: &$payload,
                        _cx: &mut Self::Context,
                    ) -> Result<Traversal, InternalError> {
                        Ok(Traversal::Continue)
                    }
                )*

                $(
                    fn [<visit_ $unit:snake>](
                        &mut self,
                        _ast: &Ast<'_>,
                        _id: NodeId,
                        _cx: &mut Self::Context,
                    ) -> Result<Traversal, InternalError> {
                        Ok(Traversal::Continue)
                    }
                )*

                fn visit_expression(
                    &mut self,
                    _ast: &Ast<'_>,
                    _id: NodeId,
                    _cx: &mut Self::Context,
                ) -> Result<Traversal, InternalError> {
                    Ok(Traversal::Continue)
                }

                fn visit_type(
                    &mut self,
                    _ast: &Ast<'_>,
                    _id: NodeId,
                    _cx: &mut Self::Context,
                ) -> Result<Traversal, InternalError> {
                    Ok(Traversal::Continue)
                }

                /// Called once all children of `id` have been walked (or
                /// skipped)
                fn leave(
                    &mut self,
                    _ast: &Ast<'_>,
                    _id: NodeId,
                    _cx: &mut Self::Context,
                ) -> Result<(), InternalError> {
                    Ok(())
                }

                fn enter(
                    &mut self,
                    ast: &Ast<'_>,
                    id: NodeId,
                    cx: &mut Self::Context,
                ) -> Result<Traversal, InternalError> {
                    match ast.kind(id) {
                        $(NodeKind::$variant(node) => self.[<visit_ $variant:snake>](ast, id, node, cx),)*
                        $(NodeKind::$unit => self.[<visit_ $unit:snake>](ast, id, cx),)*
                        kind if kind.category() == NodeCategory::Type => self.visit_type(ast, id, cx),
                        _ => self.visit_expression(ast, id, cx),
                    }
                }
            }
        }
    };
}

walking_visitor! {
    payload {
        Program([NodeId]),
        Block([NodeId]),
        If(IfStatement),
        While(WhileStatement),
        DoWhile(DoWhileStatement),
        For(ForStatement),
        Quantifier(QuantifierStatement),
        Switch(SwitchStatement),
        Case(SwitchCase),
        Return(Option<NodeId>),
        ExpressionStatement(NodeId),
        Assignment(Assignment),
        Emit(EmitStatement),
        VarDecl(VarDecl),
        TypeDecl(TypeDecl),
        View(ViewDecl),
    }
    unit { Break, Continue, Stop }
}

/// Walks the subtree at `root` in pre-order. Uses an explicit stack, so the
/// depth of the tree never reaches the call stack.
pub fn walk<V: VisitorNoReturn + ?Sized>(
    visitor: &mut V,
    ast: &Ast<'_>,
    root: NodeId,
    cx: &mut V::Context,
) -> Result<(), InternalError> {
    let mut stack = vec![(root, false)];

    while let Some((id, entered)) = stack.pop() {
        if entered {
            visitor.leave(ast, id, cx)?;
            continue;
        }

        let traversal = visitor.enter(ast, id, cx)?;
        stack.push((id, true));

        if traversal == Traversal::Continue {
            stack.extend(ast.children(id).into_iter().rev().map(|child| (child, false)));
        }
    }

    Ok(())
}

/// A visitor allowed to mutate the arena while [`rewrite`] walks it.
pub trait RewriteVisitor {
    fn rewrite_statement(
        &mut self,
        _ast: &mut Ast<'_>,
        _id: NodeId,
    ) -> Result<Traversal, InternalError> {
        Ok(Traversal::Continue)
    }

    fn rewrite_expression(
        &mut self,
        _ast: &mut Ast<'_>,
        _id: NodeId,
    ) -> Result<Traversal, InternalError> {
        Ok(Traversal::Continue)
    }

    fn rewrite_type(
        &mut self,
        _ast: &mut Ast<'_>,
        _id: NodeId,
    ) -> Result<Traversal, InternalError> {
        Ok(Traversal::Continue)
    }
}

/// Pre-order rewrite of the subtree at `root`. The children of a node are read
/// after its hook ran, so a hook that swaps out one of its own children will
/// see the walk continue into the replacement.
pub fn rewrite<V: RewriteVisitor + ?Sized>(
    visitor: &mut V,
    ast: &mut Ast<'_>,
    root: NodeId,
) -> Result<(), InternalError> {
    let mut stack = vec![root];

    while let Some(id) = stack.pop() {
        let traversal = match ast.kind(id).category() {
            NodeCategory::Program => Traversal::Continue,
            NodeCategory::Statement => visitor.rewrite_statement(ast, id)?,
            NodeCategory::Expression => visitor.rewrite_expression(ast, id)?,
            NodeCategory::Type => visitor.rewrite_type(ast, id)?,
        };

        if traversal == Traversal::Continue {
            stack.extend(ast.children(id).into_iter().rev());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        CompilerConfig, SourceFile,
        frontend::{ast::LiteralKind, parser::Parser},
    };

    /// Sums every integer literal in an expression
    struct Summer;

    impl Visitor for Summer {
        type Output = i64;
        type Context = ();

        fn visit_literal(
            &mut self,
            ast: &Ast<'_>,
            _id: NodeId,
            node: &Literal,
            _cx: &mut (),
        ) -> Result<i64, InternalError> {
            assert_eq!(node.kind, LiteralKind::Integer);
            Ok(ast.symbol(node.symbol).parse().unwrap())
        }

        fn visit_binary(
            &mut self,
            ast: &Ast<'_>,
            _id: NodeId,
            node: &BinaryExpression,
            cx: &mut (),
        ) -> Result<i64, InternalError> {
            Ok(self.visit(ast, node.lhs, cx)? + self.visit(ast, node.rhs, cx)?)
        }

        fn visit_expression_statement(
            &mut self,
            ast: &Ast<'_>,
            _id: NodeId,
            node: &NodeId,
            cx: &mut (),
        ) -> Result<i64, InternalError> {
            self.visit(ast, *node, cx)
        }
    }

    fn first_statement(ast: &Ast<'_>) -> NodeId {
        let root = ast.root().unwrap();
        ast.children(root)[0]
    }

    #[test]
    fn value_visitor_dispatches_per_kind() {
        let source = SourceFile::memory("1 + 2 + 39;");
        let ast = Parser::parse_program(&source, &CompilerConfig::default()).unwrap();

        let total = Summer.visit(&ast, first_statement(&ast), &mut ()).unwrap();
        assert_eq!(total, 42);
    }

    #[test]
    fn unhandled_kind_is_an_internal_error() {
        let source = SourceFile::memory("f(1);");
        let ast = Parser::parse_program(&source, &CompilerConfig::default()).unwrap();

        let error = Summer.visit(&ast, first_statement(&ast), &mut ()).unwrap_err();
        assert!(matches!(error, InternalError::UnusedNode { kind: "Call", .. }));
    }

    /// Records enter/leave events by kind name
    struct Recorder;

    impl VisitorNoReturn for Recorder {
        type Context = Vec<String>;

        fn visit_block(
            &mut self,
            _ast: &Ast<'_>,
            _id: NodeId,
            _node: &[NodeId],
            cx: &mut Vec<String>,
        ) -> Result<Traversal, InternalError> {
            cx.push("block".into());
            Ok(Traversal::Continue)
        }

        fn visit_expression(
            &mut self,
            ast: &Ast<'_>,
            id: NodeId,
            cx: &mut Vec<String>,
        ) -> Result<Traversal, InternalError> {
            cx.push(ast.kind(id).name().to_string());
            Ok(Traversal::SkipChildren)
        }

        fn leave(
            &mut self,
            ast: &Ast<'_>,
            id: NodeId,
            cx: &mut Vec<String>,
        ) -> Result<(), InternalError> {
            if let NodeKind::Block(_) = ast.kind(id) {
                cx.push("/block".into());
            }
            Ok(())
        }
    }

    #[test]
    fn walk_enters_and_leaves_in_order() {
        let source = SourceFile::memory("{ f(1 + 2); { x; } }");
        let ast = Parser::parse_program(&source, &CompilerConfig::default()).unwrap();

        let mut events = Vec::new();
        walk(&mut Recorder, &ast, ast.root().unwrap(), &mut events).unwrap();

        assert_eq!(
            events,
            vec!["block", "Call", "block", "Identifier", "/block", "/block"]
        );
    }

    /// Swaps every identifier for a clone of the literal `0`
    struct Zeroer {
        zero: NodeId,
    }

    impl RewriteVisitor for Zeroer {
        fn rewrite_expression(
            &mut self,
            ast: &mut Ast<'_>,
            id: NodeId,
        ) -> Result<Traversal, InternalError> {
            for child in ast.children(id) {
                if let NodeKind::Identifier(_) = ast.kind(child) {
                    let zero = ast.clone_subtree(self.zero);
                    ast.replace_child(id, child, zero)?;
                }
            }
            Ok(Traversal::Continue)
        }
    }

    #[test]
    fn rewrite_replaces_children() {
        let source = SourceFile::memory("0; a + (b * 2);");
        let mut ast = Parser::parse_program(&source, &CompilerConfig::default()).unwrap();

        let root = ast.root().unwrap();
        let statements = ast.children(root);
        let zero = ast.children(statements[0])[0];

        rewrite(&mut Zeroer { zero }, &mut ast, statements[1]).unwrap();

        let total = Summer.visit(&ast, statements[1], &mut ());
        assert!(matches!(total, Err(InternalError::UnusedNode { kind: "Paren", .. })));

        let NodeKind::ExpressionStatement(sum) = ast.kind(statements[1]).clone() else {
            panic!("expected an expression statement");
        };
        for child in ast.children(sum) {
            assert_eq!(ast.parent(child), Some(sum));
            assert!(!matches!(ast.kind(child), NodeKind::Identifier(_)));
        }
    }
}
