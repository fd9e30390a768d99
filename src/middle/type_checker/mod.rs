//! Boa type checker
//!
//! Checking is split over two visitors sharing one [`CheckContext`]:
//!
//!   1) [`TypeChecker`] is driven by [`walk`] over statements. It owns the
//!      scoping rules: blocks, loops, views and declarations.
//!   2) [`TypeInference`] computes the type of expressions and type nodes. It
//!      hands statement bodies of function literals and visit clauses back to
//!      a fresh [`TypeChecker`] walk.
//!
//! Problems never stop the check. Each one becomes a [`Diagnostic`] and the
//! offending expression gets [`Type::Error`], which is compatible with
//! everything so a single mistake reports once.

use hashbrown::HashMap;
use tracing::{debug, trace};

pub use self::infer::TypeInference;
use self::scope::{Binding, ScopeStack};
use super::{
    builtins::Builtins,
    diagnostic::Diagnostic,
    primitive::PrimitiveKind,
    ty::{OutputType, Type},
};
use crate::{
    CompilerConfig,
    frontend::{
        ast::{
            Assignment, Ast, BinaryOperatorKind, DoWhileStatement, EmitStatement, ForStatement,
            Identifier, IfStatement, NodeId, NodeKind, QuantifierStatement, SwitchCase,
            SwitchStatement, TypeDecl, VarDecl, ViewDecl, VisitTiming, WhileStatement,
            visit::{InternalError, Traversal, VisitorNoReturn, walk},
        },
        lexer::Span,
    },
};

mod infer;
mod scope;

/// Where a `return` or `stop` statement currently ends up
#[derive(Debug, Clone)]
enum ReturnContext {
    /// Inside a function literal with the given declared return type
    Function(Option<Type>),
    /// Inside a visit clause
    Visit(VisitTiming),
}

#[derive(Debug, Default)]
struct ViewFrame {
    outputs: Vec<(String, OutputType)>,
}

/// Mutable state of a single check
#[derive(Debug)]
pub struct CheckContext {
    scopes: ScopeStack,
    diagnostics: Vec<Diagnostic>,
    returns: Vec<ReturnContext>,
    views: Vec<ViewFrame>,
    switches: Vec<Type>,
    node_types: HashMap<NodeId, Type>,
}

impl CheckContext {
    fn new(ast: &Ast<'_>, builtins: &Builtins) -> Self {
        let mut scopes = ScopeStack::new();

        // Globals nobody mentions never need a binding
        for (name, ty) in builtins.globals() {
            if let Some(symbol) = ast.lookup_symbol(name) {
                scopes.add_global_binding(symbol, Binding::Variable(ty.clone()));
            }
        }

        Self {
            scopes,
            diagnostics: Vec::new(),
            returns: Vec::new(),
            views: Vec::new(),
            switches: Vec::new(),
            node_types: HashMap::new(),
        }
    }

    fn error(&mut self, ast: &Ast<'_>, span: Span, message: impl Into<String>) {
        let diagnostic = Diagnostic::new(ast.source(), span, message);
        trace!(%diagnostic, "reporting diagnostic");
        self.diagnostics.push(diagnostic);
    }
}

#[derive(Debug)]
pub struct TypeCheckResult {
    /// In the order they were found
    pub diagnostics: Vec<Diagnostic>,
    /// Type of every expression and type node that was checked
    pub node_types: HashMap<NodeId, Type>,
}

impl TypeCheckResult {
    pub fn is_ok(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn type_of(&self, id: NodeId) -> Option<&Type> {
        self.node_types.get(&id)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TypeChecker<'b> {
    builtins: &'b Builtins,
}

impl<'b> TypeChecker<'b> {
    pub fn new(builtins: &'b Builtins) -> Self {
        Self { builtins }
    }

    pub fn check(ast: &Ast<'_>, config: &CompilerConfig) -> Result<TypeCheckResult, InternalError> {
        let mut cx = CheckContext::new(ast, &config.builtins);

        debug!(origin = %ast.source().origin, "type checking program");

        if let Some(root) = ast.root() {
            walk(&mut TypeChecker::new(&config.builtins), ast, root, &mut cx)?;
        }

        debug!(diagnostics = cx.diagnostics.len(), "type checked program");

        Ok(TypeCheckResult {
            diagnostics: cx.diagnostics,
            node_types: cx.node_types,
        })
    }

    fn infer(
        &self,
        ast: &Ast<'_>,
        id: NodeId,
        cx: &mut CheckContext,
    ) -> Result<Type, InternalError> {
        TypeInference::new(self.builtins).infer(ast, id, cx)
    }

    fn check_condition(
        &self,
        ast: &Ast<'_>,
        condition: NodeId,
        keyword: &str,
        cx: &mut CheckContext,
    ) -> Result<(), InternalError> {
        let ty = self.infer(ast, condition, cx)?;

        if !matches!(ty, Type::Error | Type::Primitive(PrimitiveKind::Bool)) {
            cx.error(
                ast,
                ast.span(condition),
                format!(
                    "incompatible types for {keyword} condition: required 'boolean', found '{ty}'"
                ),
            );
        }

        Ok(())
    }

    /// Infers a value that is about to be stored somewhere, rejecting type
    /// names and void calls
    fn infer_value(
        &self,
        ast: &Ast<'_>,
        id: NodeId,
        cx: &mut CheckContext,
    ) -> Result<Type, InternalError> {
        match self.infer(ast, id, cx)? {
            Type::TypeName(ty) => {
                cx.error(
                    ast,
                    ast.span(id),
                    format!("type '{ty}' is not a value and can not be assigned"),
                );
                Ok(Type::Error)
            }
            Type::Void => {
                cx.error(
                    ast,
                    ast.span(id),
                    "functions without a return type can not be used as initializers",
                );
                Ok(Type::Error)
            }
            ty => Ok(ty),
        }
    }

    fn check_assignable(
        ast: &Ast<'_>,
        span: Span,
        required: &Type,
        found: &Type,
        cx: &mut CheckContext,
    ) {
        if !required.assigns(found) {
            cx.error(
                ast,
                span,
                format!("incompatible types for assignment: required '{required}', found '{found}'"),
            );
        }
    }

    /// Checks `target << value` where the target is not an output variable
    fn check_shift(
        &self,
        ast: &Ast<'_>,
        id: NodeId,
        node: &EmitStatement,
        cx: &mut CheckContext,
    ) -> Result<(), InternalError> {
        let lhs = self.infer(ast, node.target, cx)?;
        let rhs = self.infer(ast, node.value, cx)?;

        if let Err(error) = lhs.binary_operation(BinaryOperatorKind::ShiftLeft, &rhs) {
            cx.error(ast, ast.span(id), error.to_string());
        }
        if let Some(weight) = node.weight {
            self.infer(ast, weight, cx)?;
        }

        Ok(())
    }

    fn finish_view(&self, ast: &Ast<'_>, view: &ViewDecl, cx: &mut CheckContext) {
        cx.scopes.pop_shallow_scope();
        let frame = cx.views.pop().unwrap_or_default();

        if cx.scopes.get_binding(view.name.symbol).is_some() {
            let name = ast.identifier(view.name);
            cx.error(
                ast,
                view.name.span,
                format!("name conflict: identifier name '{name}' already exists"),
            );
            return;
        }

        cx.scopes
            .add_shallow_binding(view.name.symbol, Binding::View(frame.outputs));
    }
}

/// `_` followed by digits is reserved
fn is_invalid_identifier(name: &str) -> bool {
    name.strip_prefix('_')
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
}

/// Binds a variable in the innermost scope, reporting reserved names and
/// redeclarations with a different type
fn declare(ast: &Ast<'_>, name: Identifier, ty: Type, cx: &mut CheckContext) {
    let text = ast.identifier(name);

    if is_invalid_identifier(text) {
        cx.error(ast, name.span, format!("invalid identifier '{text}'"));
    }

    let conflict = match cx.scopes.get_shallow_binding(name.symbol) {
        Some(Binding::Variable(previous)) if *previous != ty => {
            Some(format!("variable '{text}' already declared as '{previous}'"))
        }
        _ => None,
    };

    if let Some(message) = conflict {
        cx.error(ast, name.span, message);
    }

    cx.scopes
        .add_shallow_binding(name.symbol, Binding::Variable(ty));
}

impl VisitorNoReturn for TypeChecker<'_> {
    type Context = CheckContext;

    fn visit_block(
        &mut self,
        _ast: &Ast<'_>,
        _id: NodeId,
        _node: &[NodeId],
        cx: &mut CheckContext,
    ) -> Result<Traversal, InternalError> {
        cx.scopes.push_shallow_scope();
        Ok(Traversal::Continue)
    }

    fn visit_if(
        &mut self,
        ast: &Ast<'_>,
        _id: NodeId,
        node: &IfStatement,
        cx: &mut CheckContext,
    ) -> Result<Traversal, InternalError> {
        self.check_condition(ast, node.condition, "if", cx)?;
        Ok(Traversal::Continue)
    }

    fn visit_while(
        &mut self,
        ast: &Ast<'_>,
        _id: NodeId,
        node: &WhileStatement,
        cx: &mut CheckContext,
    ) -> Result<Traversal, InternalError> {
        self.check_condition(ast, node.condition, "while", cx)?;
        Ok(Traversal::Continue)
    }

    fn visit_do_while(
        &mut self,
        ast: &Ast<'_>,
        _id: NodeId,
        node: &DoWhileStatement,
        cx: &mut CheckContext,
    ) -> Result<Traversal, InternalError> {
        self.check_condition(ast, node.condition, "do", cx)?;
        Ok(Traversal::Continue)
    }

    fn visit_for(
        &mut self,
        ast: &Ast<'_>,
        _id: NodeId,
        node: &ForStatement,
        cx: &mut CheckContext,
    ) -> Result<Traversal, InternalError> {
        // The condition sees the init declaration, so the children are walked
        // by hand in that order. The scope is popped in `leave`.
        cx.scopes.push_shallow_scope();

        if let Some(init) = node.init {
            walk(self, ast, init, cx)?;
        }
        if let Some(condition) = node.condition {
            self.check_condition(ast, condition, "for", cx)?;
        }
        if let Some(update) = node.update {
            walk(self, ast, update, cx)?;
        }
        walk(self, ast, node.body, cx)?;

        Ok(Traversal::SkipChildren)
    }

    fn visit_quantifier(
        &mut self,
        ast: &Ast<'_>,
        _id: NodeId,
        node: &QuantifierStatement,
        cx: &mut CheckContext,
    ) -> Result<Traversal, InternalError> {
        cx.scopes.push_shallow_scope();

        let ty = self.infer(ast, node.ty, cx)?;
        declare(ast, node.binding, ty, cx);

        self.check_condition(ast, node.condition, &node.kind.to_string(), cx)?;

        Ok(Traversal::Continue)
    }

    fn visit_switch(
        &mut self,
        ast: &Ast<'_>,
        _id: NodeId,
        node: &SwitchStatement,
        cx: &mut CheckContext,
    ) -> Result<Traversal, InternalError> {
        let scrutinee = self.infer(ast, node.scrutinee, cx)?;
        cx.switches.push(scrutinee);

        Ok(Traversal::Continue)
    }

    fn visit_case(
        &mut self,
        ast: &Ast<'_>,
        _id: NodeId,
        node: &SwitchCase,
        cx: &mut CheckContext,
    ) -> Result<Traversal, InternalError> {
        let scrutinee = cx.switches.last().cloned().unwrap_or(Type::Error);

        for value in &node.values {
            let ty = self.infer(ast, *value, cx)?;

            if !scrutinee.assigns(&ty) {
                cx.error(
                    ast,
                    ast.span(*value),
                    format!("incompatible types for switch case: required '{scrutinee}', found '{ty}'"),
                );
            }
        }

        Ok(Traversal::Continue)
    }

    fn visit_return(
        &mut self,
        ast: &Ast<'_>,
        id: NodeId,
        node: &Option<NodeId>,
        cx: &mut CheckContext,
    ) -> Result<Traversal, InternalError> {
        let value = match node {
            Some(value) => Some(self.infer(ast, *value, cx)?),
            None => None,
        };

        match cx.returns.last().cloned() {
            None => cx.error(
                ast,
                ast.span(id),
                "return statement not allowed outside functions",
            ),
            Some(ReturnContext::Visit(_)) => cx.error(
                ast,
                ast.span(id),
                "return statement not allowed inside visitors",
            ),
            Some(ReturnContext::Function(Some(required))) => {
                if let Some(found) = value.filter(|found| !required.assigns(found)) {
                    cx.error(
                        ast,
                        ast.span(id),
                        format!(
                            "incompatible types for return: required '{required}', found '{found}'"
                        ),
                    );
                }
            }
            Some(ReturnContext::Function(None)) => {}
        }

        Ok(Traversal::SkipChildren)
    }

    fn visit_stop(
        &mut self,
        ast: &Ast<'_>,
        id: NodeId,
        cx: &mut CheckContext,
    ) -> Result<Traversal, InternalError> {
        if !matches!(
            cx.returns.last(),
            Some(ReturnContext::Visit(VisitTiming::Before))
        ) {
            cx.error(
                ast,
                ast.span(id),
                "stop statement only allowed inside 'before' visits",
            );
        }

        Ok(Traversal::Continue)
    }

    fn visit_expression_statement(
        &mut self,
        ast: &Ast<'_>,
        _id: NodeId,
        node: &NodeId,
        cx: &mut CheckContext,
    ) -> Result<Traversal, InternalError> {
        self.infer(ast, *node, cx)?;
        Ok(Traversal::SkipChildren)
    }

    fn visit_assignment(
        &mut self,
        ast: &Ast<'_>,
        id: NodeId,
        node: &Assignment,
        cx: &mut CheckContext,
    ) -> Result<Traversal, InternalError> {
        let target = self.infer(ast, node.target, cx)?;
        let value = self.infer_value(ast, node.value, cx)?;

        Self::check_assignable(ast, ast.span(id), &target, &value, cx);

        Ok(Traversal::SkipChildren)
    }

    fn visit_emit(
        &mut self,
        ast: &Ast<'_>,
        id: NodeId,
        node: &EmitStatement,
        cx: &mut CheckContext,
    ) -> Result<Traversal, InternalError> {
        // Peel `out[a][b]` into the output variable and its indices
        let mut indices = Vec::new();
        let mut base = node.target;
        while let NodeKind::Index(index) = ast.kind(base) {
            indices.push(index.index);
            base = index.target;
        }
        indices.reverse();

        let output = match ast.kind(base) {
            NodeKind::Identifier(name) => match cx.scopes.get_binding(name.symbol) {
                Some(Binding::Variable(Type::Output(output))) => Some((*name, output.clone())),
                _ => None,
            },
            _ => None,
        };

        let Some((name, output)) = output else {
            self.check_shift(ast, id, node, cx)?;
            return Ok(Traversal::SkipChildren);
        };

        let output_type = Type::Output(output.clone());
        cx.node_types.insert(base, output_type.clone());

        if indices.len() != output.indices.len() {
            cx.error(
                ast,
                ast.span(node.target),
                format!(
                    "incorrect number of indices for '{}': required {}, found {}",
                    ast.identifier(name),
                    output.indices.len(),
                    indices.len()
                ),
            );
        }

        for (position, index) in indices.iter().enumerate() {
            let ty = self.infer(ast, *index, cx)?;

            let Some(column) = output.indices.get(position) else {
                continue;
            };
            if !column.ty.assigns(&ty) {
                cx.error(
                    ast,
                    ast.span(*index),
                    format!("invalid index type '{ty}' for indexing into '{output_type}'"),
                );
            }
        }

        let value = self.infer(ast, node.value, cx)?;
        if !output.value.ty.assigns(&value) {
            cx.error(
                ast,
                ast.span(node.value),
                format!(
                    "incompatible types for emit: required '{}', found '{value}'",
                    output.value.ty
                ),
            );
        }

        if let Some(weight) = node.weight {
            let ty = self.infer(ast, weight, cx)?;

            if let Some(required) = output
                .weight
                .as_deref()
                .filter(|required| !required.assigns(&ty))
            {
                cx.error(
                    ast,
                    ast.span(weight),
                    format!("incompatible types for emit: required '{required}', found '{ty}'"),
                );
            }
        }

        Ok(Traversal::SkipChildren)
    }

    fn visit_var_decl(
        &mut self,
        ast: &Ast<'_>,
        id: NodeId,
        node: &VarDecl,
        cx: &mut CheckContext,
    ) -> Result<Traversal, InternalError> {
        let declared = node.ty.map(|ty| self.infer(ast, ty, cx)).transpose()?;
        let initial = node
            .initializer
            .map(|value| self.infer_value(ast, value, cx))
            .transpose()?;

        if let (Some(declared), Some(initial)) = (&declared, &initial) {
            Self::check_assignable(ast, ast.span(id), declared, initial, cx);
        }

        let ty = declared.or(initial).unwrap_or(Type::Error);

        // Outputs declared directly in a view body are what the view exposes
        if let Type::Output(output) = &ty {
            let in_view_body = ast
                .parent(id)
                .and_then(|block| ast.parent(block))
                .is_some_and(|view| matches!(ast.kind(view), NodeKind::View(_)));

            if let Some(frame) = cx.views.last_mut().filter(|_| in_view_body) {
                frame
                    .outputs
                    .push((ast.identifier(node.name).to_string(), output.clone()));
            }
        }

        declare(ast, node.name, ty, cx);

        Ok(Traversal::SkipChildren)
    }

    fn visit_type_decl(
        &mut self,
        ast: &Ast<'_>,
        _id: NodeId,
        node: &TypeDecl,
        cx: &mut CheckContext,
    ) -> Result<Traversal, InternalError> {
        let ty = self.infer(ast, node.ty, cx)?;
        cx.scopes
            .add_shallow_binding(node.name.symbol, Binding::TypeName(ty));

        Ok(Traversal::SkipChildren)
    }

    fn visit_view(
        &mut self,
        _ast: &Ast<'_>,
        _id: NodeId,
        _node: &ViewDecl,
        cx: &mut CheckContext,
    ) -> Result<Traversal, InternalError> {
        cx.views.push(ViewFrame::default());
        cx.scopes.push_barrier_scope();

        Ok(Traversal::Continue)
    }

    /// Expressions under statements are inferred by the statement hooks
    fn visit_expression(
        &mut self,
        _ast: &Ast<'_>,
        _id: NodeId,
        _cx: &mut CheckContext,
    ) -> Result<Traversal, InternalError> {
        Ok(Traversal::SkipChildren)
    }

    fn visit_type(
        &mut self,
        _ast: &Ast<'_>,
        _id: NodeId,
        _cx: &mut CheckContext,
    ) -> Result<Traversal, InternalError> {
        Ok(Traversal::SkipChildren)
    }

    fn leave(
        &mut self,
        ast: &Ast<'_>,
        id: NodeId,
        cx: &mut CheckContext,
    ) -> Result<(), InternalError> {
        match ast.kind(id) {
            NodeKind::Block(_) | NodeKind::For(_) | NodeKind::Quantifier(_) => {
                cx.scopes.pop_shallow_scope()
            }
            NodeKind::Switch(_) => {
                cx.switches.pop();
            }
            NodeKind::View(view) => self.finish_view(ast, view, cx),
            _ => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{SourceFile, frontend::parser::Parser};

    fn check(program: &str) -> Vec<String> {
        let source = SourceFile::memory(program);
        let config = CompilerConfig::default();
        let ast = Parser::parse_program(&source, &config).unwrap();

        TypeChecker::check(&ast, &config)
            .unwrap()
            .diagnostics
            .into_iter()
            .map(|diagnostic| diagnostic.message)
            .collect()
    }

    #[test]
    fn reserved_identifiers() {
        assert!(is_invalid_identifier("_0"));
        assert!(is_invalid_identifier("_42"));
        assert!(!is_invalid_identifier("_"));
        assert!(!is_invalid_identifier("_a1"));
        assert!(!is_invalid_identifier("a_1"));
    }

    #[test]
    fn records_expression_types() {
        let source = SourceFile::memory("x := 1 + 2.0;");
        let config = CompilerConfig::default();
        let ast = Parser::parse_program(&source, &config).unwrap();
        let result = TypeChecker::check(&ast, &config).unwrap();

        let root = ast.root().unwrap();
        let NodeKind::VarDecl(decl) = ast.kind(ast.children(root)[0]) else {
            panic!("expected a declaration");
        };

        assert!(result.is_ok());
        assert_eq!(result.type_of(decl.initializer.unwrap()), Some(&Type::FLOAT));
    }

    #[test]
    fn one_mistake_reports_once() {
        let diagnostics = check(indoc! {"
            x := y + 1;
            z: int = x * 2;
            if (x > z) z = 0;
        "});

        assert_eq!(diagnostics, vec!["variable 'y' undefined"]);
    }

    #[test]
    fn scopes_end_with_their_block() {
        let diagnostics = check(indoc! {"
            { inner := 1; }
            outer := inner;
        "});

        assert_eq!(diagnostics, vec!["variable 'inner' undefined"]);
    }

    #[test]
    fn for_init_is_visible_in_condition() {
        let diagnostics = check(indoc! {"
            total := 0;
            for (i := 0; i < 10; i++)
                total = total + i;
        "});

        assert_eq!(diagnostics, Vec::<String>::new());
    }
}
