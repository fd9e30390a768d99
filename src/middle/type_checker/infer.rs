use itertools::Itertools;

use super::{CheckContext, ReturnContext, TypeChecker, declare, scope::Binding};
use crate::{
    frontend::{
        ast::{
            self, Ast, BinaryExpression, CallExpression, CollectionType, FunctionLiteral,
            FunctionType, Identifier, IndexExpression, Literal, LiteralKind, MapType, NodeId,
            NodeKind, OutputType, SelectorExpression, TableType, UnaryExpression, VisitClause,
            visit::{InternalError, Visitor, walk},
        },
        lexer::Span,
    },
    middle::{
        builtins::Builtins,
        primitive::PrimitiveKind,
        ty::{self, IndexError, Type},
    },
};

/// Computes the [`Type`] of expressions and resolves type nodes
#[derive(Debug, Clone, Copy)]
pub struct TypeInference<'b> {
    builtins: &'b Builtins,
}

impl<'b> TypeInference<'b> {
    pub fn new(builtins: &'b Builtins) -> Self {
        Self { builtins }
    }

    /// Visits `id` and records its type
    pub fn infer(
        &mut self,
        ast: &Ast<'_>,
        id: NodeId,
        cx: &mut CheckContext,
    ) -> Result<Type, InternalError> {
        let ty = self.visit(ast, id, cx)?;
        cx.node_types.insert(id, ty.clone());
        Ok(ty)
    }

    fn infer_all(
        &mut self,
        ast: &Ast<'_>,
        ids: &[NodeId],
        cx: &mut CheckContext,
    ) -> Result<Vec<Type>, InternalError> {
        ids.iter().map(|id| self.infer(ast, *id, cx)).collect()
    }

    fn component(
        &mut self,
        ast: &Ast<'_>,
        id: NodeId,
        cx: &mut CheckContext,
    ) -> Result<ty::Component, InternalError> {
        let name = match ast.kind(id) {
            NodeKind::Component(component) => component
                .name
                .map(|name| ast.identifier(name).to_string()),
            _ => None,
        };

        Ok(ty::Component {
            name,
            ty: self.infer(ast, id, cx)?,
        })
    }

    fn components(
        &mut self,
        ast: &Ast<'_>,
        ids: &[NodeId],
        cx: &mut CheckContext,
    ) -> Result<Vec<ty::Component>, InternalError> {
        ids.iter().map(|id| self.component(ast, *id, cx)).collect()
    }

    /// Runs a statement walk over the body of a function literal or visit
    /// clause
    fn check_body(
        &self,
        ast: &Ast<'_>,
        body: NodeId,
        context: ReturnContext,
        cx: &mut CheckContext,
    ) -> Result<(), InternalError> {
        cx.returns.push(context);
        let result = walk(&mut TypeChecker::new(self.builtins), ast, body, cx);
        cx.returns.pop();

        result
    }

    fn index_table(
        ast: &Ast<'_>,
        span: Span,
        target: &Type,
        table: &ty::TableType,
        index: &Type,
        from_view: bool,
        cx: &mut CheckContext,
    ) -> Type {
        match table.index(index) {
            Ok(rest) => Type::Table(rest),
            Err(IndexError::TooManyIndices) => {
                cx.error(ast, span, "too many indices");
                Type::Error
            }
            Err(IndexError::InvalidIndexType { expected }) if from_view => {
                cx.error(
                    ast,
                    span,
                    format!("index type {index} doesn't match with view column type {expected}"),
                );
                Type::Error
            }
            Err(IndexError::InvalidIndexType { .. }) => {
                let column = table
                    .indices
                    .first()
                    .map(ToString::to_string)
                    .unwrap_or_default();

                cx.error(
                    ast,
                    span,
                    format!(
                        "invalid index type '{index}' for indexing into '{target}' - expected '{column}'"
                    ),
                );
                Type::Error
            }
        }
    }

    /// `t[f]` keeps the rows of `t` whose first index column satisfies the
    /// predicate `f`
    fn filter_table(
        ast: &Ast<'_>,
        span: Span,
        target: &Type,
        filter: &ty::FunctionType,
        cx: &mut CheckContext,
    ) -> Type {
        let table = match target {
            Type::Table(table) => table.clone(),
            Type::Output(output) => output.as_table(),
            _ => {
                cx.error(ast, span, format!("expected a table type instead of {target}"));
                return Type::Error;
            }
        };

        let Some(column) = table.indices.first() else {
            cx.error(ast, span, "too many indices");
            return Type::Error;
        };

        let predicate = filter
            .return_type
            .as_deref()
            .is_some_and(|ty| Type::BOOL.assigns(ty));

        let invalid = match filter.parameters.as_slice() {
            [parameter] if !parameter.accepts(&column.ty) => parameter.to_string(),
            [_] if predicate => return Type::Table(table),
            _ => Type::Function(filter.clone()).to_string(),
        };

        cx.error(ast, span, format!("invalid index type '{invalid}' for table filter"));
        Type::Error
    }

    /// Whether `id` reads an output of a subview, as in `sv.o` or `sv.o[i]`
    fn selects_view_output(ast: &Ast<'_>, id: NodeId, cx: &CheckContext) -> bool {
        match ast.kind(id) {
            NodeKind::Selector(selector) => matches!(
                ast.kind(selector.target),
                NodeKind::Identifier(view)
                    if matches!(cx.scopes.get_binding(view.symbol), Some(Binding::View(_)))
            ),
            NodeKind::Index(index) => Self::selects_view_output(ast, index.target, cx),
            _ => false,
        }
    }

    /// `sv.o` inside a view: the table exposed by output `o` of subview `sv`.
    /// `None` if the target is not a view at all.
    fn select_subview(
        &self,
        ast: &Ast<'_>,
        span: Span,
        view: Identifier,
        field: Identifier,
        cx: &mut CheckContext,
    ) -> Option<Type> {
        let view_name = ast.identifier(view);
        let field_name = ast.identifier(field);

        let found = match cx.scopes.get_binding(view.symbol) {
            Some(Binding::View(outputs)) => outputs
                .iter()
                .find(|(name, _)| name == field_name)
                .map(|(_, output)| Type::Table(output.as_table())),
            Some(_) => return None,
            None if !cx.views.is_empty() && self.builtins.named_type(view_name).is_none() => {
                cx.error(ast, view.span, format!("subview '{view_name}' undefined"));
                return Some(Type::Error);
            }
            None => return None,
        };

        Some(found.unwrap_or_else(|| {
            cx.error(
                ast,
                span,
                format!("output variable '{field_name}' not found in subview '{view_name}'"),
            );
            Type::Error
        }))
    }
}

impl Visitor for TypeInference<'_> {
    type Output = Type;
    type Context = CheckContext;

    fn visit_literal(
        &mut self,
        _ast: &Ast<'_>,
        _id: NodeId,
        node: &Literal,
        _cx: &mut CheckContext,
    ) -> Result<Type, InternalError> {
        Ok(match node.kind {
            LiteralKind::Boolean => Type::BOOL,
            LiteralKind::Integer => Type::INT,
            LiteralKind::Float => Type::FLOAT,
            LiteralKind::String => Type::STRING,
            LiteralKind::Time => Type::TIME,
        })
    }

    fn visit_identifier(
        &mut self,
        ast: &Ast<'_>,
        _id: NodeId,
        node: &Identifier,
        cx: &mut CheckContext,
    ) -> Result<Type, InternalError> {
        match cx.scopes.get_binding(node.symbol) {
            Some(Binding::Variable(ty)) => return Ok(ty.clone()),
            Some(Binding::TypeName(ty)) => return Ok(Type::TypeName(Box::new(ty.clone()))),
            Some(Binding::View(_)) | None => {}
        }

        let name = ast.identifier(*node);

        if let Some(ty) = self.builtins.named_type(name) {
            return Ok(Type::TypeName(Box::new(ty)));
        }
        if let Some(ty) = self.builtins.function_type(name) {
            return Ok(ty);
        }

        cx.error(ast, node.span, format!("variable '{name}' undefined"));
        Ok(Type::Error)
    }

    fn visit_call(
        &mut self,
        ast: &Ast<'_>,
        id: NodeId,
        node: &CallExpression,
        cx: &mut CheckContext,
    ) -> Result<Type, InternalError> {
        let arguments = self.infer_all(ast, &node.arguments, cx)?;

        let (name, callee) = match ast.kind(node.target) {
            NodeKind::Identifier(identifier) => {
                let name = ast.identifier(*identifier);

                match cx.scopes.get_binding(identifier.symbol) {
                    Some(Binding::Variable(ty)) => {
                        let ty = ty.clone();
                        cx.node_types.insert(node.target, ty.clone());
                        (name, Some(ty))
                    }
                    _ => {
                        if let Some(result) = self.builtins.resolve_function(name, &arguments) {
                            return Ok(result);
                        }
                        (name, None)
                    }
                }
            }
            _ => (
                ast.source().value_of_span(ast.span(node.target)),
                Some(self.infer(ast, node.target, cx)?),
            ),
        };

        match &callee {
            Some(Type::Function(function))
                if function.parameters.len() == arguments.len()
                    && function
                        .parameters
                        .iter()
                        .zip(&arguments)
                        .all(|(parameter, argument)| parameter.accepts(argument)) =>
            {
                return Ok(function.return_type.as_deref().cloned().unwrap_or(Type::Void));
            }
            Some(Type::Error) => return Ok(Type::Error),
            _ if arguments.iter().any(Type::is_error) => return Ok(Type::Error),
            _ => {}
        }

        cx.error(
            ast,
            ast.span(id),
            format!("no such function {name}([{}])", arguments.iter().join(", ")),
        );
        Ok(Type::Error)
    }

    fn visit_index(
        &mut self,
        ast: &Ast<'_>,
        id: NodeId,
        node: &IndexExpression,
        cx: &mut CheckContext,
    ) -> Result<Type, InternalError> {
        let target = self.infer(ast, node.target, cx)?;
        let index = self.infer(ast, node.index, cx)?;
        let span = ast.span(id);

        // t[f] filters rows instead of consuming a column
        if let Type::Function(filter) = &index
            && !matches!(target, Type::Error | Type::Map { .. })
        {
            return Ok(Self::filter_table(ast, span, &target, filter, cx));
        }

        let from_view = Self::selects_view_output(ast, node.target, cx);

        let element = match &target {
            Type::Error => return Ok(Type::Error),
            Type::Array(element) => Type::INT.assigns(&index).then(|| (**element).clone()),
            Type::Primitive(PrimitiveKind::String) => {
                Type::INT.assigns(&index).then_some(Type::STRING)
            }
            Type::Map { key, value } => key.assigns(&index).then(|| (**value).clone()),
            Type::Table(table) => {
                return Ok(Self::index_table(ast, span, &target, table, &index, from_view, cx));
            }
            Type::Output(output) => {
                let table = output.as_table();
                return Ok(Self::index_table(ast, span, &target, &table, &index, from_view, cx));
            }
            _ => None,
        };

        Ok(element.unwrap_or_else(|| {
            cx.error(
                ast,
                span,
                format!("invalid index type '{index}' for indexing into '{target}'"),
            );
            Type::Error
        }))
    }

    fn visit_selector(
        &mut self,
        ast: &Ast<'_>,
        id: NodeId,
        node: &SelectorExpression,
        cx: &mut CheckContext,
    ) -> Result<Type, InternalError> {
        let span = ast.span(id);

        if let NodeKind::Identifier(view) = ast.kind(node.target) {
            if let Some(table) = self.select_subview(ast, span, *view, node.field, cx) {
                return Ok(table);
            }
        }

        let target = self.infer(ast, node.target, cx)?;
        let field = ast.identifier(node.field);

        let message = match &target {
            Type::Error => return Ok(Type::Error),
            Type::Table(_) | Type::Output(_) => "invalid selector on BoaTable".to_string(),
            Type::TypeName(inner) => match **inner {
                Type::Enum(name) if self.builtins.enum_member(name, field) => {
                    return Ok(Type::Enum(name));
                }
                _ => format!("'{inner}' has no member named '{field}'"),
            },
            _ => match target.member(field, self.builtins) {
                Ok(member) => return Ok(member),
                Err(error) => error.to_string(),
            },
        };

        cx.error(ast, span, message);
        Ok(Type::Error)
    }

    fn visit_binary(
        &mut self,
        ast: &Ast<'_>,
        id: NodeId,
        node: &BinaryExpression,
        cx: &mut CheckContext,
    ) -> Result<Type, InternalError> {
        let lhs = self.infer(ast, node.lhs, cx)?;
        let rhs = self.infer(ast, node.rhs, cx)?;

        Ok(lhs
            .binary_operation(node.operator, &rhs)
            .unwrap_or_else(|error| {
                cx.error(ast, ast.span(id), error.to_string());
                Type::Error
            }))
    }

    fn visit_unary(
        &mut self,
        ast: &Ast<'_>,
        id: NodeId,
        node: &UnaryExpression,
        cx: &mut CheckContext,
    ) -> Result<Type, InternalError> {
        let operand = self.infer(ast, node.operand, cx)?;

        Ok(operand.unary_operation(node.operator).unwrap_or_else(|error| {
            cx.error(ast, ast.span(id), error.to_string());
            Type::Error
        }))
    }

    fn visit_paren(
        &mut self,
        ast: &Ast<'_>,
        _id: NodeId,
        node: &NodeId,
        cx: &mut CheckContext,
    ) -> Result<Type, InternalError> {
        self.infer(ast, *node, cx)
    }

    fn visit_composite(
        &mut self,
        ast: &Ast<'_>,
        _id: NodeId,
        node: &[NodeId],
        cx: &mut CheckContext,
    ) -> Result<Type, InternalError> {
        let components = self
            .infer_all(ast, node, cx)?
            .into_iter()
            .map(ty::Component::anonymous)
            .collect();

        Ok(Type::tuple(components))
    }

    fn visit_function_literal(
        &mut self,
        ast: &Ast<'_>,
        _id: NodeId,
        node: &FunctionLiteral,
        cx: &mut CheckContext,
    ) -> Result<Type, InternalError> {
        let ty = self.infer(ast, node.ty, cx)?;

        let (Type::Function(function), NodeKind::FunctionType(signature)) =
            (&ty, ast.kind(node.ty))
        else {
            return Ok(ty);
        };

        cx.scopes.push_shallow_scope();

        for (parameter, parameter_type) in signature.parameters.iter().zip(&function.parameters) {
            if let NodeKind::Component(ast::Component {
                name: Some(name), ..
            }) = ast.kind(*parameter)
            {
                declare(ast, *name, parameter_type.clone(), cx);
            }
        }

        let context = ReturnContext::Function(function.return_type.as_deref().cloned());
        let result = self.check_body(ast, node.body, context, cx);
        cx.scopes.pop_shallow_scope();
        result?;

        Ok(ty)
    }

    fn visit_visitor_literal(
        &mut self,
        ast: &Ast<'_>,
        _id: NodeId,
        node: &[NodeId],
        cx: &mut CheckContext,
    ) -> Result<Type, InternalError> {
        self.infer_all(ast, node, cx)?;
        Ok(Type::Visitor)
    }

    fn visit_visit_clause(
        &mut self,
        ast: &Ast<'_>,
        _id: NodeId,
        node: &VisitClause,
        cx: &mut CheckContext,
    ) -> Result<Type, InternalError> {
        let types = self.infer_all(ast, &node.types, cx)?;

        cx.scopes.push_shallow_scope();

        if let (Some(binding), Some(ty)) = (node.binding, types.first()) {
            declare(ast, binding, ty.clone(), cx);
        }

        let result = self.check_body(ast, node.body, ReturnContext::Visit(node.timing), cx);
        cx.scopes.pop_shallow_scope();
        result?;

        Ok(Type::Visitor)
    }

    fn visit_named_type(
        &mut self,
        ast: &Ast<'_>,
        _id: NodeId,
        node: &Identifier,
        cx: &mut CheckContext,
    ) -> Result<Type, InternalError> {
        if let Some(Binding::TypeName(ty)) = cx.scopes.get_binding(node.symbol) {
            return Ok(ty.clone());
        }

        let name = ast.identifier(*node);

        Ok(self.builtins.named_type(name).unwrap_or_else(|| {
            cx.error(ast, node.span, format!("type '{name}' undefined"));
            Type::Error
        }))
    }

    fn visit_array_type(
        &mut self,
        ast: &Ast<'_>,
        _id: NodeId,
        node: &NodeId,
        cx: &mut CheckContext,
    ) -> Result<Type, InternalError> {
        Ok(Type::array(self.infer(ast, *node, cx)?))
    }

    fn visit_map_type(
        &mut self,
        ast: &Ast<'_>,
        _id: NodeId,
        node: &MapType,
        cx: &mut CheckContext,
    ) -> Result<Type, InternalError> {
        let key = self.infer(ast, node.key, cx)?;
        let value = self.infer(ast, node.value, cx)?;

        Ok(Type::map(key, value))
    }

    fn visit_collection_type(
        &mut self,
        ast: &Ast<'_>,
        _id: NodeId,
        node: &CollectionType,
        cx: &mut CheckContext,
    ) -> Result<Type, InternalError> {
        Ok(Type::collection(node.kind, self.infer(ast, node.element, cx)?))
    }

    fn visit_tuple_type(
        &mut self,
        ast: &Ast<'_>,
        _id: NodeId,
        node: &[NodeId],
        cx: &mut CheckContext,
    ) -> Result<Type, InternalError> {
        Ok(Type::tuple(self.components(ast, node, cx)?))
    }

    fn visit_component(
        &mut self,
        ast: &Ast<'_>,
        _id: NodeId,
        node: &ast::Component,
        cx: &mut CheckContext,
    ) -> Result<Type, InternalError> {
        self.infer(ast, node.ty, cx)
    }

    fn visit_function_type(
        &mut self,
        ast: &Ast<'_>,
        _id: NodeId,
        node: &FunctionType,
        cx: &mut CheckContext,
    ) -> Result<Type, InternalError> {
        let parameters = self.infer_all(ast, &node.parameters, cx)?;
        let return_type = node
            .return_type
            .map(|ty| self.infer(ast, ty, cx))
            .transpose()?;

        Ok(Type::function(parameters, return_type))
    }

    fn visit_output_type(
        &mut self,
        ast: &Ast<'_>,
        _id: NodeId,
        node: &OutputType,
        cx: &mut CheckContext,
    ) -> Result<Type, InternalError> {
        let aggregator = ast.identifier(node.aggregator);

        if !self.builtins.is_aggregator(aggregator) {
            cx.error(
                ast,
                node.aggregator.span,
                format!("unknown aggregator '{aggregator}'"),
            );
        }

        self.infer_all(ast, &node.arguments, cx)?;
        let indices = self.components(ast, &node.indices, cx)?;
        let value = self.component(ast, node.value, cx)?;
        let weight = node
            .weight
            .map(|weight| self.infer(ast, weight, cx))
            .transpose()?
            .map(Box::new);

        Ok(Type::Output(ty::OutputType {
            aggregator: aggregator.to_string(),
            indices,
            value: Box::new(value),
            weight,
        }))
    }

    fn visit_table_type(
        &mut self,
        ast: &Ast<'_>,
        _id: NodeId,
        node: &TableType,
        cx: &mut CheckContext,
    ) -> Result<Type, InternalError> {
        let indices = self.components(ast, &node.indices, cx)?;
        let value = self.component(ast, node.value, cx)?;

        Ok(Type::Table(ty::TableType {
            indices,
            value: Box::new(value),
        }))
    }

    fn visit_model_type(
        &mut self,
        ast: &Ast<'_>,
        _id: NodeId,
        node: &NodeId,
        cx: &mut CheckContext,
    ) -> Result<Type, InternalError> {
        Ok(Type::Model(Box::new(self.infer(ast, *node, cx)?)))
    }

    fn visit_visitor_type(
        &mut self,
        _ast: &Ast<'_>,
        _id: NodeId,
        _cx: &mut CheckContext,
    ) -> Result<Type, InternalError> {
        Ok(Type::Visitor)
    }
}
