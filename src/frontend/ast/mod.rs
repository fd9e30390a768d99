use hashbrown::HashMap;
use strum::IntoStaticStr;

use self::visit::InternalError;
use super::{
    SourceFile,
    intern::{InternedSymbol, InterningTable},
};
use crate::{
    frontend::lexer::Span,
    index::{IndexVec, simple_index},
};

pub mod visit;

simple_index! {
    /// Handle of a node inside an [`Ast`] arena. Only meaningful for the
    /// arena that produced it.
    pub struct NodeId;
}

/// Arena holding every node of a compilation unit. Nodes refer to their
/// children and parent by [`NodeId`], so the parent links never own anything.
#[derive(Debug)]
pub struct Ast<'source> {
    source: &'source SourceFile,
    nodes: IndexVec<NodeId, Node>,
    symbols: InterningTable,
    root: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub span: Span,
    pub parent: Option<NodeId>,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeCategory {
    Program,
    Statement,
    Expression,
    Type,
}

#[derive(Debug, Clone, PartialEq, IntoStaticStr)]
pub enum NodeKind {
    Program(Vec<NodeId>),

    /* Statements */
    Block(Vec<NodeId>),
    If(IfStatement),
    While(WhileStatement),
    DoWhile(DoWhileStatement),
    For(ForStatement),
    Quantifier(QuantifierStatement),
    Switch(SwitchStatement),
    Case(SwitchCase),
    Return(Option<NodeId>),
    Break,
    Continue,
    Stop,
    ExpressionStatement(NodeId),
    Assignment(Assignment),
    Emit(EmitStatement),
    VarDecl(VarDecl),
    TypeDecl(TypeDecl),
    View(ViewDecl),

    /* Expressions */
    Literal(Literal),
    Identifier(Identifier),
    Call(CallExpression),
    Index(IndexExpression),
    Selector(SelectorExpression),
    Binary(BinaryExpression),
    Unary(UnaryExpression),
    Paren(NodeId),
    Composite(Vec<NodeId>),
    FunctionLiteral(FunctionLiteral),
    VisitorLiteral(Vec<NodeId>),
    VisitClause(VisitClause),

    /* Types */
    NamedType(Identifier),
    ArrayType(NodeId),
    MapType(MapType),
    CollectionType(CollectionType),
    TupleType(Vec<NodeId>),
    Component(Component),
    FunctionType(FunctionType),
    OutputType(OutputType),
    TableType(TableType),
    ModelType(NodeId),
    VisitorType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identifier {
    pub symbol: InternedSymbol,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStatement {
    pub condition: NodeId,
    pub then_branch: NodeId,
    pub else_branch: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileStatement {
    pub condition: NodeId,
    pub body: NodeId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DoWhileStatement {
    pub body: NodeId,
    pub condition: NodeId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForStatement {
    pub init: Option<NodeId>,
    pub condition: Option<NodeId>,
    pub update: Option<NodeId>,
    pub body: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum QuantifierKind {
    Foreach,
    Exists,
    Ifall,
}

/// foreach (i: int; cond) body
#[derive(Debug, Clone, PartialEq)]
pub struct QuantifierStatement {
    pub kind: QuantifierKind,
    pub binding: Identifier,
    pub ty: NodeId,
    pub condition: NodeId,
    pub body: NodeId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchStatement {
    pub scrutinee: NodeId,
    pub cases: Vec<NodeId>,
}

/// A `case` clause. The `default` clause has no values.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    pub values: Vec<NodeId>,
    pub body: Vec<NodeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub target: NodeId,
    pub value: NodeId,
}

/// counts[key] << value weight w;
#[derive(Debug, Clone, PartialEq)]
pub struct EmitStatement {
    pub target: NodeId,
    pub value: NodeId,
    pub weight: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub name: Identifier,
    pub ty: Option<NodeId>,
    pub initializer: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    pub name: Identifier,
    pub ty: NodeId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewDecl {
    pub name: Identifier,
    pub body: NodeId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    pub kind: LiteralKind,
    /// Raw source text of the literal (including quotes)
    pub symbol: InternedSymbol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    Boolean, // true
    Integer, // 1
    Float,   // 1.0
    String,  // "hello, world"
    Time,    // T"..."
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallExpression {
    pub target: NodeId,
    pub arguments: Vec<NodeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexExpression {
    pub target: NodeId,
    pub index: NodeId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectorExpression {
    pub target: NodeId,
    pub field: Identifier,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpression {
    pub operator: BinaryOperatorKind,
    pub lhs: NodeId,
    pub rhs: NodeId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpression {
    pub operator: UnaryOperatorKind,
    pub operand: NodeId,
}

/// function(a: int): int { ... }
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionLiteral {
    /// Always a [`NodeKind::FunctionType`]
    pub ty: NodeId,
    pub body: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum VisitTiming {
    Before,
    After,
}

/// before n: Project -> stmt
///
/// A wildcard clause (`before _ -> stmt`) has no binding and no types.
#[derive(Debug, Clone, PartialEq)]
pub struct VisitClause {
    pub timing: VisitTiming,
    pub binding: Option<Identifier>,
    pub types: Vec<NodeId>,
    pub body: NodeId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapType {
    pub key: NodeId,
    pub value: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum CollectionKind {
    Stack,
    Set,
    Queue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionType {
    pub kind: CollectionKind,
    pub element: NodeId,
}

/// An optionally named member of a tuple, table, function or output type
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub name: Option<Identifier>,
    pub ty: NodeId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionType {
    /// Always [`NodeKind::Component`]s
    pub parameters: Vec<NodeId>,
    pub return_type: Option<NodeId>,
}

/// output sum(10)[year: int] of count: int weight int
#[derive(Debug, Clone, PartialEq)]
pub struct OutputType {
    pub aggregator: Identifier,
    pub arguments: Vec<NodeId>,
    pub indices: Vec<NodeId>,
    pub value: NodeId,
    pub weight: Option<NodeId>,
}

/// table[year: int] of count: int
#[derive(Debug, Clone, PartialEq)]
pub struct TableType {
    pub indices: Vec<NodeId>,
    pub value: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperatorKind {
    Add,                  // +
    Subtract,             // -
    Multiply,             // *
    Divide,               // /
    Modulus,              // %
    Equals,               // ==
    NotEquals,            // !=
    LessThan,             // <
    LessThanOrEqualTo,    // <=
    GreaterThan,          // >
    GreaterThanOrEqualTo, // >=
    LogicalAnd,           // &&
    LogicalOr,            // ||
    BitwiseAnd,           // &
    BitwiseOr,            // |
    BitwiseXor,           // ^
    ShiftLeft,            // <<
    ShiftRight,           // >>
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperatorClass {
    Arithmetic,
    Bitwise,
    Comparison,
    Logical,
    Equality,
}

impl BinaryOperatorKind {
    pub fn class(self) -> BinaryOperatorClass {
        match self {
            Self::Add | Self::Subtract | Self::Multiply | Self::Divide | Self::Modulus => {
                BinaryOperatorClass::Arithmetic
            }
            Self::BitwiseAnd
            | Self::BitwiseOr
            | Self::BitwiseXor
            | Self::ShiftLeft
            | Self::ShiftRight => BinaryOperatorClass::Bitwise,
            Self::LessThan
            | Self::LessThanOrEqualTo
            | Self::GreaterThan
            | Self::GreaterThanOrEqualTo => BinaryOperatorClass::Comparison,
            Self::LogicalAnd | Self::LogicalOr => BinaryOperatorClass::Logical,
            Self::Equals | Self::NotEquals => BinaryOperatorClass::Equality,
        }
    }
}

impl core::fmt::Display for BinaryOperatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulus => "%",
            Self::Equals => "==",
            Self::NotEquals => "!=",
            Self::LessThan => "<",
            Self::LessThanOrEqualTo => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqualTo => ">=",
            Self::LogicalAnd => "&&",
            Self::LogicalOr => "||",
            Self::BitwiseAnd => "&",
            Self::BitwiseOr => "|",
            Self::BitwiseXor => "^",
            Self::ShiftLeft => "<<",
            Self::ShiftRight => ">>",
        };

        f.write_str(symbol)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperatorKind {
    Negate,        // -
    Plus,          // +
    LogicalNot,    // !
    BitwiseNot,    // ~
    PreIncrement,  // ++x
    PreDecrement,  // --x
    PostIncrement, // x++
    PostDecrement, // x--
}

impl core::fmt::Display for UnaryOperatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Negate => write!(f, "-"),
            Self::Plus => write!(f, "+"),
            Self::LogicalNot => write!(f, "!"),
            Self::BitwiseNot => write!(f, "~"),
            Self::PreIncrement | Self::PostIncrement => write!(f, "++"),
            Self::PreDecrement | Self::PostDecrement => write!(f, "--"),
        }
    }
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        self.into()
    }

    pub fn category(&self) -> NodeCategory {
        match self {
            Self::Program(_) => NodeCategory::Program,
            Self::Block(_)
            | Self::If(_)
            | Self::While(_)
            | Self::DoWhile(_)
            | Self::For(_)
            | Self::Quantifier(_)
            | Self::Switch(_)
            | Self::Case(_)
            | Self::Return(_)
            | Self::Break
            | Self::Continue
            | Self::Stop
            | Self::ExpressionStatement(_)
            | Self::Assignment(_)
            | Self::Emit(_)
            | Self::VarDecl(_)
            | Self::TypeDecl(_)
            | Self::View(_) => NodeCategory::Statement,
            Self::Literal(_)
            | Self::Identifier(_)
            | Self::Call(_)
            | Self::Index(_)
            | Self::Selector(_)
            | Self::Binary(_)
            | Self::Unary(_)
            | Self::Paren(_)
            | Self::Composite(_)
            | Self::FunctionLiteral(_)
            | Self::VisitorLiteral(_)
            | Self::VisitClause(_) => NodeCategory::Expression,
            Self::NamedType(_)
            | Self::ArrayType(_)
            | Self::MapType(_)
            | Self::CollectionType(_)
            | Self::TupleType(_)
            | Self::Component(_)
            | Self::FunctionType(_)
            | Self::OutputType(_)
            | Self::TableType(_)
            | Self::ModelType(_)
            | Self::VisitorType => NodeCategory::Type,
        }
    }

    /// Child handles in source order
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            Self::Program(items)
            | Self::Block(items)
            | Self::Composite(items)
            | Self::VisitorLiteral(items)
            | Self::TupleType(items) => items.clone(),
            Self::If(node) => [Some(node.condition), Some(node.then_branch), node.else_branch]
                .into_iter()
                .flatten()
                .collect(),
            Self::While(node) => vec![node.condition, node.body],
            Self::DoWhile(node) => vec![node.body, node.condition],
            Self::For(node) => [node.init, node.condition, node.update, Some(node.body)]
                .into_iter()
                .flatten()
                .collect(),
            Self::Quantifier(node) => vec![node.ty, node.condition, node.body],
            Self::Switch(node) => std::iter::once(node.scrutinee)
                .chain(node.cases.iter().copied())
                .collect(),
            Self::Case(node) => node.values.iter().chain(&node.body).copied().collect(),
            Self::Return(value) => value.iter().copied().collect(),
            Self::Break | Self::Continue | Self::Stop | Self::VisitorType => Vec::new(),
            Self::Literal(_) | Self::Identifier(_) | Self::NamedType(_) => Vec::new(),
            Self::ExpressionStatement(inner)
            | Self::Paren(inner)
            | Self::ArrayType(inner)
            | Self::ModelType(inner) => vec![*inner],
            Self::Assignment(node) => vec![node.target, node.value],
            Self::Emit(node) => [Some(node.target), Some(node.value), node.weight]
                .into_iter()
                .flatten()
                .collect(),
            Self::VarDecl(node) => node.ty.iter().chain(&node.initializer).copied().collect(),
            Self::TypeDecl(node) => vec![node.ty],
            Self::View(node) => vec![node.body],
            Self::Call(node) => std::iter::once(node.target)
                .chain(node.arguments.iter().copied())
                .collect(),
            Self::Index(node) => vec![node.target, node.index],
            Self::Selector(node) => vec![node.target],
            Self::Binary(node) => vec![node.lhs, node.rhs],
            Self::Unary(node) => vec![node.operand],
            Self::FunctionLiteral(node) => vec![node.ty, node.body],
            Self::VisitClause(node) => node
                .types
                .iter()
                .copied()
                .chain(std::iter::once(node.body))
                .collect(),
            Self::MapType(node) => vec![node.key, node.value],
            Self::CollectionType(node) => vec![node.element],
            Self::Component(node) => vec![node.ty],
            Self::FunctionType(node) => node
                .parameters
                .iter()
                .chain(&node.return_type)
                .copied()
                .collect(),
            Self::OutputType(node) => node
                .arguments
                .iter()
                .chain(&node.indices)
                .chain(std::iter::once(&node.value))
                .chain(&node.weight)
                .copied()
                .collect(),
            Self::TableType(node) => node
                .indices
                .iter()
                .chain(std::iter::once(&node.value))
                .copied()
                .collect(),
        }
    }

    /// Mutable references to every child handle, in the same order as
    /// [`NodeKind::children`]
    fn child_slots_mut(&mut self) -> Vec<&mut NodeId> {
        match self {
            Self::Program(items)
            | Self::Block(items)
            | Self::Composite(items)
            | Self::VisitorLiteral(items)
            | Self::TupleType(items) => items.iter_mut().collect(),
            Self::If(IfStatement {
                condition,
                then_branch,
                else_branch,
            }) => [condition, then_branch]
                .into_iter()
                .chain(else_branch.as_mut())
                .collect(),
            Self::While(WhileStatement { condition, body }) => vec![condition, body],
            Self::DoWhile(DoWhileStatement { body, condition }) => vec![body, condition],
            Self::For(ForStatement {
                init,
                condition,
                update,
                body,
            }) => init
                .as_mut()
                .into_iter()
                .chain(condition.as_mut())
                .chain(update.as_mut())
                .chain(std::iter::once(body))
                .collect(),
            Self::Quantifier(QuantifierStatement {
                ty,
                condition,
                body,
                ..
            }) => vec![ty, condition, body],
            Self::Switch(SwitchStatement { scrutinee, cases }) => std::iter::once(scrutinee)
                .chain(cases.iter_mut())
                .collect(),
            Self::Case(SwitchCase { values, body }) => {
                values.iter_mut().chain(body.iter_mut()).collect()
            }
            Self::Return(value) => value.iter_mut().collect(),
            Self::Break | Self::Continue | Self::Stop | Self::VisitorType => Vec::new(),
            Self::Literal(_) | Self::Identifier(_) | Self::NamedType(_) => Vec::new(),
            Self::ExpressionStatement(inner)
            | Self::Paren(inner)
            | Self::ArrayType(inner)
            | Self::ModelType(inner) => vec![inner],
            Self::Assignment(Assignment { target, value }) => vec![target, value],
            Self::Emit(EmitStatement {
                target,
                value,
                weight,
            }) => [target, value].into_iter().chain(weight.as_mut()).collect(),
            Self::VarDecl(VarDecl {
                ty, initializer, ..
            }) => ty.as_mut().into_iter().chain(initializer.as_mut()).collect(),
            Self::TypeDecl(TypeDecl { ty, .. }) => vec![ty],
            Self::View(ViewDecl { body, .. }) => vec![body],
            Self::Call(CallExpression { target, arguments }) => std::iter::once(target)
                .chain(arguments.iter_mut())
                .collect(),
            Self::Index(IndexExpression { target, index }) => vec![target, index],
            Self::Selector(SelectorExpression { target, .. }) => vec![target],
            Self::Binary(BinaryExpression { lhs, rhs, .. }) => vec![lhs, rhs],
            Self::Unary(UnaryExpression { operand, .. }) => vec![operand],
            Self::FunctionLiteral(FunctionLiteral { ty, body }) => vec![ty, body],
            Self::VisitClause(VisitClause { types, body, .. }) => {
                types.iter_mut().chain(std::iter::once(body)).collect()
            }
            Self::MapType(MapType { key, value }) => vec![key, value],
            Self::CollectionType(CollectionType { element, .. }) => vec![element],
            Self::Component(Component { ty, .. }) => vec![ty],
            Self::FunctionType(FunctionType {
                parameters,
                return_type,
            }) => parameters
                .iter_mut()
                .chain(return_type.as_mut())
                .collect(),
            Self::OutputType(OutputType {
                arguments,
                indices,
                value,
                weight,
                ..
            }) => arguments
                .iter_mut()
                .chain(indices.iter_mut())
                .chain(std::iter::once(value))
                .chain(weight.as_mut())
                .collect(),
            Self::TableType(TableType { indices, value }) => indices
                .iter_mut()
                .chain(std::iter::once(value))
                .collect(),
        }
    }
}

impl<'source> Ast<'source> {
    pub fn new(source: &'source SourceFile) -> Self {
        Self {
            source,
            nodes: IndexVec::new(),
            symbols: InterningTable::default(),
            root: None,
        }
    }

    pub fn source(&self) -> &'source SourceFile {
        self.source
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn set_root(&mut self, root: NodeId) {
        self.root = Some(root);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Allocates a node and links every child to it. Children must not
    /// already be attached elsewhere.
    pub fn push(&mut self, span: Span, kind: NodeKind) -> NodeId {
        let children = kind.children();
        let id = self.nodes.push(Node {
            span,
            parent: None,
            kind,
        });

        for child in children {
            debug_assert!(
                self.nodes[child].parent.is_none(),
                "node {child} attached twice"
            );
            self.nodes[child].parent = Some(id);
        }

        id
    }

    /// Replaces an existing node in place, relinking the children of the new
    /// kind to it
    pub(crate) fn rekind(&mut self, id: NodeId, span: Span, kind: NodeKind) {
        let children = kind.children();
        self.nodes[id].span = span;
        self.nodes[id].kind = kind;

        for child in children {
            self.nodes[child].parent = Some(id);
        }
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id].kind
    }

    pub fn span(&self, id: NodeId) -> Span {
        self.nodes[id].span
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes[id].kind.children()
    }

    /// Walks parent links from `id` (exclusive) up to the root
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), |id| self.parent(*id))
    }

    pub fn intern(&mut self, value: &str) -> InternedSymbol {
        self.symbols.insert_if_absent(value)
    }

    /// Resolves a symbol produced by this arena
    pub fn symbol(&self, symbol: InternedSymbol) -> &str {
        self.symbols.get(symbol).unwrap_or("<unknown>")
    }

    /// The symbol for `value`, if anything in this arena ever interned it
    pub fn lookup_symbol(&self, value: &str) -> Option<InternedSymbol> {
        self.symbols.lookup(value)
    }

    pub fn identifier(&self, identifier: Identifier) -> &str {
        self.symbol(identifier.symbol)
    }

    /// Swaps `old` for `new` in the children of `parent`. The new child gets
    /// its parent link set and the old child is detached.
    pub fn replace_child(
        &mut self,
        parent: NodeId,
        old: NodeId,
        new: NodeId,
    ) -> Result<(), InternalError> {
        if self.nodes[new].parent.is_some() {
            return Err(InternalError::AlreadyAttached(new));
        }

        let slot = self.nodes[parent]
            .kind
            .child_slots_mut()
            .into_iter()
            .find(|slot| **slot == old)
            .ok_or(InternalError::NotAChild { parent, child: old })?;

        *slot = new;
        self.nodes[new].parent = Some(parent);
        self.nodes[old].parent = None;

        Ok(())
    }

    /// Deep copies the subtree rooted at `id` into fresh nodes. The copy has no
    /// parent until the caller attaches it.
    pub fn clone_subtree(&mut self, id: NodeId) -> NodeId {
        // Collect the subtree in pre-order
        let mut order = Vec::new();
        let mut stack = vec![id];

        while let Some(next) = stack.pop() {
            order.push(next);
            stack.extend(self.children(next).into_iter().rev());
        }

        // Children always come after their parent in pre-order, so building in
        // reverse allocates every child before the node that refers to it
        let mut copies: HashMap<NodeId, NodeId> = HashMap::with_capacity(order.len());

        for original in order.into_iter().rev() {
            let node = &self.nodes[original];
            let span = node.span;
            let mut kind = node.kind.clone();

            for slot in kind.child_slots_mut() {
                *slot = copies[&*slot];
            }

            copies.insert(original, self.push(span, kind));
        }

        copies[&id]
    }
}

impl core::ops::Index<NodeId> for Ast<'_> {
    type Output = Node;

    fn index(&self, index: NodeId) -> &Self::Output {
        &self.nodes[index]
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn literal(ast: &mut Ast, text: &str) -> NodeId {
        let symbol = ast.intern(text);
        ast.push(
            Span::default(),
            NodeKind::Literal(Literal {
                kind: LiteralKind::Integer,
                symbol,
            }),
        )
    }

    fn binary(ast: &mut Ast, operator: BinaryOperatorKind, lhs: NodeId, rhs: NodeId) -> NodeId {
        ast.push(
            Span::default(),
            NodeKind::Binary(BinaryExpression { operator, lhs, rhs }),
        )
    }

    #[test]
    fn push_links_parents() {
        let source = SourceFile::memory("");
        let mut ast = Ast::new(&source);

        let one = literal(&mut ast, "1");
        let two = literal(&mut ast, "2");
        let sum = binary(&mut ast, BinaryOperatorKind::Add, one, two);
        let statement = ast.push(Span::default(), NodeKind::ExpressionStatement(sum));

        assert_eq!(ast.parent(one), Some(sum));
        assert_eq!(ast.parent(two), Some(sum));
        assert_eq!(ast.parent(sum), Some(statement));
        assert_eq!(ast.parent(statement), None);
        assert_eq!(ast.ancestors(one).collect::<Vec<_>>(), vec![sum, statement]);
    }

    #[test]
    fn replace_child_moves_parent_links() {
        let source = SourceFile::memory("");
        let mut ast = Ast::new(&source);

        let one = literal(&mut ast, "1");
        let two = literal(&mut ast, "2");
        let sum = binary(&mut ast, BinaryOperatorKind::Add, one, two);
        let three = literal(&mut ast, "3");

        ast.replace_child(sum, two, three).unwrap();

        assert_eq!(ast.children(sum), vec![one, three]);
        assert_eq!(ast.parent(three), Some(sum));
        assert_eq!(ast.parent(two), None);

        assert_eq!(
            ast.replace_child(sum, two, three),
            Err(InternalError::AlreadyAttached(three))
        );

        let four = literal(&mut ast, "4");
        assert_eq!(
            ast.replace_child(sum, two, four),
            Err(InternalError::NotAChild {
                parent: sum,
                child: two
            })
        );
    }

    #[test]
    fn clone_subtree_is_detached_and_independent() {
        let source = SourceFile::memory("");
        let mut ast = Ast::new(&source);

        let one = literal(&mut ast, "1");
        let two = literal(&mut ast, "2");
        let product = binary(&mut ast, BinaryOperatorKind::Multiply, one, two);
        let three = literal(&mut ast, "3");
        let sum = binary(&mut ast, BinaryOperatorKind::Add, product, three);
        ast.push(Span::default(), NodeKind::ExpressionStatement(sum));

        let copy = ast.clone_subtree(sum);

        assert_ne!(copy, sum);
        assert_eq!(ast.parent(copy), None);

        let NodeKind::Binary(copied) = ast.kind(copy).clone() else {
            panic!("expected a binary node");
        };
        assert_eq!(copied.operator, BinaryOperatorKind::Add);
        assert_ne!(copied.lhs, product);
        assert_eq!(ast.parent(copied.lhs), Some(copy));
        assert_eq!(ast.kind(copied.rhs), ast.kind(three));

        let copied_children = ast.children(copied.lhs);
        assert_eq!(copied_children.len(), 2);
        assert!(copied_children.iter().all(|c| ast.parent(*c) == Some(copied.lhs)));
    }
}
