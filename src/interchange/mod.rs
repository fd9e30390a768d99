//! The serializable AST interchange format shared with ingestion tools.
//!
//! Host-language sources (Java and friends) are mapped onto this schema by
//! external collaborators. The expression reducer, the expression parser and
//! the pretty printer all work on [`Expression`] trees from here.

use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoStaticStr};
use thiserror::Error;

pub mod parse;
pub mod pretty_print;

/// Bumped whenever the serialized shape changes incompatibly
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum InterchangeError {
    #[error("malformed interchange document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported schema version {found}, expected {expected}")]
    UnsupportedVersion { found: u32, expected: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AstRoot {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub namespaces: Vec<Namespace>,
}

impl AstRoot {
    pub fn new(namespaces: Vec<Namespace>) -> Self {
        Self {
            version: SCHEMA_VERSION,
            namespaces,
        }
    }

    pub fn to_json(&self) -> Result<String, InterchangeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, InterchangeError> {
        // Check the version before committing to the rest of the shape
        #[derive(Deserialize)]
        struct VersionProbe {
            version: u32,
        }

        let VersionProbe { version } = serde_json::from_str(json)?;

        if version != SCHEMA_VERSION {
            return Err(InterchangeError::UnsupportedVersion {
                found: version,
                expected: SCHEMA_VERSION,
            });
        }

        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Namespace {
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub modifiers: Vec<Modifier>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub declarations: Vec<Declaration>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub statements: Vec<Statement>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub expressions: Vec<Expression>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Declaration {
    pub name: String,
    pub kind: TypeKind,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub modifiers: Vec<Modifier>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub generic_parameters: Vec<Type>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<Type>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Variable>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<Method>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nested_declarations: Vec<Declaration>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Method {
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub modifiers: Vec<Modifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_type: Option<Type>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<Variable>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub statements: Vec<Statement>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Variable {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variable_type: Option<Type>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub modifiers: Vec<Modifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initializer: Option<Box<Expression>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Type {
    pub name: String,
    pub kind: TypeKind,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Modifier {
    pub kind: ModifierKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation_name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub annotation_members: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub annotation_values: Vec<Expression>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Statement {
    pub kind: StatementKind,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub statements: Vec<Statement>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub initializations: Vec<Expression>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<Box<Expression>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub updates: Vec<Expression>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variable_declaration: Option<Box<Variable>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_declaration: Option<Box<Declaration>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub expressions: Vec<Expression>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Expression {
    pub kind: ExpressionKind,
    /// Operands, in source order. For field access and method calls this
    /// holds the receiver.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub expressions: Vec<Expression>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub variable_decls: Vec<Variable>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_type: Option<Type>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub generic_parameters: Vec<Type>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub literal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variable: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub method_args: Vec<Expression>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_postfix: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anon_declaration: Option<Box<Declaration>>,
}

impl Expression {
    pub fn new(kind: ExpressionKind, expressions: Vec<Expression>) -> Self {
        Self {
            kind,
            expressions,
            ..Self::default()
        }
    }

    pub fn literal(text: impl Into<String>) -> Self {
        Self {
            kind: ExpressionKind::Literal,
            literal: Some(text.into()),
            ..Self::default()
        }
    }

    /// A plain variable, or a field access when `receiver` is given
    pub fn variable(receiver: Option<Expression>, name: impl Into<String>) -> Self {
        Self {
            kind: ExpressionKind::VarAccess,
            expressions: receiver.into_iter().collect(),
            variable: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn method_call(
        receiver: Option<Expression>,
        method: impl Into<String>,
        arguments: Vec<Expression>,
    ) -> Self {
        Self {
            kind: ExpressionKind::MethodCall,
            expressions: receiver.into_iter().collect(),
            method: Some(method.into()),
            method_args: arguments,
            ..Self::default()
        }
    }

    pub fn paren(inner: Expression) -> Self {
        Self::new(ExpressionKind::Paren, vec![inner])
    }

    pub fn negate(operand: Expression) -> Self {
        Self::new(ExpressionKind::OpSub, vec![operand])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Comment {
    pub kind: CommentKind,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<PositionInfo>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionInfo {
    pub start_pos: u32,
    pub length: u32,
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum StatementKind {
    #[default]
    Other,
    Block,
    #[serde(rename = "TYPEDECL")]
    #[strum(serialize = "TYPEDECL")]
    TypeDecl,
    #[serde(rename = "VARDECL")]
    #[strum(serialize = "VARDECL")]
    VarDecl,
    Expression,
    Synchronized,
    Return,
    For,
    Do,
    While,
    If,
    Assert,
    Break,
    Continue,
    Label,
    Switch,
    Case,
    Try,
    Throw,
    Catch,
    Empty,
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpressionKind {
    #[default]
    Other,
    Literal,
    #[serde(rename = "VARACCESS")]
    #[strum(serialize = "VARACCESS")]
    VarAccess,
    #[serde(rename = "VARDECL")]
    #[strum(serialize = "VARDECL")]
    VarDecl,
    #[serde(rename = "METHODCALL")]
    #[strum(serialize = "METHODCALL")]
    MethodCall,
    Cast,
    #[serde(rename = "ARRAYINDEX")]
    #[strum(serialize = "ARRAYINDEX")]
    ArrayIndex,
    #[serde(rename = "ARRAYINIT")]
    #[strum(serialize = "ARRAYINIT")]
    ArrayInit,
    #[serde(rename = "TYPECOMPARE")]
    #[strum(serialize = "TYPECOMPARE")]
    TypeCompare,
    New,
    #[serde(rename = "NEWARRAY")]
    #[strum(serialize = "NEWARRAY")]
    NewArray,
    OpAdd,
    OpSub,
    OpMult,
    OpDiv,
    OpMod,
    OpInc,
    OpDec,
    BitNot,
    BitAnd,
    BitOr,
    BitXor,
    BitLshift,
    BitRshift,
    #[serde(rename = "BIT_UNSIGNEDRSHIFT")]
    #[strum(serialize = "BIT_UNSIGNEDRSHIFT")]
    BitUnsignedRshift,
    Assign,
    AssignAdd,
    AssignSub,
    AssignMult,
    AssignDiv,
    AssignMod,
    AssignBitxor,
    AssignBitand,
    AssignBitor,
    AssignLshift,
    AssignRshift,
    #[serde(rename = "ASSIGN_UNSIGNEDRSHIFT")]
    #[strum(serialize = "ASSIGN_UNSIGNEDRSHIFT")]
    AssignUnsignedRshift,
    LogicalNot,
    LogicalAnd,
    LogicalOr,
    Eq,
    Neq,
    Lt,
    Gt,
    Lteq,
    Gteq,
    Conditional,
    #[serde(rename = "NULLCOALESCE")]
    #[strum(serialize = "NULLCOALESCE")]
    NullCoalesce,
    Paren,
    Annotation,
    Template,
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeKind {
    #[default]
    Other,
    Class,
    Interface,
    Anonymous,
    Struct,
    Enum,
    Annotation,
    Delegate,
    Generic,
    Array,
    Primitive,
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CommentKind {
    #[default]
    Other,
    Line,
    Block,
    Doc,
    Spec,
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ModifierKind {
    #[default]
    Other,
    Visibility,
    Annotation,
    Final,
    Static,
    Synchronized,
    Abstract,
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
    #[default]
    Public,
    Private,
    Protected,
    Namespace,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn sample() -> AstRoot {
        let sum = Expression::new(
            ExpressionKind::OpAdd,
            vec![
                Expression::variable(None, "x"),
                Expression::method_call(
                    Some(Expression::variable(None, "list")),
                    "size",
                    Vec::new(),
                ),
            ],
        );

        AstRoot::new(vec![Namespace {
            name: "org.example".into(),
            declarations: vec![Declaration {
                name: "Counter".into(),
                kind: TypeKind::Class,
                methods: vec![Method {
                    name: "next".into(),
                    return_type: Some(Type {
                        name: "int".into(),
                        kind: TypeKind::Primitive,
                    }),
                    statements: vec![Statement {
                        kind: StatementKind::Return,
                        expressions: vec![sum],
                        ..Statement::default()
                    }],
                    ..Method::default()
                }],
                ..Declaration::default()
            }],
            ..Namespace::default()
        }])
    }

    #[test]
    fn json_round_trip() {
        let root = sample();
        let json = root.to_json().unwrap();

        assert!(json.contains("\"METHODCALL\""));
        assert!(json.contains("\"OP_ADD\""));
        assert_eq!(AstRoot::from_json(&json).unwrap(), root);
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let json = r#"{ "version": 7, "namespaces": [] }"#;

        assert!(matches!(
            AstRoot::from_json(json),
            Err(InterchangeError::UnsupportedVersion {
                found: 7,
                expected: SCHEMA_VERSION
            })
        ));
    }

    #[test]
    fn kind_names_match_schema() {
        let name: &'static str = ExpressionKind::BitUnsignedRshift.into();
        assert_eq!(name, "BIT_UNSIGNEDRSHIFT");

        let name: &'static str = StatementKind::TypeDecl.into();
        assert_eq!(name, "TYPEDECL");
    }
}
