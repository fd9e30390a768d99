use hashbrown::HashMap;
use itertools::Itertools;
use thiserror::Error;

use super::{builtins::Builtins, primitive::PrimitiveKind};
use crate::frontend::ast::{
    BinaryOperatorClass, BinaryOperatorKind, CollectionKind, UnaryOperatorKind,
};

/// A Boa type. Equality is structural: component names never take part in it.
#[derive(Debug, Clone)]
pub enum Type {
    /// Accepts any value
    Any,
    /// int, float, string, ...
    Primitive(PrimitiveKind),
    /// array of T
    Array(Box<Type>),
    /// map[K] of V
    Map { key: Box<Type>, value: Box<Type> },
    /// stack of T, set of T, queue of T
    Collection(CollectionKind, Box<Type>),
    /// {name: string, int}
    ///
    /// Also the type of composite literals
    Tuple(TupleType),
    /// table[year: int] of count: int
    Table(TableType),
    /// output sum[string] of int
    Output(OutputType),
    /// function(int, string): bool
    Function(FunctionType),
    Visitor,
    /// A tuple from the domain schema (Project, Revision, ...), looked up in
    /// [`Builtins`] by name
    Proto(&'static str),
    /// An enumeration from the domain schema (ChangeKind, ...)
    Enum(&'static str),
    /// model of T
    Model(Box<Type>),
    /// A type used in value position, e.g. the `int` in `x := int;`
    TypeName(Box<Type>),
    /// A generic parameter of a builtin signature
    TypeVar(&'static str),
    /// The result of calling a function without a return type
    Void,
    /// The type of an expression that already produced a diagnostic. Compatible
    /// with everything so no further diagnostics cascade from it.
    Error,
}

/// A named or positional member of a tuple, table or output type
#[derive(Debug, Clone)]
pub struct Component {
    pub name: Option<String>,
    pub ty: Type,
}

impl Component {
    pub fn named(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: Some(name.into()),
            ty,
        }
    }

    pub fn anonymous(ty: Type) -> Self {
        Self { name: None, ty }
    }
}

#[derive(Debug, Clone)]
pub struct TupleType {
    components: Vec<Component>,
    names: HashMap<String, usize>,
}

impl TupleType {
    pub fn new(components: Vec<Component>) -> Self {
        let names = components
            .iter()
            .enumerate()
            .filter_map(|(index, component)| Some((component.name.clone()?, index)))
            .collect();

        Self { components, names }
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn member(&self, name: &str) -> Option<&Type> {
        self.names.get(name).map(|index| &self.components[*index].ty)
    }

    pub fn member_at(&self, index: usize) -> Option<&Type> {
        self.components.get(index).map(|component| &component.ty)
    }
}

#[derive(Debug, Clone)]
pub struct TableType {
    pub indices: Vec<Component>,
    pub value: Box<Component>,
}

impl TableType {
    /// Consumes the first index column, leaving a table over the remaining ones
    pub fn index(&self, index: &Type) -> Result<TableType, IndexError> {
        let Some((first, rest)) = self.indices.split_first() else {
            return Err(IndexError::TooManyIndices);
        };

        if !first.ty.assigns(index) {
            return Err(IndexError::InvalidIndexType {
                expected: first.ty.clone(),
            });
        }

        Ok(TableType {
            indices: rest.to_vec(),
            value: self.value.clone(),
        })
    }

    /// Every column of a row: the indices followed by the value
    pub fn row(&self) -> impl Iterator<Item = &Component> {
        self.indices.iter().chain(std::iter::once(&*self.value))
    }
}

#[derive(Debug, Clone)]
pub struct OutputType {
    pub aggregator: String,
    pub indices: Vec<Component>,
    pub value: Box<Component>,
    pub weight: Option<Box<Type>>,
}

impl OutputType {
    /// The table a view exposes for this output
    pub fn as_table(&self) -> TableType {
        TableType {
            indices: self.indices.clone(),
            value: self.value.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FunctionType {
    pub parameters: Vec<Type>,
    pub return_type: Option<Box<Type>>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IndexError {
    #[error("too many indices")]
    TooManyIndices,
    #[error("invalid index type, expected '{expected}'")]
    InvalidIndexType { expected: Type },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{ty}' has no member named '{member}'")]
pub struct UnknownMemberError {
    pub ty: String,
    pub member: String,
}

#[derive(Debug, Clone, Error)]
pub enum OperatorError {
    #[error("type '{ty}' does not support the '{operator}' operator")]
    Unsupported { ty: Type, operator: String },
    #[error("types '{lhs}' and '{rhs}' do not support '{operator}' operator")]
    UnsupportedPair {
        lhs: Type,
        rhs: Type,
        operator: String,
    },
    #[error("cannot assign row from table type '{table}' to tuple type '{tuple}'")]
    RowMismatch { table: Type, tuple: Type },
}

impl Type {
    pub const BOOL: Type = Type::Primitive(PrimitiveKind::Bool);
    pub const INT: Type = Type::Primitive(PrimitiveKind::Int);
    pub const FLOAT: Type = Type::Primitive(PrimitiveKind::Float);
    pub const STRING: Type = Type::Primitive(PrimitiveKind::String);
    pub const TIME: Type = Type::Primitive(PrimitiveKind::Time);
    pub const BYTES: Type = Type::Primitive(PrimitiveKind::Bytes);

    pub fn array(element: Type) -> Self {
        Type::Array(Box::new(element))
    }

    pub fn map(key: Type, value: Type) -> Self {
        Type::Map {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn collection(kind: CollectionKind, element: Type) -> Self {
        Type::Collection(kind, Box::new(element))
    }

    pub fn tuple(components: Vec<Component>) -> Self {
        Type::Tuple(TupleType::new(components))
    }

    pub fn function(parameters: Vec<Type>, return_type: Option<Type>) -> Self {
        Type::Function(FunctionType {
            parameters,
            return_type: return_type.map(Box::new),
        })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Type::Error)
    }

    /// Whether a variable of this type can be assigned a value of type `other`
    pub fn assigns(&self, other: &Type) -> bool {
        self.compatible(other, false)
    }

    /// Whether a parameter of this type accepts an argument of type `other`.
    /// Unlike [`Type::assigns`], type variables accept anything.
    pub fn accepts(&self, other: &Type) -> bool {
        self.compatible(other, true)
    }

    fn compatible(&self, other: &Type, accepting: bool) -> bool {
        match (self, other) {
            (Type::Error, _) | (_, Type::Error) => true,
            (_, Type::TypeName(_)) => false,
            (Type::TypeVar(_), _) if accepting => true,
            (Type::Any, _) => true,

            (Type::Primitive(PrimitiveKind::Float), Type::Primitive(PrimitiveKind::Int)) => true,
            (Type::Primitive(lhs), Type::Primitive(rhs)) => lhs == rhs,

            (Type::Array(element), Type::Array(other)) => element.compatible(other, accepting),
            // Composite literals: {1, 2, 3}
            (Type::Array(element), Type::Tuple(tuple)) => tuple
                .components()
                .iter()
                .all(|component| element.compatible(&component.ty, accepting)),
            (Type::Map { key, value }, Type::Map { key: k, value: v }) => {
                key.compatible(k, accepting) && value.compatible(v, accepting)
            }
            // The empty composite `{}` initializes maps
            (Type::Map { .. }, Type::Tuple(tuple)) => tuple.is_empty(),
            (Type::Collection(kind, element), Type::Collection(other_kind, other)) => {
                kind == other_kind && element.compatible(other, accepting)
            }

            (Type::Tuple(lhs), Type::Tuple(rhs)) => {
                lhs.len() == rhs.len()
                    && lhs
                        .components()
                        .iter()
                        .zip(rhs.components())
                        .all(|(l, r)| l.ty.compatible(&r.ty, accepting))
            }
            (Type::Table(lhs), Type::Table(rhs)) => {
                lhs.indices.len() == rhs.indices.len()
                    && lhs
                        .row()
                        .zip(rhs.row())
                        .all(|(l, r)| l.ty.compatible(&r.ty, accepting))
            }
            (Type::Output(lhs), Type::Output(rhs)) => lhs == rhs,
            (Type::Function(lhs), Type::Function(rhs)) => {
                lhs.parameters == rhs.parameters
                    && match (&lhs.return_type, &rhs.return_type) {
                        (Some(l), Some(r)) => l.compatible(r, accepting),
                        (None, None) => true,
                        _ => false,
                    }
            }

            (Type::Proto(lhs), Type::Proto(rhs)) | (Type::Enum(lhs), Type::Enum(rhs)) => {
                lhs == rhs
            }
            (Type::Model(lhs), Type::Model(rhs)) => lhs == rhs,
            (Type::Visitor, Type::Visitor) => true,
            _ => false,
        }
    }

    /// Looks up a named member of a tuple or proto tuple
    pub fn member(&self, name: &str, builtins: &Builtins) -> Result<Type, UnknownMemberError> {
        let tuple = match self {
            Type::Tuple(tuple) => Some(tuple),
            Type::Proto(proto) => builtins.proto(proto),
            _ => None,
        };

        tuple
            .and_then(|tuple| tuple.member(name))
            .cloned()
            .ok_or_else(|| UnknownMemberError {
                ty: self.to_string(),
                member: name.to_string(),
            })
    }

    pub fn unary_operation(&self, operator: UnaryOperatorKind) -> Result<Type, OperatorError> {
        match self {
            Type::Error => Ok(Type::Error),
            Type::Primitive(primitive) if primitive.supports_unary_op(operator) => {
                Ok(self.clone())
            }
            _ => Err(OperatorError::Unsupported {
                ty: self.clone(),
                operator: operator.to_string(),
            }),
        }
    }

    pub fn binary_operation(
        &self,
        operator: BinaryOperatorKind,
        rhs: &Type,
    ) -> Result<Type, OperatorError> {
        let unsupported = |ty: &Type| OperatorError::Unsupported {
            ty: ty.clone(),
            operator: operator.to_string(),
        };
        let unsupported_pair = || OperatorError::UnsupportedPair {
            lhs: self.clone(),
            rhs: rhs.clone(),
            operator: operator.to_string(),
        };

        match (self, rhs) {
            (Type::Error, _) | (_, Type::Error) => Ok(Type::Error),
            (Type::Primitive(lhs), Type::Primitive(other)) => {
                if !lhs.supports_binary_op(operator) {
                    return Err(unsupported(self));
                }
                if !other.supports_binary_op(operator) {
                    return Err(unsupported(rhs));
                }

                lhs.binary_result(operator, *other)
                    .map(Type::Primitive)
                    .ok_or_else(unsupported_pair)
            }
            (Type::Primitive(lhs), _) if !lhs.supports_binary_op(operator) => {
                Err(unsupported(self))
            }
            // Reading a row out of a table into a tuple
            (Type::Table(table), _) if operator == BinaryOperatorKind::ShiftRight => {
                let Type::Tuple(tuple) = rhs else {
                    return Err(unsupported(self));
                };

                let matches = tuple.len() == table.indices.len() + 1
                    && table
                        .row()
                        .zip(tuple.components())
                        .all(|(column, component)| component.ty.assigns(&column.ty));

                if matches {
                    Ok(rhs.clone())
                } else {
                    Err(OperatorError::RowMismatch {
                        table: self.clone(),
                        tuple: rhs.clone(),
                    })
                }
            }
            (Type::Enum(lhs), Type::Enum(other)) | (Type::Proto(lhs), Type::Proto(other))
                if lhs == other && operator.class() == BinaryOperatorClass::Equality =>
            {
                Ok(Type::BOOL)
            }
            _ => Err(unsupported_pair()),
        }
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Type::Error, _) | (_, Type::Error) => true,
            (Type::Any, Type::Any)
            | (Type::Visitor, Type::Visitor)
            | (Type::Void, Type::Void) => true,
            (Type::Primitive(lhs), Type::Primitive(rhs)) => lhs == rhs,
            (Type::Array(lhs), Type::Array(rhs))
            | (Type::Model(lhs), Type::Model(rhs))
            | (Type::TypeName(lhs), Type::TypeName(rhs)) => lhs == rhs,
            (Type::Map { key, value }, Type::Map { key: k, value: v }) => key == k && value == v,
            (Type::Collection(kind, element), Type::Collection(other_kind, other)) => {
                kind == other_kind && element == other
            }
            (Type::Tuple(lhs), Type::Tuple(rhs)) => lhs == rhs,
            (Type::Table(lhs), Type::Table(rhs)) => lhs == rhs,
            (Type::Output(lhs), Type::Output(rhs)) => lhs == rhs,
            (Type::Function(lhs), Type::Function(rhs)) => {
                lhs.parameters == rhs.parameters && lhs.return_type == rhs.return_type
            }
            (Type::Proto(lhs), Type::Proto(rhs))
            | (Type::Enum(lhs), Type::Enum(rhs))
            | (Type::TypeVar(lhs), Type::TypeVar(rhs)) => lhs == rhs,
            _ => false,
        }
    }
}

impl PartialEq for TupleType {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .components
                .iter()
                .zip(&other.components)
                .all(|(lhs, rhs)| lhs.ty == rhs.ty)
    }
}

impl PartialEq for TableType {
    fn eq(&self, other: &Self) -> bool {
        self.indices.len() == other.indices.len()
            && self.row().zip(other.row()).all(|(lhs, rhs)| lhs.ty == rhs.ty)
    }
}

impl PartialEq for OutputType {
    fn eq(&self, other: &Self) -> bool {
        self.aggregator == other.aggregator
            && self.indices.len() == other.indices.len()
            && self
                .indices
                .iter()
                .zip(&other.indices)
                .all(|(lhs, rhs)| lhs.ty == rhs.ty)
            && self.value.ty == other.value.ty
            && self.weight == other.weight
    }
}

impl core::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name}:{}", self.ty),
            None => write!(f, "{}", self.ty),
        }
    }
}

impl core::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Any => write!(f, "any"),
            Type::Primitive(primitive) => write!(f, "{primitive}"),
            Type::Array(element) => write!(f, "array of {element}"),
            Type::Map { key, value } => write!(f, "map[{key}] of {value}"),
            Type::Collection(kind, element) => write!(f, "{kind} of {element}"),
            Type::Tuple(tuple) => write!(
                f,
                "tuple [{}]",
                tuple.components().iter().map(|c| &c.ty).join(", ")
            ),
            Type::Table(table) => {
                write!(f, "table")?;
                for index in &table.indices {
                    write!(f, "[{index}]")?;
                }
                write!(f, " of {}", table.value)
            }
            Type::Output(output) => {
                write!(f, "output {}", output.aggregator)?;
                for index in &output.indices {
                    write!(f, "[{index}]")?;
                }
                write!(f, " of {}", output.value)?;
                if let Some(weight) = &output.weight {
                    write!(f, " weight {weight}")?;
                }
                Ok(())
            }
            Type::Function(function) => {
                write!(f, "function[{}]: ", function.parameters.iter().join(", "))?;
                match &function.return_type {
                    Some(return_type) => write!(f, "{return_type}"),
                    None => write!(f, "any"),
                }
            }
            Type::Visitor => write!(f, "visitor"),
            Type::Proto(name) | Type::Enum(name) | Type::TypeVar(name) => write!(f, "{name}"),
            Type::Model(inner) => write!(f, "model of {inner}"),
            Type::TypeName(inner) => write!(f, "{inner}"),
            Type::Void => write!(f, "void"),
            Type::Error => write!(f, "error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn table() -> Type {
        Type::Table(TableType {
            indices: vec![Component::named("year", Type::INT)],
            value: Box::new(Component::named("count", Type::INT)),
        })
    }

    #[test]
    fn display() {
        assert_eq!(Type::array(Type::INT).to_string(), "array of int");
        assert_eq!(
            Type::map(Type::STRING, Type::FLOAT).to_string(),
            "map[string] of float"
        );
        assert_eq!(
            Type::collection(CollectionKind::Stack, Type::BOOL).to_string(),
            "stack of bool"
        );
        assert_eq!(
            Type::tuple(vec![
                Component::named("a", Type::INT),
                Component::anonymous(Type::STRING)
            ])
            .to_string(),
            "tuple [int, string]"
        );
        assert_eq!(table().to_string(), "table[year:int] of count:int");
        assert_eq!(
            Type::function(vec![Type::INT, Type::STRING], None).to_string(),
            "function[int, string]: any"
        );
        assert_eq!(
            Type::Output(OutputType {
                aggregator: "sum".into(),
                indices: vec![Component::anonymous(Type::STRING)],
                value: Box::new(Component::anonymous(Type::INT)),
                weight: Some(Box::new(Type::FLOAT)),
            })
            .to_string(),
            "output sum[string] of int weight float"
        );
    }

    #[test]
    fn structural_equality_ignores_names() {
        let named = Type::tuple(vec![Component::named("a", Type::INT)]);
        let anonymous = Type::tuple(vec![Component::anonymous(Type::INT)]);

        assert_eq!(named, anonymous);
        assert_ne!(named, Type::tuple(vec![Component::anonymous(Type::FLOAT)]));
        assert_eq!(Type::Error, Type::STRING);
    }

    #[test]
    fn assignability() {
        assert!(Type::FLOAT.assigns(&Type::INT));
        assert!(!Type::INT.assigns(&Type::FLOAT));
        assert!(Type::Any.assigns(&Type::Proto("Project")));
        assert!(!Type::Any.assigns(&Type::TypeName(Box::new(Type::INT))));
        assert!(Type::Error.assigns(&Type::TypeName(Box::new(Type::INT))));

        let composite = Type::tuple(vec![
            Component::anonymous(Type::INT),
            Component::anonymous(Type::INT),
        ]);
        assert!(Type::array(Type::FLOAT).assigns(&composite));
        assert!(!Type::array(Type::STRING).assigns(&composite));
        assert!(!composite.assigns(&table()));

        assert!(Type::TypeVar("T").accepts(&Type::INT));
        assert!(!Type::TypeVar("T").assigns(&Type::INT));
    }

    #[test]
    fn table_indexing() {
        let Type::Table(table) = table() else {
            unreachable!()
        };

        let row = table.index(&Type::INT).unwrap();
        assert!(row.indices.is_empty());
        assert_eq!(
            row,
            TableType {
                indices: vec![],
                value: Box::new(Component::anonymous(Type::INT)),
            }
        );
        assert_ne!(
            table,
            TableType {
                indices: vec![Component::anonymous(Type::STRING)],
                value: Box::new(Component::named("count", Type::INT)),
            }
        );

        assert_eq!(row.index(&Type::INT), Err(IndexError::TooManyIndices));
        assert_eq!(
            table.index(&Type::STRING),
            Err(IndexError::InvalidIndexType {
                expected: Type::INT
            })
        );
    }

    #[test]
    fn operators() {
        assert_eq!(
            Type::INT.binary_operation(BinaryOperatorKind::Add, &Type::FLOAT).unwrap(),
            Type::FLOAT
        );
        assert_eq!(
            Type::BOOL
                .binary_operation(BinaryOperatorKind::Add, &Type::BOOL)
                .unwrap_err()
                .to_string(),
            "type 'bool' does not support the '+' operator"
        );
        assert_eq!(
            Type::INT
                .binary_operation(BinaryOperatorKind::Add, &Type::STRING)
                .unwrap_err()
                .to_string(),
            "types 'int' and 'string' do not support '+' operator"
        );

        let row = Type::tuple(vec![
            Component::anonymous(Type::INT),
            Component::anonymous(Type::INT),
        ]);
        assert_eq!(
            table().binary_operation(BinaryOperatorKind::ShiftRight, &row).unwrap(),
            row
        );

        let bad_row = Type::tuple(vec![Component::anonymous(Type::STRING)]);
        assert_eq!(
            table()
                .binary_operation(BinaryOperatorKind::ShiftRight, &bad_row)
                .unwrap_err()
                .to_string(),
            "cannot assign row from table type 'table[year:int] of count:int' to tuple type 'tuple [string]'"
        );
    }
}
