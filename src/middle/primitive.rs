use strum::{EnumIter, EnumString};

use crate::frontend::ast::{BinaryOperatorClass, BinaryOperatorKind, UnaryOperatorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum PrimitiveKind {
    Bool,
    Int,
    Float,
    String,
    Time,
    Bytes,
}

impl core::fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrimitiveKind::Bool => write!(f, "bool"),
            PrimitiveKind::Int => write!(f, "int"),
            PrimitiveKind::Float => write!(f, "float"),
            PrimitiveKind::String => write!(f, "string"),
            PrimitiveKind::Time => write!(f, "time"),
            PrimitiveKind::Bytes => write!(f, "bytes"),
        }
    }
}

impl PrimitiveKind {
    pub fn supports_binary_op(&self, kind: BinaryOperatorKind) -> bool {
        match self {
            // All ops besides logical
            PrimitiveKind::Int => match kind {
                BinaryOperatorKind::Add
                | BinaryOperatorKind::Subtract
                | BinaryOperatorKind::Multiply
                | BinaryOperatorKind::Divide
                | BinaryOperatorKind::Modulus
                | BinaryOperatorKind::Equals
                | BinaryOperatorKind::NotEquals
                | BinaryOperatorKind::LessThan
                | BinaryOperatorKind::LessThanOrEqualTo
                | BinaryOperatorKind::GreaterThan
                | BinaryOperatorKind::GreaterThanOrEqualTo
                | BinaryOperatorKind::BitwiseAnd
                | BinaryOperatorKind::BitwiseOr
                | BinaryOperatorKind::BitwiseXor
                | BinaryOperatorKind::ShiftLeft
                | BinaryOperatorKind::ShiftRight => true,
                BinaryOperatorKind::LogicalAnd | BinaryOperatorKind::LogicalOr => false,
            },
            // No bitwise or logical ops
            PrimitiveKind::Float => matches!(
                kind.class(),
                BinaryOperatorClass::Arithmetic
                    | BinaryOperatorClass::Comparison
                    | BinaryOperatorClass::Equality
            ),
            // Concatenation and comparison
            PrimitiveKind::String => {
                kind == BinaryOperatorKind::Add
                    || matches!(
                        kind.class(),
                        BinaryOperatorClass::Comparison | BinaryOperatorClass::Equality
                    )
            }
            // Only simple comparison and logical ops
            PrimitiveKind::Bool => matches!(
                kind.class(),
                BinaryOperatorClass::Logical | BinaryOperatorClass::Equality
            ),
            // Offsets and comparison
            PrimitiveKind::Time => {
                matches!(kind, BinaryOperatorKind::Add | BinaryOperatorKind::Subtract)
                    || matches!(
                        kind.class(),
                        BinaryOperatorClass::Comparison | BinaryOperatorClass::Equality
                    )
            }
            // Only equality
            PrimitiveKind::Bytes => kind.class() == BinaryOperatorClass::Equality,
        }
    }

    pub fn supports_unary_op(&self, kind: UnaryOperatorKind) -> bool {
        match self {
            PrimitiveKind::Int => kind != UnaryOperatorKind::LogicalNot,
            PrimitiveKind::Float => !matches!(
                kind,
                UnaryOperatorKind::LogicalNot | UnaryOperatorKind::BitwiseNot
            ),
            PrimitiveKind::Bool => kind == UnaryOperatorKind::LogicalNot,
            PrimitiveKind::String | PrimitiveKind::Time | PrimitiveKind::Bytes => false,
        }
    }

    /// Result of `self <op> rhs`, or `None` if the pair of operands can not be
    /// combined with `op` even though each supports it on its own
    pub fn binary_result(self, kind: BinaryOperatorKind, rhs: PrimitiveKind) -> Option<Self> {
        use PrimitiveKind::*;

        if !self.supports_binary_op(kind) || !rhs.supports_binary_op(kind) {
            return None;
        }

        match kind.class() {
            BinaryOperatorClass::Comparison | BinaryOperatorClass::Equality => {
                match (self, rhs) {
                    (lhs, rhs) if lhs == rhs => Some(Bool),
                    (Int, Float) | (Float, Int) => Some(Bool),
                    _ => None,
                }
            }
            BinaryOperatorClass::Logical => (self == Bool && rhs == Bool).then_some(Bool),
            BinaryOperatorClass::Arithmetic | BinaryOperatorClass::Bitwise => match (self, rhs) {
                (Int, Int) => Some(Int),
                (Int, Float) | (Float, Int) | (Float, Float) => Some(Float),
                (String, String) => Some(String),
                (Time, Int) => Some(Time),
                (Time, Time) if kind == BinaryOperatorKind::Subtract => Some(Int),
                _ => None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn names_round_trip() {
        for primitive in PrimitiveKind::iter() {
            assert_eq!(primitive.to_string().parse::<PrimitiveKind>(), Ok(primitive));
        }
    }

    #[test]
    fn results() {
        use BinaryOperatorKind::*;
        use PrimitiveKind::*;

        assert_eq!(Int.binary_result(Add, Int), Some(Int));
        assert_eq!(Int.binary_result(Multiply, Float), Some(Float));
        assert_eq!(String.binary_result(Add, String), Some(String));
        assert_eq!(String.binary_result(Subtract, String), None);
        assert_eq!(Time.binary_result(Add, Int), Some(Time));
        assert_eq!(Time.binary_result(Subtract, Time), Some(Int));
        assert_eq!(Int.binary_result(LessThan, Float), Some(Bool));
        assert_eq!(Bool.binary_result(LogicalAnd, Bool), Some(Bool));
        assert_eq!(Bool.binary_result(Add, Bool), None);
        assert_eq!(String.binary_result(ShiftLeft, String), None);
        assert_eq!(Int.binary_result(Equals, String), None);
    }
}
