use std::{
    fmt,
    ops::{Add, Mul, Neg},
};

/// An exact base-ten number: `mantissa * 10^-scale`. Always kept with the
/// fewest digits, so derived equality is numeric equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decimal {
    mantissa: i128,
    scale: u32,
}

impl Decimal {
    pub fn new(mantissa: i128, scale: u32) -> Self {
        let mut decimal = Self { mantissa, scale };

        while decimal.scale > 0 && decimal.mantissa % 10 == 0 {
            decimal.mantissa /= 10;
            decimal.scale -= 1;
        }

        if decimal.mantissa == 0 {
            decimal.scale = 0;
        }

        decimal
    }

    /// `12.5`, `.5` or `5.`. Exponents and suffixes are not numbers here.
    pub fn parse(text: &str) -> Option<Self> {
        let (whole, fraction) = text.split_once('.')?;

        if whole.is_empty() && fraction.is_empty() {
            return None;
        }

        if !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
            return None;
        }

        let mantissa = format!("{whole}{fraction}").parse().ok()?;
        Some(Self::new(mantissa, u32::try_from(fraction.len()).ok()?))
    }

    /// Both mantissas at the larger of the two scales
    fn aligned(self, other: Self) -> (i128, i128, u32) {
        let scale = self.scale.max(other.scale);
        let widen = |d: Self| d.mantissa.wrapping_mul(10i128.wrapping_pow(scale - d.scale));

        (widen(self), widen(other), scale)
    }

    /// The quotient, when `other` divides `self` a whole number of times
    pub fn checked_whole_div(self, other: Self) -> Option<Self> {
        let (a, b, _) = self.aligned(other);

        if b == 0 || a.wrapping_rem(b) != 0 {
            return None;
        }

        Some(Self::new(a.wrapping_div(b), 0))
    }

    pub fn is_zero(self) -> bool {
        self.mantissa == 0
    }

    pub fn is_negative(self) -> bool {
        self.mantissa < 0
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        Self::new(i128::from(value), 0)
    }
}

impl Add for Decimal {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        let (a, b, scale) = self.aligned(other);
        Self::new(a.wrapping_add(b), scale)
    }
}

impl Mul for Decimal {
    type Output = Self;

    fn mul(self, other: Self) -> Self {
        Self::new(
            self.mantissa.wrapping_mul(other.mantissa),
            self.scale + other.scale,
        )
    }
}

impl Neg for Decimal {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(self.mantissa.wrapping_neg(), self.scale)
    }
}

/// Always shows a fractional digit: `8.0`, `0.25`
impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.is_negative() { "-" } else { "" };
        let digits = self.mantissa.unsigned_abs().to_string();
        let scale = self.scale as usize;

        if scale == 0 {
            return write!(f, "{sign}{digits}.0");
        }

        let padded = format!("{digits:0>width$}", width = scale + 1);
        let (whole, fraction) = padded.split_at(padded.len() - scale);

        write!(f, "{sign}{whole}.{fraction}")
    }
}

/// A numeric literal. Integer arithmetic wraps. Any float operand makes the
/// result a float.
#[derive(Debug, Clone, Copy)]
pub enum Number {
    Int(i64),
    Float(Decimal),
}

impl Number {
    pub const ZERO: Number = Number::Int(0);
    pub const ONE: Number = Number::Int(1);

    /// Reads an interchange literal. Anything that is not a plain decimal
    /// integer or float (hex, suffixes, exponents, strings) is not a number.
    pub fn parse(text: &str) -> Option<Self> {
        if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
            return text.parse().ok().map(Number::Int);
        }

        Decimal::parse(text).map(Number::Float)
    }

    fn to_decimal(self) -> Decimal {
        match self {
            Number::Int(value) => Decimal::from(value),
            Number::Float(value) => value,
        }
    }

    pub fn is_zero(self) -> bool {
        match self {
            Number::Int(value) => value == 0,
            Number::Float(value) => value.is_zero(),
        }
    }

    pub fn is_negative(self) -> bool {
        match self {
            Number::Int(value) => value < 0,
            Number::Float(value) => value.is_negative(),
        }
    }

    pub fn is_one(self) -> bool {
        self.numerically_eq(Number::ONE)
    }

    pub fn abs(self) -> Self {
        if self.is_negative() { -self } else { self }
    }

    pub fn numerically_eq(self, other: Number) -> bool {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a == b,
            (a, b) => a.to_decimal() == b.to_decimal(),
        }
    }

    /// `self / other` when the quotient is a whole number, e.g. `12 / 3` or
    /// `5.0 / 5`. `10 / 4` and anything over zero stay unevaluated.
    pub fn checked_whole_div(self, other: Number) -> Option<Number> {
        match (self, other) {
            (_, divisor) if divisor.is_zero() => None,
            (Number::Int(a), Number::Int(b)) => {
                (a.wrapping_rem(b) == 0).then(|| Number::Int(a.wrapping_div(b)))
            }
            (a, b) => a
                .to_decimal()
                .checked_whole_div(b.to_decimal())
                .map(Number::Float),
        }
    }
}

impl Add for Number {
    type Output = Number;

    fn add(self, other: Number) -> Number {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Number::Int(a.wrapping_add(b)),
            (a, b) => Number::Float(a.to_decimal() + b.to_decimal()),
        }
    }
}

impl Mul for Number {
    type Output = Number;

    fn mul(self, other: Number) -> Number {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Number::Int(a.wrapping_mul(b)),
            (a, b) => Number::Float(a.to_decimal() * b.to_decimal()),
        }
    }
}

impl Neg for Number {
    type Output = Number;

    fn neg(self) -> Number {
        match self {
            Number::Int(value) => Number::Int(value.wrapping_neg()),
            Number::Float(value) => Number::Float(-value),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(value) => write!(f, "{value}"),
            Number::Float(value) => write!(f, "{value}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn number(text: &str) -> Number {
        Number::parse(text).unwrap()
    }

    #[rstest]
    #[case("0.1", "1", "1.1")]
    #[case("111.1", "-111.1", "0.0")]
    #[case("2.50", "0.5", "3.0")]
    #[case("1", "2", "3")]
    fn addition(#[case] a: &str, #[case] b: &str, #[case] expected: &str) {
        let b = if let Some(positive) = b.strip_prefix('-') {
            -number(positive)
        } else {
            number(b)
        };

        assert_eq!((number(a) + b).to_string(), expected);
    }

    #[test]
    fn decimal_products_are_exact() {
        assert_eq!((number("3.5") * number("0.2")).to_string(), "0.7");
        assert_eq!((number("0.5") * number("2")).to_string(), "1.0");
    }

    #[rstest]
    #[case("12", "6", Some("2"))]
    #[case("10", "3", None)]
    #[case("5.0", "5", Some("1.0"))]
    #[case("5", "10.0", None)]
    #[case("7", "0", None)]
    fn whole_division(#[case] a: &str, #[case] b: &str, #[case] expected: Option<&str>) {
        let quotient = number(a).checked_whole_div(number(b));
        assert_eq!(quotient.map(|q| q.to_string()).as_deref(), expected);
    }

    #[test]
    fn integer_overflow_wraps() {
        let max = Number::Int(i64::MAX);
        assert!(matches!(max + Number::ONE, Number::Int(i64::MIN)));
    }

    #[test]
    fn non_decimal_literals_are_not_numbers() {
        for text in ["0x1F", "10L", "1e3", "2.5f", "\"1\"", ".", ""] {
            assert!(Number::parse(text).is_none(), "{text}");
        }
    }
}
