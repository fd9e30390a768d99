use std::{
    cmp::Ordering,
    mem,
    ops::{Add, Div, Mul, Neg, Sub},
};

use super::number::Number;
use crate::interchange::{Expression, ExpressionKind, pretty_print::print_expression};

/// An indivisible factor. Sums only ever appear as divisors.
#[derive(Debug, Clone)]
pub enum Atom {
    Opaque { key: String, expression: Expression },
    Sum { key: String, sum: Sum },
}

impl Atom {
    pub fn opaque(expression: Expression) -> Self {
        Atom::Opaque {
            key: print_expression(&expression),
            expression,
        }
    }

    fn sum(sum: Sum) -> Self {
        Atom::Sum {
            key: print_expression(&Expression::paren(sum.to_expression())),
            sum,
        }
    }

    /// The rendered atom. Atoms order and compare by it.
    fn key(&self) -> &str {
        match self {
            Atom::Opaque { key, .. } | Atom::Sum { key, .. } => key,
        }
    }

    fn is_sum(&self) -> bool {
        matches!(self, Atom::Sum { .. })
    }

    fn to_expression(&self) -> Expression {
        match self {
            Atom::Opaque { expression, .. } => expression.clone(),
            Atom::Sum { sum, .. } => Expression::paren(sum.to_expression()),
        }
    }

    fn into_sum(self) -> Sum {
        match self {
            Atom::Opaque { .. } => Sum::from_terms(vec![Term::factor(self)]),
            Atom::Sum { sum, .. } => sum,
        }
    }
}

/// `num / den * factors / divisors`, with `den` never negative
#[derive(Debug, Clone)]
pub struct Term {
    num: Number,
    den: Number,
    factors: Vec<Atom>,
    divisors: Vec<Atom>,
}

impl Term {
    fn constant(value: Number) -> Self {
        Self {
            num: value,
            den: Number::ONE,
            factors: Vec::new(),
            divisors: Vec::new(),
        }
    }

    fn factor(atom: Atom) -> Self {
        Self {
            factors: vec![atom],
            ..Self::constant(Number::ONE)
        }
    }

    fn is_constant(&self) -> bool {
        self.factors.is_empty() && self.divisors.is_empty()
    }

    fn is_zero(&self) -> bool {
        self.num.is_zero()
    }

    fn is_negative(&self) -> bool {
        self.num.is_negative()
    }

    fn factor_keys(&self) -> Vec<&str> {
        self.factors.iter().map(Atom::key).collect()
    }

    fn divisor_keys(&self) -> Vec<&str> {
        self.divisors.iter().map(Atom::key).collect()
    }

    /// Like terms differ only in their coefficient
    fn is_like(&self, other: &Term) -> bool {
        self.factor_keys() == other.factor_keys() && self.divisor_keys() == other.divisor_keys()
    }

    fn coefficient_eq(&self, other: &Term) -> bool {
        (self.num * other.den).numerically_eq(other.num * self.den)
    }

    fn negate(mut self) -> Self {
        self.num = -self.num;
        self
    }

    /// Moves the sign to the numerator and evaluates whole quotients
    fn normalize_coefficient(&mut self) {
        if self.den.is_zero() {
            return;
        }

        if self.den.is_negative() {
            self.num = -self.num;
            self.den = -self.den;
        }

        if let Some(quotient) = self.num.checked_whole_div(self.den) {
            self.num = quotient;
            self.den = Number::ONE;
        }
    }

    fn add_coefficient(&mut self, other: &Term) {
        if self.den.numerically_eq(other.den) {
            self.num = self.num + other.num;
        } else {
            self.num = self.num * other.den + other.num * self.den;
            self.den = self.den * other.den;
        }

        self.normalize_coefficient();
    }

    /// Removes atoms that appear both above and below the line
    fn cancel(&mut self) {
        let factors = &mut self.factors;

        self.divisors.retain(|divisor| {
            match factors.iter().position(|factor| factor.key() == divisor.key()) {
                Some(i) => {
                    factors.remove(i);
                    false
                }
                None => true,
            }
        });
    }

    /// Drops one occurrence of each of `atoms` from the factors
    fn without_factors(mut self, atoms: &[Atom]) -> Self {
        for atom in atoms {
            if let Some(i) = self.factors.iter().position(|f| f.key() == atom.key()) {
                self.factors.remove(i);
            }
        }

        self
    }

    fn multiply(&self, other: &Term) -> Sum {
        let mut term = Term {
            num: self.num * other.num,
            den: self.den * other.den,
            factors: self.factors.iter().chain(&other.factors).cloned().collect(),
            divisors: self.divisors.iter().chain(&other.divisors).cloned().collect(),
        };

        term.cancel();
        term.factors.sort_by(|a, b| a.key().cmp(b.key()));
        term.divisors.sort_by(|a, b| a.key().cmp(b.key()));
        term.normalize_coefficient();

        term.expand_divisors()
    }

    /// A sum divisor next to anything else is multiplied out into a single
    /// sum divisor: `1 / x / (x + y)` is `1 / (x * x + x * y)`
    fn expand_divisors(mut self) -> Sum {
        let has_sum = self.divisors.iter().any(Atom::is_sum);

        if !has_sum || self.den.is_zero() || (self.divisors.len() == 1 && self.den.is_one()) {
            return Sum::from_terms(vec![self]);
        }

        let mut product = Sum::constant(mem::replace(&mut self.den, Number::ONE));
        for divisor in mem::take(&mut self.divisors) {
            product = &product * &divisor.into_sum();
        }

        match product.terms.as_slice() {
            [single] => &Sum::from_terms(vec![self]) * &single.reciprocal(),
            _ => {
                self.divisors.push(Atom::sum(product));
                Sum::from_terms(vec![self])
            }
        }
    }

    /// `1 / self`. Sum divisors come back up as multiplied out factors.
    fn reciprocal(&self) -> Sum {
        let (sums, divisors): (Vec<_>, Vec<_>) =
            self.divisors.iter().cloned().partition(Atom::is_sum);

        let mut term = Term {
            num: self.den,
            den: self.num,
            factors: divisors,
            divisors: self.factors.clone(),
        };
        term.normalize_coefficient();

        sums.into_iter()
            .fold(Sum::from_terms(vec![term]), |product, sum| {
                &product * &sum.into_sum()
            })
    }

    /// Renders the magnitude of the term. `negate_leading` puts the sign on
    /// the first factor, as at the start of a sum.
    fn to_expression(&self, negate_leading: bool) -> Expression {
        let magnitude = self.num.abs();

        let mut numerator = Vec::new();
        if self.factors.is_empty() || !magnitude.is_one() {
            numerator.push(Expression::literal(magnitude.to_string()));
        }
        numerator.extend(self.factors.iter().map(Atom::to_expression));

        if negate_leading {
            let leading = mem::take(&mut numerator[0]);
            numerator[0] = Expression::negate(leading);
        }

        let product = left_deep(ExpressionKind::OpMult, numerator);

        let mut denominator = Vec::new();
        if !self.den.is_one() {
            denominator.push(Expression::literal(self.den.to_string()));
        }
        denominator.extend(self.divisors.iter().map(Atom::to_expression));

        let divisor = match denominator.len() {
            0 => return product,
            1 => denominator.remove(0),
            _ => Expression::paren(left_deep(ExpressionKind::OpMult, denominator)),
        };

        Expression::new(ExpressionKind::OpDiv, vec![product, divisor])
    }
}

/// `a * b * c` as `(a * b) * c`
fn left_deep(kind: ExpressionKind, operands: Vec<Expression>) -> Expression {
    let mut operands = operands.into_iter();
    let first = operands.next().unwrap_or_else(|| Expression::literal("1"));

    operands.fold(first, |lhs, rhs| Expression::new(kind, vec![lhs, rhs]))
}

/// Literal first, then positive before negative terms, terms with factors
/// before pure quotients, then by the rendered factors and divisors
fn canonical_order(a: &Term, b: &Term) -> Ordering {
    b.is_constant()
        .cmp(&a.is_constant())
        .then(a.is_negative().cmp(&b.is_negative()))
        .then(a.factors.is_empty().cmp(&b.factors.is_empty()))
        .then_with(|| a.factor_keys().cmp(&b.factor_keys()))
        .then_with(|| a.divisor_keys().cmp(&b.divisor_keys()))
}

/// A sum of like-term-free terms in canonical order. The empty sum is zero.
#[derive(Debug, Clone, Default)]
pub struct Sum {
    terms: Vec<Term>,
}

impl Sum {
    pub fn constant(value: Number) -> Self {
        Self::from_terms(vec![Term::constant(value)])
    }

    pub fn atom(expression: Expression) -> Self {
        Self::from_terms(vec![Term::factor(Atom::opaque(expression))])
    }

    /// Collects like terms, drops zeros and sorts
    fn from_terms(terms: Vec<Term>) -> Self {
        let mut merged: Vec<Term> = Vec::with_capacity(terms.len());

        for term in terms {
            match merged.iter_mut().find(|existing| existing.is_like(&term)) {
                Some(existing) => existing.add_coefficient(&term),
                None => merged.push(term),
            }
        }

        // A zero literal survives when nothing else does, so `1.5 - 1.5` keeps
        // its float type
        let zero_literal = merged
            .iter()
            .find(|term| term.is_constant() && term.is_zero())
            .cloned();

        merged.retain(|term| !term.is_zero());

        if merged.is_empty() {
            merged.extend(zero_literal);
        }

        merged.sort_by(canonical_order);
        Self { terms: merged }
    }

    fn resorted(mut self) -> Self {
        self.terms.sort_by(canonical_order);
        self
    }

    /// Atoms that are factors of every term, with multiplicity
    fn common_factors(&self) -> Vec<Atom> {
        let Some((first, rest)) = self.terms.split_first() else {
            return Vec::new();
        };

        let mut common = first.factors.clone();

        for term in rest {
            let mut available = term.factor_keys();

            common.retain(|atom| match available.iter().position(|key| *key == atom.key()) {
                Some(i) => {
                    available.swap_remove(i);
                    true
                }
                None => false,
            });
        }

        common
    }

    fn structurally_eq(&self, other: &Sum) -> bool {
        self.terms.len() == other.terms.len()
            && self
                .terms
                .iter()
                .zip(&other.terms)
                .all(|(a, b)| a.is_like(b) && a.coefficient_eq(b))
    }

    /// Tries `self / divisor` as a single term `q` with `q * divisor == self`
    fn exact_quotient(&self, divisor: &Sum) -> Option<Sum> {
        let Some(leading) = self.terms.first() else {
            return Some(Sum::default());
        };

        divisor.terms.iter().find_map(|candidate| {
            let quotient = &Sum::from_terms(vec![leading.clone()]) * &candidate.reciprocal();

            if quotient.terms.len() == 1 && (&quotient * divisor).structurally_eq(self) {
                Some(quotient)
            } else {
                None
            }
        })
    }

    fn divide_by_sum(&self, divisor: &Sum) -> Sum {
        let common = divisor.common_factors();

        let (numerator, divisor) = if common.is_empty() {
            (self.clone(), divisor.clone())
        } else {
            let extracted = Term {
                factors: common.clone(),
                ..Term::constant(Number::ONE)
            };
            let remainder = divisor
                .terms
                .iter()
                .map(|term| term.clone().without_factors(&common))
                .collect();

            (self * &extracted.reciprocal(), Sum::from_terms(remainder))
        };

        if let Some(quotient) = numerator.exact_quotient(&divisor) {
            return quotient;
        }

        let over = Term {
            divisors: vec![Atom::sum(divisor)],
            ..Term::constant(Number::ONE)
        };

        &numerator * &Sum::from_terms(vec![over])
    }

    /// Left-deep `+`/`-` chain. A negative first term becomes a unary minus
    /// on its leading factor.
    pub fn to_expression(&self) -> Expression {
        let mut terms = self.terms.iter();

        let Some(first) = terms.next() else {
            return Expression::literal(Number::ZERO.to_string());
        };

        terms.fold(first.to_expression(first.is_negative()), |sum, term| {
            let kind = if term.is_negative() {
                ExpressionKind::OpSub
            } else {
                ExpressionKind::OpAdd
            };

            Expression::new(kind, vec![sum, term.to_expression(false)])
        })
    }
}

impl Add for Sum {
    type Output = Sum;

    fn add(mut self, other: Sum) -> Sum {
        self.terms.extend(other.terms);
        Sum::from_terms(self.terms)
    }
}

impl Neg for Sum {
    type Output = Sum;

    fn neg(self) -> Sum {
        Sum {
            terms: self.terms.into_iter().map(Term::negate).collect(),
        }
        .resorted()
    }
}

impl Sub for Sum {
    type Output = Sum;

    fn sub(self, other: Sum) -> Sum {
        self + -other
    }
}

/// Distributes fully
impl Mul for &Sum {
    type Output = Sum;

    fn mul(self, other: &Sum) -> Sum {
        let terms = self
            .terms
            .iter()
            .flat_map(|a| other.terms.iter().map(move |b| a.multiply(b)))
            .flat_map(|product| product.terms)
            .collect();

        Sum::from_terms(terms)
    }
}

impl Div for &Sum {
    type Output = Sum;

    fn div(self, other: &Sum) -> Sum {
        match other.terms.as_slice() {
            // Division by zero stays symbolic
            [] => self * &Term::constant(Number::ZERO).reciprocal(),
            [single] => self * &single.reciprocal(),
            _ => self.divide_by_sum(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn var(name: &str) -> Sum {
        Sum::atom(Expression::variable(None, name))
    }

    fn int(value: i64) -> Sum {
        Sum::constant(Number::Int(value))
    }

    fn render(sum: &Sum) -> String {
        print_expression(&sum.to_expression())
    }

    #[test]
    fn like_terms_merge_and_cancel() {
        let sum = var("x") + var("y") - var("x");
        assert_eq!(render(&sum), "y");

        let zero = var("x") - var("x");
        assert!(zero.terms.is_empty());
        assert_eq!(render(&zero), "0");
    }

    #[test]
    fn negative_terms_sort_last() {
        let sum = -var("a") + var("c") + var("b");
        assert_eq!(render(&sum), "b + c - a");
    }

    #[test]
    fn common_factors_keep_multiplicity() {
        let x = var("x");
        let sum = &(&x * &x) * &var("y") + &x * &x;
        let common: Vec<_> = sum.common_factors().iter().map(|a| a.key().to_string()).collect();

        assert_eq!(common, vec!["x", "x"]);
    }

    #[test]
    fn exact_polynomial_division() {
        let divisor = var("a") + var("b");
        let dividend = &divisor * &var("y");

        assert_eq!(render(&(&dividend / &divisor)), "y");
    }

    #[test]
    fn inexact_division_keeps_sum_divisor() {
        let quotient = &int(2) / &(var("b") + var("a"));
        assert_eq!(render(&quotient), "2 / (a + b)");
    }

    #[test]
    fn division_by_zero_is_symbolic() {
        assert_eq!(render(&(&var("x") / &Sum::default())), "x / 0");
    }
}
