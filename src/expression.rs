//! Row predicates used by filtered accumulators.
//!
//! The set of expressions is closed: comparisons against a constant and their
//! conjunction or disjunction. Every expression is evaluated against a single
//! value, the current row's value of the column it is attached to.

use std::fmt;

/// Relative tolerance used by the comparison operators.
pub const EPSILON: f64 = 1e-8;

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// True when the row carries a value.
    Get,
    /// `value > threshold`
    Gt(f64),
    /// `value < threshold`
    Lt(f64),
    /// `value <= threshold`
    Let(f64),
    Conjunction(Box<Expression>, Box<Expression>),
    Disjunction(Box<Expression>, Box<Expression>),
}

impl Expression {
    pub fn and(self, other: Expression) -> Expression {
        Expression::Conjunction(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Expression) -> Expression {
        Expression::Disjunction(Box::new(self), Box::new(other))
    }

    /// `lower < value <= upper`, the range accepted for p-values.
    pub fn open_closed(lower: f64, upper: f64) -> Expression {
        Expression::Gt(lower).and(Expression::Let(upper))
    }

    pub fn evaluate(&self, value: f64) -> bool {
        match self {
            Expression::Get => !value.is_nan(),
            Expression::Gt(threshold) => fcmp(value, *threshold) == Some(1),
            Expression::Lt(threshold) => fcmp(value, *threshold) == Some(-1),
            Expression::Let(threshold) => matches!(fcmp(value, *threshold), Some(-1 | 0)),
            Expression::Conjunction(left, right) => left.evaluate(value) && right.evaluate(value),
            Expression::Disjunction(left, right) => left.evaluate(value) || right.evaluate(value),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Get => f.write_str("present"),
            Expression::Gt(t) => write!(f, "> {t}"),
            Expression::Lt(t) => write!(f, "< {t}"),
            Expression::Let(t) => write!(f, "<= {t}"),
            Expression::Conjunction(l, r) => write!(f, "({l} and {r})"),
            Expression::Disjunction(l, r) => write!(f, "({l} or {r})"),
        }
    }
}

/// Approximate three-way comparison. The tolerance is [`EPSILON`] scaled to the
/// binary exponent of the larger operand. Returns `None` when either side is NaN.
pub fn fcmp(x1: f64, x2: f64) -> Option<i8> {
    if x1.is_nan() || x2.is_nan() {
        return None;
    }
    if x1.is_infinite() || x2.is_infinite() {
        return Some(match x1.partial_cmp(&x2)? {
            std::cmp::Ordering::Less => -1,
            std::cmp::Ordering::Equal => 0,
            std::cmp::Ordering::Greater => 1,
        });
    }
    let max = x1.abs().max(x2.abs());
    let delta = if max == 0.0 {
        EPSILON
    } else {
        EPSILON * 2f64.powi(binary_exponent(max))
    };
    let difference = x1 - x2;
    if difference > delta {
        Some(1)
    } else if difference < -delta {
        Some(-1)
    } else {
        Some(0)
    }
}

/// Exponent `e` such that `value = m * 2^e` with `0.5 <= m < 1`.
fn binary_exponent(value: f64) -> i32 {
    if value == 0.0 || !value.is_finite() {
        return 0;
    }
    let bits = value.to_bits();
    let raw = ((bits >> 52) & 0x7ff) as i32;
    if raw == 0 {
        // subnormal
        let mantissa = bits & ((1u64 << 52) - 1);
        let leading = mantissa.leading_zeros() as i32 - 12;
        -1022 - leading
    } else {
        raw - 1022
    }
}
