// SPDX-License-Identifier: MIT

use std::collections::BTreeSet;
use std::fmt;
use std::ops;

/// A concrete scalar, either exactly integral or floating.
///
/// The distinction matters downstream: sample-index arithmetic is rounded
/// for integral results and kept in the float domain otherwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn to_f64(self) -> f64 {
        match self {
            Number::Int(v) => v as f64,
            Number::Float(v) => v,
        }
    }

    pub fn is_integral(self) -> bool {
        matches!(self, Number::Int(_))
    }

    pub fn is_finite(self) -> bool {
        match self {
            Number::Int(_) => true,
            Number::Float(v) => v.is_finite(),
        }
    }

    pub fn is_zero(self) -> bool {
        match self {
            Number::Int(v) => v == 0,
            Number::Float(v) => v == 0.0,
        }
    }

    /// Round to the nearest sample index (ties away from zero).
    pub fn round(self) -> i64 {
        match self {
            Number::Int(v) => v,
            Number::Float(v) => v.round() as i64,
        }
    }

    pub fn min(self, other: Number) -> Number {
        if self.to_f64() <= other.to_f64() { self } else { other }
    }

    pub fn max(self, other: Number) -> Number {
        if self.to_f64() >= other.to_f64() { self } else { other }
    }
}

impl ops::Add for Number {
    type Output = Number;

    fn add(self, rhs: Number) -> Number {
        match (self, rhs) {
            (Number::Int(a), Number::Int(b)) => match a.checked_add(b) {
                Some(v) => Number::Int(v),
                None => Number::Float(a as f64 + b as f64),
            },
            (a, b) => Number::Float(a.to_f64() + b.to_f64()),
        }
    }
}

impl ops::Mul for Number {
    type Output = Number;

    fn mul(self, rhs: Number) -> Number {
        match (self, rhs) {
            (Number::Int(a), Number::Int(b)) => match a.checked_mul(b) {
                Some(v) => Number::Int(v),
                None => Number::Float(a as f64 * b as f64),
            },
            (a, b) => Number::Float(a.to_f64() * b.to_f64()),
        }
    }
}

impl ops::Neg for Number {
    type Output = Number;

    fn neg(self) -> Number {
        match self {
            Number::Int(v) => match v.checked_neg() {
                Some(n) => Number::Int(n),
                None => Number::Float(-(v as f64)),
            },
            Number::Float(v) => Number::Float(-v),
        }
    }
}

impl From<i64> for Number {
    fn from(v: i64) -> Number {
        Number::Int(v)
    }
}

impl From<f64> for Number {
    fn from(v: f64) -> Number {
        Number::Float(v)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(v) => write!(f, "{v}"),
            Number::Float(v) if v.is_infinite() => {
                write!(f, "{}", if *v > 0.0 { "inf" } else { "-inf" })
            }
            Number::Float(v) => write!(f, "{v}"),
        }
    }
}

/// A symbolic scalar expression over named parameters.
///
/// Expressions are built through the smart constructors ([`Expr::add`],
/// [`Expr::scale`], ...) which fold constants eagerly so that serialized
/// text stays tidy. `Min`/`Max` only ever appear in pulse bounds and are
/// never part of the persisted wire format.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(Number),
    Param(String),
    Sum(Box<Expr>, Box<Expr>),
    Scale(Box<Expr>, Number),
    Prod(Box<Expr>, Box<Expr>),
    Min(Box<Expr>, Box<Expr>),
    Max(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn param<S: Into<String>>(name: S) -> Expr {
        Expr::Param(name.into())
    }

    pub fn zero() -> Expr {
        Expr::Const(Number::Int(0))
    }

    pub fn one() -> Expr {
        Expr::Const(Number::Int(1))
    }

    pub fn infinity() -> Expr {
        Expr::Const(Number::Float(f64::INFINITY))
    }

    pub fn neg_infinity() -> Expr {
        Expr::Const(Number::Float(f64::NEG_INFINITY))
    }

    pub fn add(a: Expr, b: Expr) -> Expr {
        match (a, b) {
            (Expr::Const(x), Expr::Const(y)) => Expr::Const(x + y),
            (Expr::Const(x), b) if x.is_zero() => b,
            (a, Expr::Const(y)) if y.is_zero() => a,
            (a, b) => Expr::Sum(Box::new(a), Box::new(b)),
        }
    }

    pub fn scale(e: Expr, k: impl Into<Number>) -> Expr {
        let k = k.into();
        if k.is_zero() {
            return Expr::zero();
        }
        match e {
            Expr::Const(x) => Expr::Const(x * k),
            e if k == Number::Int(1) => e,
            Expr::Scale(inner, k2) => Expr::Scale(inner, k * k2),
            e => Expr::Scale(Box::new(e), k),
        }
    }

    pub fn mul(a: Expr, b: Expr) -> Expr {
        match (a, b) {
            (Expr::Const(x), e) | (e, Expr::Const(x)) => Expr::scale(e, x),
            (a, b) => Expr::Prod(Box::new(a), Box::new(b)),
        }
    }

    pub fn min(a: Expr, b: Expr) -> Expr {
        match (a, b) {
            (Expr::Const(x), Expr::Const(y)) => Expr::Const(x.min(y)),
            (a, b) => Expr::Min(Box::new(a), Box::new(b)),
        }
    }

    pub fn max(a: Expr, b: Expr) -> Expr {
        match (a, b) {
            (Expr::Const(x), Expr::Const(y)) => Expr::Const(x.max(y)),
            (a, b) => Expr::Max(Box::new(a), Box::new(b)),
        }
    }

    /// Collect the distinct parameter names referenced anywhere in the
    /// expression.
    pub fn collect_params(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Const(_) => {}
            Expr::Param(name) => {
                out.insert(name.clone());
            }
            Expr::Sum(a, b) | Expr::Prod(a, b) | Expr::Min(a, b) | Expr::Max(a, b) => {
                a.collect_params(out);
                b.collect_params(out);
            }
            Expr::Scale(e, _) => e.collect_params(out),
        }
    }

    pub fn params(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_params(&mut out);
        out
    }

    /// The expression negated, when it is a plain negative constant or a
    /// negative scale. Used to print `a - b` instead of `a + -b`.
    fn as_negated(&self) -> Option<Expr> {
        match self {
            Expr::Const(Number::Int(v)) if *v < 0 => Some(Expr::Const(Number::Int(-v))),
            Expr::Const(Number::Float(v)) if *v < 0.0 => Some(Expr::Const(Number::Float(-v))),
            Expr::Scale(e, k) if k.to_f64() < 0.0 => Some(Expr::scale((**e).clone(), -*k)),
            _ => None,
        }
    }

    fn fmt_factor(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Sum(..) => write!(f, "({self})"),
            _ => write!(f, "{self}"),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Const(n) => write!(f, "{n}"),
            Expr::Param(name) => write!(f, "{name}"),
            Expr::Sum(a, b) => match b.as_negated() {
                Some(neg) => write!(f, "{a} - {neg}"),
                None => write!(f, "{a} + {b}"),
            },
            Expr::Scale(e, k) => {
                if *k == Number::Int(-1) {
                    write!(f, "-")?;
                } else {
                    write!(f, "{k}*")?;
                }
                e.fmt_factor(f)
            }
            Expr::Prod(a, b) => {
                a.fmt_factor(f)?;
                write!(f, "*")?;
                b.fmt_factor(f)
            }
            Expr::Min(a, b) => write!(f, "Min({a}, {b})"),
            Expr::Max(a, b) => write!(f, "Max({a}, {b})"),
        }
    }
}

impl From<Number> for Expr {
    fn from(n: Number) -> Expr {
        Expr::Const(n)
    }
}

impl From<i64> for Expr {
    fn from(v: i64) -> Expr {
        Expr::Const(Number::Int(v))
    }
}

impl From<f64> for Expr {
    fn from(v: f64) -> Expr {
        Expr::Const(Number::Float(v))
    }
}

impl From<&str> for Expr {
    fn from(name: &str) -> Expr {
        Expr::param(name)
    }
}

impl ops::Add for Expr {
    type Output = Expr;

    fn add(self, rhs: Expr) -> Expr {
        Expr::add(self, rhs)
    }
}

impl ops::Sub for Expr {
    type Output = Expr;

    fn sub(self, rhs: Expr) -> Expr {
        Expr::add(self, Expr::scale(rhs, -1))
    }
}

impl ops::Mul for Expr {
    type Output = Expr;

    fn mul(self, rhs: Expr) -> Expr {
        Expr::mul(self, rhs)
    }
}

impl ops::Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::scale(self, -1)
    }
}
