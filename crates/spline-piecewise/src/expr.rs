//! Branch expressions: a closed variant over polynomials and rational functions.

use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};
use spline_core::{Result, Univariate};

use crate::{Affine, Polynomial, Rational};

/// Expression held by a branch. Arithmetic stays polynomial whenever both
/// operands are polynomial and promotes to `Rational` otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Polynomial(Polynomial),
    Rational(Rational),
}

impl Expr {
    pub fn zero() -> Self {
        Expr::Polynomial(Polynomial::zero())
    }

    pub fn constant(c: f64) -> Self {
        Expr::Polynomial(Polynomial::constant(c))
    }

    pub fn as_polynomial(&self) -> Option<&Polynomial> {
        match self {
            Expr::Polynomial(p) => Some(p),
            Expr::Rational(_) => None,
        }
    }

    pub fn is_polynomial(&self) -> bool {
        matches!(self, Expr::Polynomial(_))
    }

    pub fn to_rational(&self) -> Rational {
        match self {
            Expr::Polynomial(p) => Rational::from_polynomial(p.clone()),
            Expr::Rational(r) => r.clone(),
        }
    }

    /// Numerator polynomial (the polynomial itself for polynomial expressions).
    pub fn numerator(&self) -> &Polynomial {
        match self {
            Expr::Polynomial(p) => p,
            Expr::Rational(r) => r.numerator(),
        }
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        match self {
            Expr::Polynomial(p) => p.evaluate(x),
            Expr::Rational(r) => r.evaluate(x),
        }
    }

    pub fn try_evaluate(&self, x: f64) -> Result<f64> {
        match self {
            Expr::Polynomial(p) => Ok(p.evaluate(x)),
            Expr::Rational(r) => r.try_evaluate(x),
        }
    }

    pub fn derivative(&self) -> Self {
        match self {
            Expr::Polynomial(p) => Expr::Polynomial(p.derivative()),
            Expr::Rational(r) => Expr::Rational(r.derivative()),
        }
    }

    pub fn compose(&self, map: &Affine) -> Self {
        match self {
            Expr::Polynomial(p) => Expr::Polynomial(p.compose(map)),
            Expr::Rational(r) => Expr::Rational(r.compose(map)),
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Expr::Polynomial(p) => p.is_zero(),
            Expr::Rational(r) => r.is_zero(),
        }
    }

    /// Drop negligible coefficients; rational parts are also reduced by
    /// `Rational::normalized`.
    pub fn normalized(&self, tolerance: f64) -> Self {
        match self {
            Expr::Polynomial(p) => Expr::Polynomial(p.trimmed(tolerance)),
            Expr::Rational(r) => Expr::Rational(r.normalized(tolerance)),
        }
    }

    pub fn reciprocal(&self) -> Result<Self> {
        Ok(Expr::Rational(self.to_rational().reciprocal()?))
    }

    pub fn to_latex(&self) -> String {
        match self {
            Expr::Polynomial(p) => p.to_latex(),
            Expr::Rational(r) => r.to_latex(),
        }
    }
}

impl Default for Expr {
    fn default() -> Self {
        Expr::zero()
    }
}

impl From<Polynomial> for Expr {
    fn from(p: Polynomial) -> Self {
        Expr::Polynomial(p)
    }
}

impl From<Rational> for Expr {
    fn from(r: Rational) -> Self {
        Expr::Rational(r)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Polynomial(p) => write!(f, "{p}"),
            Expr::Rational(r) => write!(f, "{r}"),
        }
    }
}

impl Univariate for Expr {
    fn evaluate(&self, x: f64) -> f64 {
        Expr::evaluate(self, x)
    }

    fn derivative(&self) -> Self {
        Expr::derivative(self)
    }

    fn shift(&self, h: f64) -> Self {
        self.compose(&Affine::translation(h))
    }

    fn scale(&self, c: f64) -> Self {
        match self {
            Expr::Polynomial(p) => Expr::Polynomial(p.scale(c)),
            Expr::Rational(r) => Expr::Rational(r.scale(c)),
        }
    }

    fn is_zero(&self) -> bool {
        Expr::is_zero(self)
    }

    fn to_latex(&self) -> String {
        Expr::to_latex(self)
    }
}

impl<'a> Add<&'a Expr> for &'a Expr {
    type Output = Expr;

    fn add(self, rhs: &Expr) -> Expr {
        match (self, rhs) {
            (Expr::Polynomial(a), Expr::Polynomial(b)) => Expr::Polynomial(a + b),
            _ => Expr::Rational(&self.to_rational() + &rhs.to_rational()),
        }
    }
}

impl<'a> Sub<&'a Expr> for &'a Expr {
    type Output = Expr;

    fn sub(self, rhs: &Expr) -> Expr {
        match (self, rhs) {
            (Expr::Polynomial(a), Expr::Polynomial(b)) => Expr::Polynomial(a - b),
            _ => Expr::Rational(&self.to_rational() - &rhs.to_rational()),
        }
    }
}

impl<'a> Mul<&'a Expr> for &'a Expr {
    type Output = Expr;

    fn mul(self, rhs: &Expr) -> Expr {
        match (self, rhs) {
            (Expr::Polynomial(a), Expr::Polynomial(b)) => Expr::Polynomial(a * b),
            (Expr::Polynomial(p), Expr::Rational(r)) | (Expr::Rational(r), Expr::Polynomial(p)) => {
                Expr::Rational(&Rational::from_polynomial(p.clone()) * r)
            }
            (Expr::Rational(a), Expr::Rational(b)) => Expr::Rational(a * b),
        }
    }
}

impl Mul<f64> for &Expr {
    type Output = Expr;

    fn mul(self, rhs: f64) -> Expr {
        match self {
            Expr::Polynomial(p) => Expr::Polynomial(p * rhs),
            Expr::Rational(r) => Expr::Rational(r * rhs),
        }
    }
}

impl Neg for &Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        match self {
            Expr::Polynomial(p) => Expr::Polynomial(-p),
            Expr::Rational(r) => Expr::Rational(-r),
        }
    }
}
