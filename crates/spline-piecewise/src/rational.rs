//! Rational functions `N(x) / D(x)`.

use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

use log::warn;
use serde::{Deserialize, Serialize};
use spline_core::{Result, SplineError, Univariate};

use crate::{Affine, Polynomial};

/// Ratio of two polynomials. The denominator is never the zero polynomial.
///
/// Values are not reduced to lowest terms; equality is structural.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RationalRepr")]
pub struct Rational {
    numerator: Polynomial,
    denominator: Polynomial,
}

#[derive(Deserialize)]
struct RationalRepr {
    numerator: Polynomial,
    denominator: Polynomial,
}

impl TryFrom<RationalRepr> for Rational {
    type Error = SplineError;

    fn try_from(repr: RationalRepr) -> Result<Self> {
        Rational::new(repr.numerator, repr.denominator)
    }
}

impl Rational {
    pub fn new(numerator: Polynomial, denominator: Polynomial) -> Result<Self> {
        if denominator.is_zero() {
            return Err(SplineError::InvalidArgument(
                "rational function with a zero denominator".into(),
            ));
        }
        Ok(Self {
            numerator,
            denominator,
        })
    }

    /// Both parts already known to be valid (denominator non-zero).
    fn from_parts(numerator: Polynomial, denominator: Polynomial) -> Self {
        debug_assert!(!denominator.is_zero());
        Self {
            numerator,
            denominator,
        }
    }

    pub fn from_polynomial(p: Polynomial) -> Self {
        Self::from_parts(p, Polynomial::one())
    }

    pub fn numerator(&self) -> &Polynomial {
        &self.numerator
    }

    pub fn denominator(&self) -> &Polynomial {
        &self.denominator
    }

    pub fn is_zero(&self) -> bool {
        self.numerator.is_zero()
    }

    /// IEEE evaluation: a vanishing denominator yields `±inf` or `NaN`.
    pub fn evaluate(&self, x: f64) -> f64 {
        self.numerator.evaluate(x) / self.denominator.evaluate(x)
    }

    /// Checked evaluation: a vanishing denominator is a `DivisionByZero`.
    pub fn try_evaluate(&self, x: f64) -> Result<f64> {
        let d = self.denominator.evaluate(x);
        if d == 0.0 {
            warn!("rational denominator vanishes at x = {x}");
            return Err(SplineError::DivisionByZero(x));
        }
        Ok(self.numerator.evaluate(x) / d)
    }

    /// Quotient rule: `(N'D - ND') / D²`.
    pub fn derivative(&self) -> Self {
        let n = &self.numerator;
        let d = &self.denominator;
        let numerator = &(&n.derivative() * d) - &(n * &d.derivative());
        Self::from_parts(numerator, d * d)
    }

    pub fn reciprocal(&self) -> Result<Self> {
        if self.numerator.is_zero() {
            return Err(SplineError::InvalidArgument(
                "reciprocal of the zero rational function".into(),
            ));
        }
        Ok(Self::from_parts(
            self.denominator.clone(),
            self.numerator.clone(),
        ))
    }

    pub fn checked_div(&self, other: &Rational) -> Result<Self> {
        Ok(self * &other.reciprocal()?)
    }

    pub fn compose(&self, map: &Affine) -> Self {
        Self::from_parts(self.numerator.compose(map), self.denominator.compose(map))
    }

    pub fn shift(&self, h: f64) -> Self {
        self.compose(&Affine::translation(h))
    }

    /// `r(c·x)`; a zero factor collapses to the constant `r(0)` provided the
    /// denominator does not vanish there.
    pub fn scale(&self, c: f64) -> Self {
        let denominator = self.denominator.scale(c);
        if denominator.is_zero() {
            return Self::from_parts(Polynomial::constant(f64::NAN), Polynomial::one());
        }
        Self::from_parts(self.numerator.scale(c), denominator)
    }

    /// Drop leading coefficients at most `tolerance` in magnitude, strip a
    /// common factor `x` and make the denominator monic.
    pub fn normalized(&self, tolerance: f64) -> Self {
        let denominator = match self.denominator.trimmed(tolerance) {
            d if d.is_zero() => self.denominator.clone(),
            d => d,
        };
        let mut n = self.numerator.trimmed(tolerance).coeffs().to_vec();
        let mut d = denominator.coeffs().to_vec();
        while n.len() > 1 && d.len() > 1 && n[0] == 0.0 && d[0] == 0.0 {
            n.remove(0);
            d.remove(0);
        }
        let lead = d[d.len() - 1];
        let numerator = Polynomial::new(n.into_iter().map(|c| c / lead))
            .unwrap_or_else(|_| Polynomial::zero());
        let denominator = Polynomial::new(d.into_iter().map(|c| c / lead))
            .unwrap_or_else(|_| Polynomial::one());
        Self::from_parts(numerator, denominator)
    }

    pub fn to_latex(&self) -> String {
        if self.denominator == Polynomial::one() {
            return self.numerator.to_latex();
        }
        format!(
            "\\frac{{{}}}{{{}}}",
            self.numerator.to_latex(),
            self.denominator.to_latex()
        )
    }
}

impl From<Polynomial> for Rational {
    fn from(p: Polynomial) -> Self {
        Rational::from_polynomial(p)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}) / ({})", self.numerator, self.denominator)
    }
}

impl Univariate for Rational {
    fn evaluate(&self, x: f64) -> f64 {
        Rational::evaluate(self, x)
    }

    fn derivative(&self) -> Self {
        Rational::derivative(self)
    }

    fn shift(&self, h: f64) -> Self {
        Rational::shift(self, h)
    }

    fn scale(&self, c: f64) -> Self {
        Rational::scale(self, c)
    }

    fn is_zero(&self) -> bool {
        Rational::is_zero(self)
    }

    fn to_latex(&self) -> String {
        Rational::to_latex(self)
    }
}

impl<'a> Add<&'a Rational> for &'a Rational {
    type Output = Rational;

    fn add(self, rhs: &Rational) -> Rational {
        if self.denominator == rhs.denominator {
            return Rational::from_parts(
                &self.numerator + &rhs.numerator,
                self.denominator.clone(),
            );
        }
        let numerator =
            &(&self.numerator * &rhs.denominator) + &(&self.denominator * &rhs.numerator);
        Rational::from_parts(numerator, &self.denominator * &rhs.denominator)
    }
}

impl<'a> Sub<&'a Rational> for &'a Rational {
    type Output = Rational;

    fn sub(self, rhs: &Rational) -> Rational {
        self + &(-rhs)
    }
}

impl<'a> Mul<&'a Rational> for &'a Rational {
    type Output = Rational;

    fn mul(self, rhs: &Rational) -> Rational {
        Rational::from_parts(
            &self.numerator * &rhs.numerator,
            &self.denominator * &rhs.denominator,
        )
    }
}

impl Mul<f64> for &Rational {
    type Output = Rational;

    fn mul(self, rhs: f64) -> Rational {
        Rational::from_parts(&self.numerator * rhs, self.denominator.clone())
    }
}

impl Neg for &Rational {
    type Output = Rational;

    fn neg(self) -> Rational {
        Rational::from_parts(-&self.numerator, self.denominator.clone())
    }
}
