//! Dense univariate polynomials with `f64` coefficients.

use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

use approx::{AbsDiffEq, RelativeEq};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use spline_core::{Result, SplineError, Univariate};

use crate::Affine;

/// A polynomial in canonical form.
///
/// Coefficients are stored in increasing order of power: `coeffs[k]` is the
/// coefficient of `x^k`. The highest-order coefficient is never an exact zero,
/// except for the zero polynomial which is stored as `[0.0]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Polynomial {
    coeffs: Vec<f64>,
}

impl Polynomial {
    /// Construct from coefficients in increasing order of power.
    pub fn new(coeffs: impl IntoIterator<Item = f64>) -> Result<Self> {
        let coeffs: Vec<f64> = coeffs.into_iter().collect();
        if coeffs.is_empty() {
            return Err(SplineError::InvalidArgument(
                "a polynomial needs at least one coefficient".into(),
            ));
        }
        if let Some(c) = coeffs.iter().find(|c| !c.is_finite()) {
            return Err(SplineError::InvalidArgument(format!(
                "polynomial coefficients must be finite, got {c}"
            )));
        }
        Ok(Self::from_vec(coeffs))
    }

    fn from_vec(mut coeffs: Vec<f64>) -> Self {
        while coeffs.len() > 1 && coeffs.last() == Some(&0.0) {
            coeffs.pop();
        }
        if coeffs.is_empty() {
            coeffs.push(0.0);
        }
        Self { coeffs }
    }

    pub fn zero() -> Self {
        Self { coeffs: vec![0.0] }
    }

    pub fn one() -> Self {
        Self { coeffs: vec![1.0] }
    }

    pub fn constant(c: f64) -> Self {
        Self::from_vec(vec![c])
    }

    /// `slope·x + intercept`
    pub fn linear(slope: f64, intercept: f64) -> Self {
        Self::from_vec(vec![intercept, slope])
    }

    /// `x^k`
    pub fn monomial(k: usize) -> Self {
        let mut coeffs = vec![0.0; k + 1];
        coeffs[k] = 1.0;
        Self { coeffs }
    }

    pub fn coeffs(&self) -> &[f64] {
        &self.coeffs
    }

    pub fn degree(&self) -> usize {
        self.coeffs.len() - 1
    }

    pub fn leading_coefficient(&self) -> f64 {
        self.coeffs[self.coeffs.len() - 1]
    }

    pub fn constant_term(&self) -> f64 {
        self.coeffs[0]
    }

    pub fn is_zero(&self) -> bool {
        self.coeffs.len() == 1 && self.coeffs[0] == 0.0
    }

    pub fn is_constant(&self) -> bool {
        self.coeffs.len() == 1
    }

    /// Horner evaluation.
    pub fn evaluate(&self, x: f64) -> f64 {
        self.coeffs.iter().rev().fold(0.0, |acc, &c| acc * x + c)
    }

    pub fn derivative(&self) -> Self {
        if self.coeffs.len() == 1 {
            return Self::zero();
        }
        let coeffs = self
            .coeffs
            .iter()
            .enumerate()
            .skip(1)
            .map(|(k, &c)| k as f64 * c)
            .collect();
        Self::from_vec(coeffs)
    }

    /// `p(a·x + b)`, expanded by Horner's scheme over polynomials.
    pub fn compose(&self, map: &Affine) -> Self {
        let inner = Polynomial::linear(map.scale, map.offset);
        let mut result = Polynomial::zero();
        for &c in self.coeffs.iter().rev() {
            result = &(&result * &inner) + c;
        }
        result
    }

    /// `p(x + h)`
    pub fn shift(&self, h: f64) -> Self {
        self.compose(&Affine::translation(h))
    }

    /// `p(c·x)`. A zero factor collapses to the constant `p(0)`.
    pub fn scale(&self, c: f64) -> Self {
        let mut factor = 1.0;
        let coeffs = self
            .coeffs
            .iter()
            .map(|&a| {
                let scaled = a * factor;
                factor *= c;
                scaled
            })
            .collect();
        Self::from_vec(coeffs)
    }

    pub fn powi(&self, n: u32) -> Self {
        let mut result = Polynomial::one();
        for _ in 0..n {
            result = &result * self;
        }
        result
    }

    /// Drop highest-order coefficients whose magnitude is at most `tolerance`.
    pub fn trimmed(&self, tolerance: f64) -> Self {
        let mut coeffs = self.coeffs.clone();
        while coeffs.len() > 1 && coeffs[coeffs.len() - 1].abs() <= tolerance {
            coeffs.pop();
        }
        if coeffs.len() == 1 && coeffs[0].abs() <= tolerance {
            return Self::zero();
        }
        Self::from_vec(coeffs)
    }

    /// Real roots, from the eigenvalues of the companion matrix, sorted
    /// ascending. Constant polynomials have no roots.
    pub fn real_roots(&self) -> Vec<f64> {
        let n = self.degree();
        match n {
            0 => Vec::new(),
            1 => vec![-self.coeffs[0] / self.coeffs[1]],
            _ => {
                let lead = self.leading_coefficient();
                let companion = DMatrix::from_fn(n, n, |r, c| {
                    if c == n - 1 {
                        -self.coeffs[r] / lead
                    } else if r == c + 1 {
                        1.0
                    } else {
                        0.0
                    }
                });
                let mut roots: Vec<f64> = companion
                    .complex_eigenvalues()
                    .iter()
                    .filter(|z| z.im.abs() <= 1e-9 * z.re.abs().max(1.0))
                    .map(|z| z.re)
                    .collect();
                roots.sort_by(f64::total_cmp);
                roots
            }
        }
    }

    pub fn to_latex(&self) -> String {
        self.render(|k| format!("x^{{{k}}}"))
    }

    fn render(&self, power: impl Fn(usize) -> String) -> String {
        if self.is_zero() {
            return "0".into();
        }
        let mut out = String::new();
        for (k, &c) in self.coeffs.iter().enumerate().rev() {
            if c == 0.0 {
                continue;
            }
            if out.is_empty() {
                if c < 0.0 {
                    out.push('-');
                }
            } else {
                out.push_str(if c < 0.0 { " - " } else { " + " });
            }
            let magnitude = c.abs();
            if k == 0 || magnitude != 1.0 {
                out.push_str(&format!("{magnitude}"));
            }
            match k {
                0 => {}
                1 => out.push('x'),
                _ => out.push_str(&power(k)),
            }
        }
        out
    }
}

impl Default for Polynomial {
    fn default() -> Self {
        Self::zero()
    }
}

impl TryFrom<Vec<f64>> for Polynomial {
    type Error = SplineError;

    fn try_from(coeffs: Vec<f64>) -> Result<Self> {
        Polynomial::new(coeffs)
    }
}

impl From<Polynomial> for Vec<f64> {
    fn from(p: Polynomial) -> Self {
        p.coeffs
    }
}

impl fmt::Display for Polynomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render(|k| format!("x^{k}")))
    }
}

impl Univariate for Polynomial {
    fn evaluate(&self, x: f64) -> f64 {
        Polynomial::evaluate(self, x)
    }

    fn derivative(&self) -> Self {
        Polynomial::derivative(self)
    }

    fn shift(&self, h: f64) -> Self {
        Polynomial::shift(self, h)
    }

    fn scale(&self, c: f64) -> Self {
        Polynomial::scale(self, c)
    }

    fn is_zero(&self) -> bool {
        Polynomial::is_zero(self)
    }

    fn to_latex(&self) -> String {
        Polynomial::to_latex(self)
    }
}

impl<'a> Add<&'a Polynomial> for &'a Polynomial {
    type Output = Polynomial;

    fn add(self, rhs: &Polynomial) -> Polynomial {
        let len = self.coeffs.len().max(rhs.coeffs.len());
        let coeffs = (0..len)
            .map(|k| self.coeffs.get(k).unwrap_or(&0.0) + rhs.coeffs.get(k).unwrap_or(&0.0))
            .collect();
        Polynomial::from_vec(coeffs)
    }
}

impl<'a> Sub<&'a Polynomial> for &'a Polynomial {
    type Output = Polynomial;

    fn sub(self, rhs: &Polynomial) -> Polynomial {
        let len = self.coeffs.len().max(rhs.coeffs.len());
        let coeffs = (0..len)
            .map(|k| self.coeffs.get(k).unwrap_or(&0.0) - rhs.coeffs.get(k).unwrap_or(&0.0))
            .collect();
        Polynomial::from_vec(coeffs)
    }
}

impl<'a> Mul<&'a Polynomial> for &'a Polynomial {
    type Output = Polynomial;

    fn mul(self, rhs: &Polynomial) -> Polynomial {
        let mut coeffs = vec![0.0; self.coeffs.len() + rhs.coeffs.len() - 1];
        for (i, a) in self.coeffs.iter().enumerate() {
            for (j, b) in rhs.coeffs.iter().enumerate() {
                coeffs[i + j] += a * b;
            }
        }
        Polynomial::from_vec(coeffs)
    }
}

impl Add<f64> for &Polynomial {
    type Output = Polynomial;

    fn add(self, rhs: f64) -> Polynomial {
        let mut coeffs = self.coeffs.clone();
        coeffs[0] += rhs;
        Polynomial::from_vec(coeffs)
    }
}

impl Mul<f64> for &Polynomial {
    type Output = Polynomial;

    fn mul(self, rhs: f64) -> Polynomial {
        Polynomial::from_vec(self.coeffs.iter().map(|c| c * rhs).collect())
    }
}

impl Div<f64> for &Polynomial {
    type Output = Polynomial;

    fn div(self, rhs: f64) -> Polynomial {
        Polynomial::from_vec(self.coeffs.iter().map(|c| c / rhs).collect())
    }
}

impl Neg for &Polynomial {
    type Output = Polynomial;

    fn neg(self) -> Polynomial {
        Polynomial::from_vec(self.coeffs.iter().map(|c| -c).collect())
    }
}

macro_rules! forward_owned_binop {
    ($imp:ident, $method:ident) => {
        impl $imp<Polynomial> for Polynomial {
            type Output = Polynomial;

            fn $method(self, rhs: Polynomial) -> Polynomial {
                (&self).$method(&rhs)
            }
        }

        impl $imp<&Polynomial> for Polynomial {
            type Output = Polynomial;

            fn $method(self, rhs: &Polynomial) -> Polynomial {
                (&self).$method(rhs)
            }
        }

        impl $imp<f64> for Polynomial {
            type Output = Polynomial;

            fn $method(self, rhs: f64) -> Polynomial {
                (&self).$method(rhs)
            }
        }
    };
}

forward_owned_binop!(Add, add);
forward_owned_binop!(Mul, mul);

impl Sub<Polynomial> for Polynomial {
    type Output = Polynomial;

    fn sub(self, rhs: Polynomial) -> Polynomial {
        &self - &rhs
    }
}

impl Div<f64> for Polynomial {
    type Output = Polynomial;

    fn div(self, rhs: f64) -> Polynomial {
        &self / rhs
    }
}

impl Neg for Polynomial {
    type Output = Polynomial;

    fn neg(self) -> Polynomial {
        -&self
    }
}

impl AbsDiffEq for Polynomial {
    type Epsilon = f64;

    fn default_epsilon() -> f64 {
        f64::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: f64) -> bool {
        let len = self.coeffs.len().max(other.coeffs.len());
        (0..len).all(|k| {
            let a = self.coeffs.get(k).copied().unwrap_or(0.0);
            let b = other.coeffs.get(k).copied().unwrap_or(0.0);
            a.abs_diff_eq(&b, epsilon)
        })
    }
}

impl RelativeEq for Polynomial {
    fn default_max_relative() -> f64 {
        f64::default_max_relative()
    }

    fn relative_eq(&self, other: &Self, epsilon: f64, max_relative: f64) -> bool {
        let len = self.coeffs.len().max(other.coeffs.len());
        (0..len).all(|k| {
            let a = self.coeffs.get(k).copied().unwrap_or(0.0);
            let b = other.coeffs.get(k).copied().unwrap_or(0.0);
            a.relative_eq(&b, epsilon, max_relative)
        })
    }
}
