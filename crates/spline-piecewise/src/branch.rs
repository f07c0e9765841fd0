use std::fmt;

use serde::{Deserialize, Serialize};
use spline_core::{Result, SplineError};

use crate::{Affine, Expr, Interval};

/// An expression valid only on one interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    expr: Expr,
    interval: Interval,
}

impl Branch {
    pub fn new(expr: impl Into<Expr>, interval: Interval) -> Self {
        Self {
            expr: expr.into(),
            interval,
        }
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn interval(&self) -> &Interval {
        &self.interval
    }

    pub fn contains(&self, x: f64) -> bool {
        self.interval.contains(x)
    }

    /// Value of the expression, only where the branch is defined.
    pub fn evaluate(&self, x: f64) -> Option<f64> {
        self.contains(x).then(|| self.expr.evaluate(x))
    }

    pub fn try_evaluate(&self, x: f64) -> Result<f64> {
        if !self.contains(x) {
            return Err(SplineError::OutOfDomain {
                x,
                lower: self.interval.lower,
                upper: self.interval.upper,
            });
        }
        self.expr.try_evaluate(x)
    }

    pub fn derivative(&self) -> Self {
        Self::new(self.expr.derivative(), self.interval)
    }

    /// Branch of `x ↦ f(map(x))`.
    pub fn compose(&self, map: &Affine) -> Self {
        Self::new(self.expr.compose(map), self.interval.pullback(map))
    }

    pub fn shift(&self, h: f64) -> Self {
        self.compose(&Affine::translation(h))
    }

    pub fn scale(&self, c: f64) -> Result<Self> {
        Ok(self.compose(&Affine::scaling(c)?))
    }

    pub(crate) fn with_expr(&self, expr: Expr) -> Self {
        Self::new(expr, self.interval)
    }

    pub(crate) fn interval_mut(&mut self) -> &mut Interval {
        &mut self.interval
    }

    pub fn to_latex(&self) -> String {
        format!("{} & {}", self.expr.to_latex(), self.interval.to_latex())
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.expr, self.interval)
    }
}
