use std::fmt;
use std::sync::Arc;

use spline_core::Result;
use spline_piecewise::{Interval, Piecewise};

use crate::cache::CacheKey;
use crate::{BSplineEngine, Knotvector};

/// Where a basis function comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum BasisSource {
    Cardinal,
    NonUniform(Knotvector),
    /// Knot vector and one positive weight per basis function.
    Rational(Knotvector, Vec<f64>),
}

/// A basis function, or one of its derivatives, with the engine that built it.
///
/// The underlying piecewise expression is shared with the engine's cache.
#[derive(Debug, Clone)]
pub struct BasisFunction {
    engine: BSplineEngine,
    source: BasisSource,
    degree: usize,
    index: usize,
    derivative: usize,
    function: Arc<Piecewise>,
}

impl BasisFunction {
    pub(crate) fn new(
        engine: BSplineEngine,
        source: BasisSource,
        degree: usize,
        index: usize,
        derivative: usize,
        function: Arc<Piecewise>,
    ) -> Self {
        Self {
            engine,
            source,
            degree,
            index,
            derivative,
            function,
        }
    }

    /// Value at `x`; zero outside the support.
    pub fn evaluate(&self, x: f64) -> f64 {
        self.function.evaluate(x)
    }

    pub fn evaluate_many(&self, xs: &[f64]) -> Vec<f64> {
        self.function
            .evaluate_many_with(xs, self.engine.config().parallel_threshold)
    }

    /// Checked evaluation following the engine's out-of-domain policy.
    pub fn try_evaluate(&self, x: f64) -> Result<f64> {
        self.function
            .try_evaluate(x, self.engine.config().out_of_domain)
    }

    /// The `order`-th derivative of this function, built through the cache.
    pub fn diff(&self, order: usize) -> Result<BasisFunction> {
        let derivative = self.derivative + order;
        match &self.source {
            BasisSource::Cardinal => self.engine.cardinal_derivative(self.degree, derivative),
            BasisSource::NonUniform(kv) => {
                self.engine
                    .non_uniform_derivative(kv, self.degree, self.index, derivative)
            }
            BasisSource::Rational(kv, weights) => {
                self.engine
                    .rational_derivative(kv, weights, self.index, derivative)
            }
        }
    }

    pub fn piecewise(&self) -> &Piecewise {
        &self.function
    }

    pub fn shared(&self) -> Arc<Piecewise> {
        Arc::clone(&self.function)
    }

    pub fn source(&self) -> &BasisSource {
        &self.source
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Derivative order, zero for the basis function itself.
    pub fn derivative(&self) -> usize {
        self.derivative
    }

    /// Closure of the non-zero branches, or `None` for the zero function.
    pub fn support(&self) -> Option<Interval> {
        let branches = self.function.branches();
        let first = branches.iter().find(|b| !b.expr().is_zero())?;
        let last = branches.iter().rev().find(|b| !b.expr().is_zero())?;
        Some(Interval {
            lower: first.interval().lower,
            upper: last.interval().upper,
            closed_lower: true,
            closed_upper: true,
        })
    }

    /// Signed value of largest magnitude.
    pub fn extreme(&self) -> Option<f64> {
        self.function.extreme()
    }

    /// The function scaled so that its extreme value is ±1.
    pub fn normalized(&self) -> Result<Piecewise> {
        self.function.normalized(self.engine.config().tolerance)
    }

    pub fn key(&self) -> CacheKey {
        match &self.source {
            BasisSource::Cardinal => CacheKey::cardinal(self.degree, self.derivative),
            BasisSource::NonUniform(kv) => {
                CacheKey::non_uniform(kv, self.degree, self.index, self.derivative)
            }
            BasisSource::Rational(kv, weights) => {
                CacheKey::rational(kv, weights, self.index, self.derivative)
            }
        }
    }

    pub fn to_latex(&self) -> String {
        self.function.to_latex()
    }
}

impl PartialEq for BasisFunction {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key() && self.function == other.function
    }
}

impl fmt::Display for BasisFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.key())?;
        write!(f, "{}", self.function)
    }
}
