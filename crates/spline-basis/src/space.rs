//! All basis functions of one knot vector.

use nalgebra::DMatrix;
use rayon::prelude::*;
use spline_core::Result;

use crate::{BSplineEngine, BasisFunction, Knotvector};

/// The spline space spanned by `N_{0,p} .. N_{n-1,p}` (or their derivatives).
#[derive(Debug, Clone)]
pub struct BSplineSpace {
    knots: Knotvector,
    derivative: usize,
    functions: Vec<BasisFunction>,
}

impl BSplineSpace {
    pub fn new(engine: &BSplineEngine, knots: &Knotvector) -> Result<Self> {
        let functions = (0..knots.basis_count())
            .map(|i| engine.non_uniform(knots, knots.degree(), i))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            knots: knots.clone(),
            derivative: 0,
            functions,
        })
    }

    /// Space of the `n`-th derivatives of the current functions.
    pub fn diff(&self, n: usize) -> Result<Self> {
        let functions = self
            .functions
            .iter()
            .map(|f| f.diff(n))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            knots: self.knots.clone(),
            derivative: self.derivative + n,
            functions,
        })
    }

    pub fn knots(&self) -> &Knotvector {
        &self.knots
    }

    pub fn derivative(&self) -> usize {
        self.derivative
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn functions(&self) -> &[BasisFunction] {
        &self.functions
    }

    pub fn get(&self, index: usize) -> Option<&BasisFunction> {
        self.functions.get(index)
    }

    /// Values of every function at `x`.
    pub fn evaluate(&self, x: f64) -> Vec<f64> {
        self.functions.iter().map(|f| f.evaluate(x)).collect()
    }

    /// `Σ_i N_i(x)`; one everywhere in the domain for the undifferentiated space.
    pub fn partition_sum(&self, x: f64) -> f64 {
        self.functions.iter().map(|f| f.evaluate(x)).sum()
    }

    /// Matrix `A[(r, c)] = N_c(xs[r])`, one column per function.
    pub fn collocation_matrix(&self, xs: &[f64]) -> DMatrix<f64> {
        let columns: Vec<Vec<f64>> = self
            .functions
            .par_iter()
            .map(|f| xs.iter().map(|&x| f.evaluate(x)).collect())
            .collect();
        DMatrix::from_fn(xs.len(), self.functions.len(), |r, c| columns[c][r])
    }
}
