use crate::error::Result;

/// Validate structural invariants of a value (coverage, ordering, ...).
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Shared algebra of univariate expressions: polynomials, rational functions
/// and the branch expressions built from them.
///
/// Every method is pure. Cached values are shared between callers, so a
/// derivative or a recentered copy must never alias the receiver.
pub trait Univariate: Clone {
    /// Evaluate at `x`. Rational expressions follow IEEE semantics where the
    /// denominator vanishes.
    fn evaluate(&self, x: f64) -> f64;

    fn derivative(&self) -> Self;

    /// Substitute `x ↦ x + h`.
    fn shift(&self, h: f64) -> Self;

    /// Substitute `x ↦ c·x`.
    fn scale(&self, c: f64) -> Self;

    fn is_zero(&self) -> bool;

    fn to_latex(&self) -> String;

    fn nth_derivative(&self, n: usize) -> Self {
        let mut result = self.clone();
        for _ in 0..n {
            result = result.derivative();
        }
        result
    }

    fn evaluate_many(&self, xs: &[f64]) -> Vec<f64> {
        xs.iter().map(|&x| self.evaluate(x)).collect()
    }
}
