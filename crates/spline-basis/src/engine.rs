//! Cox-de Boor construction of basis functions as exact piecewise
//! expressions, memoized through a shared [`BasisCache`].
//!
//! Every intermediate function (lower degrees, lower derivative orders) goes
//! through the cache, so building one high-degree basis leaves the whole
//! recursion triangle cached for its neighbours.

use std::sync::Arc;

use log::debug;
use spline_core::{Result, SplineError};
use spline_piecewise::{Expr, Interval, Piecewise, Polynomial};

use crate::basis::{BasisFunction, BasisSource};
use crate::cache::{BasisCache, CacheKey};
use crate::config::{DerivativeMethod, EngineConfig};
use crate::Knotvector;

#[derive(Debug, Clone, Default)]
pub struct BSplineEngine {
    cache: Arc<BasisCache>,
    config: EngineConfig,
}

impl BSplineEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_cache(Arc::new(BasisCache::new()), config)
    }

    /// Engine sharing an existing cache.
    pub fn with_cache(cache: Arc<BasisCache>, config: EngineConfig) -> Self {
        Self { cache, config }
    }

    pub fn cache(&self) -> &Arc<BasisCache> {
        &self.cache
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Cardinal B-spline of `degree` on the integer knots `0, 1, ..., degree + 1`.
    pub fn cardinal(&self, degree: usize) -> Result<BasisFunction> {
        self.cardinal_derivative(degree, 0)
    }

    pub fn cardinal_derivative(&self, degree: usize, derivative: usize) -> Result<BasisFunction> {
        let function = self.cardinal_piecewise(degree, derivative)?;
        Ok(BasisFunction::new(
            self.clone(),
            BasisSource::Cardinal,
            degree,
            0,
            derivative,
            function,
        ))
    }

    /// B-spline `N_{index, degree}` over the knots of `kv`.
    ///
    /// `degree` may differ from `kv.degree()`; the index must leave
    /// `degree + 1` spans after it.
    pub fn non_uniform(&self, kv: &Knotvector, degree: usize, index: usize) -> Result<BasisFunction> {
        self.non_uniform_derivative(kv, degree, index, 0)
    }

    pub fn non_uniform_derivative(
        &self,
        kv: &Knotvector,
        degree: usize,
        index: usize,
        derivative: usize,
    ) -> Result<BasisFunction> {
        let function = self.non_uniform_piecewise(kv, degree, index, derivative)?;
        Ok(BasisFunction::new(
            self.clone(),
            BasisSource::NonUniform(kv.clone()),
            degree,
            index,
            derivative,
            function,
        ))
    }

    /// NURBS basis `R_i = w_i N_i / Σ_j w_j N_j` of the knot vector's degree,
    /// restricted to its domain.
    pub fn rational(&self, kv: &Knotvector, weights: &[f64], index: usize) -> Result<BasisFunction> {
        self.rational_derivative(kv, weights, index, 0)
    }

    pub fn rational_derivative(
        &self,
        kv: &Knotvector,
        weights: &[f64],
        index: usize,
        derivative: usize,
    ) -> Result<BasisFunction> {
        let function = self.rational_piecewise(kv, weights, index, derivative)?;
        Ok(BasisFunction::new(
            self.clone(),
            BasisSource::Rational(kv.clone(), weights.to_vec()),
            kv.degree(),
            index,
            derivative,
            function,
        ))
    }

    pub(crate) fn cardinal_piecewise(&self, degree: usize, derivative: usize) -> Result<Arc<Piecewise>> {
        self.cache
            .get_or_create(CacheKey::cardinal(degree, derivative), || {
                if derivative > 0 {
                    if derivative > degree || self.config.derivative_method == DerivativeMethod::Direct {
                        return Ok(self.cardinal_piecewise(degree, derivative - 1)?.derivative());
                    }
                    // B_m^(k) = B_{m-1}^(k-1)(x) - B_{m-1}^(k-1)(x - 1)
                    let lower = self.cardinal_piecewise(degree - 1, derivative - 1)?;
                    return Ok(lower.sub(&lower.shift(-1.0)));
                }
                if degree == 0 {
                    return Ok(Piecewise::single(
                        Polynomial::one(),
                        Interval::closed_open(0.0, 1.0)?,
                    ));
                }
                debug!("cardinal recursion at degree {degree}");
                // B_m = x/m · B_{m-1}(x) + (m + 1 - x)/m · B_{m-1}(x - 1)
                let m = degree as f64;
                let lower = self.cardinal_piecewise(degree - 1, 0)?;
                let left = lower.mul_expr(&Expr::from(Polynomial::linear(1.0 / m, 0.0)));
                let right = lower
                    .shift(-1.0)
                    .mul_expr(&Expr::from(Polynomial::linear(-1.0 / m, (m + 1.0) / m)));
                Ok(left.add(&right))
            })
    }

    pub(crate) fn non_uniform_piecewise(
        &self,
        kv: &Knotvector,
        degree: usize,
        index: usize,
        derivative: usize,
    ) -> Result<Arc<Piecewise>> {
        let count = kv.basis_count_for(degree).unwrap_or(0);
        if index >= count {
            return Err(SplineError::InvalidArgument(format!(
                "basis index {index} out of range: {} knots give {count} functions of degree {degree}",
                kv.len()
            )));
        }

        let key = CacheKey::non_uniform(kv, degree, index, derivative);
        self.cache.get_or_create(key, || {
            let t = kv.knots();
            if derivative > 0 {
                if derivative > degree || self.config.derivative_method == DerivativeMethod::Direct {
                    return Ok(self
                        .non_uniform_piecewise(kv, degree, index, derivative - 1)?
                        .derivative());
                }
                // N^(k)_{i,m} = m (N^(k-1)_{i,m-1} / (t_{i+m} - t_i)
                //              - N^(k-1)_{i+1,m-1} / (t_{i+m+1} - t_{i+1}))
                let m = degree as f64;
                let left_span = t[index + degree] - t[index];
                let right_span = t[index + degree + 1] - t[index + 1];
                let left = if left_span == 0.0 {
                    Piecewise::zero()
                } else {
                    self.non_uniform_piecewise(kv, degree - 1, index, derivative - 1)?
                        .scaled(m / left_span)
                };
                let right = if right_span == 0.0 {
                    Piecewise::zero()
                } else {
                    self.non_uniform_piecewise(kv, degree - 1, index + 1, derivative - 1)?
                        .scaled(m / right_span)
                };
                return Ok(left.sub(&right));
            }

            if degree == 0 {
                return Ok(indicator(kv, index));
            }

            debug!("Cox-de Boor step: N_{{{index},{degree}}}");
            // Terms with a zero knot difference are dropped.
            let left_span = t[index + degree] - t[index];
            let right_span = t[index + degree + 1] - t[index + 1];
            let left = if left_span == 0.0 {
                Piecewise::zero()
            } else {
                let alpha = Polynomial::linear(1.0 / left_span, -t[index] / left_span);
                self.non_uniform_piecewise(kv, degree - 1, index, 0)?
                    .mul_expr(&Expr::from(alpha))
            };
            let right = if right_span == 0.0 {
                Piecewise::zero()
            } else {
                let end = t[index + degree + 1];
                let beta = Polynomial::linear(-1.0 / right_span, end / right_span);
                self.non_uniform_piecewise(kv, degree - 1, index + 1, 0)?
                    .mul_expr(&Expr::from(beta))
            };
            Ok(left.add(&right))
        })
    }

    pub(crate) fn rational_piecewise(
        &self,
        kv: &Knotvector,
        weights: &[f64],
        index: usize,
        derivative: usize,
    ) -> Result<Arc<Piecewise>> {
        let count = kv.basis_count();
        if weights.len() != count {
            return Err(SplineError::InvalidArgument(format!(
                "expected {count} weights, got {}",
                weights.len()
            )));
        }
        if let Some(w) = weights.iter().find(|w| !(w.is_finite() && **w > 0.0)) {
            return Err(SplineError::InvalidArgument(format!(
                "weights must be positive and finite, got {w}"
            )));
        }
        if index >= count {
            return Err(SplineError::InvalidArgument(format!(
                "basis index {index} out of range for {count} functions"
            )));
        }

        let key = CacheKey::rational(kv, weights, index, derivative);
        self.cache.get_or_create(key, || {
            if derivative > 0 {
                return Ok(self
                    .rational_piecewise(kv, weights, index, derivative - 1)?
                    .derivative());
            }
            let domain = kv.domain();
            let p = kv.degree();
            let mut weight_function = Piecewise::zero();
            for (j, &w) in weights.iter().enumerate() {
                let n = self.non_uniform_piecewise(kv, p, j, 0)?;
                weight_function = weight_function.add(&n.scaled(w));
            }
            let weight_function = weight_function.restrict(domain);
            let numerator = self
                .non_uniform_piecewise(kv, p, index, 0)?
                .scaled(weights[index])
                .restrict(domain);
            numerator.div(&weight_function)
        })
    }
}

/// Degree-zero basis: one on `[t_i, t_{i+1})`, zero elsewhere.
///
/// The span ending at the last knot is closed on the right when the domain
/// is, so the basis sums to one at the domain's upper end.
fn indicator(kv: &Knotvector, index: usize) -> Piecewise {
    let t = kv.knots();
    let (lower, upper) = (t[index], t[index + 1]);
    if lower == upper {
        return Piecewise::zero();
    }
    let domain = kv.domain();
    let closed_lower = lower != domain.lower || domain.closed_lower;
    let closed_upper = upper == domain.upper && domain.closed_upper && upper == t[t.len() - 1];
    let interval = Interval {
        lower,
        upper,
        closed_lower,
        closed_upper,
    };
    Piecewise::single(Polynomial::one(), interval)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn engine() -> BSplineEngine {
        BSplineEngine::default()
    }

    #[test]
    fn test_cardinal_quadratic() {
        let b2 = engine().cardinal(2).unwrap();
        assert_relative_eq!(b2.evaluate(1.5), 0.75, epsilon = 1e-14);
        assert_relative_eq!(b2.evaluate(0.5), 0.125, epsilon = 1e-14);
        assert_eq!(b2.evaluate(0.0), 0.0);
        assert_eq!(b2.evaluate(3.0), 0.0);
        assert_eq!(b2.evaluate(-1.0), 0.0);
        assert_eq!(b2.piecewise().branch_count(), 3);
    }

    #[test]
    fn test_cardinal_cubic_values() {
        let b3 = engine().cardinal(3).unwrap();
        assert_relative_eq!(b3.evaluate(1.0), 1.0 / 6.0, epsilon = 1e-14);
        assert_relative_eq!(b3.evaluate(2.0), 2.0 / 3.0, epsilon = 1e-14);
        assert_relative_eq!(b3.evaluate(3.0), 1.0 / 6.0, epsilon = 1e-14);
    }

    #[test]
    fn test_cardinal_derivative_matches_direct() {
        let recurrence = engine();
        let direct = BSplineEngine::new(EngineConfig {
            derivative_method: DerivativeMethod::Direct,
            ..EngineConfig::default()
        });
        for k in 0..=4 {
            let a = recurrence.cardinal_derivative(3, k).unwrap();
            let b = direct.cardinal_derivative(3, k).unwrap();
            for i in 0..=40 {
                let x = i as f64 * 0.1 + 0.05;
                assert_relative_eq!(a.evaluate(x), b.evaluate(x), epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_zero_length_span_is_zero() {
        let kv = Knotvector::clamped(2, (0.0, 1.0)).unwrap();
        let n = engine().non_uniform(&kv, 0, 0).unwrap();
        assert!(n.piecewise().is_identically_zero());
    }

    #[test]
    fn test_index_out_of_range() {
        let kv = Knotvector::clamped(2, (0.0, 1.0)).unwrap();
        assert!(matches!(
            engine().non_uniform(&kv, 2, 3),
            Err(SplineError::InvalidArgument(_))
        ));
        assert!(matches!(
            engine().non_uniform(&kv, 6, 0),
            Err(SplineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_clamped_quadratic_is_bernstein() {
        let kv = Knotvector::clamped(2, (0.0, 1.0)).unwrap();
        let e = engine();
        let n0 = e.non_uniform(&kv, 2, 0).unwrap();
        let n1 = e.non_uniform(&kv, 2, 1).unwrap();
        let n2 = e.non_uniform(&kv, 2, 2).unwrap();
        for i in 0..=10 {
            let x = i as f64 / 10.0;
            assert_relative_eq!(n0.evaluate(x), (1.0 - x).powi(2), epsilon = 1e-14);
            assert_relative_eq!(n1.evaluate(x), 2.0 * x * (1.0 - x), epsilon = 1e-14);
            assert_relative_eq!(n2.evaluate(x), x * x, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_recursion_is_cached() {
        let kv = Knotvector::clamped(3, (0.0, 1.0)).unwrap();
        let e = engine();
        e.non_uniform(&kv, 3, 0).unwrap();
        let built = e.cache().constructions();
        e.non_uniform(&kv, 3, 0).unwrap();
        e.non_uniform(&kv, 2, 1).unwrap();
        assert_eq!(e.cache().constructions(), built);
    }

    #[test]
    fn test_rational_weights_validated() {
        let kv = Knotvector::clamped(2, (0.0, 1.0)).unwrap();
        let e = engine();
        assert!(e.rational(&kv, &[1.0, 1.0], 0).is_err());
        assert!(e.rational(&kv, &[1.0, 0.0, 1.0], 0).is_err());
        assert!(e.rational(&kv, &[1.0, 1.0, 1.0], 3).is_err());
    }

    #[test]
    fn test_rational_quarter_circle_weights() {
        // Weights (1, √2/2, 1) give the quarter-circle NURBS basis
        let kv = Knotvector::clamped(2, (0.0, 1.0)).unwrap();
        let w = [1.0, std::f64::consts::FRAC_1_SQRT_2, 1.0];
        let e = engine();
        let r: Vec<BasisFunction> = (0..3).map(|i| e.rational(&kv, &w, i).unwrap()).collect();
        for i in 0..=10 {
            let x = i as f64 / 10.0;
            // point = R0·(1,0) + R1·(1,1) + R2·(0,1)
            let px = r[0].evaluate(x) + r[1].evaluate(x);
            let py = r[1].evaluate(x) + r[2].evaluate(x);
            assert_relative_eq!(px * px + py * py, 1.0, epsilon = 1e-12);
        }
    }
}
