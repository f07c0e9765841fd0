//! Knot vectors: the non-decreasing parameter values that drive the recursion.

use std::fmt;
use std::iter;

use serde::{Deserialize, Serialize};
use spline_core::{Result, SplineError};
use spline_piecewise::{Closure, Interval};

/// How `Knotvector::refine` inserts knots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefineMethod {
    /// Insert the midpoint of every non-empty span once.
    Bisect,
    /// Insert every midpoint `degree` times (C0 joints).
    H,
    /// Raise the degree by one and repeat every distinct knot once more.
    P,
}

/// Knot values together with the polynomial degree and the declared domain.
///
/// The knot values may be replaced after construction; every mutation is
/// re-validated. Cache identity is always taken from the current values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "KnotvectorRepr")]
pub struct Knotvector {
    degree: usize,
    knots: Vec<f64>,
    domain: Interval,
}

#[derive(Deserialize)]
struct KnotvectorRepr {
    degree: usize,
    knots: Vec<f64>,
    domain: Interval,
}

impl TryFrom<KnotvectorRepr> for Knotvector {
    type Error = SplineError;

    fn try_from(repr: KnotvectorRepr) -> Result<Self> {
        Knotvector::with_domain(repr.degree, repr.knots, repr.domain)
    }
}

impl Knotvector {
    /// Clamped knot vector: `degree + 1` copies of each end of the domain.
    pub fn clamped(degree: usize, domain: (f64, f64)) -> Result<Self> {
        let (a, b) = domain;
        if !(a.is_finite() && b.is_finite() && a < b) {
            return Err(SplineError::InvalidArgument(format!(
                "clamped knot vector needs a finite domain with a < b, got ({a}, {b})"
            )));
        }
        let knots = iter::repeat(a)
            .take(degree + 1)
            .chain(iter::repeat(b).take(degree + 1))
            .collect();
        Self::new(degree, knots)
    }

    /// Knot vector over the standard domain `[t_p, t_{n}]`, closed at both ends.
    pub fn new(degree: usize, knots: Vec<f64>) -> Result<Self> {
        validate_knots(degree, &knots)?;
        let lower = knots[degree];
        let upper = knots[knots.len() - degree - 1];
        let domain = Interval::new(lower, upper, Closure::ClosedClosed)?;
        Self::with_domain(degree, knots, domain)
    }

    /// Knot vector with an explicit domain. The domain must be non-empty and
    /// lie inside `[t_p, t_{n}]`, where the basis is a partition of unity.
    pub fn with_domain(degree: usize, knots: Vec<f64>, domain: Interval) -> Result<Self> {
        validate_knots(degree, &knots)?;
        check_domain(degree, &knots, &domain)?;
        Ok(Self {
            degree,
            knots,
            domain,
        })
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    pub fn len(&self) -> usize {
        self.knots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.knots.is_empty()
    }

    pub fn domain(&self) -> &Interval {
        &self.domain
    }

    pub fn closure(&self) -> Closure {
        self.domain.closure()
    }

    /// Number of basis functions of the knot vector's own degree.
    pub fn basis_count(&self) -> usize {
        self.knots.len() - self.degree - 1
    }

    /// Number of basis functions of `degree` over these knots, if any.
    pub fn basis_count_for(&self, degree: usize) -> Option<usize> {
        self.knots
            .len()
            .checked_sub(degree + 1)
            .filter(|&count| count > 0)
    }

    /// Distinct knot values with their multiplicities.
    pub fn unique_knots(&self) -> Vec<(f64, usize)> {
        let mut unique: Vec<(f64, usize)> = Vec::new();
        for &t in &self.knots {
            match unique.last_mut() {
                Some((value, count)) if *value == t => *count += 1,
                _ => unique.push((t, 1)),
            }
        }
        unique
    }

    pub fn multiplicity(&self, value: f64) -> usize {
        self.knots.iter().filter(|&&t| t == value).count()
    }

    /// Copies of `t_k` at indices `<= k`.
    pub fn left_multiplicity(&self, k: usize) -> usize {
        let Some(&value) = self.knots.get(k) else {
            return 0;
        };
        self.knots[..=k].iter().rev().take_while(|&&t| t == value).count()
    }

    /// Copies of `t_k` at indices `>= k`.
    pub fn right_multiplicity(&self, k: usize) -> usize {
        let Some(&value) = self.knots.get(k) else {
            return 0;
        };
        self.knots[k..].iter().take_while(|&&t| t == value).count()
    }

    pub fn is_clamped(&self) -> bool {
        let p = self.degree;
        let first = self.knots[0];
        let last = self.knots[self.knots.len() - 1];
        self.knots[..=p].iter().all(|&t| t == first)
            && self.knots[self.knots.len() - p - 1..].iter().all(|&t| t == last)
    }

    /// Find the knot span index `k` with `t_k <= x < t_{k+1}`.
    ///
    /// At the last knot value the last non-empty span is returned; outside
    /// `[t_0, t_last]` there is no span.
    pub fn find_span(&self, x: f64) -> Option<usize> {
        let t = &self.knots;
        let last = t[t.len() - 1];
        if !(x >= t[0] && x <= last) {
            return None;
        }
        if x == last {
            return t.windows(2).rposition(|w| w[0] < w[1]);
        }
        Some(t.partition_point(|&k| k <= x) - 1)
    }

    /// Numeric evaluation of the `degree + 1` basis functions that do not
    /// vanish at `x` (de Boor triangle).
    ///
    /// Returns the span `k` and the values of `N_{k-p,p}(x) ..= N_{k,p}(x)`,
    /// or `None` outside the domain.
    pub fn nonzero_basis(&self, x: f64) -> Option<(usize, Vec<f64>)> {
        if !self.domain.contains(x) {
            return None;
        }
        let p = self.degree;
        let knots = &self.knots;
        let last_span = knots.len() - p - 2;
        let span = match self.find_span(x) {
            Some(k) if k <= last_span => k,
            _ => knots[..last_span + 2]
                .windows(2)
                .rposition(|w| w[0] < w[1])?,
        };

        let mut n = vec![0.0; p + 1];
        let mut left = vec![0.0; p + 1];
        let mut right = vec![0.0; p + 1];
        n[0] = 1.0;

        for j in 1..=p {
            left[j] = x - knots[span + 1 - j];
            right[j] = knots[span + j] - x;
            let mut saved = 0.0;

            for r in 0..j {
                let temp = n[r] / (right[r + 1] + left[j - r]);
                n[r] = saved + right[r + 1] * temp;
                saved = left[j - r] * temp;
            }

            n[j] = saved;
        }

        Some((span, n))
    }

    /// Replace every knot value. Degree and domain stay fixed.
    pub fn set_knots(&mut self, knots: Vec<f64>) -> Result<()> {
        validate_knots(self.degree, &knots)?;
        check_domain(self.degree, &knots, &self.domain)?;
        self.knots = knots;
        Ok(())
    }

    pub fn set_knot(&mut self, index: usize, value: f64) -> Result<()> {
        if index >= self.knots.len() {
            return Err(SplineError::InvalidArgument(format!(
                "knot index {index} out of range for {} knots",
                self.knots.len()
            )));
        }
        let mut knots = self.knots.clone();
        knots[index] = value;
        self.set_knots(knots)
    }

    /// Insert knot values, which must lie inside the domain.
    pub fn insert_knots(&mut self, values: &[f64]) -> Result<()> {
        if let Some(&v) = values
            .iter()
            .find(|&&v| !(v >= self.domain.lower && v <= self.domain.upper))
        {
            return Err(SplineError::InvalidArgument(format!(
                "knot {v} not in domain {}",
                self.domain
            )));
        }
        let mut knots = self.knots.clone();
        knots.extend_from_slice(values);
        knots.sort_by(f64::total_cmp);
        self.set_knots(knots)
    }

    pub fn refine(&mut self, times: usize, method: RefineMethod) -> Result<()> {
        for _ in 0..times {
            match method {
                RefineMethod::Bisect => {
                    let midpoints = self.span_midpoints();
                    self.insert_knots(&midpoints)?;
                }
                RefineMethod::H => {
                    let copies = self.degree.max(1);
                    let midpoints: Vec<f64> = self
                        .span_midpoints()
                        .into_iter()
                        .flat_map(|m| iter::repeat(m).take(copies))
                        .collect();
                    self.insert_knots(&midpoints)?;
                }
                RefineMethod::P => {
                    let mut knots = self.knots.clone();
                    knots.extend(self.unique_knots().into_iter().map(|(v, _)| v));
                    knots.sort_by(f64::total_cmp);
                    validate_knots(self.degree + 1, &knots)?;
                    check_domain(self.degree + 1, &knots, &self.domain)?;
                    self.degree += 1;
                    self.knots = knots;
                }
            }
        }
        Ok(())
    }

    fn span_midpoints(&self) -> Vec<f64> {
        self.knots
            .windows(2)
            .filter(|w| w[0] < w[1] && w[0] >= self.domain.lower && w[1] <= self.domain.upper)
            .map(|w| 0.5 * (w[0] + w[1]))
            .collect()
    }
}

fn validate_knots(degree: usize, knots: &[f64]) -> Result<()> {
    if let Some(t) = knots.iter().find(|t| !t.is_finite()) {
        return Err(SplineError::InvalidKnotSequence(format!(
            "knot values must be finite, got {t}"
        )));
    }
    if let Some(k) = knots.windows(2).position(|w| w[1] < w[0]) {
        return Err(SplineError::InvalidKnotSequence(format!(
            "knots must be non-decreasing: t[{}] = {} > t[{}] = {}",
            k,
            knots[k],
            k + 1,
            knots[k + 1]
        )));
    }
    let needed = degree.saturating_add(2);
    if knots.len() < needed {
        return Err(SplineError::InvalidArgument(format!(
            "degree {degree} needs at least {needed} knots, got {}",
            knots.len()
        )));
    }
    Ok(())
}

fn check_domain(degree: usize, knots: &[f64], domain: &Interval) -> Result<()> {
    let lower = knots[degree];
    let upper = knots[knots.len() - degree - 1];
    if !(domain.lower < domain.upper && domain.lower >= lower && domain.upper <= upper) {
        return Err(SplineError::InvalidArgument(format!(
            "domain {domain} must be non-empty and inside [{lower}, {upper}]"
        )));
    }
    Ok(())
}

impl fmt::Display for Knotvector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let knots: Vec<String> = self.knots.iter().map(|t| t.to_string()).collect();
        write!(
            f,
            "degree {} knots [{}] on {}",
            self.degree,
            knots.join(", "),
            self.domain
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_clamped_construction() {
        let kv = Knotvector::clamped(2, (0.0, 1.0)).unwrap();
        assert_eq!(kv.knots(), &[0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
        assert_eq!(kv.basis_count(), 3);
        assert!(kv.is_clamped());
        assert_eq!(kv.closure(), Closure::ClosedClosed);
        assert!(Knotvector::clamped(2, (1.0, 1.0)).is_err());
    }

    #[test]
    fn test_decreasing_knots_rejected() {
        assert!(matches!(
            Knotvector::new(1, vec![0.0, 1.0, 0.5, 2.0]),
            Err(SplineError::InvalidKnotSequence(_))
        ));
        assert!(matches!(
            Knotvector::new(1, vec![0.0, f64::NAN, 2.0]),
            Err(SplineError::InvalidKnotSequence(_))
        ));
        assert!(matches!(
            Knotvector::new(3, vec![0.0, 1.0, 2.0]),
            Err(SplineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_multiplicities() {
        let kv = Knotvector::new(2, vec![0.0, 0.0, 0.0, 0.5, 0.5, 1.0, 1.0, 1.0]).unwrap();
        assert_eq!(kv.unique_knots(), vec![(0.0, 3), (0.5, 2), (1.0, 3)]);
        assert_eq!(kv.multiplicity(0.5), 2);
        assert_eq!(kv.multiplicity(0.7), 0);
        assert_eq!(kv.left_multiplicity(4), 2);
        assert_eq!(kv.right_multiplicity(4), 1);
        assert_eq!(kv.right_multiplicity(0), 3);
        assert_eq!(kv.left_multiplicity(42), 0);
    }

    #[test]
    fn test_find_span_uniform() {
        let kv = Knotvector::new(2, vec![0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 3.0, 3.0]).unwrap();

        assert_eq!(kv.find_span(0.0), Some(2));
        assert_eq!(kv.find_span(0.5), Some(2));
        assert_eq!(kv.find_span(1.0), Some(3));
        assert_eq!(kv.find_span(1.5), Some(3));
        assert_eq!(kv.find_span(2.5), Some(4));
        assert_eq!(kv.find_span(3.0), Some(4));
        assert_eq!(kv.find_span(3.5), None);
    }

    #[test]
    fn test_nonzero_basis_partition_of_unity() {
        let kv = Knotvector::new(2, vec![0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 3.0, 3.0]).unwrap();

        for &x in &[0.0, 0.5, 1.0, 1.5, 2.0, 2.5, 3.0] {
            let (_, basis) = kv.nonzero_basis(x).unwrap();
            let sum: f64 = basis.iter().sum();
            assert!(
                (sum - 1.0).abs() < 1e-12,
                "Partition of unity failed at x={}: sum={}",
                x,
                sum
            );
        }
        assert!(kv.nonzero_basis(-0.1).is_none());
    }

    #[test]
    fn test_nonzero_basis_non_negative() {
        let kv = Knotvector::clamped(3, (0.0, 1.0)).unwrap();

        for i in 0..=20 {
            let x = i as f64 / 20.0;
            let (_, basis) = kv.nonzero_basis(x).unwrap();
            for (j, &val) in basis.iter().enumerate() {
                assert!(val >= -1e-15, "Negative basis at x={}, j={}: {}", x, j, val);
            }
        }
    }

    #[test]
    fn test_nonzero_basis_at_repeated_upper_knot() {
        let kv = Knotvector::new(2, vec![0.0, 0.0, 0.0, 0.5, 1.0, 1.0, 1.0, 2.0]).unwrap();
        assert_eq!(*kv.domain(), Interval::closed(0.0, 1.0).unwrap());
        let (span, basis) = kv.nonzero_basis(1.0).unwrap();
        assert_eq!(span, 3);
        assert_relative_eq!(basis.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_set_knot_revalidates() {
        let mut kv = Knotvector::new(1, vec![0.0, 0.0, 0.5, 1.0, 1.0]).unwrap();
        kv.set_knot(2, 0.25).unwrap();
        assert_eq!(kv.knots()[2], 0.25);
        assert!(matches!(
            kv.set_knot(2, 1.5),
            Err(SplineError::InvalidKnotSequence(_))
        ));
        assert_eq!(kv.knots()[2], 0.25);
        assert!(kv.set_knot(9, 0.0).is_err());
    }

    #[test]
    fn test_insert_knots() {
        let mut kv = Knotvector::clamped(2, (0.0, 1.0)).unwrap();
        kv.insert_knots(&[0.7, 0.3]).unwrap();
        assert_eq!(kv.knots(), &[0.0, 0.0, 0.0, 0.3, 0.7, 1.0, 1.0, 1.0]);
        assert_eq!(kv.basis_count(), 5);
        assert!(kv.insert_knots(&[1.5]).is_err());
    }

    #[test]
    fn test_refine_methods() {
        let mut bisect = Knotvector::clamped(2, (0.0, 1.0)).unwrap();
        bisect.refine(2, RefineMethod::Bisect).unwrap();
        assert_eq!(
            bisect.knots(),
            &[0.0, 0.0, 0.0, 0.25, 0.5, 0.75, 1.0, 1.0, 1.0]
        );

        let mut h = Knotvector::clamped(2, (0.0, 1.0)).unwrap();
        h.refine(1, RefineMethod::H).unwrap();
        assert_eq!(h.multiplicity(0.5), 2);

        let mut p = Knotvector::clamped(2, (0.0, 1.0)).unwrap();
        p.refine(1, RefineMethod::P).unwrap();
        assert_eq!(p.degree(), 3);
        assert!(p.is_clamped());
        assert_eq!(p.basis_count(), 4);
    }

    #[test]
    fn test_domain_outside_valid_range_rejected() {
        let knots = vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        assert!(Knotvector::with_domain(2, knots.clone(), Interval::closed(1.0, 3.0).unwrap()).is_err());
        let kv = Knotvector::with_domain(2, knots, Interval::closed_open(2.0, 3.0).unwrap()).unwrap();
        assert_eq!(kv.closure(), Closure::ClosedOpen);
    }

    #[test]
    fn test_serde_revalidates() {
        let kv = Knotvector::new(2, vec![0.0, 0.0, 0.0, 0.4, 1.0, 1.0, 1.0]).unwrap();
        let json = serde_json::to_string(&kv).unwrap();
        assert_eq!(serde_json::from_str::<Knotvector>(&json).unwrap(), kv);

        let domain = r#"{"lower":0.0,"upper":1.0,"closed_lower":true,"closed_upper":true}"#;
        let decreasing = format!(r#"{{"degree":1,"knots":[0.0,1.0,0.5,1.0],"domain":{domain}}}"#);
        assert!(serde_json::from_str::<Knotvector>(&decreasing).is_err());
        let too_short = format!(r#"{{"degree":5,"knots":[0.0,0.5,1.0],"domain":{domain}}}"#);
        assert!(serde_json::from_str::<Knotvector>(&too_short).is_err());
        let outside = format!(r#"{{"degree":1,"knots":[0.0,0.0,0.5,0.5],"domain":{domain}}}"#);
        assert!(serde_json::from_str::<Knotvector>(&outside).is_err());
    }

    #[test]
    fn test_huge_degree_rejected() {
        assert!(matches!(
            Knotvector::with_domain(usize::MAX, vec![0.0, 1.0], Interval::closed(0.0, 1.0).unwrap()),
            Err(SplineError::InvalidArgument(_))
        ));
    }
}
