//! Weighted control polygons and their refinement by knot insertion.

use log::debug;
use nalgebra::{DMatrix, Point3, Vector4};
use spline_core::{Result, SplineError};

use crate::{BSplineSpace, Knotvector};

/// Control points of a rational curve, stored homogeneously as
/// `(w·x, w·y, w·z, w)` so that refinement is linear.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlPolygon {
    points: Vec<Vector4<f64>>,
}

impl ControlPolygon {
    /// One positive, finite weight per point.
    pub fn new(points: &[Point3<f64>], weights: &[f64]) -> Result<Self> {
        if points.len() != weights.len() {
            return Err(SplineError::InvalidArgument(format!(
                "{} control points but {} weights",
                points.len(),
                weights.len()
            )));
        }
        if let Some(w) = weights.iter().find(|w| !(w.is_finite() && **w > 0.0)) {
            return Err(SplineError::InvalidArgument(format!(
                "control point weights must be positive and finite, got {w}"
            )));
        }
        let points = points
            .iter()
            .zip(weights)
            .map(|(p, &w)| Vector4::new(w * p.x, w * p.y, w * p.z, w))
            .collect();
        Self::from_homogeneous(points)
    }

    /// Polygon with unit weights.
    pub fn polynomial(points: &[Point3<f64>]) -> Result<Self> {
        Self::new(points, &vec![1.0; points.len()])
    }

    pub fn from_homogeneous(points: Vec<Vector4<f64>>) -> Result<Self> {
        if points.is_empty() {
            return Err(SplineError::InvalidArgument(
                "a control polygon needs at least one point".into(),
            ));
        }
        if let Some(p) = points.iter().find(|p| !(p.w.is_finite() && p.w > 0.0)) {
            return Err(SplineError::InvalidArgument(format!(
                "homogeneous weight must be positive and finite, got {}",
                p.w
            )));
        }
        Ok(Self { points })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn homogeneous(&self) -> &[Vector4<f64>] {
        &self.points
    }

    pub fn weights(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.w).collect()
    }

    /// Cartesian control points, each homogeneous point divided by its weight.
    pub fn project(&self) -> Vec<Point3<f64>> {
        self.points.iter().map(project_point).collect()
    }

    /// Homogeneous points as the rows of an `n × 4` matrix.
    pub fn to_matrix(&self) -> DMatrix<f64> {
        DMatrix::from_fn(self.points.len(), 4, |r, c| self.points[r][c])
    }

    /// Control polygon of the same curve over `fine`, a knot vector that
    /// contains every knot of `coarse` (with multiplicity) at the same degree.
    ///
    /// The extra knots are inserted one at a time (Boehm).
    pub fn refine(&self, coarse: &Knotvector, fine: &Knotvector) -> Result<Self> {
        if self.len() != coarse.basis_count() {
            return Err(SplineError::InvalidArgument(format!(
                "{} control points for {} basis functions",
                self.len(),
                coarse.basis_count()
            )));
        }
        if coarse.degree() != fine.degree() {
            return Err(SplineError::InvalidArgument(format!(
                "cannot refine degree {} to degree {} by knot insertion",
                coarse.degree(),
                fine.degree()
            )));
        }
        let inserted = knot_difference(coarse.knots(), fine.knots())?;
        debug!(
            "refining {} control points with {} new knots",
            self.len(),
            inserted.len()
        );

        let p = coarse.degree();
        let mut current = coarse.clone();
        let mut points = self.points.clone();
        for u in inserted {
            let k = match current.find_span(u) {
                Some(k) if k >= p && current.domain().contains(u) => k,
                _ => {
                    return Err(SplineError::InvalidArgument(format!(
                        "knot {u} lies outside the domain {}",
                        current.domain()
                    )))
                }
            };
            let t = current.knots();
            let refined: Vec<Vector4<f64>> = (0..=points.len())
                .map(|i| {
                    if i + p <= k {
                        points[i]
                    } else if i <= k {
                        let span = t[i + p] - t[i];
                        let a = if span == 0.0 { 0.0 } else { (u - t[i]) / span };
                        points[i] * a + points[i - 1] * (1.0 - a)
                    } else {
                        points[i - 1]
                    }
                })
                .collect();
            current.insert_knots(&[u])?;
            points = refined;
        }
        Self::from_homogeneous(points)
    }

    /// Curve points `Σ N_i w_i P_i / Σ N_i w_i` at each of `xs`.
    pub fn evaluate(&self, space: &BSplineSpace, xs: &[f64]) -> Result<Vec<Point3<f64>>> {
        if space.len() != self.len() || space.derivative() != 0 {
            return Err(SplineError::InvalidArgument(format!(
                "{} control points do not match a space of {} functions (derivative {})",
                self.len(),
                space.len(),
                space.derivative()
            )));
        }
        let values = space.collocation_matrix(xs) * self.to_matrix();
        let domain = space.knots().domain();
        xs.iter()
            .enumerate()
            .map(|(r, &x)| {
                let row = values.row(r);
                let h = Vector4::new(row[0], row[1], row[2], row[3]);
                if h.w > 0.0 {
                    Ok(project_point(&h))
                } else {
                    Err(SplineError::OutOfDomain {
                        x,
                        lower: domain.lower,
                        upper: domain.upper,
                    })
                }
            })
            .collect()
    }
}

fn project_point(h: &Vector4<f64>) -> Point3<f64> {
    Point3::new(h.x / h.w, h.y / h.w, h.z / h.w)
}

/// Knots of `fine` left over after matching every knot of `coarse`.
fn knot_difference(coarse: &[f64], fine: &[f64]) -> Result<Vec<f64>> {
    let mut extra = Vec::with_capacity(fine.len().saturating_sub(coarse.len()));
    let mut remaining = coarse.iter().peekable();
    for &t in fine {
        match remaining.peek() {
            Some(&&c) if c == t => {
                remaining.next();
            }
            Some(&&c) if c < t => break,
            _ => extra.push(t),
        }
    }
    if let Some(c) = remaining.next() {
        return Err(SplineError::InvalidArgument(format!(
            "fine knot vector is missing knot {c} of the coarse one"
        )));
    }
    Ok(extra)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BSplineEngine;
    use approx::assert_relative_eq;

    fn square() -> Vec<Point3<f64>> {
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 1.0),
        ]
    }

    #[test]
    fn test_project_and_weights() {
        let polygon = ControlPolygon::new(&square(), &[1.0, 0.5, 2.0, 1.0]).unwrap();
        assert_eq!(polygon.weights(), vec![1.0, 0.5, 2.0, 1.0]);
        assert_eq!(polygon.homogeneous()[2], Vector4::new(2.0, 2.0, 0.0, 2.0));
        for (a, b) in polygon.project().iter().zip(square()) {
            assert_relative_eq!(*a, b, epsilon = 1e-15);
        }
        assert_eq!(polygon.to_matrix().shape(), (4, 4));
    }

    #[test]
    fn test_invalid_polygons() {
        assert!(ControlPolygon::new(&square(), &[1.0, 1.0]).is_err());
        assert!(ControlPolygon::new(&square(), &[1.0, 0.0, 1.0, 1.0]).is_err());
        assert!(ControlPolygon::polynomial(&[]).is_err());
    }

    #[test]
    fn test_knot_difference() {
        let extra = knot_difference(&[0.0, 0.0, 1.0, 1.0], &[0.0, 0.0, 0.5, 0.5, 1.0, 1.0]).unwrap();
        assert_eq!(extra, vec![0.5, 0.5]);
        assert!(knot_difference(&[0.0, 0.3, 1.0], &[0.0, 0.5, 1.0]).is_err());
        assert!(knot_difference(&[0.0, 0.0, 1.0], &[0.0, 1.0, 1.0]).is_err());
    }

    #[test]
    fn test_single_insertion_keeps_line() {
        // a straight line stays on the line after inserting a knot
        let coarse = Knotvector::clamped(1, (0.0, 1.0)).unwrap();
        let fine = Knotvector::new(1, vec![0.0, 0.0, 0.25, 1.0, 1.0]).unwrap();
        let line = ControlPolygon::polynomial(&[Point3::new(0.0, 0.0, 0.0), Point3::new(4.0, 2.0, 0.0)])
            .unwrap();
        let refined = line.refine(&coarse, &fine).unwrap();
        assert_eq!(refined.len(), 3);
        assert_relative_eq!(refined.project()[1], Point3::new(1.0, 0.5, 0.0), epsilon = 1e-15);
    }

    #[test]
    fn test_refine_rejects_mismatch() {
        let coarse = Knotvector::clamped(2, (0.0, 1.0)).unwrap();
        let polygon = ControlPolygon::polynomial(&square()[..3]).unwrap();
        let raised = Knotvector::clamped(3, (0.0, 1.0)).unwrap();
        assert!(polygon.refine(&coarse, &raised).is_err());
        let unrelated = Knotvector::new(2, vec![0.0, 0.0, 0.0, 0.5, 0.9, 0.9, 0.9]).unwrap();
        assert!(polygon.refine(&coarse, &unrelated).is_err());
        assert!(ControlPolygon::polynomial(&square())
            .unwrap()
            .refine(&coarse, &coarse)
            .is_err());
    }

    #[test]
    fn test_evaluate_needs_matching_space() {
        let engine = BSplineEngine::default();
        let kv = Knotvector::clamped(2, (0.0, 1.0)).unwrap();
        let space = BSplineSpace::new(&engine, &kv).unwrap();
        let polygon = ControlPolygon::polynomial(&square()).unwrap();
        assert!(polygon.evaluate(&space, &[0.5]).is_err());

        let polygon = ControlPolygon::polynomial(&square()[..3]).unwrap();
        let ends = polygon.evaluate(&space, &[0.0, 1.0]).unwrap();
        assert_relative_eq!(ends[0], square()[0], epsilon = 1e-15);
        assert_relative_eq!(ends[1], square()[2], epsilon = 1e-15);
        assert!(matches!(
            polygon.evaluate(&space, &[2.0]),
            Err(SplineError::OutOfDomain { .. })
        ));
    }
}
