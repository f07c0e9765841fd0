//! Piecewise functions: ordered branches covering one contiguous domain.

use std::fmt;
use std::ops::Neg;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use spline_core::{Result, SplineError, Tolerance, Validate};

use crate::{Affine, Branch, Closure, Expr, Interval};

/// Arrays at least this long are evaluated in parallel by `evaluate_many`.
pub const PARALLEL_THRESHOLD: usize = 4096;

/// What evaluation does outside the total domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutOfDomain {
    /// Compact support: the function vanishes outside its domain.
    #[default]
    Zero,
    /// Report `SplineError::OutOfDomain`.
    Error,
}

/// A function made of branches sorted by interval start.
///
/// Adjacent branches meet at a shared breakpoint and their union is a single
/// interval, the total domain. A function without branches is identically
/// zero and has no domain.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<Branch>", into = "Vec<Branch>")]
pub struct Piecewise {
    branches: Vec<Branch>,
}

impl Piecewise {
    /// Build from branches in any order, validating the coverage invariant.
    pub fn new(branches: Vec<Branch>) -> Result<Self> {
        Self::with_tolerance(branches, Tolerance::default())
    }

    pub fn with_tolerance(mut branches: Vec<Branch>, tolerance: Tolerance) -> Result<Self> {
        branches.sort_by(|a, b| {
            let (a, b) = (a.interval(), b.interval());
            a.lower.total_cmp(&b.lower).then(a.upper.total_cmp(&b.upper))
        });
        let function = Self { branches };
        function.check_coverage(tolerance)?;
        Ok(function)
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn single(expr: impl Into<Expr>, interval: Interval) -> Self {
        Self {
            branches: vec![Branch::new(expr, interval)],
        }
    }

    fn check_coverage(&self, tolerance: Tolerance) -> Result<()> {
        if let Some(b) = self.branches.iter().find(|b| b.interval().is_empty()) {
            return Err(SplineError::InvalidArgument(format!(
                "branch on empty interval {}",
                b.interval()
            )));
        }

        for pair in self.branches.windows(2) {
            let (prev, next) = (pair[0].interval(), pair[1].interval());
            if !tolerance.linear_eq(prev.upper, next.lower) {
                let (left, right) = (prev.upper, next.lower);
                return Err(if right > left {
                    SplineError::DomainGap { left, right }
                } else {
                    SplineError::DomainOverlap { left, right }
                });
            }
            // Both ends open leaves the shared point uncovered
            if !prev.closed_upper && !next.closed_lower {
                return Err(SplineError::DomainGap {
                    left: prev.upper,
                    right: next.lower,
                });
            }
        }
        Ok(())
    }

    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    pub fn branch_count(&self) -> usize {
        self.branches.len()
    }

    pub fn is_identically_zero(&self) -> bool {
        self.branches.iter().all(|b| b.expr().is_zero())
    }

    /// Union of all branch intervals.
    pub fn domain(&self) -> Option<Interval> {
        let first = self.branches.first()?.interval();
        let last = self.branches.last()?.interval();
        Some(Interval {
            lower: first.lower,
            upper: last.upper,
            closed_lower: first.closed_lower,
            closed_upper: last.closed_upper,
        })
    }

    /// Sorted distinct branch bounds.
    pub fn breakpoints(&self) -> Vec<f64> {
        let mut points: Vec<f64> = self
            .branches
            .iter()
            .flat_map(|b| [b.interval().lower, b.interval().upper])
            .collect();
        points.sort_by(f64::total_cmp);
        points.dedup();
        points
    }

    pub fn find_branch(&self, x: f64) -> Option<&Branch> {
        let end = self.branches.partition_point(|b| b.interval().lower <= x);
        self.branches[..end]
            .iter()
            .rev()
            .take_while(|b| b.interval().upper >= x)
            .find(|b| b.contains(x))
    }

    pub fn contains(&self, x: f64) -> bool {
        self.find_branch(x).is_some()
    }

    /// Value at `x`; zero outside the domain.
    pub fn evaluate(&self, x: f64) -> f64 {
        self.find_branch(x).map_or(0.0, |b| b.expr().evaluate(x))
    }

    pub fn evaluate_many(&self, xs: &[f64]) -> Vec<f64> {
        self.evaluate_many_with(xs, PARALLEL_THRESHOLD)
    }

    /// Vectorised evaluation, parallel once `xs` reaches `parallel_threshold`.
    pub fn evaluate_many_with(&self, xs: &[f64], parallel_threshold: usize) -> Vec<f64> {
        if xs.len() >= parallel_threshold {
            xs.par_iter().map(|&x| self.evaluate(x)).collect()
        } else {
            xs.iter().map(|&x| self.evaluate(x)).collect()
        }
    }

    /// Checked evaluation; rational branches report vanishing denominators.
    pub fn try_evaluate(&self, x: f64, policy: OutOfDomain) -> Result<f64> {
        match (self.find_branch(x), policy) {
            (Some(b), _) => b.expr().try_evaluate(x),
            (None, OutOfDomain::Zero) => Ok(0.0),
            (None, OutOfDomain::Error) => {
                let (lower, upper) = self
                    .domain()
                    .map_or((f64::NAN, f64::NAN), |d| (d.lower, d.upper));
                Err(SplineError::OutOfDomain { x, lower, upper })
            }
        }
    }

    /// Branch-wise derivative over the same intervals.
    pub fn derivative(&self) -> Self {
        self.map_exprs(Expr::derivative)
    }

    pub fn nth_derivative(&self, n: usize) -> Self {
        let mut result = self.clone();
        for _ in 0..n {
            result = result.derivative();
        }
        result
    }

    /// The function `x ↦ f(map(x))`.
    pub fn compose(&self, map: &Affine) -> Self {
        let mut branches: Vec<Branch> = self.branches.iter().map(|b| b.compose(map)).collect();
        if map.reverses_orientation() {
            branches.reverse();
        }
        Self { branches }
    }

    /// `x ↦ f(x + h)`
    pub fn shift(&self, h: f64) -> Self {
        self.compose(&Affine::translation(h))
    }

    /// `x ↦ f(c·x)`
    pub fn scale(&self, c: f64) -> Result<Self> {
        Ok(self.compose(&Affine::scaling(c)?))
    }

    /// Multiply every value by `c`.
    pub fn scaled(&self, c: f64) -> Self {
        self.map_exprs(|e| e * c)
    }

    /// Multiply every branch by an expression defined on the whole line.
    pub fn mul_expr(&self, expr: &Expr) -> Self {
        self.map_exprs(|e| e * expr)
    }

    pub fn add(&self, other: &Piecewise) -> Self {
        self.combine_union(other, |a, b| a + b)
    }

    pub fn sub(&self, other: &Piecewise) -> Self {
        self.combine_union(other, |a, b| a - b)
    }

    /// Product over the intersection of both domains.
    pub fn mul(&self, other: &Piecewise) -> Self {
        let (Some(a), Some(b)) = (self.domain(), other.domain()) else {
            return Self::zero();
        };
        let Some(common) = a.intersection(&b) else {
            return Self::zero();
        };
        let zero = Expr::zero();
        let points = self.points_within(other, &common);
        assemble(&points, common.closed_lower, common.closed_upper, |mid| {
            let lhs = self.find_branch(mid).map_or(&zero, Branch::expr);
            let rhs = other.find_branch(mid).map_or(&zero, Branch::expr);
            lhs * rhs
        })
    }

    /// Branch-wise reciprocal; any zero branch is a division by zero.
    pub fn reciprocal(&self) -> Result<Self> {
        let branches = self
            .branches
            .iter()
            .map(|b| {
                if b.expr().is_zero() {
                    return Err(SplineError::DivisionByZero(b.interval().midpoint()));
                }
                Ok(b.with_expr(b.expr().reciprocal()?))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { branches })
    }

    pub fn div(&self, other: &Piecewise) -> Result<Self> {
        Ok(self.mul(&other.reciprocal()?))
    }

    /// The part of the function inside `interval`.
    pub fn restrict(&self, interval: &Interval) -> Self {
        let Some(common) = self.domain().and_then(|d| d.intersection(interval)) else {
            return Self::zero();
        };
        let zero = Expr::zero();
        let points = self.points_within(&Self::zero(), &common);
        assemble(&points, common.closed_lower, common.closed_upper, |mid| {
            self.find_branch(mid).map_or(&zero, Branch::expr).clone()
        })
    }

    /// Set the inclusion of the two outer ends of the domain.
    pub fn with_closure(&self, closure: Closure) -> Self {
        let mut result = self.clone();
        if let Some(first) = result.branches.first_mut() {
            let interval = first.interval_mut();
            interval.closed_lower = closure.closed_lower() && interval.lower.is_finite();
        }
        if let Some(last) = result.branches.last_mut() {
            let interval = last.interval_mut();
            interval.closed_upper = closure.closed_upper() && interval.upper.is_finite();
        }
        result
    }

    /// Signed value of largest magnitude, searched over branch ends and the
    /// real critical points inside each branch.
    pub fn extreme(&self) -> Option<f64> {
        let mut best: Option<f64> = None;
        for b in &self.branches {
            let interval = b.interval();
            let critical = b.expr().derivative().numerator().real_roots();
            let candidates = [interval.lower, interval.upper]
                .into_iter()
                .filter(|x| x.is_finite())
                .chain(
                    critical
                        .into_iter()
                        .filter(|&r| r > interval.lower && r < interval.upper),
                );
            for x in candidates {
                let y = b.expr().evaluate(x);
                if y.is_finite() && best.map_or(true, |v| y.abs() > v.abs()) {
                    best = Some(y);
                }
            }
        }
        best
    }

    /// Scale so that the extreme value becomes ±1, dropping coefficients
    /// that cancelled below `tolerance.coefficient`.
    pub fn normalized(&self, tolerance: Tolerance) -> Result<Self> {
        match self.extreme() {
            Some(e) if !tolerance.is_negligible(e) => Ok(self
                .scaled(1.0 / e)
                .map_exprs(|expr| expr.normalized(tolerance.coefficient))),
            _ => Err(SplineError::InvalidArgument(
                "cannot normalize a function that vanishes everywhere".into(),
            )),
        }
    }

    pub fn to_latex(&self) -> String {
        if self.branches.is_empty() {
            return "0".into();
        }
        let rows: Vec<String> = self.branches.iter().map(Branch::to_latex).collect();
        format!("\\begin{{cases}}\n{}\n\\end{{cases}}", rows.join(" \\\\\n"))
    }

    fn map_exprs(&self, f: impl Fn(&Expr) -> Expr) -> Self {
        Self {
            branches: self.branches.iter().map(|b| b.with_expr(f(b.expr()))).collect(),
        }
    }

    fn combine_union(&self, other: &Piecewise, op: impl Fn(&Expr, &Expr) -> Expr) -> Self {
        let mut points = self.breakpoints();
        points.extend(other.breakpoints());
        points.sort_by(f64::total_cmp);
        points.dedup();
        let (Some(&first), Some(&last)) = (points.first(), points.last()) else {
            return Self::zero();
        };

        let zero = Expr::zero();
        let closed_lower = self.contains(first) || other.contains(first);
        let closed_upper = self.contains(last) || other.contains(last);
        assemble(&points, closed_lower, closed_upper, |mid| {
            let lhs = self.find_branch(mid).map_or(&zero, Branch::expr);
            let rhs = other.find_branch(mid).map_or(&zero, Branch::expr);
            op(lhs, rhs)
        })
    }

    /// Breakpoints of both functions strictly inside `interval`, plus its ends.
    fn points_within(&self, other: &Piecewise, interval: &Interval) -> Vec<f64> {
        let mut points = vec![interval.lower, interval.upper];
        points.extend(
            self.breakpoints()
                .into_iter()
                .chain(other.breakpoints())
                .filter(|&x| x > interval.lower && x < interval.upper),
        );
        points.sort_by(f64::total_cmp);
        points.dedup();
        points
    }
}

/// Build `[p0, p1) [p1, p2) ... [pn-1, pn)` with the requested outer ends;
/// each branch expression is taken at the span midpoint.
fn assemble(
    points: &[f64],
    closed_lower: bool,
    closed_upper: bool,
    mut expr_at: impl FnMut(f64) -> Expr,
) -> Piecewise {
    if points.len() < 2 {
        return Piecewise::zero();
    }
    let mut branches: Vec<Branch> = points
        .windows(2)
        .map(|w| {
            let interval = Interval {
                lower: w[0],
                upper: w[1],
                closed_lower: w[0].is_finite(),
                closed_upper: false,
            };
            Branch::new(expr_at(interval.midpoint()), interval)
        })
        .collect();

    if let Some(first) = branches.first_mut() {
        let interval = first.interval_mut();
        interval.closed_lower = closed_lower && interval.lower.is_finite();
    }
    if let Some(last) = branches.last_mut() {
        let interval = last.interval_mut();
        interval.closed_upper = closed_upper && interval.upper.is_finite();
    }
    Piecewise { branches }
}

impl Validate for Piecewise {
    fn validate(&self) -> Result<()> {
        self.check_coverage(Tolerance::default())
    }
}

impl TryFrom<Vec<Branch>> for Piecewise {
    type Error = SplineError;

    fn try_from(branches: Vec<Branch>) -> Result<Self> {
        Piecewise::new(branches)
    }
}

impl From<Piecewise> for Vec<Branch> {
    fn from(f: Piecewise) -> Self {
        f.branches
    }
}

impl Neg for &Piecewise {
    type Output = Piecewise;

    fn neg(self) -> Piecewise {
        self.map_exprs(|e| -e)
    }
}

impl fmt::Display for Piecewise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.branches.is_empty() {
            return write!(f, "0");
        }
        for (i, b) in self.branches.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{b}")?;
        }
        Ok(())
    }
}
