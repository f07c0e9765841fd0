use std::fmt;

use serde::{Deserialize, Serialize};
use spline_core::{Result, SplineError};

use crate::Affine;

/// Inclusion style of the two ends of an interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Closure {
    OpenOpen,
    #[default]
    ClosedClosed,
    OpenClosed,
    ClosedOpen,
}

impl Closure {
    pub fn from_flags(closed_lower: bool, closed_upper: bool) -> Self {
        match (closed_lower, closed_upper) {
            (false, false) => Closure::OpenOpen,
            (true, true) => Closure::ClosedClosed,
            (false, true) => Closure::OpenClosed,
            (true, false) => Closure::ClosedOpen,
        }
    }

    pub fn closed_lower(self) -> bool {
        matches!(self, Closure::ClosedClosed | Closure::ClosedOpen)
    }

    pub fn closed_upper(self) -> bool {
        matches!(self, Closure::ClosedClosed | Closure::OpenClosed)
    }
}

/// A real interval with independently open or closed ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "IntervalRepr")]
pub struct Interval {
    pub lower: f64,
    pub upper: f64,
    pub closed_lower: bool,
    pub closed_upper: bool,
}

#[derive(Deserialize)]
struct IntervalRepr {
    lower: f64,
    upper: f64,
    closed_lower: bool,
    closed_upper: bool,
}

impl TryFrom<IntervalRepr> for Interval {
    type Error = SplineError;

    fn try_from(repr: IntervalRepr) -> Result<Self> {
        let closure = Closure::from_flags(repr.closed_lower, repr.closed_upper);
        Interval::new(repr.lower, repr.upper, closure)
    }
}

impl Interval {
    pub fn new(lower: f64, upper: f64, closure: Closure) -> Result<Self> {
        if lower.is_nan() || upper.is_nan() || lower > upper {
            return Err(SplineError::InvalidArgument(format!(
                "interval bounds must satisfy lower <= upper, got [{lower}, {upper}]"
            )));
        }
        Ok(Self {
            lower,
            upper,
            closed_lower: closure.closed_lower() && lower.is_finite(),
            closed_upper: closure.closed_upper() && upper.is_finite(),
        })
    }

    pub fn closed(lower: f64, upper: f64) -> Result<Self> {
        Self::new(lower, upper, Closure::ClosedClosed)
    }

    pub fn closed_open(lower: f64, upper: f64) -> Result<Self> {
        Self::new(lower, upper, Closure::ClosedOpen)
    }

    /// The whole real line.
    pub fn real_line() -> Self {
        Self {
            lower: f64::NEG_INFINITY,
            upper: f64::INFINITY,
            closed_lower: false,
            closed_upper: false,
        }
    }

    pub fn closure(&self) -> Closure {
        Closure::from_flags(self.closed_lower, self.closed_upper)
    }

    pub fn with_closure(mut self, closure: Closure) -> Self {
        self.closed_lower = closure.closed_lower() && self.lower.is_finite();
        self.closed_upper = closure.closed_upper() && self.upper.is_finite();
        self
    }

    pub fn contains(&self, x: f64) -> bool {
        let above = if self.closed_lower {
            x >= self.lower
        } else {
            x > self.lower
        };
        let below = if self.closed_upper {
            x <= self.upper
        } else {
            x < self.upper
        };
        above && below
    }

    pub fn length(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn midpoint(&self) -> f64 {
        if self.lower.is_finite() && self.upper.is_finite() {
            0.5 * (self.lower + self.upper)
        } else if self.lower.is_finite() {
            self.lower + 1.0
        } else if self.upper.is_finite() {
            self.upper - 1.0
        } else {
            0.0
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.lower == self.upper
    }

    /// True when no point satisfies `contains`.
    pub fn is_empty(&self) -> bool {
        self.is_degenerate() && !(self.closed_lower && self.closed_upper)
    }

    pub fn intersection(&self, other: &Interval) -> Option<Interval> {
        let (lower, closed_lower) = if self.lower > other.lower {
            (self.lower, self.closed_lower)
        } else if other.lower > self.lower {
            (other.lower, other.closed_lower)
        } else {
            (self.lower, self.closed_lower && other.closed_lower)
        };
        let (upper, closed_upper) = if self.upper < other.upper {
            (self.upper, self.closed_upper)
        } else if other.upper < self.upper {
            (other.upper, other.closed_upper)
        } else {
            (self.upper, self.closed_upper && other.closed_upper)
        };

        let result = Interval {
            lower,
            upper,
            closed_lower,
            closed_upper,
        };
        if lower > upper || result.is_empty() {
            None
        } else {
            Some(result)
        }
    }

    /// The set of `x` whose image under `map` lies in this interval.
    pub fn pullback(&self, map: &Affine) -> Interval {
        let inverse = map.inverse();
        let a = inverse.apply(self.lower);
        let b = inverse.apply(self.upper);
        if map.reverses_orientation() {
            Interval {
                lower: b,
                upper: a,
                closed_lower: self.closed_upper,
                closed_upper: self.closed_lower,
            }
        } else {
            Interval {
                lower: a,
                upper: b,
                closed_lower: self.closed_lower,
                closed_upper: self.closed_upper,
            }
        }
    }

    pub fn to_latex(&self) -> String {
        let left = if self.closed_lower { "[" } else { "(" };
        let right = if self.closed_upper { "]" } else { ")" };
        format!(
            "x \\in \\left{left}{}, {}\\right{right}",
            latex_bound(self.lower),
            latex_bound(self.upper)
        )
    }
}

fn latex_bound(v: f64) -> String {
    if v == f64::INFINITY {
        "\\infty".into()
    } else if v == f64::NEG_INFINITY {
        "-\\infty".into()
    } else {
        format!("{v}")
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let left = if self.closed_lower { '[' } else { '(' };
        let right = if self.closed_upper { ']' } else { ')' };
        write!(f, "{left}{}, {}{right}", self.lower, self.upper)
    }
}
