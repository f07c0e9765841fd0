/// Tolerances for comparing breakpoints and polynomial coefficients.
///
/// Knot arithmetic in the Cox-de Boor recursion is always exact; these values
/// only absorb floating-point noise when validating piecewise coverage or
/// deciding whether an expression has cancelled to zero.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Tolerance {
    /// Tolerance for comparing interval bounds (in parameter units)
    pub linear: f64,
    /// Tolerance below which a coefficient is treated as cancelled
    pub coefficient: f64,
}

impl Tolerance {
    pub const DEFAULT_LINEAR: f64 = 1e-10;
    pub const DEFAULT_COEFFICIENT: f64 = 1e-12;

    pub fn new(linear: f64, coefficient: f64) -> Self {
        Self {
            linear,
            coefficient,
        }
    }

    pub fn default_precision() -> Self {
        Self {
            linear: Self::DEFAULT_LINEAR,
            coefficient: Self::DEFAULT_COEFFICIENT,
        }
    }

    pub fn loose() -> Self {
        Self {
            linear: 1e-6,
            coefficient: 1e-8,
        }
    }

    pub fn tight() -> Self {
        Self {
            linear: 1e-14,
            coefficient: 1e-15,
        }
    }

    /// Check if two parameter values are equal within linear tolerance
    pub fn linear_eq(self, a: f64, b: f64) -> bool {
        (a - b).abs() <= self.linear
    }

    /// Check if a coefficient is zero within coefficient tolerance
    pub fn is_negligible(self, c: f64) -> bool {
        c.abs() <= self.coefficient
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::default_precision()
    }
}
