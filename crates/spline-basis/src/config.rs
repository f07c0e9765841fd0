use serde::{Deserialize, Serialize};
use spline_core::Tolerance;
use spline_piecewise::{OutOfDomain, PARALLEL_THRESHOLD};

/// How derivatives of basis functions are built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivativeMethod {
    /// Derivative recurrence over lower-degree derivatives.
    #[default]
    Recurrence,
    /// Differentiate the cached lower-order derivative branch by branch.
    Direct,
}

/// Engine settings. Every field has a default, so partial JSON works.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tolerance: Tolerance,
    pub out_of_domain: OutOfDomain,
    pub derivative_method: DerivativeMethod,
    pub parallel_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tolerance: Tolerance::default(),
            out_of_domain: OutOfDomain::Zero,
            derivative_method: DerivativeMethod::Recurrence,
            parallel_threshold: PARALLEL_THRESHOLD,
        }
    }
}
