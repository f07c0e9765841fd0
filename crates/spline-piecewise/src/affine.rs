use serde::{Deserialize, Serialize};
use spline_core::{Result, SplineError};

/// Affine change of variable `x ↦ scale·x + offset` with a non-zero scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Affine {
    pub scale: f64,
    pub offset: f64,
}

impl Affine {
    pub fn identity() -> Self {
        Self {
            scale: 1.0,
            offset: 0.0,
        }
    }

    pub fn new(scale: f64, offset: f64) -> Result<Self> {
        if scale == 0.0 || !scale.is_finite() || !offset.is_finite() {
            return Err(SplineError::InvalidArgument(format!(
                "affine map needs a finite non-zero scale, got {scale}·x + {offset}"
            )));
        }
        Ok(Self { scale, offset })
    }

    /// `x ↦ x + h`
    pub fn translation(h: f64) -> Self {
        Self {
            scale: 1.0,
            offset: h,
        }
    }

    /// `x ↦ c·x`
    pub fn scaling(c: f64) -> Result<Self> {
        Self::new(c, 0.0)
    }

    pub fn apply(&self, x: f64) -> f64 {
        self.scale * x + self.offset
    }

    pub fn inverse(&self) -> Affine {
        Affine {
            scale: 1.0 / self.scale,
            offset: -self.offset / self.scale,
        }
    }

    /// Apply `self` first, then `other`.
    pub fn then(&self, other: &Affine) -> Affine {
        Affine {
            scale: other.scale * self.scale,
            offset: other.scale * self.offset + other.offset,
        }
    }

    pub fn reverses_orientation(&self) -> bool {
        self.scale < 0.0
    }
}

impl Default for Affine {
    fn default() -> Self {
        Self::identity()
    }
}
