//! Analytic B-spline and NURBS basis functions.
//!
//! Basis functions are built by the Cox-de Boor recursion as piecewise
//! polynomials (piecewise rational functions for NURBS) and memoized in a
//! caller-owned [`BasisCache`], so repeated construction and differentiation
//! of the same basis function is a lookup.

pub mod basis;
pub mod cache;
pub mod config;
pub mod engine;
pub mod knotvector;
pub mod polygon;
pub mod space;

pub use basis::{BasisFunction, BasisSource};
pub use cache::{BasisCache, CacheKey, CacheStats, Variant};
pub use config::{DerivativeMethod, EngineConfig};
pub use engine::BSplineEngine;
pub use knotvector::{Knotvector, RefineMethod};
pub use polygon::ControlPolygon;
pub use space::BSplineSpace;

pub use spline_core::{Result, SplineError, Tolerance};
pub use spline_piecewise::{Closure, Interval, OutOfDomain, Piecewise};
