//! Univariate expression algebra: polynomials, rational functions, and
//! piecewise functions assembled from domain-restricted branches.

pub mod affine;
pub mod branch;
pub mod expr;
pub mod function;
pub mod interval;
pub mod polynomial;
pub mod rational;

pub use affine::Affine;
pub use branch::Branch;
pub use expr::Expr;
pub use function::{OutOfDomain, Piecewise, PARALLEL_THRESHOLD};
pub use interval::{Closure, Interval};
pub use polynomial::Polynomial;
pub use rational::Rational;
