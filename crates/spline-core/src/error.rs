use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SplineError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid knot sequence: {0}")]
    InvalidKnotSequence(String),

    #[error("Domain gap between {left} and {right}")]
    DomainGap { left: f64, right: f64 },

    #[error("Domain overlap: branch ending at {left} overlaps branch starting at {right}")]
    DomainOverlap { left: f64, right: f64 },

    #[error("Division by zero at x = {0}")]
    DivisionByZero(f64),

    #[error("Out of domain: {x} not in [{lower}, {upper}]")]
    OutOfDomain { x: f64, lower: f64, upper: f64 },
}

pub type Result<T> = std::result::Result<T, SplineError>;
