//! Error type for the sparse layer engine.
use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced at the crate's API boundary.
#[derive(Debug, ThisError)]
pub enum Error {
    /// A hyperparameter reached a constructor in a form the domain can't
    /// accept at all (e.g. a non-finite learning rate).
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    /// A hyperparameter or structural argument is numerically out of
    /// domain (negative size, zero tables, empty units, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// An input or gradient matrix has the wrong shape.
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        got: (usize, usize),
    },
    /// An operation was invoked out of the required sequence (e.g.
    /// `backward` without a matching `forward`).
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// A NaN or otherwise non-finite value was detected where the
    /// caller asked for numeric-fault diagnostics.
    #[error("numeric fault: {0}")]
    NumericFault(String),
    /// A worker thread in a parallel region panicked; the panic payload
    /// (if a string) is carried along as context.
    #[error("parallel region failed: {0}")]
    ParallelFailure(String),
}
