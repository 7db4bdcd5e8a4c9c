use crate::models::{
    CapacityViolation, FillError, OptimizationError, ScoreError, SelectionError, ValidationError,
};
use crate::repositories::populations;
use crate::services::workers;

/// Errors that can occur during optimization operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("PopulationsRepositoryError: {0}")]
    PopulationsRepositoryError(#[from] populations::Error),
    #[error("ScoreError: {0}")]
    ScoreError(#[from] ScoreError),
    #[error("FillError: {0}")]
    FillError(#[from] FillError),
    #[error("SelectionError: {0}")]
    SelectionError(#[from] SelectionError),
    #[error("OptimizationError: {0}")]
    OptimizationError(#[from] OptimizationError),
    #[error("WorkersError: {0}")]
    WorkersError(#[from] workers::Error),
    /// An assignment built by the optimizer broke the capacity. Never repaired.
    #[error("CapacityViolation: {0}")]
    CapacityViolation(#[from] CapacityViolation),
    #[error("InvalidAssignment: {0}")]
    InvalidAssignment(ValidationError),
    #[error("NoSolution: the search produced no assignment")]
    NoSolution,
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::Capacity(violation) => Error::CapacityViolation(violation),
            other => Error::InvalidAssignment(other),
        }
    }
}
