//! Errors
//!
//! Custom error types used throughout the `drtester` crate.
use thiserror::Error;

/// Errors that can occur while validating a CATE model.
#[derive(Debug, Error)]
pub enum DRTesterError {
    /// A required earlier step was not run, or was run in the wrong mode.
    #[error("Precondition not met: {0}")]
    Precondition(String),
    /// Sample weights must be finite integers greater than or equal to one.
    #[error("Sample weights must be integer and >= 1, found {value} at position {index}.")]
    InvalidWeight { index: usize, value: f64 },
    /// First value is the name of the parameter, second is expected, third is what was passed.
    #[error("Invalid parameter value passed for {0}, expected {1} but {2} provided.")]
    InvalidParameter(String, String, String),
    /// Invalid value parsing.
    #[error("Invalid value {0} passed for {1}, expected one of {2}.")]
    ParseString(String, String, String),
    /// Inputs or model outputs with incompatible dimensions.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),
    /// A treatment label that does not occur in the validation sample.
    #[error("Treatment {0} does not occur in the validation sample.")]
    UnknownTreatment(i64),
    /// No training rows available for a treatment arm.
    #[error("No training rows for treatment {arm} in fold {fold}.")]
    EmptyArm { arm: i64, fold: usize },
    /// Linear system could not be solved.
    #[error("Matrix is singular or not positive definite.")]
    SingularMatrix,
    /// Failure raised by a nuisance or CATE model.
    #[error("Model error: {0}")]
    Model(String),
    /// Unable to write results or configuration.
    #[error("Unable to write to file: {0}")]
    UnableToWrite(String),
    /// Unable to read results or configuration.
    #[error("Unable to read from file {0}")]
    UnableToRead(String),
}
