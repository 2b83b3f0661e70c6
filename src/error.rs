use pyo3::PyErr;
use pyo3::exceptions::PyValueError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unrecognized algorithm '{0}' (expected gillespie, tauleap, or euler)")]
    InvalidAlgorithm(String),
    #[error("unrecognized boundary condition '{0}' (expected reflecting or periodical)")]
    InvalidBoundary(String),
    #[error(
        "unrecognized sampling policy '{0}' (expected on_t_sample, on_iteration, on_interval, or no_sampling)"
    )]
    InvalidSamplingPolicy(String),
    #[error("shape mismatch: {0}")]
    Shape(String),
    #[error("no active simulation (call initialize_3d or initialize_graph first)")]
    NoSession,
}

impl From<EngineError> for PyErr {
    fn from(err: EngineError) -> Self {
        PyValueError::new_err(err.to_string())
    }
}
