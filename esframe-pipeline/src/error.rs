//! Pipeline error types.

use crate::backend::BackendError;
use crate::drain::DrainError;
use crate::engine::EngineError;
use crate::output::AllocError;
use esframe_core::error::Error as CoreError;
use thiserror::Error;

/// Pipeline error type.
///
/// Only resource-level failures and caller mistakes surface here; malformed
/// input, decode errors and resynchronization are absorbed by the pipeline
/// and show up in [`PipelineStats`](crate::PipelineStats) instead.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Core error.
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource failure; the pipeline instance is unusable until reset.
    #[error("Resource error: {0}")]
    Resource(String),

    /// Fatal engine failure.
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Backend library failure.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Operation not valid in the current drain state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Frame index did not increase.
    #[error("Frame index {got} does not follow {previous}")]
    NonMonotonicIndex {
        /// Index of the last accepted chunk.
        previous: u64,
        /// Index that was rejected.
        got: u64,
    },

    /// A previous resource failure left the pipeline unusable.
    #[error("Pipeline poisoned by an earlier resource failure; reset required")]
    Poisoned,
}

impl From<AllocError> for PipelineError {
    fn from(err: AllocError) -> Self {
        PipelineError::Resource(err.to_string())
    }
}

impl From<DrainError> for PipelineError {
    fn from(err: DrainError) -> Self {
        match err {
            DrainError::OutOfOrder { previous, got } => {
                PipelineError::NonMonotonicIndex { previous, got }
            }
            DrainError::InvalidState { .. } => PipelineError::InvalidState(err.to_string()),
        }
    }
}

impl PipelineError {
    /// Check if this error leaves the pipeline unusable until `reset`.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::Resource(_)
                | PipelineError::Poisoned
                | PipelineError::Backend(_)
                | PipelineError::Engine(EngineError::Resource(_))
        )
    }
}

/// Pipeline result type.
pub type Result<T> = std::result::Result<T, PipelineError>;
