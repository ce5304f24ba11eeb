//! Error types for the tracking engine.

use thiserror::Error;

/// Boxed error coming out of an external adapter (report source, sink).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Precondition violations raised by the estimation filter.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FilterError {
    #[error("filter used before initialize()")]
    Uninitialized,
    #[error("innovation covariance is singular")]
    SingularInnovation,
}

/// Anything that aborts a tracking cycle.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("estimation filter failed: {0}")]
    Filter(#[from] FilterError),
    #[error("report source failed")]
    Source(#[source] BoxError),
    #[error("track sink failed")]
    Sink(#[source] BoxError),
}
