//! Error types for the host bridge.

use regmux_core::{ApiError, HostCallFailed, InvalidResponse};
use thiserror::Error;

/// Why a submitted call produced no host result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostFault {
    /// The host raised while executing the call.
    #[error("{0}")]
    Raised(String),

    /// The bridge was closed before the call was submitted.
    #[error("host bridge is closed")]
    Closed,

    /// The bridge was shut down without draining; the call never ran.
    #[error("host bridge shut down before the call ran")]
    Abandoned,

    /// The worker went away without answering.
    #[error("host worker terminated")]
    WorkerGone,
}

/// Errors from a bridged host call, independent of the called API.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HostError {
    /// The call did not complete on the host.
    #[error(transparent)]
    CallFailed(#[from] HostCallFailed),

    /// The host replied with something that does not decode.
    #[error(transparent)]
    InvalidResponse(#[from] InvalidResponse),
}

impl From<HostError> for ApiError {
    fn from(e: HostError) -> Self {
        match e {
            HostError::CallFailed(e) => ApiError::HostCallFailed(e),
            HostError::InvalidResponse(e) => ApiError::InvalidResponse(e),
        }
    }
}

/// Error of a host API call with a table of domain errors `E`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiCallError<E> {
    #[error(transparent)]
    Host(#[from] HostError),

    #[error("host domain error: {0:?}")]
    Domain(E),
}

impl<E: Into<ApiError>> From<ApiCallError<E>> for ApiError {
    fn from(e: ApiCallError<E>) -> Self {
        match e {
            ApiCallError::Host(e) => e.into(),
            ApiCallError::Domain(e) => e.into(),
        }
    }
}

/// Result type for bridged calls.
pub type Result<T> = std::result::Result<T, HostError>;
