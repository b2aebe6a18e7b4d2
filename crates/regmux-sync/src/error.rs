//! Error types for peer calls.

use regmux_core::ApiError;
use thiserror::Error;

/// Errors from a call to a peer instance.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncError {
    /// No instance with this id is reachable.
    #[error("peer not connected: {0}")]
    PeerNotConnected(String),

    /// The request or its reply could not be carried.
    #[error("transport error: {0}")]
    TransportError(String),

    /// The peer handled the request and returned an error.
    #[error("peer error: {0}")]
    Peer(#[from] ApiError),
}

impl From<SyncError> for ApiError {
    /// Peer errors keep their type; anything the peer never saw is opaque.
    fn from(e: SyncError) -> Self {
        match e {
            SyncError::Peer(e) => e,
            other => ApiError::opaque(other.to_string()),
        }
    }
}

/// Result type for peer calls.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;
    use regmux_core::{ErrorCode, RejectedUnlinkedSync};

    #[test]
    fn test_peer_error_keeps_type() {
        let err = SyncError::Peer(RejectedUnlinkedSync::default().into());
        let api: ApiError = err.into();
        assert_eq!(api.code(), ErrorCode::RejectedUnlinkedSync);
    }

    #[test]
    fn test_transport_error_is_opaque() {
        let api: ApiError = SyncError::PeerNotConnected("b".into()).into();
        assert_eq!(api.code(), ErrorCode::OpaqueUpstream);
        assert!(api.to_string().contains("peer not connected: b"));
    }
}
