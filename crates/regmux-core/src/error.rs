//! Error types shared by every regmux component.
//!
//! [`ApiError`] is the taxonomy that crosses component and instance
//! boundaries. Each variant carries a serializable payload and a stable
//! numeric [`ErrorCode`], so errors survive a round trip through a peer or the
//! host as a [`WireError`]. Decoding uses a closed table: a code this build
//! does not know becomes [`ApiError::OpaqueUpstream`] instead of failing.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::types::RegLink;

/// Local errors that never cross a boundary.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid register name: {0:?}")]
    InvalidRegname(String),
}

/// Stable numeric error codes.
///
/// Codes are grouped in reserved blocks: 10000s for variables, 20000s for
/// registers and 30000s for the host bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i64)]
pub enum ErrorCode {
    LocationDoesNotExist = 10001,
    RejectedUnlinkedSync = 20001,
    InvalidLocation = 30001,
    HostCallFailed = 30002,
    InvalidResponse = 30003,
    OpaqueUpstream = 30004,
}

impl ErrorCode {
    const ALL: [ErrorCode; 6] = [
        ErrorCode::LocationDoesNotExist,
        ErrorCode::RejectedUnlinkedSync,
        ErrorCode::InvalidLocation,
        ErrorCode::HostCallFailed,
        ErrorCode::InvalidResponse,
        ErrorCode::OpaqueUpstream,
    ];

    /// Numeric value on the wire.
    pub const fn code(self) -> i64 {
        self as i64
    }

    /// Look up a known code.
    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|known| known.code() == code)
    }

    /// Short human-readable description, used as the wire message.
    pub const fn description(self) -> &'static str {
        match self {
            ErrorCode::LocationDoesNotExist => "Location does not exist",
            ErrorCode::RejectedUnlinkedSync => "Rejected sync from an unlinked registry",
            ErrorCode::InvalidLocation => "Invalid location reference",
            ErrorCode::HostCallFailed => "Host call failed",
            ErrorCode::InvalidResponse => "Host call returned an invalid response",
            ErrorCode::OpaqueUpstream => "Upstream server error",
        }
    }
}

/// A location string that does not parse as a reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("invalid location reference: {raw_value:?}")]
pub struct InvalidLocation {
    pub raw_value: String,
}

/// The host raised while executing a call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("host call {function} failed: {error}")]
pub struct HostCallFailed {
    pub function: String,
    pub args: Vec<Value>,
    pub error: String,
}

/// The host replied with something that does not decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("invalid response from host call {api_func}: {response}")]
pub struct InvalidResponse {
    pub api_func: String,
    pub response: String,
}

/// The referenced location is not valid on the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("location does not exist: {location}")]
pub struct LocationDoesNotExist {
    pub location: String,
}

/// A sync arrived from a registry that is not a current link.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, Error)]
#[error("rejected sync from unlinked registry {}", sender_display(.sender))]
pub struct RejectedUnlinkedSync {
    #[serde(default)]
    pub sender: Option<RegLink>,
}

fn sender_display(sender: &Option<RegLink>) -> String {
    match sender {
        Some(link) => link.to_string(),
        None => "<unknown>".to_string(),
    }
}

/// A peer error with no local counterpart, kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("upstream error: {message}")]
pub struct OpaqueUpstream {
    pub message: String,
}

/// Errors returned by user- and peer-initiated operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    #[error(transparent)]
    InvalidLocation(#[from] InvalidLocation),

    #[error(transparent)]
    HostCallFailed(#[from] HostCallFailed),

    #[error(transparent)]
    InvalidResponse(#[from] InvalidResponse),

    #[error(transparent)]
    LocationDoesNotExist(#[from] LocationDoesNotExist),

    #[error(transparent)]
    RejectedUnlinkedSync(#[from] RejectedUnlinkedSync),

    #[error(transparent)]
    OpaqueUpstream(#[from] OpaqueUpstream),
}

impl ApiError {
    /// Wrap any displayable upstream failure.
    pub fn opaque(message: impl Into<String>) -> Self {
        ApiError::OpaqueUpstream(OpaqueUpstream {
            message: message.into(),
        })
    }

    /// The stable code of this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            ApiError::InvalidLocation(_) => ErrorCode::InvalidLocation,
            ApiError::HostCallFailed(_) => ErrorCode::HostCallFailed,
            ApiError::InvalidResponse(_) => ErrorCode::InvalidResponse,
            ApiError::LocationDoesNotExist(_) => ErrorCode::LocationDoesNotExist,
            ApiError::RejectedUnlinkedSync(_) => ErrorCode::RejectedUnlinkedSync,
            ApiError::OpaqueUpstream(_) => ErrorCode::OpaqueUpstream,
        }
    }

    /// Encode for a peer.
    pub fn to_wire(&self) -> WireError {
        let data = match self {
            ApiError::InvalidLocation(data) => serde_json::to_value(data),
            ApiError::HostCallFailed(data) => serde_json::to_value(data),
            ApiError::InvalidResponse(data) => serde_json::to_value(data),
            ApiError::LocationDoesNotExist(data) => serde_json::to_value(data),
            ApiError::RejectedUnlinkedSync(data) => serde_json::to_value(data),
            ApiError::OpaqueUpstream(data) => serde_json::to_value(data),
        };
        let code = self.code();
        WireError {
            code: code.code(),
            message: code.description().to_string(),
            data: data.unwrap_or(Value::Null),
        }
    }

    /// Decode an error received from a peer.
    ///
    /// Never fails: unknown codes and payloads that do not match the type
    /// registered for their code become [`ApiError::OpaqueUpstream`].
    pub fn from_wire(wire: WireError) -> Self {
        let decoded = match ErrorCode::from_code(wire.code) {
            Some(ErrorCode::InvalidLocation) => decode_data(&wire.data).map(ApiError::InvalidLocation),
            Some(ErrorCode::HostCallFailed) => decode_data(&wire.data).map(ApiError::HostCallFailed),
            Some(ErrorCode::InvalidResponse) => decode_data(&wire.data).map(ApiError::InvalidResponse),
            Some(ErrorCode::LocationDoesNotExist) => {
                decode_data(&wire.data).map(ApiError::LocationDoesNotExist)
            }
            Some(ErrorCode::RejectedUnlinkedSync) => {
                decode_data(&wire.data).map(ApiError::RejectedUnlinkedSync)
            }
            Some(ErrorCode::OpaqueUpstream) => decode_data(&wire.data).map(ApiError::OpaqueUpstream),
            None => None,
        };

        decoded.unwrap_or_else(|| ApiError::opaque(wire.to_string()))
    }
}

fn decode_data<T: DeserializeOwned>(data: &Value) -> Option<T> {
    // Payload-less errors may arrive with a null body.
    let data = if data.is_null() {
        Value::Object(Default::default())
    } else {
        data.clone()
    };
    serde_json::from_value(data).ok()
}

/// JSON-RPC style error object exchanged with peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("error {code}: {message} {data}")]
pub struct WireError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Value,
}

/// Result type for cross-boundary operations.
pub type Result<T> = std::result::Result<T, ApiError>;
