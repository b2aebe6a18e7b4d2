//! Decoding of host replies.
//!
//! Every internal API function answers with one of
//!
//! ```text
//! {"result": <value>}
//! {"error": {"code": <int>, "data": <object>}}
//! ```
//!
//! The result is decoded against the caller's output type. Error codes are
//! looked up in a closed [`HostErrorTable`] chosen by the caller; anything the
//! table does not know is an invalid response, never a panic.
//!
//! Lua cannot tell an empty map from an empty list, so an empty map may
//! arrive as `[]`. [`map_or_empty`] accepts both.

use std::collections::BTreeMap;

use regmux_core::InvalidResponse;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{ApiCallError, HostError};

/// A closed table of domain errors a host function may report.
pub trait HostErrorTable: Sized {
    /// Decode `data` as the error registered for `code`.
    ///
    /// Returns `None` when the code is not in the table or `data` does not
    /// match the type registered for it.
    fn decode(code: i64, data: &Value) -> Option<Self>;
}

/// Table for functions with no domain errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoDomainErrors {}

impl HostErrorTable for NoDomainErrors {
    fn decode(_code: i64, _data: &Value) -> Option<Self> {
        None
    }
}

impl From<NoDomainErrors> for regmux_core::ApiError {
    fn from(never: NoDomainErrors) -> Self {
        match never {}
    }
}

/// Reply of functions that return nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Empty {}

/// Reply carrying a map of values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ValuesReply {
    #[serde(deserialize_with = "map_or_empty")]
    pub values: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct RawHostError {
    code: i64,
    data: Value,
}

/// Decode a raw host reply for `api_func`.
pub fn decode_reply<T, E>(api_func: &str, reply: Value) -> Result<T, ApiCallError<E>>
where
    T: DeserializeOwned,
    E: HostErrorTable,
{
    let invalid = || -> ApiCallError<E> {
        HostError::InvalidResponse(InvalidResponse {
            api_func: api_func.to_string(),
            response: reply.to_string(),
        })
        .into()
    };

    let Value::Object(fields) = &reply else {
        return Err(invalid());
    };

    if let Some(result) = fields.get("result") {
        return T::deserialize(result).map_err(|e| {
            tracing::debug!(api_func, error = %e, "host result did not match expected shape");
            invalid()
        });
    }

    if let Some(error) = fields.get("error") {
        let Ok(raw) = RawHostError::deserialize(error) else {
            return Err(invalid());
        };
        return match E::decode(raw.code, &raw.data) {
            Some(domain) => Err(ApiCallError::Domain(domain)),
            None => {
                tracing::debug!(api_func, code = raw.code, "unregistered host error code");
                Err(invalid())
            }
        };
    }

    Err(invalid())
}

/// Deserialize a map that may arrive as an empty list.
///
/// Any list decodes to an empty map.
pub fn map_or_empty<'de, D, K, V>(deserializer: D) -> Result<BTreeMap<K, V>, D::Error>
where
    D: Deserializer<'de>,
    K: Ord + Deserialize<'de>,
    V: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum MapOrList<K: Ord, V> {
        Map(BTreeMap<K, V>),
        List(Vec<Value>),
    }

    Ok(match MapOrList::deserialize(deserializer)? {
        MapOrList::Map(map) => map,
        MapOrList::List(_) => BTreeMap::new(),
    })
}
