//! Typed client for the host's variable namespaces.

use regmux_core::{
    ApiError, ErrorCode, LocationDoesNotExist, Reference, Scope, VarUpdates, VarValues,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::bridge::HostBridge;
use crate::error::ApiCallError;
use crate::reply::{Empty, HostErrorTable, ValuesReply};

/// Domain errors reported by the variable functions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarHostError {
    /// The host has no location `scope:id`.
    LocationDoesNotExist { scope: String, id: i64 },
}

impl HostErrorTable for VarHostError {
    fn decode(code: i64, data: &Value) -> Option<Self> {
        #[derive(Deserialize)]
        struct LocationDne {
            scope: String,
            id: i64,
        }

        match ErrorCode::from_code(code)? {
            ErrorCode::LocationDoesNotExist => LocationDne::deserialize(data)
                .ok()
                .map(|dne| VarHostError::LocationDoesNotExist {
                    scope: dne.scope,
                    id: dne.id,
                }),
            _ => None,
        }
    }
}

impl From<VarHostError> for ApiError {
    fn from(e: VarHostError) -> Self {
        match e {
            VarHostError::LocationDoesNotExist { scope, id } => {
                ApiError::LocationDoesNotExist(LocationDoesNotExist {
                    location: format!("{}:{}", scope, id),
                })
            }
        }
    }
}

/// What the host knows about a location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationInfo {
    /// The scope of the location.
    pub scope: Scope,
    /// The host-side identifier.
    pub id: i64,
    /// The enclosing location variables are inherited from, as a reference.
    #[serde(default)]
    pub parent: Option<String>,
}

/// Variable functions of the host's internal API.
#[derive(Clone)]
pub struct VarClient {
    bridge: HostBridge,
}

impl VarClient {
    /// Create a client over `bridge`.
    pub fn new(bridge: HostBridge) -> Self {
        Self { bridge }
    }

    /// Variables set directly on a location.
    pub async fn get_all_vars(&self, reference: &Reference, namespace: &str) -> Result<VarValues, ApiError> {
        let reply: ValuesReply = self
            .call("get_all_vars", location_args(reference, vec![json!(namespace)]))
            .await?;
        Ok(reply.values)
    }

    /// Variables visible at a location, including inherited ones.
    pub async fn resolve_all_vars(
        &self,
        reference: &Reference,
        namespace: &str,
    ) -> Result<VarValues, ApiError> {
        let reply: ValuesReply = self
            .call("resolve_all_vars", location_args(reference, vec![json!(namespace)]))
            .await?;
        Ok(reply.values)
    }

    /// Replace every variable of a namespace on a location.
    pub async fn clear_and_replace_vars(
        &self,
        reference: &Reference,
        namespace: &str,
        values: &VarValues,
    ) -> Result<(), ApiError> {
        let _: Empty = self
            .call(
                "clear_and_replace_vars",
                location_args(reference, vec![json!(namespace), json!(values)]),
            )
            .await?;
        Ok(())
    }

    /// Set or delete (`None`) individual variables.
    pub async fn set_multiple_vars(
        &self,
        reference: &Reference,
        namespace: &str,
        values: &VarUpdates,
    ) -> Result<(), ApiError> {
        let _: Empty = self
            .call(
                "set_multiple_vars",
                location_args(reference, vec![json!(namespace), json!(values)]),
            )
            .await?;
        Ok(())
    }

    /// Describe a location.
    pub async fn get_location_info(&self, reference: &Reference) -> Result<LocationInfo, ApiError> {
        self.call("get_location_info", location_args(reference, vec![]))
            .await
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        api_func: &str,
        args: Vec<Value>,
    ) -> Result<T, ApiError> {
        self.bridge
            .call_api::<T, VarHostError>(api_func, args)
            .await
            .map_err(|e: ApiCallError<VarHostError>| e.into())
    }
}

fn location_args(reference: &Reference, rest: Vec<Value>) -> Vec<Value> {
    let mut args = vec![json!(reference.scope.prefix()), json!(reference.target_id)];
    args.extend(rest);
    args
}
