//! Peer request and response types.
//!
//! These are exchanged between instances: the register surface used by sync
//! waves and link management, plus the one mux call used to publish session
//! info to a parent.

use std::collections::HashSet;

use regmux_core::{RegLink, RegisterUpdates, RegisterValues, RegistryId, VarValues};
use serde::{Deserialize, Serialize};

/// Registries already reached by one sync wave.
///
/// Keyed by `(instance, registry)`: every instance calls its own root
/// registry `"0"`, so a bare registry id would not tell peers apart.
pub type VisitedSet = HashSet<RegLink>;

/// Full replacement of a peer registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncAllParams {
    /// The receiving registry.
    pub registry: RegistryId,
    /// The registry the wave arrives from; must be one of the receiver's links.
    pub source_link: RegLink,
    /// Registries this wave has already reached, the sender included.
    pub visited_registries: VisitedSet,
    pub values: RegisterValues,
}

/// Partial update of a peer registry; `None` deletes a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMultipleParams {
    /// The receiving registry.
    pub registry: RegistryId,
    /// The registry the wave arrives from; must be one of the receiver's links.
    pub source_link: RegLink,
    /// Registries this wave has already reached, the sender included.
    pub visited_registries: VisitedSet,
    pub values: RegisterUpdates,
}

/// Requests an instance serves to its peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum Request {
    /// Read every register of a registry.
    GetAll { registry: RegistryId },

    SyncAll(SyncAllParams),

    SyncMultiple(SyncMultipleParams),

    /// Add one reference to `link` in `registry`'s link table.
    AddLink { registry: RegistryId, link: RegLink },

    /// Drop one reference to `link` in `registry`'s link table.
    RemoveLink { registry: RegistryId, link: RegLink },

    /// Replace a namespace of a mux location.
    MuxClearAndReplace {
        location: String,
        namespace: String,
        values: VarValues,
    },
}

impl Request {
    /// Method name, for logs.
    pub fn method(&self) -> &'static str {
        match self {
            Request::GetAll { .. } => "reg.get_all",
            Request::SyncAll(_) => "reg.sync_all",
            Request::SyncMultiple(_) => "reg.sync_multiple",
            Request::AddLink { .. } => "reg.add_link",
            Request::RemoveLink { .. } => "reg.remove_link",
            Request::MuxClearAndReplace { .. } => "mux.clear_and_replace",
        }
    }
}

/// Successful peer replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Response {
    /// The request was applied.
    Done,
    /// A sync was applied. `visited` holds every registry the wave is known
    /// to have reached once the receiver finished forwarding it.
    Synced { visited: VisitedSet },
    /// Register contents.
    Registers { values: RegisterValues },
}

#[cfg(test)]
mod tests {
    use super::*;
    use regmux_core::Regname;
    use serde_json::json;

    #[test]
    fn test_sync_multiple_wire_shape() {
        let mut values = RegisterUpdates::new();
        values.insert(Regname::parse("a").unwrap(), None);
        values.insert(Regname::parse("b").unwrap(), Some("v".into()));

        let request = Request::SyncMultiple(SyncMultipleParams {
            registry: RegistryId::root(),
            source_link: RegLink::new("a", "0"),
            visited_registries: [RegLink::new("a", "0")].into_iter().collect(),
            values,
        });

        let wire = serde_json::to_value(&request).unwrap();
        assert_eq!(wire["method"], "SyncMultiple");
        assert_eq!(wire["params"]["values"], json!({"a": null, "b": "v"}));
        assert_eq!(
            wire["params"]["visited_registries"],
            json!([{"instance": "a", "registry": "0"}])
        );

        let back: Request = serde_json::from_value(wire).unwrap();
        assert_eq!(back, request);
    }

    #[test]
    fn test_synced_reply_wire_shape() {
        let response = Response::Synced {
            visited: [RegLink::new("b", "0")].into_iter().collect(),
        };
        let wire = serde_json::to_value(&response).unwrap();
        assert_eq!(
            wire,
            json!({"kind": "Synced", "visited": [{"instance": "b", "registry": "0"}]})
        );
        assert_eq!(serde_json::from_value::<Response>(wire).unwrap(), response);
    }

    #[test]
    fn test_unknown_method_rejected() {
        let wire = json!({"method": "Explode", "params": {}});
        assert!(serde_json::from_value::<Request>(wire).is_err());
    }

    #[test]
    fn test_method_names() {
        let request = Request::GetAll {
            registry: RegistryId::root(),
        };
        assert_eq!(request.method(), "reg.get_all");
    }
}
