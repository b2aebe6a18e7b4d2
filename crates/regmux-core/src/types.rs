//! Strong type definitions for regmux.
//!
//! All identifiers are newtypes to prevent mixing up instances and registries
//! at compile time.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::regname::Regname;

/// Identifier of an instance on the peer network.
///
/// Opaque to regmux; in practice this is the address a peer listens on.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    /// Create a new instance ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InstanceId({})", self.0)
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InstanceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for InstanceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Identifier of a registry namespace owned by one instance.
///
/// `"0"` is the instance's own root registry.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistryId(String);

impl RegistryId {
    /// Raw value of the root registry.
    pub const ROOT: &'static str = "0";

    /// Create a new registry ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The root registry of an instance.
    pub fn root() -> Self {
        Self(Self::ROOT.to_string())
    }

    /// Whether this is the root registry.
    pub fn is_root(&self) -> bool {
        self.0 == Self::ROOT
    }

    /// Get the raw string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RegistryId {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Debug for RegistryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RegistryId({})", self.0)
    }
}

impl fmt::Display for RegistryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RegistryId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RegistryId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A directed edge from the local registry to a registry on another instance.
///
/// The same type names a registry globally, so it doubles as the source of a
/// sync and as an entry of a wave's visited set.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RegLink {
    /// The instance owning the registry.
    pub instance: InstanceId,
    /// The registry on that instance.
    pub registry: RegistryId,
}

impl RegLink {
    /// Create a new link.
    pub fn new(instance: impl Into<InstanceId>, registry: impl Into<RegistryId>) -> Self {
        Self {
            instance: instance.into(),
            registry: registry.into(),
        }
    }
}

impl fmt::Debug for RegLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RegLink({}/{})", self.instance, self.registry)
    }
}

impl fmt::Display for RegLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.instance, self.registry)
    }
}

/// Full contents of a registry.
pub type RegisterValues = BTreeMap<Regname, String>;

/// Partial registry update; `None` deletes the slot.
pub type RegisterUpdates = BTreeMap<Regname, Option<String>>;

/// Full contents of a variable namespace.
pub type VarValues = BTreeMap<String, String>;

/// Partial namespace update; `None` deletes the variable.
pub type VarUpdates = BTreeMap<String, Option<String>>;
