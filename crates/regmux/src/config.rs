//! Instance configuration.

use std::path::Path;

use regmux_core::{parse_reference, InstanceId, RegLink, RegistryId};
use regmux_host::BridgeConfig;
use serde::{Deserialize, Serialize};

use crate::error::{InstanceError, Result};

/// The mux location this instance publishes its session info to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentMux {
    pub instance: InstanceId,
    /// Location reference on the parent, e.g. `w:1000`.
    pub location: String,
}

/// The registry this instance's root registry links to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentReg {
    pub instance: InstanceId,
    #[serde(default)]
    pub registry: RegistryId,
}

impl ParentReg {
    /// The parent registry as a link target.
    pub fn link(&self) -> RegLink {
        RegLink::new(self.instance.clone(), self.registry.clone())
    }
}

/// Configuration for an [`crate::Instance`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceConfig {
    /// This instance's id on the peer network.
    pub instance: InstanceId,
    pub parent_mux: Option<ParentMux>,
    pub parent_reg: Option<ParentReg>,
    /// Namespace published to the parent mux.
    pub info_namespace: String,
    /// The registry this instance owns.
    pub root_registry: RegistryId,
    /// Name of the host worker thread.
    pub host_thread: String,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            instance: InstanceId::new("regmux"),
            parent_mux: None,
            parent_reg: None,
            info_namespace: "INFO".to_string(),
            root_registry: RegistryId::root(),
            host_thread: BridgeConfig::default().thread_name,
        }
    }
}

impl InstanceConfig {
    /// Default configuration for `instance`.
    pub fn new(instance: impl Into<InstanceId>) -> Self {
        Self {
            instance: instance.into(),
            ..Self::default()
        }
    }

    /// Load and validate a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| InstanceError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_parent_mux(mut self, instance: impl Into<InstanceId>, location: impl Into<String>) -> Self {
        self.parent_mux = Some(ParentMux {
            instance: instance.into(),
            location: location.into(),
        });
        self
    }

    pub fn with_parent_reg(mut self, instance: impl Into<InstanceId>, registry: impl Into<RegistryId>) -> Self {
        self.parent_reg = Some(ParentReg {
            instance: instance.into(),
            registry: registry.into(),
        });
        self
    }

    pub fn with_info_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.info_namespace = namespace.into();
        self
    }

    pub fn with_host_thread(mut self, name: impl Into<String>) -> Self {
        self.host_thread = name.into();
        self
    }

    /// This instance's root registry as a link.
    pub fn root_link(&self) -> RegLink {
        RegLink::new(self.instance.clone(), self.root_registry.clone())
    }

    /// Bridge settings derived from this configuration.
    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            thread_name: self.host_thread.clone(),
        }
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if self.instance.as_str().is_empty() {
            return Err(InstanceError::InvalidConfig("instance id is empty".into()));
        }
        if self.info_namespace.is_empty() {
            return Err(InstanceError::InvalidConfig("info namespace is empty".into()));
        }
        if let Some(parent) = &self.parent_mux {
            parse_reference(&parent.location)
                .map_err(|e| InstanceError::InvalidConfig(format!("parent mux location: {}", e)))?;
        }
        if let Some(parent) = &self.parent_reg {
            if parent.instance == self.instance {
                return Err(InstanceError::InvalidConfig(
                    "parent registry is on this instance".into(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = InstanceConfig::new("a");
        assert_eq!(config.info_namespace, "INFO");
        assert!(config.root_registry.is_root());
        assert_eq!(config.root_link(), RegLink::new("a", "0"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = InstanceConfig::new("child")
            .with_parent_mux("root", "w:1000")
            .with_parent_reg("root", "0");
        assert_eq!(config.parent_reg.as_ref().unwrap().link(), RegLink::new("root", "0"));
        assert_eq!(config.parent_mux.as_ref().unwrap().location, "w:1000");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_parent_location() {
        let config = InstanceConfig::new("child").with_parent_mux("root", "window-3");
        assert!(matches!(
            config.validate(),
            Err(InstanceError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_self_parent_rejected() {
        let config = InstanceConfig::new("a").with_parent_reg("a", "0");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "instance": "child",
                "parent_mux": {{"instance": "root", "location": "w:1000"}},
                "parent_reg": {{"instance": "root"}}
            }}"#
        )
        .unwrap();

        let config = InstanceConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.instance, InstanceId::new("child"));
        assert_eq!(config.parent_reg.unwrap().registry, RegistryId::root());
        assert_eq!(config.info_namespace, "INFO");
    }

    #[test]
    fn test_from_json_file_errors() {
        let missing = InstanceConfig::from_json_file("/definitely/not/here.json");
        assert!(matches!(missing, Err(InstanceError::ConfigRead { .. })));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(
            InstanceConfig::from_json_file(file.path()),
            Err(InstanceError::ConfigParse(_))
        ));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"instance": ""}}"#).unwrap();
        assert!(matches!(
            InstanceConfig::from_json_file(file.path()),
            Err(InstanceError::InvalidConfig(_))
        ));
    }
}
