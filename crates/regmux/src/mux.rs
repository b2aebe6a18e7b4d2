//! Mux service: session, window and buffer scoped variable namespaces.

use std::collections::BTreeMap;

use regmux_core::{parse_reference, ApiError, Reference, VarUpdates, VarValues};
use regmux_host::{LocationInfo, VarClient};
use regmux_sync::{Transport, TransportExt};

use crate::config::ParentMux;

/// Values for requested keys; `None` where the key is unset.
pub type KeyValues = BTreeMap<String, Option<String>>;

/// Variable namespaces of this instance's host locations.
#[derive(Clone)]
pub struct MuxService<T: Transport + Clone> {
    vars: VarClient,
    transport: T,
    parent: Option<ParentMux>,
    info_namespace: String,
}

impl<T: Transport + Clone> MuxService<T> {
    pub fn new(vars: VarClient, transport: T, parent: Option<ParentMux>, info_namespace: String) -> Self {
        Self {
            vars,
            transport,
            parent,
            info_namespace,
        }
    }

    pub async fn get_multiple(
        &self,
        location: &str,
        namespace: &str,
        keys: &[String],
    ) -> Result<KeyValues, ApiError> {
        let all = self.get_all(location, namespace).await?;
        Ok(pick(&all, keys))
    }

    pub async fn get_all(&self, location: &str, namespace: &str) -> Result<VarValues, ApiError> {
        let reference = parse_reference(location)?;
        self.vars.get_all_vars(&reference, namespace).await
    }

    /// Like [`Self::get_multiple`], including values inherited from
    /// enclosing locations.
    pub async fn resolve_multiple(
        &self,
        location: &str,
        namespace: &str,
        keys: &[String],
    ) -> Result<KeyValues, ApiError> {
        let all = self.resolve_all(location, namespace).await?;
        Ok(pick(&all, keys))
    }

    pub async fn resolve_all(&self, location: &str, namespace: &str) -> Result<VarValues, ApiError> {
        let reference = parse_reference(location)?;
        self.vars.resolve_all_vars(&reference, namespace).await
    }

    pub async fn set_multiple(
        &self,
        location: &str,
        namespace: &str,
        values: &VarUpdates,
    ) -> Result<(), ApiError> {
        let reference = parse_reference(location)?;
        self.vars.set_multiple_vars(&reference, namespace, values).await?;
        self.after_write(namespace).await;
        Ok(())
    }

    pub async fn clear_and_replace(
        &self,
        location: &str,
        namespace: &str,
        values: &VarValues,
    ) -> Result<(), ApiError> {
        let reference = parse_reference(location)?;
        self.vars
            .clear_and_replace_vars(&reference, namespace, values)
            .await?;
        self.after_write(namespace).await;
        Ok(())
    }

    pub async fn get_location_info(&self, location: &str) -> Result<LocationInfo, ApiError> {
        let reference = parse_reference(location)?;
        self.vars.get_location_info(&reference).await
    }

    /// Replace the parent's info namespace with this session's resolved one.
    ///
    /// Does nothing without a parent. Peer errors keep their type; anything
    /// else from the parent becomes [`ApiError::OpaqueUpstream`].
    pub async fn publish_to_parent(&self) -> Result<(), ApiError> {
        let Some(parent) = &self.parent else {
            return Ok(());
        };

        let values = self
            .vars
            .resolve_all_vars(&Reference::current_session(), &self.info_namespace)
            .await?;

        tracing::info!(parent = %parent.instance, location = %parent.location, "publishing session info to parent mux");
        self.transport
            .mux_clear_and_replace(&parent.instance, &parent.location, &self.info_namespace, values)
            .await
            .map_err(ApiError::from)
    }

    /// [`Self::publish_to_parent`], logging instead of failing.
    pub async fn publish(&self) {
        if let Err(e) = self.publish_to_parent().await {
            tracing::warn!(error = %e, "failed to publish to parent mux");
        }
    }

    async fn after_write(&self, namespace: &str) {
        if namespace == self.info_namespace {
            self.publish().await;
        }
    }
}

fn pick(all: &VarValues, keys: &[String]) -> KeyValues {
    keys.iter()
        .map(|key| (key.clone(), all.get(key).cloned()))
        .collect()
}
