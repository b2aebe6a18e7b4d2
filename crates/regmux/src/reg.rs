//! Register service: local register access, link management and the
//! receiving side of sync waves.

use std::collections::BTreeMap;

use regmux_core::{
    ApiError, LinkTable, RegLink, RegisterUpdates, RegisterValues, Regname, RegistryId,
    RejectedUnlinkedSync,
};
use regmux_host::RegClient;
use regmux_sync::{FanOutReport, SyncAllParams, SyncMultipleParams, SyncPropagator, Transport, VisitedSet};
use serde::{Deserialize, Serialize};

/// Whether a registry exists on this instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryInfo {
    pub exists: bool,
}

/// Register slots of this instance and their propagation to linked peers.
///
/// An instance owns a single registry, its root. Registry arguments address
/// it on the peer surface and name the source of forwarded waves.
pub struct RegService<T: Transport> {
    registers: RegClient,
    propagator: SyncPropagator<T>,
}

impl<T: Transport> RegService<T> {
    pub fn new(registers: RegClient, transport: T) -> Self {
        Self {
            registers,
            propagator: SyncPropagator::new(transport),
        }
    }

    pub fn get_registry_info(&self, registry: &RegistryId) -> RegistryInfo {
        RegistryInfo {
            exists: registry.is_root(),
        }
    }

    /// Values of `keys`; `None` where the register is unset.
    pub async fn get_multiple(
        &self,
        _registry: &RegistryId,
        keys: &[Regname],
    ) -> Result<BTreeMap<Regname, Option<String>>, ApiError> {
        let all = self.registers.get_all_registers().await?;
        Ok(keys
            .iter()
            .map(|key| (*key, all.get(key).cloned()))
            .collect())
    }

    pub async fn get_all(&self, _registry: &RegistryId) -> Result<RegisterValues, ApiError> {
        Ok(self.registers.get_all_registers().await?)
    }

    /// Apply a partial update locally, then start a wave.
    pub async fn set_multiple(
        &self,
        registry: &RegistryId,
        values: &RegisterUpdates,
    ) -> Result<FanOutReport, ApiError> {
        self.registers.set_multiple_registers(values).await?;
        let Some(links) = self.links_for_wave().await else {
            return Ok(FanOutReport::default());
        };
        Ok(self
            .propagator
            .forward_sync_multiple(registry, VisitedSet::new(), &links, values)
            .await)
    }

    /// Replace every register locally, then start a wave.
    pub async fn clear_and_replace(
        &self,
        registry: &RegistryId,
        values: &RegisterValues,
    ) -> Result<FanOutReport, ApiError> {
        self.registers.clear_and_replace_registers(values).await?;
        let Some(links) = self.links_for_wave().await else {
            return Ok(FanOutReport::default());
        };
        Ok(self
            .propagator
            .forward_sync_all(registry, VisitedSet::new(), &links, values)
            .await)
    }

    pub async fn add_link(&self, _registry: &RegistryId, link: &RegLink) -> Result<(), ApiError> {
        tracing::info!(link = %link, "adding register link");
        Ok(self.registers.add_link(link).await?)
    }

    pub async fn remove_link(&self, _registry: &RegistryId, link: &RegLink) -> Result<(), ApiError> {
        tracing::info!(link = %link, "removing register link");
        Ok(self.registers.remove_link(link).await?)
    }

    /// Links currently visible to propagation.
    pub async fn list_links(&self) -> Result<LinkTable, ApiError> {
        Ok(self.registers.list_links().await?)
    }

    /// Accept a full replacement from a linked registry and continue the wave.
    pub async fn sync_all(&self, params: SyncAllParams) -> Result<FanOutReport, ApiError> {
        let links = self.accept_wave(&params.source_link).await?;
        self.registers.clear_and_replace_registers(&params.values).await?;
        Ok(self
            .propagator
            .forward_sync_all(&params.registry, params.visited_registries, &links, &params.values)
            .await)
    }

    /// Accept a partial update from a linked registry and continue the wave.
    pub async fn sync_multiple(&self, params: SyncMultipleParams) -> Result<FanOutReport, ApiError> {
        let links = self.accept_wave(&params.source_link).await?;
        self.registers.set_multiple_registers(&params.values).await?;
        Ok(self
            .propagator
            .forward_sync_multiple(&params.registry, params.visited_registries, &links, &params.values)
            .await)
    }

    /// The current links, if `source` is one of them.
    async fn accept_wave(&self, source: &RegLink) -> Result<LinkTable, ApiError> {
        let links = self.registers.list_links().await?;
        if !links.contains(source) {
            tracing::warn!(source = %source, "rejecting sync from unlinked registry");
            return Err(RejectedUnlinkedSync {
                sender: Some(source.clone()),
            }
            .into());
        }
        Ok(links)
    }

    /// Links for a wave started here. The local write already happened, so a
    /// failure to read links only costs the wave.
    async fn links_for_wave(&self) -> Option<LinkTable> {
        match self.registers.list_links().await {
            Ok(links) => Some(links),
            Err(e) => {
                tracing::warn!(error = %e, "could not list links, not propagating write");
                None
            }
        }
    }
}
