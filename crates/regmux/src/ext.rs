//! Extension service: actions the host side triggers on its own process.

use std::sync::Arc;

use regmux_core::{ApiError, RegisterUpdates, Regname};
use regmux_host::RegClient;
use regmux_sync::{FanOutReport, SyncPropagator, Transport, TransportExt, VisitedSet};

use crate::config::InstanceConfig;
use crate::mux::MuxService;

/// Host-triggered publishing and syncing.
pub struct ExtensionService<T: Transport + Clone> {
    config: Arc<InstanceConfig>,
    mux: MuxService<T>,
    registers: RegClient,
    transport: T,
    propagator: SyncPropagator<T>,
}

impl<T: Transport + Clone> ExtensionService<T> {
    pub fn new(config: Arc<InstanceConfig>, mux: MuxService<T>, registers: RegClient, transport: T) -> Self {
        Self {
            config,
            mux,
            registers,
            propagator: SyncPropagator::new(transport.clone()),
            transport,
        }
    }

    /// Publish the resolved session info namespace to the parent mux.
    pub async fn publish_to_parent(&self) -> Result<(), ApiError> {
        self.mux.publish_to_parent().await
    }

    /// Replace local registers with the parent registry's.
    ///
    /// A parent that cannot be read is logged and skipped; failing to write
    /// what was read is an error.
    pub async fn sync_registers_down(&self) -> Result<(), ApiError> {
        let Some(parent) = &self.config.parent_reg else {
            return Ok(());
        };

        tracing::info!(parent = %parent.link(), "syncing registers down from parent");
        let values = match self
            .transport
            .get_all_registers(&parent.instance, &parent.registry)
            .await
        {
            Ok(values) => values,
            Err(e) => {
                tracing::error!(parent = %parent.link(), error = %e, "failed to get parent registers");
                return Ok(());
            }
        };

        self.registers
            .clear_and_replace_registers(&values)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "failed to write parent registers");
                ApiError::from(e)
            })
    }

    /// Start a partial wave for one register as the host currently has it.
    /// An unset register propagates as a deletion.
    pub async fn publish_registers(&self, key: Regname) -> Result<FanOutReport, ApiError> {
        let (links, values) = tokio::join!(
            self.registers.list_links(),
            self.registers.get_all_registers()
        );
        let links = links?;
        let values = values?;

        let mut update = RegisterUpdates::new();
        update.insert(key, values.get(&key).cloned());
        Ok(self
            .propagator
            .forward_sync_multiple(&self.config.root_registry, VisitedSet::new(), &links, &update)
            .await)
    }
}
