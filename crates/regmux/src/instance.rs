//! The Instance: one process fronting one host on the peer network.
//!
//! An instance owns the host bridge, serves the mux, register and extension
//! services over it, and answers peer requests.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use regmux_core::{ApiError, InstanceId, RegLink};
use regmux_host::{Host, HostBridge, RegClient, ShutdownMode, VarClient};
use regmux_sync::{Network, Request, RequestHandler, Response, Transport, TransportExt};

use crate::config::InstanceConfig;
use crate::error::{InstanceError, Result};
use crate::ext::ExtensionService;
use crate::mux::MuxService;
use crate::reg::RegService;

type NetTransport<N> = <N as Network>::Transport;

/// A running instance.
pub struct Instance<N: Network> {
    config: Arc<InstanceConfig>,
    network: N,
    transport: NetTransport<N>,
    bridge: HostBridge,
    mux: MuxService<NetTransport<N>>,
    reg: RegService<NetTransport<N>>,
    ext: ExtensionService<NetTransport<N>>,
}

impl<N: Network + 'static> Instance<N> {
    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Start an instance.
    ///
    /// Starts the host bridge and probes the host; a host that does not
    /// answer aborts startup. The instance then joins `network`, links its
    /// root registry with the parent registry in both directions, publishes
    /// to the parent mux and syncs registers down. Those last steps are
    /// optimistic: failures are logged.
    pub async fn start<H: Host>(config: InstanceConfig, host: H, network: N) -> Result<Arc<Self>> {
        config.validate()?;
        let config = Arc::new(config);

        let bridge =
            HostBridge::start(host, config.bridge_config()).map_err(InstanceError::BridgeStart)?;
        let registers = RegClient::new(bridge.clone());
        if let Err(e) = registers.mark_loaded().await {
            bridge.shutdown(ShutdownMode::Abandon);
            return Err(InstanceError::HostNotLoaded(e));
        }
        tracing::info!(instance = %config.instance, "host loaded");

        let transport = network.connect(config.instance.clone());
        let mux = MuxService::new(
            VarClient::new(bridge.clone()),
            transport.clone(),
            config.parent_mux.clone(),
            config.info_namespace.clone(),
        );
        let reg = RegService::new(registers.clone(), transport.clone());
        let ext = ExtensionService::new(
            Arc::clone(&config),
            mux.clone(),
            registers,
            transport.clone(),
        );

        let instance = Arc::new(Self {
            config,
            network,
            transport,
            bridge,
            mux,
            reg,
            ext,
        });

        let handler: Arc<dyn RequestHandler> = instance.clone();
        let handler: Weak<dyn RequestHandler> = Arc::downgrade(&handler);
        instance
            .network
            .join(instance.config.instance.clone(), handler)
            .await;

        instance.link_parent().await;
        instance.mux.publish().await;
        if let Err(e) = instance.ext.sync_registers_down().await {
            tracing::warn!(error = %e, "initial register sync failed");
        }

        tracing::info!(instance = %instance.config.instance, "instance started");
        Ok(instance)
    }

    /// Stop the instance.
    ///
    /// Removes this registry from the parent's links and the parent from
    /// ours (best-effort), leaves the network and closes the bridge after
    /// queued host calls have run.
    pub async fn shutdown(&self) {
        if let Some(parent) = &self.config.parent_reg {
            let parent = parent.link();
            if let Err(e) = self
                .transport
                .remove_link(&parent, self.config.root_link())
                .await
            {
                tracing::warn!(parent = %parent, error = %e, "failed to unlink from parent");
            }
            if let Err(e) = self.reg.remove_link(&self.config.root_registry, &parent).await {
                tracing::warn!(parent = %parent, error = %e, "failed to drop parent link");
            }
        }

        self.network.leave(&self.config.instance).await;
        self.bridge.shutdown(ShutdownMode::Drain);
        tracing::info!(instance = %self.config.instance, "instance stopped");
    }

    /// Resolves once the host worker has exited.
    pub async fn closed(&self) {
        self.bridge.closed().await;
    }

    async fn link_parent(&self) {
        let Some(parent) = &self.config.parent_reg else {
            return;
        };
        let parent = parent.link();

        if let Err(e) = self.reg.add_link(&self.config.root_registry, &parent).await {
            tracing::warn!(parent = %parent, error = %e, "failed to link parent registry");
        }
        if let Err(e) = self.transport.add_link(&parent, self.config.root_link()).await {
            tracing::warn!(parent = %parent, error = %e, "failed to link into parent registry");
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn id(&self) -> &InstanceId {
        &self.config.instance
    }

    pub fn config(&self) -> &InstanceConfig {
        &self.config
    }

    /// This instance's root registry as a link target.
    pub fn root_link(&self) -> RegLink {
        self.config.root_link()
    }

    pub fn mux(&self) -> &MuxService<NetTransport<N>> {
        &self.mux
    }

    pub fn reg(&self) -> &RegService<NetTransport<N>> {
        &self.reg
    }

    pub fn ext(&self) -> &ExtensionService<NetTransport<N>> {
        &self.ext
    }
}

#[async_trait]
impl<N: Network + 'static> RequestHandler for Instance<N> {
    async fn handle(&self, request: Request) -> std::result::Result<Response, ApiError> {
        tracing::debug!(instance = %self.config.instance, method = request.method(), "handling peer request");
        match request {
            Request::GetAll { registry } => Ok(Response::Registers {
                values: self.reg.get_all(&registry).await?,
            }),
            Request::SyncAll(params) => Ok(Response::Synced {
                visited: self.reg.sync_all(params).await?.visited,
            }),
            Request::SyncMultiple(params) => Ok(Response::Synced {
                visited: self.reg.sync_multiple(params).await?.visited,
            }),
            Request::AddLink { registry, link } => {
                self.reg.add_link(&registry, &link).await?;
                Ok(Response::Done)
            }
            Request::RemoveLink { registry, link } => {
                self.reg.remove_link(&registry, &link).await?;
                Ok(Response::Done)
            }
            Request::MuxClearAndReplace {
                location,
                namespace,
                values,
            } => {
                self.mux.clear_and_replace(&location, &namespace, &values).await?;
                Ok(Response::Done)
            }
        }
    }
}
