//! Flood propagation of register writes.
//!
//! A write starts a wave at one registry. The forwarder adds itself to the
//! wave's visited set and walks its links in order, skipping any link the
//! wave has already reached. Each receiver that accepts the wave applies it,
//! continues the flood to its own links the same way, and replies with the
//! visited set it ended up with. The forwarder merges that reply before it
//! calls its next link.
//!
//! The wave is a depth-first traversal of the link graph: on any topology
//! every registry reachable through accepting links applies it exactly once.
//! A target is only marked visited once it has accepted, so a hop that fails
//! or is rejected leaves the target open to every other path.

use regmux_core::{InstanceId, LinkTable, RegLink, RegisterUpdates, RegisterValues, RegistryId};

use crate::error::SyncError;
use crate::messages::{Request, Response, SyncAllParams, SyncMultipleParams, VisitedSet};
use crate::transport::Transport;

/// Outcome of one forwarding step.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FanOutReport {
    /// Links that accepted the wave from this step.
    pub delivered: Vec<RegLink>,
    /// Links whose delivery failed; the error has been logged.
    pub failed: Vec<(RegLink, SyncError)>,
    /// Links skipped because the wave had already reached them.
    pub skipped: Vec<RegLink>,
    /// Every registry the wave is known to have reached, this one included.
    pub visited: VisitedSet,
}

impl FanOutReport {
    /// Whether every targeted link accepted the wave.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Forwards sync waves from one instance to its links.
pub struct SyncPropagator<T: Transport> {
    transport: T,
}

impl<T: Transport> SyncPropagator<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// The instance waves are forwarded from.
    pub fn this_instance(&self) -> &InstanceId {
        self.transport.local_instance()
    }

    /// Forward a full replacement of `registry` to every unvisited link.
    pub async fn forward_sync_all(
        &self,
        registry: &RegistryId,
        visited: VisitedSet,
        links: &LinkTable,
        values: &RegisterValues,
    ) -> FanOutReport {
        self.forward(registry, visited, links, |target, source_link, visited| {
            Request::SyncAll(SyncAllParams {
                registry: target.registry.clone(),
                source_link,
                visited_registries: visited,
                values: values.clone(),
            })
        })
        .await
    }

    /// Forward a partial update of `registry` to every unvisited link.
    pub async fn forward_sync_multiple(
        &self,
        registry: &RegistryId,
        visited: VisitedSet,
        links: &LinkTable,
        values: &RegisterUpdates,
    ) -> FanOutReport {
        self.forward(registry, visited, links, |target, source_link, visited| {
            Request::SyncMultiple(SyncMultipleParams {
                registry: target.registry.clone(),
                source_link,
                visited_registries: visited,
                values: values.clone(),
            })
        })
        .await
    }

    async fn forward<F>(
        &self,
        registry: &RegistryId,
        mut visited: VisitedSet,
        links: &LinkTable,
        build: F,
    ) -> FanOutReport
    where
        F: Fn(&RegLink, RegLink, VisitedSet) -> Request,
    {
        let source_link = RegLink::new(self.this_instance().clone(), registry.clone());
        visited.insert(source_link.clone());

        let mut report = FanOutReport::default();
        for target in links.links() {
            if visited.contains(&target) {
                report.skipped.push(target);
                continue;
            }

            let request = build(&target, source_link.clone(), visited.clone());
            match self.transport.request(&target.instance, request).await {
                Ok(Response::Synced { visited: reached }) => {
                    visited.extend(reached);
                    visited.insert(target.clone());
                    report.delivered.push(target);
                }
                Ok(other) => {
                    tracing::warn!(peer = %target, reply = ?other, "unexpected reply to sync");
                    report.failed.push((
                        target,
                        SyncError::TransportError(format!("unexpected reply: {:?}", other)),
                    ));
                }
                Err(e) => {
                    tracing::warn!(
                        from = %source_link,
                        peer = %target,
                        error = %e,
                        "failed to forward sync"
                    );
                    report.failed.push((target, e));
                }
            }
        }

        report.visited = visited;
        report
    }
}
