//! Test fixtures and helpers.
//!
//! A [`Cluster`] is a set of instances on one in-memory network, each backed
//! by its own [`MemoryHost`], with their root registries linked according to
//! a [`Topology`].

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::future::join_all;
use regmux::{Instance, InstanceConfig};
use regmux_core::{ApiError, RegisterUpdates, RegisterValues, RegistryId};
use regmux_host::MemoryHost;
use regmux_sync::{FanOutReport, MemoryNetwork};

/// An instance on the in-memory network.
pub type MemoryInstance = Instance<Arc<MemoryNetwork>>;

/// Host functions that write registers.
const REGISTER_WRITES: [&str; 2] = ["set_multiple_registers", "clear_and_replace_registers"];

/// An undirected link graph over nodes `0..size`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    pub size: usize,
    pub edges: BTreeSet<(usize, usize)>,
}

impl Topology {
    /// A graph from explicit edges. Self-loops are dropped and each edge is
    /// stored once, smaller node first.
    pub fn from_edges(size: usize, edges: impl IntoIterator<Item = (usize, usize)>) -> Self {
        let edges = edges
            .into_iter()
            .filter(|(a, b)| a != b && *a < size && *b < size)
            .map(|(a, b)| (a.min(b), a.max(b)))
            .collect();
        Self { size, edges }
    }

    /// `0 - 1 - ... - (size-1) - 0`.
    pub fn ring(size: usize) -> Self {
        Self::from_edges(size, (0..size).map(|i| (i, (i + 1) % size)))
    }

    /// `0 - 1 - ... - (size-1)`.
    pub fn chain(size: usize) -> Self {
        Self::from_edges(size, (1..size).map(|i| (i - 1, i)))
    }

    /// Every node linked to every other.
    pub fn mesh(size: usize) -> Self {
        Self::from_edges(
            size,
            (0..size).flat_map(|a| (a + 1..size).map(move |b| (a, b))),
        )
    }

    /// Node 0 linked to every other node.
    pub fn star(size: usize) -> Self {
        Self::from_edges(size, (1..size).map(|i| (0, i)))
    }

    /// Nodes reachable from `start`, `start` included.
    pub fn reachable(&self, start: usize) -> BTreeSet<usize> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            if !seen.insert(node) {
                continue;
            }
            for (a, b) in &self.edges {
                if *a == node {
                    stack.push(*b);
                } else if *b == node {
                    stack.push(*a);
                }
            }
        }
        seen
    }

    /// The same graph without the edge between `a` and `b`.
    pub fn without_edge(&self, a: usize, b: usize) -> Self {
        Self::from_edges(
            self.size,
            self.edges
                .iter()
                .copied()
                .filter(|edge| *edge != (a.min(b), a.max(b))),
        )
    }

    /// Whether no two distinct paths connect any pair of nodes.
    pub fn is_forest(&self) -> bool {
        let mut parent: Vec<usize> = (0..self.size).collect();
        fn find(parent: &mut [usize], x: usize) -> usize {
            let mut root = x;
            while parent[root] != root {
                root = parent[root];
            }
            parent[x] = root;
            root
        }
        for (a, b) in &self.edges {
            let (ra, rb) = (find(&mut parent, *a), find(&mut parent, *b));
            if ra == rb {
                return false;
            }
            parent[ra] = rb;
        }
        true
    }
}

/// One instance of a cluster.
pub struct Node {
    pub instance: Arc<MemoryInstance>,
    pub host: MemoryHost,
}

impl Node {
    /// How many register writes reached this node's host.
    pub fn register_writes(&self) -> usize {
        self.host
            .calls()
            .iter()
            .filter(|call| REGISTER_WRITES.contains(&call.as_str()))
            .count()
    }
}

/// Instances on one in-memory network, linked per a topology.
pub struct Cluster {
    pub network: Arc<MemoryNetwork>,
    pub nodes: Vec<Node>,
    pub topology: Topology,
}

impl Cluster {
    /// Start `topology.size` instances named `n0`, `n1`, ... and link the
    /// root registries of every edge in both directions.
    pub async fn start(topology: Topology) -> Self {
        let network = MemoryNetwork::new();
        let mut nodes = Vec::with_capacity(topology.size);
        for i in 0..topology.size {
            let host = MemoryHost::new();
            let instance = match Instance::start(
                InstanceConfig::new(Self::name(i)),
                host.clone(),
                network.clone(),
            )
            .await
            {
                Ok(instance) => instance,
                Err(e) => panic!("failed to start {}: {}", Self::name(i), e),
            };
            nodes.push(Node { instance, host });
        }

        let cluster = Self {
            network,
            nodes,
            topology,
        };
        for (a, b) in cluster.topology.edges.clone() {
            cluster.link(a, b).await;
            cluster.link(b, a).await;
        }
        cluster.reset_calls();
        cluster
    }

    /// Instance name of node `i`.
    pub fn name(i: usize) -> String {
        format!("n{}", i)
    }

    /// Add node `to`'s root registry to node `from`'s links.
    pub async fn link(&self, from: usize, to: usize) {
        let target = self.nodes[to].instance.root_link();
        if let Err(e) = self.nodes[from]
            .instance
            .reg()
            .add_link(&RegistryId::root(), &target)
            .await
        {
            panic!("failed to link {} -> {}: {}", from, to, e);
        }
    }

    /// Drop node `to`'s root registry from node `from`'s links.
    pub async fn unlink(&self, from: usize, to: usize) {
        let target = self.nodes[to].instance.root_link();
        if let Err(e) = self.nodes[from]
            .instance
            .reg()
            .remove_link(&RegistryId::root(), &target)
            .await
        {
            panic!("failed to unlink {} -> {}: {}", from, to, e);
        }
    }

    /// Apply a partial update at node `i` and propagate it.
    pub async fn write(&self, i: usize, values: &RegisterUpdates) -> Result<FanOutReport, ApiError> {
        self.nodes[i]
            .instance
            .reg()
            .set_multiple(&RegistryId::root(), values)
            .await
    }

    /// Replace every register at node `i` and propagate it.
    pub async fn replace(&self, i: usize, values: &RegisterValues) -> Result<FanOutReport, ApiError> {
        self.nodes[i]
            .instance
            .reg()
            .clear_and_replace(&RegistryId::root(), values)
            .await
    }

    /// Register writes per node since the last reset.
    pub fn register_writes(&self) -> Vec<usize> {
        self.nodes.iter().map(Node::register_writes).collect()
    }

    /// Forget recorded host calls, so counts cover only what follows.
    pub fn reset_calls(&self) {
        for node in &self.nodes {
            node.host.clear_calls();
        }
    }

    /// Shut every instance down and wait for their host workers.
    pub async fn shutdown(self) {
        join_all(self.nodes.iter().map(|node| async {
            node.instance.shutdown().await;
            node.instance.closed().await;
        }))
        .await;
    }
}

/// Install a test-friendly tracing subscriber; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
