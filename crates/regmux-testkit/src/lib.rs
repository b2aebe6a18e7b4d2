//! # regmux testkit
//!
//! Testing utilities for regmux.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: clusters of in-memory instances linked per a topology
//! - **Topologies**: ring, chain, mesh and star builders
//! - **Generators**: proptest strategies for register maps and link graphs
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use regmux_testkit::{Cluster, Topology};
//! use regmux_core::{RegisterUpdates, Regname};
//!
//! async fn example() {
//!     let cluster = Cluster::start(Topology::ring(3)).await;
//!
//!     let mut values = RegisterUpdates::new();
//!     values.insert(Regname::UNNAMED, Some("hello".into()));
//!     cluster.write(0, &values).await.unwrap();
//!
//!     assert_eq!(cluster.register_writes(), vec![1, 1, 1]);
//!     cluster.shutdown().await;
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use regmux_testkit::generators::{connected_topology, register_updates};
//!
//! proptest! {
//!     #[test]
//!     fn every_node_is_reached(topology in connected_topology(6), values in register_updates(4)) {
//!         // start a cluster, write at node 0, check every node
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{init_tracing, Cluster, MemoryInstance, Node, Topology};
pub use generators::{connected_topology, register_updates, register_values, regname, tree_topology};
