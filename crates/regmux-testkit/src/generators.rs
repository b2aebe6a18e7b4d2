//! Proptest generators for property-based testing.

use proptest::prelude::*;

use regmux_core::{RegisterUpdates, RegisterValues, Regname};

use crate::fixtures::Topology;

/// Characters accepted as register names.
const REGNAME_CHARS: &str = "\"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ-*+_/:.%#=";

/// Generate a valid register name.
pub fn regname() -> impl Strategy<Value = Regname> {
    prop::sample::select(REGNAME_CHARS.chars().collect::<Vec<_>>())
        .prop_filter_map("valid regname", |c| Regname::parse(&c.to_string()).ok())
}

/// Generate a register value.
pub fn register_value() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{0,16}"
}

/// Generate a full register map.
pub fn register_values(max_len: usize) -> impl Strategy<Value = RegisterValues> {
    prop::collection::btree_map(regname(), register_value(), 0..=max_len)
}

/// Generate a partial update; `None` entries delete.
pub fn register_updates(max_len: usize) -> impl Strategy<Value = RegisterUpdates> {
    prop::collection::btree_map(regname(), prop::option::of(register_value()), 1..=max_len)
}

/// Generate a connected graph of `2..=max_nodes` nodes: a random spanning
/// tree plus up to `max_nodes` extra edges, so cycles are common.
pub fn connected_topology(max_nodes: usize) -> impl Strategy<Value = Topology> {
    (2..=max_nodes.max(2)).prop_flat_map(move |size| {
        let tree = prop::collection::vec(any::<prop::sample::Index>(), size - 1);
        let extra = prop::collection::vec((0..size, 0..size), 0..=max_nodes);
        (tree, extra).prop_map(move |(tree, extra)| {
            // node i + 1 attaches to some node before it
            let tree_edges = tree
                .into_iter()
                .enumerate()
                .map(|(i, parent)| (parent.index(i + 1), i + 1));
            Topology::from_edges(size, tree_edges.chain(extra))
        })
    })
}

/// Generate a random tree of `2..=max_nodes` nodes.
pub fn tree_topology(max_nodes: usize) -> impl Strategy<Value = Topology> {
    (2..=max_nodes.max(2)).prop_flat_map(|size| {
        prop::collection::vec(any::<prop::sample::Index>(), size - 1).prop_map(move |tree| {
            Topology::from_edges(
                size,
                tree.into_iter()
                    .enumerate()
                    .map(|(i, parent)| (parent.index(i + 1), i + 1)),
            )
        })
    })
}
