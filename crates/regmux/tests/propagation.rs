//! Register propagation across linked instances.

use proptest::prelude::*;
use regmux::core::{
    ApiError, ErrorCode, RegLink, RegisterUpdates, RegisterValues, Regname, RegistryId,
};
use regmux::sync::{Request, SyncAllParams, TransportExt, Transport, VisitedSet};
use regmux_testkit::generators::{connected_topology, register_updates, tree_topology};
use regmux_testkit::{init_tracing, Cluster, Topology};

fn reg(c: &str) -> Regname {
    Regname::parse(c).unwrap()
}

fn updates(entries: &[(&str, Option<&str>)]) -> RegisterUpdates {
    entries
        .iter()
        .map(|(k, v)| (reg(k), v.map(str::to_string)))
        .collect()
}

fn raw(values: &RegisterValues) -> std::collections::BTreeMap<String, String> {
    values
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[tokio::test]
async fn test_ring_of_three_delivers_exactly_once() {
    init_tracing();
    let cluster = Cluster::start(Topology::ring(3)).await;

    let report = cluster
        .write(0, &updates(&[("a", Some("hello"))]))
        .await
        .unwrap();
    // n2 is reached through n1 before n0 gets to it
    assert_eq!(report.delivered, vec![RegLink::new("n1", "0")]);
    assert_eq!(report.skipped, vec![RegLink::new("n2", "0")]);

    assert_eq!(cluster.register_writes(), vec![1, 1, 1]);
    for node in &cluster.nodes {
        assert_eq!(node.host.registers()["a"], "hello");
    }
    cluster.shutdown().await;
}

#[tokio::test]
async fn test_ring_from_every_start() {
    let cluster = Cluster::start(Topology::ring(3)).await;
    for start in 0..3 {
        cluster.reset_calls();
        let mut values = RegisterValues::new();
        values.insert(reg("x"), format!("from {}", start));
        cluster.replace(start, &values).await.unwrap();

        assert_eq!(cluster.register_writes(), vec![1, 1, 1]);
        for node in &cluster.nodes {
            assert_eq!(node.host.registers(), raw(&values));
        }
    }
    cluster.shutdown().await;
}

#[tokio::test]
async fn test_mesh_delivers_exactly_once() {
    let cluster = Cluster::start(Topology::mesh(5)).await;
    cluster.write(2, &updates(&[("m", Some("1"))])).await.unwrap();
    assert_eq!(cluster.register_writes(), vec![1; 5]);
    cluster.shutdown().await;
}

#[tokio::test]
async fn test_partial_sync_semantics() {
    let cluster = Cluster::start(Topology::chain(3)).await;
    for node in &cluster.nodes {
        node.host.set_register("a", Some("old"));
        node.host.set_register("c", Some("untouched"));
    }

    cluster
        .write(0, &updates(&[("a", None), ("b", Some("v"))]))
        .await
        .unwrap();

    for node in &cluster.nodes {
        let registers = node.host.registers();
        assert_eq!(registers.get("a"), None);
        assert_eq!(registers["b"], "v");
        assert_eq!(registers["c"], "untouched");
    }
    cluster.shutdown().await;
}

#[tokio::test]
async fn test_unlinked_sync_rejected_without_forwarding() {
    let cluster = Cluster::start(Topology::chain(2)).await;
    cluster.nodes[0].host.set_register("a", Some("before"));

    // a transport for an instance that is not linked to anyone
    let stranger = cluster.network.transport("stranger".into());
    let mut values = RegisterValues::new();
    values.insert(reg("a"), "after".into());
    let result = stranger
        .request(
            &Cluster::name(0).into(),
            Request::SyncAll(SyncAllParams {
                registry: RegistryId::root(),
                source_link: RegLink::new("stranger", "0"),
                visited_registries: VisitedSet::new(),
                values,
            }),
        )
        .await;

    let err: ApiError = result.unwrap_err().into();
    assert_eq!(err.code(), ErrorCode::RejectedUnlinkedSync);
    assert_eq!(cluster.nodes[0].host.registers()["a"], "before");
    assert_eq!(cluster.register_writes(), vec![0, 0]);
    cluster.shutdown().await;
}

#[tokio::test]
async fn test_link_refcounting() {
    let cluster = Cluster::start(Topology::chain(1)).await;
    let reg_service = cluster.nodes[0].instance.reg();
    let root = RegistryId::root();
    let link = RegLink::new("peer", "0");

    reg_service.add_link(&root, &link).await.unwrap();
    reg_service.add_link(&root, &link).await.unwrap();
    reg_service.remove_link(&root, &link).await.unwrap();
    assert!(reg_service.list_links().await.unwrap().contains(&link));

    reg_service.remove_link(&root, &link).await.unwrap();
    assert!(!reg_service.list_links().await.unwrap().contains(&link));

    // removing an absent link is a no-op
    reg_service.remove_link(&root, &link).await.unwrap();
    assert!(reg_service.list_links().await.unwrap().is_empty());
    cluster.shutdown().await;
}

#[tokio::test]
async fn test_unreachable_peer_does_not_stop_wave() {
    let cluster = Cluster::start(Topology::star(4)).await;
    cluster.nodes[0]
        .instance
        .reg()
        .add_link(&RegistryId::root(), &RegLink::new("offline", "0"))
        .await
        .unwrap();

    let report = cluster.write(0, &updates(&[("z", Some("1"))])).await.unwrap();
    assert_eq!(report.delivered.len(), 3);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, RegLink::new("offline", "0"));
    assert_eq!(cluster.register_writes(), vec![1, 1, 1, 1]);
    cluster.shutdown().await;
}

#[tokio::test]
async fn test_remote_add_link_through_peer_surface() {
    let cluster = Cluster::start(Topology::chain(2)).await;
    let transport = cluster.network.transport(Cluster::name(0).into());
    let target = cluster.nodes[1].instance.root_link();

    transport
        .add_link(&target, RegLink::new("n9", "0"))
        .await
        .unwrap();
    assert!(cluster.nodes[1].host.links().contains(&RegLink::new("n9", "0")));

    transport
        .remove_link(&target, RegLink::new("n9", "0"))
        .await
        .unwrap();
    assert!(!cluster.nodes[1].host.links().contains(&RegLink::new("n9", "0")));
    cluster.shutdown().await;
}

#[tokio::test]
async fn test_one_sided_link_still_reached_through_peer() {
    let cluster = Cluster::start(Topology::chain(3)).await;
    // n0 lists n2, but n2 does not list n0 and rejects it
    cluster.link(0, 2).await;

    let report = cluster
        .write(0, &updates(&[("a", Some("hello"))]))
        .await
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(cluster.register_writes(), vec![1, 1, 1]);
    for node in &cluster.nodes {
        assert_eq!(node.host.registers()["a"], "hello");
    }
    cluster.shutdown().await;
}

#[tokio::test]
async fn test_rejected_hop_reached_through_other_path() {
    let cluster = Cluster::start(Topology::ring(3)).await;
    // n0 calls n1 first; n1 drops n0, so that hop is rejected
    cluster.unlink(1, 0).await;

    let report = cluster
        .write(0, &updates(&[("a", Some("hello"))]))
        .await
        .unwrap();

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, RegLink::new("n1", "0"));
    assert_eq!(report.delivered, vec![RegLink::new("n2", "0")]);
    assert_eq!(cluster.register_writes(), vec![1, 1, 1]);
    assert_eq!(cluster.nodes[1].host.registers()["a"], "hello");
    cluster.shutdown().await;
}

#[tokio::test]
async fn test_transient_host_failure_recovered_through_other_path() {
    let cluster = Cluster::start(Topology::ring(3)).await;
    cluster.nodes[1]
        .host
        .script_failure("list_reg_links", "E5108: temporarily broken");

    let report = cluster
        .write(0, &updates(&[("a", Some("hello"))]))
        .await
        .unwrap();

    assert_eq!(report.failed.len(), 1);
    assert_eq!(cluster.register_writes(), vec![1, 1, 1]);
    for node in &cluster.nodes {
        assert_eq!(node.host.registers()["a"], "hello");
    }
    cluster.shutdown().await;
}

#[tokio::test]
async fn test_diamond_delivers_exactly_once() {
    let diamond = Topology::from_edges(4, [(0, 1), (0, 2), (1, 3), (2, 3)]);
    let cluster = Cluster::start(diamond).await;
    cluster.write(0, &updates(&[("d", Some("1"))])).await.unwrap();
    assert_eq!(cluster.register_writes(), vec![1; 4]);
    cluster.shutdown().await;
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn wave_reaches_every_node_exactly_once(
        topology in connected_topology(6),
        values in register_updates(4),
        start in any::<prop::sample::Index>(),
    ) {
        let start = start.index(topology.size);
        let size = topology.size;
        let expected: std::collections::BTreeMap<String, String> = values
            .iter()
            .filter_map(|(k, v)| v.clone().map(|v| (k.to_string(), v)))
            .collect();

        let writes = runtime().block_on(async {
            let cluster = Cluster::start(topology).await;
            cluster.write(start, &values).await.unwrap();
            for node in &cluster.nodes {
                assert_eq!(node.host.registers(), expected);
            }
            let writes = cluster.register_writes();
            cluster.shutdown().await;
            writes
        });

        prop_assert_eq!(writes, vec![1; size]);
    }

    #[test]
    fn wave_survives_a_broken_edge(
        topology in connected_topology(6),
        values in register_updates(4),
        start in any::<prop::sample::Index>(),
        broken in any::<prop::sample::Index>(),
    ) {
        let start = start.index(topology.size);
        let edges: Vec<(usize, usize)> = topology.edges.iter().copied().collect();
        let (a, b) = edges[broken.index(edges.len())];
        let healthy = topology.without_edge(a, b);
        let reachable = healthy.reachable(start);
        let size = topology.size;
        let expected: std::collections::BTreeMap<String, String> = values
            .iter()
            .filter_map(|(k, v)| v.clone().map(|v| (k.to_string(), v)))
            .collect();

        let (writes, registers) = runtime().block_on(async {
            let cluster = Cluster::start(topology).await;
            // b forgets a: a's syncs to b are rejected and b never sends to a
            cluster.unlink(b, a).await;
            cluster.write(start, &values).await.unwrap();
            let registers: Vec<_> = cluster.nodes.iter().map(|node| node.host.registers()).collect();
            let writes = cluster.register_writes();
            cluster.shutdown().await;
            (writes, registers)
        });

        for node in 0..size {
            if reachable.contains(&node) {
                prop_assert_eq!(writes[node], 1);
                prop_assert_eq!(&registers[node], &expected);
            } else {
                prop_assert_eq!(writes[node], 0);
                prop_assert!(registers[node].is_empty());
            }
        }
    }

    #[test]
    fn trees_deliver_exactly_once(
        topology in tree_topology(7),
        values in register_updates(3),
    ) {
        let size = topology.size;
        let writes = runtime().block_on(async {
            let cluster = Cluster::start(topology).await;
            cluster.write(0, &values).await.unwrap();
            let writes = cluster.register_writes();
            cluster.shutdown().await;
            writes
        });
        prop_assert_eq!(writes, vec![1; size]);
    }
}
