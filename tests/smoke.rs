// Copyright 2026 Floodcast Contributors.
//
// Permission is hereby granted, free of charge, to any person obtaining a
// copy of this software and associated documentation files (the "Software"),
// to deal in the Software without restriction, including without limitation
// the rights to use, copy, modify, merge, publish, distribute, sublicense,
// and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS
// OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
// FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
// DEALINGS IN THE SOFTWARE.

use std::collections::HashSet;
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use quickcheck::{QuickCheck, TestResult};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::sync::mpsc;
use tokio::time::timeout;

use floodcast::memory::{MemoryNetwork, MemoryTransport};
use floodcast::{
    Floodcast, FloodcastConfig, FloodcastEvent, LengthPrefixCodec, NodeId, Packet, PacketCodec,
};

const WAIT: Duration = Duration::from_secs(10);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn node(i: usize) -> NodeId {
    NodeId::new((i as u64).to_be_bytes().to_vec())
}

fn config(i: usize) -> FloodcastConfig {
    FloodcastConfig::builder()
        .id(node(i))
        .max_age(Duration::from_millis(500))
        .heartbeat_interval(Duration::from_millis(100))
        .build()
}

/// Builds `n` open engines wired over the given undirected edges. Local
/// deliveries from every node arrive on the returned channel tagged with
/// the node index.
async fn build_network(
    n: usize,
    edges: &[(usize, usize)],
    pull: bool,
) -> (
    MemoryNetwork,
    Vec<Floodcast<MemoryTransport>>,
    mpsc::UnboundedReceiver<(usize, Packet)>,
) {
    let network = MemoryNetwork::new();

    let mut neighbors: Vec<Vec<NodeId>> = vec![Vec::new(); n];
    for &(a, b) in edges {
        neighbors[a].push(node(b));
        neighbors[b].push(node(a));
    }
    for (i, list) in neighbors.iter().enumerate() {
        network.set_neighbors(&node(i), list.clone());
    }

    let (deliveries_tx, deliveries_rx) = mpsc::unbounded_channel();
    let mut engines = Vec::with_capacity(n);
    for i in 0..n {
        let transport = if pull {
            network.pull_transport(node(i))
        } else {
            network.transport(node(i))
        };
        let (engine, mut events) = Floodcast::new(transport, config(i));
        engine.open().await.unwrap();

        let deliveries_tx = deliveries_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let FloodcastEvent::Message(packet) = event {
                    let _ = deliveries_tx.send((i, packet));
                }
            }
        });
        engines.push(engine);
    }

    // Push-mode engines learn their neighbors asynchronously; wait until
    // every snapshot is in place before publishing.
    if !pull {
        timeout(WAIT, async {
            for (i, engine) in engines.iter().enumerate() {
                while engine.peer_count() < neighbors[i].len() {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            }
        })
        .await
        .expect("peer snapshots never settled");
    }

    (network, engines, deliveries_rx)
}

async fn close_all(engines: &[Floodcast<MemoryTransport>]) {
    for engine in engines {
        engine.close().await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn binary_tree_floods_to_every_node() {
    init_tracing();
    let n = 63;
    let edges: Vec<(usize, usize)> = (1..n).map(|i| ((i - 1) / 2, i)).collect();
    let (network, engines, mut deliveries) = build_network(n, &edges, false).await;

    engines[0].publish("hello").await.unwrap();

    let mut counts = vec![0usize; n];
    for _ in 0..n - 1 {
        let (i, packet) = timeout(WAIT, deliveries.recv())
            .await
            .expect("flood stalled")
            .expect("delivery channel closed");
        assert_eq!(packet.data, Bytes::from_static(b"hello"));
        counts[i] += 1;
    }

    // Give duplicates a chance to show, then check nobody heard it twice
    // and the origin never heard its own message.
    tokio::time::sleep(Duration::from_millis(300)).await;
    while let Ok((i, _)) = deliveries.try_recv() {
        counts[i] += 1;
    }
    assert_eq!(counts[0], 0);
    assert!(counts[1..].iter().all(|&count| count == 1));

    // No storm: every directed edge carries the message at most once.
    assert!(network.send_count() <= 2 * edges.len());

    // Once max_age passes without traffic, the sweeps drain every cache.
    timeout(WAIT, async {
        while !engines.iter().all(|engine| engine.seen_len() == 0) {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .expect("seen caches never drained");

    close_all(&engines).await;
}

#[tokio::test]
async fn explicit_seqno_round_trips_to_every_receiver() {
    init_tracing();
    let edges: Vec<(usize, usize)> = (1..5).map(|leaf| (0, leaf)).collect();
    let (_network, engines, mut deliveries) = build_network(5, &edges, false).await;

    engines[0]
        .publish_with_seqno("hello", "custom-seqno")
        .await
        .unwrap();

    for _ in 0..4 {
        let (_, packet) = timeout(WAIT, deliveries.recv())
            .await
            .expect("flood stalled")
            .expect("delivery channel closed");
        assert_eq!(packet.seqno, Bytes::from_static(b"custom-seqno"));
        assert_eq!(packet.origin, node(0));
        assert_eq!(packet.from, Some(node(0)));
        assert_eq!(packet.data, Bytes::from_static(b"hello"));
    }

    close_all(&engines).await;
}

#[tokio::test]
async fn replayed_frames_deliver_once_and_forward_once() {
    init_tracing();
    let (network, engines, mut deliveries) = build_network(2, &[(0, 1)], false).await;

    // A frame from a foreign origin, relayed by a node that is not even
    // in the directory (that is advisory only).
    let foreign = Packet {
        seqno: Bytes::from_static(b"dup-seq"),
        origin: node(99),
        from: Some(node(98)),
        data: Bytes::from_static(b"payload"),
    };
    let frame = LengthPrefixCodec.encode(&foreign).unwrap();
    for _ in 0..3 {
        assert!(network.inject(&node(0), frame.clone()));
    }

    let mut counts = [0usize; 2];
    for _ in 0..2 {
        let (i, packet) = timeout(WAIT, deliveries.recv())
            .await
            .expect("flood stalled")
            .expect("delivery channel closed");
        assert_eq!(packet.data, Bytes::from_static(b"payload"));
        counts[i] += 1;
    }
    tokio::time::sleep(Duration::from_millis(300)).await;
    while let Ok((i, _)) = deliveries.try_recv() {
        counts[i] += 1;
    }

    // One local delivery each, and the single forward hop 0 -> 1.
    assert_eq!(counts, [1, 1]);
    assert_eq!(network.send_count(), 1);

    close_all(&engines).await;
}

#[tokio::test]
async fn send_failure_to_one_neighbor_does_not_stop_the_wave() {
    init_tracing();
    let network = MemoryNetwork::new();
    // Node 2 is listed as a neighbor but never comes up.
    network.set_neighbors(&node(0), vec![node(1), node(2)]);
    network.set_neighbors(&node(1), vec![node(0)]);

    let (a, mut a_events) = Floodcast::new(network.transport(node(0)), config(0));
    let (b, mut b_events) = Floodcast::new(network.transport(node(1)), config(1));
    a.open().await.unwrap();
    b.open().await.unwrap();
    timeout(WAIT, async {
        while a.peer_count() < 2 || b.peer_count() < 1 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("peer snapshots never settled");

    a.publish("wave").await.unwrap();

    timeout(WAIT, async {
        loop {
            match b_events.next().await.expect("event stream ended") {
                FloodcastEvent::Message(packet) => {
                    assert_eq!(packet.data, Bytes::from_static(b"wave"));
                    break;
                }
                _ => continue,
            }
        }
    })
    .await
    .expect("the live neighbor never got the message");

    let (mut sent_to, mut failed_to) = (Vec::new(), Vec::new());
    timeout(WAIT, async {
        while sent_to.is_empty() || failed_to.is_empty() {
            match a_events.next().await.expect("event stream ended") {
                FloodcastEvent::Sent { peer, .. } => sent_to.push(peer),
                FloodcastEvent::SendError { peer, .. } => failed_to.push(peer),
                _ => {}
            }
        }
    })
    .await
    .expect("send outcomes never reported");
    assert_eq!(sent_to, vec![node(1)]);
    assert_eq!(failed_to, vec![node(2)]);

    a.close().await;
    b.close().await;
}

#[tokio::test]
async fn pull_mode_looks_up_before_each_fanout() {
    init_tracing();
    let (network, engines, mut deliveries) = build_network(2, &[(0, 1)], true).await;

    engines[0].publish("first").await.unwrap();
    let (i, packet) = timeout(WAIT, deliveries.recv())
        .await
        .expect("flood stalled")
        .expect("delivery channel closed");
    assert_eq!(i, 1);
    assert_eq!(packet.data, Bytes::from_static(b"first"));

    // A failing lookup is reported but the previous snapshot still
    // carries the next wave.
    network.poison_lookup(&node(0), true);
    engines[0].publish("second").await.unwrap();

    let (i, packet) = timeout(WAIT, deliveries.recv())
        .await
        .expect("flood stalled despite cached snapshot")
        .expect("delivery channel closed");
    assert_eq!(i, 1);
    assert_eq!(packet.data, Bytes::from_static(b"second"));

    close_all(&engines).await;
}

#[test]
fn random_connected_graphs_flood_fully() {
    init_tracing();

    fn prop(n: u8, seed: u64) -> TestResult {
        let n = n as usize;
        if !(2..=24).contains(&n) {
            return TestResult::discard();
        }

        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async move {
            let mut rng = StdRng::seed_from_u64(seed);

            // A random spanning tree keeps the graph connected; extra
            // edges add the redundant paths flooding has to cope with.
            let mut edges: Vec<(usize, usize)> = (1..n).map(|i| (rng.gen_range(0..i), i)).collect();
            for _ in 0..n / 2 {
                let a = rng.gen_range(0..n);
                let b = rng.gen_range(0..n);
                let edge = (a.min(b), a.max(b));
                if a != b && !edges.contains(&edge) {
                    edges.push(edge);
                }
            }

            let (network, engines, mut deliveries) = build_network(n, &edges, false).await;
            engines[0].publish("flood").await.unwrap();

            let mut delivered = HashSet::new();
            while delivered.len() < n - 1 {
                let (i, packet) = timeout(WAIT, deliveries.recv())
                    .await
                    .expect("flood stalled")
                    .expect("delivery channel closed");
                assert_eq!(packet.data, Bytes::from_static(b"flood"));
                assert!(delivered.insert(i), "node {i} delivered twice");
            }

            assert!(network.send_count() <= 2 * edges.len());
            close_all(&engines).await;
        });
        TestResult::passed()
    }

    QuickCheck::new()
        .tests(10)
        .max_tests(100)
        .quickcheck(prop as fn(u8, u64) -> TestResult);
}
