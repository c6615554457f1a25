//! Relay behavior when the parent misbehaves.
//!
//! - Parent host up but not listening (connection refused)
//! - Partition between a relay and the root, then repair
//! - Slow links (fixed latency on every message)
//!
//! In every case the tick loop must keep running, and events that could not
//! be delivered go to the local backup until its budget is spent.

use std::{sync::Arc, time::Duration};

use chrono::{TimeZone, Utc};
use odonet_core::device::TickResult;
use odonet_harness::{
    MeshNode, RecordingHost, Script, ScriptedDevices, SimEnv, SimTransport, eventually, mesh::ROOT_PORT,
};
use odonet_proto::{Event, NodeId};
use odonet_server::{EventStore, RelayNode, RootNode};

fn id(c: char) -> NodeId {
    NodeId::new(c).expect("valid id")
}

fn event(minute: u32) -> TickResult {
    let started_at = Utc.with_ymd_and_hms(2024, 6, 1, 9, minute, 0).single().expect("valid time");
    TickResult { image: None, event: Some(Event::new(started_at, None)) }
}

fn relay_b(node: MeshNode, script: &Script, store: EventStore) -> Arc<RelayNode<SimTransport, SimEnv, RecordingHost>> {
    Arc::new(
        RelayNode::new(
            node.config().expect("b config"),
            SimTransport,
            SimEnv::new(),
            RecordingHost::new(),
            Box::new(ScriptedDevices::new(script.clone())),
            store,
        )
        .expect("b has a parent"),
    )
}

#[test]
fn unreachable_parent_backs_up_within_budget() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut sim = turmoil::Builder::new().simulation_duration(Duration::from_secs(60)).build();

    let script = Script::new();
    let store = EventStore::open(dir.path().join("b")).expect("b store");
    let b = relay_b(
        MeshNode::relay('B', 8266, "root", ROOT_PORT).with_scripted_device().with_backup_size(1),
        &script,
        store.clone(),
    );

    // Resolvable but never listening.
    sim.host("root", || async {
        std::future::pending::<()>().await;
        Ok(())
    });
    sim.host("b", move || {
        let b = Arc::clone(&b);
        async move {
            b.run().await?;
            Ok(())
        }
    });

    sim.client("operator", async move {
        script.push(event(1));
        script.push(event(2));

        let stored = eventually(Duration::from_secs(20), || script.pending() == 0).await;
        assert!(stored, "both events should be played");

        // Only the first fits in the budget.
        let ticks = script.ticks();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(store.count().expect("count"), 1);

        let listed = store.list().expect("list");
        assert_eq!(listed[0].node, "B");
        assert_eq!(listed[0].started_at, Utc.with_ymd_and_hms(2024, 6, 1, 9, 1, 0).single().expect("valid time"));

        assert!(script.ticks() > ticks, "tick loop keeps running");
        Ok(())
    });

    sim.run().expect("simulation failed");
}

#[test]
fn partition_then_repair() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut sim = turmoil::Builder::new().simulation_duration(Duration::from_secs(120)).build();

    let root_events = EventStore::open(dir.path().join("root")).expect("root store");
    let root = Arc::new(RootNode::new(
        MeshNode::root().config().expect("root config"),
        SimTransport,
        SimEnv::new(),
        root_events.clone(),
    ));
    let handle = root.handle();

    let script = Script::new();
    let b_store = EventStore::open(dir.path().join("b")).expect("b store");
    let b = relay_b(
        MeshNode::relay('B', 8266, "root", ROOT_PORT).with_scripted_device(),
        &script,
        b_store.clone(),
    );

    sim.host("root", move || {
        let root = Arc::clone(&root);
        async move {
            root.run().await?;
            Ok(())
        }
    });
    sim.host("b", move || {
        let b = Arc::clone(&b);
        async move {
            b.run().await?;
            Ok(())
        }
    });

    sim.client("operator", async move {
        let registered =
            eventually(Duration::from_secs(20), || handle.device(id('B')).is_some_and(|r| r.is_ready())).await;
        assert!(registered);

        turmoil::partition("b", "root");
        script.push(event(1));

        let backed_up = eventually(Duration::from_secs(30), || b_store.count().is_ok_and(|n| n == 1)).await;
        assert!(backed_up, "undeliverable event should be backed up");
        assert_eq!(root_events.count().expect("count"), 0);

        turmoil::repair("b", "root");
        script.push(event(2));

        let delivered = eventually(Duration::from_secs(30), || root_events.count().is_ok_and(|n| n == 1)).await;
        assert!(delivered, "event after repair should reach the root");

        let listed = root_events.list().expect("list");
        assert_eq!(listed[0].node, "B");
        assert_eq!(listed[0].started_at, Utc.with_ymd_and_hms(2024, 6, 1, 9, 2, 0).single().expect("valid time"));
        assert_eq!(b_store.count().expect("count"), 1);

        Ok(())
    });

    sim.run().expect("simulation failed");
}

#[test]
fn slow_links_still_register() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut sim = turmoil::Builder::new()
        .simulation_duration(Duration::from_secs(120))
        .min_message_latency(Duration::from_millis(100))
        .max_message_latency(Duration::from_millis(100))
        .build();

    let root = Arc::new(RootNode::new(
        MeshNode::root().config().expect("root config"),
        SimTransport,
        SimEnv::new(),
        EventStore::open(dir.path().join("root")).expect("root store"),
    ));
    let handle = root.handle();
    let b = relay_b(
        MeshNode::relay('B', 8266, "root", ROOT_PORT),
        &Script::new(),
        EventStore::open(dir.path().join("b")).expect("b store"),
    );

    sim.host("root", move || {
        let root = Arc::clone(&root);
        async move {
            root.run().await?;
            Ok(())
        }
    });
    sim.host("b", move || {
        let b = Arc::clone(&b);
        async move {
            b.run().await?;
            Ok(())
        }
    });

    sim.client("operator", async move {
        let ready = eventually(Duration::from_secs(60), || {
            handle.device(id('B')).is_some_and(|r| r.is_ready() && r.wifi_quality.is_some())
        })
        .await;
        assert!(ready, "B should register despite latency");
        Ok(())
    });

    sim.run().expect("simulation failed");
}
