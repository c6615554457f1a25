//! Children that connect and then stop sending mid-packet.
//!
//! The child announces a 60 MiB packet, writes only the header, and holds the
//! connection open. The node it talks to must drop the connection once its
//! link timeout (2 s in these configs) passes, and keep serving everyone
//! else in the meantime.

use std::{sync::Arc, time::Duration};

use odonet_harness::{
    MeshNode, RecordingHost, Script, ScriptedDevices, SimEnv, SimTransport, eventually, mesh::ROOT_PORT,
};
use odonet_proto::NodeId;
use odonet_server::{EventStore, RelayNode, RootNode};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use turmoil::net::TcpStream;

const B_PORT: u16 = 8266;

fn id(c: char) -> NodeId {
    NodeId::new(c).expect("valid id")
}

/// `C=` followed by a header promising far more than will ever be sent.
fn stalled_header() -> Vec<u8> {
    let mut wire = b"C=".to_vec();
    wire.extend_from_slice(&(60u32 << 20).to_le_bytes());
    wire.extend_from_slice(&4u16.to_le_bytes());
    wire
}

/// Send the header, then wait for the other side to hang up.
///
/// Returns how long the connection stayed open.
async fn stall_against(endpoint: &str) -> Duration {
    // Let the node bind first.
    tokio::time::sleep(Duration::from_secs(1)).await;
    let mut stream = TcpStream::connect(endpoint).await.expect("connect");
    stream.write_all(&stalled_header()).await.expect("write header");

    let started = tokio::time::Instant::now();
    let mut buf = [0u8; 16];
    let result = tokio::time::timeout(Duration::from_secs(10), stream.read(&mut buf))
        .await
        .expect("stalled connection should be dropped well before 10 s");
    assert!(matches!(result, Ok(0) | Err(_)), "expected the connection to close, got {result:?}");
    started.elapsed()
}

fn root_node(dir: &std::path::Path) -> Arc<RootNode<SimTransport, SimEnv>> {
    Arc::new(RootNode::new(
        MeshNode::root().config().expect("root config"),
        SimTransport,
        SimEnv::new(),
        EventStore::open(dir.join("root")).expect("root store"),
    ))
}

fn relay_b(dir: &std::path::Path) -> Arc<RelayNode<SimTransport, SimEnv, RecordingHost>> {
    Arc::new(
        RelayNode::new(
            MeshNode::relay('B', B_PORT, "root", ROOT_PORT).config().expect("b config"),
            SimTransport,
            SimEnv::new(),
            RecordingHost::new(),
            Box::new(ScriptedDevices::new(Script::new())),
            EventStore::open(dir.join("b")).expect("b store"),
        )
        .expect("b has a parent"),
    )
}

#[test]
fn root_drops_stalled_child_and_keeps_serving() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut sim = turmoil::Builder::new().simulation_duration(Duration::from_secs(60)).build();

    let root = root_node(dir.path());
    let handle = root.handle();
    let b = relay_b(dir.path());

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

    sim.client("stalled", async move {
        let endpoint = format!("root:{ROOT_PORT}");
        let held = tokio::join!(stall_against(&endpoint), stall_against(&endpoint), stall_against(&endpoint));
        for held in [held.0, held.1, held.2] {
            assert!(held >= Duration::from_millis(1500), "dropped too early: {held:?}");
        }

        let ready =
            eventually(Duration::from_secs(20), || handle.device(id('B')).is_some_and(|r| r.is_ready())).await;
        assert!(ready, "B should register while stalled children are pending");
        assert!(handle.device(id('C')).is_none(), "the stalled child never delivered anything");
        Ok(())
    });

    sim.run().expect("simulation failed");
}

#[test]
fn relay_drops_stalled_child() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut sim = turmoil::Builder::new().simulation_duration(Duration::from_secs(60)).build();

    let root = root_node(dir.path());
    let handle = root.handle();
    let b = relay_b(dir.path());

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

    sim.client("stalled", async move {
        let held = stall_against(&format!("b:{B_PORT}")).await;
        assert!(held >= Duration::from_millis(1500), "dropped too early: {held:?}");
        assert!(held < Duration::from_secs(5), "held for {held:?}");

        let heartbeats =
            eventually(Duration::from_secs(20), || handle.device(id('B')).is_some_and(|r| r.is_ready())).await;
        assert!(heartbeats, "B keeps talking to the root");
        assert!(handle.route(id('C')).is_none());
        Ok(())
    });

    sim.run().expect("simulation failed");
}
