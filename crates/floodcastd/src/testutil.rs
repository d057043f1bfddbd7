//! In-memory wire harness for driving a node in tests
//!
//! Stands in for the substrate's router: everything the node writes is read
//! here, and writes from here arrive as the node's stdin would.

use floodcast_core::{Envelope, Payload};
use floodcast_net::Node;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, ReadHalf, WriteHalf};
use tokio::sync::mpsc;

/// The far side of the node's wire
pub struct Wire {
    lines: tokio::io::Lines<BufReader<ReadHalf<DuplexStream>>>,
    wr: WriteHalf<DuplexStream>,
}

impl Wire {
    /// Deliver one JSON message to the node
    pub async fn write_json(&mut self, v: serde_json::Value) {
        let mut line = v.to_string();
        line.push('\n');
        self.wr.write_all(line.as_bytes()).await.unwrap();
    }

    /// Deliver a typed envelope to the node (used to route traffic between
    /// two harnessed nodes)
    pub async fn deliver(&mut self, env: &Envelope) {
        self.write_json(serde_json::to_value(env).unwrap()).await;
    }

    /// Next outbound envelope from the node
    pub async fn next_envelope(&mut self) -> Envelope {
        let line = tokio::time::timeout(Duration::from_secs(5), self.lines.next_line())
            .await
            .expect("timed out waiting for node output")
            .unwrap()
            .expect("wire closed");
        serde_json::from_str(&line).unwrap()
    }

    /// Assert the node writes nothing for the given window
    pub async fn assert_quiet(&mut self, window: Duration) {
        if let Ok(line) = tokio::time::timeout(window, self.lines.next_line()).await {
            panic!("expected quiet wire, got {line:?}");
        }
    }

    /// Acknowledge a relay with `broadcast_ok` from the given peer
    pub async fn ack_broadcast(&mut self, from: &str, to: &str, in_reply_to: u64) {
        self.write_json(json!({
            "src": from, "dest": to,
            "body": {"type": "broadcast_ok", "in_reply_to": in_reply_to}
        }))
        .await;
    }
}

/// Start a substrate node over an in-memory wire with the init handshake
/// already completed
pub async fn start_node(
    node_id: &str,
    node_ids: &[&str],
    rpc_timeout: Duration,
) -> (Arc<Node>, mpsc::Receiver<Envelope>, Wire) {
    let (ours, theirs) = tokio::io::duplex(1 << 16);
    let (node_rd, node_wr) = tokio::io::split(ours);
    let (remote_rd, remote_wr) = tokio::io::split(theirs);
    let mut wire = Wire {
        lines: BufReader::new(remote_rd).lines(),
        wr: remote_wr,
    };

    wire.write_json(json!({
        "src": "c0", "dest": node_id,
        "body": {"type": "init", "msg_id": 1, "node_id": node_id, "node_ids": node_ids}
    }))
    .await;

    let (node, inbound) = Node::start(node_rd, node_wr, rpc_timeout)
        .await
        .expect("init handshake failed");

    let init_ok = wire.next_envelope().await;
    assert_eq!(init_ok.body.payload, Payload::InitOk);

    (node, inbound, wire)
}
