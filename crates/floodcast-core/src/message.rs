//! Message envelope and payload types
//!
//! One JSON object per line on the wire. Field names here are the wire
//! contract and must not change.

use crate::types::{MsgId, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Standard substrate error codes
pub mod code {
    /// The requested operation timed out.
    pub const TIMEOUT: u32 = 0;
    /// The message type is not supported by this node.
    pub const NOT_SUPPORTED: u32 = 10;
    /// The node cannot currently serve this request.
    pub const TEMPORARILY_UNAVAILABLE: u32 = 11;
    /// The request body did not decode.
    pub const MALFORMED_REQUEST: u32 = 12;
    /// An unrecoverable internal failure.
    pub const CRASH: u32 = 13;
}

/// A routed message between two nodes
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Sender node
    pub src: NodeId,
    /// Destination node
    pub dest: NodeId,
    /// Message body
    pub body: Body,
}

/// Message body: correlation ids plus the typed payload
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Body {
    /// Sender-assigned sequence number, present on requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg_id: Option<MsgId>,
    /// The msg_id this body answers, present on replies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<MsgId>,
    /// Type tag and type-specific fields
    #[serde(flatten)]
    pub payload: Payload,
}

impl Body {
    /// Body for an outbound request carrying a correlation id
    pub fn request(msg_id: MsgId, payload: Payload) -> Self {
        Self {
            msg_id: Some(msg_id),
            in_reply_to: None,
            payload,
        }
    }

    /// Body for a reply correlated to an inbound request
    pub fn reply(msg_id: MsgId, in_reply_to: Option<MsgId>, payload: Payload) -> Self {
        Self {
            msg_id: Some(msg_id),
            in_reply_to,
            payload,
        }
    }

    /// Body with no correlation ids (fire-and-forget)
    pub fn bare(payload: Payload) -> Self {
        Self {
            msg_id: None,
            in_reply_to: None,
            payload,
        }
    }
}

/// Every message type the protocol exchanges
///
/// Unrecognized types decode to [`Payload::Unknown`] so a single malformed
/// peer cannot poison the decode path for the whole inbound stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    /// Substrate handshake: tells a fresh node who it is and who else exists
    Init {
        node_id: NodeId,
        node_ids: Vec<NodeId>,
    },
    /// Handshake acknowledgment
    InitOk,
    /// Submit a value, from a client or a relaying peer
    Broadcast { message: i64 },
    /// Positive acknowledgment that a value was accepted
    BroadcastOk,
    /// Request the full set of values this node has learned
    Read,
    /// Read response
    ReadOk { messages: Vec<i64> },
    /// Full cluster adjacency, keyed by node id
    Topology {
        topology: HashMap<NodeId, Vec<NodeId>>,
    },
    /// Topology acknowledgment
    TopologyOk,
    /// Standard error body
    Error { code: u32, text: String },
    /// Catch-all for message types this node does not speak
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_broadcast_wire_shape() {
        let body = Body::request(1, Payload::Broadcast { message: 42 });
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"type": "broadcast", "msg_id": 1, "message": 42})
        );
    }

    #[test]
    fn test_read_ok_wire_shape() {
        let body = Body::reply(7, Some(3), Payload::ReadOk { messages: vec![] });
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"type": "read_ok", "msg_id": 7, "in_reply_to": 3, "messages": []})
        );
    }

    #[test]
    fn test_envelope_parses_topology() {
        let raw = r#"{"src":"c1","dest":"n1","body":{"type":"topology","msg_id":2,
            "topology":{"n1":["n2","n3"],"n2":["n1"]}}}"#;
        let env: Envelope = serde_json::from_str(raw).unwrap();

        assert_eq!(env.src, "c1".into());
        match env.body.payload {
            Payload::Topology { ref topology } => {
                assert_eq!(
                    topology[&NodeId::new("n1")],
                    vec![NodeId::new("n2"), NodeId::new("n3")]
                );
            }
            ref other => panic!("wrong payload: {other:?}"),
        }
    }

    #[test]
    fn test_init_parses() {
        let raw = r#"{"type":"init","msg_id":1,"node_id":"n3","node_ids":["n1","n2","n3"]}"#;
        let body: Body = serde_json::from_str(raw).unwrap();

        assert_eq!(body.msg_id, Some(1));
        assert_eq!(
            body.payload,
            Payload::Init {
                node_id: "n3".into(),
                node_ids: vec!["n1".into(), "n2".into(), "n3".into()],
            }
        );
    }

    #[test]
    fn test_unrecognized_type_decodes_to_unknown() {
        let raw = r#"{"type":"generate","msg_id":9}"#;
        let body: Body = serde_json::from_str(raw).unwrap();
        assert_eq!(body.payload, Payload::Unknown);
        assert_eq!(body.msg_id, Some(9));
    }

    #[test]
    fn test_error_wire_shape() {
        let body = Body::reply(
            4,
            Some(2),
            Payload::Error {
                code: code::MALFORMED_REQUEST,
                text: "bad body".to_string(),
            },
        );
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"type": "error", "msg_id": 4, "in_reply_to": 2, "code": 12, "text": "bad body"})
        );
    }
}
