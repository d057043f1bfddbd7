//! Substrate runtime
//!
//! Owns the byte stream the node is wired to: a single reader task that
//! decodes inbound envelopes, routes replies to pending RPCs, and delivers
//! requests to the server; a single writer task that serializes every
//! outbound envelope (stdout is never written concurrently).
//!
//! The runtime performs the `init` handshake itself. Handlers only ever see
//! post-init request traffic.

use crate::codec::{CodecError, LineCodec};
use floodcast_core::message::code;
use floodcast_core::{Body, Envelope, MsgId, NodeId, Payload};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, warn};

/// Outbound envelope queue depth
const OUTBOUND_BUFFER: usize = 256;
/// Inbound request queue depth
const INBOUND_BUFFER: usize = 256;

/// Substrate errors
#[derive(Debug, Error)]
pub enum NetError {
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("substrate closed")]
    Closed,
    #[error("rpc to {peer} timed out after {timeout:?}")]
    RpcTimeout { peer: NodeId, timeout: Duration },
    #[error("protocol violation: {0}")]
    Protocol(String),
}

/// Handle to the messaging substrate
///
/// Shared behind an [`Arc`]; every method takes `&self` and is safe to call
/// from any task. Holds this node's identity, the cluster membership, the
/// outbound writer channel, and the table of RPCs awaiting replies.
pub struct Node {
    node_id: NodeId,
    node_ids: Vec<NodeId>,
    next_msg_id: AtomicU64,
    pending: Mutex<HashMap<MsgId, oneshot::Sender<Body>>>,
    outbound: mpsc::Sender<Envelope>,
    rpc_timeout: Duration,
}

impl Node {
    /// Start the substrate over the given byte stream.
    ///
    /// Performs the `init` handshake (recording identity and membership,
    /// replying `init_ok`), then spawns the reader task. Returns the node
    /// handle and the channel on which inbound requests are delivered; the
    /// channel closes when the stream ends.
    pub async fn start<R, W>(
        reader: R,
        writer: W,
        rpc_timeout: Duration,
    ) -> Result<(Arc<Self>, mpsc::Receiver<Envelope>), NetError>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let mut lines = FramedRead::new(reader, LineCodec::new());

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<Envelope>(OUTBOUND_BUFFER);
        tokio::spawn(async move {
            let mut sink = FramedWrite::new(writer, LineCodec::new());
            while let Some(env) = outbound_rx.recv().await {
                if let Err(e) = sink.send(env).await {
                    error!("outbound write failed: {}", e);
                    break;
                }
            }
        });

        // Nothing is deliverable until we know who we are.
        let init_env = loop {
            let line = match lines.next().await {
                Some(Ok(line)) => line,
                Some(Err(e)) => return Err(e.into()),
                None => return Err(NetError::Protocol("stream ended before init".into())),
            };
            match serde_json::from_str::<Envelope>(&line) {
                Ok(env) if matches!(env.body.payload, Payload::Init { .. }) => break env,
                Ok(env) => warn!(src = %env.src, "message before init, dropping"),
                Err(e) => warn!(error = %e, "undecodable line before init, dropping"),
            }
        };
        let (node_id, node_ids) = match &init_env.body.payload {
            Payload::Init { node_id, node_ids } => (node_id.clone(), node_ids.clone()),
            _ => unreachable!("loop above only breaks on init"),
        };

        let node = Arc::new(Self {
            node_id,
            node_ids,
            next_msg_id: AtomicU64::new(0),
            pending: Mutex::new(HashMap::new()),
            outbound: outbound_tx,
            rpc_timeout,
        });

        node.reply(&init_env, Payload::InitOk).await?;
        info!(node = %node.node_id, cluster = node.node_ids.len(), "substrate initialized");

        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_BUFFER);
        let reader_node = node.clone();
        tokio::spawn(async move { reader_node.read_loop(lines, inbound_tx).await });

        Ok((node, inbound_rx))
    }

    /// This node's identifier
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    /// All node identifiers in the cluster, this node included
    pub fn node_ids(&self) -> &[NodeId] {
        &self.node_ids
    }

    /// Send a payload without expecting a reply
    pub async fn send(&self, dest: &NodeId, payload: Payload) -> Result<(), NetError> {
        self.post(Envelope {
            src: self.node_id.clone(),
            dest: dest.clone(),
            body: Body::bare(payload),
        })
        .await
    }

    /// Reply to an inbound request
    pub async fn reply(&self, req: &Envelope, payload: Payload) -> Result<(), NetError> {
        let body = Body::reply(self.take_msg_id(), req.body.msg_id, payload);
        self.post(Envelope {
            src: self.node_id.clone(),
            dest: req.src.clone(),
            body,
        })
        .await
    }

    /// Reply to an inbound request with a standard error body
    pub async fn reply_error(&self, req: &Envelope, code: u32, text: &str) -> Result<(), NetError> {
        self.reply(
            req,
            Payload::Error {
                code,
                text: text.to_string(),
            },
        )
        .await
    }

    /// Send a request to a peer and await its correlated reply.
    ///
    /// Fails with [`NetError::RpcTimeout`] when no reply arrives within the
    /// configured window; a reply that turns up later is dropped by the
    /// reader with a debug log.
    pub async fn rpc(&self, dest: &NodeId, payload: Payload) -> Result<Body, NetError> {
        let msg_id = self.take_msg_id();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(msg_id, tx);

        let env = Envelope {
            src: self.node_id.clone(),
            dest: dest.clone(),
            body: Body::request(msg_id, payload),
        };
        if let Err(e) = self.post(env).await {
            self.pending.lock().remove(&msg_id);
            return Err(e);
        }

        match tokio::time::timeout(self.rpc_timeout, rx).await {
            Ok(Ok(body)) => Ok(body),
            Ok(Err(_)) => {
                // Reader task gone; the stream is dead.
                self.pending.lock().remove(&msg_id);
                Err(NetError::Closed)
            }
            Err(_) => {
                self.pending.lock().remove(&msg_id);
                Err(NetError::RpcTimeout {
                    peer: dest.clone(),
                    timeout: self.rpc_timeout,
                })
            }
        }
    }

    fn take_msg_id(&self) -> MsgId {
        self.next_msg_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    async fn post(&self, env: Envelope) -> Result<(), NetError> {
        self.outbound.send(env).await.map_err(|_| NetError::Closed)
    }

    async fn read_loop<R>(
        self: Arc<Self>,
        mut lines: FramedRead<R, LineCodec>,
        inbound: mpsc::Sender<Envelope>,
    ) where
        R: AsyncRead + Send + Unpin + 'static,
    {
        while let Some(next) = lines.next().await {
            let line = match next {
                Ok(line) => line,
                Err(e) => {
                    // Framing errors leave the buffer unrecoverable.
                    error!(error = %e, "inbound framing error, stopping reader");
                    break;
                }
            };

            let env = match serde_json::from_str::<Envelope>(&line) {
                Ok(env) => env,
                Err(e) => {
                    self.reject_undecodable(&line, &e).await;
                    continue;
                }
            };

            if let Some(replied_to) = env.body.in_reply_to {
                let sender = self.pending.lock().remove(&replied_to);
                match sender {
                    Some(tx) => {
                        let _ = tx.send(env.body);
                    }
                    None => debug!(in_reply_to = replied_to, "unmatched reply, dropping"),
                }
                continue;
            }

            if matches!(env.body.payload, Payload::Unknown) {
                if let Err(e) = self
                    .reply_error(&env, code::NOT_SUPPORTED, "unsupported message type")
                    .await
                {
                    warn!(error = %e, "failed to refuse unsupported message");
                }
                continue;
            }

            if inbound.send(env).await.is_err() {
                // Server stopped consuming.
                break;
            }
        }
        debug!("reader stopped");
    }

    /// Answer a line that failed typed decoding with a malformed-request
    /// error, when enough of it can be salvaged to route a reply.
    async fn reject_undecodable(&self, line: &str, err: &serde_json::Error) {
        warn!(error = %err, "undecodable inbound message");

        let Ok(raw) = serde_json::from_str::<serde_json::Value>(line) else {
            return;
        };
        let Some(src) = raw.get("src").and_then(|v| v.as_str()) else {
            return;
        };
        let in_reply_to = raw
            .get("body")
            .and_then(|b| b.get("msg_id"))
            .and_then(|v| v.as_u64());

        let body = Body::reply(
            self.take_msg_id(),
            in_reply_to,
            Payload::Error {
                code: code::MALFORMED_REQUEST,
                text: err.to_string(),
            },
        );
        let env = Envelope {
            src: self.node_id.clone(),
            dest: src.into(),
            body,
        };
        if self.post(env).await.is_err() {
            debug!("substrate closed while rejecting message");
        }
    }
}
