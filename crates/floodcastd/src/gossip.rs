//! Gossip dissemination with retry-until-acknowledged delivery

use crate::neighbors::NeighborTable;
use crate::store::ValueStore;
use floodcast_core::{NodeId, Payload};
use floodcast_net::Node;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Capped exponential backoff with jitter
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Delay scale for the first retry
    pub base: Duration,
    /// Upper bound on any delay
    pub cap: Duration,
}

impl RetryPolicy {
    /// Delay before retry `attempt` (0-based): uniform in `[d/2, d]` where
    /// `d = min(base << attempt, cap)`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base.as_millis() as u64;
        let cap = self.cap.as_millis() as u64;
        let ceiling = base
            .saturating_mul(1u64 << attempt.min(20))
            .min(cap)
            .max(1);
        Duration::from_millis(rand::thread_rng().gen_range(ceiling / 2..=ceiling))
    }
}

/// Relays every newly accepted value to the current neighbors, surviving
/// delivery failures, without blocking the caller that submitted it.
///
/// The receiving node's own deduplication is the backstop: no per-neighbor
/// acknowledgment history is kept beyond the in-flight attempt.
pub struct Disseminator {
    node: Arc<Node>,
    store: Arc<ValueStore<i64>>,
    neighbors: Arc<NeighborTable>,
    retry: RetryPolicy,
    shutdown_tx: broadcast::Sender<()>,
}

impl Disseminator {
    /// Create a disseminator wired to the given substrate and state
    pub fn new(
        node: Arc<Node>,
        store: Arc<ValueStore<i64>>,
        neighbors: Arc<NeighborTable>,
        retry: RetryPolicy,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        Self {
            node,
            store,
            neighbors,
            retry,
            shutdown_tx,
        }
    }

    /// Store a value; on first sight, relay it to every neighbor except the
    /// origin. Returns whether the value was new.
    ///
    /// Duplicates spawn nothing: re-gossiping an already-seen value in a
    /// cyclic topology would retransmit forever. Relay work never blocks
    /// the caller.
    pub fn accept(&self, value: i64, origin: &NodeId) -> bool {
        if !self.store.insert(value) {
            debug!(value, "duplicate value, not re-relaying");
            return false;
        }

        for peer in self.neighbors.get() {
            if peer == *origin {
                continue;
            }
            self.spawn_relay(peer, value);
        }
        true
    }

    /// One retry loop per (value, neighbor): attempts are sequential within
    /// the pair, unbounded, and end only on a `broadcast_ok` or shutdown.
    fn spawn_relay(&self, peer: NodeId, value: i64) {
        let node = self.node.clone();
        let retry = self.retry.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut attempt: u32 = 0;
            loop {
                tokio::select! {
                    result = node.rpc(&peer, Payload::Broadcast { message: value }) => {
                        match result {
                            Ok(body) if body.payload == Payload::BroadcastOk => {
                                debug!(%peer, value, attempt, "relay acknowledged");
                                return;
                            }
                            // A reply of the wrong type is retried like a
                            // failed delivery.
                            Ok(body) => {
                                warn!(%peer, value, payload = ?body.payload, "unexpected relay response")
                            }
                            Err(e) => debug!(%peer, value, attempt, error = %e, "relay attempt failed"),
                        }
                    }
                    _ = shutdown_rx.recv() => return,
                }

                let delay = retry.delay(attempt);
                attempt = attempt.saturating_add(1);
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown_rx.recv() => return,
                }
            }
        });
    }
}
