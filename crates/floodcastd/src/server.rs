//! Request handling and the node service loop

use crate::config::Config;
use crate::gossip::{Disseminator, RetryPolicy};
use crate::neighbors::NeighborTable;
use crate::store::ValueStore;
use floodcast_core::{Envelope, Payload};
use floodcast_net::{NetError, Node};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

/// Server errors
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("substrate error: {0}")]
    Net(#[from] NetError),
}

/// Node state wired to the substrate: the value store, the neighbor table,
/// and the disseminator, plus the service loop that feeds them.
pub struct Server {
    node: Arc<Node>,
    store: Arc<ValueStore<i64>>,
    neighbors: Arc<NeighborTable>,
    disseminator: Disseminator,
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Create a server on an initialized substrate node
    pub fn new(config: &Config, node: Arc<Node>) -> Self {
        let store = Arc::new(ValueStore::new());
        let neighbors = Arc::new(NeighborTable::new());
        let (shutdown_tx, _) = broadcast::channel(1);

        let disseminator = Disseminator::new(
            node.clone(),
            store.clone(),
            neighbors.clone(),
            RetryPolicy {
                base: config.retry_base(),
                cap: config.retry_cap(),
            },
            shutdown_tx.clone(),
        );

        Self {
            node,
            store,
            neighbors,
            disseminator,
            shutdown_tx,
        }
    }

    /// Serve inbound requests until the substrate closes or shutdown fires.
    ///
    /// Each request is handled on its own task; handlers never wait on
    /// dissemination.
    pub async fn run(self: Arc<Self>, mut inbound: mpsc::Receiver<Envelope>) -> Result<(), ServerError> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                maybe = inbound.recv() => {
                    match maybe {
                        Some(env) => {
                            let server = self.clone();
                            tokio::spawn(async move {
                                if let Err(e) = server.handle_request(env).await {
                                    warn!(error = %e, "request handling failed");
                                }
                            });
                        }
                        None => {
                            info!("substrate closed, stopping");
                            break;
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("shutdown requested, stopping");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Signal shutdown to the service loop and every in-flight relay
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Counters for the lifecycle log
    pub fn stats(&self) -> ServerStats {
        ServerStats {
            stored_values: self.store.len(),
            neighbors: self.neighbors.len(),
        }
    }

    async fn handle_request(&self, env: Envelope) -> Result<(), ServerError> {
        match &env.body.payload {
            Payload::Broadcast { message } => {
                // Accept first, acknowledge immediately; downstream gossip
                // is invisible to the submitter.
                self.disseminator.accept(*message, &env.src);
                self.node.reply(&env, Payload::BroadcastOk).await?;
            }
            Payload::Read => {
                let messages = self.store.snapshot();
                self.node
                    .reply(&env, Payload::ReadOk { messages })
                    .await?;
            }
            Payload::Topology { topology } => {
                let neighbors = topology
                    .get(self.node.node_id())
                    .cloned()
                    .unwrap_or_default();
                info!(count = neighbors.len(), "installing topology");
                self.neighbors.set(neighbors);
                self.node.reply(&env, Payload::TopologyOk).await?;
            }
            // Replies and substrate traffic are routed before handlers;
            // anything that leaks through is dropped.
            other => debug!(src = %env.src, payload = ?other, "ignoring non-request message"),
        }

        Ok(())
    }
}

/// Server statistics
#[derive(Debug, Clone)]
pub struct ServerStats {
    pub stored_values: usize,
    pub neighbors: usize,
}
