//! Controller loop: one long-lived worker per node.
//!
//! Per-node serialization comes from exactly one task owning each node name;
//! different nodes reconcile in parallel. A periodic sweep picks up nodes
//! that appear after startup.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use warden_store::Cluster as _;

use crate::reconcile::{reconcile, ReconcileContext, ReconcileOutcome};

pub struct Controller {
    pub ctx: Arc<ReconcileContext>,
    /// Fallback requeue used when a round produced no interval at all
    /// (configuration unreadable, node gone). Failed rounds carry the
    /// interval from the configuration they loaded.
    pub default_requeue: Duration,
    /// How often the node list is swept for new workers.
    pub sweep_interval: Duration,
}

impl Controller {
    /// Run until the context's cancellation token fires. Worker tasks drain
    /// on the same token.
    pub async fn run(self) {
        let mut known: HashSet<String> = HashSet::new();
        loop {
            match self.ctx.cluster.list_nodes().await {
                Ok(nodes) => {
                    for node in nodes {
                        if known.insert(node.name.clone()) {
                            info!(node = %node.name, "starting node worker");
                            tokio::spawn(node_worker(
                                self.ctx.clone(),
                                node.name,
                                self.default_requeue,
                            ));
                        }
                    }
                }
                Err(err) => warn!(error = %err, "node list sweep failed"),
            }
            tokio::select! {
                _ = self.ctx.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.sweep_interval) => {}
            }
        }
    }
}

async fn node_worker(ctx: Arc<ReconcileContext>, node_name: String, default_requeue: Duration) {
    loop {
        let delay = match reconcile(&ctx, &node_name).await {
            Ok(ReconcileOutcome::Requeue(delay)) => delay,
            // There is no watch stream here, so even "skip" outcomes re-poll
            // at the fallback interval: the node may reappear, the
            // configuration may get fixed.
            Ok(ReconcileOutcome::Skip) => default_requeue,
            Err(err) => {
                warn!(node = %node_name, error = %err, "reconcile failed");
                err.requeue
            }
        };
        tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
