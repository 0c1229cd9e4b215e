//! One reconcile of one node: load configuration, fetch, evaluate, patch,
//! await cache consistency.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use warden_config::{load_config, Config};
use warden_domain::Clock;
use warden_engine::{compile_profiles, Coordinator, NodeInfoCache};
use warden_observe::Metrics;
use warden_plugin::{InstanceSet, PluginRegistry};
use warden_store::{Cluster, Data};

use crate::error::{ReconcileCause, ReconcileError};

/// Poll interval for the post-patch cache wait.
pub const CACHE_POLL_INTERVAL: Duration = Duration::from_millis(20);
/// Ceiling for the post-patch cache wait.
pub const CACHE_WAIT_CEILING: Duration = Duration::from_secs(1);

/// Everything a reconcile needs besides the node name. Shared by all workers.
pub struct ReconcileContext {
    pub config_path: PathBuf,
    pub cluster: Arc<dyn Cluster>,
    pub registry: Arc<PluginRegistry>,
    pub clock: Arc<dyn Clock>,
    pub metrics: Arc<Metrics>,
    pub info_cache: Arc<NodeInfoCache>,
    pub cancel: CancellationToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Nothing to do and nothing worth an immediate retry: the node is gone,
    /// or the configuration is broken and needs an operator.
    Skip,
    /// Evaluated; come back after the configured requeue interval.
    Requeue(Duration),
}

pub async fn reconcile(
    ctx: &ReconcileContext,
    node_name: &str,
) -> Result<ReconcileOutcome, ReconcileError> {
    // 1. Configuration is re-read every round so operators can edit it
    //    without restarting. A broken file is an operator problem, not a
    //    retry loop.
    let config = match load_config(&ctx.config_path) {
        Ok(config) => config,
        Err(err) => {
            error!(node = %node_name, error = %err, "configuration unreadable, skipping");
            return Ok(ReconcileOutcome::Skip);
        }
    };
    let coordinator = match build_coordinator(ctx, &config) {
        Ok(coordinator) => coordinator,
        Err(err) => {
            error!(node = %node_name, error = %err, "configuration invalid, skipping");
            return Ok(ReconcileOutcome::Skip);
        }
    };
    let requeue = config.intervals.requeue;
    // Failures below carry the interval loaded this round, so the worker
    // retries on the current setting even while errors persist.
    let fail = |cause: ReconcileCause| ReconcileError { source: cause, requeue };

    // 2. Fetch the node.
    let mut node = match ctx.cluster.get_node(node_name).await {
        Ok(Some(node)) => node,
        Ok(None) => {
            debug!(node = %node_name, "node gone");
            ctx.info_cache.remove(node_name);
            return Ok(ReconcileOutcome::Skip);
        }
        Err(err) => {
            warn!(node = %node_name, error = %err, "node fetch failed");
            return Ok(ReconcileOutcome::Requeue(requeue));
        }
    };

    // 3. Snapshot for the write-skip diff.
    let snapshot = node.clone();

    // 4. Persisted data, with v1 migration inside the parse.
    let mut data = Data::parse(&node).map_err(|e| fail(e.into()))?;

    // 5. Evaluate all profiles.
    coordinator
        .apply_profiles(&mut node, &mut data)
        .await
        .map_err(|e| fail(e.into()))?;

    // 6. Serialize the record back into the annotation.
    data.write_to(&mut node).map_err(|e| fail(e.into()))?;

    // 7. Skip the write when nothing changed semantically.
    if node.semantic_eq(&snapshot) {
        return Ok(ReconcileOutcome::Requeue(requeue));
    }
    let revision = ctx
        .cluster
        .patch_node(&node)
        .await
        .map_err(|e| fail(e.into()))?;

    // 8. Wait until the local cache has seen the patch, bounded.
    if !await_cache(ctx, node_name, revision).await {
        debug!(node = %node_name, revision, "cache did not observe the patch in time");
    }

    // 9. Always requeue.
    Ok(ReconcileOutcome::Requeue(requeue))
}

fn build_coordinator(
    ctx: &ReconcileContext,
    config: &Config,
) -> Result<Coordinator, warden_plugin::PluginError> {
    let set = InstanceSet::from_config(&ctx.registry, &config.raw.instances)?;
    let profiles = compile_profiles(&config.raw, &set)?;
    Ok(Coordinator {
        profiles,
        cluster: ctx.cluster.clone(),
        clock: ctx.clock.clone(),
        metrics: ctx.metrics.clone(),
        info_cache: ctx.info_cache.clone(),
        label_filter: config.dashboard.label_filter.clone(),
        cancel: ctx.cancel.clone(),
    })
}

/// Poll the informer cache until it reports a revision at or past the patch
/// response, or the ceiling elapses. Returns whether the cache caught up.
async fn await_cache(ctx: &ReconcileContext, node_name: &str, revision: u64) -> bool {
    let deadline = tokio::time::Instant::now() + CACHE_WAIT_CEILING;
    loop {
        if let Ok(Some(cached)) = ctx.cluster.cached_node(node_name).await {
            if cached.revision >= revision {
                return true;
            }
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::select! {
            _ = ctx.cancel.cancelled() => return false,
            _ = tokio::time::sleep(CACHE_POLL_INTERVAL) => {}
        }
    }
}
