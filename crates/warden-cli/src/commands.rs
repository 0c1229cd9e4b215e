use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;
use warden_api::build_app;
use warden_config::load_config;
use warden_domain::{Node, SystemClock};
use warden_engine::{compile_profiles, NodeInfoCache};
use warden_observe::Metrics;
use warden_plugin::{InstanceSet, PluginRegistry};
use warden_reconciler::{Controller, ReconcileContext};
use warden_store::InMemoryCluster;

const SWEEP_INTERVAL: Duration = Duration::from_secs(10);

pub async fn serve(config_path: PathBuf, bind: SocketAddr, nodes: Option<PathBuf>) -> Result<()> {
    // Fail fast on a broken configuration; later edits are picked up per
    // reconcile.
    let config = load_config(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let registry = Arc::new(PluginRegistry::builtin());
    let set = InstanceSet::from_config(&registry, &config.raw.instances)
        .context("building plugin instances")?;
    compile_profiles(&config.raw, &set).context("compiling profiles")?;

    let cluster = Arc::new(InMemoryCluster::new());
    if let Some(path) = nodes {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading node fixture {}", path.display()))?;
        let seeded: Vec<Node> =
            serde_yaml::from_str(&content).context("parsing node fixture")?;
        for node in seeded {
            info!(node = %node.name, "seeding node");
            cluster.add_node(node).await;
        }
    }

    let metrics = Arc::new(Metrics::new().context("registering metrics")?);
    let info_cache = Arc::new(NodeInfoCache::new());
    let cancel = CancellationToken::new();

    let ctx = Arc::new(ReconcileContext {
        config_path,
        cluster: cluster.clone(),
        registry,
        clock: Arc::new(SystemClock),
        metrics: metrics.clone(),
        info_cache: info_cache.clone(),
        cancel: cancel.clone(),
    });

    let controller = Controller {
        ctx,
        default_requeue: config.intervals.requeue,
        sweep_interval: SWEEP_INTERVAL,
    };
    let controller_task = tokio::spawn(controller.run());

    let app = build_app(info_cache, metrics, cluster);
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("binding {bind}"))?;
    info!("serving on http://{bind}");

    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
            shutdown.cancel();
        })
        .await
        .context("http server")?;

    cancel.cancel();
    let _ = controller_task.await;
    Ok(())
}

pub fn validate(config_path: PathBuf) -> Result<()> {
    let config = load_config(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let registry = PluginRegistry::builtin();
    let set = InstanceSet::from_config(&registry, &config.raw.instances)
        .context("building plugin instances")?;
    let profiles = compile_profiles(&config.raw, &set).context("compiling profiles")?;

    println!(
        "ok: {} profiles, {} check / {} trigger / {} notify instances, requeue {:?}",
        profiles.len(),
        config.raw.instances.check.len(),
        config.raw.instances.trigger.len(),
        config.raw.instances.notify.len(),
        config.intervals.requeue,
    );
    Ok(())
}
