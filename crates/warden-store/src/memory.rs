use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use warden_domain::{Node, Pod};

use crate::cluster::{Cluster, Lease, NodeEvent};
use crate::error::StoreError;

#[derive(Debug, Default)]
struct Inner {
    nodes: HashMap<String, Node>,
    /// Informer-cache view of the nodes; lags behind `nodes` when
    /// `cache_lag` is on.
    cache: HashMap<String, Node>,
    pods: Vec<Pod>,
    leases: HashMap<String, Lease>,
    events: Vec<NodeEvent>,
    cache_lag: bool,
}

/// In-memory [`Cluster`] implementation.
///
/// Backs tests and the simulation mode of the binary; the production cluster
/// client lives behind the same trait.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCluster {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_node(&self, node: Node) {
        let mut guard = self.inner.write().await;
        guard.cache.insert(node.name.clone(), node.clone());
        guard.nodes.insert(node.name.clone(), node);
    }

    pub async fn add_pod(&self, pod: Pod) {
        self.inner.write().await.pods.push(pod);
    }

    /// When enabled, patches stop propagating to the cache until
    /// [`sync_cache`](Self::sync_cache) is called.
    pub async fn set_cache_lag(&self, lag: bool) {
        self.inner.write().await.cache_lag = lag;
    }

    pub async fn sync_cache(&self) {
        let mut guard = self.inner.write().await;
        guard.cache = guard.nodes.clone();
    }
}

#[async_trait]
impl Cluster for InMemoryCluster {
    async fn get_node(&self, name: &str) -> Result<Option<Node>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard.nodes.get(name).cloned())
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, StoreError> {
        let guard = self.inner.read().await;
        let mut nodes: Vec<Node> = guard.nodes.values().cloned().collect();
        nodes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(nodes)
    }

    async fn patch_node(&self, node: &Node) -> Result<u64, StoreError> {
        let mut guard = self.inner.write().await;
        // A merge patch needs an existing object; the node may have been
        // deleted since the fetch.
        let revision = guard
            .nodes
            .get(&node.name)
            .map(|existing| existing.revision + 1)
            .ok_or_else(|| StoreError::NodeNotFound(node.name.clone()))?;
        let mut committed = node.clone();
        committed.revision = revision;
        guard.nodes.insert(node.name.clone(), committed.clone());
        if !guard.cache_lag {
            guard.cache.insert(node.name.clone(), committed);
        }
        Ok(revision)
    }

    async fn cached_node(&self, name: &str) -> Result<Option<Node>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard.cache.get(name).cloned())
    }

    async fn list_pods_on(&self, node: &str) -> Result<Vec<Pod>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard
            .pods
            .iter()
            .filter(|pod| pod.node == node)
            .cloned()
            .collect())
    }

    async fn get_lease(&self, name: &str) -> Result<Option<Lease>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard.leases.get(name).cloned())
    }

    async fn upsert_lease(&self, lease: &Lease) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        guard.leases.insert(lease.name.clone(), lease.clone());
        Ok(())
    }

    async fn record_event(&self, event: &NodeEvent) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        guard.events.push(event.clone());
        Ok(())
    }

    async fn list_events(
        &self,
        node: Option<&str>,
        limit: u32,
    ) -> Result<Vec<NodeEvent>, StoreError> {
        let guard = self.inner.read().await;
        let filtered: Vec<NodeEvent> = guard
            .events
            .iter()
            .filter(|ev| node.map_or(true, |n| ev.node == n))
            .cloned()
            .collect();
        let start = filtered.len().saturating_sub(limit as usize);
        Ok(filtered[start..].to_vec())
    }
}
