//! Observability snapshot of a node, published after every evaluation and
//! served by the dashboard API.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::Serialize;
use warden_domain::NodeState;

use crate::fsm::TransitionResult;

#[derive(Debug, Clone, Serialize)]
pub struct NodeInfo {
    pub node: String,
    /// Aggregated state, equal to the exposed maintenance-state label.
    pub state: NodeState,
    /// Node labels selected by the dashboard label filter.
    pub labels: BTreeMap<String, String>,
    pub profiles: Vec<ProfileInfo>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileInfo {
    pub name: String,
    pub current: NodeState,
    pub previous: NodeState,
    pub transition: DateTime<Utc>,
    pub outcome: ProfileOutcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProfileOutcome {
    Applied {
        next: NodeState,
        retry: Option<String>,
        transitions: Vec<TransitionResult>,
    },
    Failed {
        stage: String,
        message: String,
        transitions: Vec<TransitionResult>,
    },
}

/// Concurrent map of the latest [`NodeInfo`] per node. The only process-local
/// mutable state of the controller; everything else lives in node metadata.
#[derive(Debug, Default)]
pub struct NodeInfoCache {
    inner: RwLock<HashMap<String, NodeInfo>>,
}

impl NodeInfoCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, info: NodeInfo) {
        if let Ok(mut guard) = self.inner.write() {
            guard.insert(info.node.clone(), info);
        }
    }

    pub fn remove(&self, node: &str) {
        if let Ok(mut guard) = self.inner.write() {
            guard.remove(node);
        }
    }

    /// All snapshots, ordered by node name.
    pub fn snapshot(&self) -> Vec<NodeInfo> {
        match self.inner.read() {
            Ok(guard) => {
                let mut infos: Vec<NodeInfo> = guard.values().cloned().collect();
                infos.sort_by(|a, b| a.node.cmp(&b.node));
                infos
            }
            Err(_) => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(node: &str) -> NodeInfo {
        NodeInfo {
            node: node.into(),
            state: NodeState::Operational,
            labels: BTreeMap::new(),
            profiles: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn snapshot_is_sorted_and_replaces() {
        let cache = NodeInfoCache::new();
        cache.publish(info("b"));
        cache.publish(info("a"));
        cache.publish(info("b"));

        let snapshot = cache.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].node, "a");
        assert_eq!(snapshot[1].node, "b");
    }

    #[test]
    fn remove_drops_entries() {
        let cache = NodeInfoCache::new();
        cache.publish(info("a"));
        cache.remove("a");
        assert!(cache.snapshot().is_empty());
    }
}
