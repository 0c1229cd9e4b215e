use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use warden_domain::{Node, NodeState, Pod};

use crate::error::StoreError;

// ── Lease ─────────────────────────────────────────────────────────────────────

/// A cluster-scoped lease granting bounded-duration exclusive holdership.
/// Renew time plus duration is the single source of truth; there are no
/// in-process locks behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lease {
    pub name: String,
    pub holder: Option<String>,
    pub renew_time: Option<DateTime<Utc>>,
    pub duration_seconds: i64,
}

impl Lease {
    pub fn expired(&self, now: DateTime<Utc>) -> bool {
        match self.renew_time {
            Some(renewed) => now > renewed + Duration::seconds(self.duration_seconds),
            None => true,
        }
    }

    pub fn held_by(&self, holder: &str) -> bool {
        self.holder.as_deref() == Some(holder)
    }
}

// ── Events ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventReason {
    ChangedMaintenanceState,
    ChangeMaintenanceStateFailed,
}

impl std::fmt::Display for EventReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventReason::ChangedMaintenanceState => write!(f, "ChangedMaintenanceState"),
            EventReason::ChangeMaintenanceStateFailed => {
                write!(f, "ChangeMaintenanceStateFailed")
            }
        }
    }
}

/// Node-scoped lifecycle event. All events are informational; failures are
/// carried in the message and stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeEvent {
    pub id: Uuid,
    pub at: DateTime<Utc>,
    pub node: String,
    pub reason: EventReason,
    pub profile: String,
    pub state: NodeState,
    /// Apply stage that failed; absent on success events.
    pub stage: Option<String>,
    pub message: String,
}

// ── Cluster access ────────────────────────────────────────────────────────────

/// Access to the container orchestrator, as far as the controller needs it.
///
/// `get_node`/`patch_node` talk to the authoritative store; `cached_node`
/// reads the controller's local informer cache, which may lag behind a patch
/// it just made.
#[async_trait]
pub trait Cluster: Send + Sync + 'static {
    async fn get_node(&self, name: &str) -> Result<Option<Node>, StoreError>;

    async fn list_nodes(&self) -> Result<Vec<Node>, StoreError>;

    /// Merge-patch the node; returns the committed revision.
    async fn patch_node(&self, node: &Node) -> Result<u64, StoreError>;

    /// Read the node from the local cache.
    async fn cached_node(&self, name: &str) -> Result<Option<Node>, StoreError>;

    async fn list_pods_on(&self, node: &str) -> Result<Vec<Pod>, StoreError>;

    async fn get_lease(&self, name: &str) -> Result<Option<Lease>, StoreError>;

    async fn upsert_lease(&self, lease: &Lease) -> Result<(), StoreError>;

    async fn record_event(&self, event: &NodeEvent) -> Result<(), StoreError>;

    async fn list_events(
        &self,
        node: Option<&str>,
        limit: u32,
    ) -> Result<Vec<NodeEvent>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lease_expiry() {
        let now = Utc::now();
        let lease = Lease {
            name: "stagger".into(),
            holder: Some("n1".into()),
            renew_time: Some(now - Duration::seconds(30)),
            duration_seconds: 60,
        };
        assert!(!lease.expired(now));
        assert!(lease.expired(now + Duration::seconds(31)));
        assert!(lease.held_by("n1"));
        assert!(!lease.held_by("n2"));
    }

    #[test]
    fn lease_without_renew_time_is_expired() {
        let lease = Lease {
            name: "stagger".into(),
            holder: None,
            renew_time: None,
            duration_seconds: 60,
        };
        assert!(lease.expired(Utc::now()));
    }
}
