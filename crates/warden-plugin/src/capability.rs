use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use warden_domain::{Clock, Node, NodeState};
use warden_store::{Cluster, ProfileData};

use crate::error::PluginError;

// ── Contexts ──────────────────────────────────────────────────────────────────

/// Read-only view handed to check instances. Checks may read external state
/// through `cluster` but must not mutate the node object.
pub struct CheckContext<'a> {
    pub node: &'a Node,
    pub profile: &'a str,
    pub state: NodeState,
    /// True while any profile on this node is in maintenance this round.
    pub in_maintenance: bool,
    pub log_details: bool,
    pub profile_data: &'a ProfileData,
    pub cluster: &'a Arc<dyn Cluster>,
    pub clock: &'a Arc<dyn Clock>,
    pub cancel: &'a CancellationToken,
}

/// Mutable view handed to trigger instances. Triggers rewrite the in-memory
/// node; the reconciler patches the result once per round.
pub struct TriggerContext<'a> {
    pub node: &'a mut Node,
    pub profile: &'a str,
    pub state: NodeState,
    /// Target state of the transition being taken; equals `state` for enter
    /// chains.
    pub next: NodeState,
    pub cluster: &'a Arc<dyn Cluster>,
    pub clock: &'a Arc<dyn Clock>,
    pub cancel: &'a CancellationToken,
}

pub struct NotifyContext<'a> {
    pub node: &'a Node,
    pub profile: &'a str,
    pub state: NodeState,
    pub log_details: bool,
    pub cluster: &'a Arc<dyn Cluster>,
    pub clock: &'a Arc<dyn Clock>,
    pub cancel: &'a CancellationToken,
}

// ── Results ───────────────────────────────────────────────────────────────────

/// Outcome of a single check invocation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckResult {
    pub passed: bool,
    /// Free-form diagnostics surfaced per instance in the info cache.
    pub info: HashMap<String, String>,
}

impl CheckResult {
    pub fn passed() -> Self {
        Self { passed: true, info: HashMap::new() }
    }

    pub fn failed() -> Self {
        Self { passed: false, info: HashMap::new() }
    }

    pub fn with_info(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.info.insert(key.into(), value.into());
        self
    }
}

// ── Capabilities ──────────────────────────────────────────────────────────────

/// Pure predicate over a node.
#[async_trait]
pub trait Checker: Send + Sync + 'static {
    async fn check(&self, ctx: &CheckContext<'_>) -> Result<CheckResult, PluginError>;

    /// Invoked exactly when a check chain this instance contributed to
    /// evaluated true and its transition is taken. Used by checks whose
    /// firing has side effects, e.g. lease acquisition.
    async fn on_transition(&self, _ctx: &CheckContext<'_>) -> Result<(), PluginError> {
        Ok(())
    }
}

/// Imperative action accompanying a state transition. Must be idempotent.
#[async_trait]
pub trait Trigger: Send + Sync + 'static {
    async fn trigger(&self, ctx: &mut TriggerContext<'_>) -> Result<(), PluginError>;
}

/// Produces an external message. Non-idempotent; firing is gated by the
/// per-instance schedule.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn notify(&self, ctx: &NotifyContext<'_>) -> Result<(), PluginError>;
}
