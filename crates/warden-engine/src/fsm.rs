//! Per-profile state machine.
//!
//! The three lifecycle states share one capability surface; differences
//! between them live entirely in the configured chains, so the provided
//! method bodies carry the whole algorithm and the state types only name
//! themselves.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use warden_domain::{Clock, Node, NodeState};
use warden_plugin::{
    ChainError, CheckChainResult, CheckContext, NotifyContext, TriggerContext,
};
use warden_store::{Cluster, Data, ProfileData};

use crate::profile::{PluginChains, Profile, Transition};

// ── Results ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyStage {
    Enter,
    Notify,
    Check,
    Trigger,
}

impl std::fmt::Display for ApplyStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ApplyStage::Enter => "enter",
            ApplyStage::Notify => "notify",
            ApplyStage::Check => "check",
            ApplyStage::Trigger => "trigger",
        };
        write!(f, "{}", s)
    }
}

/// Evaluation record of one configured transition.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionResult {
    pub next: NodeState,
    pub check: CheckChainResult,
}

/// Successful apply: the advisory next state plus per-transition diagnostics.
/// `retry` carries the reason when a trigger signalled partial progress; the
/// caller keeps the current state this round.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyResult {
    pub next: NodeState,
    pub transitions: Vec<TransitionResult>,
    pub retry: Option<String>,
}

/// Hard apply failure. Collected diagnostics survive for observability.
#[derive(Debug, Error)]
#[error("{stage} stage: {message}")]
pub struct ApplyFailure {
    pub stage: ApplyStage,
    pub transitions: Vec<TransitionResult>,
    pub message: String,
}

/// Per-round plugin environment shared by all chains of one profile apply.
pub struct ApplyParams<'a> {
    /// True while any profile on this node is in maintenance this round.
    pub in_maintenance: bool,
    pub cluster: &'a Arc<dyn Cluster>,
    pub clock: &'a Arc<dyn Clock>,
    pub cancel: &'a CancellationToken,
}

struct TransitionsEval {
    next: NodeState,
    selected: Option<usize>,
    results: Vec<TransitionResult>,
    error: Option<String>,
}

// ── State logic ───────────────────────────────────────────────────────────────

#[async_trait]
trait StateLogic: Send + Sync {
    fn label(&self) -> NodeState;

    /// Run the enter chain; called once when `previous != current`.
    async fn enter(
        &self,
        profile: &str,
        chains: &PluginChains,
        node: &mut Node,
        params: &ApplyParams<'_>,
    ) -> Result<(), ChainError> {
        if chains.enter.is_empty() {
            return Ok(());
        }
        let mut ctx = TriggerContext {
            node,
            profile,
            state: self.label(),
            next: self.label(),
            cluster: params.cluster,
            clock: params.clock,
            cancel: params.cancel,
        };
        chains.enter.execute(&mut ctx).await
    }

    async fn notify(
        &self,
        profile: &str,
        chains: &PluginChains,
        node: &Node,
        pd: &ProfileData,
        data: &mut Data,
        params: &ApplyParams<'_>,
    ) -> Result<(), ChainError> {
        if chains.notification.is_empty() {
            return Ok(());
        }
        let ctx = NotifyContext {
            node,
            profile,
            state: self.label(),
            log_details: node.log_details(),
            cluster: params.cluster,
            clock: params.clock,
            cancel: params.cancel,
        };
        chains.notification.execute(&ctx, pd, data).await
    }

    /// Default transition selection: evaluate transitions in order, pick the
    /// first whose chain passed and whose target is not `in-maintenance`
    /// while another profile already is. A check failure stops evaluation;
    /// partial results are retained and the advisory next stays current.
    async fn transition(
        &self,
        profile: &str,
        chains: &PluginChains,
        node: &Node,
        pd: &ProfileData,
        params: &ApplyParams<'_>,
    ) -> TransitionsEval {
        let mut results = Vec::with_capacity(chains.transitions.len());
        let mut selected: Option<usize> = None;
        for (index, transition) in chains.transitions.iter().enumerate() {
            let ctx = CheckContext {
                node,
                profile,
                state: self.label(),
                in_maintenance: params.in_maintenance,
                log_details: node.log_details(),
                profile_data: pd,
                cluster: params.cluster,
                clock: params.clock,
                cancel: params.cancel,
            };
            let check = transition.check.evaluate(&ctx).await;
            let failed = check.error.clone();
            results.push(TransitionResult { next: transition.next, check });
            if let Some(message) = failed {
                return TransitionsEval {
                    next: self.label(),
                    selected: None,
                    results,
                    error: Some(message),
                };
            }
            let blocked =
                transition.next == NodeState::InMaintenance && params.in_maintenance;
            if selected.is_none() && results[index].check.passed && !blocked {
                selected = Some(index);
            }
        }
        let next = selected
            .map(|index| chains.transitions[index].next)
            .unwrap_or_else(|| self.label());
        TransitionsEval { next, selected, results, error: None }
    }

    /// Run the taken transition's trigger chain, then the side-effect hooks
    /// of the checks that selected it.
    async fn trigger(
        &self,
        profile: &str,
        transition: &Transition,
        node: &mut Node,
        pd: &ProfileData,
        params: &ApplyParams<'_>,
    ) -> Result<(), ChainError> {
        let mut ctx = TriggerContext {
            node: &mut *node,
            profile,
            state: self.label(),
            next: transition.next,
            cluster: params.cluster,
            clock: params.clock,
            cancel: params.cancel,
        };
        transition.trigger.execute(&mut ctx).await?;

        let log_details = node.log_details();
        let ctx = CheckContext {
            node: &*node,
            profile,
            state: self.label(),
            in_maintenance: params.in_maintenance,
            log_details,
            profile_data: pd,
            cluster: params.cluster,
            clock: params.clock,
            cancel: params.cancel,
        };
        transition.check.on_transition(&ctx).await
    }
}

struct OperationalState;
struct RequiredState;
struct InMaintenanceState;

#[async_trait]
impl StateLogic for OperationalState {
    fn label(&self) -> NodeState {
        NodeState::Operational
    }
}

#[async_trait]
impl StateLogic for RequiredState {
    fn label(&self) -> NodeState {
        NodeState::Required
    }
}

#[async_trait]
impl StateLogic for InMaintenanceState {
    fn label(&self) -> NodeState {
        NodeState::InMaintenance
    }
}

fn state_logic(state: NodeState) -> &'static dyn StateLogic {
    match state {
        NodeState::Operational => &OperationalState,
        NodeState::Required => &RequiredState,
        NodeState::InMaintenance => &InMaintenanceState,
    }
}

// ── Apply ─────────────────────────────────────────────────────────────────────

/// Drive one profile through one reconcile round: enter, notify, transition
/// checks, transition trigger, in that order. The caller owns the commit of
/// `next` (see the coordinator).
pub async fn apply(
    profile: &Profile,
    node: &mut Node,
    pd: &ProfileData,
    data: &mut Data,
    params: &ApplyParams<'_>,
) -> Result<ApplyResult, ApplyFailure> {
    let current = pd.current;
    let logic = state_logic(current);
    let chains = profile.chains(current);

    // 1. Enter, exactly once per state entry.
    if pd.previous != pd.current {
        if let Err(err) = logic.enter(&profile.name, chains, node, params).await {
            if err.is_retry() {
                return Ok(ApplyResult {
                    next: current,
                    transitions: Vec::new(),
                    retry: Some(err.to_string()),
                });
            }
            return Err(ApplyFailure {
                stage: ApplyStage::Enter,
                transitions: Vec::new(),
                message: err.to_string(),
            });
        }
    }

    // 2. Notifications.
    if let Err(err) = logic
        .notify(&profile.name, chains, node, pd, data, params)
        .await
    {
        return Err(ApplyFailure {
            stage: ApplyStage::Notify,
            transitions: Vec::new(),
            message: err.to_string(),
        });
    }

    // 3. Transition selection.
    let eval = logic
        .transition(&profile.name, chains, node, pd, params)
        .await;
    if let Some(message) = eval.error {
        return Err(ApplyFailure {
            stage: ApplyStage::Check,
            transitions: eval.results,
            message,
        });
    }

    // 4. Transition trigger.
    if eval.next != current {
        if let Some(index) = eval.selected {
            let transition = &chains.transitions[index];
            if let Err(err) = logic
                .trigger(&profile.name, transition, node, pd, params)
                .await
            {
                if err.is_retry() {
                    return Ok(ApplyResult {
                        next: eval.next,
                        transitions: eval.results,
                        retry: Some(err.to_string()),
                    });
                }
                return Err(ApplyFailure {
                    stage: ApplyStage::Trigger,
                    transitions: eval.results,
                    message: err.to_string(),
                });
            }
        }
    }

    Ok(ApplyResult { next: eval.next, transitions: eval.results, retry: None })
}
