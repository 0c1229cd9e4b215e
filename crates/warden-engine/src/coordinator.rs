//! Multi-profile evaluation of a single node.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;
use warden_domain::{Clock, Node, NodeState, STATE_LABEL};
use warden_observe::Metrics;
use warden_store::{Cluster, Data, EventReason, NodeEvent};

use crate::error::EngineError;
use crate::fsm::{apply, ApplyFailure, ApplyParams, ApplyResult};
use crate::info::{NodeInfo, NodeInfoCache, ProfileInfo, ProfileOutcome};
use crate::profile::Profile;

/// Applies every profile assigned to a node, enforcing the
/// one-profile-in-maintenance invariant, and commits the results into the
/// in-memory node and data record. The reconciler owns the patch.
pub struct Coordinator {
    pub profiles: HashMap<String, Profile>,
    pub cluster: Arc<dyn Cluster>,
    pub clock: Arc<dyn Clock>,
    pub metrics: Arc<Metrics>,
    pub info_cache: Arc<NodeInfoCache>,
    pub label_filter: Vec<String>,
    pub cancel: CancellationToken,
}

struct Outcome {
    profile: String,
    /// State whose chains ran this round.
    driving: NodeState,
    result: Result<ApplyResult, ApplyFailure>,
}

impl Coordinator {
    pub async fn apply_profiles(
        &self,
        node: &mut Node,
        data: &mut Data,
    ) -> Result<(), EngineError> {
        let now = self.clock.now();

        // Reconcile the data record with the assigned, configured profiles.
        // Unknown names in the label are ignored.
        let assigned = node.profile_names();
        let known: Vec<String> = assigned
            .iter()
            .filter(|name| self.profiles.contains_key(*name))
            .cloned()
            .collect();
        for unknown in assigned.iter().filter(|n| !self.profiles.contains_key(*n)) {
            debug!(node = %node.name, profile = %unknown, "ignoring unconfigured profile");
        }
        data.maintain_profiles(&known, now);

        // Evaluate each profile in label order. The flag starts as "any
        // profile currently in maintenance" and is raised as soon as an apply
        // selects in-maintenance, so later profiles are blocked this round.
        let mut in_maintenance = data.any_in_maintenance();
        let mut outcomes: Vec<Outcome> = Vec::with_capacity(known.len());
        let mut failures: Vec<String> = Vec::new();
        for name in &known {
            let Some(profile) = self.profiles.get(name) else { continue };
            let Some(pd) = data.profiles.get(name).cloned() else { continue };
            let params = ApplyParams {
                in_maintenance,
                cluster: &self.cluster,
                clock: &self.clock,
                cancel: &self.cancel,
            };
            match apply(profile, node, &pd, data, &params).await {
                Ok(result) => {
                    if result.retry.is_none() && result.next == NodeState::InMaintenance {
                        in_maintenance = true;
                    }
                    outcomes.push(Outcome {
                        profile: name.clone(),
                        driving: pd.current,
                        result: Ok(result),
                    });
                }
                Err(failure) => {
                    warn!(
                        node = %node.name,
                        profile = %name,
                        stage = %failure.stage,
                        error = %failure.message,
                        "profile apply failed"
                    );
                    self.metrics.record_transition_failure(name);
                    self.record_event(NodeEvent {
                        id: Uuid::new_v4(),
                        at: now,
                        node: node.name.clone(),
                        reason: EventReason::ChangeMaintenanceStateFailed,
                        profile: name.clone(),
                        state: pd.current,
                        stage: Some(failure.stage.to_string()),
                        message: failure.message.clone(),
                    })
                    .await;
                    failures.push(format!("profile {}: {}", name, failure));
                    outcomes.push(Outcome {
                        profile: name.clone(),
                        driving: pd.current,
                        result: Err(failure),
                    });
                }
            }
        }

        // A hard failure anywhere means nothing is committed this round; the
        // snapshot still reflects the diagnostics.
        if !failures.is_empty() {
            self.publish_info(node, data, &outcomes, now);
            return Err(EngineError::Apply(failures.join("; ")));
        }

        // Commit: advance state for successful, non-retry applies; always
        // record the state that drove this iteration as the new previous.
        let mut changed: Vec<(String, NodeState, NodeState)> = Vec::new();
        let mut entered_maintenance: Vec<String> = Vec::new();
        for outcome in &outcomes {
            let Ok(result) = &outcome.result else { continue };
            let Some(pd) = data.profiles.get_mut(&outcome.profile) else { continue };
            if result.retry.is_none() && result.next != pd.current {
                let old = pd.current;
                pd.transition = now;
                pd.current = result.next;
                changed.push((outcome.profile.clone(), old, result.next));
                if result.next == NodeState::InMaintenance {
                    entered_maintenance.push(outcome.profile.clone());
                }
            }
            pd.previous = outcome.driving;
        }

        for (profile, old, new) in &changed {
            self.record_event(NodeEvent {
                id: Uuid::new_v4(),
                at: now,
                node: node.name.clone(),
                reason: EventReason::ChangedMaintenanceState,
                profile: profile.clone(),
                state: *new,
                stage: None,
                message: format!("profile {}: {} -> {}", profile, old, new),
            })
            .await;
        }

        if !entered_maintenance.is_empty() {
            match self.cluster.list_pods_on(&node.name).await {
                Ok(pods) => {
                    for profile in &entered_maintenance {
                        self.metrics.record_shuffles(profile, &pods);
                    }
                }
                Err(err) => {
                    warn!(node = %node.name, error = %err, "pod listing for shuffle metrics failed");
                }
            }
        }

        // Expose the aggregated state label.
        node.labels
            .insert(STATE_LABEL.to_string(), data.aggregated_state().as_str().to_string());

        self.publish_info(node, data, &outcomes, now);
        Ok(())
    }

    async fn record_event(&self, event: NodeEvent) {
        if let Err(err) = self.cluster.record_event(&event).await {
            warn!(node = %event.node, error = %err, "event recording failed");
        }
    }

    fn publish_info(
        &self,
        node: &Node,
        data: &Data,
        outcomes: &[Outcome],
        now: DateTime<Utc>,
    ) {
        let labels: BTreeMap<String, String> = self
            .label_filter
            .iter()
            .filter_map(|key| {
                node.label(key).map(|value| (key.clone(), value.to_string()))
            })
            .collect();
        let profiles = outcomes
            .iter()
            .filter_map(|outcome| {
                let pd = data.profiles.get(&outcome.profile)?;
                let info_outcome = match &outcome.result {
                    Ok(result) => ProfileOutcome::Applied {
                        next: result.next,
                        retry: result.retry.clone(),
                        transitions: result.transitions.clone(),
                    },
                    Err(failure) => ProfileOutcome::Failed {
                        stage: failure.stage.to_string(),
                        message: failure.message.clone(),
                        transitions: failure.transitions.clone(),
                    },
                };
                Some(ProfileInfo {
                    name: outcome.profile.clone(),
                    current: pd.current,
                    previous: pd.previous,
                    transition: pd.transition,
                    outcome: info_outcome,
                })
            })
            .collect();
        self.info_cache.publish(NodeInfo {
            node: node.name.clone(),
            state: data.aggregated_state(),
            labels,
            profiles,
            updated_at: now,
        });
    }
}
