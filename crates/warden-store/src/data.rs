use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use warden_domain::{Node, NodeState, DATA_ANNOTATION};

use crate::error::StoreError;

/// Per-profile persisted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct ProfileData {
    /// Timestamp of the last state change.
    pub transition: DateTime<Utc>,
    pub current: NodeState,
    /// State observed at the end of the previous reconcile; drives the
    /// once-per-entry `Enter` chain.
    pub previous: NodeState,
}

impl ProfileData {
    /// Record for a profile that just appeared on a node.
    pub fn seeded(now: DateTime<Utc>) -> Self {
        Self {
            transition: now,
            current: NodeState::Operational,
            previous: NodeState::Operational,
        }
    }
}

/// Persisted per-node state, JSON-encoded into the maintenance-data
/// annotation. Created the first time a node is seen; rewritten, never
/// deleted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct Data {
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileData>,
    /// Last successful fire per notification instance, UTC.
    #[serde(default)]
    pub notifications: BTreeMap<String, DateTime<Utc>>,
}

impl Data {
    /// Parse the persisted record from a node's annotation.
    ///
    /// An absent annotation yields an empty record. A blob that fails the
    /// strict decode is given one chance as a v1 payload and migrated; only
    /// then does the parse error surface.
    pub fn parse(node: &Node) -> Result<Data, StoreError> {
        let Some(blob) = node.annotation(DATA_ANNOTATION) else {
            return Ok(Data::default());
        };
        match serde_json::from_str::<Data>(blob) {
            Ok(data) => Ok(data),
            Err(strict_err) => match serde_json::from_str::<V1Data>(blob) {
                Ok(v1) => {
                    debug!(node = %node.name, "migrated v1 maintenance data");
                    Ok(v1.migrate())
                }
                Err(_) => Err(StoreError::DataParse {
                    node: node.name.clone(),
                    message: strict_err.to_string(),
                }),
            },
        }
    }

    /// Serialize the record back into the node's annotation.
    pub fn write_to(&self, node: &mut Node) -> Result<(), StoreError> {
        let blob = serde_json::to_string(self)?;
        node.annotations.insert(DATA_ANNOTATION.to_string(), blob);
        Ok(())
    }

    /// Reconcile the profile records with the set of profile names currently
    /// assigned and configured: drop removed profiles, seed missing ones.
    pub fn maintain_profiles(&mut self, names: &[String], now: DateTime<Utc>) {
        self.profiles.retain(|name, _| names.iter().any(|n| n == name));
        for name in names {
            self.profiles
                .entry(name.clone())
                .or_insert_with(|| ProfileData::seeded(now));
        }
    }

    /// True if any profile is currently in maintenance.
    pub fn any_in_maintenance(&self) -> bool {
        self.profiles
            .values()
            .any(|pd| pd.current == NodeState::InMaintenance)
    }

    /// The exposed node state: the highest-severity state over all profiles,
    /// `operational` when no profile is assigned.
    pub fn aggregated_state(&self) -> NodeState {
        self.profiles
            .values()
            .map(|pd| pd.current)
            .max_by_key(NodeState::severity)
            .unwrap_or(NodeState::Operational)
    }
}

// ── v1 layout ─────────────────────────────────────────────────────────────────

/// The older flat persisted layout. Kept only as a migration source.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
struct V1Data {
    #[serde(default)]
    profile_states: BTreeMap<String, NodeState>,
    #[serde(default)]
    previous_states: BTreeMap<String, NodeState>,
    #[serde(default)]
    last_transition: Option<DateTime<Utc>>,
    #[serde(default)]
    last_notification_times: BTreeMap<String, DateTime<Utc>>,
    // Superseded singleton fields, mapped only when the per-instance map is
    // empty.
    #[serde(default)]
    last_notification: Option<DateTime<Utc>>,
    #[serde(default)]
    last_notification_state: Option<NodeState>,
}

impl V1Data {
    fn migrate(self) -> Data {
        let transition = self.last_transition.unwrap_or(DateTime::UNIX_EPOCH);
        let profiles = self
            .profile_states
            .iter()
            .map(|(name, current)| {
                let previous = self.previous_states.get(name).copied().unwrap_or(*current);
                (
                    name.clone(),
                    ProfileData { transition, current: *current, previous },
                )
            })
            .collect();

        let mut notifications = self.last_notification_times;
        if notifications.is_empty() {
            if let Some(at) = self.last_notification {
                notifications.insert(warden_domain::DEFAULT_PROFILE.to_string(), at);
            }
        }

        Data { profiles, notifications }
    }
}
