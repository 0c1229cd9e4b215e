use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ── Well-known metadata keys ──────────────────────────────────────────────────

/// Label carrying the `--`-separated list of profile names assigned to a node.
pub const PROFILE_LABEL: &str = "cloud.sap/maintenance-profile";
/// Label exposing the aggregated maintenance state, written by the controller.
pub const STATE_LABEL: &str = "cloud.sap/maintenance-state";
/// Annotation holding the JSON-encoded persisted state record.
pub const DATA_ANNOTATION: &str = "cloud.sap/maintenance-data";
/// Label enabling verbose per-instance scheduling logs for one node.
pub const LOG_DETAILS_LABEL: &str = "cloud.sap/log-details";

/// Separator between profile names in the profile label value.
pub const PROFILE_SEPARATOR: &str = "--";
/// Profile assumed when the profile label is absent or empty.
pub const DEFAULT_PROFILE: &str = "default";

// ── Node ──────────────────────────────────────────────────────────────────────

/// A cluster node as the controller sees it: pure metadata plus the
/// schedulability flag. The actual machine is managed by external agents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    #[serde(default)]
    pub unschedulable: bool,
    /// Store revision, bumped on every committed patch. Not part of the
    /// semantic content of the node.
    #[serde(default)]
    pub revision: u64,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            labels: HashMap::new(),
            annotations: HashMap::new(),
            unschedulable: false,
            revision: 0,
        }
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    /// Profile names parsed from the profile label, in first-occurrence order
    /// with duplicates removed. Falls back to the default profile when the
    /// label is absent or empty.
    pub fn profile_names(&self) -> Vec<String> {
        let raw = self.label(PROFILE_LABEL).unwrap_or("");
        let mut names: Vec<String> = Vec::new();
        for part in raw.split(PROFILE_SEPARATOR) {
            let part = part.trim();
            if !part.is_empty() && !names.iter().any(|n| n == part) {
                names.push(part.to_string());
            }
        }
        if names.is_empty() {
            names.push(DEFAULT_PROFILE.to_string());
        }
        names
    }

    pub fn log_details(&self) -> bool {
        self.label(LOG_DETAILS_LABEL) == Some("true")
    }

    /// Equality over the node's semantic content, ignoring the store revision.
    /// Used to skip no-op patches.
    pub fn semantic_eq(&self, other: &Node) -> bool {
        self.name == other.name
            && self.labels == other.labels
            && self.annotations == other.annotations
            && self.unschedulable == other.unschedulable
    }
}

// ── Pods and workload owners ──────────────────────────────────────────────────

/// Controlling workload of a pod (DaemonSet, ReplicaSet, StatefulSet, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerRef {
    pub kind: String,
    pub name: String,
    /// Declared replica count; `None` for unbounded owners such as DaemonSets.
    pub replicas: Option<u32>,
}

impl std::fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

/// A pod hosted on a node, reduced to what the shuffle metrics need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pod {
    pub name: String,
    pub node: String,
    pub owner: Option<OwnerRef>,
}
