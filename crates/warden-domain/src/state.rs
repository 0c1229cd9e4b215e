use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Lifecycle state of a node under one maintenance profile.
///
/// The wire values double as the `maintenance-state` label values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum NodeState {
    #[default]
    #[serde(rename = "operational")]
    Operational,
    #[serde(rename = "maintenance-required")]
    Required,
    #[serde(rename = "in-maintenance")]
    InMaintenance,
}

impl NodeState {
    pub const ALL: [NodeState; 3] = [
        NodeState::Operational,
        NodeState::Required,
        NodeState::InMaintenance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeState::Operational => "operational",
            NodeState::Required => "maintenance-required",
            NodeState::InMaintenance => "in-maintenance",
        }
    }

    /// Ordering used to aggregate per-profile states into the exposed node
    /// label: `operational < maintenance-required < in-maintenance`.
    pub fn severity(&self) -> u8 {
        match self {
            NodeState::Operational => 0,
            NodeState::Required => 1,
            NodeState::InMaintenance => 2,
        }
    }
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for NodeState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "operational" => Ok(NodeState::Operational),
            "maintenance-required" => Ok(NodeState::Required),
            "in-maintenance" => Ok(NodeState::InMaintenance),
            other => Err(DomainError::InvalidStateLabel(other.to_string())),
        }
    }
}
