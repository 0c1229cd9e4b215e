use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Raw YAML representation of the controller configuration file.
///
/// Chain references stay as `&&`-joined instance-name strings here; they are
/// resolved against the instance registry when profiles are compiled.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    #[serde(default)]
    pub intervals: RawIntervals,
    #[serde(default)]
    pub dashboard: RawDashboard,
    #[serde(default)]
    pub instances: RawInstances,
    #[serde(default)]
    pub profiles: Vec<RawProfile>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawIntervals {
    #[serde(default = "default_requeue", with = "crate::duration")]
    pub requeue: Duration,
}

impl Default for RawIntervals {
    fn default() -> Self {
        Self { requeue: default_requeue() }
    }
}

fn default_requeue() -> Duration {
    Duration::from_secs(5 * 60)
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawDashboard {
    /// Label keys copied into the per-node info payload.
    #[serde(default, rename = "labelFilter")]
    pub label_filter: Vec<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawInstances {
    #[serde(default)]
    pub check: Vec<RawInstance>,
    #[serde(default)]
    pub trigger: Vec<RawInstance>,
    #[serde(default)]
    pub notify: Vec<RawNotifyInstance>,
}

/// A named, typed plugin instantiation. `config` is decoded by the
/// constructor registered for `type`.
#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawInstance {
    #[serde(rename = "type")]
    pub plugin_type: String,
    pub name: String,
    #[serde(default)]
    pub config: serde_yaml::Value,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawNotifyInstance {
    #[serde(rename = "type")]
    pub plugin_type: String,
    pub name: String,
    pub schedule: RawSchedule,
    #[serde(default)]
    pub config: serde_yaml::Value,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawSchedule {
    #[serde(rename = "type")]
    pub schedule_type: String,
    #[serde(default)]
    pub config: serde_yaml::Value,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawProfile {
    pub name: String,
    #[serde(default)]
    pub operational: RawChains,
    #[serde(default, rename = "maintenance-required")]
    pub maintenance_required: RawChains,
    #[serde(default, rename = "in-maintenance")]
    pub in_maintenance: RawChains,
}

/// Chains attached to one state of a profile. A missing chain is the empty
/// chain.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawChains {
    /// `&&`-joined trigger instance names, run once on state entry.
    #[serde(default)]
    pub enter: Option<String>,
    /// `&&`-joined notification instance names.
    #[serde(default)]
    pub notification: Option<String>,
    #[serde(default)]
    pub transitions: Vec<RawTransition>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawTransition {
    /// Boolean expression over check instance names.
    pub check: String,
    /// `&&`-joined trigger instance names, run when the transition is taken.
    #[serde(default)]
    pub trigger: Option<String>,
    /// Target state label.
    pub next: String,
}
