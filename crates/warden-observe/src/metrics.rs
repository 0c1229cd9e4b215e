//! Prometheus metrics for the maintenance controller.
//!
//! The metric names are contractual; dashboards and alerts reference them
//! verbatim.

use std::collections::HashSet;

use prometheus::{Encoder, GaugeVec, IntCounterVec, Opts, Registry, TextEncoder};
use thiserror::Error;
use warden_domain::Pod;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// Controller metrics, registered on an owned registry and text-encoded at
/// `/metrics`.
pub struct Metrics {
    pub registry: Registry,

    /// Failed profile applies, by profile.
    pub transition_failures: IntCounterVec,

    /// Workload owners whose pods had to relocate because a host node entered
    /// maintenance; incremented once per distinct owner per entry.
    pub pod_shuffles: IntCounterVec,

    /// Shuffle count divided by the owner's declared replica count. `+Inf`
    /// for unbounded owners such as DaemonSets.
    pub pod_shuffles_per_replica: GaugeVec,
}

impl Metrics {
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let transition_failures = IntCounterVec::new(
            Opts::new(
                "maintenance_controller_transition_failure_count",
                "Count of failed maintenance state transitions",
            ),
            &["profile"],
        )?;
        let pod_shuffles = IntCounterVec::new(
            Opts::new(
                "maintenance_controller_pod_shuffle_count",
                "Count of workload-owner pod relocations caused by maintenance",
            ),
            &["owner", "profile"],
        )?;
        let pod_shuffles_per_replica = GaugeVec::new(
            Opts::new(
                "maintenance_controller_pod_shuffles_per_replica",
                "Pod shuffles per declared replica of the workload owner",
            ),
            &["owner", "profile"],
        )?;

        registry.register(Box::new(transition_failures.clone()))?;
        registry.register(Box::new(pod_shuffles.clone()))?;
        registry.register(Box::new(pod_shuffles_per_replica.clone()))?;

        Ok(Self {
            registry,
            transition_failures,
            pod_shuffles,
            pod_shuffles_per_replica,
        })
    }

    pub fn record_transition_failure(&self, profile: &str) {
        self.transition_failures.with_label_values(&[profile]).inc();
    }

    /// Record one maintenance entry for the given profile: every distinct
    /// workload owner hosted on the node counts one shuffle.
    pub fn record_shuffles(&self, profile: &str, pods: &[Pod]) {
        let mut seen = HashSet::new();
        for pod in pods {
            let Some(owner) = &pod.owner else { continue };
            if !seen.insert((owner.kind.clone(), owner.name.clone())) {
                continue;
            }
            let owner_label = owner.to_string();
            let counter = self.pod_shuffles.with_label_values(&[&owner_label, profile]);
            counter.inc();
            let per_replica = match owner.replicas {
                Some(replicas) if replicas > 0 => counter.get() as f64 / replicas as f64,
                _ => f64::INFINITY,
            };
            self.pod_shuffles_per_replica
                .with_label_values(&[&owner_label, profile])
                .set(per_replica);
        }
    }

    /// Render the registry in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_domain::OwnerRef;

    fn pod(name: &str, owner: Option<OwnerRef>) -> Pod {
        Pod { name: name.into(), node: "n1".into(), owner }
    }

    #[test]
    fn transition_failures_count_per_profile() {
        let metrics = Metrics::new().unwrap();
        metrics.record_transition_failure("default");
        metrics.record_transition_failure("default");
        metrics.record_transition_failure("other");

        assert_eq!(
            metrics.transition_failures.with_label_values(&["default"]).get(),
            2
        );
        assert_eq!(
            metrics.transition_failures.with_label_values(&["other"]).get(),
            1
        );
    }

    #[test]
    fn shuffles_count_distinct_owners_once() {
        let metrics = Metrics::new().unwrap();
        let owner = OwnerRef { kind: "ReplicaSet".into(), name: "web".into(), replicas: Some(4) };
        metrics.record_shuffles(
            "default",
            &[
                pod("web-a", Some(owner.clone())),
                pod("web-b", Some(owner.clone())),
                pod("lonely", None),
            ],
        );

        let counter = metrics
            .pod_shuffles
            .with_label_values(&["ReplicaSet/web", "default"]);
        assert_eq!(counter.get(), 1, "two pods, one owner, one shuffle");

        let gauge = metrics
            .pod_shuffles_per_replica
            .with_label_values(&["ReplicaSet/web", "default"]);
        assert_eq!(gauge.get(), 0.25);
    }

    #[test]
    fn unbounded_owner_reports_infinite_per_replica() {
        let metrics = Metrics::new().unwrap();
        let owner = OwnerRef { kind: "DaemonSet".into(), name: "logs".into(), replicas: None };
        metrics.record_shuffles("default", &[pod("logs-x", Some(owner))]);

        let gauge = metrics
            .pod_shuffles_per_replica
            .with_label_values(&["DaemonSet/logs", "default"]);
        assert!(gauge.get().is_infinite());
    }

    #[test]
    fn encode_renders_metric_names() {
        let metrics = Metrics::new().unwrap();
        metrics.record_transition_failure("default");
        let text = metrics.encode().unwrap();
        assert!(text.contains("maintenance_controller_transition_failure_count"));
    }
}
