//! Built-in plugin set: node-metadata checks and triggers, timing checks,
//! cross-node coordination checks, and the log notifier.
//!
//! External transports (chat, mail, hypervisor controllers) live outside this
//! crate behind the same capability traits.

mod annotation;
mod coordination;
mod label;
mod notify;
mod timing;

use std::sync::Arc;

use serde::de::DeserializeOwned;

pub use annotation::{AlterAnnotation, HasAnnotation};
pub use coordination::{MaxMaintenance, Stagger};
pub use label::{AlterLabel, HasLabel};
pub use notify::LogNotify;
pub use timing::{TimeWindow, Wait};

use crate::error::PluginError;
use crate::registry::PluginRegistry;

/// Decode a plugin instance's `config:` mapping. An absent config decodes
/// like an empty mapping so configs consisting only of defaults stay
/// optional.
pub fn decode_config<T: DeserializeOwned>(value: &serde_yaml::Value) -> Result<T, PluginError> {
    let value = if value.is_null() {
        serde_yaml::Value::Mapping(Default::default())
    } else {
        value.clone()
    };
    serde_yaml::from_value(value).map_err(|e| PluginError::InvalidConfig(e.to_string()))
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use tokio_util::sync::CancellationToken;
    use warden_domain::{Clock, ManualClock, Node, NodeState};
    use warden_store::{Cluster, InMemoryCluster, ProfileData};

    use crate::capability::{CheckContext, NotifyContext, TriggerContext};

    /// Shared fixture for builtin plugin tests.
    pub struct TestEnv {
        pub node: Node,
        pub profile_data: ProfileData,
        pub state: NodeState,
        pub in_maintenance: bool,
        pub memory: Arc<InMemoryCluster>,
        pub cluster: Arc<dyn Cluster>,
        pub manual: Arc<ManualClock>,
        pub clock: Arc<dyn Clock>,
        pub cancel: CancellationToken,
    }

    impl TestEnv {
        pub fn new() -> Self {
            let memory = Arc::new(InMemoryCluster::new());
            let manual = Arc::new(ManualClock::new(Utc::now()));
            Self {
                node: Node::new("n1"),
                profile_data: ProfileData::seeded(manual.now()),
                state: NodeState::Operational,
                in_maintenance: false,
                cluster: memory.clone(),
                memory,
                clock: manual.clone(),
                manual,
                cancel: CancellationToken::new(),
            }
        }

        pub fn check_ctx(&self) -> CheckContext<'_> {
            CheckContext {
                node: &self.node,
                profile: "default",
                state: self.state,
                in_maintenance: self.in_maintenance,
                log_details: false,
                profile_data: &self.profile_data,
                cluster: &self.cluster,
                clock: &self.clock,
                cancel: &self.cancel,
            }
        }

        pub fn trigger_ctx(&mut self) -> TriggerContext<'_> {
            TriggerContext {
                node: &mut self.node,
                profile: "default",
                state: self.state,
                next: NodeState::Required,
                cluster: &self.cluster,
                clock: &self.clock,
                cancel: &self.cancel,
            }
        }

        pub fn notify_ctx(&self) -> NotifyContext<'_> {
            NotifyContext {
                node: &self.node,
                profile: "default",
                state: self.state,
                log_details: false,
                cluster: &self.cluster,
                clock: &self.clock,
                cancel: &self.cancel,
            }
        }
    }
}

pub fn register(registry: &mut PluginRegistry) {
    registry
        .register_checker("has_label", Box::new(|v| Ok(Arc::new(decode_config::<HasLabel>(v)?))))
        .register_checker(
            "has_annotation",
            Box::new(|v| Ok(Arc::new(decode_config::<HasAnnotation>(v)?))),
        )
        .register_checker("wait", Box::new(|v| Ok(Arc::new(decode_config::<Wait>(v)?))))
        .register_checker("time_window", Box::new(|v| Ok(Arc::new(TimeWindow::from_config(v)?))))
        .register_checker(
            "max_maintenance",
            Box::new(|v| Ok(Arc::new(decode_config::<MaxMaintenance>(v)?))),
        )
        .register_checker("stagger", Box::new(|v| Ok(Arc::new(decode_config::<Stagger>(v)?))));

    registry
        .register_trigger(
            "alter_label",
            Box::new(|v| Ok(Arc::new(decode_config::<AlterLabel>(v)?))),
        )
        .register_trigger(
            "alter_annotation",
            Box::new(|v| Ok(Arc::new(decode_config::<AlterAnnotation>(v)?))),
        );

    registry
        .register_notifier("log_notify", Box::new(|v| Ok(Arc::new(decode_config::<LogNotify>(v)?))));
}
