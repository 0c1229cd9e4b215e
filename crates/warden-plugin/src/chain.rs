//! Execution of check, trigger and notification chains.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use warden_domain::Clock as _;
use warden_store::{Data, ProfileData};

use crate::capability::{CheckContext, Checker, Notifier, NotifyContext, Trigger, TriggerContext};
use crate::error::PluginError;
use crate::expr::BoolExpr;
use crate::registry::InstanceSet;
use crate::schedule::{Schedule, ScheduleInput};

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("check '{name}': {source}")]
    Check {
        name: String,
        #[source]
        source: PluginError,
    },

    #[error("trigger '{name}': {source}")]
    Trigger {
        name: String,
        #[source]
        source: PluginError,
    },

    #[error("notifier '{name}': {source}")]
    Notify {
        name: String,
        #[source]
        source: PluginError,
    },

    #[error("check chain evaluation: {0}")]
    Evaluation(String),
}

impl ChainError {
    /// True when the underlying plugin signalled the retry condition.
    pub fn is_retry(&self) -> bool {
        match self {
            ChainError::Check { source, .. }
            | ChainError::Trigger { source, .. }
            | ChainError::Notify { source, .. } => source.is_retry(),
            ChainError::Evaluation(_) => false,
        }
    }
}

// ── Check chains ──────────────────────────────────────────────────────────────

#[derive(Clone)]
struct CheckInstance {
    name: String,
    plugin: Arc<dyn Checker>,
}

/// A boolean expression over named check instances.
///
/// Every referenced instance runs exactly once per evaluation; results are
/// memoised and the expression evaluated against the memo map, so the
/// per-instance record is complete regardless of expression shape.
#[derive(Clone, Default)]
pub struct CheckChain {
    expr: Option<BoolExpr>,
    instances: Vec<CheckInstance>,
}

impl std::fmt::Debug for CheckChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckChain")
            .field("instances", &self.instances.iter().map(|i| &i.name).collect::<Vec<_>>())
            .finish()
    }
}

/// Decision record of a single check instance within one evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct CheckRecord {
    pub name: String,
    pub passed: bool,
    pub info: HashMap<String, String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckChainResult {
    pub passed: bool,
    pub records: Vec<CheckRecord>,
    /// Set when any instance errored; partial records are retained.
    pub error: Option<String>,
}

impl CheckChain {
    /// Compile a check expression, resolving every referenced instance.
    /// An empty source compiles to the empty chain, which never passes.
    pub fn compile(src: &str, set: &InstanceSet) -> Result<Self, PluginError> {
        let src = src.trim();
        if src.is_empty() {
            return Ok(Self::default());
        }
        let expr = BoolExpr::parse(src)?;
        let mut instances = Vec::new();
        for name in expr.references() {
            let plugin = set.check(&name)?;
            instances.push(CheckInstance { name, plugin });
        }
        Ok(Self { expr: Some(expr), instances })
    }

    pub fn is_empty(&self) -> bool {
        self.expr.is_none()
    }

    pub async fn evaluate(&self, ctx: &CheckContext<'_>) -> CheckChainResult {
        let Some(expr) = &self.expr else {
            // The empty chain never fires its transition.
            return CheckChainResult::default();
        };

        let mut records = Vec::with_capacity(self.instances.len());
        let mut memo = HashMap::with_capacity(self.instances.len());
        for instance in &self.instances {
            match instance.plugin.check(ctx).await {
                Ok(result) => {
                    if ctx.log_details {
                        debug!(
                            node = %ctx.node.name,
                            profile = %ctx.profile,
                            check = %instance.name,
                            passed = result.passed,
                            "check evaluated"
                        );
                    }
                    memo.insert(instance.name.clone(), result.passed);
                    records.push(CheckRecord {
                        name: instance.name.clone(),
                        passed: result.passed,
                        info: result.info,
                        error: None,
                    });
                }
                Err(err) => {
                    records.push(CheckRecord {
                        name: instance.name.clone(),
                        passed: false,
                        info: HashMap::new(),
                        error: Some(err.to_string()),
                    });
                    return CheckChainResult {
                        passed: false,
                        records,
                        error: Some(
                            ChainError::Check { name: instance.name.clone(), source: err }
                                .to_string(),
                        ),
                    };
                }
            }
        }

        match expr.evaluate(&memo) {
            Ok(passed) => CheckChainResult { passed, records, error: None },
            Err(err) => CheckChainResult {
                passed: false,
                records,
                error: Some(ChainError::Evaluation(err.to_string()).to_string()),
            },
        }
    }

    /// Fire the side-effect hook of every contributing instance. Called when
    /// the chain evaluated true and its transition is taken.
    pub async fn on_transition(&self, ctx: &CheckContext<'_>) -> Result<(), ChainError> {
        for instance in &self.instances {
            instance
                .plugin
                .on_transition(ctx)
                .await
                .map_err(|source| ChainError::Check { name: instance.name.clone(), source })?;
        }
        Ok(())
    }
}

// ── Trigger chains ────────────────────────────────────────────────────────────

#[derive(Clone)]
struct TriggerInstance {
    name: String,
    plugin: Arc<dyn Trigger>,
}

/// Ordered trigger sequence; execution stops at the first error.
#[derive(Clone, Default)]
pub struct TriggerChain {
    instances: Vec<TriggerInstance>,
}

impl std::fmt::Debug for TriggerChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerChain")
            .field("instances", &self.instances.iter().map(|i| &i.name).collect::<Vec<_>>())
            .finish()
    }
}

impl TriggerChain {
    /// Compile a `&&`-joined instance-name list. `None` or blank is the empty
    /// chain.
    pub fn compile(src: Option<&str>, set: &InstanceSet) -> Result<Self, PluginError> {
        let mut instances = Vec::new();
        for name in split_chain(src) {
            let plugin = set.trigger(&name)?;
            instances.push(TriggerInstance { name, plugin });
        }
        Ok(Self { instances })
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub async fn execute(&self, ctx: &mut TriggerContext<'_>) -> Result<(), ChainError> {
        for instance in &self.instances {
            instance
                .plugin
                .trigger(ctx)
                .await
                .map_err(|source| ChainError::Trigger { name: instance.name.clone(), source })?;
        }
        Ok(())
    }
}

// ── Notification chains ───────────────────────────────────────────────────────

#[derive(Clone)]
struct NotifyLink {
    name: String,
    plugin: Arc<dyn Notifier>,
    schedule: Schedule,
}

/// Ordered notification sequence. Each instance fires according to its
/// schedule; a successful fire advances the per-instance last-fire timestamp.
#[derive(Clone, Default)]
pub struct NotificationChain {
    instances: Vec<NotifyLink>,
}

impl std::fmt::Debug for NotificationChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationChain")
            .field("instances", &self.instances.iter().map(|i| &i.name).collect::<Vec<_>>())
            .finish()
    }
}

impl NotificationChain {
    pub fn compile(src: Option<&str>, set: &InstanceSet) -> Result<Self, PluginError> {
        let mut instances = Vec::new();
        for name in split_chain(src) {
            let instance = set.notifier(&name)?;
            instances.push(NotifyLink {
                name,
                plugin: instance.plugin,
                schedule: instance.schedule,
            });
        }
        Ok(Self { instances })
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub async fn execute(
        &self,
        ctx: &NotifyContext<'_>,
        profile_data: &ProfileData,
        data: &mut Data,
    ) -> Result<(), ChainError> {
        for link in &self.instances {
            let now = ctx.clock.now();
            let input = ScheduleInput {
                now,
                last_fire: data.notifications.get(&link.name).copied(),
                current: profile_data.current,
                previous: profile_data.previous,
                transition: profile_data.transition,
            };
            let fire = link.schedule.should_fire(&input);
            if ctx.log_details {
                debug!(
                    node = %ctx.node.name,
                    profile = %ctx.profile,
                    notifier = %link.name,
                    fire,
                    last_fire = ?input.last_fire,
                    "notification scheduling decision"
                );
            }
            if !fire {
                continue;
            }
            link.plugin
                .notify(ctx)
                .await
                .map_err(|source| ChainError::Notify { name: link.name.clone(), source })?;
            data.notifications.insert(link.name.clone(), now);
        }
        Ok(())
    }
}

fn split_chain(src: Option<&str>) -> Vec<String> {
    src.unwrap_or("")
        .split("&&")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;
    use tokio_util::sync::CancellationToken;
    use warden_domain::{Clock, ManualClock, Node, NodeState};
    use warden_store::{Cluster, InMemoryCluster};

    use crate::capability::CheckResult;
    use crate::registry::PluginRegistry;
    use crate::PluginError;

    struct CountingCheck {
        calls: Arc<AtomicUsize>,
        passed: bool,
    }

    #[async_trait]
    impl Checker for CountingCheck {
        async fn check(&self, _ctx: &CheckContext<'_>) -> Result<CheckResult, PluginError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(if self.passed { CheckResult::passed() } else { CheckResult::failed() })
        }
    }

    struct FailingCheck;

    #[async_trait]
    impl Checker for FailingCheck {
        async fn check(&self, _ctx: &CheckContext<'_>) -> Result<CheckResult, PluginError> {
            Err(PluginError::Failed("backend unreachable".into()))
        }
    }

    struct RecordingTrigger {
        calls: Arc<AtomicUsize>,
        result: Option<PluginError>,
    }

    #[async_trait]
    impl Trigger for RecordingTrigger {
        async fn trigger(&self, _ctx: &mut TriggerContext<'_>) -> Result<(), PluginError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.result {
                None => Ok(()),
                Some(PluginError::Retry(reason)) => Err(PluginError::Retry(reason.clone())),
                Some(_) => Err(PluginError::Failed("boom".into())),
            }
        }
    }

    // Building an InstanceSet from ad-hoc plugins goes through the same YAML
    // path production uses; type names are derived from the instance names.
    fn set_with(
        checks: Vec<(&str, Arc<dyn Checker>)>,
        triggers: Vec<(&str, Arc<dyn Trigger>)>,
    ) -> InstanceSet {
        let mut registry = PluginRegistry::new();
        let mut check_yaml = String::new();
        let mut trigger_yaml = String::new();
        for (name, plugin) in checks {
            let plugin = plugin.clone();
            let type_name: &'static str = Box::leak(format!("t_{name}").into_boxed_str());
            registry.register_checker(type_name, Box::new(move |_| Ok(plugin.clone())));
            check_yaml.push_str(&format!("  - {{ type: {type_name}, name: {name} }}\n"));
        }
        for (name, plugin) in triggers {
            let plugin = plugin.clone();
            let type_name: &'static str = Box::leak(format!("t_{name}").into_boxed_str());
            registry.register_trigger(type_name, Box::new(move |_| Ok(plugin.clone())));
            trigger_yaml.push_str(&format!("  - {{ type: {type_name}, name: {name} }}\n"));
        }
        let mut yaml = String::new();
        if !check_yaml.is_empty() {
            yaml.push_str("check:\n");
            yaml.push_str(&check_yaml);
        }
        if !trigger_yaml.is_empty() {
            yaml.push_str("trigger:\n");
            yaml.push_str(&trigger_yaml);
        }
        if yaml.is_empty() {
            yaml.push_str("{}");
        }
        let raw = serde_yaml::from_str(&yaml).unwrap();
        InstanceSet::from_config(&registry, &raw).unwrap()
    }

    struct Env {
        node: Node,
        profile_data: ProfileData,
        cluster: Arc<dyn Cluster>,
        clock: Arc<dyn Clock>,
        cancel: CancellationToken,
    }

    impl Env {
        fn new() -> Self {
            Self {
                node: Node::new("n1"),
                profile_data: ProfileData::seeded(Utc::now()),
                cluster: Arc::new(InMemoryCluster::new()),
                clock: Arc::new(ManualClock::new(Utc::now())),
                cancel: CancellationToken::new(),
            }
        }

        fn check_ctx(&self) -> CheckContext<'_> {
            CheckContext {
                node: &self.node,
                profile: "default",
                state: NodeState::Operational,
                in_maintenance: false,
                log_details: false,
                profile_data: &self.profile_data,
                cluster: &self.cluster,
                clock: &self.clock,
                cancel: &self.cancel,
            }
        }
    }

    #[tokio::test]
    async fn each_instance_runs_exactly_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let set = set_with(
            vec![(
                "a",
                Arc::new(CountingCheck { calls: calls.clone(), passed: true }) as Arc<dyn Checker>,
            )],
            vec![],
        );
        let chain = CheckChain::compile("a && (a || a)", &set).unwrap();

        let env = Env::new();
        let result = chain.evaluate(&env.check_ctx()).await;
        assert!(result.passed);
        assert_eq!(calls.load(Ordering::SeqCst), 1, "memoised, no re-execution");
        assert_eq!(result.records.len(), 1);
    }

    #[tokio::test]
    async fn empty_chain_never_passes() {
        let set = set_with(vec![], vec![]);
        let chain = CheckChain::compile("   ", &set).unwrap();
        assert!(chain.is_empty());

        let env = Env::new();
        let result = chain.evaluate(&env.check_ctx()).await;
        assert!(!result.passed);
        assert!(result.records.is_empty());
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn check_error_fails_chain_but_keeps_records() {
        let calls = Arc::new(AtomicUsize::new(0));
        let set = set_with(
            vec![
                (
                    "ok",
                    Arc::new(CountingCheck { calls: calls.clone(), passed: true })
                        as Arc<dyn Checker>,
                ),
                ("bad", Arc::new(FailingCheck) as Arc<dyn Checker>),
            ],
            vec![],
        );
        let chain = CheckChain::compile("ok && bad", &set).unwrap();

        let env = Env::new();
        let result = chain.evaluate(&env.check_ctx()).await;
        assert!(!result.passed);
        assert!(result.error.is_some());
        assert_eq!(result.records.len(), 2);
        assert!(result.records[0].passed);
        assert!(result.records[1].error.is_some());
    }

    #[tokio::test]
    async fn undeclared_reference_fails_compile() {
        let set = set_with(vec![], vec![]);
        let err = CheckChain::compile("ghost", &set).unwrap_err();
        assert!(matches!(err, PluginError::Undeclared { kind: "check", .. }));
    }

    #[tokio::test]
    async fn trigger_chain_stops_at_first_error() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let set = set_with(
            vec![],
            vec![
                (
                    "boom",
                    Arc::new(RecordingTrigger {
                        calls: first.clone(),
                        result: Some(PluginError::Failed("x".into())),
                    }) as Arc<dyn Trigger>,
                ),
                (
                    "after",
                    Arc::new(RecordingTrigger { calls: second.clone(), result: None })
                        as Arc<dyn Trigger>,
                ),
            ],
        );
        let chain = TriggerChain::compile(Some("boom && after"), &set).unwrap();

        let mut env = Env::new();
        let cluster = env.cluster.clone();
        let clock = env.clock.clone();
        let cancel = env.cancel.clone();
        let mut ctx = TriggerContext {
            node: &mut env.node,
            profile: "default",
            state: NodeState::Operational,
            next: NodeState::Required,
            cluster: &cluster,
            clock: &clock,
            cancel: &cancel,
        };
        let err = chain.execute(&mut ctx).await.unwrap_err();
        assert!(!err.is_retry());
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0, "aborted after error");
    }

    #[tokio::test]
    async fn trigger_retry_signal_is_distinguished() {
        let calls = Arc::new(AtomicUsize::new(0));
        let set = set_with(
            vec![],
            vec![(
                "drain",
                Arc::new(RecordingTrigger {
                    calls,
                    result: Some(PluginError::Retry("pods evicting".into())),
                }) as Arc<dyn Trigger>,
            )],
        );
        let chain = TriggerChain::compile(Some("drain"), &set).unwrap();

        let mut env = Env::new();
        let cluster = env.cluster.clone();
        let clock = env.clock.clone();
        let cancel = env.cancel.clone();
        let mut ctx = TriggerContext {
            node: &mut env.node,
            profile: "default",
            state: NodeState::InMaintenance,
            next: NodeState::Operational,
            cluster: &cluster,
            clock: &clock,
            cancel: &cancel,
        };
        let err = chain.execute(&mut ctx).await.unwrap_err();
        assert!(err.is_retry());
    }

    #[test]
    fn split_chain_handles_blanks() {
        assert_eq!(split_chain(Some("a && b &&c")), vec!["a", "b", "c"]);
        assert!(split_chain(Some("  ")).is_empty());
        assert!(split_chain(None).is_empty());
    }
}
