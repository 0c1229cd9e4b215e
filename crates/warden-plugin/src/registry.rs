use std::collections::HashMap;
use std::sync::Arc;

use warden_config::RawInstances;

use crate::capability::{Checker, Notifier, Trigger};
use crate::error::PluginError;
use crate::schedule::Schedule;

pub type CheckerCtor =
    Box<dyn Fn(&serde_yaml::Value) -> Result<Arc<dyn Checker>, PluginError> + Send + Sync>;
pub type TriggerCtor =
    Box<dyn Fn(&serde_yaml::Value) -> Result<Arc<dyn Trigger>, PluginError> + Send + Sync>;
pub type NotifierCtor =
    Box<dyn Fn(&serde_yaml::Value) -> Result<Arc<dyn Notifier>, PluginError> + Send + Sync>;

/// Maps plugin `type` names to constructors, one table per capability.
///
/// Chain configuration references instances by name; [`InstanceSet`] is the
/// result of running every declared instance's config through its
/// constructor.
#[derive(Default)]
pub struct PluginRegistry {
    checkers: HashMap<&'static str, CheckerCtor>,
    triggers: HashMap<&'static str, TriggerCtor>,
    notifiers: HashMap<&'static str, NotifierCtor>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in plugin set.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        crate::builtin::register(&mut registry);
        registry
    }

    pub fn register_checker(&mut self, plugin_type: &'static str, ctor: CheckerCtor) -> &mut Self {
        self.checkers.insert(plugin_type, ctor);
        self
    }

    pub fn register_trigger(&mut self, plugin_type: &'static str, ctor: TriggerCtor) -> &mut Self {
        self.triggers.insert(plugin_type, ctor);
        self
    }

    pub fn register_notifier(
        &mut self,
        plugin_type: &'static str,
        ctor: NotifierCtor,
    ) -> &mut Self {
        self.notifiers.insert(plugin_type, ctor);
        self
    }

    fn checker(&self, plugin_type: &str) -> Result<&CheckerCtor, PluginError> {
        self.checkers.get(plugin_type).ok_or_else(|| PluginError::UnknownType {
            kind: "check",
            plugin_type: plugin_type.to_string(),
        })
    }

    fn trigger(&self, plugin_type: &str) -> Result<&TriggerCtor, PluginError> {
        self.triggers.get(plugin_type).ok_or_else(|| PluginError::UnknownType {
            kind: "trigger",
            plugin_type: plugin_type.to_string(),
        })
    }

    fn notifier(&self, plugin_type: &str) -> Result<&NotifierCtor, PluginError> {
        self.notifiers.get(plugin_type).ok_or_else(|| PluginError::UnknownType {
            kind: "notify",
            plugin_type: plugin_type.to_string(),
        })
    }
}

/// Named plugin instances built from the configuration's `instances` section.
#[derive(Default, Clone)]
pub struct InstanceSet {
    checks: HashMap<String, Arc<dyn Checker>>,
    triggers: HashMap<String, Arc<dyn Trigger>>,
    notifiers: HashMap<String, NotifyInstance>,
}

#[derive(Clone)]
pub struct NotifyInstance {
    pub plugin: Arc<dyn Notifier>,
    pub schedule: Schedule,
}

impl InstanceSet {
    pub fn from_config(
        registry: &PluginRegistry,
        raw: &RawInstances,
    ) -> Result<Self, PluginError> {
        let mut set = Self::default();
        for inst in &raw.check {
            let plugin = registry.checker(&inst.plugin_type)?(&inst.config)?;
            set.checks.insert(inst.name.clone(), plugin);
        }
        for inst in &raw.trigger {
            let plugin = registry.trigger(&inst.plugin_type)?(&inst.config)?;
            set.triggers.insert(inst.name.clone(), plugin);
        }
        for inst in &raw.notify {
            let plugin = registry.notifier(&inst.plugin_type)?(&inst.config)?;
            let schedule = Schedule::compile(&inst.schedule)?;
            set.notifiers
                .insert(inst.name.clone(), NotifyInstance { plugin, schedule });
        }
        Ok(set)
    }

    pub fn check(&self, name: &str) -> Result<Arc<dyn Checker>, PluginError> {
        self.checks.get(name).cloned().ok_or_else(|| PluginError::Undeclared {
            kind: "check",
            name: name.to_string(),
        })
    }

    pub fn trigger(&self, name: &str) -> Result<Arc<dyn Trigger>, PluginError> {
        self.triggers.get(name).cloned().ok_or_else(|| PluginError::Undeclared {
            kind: "trigger",
            name: name.to_string(),
        })
    }

    pub fn notifier(&self, name: &str) -> Result<NotifyInstance, PluginError> {
        self.notifiers.get(name).cloned().ok_or_else(|| PluginError::Undeclared {
            kind: "notify",
            name: name.to_string(),
        })
    }
}
