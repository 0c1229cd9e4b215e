use std::collections::HashMap;

use warden_config::{RawChains, RawConfig};
use warden_domain::NodeState;
use warden_plugin::{CheckChain, InstanceSet, NotificationChain, PluginError, TriggerChain};

/// Chains attached to one state of a profile.
#[derive(Clone, Default, Debug)]
pub struct PluginChains {
    /// Run once when the profile first enters the owning state.
    pub enter: TriggerChain,
    pub notification: NotificationChain,
    pub transitions: Vec<Transition>,
}

#[derive(Clone, Debug)]
pub struct Transition {
    pub check: CheckChain,
    pub trigger: TriggerChain,
    pub next: NodeState,
}

/// A compiled maintenance profile: one [`PluginChains`] per lifecycle state.
#[derive(Clone, Debug)]
pub struct Profile {
    pub name: String,
    operational: PluginChains,
    required: PluginChains,
    in_maintenance: PluginChains,
}

impl Profile {
    pub fn chains(&self, state: NodeState) -> &PluginChains {
        match state {
            NodeState::Operational => &self.operational,
            NodeState::Required => &self.required,
            NodeState::InMaintenance => &self.in_maintenance,
        }
    }
}

/// Compile every configured profile, resolving chain references against the
/// instance set. Unresolvable references and malformed expressions surface
/// here, before any reconcile runs chains.
pub fn compile_profiles(
    config: &RawConfig,
    set: &InstanceSet,
) -> Result<HashMap<String, Profile>, PluginError> {
    let mut profiles = HashMap::new();
    for raw in &config.profiles {
        let profile = Profile {
            name: raw.name.clone(),
            operational: compile_chains(&raw.operational, set)?,
            required: compile_chains(&raw.maintenance_required, set)?,
            in_maintenance: compile_chains(&raw.in_maintenance, set)?,
        };
        profiles.insert(raw.name.clone(), profile);
    }
    Ok(profiles)
}

fn compile_chains(raw: &RawChains, set: &InstanceSet) -> Result<PluginChains, PluginError> {
    let enter = TriggerChain::compile(raw.enter.as_deref(), set)?;
    let notification = NotificationChain::compile(raw.notification.as_deref(), set)?;
    let mut transitions = Vec::with_capacity(raw.transitions.len());
    for transition in &raw.transitions {
        let next: NodeState = transition
            .next
            .parse()
            .map_err(|_| PluginError::InvalidConfig(format!(
                "unknown target state '{}'",
                transition.next
            )))?;
        transitions.push(Transition {
            check: CheckChain::compile(&transition.check, set)?,
            trigger: TriggerChain::compile(transition.trigger.as_deref(), set)?,
            next,
        });
    }
    Ok(PluginChains { enter, notification, transitions })
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_plugin::PluginRegistry;

    fn compile(yaml: &str) -> Result<HashMap<String, Profile>, PluginError> {
        let raw: RawConfig = serde_yaml::from_str(yaml).unwrap();
        let registry = PluginRegistry::builtin();
        let set = InstanceSet::from_config(&registry, &raw.instances)?;
        compile_profiles(&raw, &set)
    }

    #[test]
    fn compiles_profiles_with_all_states() {
        let profiles = compile(
            r#"
instances:
  check:
    - { type: has_label, name: ready, config: { key: ready } }
  trigger:
    - { type: alter_label, name: mark, config: { key: marked, value: "1" } }
profiles:
  - name: default
    operational:
      transitions:
        - { check: ready, trigger: mark, next: maintenance-required }
"#,
        )
        .unwrap();

        let profile = &profiles["default"];
        assert_eq!(profile.chains(NodeState::Operational).transitions.len(), 1);
        assert!(profile.chains(NodeState::Required).transitions.is_empty());
        assert!(profile.chains(NodeState::InMaintenance).enter.is_empty());
    }

    #[test]
    fn undeclared_check_reference_fails_compilation() {
        let err = compile(
            r#"
profiles:
  - name: p
    operational:
      transitions:
        - { check: ghost, next: maintenance-required }
"#,
        )
        .unwrap_err();
        assert!(matches!(err, PluginError::Undeclared { kind: "check", .. }));
    }

    #[test]
    fn undeclared_trigger_reference_fails_compilation() {
        let err = compile(
            r#"
profiles:
  - name: p
    operational:
      enter: ghost
"#,
        )
        .unwrap_err();
        assert!(matches!(err, PluginError::Undeclared { kind: "trigger", .. }));
    }
}
