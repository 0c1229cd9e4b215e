use std::path::Path;
use std::time::Duration;

use tracing::debug;
use warden_domain::{DomainError, NodeState, PROFILE_SEPARATOR};

use crate::error::ConfigError;
use crate::raw::{RawChains, RawConfig, RawProfile};

/// Parsed controller configuration.
///
/// Instance and profile sections stay in raw form; plugin instantiation and
/// chain compilation resolve them later against the plugin registry.
#[derive(Debug)]
pub struct Config {
    pub intervals: Intervals,
    pub dashboard: Dashboard,
    pub raw: RawConfig,
}

#[derive(Debug, Clone)]
pub struct Intervals {
    pub requeue: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct Dashboard {
    pub label_filter: Vec<String>,
}

/// Load and validate the configuration file at `path`.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let raw: RawConfig = serde_yaml::from_str(&content).map_err(|e| ConfigError::YamlParse {
        path: path.display().to_string(),
        source: e,
    })?;
    debug!(
        profiles = raw.profiles.len(),
        checks = raw.instances.check.len(),
        triggers = raw.instances.trigger.len(),
        notifiers = raw.instances.notify.len(),
        "loaded configuration from {}",
        path.display()
    );
    validate(&raw)?;
    Ok(convert(raw))
}

/// Parse configuration from an in-memory YAML string.
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let raw: RawConfig = serde_yaml::from_str(content).map_err(|e| ConfigError::YamlParse {
        path: "<inline>".to_string(),
        source: e,
    })?;
    validate(&raw)?;
    Ok(convert(raw))
}

fn convert(raw: RawConfig) -> Config {
    Config {
        intervals: Intervals { requeue: raw.intervals.requeue },
        dashboard: Dashboard { label_filter: raw.dashboard.label_filter.clone() },
        raw,
    }
}

fn validate(raw: &RawConfig) -> Result<(), ConfigError> {
    let mut seen_checks = Vec::new();
    for inst in &raw.instances.check {
        validate_check_name(&inst.name)?;
        push_unique(&mut seen_checks, &inst.name, "check")?;
    }
    let mut seen_triggers = Vec::new();
    for inst in &raw.instances.trigger {
        validate_instance_name(&inst.name)?;
        push_unique(&mut seen_triggers, &inst.name, "trigger")?;
    }
    let mut seen_notifiers = Vec::new();
    for inst in &raw.instances.notify {
        validate_instance_name(&inst.name)?;
        push_unique(&mut seen_notifiers, &inst.name, "notify")?;
    }

    let mut seen_profiles = Vec::new();
    for profile in &raw.profiles {
        // The profile label joins names with the separator, so a name
        // containing it could never round-trip.
        if profile.name.is_empty() || profile.name.contains(PROFILE_SEPARATOR) {
            return Err(DomainError::InvalidProfileName(profile.name.clone()).into());
        }
        push_unique(&mut seen_profiles, &profile.name, "profile")?;
        validate_profile(profile)?;
    }
    Ok(())
}

fn validate_profile(profile: &RawProfile) -> Result<(), ConfigError> {
    let states = [
        (NodeState::Operational, &profile.operational),
        (NodeState::Required, &profile.maintenance_required),
        (NodeState::InMaintenance, &profile.in_maintenance),
    ];
    for (owner, chains) in states {
        validate_chains(&profile.name, owner, chains)?;
    }
    Ok(())
}

fn validate_chains(
    profile: &str,
    owner: NodeState,
    chains: &RawChains,
) -> Result<(), ConfigError> {
    for transition in &chains.transitions {
        let next: NodeState = transition.next.parse()?;
        if next == owner {
            return Err(ConfigError::Validation(format!(
                "profile '{}': transition in state '{}' targets its own state",
                profile, owner
            )));
        }
    }
    Ok(())
}

// Instance names are referenced from check expressions, so they must stay
// within the expression identifier alphabet.
fn validate_check_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ConfigError::Validation(format!(
            "check instance name '{}' must be a non-empty identifier (letters, digits, '_')",
            name
        )));
    }
    Ok(())
}

fn validate_instance_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() || name.contains(PROFILE_SEPARATOR) {
        return Err(ConfigError::Validation(format!(
            "instance name '{}' must be non-empty and must not contain '{}'",
            name, PROFILE_SEPARATOR
        )));
    }
    Ok(())
}

fn push_unique(seen: &mut Vec<String>, name: &str, kind: &str) -> Result<(), ConfigError> {
    if seen.iter().any(|n| n == name) {
        return Err(ConfigError::Validation(format!(
            "duplicate {} name '{}'",
            kind, name
        )));
    }
    seen.push(name.to_string());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const EXAMPLE: &str = r#"
intervals:
  requeue: 2m
dashboard:
  labelFilter: [topology.kubernetes.io/zone]
instances:
  check:
    - { type: has_label, name: transition_ok, config: { key: transition, value: "true" } }
  trigger:
    - { type: alter_label, name: mark, config: { key: alter, value: "true" } }
  notify:
    - type: log_notify
      name: ops_log
      schedule: { type: periodic, config: { interval: 1h } }
      config: { message: "maintenance update" }
profiles:
  - name: default
    operational:
      transitions:
        - check: transition_ok
          trigger: mark
          next: maintenance-required
    maintenance-required: {}
    in-maintenance: {}
"#;

    #[test]
    fn parses_example() {
        let config = parse_config(EXAMPLE).unwrap();
        assert_eq!(config.intervals.requeue, Duration::from_secs(120));
        assert_eq!(config.dashboard.label_filter, vec!["topology.kubernetes.io/zone"]);
        assert_eq!(config.raw.profiles.len(), 1);
        assert_eq!(config.raw.instances.check[0].name, "transition_ok");
    }

    #[test]
    fn requeue_defaults_when_absent() {
        let config = parse_config("profiles: []").unwrap();
        assert_eq!(config.intervals.requeue, Duration::from_secs(300));
    }

    #[test]
    fn rejects_instance_name_with_separator() {
        let yaml = r#"
instances:
  trigger:
    - { type: alter_label, name: "a--b", config: {} }
"#;
        assert!(matches!(
            parse_config(yaml),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn rejects_profile_name_with_separator() {
        let yaml = r#"
profiles:
  - name: "a--b"
"#;
        assert!(matches!(
            parse_config(yaml),
            Err(ConfigError::Domain(_))
        ));
    }

    #[test]
    fn rejects_check_name_outside_identifier_alphabet() {
        let yaml = r#"
instances:
  check:
    - { type: has_label, name: "has label", config: {} }
"#;
        assert!(parse_config(yaml).is_err());
    }

    #[test]
    fn rejects_duplicate_instance_names() {
        let yaml = r#"
instances:
  check:
    - { type: has_label, name: a, config: {} }
    - { type: has_label, name: a, config: {} }
"#;
        assert!(parse_config(yaml).is_err());
    }

    #[test]
    fn rejects_unknown_target_state() {
        let yaml = r#"
profiles:
  - name: p
    operational:
      transitions:
        - { check: a, next: rebooting }
"#;
        assert!(parse_config(yaml).is_err());
    }

    #[test]
    fn rejects_self_transition() {
        let yaml = r#"
profiles:
  - name: p
    operational:
      transitions:
        - { check: a, next: operational }
"#;
        assert!(parse_config(yaml).is_err());
    }

    #[test]
    fn load_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(EXAMPLE.as_bytes()).unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.raw.profiles[0].name, "default");
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = load_config(Path::new("/no/such/warden.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
