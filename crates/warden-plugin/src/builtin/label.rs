use async_trait::async_trait;
use serde::Deserialize;

use crate::capability::{CheckContext, CheckResult, Checker, Trigger, TriggerContext};
use crate::error::PluginError;

/// Passes when the node carries the label. An empty `value` checks key
/// presence only.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HasLabel {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

#[async_trait]
impl Checker for HasLabel {
    async fn check(&self, ctx: &CheckContext<'_>) -> Result<CheckResult, PluginError> {
        let actual = ctx.node.label(&self.key);
        let passed = match actual {
            Some(found) => self.value.is_empty() || found == self.value,
            None => false,
        };
        let result = if passed { CheckResult::passed() } else { CheckResult::failed() };
        Ok(result.with_info("value", actual.unwrap_or("<absent>")))
    }
}

/// Sets or removes a node label.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlterLabel {
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub remove: bool,
}

#[async_trait]
impl Trigger for AlterLabel {
    async fn trigger(&self, ctx: &mut TriggerContext<'_>) -> Result<(), PluginError> {
        if self.remove {
            ctx.node.labels.remove(&self.key);
        } else {
            ctx.node.labels.insert(self.key.clone(), self.value.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::tests::TestEnv;

    #[tokio::test]
    async fn has_label_matches_value() {
        let mut env = TestEnv::new();
        env.node.labels.insert("transition".into(), "true".into());

        let check = HasLabel { key: "transition".into(), value: "true".into() };
        assert!(check.check(&env.check_ctx()).await.unwrap().passed);

        let check = HasLabel { key: "transition".into(), value: "false".into() };
        assert!(!check.check(&env.check_ctx()).await.unwrap().passed);
    }

    #[tokio::test]
    async fn has_label_empty_value_is_presence() {
        let mut env = TestEnv::new();
        env.node.labels.insert("approved".into(), "whatever".into());

        let check = HasLabel { key: "approved".into(), value: String::new() };
        assert!(check.check(&env.check_ctx()).await.unwrap().passed);

        let check = HasLabel { key: "missing".into(), value: String::new() };
        let result = check.check(&env.check_ctx()).await.unwrap();
        assert!(!result.passed);
        assert_eq!(result.info["value"], "<absent>");
    }

    #[tokio::test]
    async fn alter_label_sets_and_removes() {
        let mut env = TestEnv::new();
        let set = AlterLabel { key: "alter".into(), value: "true".into(), remove: false };
        set.trigger(&mut env.trigger_ctx()).await.unwrap();
        assert_eq!(env.node.label("alter"), Some("true"));

        let remove = AlterLabel { key: "alter".into(), value: String::new(), remove: true };
        remove.trigger(&mut env.trigger_ctx()).await.unwrap();
        assert_eq!(env.node.label("alter"), None);
    }
}
