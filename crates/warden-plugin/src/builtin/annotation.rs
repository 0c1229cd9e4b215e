use async_trait::async_trait;
use serde::Deserialize;

use crate::capability::{CheckContext, CheckResult, Checker, Trigger, TriggerContext};
use crate::error::PluginError;

/// Passes when the node carries the annotation. An empty `value` checks key
/// presence only.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HasAnnotation {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

#[async_trait]
impl Checker for HasAnnotation {
    async fn check(&self, ctx: &CheckContext<'_>) -> Result<CheckResult, PluginError> {
        let actual = ctx.node.annotation(&self.key);
        let passed = match actual {
            Some(found) => self.value.is_empty() || found == self.value,
            None => false,
        };
        let result = if passed { CheckResult::passed() } else { CheckResult::failed() };
        Ok(result.with_info("value", actual.unwrap_or("<absent>")))
    }
}

/// Sets or removes a node annotation.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlterAnnotation {
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub remove: bool,
}

#[async_trait]
impl Trigger for AlterAnnotation {
    async fn trigger(&self, ctx: &mut TriggerContext<'_>) -> Result<(), PluginError> {
        if self.remove {
            ctx.node.annotations.remove(&self.key);
        } else {
            ctx.node
                .annotations
                .insert(self.key.clone(), self.value.clone());
        }
        Ok(())
    }
}
