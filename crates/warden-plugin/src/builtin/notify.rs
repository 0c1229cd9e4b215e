use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use crate::capability::{Notifier, NotifyContext};
use crate::error::PluginError;

/// Notifier that writes a structured log line. The in-tree transport used by
/// tests and simulation; external transports implement [`Notifier`] outside
/// this crate.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogNotify {
    pub message: String,
}

#[async_trait]
impl Notifier for LogNotify {
    async fn notify(&self, ctx: &NotifyContext<'_>) -> Result<(), PluginError> {
        info!(
            node = %ctx.node.name,
            profile = %ctx.profile,
            state = %ctx.state,
            "{}",
            self.message
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::tests::TestEnv;

    #[tokio::test]
    async fn notify_succeeds() {
        let env = TestEnv::new();
        let notify = LogNotify { message: "maintenance update".into() };
        notify.notify(&env.notify_ctx()).await.unwrap();
    }
}
