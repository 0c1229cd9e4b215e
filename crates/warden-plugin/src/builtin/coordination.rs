use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use warden_domain::{Clock as _, NodeState, STATE_LABEL};
use warden_store::{Cluster as _, Lease};

use crate::capability::{CheckContext, CheckResult, Checker};
use crate::error::PluginError;

/// Admission check: passes while fewer than `max` other nodes expose the
/// in-maintenance state label. Races between nodes are tolerated; the loser
/// is re-evaluated on the next requeue.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MaxMaintenance {
    pub max: u32,
}

#[async_trait]
impl Checker for MaxMaintenance {
    async fn check(&self, ctx: &CheckContext<'_>) -> Result<CheckResult, PluginError> {
        if ctx.cancel.is_cancelled() {
            return Err(PluginError::Failed("cancelled".into()));
        }
        let nodes = ctx.cluster.list_nodes().await?;
        let count = nodes
            .iter()
            .filter(|node| node.name != ctx.node.name)
            .filter(|node| node.label(STATE_LABEL) == Some(NodeState::InMaintenance.as_str()))
            .count() as u32;
        let passed = count < self.max;
        Ok(CheckResult { passed, info: Default::default() }
            .with_info("in_maintenance", count.to_string())
            .with_info("max", self.max.to_string()))
    }
}

/// Staggers maintenance entry across nodes through a shared cluster lease.
///
/// The check passes while the lease is free, expired, or already held by this
/// node; taking the transition grabs the lease for `duration`. The lease
/// object is the source of truth; there is no in-process lock.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Stagger {
    pub lease_name: String,
    #[serde(with = "warden_config::duration")]
    pub duration: std::time::Duration,
}

#[async_trait]
impl Checker for Stagger {
    async fn check(&self, ctx: &CheckContext<'_>) -> Result<CheckResult, PluginError> {
        if ctx.cancel.is_cancelled() {
            return Err(PluginError::Failed("cancelled".into()));
        }
        let now = ctx.clock.now();
        let lease = ctx.cluster.get_lease(&self.lease_name).await?;
        let (passed, holder) = match &lease {
            None => (true, "<none>".to_string()),
            Some(lease) => {
                let holder = lease.holder.clone().unwrap_or_else(|| "<none>".into());
                (
                    lease.expired(now) || lease.held_by(&ctx.node.name),
                    holder,
                )
            }
        };
        Ok(CheckResult { passed, info: Default::default() }.with_info("holder", holder))
    }

    async fn on_transition(&self, ctx: &CheckContext<'_>) -> Result<(), PluginError> {
        let now = ctx.clock.now();
        let lease = Lease {
            name: self.lease_name.clone(),
            holder: Some(ctx.node.name.clone()),
            renew_time: Some(now),
            duration_seconds: self.duration.as_secs() as i64,
        };
        debug!(
            node = %ctx.node.name,
            lease = %self.lease_name,
            "acquired stagger lease"
        );
        ctx.cluster.upsert_lease(&lease).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use warden_domain::Node;

    use crate::builtin::tests::TestEnv;

    #[tokio::test]
    async fn max_maintenance_counts_other_nodes() {
        let env = TestEnv::new();
        let mut busy = Node::new("n2");
        busy.labels.insert(
            STATE_LABEL.into(),
            NodeState::InMaintenance.as_str().into(),
        );
        env.memory.add_node(busy).await;

        let check = MaxMaintenance { max: 1 };
        let result = check.check(&env.check_ctx()).await.unwrap();
        assert!(!result.passed);
        assert_eq!(result.info["in_maintenance"], "1");

        let check = MaxMaintenance { max: 2 };
        assert!(check.check(&env.check_ctx()).await.unwrap().passed);
    }

    #[tokio::test]
    async fn max_maintenance_ignores_own_state() {
        let mut env = TestEnv::new();
        env.node.labels.insert(
            STATE_LABEL.into(),
            NodeState::InMaintenance.as_str().into(),
        );
        env.memory.add_node(env.node.clone()).await;

        let check = MaxMaintenance { max: 1 };
        assert!(check.check(&env.check_ctx()).await.unwrap().passed);
    }

    #[tokio::test]
    async fn stagger_blocks_while_lease_held() {
        let env = TestEnv::new();
        let stagger = Stagger {
            lease_name: "stagger".into(),
            duration: std::time::Duration::from_secs(300),
        };

        // Free lease: passes, and taking the transition grabs it.
        assert!(stagger.check(&env.check_ctx()).await.unwrap().passed);
        stagger.on_transition(&env.check_ctx()).await.unwrap();

        // Another node now sees the lease held.
        let mut other = TestEnv::new();
        other.node = Node::new("n2");
        other.memory = env.memory.clone();
        other.cluster = env.memory.clone();
        other.manual = env.manual.clone();
        other.clock = env.manual.clone();
        assert!(!stagger.check(&other.check_ctx()).await.unwrap().passed);

        // The holder itself still passes.
        assert!(stagger.check(&env.check_ctx()).await.unwrap().passed);

        // Expiry frees it.
        env.manual.advance(ChronoDuration::seconds(301));
        assert!(stagger.check(&other.check_ctx()).await.unwrap().passed);
    }
}
