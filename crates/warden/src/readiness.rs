//! Readiness Prober
//!
//! A freshly booted instance is not immediately reachable: the provider
//! reports no status at all for a while, then "initializing" checks, then
//! healthy. The prober polls at a fixed interval until the instance is
//! running with both its instance-level and system-level checks passing,
//! bounded by the configured attempt count.
//!
//! Best-effort by design: exhausting the bound is **not** an abort. The
//! caller proceeds anyway rather than permanently losing the event to a
//! slow-booting instance, at the cost of possibly acting on a node that is
//! not fully up yet. A short settle delay after success absorbs boot-script
//! completion on the instance.
//!
//! Never errors: provider failures count as a failed attempt and the loop
//! keeps going.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use saltmesh_common::{RetryPolicy, StatusProvider};

/// Polls instance status until healthy, bounded.
pub struct ReadinessProber {
    provider: Arc<dyn StatusProvider>,
    env: String,
    policy: RetryPolicy,
    settle: Duration,
}

impl ReadinessProber {
    pub fn new(
        provider: Arc<dyn StatusProvider>,
        env: impl Into<String>,
        policy: RetryPolicy,
        settle: Duration,
    ) -> Self {
        ReadinessProber {
            provider,
            env: env.into(),
            policy,
            settle,
        }
    }

    /// Wait for the instance to report healthy. Returns whether it did
    /// within the bound.
    pub async fn wait_until_ready(&self, instance_id: &str) -> bool {
        let provider = self.provider.clone();
        let env = self.env.clone();
        let id = instance_id.to_string();

        let ready = self
            .policy
            .run_until(move |attempt| {
                let provider = provider.clone();
                let env = env.clone();
                let id = id.clone();
                async move { probe_once(provider.as_ref(), &id, &env, attempt).await }
            })
            .await;

        if ready {
            info!(instance_id, "instance healthy; settling");
            tokio::time::sleep(self.settle).await;
        } else {
            warn!(
                instance_id,
                attempts = self.policy.max_attempts,
                waited_secs = self.policy.budget().as_secs(),
                "readiness bound exhausted; proceeding best-effort"
            );
        }
        ready
    }
}

async fn probe_once(provider: &dyn StatusProvider, instance_id: &str, env: &str, attempt: u32) -> bool {
    match provider.describe_status(instance_id, env).await {
        Ok(Some(status)) => {
            debug!(
                instance_id,
                attempt,
                run_state = %status.run_state,
                healthy = status.is_healthy(),
                "status probe"
            );
            status.is_healthy()
        }
        Ok(None) => {
            debug!(instance_id, attempt, "no status reported yet");
            false
        }
        Err(err) => {
            warn!(instance_id, attempt, error = %err, "status probe failed");
            false
        }
    }
}
