//! Master-Roster Distributor
//!
//! Recomputes nothing itself: it receives the full snapshot of running
//! master addresses and pushes it to nodes by dispatching a remote shell
//! script. Each push fully replaces the roster file; there are no deltas.
//!
//! The script on each target:
//! 1. overwrites the roster configuration file, one master per line
//! 2. deletes the cached peer-authentication key so the agent re-validates
//!    against the new roster
//! 3. restarts the membership agent
//! 4. re-checks the agent up to 3 times with a short pause, restarting
//!    again if still inactive
//!
//! Dispatch is fire-and-forget with a server-side per-target timeout; the
//! distributor never waits for completion or inspects output.
//!
//! An empty master list is never written: pushing an empty roster would
//! strand every node, so distribution is skipped instead.

use std::sync::Arc;

use tracing::{info, warn};

use saltmesh_common::instance::{TIER_MASTER, TIER_MINION};
use saltmesh_common::{CommandTargets, RemoteCommand, RemoteExecutor, WardenConfig};

use crate::outcome::StepOutcome;

/// Membership agent service name on managed nodes.
const AGENT_SERVICE: &str = "salt-minion";
/// Cached peer-authentication artifact deleted on every roster change.
const CACHED_MASTER_KEY_PATH: &str = "/etc/salt/pki/minion/minion_master.pub";
/// Audit comment attached to every dispatch.
const DISPATCH_COMMENT: &str = "update master roster and restart membership agent";

/// Build the remote script that installs `masters` into `conf_path`.
pub fn build_roster_script(conf_path: &str, masters: &[String]) -> Vec<String> {
    let restart = format!("systemctl restart {}", AGENT_SERVICE);
    let check = format!("systemctl is-active --quiet {}", AGENT_SERVICE);

    let mut script = vec![
        "#!/bin/bash".to_string(),
        format!("echo \"START...\"; echo \"updating master roster in {}\"", conf_path),
        format!("echo \"master:\" > {}", conf_path),
    ];
    for ip in masters {
        script.push(format!("echo \"  - {}\" >> {}", ip, conf_path));
    }
    script.push("echo \"deleting cached master key...\"".to_string());
    script.push(format!("rm -rf {}", CACHED_MASTER_KEY_PATH));
    script.push(format!("echo \"restarting {}...\"", AGENT_SERVICE));
    script.push(restart.clone());
    script.push(format!("for i in {{1..3}}; do sleep 6; {} || {}; done;", check, restart));
    script.push("echo \"DONE.\"; exit 0;".to_string());
    script
}

/// Pushes roster snapshots to managed nodes.
pub struct RosterDistributor {
    executor: Arc<dyn RemoteExecutor>,
    env: String,
    master_conf_path: String,
    command_timeout_secs: u64,
}

impl RosterDistributor {
    pub fn new(executor: Arc<dyn RemoteExecutor>, config: &WardenConfig) -> Self {
        RosterDistributor {
            executor,
            env: config.env.clone(),
            master_conf_path: config.master_conf_path.clone(),
            command_timeout_secs: config.command_timeout_secs,
        }
    }

    /// Dispatch the roster to `targets`, or to the whole managed fleet
    /// (both tiers, this environment) when no explicit targets are given.
    ///
    /// `masters` empty is a no-op reported as [`StepOutcome::Absent`]:
    /// nothing is dispatched and no roster is overwritten.
    pub async fn distribute(
        &self,
        masters: &[String],
        targets: Option<Vec<String>>,
    ) -> StepOutcome {
        if masters.is_empty() {
            warn!("empty master list; roster distribution skipped");
            return StepOutcome::Absent;
        }

        let targets = match targets {
            Some(ids) => CommandTargets::Ids(ids),
            None => CommandTargets::Tags {
                tiers: vec![TIER_MASTER.to_string(), TIER_MINION.to_string()],
                env: self.env.clone(),
            },
        };
        let command = RemoteCommand {
            script: build_roster_script(&self.master_conf_path, masters),
            targets,
            timeout_secs: self.command_timeout_secs,
            comment: DISPATCH_COMMENT.to_string(),
        };

        match self.executor.send(command).await {
            Ok(dispatch) => {
                info!(
                    dispatch_id = dispatch.dispatch_id,
                    masters = masters.len(),
                    "roster dispatched"
                );
                StepOutcome::Completed
            }
            Err(err) => {
                warn!(error = %err, "roster dispatch failed");
                StepOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use saltmesh_common::MockCloud;

    fn masters(ips: &[&str]) -> Vec<String> {
        ips.iter().map(|s| s.to_string()).collect()
    }

    // ──────────────────────────────────────────────────────────────────
    // SCRIPT
    // ──────────────────────────────────────────────────────────────────

    #[test]
    fn test_script_writes_full_snapshot() {
        let script = build_roster_script(
            "/etc/salt/minion.d/master.conf",
            &masters(&["10.0.0.2", "10.0.0.9"]),
        );
        assert_eq!(script[0], "#!/bin/bash");
        assert!(script.contains(&"echo \"master:\" > /etc/salt/minion.d/master.conf".to_string()));
        assert!(script
            .contains(&"echo \"  - 10.0.0.2\" >> /etc/salt/minion.d/master.conf".to_string()));
        assert!(script
            .contains(&"echo \"  - 10.0.0.9\" >> /etc/salt/minion.d/master.conf".to_string()));
        assert!(script.contains(&format!("rm -rf {}", CACHED_MASTER_KEY_PATH)));
        assert!(script.contains(&"systemctl restart salt-minion".to_string()));
        assert_eq!(script.last().expect("last"), "echo \"DONE.\"; exit 0;");
    }

    #[test]
    fn test_script_recheck_loop() {
        let script = build_roster_script("/tmp/conf", &masters(&["10.0.0.2"]));
        let loop_line = script
            .iter()
            .find(|l| l.starts_with("for i in"))
            .expect("recheck loop present");
        assert_eq!(
            loop_line,
            "for i in {1..3}; do sleep 6; systemctl is-active --quiet salt-minion || systemctl restart salt-minion; done;"
        );
    }

    // ──────────────────────────────────────────────────────────────────
    // DISTRIBUTION
    // ──────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_empty_masters_is_noop() {
        let cloud = Arc::new(MockCloud::new());
        let distributor = RosterDistributor::new(cloud.clone(), &WardenConfig::default());

        let outcome = distributor.distribute(&[], None).await;
        assert_eq!(outcome, StepOutcome::Absent);
        assert_eq!(cloud.dispatch_count(), 0);
    }

    #[tokio::test]
    async fn test_explicit_targets() {
        let cloud = Arc::new(MockCloud::new());
        let distributor = RosterDistributor::new(cloud.clone(), &WardenConfig::default());

        let outcome = distributor
            .distribute(&masters(&["10.0.0.2"]), Some(vec!["i-1".to_string()]))
            .await;
        assert_eq!(outcome, StepOutcome::Completed);

        let sent = cloud.dispatched();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].targets, CommandTargets::Ids(vec!["i-1".to_string()]));
        assert_eq!(sent[0].timeout_secs, 30);
    }

    #[tokio::test]
    async fn test_fleet_wide_targets_by_tags() {
        let mut config = WardenConfig::default();
        config.env = "prod".to_string();
        let cloud = Arc::new(MockCloud::new());
        let distributor = RosterDistributor::new(cloud.clone(), &config);

        distributor.distribute(&masters(&["10.0.0.2"]), None).await;

        let sent = cloud.dispatched();
        assert_eq!(
            sent[0].targets,
            CommandTargets::Tags {
                tiers: vec![TIER_MASTER.to_string(), TIER_MINION.to_string()],
                env: "prod".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_send_failure_is_swallowed() {
        let cloud = Arc::new(MockCloud::new());
        cloud.fail_next_sends(1);
        let distributor = RosterDistributor::new(cloud.clone(), &WardenConfig::default());

        let outcome = distributor.distribute(&masters(&["10.0.0.2"]), None).await;
        assert_eq!(outcome, StepOutcome::Failed);
    }
}
