//! Mock Cloud Providers for Testing
//!
//! Fully in-memory implementations of every provider seam in [`crate::cloud`].
//! No network calls, deterministic behavior, and count-based failure
//! injection so tests can exercise the degraded paths precisely.
//!
//! # Example
//!
//! ```ignore
//! use saltmesh_common::{MockCloud, InstanceDescription};
//!
//! let cloud = MockCloud::new();
//! cloud.insert_instance(description);
//! cloud.fail_next_describes(1); // next describe errors, then recovers
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use crate::cloud::{
    CloudError, CloudResult, CommandDispatch, CommandTargets, InstanceDescription, InstanceStatus,
    InventoryProvider, InventoryStore, RemoteCommand, RemoteExecutor, StatusProvider,
};
use crate::instance::{unix_now, InstanceRecord, InstanceState, InstanceTier};

/// Consume one injected failure if any are pending.
fn take_failure(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_sub(1))
        .is_ok()
}

// ════════════════════════════════════════════════════════════════════════════
// MOCK CLOUD
// ════════════════════════════════════════════════════════════════════════════

/// In-memory cloud: inventory queries, status checks, and command dispatch.
///
/// Dispatched commands are recorded instead of executed; tests assert on
/// them through [`MockCloud::dispatched`].
#[derive(Default)]
pub struct MockCloud {
    /// Instance id -> current description.
    instances: RwLock<HashMap<String, InstanceDescription>>,
    /// Instance id -> current status snapshot.
    statuses: RwLock<HashMap<String, InstanceStatus>>,
    /// Every accepted command, in dispatch order.
    dispatches: RwLock<Vec<RemoteCommand>>,
    next_dispatch_id: AtomicU64,
    fail_describes: AtomicU32,
    fail_master_queries: AtomicU32,
    fail_statuses: AtomicU32,
    fail_sends: AtomicU32,
}

impl MockCloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an instance description.
    pub fn insert_instance(&self, desc: InstanceDescription) {
        self.instances.write().insert(desc.id.clone(), desc);
    }

    /// Remove an instance entirely (it vanished from the provider).
    pub fn remove_instance(&self, instance_id: &str) {
        self.instances.write().remove(instance_id);
    }

    /// Overwrite the lifecycle state of a known instance.
    pub fn set_instance_state(&self, instance_id: &str, state: InstanceState) {
        if let Some(desc) = self.instances.write().get_mut(instance_id) {
            desc.state = state;
        }
    }

    /// Set the status snapshot returned for an instance.
    pub fn set_status(&self, instance_id: &str, status: InstanceStatus) {
        self.statuses.write().insert(instance_id.to_string(), status);
    }

    /// All commands accepted so far, in order.
    pub fn dispatched(&self) -> Vec<RemoteCommand> {
        self.dispatches.read().clone()
    }

    /// Number of commands accepted so far.
    pub fn dispatch_count(&self) -> usize {
        self.dispatches.read().len()
    }

    /// Fail the next `n` describe calls with `Unavailable`.
    pub fn fail_next_describes(&self, n: u32) {
        self.fail_describes.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` running-master queries.
    pub fn fail_next_master_queries(&self, n: u32) {
        self.fail_master_queries.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` status calls.
    pub fn fail_next_statuses(&self, n: u32) {
        self.fail_statuses.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` command dispatches.
    pub fn fail_next_sends(&self, n: u32) {
        self.fail_sends.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl InventoryProvider for MockCloud {
    async fn describe(
        &self,
        instance_id: &str,
        env: &str,
    ) -> CloudResult<Option<InstanceDescription>> {
        if take_failure(&self.fail_describes) {
            return Err(CloudError::Unavailable("injected describe failure".into()));
        }
        let instances = self.instances.read();
        Ok(instances
            .get(instance_id)
            .filter(|desc| desc.env == env)
            .cloned())
    }

    async fn running_master_ips(&self, env: &str) -> CloudResult<Vec<String>> {
        if take_failure(&self.fail_master_queries) {
            return Err(CloudError::Throttled("injected master query failure".into()));
        }
        let instances = self.instances.read();
        let mut ips: Vec<String> = instances
            .values()
            .filter(|d| {
                d.tier == InstanceTier::Master
                    && d.state == InstanceState::Running
                    && d.env == env
                    && !d.private_ip.is_empty()
            })
            .map(|d| d.private_ip.clone())
            .collect();
        // map iteration order is arbitrary; keep the snapshot stable
        ips.sort();
        Ok(ips)
    }
}

#[async_trait]
impl StatusProvider for MockCloud {
    async fn describe_status(
        &self,
        instance_id: &str,
        _env: &str,
    ) -> CloudResult<Option<InstanceStatus>> {
        if take_failure(&self.fail_statuses) {
            return Err(CloudError::Unavailable("injected status failure".into()));
        }
        Ok(self.statuses.read().get(instance_id).cloned())
    }
}

#[async_trait]
impl RemoteExecutor for MockCloud {
    async fn send(&self, command: RemoteCommand) -> CloudResult<CommandDispatch> {
        if take_failure(&self.fail_sends) {
            return Err(CloudError::Unavailable("injected send failure".into()));
        }
        if command.script.is_empty() {
            return Err(CloudError::Rejected("empty command script".into()));
        }
        if matches!(&command.targets, CommandTargets::Ids(ids) if ids.is_empty()) {
            return Err(CloudError::Rejected("no target instances".into()));
        }
        let dispatch_id = self.next_dispatch_id.fetch_add(1, Ordering::SeqCst);
        debug!(dispatch_id, targets = ?command.targets, "mock command accepted");
        self.dispatches.write().push(command);
        Ok(CommandDispatch { dispatch_id })
    }
}

// ════════════════════════════════════════════════════════════════════════════
// MOCK INVENTORY STORE
// ════════════════════════════════════════════════════════════════════════════

/// In-memory instance record table honoring `expires_at` on reads, the way
/// the real table's own expiry mechanism drops terminal records.
#[derive(Default)]
pub struct MockInventoryStore {
    records: RwLock<HashMap<String, InstanceRecord>>,
    fail_upserts: AtomicU32,
}

impl MockInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` upserts with `Unavailable`.
    pub fn fail_next_upserts(&self, n: u32) {
        self.fail_upserts.store(n, Ordering::SeqCst);
    }

    /// Direct lookup for assertions, expiry ignored.
    pub fn raw_get(&self, instance_id: &str) -> Option<InstanceRecord> {
        self.records.read().get(instance_id).cloned()
    }
}

#[async_trait]
impl InventoryStore for MockInventoryStore {
    async fn upsert(&self, record: InstanceRecord) -> CloudResult<()> {
        if take_failure(&self.fail_upserts) {
            return Err(CloudError::Unavailable("injected upsert failure".into()));
        }
        self.records.write().insert(record.id.clone(), record);
        Ok(())
    }

    async fn scan(&self) -> CloudResult<Vec<InstanceRecord>> {
        let now = unix_now();
        let records = self.records.read();
        let mut live: Vec<InstanceRecord> = records
            .values()
            .filter(|r| r.expires_at.map(|t| t > now).unwrap_or(true))
            .cloned()
            .collect();
        live.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(live)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::CheckStatus;

    fn desc(id: &str, tier: InstanceTier, state: InstanceState, ip: &str) -> InstanceDescription {
        InstanceDescription {
            id: id.to_string(),
            name: format!("node-{}", id),
            state,
            env: "dev".to_string(),
            tier,
            private_ip: ip.to_string(),
            public_ip: String::new(),
        }
    }

    #[tokio::test]
    async fn test_describe_filters_by_env() {
        let cloud = MockCloud::new();
        cloud.insert_instance(desc("i-1", InstanceTier::Minion, InstanceState::Running, "10.0.0.1"));

        let hit = cloud.describe("i-1", "dev").await.expect("describe");
        assert!(hit.is_some());
        let miss = cloud.describe("i-1", "prod").await.expect("describe");
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn test_running_master_ips_snapshot() {
        let cloud = MockCloud::new();
        cloud.insert_instance(desc("i-m2", InstanceTier::Master, InstanceState::Running, "10.0.0.9"));
        cloud.insert_instance(desc("i-m1", InstanceTier::Master, InstanceState::Running, "10.0.0.2"));
        cloud.insert_instance(desc("i-m3", InstanceTier::Master, InstanceState::Stopped, "10.0.0.7"));
        cloud.insert_instance(desc("i-w1", InstanceTier::Minion, InstanceState::Running, "10.0.0.5"));

        let ips = cloud.running_master_ips("dev").await.expect("ips");
        assert_eq!(ips, vec!["10.0.0.2".to_string(), "10.0.0.9".to_string()]);
    }

    #[tokio::test]
    async fn test_failure_injection_is_count_based() {
        let cloud = MockCloud::new();
        cloud.insert_instance(desc("i-1", InstanceTier::Minion, InstanceState::Running, "10.0.0.1"));
        cloud.fail_next_describes(2);

        assert!(cloud.describe("i-1", "dev").await.is_err());
        assert!(cloud.describe("i-1", "dev").await.is_err());
        assert!(cloud.describe("i-1", "dev").await.expect("recovered").is_some());
    }

    #[tokio::test]
    async fn test_dispatch_recording() {
        let cloud = MockCloud::new();
        let cmd = RemoteCommand {
            script: vec!["#!/bin/bash".to_string()],
            targets: crate::cloud::CommandTargets::Ids(vec!["i-1".to_string()]),
            timeout_secs: 30,
            comment: "test".to_string(),
        };
        let dispatch = cloud.send(cmd.clone()).await.expect("send");
        assert_eq!(dispatch.dispatch_id, 0);
        assert_eq!(cloud.dispatched(), vec![cmd]);
    }

    #[tokio::test]
    async fn test_malformed_commands_rejected() {
        let cloud = MockCloud::new();
        let empty_script = RemoteCommand {
            script: Vec::new(),
            targets: crate::cloud::CommandTargets::Ids(vec!["i-1".to_string()]),
            timeout_secs: 30,
            comment: "test".to_string(),
        };
        assert!(matches!(
            cloud.send(empty_script).await,
            Err(CloudError::Rejected(_))
        ));

        let no_targets = RemoteCommand {
            script: vec!["#!/bin/bash".to_string()],
            targets: crate::cloud::CommandTargets::Ids(Vec::new()),
            timeout_secs: 30,
            comment: "test".to_string(),
        };
        assert!(matches!(
            cloud.send(no_targets).await,
            Err(CloudError::Rejected(_))
        ));
        assert_eq!(cloud.dispatch_count(), 0);
    }

    #[tokio::test]
    async fn test_store_scan_honors_expiry() {
        let store = MockInventoryStore::new();
        let live = InstanceRecord::from_description(desc(
            "i-1",
            InstanceTier::Minion,
            InstanceState::Running,
            "10.0.0.1",
        ));
        let mut expired = InstanceRecord::from_description(desc(
            "i-2",
            InstanceTier::Minion,
            InstanceState::Terminated,
            "10.0.0.2",
        ));
        expired.expires_at = Some(unix_now() - 5);

        store.upsert(live).await.expect("upsert");
        store.upsert(expired).await.expect("upsert");

        let seen = store.scan().await.expect("scan");
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].id, "i-1");
        // the raw record is still there until the store drops it
        assert!(store.raw_get("i-2").is_some());
    }

    #[tokio::test]
    async fn test_status_snapshot() {
        let cloud = MockCloud::new();
        cloud.set_status(
            "i-1",
            InstanceStatus {
                run_state: InstanceState::Running,
                instance_check: CheckStatus::Ok,
                system_check: CheckStatus::Initializing,
            },
        );
        let status = cloud.describe_status("i-1", "dev").await.expect("status");
        assert!(!status.expect("present").is_healthy());
        assert!(cloud.describe_status("i-x", "dev").await.expect("ok").is_none());
    }
}
