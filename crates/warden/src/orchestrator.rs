//! Lifecycle Orchestrator
//!
//! The single entry point for lifecycle events. Stateless by construction:
//! everything it needs is re-derived from the current instance record, the
//! trust-store tree, and the running-master snapshot, so a re-delivered or
//! duplicated event converges to the same final state.
//!
//! ## Error Boundary
//!
//! No failure ever crosses [`LifecycleOrchestrator::handle_event`]. Each
//! step catches its own failures, logs them, and reports a [`StepOutcome`];
//! later steps still run where meaningful. The collected [`EventReport`]
//! exists for logs and tests, not for callers to branch on.
//!
//! ## Workflows
//!
//! **Up** (`running`): probe readiness (best-effort) → snapshot reachable
//! masters → none ⇒ nothing to join, abort → push roster (to the single new
//! minion, or to the whole fleet when a master came up) → accept the key.
//!
//! **Down** (`terminated`): snapshot reachable masters → some remain ⇒
//! evict this node's key, and redistribute the roster to the fleet only if
//! the departed node was itself a master → none remain ⇒ purge every key,
//! the cluster has no authority left to validate against.

use std::sync::Arc;

use tracing::{info, warn};

use saltmesh_common::{
    InstanceRecord, InstanceTier, InventoryProvider, InventoryStore, LifecycleEvent,
    RemoteExecutor, StatusProvider, WardenConfig,
};

use crate::inventory::InventorySync;
use crate::lifecycle::{decide, Workflow};
use crate::outcome::StepOutcome;
use crate::readiness::ReadinessProber;
use crate::resolver::MetadataResolver;
use crate::roster::RosterDistributor;
use crate::truststore::{KeySynchronizer, TrustStore};

// ════════════════════════════════════════════════════════════════════════════
// EVENT REPORT
// ════════════════════════════════════════════════════════════════════════════

/// What one event handling actually did.
///
/// `None` fields mean the step never ran for this event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventReport {
    pub instance_id: String,
    /// Whether the instance resolved to a record at all.
    pub resolved: bool,
    pub workflow: Workflow,
    pub inventory: Option<StepOutcome>,
    /// Readiness probe result (up-workflow only).
    pub ready: Option<bool>,
    pub roster: Option<StepOutcome>,
    /// Key accept result (up-workflow only).
    pub accepted: Option<bool>,
    /// Key evicted from all directories (down-workflow).
    pub evicted: bool,
    /// Whole trust store purged (down-workflow, no masters left).
    pub purged: bool,
}

impl EventReport {
    fn new(instance_id: &str) -> Self {
        EventReport {
            instance_id: instance_id.to_string(),
            resolved: false,
            workflow: Workflow::Ignore,
            inventory: None,
            ready: None,
            roster: None,
            accepted: None,
            evicted: false,
            purged: false,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// ORCHESTRATOR
// ════════════════════════════════════════════════════════════════════════════

/// Composes the per-event workflow out of the leaf components.
pub struct LifecycleOrchestrator {
    resolver: MetadataResolver,
    inventory: InventorySync,
    prober: ReadinessProber,
    roster: RosterDistributor,
    keys: KeySynchronizer,
    provider: Arc<dyn InventoryProvider>,
    env: String,
}

impl LifecycleOrchestrator {
    pub fn new(
        config: &WardenConfig,
        provider: Arc<dyn InventoryProvider>,
        status: Arc<dyn StatusProvider>,
        executor: Arc<dyn RemoteExecutor>,
        store: Arc<dyn InventoryStore>,
        trust: Arc<dyn TrustStore>,
    ) -> Self {
        LifecycleOrchestrator {
            resolver: MetadataResolver::new(provider.clone(), config.env.clone()),
            inventory: InventorySync::new(store, config.record_ttl()),
            prober: ReadinessProber::new(
                status,
                config.env.clone(),
                config.probe_policy(),
                config.probe_settle(),
            ),
            roster: RosterDistributor::new(executor, config),
            keys: KeySynchronizer::new(trust, config.accept_policy()),
            provider,
            env: config.env.clone(),
        }
    }

    /// Handle one lifecycle notification. Infallible by contract: every
    /// failure is handled inside and visible only in the report and logs.
    pub async fn handle_event(&self, event: LifecycleEvent) -> EventReport {
        let mut report = EventReport::new(&event.instance_id);
        info!(
            instance_id = %event.instance_id,
            event_state = %event.state,
            "lifecycle event received"
        );

        // the event's own state string is only informational; the workflow
        // runs on the state the provider reports right now
        let record = match self.resolver.resolve(&event.instance_id).await {
            Some(record) => record,
            None => {
                info!(instance_id = %event.instance_id, "unresolvable; event dropped");
                return report;
            }
        };
        report.resolved = true;

        report.inventory = Some(self.inventory.record(&record).await);

        report.workflow = decide(&record.state, &record.tier);
        match report.workflow {
            Workflow::Up => self.up_workflow(&record, &mut report).await,
            Workflow::Down => self.down_workflow(&record, &mut report).await,
            Workflow::Ignore => {
                info!(
                    instance_id = %record.id,
                    state = %record.state,
                    tier = %record.tier,
                    "no workflow for this transition"
                );
            }
        }
        report
    }

    async fn up_workflow(&self, record: &InstanceRecord, report: &mut EventReport) {
        let ready = self.prober.wait_until_ready(&record.id).await;
        report.ready = Some(ready);

        let masters = self.reachable_masters().await;
        if masters.is_empty() {
            info!(instance_id = %record.id, "no reachable masters; nothing to join");
            return;
        }

        // a new master changes the roster for everyone; a new minion only
        // needs the roster itself
        let targets = match record.tier {
            InstanceTier::Master => None,
            _ => Some(vec![record.id.clone()]),
        };
        report.roster = Some(self.roster.distribute(&masters, targets).await);

        if record.has_minion_id() {
            report.accepted = Some(self.keys.accept(&record.minion_id).await);
        } else {
            warn!(instance_id = %record.id, "no minion identity; key acceptance skipped");
        }
    }

    async fn down_workflow(&self, record: &InstanceRecord, report: &mut EventReport) {
        let masters = self.reachable_masters().await;
        if masters.is_empty() {
            warn!(
                instance_id = %record.id,
                "no reachable masters remain; purging trust store"
            );
            self.keys.purge_all().await;
            report.purged = true;
            return;
        }

        if record.has_minion_id() {
            self.keys.evict(&record.minion_id).await;
            report.evicted = true;
        }
        if record.tier == InstanceTier::Master {
            report.roster = Some(self.roster.distribute(&masters, None).await);
        }
    }

    /// Full snapshot of currently reachable master addresses. A provider
    /// failure degrades to an empty snapshot, same as no masters running.
    async fn reachable_masters(&self) -> Vec<String> {
        match self.provider.running_master_ips(&self.env).await {
            Ok(ips) => ips,
            Err(err) => {
                warn!(error = %err, "master snapshot failed; treating as empty");
                Vec::new()
            }
        }
    }
}
