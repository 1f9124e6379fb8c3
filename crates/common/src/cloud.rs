//! Cloud Provider Abstraction
//!
//! This module defines the trait seams between the warden and its external
//! collaborators. Each trait covers exactly one collaborator:
//!
//! - [`InventoryProvider`]: query instance metadata and the running-master
//!   address snapshot, filtered by environment tag
//! - [`StatusProvider`]: instance health/status checks
//! - [`RemoteExecutor`]: fire-and-forget remote command dispatch
//! - [`InventoryStore`]: the observability-grade instance record table
//!
//! Provisioning, image building, DNS, and credential storage are out of
//! scope: no trait here touches them.
//!
//! ## Error Semantics
//!
//! `CloudError` covers transient external failures only. "Instance not
//! found" is **not** an error: lookups return `Option` and absence is a
//! normal short-circuit outcome for the caller.

use async_trait::async_trait;
use thiserror::Error;

use crate::instance::{InstanceRecord, InstanceState, InstanceTier};

// ════════════════════════════════════════════════════════════════════════════
// ERRORS
// ════════════════════════════════════════════════════════════════════════════

/// Transient failures from an external provider.
#[derive(Debug, Error)]
pub enum CloudError {
    /// The provider rejected the call due to rate limiting.
    #[error("provider throttled the request: {0}")]
    Throttled(String),

    /// The provider is unreachable or returned a service fault.
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// The request itself was malformed or rejected.
    #[error("request rejected: {0}")]
    Rejected(String),
}

pub type CloudResult<T> = std::result::Result<T, CloudError>;

// ════════════════════════════════════════════════════════════════════════════
// INSTANCE DESCRIPTION & STATUS
// ════════════════════════════════════════════════════════════════════════════

/// Raw instance attributes as reported by the inventory provider.
///
/// The resolver turns this into an [`InstanceRecord`], deriving the minion
/// identity. Missing tags surface as empty strings, mirroring the provider's
/// own "absent tag" behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceDescription {
    pub id: String,
    pub name: String,
    pub state: InstanceState,
    pub env: String,
    pub tier: InstanceTier,
    pub private_ip: String,
    pub public_ip: String,
}

/// Result of a provider-side health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    /// Check passed.
    Ok,
    /// Check has not produced a result yet.
    Initializing,
    /// Check failed or the instance is impaired.
    Impaired,
    /// Provider could not gather enough data.
    InsufficientData,
}

impl CheckStatus {
    pub fn is_ok(self) -> bool {
        matches!(self, CheckStatus::Ok)
    }
}

/// Snapshot of an instance's run state plus both status checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceStatus {
    pub run_state: InstanceState,
    pub instance_check: CheckStatus,
    pub system_check: CheckStatus,
}

impl InstanceStatus {
    /// Ready means running with both checks passing.
    pub fn is_healthy(&self) -> bool {
        self.run_state == InstanceState::Running
            && self.instance_check.is_ok()
            && self.system_check.is_ok()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// REMOTE COMMANDS
// ════════════════════════════════════════════════════════════════════════════

/// Addressing for a remote command dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandTargets {
    /// Explicit instance ids.
    Ids(Vec<String>),
    /// Every running instance whose tier tag is in `tiers` and whose
    /// environment tag equals `env`. A single send covers an unbounded
    /// number of matching instances.
    Tags { tiers: Vec<String>, env: String },
}

/// One remote shell script dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommand {
    /// Script lines, executed as a shell script on each target.
    pub script: Vec<String>,
    pub targets: CommandTargets,
    /// Server-side per-target timeout.
    pub timeout_secs: u64,
    /// Human-readable audit comment.
    pub comment: String,
}

/// Receipt for a dispatched command. The warden never waits on completion
/// or inspects per-target output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandDispatch {
    pub dispatch_id: u64,
}

// ════════════════════════════════════════════════════════════════════════════
// PROVIDER TRAITS
// ════════════════════════════════════════════════════════════════════════════

/// Instance metadata queries against the cloud inventory.
#[async_trait]
pub trait InventoryProvider: Send + Sync {
    /// Look up one instance, filtered by environment tag.
    ///
    /// `Ok(None)` when the instance is gone or belongs to another
    /// environment; this is a normal outcome, not an error.
    async fn describe(
        &self,
        instance_id: &str,
        env: &str,
    ) -> CloudResult<Option<InstanceDescription>>;

    /// Private addresses of all running master-tier instances in `env`.
    ///
    /// Always a full snapshot recomputed by the provider, never a delta.
    async fn running_master_ips(&self, env: &str) -> CloudResult<Vec<String>>;
}

/// Instance health/status checks.
#[async_trait]
pub trait StatusProvider: Send + Sync {
    /// Current status of one instance, or `None` when no status is
    /// available yet (freshly booted instances report nothing for a while).
    async fn describe_status(
        &self,
        instance_id: &str,
        env: &str,
    ) -> CloudResult<Option<InstanceStatus>>;
}

/// Fire-and-forget remote command execution.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Dispatch a command. Returns as soon as the provider has accepted it;
    /// per-target execution is bounded by `command.timeout_secs` server-side.
    async fn send(&self, command: RemoteCommand) -> CloudResult<CommandDispatch>;
}

/// The instance record table.
///
/// Observability-grade: a failed write must never block trust or roster
/// logic. Record expiry (`expires_at`) is honored by the store itself.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Insert or fully overwrite the record for `record.id`.
    async fn upsert(&self, record: InstanceRecord) -> CloudResult<()>;

    /// All live (non-expired) records.
    async fn scan(&self) -> CloudResult<Vec<InstanceRecord>>;
}
