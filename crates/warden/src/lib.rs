//! # Saltmesh Warden
//!
//! Keeps trust and routing consistent for a self-managed salt cluster whose
//! membership changes as cloud instances start and stop.
//!
//! Every instance lifecycle transition arrives as an independent,
//! at-least-once notification. The warden converts that loosely-ordered,
//! possibly-duplicated stream into two convergent artifacts:
//!
//! - the **trust store**: which minion keys are accepted on the masters
//! - the **master roster**: the list of master addresses every node uses to
//!   find its control plane
//!
//! ```text
//!  lifecycle event
//!        │
//!        ▼
//!  ┌──────────────┐     ┌───────────────┐
//!  │   Resolver   │────▶│ InventorySync │  (observability-grade)
//!  └──────┬───────┘     └───────────────┘
//!         │ (state, tier)
//!         ▼
//!  ┌──────────────┐   up   ┌───────────┐  ┌─────────────┐  ┌──────────────┐
//!  │  lifecycle   │───────▶│ Readiness │─▶│   Roster    │─▶│ KeySync      │
//!  │  decide()    │        │  Prober   │  │ Distributor │  │ accept()     │
//!  └──────┬───────┘        └───────────┘  └─────────────┘  └──────────────┘
//!         │ down
//!         ▼
//!  evict key / redistribute roster / purge all when no master remains
//! ```
//!
//! ## Consistency Model
//!
//! No ordering is guaranteed across events and no distributed lock is taken
//! anywhere. Convergence comes from recomputing full snapshots (the roster,
//! the reachable-master list) instead of applying deltas, and from treating
//! "already gone" and "already accepted" as benign outcomes everywhere.
//! A failed step never aborts the event: later steps still run where they
//! are meaningful, and re-delivery heals whatever was missed.

pub mod cli;
pub mod handlers;
pub mod inventory;
pub mod lifecycle;
pub mod orchestrator;
pub mod outcome;
pub mod readiness;
pub mod resolver;
pub mod roster;
pub mod truststore;

pub use handlers::{build_router, AppState};
pub use inventory::InventorySync;
pub use lifecycle::{decide, Workflow};
pub use orchestrator::{EventReport, LifecycleOrchestrator};
pub use outcome::StepOutcome;
pub use readiness::ReadinessProber;
pub use resolver::MetadataResolver;
pub use roster::{build_roster_script, RosterDistributor};
pub use truststore::{FsTrustStore, KeyClass, KeySynchronizer, PendingClass, TrustStore};

/// Service name used in logs and the HTTP info surface.
pub const WARDEN_NAME: &str = "saltmesh-warden";
/// Service version reported by the HTTP surface.
pub const WARDEN_VERSION: &str = env!("CARGO_PKG_VERSION");
