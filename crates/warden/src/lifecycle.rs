//! Lifecycle Transition Table
//!
//! The implicit "what do we do with this event" conditionals, made an
//! explicit `(state, tier) → workflow` table. Pure: no IO, no state, no
//! panics. The orchestrator executes whatever this module decides, which
//! keeps every transition unit-testable without a single cloud call.
//!
//! The warden acts on exactly two transitions of managed instances:
//! `running` starts the up-workflow and `terminated` the down-workflow.
//! Everything else — unmanaged tiers, intermediate states, unknown states —
//! is recorded in the inventory but drives no trust or roster action.
//! `shutting-down` deliberately maps to `Ignore`: it only marks the record
//! for expiry, the down-workflow runs on the later `terminated` event.

use saltmesh_common::{InstanceState, InstanceTier};

/// Which workflow an event dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workflow {
    /// Instance came up: probe readiness, push roster, accept key.
    Up,
    /// Instance went away: evict key, redistribute or purge.
    Down,
    /// No trust or roster action.
    Ignore,
}

/// The transition table.
pub fn decide(state: &InstanceState, tier: &InstanceTier) -> Workflow {
    if !tier.is_managed() {
        return Workflow::Ignore;
    }
    match state {
        InstanceState::Running => Workflow::Up,
        InstanceState::Terminated => Workflow::Down,
        InstanceState::Pending
        | InstanceState::Stopping
        | InstanceState::Stopped
        | InstanceState::ShuttingDown
        | InstanceState::Other(_) => Workflow::Ignore,
    }
}
