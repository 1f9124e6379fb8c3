//! Instance Data Model
//!
//! This module defines the canonical representation of a cloud instance as
//! seen by the warden: its lifecycle state, its managed tier, and the derived
//! minion identity that drives the trust-store and roster workflows.
//!
//! ## Minion Identity
//!
//! `minion_id` is `"{name}_{id}"` and is defined **only** when:
//! - the tier is managed (`Master` or `Minion`), and
//! - both the display name and the instance id are non-empty.
//!
//! Any instance outside the managed tiers is still recorded in the inventory
//! but carries an empty `minion_id` and never drives trust or roster logic.
//!
//! ## Record Lifecycle
//!
//! A record is created or fully overwritten on every lifecycle event for its
//! instance id. When the state is terminal (`terminated`, `shutting-down`)
//! an expiry timestamp is attached; the storage layer drops the record after
//! expiry on its own, the warden never deletes it explicitly.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::de::{self, Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

// ════════════════════════════════════════════════════════════════════════════
// LIFECYCLE STATE
// ════════════════════════════════════════════════════════════════════════════

/// Lifecycle state of a cloud instance.
///
/// Wire strings match the cloud provider's state names exactly. States the
/// warden has no transition for are preserved verbatim in `Other` so the
/// inventory still records them faithfully.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InstanceState {
    Pending,
    Running,
    Stopping,
    Stopped,
    ShuttingDown,
    Terminated,
    /// Any state string the warden does not act on.
    Other(String),
}

impl InstanceState {
    /// Parse a raw state string into a typed state.
    ///
    /// Never fails: unknown strings become `Other`.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "pending" => InstanceState::Pending,
            "running" => InstanceState::Running,
            "stopping" => InstanceState::Stopping,
            "stopped" => InstanceState::Stopped,
            "shutting-down" => InstanceState::ShuttingDown,
            "terminated" => InstanceState::Terminated,
            other => InstanceState::Other(other.to_string()),
        }
    }

    /// Wire representation of this state.
    pub fn as_str(&self) -> &str {
        match self {
            InstanceState::Pending => "pending",
            InstanceState::Running => "running",
            InstanceState::Stopping => "stopping",
            InstanceState::Stopped => "stopped",
            InstanceState::ShuttingDown => "shutting-down",
            InstanceState::Terminated => "terminated",
            InstanceState::Other(s) => s.as_str(),
        }
    }

    /// A terminal state schedules the inventory record for expiry.
    pub fn is_terminal(&self) -> bool {
        matches!(self, InstanceState::Terminated | InstanceState::ShuttingDown)
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for InstanceState {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for InstanceState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct V;
        impl<'de> Visitor<'de> for V {
            type Value = InstanceState;
            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an instance state string")
            }
            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<InstanceState, E> {
                Ok(InstanceState::parse(v))
            }
        }
        deserializer.deserialize_str(V)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// TIER
// ════════════════════════════════════════════════════════════════════════════

/// Tier tag value for control-plane nodes.
pub const TIER_MASTER: &str = "salt-master";
/// Tier tag value for managed nodes.
pub const TIER_MINION: &str = "salt-minion";

/// Managed-role tag of an instance.
///
/// Only `Master` and `Minion` participate in trust and roster logic;
/// everything else is carried as `Unmanaged` for inventory purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InstanceTier {
    Master,
    Minion,
    Unmanaged(String),
}

impl InstanceTier {
    /// Parse a raw tier tag value. Unknown values become `Unmanaged`.
    pub fn parse(raw: &str) -> Self {
        match raw {
            TIER_MASTER => InstanceTier::Master,
            TIER_MINION => InstanceTier::Minion,
            other => InstanceTier::Unmanaged(other.to_string()),
        }
    }

    /// Wire representation of this tier (the tag value).
    pub fn as_str(&self) -> &str {
        match self {
            InstanceTier::Master => TIER_MASTER,
            InstanceTier::Minion => TIER_MINION,
            InstanceTier::Unmanaged(s) => s.as_str(),
        }
    }

    /// Whether this tier participates in trust and roster logic.
    pub fn is_managed(&self) -> bool {
        matches!(self, InstanceTier::Master | InstanceTier::Minion)
    }
}

impl fmt::Display for InstanceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for InstanceTier {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for InstanceTier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct V;
        impl<'de> Visitor<'de> for V {
            type Value = InstanceTier;
            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a tier tag string")
            }
            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<InstanceTier, E> {
                Ok(InstanceTier::parse(v))
            }
        }
        deserializer.deserialize_str(V)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// LIFECYCLE EVENT
// ════════════════════════════════════════════════════════════════════════════

/// One instance lifecycle notification.
///
/// Delivered at-least-once with no ordering or deduplication guarantee.
/// The raw state is informational only: the warden always acts on the state
/// it resolves from the inventory provider, never on the state carried by
/// the notification (the instance may have moved on since the event fired).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    /// Instance identifier the event refers to.
    pub instance_id: String,
    /// Raw state string carried by the notification.
    pub state: String,
}

// ════════════════════════════════════════════════════════════════════════════
// INSTANCE RECORD
// ════════════════════════════════════════════════════════════════════════════

/// Canonical per-instance record, keyed by instance id.
///
/// Every lifecycle event fully overwrites the record for its id; there is no
/// field-level merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRecord {
    /// Cloud instance identifier (partition key).
    pub id: String,
    /// Display name from the Name tag. May be empty.
    pub name: String,
    /// Derived minion identity, or empty when not applicable.
    pub minion_id: String,
    /// Current lifecycle state.
    pub state: InstanceState,
    /// Deployment environment tag value.
    pub env: String,
    /// Managed-role tier.
    pub tier: InstanceTier,
    /// Private network address. May be empty.
    pub private_ip: String,
    /// Public network address. May be empty.
    pub public_ip: String,
    /// Unix timestamp (seconds) of the last upsert.
    pub updated_at: u64,
    /// Unix timestamp (seconds) after which the storage layer drops the
    /// record. Set only for terminal states.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}

impl InstanceRecord {
    /// Build a record from a raw instance description, deriving `minion_id`.
    pub fn from_description(desc: crate::cloud::InstanceDescription) -> Self {
        let minion_id = derive_minion_id(&desc.name, &desc.id, &desc.tier);
        InstanceRecord {
            id: desc.id,
            name: desc.name,
            minion_id,
            state: desc.state,
            env: desc.env,
            tier: desc.tier,
            private_ip: desc.private_ip,
            public_ip: desc.public_ip,
            updated_at: unix_now(),
            expires_at: None,
        }
    }

    /// Whether this record carries a usable minion identity.
    pub fn has_minion_id(&self) -> bool {
        !self.minion_id.is_empty()
    }
}

/// Derive the minion identity for an instance.
///
/// Empty unless the tier is managed and both name and id are non-empty.
pub fn derive_minion_id(name: &str, id: &str, tier: &InstanceTier) -> String {
    if tier.is_managed() && !name.is_empty() && !id.is_empty() {
        format!("{}_{}", name, id)
    } else {
        String::new()
    }
}

/// Current unix time in seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::InstanceDescription;

    // ──────────────────────────────────────────────────────────────────
    // STATE PARSING
    // ──────────────────────────────────────────────────────────────────

    #[test]
    fn test_state_parse_roundtrip() {
        for raw in [
            "pending",
            "running",
            "stopping",
            "stopped",
            "shutting-down",
            "terminated",
        ] {
            assert_eq!(InstanceState::parse(raw).as_str(), raw);
        }
    }

    #[test]
    fn test_state_unknown_preserved() {
        let s = InstanceState::parse("rebooting");
        assert_eq!(s, InstanceState::Other("rebooting".to_string()));
        assert_eq!(s.as_str(), "rebooting");
        assert!(!s.is_terminal());
    }

    #[test]
    fn test_terminal_states() {
        assert!(InstanceState::Terminated.is_terminal());
        assert!(InstanceState::ShuttingDown.is_terminal());
        assert!(!InstanceState::Running.is_terminal());
        assert!(!InstanceState::Stopped.is_terminal());
    }

    // ──────────────────────────────────────────────────────────────────
    // TIER
    // ──────────────────────────────────────────────────────────────────

    #[test]
    fn test_tier_parse() {
        assert_eq!(InstanceTier::parse("salt-master"), InstanceTier::Master);
        assert_eq!(InstanceTier::parse("salt-minion"), InstanceTier::Minion);
        assert_eq!(
            InstanceTier::parse("bastion"),
            InstanceTier::Unmanaged("bastion".to_string())
        );
    }

    #[test]
    fn test_managed_tiers() {
        assert!(InstanceTier::Master.is_managed());
        assert!(InstanceTier::Minion.is_managed());
        assert!(!InstanceTier::Unmanaged(String::new()).is_managed());
    }

    // ──────────────────────────────────────────────────────────────────
    // MINION IDENTITY
    // ──────────────────────────────────────────────────────────────────

    #[test]
    fn test_minion_id_managed() {
        let id = derive_minion_id("salt-minion-demo", "i-1", &InstanceTier::Minion);
        assert_eq!(id, "salt-minion-demo_i-1");
    }

    #[test]
    fn test_minion_id_empty_for_unmanaged_tier() {
        let tier = InstanceTier::Unmanaged("bastion".to_string());
        assert_eq!(derive_minion_id("bastion-1", "i-9", &tier), "");
    }

    #[test]
    fn test_minion_id_empty_without_name_or_id() {
        assert_eq!(derive_minion_id("", "i-1", &InstanceTier::Master), "");
        assert_eq!(derive_minion_id("node", "", &InstanceTier::Master), "");
    }

    #[test]
    fn test_record_from_description() {
        let desc = InstanceDescription {
            id: "i-1".to_string(),
            name: "salt-minion-demo".to_string(),
            state: InstanceState::Running,
            env: "dev".to_string(),
            tier: InstanceTier::Minion,
            private_ip: "10.0.0.5".to_string(),
            public_ip: String::new(),
        };
        let record = InstanceRecord::from_description(desc);
        assert_eq!(record.minion_id, "salt-minion-demo_i-1");
        assert!(record.has_minion_id());
        assert!(record.expires_at.is_none());
        assert!(record.updated_at > 0);
    }

    #[test]
    fn test_record_serializes_wire_strings() {
        let desc = InstanceDescription {
            id: "i-2".to_string(),
            name: String::new(),
            state: InstanceState::ShuttingDown,
            env: "dev".to_string(),
            tier: InstanceTier::Unmanaged("bastion".to_string()),
            private_ip: String::new(),
            public_ip: String::new(),
        };
        let record = InstanceRecord::from_description(desc);
        let json = serde_json::to_value(&record).expect("serialize");
        assert_eq!(json["state"], "shutting-down");
        assert_eq!(json["tier"], "bastion");
        assert_eq!(json["minion_id"], "");
        assert!(json.get("expires_at").is_none());
    }
}
