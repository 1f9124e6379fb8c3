//! Inventory Table Sync
//!
//! Upserts the resolved instance record into the inventory store, fully
//! overwriting all fields with the latest snapshot. Terminal states get an
//! expiry timestamp so the store's own expiry mechanism drops the record
//! about a minute later; the warden never deletes records itself.
//!
//! The inventory is observability-grade, not authoritative: a failed write
//! is logged and swallowed so it never blocks trust or roster logic.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use saltmesh_common::instance::unix_now;
use saltmesh_common::{InstanceRecord, InventoryStore};

use crate::outcome::StepOutcome;

/// Persists instance records with terminal-state expiry.
pub struct InventorySync {
    store: Arc<dyn InventoryStore>,
    record_ttl: Duration,
}

impl InventorySync {
    pub fn new(store: Arc<dyn InventoryStore>, record_ttl: Duration) -> Self {
        InventorySync { store, record_ttl }
    }

    /// Upsert the record, stamping `updated_at` and attaching the expiry
    /// timestamp when the state is terminal.
    pub async fn record(&self, record: &InstanceRecord) -> StepOutcome {
        let mut record = record.clone();
        let now = unix_now();
        record.updated_at = now;
        record.expires_at = record
            .state
            .is_terminal()
            .then(|| now + self.record_ttl.as_secs());

        let id = record.id.clone();
        match self.store.upsert(record).await {
            Ok(()) => {
                debug!(instance_id = %id, "inventory record upserted");
                StepOutcome::Completed
            }
            Err(err) => {
                warn!(instance_id = %id, error = %err, "inventory upsert failed");
                StepOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use saltmesh_common::{
        InstanceDescription, InstanceState, InstanceTier, MockInventoryStore,
    };

    fn record(state: InstanceState) -> InstanceRecord {
        InstanceRecord::from_description(InstanceDescription {
            id: "i-1".to_string(),
            name: "salt-minion-demo".to_string(),
            state,
            env: "dev".to_string(),
            tier: InstanceTier::Minion,
            private_ip: "10.0.0.5".to_string(),
            public_ip: String::new(),
        })
    }

    #[tokio::test]
    async fn test_running_record_has_no_expiry() {
        let store = Arc::new(MockInventoryStore::new());
        let sync = InventorySync::new(store.clone(), Duration::from_secs(60));

        let outcome = sync.record(&record(InstanceState::Running)).await;
        assert_eq!(outcome, StepOutcome::Completed);
        let saved = store.raw_get("i-1").expect("saved");
        assert!(saved.expires_at.is_none());
    }

    #[tokio::test]
    async fn test_terminal_record_gets_expiry() {
        let store = Arc::new(MockInventoryStore::new());
        let sync = InventorySync::new(store.clone(), Duration::from_secs(60));

        sync.record(&record(InstanceState::Terminated)).await;
        let saved = store.raw_get("i-1").expect("saved");
        let expires = saved.expires_at.expect("expiry set");
        assert!(expires >= saved.updated_at + 59 && expires <= saved.updated_at + 61);
    }

    #[tokio::test]
    async fn test_shutting_down_also_expires() {
        let store = Arc::new(MockInventoryStore::new());
        let sync = InventorySync::new(store.clone(), Duration::from_secs(60));

        sync.record(&record(InstanceState::ShuttingDown)).await;
        assert!(store.raw_get("i-1").expect("saved").expires_at.is_some());
    }

    #[tokio::test]
    async fn test_upsert_overwrites_all_fields() {
        let store = Arc::new(MockInventoryStore::new());
        let sync = InventorySync::new(store.clone(), Duration::from_secs(60));

        sync.record(&record(InstanceState::Running)).await;
        let mut changed = record(InstanceState::Stopped);
        changed.private_ip = "10.0.0.99".to_string();
        sync.record(&changed).await;

        let saved = store.raw_get("i-1").expect("saved");
        assert_eq!(saved.state, InstanceState::Stopped);
        assert_eq!(saved.private_ip, "10.0.0.99");
    }

    #[tokio::test]
    async fn test_store_failure_is_swallowed() {
        let store = Arc::new(MockInventoryStore::new());
        store.fail_next_upserts(1);
        let sync = InventorySync::new(store.clone(), Duration::from_secs(60));

        let outcome = sync.record(&record(InstanceState::Running)).await;
        assert_eq!(outcome, StepOutcome::Failed);
        assert!(store.raw_get("i-1").is_none());
    }
}
