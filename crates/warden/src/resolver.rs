//! Instance Metadata Resolver
//!
//! Turns a raw lifecycle notification into the canonical [`InstanceRecord`],
//! by querying the inventory provider filtered by the deployment's
//! environment tag. Pure lookup: no side effects.
//!
//! Absence is normal: an instance that is already gone or belongs to a
//! different environment resolves to `None`, which short-circuits all
//! downstream processing for that event. A provider failure is logged and
//! also resolves to `None` — re-delivery will retry the whole event.

use std::sync::Arc;

use tracing::{debug, warn};

use saltmesh_common::{InstanceRecord, InventoryProvider};

/// Resolves instance ids into canonical records.
pub struct MetadataResolver {
    provider: Arc<dyn InventoryProvider>,
    env: String,
}

impl MetadataResolver {
    pub fn new(provider: Arc<dyn InventoryProvider>, env: impl Into<String>) -> Self {
        MetadataResolver {
            provider,
            env: env.into(),
        }
    }

    /// Resolve one instance, deriving its minion identity.
    pub async fn resolve(&self, instance_id: &str) -> Option<InstanceRecord> {
        match self.provider.describe(instance_id, &self.env).await {
            Ok(Some(desc)) => {
                let record = InstanceRecord::from_description(desc);
                debug!(
                    instance_id,
                    state = %record.state,
                    tier = %record.tier,
                    minion_id = %record.minion_id,
                    "instance resolved"
                );
                Some(record)
            }
            Ok(None) => {
                debug!(instance_id, env = %self.env, "instance not found in environment");
                None
            }
            Err(err) => {
                warn!(instance_id, error = %err, "instance lookup failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use saltmesh_common::{InstanceDescription, InstanceState, InstanceTier, MockCloud};

    fn demo_instance() -> InstanceDescription {
        InstanceDescription {
            id: "i-1".to_string(),
            name: "salt-minion-demo".to_string(),
            state: InstanceState::Running,
            env: "dev".to_string(),
            tier: InstanceTier::Minion,
            private_ip: "10.0.0.5".to_string(),
            public_ip: String::new(),
        }
    }

    #[tokio::test]
    async fn test_resolves_with_minion_id() {
        let cloud = Arc::new(MockCloud::new());
        cloud.insert_instance(demo_instance());
        let resolver = MetadataResolver::new(cloud, "dev");

        let record = resolver.resolve("i-1").await.expect("resolved");
        assert_eq!(record.minion_id, "salt-minion-demo_i-1");
        assert_eq!(record.state, InstanceState::Running);
    }

    #[tokio::test]
    async fn test_absent_instance_resolves_none() {
        let cloud = Arc::new(MockCloud::new());
        let resolver = MetadataResolver::new(cloud, "dev");
        assert!(resolver.resolve("i-gone").await.is_none());
    }

    #[tokio::test]
    async fn test_wrong_environment_resolves_none() {
        let cloud = Arc::new(MockCloud::new());
        cloud.insert_instance(demo_instance());
        let resolver = MetadataResolver::new(cloud, "prod");
        assert!(resolver.resolve("i-1").await.is_none());
    }

    #[tokio::test]
    async fn test_provider_failure_resolves_none() {
        let cloud = Arc::new(MockCloud::new());
        cloud.insert_instance(demo_instance());
        cloud.fail_next_describes(1);
        let resolver = MetadataResolver::new(cloud, "dev");
        assert!(resolver.resolve("i-1").await.is_none());
    }
}
