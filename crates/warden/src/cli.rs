//! Service Assembly
//!
//! Wires configuration, providers, the trust store, the orchestrator event
//! loop, and the HTTP router into a runnable service. The cloud SDK
//! adapters plug in through [`assemble_with`]; [`assemble`] wires the
//! in-memory providers for local development, with the filesystem trust
//! store always real.
//!
//! ## Event Loop
//!
//! Events are drained from a bounded queue and each one is handled in its
//! own task: one lifecycle event is one independent invocation, and
//! multiple events for different instances run concurrently, exactly like
//! the upstream event source delivers them.

use std::sync::Arc;

use axum::Router;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;
use tracing_subscriber::EnvFilter;

use saltmesh_common::instance::unix_now;
use saltmesh_common::{
    InventoryProvider, InventoryStore, LifecycleEvent, MockCloud, MockInventoryStore,
    RemoteExecutor, StatusProvider, WardenConfig,
};

use crate::handlers::{build_router, AppState};
use crate::orchestrator::LifecycleOrchestrator;
use crate::truststore::{FsTrustStore, TrustStore, TrustStoreError};

/// Bounded intake: at-least-once delivery upstream means a dropped event
/// will come around again, so shedding load beats unbounded growth.
const EVENT_QUEUE_CAPACITY: usize = 256;

/// Initialize tracing from `RUST_LOG`, defaulting to `info`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

/// A fully wired service, ready to serve.
pub struct ServiceParts {
    pub router: Router,
    /// Handle of the event drain loop.
    pub event_loop: JoinHandle<()>,
    /// Queue feeding the orchestrator, for adapters other than HTTP.
    pub intake: mpsc::Sender<LifecycleEvent>,
}

/// Assemble with the development providers (in-memory cloud, in-memory
/// inventory table) and the real filesystem trust store.
pub async fn assemble(config: &WardenConfig) -> Result<ServiceParts, TrustStoreError> {
    let trust = Arc::new(FsTrustStore::new(config.pki_dir.clone()));
    trust.ensure_layout().await?;

    let cloud = Arc::new(MockCloud::new());
    let store = Arc::new(MockInventoryStore::new());
    info!("assembling with in-memory cloud providers");
    Ok(assemble_with(
        config,
        cloud.clone(),
        cloud.clone(),
        cloud,
        store,
        trust,
    ))
}

/// Assemble over explicit provider implementations.
pub fn assemble_with(
    config: &WardenConfig,
    provider: Arc<dyn InventoryProvider>,
    status: Arc<dyn StatusProvider>,
    executor: Arc<dyn RemoteExecutor>,
    store: Arc<dyn InventoryStore>,
    trust: Arc<dyn TrustStore>,
) -> ServiceParts {
    let orchestrator = Arc::new(LifecycleOrchestrator::new(
        config,
        provider,
        status,
        executor.clone(),
        store.clone(),
        trust.clone(),
    ));

    let (intake, mut rx) = mpsc::channel::<LifecycleEvent>(EVENT_QUEUE_CAPACITY);
    let event_loop = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move {
                let report = orchestrator.handle_event(event).await;
                info!(
                    instance_id = %report.instance_id,
                    workflow = ?report.workflow,
                    resolved = report.resolved,
                    "event handled"
                );
            });
        }
        info!("event intake closed; drain loop exiting");
    });

    let state = Arc::new(AppState {
        env: config.env.clone(),
        store,
        trust,
        intake: intake.clone(),
        executor,
        command_timeout_secs: config.command_timeout_secs,
        start_time: unix_now(),
    });

    ServiceParts {
        router: build_router(state),
        event_loop,
        intake,
    }
}
