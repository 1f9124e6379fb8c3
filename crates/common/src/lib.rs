//! # Saltmesh Common Crate
//!
//! Shared building blocks for the saltmesh cluster warden.
//!
//! ## Modules
//! - `instance`: instance record, lifecycle state and tier model
//! - `config`: configuration management (TOML file + environment)
//! - `retry`: bounded retry policy used by the prober and the key accept loop
//! - `cloud`: provider trait seams (inventory, status, remote exec, store)
//! - `mock_cloud`: in-memory provider implementations for testing
//!
//! ## Provider Architecture
//! ```text
//! ┌──────────────────────┐
//! │  InventoryProvider   │  <- trait seams, one per external collaborator
//! │  StatusProvider      │
//! │  RemoteExecutor      │
//! │  InventoryStore      │
//! └─────────┬────────────┘
//!           │
//!     ┌─────┴──────┐
//!     │            │
//! ┌───▼────┐   ┌───▼──────┐
//! │ cloud  │   │ MockCloud│
//! │ SDK    │   │ (tests)  │
//! └────────┘   └──────────┘
//! ```
//!
//! The warden crate composes these seams into the per-event workflow; it
//! never talks to a cloud SDK directly.

pub mod cloud;
pub mod config;
pub mod instance;
pub mod mock_cloud;
pub mod retry;

pub use cloud::{
    CheckStatus, CloudError, CloudResult, CommandDispatch, CommandTargets, InstanceDescription,
    InstanceStatus, InventoryProvider, InventoryStore, RemoteCommand, RemoteExecutor,
    StatusProvider,
};
pub use config::WardenConfig;
pub use instance::{InstanceRecord, InstanceState, InstanceTier, LifecycleEvent};
pub use mock_cloud::{MockCloud, MockInventoryStore};
pub use retry::RetryPolicy;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
