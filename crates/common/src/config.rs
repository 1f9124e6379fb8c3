//! Warden Configuration
//!
//! Typed configuration for the warden service, loadable from a TOML file or
//! from environment variables. Defaults reproduce the production timings:
//! readiness probing 9 × 18s plus a 3s settle, key acceptance 18 × 6s,
//! remote command timeout 30s, terminal-record expiry 60s.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::retry::RetryPolicy;
use crate::Result;

/// Service configuration.
///
/// Every field has a default, so a partial TOML file is valid.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    /// Deployment environment tag value events are filtered by.
    pub env: String,
    /// Root of the trust-store directory tree (the pki mount).
    pub pki_dir: PathBuf,
    /// Path of the roster configuration file on managed nodes.
    pub master_conf_path: String,
    /// Readiness probe attempts.
    pub probe_attempts: u32,
    /// Sleep before each readiness probe, seconds.
    pub probe_interval_secs: u64,
    /// Extra settle delay after a positive probe, seconds. Absorbs
    /// boot-script completion on the instance.
    pub probe_settle_secs: u64,
    /// Key accept attempts.
    pub accept_attempts: u32,
    /// Sleep before each accept scan, seconds.
    pub accept_interval_secs: u64,
    /// Server-side per-target remote command timeout, seconds.
    pub command_timeout_secs: u64,
    /// Lifetime of an inventory record after a terminal state, seconds.
    pub record_ttl_secs: u64,
    /// Bind address for the read-only HTTP surface.
    pub http_bind: String,
}

impl Default for WardenConfig {
    fn default() -> Self {
        WardenConfig {
            env: "dev".to_string(),
            pki_dir: PathBuf::from("/etc/salt/pki/master"),
            master_conf_path: "/etc/salt/minion.d/master.conf".to_string(),
            probe_attempts: 9,
            probe_interval_secs: 18,
            probe_settle_secs: 3,
            accept_attempts: 18,
            accept_interval_secs: 6,
            command_timeout_secs: 30,
            record_ttl_secs: 60,
            http_bind: "127.0.0.1:8700".to_string(),
        }
    }
}

impl WardenConfig {
    /// Load from a TOML file. Missing keys fall back to defaults; a missing
    /// or unparsable file is an error.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref())?;
        let cfg: WardenConfig = toml::from_str(&raw)?;
        Ok(cfg)
    }

    /// Build from environment variables, falling back to defaults.
    ///
    /// Recognized variables:
    /// - `APP_ENV`: environment tag
    /// - `PKI_DIR_PATH`: trust-store root
    /// - `MASTER_CONF_PATH`: roster file path on nodes
    /// - `WARDEN_HTTP_BIND`: HTTP bind address
    ///
    /// Timings are configuration-file territory and have no env override.
    pub fn from_env() -> Self {
        let mut cfg = WardenConfig::default();
        if let Ok(v) = env::var("APP_ENV") {
            cfg.env = v;
        }
        if let Ok(v) = env::var("PKI_DIR_PATH") {
            cfg.pki_dir = PathBuf::from(v);
        }
        if let Ok(v) = env::var("MASTER_CONF_PATH") {
            cfg.master_conf_path = v;
        }
        if let Ok(v) = env::var("WARDEN_HTTP_BIND") {
            cfg.http_bind = v;
        }
        cfg
    }

    /// Retry policy of the readiness prober.
    pub fn probe_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.probe_attempts,
            Duration::from_secs(self.probe_interval_secs),
        )
    }

    /// Settle delay applied after a positive readiness probe.
    pub fn probe_settle(&self) -> Duration {
        Duration::from_secs(self.probe_settle_secs)
    }

    /// Retry policy of the key accept loop.
    pub fn accept_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.accept_attempts,
            Duration::from_secs(self.accept_interval_secs),
        )
    }

    /// Lifetime attached to terminal-state records.
    pub fn record_ttl(&self) -> Duration {
        Duration::from_secs(self.record_ttl_secs)
    }
}
