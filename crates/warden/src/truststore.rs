//! Trust-Store Abstraction and Key Synchronizer
//!
//! The cluster's trust store is a tree of five directories under one root:
//! one **accepted** directory and four **pending** directories. Each entry
//! is a file named after a minion id. A node drops its key into a pending
//! directory as a side effect of booting; this module moves it into the
//! accepted directory, or removes it when the node goes away.
//!
//! ## Directory Classes
//!
//! | Class | Directory |
//! |-------|-----------|
//! | accepted | `minions` |
//! | pending (pre) | `minions_pre` |
//! | pending (denied) | `minions_denied` |
//! | pending (rejected) | `minions_rejected` |
//! | pending (autosign) | `minions_autosign` |
//!
//! ## Duplicate Resolution
//!
//! A key can transiently exist in more than one pending directory (race
//! between key generation and placement). Resolution is first-seen-wins in
//! the **pinned** priority order of [`PendingClass::ALL`] — never the
//! filesystem's enumeration order, which is not deterministic everywhere.
//! The first occurrence is renamed into the accepted directory, every other
//! occurrence is deleted.
//!
//! ## Races
//!
//! Concurrent invocations for different minion ids touch disjoint file
//! names and are safe. Two invocations racing on the same minion id (a
//! duplicated event) must both tolerate "source file already gone": rename
//! and delete report that as a benign `false`, not an error.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

use saltmesh_common::RetryPolicy;

// ════════════════════════════════════════════════════════════════════════════
// KEY CLASSES
// ════════════════════════════════════════════════════════════════════════════

/// The four pending directory classes, in pinned priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PendingClass {
    Pre,
    Denied,
    Rejected,
    Autosign,
}

impl PendingClass {
    /// Scan order for duplicate resolution. First-seen-wins follows this
    /// array, so the tie-break is deterministic on every platform.
    pub const ALL: [PendingClass; 4] = [
        PendingClass::Pre,
        PendingClass::Denied,
        PendingClass::Rejected,
        PendingClass::Autosign,
    ];

    pub fn dir_name(self) -> &'static str {
        match self {
            PendingClass::Pre => "minions_pre",
            PendingClass::Denied => "minions_denied",
            PendingClass::Rejected => "minions_rejected",
            PendingClass::Autosign => "minions_autosign",
        }
    }
}

/// One of the five logical key directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyClass {
    Accepted,
    Pending(PendingClass),
}

impl KeyClass {
    /// Accepted first, then the pending classes in priority order.
    pub fn all() -> [KeyClass; 5] {
        [
            KeyClass::Accepted,
            KeyClass::Pending(PendingClass::Pre),
            KeyClass::Pending(PendingClass::Denied),
            KeyClass::Pending(PendingClass::Rejected),
            KeyClass::Pending(PendingClass::Autosign),
        ]
    }

    pub fn dir_name(self) -> &'static str {
        match self {
            KeyClass::Accepted => "minions",
            KeyClass::Pending(p) => p.dir_name(),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// TRUST STORE TRAIT
// ════════════════════════════════════════════════════════════════════════════

/// Errors from the trust-store backend.
///
/// "Entry not found" is never an error: lookups return `false` and removals
/// report whether anything was removed.
#[derive(Debug, Error)]
pub enum TrustStoreError {
    #[error("trust store io failure: {0}")]
    Io(#[from] std::io::Error),

    /// The minion id cannot name an entry (empty, or contains a path
    /// separator).
    #[error("invalid minion id: {0:?}")]
    InvalidId(String),
}

pub type TrustResult<T> = std::result::Result<T, TrustStoreError>;

/// Key-value trust store, put/move/delete/list by directory class.
///
/// The filesystem backend can be swapped for a networked store without
/// touching orchestration logic; everything above this trait only speaks in
/// classes and minion ids.
#[async_trait]
pub trait TrustStore: Send + Sync {
    /// Entry names in one class, in unspecified order.
    async fn list(&self, class: KeyClass) -> TrustResult<Vec<String>>;

    /// Whether `minion_id` currently exists in `class`.
    async fn contains(&self, class: KeyClass, minion_id: &str) -> TrustResult<bool>;

    /// Move `minion_id` from a pending class into the accepted class,
    /// overwriting any previous accepted entry.
    ///
    /// `Ok(false)` when the source entry is already gone (lost a race);
    /// that is a benign outcome, not an error.
    async fn promote(&self, from: PendingClass, minion_id: &str) -> TrustResult<bool>;

    /// Delete `minion_id` from `class`. `Ok(false)` when it was not there.
    async fn remove(&self, class: KeyClass, minion_id: &str) -> TrustResult<bool>;
}

// ════════════════════════════════════════════════════════════════════════════
// FILESYSTEM BACKEND
// ════════════════════════════════════════════════════════════════════════════

/// Trust store over a real directory tree, one file per key, relying on
/// per-file rename/delete atomicity.
pub struct FsTrustStore {
    root: PathBuf,
}

impl FsTrustStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsTrustStore { root: root.into() }
    }

    /// Create all five class directories if missing.
    pub async fn ensure_layout(&self) -> TrustResult<()> {
        for class in KeyClass::all() {
            fs::create_dir_all(self.dir(class)).await?;
        }
        Ok(())
    }

    fn dir(&self, class: KeyClass) -> PathBuf {
        self.root.join(class.dir_name())
    }

    fn entry_path(&self, class: KeyClass, minion_id: &str) -> TrustResult<PathBuf> {
        validate_id(minion_id)?;
        Ok(self.dir(class).join(minion_id))
    }
}

/// A minion id must be a plain file name.
fn validate_id(minion_id: &str) -> TrustResult<()> {
    if minion_id.is_empty()
        || minion_id.contains('/')
        || minion_id.contains('\\')
        || minion_id == "."
        || minion_id == ".."
    {
        return Err(TrustStoreError::InvalidId(minion_id.to_string()));
    }
    Ok(())
}

#[async_trait]
impl TrustStore for FsTrustStore {
    async fn list(&self, class: KeyClass) -> TrustResult<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(self.dir(class)).await?;
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }

    async fn contains(&self, class: KeyClass, minion_id: &str) -> TrustResult<bool> {
        let path = self.entry_path(class, minion_id)?;
        match fs::metadata(&path).await {
            Ok(_) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn promote(&self, from: PendingClass, minion_id: &str) -> TrustResult<bool> {
        let src = self.entry_path(KeyClass::Pending(from), minion_id)?;
        let dst = self.entry_path(KeyClass::Accepted, minion_id)?;
        match fs::rename(&src, &dst).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn remove(&self, class: KeyClass, minion_id: &str) -> TrustResult<bool> {
        let path = self.entry_path(class, minion_id)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// KEY SYNCHRONIZER
// ════════════════════════════════════════════════════════════════════════════

/// Accepts, evicts, and purges cluster keys on top of a [`TrustStore`].
pub struct KeySynchronizer {
    store: Arc<dyn TrustStore>,
    accept_policy: RetryPolicy,
}

impl KeySynchronizer {
    pub fn new(store: Arc<dyn TrustStore>, accept_policy: RetryPolicy) -> Self {
        KeySynchronizer {
            store,
            accept_policy,
        }
    }

    /// Move the node's key into the accepted set.
    ///
    /// Retries in a bounded loop because the key appears asynchronously
    /// while the node boots. Returns `true` once the key is in the accepted
    /// directory, whether this invocation moved it there or a previous one
    /// did. Returns `false` when the bound is exhausted without the key
    /// ever appearing; a later event may still succeed.
    pub async fn accept(&self, minion_id: &str) -> bool {
        let store = self.store.clone();
        let id = minion_id.to_string();
        let accepted = self
            .accept_policy
            .run_until(move |attempt| {
                let store = store.clone();
                let id = id.clone();
                async move {
                    debug!(minion_id = %id, attempt, "scanning pending directories");
                    accept_once(store.as_ref(), &id).await
                }
            })
            .await;
        if !accepted {
            warn!(
                minion_id,
                waited_secs = self.accept_policy.budget().as_secs(),
                "key never appeared within the accept bound"
            );
        }
        accepted
    }

    /// Delete the key from every directory, accepted and pending.
    ///
    /// Per-directory failures are logged and skipped; a missing entry is
    /// not a failure.
    pub async fn evict(&self, minion_id: &str) {
        for class in KeyClass::all() {
            match self.store.remove(class, minion_id).await {
                Ok(true) => {
                    info!(minion_id, dir = class.dir_name(), "evicted key");
                }
                Ok(false) => {}
                Err(err) => {
                    warn!(minion_id, dir = class.dir_name(), error = %err, "evict failed");
                }
            }
        }
    }

    /// Delete every key across every directory.
    ///
    /// Invoked when the last reachable master has disappeared: a trust
    /// store with no master left to validate against is untrustworthy
    /// cluster-wide.
    pub async fn purge_all(&self) {
        for class in KeyClass::all() {
            let names = match self.store.list(class).await {
                Ok(names) => names,
                Err(err) => {
                    warn!(dir = class.dir_name(), error = %err, "purge listing failed");
                    continue;
                }
            };
            for name in names {
                if let Err(err) = self.store.remove(class, &name).await {
                    warn!(minion_id = %name, dir = class.dir_name(), error = %err, "purge failed");
                }
            }
            info!(dir = class.dir_name(), "purged key directory");
        }
    }
}

/// One accept attempt: scan the pending classes in pinned order, promote
/// the first occurrence, delete the rest.
///
/// When nothing is pending, reports `true` if the key is already accepted
/// (duplicate event delivery, or a concurrent invocation won the rename).
async fn accept_once(store: &dyn TrustStore, minion_id: &str) -> bool {
    let mut accepted = false;
    for pending in PendingClass::ALL {
        let class = KeyClass::Pending(pending);
        match store.contains(class, minion_id).await {
            Ok(true) => {
                if accepted {
                    // duplicate occurrence, first-seen already promoted
                    match store.remove(class, minion_id).await {
                        Ok(_) => {
                            info!(minion_id, dir = class.dir_name(), "dropped duplicate key");
                        }
                        Err(err) => {
                            warn!(minion_id, dir = class.dir_name(), error = %err, "duplicate cleanup failed");
                        }
                    }
                } else {
                    match store.promote(pending, minion_id).await {
                        Ok(true) => {
                            info!(minion_id, from = class.dir_name(), "accepted key");
                            accepted = true;
                        }
                        Ok(false) => {
                            // lost the rename race; the other invocation owns it now
                            debug!(minion_id, from = class.dir_name(), "key vanished mid-accept");
                        }
                        Err(err) => {
                            warn!(minion_id, from = class.dir_name(), error = %err, "promote failed");
                        }
                    }
                }
            }
            Ok(false) => {}
            Err(err) => {
                warn!(minion_id, dir = class.dir_name(), error = %err, "pending scan failed");
            }
        }
    }
    if accepted {
        return true;
    }
    matches!(store.contains(KeyClass::Accepted, minion_id).await, Ok(true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::time::Duration;

    const ID: &str = "salt-minion-demo_i-1";

    async fn store_in(dir: &Path) -> FsTrustStore {
        let store = FsTrustStore::new(dir);
        store.ensure_layout().await.expect("layout");
        store
    }

    async fn put(store: &FsTrustStore, class: KeyClass, id: &str) {
        let path = store.dir(class).join(id);
        fs::write(&path, b"-----BEGIN PUBLIC KEY-----").await.expect("write key");
    }

    fn sync(store: FsTrustStore, attempts: u32) -> KeySynchronizer {
        KeySynchronizer::new(
            Arc::new(store),
            RetryPolicy::new(attempts, Duration::from_millis(1)),
        )
    }

    // ──────────────────────────────────────────────────────────────────
    // BACKEND
    // ──────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_layout_and_list_empty() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = store_in(tmp.path()).await;
        for class in KeyClass::all() {
            assert!(store.list(class).await.expect("list").is_empty());
        }
    }

    #[tokio::test]
    async fn test_promote_moves_entry() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = store_in(tmp.path()).await;
        put(&store, KeyClass::Pending(PendingClass::Pre), ID).await;

        let moved = store.promote(PendingClass::Pre, ID).await.expect("promote");
        assert!(moved);
        assert!(store.contains(KeyClass::Accepted, ID).await.expect("contains"));
        assert!(!store
            .contains(KeyClass::Pending(PendingClass::Pre), ID)
            .await
            .expect("contains"));
    }

    #[tokio::test]
    async fn test_promote_source_gone_is_benign() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = store_in(tmp.path()).await;
        let moved = store.promote(PendingClass::Denied, ID).await.expect("promote");
        assert!(!moved);
    }

    #[tokio::test]
    async fn test_remove_missing_is_benign() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = store_in(tmp.path()).await;
        let removed = store.remove(KeyClass::Accepted, ID).await.expect("remove");
        assert!(!removed);
    }

    #[tokio::test]
    async fn test_invalid_ids_rejected() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = store_in(tmp.path()).await;
        for bad in ["", "a/b", "..", "."] {
            assert!(store.contains(KeyClass::Accepted, bad).await.is_err());
        }
    }

    // ──────────────────────────────────────────────────────────────────
    // ACCEPT
    // ──────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_accept_from_pending() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = store_in(tmp.path()).await;
        put(&store, KeyClass::Pending(PendingClass::Autosign), ID).await;
        let check = store_in(tmp.path()).await;

        assert!(sync(store, 3).accept(ID).await);
        assert!(check.contains(KeyClass::Accepted, ID).await.expect("contains"));
    }

    #[tokio::test]
    async fn test_accept_resolves_duplicates_first_seen_wins() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = store_in(tmp.path()).await;
        put(&store, KeyClass::Pending(PendingClass::Pre), ID).await;
        put(&store, KeyClass::Pending(PendingClass::Rejected), ID).await;
        let check = store_in(tmp.path()).await;

        assert!(sync(store, 3).accept(ID).await);

        // exactly one copy, in accepted, zero copies elsewhere
        assert!(check.contains(KeyClass::Accepted, ID).await.expect("contains"));
        for pending in PendingClass::ALL {
            assert!(!check
                .contains(KeyClass::Pending(pending), ID)
                .await
                .expect("contains"));
        }
    }

    #[tokio::test]
    async fn test_accept_already_accepted_is_noop() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = store_in(tmp.path()).await;
        put(&store, KeyClass::Accepted, ID).await;

        // first attempt already reports success; the bound is irrelevant
        assert!(sync(store, 1).accept(ID).await);
    }

    #[tokio::test]
    async fn test_accept_exhausts_bound_when_key_never_appears() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = store_in(tmp.path()).await;
        assert!(!sync(store, 2).accept(ID).await);
    }

    // ──────────────────────────────────────────────────────────────────
    // EVICT / PURGE
    // ──────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_evict_removes_from_every_class() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = store_in(tmp.path()).await;
        put(&store, KeyClass::Accepted, ID).await;
        put(&store, KeyClass::Pending(PendingClass::Denied), ID).await;
        let check = store_in(tmp.path()).await;

        sync(store, 1).evict(ID).await;

        for class in KeyClass::all() {
            assert!(!check.contains(class, ID).await.expect("contains"));
        }
    }

    #[tokio::test]
    async fn test_evict_tolerates_absence() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = store_in(tmp.path()).await;
        // nothing anywhere; must not error or panic
        sync(store, 1).evict(ID).await;
    }

    #[tokio::test]
    async fn test_purge_all_empties_every_directory() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = store_in(tmp.path()).await;
        put(&store, KeyClass::Accepted, "a_i-1").await;
        put(&store, KeyClass::Accepted, "b_i-2").await;
        put(&store, KeyClass::Pending(PendingClass::Pre), "c_i-3").await;
        put(&store, KeyClass::Pending(PendingClass::Autosign), "d_i-4").await;
        let check = store_in(tmp.path()).await;

        sync(store, 1).purge_all().await;

        for class in KeyClass::all() {
            assert!(check.list(class).await.expect("list").is_empty());
        }
    }
}
