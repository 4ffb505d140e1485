//! Storage collaborator contract.
//!
//! The storage engine itself lives elsewhere (see `warpgrid-state`). The
//! lifecycle only needs to prepare it, run a backfill pass when elected,
//! read the persisted framework id, and stop it during teardown.

use crate::error::{StorageError, StorageResult};

/// Identity token that lets the scheduler resume a prior registration.
pub type FrameworkId = String;

/// Read-only view handed to a consistent read.
pub trait StoreProvider {
    fn fetch_framework_id(&self) -> StorageResult<Option<FrameworkId>>;
}

/// Mutable view handed to work run by [`Storage::start`].
pub trait MutableStoreProvider: StoreProvider {
    fn save_framework_id(&mut self, framework_id: &str) -> StorageResult<()>;

    /// Repair records persisted by older schedulers. Returns how many
    /// records were rewritten.
    fn backfill(&mut self) -> StorageResult<usize>;
}

/// Unit of work with mutable store access.
pub type MutateWork<'a> = &'a mut dyn FnMut(&mut dyn MutableStoreProvider) -> StorageResult<()>;

/// Unit of read-only work.
pub type ReadWork<'a> = &'a mut dyn FnMut(&dyn StoreProvider) -> StorageResult<()>;

/// Persistent storage as seen by the lifecycle.
pub trait Storage: Send + Sync {
    /// Idempotent initialization. Failure here is fatal to the replica.
    fn prepare(&self) -> StorageResult<()>;

    /// Start serving writes, running `work` first.
    fn start(&self, work: MutateWork<'_>) -> StorageResult<()>;

    /// Run `work` against a linearizable read view.
    fn consistent_read(&self, work: ReadWork<'_>) -> StorageResult<()>;

    fn stop(&self) -> StorageResult<()>;
}

/// Run a consistent read that produces a value.
pub fn read_with<T, F>(storage: &dyn Storage, f: F) -> StorageResult<T>
where
    F: FnOnce(&dyn StoreProvider) -> StorageResult<T>,
{
    let mut f = Some(f);
    let mut out = None;
    storage.consistent_read(&mut |provider: &dyn StoreProvider| {
        if let Some(f) = f.take() {
            out = Some(f(provider)?);
        }
        Ok(())
    })?;
    // A conforming storage runs the work exactly once.
    out.ok_or_else(|| StorageError::Backend("read work was not executed".into()))
}
