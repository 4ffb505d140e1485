//! Scheduler store adapter for the lifecycle.
//!
//! `prepare` opens the redb database (once), `stop` releases it. Work
//! submitted after `stop` fails with `StorageError::Stopped`.

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use tracing::{debug, info};
use warpgrid_lifecycle::{
    FrameworkId, MutableStoreProvider, Storage, StorageError, StorageResult, StoreProvider,
};
use warpgrid_lifecycle::storage::{MutateWork, ReadWork};
use warpgrid_state::{SchedulerStore, StateError};

fn backend(e: StateError) -> StorageError {
    StorageError::Backend(e.to_string())
}

enum Slot {
    Closed,
    Open(SchedulerStore),
    Stopped,
}

/// Where the database lives.
#[derive(Debug, Clone)]
enum Location {
    Disk(PathBuf),
    Memory,
}

/// [`Storage`] over a [`SchedulerStore`].
pub struct RedbStorage {
    location: Location,
    slot: Mutex<Slot>,
}

impl RedbStorage {
    /// Storage backed by the database file at `path`, opened on `prepare`.
    pub fn open_at(path: impl Into<PathBuf>) -> Self {
        Self::with_location(Location::Disk(path.into()))
    }

    /// Ephemeral storage (for testing).
    pub fn in_memory() -> Self {
        Self::with_location(Location::Memory)
    }

    fn with_location(location: Location) -> Self {
        Self {
            location,
            slot: Mutex::new(Slot::Closed),
        }
    }

    fn store(&self) -> StorageResult<SchedulerStore> {
        match &*self.slot.lock().unwrap_or_else(PoisonError::into_inner) {
            Slot::Open(store) => Ok(store.clone()),
            Slot::Closed => Err(StorageError::NotPrepared),
            Slot::Stopped => Err(StorageError::Stopped),
        }
    }

    /// Persist the framework id handed out at registration.
    pub fn save_framework_id(&self, framework_id: &str) -> StorageResult<()> {
        self.store()?.set_framework_id(framework_id).map_err(backend)
    }
}

/// Provider view over an open store.
struct StoreView<'a> {
    store: &'a SchedulerStore,
}

impl StoreProvider for StoreView<'_> {
    fn fetch_framework_id(&self) -> StorageResult<Option<FrameworkId>> {
        self.store.framework_id().map_err(backend)
    }
}

impl MutableStoreProvider for StoreView<'_> {
    fn save_framework_id(&mut self, framework_id: &str) -> StorageResult<()> {
        self.store.set_framework_id(framework_id).map_err(backend)
    }

    fn backfill(&mut self) -> StorageResult<usize> {
        self.store.backfill().map_err(backend)
    }
}

impl Storage for RedbStorage {
    fn prepare(&self) -> StorageResult<()> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        match &*slot {
            Slot::Open(_) => return Ok(()),
            Slot::Stopped => return Err(StorageError::Stopped),
            Slot::Closed => {}
        }

        let store = match &self.location {
            Location::Disk(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| StorageError::Backend(e.to_string()))?;
                }
                let store = SchedulerStore::open(path).map_err(backend)?;
                info!(path = ?path, "scheduler store opened");
                store
            }
            Location::Memory => SchedulerStore::open_in_memory().map_err(backend)?,
        };
        *slot = Slot::Open(store);
        Ok(())
    }

    fn start(&self, work: MutateWork<'_>) -> StorageResult<()> {
        let store = self.store()?;
        work(&mut StoreView { store: &store })
    }

    fn consistent_read(&self, work: ReadWork<'_>) -> StorageResult<()> {
        let store = self.store()?;
        work(&StoreView { store: &store })
    }

    fn stop(&self) -> StorageResult<()> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        // Dropping our handle releases the database once in-flight work ends.
        *slot = Slot::Stopped;
        debug!("scheduler store stopped");
        Ok(())
    }
}
