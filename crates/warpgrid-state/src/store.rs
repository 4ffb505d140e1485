//! SchedulerStore — redb-backed persistence for the scheduler.
//!
//! Holds the framework id and task records. Values are JSON-serialized into
//! redb's `&[u8]` value columns. The store supports both on-disk and
//! in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::{debug, info};

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

fn decode(key: &str, bytes: &[u8]) -> StateResult<TaskRecord> {
    serde_json::from_slice(bytes).map_err(|e| StateError::Corrupt {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// Thread-safe scheduler store backed by redb.
#[derive(Clone)]
pub struct SchedulerStore {
    db: Arc<Database>,
}

impl SchedulerStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "scheduler store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory scheduler store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(SCHEDULER).map_err(map_err!(Table))?;
        txn.open_table(TASKS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Framework id ───────────────────────────────────────────────

    pub fn framework_id(&self) -> StateResult<Option<String>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SCHEDULER).map_err(map_err!(Table))?;
        match table.get(FRAMEWORK_ID_KEY).map_err(map_err!(Storage))? {
            Some(guard) => {
                let id: String = serde_json::from_slice(guard.value()).map_err(|e| StateError::Corrupt {
                    key: FRAMEWORK_ID_KEY.to_string(),
                    reason: e.to_string(),
                })?;
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    /// Persist the id the resource manager assigned to this framework.
    pub fn set_framework_id(&self, framework_id: &str) -> StateResult<()> {
        let value = serde_json::to_vec(framework_id).map_err(map_err!(Encode))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(SCHEDULER).map_err(map_err!(Table))?;
            table
                .insert(FRAMEWORK_ID_KEY, value.as_slice())
                .map_err(map_err!(Storage))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%framework_id, "framework id stored");
        Ok(())
    }

    // ── Tasks ──────────────────────────────────────────────────────

    /// Insert or update a task record.
    pub fn put_task(&self, task: &TaskRecord) -> StateResult<()> {
        let value = serde_json::to_vec(task).map_err(map_err!(Encode))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(TASKS).map_err(map_err!(Table))?;
            table
                .insert(task.table_key(), value.as_slice())
                .map_err(map_err!(Storage))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    pub fn get_task(&self, task_id: &str) -> StateResult<Option<TaskRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(TASKS).map_err(map_err!(Table))?;
        match table.get(task_id).map_err(map_err!(Storage))? {
            Some(guard) => Ok(Some(decode(task_id, guard.value())?)),
            None => Ok(None),
        }
    }

    pub fn list_tasks(&self) -> StateResult<Vec<TaskRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(TASKS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Storage))? {
            let (key, value) = entry.map_err(map_err!(Storage))?;
            results.push(decode(key.value(), value.value())?);
        }
        Ok(results)
    }

    /// Delete a task by id. Returns true if it existed.
    pub fn delete_task(&self, task_id: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(TASKS).map_err(map_err!(Table))?;
            existed = table.remove(task_id).map_err(map_err!(Storage))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(existed)
    }

    // ── Backfill ───────────────────────────────────────────────────

    /// Repair task records written by older schedulers.
    ///
    /// Runs in a single write transaction: either every repair lands or
    /// none does. Returns the number of rewritten records; a second run
    /// returns 0.
    pub fn backfill(&self) -> StateResult<usize> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let repaired;
        {
            let mut table = txn.open_table(TASKS).map_err(map_err!(Table))?;

            // Collect first; the table cannot be written while iterated.
            let mut updates = Vec::new();
            for entry in table.iter().map_err(map_err!(Storage))? {
                let (key, value) = entry.map_err(map_err!(Storage))?;
                let mut task = decode(key.value(), value.value())?;
                if task.backfill() {
                    let encoded = serde_json::to_vec(&task).map_err(map_err!(Encode))?;
                    updates.push((key.value().to_string(), encoded));
                }
            }

            repaired = updates.len();
            for (key, value) in updates {
                table
                    .insert(key.as_str(), value.as_slice())
                    .map_err(map_err!(Storage))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        info!(repaired, "task records backfilled");
        Ok(repaired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legacy_task(task_id: &str, job_name: &str) -> TaskRecord {
        TaskRecord {
            task_id: task_id.to_string(),
            role: "www-data".to_string(),
            job_name: job_name.to_string(),
            environment: None,
            job_key: None,
            status: TaskStatus::Running,
            updated_at: 1_700_000_000,
        }
    }

    fn complete_task(task_id: &str) -> TaskRecord {
        TaskRecord::new(
            task_id,
            JobKey::new("www-data", "prod", "api"),
            TaskStatus::Assigned,
            1_700_000_000,
        )
    }

    // ── Framework id ───────────────────────────────────────────────

    #[test]
    fn framework_id_absent_on_fresh_store() {
        let store = SchedulerStore::open_in_memory().unwrap();
        assert!(store.framework_id().unwrap().is_none());
    }

    #[test]
    fn framework_id_put_and_get() {
        let store = SchedulerStore::open_in_memory().unwrap();
        store.set_framework_id("framework-1").unwrap();
        assert_eq!(store.framework_id().unwrap().as_deref(), Some("framework-1"));

        store.set_framework_id("framework-2").unwrap();
        assert_eq!(store.framework_id().unwrap().as_deref(), Some("framework-2"));
    }

    // ── Task CRUD ──────────────────────────────────────────────────

    #[test]
    fn task_put_get_delete() {
        let store = SchedulerStore::open_in_memory().unwrap();
        let task = complete_task("task-1");

        store.put_task(&task).unwrap();
        assert_eq!(store.get_task("task-1").unwrap(), Some(task));

        assert!(store.delete_task("task-1").unwrap());
        assert!(store.get_task("task-1").unwrap().is_none());
        assert!(!store.delete_task("task-1").unwrap());
    }

    #[test]
    fn task_list_all() {
        let store = SchedulerStore::open_in_memory().unwrap();
        store.put_task(&complete_task("task-1")).unwrap();
        store.put_task(&legacy_task("task-2", "worker")).unwrap();

        assert_eq!(store.list_tasks().unwrap().len(), 2);
    }

    // ── Backfill ───────────────────────────────────────────────────

    #[test]
    fn backfill_repairs_legacy_records() {
        let store = SchedulerStore::open_in_memory().unwrap();
        store.put_task(&legacy_task("task-1", "api")).unwrap();
        store.put_task(&legacy_task("task-2", "worker")).unwrap();
        store.put_task(&complete_task("task-3")).unwrap();

        assert_eq!(store.backfill().unwrap(), 2);

        let repaired = store.get_task("task-2").unwrap().unwrap();
        assert_eq!(repaired.environment.as_deref(), Some(DEFAULT_ENVIRONMENT));
        assert_eq!(
            repaired.job_key,
            Some(JobKey::new("www-data", "devel", "worker"))
        );
        assert_eq!(store.get_task("task-3").unwrap(), Some(complete_task("task-3")));
    }

    #[test]
    fn backfill_is_idempotent() {
        let store = SchedulerStore::open_in_memory().unwrap();
        store.put_task(&legacy_task("task-1", "api")).unwrap();

        assert_eq!(store.backfill().unwrap(), 1);
        let after_first = store.list_tasks().unwrap();
        assert_eq!(store.backfill().unwrap(), 0);
        assert_eq!(store.list_tasks().unwrap(), after_first);
    }

    #[test]
    fn backfill_on_empty_store() {
        let store = SchedulerStore::open_in_memory().unwrap();
        assert_eq!(store.backfill().unwrap(), 0);
    }

    #[test]
    fn corrupt_record_is_reported() {
        let store = SchedulerStore::open_in_memory().unwrap();
        {
            let txn = store.db.begin_write().unwrap();
            {
                let mut table = txn.open_table(TASKS).unwrap();
                table.insert("bad", b"not json".as_slice()).unwrap();
            }
            txn.commit().unwrap();
        }

        match store.backfill() {
            Err(StateError::Corrupt { key, .. }) => assert_eq!(key, "bad"),
            other => panic!("expected corrupt record, got {other:?}"),
        }
    }

    // ── Persistence ────────────────────────────────────────────────

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("scheduler.redb");

        {
            let store = SchedulerStore::open(&db_path).unwrap();
            store.set_framework_id("framework-1").unwrap();
            store.put_task(&legacy_task("task-1", "api")).unwrap();
            store.backfill().unwrap();
        }

        // Reopen the same database file.
        let store = SchedulerStore::open(&db_path).unwrap();
        assert_eq!(store.framework_id().unwrap().as_deref(), Some("framework-1"));
        let task = store.get_task("task-1").unwrap().unwrap();
        assert!(task.job_key.is_some());
    }
}
