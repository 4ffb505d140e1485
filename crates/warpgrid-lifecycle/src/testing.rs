//! In-memory collaborators for exercising the lifecycle in tests.
//!
//! Enabled for this crate's own tests and, through the `testing` feature,
//! for downstream crates.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use crate::delayed::{DelayedAction, DelayedActions};
use crate::driver::{DriverFactory, DriverStatus, SchedulerDriver};
use crate::error::{LeadershipError, StorageError, StorageResult};
use crate::events::{EventSink, SchedulerEvent};
use crate::leader::LeaderControl;
use crate::shutdown::ShutdownSignal;
use crate::storage::{FrameworkId, MutableStoreProvider, MutateWork, ReadWork, Storage, StoreProvider};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Storage ──────────────────────────────────────────────────────

#[derive(Default)]
struct MemStore {
    prepared: bool,
    stopped: bool,
    framework_id: Option<FrameworkId>,
}

struct MemView<'a> {
    store: &'a mut MemStore,
    backfills: &'a AtomicUsize,
}

impl StoreProvider for MemView<'_> {
    fn fetch_framework_id(&self) -> StorageResult<Option<FrameworkId>> {
        Ok(self.store.framework_id.clone())
    }
}

impl MutableStoreProvider for MemView<'_> {
    fn save_framework_id(&mut self, framework_id: &str) -> StorageResult<()> {
        self.store.framework_id = Some(framework_id.to_string());
        Ok(())
    }

    fn backfill(&mut self) -> StorageResult<usize> {
        self.backfills.fetch_add(1, Ordering::SeqCst);
        Ok(0)
    }
}

/// Storage held in memory. Work fails with `NotPrepared` before `prepare`
/// and with `Stopped` after `stop`.
#[derive(Default)]
pub struct MemStorage {
    store: Mutex<MemStore>,
    fail_prepare: bool,
    fail_start: bool,
    fail_stop: bool,
    prepares: AtomicUsize,
    starts: AtomicUsize,
    stops: AtomicUsize,
    backfills: AtomicUsize,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_framework_id(framework_id: &str) -> Self {
        let storage = Self::default();
        lock(&storage.store).framework_id = Some(framework_id.to_string());
        storage
    }

    /// Storage whose `prepare` always fails.
    pub fn failing_prepare() -> Self {
        Self {
            fail_prepare: true,
            ..Self::default()
        }
    }

    /// Storage whose `start` always fails.
    pub fn failing_start() -> Self {
        Self {
            fail_start: true,
            ..Self::default()
        }
    }

    /// Storage whose `stop` marks it stopped but reports a failure.
    pub fn failing_stop() -> Self {
        Self {
            fail_stop: true,
            ..Self::default()
        }
    }

    pub fn framework_id(&self) -> Option<FrameworkId> {
        lock(&self.store).framework_id.clone()
    }

    pub fn prepare_count(&self) -> usize {
        self.prepares.load(Ordering::SeqCst)
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn backfill_count(&self) -> usize {
        self.backfills.load(Ordering::SeqCst)
    }

    fn usable(store: &MemStore) -> StorageResult<()> {
        if store.stopped {
            return Err(StorageError::Stopped);
        }
        if !store.prepared {
            return Err(StorageError::NotPrepared);
        }
        Ok(())
    }
}

impl Storage for MemStorage {
    fn prepare(&self) -> StorageResult<()> {
        self.prepares.fetch_add(1, Ordering::SeqCst);
        if self.fail_prepare {
            return Err(StorageError::Backend("injected prepare failure".into()));
        }
        lock(&self.store).prepared = true;
        Ok(())
    }

    fn start(&self, work: MutateWork<'_>) -> StorageResult<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if self.fail_start {
            return Err(StorageError::Backend("injected start failure".into()));
        }
        let mut store = lock(&self.store);
        Self::usable(&store)?;
        let mut view = MemView {
            store: &mut *store,
            backfills: &self.backfills,
        };
        work(&mut view)
    }

    fn consistent_read(&self, work: ReadWork<'_>) -> StorageResult<()> {
        let mut store = lock(&self.store);
        Self::usable(&store)?;
        let view = MemView {
            store: &mut *store,
            backfills: &self.backfills,
        };
        work(&view)
    }

    fn stop(&self) -> StorageResult<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        lock(&self.store).stopped = true;
        if self.fail_stop {
            return Err(StorageError::Backend("injected stop failure".into()));
        }
        Ok(())
    }
}

// ── Driver ───────────────────────────────────────────────────────

/// Driver whose `join` blocks until `stop` or [`FakeDriver::exit`].
#[derive(Default)]
pub struct FakeDriver {
    exit_status: Mutex<Option<DriverStatus>>,
    exited: Condvar,
    starts: AtomicUsize,
    stops: AtomicUsize,
    late_starts: AtomicUsize,
}

impl FakeDriver {
    /// Terminate the driver as if the resource manager dropped it.
    pub fn exit(&self, status: DriverStatus) {
        let mut exit_status = lock(&self.exit_status);
        exit_status.get_or_insert(status);
        self.exited.notify_all();
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Calls to `start` that arrived after `stop`.
    pub fn late_start_count(&self) -> usize {
        self.late_starts.load(Ordering::SeqCst)
    }
}

impl SchedulerDriver for FakeDriver {
    fn start(&self) -> DriverStatus {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if self.stops.load(Ordering::SeqCst) > 0 {
            self.late_starts.fetch_add(1, Ordering::SeqCst);
            return DriverStatus::Stopped;
        }
        DriverStatus::Running
    }

    fn join(&self) -> DriverStatus {
        let mut exit_status = lock(&self.exit_status);
        loop {
            if let Some(status) = *exit_status {
                return status;
            }
            exit_status = self
                .exited
                .wait(exit_status)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn stop(&self) -> DriverStatus {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.exit(DriverStatus::Stopped);
        DriverStatus::Stopped
    }
}

/// Factory recording every `create` call.
#[derive(Default)]
pub struct FakeDriverFactory {
    created: Mutex<Vec<(Option<FrameworkId>, Arc<FakeDriver>)>>,
}

impl FakeDriverFactory {
    pub fn create_count(&self) -> usize {
        lock(&self.created).len()
    }

    /// Framework ids passed to each `create`, in call order.
    pub fn created_with(&self) -> Vec<Option<FrameworkId>> {
        lock(&self.created).iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn last_driver(&self) -> Option<Arc<FakeDriver>> {
        lock(&self.created).last().map(|(_, driver)| Arc::clone(driver))
    }
}

impl DriverFactory for FakeDriverFactory {
    fn create(&self, framework_id: Option<&str>) -> Arc<dyn SchedulerDriver> {
        let driver = Arc::new(FakeDriver::default());
        lock(&self.created).push((framework_id.map(str::to_string), Arc::clone(&driver)));
        driver
    }
}

// ── Leadership ───────────────────────────────────────────────────

/// Leader control counting calls, with optional one-shot failures.
#[derive(Default)]
pub struct FakeLeaderControl {
    advertises: AtomicUsize,
    leaves: AtomicUsize,
    advertise_error: Mutex<Option<LeadershipError>>,
    leave_error: Mutex<Option<LeadershipError>>,
}

impl FakeLeaderControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `advertise` fails with `error`.
    pub fn failing_advertise(error: LeadershipError) -> Self {
        Self {
            advertise_error: Mutex::new(Some(error)),
            ..Self::default()
        }
    }

    /// The next `leave` fails with `error`.
    pub fn failing_leave(error: LeadershipError) -> Self {
        Self {
            leave_error: Mutex::new(Some(error)),
            ..Self::default()
        }
    }

    pub fn advertise_count(&self) -> usize {
        self.advertises.load(Ordering::SeqCst)
    }

    pub fn leave_count(&self) -> usize {
        self.leaves.load(Ordering::SeqCst)
    }
}

impl LeaderControl for FakeLeaderControl {
    fn advertise(&self) -> Result<(), LeadershipError> {
        self.advertises.fetch_add(1, Ordering::SeqCst);
        lock(&self.advertise_error).take().map_or(Ok(()), Err)
    }

    fn leave(&self) -> Result<(), LeadershipError> {
        self.leaves.fetch_add(1, Ordering::SeqCst);
        lock(&self.leave_error).take().map_or(Ok(()), Err)
    }
}

// ── Timers ───────────────────────────────────────────────────────

/// Timer service fired by hand. Nothing runs until the test asks.
#[derive(Default)]
pub struct ManualDelayedActions {
    registration: Mutex<Vec<DelayedAction>>,
    failover: Mutex<Vec<DelayedAction>>,
    joins: Mutex<Vec<DelayedAction>>,
}

impl ManualDelayedActions {
    /// Run every armed registration timeout. Returns how many ran.
    pub fn fire_registration_timeout(&self) -> usize {
        Self::drain(&self.registration)
    }

    /// Run every armed failover timer. Returns how many ran.
    pub fn fire_auto_failover(&self) -> usize {
        Self::drain(&self.failover)
    }

    /// Start the oldest pending driver join on its own thread.
    pub fn spawn_driver_join(&self) -> Option<JoinHandle<()>> {
        let mut joins = lock(&self.joins);
        if joins.is_empty() {
            return None;
        }
        let action = joins.remove(0);
        Some(std::thread::spawn(action))
    }

    pub fn pending_registration_timeouts(&self) -> usize {
        lock(&self.registration).len()
    }

    pub fn pending_auto_failovers(&self) -> usize {
        lock(&self.failover).len()
    }

    pub fn pending_driver_joins(&self) -> usize {
        lock(&self.joins).len()
    }

    fn drain(slot: &Mutex<Vec<DelayedAction>>) -> usize {
        // Take the actions out first; they call back into the lifecycle.
        let actions = std::mem::take(&mut *lock(slot));
        let count = actions.len();
        for action in actions {
            action();
        }
        count
    }
}

impl DelayedActions for ManualDelayedActions {
    fn blocking_driver_join(&self, action: DelayedAction) {
        lock(&self.joins).push(action);
    }

    fn on_auto_failover(&self, action: DelayedAction) {
        lock(&self.failover).push(action);
    }

    fn on_registration_timeout(&self, action: DelayedAction) {
        lock(&self.registration).push(action);
    }
}

// ── Events and shutdown ──────────────────────────────────────────

#[derive(Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<SchedulerEvent>>,
}

impl RecordingEventSink {
    pub fn events(&self) -> Vec<SchedulerEvent> {
        lock(&self.events).clone()
    }
}

impl EventSink for RecordingEventSink {
    fn post(&self, event: SchedulerEvent) {
        lock(&self.events).push(event);
    }
}

#[derive(Default)]
pub struct CountingShutdown {
    calls: AtomicUsize,
}

impl CountingShutdown {
    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ShutdownSignal for CountingShutdown {
    fn shutdown(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}
