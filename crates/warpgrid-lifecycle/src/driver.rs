//! Resource-manager driver contract and the shared driver reference.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

/// Status code reported by driver operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverStatus {
    NotStarted,
    Running,
    Aborted,
    Stopped,
}

/// Local handle to the connection with the resource manager.
///
/// The lifecycle never calls `start` concurrently with `stop`. `start` must
/// not call back into the lifecycle, and a `start` after `stop` must leave
/// the driver stopped.
pub trait SchedulerDriver: Send + Sync {
    fn start(&self) -> DriverStatus;

    /// Block the calling thread until the driver terminates.
    fn join(&self) -> DriverStatus;

    fn stop(&self) -> DriverStatus;
}

/// Creates a driver, resuming a prior registration when an id is known.
pub trait DriverFactory: Send + Sync {
    fn create(&self, framework_id: Option<&str>) -> Arc<dyn SchedulerDriver>;
}

/// Single slot holding the active driver, if one has been created.
///
/// Written once by the lifecycle when leadership is gained; readable from
/// any thread.
#[derive(Default)]
pub struct DriverReference {
    slot: Mutex<Option<Arc<dyn SchedulerDriver>>>,
}

impl DriverReference {
    pub fn new() -> Self {
        Self::default()
    }

    /// The active driver, or `None` until one has been created.
    pub fn get(&self) -> Option<Arc<dyn SchedulerDriver>> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set(&self, driver: Arc<dyn SchedulerDriver>) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(driver);
    }
}

impl std::fmt::Debug for DriverReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverReference")
            .field("present", &self.get().is_some())
            .finish()
    }
}
