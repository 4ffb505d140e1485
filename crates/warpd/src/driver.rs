//! In-process resource-manager driver for standalone operation.
//!
//! Registration is local: `start` assigns a framework id (or resumes the
//! persisted one) and reports it through the registration callback. `join`
//! blocks until `stop`.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info};
use warpgrid_lifecycle::{DriverFactory, DriverStatus, SchedulerDriver};

/// Invoked with the framework id once the driver is registered.
pub type RegistrationCallback = Arc<dyn Fn(&str) + Send + Sync>;

pub struct LocalDriver {
    framework_name: String,
    framework_id: Option<String>,
    on_registered: RegistrationCallback,
    status: Mutex<DriverStatus>,
    changed: Condvar,
}

impl LocalDriver {
    fn new(framework_name: String, framework_id: Option<String>, on_registered: RegistrationCallback) -> Self {
        Self {
            framework_name,
            framework_id,
            on_registered,
            status: Mutex::new(DriverStatus::NotStarted),
            changed: Condvar::new(),
        }
    }

    fn assign_framework_id(&self) -> String {
        if let Some(id) = &self.framework_id {
            return id.clone();
        }
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        format!("{}-{}-{}", self.framework_name, std::process::id(), millis)
    }

    pub fn status(&self) -> DriverStatus {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SchedulerDriver for LocalDriver {
    fn start(&self) -> DriverStatus {
        {
            let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
            if *status != DriverStatus::NotStarted {
                return *status;
            }
            *status = DriverStatus::Running;
        }

        let framework_id = self.assign_framework_id();
        info!(
            framework = %self.framework_name,
            %framework_id,
            resumed = self.framework_id.is_some(),
            "driver registered"
        );
        (self.on_registered)(&framework_id);
        DriverStatus::Running
    }

    fn join(&self) -> DriverStatus {
        let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        while matches!(*status, DriverStatus::NotStarted | DriverStatus::Running) {
            status = self
                .changed
                .wait(status)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *status
    }

    fn stop(&self) -> DriverStatus {
        let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        *status = DriverStatus::Stopped;
        self.changed.notify_all();
        debug!(framework = %self.framework_name, "driver stopped");
        DriverStatus::Stopped
    }
}

/// Builds [`LocalDriver`]s sharing one registration callback.
pub struct LocalDriverFactory {
    framework_name: String,
    on_registered: RegistrationCallback,
}

impl LocalDriverFactory {
    pub fn new(framework_name: impl Into<String>, on_registered: RegistrationCallback) -> Self {
        Self {
            framework_name: framework_name.into(),
            on_registered,
        }
    }
}

impl DriverFactory for LocalDriverFactory {
    fn create(&self, framework_id: Option<&str>) -> Arc<dyn SchedulerDriver> {
        Arc::new(LocalDriver::new(
            self.framework_name.clone(),
            framework_id.map(str::to_string),
            Arc::clone(&self.on_registered),
        ))
    }
}
