//! Leader control handle granted by the election.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use crate::error::LeadershipError;

/// Endpoint status reported alongside a lost election.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointStatus {
    Alive,
    Dead,
    Starting,
    Stopping,
    Stopped,
    Warning,
}

/// Proof of leadership. Used to announce this replica to the cluster and
/// to give leadership up voluntarily.
pub trait LeaderControl: Send + Sync {
    fn advertise(&self) -> Result<(), LeadershipError>;

    fn leave(&self) -> Result<(), LeadershipError>;
}

/// Holds at most one leader control handle.
#[derive(Default)]
pub(crate) struct LeaderControlSlot {
    slot: Mutex<Option<Arc<dyn LeaderControl>>>,
}

impl LeaderControlSlot {
    /// Install `control`, returning the handle it displaced.
    pub(crate) fn replace(&self, control: Arc<dyn LeaderControl>) -> Option<Arc<dyn LeaderControl>> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(control)
    }

    /// Undo a [`Self::replace`] whose grant was rejected.
    ///
    /// If `rejected` is still installed, `previous` goes back in its place
    /// and `rejected` is returned. Otherwise teardown already took
    /// `rejected`, and `previous` is returned since nothing holds it any
    /// more. Whatever comes back must be released by the caller.
    pub(crate) fn withdraw(
        &self,
        rejected: &Arc<dyn LeaderControl>,
        previous: Option<Arc<dyn LeaderControl>>,
    ) -> Option<Arc<dyn LeaderControl>> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some(current) if Arc::ptr_eq(current, rejected) => {
                *slot = previous;
                Some(Arc::clone(rejected))
            }
            _ => previous,
        }
    }

    pub(crate) fn get(&self) -> Option<Arc<dyn LeaderControl>> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn take(&self) -> Option<Arc<dyn LeaderControl>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}
