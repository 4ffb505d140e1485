//! Leadership candidate handed to the election.

use std::sync::{Arc, PoisonError};

use tracing::{error, warn};

use crate::error::LifecycleResult;
use crate::leader::{EndpointStatus, LeaderControl};
use crate::lifecycle::LifecycleCore;
use crate::state::LifecycleState;

/// Callbacks an election delivers to a candidate.
pub trait LeadershipListener: Send + Sync {
    /// This replica won the election and holds `control`.
    fn on_leading(&self, control: Arc<dyn LeaderControl>) -> LifecycleResult<()>;

    /// This replica lost (or never gained) leadership. Must not fail.
    fn on_defeated(&self, status: Option<EndpointStatus>);
}

/// Candidate returned by [`crate::SchedulerLifecycle::prepare`].
#[derive(Clone)]
pub struct LeadershipCandidate {
    core: Arc<LifecycleCore>,
}

impl LeadershipCandidate {
    pub(crate) fn new(core: Arc<LifecycleCore>) -> Self {
        Self { core }
    }
}

impl LeadershipListener for LeadershipCandidate {
    fn on_leading(&self, control: Arc<dyn LeaderControl>) -> LifecycleResult<()> {
        // Grants are applied one at a time; only teardown races the slot.
        let _grant = self
            .core
            .grant_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let previous = self.core.leader_control.replace(Arc::clone(&control));
        if let Err(e) = self
            .core
            .transition(LifecycleState::LeaderAwaitingRegistration)
        {
            warn!(error = %e, "leadership granted in an unexpected state");
            if let Some(unheld) = self.core.leader_control.withdraw(&control, previous) {
                release(unheld.as_ref());
            }
            return Err(e);
        }
        if let Some(stale) = previous {
            warn!("replaced a leader control handle that was still held");
            release(stale.as_ref());
        }
        Ok(())
    }

    fn on_defeated(&self, status: Option<EndpointStatus>) {
        error!(?status, "lost leadership, shutting down");
        self.core.kill("leadership lost");
    }
}

fn release(control: &dyn LeaderControl) {
    if let Err(e) = control.leave() {
        warn!(error = %e, "failed to release rejected leadership grant");
    }
}
