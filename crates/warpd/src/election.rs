//! Single-replica leader election.
//!
//! A standalone daemon is the only member of its group, so leadership is
//! granted as soon as a candidate joins.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info};
use warpgrid_lifecycle::{LeaderControl, LeadershipError, LeadershipListener, LifecycleResult};

/// Leadership handle for the local replica.
pub struct LocalLeaderControl {
    endpoint: String,
    advertised: AtomicBool,
    left: AtomicBool,
}

impl LocalLeaderControl {
    fn new(endpoint: String) -> Self {
        Self {
            endpoint,
            advertised: AtomicBool::new(false),
            left: AtomicBool::new(false),
        }
    }

    pub fn is_advertised(&self) -> bool {
        self.advertised.load(Ordering::SeqCst)
    }

    pub fn has_left(&self) -> bool {
        self.left.load(Ordering::SeqCst)
    }
}

impl LeaderControl for LocalLeaderControl {
    fn advertise(&self) -> Result<(), LeadershipError> {
        if self.has_left() {
            return Err(LeadershipError::ServerSetUpdate(format!(
                "{} already left the leader group",
                self.endpoint
            )));
        }
        self.advertised.store(true, Ordering::SeqCst);
        info!(endpoint = %self.endpoint, "advertised as leader");
        Ok(())
    }

    fn leave(&self) -> Result<(), LeadershipError> {
        if self.left.swap(true, Ordering::SeqCst) {
            debug!(endpoint = %self.endpoint, "leader group already left");
            return Ok(());
        }
        self.advertised.store(false, Ordering::SeqCst);
        info!(endpoint = %self.endpoint, "left leader group");
        Ok(())
    }
}

/// Election with exactly one member.
pub struct StandaloneElection {
    endpoint: String,
}

impl StandaloneElection {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    /// Offer `candidate` for leadership. Blocks while the candidate takes
    /// over; call from a blocking context.
    pub fn join(&self, candidate: &dyn LeadershipListener) -> LifecycleResult<Arc<LocalLeaderControl>> {
        info!(endpoint = %self.endpoint, "joined leader group, no competing replicas");
        let control = Arc::new(LocalLeaderControl::new(self.endpoint.clone()));
        candidate.on_leading(control.clone())?;
        Ok(control)
    }
}
