//! Lifecycle state machine — transition table and the atomic install step.
//!
//! The machine only validates and installs states. It returns the action
//! attached to the installed edge and leaves running it to the caller, so
//! actions never execute under the state lock.

use std::sync::{Mutex, PoisonError};

use tracing::info;

use crate::error::{LifecycleError, LifecycleResult};
use crate::state::{LifecycleState, ALL_STATES};

/// Work attached to an edge, executed after the target state is installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeAction {
    /// Initialize storage, then move on to `STORAGE_PREPARED`.
    PrepareStorage,
    /// Backfill, create and start the driver, arm the timers.
    HandleLeading,
    /// Acknowledge registration and advertise presence.
    HandleRegistered,
}

/// Outgoing edges of one source state.
struct StateEntry {
    from: LifecycleState,
    action: Option<EdgeAction>,
    to: &'static [LifecycleState],
}

use LifecycleState::*;

const TABLE: &[StateEntry] = &[
    StateEntry {
        from: Idle,
        action: Some(EdgeAction::PrepareStorage),
        to: &[PreparingStorage, Dead],
    },
    StateEntry {
        from: PreparingStorage,
        action: None,
        to: &[StoragePrepared, Dead],
    },
    StateEntry {
        from: StoragePrepared,
        action: Some(EdgeAction::HandleLeading),
        to: &[LeaderAwaitingRegistration, Dead],
    },
    StateEntry {
        from: LeaderAwaitingRegistration,
        action: Some(EdgeAction::HandleRegistered),
        to: &[RegisteredLeader, Dead],
    },
    StateEntry {
        from: RegisteredLeader,
        action: None,
        to: &[Active, Dead],
    },
    StateEntry {
        from: Active,
        action: None,
        to: &[Dead],
    },
    // DEAD loops to itself so repeated stop requests never fail.
    StateEntry {
        from: Dead,
        action: None,
        to: &[Dead],
    },
];

/// An installed transition and the action its caller must run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: LifecycleState,
    pub to: LifecycleState,
    pub action: Option<EdgeAction>,
}

/// Look up the edge `from -> to`.
///
/// Returns `None` for an illegal edge. A legal edge into `DEAD` never
/// carries the source state's forward action; teardown runs from the
/// any-transition-to-`DEAD` hook instead.
pub fn edge(from: LifecycleState, to: LifecycleState) -> Option<Transition> {
    let entry = TABLE.iter().find(|entry| entry.from == from)?;
    if !entry.to.contains(&to) {
        return None;
    }
    Some(Transition {
        from,
        to,
        action: entry.action.filter(|_| !to.is_dead()),
    })
}

/// Every legal edge, in table order.
pub fn transition_graph() -> Vec<Transition> {
    ALL_STATES
        .iter()
        .flat_map(|&from| ALL_STATES.iter().filter_map(move |&to| edge(from, to)))
        .collect()
}

/// Holds the current state and linearizes transitions.
pub struct StateMachine {
    name: &'static str,
    state: Mutex<LifecycleState>,
}

impl StateMachine {
    pub fn new(name: &'static str, initial: LifecycleState) -> Self {
        Self {
            name,
            state: Mutex::new(initial),
        }
    }

    /// The current state.
    pub fn state(&self) -> LifecycleState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Atomically validate and install `to`.
    ///
    /// Exactly one caller wins any race to leave a state; the losers get
    /// `InvalidTransition` and the state is left untouched.
    pub fn transition(&self, to: LifecycleState) -> LifecycleResult<Transition> {
        let transition = {
            let mut current = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            let from = *current;
            let transition = edge(from, to).ok_or(LifecycleError::InvalidTransition { from, to })?;
            *current = to;
            transition
        };

        info!(
            machine = self.name,
            from = %transition.from,
            to = %transition.to,
            "lifecycle transition"
        );
        Ok(transition)
    }
}
