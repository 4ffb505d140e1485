//! Scheduler lifecycle states.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a scheduler replica is in its lifecycle.
///
/// The states are ordered by the legal transition graph, not by their
/// declaration order. See [`crate::machine`] for the edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    /// Constructed, nothing started.
    Idle,
    /// Storage initialization in progress.
    PreparingStorage,
    /// Storage ready; waiting to be elected.
    StoragePrepared,
    /// Elected; driver started, waiting for the resource manager to confirm.
    LeaderAwaitingRegistration,
    /// Registration confirmed and presence advertised.
    RegisteredLeader,
    /// Serving.
    Active,
    /// Terminal. Every state may move here, and it only loops to itself.
    Dead,
}

/// Canonical list of all lifecycle states, in lifecycle order.
pub const ALL_STATES: [LifecycleState; 7] = [
    LifecycleState::Idle,
    LifecycleState::PreparingStorage,
    LifecycleState::StoragePrepared,
    LifecycleState::LeaderAwaitingRegistration,
    LifecycleState::RegisteredLeader,
    LifecycleState::Active,
    LifecycleState::Dead,
];

impl LifecycleState {
    /// Stable label used in logs and exported gauge names.
    pub const fn label(self) -> &'static str {
        match self {
            LifecycleState::Idle => "IDLE",
            LifecycleState::PreparingStorage => "PREPARING_STORAGE",
            LifecycleState::StoragePrepared => "STORAGE_PREPARED",
            LifecycleState::LeaderAwaitingRegistration => "LEADER_AWAITING_REGISTRATION",
            LifecycleState::RegisteredLeader => "REGISTERED_LEADER",
            LifecycleState::Active => "ACTIVE",
            LifecycleState::Dead => "DEAD",
        }
    }

    pub const fn is_dead(self) -> bool {
        matches!(self, LifecycleState::Dead)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_unique() {
        let mut labels: Vec<_> = ALL_STATES.iter().map(|s| s.label()).collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), ALL_STATES.len());
    }

    #[test]
    fn only_dead_is_dead() {
        for state in ALL_STATES {
            assert_eq!(state.is_dead(), state == LifecycleState::Dead);
        }
    }

    #[test]
    fn serializes_as_label() {
        let json = serde_json::to_string(&LifecycleState::LeaderAwaitingRegistration).unwrap();
        assert_eq!(json, "\"LEADER_AWAITING_REGISTRATION\"");
    }
}
