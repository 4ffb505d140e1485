//! warpgrid-lifecycle — leadership and lifecycle control for the WarpGrid scheduler.
//!
//! Many scheduler replicas run at once; only the elected leader may drive
//! the cluster. This crate moves a replica from cold start through storage
//! preparation, leader election, and driver registration into active
//! service, and finally into a single idempotent teardown.
//!
//! # Architecture
//!
//! ```text
//! SchedulerLifecycle (public controller)
//!   ├── prepare()            → IDLE → PREPARING_STORAGE → STORAGE_PREPARED
//!   │     └── returns LeadershipCandidate for the election
//!   ├── LeadershipCandidate
//!   │     ├── on_leading()   → LEADER_AWAITING_REGISTRATION (backfill, driver start, timers)
//!   │     └── on_defeated()  → DEAD
//!   ├── registered()         → REGISTERED_LEADER (advertise presence)
//!   └── StateMachine         → validates and installs every transition
//!         └── any → DEAD     → teardown (exactly once)
//! ```
//!
//! Triggers arrive from election callbacks, storage work, timer tasks, the
//! driver join thread, and the event bus. All of them funnel through
//! [`SchedulerLifecycle::transition`], whose read/validate/install step is
//! linearized by the state machine.

pub mod candidate;
pub mod delayed;
pub mod driver;
pub mod error;
pub mod events;
pub mod leader;
pub mod lifecycle;
pub mod machine;
pub mod metrics;
pub mod options;
pub mod shutdown;
pub mod state;
pub mod storage;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use candidate::{LeadershipCandidate, LeadershipListener};
pub use delayed::{DelayedAction, DelayedActions, TokioDelayedActions};
pub use driver::{DriverFactory, DriverReference, DriverStatus, SchedulerDriver};
pub use error::{LeadershipError, LifecycleError, LifecycleResult, StorageError, StorageResult};
pub use events::{DriverRegistered, EventBus, EventSink, SchedulerEvent};
pub use leader::{EndpointStatus, LeaderControl};
pub use lifecycle::{Collaborators, SchedulerLifecycle};
pub use machine::{transition_graph, EdgeAction, StateMachine, Transition};
pub use metrics::{render_prometheus, Gauge, LifecycleGauges};
pub use options::LeadingOptions;
pub use shutdown::ShutdownSignal;
pub use state::{LifecycleState, ALL_STATES};
pub use storage::{read_with, FrameworkId, MutableStoreProvider, Storage, StoreProvider};
