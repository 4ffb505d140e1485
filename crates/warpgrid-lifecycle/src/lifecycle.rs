//! Scheduler lifecycle controller.
//!
//! Wires the state machine to its collaborators. Every trigger, whether an
//! election callback, a timer, the driver join, or the event bus, ends up
//! in [`LifecycleCore::transition`], which installs the state, runs the
//! edge action, and fires teardown on any transition into `DEAD`.
//!
//! The enforced call order is:
//! 1. [`SchedulerLifecycle::prepare`] — prepare storage, get a candidate.
//! 2. [`LeadershipListener::on_leading`] on that candidate — this replica
//!    now leads; start the driver.
//! 3. [`SchedulerLifecycle::registered`] — the resource manager confirmed
//!    registration; advertise presence.
//!
//! Calls out of order fail with [`LifecycleError::InvalidTransition`].
//!
//! [`LeadershipListener::on_leading`]: crate::LeadershipListener::on_leading

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::candidate::LeadershipCandidate;
use crate::delayed::{DelayedActions, TokioDelayedActions};
use crate::driver::{DriverFactory, DriverReference};
use crate::error::{LeadershipError, LifecycleError, LifecycleResult};
use crate::events::{DriverRegistered, EventSink, SchedulerEvent};
use crate::leader::LeaderControlSlot;
use crate::machine::{EdgeAction, StateMachine};
use crate::metrics::LifecycleGauges;
use crate::options::LeadingOptions;
use crate::shutdown::{ShutdownGuard, ShutdownSignal};
use crate::state::LifecycleState;
use crate::storage::{read_with, MutableStoreProvider, Storage};

/// External collaborators the lifecycle drives.
#[derive(Clone)]
pub struct Collaborators {
    pub storage: Arc<dyn Storage>,
    pub driver_factory: Arc<dyn DriverFactory>,
    pub events: Arc<dyn EventSink>,
    pub shutdown: Arc<dyn ShutdownSignal>,
}

/// Shared lifecycle state. Handed by `Arc` to the candidate and to every
/// scheduled callback.
pub(crate) struct LifecycleCore {
    machine: StateMachine,
    registration_acked: AtomicBool,
    teardown_invoked: AtomicBool,
    pub(crate) leader_control: LeaderControlSlot,
    pub(crate) grant_lock: Mutex<()>,
    /// Held while the driver is started and while teardown stops it.
    driver_gate: Mutex<()>,
    driver_ref: Arc<DriverReference>,
    storage: Arc<dyn Storage>,
    driver_factory: Arc<dyn DriverFactory>,
    events: Arc<dyn EventSink>,
    shutdown: Arc<dyn ShutdownSignal>,
    delayed: Arc<dyn DelayedActions>,
}

impl LifecycleCore {
    pub(crate) fn state(&self) -> LifecycleState {
        self.machine.state()
    }

    /// Install `target`, run the edge action, then tear down if `target`
    /// is `DEAD`.
    pub(crate) fn transition(self: &Arc<Self>, target: LifecycleState) -> LifecycleResult<()> {
        let transition = self.machine.transition(target)?;

        let outcome = match transition.action {
            Some(EdgeAction::PrepareStorage) => self.prepare_storage(),
            Some(EdgeAction::HandleLeading) => {
                self.handle_leading();
                Ok(())
            }
            Some(EdgeAction::HandleRegistered) => {
                self.handle_registered();
                Ok(())
            }
            None => Ok(()),
        };

        if transition.to.is_dead() {
            self.shut_down();
        }
        outcome
    }

    /// Request `DEAD`. Always a legal edge, so this never fails.
    pub(crate) fn kill(self: &Arc<Self>, reason: &str) {
        debug!(reason, "requesting lifecycle shutdown");
        if let Err(e) = self.transition(LifecycleState::Dead) {
            warn!(error = %e, reason, "transition to DEAD rejected");
        }
    }

    fn prepare_storage(self: &Arc<Self>) -> LifecycleResult<()> {
        match self.storage.prepare() {
            Ok(()) => match self.transition(LifecycleState::StoragePrepared) {
                Err(LifecycleError::InvalidTransition {
                    from: LifecycleState::Dead,
                    ..
                }) => Err(LifecycleError::Terminated),
                other => other,
            },
            Err(e) => {
                error!(error = %e, "storage preparation failed, shutting down");
                self.kill("storage preparation failed");
                Err(LifecycleError::StorageInitialization(e))
            }
        }
    }

    fn handle_leading(self: &Arc<Self>) {
        info!("elected as leading scheduler");

        let started = self
            .storage
            .start(&mut |store: &mut dyn MutableStoreProvider| {
                let repaired = store.backfill()?;
                info!(repaired, "storage backfill complete");
                Ok(())
            });
        if let Err(e) = started {
            error!(error = %e, "failed to start storage, shutting down");
            self.kill("storage start failed");
            return;
        }

        let framework_id = match read_with(self.storage.as_ref(), |store| store.fetch_framework_id()) {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, "failed to read framework id, shutting down");
                self.kill("framework id read failed");
                return;
            }
        };
        match &framework_id {
            Some(id) => info!(framework_id = %id, "resuming framework registration"),
            None => info!("no persisted framework id, registering a new framework"),
        }

        let driver = self.driver_factory.create(framework_id.as_deref());
        self.driver_ref.set(Arc::clone(&driver));

        let core = Arc::clone(self);
        self.delayed
            .on_registration_timeout(Box::new(move || core.registration_timed_out()));

        let core = Arc::clone(self);
        self.delayed.on_auto_failover(Box::new(move || {
            if core.state().is_dead() {
                return;
            }
            info!("triggering automatic failover");
            core.kill("automatic failover");
        }));

        {
            let _gate = self.driver_gate.lock().unwrap_or_else(PoisonError::into_inner);
            // Leadership may have been lost while the driver was being built.
            if self.state().is_dead() {
                warn!("lifecycle died while taking leadership, not starting driver");
                return;
            }
            let status = driver.start();
            info!(?status, "driver started");
        }

        let core = Arc::clone(self);
        self.delayed.blocking_driver_join(Box::new(move || {
            let status = driver.join();
            info!(?status, "driver exited");
            core.kill("driver exited");
        }));
    }

    fn registration_timed_out(self: &Arc<Self>) {
        if self.registration_acked.load(Ordering::SeqCst) {
            debug!("framework registered within the tolerated delay");
            return;
        }
        if self.state().is_dead() {
            return;
        }
        error!("framework has not been registered within the tolerated delay");
        self.kill("registration timeout");
    }

    fn handle_registered(self: &Arc<Self>) {
        if !self.acknowledge_registration() {
            debug!("registration arrived after shutdown, ignoring");
            return;
        }
        self.events.post(SchedulerEvent::SchedulerActive);

        let Some(control) = self.leader_control.get() else {
            error!("registered without a leader control handle, shutting down");
            self.kill("no leader control");
            return;
        };

        match control.advertise() {
            Ok(()) => info!("advertised leading scheduler"),
            Err(LeadershipError::Interrupted) => {
                error!("interrupted while advertising leader, shutting down");
                self.kill("advertise interrupted");
            }
            Err(e) => {
                error!(error = %e, "failed to advertise leader, shutting down");
                self.kill("advertise failed");
            }
        }
    }

    /// Set the registration flag unless teardown has begun. Teardown clears
    /// the flag after installing `DEAD`, so a second look after the store
    /// covers a teardown that finished in between.
    fn acknowledge_registration(&self) -> bool {
        if self.state().is_dead() {
            return false;
        }
        self.registration_acked.store(true, Ordering::SeqCst);
        if self.state().is_dead() {
            self.registration_acked.store(false, Ordering::SeqCst);
            return false;
        }
        true
    }

    /// Teardown. Runs at most once; every step runs even when an earlier
    /// one fails, and the process shutdown signal always fires.
    fn shut_down(&self) {
        if self
            .teardown_invoked
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!("shutdown already invoked, ignoring extra call");
            return;
        }

        let _signal = ShutdownGuard(self.shutdown.as_ref());

        match self.leader_control.take() {
            Some(control) => match control.leave() {
                Ok(()) => info!("left leadership"),
                Err(e) => warn!(error = %e, "failed to leave leadership"),
            },
            None => debug!("no leader control to release"),
        }

        {
            let _gate = self.driver_gate.lock().unwrap_or_else(PoisonError::into_inner);
            match self.driver_ref.get() {
                Some(driver) => {
                    let status = driver.stop();
                    info!(?status, "driver stopped");
                }
                None => debug!("no driver to stop"),
            }
        }

        if let Err(e) = self.storage.stop() {
            warn!(error = %e, "failed to stop storage");
        }

        self.registration_acked.store(false, Ordering::SeqCst);
        info!("teardown complete, signalling process shutdown");
    }
}

/// The central driver of the scheduler runtime lifecycle.
///
/// Cheap to clone; all clones share one state machine.
#[derive(Clone)]
pub struct SchedulerLifecycle {
    core: Arc<LifecycleCore>,
}

impl SchedulerLifecycle {
    /// Create a lifecycle whose timers run on `runtime`.
    pub fn new(collaborators: Collaborators, options: LeadingOptions, runtime: Handle) -> Self {
        info!(%options, "scheduler lifecycle configured");
        Self::with_delayed_actions(
            collaborators,
            Arc::new(TokioDelayedActions::new(runtime, options)),
        )
    }

    /// Create a lifecycle with an explicit timer service.
    pub fn with_delayed_actions(collaborators: Collaborators, delayed: Arc<dyn DelayedActions>) -> Self {
        let Collaborators {
            storage,
            driver_factory,
            events,
            shutdown,
        } = collaborators;

        let core = LifecycleCore {
            machine: StateMachine::new("SchedulerLifecycle", LifecycleState::Idle),
            registration_acked: AtomicBool::new(false),
            teardown_invoked: AtomicBool::new(false),
            leader_control: LeaderControlSlot::default(),
            grant_lock: Mutex::new(()),
            driver_gate: Mutex::new(()),
            driver_ref: Arc::new(DriverReference::new()),
            storage,
            driver_factory,
            events,
            shutdown,
            delayed,
        };
        Self {
            core: Arc::new(core),
        }
    }

    /// Prepare this replica to offer itself for leadership.
    ///
    /// Only legal from `IDLE`. On success the machine is in
    /// `STORAGE_PREPARED` and the returned candidate should be handed to the
    /// election. A storage failure leaves the machine `DEAD` and is returned
    /// as [`LifecycleError::StorageInitialization`]. If another trigger
    /// kills the lifecycle while storage is being prepared, this returns
    /// [`LifecycleError::Terminated`].
    pub fn prepare(&self) -> LifecycleResult<LeadershipCandidate> {
        self.core.transition(LifecycleState::PreparingStorage)?;
        Ok(LeadershipCandidate::new(Arc::clone(&self.core)))
    }

    /// The resource manager confirmed registration.
    pub fn registered(&self, event: &DriverRegistered) -> LifecycleResult<()> {
        info!(framework_id = %event.framework_id, "framework registered");
        self.core.transition(LifecycleState::RegisteredLeader)
    }

    /// Deliver `DriverRegistered` events from `events` to [`Self::registered`].
    ///
    /// Must be called from within a tokio runtime. Failures are logged and
    /// never reach the bus.
    pub fn spawn_subscriber(&self, mut events: broadcast::Receiver<SchedulerEvent>) -> JoinHandle<()> {
        let lifecycle = self.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(SchedulerEvent::DriverRegistered(event)) => {
                        let lifecycle = lifecycle.clone();
                        let delivered =
                            tokio::task::spawn_blocking(move || lifecycle.registered(&event)).await;
                        match delivered {
                            Ok(Ok(())) => {}
                            Ok(Err(e)) => warn!(error = %e, "registration event rejected"),
                            Err(e) => error!(error = %e, "registration handler panicked"),
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "lifecycle subscriber lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("lifecycle subscriber stopped");
        })
    }

    /// Request a transition directly. `DEAD` is always accepted.
    pub fn transition(&self, target: LifecycleState) -> LifecycleResult<()> {
        self.core.transition(target)
    }

    pub fn state(&self) -> LifecycleState {
        self.core.state()
    }

    /// Whether the resource manager has acknowledged registration.
    pub fn is_registered(&self) -> bool {
        self.core.registration_acked.load(Ordering::SeqCst)
    }

    /// The driver slot, readable by other scheduler components.
    pub fn driver_reference(&self) -> Arc<DriverReference> {
        Arc::clone(&self.core.driver_ref)
    }

    pub fn gauges(&self) -> LifecycleGauges {
        LifecycleGauges {
            state: self.state(),
            framework_registered: self.is_registered(),
        }
    }
}
