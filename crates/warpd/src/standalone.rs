//! Standalone mode — one scheduler replica with a local election and
//! driver, plus the HTTP API.
//!
//! In this mode, the daemon:
//! 1. Prepares the scheduler store
//! 2. Wins the (single-member) leader election and starts the driver
//! 3. Moves to ACTIVE once registration is acknowledged
//! 4. Serves lifecycle status and gauges over HTTP
//! 5. Exits when the lifecycle reaches DEAD (Ctrl-C, failover, driver exit)

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use warpgrid_lifecycle::{
    Collaborators, DriverRegistered, EventBus, EventSink, LeadershipCandidate, LifecycleState,
    SchedulerEvent, SchedulerLifecycle,
};

use crate::config::DaemonConfig;
use crate::driver::{LocalDriverFactory, RegistrationCallback};
use crate::election::{LocalLeaderControl, StandaloneElection};
use crate::storage::RedbStorage;

/// Assembled scheduler, before it has been offered for leadership.
pub struct Scheduler {
    pub lifecycle: SchedulerLifecycle,
    pub storage: Arc<RedbStorage>,
    pub bus: EventBus,
    pub shutdown: watch::Receiver<bool>,
    subscribers: Vec<JoinHandle<()>>,
}

impl Scheduler {
    /// Wire the lifecycle to its collaborators. Must be called from within
    /// a tokio runtime.
    pub fn assemble(config: &DaemonConfig, storage: RedbStorage) -> anyhow::Result<Self> {
        let options = config.leading_options()?;
        let storage = Arc::new(storage);
        let bus = EventBus::default();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let registration_storage = Arc::clone(&storage);
        let registration_bus = bus.clone();
        let on_registered: RegistrationCallback = Arc::new(move |framework_id: &str| {
            if let Err(e) = registration_storage.save_framework_id(framework_id) {
                warn!(error = %e, "failed to persist framework id");
            }
            registration_bus.post(SchedulerEvent::DriverRegistered(DriverRegistered {
                framework_id: framework_id.to_string(),
            }));
        });
        let driver_factory = LocalDriverFactory::new(&config.scheduler.framework_name, on_registered);

        let lifecycle = SchedulerLifecycle::new(
            Collaborators {
                storage: storage.clone(),
                driver_factory: Arc::new(driver_factory),
                events: Arc::new(bus.clone()),
                shutdown: Arc::new(shutdown_tx),
            },
            options,
            Handle::current(),
        );

        // Subscribe before anything can post.
        let subscribers = vec![
            lifecycle.spawn_subscriber(bus.subscribe()),
            spawn_activation(lifecycle.clone(), bus.subscribe()),
        ];

        Ok(Self {
            lifecycle,
            storage,
            bus,
            shutdown: shutdown_rx,
            subscribers,
        })
    }

    /// Prepare storage and take leadership. Runs the blocking lifecycle
    /// steps off the async workers.
    pub async fn lead(&self, endpoint: &str) -> anyhow::Result<Arc<LocalLeaderControl>> {
        let lifecycle = self.lifecycle.clone();
        let candidate: LeadershipCandidate = tokio::task::spawn_blocking(move || lifecycle.prepare()).await??;

        let election = StandaloneElection::new(endpoint);
        let control = tokio::task::spawn_blocking(move || election.join(&candidate)).await??;
        Ok(control)
    }

    /// Request DEAD from a blocking context.
    pub async fn stop(&self) {
        let lifecycle = self.lifecycle.clone();
        match tokio::task::spawn_blocking(move || lifecycle.transition(LifecycleState::Dead)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "stop request rejected"),
            Err(e) => error!(error = %e, "stop request panicked"),
        }
    }

    /// Resolves once teardown has signalled process shutdown.
    pub async fn stopped(&self) {
        let mut shutdown = self.shutdown.clone();
        if shutdown.wait_for(|stopped| *stopped).await.is_err() {
            debug!("shutdown channel closed");
        }
    }

    /// Stop the event subscribers.
    pub async fn close(self) {
        // Subscribers hold the lifecycle, which holds the bus, so the
        // channel never closes on its own.
        for handle in self.subscribers {
            handle.abort();
            let _ = handle.await;
        }
    }
}

/// Move REGISTERED_LEADER to ACTIVE once the scheduler announces itself.
fn spawn_activation(
    lifecycle: SchedulerLifecycle,
    mut events: broadcast::Receiver<SchedulerEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SchedulerEvent::SchedulerActive) => {
                    let lifecycle = lifecycle.clone();
                    let activated = tokio::task::spawn_blocking(move || {
                        lifecycle.transition(LifecycleState::Active)
                    })
                    .await;
                    match activated {
                        Ok(Ok(())) => info!("scheduler active"),
                        Ok(Err(e)) => warn!(error = %e, "could not activate scheduler"),
                        Err(e) => error!(error = %e, "activation panicked"),
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "activation listener lagged behind event bus");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Run the standalone scheduler until the lifecycle dies.
pub async fn run_standalone(config: DaemonConfig) -> anyhow::Result<()> {
    info!("WarpGrid scheduler starting in standalone mode");
    std::fs::create_dir_all(&config.scheduler.data_dir)?;

    let store_path = config.store_path();
    let scheduler = Scheduler::assemble(&config, RedbStorage::open_at(&store_path))?;
    info!(path = ?store_path, "scheduler assembled");

    // ── Start API server ───────────────────────────────────────

    let router = warpgrid_api::build_router(scheduler.lifecycle.clone());
    let addr = SocketAddr::from(([0, 0, 0, 0], config.http.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "API server starting");

    let mut server_shutdown = scheduler.shutdown.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = server_shutdown.wait_for(|stopped| *stopped).await;
                info!("lifecycle shut down, stopping API server");
            })
            .await
    });

    // ── Take leadership ────────────────────────────────────────

    let endpoint = format!("{}@{}", config.scheduler.framework_name, addr);
    if let Err(e) = scheduler.lead(&endpoint).await {
        error!(error = %e, "failed to take leadership");
        scheduler.stop().await;
    }

    // ── Wait for DEAD ──────────────────────────────────────────

    tokio::select! {
        _ = scheduler.stopped() => {}
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("shutdown signal received"),
                Err(e) => error!(error = %e, "failed to listen for Ctrl-C"),
            }
            scheduler.stop().await;
            scheduler.stopped().await;
        }
    }

    server.await??;
    scheduler.close().await;

    info!("WarpGrid scheduler stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use warpgrid_lifecycle::read_with;

    use super::*;

    async fn wait_for_state(lifecycle: &SchedulerLifecycle, state: LifecycleState) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while lifecycle.state() != state {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn standalone_scheduler_reaches_active_and_stops() {
        let scheduler = Scheduler::assemble(&DaemonConfig::default(), RedbStorage::in_memory()).unwrap();

        let control = scheduler.lead("node-1").await.unwrap();
        wait_for_state(&scheduler.lifecycle, LifecycleState::Active).await;
        assert!(scheduler.lifecycle.is_registered());
        assert!(control.is_advertised());

        assert!(scheduler.lifecycle.driver_reference().get().is_some());

        let framework_id = read_with(scheduler.storage.as_ref(), |p| p.fetch_framework_id()).unwrap();
        assert!(framework_id.unwrap().starts_with("warpgrid-scheduler-"));

        scheduler.stop().await;
        scheduler.stopped().await;
        assert_eq!(scheduler.lifecycle.state(), LifecycleState::Dead);
        assert!(control.has_left());
        scheduler.close().await;
    }
}
