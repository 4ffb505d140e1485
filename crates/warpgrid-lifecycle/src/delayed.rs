//! Delayed actions — the timers and the blocking driver join.
//!
//! Every callback runs on a thread other than the one that armed it and
//! calls back into the lifecycle's `transition`, relying on the state
//! machine for synchronization.

use tokio::runtime::Handle;
use tracing::{error, info};

use crate::options::LeadingOptions;

/// Callback scheduled by [`DelayedActions`].
pub type DelayedAction = Box<dyn FnOnce() + Send + 'static>;

/// Timer service consumed by the leading action.
pub trait DelayedActions: Send + Sync {
    /// Run `action` on a worker; it blocks on the driver join.
    fn blocking_driver_join(&self, action: DelayedAction);

    /// Run `action` once the leading time limit elapses.
    fn on_auto_failover(&self, action: DelayedAction);

    /// Run `action` once the registration delay limit elapses.
    fn on_registration_timeout(&self, action: DelayedAction);
}

/// Production timer service on a tokio runtime.
///
/// Callbacks go through `spawn_blocking` since they may stop the driver
/// and storage.
pub struct TokioDelayedActions {
    runtime: Handle,
    options: LeadingOptions,
}

impl TokioDelayedActions {
    pub fn new(runtime: Handle, options: LeadingOptions) -> Self {
        Self { runtime, options }
    }

    fn schedule(&self, delay: std::time::Duration, action: DelayedAction) {
        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = tokio::task::spawn_blocking(action).await {
                error!(error = %e, "delayed action panicked");
            }
        });
    }
}

impl DelayedActions for TokioDelayedActions {
    fn blocking_driver_join(&self, action: DelayedAction) {
        self.runtime.spawn_blocking(action);
    }

    fn on_auto_failover(&self, action: DelayedAction) {
        self.schedule(self.options.leading_time_limit, action);
    }

    fn on_registration_timeout(&self, action: DelayedAction) {
        info!(
            limit = ?self.options.registration_delay_limit,
            "giving up on registration after limit"
        );
        self.schedule(self.options.registration_delay_limit, action);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::oneshot;
    use tokio::time::Instant;

    use super::*;

    fn signal_action() -> (DelayedAction, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        let action: DelayedAction = Box::new(move || {
            let _ = tx.send(());
        });
        (action, rx)
    }

    fn options() -> LeadingOptions {
        LeadingOptions::new(Duration::from_secs(60), Duration::from_secs(3600))
    }

    #[tokio::test(start_paused = true)]
    async fn registration_timeout_fires_after_limit() {
        let delayed = TokioDelayedActions::new(Handle::current(), options());
        let (action, mut fired) = signal_action();
        let armed_at = Instant::now();
        delayed.on_registration_timeout(action);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(fired.try_recv().is_err());

        fired.await.unwrap();
        assert!(armed_at.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn auto_failover_waits_for_leading_limit() {
        let delayed = TokioDelayedActions::new(Handle::current(), options());
        let (action, mut fired) = signal_action();
        let armed_at = Instant::now();
        delayed.on_auto_failover(action);

        tokio::time::sleep(Duration::from_secs(3599)).await;
        assert!(fired.try_recv().is_err());

        fired.await.unwrap();
        assert!(armed_at.elapsed() >= Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn blocking_join_runs_off_the_calling_thread() {
        let delayed = TokioDelayedActions::new(Handle::current(), options());
        let caller = std::thread::current().id();
        let (tx, rx) = oneshot::channel();
        delayed.blocking_driver_join(Box::new(move || {
            let _ = tx.send(std::thread::current().id());
        }));
        let worker = rx.await.unwrap();
        assert_ne!(worker, caller);
    }
}
