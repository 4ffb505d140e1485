//! Process-wide shutdown signal.

use tokio::sync::watch;

/// Tells the rest of the process to stop. Invoked once, by teardown.
pub trait ShutdownSignal: Send + Sync {
    fn shutdown(&self);
}

/// The daemon's shutdown channel: receivers observe `true`.
impl ShutdownSignal for watch::Sender<bool> {
    fn shutdown(&self) {
        self.send_replace(true);
    }
}

/// Fires the signal when dropped, so it runs however teardown exits.
pub(crate) struct ShutdownGuard<'a>(pub(crate) &'a dyn ShutdownSignal);

impl Drop for ShutdownGuard<'_> {
    fn drop(&mut self) {
        self.0.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_sender_signals_receivers() {
        let (tx, rx) = watch::channel(false);
        tx.shutdown();
        assert!(*rx.borrow());
    }

    #[test]
    fn watch_sender_signals_without_receivers() {
        let (tx, rx) = watch::channel(false);
        drop(rx);
        tx.shutdown();
        assert!(*tx.borrow());
    }

    #[test]
    fn guard_signals_on_panic() {
        let (tx, rx) = watch::channel(false);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = ShutdownGuard(&tx);
            panic!("teardown step failed");
        }));
        assert!(result.is_err());
        assert!(*rx.borrow());
    }
}
