//! Periodic background reconnect.

use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::scheduler::Scheduler;

/// Submits a connect attempt to the worker on every tick.
///
/// The worker probes first and only reconnects a dead socket, so a tick
/// on a healthy connection just refreshes the connectivity state.
/// Failures never surface here; the next tick simply tries again.
#[derive(Debug)]
pub(crate) struct Reconnector {
    token: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Reconnector {
    pub(crate) fn spawn(scheduler: Scheduler, interval: Duration) -> Self {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        if scheduler.request_connect().is_err() {
                            break;
                        }
                    }
                }
            }
            debug!("reconnector stopped");
        });

        Self {
            token,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Stop ticking.
    pub(crate) fn cancel(&self) {
        self.token.cancel();
    }

    /// Cancel and wait for the timer task to exit. No connect attempt is
    /// submitted after this returns.
    pub(crate) async fn stop(&self) {
        self.cancel();
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

impl Drop for Reconnector {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
