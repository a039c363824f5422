//! Background cleanup of expired sessions.
//!
//! [`spawn_cleanup`] starts a task that purges expired sessions on a fixed
//! interval until its [`CleanupHandle`] is stopped. Stopping is a
//! rendezvous: the owner sends quit and waits for the task to acknowledge
//! with done, so once [`CleanupHandle::stop`] returns no further purge can
//! run.

use std::future::Future;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::Result;

/// Interval used when a zero interval is requested.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Longest interval the task will wait between purges.
pub const MAX_CLEANUP_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// A store that can delete its expired sessions in bulk.
pub trait Purge: Send + Sync + 'static {
    /// Delete every expired session, returning how many were removed.
    fn purge(&self) -> impl Future<Output = Result<u64>> + Send;
}

/// Owner's side of a running cleanup task.
///
/// [`stop`](Self::stop) consumes the handle, so a task can only be stopped
/// once. Dropping the handle instead also ends the task at its next wake-up,
/// without waiting for it.
#[must_use = "dropping the handle stops the cleanup task"]
#[derive(Debug)]
pub struct CleanupHandle {
    quit: oneshot::Sender<()>,
    done: oneshot::Receiver<()>,
}

impl CleanupHandle {
    /// Tell the task to quit and wait until it has exited.
    ///
    /// A purge that is already running completes first. There is no
    /// timeout.
    pub async fn stop(self) {
        // A failed send means the task is already gone; done then resolves
        // immediately with an error.
        let _ = self.quit.send(());
        let _ = self.done.await;
    }
}

/// Spawn a task that calls [`Purge::purge`] every `interval`.
///
/// A zero interval is replaced by [`DEFAULT_CLEANUP_INTERVAL`], and one
/// longer than [`MAX_CLEANUP_INTERVAL`] is capped to it. The first purge runs
/// one full interval after the call. Failed purges are logged and do not stop
/// the task.
///
/// # Panics
///
/// Panics if called outside a tokio runtime.
pub fn spawn_cleanup<P: Purge>(purger: P, interval: Duration) -> CleanupHandle {
    let interval = if interval.is_zero() {
        DEFAULT_CLEANUP_INTERVAL
    } else if interval > MAX_CLEANUP_INTERVAL {
        warn!(
            requested_secs = interval.as_secs(),
            max_secs = MAX_CLEANUP_INTERVAL.as_secs(),
            "Cleanup interval too long, capping"
        );
        MAX_CLEANUP_INTERVAL
    } else {
        interval
    };

    let (quit_tx, quit_rx) = oneshot::channel();
    let (done_tx, done_rx) = oneshot::channel();
    tokio::spawn(run_cleanup(purger, interval, quit_rx, done_tx));

    info!(interval_secs = interval.as_secs(), "Session cleanup started");

    CleanupHandle {
        quit: quit_tx,
        done: done_rx,
    }
}

async fn run_cleanup<P: Purge>(
    purger: P,
    period: Duration,
    mut quit: oneshot::Receiver<()>,
    done: oneshot::Sender<()>,
) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            // Resolves on quit, and also when the handle has been dropped.
            _ = &mut quit => break,

            _ = ticker.tick() => match purger.purge().await {
                Ok(0) => debug!("Session cleanup: no expired sessions"),
                Ok(count) => info!(purged = count, "Session cleanup completed"),
                Err(e) => warn!(error = %e, "Session cleanup failed"),
            },
        }
    }

    drop(ticker);
    debug!("Session cleanup stopped");
    let _ = done.send(());
}
