//! Settledness tracking.
//!
//! The application under test registers outstanding asynchronous work with a
//! [`PendingWork`] tracker (timers, scheduled tasks, in-flight requests, and
//! test waiters). Each registration hands back a [`PendingGuard`]; dropping
//! it marks the work finished. A [`SettlednessOracle`] resolves once nothing
//! is outstanding.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use settlekit_core::config::SettleConfig;
//! use settlekit_core::settled::{PendingKind, PendingWork, Settler, SettlednessOracle};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let work = PendingWork::new();
//!     work.set_timeout(Duration::from_millis(5), || {});
//!     assert!(!work.is_settled());
//!
//!     Settler::new(work.clone(), SettleConfig::default()).settled().await.unwrap();
//!     assert!(work.is_settled());
//! }
//! ```

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::config::SettleConfig;

/// Errors from waiting on settledness.
#[derive(Error, Debug, Clone)]
pub enum SettleError {
    /// Work was still outstanding when the configured timeout elapsed.
    #[error("Application did not settle within {waited_ms}ms ({state})")]
    Timeout {
        /// How long the oracle waited.
        waited_ms: u64,
        /// Outstanding work at the time of giving up.
        state: SettledState,
    },
}

/// Category of outstanding asynchronous work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingKind {
    /// A scheduled timer callback.
    Timer,
    /// Work queued on the application's task queue.
    ScheduledTask,
    /// An in-flight request.
    Request,
    /// A test waiter that has not released yet.
    Waiter,
}

/// Snapshot of outstanding work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettledState {
    /// Outstanding timers.
    pub timers: usize,
    /// Outstanding scheduled tasks.
    pub scheduled_tasks: usize,
    /// Outstanding requests.
    pub requests: usize,
    /// Outstanding waiters.
    pub waiters: usize,
}

impl SettledState {
    /// Returns true when nothing is outstanding.
    pub fn is_settled(&self) -> bool {
        self.timers == 0 && self.scheduled_tasks == 0 && self.requests == 0 && self.waiters == 0
    }
}

impl fmt::Display for SettledState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "timers={} scheduled_tasks={} requests={} waiters={}",
            self.timers, self.scheduled_tasks, self.requests, self.waiters
        )
    }
}

#[derive(Default)]
struct Counters {
    timers: AtomicUsize,
    scheduled_tasks: AtomicUsize,
    requests: AtomicUsize,
    waiters: AtomicUsize,
    changed: Notify,
}

impl Counters {
    fn counter(&self, kind: PendingKind) -> &AtomicUsize {
        match kind {
            PendingKind::Timer => &self.timers,
            PendingKind::ScheduledTask => &self.scheduled_tasks,
            PendingKind::Request => &self.requests,
            PendingKind::Waiter => &self.waiters,
        }
    }
}

/// Shared tracker of outstanding application work.
#[derive(Clone, Default)]
pub struct PendingWork {
    counters: Arc<Counters>,
}

impl fmt::Debug for PendingWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PendingWork").field(&self.state()).finish()
    }
}

impl PendingWork {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one unit of outstanding work. It stays outstanding until the
    /// returned guard is dropped.
    pub fn track(&self, kind: PendingKind) -> PendingGuard {
        self.counters.counter(kind).fetch_add(1, Ordering::SeqCst);
        trace!(?kind, "pending work registered");
        PendingGuard {
            work: self.clone(),
            kind,
        }
    }

    /// Runs `f` after `delay` on the runtime, counted as a pending timer
    /// until it has run.
    pub fn set_timeout<F>(&self, delay: Duration, f: F) -> JoinHandle<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let guard = self.track(PendingKind::Timer);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            f();
            drop(guard);
        })
    }

    /// Spawns `future`, counted as pending work of `kind` until it completes.
    pub fn spawn<F>(&self, kind: PendingKind, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let guard = self.track(kind);
        tokio::spawn(async move {
            let output = future.await;
            drop(guard);
            output
        })
    }

    /// Current counts of outstanding work.
    pub fn state(&self) -> SettledState {
        SettledState {
            timers: self.counters.timers.load(Ordering::SeqCst),
            scheduled_tasks: self.counters.scheduled_tasks.load(Ordering::SeqCst),
            requests: self.counters.requests.load(Ordering::SeqCst),
            waiters: self.counters.waiters.load(Ordering::SeqCst),
        }
    }

    /// Returns true when nothing is outstanding.
    pub fn is_settled(&self) -> bool {
        self.state().is_settled()
    }

    fn release(&self, kind: PendingKind) {
        self.counters.counter(kind).fetch_sub(1, Ordering::SeqCst);
        trace!(?kind, "pending work finished");
        self.counters.changed.notify_waiters();
    }
}

/// Marks one unit of work outstanding for as long as it lives.
#[must_use = "dropping the guard immediately marks the work finished"]
#[derive(Debug)]
pub struct PendingGuard {
    work: PendingWork,
    kind: PendingKind,
}

impl PendingGuard {
    /// The kind of work this guard tracks.
    pub fn kind(&self) -> PendingKind {
        self.kind
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.work.release(self.kind);
    }
}

/// Asynchronous check that resolves once no application work is outstanding.
#[async_trait]
pub trait SettlednessOracle: Send + Sync {
    /// Waits until the application is settled.
    async fn settled(&self) -> Result<(), SettleError>;
}

/// [`SettlednessOracle`] backed by a [`PendingWork`] tracker.
///
/// Re-checks whenever a guard is dropped and, as a fallback, every
/// `poll_interval`. With no timeout configured it waits indefinitely.
#[derive(Debug, Clone)]
pub struct Settler {
    work: PendingWork,
    poll_interval: Duration,
    timeout: Option<Duration>,
}

impl Settler {
    /// Creates a settler over `work` using the intervals from `config`.
    pub fn new(work: PendingWork, config: SettleConfig) -> Self {
        Self {
            work,
            poll_interval: config.poll_interval(),
            timeout: config.timeout(),
        }
    }

    /// Overrides the timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl SettlednessOracle for Settler {
    async fn settled(&self) -> Result<(), SettleError> {
        let start = Instant::now();
        loop {
            // Register interest before checking so a release between the
            // check and the wait is not missed.
            let changed = self.work.counters.changed.notified();
            let state = self.work.state();
            if state.is_settled() {
                debug!(elapsed_ms = start.elapsed().as_millis() as u64, "settled");
                return Ok(());
            }

            let mut wait = self.poll_interval;
            if let Some(timeout) = self.timeout {
                let elapsed = start.elapsed();
                if elapsed >= timeout {
                    return Err(SettleError::Timeout {
                        waited_ms: elapsed.as_millis() as u64,
                        state,
                    });
                }
                wait = wait.min(timeout - elapsed);
            }

            let _ = tokio::time::timeout(wait, changed).await;
        }
    }
}
