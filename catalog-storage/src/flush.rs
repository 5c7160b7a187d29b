//! Flush scheduling.
//!
//! A flush writes the in-memory table to both tiers. Flushes triggered by
//! mutations are debounced: a flush is skipped when the last successful one
//! happened less than `interval` ago. The debounce decision itself is made by
//! [`TieredCache`](crate::TieredCache) while it holds its lock, so two callers
//! can never both decide to flush the same window.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::cache::TieredCache;
use crate::tier::{LocalTier, RemoteTier};

/// Default minimum spacing between two flushes.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(15);

/// Monotonic time source.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> Instant;
}

/// Wall clock backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Why a flush did not write anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The table was never loaded, so there is nothing to persist.
    NotInitialized,
    /// Nothing changed since the table was loaded or last flushed.
    Clean,
    /// The previous flush is too recent.
    Debounced { remaining: Duration },
}

/// Result of a flush attempt that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Both tiers were written.
    Flushed { rows: usize },
    /// Nothing was written.
    Skipped(SkipReason),
}

impl FlushOutcome {
    pub fn is_flushed(&self) -> bool {
        matches!(self, FlushOutcome::Flushed { .. })
    }
}

/// Debounce policy plus the clock it is evaluated against.
#[derive(Debug, Clone)]
pub struct FlushScheduler {
    interval: Duration,
    clock: Arc<dyn Clock>,
}

impl FlushScheduler {
    pub fn new(interval: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { interval, clock }
    }

    /// Scheduler using [`SystemClock`].
    pub fn with_system_clock(interval: Duration) -> Self {
        Self::new(interval, Arc::new(SystemClock))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Time left before another flush is allowed, or `None` if one may run now.
    ///
    /// A cache that has never flushed may always flush.
    pub fn remaining(&self, last_flush: Option<Instant>, now: Instant) -> Option<Duration> {
        let last = last_flush?;
        let elapsed = now.saturating_duration_since(last);
        if elapsed < self.interval {
            Some(self.interval - elapsed)
        } else {
            None
        }
    }
}

impl Default for FlushScheduler {
    fn default() -> Self {
        Self::with_system_clock(DEFAULT_FLUSH_INTERVAL)
    }
}

/// Run [`TieredCache::maybe_flush`] every `period` until `shutdown` flips to
/// `true` or its sender is dropped. Ticks on an unchanged table write nothing.
///
/// Flush errors are logged and the task keeps running; the next tick retries.
pub fn spawn_periodic_flush<L, R>(
    cache: Arc<TieredCache<L, R>>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    L: LocalTier + 'static,
    R: RemoteTier + 'static,
{
    // tokio::time::interval panics on a zero period
    let period = period.max(Duration::from_millis(10));

    tokio::spawn(async move {
        info!(period_ms = period.as_millis() as u64, "Periodic flush task started");

        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match cache.maybe_flush().await {
                        Ok(outcome) => debug!(?outcome, "Periodic flush tick"),
                        Err(e) => warn!(error = %e, "Periodic flush failed, will retry"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Periodic flush task stopped");
    })
}
