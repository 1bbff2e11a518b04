//! Primary availability tracking
//!
//! The manager's best-effort belief about whether Primary is reachable.
//! Advisory only: a wrong `Available` costs one failed Primary call, never
//! data, because Secondary is always written first.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Tri-state belief about Primary reachability
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    /// No Primary call has completed yet
    #[default]
    Unknown,
    /// Last Primary call succeeded
    Available,
    /// Last Primary call (or drain) failed
    Unavailable,
}

#[derive(Debug)]
struct AvailabilityState {
    state: Availability,
    /// When the state last switched to `Unavailable`, or the last retry
    unavailable_since: Option<Instant>,
    /// When the last recovery drain ran
    last_drain_at: Option<Instant>,
}

/// Availability flag plus the timestamps that rate-limit retries and drains
///
/// Guarded by its own lock, separate from the sync queue.
#[derive(Debug)]
pub struct AvailabilityTracker {
    inner: Mutex<AvailabilityState>,
    retry_interval: Duration,
}

impl AvailabilityTracker {
    /// Create a tracker in the `Unknown` state
    pub fn new(retry_interval: Duration) -> Self {
        Self {
            inner: Mutex::new(AvailabilityState {
                state: Availability::Unknown,
                unavailable_since: None,
                last_drain_at: None,
            }),
            retry_interval,
        }
    }

    /// Current state
    pub fn get(&self) -> Availability {
        self.inner.lock().state
    }

    /// Configured retry and drain spacing
    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    /// Record a successful Primary call
    pub fn mark_available(&self) {
        let previous = {
            let mut inner = self.inner.lock();
            let previous = inner.state;
            inner.state = Availability::Available;
            inner.unavailable_since = None;
            previous
        };

        if previous == Availability::Unavailable {
            info!("Primary store reachable again");
        }
    }

    /// Record a failed Primary call
    pub fn mark_unavailable(&self) {
        let previous = {
            let mut inner = self.inner.lock();
            let previous = inner.state;
            inner.state = Availability::Unavailable;
            inner.unavailable_since = Some(Instant::now());
            previous
        };

        if previous != Availability::Unavailable {
            warn!("Primary store marked unavailable, serving from Secondary");
        }
    }

    /// Whether a Primary call should be attempted now
    ///
    /// Always true unless `Unavailable`. While `Unavailable`, one caller per
    /// `retry_interval` is let through as a retry; the retry restarts the
    /// interval so concurrent callers do not all hit a down backend.
    pub fn should_attempt(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state != Availability::Unavailable {
            return true;
        }

        let due = inner
            .unavailable_since
            .is_none_or(|since| since.elapsed() >= self.retry_interval);
        if due {
            inner.unavailable_since = Some(Instant::now());
        }
        due
    }

    /// Claim the opportunistic drain slot if `retry_interval` has passed
    ///
    /// Returns `true` for at most one caller per interval.
    pub fn try_begin_drain(&self) -> bool {
        let mut inner = self.inner.lock();
        let due = inner
            .last_drain_at
            .is_none_or(|last| last.elapsed() >= self.retry_interval);
        if due {
            inner.last_drain_at = Some(Instant::now());
        }
        due
    }

    /// Stamp a drain that bypassed the rate limiter
    pub fn note_drain(&self) {
        self.inner.lock().last_drain_at = Some(Instant::now());
    }

    /// Time since the last recovery drain
    pub fn last_drain_age(&self) -> Option<Duration> {
        self.inner.lock().last_drain_at.map(|at| at.elapsed())
    }
}
