// src/engine/progress.rs

//! Completion estimates and broadcast throttling.
//!
//! Everything here is pure: callers pass in the clock readings.

use std::time::{Duration, Instant};

use crate::config::JobSection;
use crate::listener::Eta;

/// Estimate the time left from the time spent so far.
///
/// `remaining = elapsed * (1 - fraction) / fraction`, `Unknown` at zero.
pub fn estimate_remaining(elapsed: Duration, fraction: f64) -> Eta {
    if !fraction.is_finite() || fraction <= 0.0 {
        return Eta::Unknown;
    }
    if fraction >= 1.0 {
        return Eta::Remaining(Duration::ZERO);
    }
    Eta::Remaining(elapsed.mul_f64((1.0 - fraction) / fraction))
}

/// When to re-broadcast progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressPolicy {
    /// Fraction (0..1) the progress must move by, strictly.
    pub min_fraction_step: f64,
    /// Longest quiet period, strictly.
    pub max_silence: Duration,
}

impl ProgressPolicy {
    pub fn from_job(job: &JobSection) -> Self {
        Self {
            min_fraction_step: job.min_progress_step,
            max_silence: Duration::from_secs(job.max_broadcast_silence_secs),
        }
    }
}

impl Default for ProgressPolicy {
    fn default() -> Self {
        Self {
            min_fraction_step: 0.01,
            max_silence: Duration::from_secs(30),
        }
    }
}

/// Remembers the last broadcast and decides whether the next one is due.
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    policy: ProgressPolicy,
    last_fraction: f64,
    last_at: Instant,
}

impl ProgressThrottle {
    /// `now` counts as the time of the initial (0%) broadcast.
    pub fn new(policy: ProgressPolicy, now: Instant) -> Self {
        Self {
            policy,
            last_fraction: 0.0,
            last_at: now,
        }
    }

    /// True when the fraction moved by more than the step, the silence
    /// limit passed, or the run just completed. Records the broadcast when
    /// returning true.
    pub fn should_broadcast(&mut self, now: Instant, fraction: f64, done: usize, total: usize) -> bool {
        let moved = (fraction - self.last_fraction) > self.policy.min_fraction_step;
        let quiet_too_long = now.saturating_duration_since(self.last_at) > self.policy.max_silence;
        let finished = done == total;

        if moved || quiet_too_long || finished {
            self.last_fraction = fraction;
            self.last_at = now;
            true
        } else {
            false
        }
    }
}
