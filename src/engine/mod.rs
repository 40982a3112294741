// src/engine/mod.rs

//! Streaming engine for drawbot.
//!
//! - [`progress`]: pure ETA calculation and broadcast throttling.
//! - [`executor`]: the [`StreamingExecutor`] run state machine
//!   (start sinks, stream, stop sequence, finish sinks).
//! - [`worker`]: the single background [`JobWorker`] that runs at most one
//!   executor run at a time.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub mod executor;
pub mod progress;
pub mod worker;

pub use executor::{RunOptions, StreamingExecutor};
pub use progress::{estimate_remaining, ProgressPolicy, ProgressThrottle};
pub use worker::{Job, JobHandle, JobSettings, JobWorker, SinkFactory};

/// Cooperative cancellation flag shared between a caller and a run.
///
/// The executor polls it once per command boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// How a run ended, when it did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// Cancellation was observed before the command at `at`.
    Cancelled { at: usize },
}

/// A per-command sink failure that was absorbed by the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFailure {
    pub index: usize,
    pub sink: String,
    pub command: String,
    pub error: String,
}

/// Result of a run that got past sink start-up.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Acknowledgements of all sinks, concatenated in order.
    pub response: String,
    pub outcome: RunOutcome,
    /// Commands processed (comments included).
    pub done: usize,
    pub total: usize,
    pub failures: Vec<CommandFailure>,
}

impl RunReport {
    pub fn is_cancelled(&self) -> bool {
        matches!(self.outcome, RunOutcome::Cancelled { .. })
    }

    /// Completed with no absorbed failures.
    pub fn is_clean(&self) -> bool {
        self.outcome == RunOutcome::Completed && self.failures.is_empty()
    }
}
