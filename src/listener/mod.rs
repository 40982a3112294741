// src/listener/mod.rs

//! State listeners: external observers of a run.
//!
//! The executor only ever talks to a [`ListenerSet`]. Each broadcast walks the
//! registered listeners in order; a failing listener is logged and skipped so
//! one bad observer cannot starve the others or abort a run.

pub mod tracing_listener;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::warn;

pub use tracing_listener::TracingListener;

/// Coarse machine state reported to listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineState {
    Idle,
    Starting,
    Running,
    Stopping,
}

impl MachineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MachineState::Idle => "idle",
            MachineState::Starting => "starting",
            MachineState::Running => "running",
            MachineState::Stopping => "stopping",
        }
    }
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress of a run. `percent` is in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub percent: f64,
    pub done: usize,
    pub total: usize,
}

impl ProgressSnapshot {
    /// The cleared snapshot sent at the end of every run.
    pub const CLEARED: ProgressSnapshot = ProgressSnapshot {
        percent: 0.0,
        done: 0,
        total: 0,
    };

    pub fn new(done: usize, total: usize) -> Self {
        let percent = if total == 0 {
            100.0
        } else {
            done as f64 * 100.0 / total as f64
        };
        Self {
            percent,
            done,
            total,
        }
    }
}

/// Estimated time left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Eta {
    /// Nothing done yet, so no rate to extrapolate from.
    Unknown,
    Remaining(Duration),
    /// No run in progress.
    Done,
}

/// Observer of state, progress, ETA and preview location.
pub trait StateListener: Send + Sync {
    fn set_state(&self, state: MachineState) -> Result<()>;

    fn set_progress(&self, progress: ProgressSnapshot) -> Result<()>;

    fn set_estimated_time_left(&self, eta: Eta) -> Result<()>;

    fn set_target_image(&self, url: Option<&str>) -> Result<()>;
}

/// Ordered collection of listeners with failure-isolating broadcast.
#[derive(Clone, Default)]
pub struct ListenerSet {
    listeners: Vec<Arc<dyn StateListener>>,
}

impl fmt::Debug for ListenerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSet")
            .field("len", &self.listeners.len())
            .finish()
    }
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, listener: Arc<dyn StateListener>) {
        self.listeners.push(listener);
    }

    pub fn with(mut self, listener: Arc<dyn StateListener>) -> Self {
        self.add(listener);
        self
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn state(&self, state: MachineState) {
        self.broadcast("set_state", |l| l.set_state(state));
    }

    pub fn progress(&self, progress: ProgressSnapshot) {
        self.broadcast("set_progress", |l| l.set_progress(progress));
    }

    pub fn eta(&self, eta: Eta) {
        self.broadcast("set_estimated_time_left", |l| {
            l.set_estimated_time_left(eta)
        });
    }

    pub fn target_image(&self, url: Option<&str>) {
        self.broadcast("set_target_image", |l| l.set_target_image(url));
    }

    /// Call `f` on every listener, returning how many failed.
    fn broadcast<F>(&self, what: &'static str, f: F) -> usize
    where
        F: Fn(&dyn StateListener) -> Result<()>,
    {
        let mut failures = 0;
        for (idx, listener) in self.listeners.iter().enumerate() {
            if let Err(err) = f(listener.as_ref()) {
                failures += 1;
                warn!(listener = idx, call = what, error = %err, "state listener failed");
            }
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Broken;

    impl StateListener for Broken {
        fn set_state(&self, _: MachineState) -> Result<()> {
            anyhow::bail!("mqtt down")
        }
        fn set_progress(&self, _: ProgressSnapshot) -> Result<()> {
            anyhow::bail!("mqtt down")
        }
        fn set_estimated_time_left(&self, _: Eta) -> Result<()> {
            anyhow::bail!("mqtt down")
        }
        fn set_target_image(&self, _: Option<&str>) -> Result<()> {
            anyhow::bail!("mqtt down")
        }
    }

    #[derive(Default)]
    struct States(Mutex<Vec<MachineState>>);

    impl StateListener for States {
        fn set_state(&self, s: MachineState) -> Result<()> {
            self.0.lock().unwrap().push(s);
            Ok(())
        }
        fn set_progress(&self, _: ProgressSnapshot) -> Result<()> {
            Ok(())
        }
        fn set_estimated_time_left(&self, _: Eta) -> Result<()> {
            Ok(())
        }
        fn set_target_image(&self, _: Option<&str>) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failing_listener_does_not_stop_fan_out() {
        let states = Arc::new(States::default());
        let set = ListenerSet::new()
            .with(Arc::new(Broken))
            .with(states.clone());

        assert_eq!(set.broadcast("set_state", |l| l.set_state(MachineState::Idle)), 1);
        set.state(MachineState::Running);

        assert_eq!(
            *states.0.lock().unwrap(),
            vec![MachineState::Idle, MachineState::Running]
        );
    }

    #[test]
    fn empty_sequence_snapshot_is_complete() {
        let s = ProgressSnapshot::new(0, 0);
        assert_eq!(s.percent, 100.0);
        assert_eq!(ProgressSnapshot::new(1, 4).percent, 25.0);
    }
}
