// src/engine/executor.rs

//! The run state machine.
//!
//! One call to [`StreamingExecutor::run`] is one execution session:
//!
//! 1. `Starting`: `start_block` on every sink, in order. A failure here
//!    unwinds the sinks already started and is returned to the caller.
//! 2. `Running`: every command is fanned out to every sink. Sink failures
//!    are recorded and the run goes on; the cancel handle is polled between
//!    commands, and a cancelled run gets an immediate pen-up before leaving
//!    the loop.
//! 3. Stop sequence: pen-up to every started sink, progress cleared, ETA
//!    done, `Idle`. Runs on every exit path and never fails.
//! 4. `finish_block` on every started sink.

use std::path::Path;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::command::{Command, CommandSequence, SafetyOptions};
use crate::config::DeviceGeometry;
use crate::errors::{DrawbotError, Result};
use crate::listener::{Eta, ListenerSet, MachineState, ProgressSnapshot};
use crate::sink::OutputSink;

use super::progress::{estimate_remaining, ProgressPolicy, ProgressThrottle};
use super::{CancelHandle, CommandFailure, RunOutcome, RunReport};

/// Per-run knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Send a pen-up in the stop sequence after a normal completion.
    ///
    /// Cancelled runs always raise the pen. Only a manual pen-down job turns
    /// this off.
    pub raise_pen_on_completion: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            raise_pen_on_completion: true,
        }
    }
}

/// Streams command sequences to sinks and reports to listeners.
#[derive(Debug, Clone, Default)]
pub struct StreamingExecutor {
    listeners: ListenerSet,
    policy: ProgressPolicy,
}

/// Transient state of one run.
struct ExecutionSession {
    total: usize,
    done: usize,
    started_at: Instant,
    throttle: ProgressThrottle,
    response: String,
    failures: Vec<CommandFailure>,
    outcome: RunOutcome,
}

impl ExecutionSession {
    fn new(total: usize, policy: ProgressPolicy) -> Self {
        let started_at = Instant::now();
        Self {
            total,
            done: 0,
            started_at,
            throttle: ProgressThrottle::new(policy, started_at),
            response: String::new(),
            failures: Vec::new(),
            outcome: RunOutcome::Completed,
        }
    }

    fn into_report(self) -> RunReport {
        RunReport {
            response: self.response,
            outcome: self.outcome,
            done: self.done,
            total: self.total,
            failures: self.failures,
        }
    }
}

impl StreamingExecutor {
    pub fn new(listeners: ListenerSet) -> Self {
        Self {
            listeners,
            policy: ProgressPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ProgressPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn listeners(&self) -> &ListenerSet {
        &self.listeners
    }

    /// Stream `commands` to `sinks` with the default options.
    pub fn run(
        &self,
        commands: &CommandSequence,
        sinks: &mut [Box<dyn OutputSink>],
        cancel: &CancelHandle,
    ) -> Result<RunReport> {
        self.run_with(commands, sinks, cancel, RunOptions::default())
    }

    /// Stream `commands` to `sinks`.
    ///
    /// Only a `start_block` failure is returned as an error; by then the
    /// sinks that did start have been stopped and finished.
    pub fn run_with(
        &self,
        commands: &CommandSequence,
        sinks: &mut [Box<dyn OutputSink>],
        cancel: &CancelHandle,
        options: RunOptions,
    ) -> Result<RunReport> {
        self.listeners.state(MachineState::Starting);

        if let Err((started, err)) = self.start_sinks(sinks) {
            error!(error = %err, started, "sink start-up failed; aborting run");
            let started_sinks = &mut sinks[..started];
            self.stop_sequence(started_sinks, true);
            self.finish_sinks(started_sinks);
            return Err(err);
        }

        let mut session = ExecutionSession::new(commands.len(), self.policy);
        self.stream(commands, sinks, cancel, &mut session);

        let raise = options.raise_pen_on_completion || session.outcome != RunOutcome::Completed;
        self.stop_sequence(sinks, raise);
        self.finish_sinks(sinks);

        let report = session.into_report();
        info!(
            done = report.done,
            total = report.total,
            failures = report.failures.len(),
            cancelled = report.is_cancelled(),
            "run finished"
        );
        Ok(report)
    }

    /// Load a command file and run it, with the per-file sink hooks around
    /// the run.
    pub fn draw_file(
        &self,
        path: &Path,
        geometry: &DeviceGeometry,
        safety: SafetyOptions,
        sinks: &mut [Box<dyn OutputSink>],
        cancel: &CancelHandle,
    ) -> Result<RunReport> {
        info!(file = %path.display(), "draw_file");
        let commands = CommandSequence::load(path, safety)?;

        for sink in sinks.iter_mut() {
            if let Err(err) = sink.start_file(path, geometry) {
                warn!(sink = sink.name(), error = %err, "start_file failed");
            }
        }
        for url in sinks.iter().filter_map(|s| s.target_image()) {
            self.listeners.target_image(Some(&url));
        }

        let result = self.run(&commands, sinks, cancel);
        let success = matches!(&result, Ok(report) if report.outcome == RunOutcome::Completed);

        for sink in sinks.iter_mut() {
            if let Err(err) = sink.end_file(path, success) {
                warn!(sink = sink.name(), error = %err, "end_file failed");
            }
        }

        info!(file = %path.display(), success, "finished draw_file");
        result
    }

    /// Start sinks in order. On failure, returns how many had started.
    fn start_sinks(
        &self,
        sinks: &mut [Box<dyn OutputSink>],
    ) -> std::result::Result<(), (usize, DrawbotError)> {
        for (idx, sink) in sinks.iter_mut().enumerate() {
            debug!(sink = sink.name(), "start_block");
            sink.start_block().map_err(|err| (idx, err))?;
        }
        Ok(())
    }

    fn stream(
        &self,
        commands: &CommandSequence,
        sinks: &mut [Box<dyn OutputSink>],
        cancel: &CancelHandle,
        session: &mut ExecutionSession,
    ) {
        self.listeners.state(MachineState::Running);

        if session.total == 0 {
            self.listeners.progress(ProgressSnapshot::new(0, 0));
            return;
        }

        self.listeners.progress(ProgressSnapshot::new(0, session.total));
        self.listeners.eta(Eta::Unknown);

        for (index, command) in commands.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(index, "cancel requested; stopping execution and raising pen");
                session.outcome = RunOutcome::Cancelled { at: index };
                self.raise_pen(sinks, "pen-up on cancel failed");
                break;
            }

            if command.is_comment() {
                debug!(index, line = %command, "skipping comment");
            } else {
                self.fan_out(index, command, sinks, session);
            }

            session.done = index + 1;
            self.report_progress(session);
        }
    }

    fn fan_out(
        &self,
        index: usize,
        command: &Command,
        sinks: &mut [Box<dyn OutputSink>],
        session: &mut ExecutionSession,
    ) {
        for sink in sinks.iter_mut() {
            match sink.write_command(command) {
                Ok(ack) => session.response.push_str(&ack),
                Err(err) => {
                    warn!(index, sink = sink.name(), command = %command, error = %err, "command failed");
                    session.failures.push(CommandFailure {
                        index,
                        sink: sink.name().to_string(),
                        command: command.text().to_string(),
                        error: err.to_string(),
                    });
                }
            }
        }
    }

    fn report_progress(&self, session: &mut ExecutionSession) {
        let fraction = session.done as f64 / session.total as f64;
        let now = Instant::now();
        if session
            .throttle
            .should_broadcast(now, fraction, session.done, session.total)
        {
            self.listeners
                .progress(ProgressSnapshot::new(session.done, session.total));
            self.listeners.eta(estimate_remaining(
                now.saturating_duration_since(session.started_at),
                fraction,
            ));
        }
    }

    /// Pen-up, cleared progress, ETA done, idle. Never fails.
    fn stop_sequence(&self, sinks: &mut [Box<dyn OutputSink>], raise_pen: bool) {
        self.listeners.state(MachineState::Stopping);

        if raise_pen {
            self.raise_pen(sinks, "pen-up in stop sequence failed");
        }

        self.listeners.progress(ProgressSnapshot::CLEARED);
        self.listeners.eta(Eta::Done);
        self.listeners.state(MachineState::Idle);
    }

    /// Best-effort pen-up to every sink; failures are only logged.
    fn raise_pen(&self, sinks: &mut [Box<dyn OutputSink>], on_failure: &'static str) {
        let pen_up = Command::pen_up();
        for sink in sinks.iter_mut() {
            if let Err(err) = sink.write_command(&pen_up) {
                warn!(sink = sink.name(), error = %err, "{on_failure}");
            }
        }
    }

    fn finish_sinks(&self, sinks: &mut [Box<dyn OutputSink>]) {
        for sink in sinks.iter_mut() {
            debug!(sink = sink.name(), "finish_block");
            if let Err(err) = sink.finish_block() {
                warn!(sink = sink.name(), error = %err, "finish_block failed");
            }
        }
    }
}
