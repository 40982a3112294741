use std::path::Path;
use std::sync::{Arc, Mutex};

use drawbot::command::Command;
use drawbot::config::DeviceGeometry;
use drawbot::engine::CancelHandle;
use drawbot::errors::{DrawbotError, Result};
use drawbot::listener::{Eta, MachineState, ProgressSnapshot, StateListener};
use drawbot::sink::OutputSink;

/// One call observed by a [`RecordingListener`].
#[derive(Debug, Clone, PartialEq)]
pub enum ListenerEvent {
    State(MachineState),
    Progress(ProgressSnapshot),
    Eta(Eta),
    TargetImage(Option<String>),
}

/// Listener that records every call in order.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<ListenerEvent>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<ListenerEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn states(&self) -> Vec<MachineState> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ListenerEvent::State(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn progress(&self) -> Vec<ProgressSnapshot> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ListenerEvent::Progress(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn etas(&self) -> Vec<Eta> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ListenerEvent::Eta(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    fn push(&self, e: ListenerEvent) {
        self.events.lock().unwrap().push(e);
    }
}

impl StateListener for RecordingListener {
    fn set_state(&self, state: MachineState) -> anyhow::Result<()> {
        self.push(ListenerEvent::State(state));
        Ok(())
    }

    fn set_progress(&self, progress: ProgressSnapshot) -> anyhow::Result<()> {
        self.push(ListenerEvent::Progress(progress));
        Ok(())
    }

    fn set_estimated_time_left(&self, eta: Eta) -> anyhow::Result<()> {
        self.push(ListenerEvent::Eta(eta));
        Ok(())
    }

    fn set_target_image(&self, url: Option<&str>) -> anyhow::Result<()> {
        self.push(ListenerEvent::TargetImage(url.map(str::to_string)));
        Ok(())
    }
}

/// Listener that fails every call.
#[derive(Debug, Default)]
pub struct FailingListener;

impl StateListener for FailingListener {
    fn set_state(&self, _: MachineState) -> anyhow::Result<()> {
        anyhow::bail!("listener offline")
    }

    fn set_progress(&self, _: ProgressSnapshot) -> anyhow::Result<()> {
        anyhow::bail!("listener offline")
    }

    fn set_estimated_time_left(&self, _: Eta) -> anyhow::Result<()> {
        anyhow::bail!("listener offline")
    }

    fn set_target_image(&self, _: Option<&str>) -> anyhow::Result<()> {
        anyhow::bail!("listener offline")
    }
}

/// One call observed by a [`RecordingSink`].
#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    StartFile,
    StartBlock,
    Write(String),
    FinishBlock,
    EndFile(bool),
}

pub type SinkLog = Arc<Mutex<Vec<SinkCall>>>;

/// Sink that records calls and can be told to fail.
pub struct RecordingSink {
    name: String,
    log: SinkLog,
    fail_start: bool,
    fail_on: Option<String>,
    cancel_after: Option<(usize, CancelHandle)>,
    writes: usize,
}

impl RecordingSink {
    pub fn new(name: &str) -> Self {
        Self::with_log(name, Arc::new(Mutex::new(Vec::new())))
    }

    /// Record into an existing log (e.g. one shared across runs).
    pub fn with_log(name: &str, log: SinkLog) -> Self {
        Self {
            name: name.to_string(),
            log,
            fail_start: false,
            fail_on: None,
            cancel_after: None,
            writes: 0,
        }
    }

    /// `start_block` fails.
    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// `write_command` fails for this exact command text.
    pub fn failing_on(mut self, text: &str) -> Self {
        self.fail_on = Some(text.to_string());
        self
    }

    /// Signal `cancel` once `n` commands have been written.
    pub fn cancel_after(mut self, n: usize, cancel: CancelHandle) -> Self {
        self.cancel_after = Some((n, cancel));
        self
    }

    pub fn log(&self) -> SinkLog {
        Arc::clone(&self.log)
    }

    pub fn boxed(self) -> Box<dyn OutputSink> {
        Box::new(self)
    }

    fn record(&self, call: SinkCall) {
        self.log.lock().unwrap().push(call);
    }
}

impl OutputSink for RecordingSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn start_file(&mut self, _path: &Path, _geometry: &DeviceGeometry) -> Result<()> {
        self.record(SinkCall::StartFile);
        Ok(())
    }

    fn start_block(&mut self) -> Result<()> {
        self.record(SinkCall::StartBlock);
        if self.fail_start {
            return Err(DrawbotError::SinkIo(format!("{} refused to start", self.name)));
        }
        Ok(())
    }

    fn write_command(&mut self, command: &Command) -> Result<String> {
        self.record(SinkCall::Write(command.text().to_string()));
        self.writes += 1;
        if let Some((n, cancel)) = &self.cancel_after {
            if self.writes >= *n {
                cancel.cancel();
            }
        }
        if self.fail_on.as_deref() == Some(command.text()) {
            return Err(DrawbotError::SinkIo(format!("{} choked on {}", self.name, command)));
        }
        Ok(format!("{}:{}\n", self.name, command))
    }

    fn finish_block(&mut self) -> Result<()> {
        self.record(SinkCall::FinishBlock);
        Ok(())
    }

    fn end_file(&mut self, _path: &Path, success: bool) -> Result<()> {
        self.record(SinkCall::EndFile(success));
        Ok(())
    }
}

/// Commands written to a recording sink, in order.
pub fn writes(log: &SinkLog) -> Vec<String> {
    log.lock()
        .unwrap()
        .iter()
        .filter_map(|c| match c {
            SinkCall::Write(t) => Some(t.clone()),
            _ => None,
        })
        .collect()
}

/// Number of times `call` appears in the log.
pub fn count(log: &SinkLog, call: &SinkCall) -> usize {
    log.lock().unwrap().iter().filter(|c| *c == call).count()
}
