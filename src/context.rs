// src/context.rs

//! Per-process drawbot context.
//!
//! Built once at start-up from the loaded configuration and passed by
//! reference to whoever needs it: it owns the listeners and knows how to
//! build the sinks for a job.

use std::sync::Arc;
use std::time::Duration;

use crate::config::ConfigFile;
use crate::engine::{Job, JobSettings, JobWorker, ProgressPolicy, SinkFactory, StreamingExecutor};
use crate::errors::Result;
use crate::listener::{ListenerSet, StateListener};
use crate::sink::{HardwareSink, NullSink, OutputSink, RasterSink, SerialSettings};

#[derive(Debug, Clone)]
pub struct DrawbotContext {
    config: ConfigFile,
    listeners: ListenerSet,
}

impl DrawbotContext {
    pub fn new(config: ConfigFile) -> Self {
        Self {
            config,
            listeners: ListenerSet::new(),
        }
    }

    pub fn add_listener(&mut self, listener: Arc<dyn StateListener>) {
        self.listeners.add(listener);
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn listeners(&self) -> &ListenerSet {
        &self.listeners
    }

    pub fn executor(&self) -> StreamingExecutor {
        StreamingExecutor::new(self.listeners.clone())
            .with_policy(ProgressPolicy::from_job(&self.config.job))
    }

    pub fn job_settings(&self) -> JobSettings {
        JobSettings::from_config(&self.config)
    }

    /// Spawn the background worker for this context.
    pub fn spawn_worker(self: &Arc<Self>) -> JobWorker {
        JobWorker::spawn(
            self.executor(),
            Arc::clone(self) as Arc<dyn SinkFactory>,
            self.job_settings(),
        )
    }
}

impl SinkFactory for DrawbotContext {
    /// The bot (or its fake stand-in), plus the preview for file jobs.
    fn build(&self, job: &Job) -> Result<Vec<Box<dyn OutputSink>>> {
        let mut sinks: Vec<Box<dyn OutputSink>> = Vec::new();

        if self.config.job.fake {
            sinks.push(Box::new(NullSink::with_delay(Duration::from_millis(
                self.config.job.fake_delay_ms,
            ))));
        } else {
            sinks.push(Box::new(HardwareSink::new(SerialSettings::from(
                &self.config.serial,
            ))));
        }

        if job.is_file() && self.config.preview.enabled {
            sinks.push(Box::new(RasterSink::from_config(&self.config.preview)));
        }

        Ok(sinks)
    }
}
