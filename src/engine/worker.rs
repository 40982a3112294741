// src/engine/worker.rs

//! Single background worker.
//!
//! Jobs are sent over an mpsc channel to one Tokio task, which runs each of
//! them on the blocking pool (serial I/O blocks) and answers through a
//! oneshot. There is never more than one job in flight: `submit` refuses new
//! work with [`DrawbotError::Busy`] until the current job has finished.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::command::{Command, CommandSequence, SafetyOptions};
use crate::config::{ConfigFile, DeviceGeometry};
use crate::errors::{DrawbotError, Result};
use crate::sink::OutputSink;

use super::executor::{RunOptions, StreamingExecutor};
use super::{CancelHandle, RunReport};

/// Something the bot can be asked to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Job {
    DrawFile(PathBuf),
    PenUp,
    PenDown,
    Calibrate,
    Home,
}

impl Job {
    pub fn is_file(&self) -> bool {
        matches!(self, Job::DrawFile(_))
    }

    /// The one-command sequence of a manual job. `None` for file jobs.
    pub fn manual_commands(&self, settings: &JobSettings) -> Option<CommandSequence> {
        let command = match self {
            Job::DrawFile(_) => return None,
            Job::PenUp => Command::pen_up(),
            Job::PenDown => Command::pen_down(),
            Job::Calibrate => Command::calibrate(),
            Job::Home => Command::move_to(settings.home.0, settings.home.1),
        };
        Some(CommandSequence::single(command))
    }
}

/// Job-independent inputs to every run.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSettings {
    pub geometry: DeviceGeometry,
    pub safety: SafetyOptions,
    pub home: (f64, f64),
}

impl JobSettings {
    pub fn from_config(cfg: &ConfigFile) -> Self {
        Self {
            geometry: cfg.geometry,
            safety: SafetyOptions::from_job(&cfg.job),
            home: (cfg.job.home[0], cfg.job.home[1]),
        }
    }
}

/// Builds the sinks for a job. Sinks are never shared between runs.
pub trait SinkFactory: Send + Sync {
    fn build(&self, job: &Job) -> Result<Vec<Box<dyn OutputSink>>>;
}

/// Run one job to completion on the current thread.
pub fn run_job(
    executor: &StreamingExecutor,
    factory: &dyn SinkFactory,
    settings: &JobSettings,
    job: &Job,
    cancel: &CancelHandle,
) -> Result<RunReport> {
    let mut sinks = factory.build(job)?;
    match job {
        Job::DrawFile(path) => {
            executor.draw_file(path, &settings.geometry, settings.safety, &mut sinks, cancel)
        }
        manual => {
            let commands = manual.manual_commands(settings).unwrap_or_default();
            let options = RunOptions {
                raise_pen_on_completion: *manual != Job::PenDown,
            };
            executor.run_with(&commands, &mut sinks, cancel, options)
        }
    }
}

struct Submission {
    job: Job,
    cancel: CancelHandle,
    reply: oneshot::Sender<Result<RunReport>>,
}

/// Handle to a submitted job.
#[derive(Debug)]
pub struct JobHandle {
    cancel: CancelHandle,
    result: oneshot::Receiver<Result<RunReport>>,
}

impl JobHandle {
    /// Ask the run to stop at the next command boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Wait for the job's result.
    pub async fn wait(self) -> Result<RunReport> {
        self.result.await.map_err(|_| {
            DrawbotError::Other(anyhow::anyhow!("job worker dropped the job without a result"))
        })?
    }
}

/// The background worker.
#[derive(Debug, Clone)]
pub struct JobWorker {
    tx: mpsc::Sender<Submission>,
    busy: Arc<AtomicBool>,
}

impl JobWorker {
    /// Spawn the worker loop on the current Tokio runtime.
    pub fn spawn(
        executor: StreamingExecutor,
        factory: Arc<dyn SinkFactory>,
        settings: JobSettings,
    ) -> Self {
        let (tx, mut rx) = mpsc::channel::<Submission>(1);
        let busy = Arc::new(AtomicBool::new(false));
        let loop_busy = Arc::clone(&busy);

        tokio::spawn(async move {
            info!("job worker started");

            while let Some(Submission { job, cancel, reply }) = rx.recv().await {
                debug!(?job, "running job");
                let executor = executor.clone();
                let factory = Arc::clone(&factory);
                let settings = settings.clone();

                let result = tokio::task::spawn_blocking(move || {
                    run_job(&executor, factory.as_ref(), &settings, &job, &cancel)
                })
                .await
                .unwrap_or_else(|e| {
                    Err(DrawbotError::Other(anyhow::anyhow!("job panicked: {e}")))
                });

                loop_busy.store(false, Ordering::SeqCst);
                if reply.send(result).is_err() {
                    debug!("job result dropped; submitter went away");
                }
            }

            info!("job worker finished (channel closed)");
        });

        Self { tx, busy }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Start `job`, or fail with [`DrawbotError::Busy`] if one is running.
    pub fn submit(&self, job: Job) -> Result<JobHandle> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!(?job, "rejecting job; another one is running");
            return Err(DrawbotError::Busy);
        }

        let cancel = CancelHandle::new();
        let (reply, result) = oneshot::channel();
        let submission = Submission {
            job,
            cancel: cancel.clone(),
            reply,
        };

        if self.tx.try_send(submission).is_err() {
            self.busy.store(false, Ordering::SeqCst);
            return Err(DrawbotError::Other(anyhow::anyhow!("job worker is not running")));
        }

        Ok(JobHandle { cancel, result })
    }
}
