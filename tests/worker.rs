use std::sync::{Arc, Mutex};
use std::time::Duration;

use drawbot::context::DrawbotContext;
use drawbot::engine::worker::run_job;
use drawbot::engine::{CancelHandle, Job, JobSettings, SinkFactory, StreamingExecutor};
use drawbot::errors::{DrawbotError, Result};
use drawbot::sink::OutputSink;
use drawbot_test_utils::builders::ConfigFileBuilder;
use drawbot_test_utils::recording::{writes, RecordingSink, SinkLog};
use drawbot_test_utils::{init_tracing, with_timeout};

/// Hands out recording sinks that all share one log.
struct RecordingFactory {
    log: SinkLog,
}

impl RecordingFactory {
    fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl SinkFactory for RecordingFactory {
    fn build(&self, _job: &Job) -> Result<Vec<Box<dyn OutputSink>>> {
        Ok(vec![RecordingSink::with_log("bot", Arc::clone(&self.log)).boxed()])
    }
}

fn manual_writes(job: Job) -> Vec<String> {
    let factory = RecordingFactory::new();
    let settings = JobSettings::from_config(&ConfigFileBuilder::new().build());
    run_job(
        &StreamingExecutor::default(),
        &factory,
        &settings,
        &job,
        &CancelHandle::new(),
    )
    .unwrap();
    writes(&factory.log)
}

#[test]
fn manual_jobs_send_one_command_plus_safety_pen_up() {
    assert_eq!(manual_writes(Job::PenUp), vec!["d0", "d0"]);
    assert_eq!(manual_writes(Job::Calibrate), vec!["c", "d0"]);
    assert_eq!(manual_writes(Job::Home), vec!["g380,250", "d0"]);
}

#[test]
fn manual_pen_down_leaves_the_pen_down() {
    assert_eq!(manual_writes(Job::PenDown), vec!["d1"]);
}

fn fake_context(delay_ms: u64) -> Arc<DrawbotContext> {
    let cfg = ConfigFileBuilder::new().fake(delay_ms).no_preview().build();
    Arc::new(DrawbotContext::new(cfg))
}

#[tokio::test]
async fn second_submission_is_rejected_while_busy() {
    init_tracing();
    let worker = fake_context(150).spawn_worker();

    let first = worker.submit(Job::Home).unwrap();
    assert!(worker.is_busy());
    assert!(matches!(worker.submit(Job::PenUp), Err(DrawbotError::Busy)));

    let report = with_timeout(first.wait()).await.unwrap();
    assert!(report.is_clean());
    assert!(!worker.is_busy());

    let again = worker.submit(Job::PenUp).unwrap();
    assert!(with_timeout(again.wait()).await.unwrap().is_clean());
}

#[tokio::test]
async fn cancelling_a_file_job_stops_it_early() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("long.txt");
    let body: String = (0..200).map(|i| format!("g{i},{i}\n")).collect();
    std::fs::write(&file, body).unwrap();

    let worker = fake_context(10).spawn_worker();
    let handle = worker.submit(Job::DrawFile(file)).unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.cancel();

    let report = with_timeout(handle.wait()).await.unwrap();
    assert!(report.is_cancelled());
    assert!(report.done < report.total);
    assert!(!worker.is_busy());
}

#[tokio::test]
async fn failed_start_is_reported_and_frees_the_worker() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let lock = dir.path().join("bot.lock");
    let _held = drawbot::sink::ExclusiveAccessGuard::acquire(&lock).unwrap();

    let cfg = ConfigFileBuilder::new().lock_path(&lock).no_preview().build();
    let worker = Arc::new(DrawbotContext::new(cfg)).spawn_worker();

    let handle = worker.submit(Job::PenUp).unwrap();
    let result = with_timeout(handle.wait()).await;
    assert!(matches!(result, Err(DrawbotError::ResourceBusy { .. })));
    assert!(!worker.is_busy());
}
