// src/lib.rs

pub mod cli;
pub mod command;
pub mod config;
pub mod context;
pub mod engine;
pub mod errors;
pub mod listener;
pub mod logging;
pub mod sink;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::cli::{BotCommand, CliArgs};
use crate::command::{CommandKind, CommandSequence, SafetyOptions};
use crate::config::load_or_default;
use crate::context::DrawbotContext;
use crate::engine::{Job, RunReport};
use crate::listener::TracingListener;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (plus `--fake` / `--no-preview` overrides)
/// - the per-process context and its listeners
/// - the background job worker
/// - Ctrl-C handling (cooperative cancel of the running job)
pub async fn run(args: CliArgs) -> Result<()> {
    let mut cfg = load_or_default(&args.config)?;
    if args.fake {
        cfg.job.fake = true;
    }
    if args.no_preview {
        cfg.preview.enabled = false;
    }

    let job = job_from_command(&args.command);

    if args.dry_run {
        print_dry_run(&job, SafetyOptions::from_job(&cfg.job))?;
        return Ok(());
    }

    let mut ctx = DrawbotContext::new(cfg);
    ctx.add_listener(Arc::new(TracingListener));
    let ctx = Arc::new(ctx);

    let worker = ctx.spawn_worker();
    let handle = worker.submit(job)?;

    // Ctrl-C → cancel at the next command boundary.
    {
        let cancel = handle.cancel_handle();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            info!("Ctrl+C received; cancelling");
            cancel.cancel();
        });
    }

    let report = handle.wait().await?;
    print_report(&report);
    Ok(())
}

fn job_from_command(cmd: &BotCommand) -> Job {
    match cmd {
        BotCommand::Draw { file } => Job::DrawFile(file.clone()),
        BotCommand::PenUp => Job::PenUp,
        BotCommand::PenDown => Job::PenDown,
        BotCommand::Calibrate => Job::Calibrate,
        BotCommand::Home => Job::Home,
    }
}

fn print_dry_run(job: &Job, safety: SafetyOptions) -> Result<()> {
    println!("drawbot dry-run");
    match job {
        Job::DrawFile(path) => print_file_summary(path, safety)?,
        other => println!("  job: {other:?}"),
    }
    debug!("dry-run complete (nothing streamed)");
    Ok(())
}

fn print_file_summary(path: &Path, safety: SafetyOptions) -> Result<()> {
    let seq = CommandSequence::load(path, safety)?;
    println!("  file: {}", path.display());
    println!("  commands: {} (including injected safety commands)", seq.len());
    println!("    moves:     {}", seq.count_of(CommandKind::Move));
    println!("    pen up:    {}", seq.count_of(CommandKind::PenUp));
    println!("    pen down:  {}", seq.count_of(CommandKind::PenDown));
    println!("    comments:  {}", seq.count_of(CommandKind::Comment));
    println!("    other:     {}", seq.count_of(CommandKind::Other));
    Ok(())
}

fn print_report(report: &RunReport) {
    let status = if report.is_cancelled() {
        "cancelled"
    } else if report.failures.is_empty() {
        "completed"
    } else {
        "completed with errors"
    };
    println!("{status}: {}/{} commands", report.done, report.total);
    for f in &report.failures {
        println!("  [{}] {} '{}': {}", f.index, f.sink, f.command, f.error);
    }
}
