use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use image::Rgb;

use drawbot::command::{Command, CommandSequence, SafetyOptions};
use drawbot::engine::{CancelHandle, StreamingExecutor};
use drawbot::listener::{Eta, ListenerSet, MachineState, ProgressSnapshot};
use drawbot::sink::{OutputSink, RasterSink, RasterStyle};
use drawbot_test_utils::builders::flat_geometry;
use drawbot_test_utils::init_tracing;
use drawbot_test_utils::recording::{
    writes, ListenerEvent, RecordingListener, RecordingSink, SinkCall,
};

type TestResult = Result<(), Box<dyn Error>>;

const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

const SCENARIO: &str = "d0\ng10,10\nd1\ng20,10\nd0\n";

fn eager_style() -> RasterStyle {
    RasterStyle {
        flush_interval: 1,
        ..RasterStyle::default()
    }
}

fn no_tail() -> SafetyOptions {
    SafetyOptions {
        pen_up_at_end: false,
        home: None,
    }
}

#[test]
fn scenario_draws_one_segment_and_lifts_the_pen() -> TestResult {
    let dir = tempfile::tempdir()?;
    let mut sink = RasterSink::new(dir.path().join("preview.png"), eager_style());

    sink.start_file(Path::new("scenario"), &flat_geometry(30.0, 20.0))?;
    sink.start_block()?;
    for line in SCENARIO.lines() {
        assert_eq!(sink.write_command(&Command::parse(line))?, "");
    }
    sink.finish_block()?;

    assert_eq!(sink.segments_drawn(), 1);
    assert!(!sink.pen_is_down());
    Ok(())
}

#[test]
fn scenario_file_renders_exactly_the_pen_down_segment() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let job = dir.path().join("scenario.txt");
    std::fs::write(&job, SCENARIO)?;
    let out = dir.path().join("preview.png");

    let mut sinks: Vec<Box<dyn OutputSink>> = vec![Box::new(RasterSink::new(&out, eager_style()))];
    let report = StreamingExecutor::default().draw_file(
        &job,
        &flat_geometry(30.0, 20.0),
        no_tail(),
        &mut sinks,
        &CancelHandle::new(),
    )?;
    assert!(report.is_clean());

    let img = image::open(&out)?.to_rgb8();
    assert_eq!(img.dimensions(), (30, 20));
    for (x, y, px) in img.enumerate_pixels() {
        let expected = if y == 10 && (10..=20).contains(&x) {
            BLACK
        } else {
            WHITE
        };
        assert_eq!(*px, expected, "pixel ({x}, {y})");
    }
    Ok(())
}

#[test]
fn readers_never_see_a_partial_preview() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let out = dir.path().join("preview.png");
    let mut sink = RasterSink::new(&out, eager_style());
    sink.start_file(Path::new("zigzag"), &flat_geometry(64.0, 64.0))?;
    sink.write_command(&Command::pen_down())?;

    let stop = Arc::new(AtomicBool::new(false));
    let reader = {
        let stop = Arc::clone(&stop);
        let out = out.clone();
        thread::spawn(move || {
            let mut reads = 0usize;
            loop {
                let img = image::open(&out).expect("preview must always decode");
                assert_eq!((img.width(), img.height()), (64, 64));
                reads += 1;
                if stop.load(Ordering::SeqCst) {
                    return reads;
                }
            }
        })
    };

    for i in 0..200u32 {
        let (x, y) = (i % 64, (i * 7) % 64);
        sink.write_command(&Command::move_to(f64::from(x), f64::from(y)))?;
    }
    sink.end_file(Path::new("zigzag"), true)?;

    stop.store(true, Ordering::SeqCst);
    let reads = reader.join().expect("reader thread panicked");
    assert!(reads > 0);
    assert_eq!(sink.segments_drawn(), 200);
    Ok(())
}

#[test]
fn draw_file_announces_preview_and_wraps_the_run() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let job = dir.path().join("scenario.txt");
    std::fs::write(&job, SCENARIO)?;
    let out = dir.path().join("preview.png");

    let recorder = RecordingSink::new("bot");
    let log = recorder.log();
    let mut sinks: Vec<Box<dyn OutputSink>> = vec![
        recorder.boxed(),
        Box::new(RasterSink::new(&out, RasterStyle::default()).with_url("http://bot.local/preview.png")),
    ];

    let listener = RecordingListener::new();
    let exec = StreamingExecutor::new(ListenerSet::new().with(listener.clone()));
    let report = exec.draw_file(
        &job,
        &flat_geometry(30.0, 20.0),
        SafetyOptions::default(),
        &mut sinks,
        &CancelHandle::new(),
    )?;

    // Injected pen-up, five file lines, pen-up and home.
    assert_eq!(report.total, 8);
    assert_eq!(
        listener.events().first(),
        Some(&ListenerEvent::TargetImage(Some(
            "http://bot.local/preview.png".to_string()
        )))
    );

    let calls = log.lock().unwrap().clone();
    assert_eq!(calls.first(), Some(&SinkCall::StartFile));
    assert_eq!(calls[1], SinkCall::StartBlock);
    assert_eq!(calls.last(), Some(&SinkCall::EndFile(true)));

    // end_file flushed the final frame even with a lazy flush interval.
    let img = image::open(&out)?.to_rgb8();
    assert_eq!(*img.get_pixel(15, 10), BLACK);
    Ok(())
}

#[test]
fn cancelled_draw_file_ends_unsuccessfully() -> TestResult {
    let dir = tempfile::tempdir()?;
    let job = dir.path().join("scenario.txt");
    std::fs::write(&job, SCENARIO)?;

    let recorder = RecordingSink::new("bot");
    let log = recorder.log();
    let mut sinks = vec![recorder.boxed()];
    let cancel = CancelHandle::new();
    cancel.cancel();

    let report = StreamingExecutor::default().draw_file(
        &job,
        &flat_geometry(30.0, 20.0),
        SafetyOptions::default(),
        &mut sinks,
        &cancel,
    )?;

    assert!(report.is_cancelled());
    assert_eq!(log.lock().unwrap().last(), Some(&SinkCall::EndFile(false)));
    Ok(())
}

#[test]
fn missing_command_file_touches_no_sink() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = RecordingSink::new("bot");
    let log = recorder.log();
    let mut sinks = vec![recorder.boxed()];

    let result = StreamingExecutor::default().draw_file(
        &dir.path().join("nope.txt"),
        &flat_geometry(30.0, 20.0),
        SafetyOptions::default(),
        &mut sinks,
        &CancelHandle::new(),
    );

    assert!(result.is_err());
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn out_of_range_move_is_absorbed_and_the_run_still_stops_cleanly() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let mut raster = RasterSink::new(dir.path().join("preview.png"), eager_style());
    raster.start_file(Path::new("wild"), &flat_geometry(30.0, 20.0))?;

    let recorder = RecordingSink::new("bot");
    let log = recorder.log();
    let mut sinks: Vec<Box<dyn OutputSink>> = vec![recorder.boxed(), Box::new(raster)];

    let listener = RecordingListener::new();
    let exec = StreamingExecutor::new(ListenerSet::new().with(listener.clone()));
    let seq = CommandSequence::from_lines(["d1", "g10,10", "g-99999999999999999999999,0", "d0"]);
    let report = exec.run(&seq, &mut sinks, &CancelHandle::new())?;

    assert_eq!(report.done, 4);
    assert_eq!(report.failures.len(), 1);
    let failure = &report.failures[0];
    assert_eq!((failure.index, failure.sink.as_str()), (2, "raster"));
    assert!(failure.error.contains("Malformed command"));

    assert_eq!(
        writes(&log),
        vec!["d1", "g10,10", "g-99999999999999999999999,0", "d0", "d0"]
    );
    let events = listener.events();
    assert_eq!(
        &events[events.len() - 3..],
        &[
            ListenerEvent::Progress(ProgressSnapshot::CLEARED),
            ListenerEvent::Eta(Eta::Done),
            ListenerEvent::State(MachineState::Idle),
        ]
    );
    Ok(())
}
