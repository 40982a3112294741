use std::io::Write;
use std::path::PathBuf;

use tempfile::NamedTempFile;

use drawbot::config::{load_and_validate, load_or_default};
use drawbot::errors::DrawbotError;
use drawbot::sink::{RasterStyle, SerialSettings};

fn write_config(body: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(body.as_bytes()).unwrap();
    file
}

#[test]
fn full_config_is_loaded() {
    let file = write_config(
        r#"
[serial]
port = "/dev/ttyUSB3"
baud = 115200
timeout_ms = 250
lock_path = "/tmp/test-bot.lock"

[geometry]
bot_width = 500.0
bot_height = 400.0
margin = 50.0
min_y = 20.0
scale = 0.5

[preview]
path = "out/preview.png"
url = "http://bot.local/preview.png"
line_color = [200, 0, 0]
flush_interval = 5

[job]
home_at_end = false
home = [100.0, 120.0]
fake = true
fake_delay_ms = 20
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();

    let serial = SerialSettings::from(&cfg.serial);
    assert_eq!(serial.port, "/dev/ttyUSB3");
    assert_eq!(serial.baud, 115200);
    assert_eq!(serial.timeout.as_millis(), 250);
    assert_eq!(serial.ack_token, "ok");

    assert_eq!(cfg.geometry.preview_size(), (200, 190));
    assert_eq!(cfg.geometry.paper_width, 584.0);

    assert_eq!(cfg.preview.path, PathBuf::from("out/preview.png"));
    assert_eq!(RasterStyle::from(&cfg.preview).line_color.0, [200, 0, 0]);
    assert!(cfg.preview.enabled);

    assert!(!cfg.job.home_at_end);
    assert!(cfg.job.pen_up_at_end);
    assert!(cfg.job.fake);
}

#[test]
fn empty_file_gives_defaults() {
    let file = write_config("");
    let cfg = load_and_validate(file.path()).unwrap();
    assert_eq!(cfg.serial.port, "/dev/ttyACM0");
    assert_eq!(cfg.geometry.preview_size(), (760, 580));
}

#[test]
fn invalid_scale_is_a_config_error() {
    let file = write_config("[geometry]\nscale = 0.0\n");
    match load_and_validate(file.path()) {
        Err(DrawbotError::ConfigError(msg)) => assert!(msg.contains("scale")),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn bad_syntax_is_a_toml_error() {
    let file = write_config("[serial\nport = ");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(DrawbotError::TomlError(_))
    ));
}

#[test]
fn explicit_missing_path_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("Drawbot.toml");
    assert!(matches!(
        load_or_default(&missing),
        Err(DrawbotError::IoError(_))
    ));
}
