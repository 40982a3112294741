// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Configuration as read from `Drawbot.toml`, before validation.
///
/// ```toml
/// [serial]
/// port = "/dev/ttyACM0"
/// baud = 57600
///
/// [geometry]
/// bot_width = 760.0
/// bot_height = 580.0
///
/// [preview]
/// path = "data/preview.png"
///
/// [job]
/// home = [380.0, 250.0]
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub serial: SerialSection,

    #[serde(default)]
    pub geometry: DeviceGeometry,

    #[serde(default)]
    pub preview: PreviewSection,

    #[serde(default)]
    pub job: JobSection,
}

/// Validated configuration. Only constructed through
/// `ConfigFile::try_from(RawConfigFile)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub serial: SerialSection,
    pub geometry: DeviceGeometry,
    pub preview: PreviewSection,
    pub job: JobSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            serial: raw.serial,
            geometry: raw.geometry,
            preview: raw.preview,
            job: raw.job,
        }
    }
}

/// `[serial]` section: how to reach the controller board.
#[derive(Debug, Clone, Deserialize)]
pub struct SerialSection {
    #[serde(default = "default_port")]
    pub port: String,

    #[serde(default = "default_baud")]
    pub baud: u32,

    /// Read and write timeout. An empty read after this long is treated as
    /// a dropped device.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Advisory lock file guarding the board across processes.
    #[serde(default = "default_lock_path")]
    pub lock_path: PathBuf,

    /// Substring that marks the end of the board's response to a command.
    #[serde(default = "default_ack_token")]
    pub ack_token: String,
}

impl SerialSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_port() -> String {
    "/dev/ttyACM0".to_string()
}

fn default_baud() -> u32 {
    57600
}

fn default_timeout_ms() -> u64 {
    1000
}

fn default_lock_path() -> PathBuf {
    PathBuf::from("/tmp/drawbot.lock")
}

fn default_ack_token() -> String {
    "ok".to_string()
}

impl Default for SerialSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud: default_baud(),
            timeout_ms: default_timeout_ms(),
            lock_path: default_lock_path(),
            ack_token: default_ack_token(),
        }
    }
}

/// `[geometry]` section: physical layout of the bot, in device units.
///
/// The drawable area starts at `(margin, min_y)` and spans
/// `bot_width - 2 * margin` by `bot_height - min_y`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct DeviceGeometry {
    pub bot_width: f64,
    pub bot_height: f64,
    /// Unreachable strip on the left and right edges.
    pub margin: f64,
    /// Unreachable strip at the top.
    pub min_y: f64,
    pub paper_width: f64,
    pub paper_height: f64,
    pub drawing_width: f64,
    pub drawing_height: f64,
    /// Preview pixels per device unit.
    pub scale: f64,
}

impl DeviceGeometry {
    pub fn drawable_width(&self) -> f64 {
        self.bot_width - 2.0 * self.margin
    }

    pub fn drawable_height(&self) -> f64 {
        self.bot_height - self.min_y
    }

    /// Preview buffer size in pixels (at least 1x1).
    pub fn preview_size(&self) -> (u32, u32) {
        let w = (self.drawable_width() * self.scale).round().max(1.0);
        let h = (self.drawable_height() * self.scale).round().max(1.0);
        (w as u32, h as u32)
    }

    /// Map a device coordinate into preview pixel space.
    pub fn to_image(&self, x: f64, y: f64) -> (f64, f64) {
        ((x - self.margin) * self.scale, (y - self.min_y) * self.scale)
    }
}

impl Default for DeviceGeometry {
    fn default() -> Self {
        Self {
            bot_width: 760.0,
            bot_height: 580.0,
            margin: 0.0,
            min_y: 0.0,
            paper_width: 584.0,
            paper_height: 420.0,
            drawing_width: 200.0,
            drawing_height: 200.0,
            scale: 1.0,
        }
    }
}

/// `[preview]` section: raster preview rendering.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PreviewSection {
    pub enabled: bool,
    pub path: PathBuf,
    /// URL under which observers can fetch the preview. Falls back to the
    /// file path when unset.
    pub url: Option<String>,
    pub line_color: [u8; 3],
    pub background: [u8; 3],
    pub line_width: u32,
    /// Persist the buffer after this many drawn segments.
    pub flush_interval: usize,
}

impl Default for PreviewSection {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("data/preview.png"),
            url: None,
            line_color: [0, 0, 0],
            background: [255, 255, 255],
            line_width: 1,
            flush_interval: 50,
        }
    }
}

/// `[job]` section: safety commands and progress reporting.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JobSection {
    pub pen_up_at_end: bool,
    pub home_at_end: bool,
    pub home: [f64; 2],
    /// Minimum change in completion fraction before progress is re-broadcast.
    pub min_progress_step: f64,
    /// Re-broadcast progress at least this often, in seconds.
    pub max_broadcast_silence_secs: u64,
    /// Use a `NullSink` instead of the hardware.
    pub fake: bool,
    /// Simulated per-command latency of the fake sink.
    pub fake_delay_ms: u64,
}

impl Default for JobSection {
    fn default() -> Self {
        Self {
            pen_up_at_end: true,
            home_at_end: true,
            home: [380.0, 250.0],
            min_progress_step: 0.01,
            max_broadcast_silence_secs: 30,
            fake: false,
            fake_delay_ms: 0,
        }
    }
}
