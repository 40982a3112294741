// src/sink/mod.rs

//! Output sinks: consumers of the command stream.
//!
//! The executor drives every sink through the same lifecycle:
//!
//! ```text
//! start_file -> start_block -> write_command* -> finish_block -> end_file
//! ```
//!
//! - [`HardwareSink`] streams to the controller board over serial.
//! - [`RasterSink`] renders pen motion into a preview PNG.
//! - [`NullSink`] accepts everything instantly (fake mode and tests).

pub mod guard;
pub mod hardware;
pub mod null;
pub mod raster;

use std::path::Path;

use crate::command::Command;
use crate::config::DeviceGeometry;
use crate::errors::Result;

pub use guard::ExclusiveAccessGuard;
pub use hardware::{HardwareSink, SerialConnector, SerialLink, SerialPortConnector, SerialSettings};
pub use null::NullSink;
pub use raster::{RasterSink, RasterStyle};

/// Anything that can consume commands and acknowledge them.
///
/// `start_block` / `finish_block` are called exactly once per run by the
/// executor; `finish_block` is called even when the run failed, and must be
/// safe to call when `start_block` did nothing.
pub trait OutputSink: Send {
    /// Short name used in logs and failure reports.
    fn name(&self) -> &str;

    /// Per-job setup for sinks that need the job's geometry.
    fn start_file(&mut self, _path: &Path, _geometry: &DeviceGeometry) -> Result<()> {
        Ok(())
    }

    fn start_block(&mut self) -> Result<()>;

    /// Consume one command and return the acknowledgement text.
    fn write_command(&mut self, command: &Command) -> Result<String>;

    fn finish_block(&mut self) -> Result<()>;

    fn end_file(&mut self, _path: &Path, _success: bool) -> Result<()> {
        Ok(())
    }

    /// Where observers can fetch this sink's rendering, if it has one.
    fn target_image(&self) -> Option<String> {
        None
    }
}
