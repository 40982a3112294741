// src/sink/null.rs

use std::time::Duration;

use tracing::debug;

use crate::command::Command;
use crate::errors::Result;

use super::OutputSink;

/// Sink that accepts every command, optionally after a simulated delay.
#[derive(Debug, Clone, Default)]
pub struct NullSink {
    delay: Duration,
    written: usize,
}

impl NullSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long per command, to make fake runs look like real ones.
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay, written: 0 }
    }

    pub fn written(&self) -> usize {
        self.written
    }
}

impl OutputSink for NullSink {
    fn name(&self) -> &str {
        "null"
    }

    fn start_block(&mut self) -> Result<()> {
        debug!("starting fake serial");
        Ok(())
    }

    fn write_command(&mut self, command: &Command) -> Result<String> {
        debug!(command = %command, "fake send");
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.written += 1;
        Ok("ok\n".to_string())
    }

    fn finish_block(&mut self) -> Result<()> {
        debug!("finishing fake serial");
        Ok(())
    }
}
