#![allow(dead_code)]

use std::path::Path;

use drawbot::config::{ConfigFile, DeviceGeometry, RawConfigFile};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn fake(mut self, delay_ms: u64) -> Self {
        self.config.job.fake = true;
        self.config.job.fake_delay_ms = delay_ms;
        self
    }

    pub fn lock_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config.serial.lock_path = path.as_ref().to_path_buf();
        self
    }

    pub fn preview_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config.preview.enabled = true;
        self.config.preview.path = path.as_ref().to_path_buf();
        self
    }

    pub fn no_preview(mut self) -> Self {
        self.config.preview.enabled = false;
        self
    }

    pub fn flush_interval(mut self, n: usize) -> Self {
        self.config.preview.flush_interval = n;
        self
    }

    pub fn geometry(mut self, geometry: DeviceGeometry) -> Self {
        self.config.geometry = geometry;
        self
    }

    pub fn no_tail(mut self) -> Self {
        self.config.job.pen_up_at_end = false;
        self.config.job.home_at_end = false;
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Geometry with no margins and a 1:1 preview of `width` x `height`.
pub fn flat_geometry(width: f64, height: f64) -> DeviceGeometry {
    DeviceGeometry {
        bot_width: width,
        bot_height: height,
        margin: 0.0,
        min_y: 0.0,
        scale: 1.0,
        ..DeviceGeometry::default()
    }
}
