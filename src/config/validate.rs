// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{DrawbotError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::DrawbotError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_serial(cfg)?;
    validate_geometry(cfg)?;
    validate_preview(cfg)?;
    validate_job(cfg)?;
    Ok(())
}

/// Upper bound on `preview_size()` width times height.
const MAX_PREVIEW_PIXELS: f64 = 1e8;

fn config_error(msg: impl Into<String>) -> DrawbotError {
    DrawbotError::ConfigError(msg.into())
}

fn validate_serial(cfg: &RawConfigFile) -> Result<()> {
    if cfg.serial.baud == 0 {
        return Err(config_error("[serial].baud must be > 0"));
    }
    if cfg.serial.timeout_ms == 0 {
        return Err(config_error("[serial].timeout_ms must be > 0"));
    }
    if cfg.serial.ack_token.trim().is_empty() {
        return Err(config_error("[serial].ack_token must not be empty"));
    }
    Ok(())
}

fn validate_geometry(cfg: &RawConfigFile) -> Result<()> {
    let g = &cfg.geometry;
    if !(g.scale.is_finite() && g.scale > 0.0) {
        return Err(config_error(format!(
            "[geometry].scale must be > 0 (got {})",
            g.scale
        )));
    }
    if g.drawable_width() <= 0.0 {
        return Err(config_error(format!(
            "[geometry] drawable width is {} (bot_width {} - 2 * margin {})",
            g.drawable_width(),
            g.bot_width,
            g.margin
        )));
    }
    if g.drawable_height() <= 0.0 {
        return Err(config_error(format!(
            "[geometry] drawable height is {} (bot_height {} - min_y {})",
            g.drawable_height(),
            g.bot_height,
            g.min_y
        )));
    }
    let pixels = (g.drawable_width() * g.scale).round() * (g.drawable_height() * g.scale).round();
    if !(pixels.is_finite() && pixels <= MAX_PREVIEW_PIXELS) {
        return Err(config_error(format!(
            "[geometry] preview would be {pixels:.0} pixels (limit {MAX_PREVIEW_PIXELS:.0}); lower scale or bot size"
        )));
    }
    Ok(())
}

fn validate_preview(cfg: &RawConfigFile) -> Result<()> {
    if cfg.preview.line_width == 0 {
        return Err(config_error("[preview].line_width must be >= 1"));
    }
    if cfg.preview.flush_interval == 0 {
        return Err(config_error("[preview].flush_interval must be >= 1"));
    }
    Ok(())
}

fn validate_job(cfg: &RawConfigFile) -> Result<()> {
    let step = cfg.job.min_progress_step;
    if !(0.0..1.0).contains(&step) {
        return Err(config_error(format!(
            "[job].min_progress_step must be in [0, 1) (got {step})"
        )));
    }
    Ok(())
}
