// src/sink/raster.rs

//! Raster preview of what the pen has drawn.
//!
//! Device coordinates are mapped into image space with
//! [`DeviceGeometry::to_image`]; segments are drawn only while the pen is
//! down. The buffer is written to a temporary file next to the target and
//! renamed over it, so the preview on disk is always a complete frame.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::{ImageFormat, Rgb, RgbImage};
use tracing::{debug, info, warn};

use crate::command::{Command, CommandKind};
use crate::config::{DeviceGeometry, PreviewSection};
use crate::errors::{DrawbotError, Result};

use super::OutputSink;

/// Colours, pen width and flush cadence of the preview.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterStyle {
    pub line_color: Rgb<u8>,
    pub background: Rgb<u8>,
    pub line_width: u32,
    /// Persist after this many drawn segments.
    pub flush_interval: usize,
}

impl From<&PreviewSection> for RasterStyle {
    fn from(p: &PreviewSection) -> Self {
        Self {
            line_color: Rgb(p.line_color),
            background: Rgb(p.background),
            line_width: p.line_width.max(1),
            flush_interval: p.flush_interval.max(1),
        }
    }
}

impl Default for RasterStyle {
    fn default() -> Self {
        Self::from(&PreviewSection::default())
    }
}

#[derive(Debug)]
struct Canvas {
    image: RgbImage,
    geometry: DeviceGeometry,
    /// Pen position in image space.
    pen: (f64, f64),
    pen_down: bool,
}

#[derive(Debug)]
pub struct RasterSink {
    path: PathBuf,
    url: Option<String>,
    style: RasterStyle,
    canvas: Option<Canvas>,
    /// Segments drawn since the last successful save.
    dirty: usize,
    segments: usize,
}

impl RasterSink {
    pub fn new(path: impl Into<PathBuf>, style: RasterStyle) -> Self {
        Self {
            path: path.into(),
            url: None,
            style,
            canvas: None,
            dirty: 0,
            segments: 0,
        }
    }

    pub fn from_config(preview: &PreviewSection) -> Self {
        let mut sink = Self::new(preview.path.clone(), RasterStyle::from(preview));
        sink.url = preview.url.clone();
        sink
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Segments drawn since the last `start_file`.
    pub fn segments_drawn(&self) -> usize {
        self.segments
    }

    pub fn pen_is_down(&self) -> bool {
        self.canvas.as_ref().is_some_and(|c| c.pen_down)
    }

    /// Current in-memory frame.
    pub fn image(&self) -> Option<&RgbImage> {
        self.canvas.as_ref().map(|c| &c.image)
    }

    /// Persist the current frame, logging instead of failing.
    pub fn flush(&mut self) {
        let Some(canvas) = self.canvas.as_ref() else {
            return;
        };
        match save_atomically(&canvas.image, &self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), segments = self.segments, "preview saved");
                self.dirty = 0;
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "saving preview failed");
            }
        }
    }

    fn draw_to(&mut self, command: &Command, x: f64, y: f64) -> Result<()> {
        let style = self.style;
        let Some(canvas) = self.canvas.as_mut() else {
            return Ok(());
        };
        let target = canvas.geometry.to_image(x, y);
        if !in_pixel_range(target) {
            return Err(DrawbotError::MalformedCommand(format!(
                "'{command}' lands outside the preview range ({:.0}, {:.0})",
                target.0, target.1
            )));
        }
        if canvas.pen_down {
            let pad = f64::from(style.line_width);
            let bounds = (
                -pad,
                -pad,
                f64::from(canvas.image.width()) + pad,
                f64::from(canvas.image.height()) + pad,
            );
            if let Some((from, to)) = clip_segment(canvas.pen, target, bounds) {
                draw_segment(&mut canvas.image, from, to, style.line_color, style.line_width);
            }
            self.segments += 1;
            self.dirty += 1;
        }
        canvas.pen = target;

        if self.dirty >= style.flush_interval {
            self.flush();
        }
        Ok(())
    }
}

impl OutputSink for RasterSink {
    fn name(&self) -> &str {
        "raster"
    }

    fn start_file(&mut self, path: &Path, geometry: &DeviceGeometry) -> Result<()> {
        let (w, h) = geometry.preview_size();
        info!(file = %path.display(), width = w, height = h, "starting preview");
        self.canvas = Some(Canvas {
            image: RgbImage::from_pixel(w, h, self.style.background),
            geometry: *geometry,
            pen: (0.0, 0.0),
            pen_down: false,
        });
        self.segments = 0;
        self.dirty = 0;
        self.flush();
        Ok(())
    }

    fn start_block(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_command(&mut self, command: &Command) -> Result<String> {
        match command.kind() {
            CommandKind::PenUp => {
                if let Some(c) = self.canvas.as_mut() {
                    c.pen_down = false;
                }
            }
            CommandKind::PenDown => {
                if let Some(c) = self.canvas.as_mut() {
                    c.pen_down = true;
                }
            }
            CommandKind::Move => {
                let p = command.target()?;
                self.draw_to(command, p.x, p.y)?;
            }
            CommandKind::Calibrate | CommandKind::Comment | CommandKind::Other => {}
        }
        Ok(String::new())
    }

    fn finish_block(&mut self) -> Result<()> {
        Ok(())
    }

    fn end_file(&mut self, path: &Path, success: bool) -> Result<()> {
        info!(file = %path.display(), success, segments = self.segments, "finishing preview");
        self.flush();
        Ok(())
    }

    fn target_image(&self) -> Option<String> {
        Some(
            self.url
                .clone()
                .unwrap_or_else(|| self.path.display().to_string()),
        )
    }
}

/// Encode to a temp file in the destination directory, then rename it over
/// `path`.
fn save_atomically(image: &RgbImage, path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".preview-")
        .suffix(".png.tmp")
        .tempfile_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        image.write_to(&mut writer, ImageFormat::Png)?;
        writer.flush()?;
    }
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Largest pixel coordinate a move may map to, in either direction.
const MAX_PIXEL_COORD: f64 = 1e7;

fn in_pixel_range((x, y): (f64, f64)) -> bool {
    x.is_finite() && y.is_finite() && x.abs() <= MAX_PIXEL_COORD && y.abs() <= MAX_PIXEL_COORD
}

/// Liang-Barsky clip of `from -> to` against `(xmin, ymin, xmax, ymax)`.
/// `None` when the segment misses the box entirely.
fn clip_segment(
    from: (f64, f64),
    to: (f64, f64),
    (xmin, ymin, xmax, ymax): (f64, f64, f64, f64),
) -> Option<((f64, f64), (f64, f64))> {
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let mut t0 = 0.0_f64;
    let mut t1 = 1.0_f64;

    for (p, q) in [
        (-dx, from.0 - xmin),
        (dx, xmax - from.0),
        (-dy, from.1 - ymin),
        (dy, ymax - from.1),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }

    Some((
        (from.0 + t0 * dx, from.1 + t0 * dy),
        (from.0 + t1 * dx, from.1 + t1 * dy),
    ))
}

/// Bresenham line with a square brush of `width` pixels. Pixels outside the
/// image are clipped.
fn draw_segment(img: &mut RgbImage, from: (f64, f64), to: (f64, f64), color: Rgb<u8>, width: u32) {
    let (mut x0, mut y0) = (from.0.round() as i64, from.1.round() as i64);
    let (x1, y1) = (to.0.round() as i64, to.1.round() as i64);

    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        stamp(img, x0, y0, color, width);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn stamp(img: &mut RgbImage, cx: i64, cy: i64, color: Rgb<u8>, width: u32) {
    let w = i64::from(width.max(1));
    let lo = -(w - 1) / 2;
    let hi = w / 2;
    for oy in lo..=hi {
        for ox in lo..=hi {
            let (x, y) = (cx + ox, cy + oy);
            if x >= 0 && y >= 0 && x < i64::from(img.width()) && y < i64::from(img.height()) {
                img.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}
