// src/command/mod.rs

//! Plotter commands and command sequences.
//!
//! - [`Command`] is one parsed line of a command file.
//! - [`CommandSequence`] is an ordered list of commands with the safety
//!   commands (pen-up at start, pen-up and home at end) injected.

pub mod sequence;

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::errors::{DrawbotError, Result};

pub use sequence::{CommandSequence, SafetyOptions};

static MOVE_PAYLOAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^g\s*(-?\d+(?:\.\d+)?)\s*,\s*(-?\d+(?:\.\d+)?)\s*$")
        .expect("move payload regex is valid")
});

/// Kind of a command, derived from its prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// `d0`
    PenUp,
    /// `d1`
    PenDown,
    /// `c`
    Calibrate,
    /// `g<x>,<y>`
    Move,
    /// `#...`, never sent to a sink.
    Comment,
    /// Anything else; forwarded verbatim.
    Other,
}

/// A device coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// One immutable command line.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    text: String,
    kind: CommandKind,
}

impl Command {
    /// Parse a line. The line terminator and surrounding whitespace are
    /// stripped; the kind is derived from the prefix. Never fails: payload
    /// errors surface later from [`Command::target`].
    pub fn parse(line: &str) -> Self {
        let text = line.trim().to_string();
        let kind = if text.starts_with('#') {
            CommandKind::Comment
        } else if text == "d0" {
            CommandKind::PenUp
        } else if text == "d1" {
            CommandKind::PenDown
        } else if text == "c" {
            CommandKind::Calibrate
        } else if text.starts_with('g') {
            CommandKind::Move
        } else {
            CommandKind::Other
        };
        Self { text, kind }
    }

    pub fn pen_up() -> Self {
        Self::parse("d0")
    }

    pub fn pen_down() -> Self {
        Self::parse("d1")
    }

    pub fn calibrate() -> Self {
        Self::parse("c")
    }

    pub fn move_to(x: f64, y: f64) -> Self {
        Self::parse(&format!("g{},{}", fmt_coord(x), fmt_coord(y)))
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn is_comment(&self) -> bool {
        self.kind == CommandKind::Comment
    }

    /// Target of a move command.
    pub fn target(&self) -> Result<Point> {
        if self.kind != CommandKind::Move {
            return Err(DrawbotError::MalformedCommand(format!(
                "'{}' is not a move",
                self.text
            )));
        }
        let caps = MOVE_PAYLOAD.captures(&self.text).ok_or_else(|| {
            DrawbotError::MalformedCommand(format!("cannot parse move '{}'", self.text))
        })?;
        let coord = |i: usize| -> Result<f64> {
            caps[i].parse::<f64>().map_err(|e| {
                DrawbotError::MalformedCommand(format!("'{}': {e}", self.text))
            })
        };
        Ok(Point {
            x: coord(1)?,
            y: coord(2)?,
        })
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Integral coordinates are written without a fractional part, matching the
/// files produced by the converter (`g380,250`).
fn fmt_coord(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_prefix() {
        assert_eq!(Command::parse("d0\n").kind(), CommandKind::PenUp);
        assert_eq!(Command::parse("d1").kind(), CommandKind::PenDown);
        assert_eq!(Command::parse("c").kind(), CommandKind::Calibrate);
        assert_eq!(Command::parse("g1,2").kind(), CommandKind::Move);
        assert_eq!(Command::parse("# layer 2").kind(), CommandKind::Comment);
        assert_eq!(Command::parse("x9").kind(), CommandKind::Other);
    }

    #[test]
    fn parses_move_target() {
        let p = Command::parse("g10.5, -3").target().unwrap();
        assert_eq!(p, Point { x: 10.5, y: -3.0 });
    }

    #[test]
    fn malformed_move_is_an_error() {
        let err = Command::parse("g10;x").target().unwrap_err();
        assert!(matches!(err, DrawbotError::MalformedCommand(_)));
    }

    #[test]
    fn move_to_formats_like_converter_output() {
        assert_eq!(Command::move_to(380.0, 250.0).text(), "g380,250");
        assert_eq!(Command::move_to(1.5, 2.0).text(), "g1.5,2");
    }
}
