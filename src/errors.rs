// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! Only resource acquisition failures (`ResourceBusy`, `SerialOpen`), command
//! file loading failures and `Busy` are expected to escape a run. Everything
//! else is absorbed at the per-command or per-save boundary and logged.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DrawbotError {
    #[error("Hardware is locked by another process ({lock_path:?})")]
    ResourceBusy { lock_path: PathBuf },

    #[error("Could not open serial port {port}: {source}")]
    SerialOpen {
        port: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Timed out waiting for acknowledgement of '{command}'")]
    DeviceTimeout { command: String },

    #[error("Sink IO error: {0}")]
    SinkIo(String),

    #[error("Malformed command: {0}")]
    MalformedCommand(String),

    #[error("A job is already running")]
    Busy,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DrawbotError>;
