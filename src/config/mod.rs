// src/config/mod.rs

//! Configuration loading and validation for drawbot.
//!
//! - `model.rs`: the TOML-backed data model, including [`DeviceGeometry`].
//! - `loader.rs`: reading a config file from disk.
//! - `validate.rs`: `TryFrom<RawConfigFile> for ConfigFile`.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_or_default};
pub use model::{
    ConfigFile, DeviceGeometry, JobSection, PreviewSection, RawConfigFile, SerialSection,
};
