//! Markcopy Core — error taxonomy, agent protocol messages, conversion settings.

pub mod error;
pub mod protocol;
pub mod settings;

pub use error::{Error, Result};
pub use protocol::*;
pub use settings::{
    ConversionOptions, FileSettingsStore, LineBreaks, MemorySettingsStore, SettingsStore,
};
