//! Plugin module for format-specific transcoding executors.
//!
//! This module provides the `TranscodePlugin` trait the scheduler invokes, the
//! `PluginRegistry` that maps a file format key (e.g. `.flv`) to one plugin,
//! and `FfmpegPlugin`, a plugin that wraps an external `ffmpeg` process.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use transcode_core::plugin::{FfmpegPlugin, PluginRegistry, TranscodePlugin};
//!
//! let mut registry = PluginRegistry::new();
//! registry.register(".flv", Arc::new(FfmpegPlugin::with_defaults()));
//!
//! let plugin = registry.lookup(".flv").expect("registered");
//! println!("{} handles .flv", plugin.kind());
//! ```

mod config;
mod error;
mod ffmpeg;
mod registry;
mod traits;
mod types;

pub use config::FfmpegConfig;
pub use error::PluginError;
pub use ffmpeg::FfmpegPlugin;
pub use registry::{format_key, normalize_format, PluginRegistry};
pub use traits::TranscodePlugin;
pub use types::{
    ExecOutcome, ParamValue, TranscodeJob, TranscodeMessage, TranscodeParams, STATUS_CANCELLED,
    STATUS_FAILED, STATUS_INTERNAL, STATUS_OK, STATUS_TIMEOUT,
};
