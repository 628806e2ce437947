pub mod callback;
pub mod config;
pub mod metrics;
pub mod plugin;
pub mod scheduler;
pub mod task;
pub mod testing;

pub use callback::{Call, CallbackError, CallbackSink, ChannelSink, ErrorKind, LogSink};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, ServerConfig,
};
pub use plugin::{
    ExecOutcome, FfmpegConfig, FfmpegPlugin, ParamValue, PluginError, PluginRegistry,
    TranscodeJob, TranscodeMessage, TranscodeParams, TranscodePlugin,
};
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerError, SchedulerStatus, TaskProgress};
pub use task::{Task, TaskId, TaskStatus};
