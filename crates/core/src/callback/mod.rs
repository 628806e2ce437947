//! Callback path for execution results.
//!
//! The executor builds one [`Call`] per execution attempt and hands it to the
//! installed [`CallbackSink`]. Sinks are best-effort: their failures are
//! logged and never change a task's status.

mod channel_sink;
mod log_sink;
mod traits;
mod types;

pub use channel_sink::ChannelSink;
pub use log_sink::LogSink;
pub use traits::{CallbackError, CallbackSink};
pub use types::{Call, ErrorKind};
