//! # sinklog-core
//! Core of sinklog: level-filtered, synchronous dispatch of log calls to a
//! console path and a bounded registry of sinks, with file sinks that wrap at
//! a byte limit and resume at their last offset after a restart.

mod config;
mod error;
mod event;
mod file_sink;
mod format;
mod level;
mod lock;
mod logger;
mod position;
mod registry;
mod sink;

pub use config::{SINKLOG_CONFIG, SinklogConfig};
pub use error::{Error, Result};
pub use event::{Event, LogMessage};
pub use file_sink::FileSink;
pub use format::{format_console, format_file};
pub use level::Level;
#[cfg(target_os = "linux")]
pub use lock::RobustMutex;
pub use lock::{FnLock, LockError, LogLock, ThreadLock};
pub use logger::{Logger, LoggerBuilder};
pub use position::{position_path, read_position, write_position};
pub use registry::{DEFAULT_CAPACITY, Registry, SlotId};
pub use sink::{ConsoleSink, Sink, SinkKind};
