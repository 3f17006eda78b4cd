//! # sinklog
//! Synchronous multi-sink logger: one call fans out to the console and to
//! every registered sink whose threshold it meets. Log files wrap at a byte
//! limit and pick up where they stopped after a restart.
//!
//! ## Usage
//! ```toml
//! // Cargo.toml
//! ...
//! [dependencies]
//! sinklog = "0.1.0"
//! ```
//!
//! ```rust
//! use sinklog::logger_config;
//!
//! let _guard = logger_config().init_global();
//! sinklog::info!("Hello, world!");
//! // records from the `log` macros take the same path
//! log::info!("Hello again!");
//! // guard closes the logger when dropped
//! ```
//!
//! ## Logging to files
//! A log file is opened for update and created if missing. With a file limit
//! set, writing restarts at the top of the file once it grows past the limit.
//! Closing records the write offset in `<file>.pos`, and the next run resumes
//! there.
//!
//! ```rust
//! use sinklog::{Level, logger_config};
//!
//! let path = std::env::temp_dir().join("sinklog_doc_app.log");
//! std::fs::remove_file(&path).ok();
//! std::fs::remove_file(sinklog::position_path(&path)).ok();
//!
//! let guard = logger_config()
//!     .with_file_limit(512)
//!     .with_log_file(&path, Level::Trace)
//!     .expect("Unable to open log file")
//!     .no_stdout() // disable console logging if needed
//!     .init_global();
//!
//! sinklog::warn!("disk usage at {}%", 91);
//! drop(guard); // closes the file and records its position
//! assert!(std::fs::read_to_string(&path).unwrap().ends_with("disk usage at 91%\n"));
//! assert!(sinklog::position_path(&path).exists());
//! ```
//!
//! ## Sharing a lock
//! Any [`LogLock`] can serialize whole log calls, e.g. a robust mutex shared
//! with forked children that keeps working if a holder dies.
//!
//! ```rust
//! use std::sync::Arc;
//! use sinklog::{ThreadLock, logger_config};
//!
//! let _guard = logger_config()
//!     .with_lock(Arc::new(ThreadLock::new()))
//!     .init_global();
//! sinklog::debug!("serialized");
//! ```

use std::{
    path::Path,
    sync::{
        Arc, LazyLock,
        atomic::{AtomicU64, Ordering},
    },
};

use log::{LevelFilter, Log, Metadata, Record};

pub use sinklog_core::{
    ConsoleSink, Error, Event, FileSink, FnLock, Level, LockError, LogLock, LogMessage, Logger,
    LoggerBuilder, Result, SINKLOG_CONFIG, Sink, SinkKind, SlotId, ThreadLock, emit,
    position_path, read_position,
};
#[cfg(target_os = "linux")]
pub use sinklog_core::RobustMutex;

/// Process-wide logger behind the level macros and the `log` bridge.
static GLOBAL_LOGGER: LazyLock<Logger> = LazyLock::new(Logger::new);

static BRIDGE: SinkLogBridge = SinkLogBridge;

/// Bumped by every `init_global`; only the latest guard closes the logger.
static GENERATION: AtomicU64 = AtomicU64::new(0);

/// Returns the process-wide logger.
pub fn global() -> &'static Logger {
    &GLOBAL_LOGGER
}

/// Forwards records of the `log` crate to the global logger.
struct SinkLogBridge;

impl Log for SinkLogBridge {
    fn enabled(&self, _: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        global().log(
            record.level().into(),
            record.file().unwrap_or(record.target()),
            record.line().unwrap_or(0),
            *record.args(),
        );
    }

    fn flush(&self) {}
}

/// Guard that closes the global logger when dropped, persisting file positions.
/// Hold this guard for the lifetime of your logging session.
///
/// A guard from an earlier `init_global` is inert once the logger has been
/// initialized again.
pub struct LoggerGuard {
    generation: u64,
}

impl Drop for LoggerGuard {
    fn drop(&mut self) {
        if GENERATION.load(Ordering::SeqCst) == self.generation {
            // failures were already reported on the diagnostics stream
            global().close().ok();
        }
    }
}

struct LogFileEntry {
    file: FileSink,
    level: Level,
    byte_limit: Option<u32>,
}

/// Builder for configuring and initializing the global logger.
pub struct ConfigBuilder {
    log_files: Vec<LogFileEntry>,
    no_stdout: bool,
    log_level: Level,
    file_limit: u32,
    lock: Option<Arc<dyn LogLock>>,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self {
            log_files: Vec::new(),
            no_stdout: SINKLOG_CONFIG.QUIET,
            log_level: SINKLOG_CONFIG.level(),
            file_limit: SINKLOG_CONFIG.FILE_LIMIT,
            lock: None,
        }
    }
}

impl ConfigBuilder {
    /// Adds a log file receiving everything at `level` or above.
    pub fn with_log_file<P: AsRef<Path>>(self, path: P, level: Level) -> Result<Self> {
        self.push_file(path.as_ref(), level, None)
    }
    /// Adds a log file wrapping at its own `byte_limit` instead of the shared one.
    pub fn with_limited_log_file<P: AsRef<Path>>(
        self,
        path: P,
        level: Level,
        byte_limit: u32,
    ) -> Result<Self> {
        self.push_file(path.as_ref(), level, Some(byte_limit))
    }
    /// Maybe adds a log file.
    pub fn maybe_with_log_file<P: AsRef<Path>>(self, path: Option<P>, level: Level) -> Result<Self> {
        match path {
            Some(path) => self.with_log_file(path, level),
            None => Ok(self),
        }
    }
    fn push_file(mut self, path: &Path, level: Level, byte_limit: Option<u32>) -> Result<Self> {
        self.log_files.push(LogFileEntry {
            file: global().open_file_sink(path)?,
            level,
            byte_limit,
        });
        Ok(self)
    }
    /// Ignore console logging
    pub fn no_stdout(self) -> Self {
        Self {
            no_stdout: true,
            ..self
        }
    }
    /// Dynamically set the console flag.
    pub fn with_stdout(self, yes: bool) -> Self {
        Self {
            no_stdout: !yes,
            ..self
        }
    }
    /// Minimum level printed on the console.
    pub fn with_level(self, log_level: Level) -> Self {
        Self { log_level, ..self }
    }
    /// Byte limit shared by log files without their own.
    pub fn with_file_limit(self, file_limit: u32) -> Self {
        Self { file_limit, ..self }
    }
    /// Lock held around every log call and around closing.
    pub fn with_lock(self, lock: Arc<dyn LogLock>) -> Self {
        Self {
            lock: Some(lock),
            ..self
        }
    }
    /// Initialize the logger globally.
    /// Returns a guard that will close the logger when dropped.
    ///
    /// Initializing again first closes the previous configuration: its sinks
    /// are torn down and their positions recorded before the new ones are
    /// registered. The `log` bridge passes every level through, since sinks
    /// registered later on [`global()`] may want any of them.
    #[must_use = "LoggerGuard must be kept alive to ensure logging works. Do \"let _guard = logger_config().init_global();\""]
    pub fn init_global(self) -> LoggerGuard {
        let Self {
            log_files,
            no_stdout,
            log_level,
            file_limit,
            lock,
        } = self;
        let logger = global();
        let generation = GENERATION.fetch_add(1, Ordering::SeqCst) + 1;
        // failures were already reported on the diagnostics stream
        logger.close().ok();
        logger.set_quiet(no_stdout);
        logger.set_min_level(log_level);
        logger.set_file_limit(file_limit);
        match lock {
            Some(lock) => logger.set_lock(lock),
            None => logger.clear_lock(),
        }
        for LogFileEntry {
            file,
            level,
            byte_limit,
        } in log_files
        {
            let sink = Sink::new(SinkKind::File(file), level);
            let sink = match byte_limit {
                Some(limit) => sink.with_byte_limit(limit),
                None => sink,
            };
            // a full registry is reported on the diagnostics stream
            logger.register(sink).ok();
        }
        log::set_logger(&BRIDGE).ok();
        log::set_max_level(LevelFilter::Trace);
        logger.open();
        LoggerGuard { generation }
    }
}

/// Returns a default ConfigBuilder for configuring the logger.
pub fn logger_config() -> ConfigBuilder {
    ConfigBuilder::default()
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log_at {
    ($level:ident, $($arg:tt)+) => {
        $crate::global().log($crate::Level::$level, file!(), line!(), format_args!($($arg)+))
    };
}

/// Logs at [`Level::Trace`] through the global logger.
#[macro_export]
macro_rules! trace {
    ($($arg:tt)+) => { $crate::__log_at!(Trace, $($arg)+) };
}

/// Logs at [`Level::Debug`] through the global logger.
#[macro_export]
macro_rules! debug {
    ($($arg:tt)+) => { $crate::__log_at!(Debug, $($arg)+) };
}

/// Logs at [`Level::Info`] through the global logger.
#[macro_export]
macro_rules! info {
    ($($arg:tt)+) => { $crate::__log_at!(Info, $($arg)+) };
}

/// Logs at [`Level::Warn`] through the global logger.
#[macro_export]
macro_rules! warn {
    ($($arg:tt)+) => { $crate::__log_at!(Warn, $($arg)+) };
}

/// Logs at [`Level::Error`] through the global logger.
#[macro_export]
macro_rules! error {
    ($($arg:tt)+) => { $crate::__log_at!(Error, $($arg)+) };
}

/// Logs at [`Level::Fatal`] through the global logger. Only prints; ending
/// the process is up to the caller.
#[macro_export]
macro_rules! fatal {
    ($($arg:tt)+) => { $crate::__log_at!(Fatal, $($arg)+) };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        io::{self, Write},
        sync::{Mutex, PoisonError},
    };

    /// Every test here drives the one global logger.
    static GLOBAL: Mutex<()> = Mutex::new(());

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Shared {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_global_logger_routes_macros_and_log_records() {
        let _serial = GLOBAL.lock().unwrap_or_else(PoisonError::into_inner);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("global.log");
        let guard = logger_config()
            .no_stdout()
            .with_file_limit(0)
            .with_log_file(&path, Level::Debug)
            .unwrap()
            .init_global();
        assert!(global().is_open());

        trace!("below threshold");
        debug!("from the macro");
        fatal!("still just printed");
        log::info!("from the log crate");
        drop(guard);

        assert!(!global().is_open());
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains(" DEBUG ") && lines[0].ends_with(": from the macro"));
        assert!(lines[1].contains(" FATAL "));
        assert!(lines[2].contains(" INFO ") && lines[2].ends_with(": from the log crate"));
        let recorded = read_position(&position_path(&path));
        assert_eq!(recorded, Some(content.len() as u64));

        trace!("after close");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), content);
    }

    #[test]
    fn test_reinit_replaces_previous_sinks() {
        let _serial = GLOBAL.lock().unwrap_or_else(PoisonError::into_inner);
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.log");
        let second = dir.path().join("second.log");

        let old_guard = logger_config()
            .no_stdout()
            .with_log_file(&first, Level::Trace)
            .unwrap()
            .init_global();
        info!("to the first file");
        let guard = logger_config()
            .no_stdout()
            .with_log_file(&second, Level::Trace)
            .unwrap()
            .init_global();
        assert_eq!(global().sink_count(), 1);
        let before = std::fs::read_to_string(&first).unwrap();
        assert_eq!(before.lines().count(), 1);
        assert!(position_path(&first).exists());

        info!("to the second file");
        drop(old_guard);
        assert!(global().is_open());
        warn!("still the second file");
        drop(guard);
        assert!(!global().is_open());

        assert_eq!(std::fs::read_to_string(&first).unwrap(), before);
        let content = std::fs::read_to_string(&second).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(": to the second file"));
        assert!(lines[1].ends_with(": still the second file"));
    }

    #[test]
    fn test_log_records_reach_sinks_registered_after_init() {
        let _serial = GLOBAL.lock().unwrap_or_else(PoisonError::into_inner);
        let guard = logger_config()
            .no_stdout()
            .with_level(Level::Fatal)
            .init_global();
        assert_eq!(log::max_level(), LevelFilter::Trace);
        let (sender, receiver) = crossbeam_channel::unbounded();
        global().register_channel_sink(sender, Level::Trace).unwrap();
        log::trace!("late sink sees trace");
        assert_eq!(receiver.try_recv().unwrap().message, "late sink sees trace");
        drop(guard);
    }

    #[test]
    fn test_unopenable_log_file_is_diagnosed() {
        let _serial = GLOBAL.lock().unwrap_or_else(PoisonError::into_inner);
        let diagnostics = Shared::default();
        global().set_diagnostics(diagnostics.clone());
        let dir = tempfile::tempdir().unwrap();
        let result = logger_config().with_log_file(dir.path().join("missing/app.log"), Level::Info);
        global().set_diagnostics(io::stdout());
        assert!(matches!(result, Err(Error::SinkOpen { .. })));
        assert!(diagnostics.text().starts_with("sinklog: can't open log file"));
    }
}
