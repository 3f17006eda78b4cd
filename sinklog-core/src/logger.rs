use std::{
    fmt,
    io::{self, Write},
    path::Path,
    sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock},
};

use crossbeam_channel::Sender;

use crate::{
    config::SINKLOG_CONFIG,
    error::{Error, Result},
    event::{Event, LogMessage},
    file_sink::FileSink,
    level::Level,
    lock::{LockError, LockGuard, LogLock},
    registry::{Registry, SlotId},
    sink::{ConsoleSink, Sink, SinkKind},
};

struct State {
    open: bool,
    quiet: bool,
    min_level: Level,
    file_limit: u32,
    console: ConsoleSink,
    registry: Registry,
}

/// A logging context: a console path plus a registry of sinks, gated by
/// `open`/`close` and dispatched under an optional [`LogLock`].
///
/// Several loggers can coexist; the `sinklog` crate keeps one process-wide.
pub struct Logger {
    state: Mutex<State>,
    lock: RwLock<Option<Arc<dyn LogLock>>>,
    diagnostics: Mutex<Box<dyn Write + Send>>,
}

impl Logger {
    /// A closed logger configured from `SINKLOG_*`.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::default()
    }

    pub fn open(&self) {
        self.state().open = true;
    }

    pub fn is_open(&self) -> bool {
        self.state().open
    }

    pub fn set_quiet(&self, quiet: bool) {
        self.state().quiet = quiet;
    }

    pub fn set_min_level(&self, level: Level) {
        self.state().min_level = level;
    }

    pub fn min_level(&self) -> Level {
        self.state().min_level
    }

    /// Byte limit applied to every sink registered without its own.
    pub fn set_file_limit(&self, limit: u32) {
        self.state().file_limit = limit;
    }

    /// Replaces the stream internal failures are reported on.
    pub fn set_diagnostics<W: Write + Send + 'static>(&self, out: W) {
        *self
            .diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Box::new(out);
    }

    pub fn set_lock(&self, lock: Arc<dyn LogLock>) {
        *self.lock.write().unwrap_or_else(PoisonError::into_inner) = Some(lock);
    }

    pub fn clear_lock(&self) {
        *self.lock.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn register_sink(&self, kind: SinkKind, level: Level) -> Result<SlotId> {
        self.register(Sink::new(kind, level))
    }

    pub fn register(&self, sink: Sink) -> Result<SlotId> {
        self.state().registry.register(sink).inspect_err(|err| {
            self.diagnose(format_args!("{err}"));
        })
    }

    pub fn register_console_sink(&self, console: ConsoleSink, level: Level) -> Result<SlotId> {
        self.register_sink(SinkKind::Console(console), level)
    }

    pub fn register_channel_sink(&self, sender: Sender<LogMessage>, level: Level) -> Result<SlotId> {
        self.register_sink(SinkKind::Channel(sender), level)
    }

    /// Opens `path` as a wrapping file sink resuming at its persisted position.
    pub fn register_file_sink<P: AsRef<Path>>(&self, path: P, level: Level) -> Result<SlotId> {
        let file = self.open_file_sink(path)?;
        self.register_sink(SinkKind::File(file), level)
    }

    /// Like [`register_file_sink`](Self::register_file_sink) with a limit of its own.
    pub fn register_file_sink_with_limit<P: AsRef<Path>>(
        &self,
        path: P,
        level: Level,
        byte_limit: u32,
    ) -> Result<SlotId> {
        let file = self.open_file_sink(path)?;
        self.register(Sink::new(SinkKind::File(file), level).with_byte_limit(byte_limit))
    }

    /// Opens a [`FileSink`] without registering it; failures are also diagnosed.
    pub fn open_file_sink<P: AsRef<Path>>(&self, path: P) -> Result<FileSink> {
        FileSink::open(path).inspect_err(|err| self.diagnose(format_args!("{err}")))
    }

    pub fn sink_count(&self) -> usize {
        self.state().registry.len()
    }

    pub fn log(&self, level: Level, file: &str, line: u32, args: fmt::Arguments<'_>) {
        self.dispatch(Event::new(level, file, line, args))
    }

    /// Routes one event to the console path and every sink whose threshold it
    /// meets, in registration order. Does nothing while closed.
    pub fn dispatch(&self, mut event: Event<'_>) {
        let _lock = self.acquire();
        let mut failures = Vec::new();
        {
            let mut state = self.state();
            let State {
                open,
                quiet,
                min_level,
                file_limit,
                console,
                registry,
            } = &mut *state;
            if !*open {
                return;
            }
            event.timestamp();
            if !*quiet && event.level >= *min_level {
                if let Err(source) = console.write_event(&event) {
                    failures.push(format!("console write failed: {source}"));
                }
            }
            for (slot, sink) in registry.iter_mut() {
                if !sink.accepts(event.level) {
                    continue;
                }
                let event = event.with_byte_limit(sink.byte_limit().unwrap_or(*file_limit));
                if let Err(source) = sink.write_event(&event) {
                    failures.push(Error::SinkWrite { slot, source }.to_string());
                }
            }
        }
        for failure in failures {
            self.diagnose(format_args!("{failure}"));
        }
    }

    /// Tears down every sink, persisting file positions, and closes the logger.
    ///
    /// Every sink is torn down even when one fails; the first failure is
    /// returned and all of them are diagnosed.
    pub fn close(&self) -> Result<()> {
        let _lock = self.acquire();
        let mut state = self.state();
        let mut first = None;
        for (_, sink) in state.registry.drain() {
            if let Err(err) = sink.teardown() {
                self.diagnose(format_args!("{err}"));
                first.get_or_insert(err);
            }
        }
        state.open = false;
        first.map_or(Ok(()), Err)
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn acquire(&self) -> LockGuard {
        let lock = self
            .lock
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(lock) = lock else {
            return LockGuard::unlocked();
        };
        match lock.acquire() {
            Ok(()) => LockGuard::held(lock),
            Err(LockError::OwnerDead) => {
                match lock.mark_consistent() {
                    Ok(()) => self.diagnose(format_args!(
                        "lock owner died while holding the lock, lock recovered"
                    )),
                    Err(err) => self.diagnose(format_args!("{err}, logging continues degraded")),
                }
                LockGuard::held(lock)
            }
            Err(err) => {
                self.diagnose(format_args!("{err}, logging continues unsynchronized"));
                LockGuard::unlocked()
            }
        }
    }

    fn diagnose(&self, args: fmt::Arguments<'_>) {
        let mut out = self
            .diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        writeln!(out, "sinklog: {args}").ok();
        out.flush().ok();
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        let sinks: Vec<_> = state.registry.drain().collect();
        for (_, sink) in sinks {
            if let Err(err) = sink.teardown() {
                self.diagnose(format_args!("{err}"));
            }
        }
    }
}

/// Builder for a [`Logger`], seeded from [`SINKLOG_CONFIG`].
pub struct LoggerBuilder {
    capacity: usize,
    quiet: bool,
    min_level: Level,
    file_limit: u32,
    console: Option<ConsoleSink>,
    color: bool,
    diagnostics: Option<Box<dyn Write + Send>>,
    lock: Option<Arc<dyn LogLock>>,
    open: bool,
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        let config = &*SINKLOG_CONFIG;
        Self {
            capacity: config.CAPACITY,
            quiet: config.QUIET,
            min_level: config.level(),
            file_limit: config.FILE_LIMIT,
            console: None,
            color: config.COLOR,
            diagnostics: None,
            lock: None,
            open: false,
        }
    }
}

impl LoggerBuilder {
    /// Number of sink slots.
    pub fn with_capacity(self, capacity: usize) -> Self {
        Self { capacity, ..self }
    }
    pub fn quiet(self, quiet: bool) -> Self {
        Self { quiet, ..self }
    }
    pub fn with_min_level(self, min_level: Level) -> Self {
        Self { min_level, ..self }
    }
    pub fn with_file_limit(self, file_limit: u32) -> Self {
        Self { file_limit, ..self }
    }
    /// Replaces the stderr console path.
    pub fn with_console(self, console: ConsoleSink) -> Self {
        Self {
            console: Some(console),
            ..self
        }
    }
    /// Colors the default console path.
    pub fn with_color(self, color: bool) -> Self {
        Self { color, ..self }
    }
    /// Where internal failures are reported, stdout by default.
    pub fn with_diagnostics<W: Write + Send + 'static>(self, out: W) -> Self {
        Self {
            diagnostics: Some(Box::new(out)),
            ..self
        }
    }
    pub fn with_lock(self, lock: Arc<dyn LogLock>) -> Self {
        Self {
            lock: Some(lock),
            ..self
        }
    }
    /// Builds the logger already open.
    pub fn opened(self) -> Self {
        Self { open: true, ..self }
    }

    pub fn build(self) -> Logger {
        let Self {
            capacity,
            quiet,
            min_level,
            file_limit,
            console,
            color,
            diagnostics,
            lock,
            open,
        } = self;
        Logger {
            state: Mutex::new(State {
                open,
                quiet,
                min_level,
                file_limit,
                console: console.unwrap_or_else(|| ConsoleSink::stderr().with_color(color)),
                registry: Registry::with_capacity(capacity),
            }),
            lock: RwLock::new(lock),
            diagnostics: Mutex::new(diagnostics.unwrap_or_else(|| Box::new(io::stdout()))),
        }
    }
}

/// Logs through `$logger` with the call site's file and line.
///
/// ```
/// use sinklog_core::{Level, Logger, emit};
///
/// let logger = Logger::builder().quiet(true).opened().build();
/// emit!(logger, Level::Info, "listening on port {}", 8080);
/// ```
#[macro_export]
macro_rules! emit {
    ($logger:expr, $level:expr, $($arg:tt)+) => {
        $logger.log($level, file!(), line!(), format_args!($($arg)+))
    };
}
