use std::io::{self, Write};

use crossbeam_channel::Sender;

use crate::{
    error::Result,
    event::{Event, LogMessage},
    file_sink::FileSink,
    format::format_console,
    level::Level,
};

/// Terminal-style output: stderr by default, or any writer.
pub struct ConsoleSink {
    out: Box<dyn Write + Send>,
    color: bool,
}

impl ConsoleSink {
    pub fn stderr() -> Self {
        Self::from_writer(io::stderr())
    }

    pub fn stdout() -> Self {
        Self::from_writer(io::stdout())
    }

    pub fn from_writer<W: Write + Send + 'static>(out: W) -> Self {
        Self {
            out: Box::new(out),
            color: true,
        }
    }

    pub fn with_color(self, color: bool) -> Self {
        Self { color, ..self }
    }

    pub fn write_event(&mut self, event: &Event<'_>) -> io::Result<()> {
        let mut event = *event;
        writeln!(self.out, "{}", format_console(&mut event, self.color))?;
        self.out.flush()
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::stderr()
    }
}

/// What a registered sink writes to.
pub enum SinkKind {
    Console(ConsoleSink),
    File(FileSink),
    /// Hands an owned [`LogMessage`] to whoever holds the receiver.
    Channel(Sender<LogMessage>),
}

/// A registered destination together with its severity threshold.
pub struct Sink {
    kind: SinkKind,
    level: Level,
    byte_limit: Option<u32>,
}

impl Sink {
    pub fn new(kind: SinkKind, level: Level) -> Self {
        Self {
            kind,
            level,
            byte_limit: None,
        }
    }

    /// Overrides the logger-wide file limit for this sink.
    pub fn with_byte_limit(self, byte_limit: u32) -> Self {
        Self {
            byte_limit: Some(byte_limit),
            ..self
        }
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn byte_limit(&self) -> Option<u32> {
        self.byte_limit
    }

    pub fn kind(&self) -> &SinkKind {
        &self.kind
    }

    pub fn accepts(&self, level: Level) -> bool {
        level >= self.level
    }

    pub fn write_event(&mut self, event: &Event<'_>) -> io::Result<()> {
        match &mut self.kind {
            SinkKind::Console(console) => console.write_event(event),
            SinkKind::File(file) => file.write_event(event),
            SinkKind::Channel(sender) => sender
                .send(LogMessage::from(event))
                .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "receiver disconnected")),
        }
    }

    /// Releases the sink; file sinks persist their position record.
    pub fn teardown(self) -> Result<()> {
        match self.kind {
            SinkKind::Console(mut console) => {
                console.flush().ok();
                Ok(())
            }
            SinkKind::File(file) => file.persist_position().map(|_| ()),
            SinkKind::Channel(_) => Ok(()),
        }
    }
}
