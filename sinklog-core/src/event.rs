use std::fmt;

use chrono::{DateTime, Local};

use crate::level::Level;

/// One log occurrence, built per call and copied for every sink it reaches.
#[derive(Clone, Copy)]
pub struct Event<'a> {
    pub level: Level,
    pub file: &'a str,
    pub line: u32,
    pub args: fmt::Arguments<'a>,
    /// Byte limit the receiving file sink wraps at, `0` disables wrapping.
    pub byte_limit: u32,
    timestamp: Option<DateTime<Local>>,
}

impl<'a> Event<'a> {
    pub fn new(level: Level, file: &'a str, line: u32, args: fmt::Arguments<'a>) -> Self {
        Self {
            level,
            file,
            line,
            args,
            byte_limit: 0,
            timestamp: None,
        }
    }

    pub fn with_timestamp(self, timestamp: DateTime<Local>) -> Self {
        Self {
            timestamp: Some(timestamp),
            ..self
        }
    }

    pub fn with_byte_limit(self, byte_limit: u32) -> Self {
        Self { byte_limit, ..self }
    }

    /// Returns the event time, taking the wall clock on first use.
    pub fn timestamp(&mut self) -> DateTime<Local> {
        *self.timestamp.get_or_insert_with(Local::now)
    }

    pub(crate) fn stamped(&self) -> Option<DateTime<Local>> {
        self.timestamp
    }
}

impl fmt::Debug for Event<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("level", &self.level)
            .field("file", &self.file)
            .field("line", &self.line)
            .field("message", &self.args.to_string())
            .field("byte_limit", &self.byte_limit)
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

/// Owned copy of an event, as handed to channel sinks.
#[derive(Debug, Clone)]
pub struct LogMessage {
    pub level: Level,
    pub file: String,
    pub line: u32,
    pub timestamp: DateTime<Local>,
    pub message: String,
}

impl From<&Event<'_>> for LogMessage {
    fn from(event: &Event<'_>) -> Self {
        Self {
            level: event.level,
            file: event.file.to_string(),
            line: event.line,
            timestamp: event.stamped().unwrap_or_else(Local::now),
            message: event.args.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_is_taken_once() {
        let mut event = Event::new(Level::Info, "main.rs", 3, format_args!("hi"));
        let first = event.timestamp();
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert_eq!(event.timestamp(), first);
    }

    #[test]
    fn test_preset_timestamp_is_kept() {
        let at = Local.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap();
        let mut event = Event::new(Level::Warn, "main.rs", 3, format_args!("hi")).with_timestamp(at);
        assert_eq!(event.timestamp(), at);
        let message = LogMessage::from(&event);
        assert_eq!(message.timestamp, at);
        assert_eq!(message.message, "hi");
    }
}
