use std::sync::LazyLock;

use derive_from_env::FromEnv;

use crate::level::Level;

/// Defaults picked up by [`LoggerBuilder`](crate::LoggerBuilder), read once from `SINKLOG_*`.
#[derive(FromEnv)]
#[from_env(prefix = "SINKLOG")]
#[allow(non_snake_case)]
pub struct SinklogConfig {
    #[from_env(default = "trace")]
    pub LEVEL: String,
    #[from_env(default = "false")]
    pub QUIET: bool,
    #[from_env(default = "0")]
    pub FILE_LIMIT: u32,
    #[from_env(default = "true")]
    pub COLOR: bool,
    #[from_env(default = "32")]
    pub CAPACITY: usize,
}

impl SinklogConfig {
    fn defaults() -> Self {
        Self {
            LEVEL: "trace".into(),
            QUIET: false,
            FILE_LIMIT: 0,
            COLOR: true,
            CAPACITY: 32,
        }
    }

    /// Resets an unparseable `LEVEL` to `trace`, noting it on stderr.
    fn checked(mut self) -> Self {
        if let Err(err) = self.LEVEL.parse::<Level>() {
            eprintln!("sinklog: ignoring malformed SINKLOG_LEVEL: {err}, using trace");
            self.LEVEL = "trace".into();
        }
        self
    }

    pub fn level(&self) -> Level {
        self.LEVEL.parse().unwrap_or_default()
    }
}

pub static SINKLOG_CONFIG: LazyLock<SinklogConfig> = LazyLock::new(|| {
    SinklogConfig::from_env()
        .map(SinklogConfig::checked)
        .unwrap_or_else(|err| {
            eprintln!("sinklog: ignoring malformed SINKLOG_* environment: {err:?}");
            SinklogConfig::defaults()
        })
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_level_falls_back_to_trace() {
        let config = SinklogConfig {
            LEVEL: "loud".into(),
            ..SinklogConfig::defaults()
        }
        .checked();
        assert_eq!(config.LEVEL, "trace");
        assert_eq!(config.level(), Level::Trace);
    }

    #[test]
    fn test_valid_level_is_kept() {
        let config = SinklogConfig {
            LEVEL: "Warning".into(),
            ..SinklogConfig::defaults()
        }
        .checked();
        assert_eq!(config.LEVEL, "Warning");
        assert_eq!(config.level(), Level::Warn);
    }
}
