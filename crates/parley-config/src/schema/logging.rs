use serde::{Deserialize, Serialize};

/// Log level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// `tracing` filter directive scoped to the hub's crates.
    pub fn directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "parley=trace",
            LogLevel::Debug => "parley=debug",
            LogLevel::Info => "parley=info",
            LogLevel::Warn => "parley=warn",
            LogLevel::Error => "parley=error",
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
}
