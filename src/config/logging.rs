use serde::{Deserialize, Serialize};
use std::fmt;

use super::defaults;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Text,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: Option<LogLevel>,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default)]
    pub enable_file_logging: bool,
    #[serde(default = "defaults::log_dir")]
    pub dir: String,
    #[serde(default = "defaults::log_filename")]
    pub filename: String,
    #[serde(default = "defaults::log_rotation")]
    pub rotation: String,
}

impl Default for LogFormat {
    fn default() -> Self {
        Self::Text
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: None,
            format: LogFormat::default(),
            enable_file_logging: false,
            dir: defaults::log_dir(),
            filename: defaults::log_filename(),
            rotation: defaults::log_rotation(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_display() {
        assert_eq!(LogLevel::Warn.to_string(), "warn");
    }
}
