// Logging for plugin hosts
// Installs a `log` implementation that writes text or JSON lines to the
// console, a file, or both, with independent levels per destination.
//
// Plugin progress messages forwarded through `ProgressReporter::logging`
// carry the `plugbound::report` target and are tagged as such in the output.
//
// Example usage:
// ```
// let config = LogConfig {
//     console_level: LevelFilter::Info,
//     file_level: Some(LevelFilter::Debug),
//     format: LogFormat::Json,
//     destination: LogDestination::Both(PathBuf::from("host.log")),
// };
// init_logger(config)?;
// log::info!("Host started");
// ```

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use log::{Level, LevelFilter};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::plugin::settings::REPORT_LOG_TARGET;

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Invalid log format: {}. Valid options: text, json", s)),
        }
    }
}

/// Log destination options
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogDestination {
    Console,
    File(PathBuf),
    Both(PathBuf),
}

impl LogDestination {
    fn file_path(&self) -> Option<&Path> {
        match self {
            LogDestination::Console => None,
            LogDestination::File(path) | LogDestination::Both(path) => Some(path),
        }
    }

    fn writes_console(&self) -> bool {
        matches!(self, LogDestination::Console | LogDestination::Both(_))
    }
}

/// JSON log line
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonLogEntry {
    pub timestamp: String,
    pub level: String,
    pub target: String,
    pub message: String,
    /// Set for plugin progress messages
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub report: bool,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub console_level: LevelFilter,
    pub file_level: Option<LevelFilter>,
    pub format: LogFormat,
    pub destination: LogDestination,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            console_level: LevelFilter::Info,
            file_level: None,
            format: LogFormat::Text,
            destination: LogDestination::Console,
        }
    }
}

impl LogConfig {
    /// Most verbose level any destination accepts
    pub fn max_level(&self) -> LevelFilter {
        let console = if self.destination.writes_console() {
            self.console_level
        } else {
            LevelFilter::Off
        };
        match (self.destination.file_path(), self.file_level) {
            (Some(_), Some(file_level)) => console.max(file_level),
            _ => console,
        }
    }
}

/// `log` implementation for plugin hosts
pub struct HostLogger {
    config: LogConfig,
    file: Option<Mutex<File>>,
}

impl HostLogger {
    /// Create the logger, opening the log file when one is configured
    pub fn new(config: LogConfig) -> Result<Self> {
        let file = match (config.destination.file_path(), config.file_level) {
            (Some(path), Some(_)) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("Failed to open log file: {}", path.display()))?;
                Some(Mutex::new(file))
            }
            _ => None,
        };
        Ok(Self { config, file })
    }

    fn format_timestamp() -> String {
        let now: DateTime<Local> = Local::now();
        now.format("%Y-%m-%d %H:%M:%S").to_string()
    }

    fn format_text(&self, record: &log::Record) -> String {
        let tag = if record.target() == REPORT_LOG_TARGET { " (report)" } else { "" };
        format!(
            "{} [{}]{} {}",
            Self::format_timestamp(),
            record.level().to_string().to_uppercase(),
            tag,
            record.args()
        )
    }

    fn format_json(&self, record: &log::Record) -> Result<String> {
        let entry = JsonLogEntry {
            timestamp: Self::format_timestamp(),
            level: record.level().to_string().to_uppercase(),
            target: record.target().to_string(),
            message: record.args().to_string(),
            report: record.target() == REPORT_LOG_TARGET,
        };
        serde_json::to_string(&entry).context("Failed to serialize log entry to JSON")
    }

    fn format(&self, record: &log::Record) -> String {
        match self.config.format {
            LogFormat::Text => self.format_text(record),
            LogFormat::Json => self.format_json(record).unwrap_or_else(|e| {
                eprintln!("JSON formatting error: {}. Falling back to text format.", e);
                self.format_text(record)
            }),
        }
    }

    fn to_console(&self, level: Level) -> bool {
        self.config.destination.writes_console() && level <= self.config.console_level
    }

    fn to_file(&self, level: Level) -> bool {
        self.file.is_some() && self.config.file_level.map_or(false, |file_level| level <= file_level)
    }
}

impl log::Log for HostLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.to_console(metadata.level()) || self.to_file(metadata.level())
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = self.format(record);

        if self.to_console(record.level()) {
            if let Err(e) = writeln!(io::stderr(), "{}", line) {
                eprintln!("Console logging error: {}", e);
            }
        }

        if self.to_file(record.level()) {
            if let Some(file) = &self.file {
                if let Err(e) = writeln!(file.lock(), "{}", line) {
                    eprintln!("File logging error: {}", e);
                }
            }
        }
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
        if let Some(file) = &self.file {
            let _ = file.lock().flush();
        }
    }
}

/// Initialize the logging system with the given configuration
pub fn init_logger(config: LogConfig) -> Result<()> {
    let max_level = config.max_level();
    let logger = HostLogger::new(config)?;

    log::set_boxed_logger(Box::new(logger)).context("Failed to set global logger")?;
    log::set_max_level(max_level);

    Ok(())
}

/// Convert string to LevelFilter
pub fn parse_log_level(level_str: &str) -> Result<LevelFilter> {
    match level_str.to_lowercase().as_str() {
        "error" => Ok(LevelFilter::Error),
        "warn" => Ok(LevelFilter::Warn),
        "info" => Ok(LevelFilter::Info),
        "debug" => Ok(LevelFilter::Debug),
        "trace" => Ok(LevelFilter::Trace),
        "off" => Ok(LevelFilter::Off),
        _ => Err(anyhow::anyhow!(
            "Invalid log level: {}. Valid levels: error, warn, info, debug, trace, off",
            level_str
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Log;

    fn record_with<'a>(target: &'a str, args: std::fmt::Arguments<'a>) -> log::Record<'a> {
        log::Record::builder()
            .level(Level::Info)
            .target(target)
            .args(args)
            .build()
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(parse_log_level("error").unwrap(), LevelFilter::Error);
        assert_eq!(parse_log_level("Warn").unwrap(), LevelFilter::Warn);
        assert_eq!(parse_log_level("trace").unwrap(), LevelFilter::Trace);
        assert_eq!(parse_log_level("off").unwrap(), LevelFilter::Off);
        assert!(parse_log_level("loud").is_err());
    }

    #[test]
    fn test_max_level() {
        let config = LogConfig::default();
        assert_eq!(config.max_level(), LevelFilter::Info);

        let config = LogConfig {
            console_level: LevelFilter::Warn,
            file_level: Some(LevelFilter::Debug),
            format: LogFormat::Text,
            destination: LogDestination::Both(PathBuf::from("unused.log")),
        };
        assert_eq!(config.max_level(), LevelFilter::Debug);

        let config = LogConfig {
            console_level: LevelFilter::Trace,
            file_level: Some(LevelFilter::Error),
            format: LogFormat::Text,
            destination: LogDestination::File(PathBuf::from("unused.log")),
        };
        assert_eq!(config.max_level(), LevelFilter::Error);
    }

    #[test]
    fn test_text_formatting_tags_reports() {
        let logger = HostLogger::new(LogConfig::default()).unwrap();

        let line = logger.format_text(&record_with("plugbound::plugin", format_args!("started")));
        assert!(line.contains("[INFO] started"));

        let line = logger.format_text(&record_with(REPORT_LOG_TARGET, format_args!("[csv] 5 rows")));
        assert!(line.contains("[INFO] (report) [csv] 5 rows"));
        assert_eq!(line.chars().nth(4), Some('-'));
        assert_eq!(line.chars().nth(10), Some(' '));
    }

    #[test]
    fn test_json_formatting() {
        let logger = HostLogger::new(LogConfig::default()).unwrap();

        let line = logger.format_json(&record_with("host", format_args!("hello"))).unwrap();
        assert!(line.contains(r#""level":"INFO""#));
        assert!(line.contains(r#""target":"host""#));
        assert!(line.contains(r#""message":"hello""#));
        assert!(!line.contains(r#""report""#));

        let line = logger.format_json(&record_with(REPORT_LOG_TARGET, format_args!("x"))).unwrap();
        assert!(line.contains(r#""report":true"#));
    }

    #[test]
    fn test_file_destination() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("host.log");
        let logger = HostLogger::new(LogConfig {
            console_level: LevelFilter::Off,
            file_level: Some(LevelFilter::Info),
            format: LogFormat::Json,
            destination: LogDestination::File(path.clone()),
        })
        .unwrap();

        logger.log(&record_with("host", format_args!("to file")));
        logger.flush();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("to file"));
    }
}
