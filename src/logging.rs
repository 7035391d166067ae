use std::io::Write;
use std::sync::OnceLock;

use chrono::Local;
use log::{LevelFilter, Metadata, Record, SetLoggerError};
use serde::Serialize;

use crate::config::{LogFormat, LoggingConfig};

static LOGGER: OnceLock<BridgeLogger> = OnceLock::new();

#[derive(Debug, Serialize, Clone)]
pub struct LogMessage {
    level: String,
    target: String,
    message: String,
    timestamp: String,
}

impl LogMessage {
    fn from_record(record: &Record) -> Self {
        Self {
            level: record.level().to_string(),
            target: record.target().to_string(),
            message: record.args().to_string(),
            timestamp: Local::now().to_rfc3339(),
        }
    }

    fn to_line(&self, format: LogFormat) -> String {
        match format {
            LogFormat::Text => format!("{} [{}] {}: {}", self.timestamp, self.level, self.target, self.message),
            LogFormat::Json => serde_json::to_string(self)
                .unwrap_or_else(|e| format!("{{\"level\":\"ERROR\",\"message\":\"unserializable log record: {}\"}}", e)),
        }
    }
}

/// Writes timestamped records to stderr, as text or one JSON object per line
pub struct BridgeLogger {
    level: LevelFilter,
    format: LogFormat,
}

impl BridgeLogger {
    pub fn new(level: LevelFilter, format: LogFormat) -> Self {
        Self { level, format }
    }

    pub fn init(level: LevelFilter, format: LogFormat) -> Result<(), SetLoggerError> {
        let logger = LOGGER.get_or_init(|| BridgeLogger::new(level, format));
        log::set_logger(logger).map(|()| log::set_max_level(logger.level))
    }
}

impl log::Log for BridgeLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let line = LogMessage::from_record(record).to_line(self.format);
            // Nowhere left to report a failed stderr write.
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Backend {
    /// One global level
    Bridge(LevelFilter),
    /// Per-module directives, e.g. `verismart_bridge=debug,bluest=warn`
    EnvFilter(String),
}

/// A plain level name in `RUST_LOG` overrides the configured level; anything
/// else is handed to env_logger as filter directives.
fn select_backend(rust_log: Option<&str>, configured: LevelFilter) -> Backend {
    match rust_log.map(str::trim).filter(|value| !value.is_empty()) {
        None => Backend::Bridge(configured),
        Some(value) => match value.parse::<LevelFilter>() {
            Ok(level) => Backend::Bridge(level),
            Err(_) => Backend::EnvFilter(value.to_string()),
        },
    }
}

/// Installs the global logger. Both backends write the same line format.
pub fn setup_logging(config: &LoggingConfig) {
    let rust_log = std::env::var("RUST_LOG").ok();
    let format = config.format;
    let installed = match select_backend(rust_log.as_deref(), config.level_filter()) {
        Backend::Bridge(level) => BridgeLogger::init(level, format),
        Backend::EnvFilter(filters) => env_logger::Builder::new()
            .parse_filters(&filters)
            .format(move |buf, record| writeln!(buf, "{}", LogMessage::from_record(record).to_line(format)))
            .try_init(),
    };
    match installed {
        Ok(()) => log::info!("Logging initialized"),
        Err(e) => eprintln!("Logger already installed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> LogMessage {
        LogMessage {
            level: "INFO".into(),
            target: "verismart_bridge".into(),
            message: "Device selected".into(),
            timestamp: "2026-01-01T00:00:00+00:00".into(),
        }
    }

    #[test]
    fn text_lines_carry_level_and_message() {
        let line = message().to_line(LogFormat::Text);
        assert_eq!(line, "2026-01-01T00:00:00+00:00 [INFO] verismart_bridge: Device selected");
    }

    #[test]
    fn plain_levels_stay_with_the_bridge_logger() {
        assert_eq!(select_backend(None, LevelFilter::Info), Backend::Bridge(LevelFilter::Info));
        assert_eq!(select_backend(Some("  "), LevelFilter::Warn), Backend::Bridge(LevelFilter::Warn));
        assert_eq!(select_backend(Some("debug"), LevelFilter::Info), Backend::Bridge(LevelFilter::Debug));
    }

    #[test]
    fn module_directives_go_to_env_logger() {
        assert_eq!(
            select_backend(Some("verismart_bridge=debug,bluest=warn"), LevelFilter::Info),
            Backend::EnvFilter("verismart_bridge=debug,bluest=warn".into())
        );
    }

    #[test]
    fn json_lines_are_parseable() {
        let line = message().to_line(LogFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["level"], "INFO");
        assert_eq!(value["message"], "Device selected");
    }
}
