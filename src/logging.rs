use std::sync::OnceLock;

use chrono::Local;
use log::{Level, Metadata, Record, SetLoggerError};
use serde::Serialize;
use tokio::sync::broadcast;

const LOG_CHANNEL_CAPACITY: usize = 512;

static LOGGER: OnceLock<SessionLogger> = OnceLock::new();

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct LogMessage {
    pub level: String,
    pub target: String,
    pub message: String,
    pub timestamp: String,
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
}

/// Writes every record to stderr and fans it out to log observers.
pub struct SessionLogger {
    level: Level,
    sender: broadcast::Sender<LogMessage>,
}

impl SessionLogger {
    pub fn new(level: Level) -> Self {
        let (sender, _) = broadcast::channel(LOG_CHANNEL_CAPACITY);
        Self { level, sender }
    }

    /// Installs the logger process-wide.
    pub fn init(level: Level) -> Result<(), SetLoggerError> {
        let logger = LOGGER.get_or_init(|| SessionLogger::new(level));
        log::set_logger(logger).map(|()| log::set_max_level(logger.level.to_level_filter()))
    }

    /// Log feed of the installed logger, if one was installed.
    pub fn subscribe() -> Option<broadcast::Receiver<LogMessage>> {
        LOGGER.get().map(|logger| logger.sender.subscribe())
    }

    fn emit_log(&self, record: &Record) {
        // nobody listening is fine
        let _ = self.sender.send(LogMessage::from_record(record));
    }
}

impl log::Log for SessionLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level(), record.args());
            self.emit_log(record);
        }
    }

    fn flush(&self) {}
}
