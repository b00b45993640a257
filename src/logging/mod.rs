//! Levelled line logger. Every line is
//! `{rfc3339 millis} [LEVEL] [context] message payload={json}`.

use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};

use crate::wire::packet::Packet;

#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum LogLevel {
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Verbose = 5,
}

impl LogLevel {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "error" => Some(Self::Error),
            "warn" | "warning" => Some(Self::Warn),
            "info" => Some(Self::Info),
            "debug" => Some(Self::Debug),
            "verbose" | "trace" => Some(Self::Verbose),
            _ => None,
        }
    }

    fn label(self, colored: bool) -> &'static str {
        match (self, colored) {
            (Self::Error, false) => "ERROR",
            (Self::Warn, false) => "WARN",
            (Self::Info, false) => "INFO",
            (Self::Debug, false) => "DEBUG",
            (Self::Verbose, false) => "VERBOSE",
            (Self::Error, true) => "\x1b[31mERROR\x1b[0m",
            (Self::Warn, true) => "\x1b[33mWARN\x1b[0m",
            (Self::Info, true) => "\x1b[32mINFO\x1b[0m",
            (Self::Debug, true) => "\x1b[36mDEBUG\x1b[0m",
            (Self::Verbose, true) => "\x1b[35mVERBOSE\x1b[0m",
        }
    }
}

#[derive(Clone, Debug)]
pub struct LoggerConfig {
    pub min_level: LogLevel,
    /// ANSI-coloured level labels for terminals.
    pub human_friendly: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Debug,
            human_friendly: false,
        }
    }
}

pub trait LogSink: Send + Sync {
    fn write_line(&self, line: &str);
}

pub struct StdoutSink;

impl LogSink for StdoutSink {
    fn write_line(&self, line: &str) {
        let _ = writeln!(io::stdout().lock(), "{line}");
    }
}

/// Keeps lines in memory; used by tests across the crate.
#[derive(Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().expect("memory sink mutex poisoned").clone()
    }
}

impl LogSink for MemorySink {
    fn write_line(&self, line: &str) {
        self.lines
            .lock()
            .expect("memory sink mutex poisoned")
            .push(line.to_owned());
    }
}

pub struct Logger {
    config: LoggerConfig,
    sink: Arc<dyn LogSink>,
}

impl Logger {
    pub fn new(config: LoggerConfig) -> Self {
        Self::with_sink(config, Arc::new(StdoutSink))
    }

    pub fn with_sink(config: LoggerConfig, sink: Arc<dyn LogSink>) -> Self {
        Self { config, sink }
    }

    /// A logger writing into a fresh `MemorySink`.
    pub fn in_memory(min_level: LogLevel) -> (Self, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::default());
        let logger = Self::with_sink(
            LoggerConfig {
                min_level,
                human_friendly: false,
            },
            sink.clone(),
        );
        (logger, sink)
    }

    pub fn error(&self, context: Option<&str>, message: &str) {
        self.log(LogLevel::Error, context, message, None);
    }

    pub fn warn(&self, context: Option<&str>, message: &str) {
        self.log(LogLevel::Warn, context, message, None);
    }

    pub fn info(&self, context: Option<&str>, message: &str) {
        self.log(LogLevel::Info, context, message, None);
    }

    pub fn debug(&self, context: Option<&str>, message: &str) {
        self.log(LogLevel::Debug, context, message, None);
    }

    /// Traces one packet crossing the gateway, with a hex dump of its
    /// encoded bytes.
    pub fn packet_trace(&self, direction: &str, packet: &Packet, bytes: &[u8]) {
        if !self.should_log(LogLevel::Verbose) {
            return;
        }
        let hex = bytes
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect::<Vec<_>>()
            .join(" ");
        self.log(
            LogLevel::Verbose,
            Some("wire::trace"),
            direction,
            Some(json!({
                "version": packet.version().code(),
                "command": packet.command().as_str(),
                "byte_count": packet.byte_count(),
                "hex": hex,
            })),
        );
    }

    pub fn log(
        &self,
        level: LogLevel,
        context: Option<&str>,
        message: &str,
        payload: Option<Value>,
    ) {
        if self.should_log(level) {
            self.sink
                .write_line(&self.render(level, context, message, payload.as_ref()));
        }
    }

    pub fn should_log(&self, level: LogLevel) -> bool {
        level <= self.config.min_level
    }

    fn render(
        &self,
        level: LogLevel,
        context: Option<&str>,
        message: &str,
        payload: Option<&Value>,
    ) -> String {
        let mut line = format!(
            "{} [{}]",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            level.label(self.config.human_friendly)
        );
        if let Some(context) = context.filter(|context| !context.is_empty()) {
            line.push_str(&format!(" [{context}]"));
        }
        line.push(' ');
        line.push_str(message);
        if let Some(payload) = payload {
            line.push_str(&format!(" payload={payload}"));
        }
        line
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{LogLevel, Logger, LoggerConfig};
    use crate::wire::header::MessageHeader;
    use crate::wire::packet::{Packet, Request};
    use crate::wire::request::RequestBody;
    use crate::wire::types::{Command, Version};

    #[test]
    fn default_config_is_plain_and_debug_level() {
        let config = LoggerConfig::default();
        assert_eq!(config.min_level, LogLevel::Debug);
        assert!(!config.human_friendly);
    }

    #[test]
    fn threshold_drops_more_detailed_levels() {
        let (logger, sink) = Logger::in_memory(LogLevel::Info);

        logger.info(Some("task::scheduler"), "kept");
        logger.debug(Some("task::scheduler"), "dropped");

        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("[INFO] [task::scheduler] kept"));
    }

    #[test]
    fn levels_parse_case_insensitively() {
        assert_eq!(LogLevel::parse("WARN"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("trace"), Some(LogLevel::Verbose));
        assert_eq!(LogLevel::parse("chatty"), None);
    }

    #[test]
    fn packet_trace_needs_verbose_and_dumps_hex() {
        let packet: Packet =
            Request::new(MessageHeader::new(Command::Idle, Version::V2), RequestBody::Idle).into();

        let (quiet, quiet_sink) = Logger::in_memory(LogLevel::Debug);
        quiet.packet_trace("in", &packet, &[0x00, 0x1e]);
        assert!(quiet_sink.lines().is_empty());

        let (logger, sink) = Logger::in_memory(LogLevel::Verbose);
        logger.packet_trace("in", &packet, &[0x00, 0x1e]);
        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("[wire::trace] in"));
        assert!(lines[0].contains("\"command\":\"IDLE\""));
        assert!(lines[0].contains("\"hex\":\"00 1e\""));
        assert!(lines[0].contains("\"version\":2"));
    }

    #[test]
    fn payload_and_context_are_optional() {
        let (logger, sink) = Logger::in_memory(LogLevel::Debug);

        logger.log(
            LogLevel::Warn,
            Some("gateway::convert"),
            "truncated",
            Some(json!({"task":7,"table":"audit"})),
        );
        logger.log(LogLevel::Error, None, "bare", None);

        let lines = sink.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("20"));
        assert!(lines[0].contains("[WARN] [gateway::convert] truncated"));
        assert!(lines[0].ends_with("payload={\"table\":\"audit\",\"task\":7}"));
        assert!(lines[1].ends_with("[ERROR] bare"));
    }

    #[test]
    fn human_friendly_lines_colour_the_level() {
        let sink = std::sync::Arc::new(super::MemorySink::default());
        let logger = Logger::with_sink(
            LoggerConfig {
                min_level: LogLevel::Info,
                human_friendly: true,
            },
            sink.clone(),
        );
        logger.error(None, "boom");
        assert!(sink.lines()[0].contains("\x1b[31mERROR\x1b[0m"));
    }
}
